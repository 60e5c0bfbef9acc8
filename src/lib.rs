#![forbid(unsafe_code)]
//! Mesplan — ordonnancement d'atelier à partir de gammes (sans BD).
//!
//! - Gammes arborescentes avec surcharges par nœud (`None` ≠ `0`).
//! - Génération de chaînes datées par ordre, seule ou en lot.
//! - Détection de conflits poste / ligne / nœud ; verrous, décalages, patchs.
//! - Stockage fichiers (JSON/CSV), écriture atomique ; tout en UTC.

pub mod config;
pub mod io;
pub mod model;
pub mod routing;
pub mod scheduler;
pub mod storage;

pub use config::SchedulerConfig;
pub use model::{
    ItemId, NodeId, Operation, OperationId, Order, OrderId, OrderState, Plant, ProductId,
    ProductionLineId, Routing, RoutingId, RoutingNode, RoutingState, ScheduleItem, TimingField,
    WorkstationId,
};
pub use routing::{NodeOrdering, RoutingSummary, RoutingTree, TreeNodeView};
pub use scheduler::{
    BatchOutcome, BatchReport, Conflict, ConflictKind, GenerateOptions, ItemFilter, ItemPatch,
    OptimizeMethod, SchedError, Scheduler,
};
pub use storage::{JsonStorage, Storage};
