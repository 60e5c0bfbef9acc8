mod conflicts;
mod generate;
mod mutate;
mod optimize;
mod query;
mod types;
mod util;

pub use conflicts::{check, ConflictCandidate};
pub use generate::plan_chain;
pub use types::{
    BatchOutcome, BatchReport, Conflict, ConflictKind, ElementFailure, ErrorKind,
    GenerateOptions, ItemFilter, ItemPatch, OptimizeMethod, OptimizeReport, OrderSchedule,
    OrderScheduleSummary, SchedError, ScheduleStats,
};

use crate::config::SchedulerConfig;
use crate::model::{ItemId, OrderId, OrderState, Plant, ScheduleItem};
use chrono::{DateTime, Utc};

/// Scheduler : encapsule un Plant et la configuration d'ordonnancement
#[derive(Debug, Default)]
pub struct Scheduler {
    plant: Plant,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(plant: Plant, config: SchedulerConfig) -> Self {
        Self { plant, config }
    }

    pub fn plant(&self) -> &Plant {
        &self.plant
    }
    pub fn plant_mut(&mut self) -> &mut Plant {
        &mut self.plant
    }
    pub fn into_plant(self) -> Plant {
        self.plant
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Génère la chaîne d'un ordre à partir de `start`.
    pub fn generate(
        &mut self,
        order: &OrderId,
        start: DateTime<Utc>,
        opts: GenerateOptions,
    ) -> Result<Vec<ScheduleItem>, SchedError> {
        generate::generate(self, order, start, opts)
    }

    /// `parallel` : chaque ordre démarre à `start` ; sinon bout à bout dans l'ordre donné.
    pub fn generate_multi(
        &mut self,
        orders: &[OrderId],
        start: DateTime<Utc>,
        parallel: bool,
        opts: GenerateOptions,
    ) -> BatchReport<OrderSchedule> {
        generate::generate_multi(self, orders, start, parallel, opts)
    }

    pub fn reschedule(
        &mut self,
        item: &ItemId,
        new_start: DateTime<Utc>,
        new_duration: Option<i64>,
    ) -> Result<ScheduleItem, SchedError> {
        mutate::reschedule(self, item, new_start, new_duration)
    }

    pub fn lock(&mut self, item: &ItemId) -> Result<(), SchedError> {
        mutate::set_locked(self, item, true)
    }

    pub fn unlock(&mut self, item: &ItemId) -> Result<(), SchedError> {
        mutate::set_locked(self, item, false)
    }

    pub fn lock_order(&mut self, order: &OrderId) -> Result<usize, SchedError> {
        mutate::set_order_locked(self, order, true)
    }

    pub fn unlock_order(&mut self, order: &OrderId) -> Result<usize, SchedError> {
        mutate::set_order_locked(self, order, false)
    }

    pub fn shift_order(&mut self, order: &OrderId, delta_seconds: i64) -> Result<usize, SchedError> {
        mutate::shift_order(self, order, delta_seconds)
    }

    pub fn bulk_update(&mut self, patches: &[ItemPatch]) -> BatchReport<ScheduleItem> {
        mutate::bulk_update(self, patches)
    }

    pub fn delete_by_order(&mut self, order: &OrderId) -> Result<usize, SchedError> {
        mutate::delete_by_order(self, order)
    }

    /// Change l'état d'un ordre selon la table de transitions.
    pub fn change_order_state(
        &mut self,
        order: &OrderId,
        next: OrderState,
    ) -> Result<OrderState, SchedError> {
        mutate::change_order_state(self, order, next)
    }

    pub fn optimize(
        &mut self,
        orders: &[OrderId],
        method: OptimizeMethod,
        now: DateTime<Utc>,
    ) -> Result<OptimizeReport, SchedError> {
        optimize::optimize(self, orders, method, now)
    }
}
