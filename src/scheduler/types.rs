use crate::model::{ItemId, NodeId, OrderId, ScheduleItem};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Options de génération
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateOptions {
    /// Supprime le planning existant de l'ordre avant de régénérer.
    pub replace_existing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    Workstation,
    ProductionLine,
    SameComponent,
}

impl ConflictKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Workstation => "workstation",
            Self::ProductionLine => "production_line",
            Self::SameComponent => "same_component",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub item_a: ItemId,
    pub item_b: ItemId,
    pub order_a: OrderId,
    pub order_b: OrderId,
    pub resource: String,
    pub kind: ConflictKind,
    pub overlap_start: DateTime<Utc>,
    pub overlap_end: DateTime<Utc>,
}

/// Méthode de re-tassement de l'optimiseur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizeMethod {
    /// échéance croissante
    #[default]
    Earliest,
    /// échéance décroissante
    Latest,
    /// priorité croissante
    Balanced,
}

impl FromStr for OptimizeMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "earliest" => Ok(Self::Earliest),
            "latest" => Ok(Self::Latest),
            "balanced" => Ok(Self::Balanced),
            other => Err(format!("unknown optimize method: {other}")),
        }
    }
}

/// Patch partiel d'un item ; seuls les champs présents sont appliqués.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ItemPatch {
    pub id: ItemId,
    #[serde(default)]
    pub planned_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub planned_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_seconds: Option<i64>,
    #[serde(default)]
    pub buffer_seconds: Option<i64>,
    #[serde(default)]
    pub sequence_index: Option<u32>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub locked: Option<bool>,
    #[serde(default)]
    pub workstation: Option<crate::model::WorkstationId>,
    /// Révision attendue (contrôle optimiste).
    #[serde(default)]
    pub expected_revision: Option<u64>,
}

impl ItemPatch {
    pub fn new(id: ItemId) -> Self {
        Self {
            id,
            planned_start: None,
            planned_end: None,
            duration_seconds: None,
            buffer_seconds: None,
            sequence_index: None,
            description: None,
            locked: None,
            workstation: None,
            expected_revision: None,
        }
    }

    pub(super) fn touches_timing(&self) -> bool {
        self.planned_start.is_some()
            || self.planned_end.is_some()
            || self.duration_seconds.is_some()
            || self.buffer_seconds.is_some()
            || self.sequence_index.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Validation,
    LockedItem,
    NotFound,
    InvalidTransition,
    StaleRevision,
    Other,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Validation => "validation",
            Self::LockedItem => "locked_item",
            Self::NotFound => "not_found",
            Self::InvalidTransition => "invalid_transition",
            Self::StaleRevision => "stale_revision",
            Self::Other => "other",
        }
    }
}

#[derive(Error, Debug)]
pub enum SchedError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("item {0} is locked")]
    Locked(ItemId),
    #[error("unknown {entity}: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("cannot transition {entity} from '{from}' to '{to}'")]
    InvalidTransition {
        entity: &'static str,
        from: &'static str,
        to: &'static str,
    },
    #[error("item {id} was modified (expected revision {expected}, found {found})")]
    StaleRevision { id: ItemId, expected: u64, found: u64 },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SchedError {
    pub fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Locked(_) => ErrorKind::LockedItem,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Self::StaleRevision { .. } => ErrorKind::StaleRevision,
            Self::Other(_) => ErrorKind::Other,
        }
    }
}

/// Échec d'un élément d'un traitement par lot.
#[derive(Debug)]
pub struct ElementFailure {
    pub key: String,
    pub error: SchedError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    Empty,
    Complete,
    Partial,
    Nothing,
}

/// Résultat d'un lot : ce qui a réussi et, élément par élément, ce qui a échoué.
#[derive(Debug)]
pub struct BatchReport<T> {
    pub succeeded: Vec<T>,
    pub failures: Vec<ElementFailure>,
}

impl<T> Default for BatchReport<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl<T> BatchReport<T> {
    pub(super) fn fail(&mut self, key: impl fmt::Display, error: SchedError) {
        tracing::warn!(key = %key, kind = error.kind().as_str(), %error, "batch element skipped");
        self.failures.push(ElementFailure {
            key: key.to_string(),
            error,
        });
    }

    pub fn outcome(&self) -> BatchOutcome {
        match (self.succeeded.is_empty(), self.failures.is_empty()) {
            (true, true) => BatchOutcome::Empty,
            (false, true) => BatchOutcome::Complete,
            (false, false) => BatchOutcome::Partial,
            (true, false) => BatchOutcome::Nothing,
        }
    }
}

/// Résultat de génération pour un ordre.
#[derive(Debug, Clone)]
pub struct OrderSchedule {
    pub order: OrderId,
    pub items: Vec<ScheduleItem>,
}

/// Résultat de l'optimiseur.
#[derive(Debug, Clone, Default)]
pub struct OptimizeReport {
    pub moved: Vec<ItemId>,
    pub skipped_locked: Vec<ItemId>,
}

/// Synthèse du planning d'un ordre.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderScheduleSummary {
    pub order: OrderId,
    pub has_schedule: bool,
    pub earliest_start: Option<DateTime<Utc>>,
    pub latest_end: Option<DateTime<Utc>>,
    pub total_duration_seconds: i64,
    pub total_buffer_seconds: i64,
    pub item_count: usize,
    pub locked_count: usize,
}

/// Compteurs pour le tableau de bord.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ScheduleStats {
    pub total: usize,
    pub locked: usize,
    pub unlocked: usize,
    pub today: usize,
    pub this_week: usize,
    pub overdue: usize,
}

/// Filtre de consultation des items.
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub orders: Option<Vec<OrderId>>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub workstation: Option<crate::model::WorkstationId>,
    pub node: Option<NodeId>,
}
