use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Déclare un identifiant fort (newtype sur `String`).
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new<S: AsRef<str>>(s: S) -> Self {
                Self(s.as_ref().to_owned())
            }
            pub fn random() -> Self {
                Self(Uuid::new_v4().to_string())
            }
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identifiant fort pour Operation
    OperationId
);
string_id!(
    /// Identifiant fort pour Routing (gamme)
    RoutingId
);
string_id!(
    /// Identifiant fort pour RoutingNode
    NodeId
);
string_id!(OrderId);
string_id!(ItemId);
string_id!(ProductId);
string_id!(WorkstationId);
string_id!(ProductionLineId);

/// Champ de temps surchargeable par un nœud de gamme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingField {
    /// Temps unitaire de lot (`tj`)
    Tj,
    /// Temps de préparation (`tpz`)
    Tpz,
    /// Tampon avant l'opération suivante
    TimeNextOperation,
}

impl TimingField {
    pub const ALL: [TimingField; 3] = [Self::Tj, Self::Tpz, Self::TimeNextOperation];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tj => "tj",
            Self::Tpz => "tpz",
            Self::TimeNextOperation => "time_next_operation",
        }
    }
}

/// Opération réutilisable (valeurs par défaut, en secondes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub id: OperationId,
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub name: String,
    pub tj: u32,
    pub tpz: u32,
    pub time_next_operation: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub workstation_ids: Vec<WorkstationId>,
}

impl Operation {
    pub fn new<S: AsRef<str>>(id: S, tj: u32, tpz: u32, time_next_operation: u32) -> Self {
        Self {
            id: OperationId::new(&id),
            number: id.as_ref().to_owned(),
            name: String::new(),
            tj,
            tpz,
            time_next_operation,
            workstation_ids: Vec::new(),
        }
    }

    pub fn default_for(&self, field: TimingField) -> u32 {
        match field {
            TimingField::Tj => self.tj,
            TimingField::Tpz => self.tpz,
            TimingField::TimeNextOperation => self.time_next_operation,
        }
    }
}

/// Nœud positionné d'une gamme. `None` = valeur de l'opération, `Some(0)` = zéro voulu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingNode {
    pub id: NodeId,
    pub operation: OperationId,
    pub node_number: String,
    #[serde(default)]
    pub parent: Option<NodeId>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub tj: Option<u32>,
    #[serde(default)]
    pub tpz: Option<u32>,
    #[serde(default)]
    pub time_next_operation: Option<u32>,
}

impl RoutingNode {
    pub fn new<S: AsRef<str>>(node_number: S, operation: OperationId) -> Self {
        Self {
            id: NodeId::random(),
            operation,
            node_number: node_number.as_ref().to_owned(),
            parent: None,
            priority: 1,
            tj: None,
            tpz: None,
            time_next_operation: None,
        }
    }

    pub fn with_parent(mut self, parent: &NodeId) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    pub fn with_override(mut self, field: TimingField, value: u32) -> Self {
        *self.override_mut(field) = Some(value);
        self
    }

    pub fn override_for(&self, field: TimingField) -> Option<u32> {
        match field {
            TimingField::Tj => self.tj,
            TimingField::Tpz => self.tpz,
            TimingField::TimeNextOperation => self.time_next_operation,
        }
    }

    fn override_mut(&mut self, field: TimingField) -> &mut Option<u32> {
        match field {
            TimingField::Tj => &mut self.tj,
            TimingField::Tpz => &mut self.tpz,
            TimingField::TimeNextOperation => &mut self.time_next_operation,
        }
    }
}

/// Cycle de vie d'une gamme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingState {
    #[default]
    Draft,
    Accepted,
    Checked,
    Outdated,
    Declined,
}

impl RoutingState {
    pub const ALL: [RoutingState; 5] = [
        Self::Draft,
        Self::Accepted,
        Self::Checked,
        Self::Outdated,
        Self::Declined,
    ];

    /// Table des transitions autorisées.
    pub fn allowed_transitions(self) -> &'static [RoutingState] {
        use RoutingState::*;
        match self {
            Draft => &[Accepted, Declined],
            Accepted => &[Checked, Declined, Outdated],
            Checked => &[Outdated, Declined],
            Outdated => &[Draft],
            Declined => &[Draft],
        }
    }

    pub fn can_transition_to(self, next: RoutingState) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Accepted => "accepted",
            Self::Checked => "checked",
            Self::Outdated => "outdated",
            Self::Declined => "declined",
        }
    }
}

impl FromStr for RoutingState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| format!("unknown routing state: {s}"))
    }
}

/// Gamme (technologie) d'un produit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Routing {
    pub id: RoutingId,
    #[serde(default)]
    pub number: String,
    pub product: ProductId,
    #[serde(default)]
    pub state: RoutingState,
    #[serde(default)]
    pub master: bool,
    #[serde(default)]
    pub nodes: Vec<RoutingNode>,
}

impl Routing {
    pub fn new<S: AsRef<str>>(id: S, product: ProductId) -> Self {
        Self {
            id: RoutingId::new(&id),
            number: id.as_ref().to_owned(),
            product,
            state: RoutingState::Draft,
            master: false,
            nodes: Vec::new(),
        }
    }

    pub fn find_node(&self, id: &NodeId) -> Option<&RoutingNode> {
        self.nodes.iter().find(|n| &n.id == id)
    }
}

/// Cycle de vie d'un ordre de fabrication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    #[default]
    Pending,
    Accepted,
    InProgress,
    Completed,
    Declined,
    Interrupted,
    Abandoned,
}

impl OrderState {
    pub const ALL: [OrderState; 7] = [
        Self::Pending,
        Self::Accepted,
        Self::InProgress,
        Self::Completed,
        Self::Declined,
        Self::Interrupted,
        Self::Abandoned,
    ];

    /// Table des transitions autorisées ; les états terminaux n'en ont aucune.
    pub fn allowed_transitions(self) -> &'static [OrderState] {
        use OrderState::*;
        match self {
            Pending => &[Accepted, Declined],
            Accepted => &[InProgress, Declined, Abandoned],
            InProgress => &[Completed, Interrupted, Abandoned],
            Interrupted => &[InProgress, Abandoned],
            Completed | Declined | Abandoned => &[],
        }
    }

    pub fn can_transition_to(self, next: OrderState) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Declined => "declined",
            Self::Interrupted => "interrupted",
            Self::Abandoned => "abandoned",
        }
    }
}

impl FromStr for OrderState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| format!("unknown order state: {s}"))
    }
}

/// Ordre de fabrication (vu depuis le module ordres).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    #[serde(default)]
    pub routing: Option<RoutingId>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub production_line: Option<ProductionLineId>,
    #[serde(default)]
    pub planned_quantity: f64,
    #[serde(default)]
    pub done_quantity: f64,
    #[serde(default)]
    pub state: OrderState,
}

impl Order {
    pub fn new<S: AsRef<str>>(id: S, routing: Option<RoutingId>) -> Self {
        Self {
            id: OrderId::new(id),
            routing,
            deadline: None,
            priority: 0,
            production_line: None,
            planned_quantity: 1.0,
            done_quantity: 0.0,
            state: OrderState::Pending,
        }
    }
}

/// Occurrence datée d'un nœud de gamme pour un ordre.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleItem {
    pub id: ItemId,
    pub order: OrderId,
    pub node: NodeId,
    pub sequence_index: u32,
    pub planned_start: DateTime<Utc>,
    pub planned_end: DateTime<Utc>,
    pub duration_seconds: i64,
    pub buffer_seconds: i64,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub description: String,
    /// Poste déclaré par l'appelant (sinon dérivé de l'opération).
    #[serde(default)]
    pub workstation: Option<WorkstationId>,
    #[serde(default)]
    pub revision: u64,
}

impl ScheduleItem {
    /// `None` si la valeur stockée dépasse la plage de chrono.
    pub fn duration(&self) -> Option<Duration> {
        Duration::try_seconds(self.duration_seconds)
    }

    pub fn buffer(&self) -> Option<Duration> {
        Duration::try_seconds(self.buffer_seconds)
    }

    /// Fin + tampon : instant où l'opération suivante peut démarrer.
    pub fn release_at(&self) -> Option<DateTime<Utc>> {
        self.buffer()
            .and_then(|buffer| self.planned_end.checked_add_signed(buffer))
    }

    pub(crate) fn touch(&mut self) {
        self.revision += 1;
    }
}

/// Jeu de données complet : données de référence + planning.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Plant {
    #[serde(default)]
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub routings: Vec<Routing>,
    #[serde(default)]
    pub orders: Vec<Order>,
    #[serde(default)]
    pub items: Vec<ScheduleItem>,
}

impl Plant {
    pub fn find_operation(&self, id: &OperationId) -> Option<&Operation> {
        self.operations.iter().find(|o| &o.id == id)
    }
    pub fn find_routing(&self, id: &RoutingId) -> Option<&Routing> {
        self.routings.iter().find(|r| &r.id == id)
    }
    pub fn find_routing_mut(&mut self, id: &RoutingId) -> Option<&mut Routing> {
        self.routings.iter_mut().find(|r| &r.id == id)
    }
    pub fn find_order(&self, id: &OrderId) -> Option<&Order> {
        self.orders.iter().find(|o| &o.id == id)
    }
    pub fn find_order_mut(&mut self, id: &OrderId) -> Option<&mut Order> {
        self.orders.iter_mut().find(|o| &o.id == id)
    }
    pub fn find_item(&self, id: &ItemId) -> Option<&ScheduleItem> {
        self.items.iter().find(|i| &i.id == id)
    }
    pub fn find_item_mut(&mut self, id: &ItemId) -> Option<&mut ScheduleItem> {
        self.items.iter_mut().find(|i| &i.id == id)
    }

    /// Retrouve un nœud et son opération, toutes gammes confondues.
    pub fn find_node(&self, id: &NodeId) -> Option<(&RoutingNode, Option<&Operation>)> {
        self.routings
            .iter()
            .find_map(|r| r.find_node(id))
            .map(|n| (n, self.find_operation(&n.operation)))
    }

    pub fn items_for_order<'a>(
        &'a self,
        order: &'a OrderId,
    ) -> impl Iterator<Item = &'a ScheduleItem> + 'a {
        self.items.iter().filter(move |i| &i.order == order)
    }
}
