//! Arbre de gamme : résolution des valeurs effectives et ordre de parcours.
//!
//! L'ordre d'ordonnancement est celui de `node_number`, indépendamment du
//! pointeur `parent` : les branches parallèles sont sérialisées en une chaîne.

use crate::model::{
    NodeId, Operation, OperationId, Plant, ProductId, Routing, RoutingId, RoutingNode,
    RoutingState, TimingField, WorkstationId,
};
use crate::scheduler::SchedError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Comparateur de `node_number`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeOrdering {
    /// Comparaison de chaînes pure : "1.10" < "1.2".
    #[default]
    Lexical,
    /// Segments séparés par des points comparés numériquement : "1.2" < "1.10".
    Natural,
}

impl NodeOrdering {
    pub fn compare(self, a: &str, b: &str) -> Ordering {
        match self {
            Self::Lexical => a.cmp(b),
            Self::Natural => natural_cmp(a, b),
        }
    }
}

fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(nx), Ok(ny)) => nx.cmp(&ny),
                    _ => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// Vue d'une gamme avec ses opérations, stockée en arène (index de nœuds).
#[derive(Debug)]
pub struct RoutingTree<'a> {
    routing: &'a Routing,
    operations: HashMap<&'a OperationId, &'a Operation>,
    children: Vec<Vec<usize>>,
    roots: Vec<usize>,
}

/// Totaux des temps effectifs d'une gamme (reporting).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RoutingSummary {
    pub total_tj: u64,
    pub total_tpz: u64,
    pub total_time_next_operation: u64,
    pub total_time: u64,
    pub nodes: usize,
}

/// Ligne de la vue arborescente.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNodeView {
    pub node: NodeId,
    pub node_number: String,
    pub parent_node_number: Option<String>,
    pub priority: i32,
    pub operation: OperationId,
    pub workstations: Vec<WorkstationId>,
    pub tj: u32,
    pub tpz: u32,
    pub time_next_operation: u32,
}

impl<'a> RoutingTree<'a> {
    pub fn new(routing: &'a Routing, operations: &'a [Operation]) -> Self {
        let operations = operations.iter().map(|op| (&op.id, op)).collect();
        let index: HashMap<&NodeId, usize> = routing
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (&n.id, i))
            .collect();

        let mut children = vec![Vec::new(); routing.nodes.len()];
        let mut roots = Vec::new();
        for (i, node) in routing.nodes.iter().enumerate() {
            match node.parent.as_ref().and_then(|p| index.get(p)) {
                Some(&parent) => children[parent].push(i),
                None => roots.push(i),
            }
        }

        Self {
            routing,
            operations,
            children,
            roots,
        }
    }

    pub fn from_plant(plant: &'a Plant, routing: &RoutingId) -> Result<Self, SchedError> {
        let routing = plant
            .find_routing(routing)
            .ok_or_else(|| SchedError::not_found("routing", routing))?;
        Ok(Self::new(routing, &plant.operations))
    }

    pub fn routing(&self) -> &'a Routing {
        self.routing
    }

    pub fn operation_of(&self, node: &RoutingNode) -> Result<&'a Operation, SchedError> {
        self.operations.get(&node.operation).copied().ok_or_else(|| {
            SchedError::Configuration(format!(
                "node {} references unknown operation {}",
                node.node_number, node.operation
            ))
        })
    }

    /// Valeur effective : surcharge du nœud si présente, sinon défaut de l'opération.
    pub fn resolve(&self, node: &RoutingNode, field: TimingField) -> Result<u32, SchedError> {
        match node.override_for(field) {
            Some(value) => Ok(value),
            None => Ok(self.operation_of(node)?.default_for(field)),
        }
    }

    /// Tous les nœuds en une seule chaîne, triés par `node_number`.
    pub fn linearize(&self, ordering: NodeOrdering) -> Vec<&'a RoutingNode> {
        let mut nodes: Vec<&RoutingNode> = self.routing.nodes.iter().collect();
        nodes.sort_by(|a, b| ordering.compare(&a.node_number, &b.node_number));
        nodes
    }

    pub fn roots(&self) -> impl Iterator<Item = &'a RoutingNode> + '_ {
        self.roots.iter().map(|&i| &self.routing.nodes[i])
    }

    pub fn children(&self, node: &NodeId) -> Vec<&'a RoutingNode> {
        self.routing
            .nodes
            .iter()
            .position(|n| &n.id == node)
            .map(|i| {
                self.children[i]
                    .iter()
                    .map(|&c| &self.routing.nodes[c])
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn build_summary(&self) -> Result<RoutingSummary, SchedError> {
        let mut summary = RoutingSummary {
            nodes: self.routing.nodes.len(),
            ..RoutingSummary::default()
        };
        for node in &self.routing.nodes {
            summary.total_tj += u64::from(self.resolve(node, TimingField::Tj)?);
            summary.total_tpz += u64::from(self.resolve(node, TimingField::Tpz)?);
            summary.total_time_next_operation +=
                u64::from(self.resolve(node, TimingField::TimeNextOperation)?);
        }
        summary.total_time =
            summary.total_tj + summary.total_tpz + summary.total_time_next_operation;
        Ok(summary)
    }

    /// Vue arborescente à plat, dans l'ordre d'ordonnancement.
    pub fn tree(&self, ordering: NodeOrdering) -> Result<Vec<TreeNodeView>, SchedError> {
        self.linearize(ordering)
            .into_iter()
            .map(|node| {
                let operation = self.operation_of(node)?;
                Ok(TreeNodeView {
                    node: node.id.clone(),
                    node_number: node.node_number.clone(),
                    parent_node_number: node
                        .parent
                        .as_ref()
                        .and_then(|p| self.routing.find_node(p))
                        .map(|p| p.node_number.clone()),
                    priority: node.priority,
                    operation: operation.id.clone(),
                    workstations: operation.workstation_ids.clone(),
                    tj: self.resolve(node, TimingField::Tj)?,
                    tpz: self.resolve(node, TimingField::Tpz)?,
                    time_next_operation: self.resolve(node, TimingField::TimeNextOperation)?,
                })
            })
            .collect()
    }
}

/// Change l'état d'une gamme après validation de la transition.
pub fn change_state(
    plant: &mut Plant,
    routing: &RoutingId,
    next: RoutingState,
) -> Result<RoutingState, SchedError> {
    let r = plant
        .find_routing_mut(routing)
        .ok_or_else(|| SchedError::not_found("routing", routing))?;
    if !r.state.can_transition_to(next) {
        return Err(SchedError::InvalidTransition {
            entity: "routing",
            from: r.state.as_str(),
            to: next.as_str(),
        });
    }
    let previous = r.state;
    r.state = next;
    tracing::info!(routing = %routing, from = previous.as_str(), to = next.as_str(), "routing state changed");
    Ok(previous)
}

/// Désigne la gamme maître de son produit (efface les autres en une passe).
pub fn set_master(plant: &mut Plant, routing: &RoutingId) -> Result<(), SchedError> {
    let product: ProductId = plant
        .find_routing(routing)
        .map(|r| r.product.clone())
        .ok_or_else(|| SchedError::not_found("routing", routing))?;

    for r in plant.routings.iter_mut().filter(|r| r.product == product) {
        r.master = &r.id == routing;
    }
    Ok(())
}

pub fn master_for_product<'a>(plant: &'a Plant, product: &ProductId) -> Option<&'a Routing> {
    plant
        .routings
        .iter()
        .find(|r| &r.product == product && r.master)
}
