use super::{util, Conflict, ConflictKind, Scheduler};
use crate::model::{
    ItemId, NodeId, OrderId, ProductionLineId, ScheduleItem, WorkstationId,
};
use chrono::{DateTime, Utc};

/// Item vu par le détecteur, avec ses ressources déclarées ou dérivées.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictCandidate {
    pub item: ItemId,
    pub order: OrderId,
    pub node: NodeId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub workstation: Option<WorkstationId>,
    pub production_line: Option<ProductionLineId>,
}

impl ConflictCandidate {
    /// Candidat sans ressource déclarée.
    pub fn from_item(item: &ScheduleItem) -> Self {
        Self {
            item: item.id.clone(),
            order: item.order.clone(),
            node: item.node.clone(),
            start: item.planned_start,
            end: item.planned_end,
            workstation: item.workstation.clone(),
            production_line: None,
        }
    }
}

/// Comparaison par paires, O(n²) : filtrer en amont par période/ressource.
pub fn check(candidates: &[ConflictCandidate], same_component: bool) -> Vec<Conflict> {
    let mut out = Vec::new();

    for (idx, a) in candidates.iter().enumerate() {
        for b in candidates.iter().skip(idx + 1) {
            if !util::overlaps(a.start, a.end, b.start, b.end) {
                continue;
            }
            let Some((kind, resource)) = shared_resource(a, b, same_component) else {
                continue;
            };
            out.push(Conflict {
                item_a: a.item.clone(),
                item_b: b.item.clone(),
                order_a: a.order.clone(),
                order_b: b.order.clone(),
                resource,
                kind,
                overlap_start: a.start.max(b.start),
                overlap_end: a.end.min(b.end),
            });
        }
    }

    out
}

fn shared_resource(
    a: &ConflictCandidate,
    b: &ConflictCandidate,
    same_component: bool,
) -> Option<(ConflictKind, String)> {
    if let (Some(wa), Some(wb)) = (&a.workstation, &b.workstation) {
        if wa == wb {
            return Some((ConflictKind::Workstation, wa.to_string()));
        }
    }
    if let (Some(la), Some(lb)) = (&a.production_line, &b.production_line) {
        if la == lb {
            return Some((ConflictKind::ProductionLine, la.to_string()));
        }
    }
    if same_component && a.node == b.node {
        return Some((ConflictKind::SameComponent, a.node.to_string()));
    }
    None
}

impl Scheduler {
    /// Enrichit les items avec le poste (déclaré, ou unique poste de l'opération)
    /// et la ligne de production de l'ordre.
    pub fn conflict_candidates(&self, items: &[ScheduleItem]) -> Vec<ConflictCandidate> {
        items
            .iter()
            .map(|item| {
                let mut candidate = ConflictCandidate::from_item(item);
                if candidate.workstation.is_none() && self.config.derive_workstation_from_operation
                {
                    candidate.workstation = self
                        .plant
                        .find_node(&item.node)
                        .and_then(|(_, op)| op)
                        .filter(|op| op.workstation_ids.len() == 1)
                        .map(|op| op.workstation_ids[0].clone());
                }
                candidate.production_line = self
                    .plant
                    .find_order(&item.order)
                    .and_then(|o| o.production_line.clone());
                candidate
            })
            .collect()
    }
}
