use super::{types::SchedError, util, OptimizeMethod, OptimizeReport, Scheduler};
use crate::model::{Order, OrderId};
use chrono::{DateTime, Utc};
use std::cmp::{Ordering, Reverse};
use std::collections::HashMap;

/// Re-tasse les items des ordres donnés bout à bout à partir de `now`.
///
/// Aucune vérification de ressource : heuristique de tassement, pas un solveur.
pub(super) fn optimize(
    scheduler: &mut Scheduler,
    orders: &[OrderId],
    method: OptimizeMethod,
    now: DateTime<Utc>,
) -> Result<OptimizeReport, SchedError> {
    let mut meta: HashMap<&OrderId, &Order> = HashMap::new();
    for id in orders {
        let order = scheduler
            .plant
            .find_order(id)
            .ok_or_else(|| SchedError::not_found("order", id))?;
        meta.insert(id, order);
    }

    let mut positions: Vec<usize> = scheduler
        .plant
        .items
        .iter()
        .enumerate()
        .filter(|(_, i)| meta.contains_key(&i.order))
        .map(|(pos, _)| pos)
        .collect();

    let items = &scheduler.plant.items;
    positions.sort_by(|&a, &b| {
        let (ia, ib) = (&items[a], &items[b]);
        compare_orders(meta[&ia.order], meta[&ib.order], method)
            .then(ia.sequence_index.cmp(&ib.sequence_index))
    });

    let mut report = OptimizeReport::default();
    let mut staged = scheduler.plant.items.clone();
    let mut cursor = now;
    for pos in positions {
        let item = &mut staged[pos];
        if item.locked {
            report.skipped_locked.push(item.id.clone());
            continue;
        }
        item.planned_start = cursor;
        item.planned_end = util::add_seconds(cursor, item.duration_seconds)?;
        item.touch();
        cursor = util::add_seconds(item.planned_end, item.buffer_seconds)?;
        report.moved.push(item.id.clone());
    }

    scheduler.plant.items = staged;
    tracing::info!(
        method = ?method,
        moved = report.moved.len(),
        skipped = report.skipped_locked.len(),
        "schedule optimized"
    );
    Ok(report)
}

/// Clé de tri ; les ordres sans échéance passent en dernier.
fn compare_orders(a: &Order, b: &Order, method: OptimizeMethod) -> Ordering {
    match method {
        OptimizeMethod::Earliest => deadline_key(a).cmp(&deadline_key(b)),
        OptimizeMethod::Latest => match (a.deadline, b.deadline) {
            (Some(x), Some(y)) => Reverse(x).cmp(&Reverse(y)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        OptimizeMethod::Balanced => a.priority.cmp(&b.priority),
    }
}

fn deadline_key(order: &Order) -> (bool, Option<DateTime<Utc>>) {
    (order.deadline.is_none(), order.deadline)
}
