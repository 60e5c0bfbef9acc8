use super::{types::SchedError, util, BatchReport, GenerateOptions, OrderSchedule, Scheduler};
use crate::model::{ItemId, Order, OrderId, Plant, ScheduleItem, TimingField};
use crate::routing::{NodeOrdering, RoutingTree};
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Construit la chaîne d'items d'un ordre sans toucher au plant.
///
/// Curseur initialisé à `start` ; pour chaque nœud dans l'ordre de `node_number` :
/// `end = cursor + tj + tpz`, puis `cursor = end + time_next_operation`.
pub fn plan_chain(
    plant: &Plant,
    order: &Order,
    start: DateTime<Utc>,
    ordering: NodeOrdering,
) -> Result<Vec<ScheduleItem>, SchedError> {
    let routing_id = order.routing.as_ref().ok_or_else(|| {
        SchedError::Configuration(format!("order {} has no routing", order.id))
    })?;
    let tree = RoutingTree::from_plant(plant, routing_id)?;

    let mut cursor = start;
    let mut out = Vec::with_capacity(tree.routing().nodes.len());
    for (idx, node) in tree.linearize(ordering).into_iter().enumerate() {
        let operation = tree.operation_of(node)?;
        let tj = tree.resolve(node, TimingField::Tj)?;
        let tpz = tree.resolve(node, TimingField::Tpz)?;
        let next = tree.resolve(node, TimingField::TimeNextOperation)?;

        let duration_seconds = i64::from(tj) + i64::from(tpz);
        let buffer_seconds = i64::from(next);
        let end = util::add_seconds(cursor, duration_seconds)?;

        let sequence_index = u32::try_from(idx)
            .map_err(|_| SchedError::Validation("too many routing nodes".to_string()))?;
        out.push(ScheduleItem {
            id: ItemId::random(),
            order: order.id.clone(),
            node: node.id.clone(),
            sequence_index,
            planned_start: cursor,
            planned_end: end,
            duration_seconds,
            buffer_seconds,
            locked: false,
            description: format!("Auto generated for {}", operation.number),
            workstation: None,
            revision: 0,
        });
        cursor = util::add_seconds(end, buffer_seconds)?;
    }
    Ok(out)
}

/// Instant où la chaîne suivante peut démarrer après `items`.
fn chain_release(
    items: &[ScheduleItem],
    fallback: DateTime<Utc>,
) -> Result<DateTime<Utc>, SchedError> {
    match items.last() {
        Some(last) => util::add_seconds(last.planned_end, last.buffer_seconds),
        None => Ok(fallback),
    }
}

pub(super) fn generate(
    scheduler: &mut Scheduler,
    order_id: &OrderId,
    start: DateTime<Utc>,
    opts: GenerateOptions,
) -> Result<Vec<ScheduleItem>, SchedError> {
    let ordering = scheduler.config.node_ordering;
    let (items, _) = schedule_order(&mut scheduler.plant, order_id, start, ordering, opts)?;
    tracing::info!(order = %order_id, items = items.len(), "schedule generated");
    Ok(items)
}

pub(super) fn generate_multi(
    scheduler: &mut Scheduler,
    orders: &[OrderId],
    start: DateTime<Utc>,
    parallel: bool,
    opts: GenerateOptions,
) -> BatchReport<OrderSchedule> {
    let ordering = scheduler.config.node_ordering;
    let mut report = BatchReport::default();
    let mut cursor = start;
    let mut seen: HashSet<&OrderId> = HashSet::new();

    for order_id in orders {
        if !seen.insert(order_id) {
            report.fail(
                order_id,
                SchedError::Validation(format!("order {order_id} listed more than once")),
            );
            continue;
        }
        let order_start = if parallel { start } else { cursor };
        match schedule_order(&mut scheduler.plant, order_id, order_start, ordering, opts) {
            Ok((items, release)) => {
                if !parallel {
                    cursor = release;
                }
                tracing::debug!(order = %order_id, items = items.len(), parallel, "order scheduled");
                report.succeeded.push(OrderSchedule {
                    order: order_id.clone(),
                    items,
                });
            }
            Err(err) => report.fail(order_id, err),
        }
    }

    tracing::info!(
        succeeded = report.succeeded.len(),
        failed = report.failures.len(),
        parallel,
        "multi-order generation done"
    );
    report
}

fn schedule_order(
    plant: &mut Plant,
    order_id: &OrderId,
    start: DateTime<Utc>,
    ordering: NodeOrdering,
    opts: GenerateOptions,
) -> Result<(Vec<ScheduleItem>, DateTime<Utc>), SchedError> {
    let order = plant
        .find_order(order_id)
        .ok_or_else(|| SchedError::not_found("order", order_id))?;
    let items = plan_chain(plant, order, start, ordering)?;
    let release = chain_release(&items, start)?;
    commit_chain(plant, order_id, &items, opts)?;
    Ok((items, release))
}

/// Écrit la chaîne d'un ordre : tout ou rien.
fn commit_chain(
    plant: &mut Plant,
    order_id: &OrderId,
    items: &[ScheduleItem],
    opts: GenerateOptions,
) -> Result<(), SchedError> {
    let existing: Vec<&ScheduleItem> = plant.items_for_order(order_id).collect();
    if !existing.is_empty() {
        if !opts.replace_existing {
            return Err(SchedError::Validation(format!(
                "order {order_id} already has {} schedule item(s)",
                existing.len()
            )));
        }
        if let Some(locked) = existing.iter().find(|i| i.locked) {
            return Err(SchedError::Locked(locked.id.clone()));
        }
        plant.items.retain(|i| &i.order != order_id);
    }
    plant.items.extend_from_slice(items);
    Ok(())
}
