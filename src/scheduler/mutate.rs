use super::{types::SchedError, util, BatchReport, ItemPatch, Scheduler};
use crate::model::{ItemId, OrderId, OrderState, ScheduleItem};
use chrono::{DateTime, Utc};

pub(super) fn reschedule(
    scheduler: &mut Scheduler,
    item_id: &ItemId,
    new_start: DateTime<Utc>,
    new_duration: Option<i64>,
) -> Result<ScheduleItem, SchedError> {
    let Some(pos) = util::find_item_index(&scheduler.plant.items, item_id) else {
        return Err(SchedError::not_found("schedule item", item_id));
    };
    let item = &mut scheduler.plant.items[pos];
    if item.locked {
        return Err(SchedError::Locked(item_id.clone()));
    }
    if let Some(d) = new_duration {
        if d <= 0 {
            return Err(SchedError::Validation(format!(
                "duration must be positive, got {d}"
            )));
        }
    }

    let duration = new_duration.unwrap_or(item.duration_seconds);
    let end = util::add_seconds(new_start, util::sum_seconds(duration, item.buffer_seconds)?)?;
    item.planned_start = new_start;
    item.planned_end = end;
    item.duration_seconds = duration;
    item.touch();

    tracing::debug!(item = %item_id, start = %new_start, duration, "item rescheduled");
    Ok(item.clone())
}

pub(super) fn set_locked(
    scheduler: &mut Scheduler,
    item_id: &ItemId,
    locked: bool,
) -> Result<(), SchedError> {
    let item = scheduler
        .plant
        .find_item_mut(item_id)
        .ok_or_else(|| SchedError::not_found("schedule item", item_id))?;
    if item.locked != locked {
        item.locked = locked;
        item.touch();
    }
    Ok(())
}

pub(super) fn set_order_locked(
    scheduler: &mut Scheduler,
    order_id: &OrderId,
    locked: bool,
) -> Result<usize, SchedError> {
    ensure_order(scheduler, order_id)?;
    let mut count = 0;
    for item in scheduler
        .plant
        .items
        .iter_mut()
        .filter(|i| &i.order == order_id && i.locked != locked)
    {
        item.locked = locked;
        item.touch();
        count += 1;
    }
    Ok(count)
}

/// Décale les items non verrouillés ; les verrouillés ne bougent pas.
/// Tout ou rien : un item qui sortirait de la plage de dates annule le décalage.
pub(super) fn shift_order(
    scheduler: &mut Scheduler,
    order_id: &OrderId,
    delta_seconds: i64,
) -> Result<usize, SchedError> {
    ensure_order(scheduler, order_id)?;
    let mut moves = Vec::new();
    for (pos, item) in scheduler.plant.items.iter().enumerate() {
        if &item.order != order_id || item.locked {
            continue;
        }
        let start = util::add_seconds(item.planned_start, delta_seconds)?;
        let end = util::add_seconds(item.planned_end, delta_seconds)?;
        moves.push((pos, start, end));
    }

    let count = moves.len();
    for (pos, start, end) in moves {
        let item = &mut scheduler.plant.items[pos];
        item.planned_start = start;
        item.planned_end = end;
        item.touch();
    }
    tracing::debug!(order = %order_id, delta_seconds, shifted = count, "order shifted");
    Ok(count)
}

/// Applique les patchs élément par élément ; un patch rejeté n'arrête pas le lot.
pub(super) fn bulk_update(
    scheduler: &mut Scheduler,
    patches: &[ItemPatch],
) -> BatchReport<ScheduleItem> {
    let mut report = BatchReport::default();
    let mut staged = scheduler.plant.items.clone();

    for patch in patches {
        let Some(pos) = util::find_item_index(&staged, &patch.id) else {
            report.fail(&patch.id, SchedError::not_found("schedule item", &patch.id));
            continue;
        };
        match apply_patch(&staged[pos], patch) {
            Ok(updated) => {
                staged[pos] = updated.clone();
                report.succeeded.push(updated);
            }
            Err(err) => report.fail(&patch.id, err),
        }
    }

    scheduler.plant.items = staged;
    report
}

fn apply_patch(current: &ScheduleItem, patch: &ItemPatch) -> Result<ScheduleItem, SchedError> {
    if let Some(expected) = patch.expected_revision {
        if expected != current.revision {
            return Err(SchedError::StaleRevision {
                id: current.id.clone(),
                expected,
                found: current.revision,
            });
        }
    }
    if current.locked && patch.touches_timing() {
        return Err(SchedError::Locked(current.id.clone()));
    }

    let mut item = current.clone();
    if let Some(start) = patch.planned_start {
        item.planned_start = start;
    }
    if let Some(end) = patch.planned_end {
        item.planned_end = end;
    }
    if let Some(duration) = patch.duration_seconds {
        if duration < 0 {
            return Err(SchedError::Validation(format!(
                "duration_seconds must not be negative, got {duration}"
            )));
        }
        item.duration_seconds = duration;
    }
    if let Some(buffer) = patch.buffer_seconds {
        if buffer < 0 {
            return Err(SchedError::Validation(format!(
                "buffer_seconds must not be negative, got {buffer}"
            )));
        }
        item.buffer_seconds = buffer;
    }
    if let Some(seq) = patch.sequence_index {
        item.sequence_index = seq;
    }
    if let Some(description) = &patch.description {
        item.description = description.clone();
    }
    if let Some(locked) = patch.locked {
        item.locked = locked;
    }
    if let Some(ws) = &patch.workstation {
        item.workstation = Some(ws.clone());
    }

    // le tampon n'est pas re-dérivé
    if patch.planned_start.is_some() || patch.planned_end.is_some() {
        let duration = util::seconds_between(item.planned_start, item.planned_end);
        if duration < 0 {
            return Err(SchedError::Validation(format!(
                "planned_end is before planned_start for item {}",
                item.id
            )));
        }
        item.duration_seconds = duration;
    }
    // début + durée + tampon doit rester représentable
    let span = util::sum_seconds(item.duration_seconds, item.buffer_seconds)?;
    util::add_seconds(item.planned_start, span)?;

    item.touch();
    Ok(item)
}

pub(super) fn delete_by_order(
    scheduler: &mut Scheduler,
    order_id: &OrderId,
) -> Result<usize, SchedError> {
    let before = scheduler.plant.items.len();
    scheduler.plant.items.retain(|i| &i.order != order_id);
    let deleted = before - scheduler.plant.items.len();
    if deleted == 0 {
        // items orphelins supprimés même si l'ordre n'existe plus
        ensure_order(scheduler, order_id)?;
    }
    tracing::info!(order = %order_id, deleted, "order schedule deleted");
    Ok(deleted)
}

pub(super) fn change_order_state(
    scheduler: &mut Scheduler,
    order_id: &OrderId,
    next: OrderState,
) -> Result<OrderState, SchedError> {
    let order = scheduler
        .plant
        .find_order_mut(order_id)
        .ok_or_else(|| SchedError::not_found("order", order_id))?;
    if !order.state.can_transition_to(next) {
        return Err(SchedError::InvalidTransition {
            entity: "order",
            from: order.state.as_str(),
            to: next.as_str(),
        });
    }
    let previous = std::mem::replace(&mut order.state, next);
    tracing::info!(order = %order_id, from = previous.as_str(), to = next.as_str(), "order state changed");
    Ok(previous)
}

fn ensure_order(scheduler: &Scheduler, order_id: &OrderId) -> Result<(), SchedError> {
    scheduler
        .plant
        .find_order(order_id)
        .map(|_| ())
        .ok_or_else(|| SchedError::not_found("order", order_id))
}
