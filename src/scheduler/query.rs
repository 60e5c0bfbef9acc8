use super::{conflicts, Conflict, ItemFilter, OrderScheduleSummary, ScheduleStats, Scheduler};
use crate::model::{OrderId, ScheduleItem};
use chrono::{DateTime, Datelike, Duration, Utc};

impl Scheduler {
    /// Items filtrés, triés par (ordre, sequence_index).
    pub fn items(&self, filter: &ItemFilter) -> Vec<&ScheduleItem> {
        let mut out: Vec<&ScheduleItem> = self
            .plant
            .items
            .iter()
            .filter(|i| {
                filter
                    .orders
                    .as_ref()
                    .map_or(true, |orders| orders.contains(&i.order))
            })
            .filter(|i| filter.to.map_or(true, |to| i.planned_start <= to))
            .filter(|i| filter.from.map_or(true, |from| i.planned_end >= from))
            .filter(|i| filter.node.as_ref().map_or(true, |n| &i.node == n))
            .filter(|i| {
                filter
                    .workstation
                    .as_ref()
                    .map_or(true, |ws| self.item_uses_workstation(i, ws))
            })
            .collect();
        out.sort_by(|a, b| {
            a.order
                .cmp(&b.order)
                .then(a.sequence_index.cmp(&b.sequence_index))
        });
        out
    }

    fn item_uses_workstation(&self, item: &ScheduleItem, ws: &crate::model::WorkstationId) -> bool {
        if let Some(declared) = &item.workstation {
            return declared == ws;
        }
        self.plant
            .find_node(&item.node)
            .and_then(|(_, op)| op)
            .is_some_and(|op| op.workstation_ids.contains(ws))
    }

    pub fn order_summary(&self, order: &OrderId) -> OrderScheduleSummary {
        let items: Vec<&ScheduleItem> = self.plant.items_for_order(order).collect();
        OrderScheduleSummary {
            order: order.clone(),
            has_schedule: !items.is_empty(),
            earliest_start: items.iter().map(|i| i.planned_start).min(),
            latest_end: items.iter().map(|i| i.planned_end).max(),
            total_duration_seconds: items.iter().map(|i| i.duration_seconds).sum(),
            total_buffer_seconds: items.iter().map(|i| i.buffer_seconds).sum(),
            item_count: items.len(),
            locked_count: items.iter().filter(|i| i.locked).count(),
        }
    }

    /// Semaine courante : depuis lundi 00:00 UTC.
    pub fn stats(&self, now: DateTime<Utc>) -> ScheduleStats {
        let today = now.date_naive();
        let week_start = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));

        let mut stats = ScheduleStats::default();
        for item in &self.plant.items {
            stats.total += 1;
            if item.locked {
                stats.locked += 1;
            } else {
                stats.unlocked += 1;
            }
            let start_day = item.planned_start.date_naive();
            if start_day == today {
                stats.today += 1;
            }
            if start_day >= week_start {
                stats.this_week += 1;
            }
            if item.planned_end < now {
                stats.overdue += 1;
            }
        }
        stats
    }

    /// Détecte les conflits parmi des items fournis par l'appelant.
    pub fn check(&self, items: &[ScheduleItem]) -> Vec<Conflict> {
        let candidates = self.conflict_candidates(items);
        conflicts::check(&candidates, self.config.check_same_component)
    }

    /// Conflits entre items stockés qui touchent `[from, to]`
    /// (horizon par défaut de la configuration si `to` est absent).
    pub fn check_window(&self, from: DateTime<Utc>, to: Option<DateTime<Utc>>) -> Vec<Conflict> {
        let horizon = Duration::days(i64::from(self.config.conflict_horizon_days));
        let to = to.unwrap_or_else(|| {
            from.checked_add_signed(horizon)
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        });
        let filter = ItemFilter {
            from: Some(from),
            to: Some(to),
            ..ItemFilter::default()
        };
        let mut items: Vec<ScheduleItem> = self.items(&filter).into_iter().cloned().collect();
        items.sort_by_key(|i| i.planned_start);
        self.check(&items)
    }
}
