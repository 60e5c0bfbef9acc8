#![forbid(unsafe_code)]
use chrono::{DateTime, Duration, TimeZone, Utc};
use mesplan::{
    model::{NodeId, Operation, OperationId, Order, Plant, ProductId, Routing, RoutingId, RoutingNode},
    scheduler::{BatchOutcome, ConflictKind, ErrorKind, GenerateOptions, ItemPatch, OptimizeMethod},
    ItemId, NodeOrdering, OrderId, ProductionLineId, ScheduleItem, SchedError, Scheduler,
    SchedulerConfig, WorkstationId,
};

fn t0() -> DateTime<Utc> {
    // lundi
    Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).unwrap()
}

fn secs(n: i64) -> Duration {
    Duration::seconds(n)
}

/// Deux opérations (cut sur WS1, weld sans poste), une gamme R1 "1" → "2",
/// ordres O1..O3 sur R1 et O4 sans gamme.
fn plant() -> Plant {
    let mut cut = Operation::new("cut", 600, 300, 60);
    cut.workstation_ids = vec![WorkstationId::new("WS1")];
    let weld = Operation::new("weld", 900, 600, 120);

    let mut routing = Routing::new("R1", ProductId::new("P1"));
    let first = RoutingNode::new("1", OperationId::new("cut"));
    let mut second = RoutingNode::new("2", OperationId::new("weld")).with_parent(&first.id);
    second.id = NodeId::new("n-weld");
    routing.nodes = vec![second, first];

    let r1 = Some(RoutingId::new("R1"));
    Plant {
        operations: vec![cut, weld],
        routings: vec![routing],
        orders: vec![
            Order::new("O1", r1.clone()),
            Order::new("O2", r1.clone()),
            Order::new("O3", r1),
            Order::new("O4", None),
        ],
        items: Vec::new(),
    }
}

fn scheduler() -> Scheduler {
    Scheduler::new(plant(), SchedulerConfig::default())
}

fn order(id: &str) -> OrderId {
    OrderId::new(id)
}

#[test]
fn generate_chains_nodes_with_buffers() {
    let mut s = scheduler();
    let items = s
        .generate(&order("O1"), t0(), GenerateOptions::default())
        .unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].sequence_index, 0);
    assert_eq!(items[0].planned_start, t0());
    assert_eq!(items[0].planned_end, t0() + secs(900));
    assert_eq!(items[0].buffer_seconds, 60);
    assert_eq!(items[0].description, "Auto generated for cut");

    assert_eq!(items[1].sequence_index, 1);
    assert_eq!(items[1].planned_start, t0() + secs(960));
    assert_eq!(items[1].planned_end, t0() + secs(2460));
    assert_eq!(items[1].buffer_seconds, 120);

    for item in &items {
        assert_eq!(item.planned_end, item.planned_start + item.duration().unwrap());
    }
    assert_eq!(items[0].release_at(), Some(items[1].planned_start));
    assert_eq!(s.plant().items.len(), 2);
}

#[test]
fn zero_override_produces_zero_length_step() {
    let mut s = scheduler();
    {
        let routing = s.plant_mut().find_routing_mut(&RoutingId::new("R1")).unwrap();
        for node in &mut routing.nodes {
            if node.node_number == "1" {
                node.tj = Some(0);
                node.tpz = Some(0);
            }
        }
    }
    let items = s
        .generate(&order("O1"), t0(), GenerateOptions::default())
        .unwrap();
    assert_eq!(items[0].planned_end, t0());
    assert_eq!(items[1].planned_start, t0() + secs(60));
}

#[test]
fn regeneration_needs_replace_and_respects_locks() {
    let mut s = scheduler();
    let first = s
        .generate(&order("O1"), t0(), GenerateOptions::default())
        .unwrap();

    let err = s
        .generate(&order("O1"), t0(), GenerateOptions::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let replace = GenerateOptions {
        replace_existing: true,
    };
    let second = s.generate(&order("O1"), t0() + secs(3600), replace).unwrap();
    assert_eq!(s.plant().items.len(), 2);
    assert_ne!(first[0].id, second[0].id);

    s.lock(&second[1].id).unwrap();
    let err = s.generate(&order("O1"), t0(), replace).unwrap_err();
    assert!(matches!(err, SchedError::Locked(id) if id == second[1].id));
    assert_eq!(s.plant().items.len(), 2);
}

#[test]
fn order_without_routing_is_a_configuration_error() {
    let mut s = scheduler();
    let err = s
        .generate(&order("O4"), t0(), GenerateOptions::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(s.plant().items.is_empty());
}

#[test]
fn generate_multi_sequential_and_parallel() {
    let mut s = scheduler();
    let orders = [order("O1"), order("O2")];
    let report = s.generate_multi(&orders, t0(), false, GenerateOptions::default());
    assert_eq!(report.outcome(), BatchOutcome::Complete);
    // O1 se termine à T0+2460, plus 120 s de tampon
    assert_eq!(report.succeeded[1].items[0].planned_start, t0() + secs(2580));

    let mut s = scheduler();
    let report = s.generate_multi(&orders, t0(), true, GenerateOptions::default());
    assert_eq!(report.succeeded[0].items[0].planned_start, t0());
    assert_eq!(report.succeeded[1].items[0].planned_start, t0());
}

#[test]
fn generate_multi_reports_each_failed_order() {
    let mut s = scheduler();
    let orders = [order("O1"), order("O4"), order("ghost"), order("O2")];
    let report = s.generate_multi(&orders, t0(), false, GenerateOptions::default());

    assert_eq!(report.outcome(), BatchOutcome::Partial);
    assert_eq!(report.succeeded.len(), 2);
    let failed: Vec<_> = report
        .failures
        .iter()
        .map(|f| (f.key.as_str(), f.error.kind()))
        .collect();
    assert_eq!(
        failed,
        vec![("O4", ErrorKind::Configuration), ("ghost", ErrorKind::NotFound)]
    );
    // un échec ne fait pas avancer le curseur
    assert_eq!(report.succeeded[1].items[0].planned_start, t0() + secs(2580));
}

#[test]
fn conflicts_on_workstation_and_same_component() {
    let mut s = scheduler();
    let opts = GenerateOptions::default();
    s.generate(&order("O1"), t0(), opts).unwrap();
    s.generate(&order("O2"), t0() + secs(600), opts).unwrap();

    let conflicts = s.check_window(t0(), Some(t0() + secs(86_400)));
    assert_eq!(conflicts.len(), 2);

    let ws = conflicts
        .iter()
        .find(|c| c.kind == ConflictKind::Workstation)
        .unwrap();
    assert_eq!(ws.resource, "WS1");
    assert_eq!(ws.overlap_start, t0() + secs(600));
    assert_eq!(ws.overlap_end, t0() + secs(900));

    let comp = conflicts
        .iter()
        .find(|c| c.kind == ConflictKind::SameComponent)
        .unwrap();
    assert_eq!(comp.resource, "n-weld");
    assert_eq!(comp.overlap_start, t0() + secs(1560));
    assert_eq!(comp.overlap_end, t0() + secs(2460));
}

fn bare_item(id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> ScheduleItem {
    ScheduleItem {
        id: ItemId::new(id),
        order: OrderId::new(format!("O-{id}")),
        node: NodeId::new("n-weld"),
        sequence_index: 0,
        planned_start: start,
        planned_end: end,
        duration_seconds: (end - start).num_seconds(),
        buffer_seconds: 0,
        locked: false,
        description: String::new(),
        workstation: None,
        revision: 0,
    }
}

#[test]
fn touching_items_do_not_conflict() {
    let s = scheduler();
    let h = |n: i64| t0() + Duration::hours(n);
    let items = vec![
        bare_item("A", h(2), h(3)),
        bare_item("B", t0() + Duration::minutes(150), t0() + Duration::minutes(210)),
        bare_item("C", t0() + Duration::minutes(210), h(4)),
    ];

    let conflicts = s.check(&items);
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].item_a.as_str(), "A");
    assert_eq!(conflicts[0].item_b.as_str(), "B");
    assert_eq!(conflicts[0].overlap_start, t0() + Duration::minutes(150));
    assert_eq!(conflicts[0].overlap_end, h(3));
}

#[test]
fn lock_blocks_reschedule_until_unlocked() {
    let mut s = scheduler();
    let items = s
        .generate(&order("O1"), t0(), GenerateOptions::default())
        .unwrap();
    let id = items[0].id.clone();
    let later = t0() + Duration::hours(5);

    s.lock(&id).unwrap();
    let err = s.reschedule(&id, later, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LockedItem);
    assert_eq!(s.plant().find_item(&id).unwrap().planned_start, t0());

    s.unlock(&id).unwrap();
    let moved = s.reschedule(&id, later, Some(1200)).unwrap();
    assert_eq!(moved.planned_start, later);
    assert_eq!(moved.planned_end, later + secs(1200 + 60));
    assert_eq!(moved.duration_seconds, 1200);

    let err = s.reschedule(&id, later, Some(0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let err = s.reschedule(&ItemId::new("ghost"), later, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn shift_order_leaves_locked_items_in_place() {
    let mut s = scheduler();
    let items = s
        .generate(&order("O1"), t0(), GenerateOptions::default())
        .unwrap();
    s.lock(&items[0].id).unwrap();

    let shifted = s.shift_order(&order("O1"), 3600).unwrap();
    assert_eq!(shifted, 1);
    let plant = s.plant();
    assert_eq!(plant.find_item(&items[0].id).unwrap().planned_start, t0());
    let second = plant.find_item(&items[1].id).unwrap();
    assert_eq!(second.planned_start, t0() + secs(960 + 3600));
    assert_eq!(second.planned_end, t0() + secs(2460 + 3600));

    assert_eq!(s.shift_order(&order("ghost"), 60).unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn lock_and_unlock_whole_order() {
    let mut s = scheduler();
    s.generate(&order("O1"), t0(), GenerateOptions::default())
        .unwrap();
    assert_eq!(s.lock_order(&order("O1")).unwrap(), 2);
    assert_eq!(s.lock_order(&order("O1")).unwrap(), 0);
    assert_eq!(s.order_summary(&order("O1")).locked_count, 2);
    assert_eq!(s.unlock_order(&order("O1")).unwrap(), 2);
}

#[test]
fn bulk_update_applies_valid_patches_and_reports_the_rest() {
    let mut s = scheduler();
    let items = s
        .generate(&order("O1"), t0(), GenerateOptions::default())
        .unwrap();

    let mut moved = ItemPatch::new(items[0].id.clone());
    moved.planned_start = Some(t0() + secs(100));
    moved.planned_end = Some(t0() + secs(700));
    moved.expected_revision = Some(0);

    let mut stale = ItemPatch::new(items[1].id.clone());
    stale.description = Some("late".into());
    stale.expected_revision = Some(5);

    let unknown = ItemPatch::new(ItemId::new("ghost"));

    let report = s.bulk_update(&[unknown, moved, stale]);
    assert_eq!(report.outcome(), BatchOutcome::Partial);
    assert_eq!(report.succeeded.len(), 1);
    let kinds: Vec<_> = report.failures.iter().map(|f| f.error.kind()).collect();
    assert_eq!(kinds, vec![ErrorKind::NotFound, ErrorKind::StaleRevision]);

    let updated = s.plant().find_item(&items[0].id).unwrap();
    assert_eq!(updated.duration_seconds, 600);
    assert_eq!(updated.buffer_seconds, 60);
    assert_eq!(updated.revision, 1);
    assert_eq!(s.plant().find_item(&items[1].id).unwrap().description, items[1].description);
}

#[test]
fn bulk_update_rejects_timing_on_locked_and_inverted_range() {
    let mut s = scheduler();
    let items = s
        .generate(&order("O1"), t0(), GenerateOptions::default())
        .unwrap();
    s.lock(&items[0].id).unwrap();

    let mut timing = ItemPatch::new(items[0].id.clone());
    timing.planned_start = Some(t0() + secs(10));
    let mut note = ItemPatch::new(items[0].id.clone());
    note.description = Some("checked by QA".into());
    let mut inverted = ItemPatch::new(items[1].id.clone());
    inverted.planned_end = Some(t0());

    let report = s.bulk_update(&[timing, note, inverted]);
    let kinds: Vec<_> = report.failures.iter().map(|f| f.error.kind()).collect();
    assert_eq!(kinds, vec![ErrorKind::LockedItem, ErrorKind::Validation]);
    assert_eq!(report.succeeded.len(), 1);
    assert_eq!(s.plant().find_item(&items[0].id).unwrap().description, "checked by QA");
}

#[test]
fn delete_by_order_removes_only_that_order() {
    let mut s = scheduler();
    let opts = GenerateOptions::default();
    s.generate(&order("O1"), t0(), opts).unwrap();
    s.generate(&order("O2"), t0(), opts).unwrap();

    assert_eq!(s.delete_by_order(&order("O1")).unwrap(), 2);
    assert_eq!(s.plant().items.len(), 2);
    assert_eq!(s.delete_by_order(&order("O1")).unwrap(), 0);
    assert_eq!(s.delete_by_order(&order("ghost")).unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn optimize_packs_by_deadline_and_skips_locked() {
    let mut s = scheduler();
    {
        let plant = s.plant_mut();
        plant.find_order_mut(&order("O1")).unwrap().deadline = Some(t0() + Duration::days(5));
        plant.find_order_mut(&order("O2")).unwrap().deadline = Some(t0() + Duration::days(2));
    }
    let opts = GenerateOptions::default();
    let o1 = s.generate(&order("O1"), t0() + Duration::days(1), opts).unwrap();
    let o2 = s.generate(&order("O2"), t0() + Duration::days(1), opts).unwrap();
    let o3 = s.generate(&order("O3"), t0() + Duration::days(3), opts).unwrap();
    s.lock(&o3[0].id).unwrap();

    let now = t0();
    let report = s
        .optimize(&[order("O1"), order("O2"), order("O3")], OptimizeMethod::Earliest, now)
        .unwrap();
    assert_eq!(report.skipped_locked, vec![o3[0].id.clone()]);
    assert_eq!(report.moved.len(), 5);
    assert_eq!(report.moved[0], o2[0].id);
    assert_eq!(report.moved[2], o1[0].id);

    let plant = s.plant();
    assert_eq!(plant.find_item(&o2[0].id).unwrap().planned_start, now);
    assert_eq!(plant.find_item(&o2[1].id).unwrap().planned_start, now + secs(960));
    assert_eq!(plant.find_item(&o1[0].id).unwrap().planned_start, now + secs(2580));
    // l'item verrouillé garde sa place
    assert_eq!(plant.find_item(&o3[0].id).unwrap().planned_start, o3[0].planned_start);

    let err = s
        .optimize(&[order("ghost")], OptimizeMethod::Latest, now)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn stats_and_order_summary() {
    let mut s = scheduler();
    let opts = GenerateOptions::default();
    let o1 = s.generate(&order("O1"), t0(), opts).unwrap();
    s.generate(&order("O2"), t0() - Duration::days(7), opts).unwrap();
    s.lock(&o1[0].id).unwrap();

    let stats = s.stats(t0() + Duration::hours(1));
    assert_eq!(stats.total, 4);
    assert_eq!(stats.locked, 1);
    assert_eq!(stats.unlocked, 3);
    assert_eq!(stats.today, 2);
    assert_eq!(stats.this_week, 2);
    assert_eq!(stats.overdue, 4);

    let summary = s.order_summary(&order("O1"));
    assert!(summary.has_schedule);
    assert_eq!(summary.earliest_start, Some(t0()));
    assert_eq!(summary.latest_end, Some(t0() + secs(2460)));
    assert_eq!(summary.total_duration_seconds, 2400);
    assert_eq!(summary.total_buffer_seconds, 180);
    assert_eq!(summary.item_count, 2);

    assert!(!s.order_summary(&order("O3")).has_schedule);
}

#[test]
fn items_filter_by_workstation() {
    let mut s = scheduler();
    s.generate(&order("O1"), t0(), GenerateOptions::default())
        .unwrap();
    let filter = mesplan::ItemFilter {
        workstation: Some(WorkstationId::new("WS1")),
        ..Default::default()
    };
    let items = s.items(&filter);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].sequence_index, 0);
}

#[test]
fn lock_is_reported_before_duration_validation() {
    let mut s = scheduler();
    let items = s
        .generate(&order("O1"), t0(), GenerateOptions::default())
        .unwrap();
    s.lock(&items[0].id).unwrap();
    let err = s.reschedule(&items[0].id, t0(), Some(0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LockedItem);
}

#[test]
fn out_of_range_offsets_are_rejected_without_changes() {
    let mut s = scheduler();
    let items = s
        .generate(&order("O1"), t0(), GenerateOptions::default())
        .unwrap();
    let before = s.plant().items.clone();

    for delta in [i64::MAX, 9_000_000_000_000, i64::MIN] {
        let err = s.shift_order(&order("O1"), delta).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
    let err = s.reschedule(&items[0].id, t0(), Some(i64::MAX)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(s.plant().items, before);

    let mut huge = ItemPatch::new(items[0].id.clone());
    huge.duration_seconds = Some(i64::MAX);
    let mut huge_buffer = ItemPatch::new(items[1].id.clone());
    huge_buffer.buffer_seconds = Some(9_000_000_000_000);
    let report = s.bulk_update(&[huge, huge_buffer]);
    assert_eq!(report.outcome(), BatchOutcome::Nothing);
    assert!(report
        .failures
        .iter()
        .all(|f| f.error.kind() == ErrorKind::Validation));
    assert_eq!(s.plant().items, before);
}

#[test]
fn shift_is_all_or_nothing() {
    let mut s = scheduler();
    let items = s
        .generate(&order("O1"), t0(), GenerateOptions::default())
        .unwrap();
    // le second item atteint la borne haute de chrono avant le premier
    let near_max = DateTime::<Utc>::MAX_UTC - secs(2000);
    s.reschedule(&items[0].id, near_max - secs(10_000), None).unwrap();
    s.reschedule(&items[1].id, near_max, None).unwrap();
    let before = s.plant().items.clone();

    let err = s.shift_order(&order("O1"), 1000).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(s.plant().items, before);
}

#[test]
fn generation_and_optimize_reject_out_of_range_times() {
    let mut s = scheduler();
    let err = s
        .generate(
            &order("O1"),
            DateTime::<Utc>::MAX_UTC - secs(100),
            GenerateOptions::default(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(s.plant().items.is_empty());

    let items = s
        .generate(&order("O1"), t0(), GenerateOptions::default())
        .unwrap();
    s.plant_mut().find_item_mut(&items[0].id).unwrap().duration_seconds = i64::MAX / 2;
    let before = s.plant().items.clone();
    let err = s
        .optimize(&[order("O1")], OptimizeMethod::Earliest, t0())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(s.plant().items, before);
}

#[test]
fn repeated_order_in_batch_is_reported_once() {
    let mut s = scheduler();
    let replace = GenerateOptions {
        replace_existing: true,
    };
    let report = s.generate_multi(&[order("O1"), order("O1")], t0(), false, replace);

    assert_eq!(report.outcome(), BatchOutcome::Partial);
    assert_eq!(report.succeeded.len(), 1);
    assert_eq!(report.failures[0].key, "O1");
    assert_eq!(report.failures[0].error.kind(), ErrorKind::Validation);
    for item in &report.succeeded[0].items {
        assert!(s.plant().find_item(&item.id).is_some());
    }
    assert_eq!(s.plant().items.len(), 2);
}

fn multi_digit_plant() -> Plant {
    let mut plant = plant();
    let mut routing = Routing::new("R2", ProductId::new("P2"));
    let mut short = RoutingNode::new("1.2", OperationId::new("cut"));
    short.id = NodeId::new("n-1.2");
    let mut long = RoutingNode::new("1.10", OperationId::new("weld"));
    long.id = NodeId::new("n-1.10");
    routing.nodes = vec![short, long];
    plant.routings.push(routing);
    plant
        .orders
        .push(Order::new("O5", Some(RoutingId::new("R2"))));
    plant
}

fn generated_node_order(config: SchedulerConfig) -> Vec<String> {
    let mut s = Scheduler::new(multi_digit_plant(), config);
    let mut items = s
        .generate(&order("O5"), t0(), GenerateOptions::default())
        .unwrap();
    items.sort_by_key(|i| i.sequence_index);
    items.iter().map(|i| i.node.as_str().to_string()).collect()
}

#[test]
fn node_order_follows_configured_comparator() {
    assert_eq!(
        generated_node_order(SchedulerConfig::default()),
        vec!["n-1.10", "n-1.2"]
    );

    let natural = SchedulerConfig {
        node_ordering: NodeOrdering::Natural,
        ..SchedulerConfig::default()
    };
    assert_eq!(generated_node_order(natural), vec!["n-1.2", "n-1.10"]);
}

#[test]
fn shared_production_line_conflicts() {
    let mut s = scheduler();
    for id in ["O1", "O2"] {
        s.plant_mut().find_order_mut(&order(id)).unwrap().production_line =
            Some(ProductionLineId::new("L1"));
    }
    let h = |m: i64| t0() + Duration::minutes(m);
    let mut a = bare_item("A", h(120), h(180));
    a.order = order("O1");
    a.node = NodeId::new("n-a");
    a.workstation = Some(WorkstationId::new("WS1"));
    let mut b = bare_item("B", h(150), h(210));
    b.order = order("O2");
    b.node = NodeId::new("n-b");
    b.workstation = Some(WorkstationId::new("WS2"));

    let conflicts = s.check(&[a, b]);
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].kind, ConflictKind::ProductionLine);
    assert_eq!(conflicts[0].resource, "L1");
    assert_eq!(conflicts[0].overlap_start, h(150));
    assert_eq!(conflicts[0].overlap_end, h(180));
}
