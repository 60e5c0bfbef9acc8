use crate::model::{
    NodeId, Operation, OperationId, Order, Plant, ProductId, ProductionLineId, Routing,
    RoutingId, RoutingNode, ScheduleItem, WorkstationId,
};
use crate::scheduler::Conflict;
use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Import d'opérations: header `id,number,name,tj,tpz,time_next_operation[,workstations]`
/// (postes séparés par `;`).
pub fn import_operations_csv<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<Operation>> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_path(path)?;
    let mut out = Vec::new();
    for rec in rdr.records() {
        let rec = rec?;
        let id = required(&rec, 0, "id")?;
        let mut op = Operation::new(
            id,
            parse_seconds(required(&rec, 3, "tj")?).context("tj")?,
            parse_seconds(required(&rec, 4, "tpz")?).context("tpz")?,
            parse_seconds(required(&rec, 5, "time_next_operation")?)
                .context("time_next_operation")?,
        );
        let number = field(&rec, 1);
        if !number.is_empty() {
            op.number = number.to_string();
        }
        op.name = field(&rec, 2).to_string();
        op.workstation_ids = field(&rec, 6)
            .split(';')
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .map(WorkstationId::new)
            .collect();
        out.push(op);
    }
    Ok(out)
}

/// Import de nœuds de gamme:
/// header `routing,product,node_id,node_number,operation,parent,priority,tj,tpz,time_next_operation`.
/// Une surcharge vide vaut « pas de surcharge », `0` est un zéro explicite.
pub fn import_routing_nodes_csv<P: AsRef<Path>>(
    path: P,
    plant: &mut Plant,
) -> anyhow::Result<usize> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_path(path)?;
    let mut count = 0;
    for rec in rdr.records() {
        let rec = rec?;
        let routing_id = RoutingId::new(required(&rec, 0, "routing")?);
        let product = ProductId::new(required(&rec, 1, "product")?);
        let node_number = required(&rec, 3, "node_number")?;

        let mut node = RoutingNode::new(node_number, OperationId::new(required(&rec, 4, "operation")?));
        let node_id = field(&rec, 2);
        if !node_id.is_empty() {
            node.id = NodeId::new(node_id);
        }
        let parent = field(&rec, 5);
        if !parent.is_empty() {
            node.parent = Some(NodeId::new(parent));
        }
        let priority = field(&rec, 6);
        if !priority.is_empty() {
            node.priority = priority
                .parse()
                .with_context(|| format!("invalid priority for node {node_number}"))?;
        }
        node.tj = parse_override(field(&rec, 7)).context("tj override")?;
        node.tpz = parse_override(field(&rec, 8)).context("tpz override")?;
        node.time_next_operation =
            parse_override(field(&rec, 9)).context("time_next_operation override")?;

        if plant.find_routing(&routing_id).is_none() {
            plant
                .routings
                .push(Routing::new(routing_id.as_str(), product.clone()));
        }
        let routing = plant
            .find_routing_mut(&routing_id)
            .context("routing vanished during import")?;
        if routing.product != product {
            bail!(
                "routing {routing_id} belongs to product {}, not {product}",
                routing.product
            );
        }
        routing.nodes.push(node);
        count += 1;
    }
    Ok(count)
}

/// Import d'ordres: header `id,routing,deadline,priority,production_line[,planned_quantity]`
pub fn import_orders_csv<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<Order>> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_path(path)?;
    let mut out = Vec::new();
    for rec in rdr.records() {
        let rec = rec?;
        let id = required(&rec, 0, "id")?;
        let routing = Some(field(&rec, 1))
            .filter(|s| !s.is_empty())
            .map(RoutingId::new);
        let mut order = Order::new(id, routing);

        let deadline = field(&rec, 2);
        if !deadline.is_empty() {
            let deadline: DateTime<Utc> = deadline
                .parse()
                .with_context(|| format!("deadline RFC3339 for order {id}"))?;
            order.deadline = Some(deadline);
        }
        let priority = field(&rec, 3);
        if !priority.is_empty() {
            order.priority = priority
                .parse()
                .with_context(|| format!("invalid priority for order {id}"))?;
        }
        let line = field(&rec, 4);
        if !line.is_empty() {
            order.production_line = Some(ProductionLineId::new(line));
        }
        let quantity = field(&rec, 5);
        if !quantity.is_empty() {
            order.planned_quantity = quantity
                .parse()
                .with_context(|| format!("invalid planned_quantity for order {id}"))?;
        }
        out.push(order);
    }
    Ok(out)
}

fn field(rec: &StringRecord, idx: usize) -> &str {
    rec.get(idx).map(str::trim).unwrap_or("")
}

fn required<'r>(rec: &'r StringRecord, idx: usize, name: &str) -> anyhow::Result<&'r str> {
    let value = field(rec, idx);
    if value.is_empty() {
        bail!("missing {name}");
    }
    Ok(value)
}

fn parse_seconds(raw: &str) -> anyhow::Result<u32> {
    raw.parse()
        .with_context(|| format!("expected non-negative seconds, got {raw:?}"))
}

fn parse_override(raw: &str) -> anyhow::Result<Option<u32>> {
    if raw.is_empty() {
        return Ok(None);
    }
    parse_seconds(raw).map(Some)
}

/// Export JSON du plant (jolie mise en forme)
pub fn export_plant_json<P: AsRef<Path>>(path: P, plant: &Plant) -> anyhow::Result<()> {
    let s = serde_json::to_string_pretty(plant)?;
    fs::write(path, s)?;
    Ok(())
}

/// Export CSV des items:
/// header `id,order,node,sequence_index,planned_start,planned_end,duration_seconds,buffer_seconds,locked,description`
pub fn export_items_csv<P: AsRef<Path>>(path: P, items: &[&ScheduleItem]) -> anyhow::Result<()> {
    let mut w = WriterBuilder::new().has_headers(true).from_path(path)?;
    w.write_record([
        "id",
        "order",
        "node",
        "sequence_index",
        "planned_start",
        "planned_end",
        "duration_seconds",
        "buffer_seconds",
        "locked",
        "description",
    ])?;
    let mut seq = itoa::Buffer::new();
    let mut duration = itoa::Buffer::new();
    let mut buffer = itoa::Buffer::new();
    for item in items {
        let start = item.planned_start.to_rfc3339();
        let end = item.planned_end.to_rfc3339();
        w.write_record([
            item.id.as_str(),
            item.order.as_str(),
            item.node.as_str(),
            seq.format(item.sequence_index),
            start.as_str(),
            end.as_str(),
            duration.format(item.duration_seconds),
            buffer.format(item.buffer_seconds),
            if item.locked { "true" } else { "false" },
            item.description.as_str(),
        ])?;
    }
    w.flush()?;
    Ok(())
}

/// Rapport CSV des conflits: header `kind,resource,item_a,item_b,order_a,order_b,overlap_start,overlap_end`
pub fn write_conflicts_csv<W: Write>(writer: W, conflicts: &[Conflict]) -> anyhow::Result<()> {
    let mut w = WriterBuilder::new().has_headers(true).from_writer(writer);
    w.write_record([
        "kind",
        "resource",
        "item_a",
        "item_b",
        "order_a",
        "order_b",
        "overlap_start",
        "overlap_end",
    ])?;
    for c in conflicts {
        let start = c.overlap_start.to_rfc3339();
        let end = c.overlap_end.to_rfc3339();
        w.write_record([
            c.kind.as_str(),
            c.resource.as_str(),
            c.item_a.as_str(),
            c.item_b.as_str(),
            c.order_a.as_str(),
            c.order_b.as_str(),
            start.as_str(),
            end.as_str(),
        ])?;
    }
    w.flush()?;
    Ok(())
}

pub fn export_conflicts_csv<P: AsRef<Path>>(path: P, conflicts: &[Conflict]) -> anyhow::Result<()> {
    let file = fs::File::create(path.as_ref())
        .with_context(|| format!("creating {}", path.as_ref().display()))?;
    write_conflicts_csv(file, conflicts)
}
