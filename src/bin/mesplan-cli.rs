#![forbid(unsafe_code)]
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use mesplan::{
    io,
    model::{ItemId, OrderId, OrderState, RoutingId, RoutingState, WorkstationId},
    routing::{self, RoutingTree},
    scheduler::{BatchOutcome, BatchReport, GenerateOptions, ItemFilter, ItemPatch, OptimizeMethod, Scheduler},
    storage::{JsonStorage, Storage},
    SchedulerConfig,
};
#[cfg(feature = "logging")]
use tracing_subscriber::{fmt::Subscriber, EnvFilter};

/// CLI de planification d'atelier (sans base de données)
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Active les logs (feature `logging`)
    #[arg(long, global = true)]
    log: bool,

    /// Fichier JSON du plant (données + planning)
    #[arg(long, global = true, default_value = "plant.json")]
    plant: String,

    /// Fichier JSON de configuration (optionnel)
    #[arg(long, global = true, default_value = "mesplan.json")]
    config: String,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Importer des opérations depuis un CSV
    ImportOperations {
        #[arg(long)]
        csv: String,
    },

    /// Importer des nœuds de gamme depuis un CSV
    ImportRouting {
        #[arg(long)]
        csv: String,
    },

    /// Importer des ordres depuis un CSV
    ImportOrders {
        #[arg(long)]
        csv: String,
    },

    /// Générer le planning d'un ordre
    Generate {
        #[arg(long)]
        order: String,
        /// RFC3339 UTC (défaut : maintenant)
        #[arg(long)]
        start: Option<String>,
        /// Remplacer le planning existant
        #[arg(long)]
        replace: bool,
    },

    /// Générer le planning de plusieurs ordres
    GenerateMulti {
        /// liste "order1,order2,..."
        #[arg(long)]
        orders: String,
        #[arg(long)]
        start: Option<String>,
        /// Chaque ordre démarre à `start` (sinon bout à bout)
        #[arg(long)]
        parallel: bool,
        #[arg(long)]
        replace: bool,
    },

    /// Vérifier les conflits sur une période
    Check {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        /// Export CSV des conflits (optionnel)
        #[arg(long)]
        report: Option<String>,
    },

    /// Replanifier un item
    Reschedule {
        #[arg(long)]
        item: String,
        #[arg(long)]
        start: String,
        /// Nouvelle durée en secondes
        #[arg(long)]
        duration: Option<i64>,
    },

    /// Verrouiller un item
    Lock {
        #[arg(long)]
        item: String,
    },

    /// Déverrouiller un item
    Unlock {
        #[arg(long)]
        item: String,
    },

    /// Verrouiller tous les items d'un ordre
    LockOrder {
        #[arg(long)]
        order: String,
    },

    /// Déverrouiller tous les items d'un ordre
    UnlockOrder {
        #[arg(long)]
        order: String,
    },

    /// Décaler les items non verrouillés d'un ordre
    Shift {
        #[arg(long)]
        order: String,
        /// Décalage en secondes (négatif = avancer)
        #[arg(long, allow_hyphen_values = true)]
        delta: i64,
    },

    /// Appliquer des patchs depuis un fichier JSON (liste d'objets)
    BulkUpdate {
        #[arg(long)]
        json: String,
    },

    /// Supprimer le planning d'un ordre
    DeleteOrder {
        #[arg(long)]
        order: String,
    },

    /// Re-tasser les items des ordres donnés à partir de maintenant
    Optimize {
        #[arg(long)]
        orders: String,
        /// earliest | latest | balanced
        #[arg(long, default_value = "earliest")]
        method: OptimizeMethod,
    },

    /// Lister et optionnellement exporter
    List {
        #[arg(long)]
        orders: Option<String>,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        #[arg(long)]
        workstation: Option<String>,
        #[arg(long)]
        out_json: Option<String>,
        #[arg(long)]
        out_csv: Option<String>,
    },

    /// Statistiques du planning
    Stats,

    /// Synthèse d'un ordre
    Summary {
        #[arg(long)]
        order: String,
    },

    /// Arbre et totaux d'une gamme
    Tree {
        #[arg(long)]
        routing: String,
    },

    /// Désigner la gamme maître de son produit
    SetMaster {
        #[arg(long)]
        routing: String,
    },

    /// Changer l'état d'une gamme
    RoutingState {
        #[arg(long)]
        routing: String,
        #[arg(long)]
        state: RoutingState,
    },

    /// Changer l'état d'un ordre
    OrderState {
        #[arg(long)]
        order: String,
        #[arg(long)]
        state: OrderState,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    #[cfg(feature = "logging")]
    if cli.log {
        let _ = Subscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    }

    let config = SchedulerConfig::load(&cli.config)?;
    let storage = JsonStorage::open(&cli.plant)?;
    let mut scheduler = Scheduler::new(storage.load_or_default()?, config);

    let code = match cli.cmd {
        Commands::ImportOperations { csv } => {
            let ops = io::import_operations_csv(csv)?;
            println!("imported {} operation(s)", ops.len());
            scheduler.plant_mut().operations.extend(ops);
            storage.save(scheduler.plant())?;
            0
        }
        Commands::ImportRouting { csv } => {
            let count = io::import_routing_nodes_csv(csv, scheduler.plant_mut())?;
            println!("imported {count} routing node(s)");
            storage.save(scheduler.plant())?;
            0
        }
        Commands::ImportOrders { csv } => {
            let orders = io::import_orders_csv(csv)?;
            println!("imported {} order(s)", orders.len());
            scheduler.plant_mut().orders.extend(orders);
            storage.save(scheduler.plant())?;
            0
        }
        Commands::Generate {
            order,
            start,
            replace,
        } => {
            let start = parse_time_or_now(start.as_deref())?;
            let opts = GenerateOptions {
                replace_existing: replace,
            };
            let items = scheduler.generate(&OrderId::new(&order), start, opts)?;
            for item in &items {
                print_item(item);
            }
            storage.save(scheduler.plant())?;
            0
        }
        Commands::GenerateMulti {
            orders,
            start,
            parallel,
            replace,
        } => {
            let start = parse_time_or_now(start.as_deref())?;
            let opts = GenerateOptions {
                replace_existing: replace,
            };
            let report = scheduler.generate_multi(&order_ids(&orders), start, parallel, opts);
            for order in &report.succeeded {
                println!("{}: {} item(s)", order.order, order.items.len());
            }
            storage.save(scheduler.plant())?;
            report_code(&report)
        }
        Commands::Check { from, to, report } => {
            let from = parse_time_or_now(from.as_deref())?;
            let to = to.as_deref().map(parse_time).transpose()?;
            let conflicts = scheduler.check_window(from, to);
            if conflicts.is_empty() {
                println!("OK: no conflicts");
                0
            } else {
                eprintln!("Found {} conflict(s)", conflicts.len());
                for c in &conflicts {
                    println!(
                        "{} | {} | {} ↔ {} | {} → {}",
                        c.kind.as_str(),
                        c.resource,
                        c.item_a,
                        c.item_b,
                        c.overlap_start.to_rfc3339(),
                        c.overlap_end.to_rfc3339()
                    );
                }
                if let Some(path) = report {
                    io::export_conflicts_csv(path, &conflicts)?;
                }
                // Code 2 = WARNING/INCOMPLETE
                2
            }
        }
        Commands::Reschedule {
            item,
            start,
            duration,
        } => {
            let start = parse_time(&start)?;
            let item = scheduler.reschedule(&ItemId::new(item), start, duration)?;
            print_item(&item);
            storage.save(scheduler.plant())?;
            0
        }
        Commands::Lock { item } => {
            scheduler.lock(&ItemId::new(item))?;
            storage.save(scheduler.plant())?;
            0
        }
        Commands::Unlock { item } => {
            scheduler.unlock(&ItemId::new(item))?;
            storage.save(scheduler.plant())?;
            0
        }
        Commands::LockOrder { order } => {
            let count = scheduler.lock_order(&OrderId::new(order))?;
            println!("locked {count} item(s)");
            storage.save(scheduler.plant())?;
            0
        }
        Commands::UnlockOrder { order } => {
            let count = scheduler.unlock_order(&OrderId::new(order))?;
            println!("unlocked {count} item(s)");
            storage.save(scheduler.plant())?;
            0
        }
        Commands::Shift { order, delta } => {
            let count = scheduler.shift_order(&OrderId::new(order), delta)?;
            println!("shifted {count} item(s)");
            storage.save(scheduler.plant())?;
            0
        }
        Commands::BulkUpdate { json } => {
            let data = std::fs::read(&json).with_context(|| format!("reading {json}"))?;
            let patches: Vec<ItemPatch> =
                serde_json::from_slice(&data).with_context(|| "parsing patch list")?;
            let report = scheduler.bulk_update(&patches);
            println!("updated {} item(s)", report.succeeded.len());
            storage.save(scheduler.plant())?;
            report_code(&report)
        }
        Commands::DeleteOrder { order } => {
            let deleted = scheduler.delete_by_order(&OrderId::new(order))?;
            println!("deleted {deleted} item(s)");
            storage.save(scheduler.plant())?;
            0
        }
        Commands::Optimize { orders, method } => {
            let report = scheduler.optimize(&order_ids(&orders), method, Utc::now())?;
            println!(
                "moved {} item(s), kept {} locked",
                report.moved.len(),
                report.skipped_locked.len()
            );
            storage.save(scheduler.plant())?;
            0
        }
        Commands::List {
            orders,
            from,
            to,
            workstation,
            out_json,
            out_csv,
        } => {
            let filter = ItemFilter {
                orders: orders.as_deref().map(order_ids),
                from: from.as_deref().map(parse_time).transpose()?,
                to: to.as_deref().map(parse_time).transpose()?,
                workstation: workstation.map(WorkstationId::new),
                node: None,
            };
            let items = scheduler.items(&filter);
            if let Some(path) = out_json {
                io::export_plant_json(path, scheduler.plant())?;
            }
            if let Some(path) = out_csv {
                io::export_items_csv(path, &items)?;
            }
            for item in &items {
                print_item(item);
            }
            0
        }
        Commands::Stats => {
            let stats = scheduler.stats(Utc::now());
            println!("{}", serde_json::to_string_pretty(&stats)?);
            0
        }
        Commands::Summary { order } => {
            let summary = scheduler.order_summary(&OrderId::new(order));
            println!("{}", serde_json::to_string_pretty(&summary)?);
            0
        }
        Commands::Tree { routing } => {
            let tree = RoutingTree::from_plant(scheduler.plant(), &RoutingId::new(routing))?;
            for node in tree.tree(scheduler.config().node_ordering)? {
                println!(
                    "{} (parent {}) | {} | tj={} tpz={} next={}",
                    node.node_number,
                    node.parent_node_number.as_deref().unwrap_or("-"),
                    node.operation,
                    node.tj,
                    node.tpz,
                    node.time_next_operation
                );
            }
            println!("{}", serde_json::to_string_pretty(&tree.build_summary()?)?);
            0
        }
        Commands::SetMaster { routing } => {
            routing::set_master(scheduler.plant_mut(), &RoutingId::new(routing))?;
            storage.save(scheduler.plant())?;
            0
        }
        Commands::RoutingState { routing, state } => {
            routing::change_state(scheduler.plant_mut(), &RoutingId::new(routing), state)?;
            storage.save(scheduler.plant())?;
            0
        }
        Commands::OrderState { order, state } => {
            scheduler.change_order_state(&OrderId::new(order), state)?;
            storage.save(scheduler.plant())?;
            0
        }
    };

    std::process::exit(code);
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse()
        .with_context(|| format!("expected RFC3339 timestamp, got {raw}"))
}

fn parse_time_or_now(raw: Option<&str>) -> Result<DateTime<Utc>> {
    raw.map_or_else(|| Ok(Utc::now()), parse_time)
}

fn order_ids(list: &str) -> Vec<OrderId> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(OrderId::new)
        .collect()
}

fn print_item(item: &mesplan::ScheduleItem) {
    println!(
        "{} | {} #{} | {} → {} | {}s +{}s{}",
        item.id,
        item.order,
        item.sequence_index,
        item.planned_start.to_rfc3339(),
        item.planned_end.to_rfc3339(),
        item.duration_seconds,
        item.buffer_seconds,
        if item.locked { " | locked" } else { "" }
    );
}

/// Code 2 = lot partiel ou vide de succès.
fn report_code<T>(report: &BatchReport<T>) -> i32 {
    for failure in &report.failures {
        eprintln!(
            "skipped {}: [{}] {}",
            failure.key,
            failure.error.kind().as_str(),
            failure.error
        );
    }
    match report.outcome() {
        BatchOutcome::Complete | BatchOutcome::Empty => 0,
        BatchOutcome::Partial | BatchOutcome::Nothing => 2,
    }
}
