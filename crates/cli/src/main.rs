//! GourdWatch CLI - gourd pollination monitoring.

mod config;

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand};
use gourdwatch_aggregation::{Breakdown, Dimension, RateRow, TimeBucket};
use gourdwatch_core::{
    parse_date, GourdType, GourdTypeId, GourdVariety, ImageRef, MonitoringRecord, NewRecord,
    RecordFilter, RecordId, RecordPatch, RecordStatus, Session, Taxonomy, TaxonomyLookup, Time, VarietyId,
};
use gourdwatch_monitor::{BasicMonitorManager, MonitorManager};
use gourdwatch_report::{BasicReportService, ReportService};
use gourdwatch_storage::{JsonStorage, TaxonomyStore};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "gourdwatch")]
#[command(about = "Gourd pollination monitoring", long_about = None)]
struct Cli {
    /// Storage directory
    #[arg(long, global = true, default_value = ".gourdwatch")]
    storage: PathBuf,

    /// Act as this owner
    #[arg(long, global = true)]
    owner: Option<String>,

    /// Pretend today is this date (YYYY-MM-DD)
    #[arg(long, global = true, value_parser = parse_date_arg)]
    today: Option<NaiveDate>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a pollination
    Create {
        /// Gourd type name or id
        #[arg(long = "type")]
        gourd_type: String,
        /// Variety name or id
        #[arg(long)]
        variety: Option<String>,
        /// Plot number
        #[arg(long)]
        plot: Option<String>,
        /// Pollination date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date_arg)]
        date: NaiveDate,
        /// Pollinated-flower image reference, repeatable
        #[arg(long = "image", required = true)]
        images: Vec<String>,
    },
    /// Add a pollinated-flower image
    Pollinated { id: String, image: String },
    /// Add a harvested-fruit image
    Harvested { id: String, image: String },
    /// Finalize a record if it is ready
    Finalize { id: String },
    /// Move the pollination date
    Reschedule {
        id: String,
        #[arg(value_parser = parse_date_arg)]
        date: NaiveDate,
    },
    /// Change plot, type or variety
    Edit {
        id: String,
        #[arg(long = "type")]
        gourd_type: Option<String>,
        #[arg(long)]
        variety: Option<String>,
        /// New plot number, empty to clear
        #[arg(long)]
        plot: Option<String>,
    },
    /// Show a record
    Show { id: String },
    /// Delete a record
    Delete { id: String },
    /// List records
    List {
        #[arg(long)]
        plot: Option<String>,
        #[arg(long = "type")]
        gourd_type: Option<String>,
        /// Only records classified with this status today
        #[arg(long, value_parser = parse_status)]
        status: Option<RecordStatus>,
    },
    /// Harvest reminders due today
    Due {
        /// Mark the listed reminders as sent
        #[arg(long)]
        ack: bool,
    },
    /// Finalize every record that is ready
    Refresh,
    /// Headline numbers
    Summary {
        /// Include every owner
        #[arg(long)]
        all: bool,
    },
    /// Weekly breakdown
    Weekly {
        /// Dimensions, e.g. plot,type,variety
        #[arg(long, value_delimiter = ',', value_parser = parse_dimension)]
        by: Vec<Dimension>,
        #[arg(long)]
        all: bool,
    },
    /// Monthly breakdown
    Monthly {
        #[arg(long, value_delimiter = ',', value_parser = parse_dimension)]
        by: Vec<Dimension>,
        #[arg(long)]
        all: bool,
    },
    /// Success-rate table
    Rates {
        #[arg(long, value_delimiter = ',', value_parser = parse_dimension)]
        by: Vec<Dimension>,
        #[arg(long)]
        all: bool,
    },
    /// Full dashboard snapshot as JSON
    Snapshot {
        #[arg(long)]
        all: bool,
    },
    /// Manage gourd types
    #[command(subcommand)]
    Type(TypeCommand),
    /// Manage varieties
    #[command(subcommand)]
    Variety(VarietyCommand),
}

#[derive(Subcommand)]
enum TypeCommand {
    /// Add a gourd type
    Add {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List gourd types
    List,
}

#[derive(Subcommand)]
enum VarietyCommand {
    /// Add a variety of a gourd type
    Add {
        name: String,
        #[arg(long = "type")]
        gourd_type: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List varieties
    List {
        #[arg(long = "type")]
        gourd_type: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::load(&cli.storage).await?;
    let mut storage = JsonStorage::new(&cli.storage)
        .await?
        .with_concurrency(config.concurrency);
    debug!("Opened storage at {}", storage.root().display());

    let (today, now) = clock(cli.today);
    let owner = cli.owner.clone().or_else(|| config.owner.clone());
    let session = || -> Result<Session> {
        owner
            .clone()
            .map(Session::new)
            .ok_or_else(|| anyhow!("no owner: pass --owner or set \"owner\" in config.json"))
    };
    let scope = |all: bool| -> Result<RecordFilter> {
        Ok(if all {
            RecordFilter::default()
        } else {
            RecordFilter::owned_by(session()?.owner_id)
        })
    };

    let taxonomy = storage.taxonomy().await?;
    let monitor = BasicMonitorManager::new(storage.clone());
    let reports = BasicReportService::new(storage.clone()).with_config(config.report_config());
    let out = Output { json: cli.json };

    match cli.command {
        Commands::Create { gourd_type, variety, plot, date, images } => {
            let new = NewRecord {
                gourd_type: resolve_type(&taxonomy, &gourd_type)?,
                variety: variety.map(|v| resolve_variety(&taxonomy, &v)).transpose()?,
                plot_no: plot,
                date_of_pollination: date,
                pollinated_flower_images: images.into_iter().map(ImageRef::new).collect(),
            };
            let record = monitor.create_record(&session()?, new, today, now).await?;
            out.record(&record, &taxonomy)?;
        }
        Commands::Pollinated { id, image } => {
            let record = monitor
                .add_pollinated_image(&session()?, parse_id(&id)?, ImageRef::new(image), now)
                .await?;
            out.record(&record, &taxonomy)?;
        }
        Commands::Harvested { id, image } => {
            let record = monitor
                .add_harvested_image(&session()?, parse_id(&id)?, ImageRef::new(image), now)
                .await?;
            out.record(&record, &taxonomy)?;
        }
        Commands::Finalize { id } => {
            let record = monitor.finalize(&session()?, parse_id(&id)?, now).await?;
            if !record.is_finalized() {
                eprintln!("Record {} is not ready to finalize", record.id);
            }
            out.record(&record, &taxonomy)?;
        }
        Commands::Reschedule { id, date } => {
            let record = monitor.reschedule(&session()?, parse_id(&id)?, date, now).await?;
            out.record(&record, &taxonomy)?;
        }
        Commands::Edit { id, gourd_type, variety, plot } => {
            let patch = RecordPatch {
                gourd_type: gourd_type.map(|t| resolve_type(&taxonomy, &t)).transpose()?,
                variety: variety
                    .map(|v| resolve_variety(&taxonomy, &v).map(Some))
                    .transpose()?,
                plot_no: plot.map(Some),
                date_of_pollination: None,
            };
            let record = monitor
                .update_details(&session()?, parse_id(&id)?, patch, now)
                .await?;
            out.record(&record, &taxonomy)?;
        }
        Commands::Show { id } => {
            let record = monitor.get_record(&session()?, parse_id(&id)?).await?;
            out.record(&record, &taxonomy)?;
        }
        Commands::Delete { id } => {
            let id = parse_id(&id)?;
            monitor.delete_record(&session()?, id).await?;
            println!("Deleted {}", id);
        }
        Commands::List { plot, gourd_type, status } => {
            let filter = RecordFilter {
                plot_no: plot,
                gourd_type: gourd_type.map(|t| resolve_type(&taxonomy, &t)).transpose()?,
                ..Default::default()
            };
            let mut records = monitor.list_records(&session()?, filter).await?;
            if let Some(status) = status {
                records = gourdwatch_report::with_status(&records, status, today)
                    .into_iter()
                    .cloned()
                    .collect();
            }
            if out.json {
                return out.print_json(&records);
            }
            println!("Records ({})", records.len());
            for record in &records {
                println!(
                    "  {} | {} | {:<11} | {} | {}/{}",
                    record.id,
                    record.date_of_pollination,
                    gourdwatch_core::classify_status(record, today).as_str(),
                    record.plot_no.as_deref().unwrap_or("-"),
                    record.harvested_count(),
                    record.pollinated_count(),
                );
            }
        }
        Commands::Due { ack } => {
            let session = session()?;
            let due = monitor.notifications_due(&session, today).await?;
            if out.json {
                out.print_json(&due)?;
            } else {
                println!("Harvest due {} ({})", today, due.len());
                for (record, _) in &due {
                    println!(
                        "  {} | {} | {}",
                        record.id,
                        record.plot_no.as_deref().unwrap_or("-"),
                        type_name(&taxonomy, &record.gourd_type),
                    );
                }
            }
            if ack {
                for (record, date) in &due {
                    monitor.acknowledge_notification(&session, record.id, *date, now).await?;
                }
            }
        }
        Commands::Refresh => {
            let transitions = monitor.refresh(&session()?, now).await?;
            if out.json {
                return out.print_json(&transitions);
            }
            for t in &transitions {
                println!("  {} | {} -> {}", t.record, t.from, t.to);
            }
            println!("Finalized {} records", transitions.len());
        }
        Commands::Summary { all } => {
            let summary = reports.summary(&scope(all)?, today).await?;
            if out.json {
                return out.print_json(&summary);
            }
            println!("Records:     {}", summary.total);
            println!("Pollinated:  {}", summary.total_pollinated);
            println!("Harvested:   {}", summary.total_harvested);
            println!("Failed:      {}", summary.failed_count);
            println!("Success:     {:.2}%", summary.success_rate);
        }
        Commands::Weekly { by, all } => {
            let breakdowns = reports.breakdown(&scope(all)?, &by, TimeBucket::Week, today).await?;
            out.breakdowns(&breakdowns)?;
        }
        Commands::Monthly { by, all } => {
            let breakdowns = reports.breakdown(&scope(all)?, &by, TimeBucket::Month, today).await?;
            out.breakdowns(&breakdowns)?;
        }
        Commands::Rates { by, all } => {
            let rows = reports.success_rates(&scope(all)?, &by, today).await?;
            out.rates(&rows)?;
        }
        Commands::Snapshot { all } => {
            let snapshot = reports.snapshot(&scope(all)?, today).await?;
            out.print_json(&snapshot)?;
        }
        Commands::Type(TypeCommand::Add { name, description }) => {
            let gourd_type = GourdType::new(name, description);
            storage.save_gourd_type(&gourd_type).await?;
            println!("Added gourd type: {} - {}", gourd_type.id, gourd_type.name);
        }
        Commands::Type(TypeCommand::List) => {
            let types = storage.list_gourd_types().await?;
            if out.json {
                return out.print_json(&types);
            }
            println!("Gourd types ({})", types.len());
            for t in &types {
                println!("  {} | {}", t.id, t.name);
            }
        }
        Commands::Variety(VarietyCommand::Add { name, gourd_type, description }) => {
            let type_id = resolve_type(&taxonomy, &gourd_type)?;
            let variety = GourdVariety::new(name, description, type_id);
            storage.save_variety(&variety).await?;
            println!("Added variety: {} - {}", variety.id, variety.name);
        }
        Commands::Variety(VarietyCommand::List { gourd_type }) => {
            let varieties: Vec<GourdVariety> = match gourd_type {
                Some(t) => {
                    let type_id = resolve_type(&taxonomy, &t)?;
                    taxonomy.varieties_of(&type_id).into_iter().cloned().collect()
                }
                None => storage.list_varieties().await?,
            };
            if out.json {
                return out.print_json(&varieties);
            }
            println!("Varieties ({})", varieties.len());
            for v in &varieties {
                println!("  {} | {} | {}", v.id, v.name, type_name(&taxonomy, &v.gourd_type));
            }
        }
    }

    Ok(())
}

/// Today's date and the current instant, honouring `--today`.
fn clock(today: Option<NaiveDate>) -> (NaiveDate, Time) {
    let now = Utc::now();
    match today {
        Some(day) => (day, Utc.from_utc_datetime(&day.and_time(now.time()))),
        None => (now.date_naive(), now),
    }
}

fn parse_date_arg(s: &str) -> std::result::Result<NaiveDate, String> {
    parse_date(s).map_err(|e| e.to_string())
}

fn parse_dimension(s: &str) -> std::result::Result<Dimension, String> {
    Dimension::parse(s).ok_or_else(|| format!("unknown dimension {s:?} (plot, type, variety)"))
}

fn parse_status(s: &str) -> std::result::Result<RecordStatus, String> {
    RecordStatus::parse(s).ok_or_else(|| {
        format!("unknown status {s:?} (pending, in-progress, completed, failed)")
    })
}

fn parse_id(s: &str) -> Result<RecordId> {
    s.parse().map_err(|_| anyhow!("Invalid record ID: {s}"))
}

/// Resolve a gourd type by id or case-insensitive name.
fn resolve_type(taxonomy: &Taxonomy, value: &str) -> Result<GourdTypeId> {
    if let Ok(id) = value.parse::<GourdTypeId>() {
        if taxonomy.gourd_type(&id).is_some() {
            return Ok(id);
        }
    }
    taxonomy
        .gourd_types()
        .find(|t| t.name.eq_ignore_ascii_case(value))
        .map(|t| t.id)
        .with_context(|| format!("unknown gourd type {value:?}; add it with `gourdwatch type add`"))
}

/// Resolve a variety by id or case-insensitive name.
fn resolve_variety(taxonomy: &Taxonomy, value: &str) -> Result<VarietyId> {
    if let Ok(id) = value.parse::<VarietyId>() {
        if taxonomy.variety(&id).is_some() {
            return Ok(id);
        }
    }
    let matches: Vec<_> = taxonomy
        .varieties()
        .filter(|v| v.name.eq_ignore_ascii_case(value))
        .collect();
    match matches.as_slice() {
        [one] => Ok(one.id),
        [] => bail!("unknown variety {value:?}; add it with `gourdwatch variety add`"),
        _ => bail!("variety name {value:?} is ambiguous, use its id"),
    }
}

fn type_name(taxonomy: &Taxonomy, id: &GourdTypeId) -> String {
    taxonomy
        .resolve_gourd_type(id)
        .unwrap_or(gourdwatch_aggregation::UNKNOWN_LABEL)
        .to_string()
}

struct Output {
    json: bool,
}

impl Output {
    fn print_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    fn record(&self, record: &MonitoringRecord, taxonomy: &Taxonomy) -> Result<()> {
        if self.json {
            return self.print_json(record);
        }
        println!("Record: {}", record.id);
        println!("  Type: {}", type_name(taxonomy, &record.gourd_type));
        if let Some(variety) = &record.variety {
            println!(
                "  Variety: {}",
                taxonomy
                    .resolve_variety(variety)
                    .unwrap_or(gourdwatch_aggregation::UNKNOWN_LABEL)
            );
        }
        println!("  Plot: {}", record.plot_no.as_deref().unwrap_or("-"));
        println!("  Pollinated on: {}", record.date_of_pollination);
        println!(
            "  Harvest window: {} .. {}",
            record.harvest_schedule.first(),
            record.harvest_schedule.last()
        );
        println!(
            "  Harvested: {}/{}",
            record.harvested_count(),
            record.pollinated_count()
        );
        println!("  Status: {}", record.status);
        if let Some(at) = record.date_of_finalization {
            println!("  Finalized: {}", at);
        }
        Ok(())
    }

    fn breakdowns(&self, breakdowns: &[Breakdown]) -> Result<()> {
        if self.json {
            return self.print_json(breakdowns);
        }
        for b in breakdowns {
            println!("{} ({:.2}%)", b.label, b.success_rate);
            for point in &b.series {
                println!(
                    "  {:<14} {:>5} {:>5} {:>7.2}%",
                    point.label, point.pollinated, point.harvested, point.success_rate
                );
            }
        }
        Ok(())
    }

    fn rates(&self, rows: &[RateRow]) -> Result<()> {
        if self.json {
            return self.print_json(rows);
        }
        for row in rows {
            println!(
                "  {:<24} {:>5} {:>5} {:>7.2}%",
                row.label, row.pollinated, row.harvested, row.success_rate
            );
        }
        Ok(())
    }
}
