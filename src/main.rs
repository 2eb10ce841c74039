//! celulas - cell-group hierarchy reporting toolkit
//!
//! Reads a snapshot of networks, coordinations, cells, members, weekly
//! reports and multiplications (from JSON exports or a local SQLite store)
//! and renders dashboards, rankings, lineage and organization trees.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (bad input, store failure, permission denied, etc.)
//!   2 - A coordination is below --min-submission-rate

mod analysis;
mod cli;
mod config;
mod context;
mod error;
mod insight;
mod lineage;
mod models;
mod org_tree;
mod report;
mod snapshot;
mod store;

use analysis::{aggregate, below_submission_threshold, rank_members, summarize_supervisions};
use anyhow::{anyhow, Context, Result};
use chrono::{Local, NaiveDate, Utc};
use cli::{Args, Command, OutputArgs, OutputFormat, PeriodArgs};
use config::{Config, CONFIG_FILE};
use context::{Permission, SessionContext};
use indicatif::{ProgressBar, ProgressStyle};
use insight::{InsightClient, InsightKind, InsightSettings};
use lineage::{Lineage, LineageNode};
use models::{Cell, NewMultiplication, NewWeeklyReport};
use report::{DashboardReport, ReportMetadata};
use serde::Serialize;
use snapshot::{Period, Snapshot, SnapshotLoader};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle init-config early (no logging needed)
    if matches!(args.command, Command::InitConfig) {
        return handle_init_config();
    }

    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(&args, &config);

    debug!("celulas v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    debug!("Config: {:?}", config);

    match run(args, config).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to set the data directory, store, insight endpoint and report defaults.");
    Ok(())
}

fn init_logging(args: &Args, config: &Config) {
    let level = if config.general.verbose && !args.quiet {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Dispatch one subcommand. Returns the exit code (0 or 2).
async fn run(args: Args, config: Config) -> Result<i32> {
    if args.command.is_mutation() && config.data.database.is_none() {
        return Err(anyhow!(
            "This command needs a store: pass --db or set data.database"
        ));
    }

    let ctx = SessionContext::for_role(args.role, args.scope)?;
    let today = Local::now().date_naive();
    info!("Session: {} ({:?})", ctx.role, ctx.scope);

    match args.command.clone() {
        Command::Dashboard { period, output, .. } => {
            cmd_dashboard(&config, &ctx, &period, &output, today).await
        }
        Command::Ranking { cell, output, .. } => {
            cmd_ranking(&config, &ctx, cell, &output, today).await
        }
        Command::Lineage { available, output } => {
            cmd_lineage(&config, &ctx, available, &output).await
        }
        Command::Tree { search, output } => {
            cmd_tree(&config, &ctx, search.as_deref(), &output).await
        }
        Command::Export { period, output } => {
            cmd_export(&config, &ctx, &period, &output, today).await
        }
        Command::Insight {
            kind,
            period,
            output,
            ..
        } => cmd_insight(&config, &ctx, kind, &period, &output, today, args.quiet).await,
        Command::Import { dir } => cmd_import(&config, &ctx, dir, args.quiet).await,
        Command::SubmitReport {
            cell,
            date,
            members_present,
            leaders_in_training,
            discipleships,
            visitors,
            children,
            notes,
            photo_url,
        } => {
            let repo = open_store(&config).await?;
            let saved = repo
                .submit_report(
                    &ctx,
                    NewWeeklyReport {
                        cell_id: cell,
                        meeting_date: date,
                        members_present,
                        leaders_in_training,
                        discipleships,
                        visitors,
                        children,
                        notes,
                        photo_url,
                    },
                )
                .await?;
            println!(
                "✅ Report {} saved for the week of {}",
                saved.id,
                saved.week_start.format("%d/%m/%Y")
            );
            Ok(0)
        }
        Command::DeleteReport { id } => {
            let repo = open_store(&config).await?;
            let removed = repo.delete_report(&ctx, id).await?;
            println!(
                "✅ Report {} (week of {}) deleted",
                removed.id,
                removed.week_start.format("%d/%m/%Y")
            );
            Ok(0)
        }
        Command::Multiply {
            origin,
            new_cell,
            date,
            notes,
        } => {
            let repo = open_store(&config).await?;
            let record = repo
                .record_multiplication(
                    &ctx,
                    NewMultiplication {
                        origin_cell_id: origin,
                        new_cell_id: new_cell,
                        multiplied_on: date,
                        notes,
                    },
                )
                .await?;
            println!("✅ Multiplication {} recorded", record.id);
            Ok(0)
        }
        Command::Unmultiply { id } => {
            let repo = open_store(&config).await?;
            let removed = repo.delete_multiplication(&ctx, id).await?;
            println!(
                "✅ Multiplication {} deleted; cell {} is a root again",
                removed.id, removed.new_cell_id
            );
            Ok(0)
        }
        Command::InitConfig => Ok(0),
    }
}

/// Runs before logging is set up, so problems go straight to stderr.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            eprintln!("⚠️  Failed to load {}: {:#}. Using defaults.", CONFIG_FILE, e);
            Ok(Config::default())
        }
    }
}

async fn open_store(config: &Config) -> Result<store::Repository> {
    let db = config
        .data
        .database
        .as_ref()
        .ok_or_else(|| anyhow!("This command needs a store: pass --db or set data.database"))?;

    store::open(db)
        .await
        .with_context(|| format!("Failed to open store {}", db.display()))
}

/// Load the snapshot visible to `ctx`, and a label of where it came from.
async fn load_snapshot(config: &Config, ctx: &SessionContext) -> Result<(Snapshot, String)> {
    ctx.require(Permission::ViewDashboard)?;

    let (snapshot, source) = match &config.data.database {
        Some(db) => {
            let repo = open_store(config).await?;
            (repo.load_snapshot().await?, db.display().to_string())
        }
        None => {
            let loader = SnapshotLoader::new(config.data.dir.clone());
            (loader.load().await?, config.data.dir.display().to_string())
        }
    };

    Ok((ctx.scope_snapshot(&snapshot), source))
}

fn resolve_period(args: &PeriodArgs, config: &Config, today: NaiveDate) -> Period {
    match (args.from, args.to) {
        (Some(from), Some(to)) => Period::new(from, to),
        _ => Period::preset(args.period.unwrap_or(config.general.period), today),
    }
}

fn emit(content: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            report::write_output(path, content.as_bytes())?;
            println!("✅ Saved to {}", path.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}

fn spinner(message: &str, quiet: bool) -> Option<ProgressBar> {
    if quiet {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    Some(pb)
}

async fn cmd_dashboard(
    config: &Config,
    ctx: &SessionContext,
    period_args: &PeriodArgs,
    output: &OutputArgs,
    today: NaiveDate,
) -> Result<i32> {
    let (snapshot, source) = load_snapshot(config, ctx).await?;
    let period = resolve_period(period_args, config, today);
    let snapshot = snapshot.with_period(&period);

    info!("Aggregating {} reports for {}", snapshot.reports.len(), period.label());

    let dashboard = aggregate(&snapshot);
    let report = DashboardReport {
        metadata: ReportMetadata {
            generated_at: Utc::now(),
            period: period.label(),
            role: ctx.role,
            scope: ctx.scope,
            source,
        },
        supervision: summarize_supervisions(&snapshot),
        dashboard,
    };

    let min_rate = config.report.min_submission_rate;
    let content = match output.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_dashboard_markdown(&report, min_rate),
    };
    emit(&content, output.output.as_deref())?;

    if let Some(min) = min_rate {
        let below = below_submission_threshold(&report.dashboard, min);
        if !below.is_empty() {
            for c in &below {
                eprintln!(
                    "   {} submitted {}% (minimum {}%)",
                    c.name, c.totals.submission_rate, min
                );
            }
            eprintln!(
                "\n⛔ {} coordination(s) below the minimum submission rate. Failing (exit code 2).",
                below.len()
            );
            return Ok(2);
        }
    }

    Ok(0)
}

async fn cmd_ranking(
    config: &Config,
    ctx: &SessionContext,
    cell: Option<uuid::Uuid>,
    output: &OutputArgs,
    today: NaiveDate,
) -> Result<i32> {
    let (snapshot, _) = load_snapshot(config, ctx).await?;

    let mut scores = rank_members(&snapshot, today);
    if let Some(cell_id) = cell {
        scores.retain(|s| s.cell_id == cell_id);
    }

    let limit = config.report.ranking_limit;
    let content = match output.format {
        OutputFormat::Json => {
            let top: Vec<_> = scores.iter().take(limit).collect();
            report::generate_json_report(&top)?
        }
        OutputFormat::Markdown => report::generate_ranking_markdown(&scores, limit),
    };
    emit(&content, output.output.as_deref())?;

    Ok(0)
}

#[derive(Serialize)]
struct LineageView<'a> {
    roots: Vec<LineageNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    available_destinations: Option<Vec<&'a Cell>>,
}

async fn cmd_lineage(
    config: &Config,
    ctx: &SessionContext,
    available: bool,
    output: &OutputArgs,
) -> Result<i32> {
    let (snapshot, _) = load_snapshot(config, ctx).await?;

    let lineage = Lineage::build(&snapshot.multiplications);
    let names: HashMap<_, _> = snapshot
        .cells
        .iter()
        .map(|c| (c.id, c.name.as_str()))
        .collect();

    let view = LineageView {
        roots: lineage.forest(&names),
        available_destinations: available.then(|| lineage.available_destinations(&snapshot.cells)),
    };

    let content = match output.format {
        OutputFormat::Json => report::generate_json_report(&view)?,
        OutputFormat::Markdown => report::generate_lineage_markdown(
            &view.roots,
            view.available_destinations.as_deref().unwrap_or_default(),
        ),
    };
    emit(&content, output.output.as_deref())?;

    Ok(0)
}

async fn cmd_tree(
    config: &Config,
    ctx: &SessionContext,
    search: Option<&str>,
    output: &OutputArgs,
) -> Result<i32> {
    let (snapshot, _) = load_snapshot(config, ctx).await?;

    let tree = org_tree::build_org_tree(&snapshot);
    let tree = org_tree::filter_tree(&tree, search.unwrap_or(""));

    let content = match output.format {
        OutputFormat::Json => report::generate_json_report(&tree)?,
        OutputFormat::Markdown => report::generate_tree_markdown(&tree),
    };
    emit(&content, output.output.as_deref())?;

    Ok(0)
}

async fn cmd_export(
    config: &Config,
    ctx: &SessionContext,
    period_args: &PeriodArgs,
    path: &Path,
    today: NaiveDate,
) -> Result<i32> {
    let (snapshot, _) = load_snapshot(config, ctx).await?;
    let period = resolve_period(period_args, config, today);

    let dashboard = aggregate(&snapshot.with_period(&period));
    report::export_xlsx(&dashboard, &period.label(), path)?;

    println!("✅ Workbook saved to {}", path.display());
    Ok(0)
}

#[allow(clippy::too_many_arguments)]
async fn cmd_insight(
    config: &Config,
    ctx: &SessionContext,
    kind: InsightKind,
    period_args: &PeriodArgs,
    output: &OutputArgs,
    today: NaiveDate,
    quiet: bool,
) -> Result<i32> {
    let (snapshot, _) = load_snapshot(config, ctx).await?;
    let period = resolve_period(period_args, config, today);
    let request = insight::build_request(&snapshot.with_period(&period), kind, &period);

    let client = InsightClient::new(InsightSettings {
        endpoint: config.insight.endpoint.clone(),
        api_key_env: config.insight.api_key_env.clone(),
        timeout_seconds: config.insight.timeout_seconds,
        show_progress: !quiet,
    })?;
    let response = client.generate(&request).await?;

    let content = match output.format {
        OutputFormat::Json => report::generate_json_report(&response)?,
        OutputFormat::Markdown => report::generate_insight_markdown(&response),
    };
    emit(&content, output.output.as_deref())?;

    Ok(0)
}

async fn cmd_import(
    config: &Config,
    ctx: &SessionContext,
    dir: Option<PathBuf>,
    quiet: bool,
) -> Result<i32> {
    let dir = dir.unwrap_or_else(|| config.data.dir.clone());
    let repo = open_store(config).await?;

    let pb = spinner(&format!("Importing {}...", dir.display()), quiet);
    let result = async {
        let snapshot = SnapshotLoader::new(dir.clone()).load().await?;
        let summary = repo.import_snapshot(ctx, &snapshot).await?;
        Ok::<_, anyhow::Error>(summary)
    }
    .await;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    let summary = result?;

    println!("✅ Imported {} from {}", summary.total(), dir.display());
    println!(
        "   Networks: {} | Coordinations: {} | Cells: {} | Members: {}",
        summary.networks, summary.coordinations, summary.cells, summary.members
    );
    println!(
        "   Reports: {} | Multiplications: {} | Supervisions: {}",
        summary.reports, summary.multiplications, summary.supervisions
    );

    Ok(0)
}
