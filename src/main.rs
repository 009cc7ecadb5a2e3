use analytics::{composition_changes, composition_weights, performance_series, summarize};
use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use configuration::Config;
use database::{DbRepository, Table};
use engine::IndexPipeline;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

mod export;
mod render;

/// Entry point for the index tracker.
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // An optional .env may carry INDEX__* overrides such as the API key.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Command failed.");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Tracks an equal-weighted index over the largest NASDAQ listings.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Missing files fall back to defaults.
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the universe, snapshot, and history, then record today's index return.
    Update(UpdateArgs),
    /// Print performance, composition, and summary tables.
    Report(ReportArgs),
    /// Write the performance table with cumulative returns to a CSV or Excel file.
    Export(ExportArgs),
    /// Serve the dashboard JSON API.
    Serve(ServeArgs),
    /// Create the database and its tables, then exit.
    InitDb,
}

#[derive(Parser)]
struct UpdateArgs {
    /// Record the snapshot and return under this date instead of today (format: YYYY-MM-DD).
    #[arg(long)]
    as_of: Option<NaiveDate>,
}

#[derive(Parser)]
struct ReportArgs {
    /// Composition snapshot to show (format: YYYY-MM-DD). Defaults to the latest.
    #[arg(long)]
    date: Option<NaiveDate>,
}

#[derive(Parser)]
struct ExportArgs {
    #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
    format: ExportFormat,

    /// Defaults to `index_performance.csv` or `index_performance.xlsx`.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    Csv,
    Xlsx,
}

#[derive(Parser)]
struct ServeArgs {
    /// Overrides `server.bind_addr`.
    #[arg(long)]
    addr: Option<SocketAddr>,
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = configuration::load_config(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    let _guard = configuration::init_tracing(&config.logging)?;

    match cli.command {
        Commands::Update(args) => handle_update(config, args).await,
        Commands::Report(args) => handle_report(&config, args).await,
        Commands::Export(args) => handle_export(&config, args).await,
        Commands::Serve(args) => {
            let addr = args.addr.unwrap_or(config.server.bind_addr);
            web_server::run_server(&config.storage.database_path, addr).await
        }
        Commands::InitDb => handle_init_db(&config).await,
    }
}

// ==============================================================================
// Command Logic
// ==============================================================================

async fn open_repository(config: &Config) -> anyhow::Result<DbRepository> {
    let path = &config.storage.database_path;
    let pool = database::connect(path)
        .await
        .with_context(|| format!("opening {}", path.display()))?;
    database::init_schema(&pool).await?;
    Ok(DbRepository::new(pool))
}

async fn handle_update(config: Config, args: UpdateArgs) -> anyhow::Result<()> {
    let mut pipeline = IndexPipeline::from_config(config)?;
    if let Some(date) = args.as_of {
        pipeline = pipeline.with_as_of(date);
    }

    let summary = pipeline.run().await?;
    println!("{}", render::run_summary_table(&summary));
    Ok(())
}

async fn handle_report(config: &Config, args: ReportArgs) -> anyhow::Result<()> {
    let repo = open_repository(config).await?;
    let records = repo.performance_history().await?;
    let entries = repo.all_composition().await?;

    println!("Index Summary");
    println!("{}", render::summary_table(&summarize(&records, &entries)));

    println!("\nPerformance");
    println!("{}", render::performance_table(&performance_series(&records)));

    let date = match args.date {
        Some(date) => Some(date),
        None => repo.latest_composition_date().await?,
    };
    if let Some(date) = date {
        let snapshot = repo.composition_for_date(date).await?;
        println!("\nComposition on {date}");
        println!("{}", render::composition_table(&composition_weights(&snapshot)));
    } else {
        println!("\nNo composition snapshot stored yet.");
    }

    println!("\nComposition Changes");
    println!("{}", render::changes_table(&composition_changes(&entries)));
    Ok(())
}

async fn handle_export(config: &Config, args: ExportArgs) -> anyhow::Result<()> {
    let repo = open_repository(config).await?;
    let points = performance_series(&repo.performance_history().await?);

    let output = match (args.output, args.format) {
        (Some(path), _) => path,
        (None, ExportFormat::Csv) => PathBuf::from("index_performance.csv"),
        (None, ExportFormat::Xlsx) => PathBuf::from("index_performance.xlsx"),
    };
    match args.format {
        ExportFormat::Csv => export::write_performance_csv(&output, &points)?,
        ExportFormat::Xlsx => export::write_performance_xlsx(&output, &points)?,
    }

    tracing::info!(rows = points.len(), path = %output.display(), "Exported performance table.");
    println!("Exported {} rows to {}", points.len(), output.display());
    Ok(())
}

async fn handle_init_db(config: &Config) -> anyhow::Result<()> {
    let repo = open_repository(config).await?;
    let mut counts = Vec::with_capacity(Table::ALL.len());
    for table in Table::ALL {
        counts.push((table, repo.count_rows(table).await?));
    }
    let tables = repo.table_names().await?;
    println!(
        "Initialised {} with tables: {}",
        config.storage.database_path.display(),
        tables.join(", ")
    );
    println!("{}", render::row_counts_table(&counts));
    Ok(())
}
