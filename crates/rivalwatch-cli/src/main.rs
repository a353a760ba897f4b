mod logging;
mod report;
mod run;
mod scheduler;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rivalwatch_core::RunContext;

use crate::report::ReportKind;
use crate::run::TaskKind;

#[derive(Debug, Parser)]
#[command(name = "rivalwatch-cli")]
#[command(about = "Competitor intelligence scraper")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Scrape every competitor once and record the run
    Run {
        /// Only run the named task; repeat to select several
        #[arg(long = "task", value_enum)]
        tasks: Vec<TaskKind>,
    },
    /// Print stored signals
    Report {
        #[arg(value_enum)]
        kind: ReportKind,

        /// Restrict to one competitor domain
        #[arg(long)]
        competitor: Option<String>,

        /// Exact date (YYYY-MM-DD); takes precedence over --from/--to
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Inclusive range start (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Inclusive range end (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Review reports: only the newest row per competitor
        #[arg(long)]
        latest: bool,

        /// Number of runs shown by `report runs`
        #[arg(long, default_value = "10")]
        limit: u32,
    },
    /// Run the daily pipeline on the configured cron schedule until Ctrl-C
    Schedule,
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check that the database is reachable
    Ping,
    /// Apply pending migrations and repair legacy columns
    Migrate,
    /// Insert competitors from the competitors file
    Seed,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = rivalwatch_core::load_app_config()?;

    let ctx = RunContext::now();
    let log_file = matches!(cli.command, Some(Commands::Run { .. }))
        .then(|| logging::daily_log_path(&config.log_dir, ctx.scrape_date));
    logging::init_tracing(&config.log_level, log_file.as_deref())?;

    let Some(command) = cli.command else {
        println!("rivalwatch-cli: no command given; see --help");
        return Ok(());
    };

    let pool_config = rivalwatch_db::PoolConfig::from_app_config(&config);
    let pool = rivalwatch_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Db { command } => run_db_command(&pool, &config, command).await,
        Commands::Run { tasks } => {
            prepare_database(&pool, &config).await?;
            let tasks = if tasks.is_empty() {
                TaskKind::ALL.to_vec()
            } else {
                tasks
            };
            let fetcher = rivalwatch_scraper::PageFetcher::from_app_config(&config)?;
            let collector = run::Collector {
                pool: &pool,
                fetcher: &fetcher,
                trustpilot_base_url: &config.trustpilot_base_url,
                google_search_url: &config.google_search_url,
                ctx,
            };

            let report = run::run_daily(&collector, &tasks, "cli").await?;
            print!("{}", run::format_summary(&report.results));
            if !report.succeeded {
                anyhow::bail!("run {} failed: every task failed", report.run_id);
            }
            Ok(())
        }
        Commands::Report {
            kind,
            competitor,
            date,
            from,
            to,
            latest,
            limit,
        } => {
            let filter = rivalwatch_db::ReportFilter {
                competitor,
                date,
                from,
                to,
            };
            report::run_report(&pool, kind, &filter, latest, i64::from(limit)).await
        }
        Commands::Schedule => {
            prepare_database(&pool, &config).await?;
            scheduler::run_scheduled(pool, config).await
        }
    }
}

async fn run_db_command(
    pool: &sqlx::SqlitePool,
    config: &rivalwatch_core::AppConfig,
    command: DbCommands,
) -> anyhow::Result<()> {
    match command {
        DbCommands::Ping => {
            rivalwatch_db::ping(pool).await?;
            println!("database reachable");
        }
        DbCommands::Migrate => {
            let summary = rivalwatch_db::run_migrations(pool).await?;
            println!("applied {} migration(s)", summary.applied);
            for column in &summary.repaired_columns {
                println!("added missing column {column}");
            }
        }
        DbCommands::Seed => {
            rivalwatch_db::run_migrations(pool).await?;
            let inserted = seed_from_config(pool, config).await?;
            println!("seeded {inserted} new competitor(s)");
        }
    }
    Ok(())
}

/// Migrations plus competitor seeding, run before any scrape.
async fn prepare_database(
    pool: &sqlx::SqlitePool,
    config: &rivalwatch_core::AppConfig,
) -> anyhow::Result<()> {
    let summary = rivalwatch_db::run_migrations(pool).await?;
    if !summary.repaired_columns.is_empty() {
        tracing::warn!(columns = ?summary.repaired_columns, "repaired legacy columns");
    }
    seed_from_config(pool, config).await?;
    Ok(())
}

async fn seed_from_config(
    pool: &sqlx::SqlitePool,
    config: &rivalwatch_core::AppConfig,
) -> anyhow::Result<usize> {
    let file = rivalwatch_core::load_competitors(&config.competitors_path)?;
    let inserted = rivalwatch_db::seed_competitors(pool, &file.competitors).await?;
    tracing::info!(
        inserted,
        configured = file.competitors.len(),
        "competitors seeded"
    );
    Ok(inserted)
}
