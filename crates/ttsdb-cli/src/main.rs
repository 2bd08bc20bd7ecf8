mod ingest;
mod query;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "ttsdb")]
#[command(about = "Stock history ingestion for the Taiga Takahashi storefront")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch every configured collection and update stock history
    Ingest {
        /// Also write the flat per-size snapshot time series
        #[arg(long)]
        snapshot: bool,
        /// Fetch and print current stock without writing to the database
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the stock history of one product
    History {
        /// Product handle, e.g. lot-703-denim-jacket-indigo
        product_id: String,
    },
    /// List recent stock change events
    Events {
        /// Restrict to one product handle
        #[arg(long)]
        product: Option<String>,
        /// Maximum number of events to show
        #[arg(long, default_value = "50", value_parser = clap::value_parser!(i64).range(1..))]
        limit: i64,
    },
    /// List recent ingestion runs
    Runs {
        /// Maximum number of runs to show
        #[arg(long, default_value = "20", value_parser = clap::value_parser!(i64).range(1..))]
        limit: i64,
    },
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check that the database is reachable
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("ttsdb: no command given; run `ttsdb --help` for usage");
        return Ok(());
    };

    let config = ttsdb_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::debug!(?config, "configuration loaded");

    if let Commands::Ingest {
        snapshot,
        dry_run: true,
    } = command
    {
        if snapshot {
            tracing::warn!("--snapshot has no effect with --dry-run");
        }
        return ingest::run_ingest_dry_run(&config).await;
    }

    let pool_config = ttsdb_db::PoolConfig::from_app_config(&config);
    let pool = ttsdb_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Ingest { snapshot, .. } => {
            ingest::run_ingest(&pool, &config, snapshot || config.record_snapshots).await?;
        }
        Commands::History { product_id } => query::run_history(&pool, &product_id).await?,
        Commands::Events { product, limit } => {
            query::run_events(&pool, product.as_deref(), limit).await?;
        }
        Commands::Runs { limit } => query::run_runs(&pool, limit).await?,
        Commands::Db { command } => match command {
            DbCommands::Ping => {
                ttsdb_db::health_check(&pool).await?;
                println!("database reachable");
            }
            DbCommands::Migrate => {
                let applied = ttsdb_db::run_migrations(&pool).await?;
                println!("applied {applied} migration(s)");
            }
        },
    }

    Ok(())
}
