//! `ingest` command handlers.
//!
//! The live path wraps [`cycle::run_ingestion_cycle`] in an `ingestion_runs`
//! row (queued, running, then succeeded or failed) and records each
//! collection's outcome. Collection failures are logged and tallied; the run
//! only fails when nothing could be fetched or the store went away.

mod cycle;

use chrono::Utc;
use ttsdb_core::{load_collections, AppConfig, ProductSnapshot};
use ttsdb_db::PgStore;
use ttsdb_scraper::{display_title, fetch_all_collections, CollectionClient, CollectionOutcome};

pub(crate) use cycle::{run_ingestion_cycle, CycleOptions};

fn build_client(config: &AppConfig) -> anyhow::Result<CollectionClient> {
    CollectionClient::new(
        &config.source_base_url,
        config.scraper_request_timeout_secs,
        &config.scraper_user_agent,
    )
    .map_err(|e| anyhow::anyhow!("failed to build collection client: {e}"))
}

fn load_collection_handles(config: &AppConfig) -> anyhow::Result<Vec<String>> {
    let file = load_collections(&config.collections_path)?;
    for collection in &file.collections {
        tracing::debug!(
            handle = %collection.handle,
            name = collection.display_name(),
            "collection configured"
        );
    }
    Ok(file.handles())
}

/// One dry-run table row: title, total units, per-size stock, and which
/// sizes can be bought.
fn fmt_dry_run_row(product: &ProductSnapshot) -> String {
    let sizes: Vec<String> = product
        .sizes
        .iter()
        .map(|s| format!("{}:{}", s.size, s.quantity))
        .collect();
    let available = if product.is_sold_out() {
        "sold out".to_string()
    } else {
        product.in_stock_sizes().join(" ")
    };
    format!(
        "{:<48}{:>6}  {:<24}{available}",
        display_title(product),
        product.total_quantity(),
        sizes.join(" ")
    )
}

/// Fetch and print current stock without touching the database.
///
/// # Errors
///
/// Returns an error if the collections file or client cannot be loaded, or if
/// every collection failed.
pub(crate) async fn run_ingest_dry_run(config: &AppConfig) -> anyhow::Result<()> {
    let collections = load_collection_handles(config)?;
    let client = build_client(config)?;

    let report = fetch_all_collections(
        &client,
        &collections,
        config.scraper_max_concurrent_collections,
    )
    .await;

    if report.all_failed() {
        anyhow::bail!("all {} collections failed", report.outcomes.len());
    }

    println!(
        "dry-run: {} products across {} collections ({} failed)",
        report.products.len(),
        report.succeeded_count(),
        report.failed_count()
    );
    println!("{:<48}{:>6}  {:<24}IN STOCK", "PRODUCT", "TOTAL", "SIZES");
    for product in &report.products {
        println!("{}", fmt_dry_run_row(product));
    }

    Ok(())
}

/// Run one audited ingestion cycle against Postgres.
///
/// # Errors
///
/// Returns an error if the run cannot be created or started, every collection
/// failed, or the store became unreachable.
pub(crate) async fn run_ingest(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    record_snapshots: bool,
) -> anyhow::Result<()> {
    let collections = load_collection_handles(config)?;
    let client = build_client(config)?;
    let store = PgStore::new(pool.clone());

    let run = ttsdb_db::create_ingestion_run(pool, "cli").await?;
    if let Err(e) = ttsdb_db::start_ingestion_run(pool, run.id).await {
        fail_run_best_effort(pool, run.id, format!("{e:#}")).await;
        return Err(e.into());
    }
    tracing::info!(run_id = run.id, public_id = %run.public_id, "ingestion run started");

    let options = CycleOptions {
        max_concurrent: config.scraper_max_concurrent_collections,
        record_snapshots,
    };

    let summary =
        match run_ingestion_cycle(&client, &collections, &store, options, Utc::now()).await {
            Ok(summary) => summary,
            Err(aborted) => {
                record_collection_outcomes(pool, run.id, &aborted.outcomes).await;
                fail_run_best_effort(pool, run.id, format!("{:#}", aborted.source)).await;
                return Err(aborted.into());
            }
        };

    record_collection_outcomes(pool, run.id, &summary.outcomes).await;

    if summary.all_collections_failed() {
        let message = format!("all {} collections failed", summary.outcomes.len());
        fail_run_best_effort(pool, run.id, message.clone()).await;
        anyhow::bail!("{message}");
    }

    if let Err(err) =
        ttsdb_db::complete_ingestion_run(pool, run.id, summary.products_processed()).await
    {
        fail_run_best_effort(pool, run.id, format!("{err:#}")).await;
        return Err(err.into());
    }

    println!("{summary}");
    Ok(())
}

async fn record_collection_outcomes(
    pool: &sqlx::PgPool,
    run_id: i64,
    outcomes: &[CollectionOutcome],
) {
    for outcome in outcomes {
        let (status, fetched, error) = match &outcome.result {
            Ok(count) => (
                "succeeded",
                Some(i32::try_from(*count).unwrap_or(i32::MAX)),
                None,
            ),
            Err(e) => ("failed", None, Some(e.to_string())),
        };
        if let Err(e) = ttsdb_db::upsert_ingestion_run_collection(
            pool,
            run_id,
            &outcome.collection,
            status,
            fetched,
            error.as_deref(),
        )
        .await
        {
            tracing::warn!(
                run_id,
                collection = %outcome.collection,
                error = %e,
                "failed to record collection outcome"
            );
        }
    }
}

/// Attempt to mark an ingestion run as failed, logging any secondary error.
async fn fail_run_best_effort(pool: &sqlx::PgPool, run_id: i64, message: String) {
    if let Err(mark_err) = ttsdb_db::fail_ingestion_run(pool, run_id, &message).await {
        tracing::error!(
            run_id,
            error = %mark_err,
            "failed to mark ingestion run as failed"
        );
    }
}
