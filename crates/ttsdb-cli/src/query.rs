//! Read-only command handlers: `history`, `events`, and `runs`.

use chrono::{DateTime, Utc};
use ttsdb_core::{SizeMap, StockChangeEvent};

fn fmt_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn fmt_optional_timestamp(ts: Option<DateTime<Utc>>) -> String {
    ts.map_or_else(|| "-".to_string(), fmt_timestamp)
}

fn fmt_sizes(sizes: &SizeMap) -> String {
    sizes
        .iter()
        .map(|(size, qty)| format!("{size}:{qty}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn fmt_transition(event: &StockChangeEvent) -> &'static str {
    if event.is_restock() {
        "restock"
    } else if event.is_sellout() {
        "sold out"
    } else {
        ""
    }
}

/// Print every history entry for one product, oldest first.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub(crate) async fn run_history(pool: &sqlx::PgPool, product_id: &str) -> anyhow::Result<()> {
    let Some(history) = ttsdb_db::get_stock_history(pool, product_id).await? else {
        println!("no history for '{product_id}'; run `ingest` first");
        return Ok(());
    };

    println!("Product: {}", history.product_id);
    println!("{:<21}SIZES", "RECORDED AT");
    for entry in &history.stock_history {
        println!(
            "{:<21}{}",
            fmt_timestamp(entry.recorded_at),
            fmt_sizes(&entry.sizes)
        );
    }

    Ok(())
}

/// Print recent change events, optionally for a single product.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub(crate) async fn run_events(
    pool: &sqlx::PgPool,
    product: Option<&str>,
    limit: i64,
) -> anyhow::Result<()> {
    let events = match product {
        Some(id) => ttsdb_db::list_stock_events(pool, id, limit).await?,
        None => ttsdb_db::list_recent_stock_events(pool, limit).await?,
    };

    if events.is_empty() {
        println!("no stock change events recorded");
        return Ok(());
    }

    println!(
        "{:<21}{:<44}{:<8}{:>5}{:>5}  NOTE",
        "RECORDED AT", "PRODUCT", "SIZE", "OLD", "NEW"
    );
    for event in events.into_iter().map(StockChangeEvent::from) {
        println!(
            "{:<21}{:<44}{:<8}{:>5}{:>5}  {}",
            fmt_timestamp(event.recorded_at),
            event.product_id,
            event.size,
            event.old_stock,
            event.new_stock,
            fmt_transition(&event)
        );
    }

    Ok(())
}

/// Print the most recent ingestion runs.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub(crate) async fn run_runs(pool: &sqlx::PgPool, limit: i64) -> anyhow::Result<()> {
    let runs = ttsdb_db::list_ingestion_runs(pool, limit).await?;

    if runs.is_empty() {
        println!("no ingestion runs recorded");
        return Ok(());
    }

    println!(
        "{:<7}{:<11}{:<21}{:<21}{:>9}  ERROR",
        "ID", "STATUS", "STARTED", "COMPLETED", "PRODUCTS"
    );
    for run in &runs {
        println!(
            "{:<7}{:<11}{:<21}{:<21}{:>9}  {}",
            run.id,
            run.status,
            fmt_optional_timestamp(run.started_at),
            fmt_optional_timestamp(run.completed_at),
            run.products_processed,
            run.error_message.as_deref().unwrap_or("")
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn sizes_are_listed_in_label_order() {
        let sizes: SizeMap = [("S".to_string(), 2), ("M".to_string(), 0)]
            .into_iter()
            .collect();
        assert_eq!(fmt_sizes(&sizes), "M:0 S:2");
    }

    #[test]
    fn transitions_flag_restocks_and_sellouts_only() {
        let event = |old_stock, new_stock| StockChangeEvent {
            recorded_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
            product_id: "tee".to_string(),
            size: "S".to_string(),
            old_stock,
            new_stock,
        };
        assert_eq!(fmt_transition(&event(0, 3)), "restock");
        assert_eq!(fmt_transition(&event(2, 0)), "sold out");
        assert_eq!(fmt_transition(&event(2, 1)), "");
        assert_eq!(fmt_transition(&event(0, 0)), "");
    }

    #[test]
    fn missing_timestamp_renders_as_dash() {
        assert_eq!(fmt_optional_timestamp(None), "-");
        let ts = Utc.with_ymd_and_hms(2026, 3, 1, 9, 5, 0).unwrap();
        assert_eq!(fmt_optional_timestamp(Some(ts)), "2026-03-01 09:05:00");
    }
}
