//! Dial value history
//!
//! One sample per dial per minute. A later write within the same minute
//! replaces the earlier sample, so history grows with elapsed minutes rather
//! than with recompute frequency.

use crate::pagination::limit_offset;
use crate::tx::Tx;
use chrono::{DateTime, Utc};
use wtf_common::db::{DialValue, DialValueFilter};
use wtf_common::error::StorageContext;
use wtf_common::time::truncate_to_minute;
use wtf_common::{DialId, Result};

/// Record `value` for the minute bucket containing `timestamp`
pub async fn record_sample(
    tx: &mut Tx,
    dial_id: DialId,
    value: i64,
    timestamp: DateTime<Utc>,
) -> Result<()> {
    let bucket = truncate_to_minute(timestamp);

    sqlx::query(
        r#"
        INSERT INTO dial_values (dial_id, "timestamp", value)
        VALUES (?, ?, ?)
        ON CONFLICT (dial_id, "timestamp") DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(dial_id)
    .bind(bucket)
    .bind(value)
    .execute(tx.conn())
    .await
    .storage_context("record dial value", dial_id)?;

    tracing::trace!(dial_id, value, bucket = %bucket, "Recorded history sample");
    Ok(())
}

/// Samples for a dial in ascending time order
pub async fn find_samples(
    tx: &mut Tx,
    dial_id: DialId,
    filter: &DialValueFilter,
) -> Result<Vec<DialValue>> {
    let page = limit_offset(filter.limit, None);

    sqlx::query_as::<_, DialValue>(
        r#"
        SELECT dial_id, "timestamp", value
        FROM dial_values
        WHERE dial_id = ?1
          AND (?2 IS NULL OR "timestamp" >= ?2)
          AND (?3 IS NULL OR "timestamp" <= ?3)
        ORDER BY "timestamp" ASC
        LIMIT ?4
        "#,
    )
    .bind(dial_id)
    .bind(filter.since.map(truncate_to_minute))
    .bind(filter.until)
    .bind(page.limit)
    .fetch_all(tx.conn())
    .await
    .storage_context("read dial history", dial_id)
}
