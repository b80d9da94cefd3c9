//! Dial persistence
//!
//! Besides plain CRUD this module provides the row lock the aggregation
//! pipeline relies on: [`lock_dial`] reads a dial's value through a no-op
//! UPDATE, so the enclosing transaction owns the database write lock before
//! the value is observed.

use crate::pagination::limit_offset;
use crate::tx::Tx;
use rand::RngCore;
use sqlx::{FromRow, Row};
use wtf_common::db::{Dial, DialFilter};
use wtf_common::error::StorageContext;
use wtf_common::{DialId, Error, Result, UserId};

/// Dial id, owner and value as seen under the row lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockedDial {
    pub id: DialId,
    pub user_id: UserId,
    pub value: i64,
}

/// Generate a random 32-character hex invite code
pub fn generate_invite_code() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Insert a new dial owned by `user_id`
pub async fn create_dial(tx: &mut Tx, user_id: UserId, name: &str) -> Result<Dial> {
    let now = tx.now();
    let dial = sqlx::query_as::<_, Dial>(
        r#"
        INSERT INTO dials (user_id, name, value, invite_code, created_at, updated_at)
        VALUES (?, ?, 0, ?, ?, ?)
        RETURNING id, user_id, name, value, invite_code, created_at, updated_at
        "#,
    )
    .bind(user_id)
    .bind(name)
    .bind(generate_invite_code())
    .bind(now)
    .bind(now)
    .fetch_one(tx.conn())
    .await
    .query_context("create dial")?;

    tracing::debug!(dial_id = dial.id, user_id, "Created dial");
    Ok(dial)
}

/// Find dials matching `filter`, plus the total matching count
///
/// Without an invite code the search is limited to dials `user_id` is a
/// member of; an anonymous caller sees nothing.
pub async fn find_dials(
    tx: &mut Tx,
    user_id: Option<UserId>,
    filter: &DialFilter,
) -> Result<(Vec<Dial>, i64)> {
    let page = limit_offset(filter.limit, filter.offset);

    let rows = sqlx::query(
        r#"
        SELECT id, user_id, name, value, invite_code, created_at, updated_at,
               COUNT(*) OVER() AS total
        FROM dials
        WHERE (?1 IS NULL OR id = ?1)
          AND (CASE
                 WHEN ?2 IS NOT NULL THEN invite_code = ?2
                 ELSE id IN (SELECT dial_id FROM dial_memberships WHERE user_id = ?3)
               END)
        ORDER BY id ASC
        LIMIT ?4 OFFSET ?5
        "#,
    )
    .bind(filter.id)
    .bind(filter.invite_code.as_deref())
    .bind(user_id)
    .bind(page.limit)
    .bind(page.offset)
    .fetch_all(tx.conn())
    .await
    .query_context("find dials")?;

    let mut total = 0;
    let mut dials = Vec::with_capacity(rows.len());
    for row in &rows {
        total = row.try_get("total").query_context("decode dials")?;
        dials.push(Dial::from_row(row).query_context("decode dials")?);
    }

    Ok((dials, total))
}

/// Find a dial visible to `user_id`
pub async fn find_dial_by_id(tx: &mut Tx, user_id: Option<UserId>, id: DialId) -> Result<Dial> {
    let filter = DialFilter {
        id: Some(id),
        ..DialFilter::default()
    };
    let (mut dials, _) = find_dials(tx, user_id, &filter).await?;
    dials
        .pop()
        .ok_or_else(|| Error::NotFound("Dial not found.".to_string()))
}

/// Read a dial regardless of membership
pub async fn get_dial(tx: &mut Tx, id: DialId) -> Result<Dial> {
    sqlx::query_as::<_, Dial>(
        "SELECT id, user_id, name, value, invite_code, created_at, updated_at FROM dials WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(tx.conn())
    .await
    .storage_context("read dial", id)?
    .ok_or_else(|| Error::NotFound("Dial not found.".to_string()))
}

/// Write-lock a dial row and read its owner and value
///
/// Returns `None` when the dial does not exist.
pub async fn lock_dial(tx: &mut Tx, id: DialId) -> Result<Option<LockedDial>> {
    let row = sqlx::query_as::<_, (i64, i64, i64)>(
        "UPDATE dials SET value = value WHERE id = ? RETURNING id, user_id, value",
    )
    .bind(id)
    .fetch_optional(tx.conn())
    .await
    .storage_context("lock dial", id)?;

    Ok(row.map(|(id, user_id, value)| LockedDial { id, user_id, value }))
}

/// Write-lock the dial with the given invite code
pub async fn lock_dial_by_invite_code(tx: &mut Tx, invite_code: &str) -> Result<Option<LockedDial>> {
    let row = sqlx::query_as::<_, (i64, i64, i64)>(
        "UPDATE dials SET value = value WHERE invite_code = ? RETURNING id, user_id, value",
    )
    .bind(invite_code)
    .fetch_optional(tx.conn())
    .await
    .query_context("lock dial by invite code")?;

    Ok(row.map(|(id, user_id, value)| LockedDial { id, user_id, value }))
}

/// Store a recomputed aggregate value
pub async fn store_dial_value(tx: &mut Tx, id: DialId, value: i64) -> Result<()> {
    let now = tx.now();
    sqlx::query("UPDATE dials SET value = ?, updated_at = ? WHERE id = ?")
        .bind(value)
        .bind(now)
        .bind(id)
        .execute(tx.conn())
        .await
        .storage_context("update dial value", id)?;
    Ok(())
}

/// Rename a dial
pub async fn update_dial_name(tx: &mut Tx, id: DialId, name: &str) -> Result<()> {
    let now = tx.now();
    let result = sqlx::query("UPDATE dials SET name = ?, updated_at = ? WHERE id = ?")
        .bind(name)
        .bind(now)
        .bind(id)
        .execute(tx.conn())
        .await
        .storage_context("update dial", id)?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound("Dial not found.".to_string()));
    }
    Ok(())
}

/// Delete a dial; memberships and history cascade
pub async fn delete_dial(tx: &mut Tx, id: DialId) -> Result<()> {
    let result = sqlx::query("DELETE FROM dials WHERE id = ?")
        .bind(id)
        .execute(tx.conn())
        .await
        .storage_context("delete dial", id)?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound("Dial not found.".to_string()));
    }
    Ok(())
}
