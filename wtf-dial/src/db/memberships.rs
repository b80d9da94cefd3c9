//! Membership persistence
//!
//! CRUD over `dial_memberships` rows. No business rules live here: value
//! validation and recompute triggering belong to the service layer.

use crate::pagination::limit_offset;
use crate::tx::Tx;
use sqlx::{FromRow, Row};
use wtf_common::db::{DialMembership, DialMembershipFilter};
use wtf_common::error::StorageContext;
use wtf_common::{DialId, Error, Result, UserId};

const MEMBERSHIP_COLUMNS: &str = "dial_id, user_id, value, created_at, updated_at";

/// Find one membership by its composite identity
pub async fn find_membership_by_id(
    tx: &mut Tx,
    dial_id: DialId,
    user_id: UserId,
) -> Result<DialMembership> {
    let sql = format!(
        "SELECT {} FROM dial_memberships WHERE dial_id = ? AND user_id = ?",
        MEMBERSHIP_COLUMNS
    );
    sqlx::query_as::<_, DialMembership>(&sql)
        .bind(dial_id)
        .bind(user_id)
        .fetch_optional(tx.conn())
        .await
        .storage_context("find membership", dial_id)?
        .ok_or_else(|| Error::NotFound("Dial membership not found.".to_string()))
}

/// Find memberships matching `filter`, plus the total matching count
pub async fn find_memberships(
    tx: &mut Tx,
    filter: &DialMembershipFilter,
) -> Result<(Vec<DialMembership>, i64)> {
    let page = limit_offset(filter.limit, filter.offset);
    let sql = format!(
        r#"
        SELECT {}, COUNT(*) OVER() AS total
        FROM dial_memberships
        WHERE (?1 IS NULL OR dial_id = ?1)
          AND (?2 IS NULL OR user_id = ?2)
        ORDER BY dial_id ASC, user_id ASC
        LIMIT ?3 OFFSET ?4
        "#,
        MEMBERSHIP_COLUMNS
    );

    let rows = sqlx::query(&sql)
        .bind(filter.dial_id)
        .bind(filter.user_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(tx.conn())
        .await
        .query_context("find memberships")?;

    let mut total = 0;
    let mut memberships = Vec::with_capacity(rows.len());
    for row in &rows {
        total = row.try_get("total").query_context("decode memberships")?;
        memberships.push(DialMembership::from_row(row).query_context("decode memberships")?);
    }

    Ok((memberships, total))
}

/// Insert a new membership
///
/// Fails with `Conflict` if the user is already a member.
pub async fn insert_membership(
    tx: &mut Tx,
    dial_id: DialId,
    user_id: UserId,
    value: i64,
) -> Result<DialMembership> {
    let now = tx.now();
    let sql = format!(
        r#"
        INSERT INTO dial_memberships (dial_id, user_id, value, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        RETURNING {}
        "#,
        MEMBERSHIP_COLUMNS
    );
    let membership = sqlx::query_as::<_, DialMembership>(&sql)
        .bind(dial_id)
        .bind(user_id)
        .bind(value)
        .bind(now)
        .bind(now)
        .fetch_one(tx.conn())
        .await
        .storage_context("insert membership", dial_id)
        .map_err(|e| match e {
            Error::Conflict(_) => Error::Conflict("Already a member of this dial.".to_string()),
            other => other,
        })?;

    tracing::debug!(dial_id, user_id, "Inserted membership");
    Ok(membership)
}

/// Insert a membership or overwrite the value of an existing one
pub async fn upsert_membership(
    tx: &mut Tx,
    dial_id: DialId,
    user_id: UserId,
    value: i64,
) -> Result<DialMembership> {
    let now = tx.now();
    let sql = format!(
        r#"
        INSERT INTO dial_memberships (dial_id, user_id, value, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT (dial_id, user_id) DO UPDATE SET
            value = excluded.value,
            updated_at = excluded.updated_at
        RETURNING {}
        "#,
        MEMBERSHIP_COLUMNS
    );
    let membership = sqlx::query_as::<_, DialMembership>(&sql)
        .bind(dial_id)
        .bind(user_id)
        .bind(value)
        .bind(now)
        .bind(now)
        .fetch_one(tx.conn())
        .await
        .storage_context("upsert membership", dial_id)?;

    tracing::debug!(dial_id, user_id, value, "Upserted membership");
    Ok(membership)
}

/// Delete a membership
pub async fn delete_membership(tx: &mut Tx, dial_id: DialId, user_id: UserId) -> Result<()> {
    let result = sqlx::query("DELETE FROM dial_memberships WHERE dial_id = ? AND user_id = ?")
        .bind(dial_id)
        .bind(user_id)
        .execute(tx.conn())
        .await
        .storage_context("delete membership", dial_id)?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound("Dial membership not found.".to_string()));
    }

    tracing::debug!(dial_id, user_id, "Deleted membership");
    Ok(())
}

/// Current member values of a dial
pub async fn list_member_values(tx: &mut Tx, dial_id: DialId) -> Result<Vec<i64>> {
    sqlx::query_scalar("SELECT value FROM dial_memberships WHERE dial_id = ?")
        .bind(dial_id)
        .fetch_all(tx.conn())
        .await
        .storage_context("read member values", dial_id)
}

/// Current member user ids of a dial, ascending
pub async fn list_member_ids(tx: &mut Tx, dial_id: DialId) -> Result<Vec<UserId>> {
    sqlx::query_scalar("SELECT user_id FROM dial_memberships WHERE dial_id = ? ORDER BY user_id")
        .bind(dial_id)
        .fetch_all(tx.conn())
        .await
        .storage_context("read members", dial_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::dials::create_dial;
    use crate::db::test_support::TestDb;

    #[tokio::test]
    async fn test_find_memberships_failure_names_operation() {
        let db = TestDb::new().await;
        let mut tx = db.begin().await;
        sqlx::query("ALTER TABLE dial_memberships RENAME TO memberships_moved")
            .execute(tx.conn())
            .await
            .unwrap();

        let err = find_memberships(&mut tx, &DialMembershipFilter::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Storage failure during find memberships");
        assert_eq!(err.code(), wtf_common::ErrorCode::Internal);
    }

    #[tokio::test]
    async fn test_upsert_overwrites_value() {
        let db = TestDb::new().await;
        let mut tx = db.begin().await;
        let dial = create_dial(&mut tx, 1, "Team").await.unwrap();

        let first = upsert_membership(&mut tx, dial.id, 2, 10).await.unwrap();
        let second = upsert_membership(&mut tx, dial.id, 2, 30).await.unwrap();

        assert_eq!(first.value, 10);
        assert_eq!(second.value, 30);
        assert_eq!(second.created_at, first.created_at);

        let (all, total) = find_memberships(
            &mut tx,
            &DialMembershipFilter {
                dial_id: Some(dial.id),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(total, 1, "upsert must not duplicate the (dial, user) row");
        assert_eq!(all[0].value, 30);
    }

    #[tokio::test]
    async fn test_insert_duplicate_is_conflict() {
        let db = TestDb::new().await;
        let mut tx = db.begin().await;
        let dial = create_dial(&mut tx, 1, "Team").await.unwrap();

        insert_membership(&mut tx, dial.id, 1, 0).await.unwrap();
        let err = insert_membership(&mut tx, dial.id, 1, 0).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn test_membership_for_missing_dial_is_not_found() {
        let db = TestDb::new().await;
        let mut tx = db.begin().await;
        let err = upsert_membership(&mut tx, 777, 1, 5).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_and_find() {
        let db = TestDb::new().await;
        let mut tx = db.begin().await;
        let dial = create_dial(&mut tx, 1, "Team").await.unwrap();
        upsert_membership(&mut tx, dial.id, 3, 50).await.unwrap();

        assert_eq!(find_membership_by_id(&mut tx, dial.id, 3).await.unwrap().value, 50);

        delete_membership(&mut tx, dial.id, 3).await.unwrap();
        let err = find_membership_by_id(&mut tx, dial.id, 3).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let err = delete_membership(&mut tx, dial.id, 3).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_filter_by_user_and_paginate() {
        let db = TestDb::new().await;
        let mut tx = db.begin().await;
        let a = create_dial(&mut tx, 1, "A").await.unwrap();
        let b = create_dial(&mut tx, 1, "B").await.unwrap();
        for user in 1..=3 {
            upsert_membership(&mut tx, a.id, user, user * 10).await.unwrap();
        }
        upsert_membership(&mut tx, b.id, 2, 0).await.unwrap();

        let (mine, total) = find_memberships(
            &mut tx,
            &DialMembershipFilter {
                user_id: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(total, 2);
        assert_eq!(mine.len(), 2);

        let (page, total) = find_memberships(
            &mut tx,
            &DialMembershipFilter {
                dial_id: Some(a.id),
                limit: Some(2),
                offset: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.iter().map(|m| m.user_id).collect::<Vec<_>>(), vec![2, 3]);

        assert_eq!(list_member_ids(&mut tx, a.id).await.unwrap(), vec![1, 2, 3]);
        let mut values = list_member_values(&mut tx, a.id).await.unwrap();
        values.sort();
        assert_eq!(values, vec![10, 20, 30]);
    }
}
