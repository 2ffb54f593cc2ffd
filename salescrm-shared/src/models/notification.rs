/// In-app notifications
///
/// Notifications always belong to exactly one user and are only ever listed
/// for that user, regardless of role.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

/// Notification kinds emitted by the service
pub mod kind {
    pub const TASK_ASSIGNED: &str = "task_assigned";
    pub const LEAD_ASSIGNED: &str = "lead_assigned";
    pub const DEAL_ASSIGNED: &str = "deal_assigned";
    pub const LEAD_CONVERTED: &str = "lead_converted";
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub kind: &'static str,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationFilter {
    pub unread_only: Option<bool>,
}

impl Notification {
    pub async fn create(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        new: NewNotification,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (tenant_id, user_id, kind, title, message, link)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(new.user_id)
        .bind(new.kind)
        .bind(new.title)
        .bind(new.message)
        .bind(new.link)
        .fetch_one(executor)
        .await
    }

    /// Lists the user's notifications, newest first, with the unread count
    pub async fn list(
        pool: &PgPool,
        tenant_id: Uuid,
        user_id: Uuid,
        filter: &NotificationFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let unread_only = filter.unread_only.unwrap_or(false);
        let predicate = "tenant_id = $1 AND user_id = $2 AND (NOT $3 OR is_read = FALSE)";

        let notifications = sqlx::query_as::<_, Notification>(&format!(
            "SELECT * FROM notifications WHERE {predicate} ORDER BY created_at DESC LIMIT $4 OFFSET $5"
        ))
        .bind(tenant_id)
        .bind(user_id)
        .bind(unread_only)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM notifications WHERE {predicate}"))
            .bind(tenant_id)
            .bind(user_id)
            .bind(unread_only)
            .fetch_one(pool)
            .await?;

        Ok((notifications, total))
    }

    pub async fn unread_count(pool: &PgPool, tenant_id: Uuid, user_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE tenant_id = $1 AND user_id = $2 AND is_read = FALSE",
        )
        .bind(tenant_id)
        .bind(user_id)
        .fetch_one(pool)
        .await
    }

    /// `None` when the notification does not exist or belongs to someone else
    pub async fn mark_read(
        pool: &PgPool,
        tenant_id: Uuid,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Notification>(
            r#"
            UPDATE notifications SET is_read = TRUE
            WHERE id = $1 AND tenant_id = $2 AND user_id = $3
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Returns how many notifications changed
    pub async fn mark_all_read(pool: &PgPool, tenant_id: Uuid, user_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE WHERE tenant_id = $1 AND user_id = $2 AND is_read = FALSE",
        )
        .bind(tenant_id)
        .bind(user_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn delete(pool: &PgPool, tenant_id: Uuid, user_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND tenant_id = $2 AND user_id = $3")
            .bind(id)
            .bind(tenant_id)
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
