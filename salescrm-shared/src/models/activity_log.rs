/// Activity log
///
/// Append-only audit trail of mutations. Writes are best-effort: a failed
/// insert is logged and never fails the request that caused it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLog {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub details: serde_json::Value,

    #[sqlx(default)]
    pub user_name: Option<String>,

    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogAction {
    Create,
    Update,
    Delete,
    Convert,
    Send,
    Import,
}

impl LogAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogAction::Create => "create",
            LogAction::Update => "update",
            LogAction::Delete => "delete",
            LogAction::Convert => "convert",
            LogAction::Send => "send",
            LogAction::Import => "import",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLogFilter {
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub action: Option<String>,
    pub user_id: Option<Uuid>,
}

impl ActivityLog {
    /// Records an entry, logging instead of failing on error
    pub async fn record(
        pool: &PgPool,
        tenant_id: Uuid,
        user_id: Uuid,
        action: LogAction,
        entity_type: &str,
        entity_id: Option<Uuid>,
        details: serde_json::Value,
    ) {
        let result = sqlx::query(
            r#"
            INSERT INTO activity_logs (tenant_id, user_id, action, entity_type, entity_id, details)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .bind(action.as_str())
        .bind(entity_type)
        .bind(entity_id)
        .bind(details)
        .execute(pool)
        .await;

        if let Err(e) = result {
            tracing::warn!(
                error = %e,
                action = action.as_str(),
                entity_type,
                "Failed to record activity log entry"
            );
        }
    }

    /// Lists entries whose actor is within `scope_ids`, newest first
    pub async fn list(
        pool: &PgPool,
        tenant_id: Uuid,
        filter: &ActivityLogFilter,
        scope_ids: Option<Vec<Uuid>>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let predicate = "l.tenant_id = $1 \
            AND ($2::uuid[] IS NULL OR l.user_id = ANY($2)) \
            AND ($3::text IS NULL OR l.entity_type = $3) \
            AND ($4::uuid IS NULL OR l.entity_id = $4) \
            AND ($5::text IS NULL OR l.action = $5) \
            AND ($6::uuid IS NULL OR l.user_id = $6)";

        let entries = sqlx::query_as::<_, ActivityLog>(&format!(
            "SELECT l.*, u.name AS user_name FROM activity_logs l LEFT JOIN users u ON u.id = l.user_id \
             WHERE {predicate} ORDER BY l.created_at DESC LIMIT $7 OFFSET $8"
        ))
        .bind(tenant_id)
        .bind(&scope_ids)
        .bind(&filter.entity_type)
        .bind(filter.entity_id)
        .bind(&filter.action)
        .bind(filter.user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM activity_logs l WHERE {predicate}"))
            .bind(tenant_id)
            .bind(&scope_ids)
            .bind(&filter.entity_type)
            .bind(filter.entity_id)
            .bind(&filter.action)
            .bind(filter.user_id)
            .fetch_one(pool)
            .await?;

        Ok((entries, total))
    }
}
