/// Tenants
///
/// A tenant is one organisation using the CRM. All other tables hang off
/// `tenant_id` and every query filters on it.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE tenants (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(255) NOT NULL,
///     quote_counter INTEGER NOT NULL DEFAULT 0,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,

    /// Last quote sequence number handed out
    pub quote_counter: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    pub async fn create(executor: impl PgExecutor<'_>, name: &str) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Tenant>("INSERT INTO tenants (name) VALUES ($1) RETURNING *")
            .bind(name)
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Allocates the next quote number
    ///
    /// The increment happens in a single `UPDATE ... RETURNING`, so
    /// concurrent quote creation never hands out the same number twice.
    pub async fn next_quote_number(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
    ) -> Result<String, sqlx::Error> {
        let counter: i32 = sqlx::query_scalar(
            "UPDATE tenants SET quote_counter = quote_counter + 1, updated_at = NOW() \
             WHERE id = $1 RETURNING quote_counter",
        )
        .bind(tenant_id)
        .fetch_one(executor)
        .await?;

        Ok(format_quote_number(Utc::now().year(), counter))
    }
}

/// `Q-<year>-<counter>` with the counter zero-padded to five digits
pub fn format_quote_number(year: i32, counter: i32) -> String {
    format!("Q-{}-{:05}", year, counter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_quote_number() {
        assert_eq!(format_quote_number(2025, 1), "Q-2025-00001");
        assert_eq!(format_quote_number(2025, 4321), "Q-2025-04321");
        assert_eq!(format_quote_number(2026, 123456), "Q-2026-123456");
    }
}
