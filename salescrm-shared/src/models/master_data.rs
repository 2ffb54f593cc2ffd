/// Master dropdown values
///
/// Flat `(category, value, label)` lookups that populate pick lists in the
/// UI: industries, lead sources, account types, activity types and so on.
/// Categories are free-form strings; values are unique within a category.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MasterDropdown {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub category: String,
    pub value: String,
    pub label: String,
    pub sort_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateMasterDropdown {
    pub category: String,
    pub value: String,
    pub label: String,
    pub sort_order: i32,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateMasterDropdown {
    pub value: Option<String>,
    pub label: Option<String>,
    pub sort_order: Option<i32>,
    pub is_active: Option<bool>,
}

impl MasterDropdown {
    pub async fn list(
        pool: &PgPool,
        tenant_id: Uuid,
        category: &str,
        include_inactive: bool,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, MasterDropdown>(
            r#"
            SELECT * FROM master_dropdowns
            WHERE tenant_id = $1 AND category = $2 AND ($3 OR is_active)
            ORDER BY sort_order ASC, label ASC
            "#,
        )
        .bind(tenant_id)
        .bind(category)
        .bind(include_inactive)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, MasterDropdown>(
            "SELECT * FROM master_dropdowns WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(
        pool: &PgPool,
        tenant_id: Uuid,
        data: CreateMasterDropdown,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, MasterDropdown>(
            r#"
            INSERT INTO master_dropdowns (tenant_id, category, value, label, sort_order)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(data.category)
        .bind(data.value)
        .bind(data.label)
        .bind(data.sort_order)
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
        data: UpdateMasterDropdown,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE master_dropdowns SET updated_at = NOW()");

        if let Some(value) = data.value {
            qb.push(", value = ").push_bind(value);
        }
        if let Some(label) = data.label {
            qb.push(", label = ").push_bind(label);
        }
        if let Some(sort_order) = data.sort_order {
            qb.push(", sort_order = ").push_bind(sort_order);
        }
        if let Some(is_active) = data.is_active {
            qb.push(", is_active = ").push_bind(is_active);
        }

        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" AND tenant_id = ").push_bind(tenant_id);
        qb.push(" RETURNING *");

        qb.build_query_as::<MasterDropdown>().fetch_optional(pool).await
    }

    pub async fn delete(pool: &PgPool, tenant_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM master_dropdowns WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Normalises a category path segment (`Lead-Sources` -> `lead_sources`)
pub fn normalize_category(raw: &str) -> Option<String> {
    let normalized: String = raw
        .trim()
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c.to_ascii_lowercase() })
        .collect();

    let valid = !normalized.is_empty()
        && normalized.len() <= 50
        && normalized.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    valid.then_some(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_category() {
        assert_eq!(normalize_category("industry").as_deref(), Some("industry"));
        assert_eq!(normalize_category("Lead-Sources").as_deref(), Some("lead_sources"));
        assert_eq!(normalize_category(" deal types ").as_deref(), Some("deal_types"));
        assert_eq!(normalize_category(""), None);
        assert_eq!(normalize_category("drop;table"), None);
        assert_eq!(normalize_category(&"x".repeat(51)), None);
    }
}
