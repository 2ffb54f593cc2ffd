/// Booked sales
///
/// A sales entry records revenue attributed to one salesperson on one day.
/// They feed the monthly trend and top-performer dashboards.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use crate::auth::scope::Owned;

const SALES_COLUMNS: &str = "s.*, u.name AS salesperson_name, a.name AS account_name, p.name AS product_name";
const SALES_LOOKUPS: &str = "LEFT JOIN users u ON u.id = s.salesperson_id \
    LEFT JOIN accounts a ON a.id = s.account_id \
    LEFT JOIN products p ON p.id = s.product_id";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SalesEntry {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub salesperson_id: Option<Uuid>,
    pub account_id: Option<Uuid>,
    pub deal_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub quantity: f64,
    pub amount: f64,
    pub sale_date: NaiveDate,
    pub notes: Option<String>,

    #[sqlx(default)]
    pub salesperson_name: Option<String>,
    #[sqlx(default)]
    pub account_name: Option<String>,
    #[sqlx(default)]
    pub product_name: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Owned for SalesEntry {
    const RESOURCE: &'static str = "sales entry";

    fn owner_id(&self) -> Option<Uuid> {
        self.salesperson_id
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSalesEntry {
    /// Defaults to the creating user
    pub salesperson_id: Option<Uuid>,
    pub account_id: Option<Uuid>,
    pub deal_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    #[validate(range(exclusive_min = 0.0, message = "Quantity must be positive"))]
    pub quantity: Option<f64>,
    #[validate(range(min = 0.0, message = "Amount cannot be negative"))]
    pub amount: f64,
    /// Defaults to today
    pub sale_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Partial update; `None` leaves a column untouched
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSalesEntry {
    pub salesperson_id: Option<Uuid>,
    pub account_id: Option<Uuid>,
    pub deal_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    #[validate(range(exclusive_min = 0.0))]
    pub quantity: Option<f64>,
    #[validate(range(min = 0.0))]
    pub amount: Option<f64>,
    pub sale_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesEntryFilter {
    pub salesperson_id: Option<Uuid>,
    pub account_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl SalesEntry {
    pub async fn create(
        pool: &PgPool,
        tenant_id: Uuid,
        salesperson_id: Uuid,
        data: CreateSalesEntry,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, SalesEntry>(&format!(
            r#"
            WITH s AS (
                INSERT INTO sales_entries (
                    tenant_id, salesperson_id, account_id, deal_id, product_id,
                    quantity, amount, sale_date, notes
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, COALESCE($8, CURRENT_DATE), $9)
                RETURNING *
            )
            SELECT {SALES_COLUMNS} FROM s {SALES_LOOKUPS}
            "#
        ))
        .bind(tenant_id)
        .bind(salesperson_id)
        .bind(data.account_id)
        .bind(data.deal_id)
        .bind(data.product_id)
        .bind(data.quantity.unwrap_or(1.0))
        .bind(data.amount)
        .bind(data.sale_date)
        .bind(data.notes)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, SalesEntry>(&format!(
            "SELECT {SALES_COLUMNS} FROM sales_entries s {SALES_LOOKUPS} WHERE s.id = $1 AND s.tenant_id = $2"
        ))
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list(
        pool: &PgPool,
        tenant_id: Uuid,
        filter: &SalesEntryFilter,
        scope_ids: Option<Vec<Uuid>>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let predicate = "s.tenant_id = $1 \
            AND ($2::uuid[] IS NULL OR s.salesperson_id = ANY($2)) \
            AND ($3::uuid IS NULL OR s.salesperson_id = $3) \
            AND ($4::uuid IS NULL OR s.account_id = $4) \
            AND ($5::date IS NULL OR s.sale_date >= $5) \
            AND ($6::date IS NULL OR s.sale_date <= $6)";

        let entries = sqlx::query_as::<_, SalesEntry>(&format!(
            "SELECT {SALES_COLUMNS} FROM sales_entries s {SALES_LOOKUPS} \
             WHERE {predicate} ORDER BY s.sale_date DESC, s.created_at DESC LIMIT $7 OFFSET $8"
        ))
        .bind(tenant_id)
        .bind(&scope_ids)
        .bind(filter.salesperson_id)
        .bind(filter.account_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM sales_entries s WHERE {predicate}"))
            .bind(tenant_id)
            .bind(&scope_ids)
            .bind(filter.salesperson_id)
            .bind(filter.account_id)
            .bind(filter.from)
            .bind(filter.to)
            .fetch_one(pool)
            .await?;

        Ok((entries, total))
    }

    pub async fn update(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
        data: UpdateSalesEntry,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE sales_entries SET updated_at = NOW()");

        if let Some(salesperson_id) = data.salesperson_id {
            qb.push(", salesperson_id = ").push_bind(salesperson_id);
        }
        if let Some(account_id) = data.account_id {
            qb.push(", account_id = ").push_bind(account_id);
        }
        if let Some(deal_id) = data.deal_id {
            qb.push(", deal_id = ").push_bind(deal_id);
        }
        if let Some(product_id) = data.product_id {
            qb.push(", product_id = ").push_bind(product_id);
        }
        if let Some(quantity) = data.quantity {
            qb.push(", quantity = ").push_bind(quantity);
        }
        if let Some(amount) = data.amount {
            qb.push(", amount = ").push_bind(amount);
        }
        if let Some(sale_date) = data.sale_date {
            qb.push(", sale_date = ").push_bind(sale_date);
        }
        if let Some(notes) = data.notes {
            qb.push(", notes = ").push_bind(notes);
        }

        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" AND tenant_id = ").push_bind(tenant_id);
        qb.push(" RETURNING id");

        let Some(id) = qb.build_query_scalar::<Uuid>().fetch_optional(pool).await? else {
            return Ok(None);
        };
        Self::find_by_id(pool, tenant_id, id).await
    }

    pub async fn delete(pool: &PgPool, tenant_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sales_entries WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation() {
        let entry = CreateSalesEntry {
            amount: 250.0,
            ..Default::default()
        };
        assert!(entry.validate().is_ok());

        let entry = CreateSalesEntry {
            amount: -1.0,
            ..Default::default()
        };
        assert!(entry.validate().is_err());
    }

    #[test]
    fn test_filter_from_query_keys() {
        let filter: SalesEntryFilter = serde_json::from_value(serde_json::json!({
            "from": "2025-01-01",
            "to": "2025-01-31"
        }))
        .unwrap();
        assert_eq!(filter.from, NaiveDate::from_ymd_opt(2025, 1, 1));
        assert_eq!(filter.to, NaiveDate::from_ymd_opt(2025, 1, 31));
    }
}
