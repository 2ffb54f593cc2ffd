/// Accounts (customer companies)
///
/// # Schema
///
/// ```sql
/// CREATE TABLE accounts (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
///     name VARCHAR(255) NOT NULL,
///     industry VARCHAR(100),
///     account_type VARCHAR(100),
///     website VARCHAR(512),
///     phone VARCHAR(50),
///     email VARCHAR(255),
///     address TEXT,
///     city VARCHAR(100),
///     country VARCHAR(100),
///     annual_revenue DOUBLE PRECISION,
///     employee_count INTEGER,
///     description TEXT,
///     owner_id UUID REFERENCES users(id) ON DELETE SET NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use super::like_pattern;
use crate::auth::scope::Owned;

const ACCOUNT_COLUMNS: &str = "a.*, o.name AS owner_name";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub industry: Option<String>,
    pub account_type: Option<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub annual_revenue: Option<f64>,
    pub employee_count: Option<i32>,
    pub description: Option<String>,
    pub owner_id: Option<Uuid>,

    #[sqlx(default)]
    pub owner_name: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Owned for Account {
    const RESOURCE: &'static str = "account";

    fn owner_id(&self) -> Option<Uuid> {
        self.owner_id
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccount {
    #[validate(length(min = 1, max = 255, message = "Name is required (max 255 characters)"))]
    pub name: String,
    #[validate(length(max = 100))]
    pub industry: Option<String>,
    #[validate(length(max = 100))]
    pub account_type: Option<String>,
    #[validate(length(max = 512))]
    pub website: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub address: Option<String>,
    #[validate(length(max = 100))]
    pub city: Option<String>,
    #[validate(length(max = 100))]
    pub country: Option<String>,
    #[validate(range(min = 0.0, message = "Annual revenue cannot be negative"))]
    pub annual_revenue: Option<f64>,
    #[validate(range(min = 0, message = "Employee count cannot be negative"))]
    pub employee_count: Option<i32>,
    pub description: Option<String>,
    /// Defaults to the creating user
    pub owner_id: Option<Uuid>,
}

/// Partial update; `None` leaves a column untouched
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccount {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(max = 100))]
    pub industry: Option<String>,
    #[validate(length(max = 100))]
    pub account_type: Option<String>,
    #[validate(length(max = 512))]
    pub website: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub address: Option<String>,
    #[validate(length(max = 100))]
    pub city: Option<String>,
    #[validate(length(max = 100))]
    pub country: Option<String>,
    #[validate(range(min = 0.0))]
    pub annual_revenue: Option<f64>,
    #[validate(range(min = 0))]
    pub employee_count: Option<i32>,
    pub description: Option<String>,
    pub owner_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountFilter {
    pub search: Option<String>,
    pub industry: Option<String>,
    pub owner_id: Option<Uuid>,
}

impl Account {
    pub async fn create(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        owner_id: Uuid,
        data: CreateAccount,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Account>(&format!(
            r#"
            WITH a AS (
                INSERT INTO accounts (
                    tenant_id, name, industry, account_type, website, phone, email,
                    address, city, country, annual_revenue, employee_count, description, owner_id
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                RETURNING *
            )
            SELECT {ACCOUNT_COLUMNS} FROM a LEFT JOIN users o ON o.id = a.owner_id
            "#
        ))
        .bind(tenant_id)
        .bind(data.name)
        .bind(data.industry)
        .bind(data.account_type)
        .bind(data.website)
        .bind(data.phone)
        .bind(data.email)
        .bind(data.address)
        .bind(data.city)
        .bind(data.country)
        .bind(data.annual_revenue)
        .bind(data.employee_count)
        .bind(data.description)
        .bind(owner_id)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts a LEFT JOIN users o ON o.id = a.owner_id \
             WHERE a.id = $1 AND a.tenant_id = $2"
        ))
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
    }

    /// Lists accounts owned by `scope_ids` (all owners when `None`)
    pub async fn list(
        pool: &PgPool,
        tenant_id: Uuid,
        filter: &AccountFilter,
        scope_ids: Option<Vec<Uuid>>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let search = like_pattern(&filter.search);
        let predicate = "a.tenant_id = $1 \
            AND ($2::uuid[] IS NULL OR a.owner_id = ANY($2)) \
            AND ($3::text IS NULL OR a.name ILIKE $3 OR a.email ILIKE $3 OR a.city ILIKE $3) \
            AND ($4::text IS NULL OR a.industry = $4) \
            AND ($5::uuid IS NULL OR a.owner_id = $5)";

        let accounts = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts a LEFT JOIN users o ON o.id = a.owner_id \
             WHERE {predicate} ORDER BY a.created_at DESC LIMIT $6 OFFSET $7"
        ))
        .bind(tenant_id)
        .bind(&scope_ids)
        .bind(&search)
        .bind(&filter.industry)
        .bind(filter.owner_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM accounts a WHERE {predicate}"))
            .bind(tenant_id)
            .bind(&scope_ids)
            .bind(&search)
            .bind(&filter.industry)
            .bind(filter.owner_id)
            .fetch_one(pool)
            .await?;

        Ok((accounts, total))
    }

    pub async fn update(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
        data: UpdateAccount,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE accounts SET updated_at = NOW()");

        if let Some(name) = data.name {
            qb.push(", name = ").push_bind(name);
        }
        if let Some(industry) = data.industry {
            qb.push(", industry = ").push_bind(industry);
        }
        if let Some(account_type) = data.account_type {
            qb.push(", account_type = ").push_bind(account_type);
        }
        if let Some(website) = data.website {
            qb.push(", website = ").push_bind(website);
        }
        if let Some(phone) = data.phone {
            qb.push(", phone = ").push_bind(phone);
        }
        if let Some(email) = data.email {
            qb.push(", email = ").push_bind(email);
        }
        if let Some(address) = data.address {
            qb.push(", address = ").push_bind(address);
        }
        if let Some(city) = data.city {
            qb.push(", city = ").push_bind(city);
        }
        if let Some(country) = data.country {
            qb.push(", country = ").push_bind(country);
        }
        if let Some(annual_revenue) = data.annual_revenue {
            qb.push(", annual_revenue = ").push_bind(annual_revenue);
        }
        if let Some(employee_count) = data.employee_count {
            qb.push(", employee_count = ").push_bind(employee_count);
        }
        if let Some(description) = data.description {
            qb.push(", description = ").push_bind(description);
        }
        if let Some(owner_id) = data.owner_id {
            qb.push(", owner_id = ").push_bind(owner_id);
        }

        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" AND tenant_id = ").push_bind(tenant_id);
        qb.push(" RETURNING id");

        // Re-read through the joins so display names match get/list
        let Some(id) = qb.build_query_scalar::<Uuid>().fetch_optional(pool).await? else {
            return Ok(None);
        };
        Self::find_by_id(pool, tenant_id, id).await
    }

    pub async fn delete(pool: &PgPool, tenant_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1 AND tenant_id = $2")
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
    fn test_create_validation() {
        let valid = CreateAccount {
            name: "Acme Corp".to_string(),
            email: Some("sales@acme.test".to_string()),
            annual_revenue: Some(1_500_000.0),
            ..Default::default()
        };
        assert!(valid.validate().is_ok());

        let empty_name = CreateAccount::default();
        assert!(empty_name.validate().is_err());

        let bad_email = CreateAccount {
            name: "Acme".to_string(),
            email: Some("not-an-email".to_string()),
            ..Default::default()
        };
        let errors = bad_email.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("email"));

        let negative = CreateAccount {
            name: "Acme".to_string(),
            employee_count: Some(-1),
            ..Default::default()
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_deserialize_camel_case() {
        let data: CreateAccount = serde_json::from_value(serde_json::json!({
            "name": "Globex",
            "accountType": "customer",
            "annualRevenue": 42.5,
            "employeeCount": 12
        }))
        .unwrap();

        assert_eq!(data.account_type.as_deref(), Some("customer"));
        assert_eq!(data.annual_revenue, Some(42.5));
        assert_eq!(data.employee_count, Some(12));
        assert!(data.owner_id.is_none());
    }

    #[test]
    fn test_owner_label() {
        assert_eq!(<Account as Owned>::RESOURCE, "account");
    }
}
