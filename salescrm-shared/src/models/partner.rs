/// Channel partners (resellers, referrers, integrators)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use super::like_pattern;
use crate::auth::scope::Owned;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Partner {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub partner_type: Option<String>,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Percent of deal value
    pub commission_rate: Option<f64>,
    pub is_active: bool,
    pub notes: Option<String>,
    pub owner_id: Option<Uuid>,

    #[sqlx(default)]
    pub owner_name: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Owned for Partner {
    const RESOURCE: &'static str = "partner";

    fn owner_id(&self) -> Option<Uuid> {
        self.owner_id
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePartner {
    #[validate(length(min = 1, max = 255, message = "Name is required (max 255 characters)"))]
    pub name: String,
    #[validate(length(max = 100))]
    pub partner_type: Option<String>,
    #[validate(length(max = 255))]
    pub contact_person: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    #[validate(range(min = 0.0, max = 100.0, message = "Commission rate must be between 0 and 100"))]
    pub commission_rate: Option<f64>,
    pub is_active: Option<bool>,
    pub notes: Option<String>,
    pub owner_id: Option<Uuid>,
}

/// Partial update; `None` leaves a column untouched
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePartner {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(max = 100))]
    pub partner_type: Option<String>,
    #[validate(length(max = 255))]
    pub contact_person: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    #[validate(range(min = 0.0, max = 100.0, message = "Commission rate must be between 0 and 100"))]
    pub commission_rate: Option<f64>,
    pub is_active: Option<bool>,
    pub notes: Option<String>,
    pub owner_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerFilter {
    pub search: Option<String>,
    pub partner_type: Option<String>,
    pub is_active: Option<bool>,
}

impl Partner {
    pub async fn create(
        pool: &PgPool,
        tenant_id: Uuid,
        owner_id: Uuid,
        data: CreatePartner,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Partner>(
            r#"
            WITH p AS (
                INSERT INTO partners (
                    tenant_id, name, partner_type, contact_person, email, phone,
                    commission_rate, is_active, notes, owner_id
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                RETURNING *
            )
            SELECT p.*, o.name AS owner_name FROM p LEFT JOIN users o ON o.id = p.owner_id
            "#,
        )
        .bind(tenant_id)
        .bind(data.name)
        .bind(data.partner_type)
        .bind(data.contact_person)
        .bind(data.email)
        .bind(data.phone)
        .bind(data.commission_rate)
        .bind(data.is_active.unwrap_or(true))
        .bind(data.notes)
        .bind(owner_id)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Partner>(
            "SELECT p.*, o.name AS owner_name FROM partners p LEFT JOIN users o ON o.id = p.owner_id \
             WHERE p.id = $1 AND p.tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list(
        pool: &PgPool,
        tenant_id: Uuid,
        filter: &PartnerFilter,
        scope_ids: Option<Vec<Uuid>>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let search = like_pattern(&filter.search);
        let predicate = "p.tenant_id = $1 \
            AND ($2::uuid[] IS NULL OR p.owner_id = ANY($2)) \
            AND ($3::text IS NULL OR p.name ILIKE $3 OR p.contact_person ILIKE $3 OR p.email ILIKE $3) \
            AND ($4::text IS NULL OR p.partner_type = $4) \
            AND ($5::boolean IS NULL OR p.is_active = $5)";

        let partners = sqlx::query_as::<_, Partner>(&format!(
            "SELECT p.*, o.name AS owner_name FROM partners p LEFT JOIN users o ON o.id = p.owner_id \
             WHERE {predicate} ORDER BY p.name ASC LIMIT $6 OFFSET $7"
        ))
        .bind(tenant_id)
        .bind(&scope_ids)
        .bind(&search)
        .bind(&filter.partner_type)
        .bind(filter.is_active)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM partners p WHERE {predicate}"))
            .bind(tenant_id)
            .bind(&scope_ids)
            .bind(&search)
            .bind(&filter.partner_type)
            .bind(filter.is_active)
            .fetch_one(pool)
            .await?;

        Ok((partners, total))
    }

    pub async fn update(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
        data: UpdatePartner,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE partners SET updated_at = NOW()");

        if let Some(name) = data.name {
            qb.push(", name = ").push_bind(name);
        }
        if let Some(partner_type) = data.partner_type {
            qb.push(", partner_type = ").push_bind(partner_type);
        }
        if let Some(contact_person) = data.contact_person {
            qb.push(", contact_person = ").push_bind(contact_person);
        }
        if let Some(email) = data.email {
            qb.push(", email = ").push_bind(email);
        }
        if let Some(phone) = data.phone {
            qb.push(", phone = ").push_bind(phone);
        }
        if let Some(commission_rate) = data.commission_rate {
            qb.push(", commission_rate = ").push_bind(commission_rate);
        }
        if let Some(is_active) = data.is_active {
            qb.push(", is_active = ").push_bind(is_active);
        }
        if let Some(notes) = data.notes {
            qb.push(", notes = ").push_bind(notes);
        }
        if let Some(owner_id) = data.owner_id {
            qb.push(", owner_id = ").push_bind(owner_id);
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
        let result = sqlx::query("DELETE FROM partners WHERE id = $1 AND tenant_id = $2")
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
    fn test_commission_rate_bounds() {
        let partner = CreatePartner {
            name: "Channel Co".to_string(),
            commission_rate: Some(12.5),
            ..Default::default()
        };
        assert!(partner.validate().is_ok());

        let partner = CreatePartner {
            name: "Channel Co".to_string(),
            commission_rate: Some(120.0),
            ..Default::default()
        };
        assert!(partner.validate().is_err());
    }
}
