/// Leads
///
/// A lead is an unqualified prospect. Conversion turns it into an account
/// (when a company is known), a contact and optionally a deal, all inside
/// one transaction; the lead keeps links to what it became and is locked in
/// the `converted` status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use super::like_pattern;
use crate::auth::scope::Owned;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "lead_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    Unqualified,
    Converted,
}

impl LeadStatus {
    pub const ALL: [LeadStatus; 5] = [
        LeadStatus::New,
        LeadStatus::Contacted,
        LeadStatus::Qualified,
        LeadStatus::Unqualified,
        LeadStatus::Converted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Qualified => "qualified",
            LeadStatus::Unqualified => "unqualified",
            LeadStatus::Converted => "converted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }
}

const LEAD_COLUMNS: &str = "l.*, u.name AS assigned_to_name";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub first_name: String,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub source: Option<String>,
    pub status: LeadStatus,
    pub estimated_value: Option<f64>,
    pub notes: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub converted_account_id: Option<Uuid>,
    pub converted_contact_id: Option<Uuid>,
    pub converted_deal_id: Option<Uuid>,
    pub converted_at: Option<DateTime<Utc>>,

    #[sqlx(default)]
    pub assigned_to_name: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Owned for Lead {
    const RESOURCE: &'static str = "lead";

    fn owner_id(&self) -> Option<Uuid> {
        self.assigned_to
    }
}

impl Lead {
    pub fn is_converted(&self) -> bool {
        self.status == LeadStatus::Converted
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateLead {
    #[validate(length(min = 1, max = 100, message = "First name is required (max 100 characters)"))]
    pub first_name: String,
    #[validate(length(max = 100))]
    pub last_name: Option<String>,
    #[validate(length(max = 255))]
    pub company: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    #[validate(length(max = 100))]
    pub source: Option<String>,
    pub status: Option<LeadStatus>,
    #[validate(range(min = 0.0, message = "Estimated value cannot be negative"))]
    pub estimated_value: Option<f64>,
    pub notes: Option<String>,
    pub assigned_to: Option<Uuid>,
}

/// Partial update; `None` leaves a column untouched
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLead {
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(max = 100))]
    pub last_name: Option<String>,
    #[validate(length(max = 255))]
    pub company: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    #[validate(length(max = 100))]
    pub source: Option<String>,
    pub status: Option<LeadStatus>,
    #[validate(range(min = 0.0))]
    pub estimated_value: Option<f64>,
    pub notes: Option<String>,
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadFilter {
    pub search: Option<String>,
    pub status: Option<LeadStatus>,
    pub source: Option<String>,
    pub assigned_to: Option<Uuid>,
}

/// Ids of the records a conversion produced
#[derive(Debug, Clone, Copy)]
pub struct ConversionLinks {
    pub account_id: Option<Uuid>,
    pub contact_id: Uuid,
    pub deal_id: Option<Uuid>,
}

impl Lead {
    pub async fn create(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        assigned_to: Uuid,
        data: CreateLead,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Lead>(&format!(
            r#"
            WITH l AS (
                INSERT INTO leads (
                    tenant_id, first_name, last_name, company, email, phone, source,
                    status, estimated_value, notes, assigned_to
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                RETURNING *
            )
            SELECT {LEAD_COLUMNS} FROM l LEFT JOIN users u ON u.id = l.assigned_to
            "#
        ))
        .bind(tenant_id)
        .bind(data.first_name)
        .bind(data.last_name)
        .bind(data.company)
        .bind(data.email)
        .bind(data.phone)
        .bind(data.source)
        .bind(data.status.unwrap_or(LeadStatus::New))
        .bind(data.estimated_value)
        .bind(data.notes)
        .bind(assigned_to)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Lead>(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads l LEFT JOIN users u ON u.id = l.assigned_to \
             WHERE l.id = $1 AND l.tenant_id = $2"
        ))
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list(
        pool: &PgPool,
        tenant_id: Uuid,
        filter: &LeadFilter,
        scope_ids: Option<Vec<Uuid>>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let search = like_pattern(&filter.search);
        let predicate = "l.tenant_id = $1 \
            AND ($2::uuid[] IS NULL OR l.assigned_to = ANY($2)) \
            AND ($3::text IS NULL OR l.first_name ILIKE $3 OR l.last_name ILIKE $3 \
                 OR l.company ILIKE $3 OR l.email ILIKE $3) \
            AND ($4::lead_status IS NULL OR l.status = $4) \
            AND ($5::text IS NULL OR l.source = $5) \
            AND ($6::uuid IS NULL OR l.assigned_to = $6)";

        let leads = sqlx::query_as::<_, Lead>(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads l LEFT JOIN users u ON u.id = l.assigned_to \
             WHERE {predicate} ORDER BY l.created_at DESC LIMIT $7 OFFSET $8"
        ))
        .bind(tenant_id)
        .bind(&scope_ids)
        .bind(&search)
        .bind(filter.status)
        .bind(&filter.source)
        .bind(filter.assigned_to)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM leads l WHERE {predicate}"))
            .bind(tenant_id)
            .bind(&scope_ids)
            .bind(&search)
            .bind(filter.status)
            .bind(&filter.source)
            .bind(filter.assigned_to)
            .fetch_one(pool)
            .await?;

        Ok((leads, total))
    }

    pub async fn update(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
        data: UpdateLead,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE leads SET updated_at = NOW()");

        if let Some(first_name) = data.first_name {
            qb.push(", first_name = ").push_bind(first_name);
        }
        if let Some(last_name) = data.last_name {
            qb.push(", last_name = ").push_bind(last_name);
        }
        if let Some(company) = data.company {
            qb.push(", company = ").push_bind(company);
        }
        if let Some(email) = data.email {
            qb.push(", email = ").push_bind(email);
        }
        if let Some(phone) = data.phone {
            qb.push(", phone = ").push_bind(phone);
        }
        if let Some(source) = data.source {
            qb.push(", source = ").push_bind(source);
        }
        if let Some(status) = data.status {
            qb.push(", status = ").push_bind(status);
        }
        if let Some(estimated_value) = data.estimated_value {
            qb.push(", estimated_value = ").push_bind(estimated_value);
        }
        if let Some(notes) = data.notes {
            qb.push(", notes = ").push_bind(notes);
        }
        if let Some(assigned_to) = data.assigned_to {
            qb.push(", assigned_to = ").push_bind(assigned_to);
        }

        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" AND tenant_id = ").push_bind(tenant_id);
        qb.push(" RETURNING id");

        let Some(id) = qb.build_query_scalar::<Uuid>().fetch_optional(pool).await? else {
            return Ok(None);
        };
        Self::find_by_id(pool, tenant_id, id).await
    }

    /// Records the outcome of a conversion
    ///
    /// Guarded on the current status so two concurrent conversions cannot
    /// both succeed; returns `None` if the lead was already converted.
    pub async fn mark_converted(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        id: Uuid,
        links: ConversionLinks,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Lead>(&format!(
            r#"
            WITH l AS (
                UPDATE leads SET
                    status = 'converted',
                    converted_account_id = $3,
                    converted_contact_id = $4,
                    converted_deal_id = $5,
                    converted_at = NOW(),
                    updated_at = NOW()
                WHERE id = $1 AND tenant_id = $2 AND status <> 'converted'
                RETURNING *
            )
            SELECT {LEAD_COLUMNS} FROM l LEFT JOIN users u ON u.id = l.assigned_to
            "#
        ))
        .bind(id)
        .bind(tenant_id)
        .bind(links.account_id)
        .bind(links.contact_id)
        .bind(links.deal_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn delete(pool: &PgPool, tenant_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM leads WHERE id = $1 AND tenant_id = $2")
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
    fn test_status_parse() {
        assert_eq!(LeadStatus::parse("qualified"), Some(LeadStatus::Qualified));
        assert_eq!(LeadStatus::parse(" Contacted "), Some(LeadStatus::Contacted));
        assert_eq!(LeadStatus::parse("won"), None);
    }

    #[test]
    fn test_status_serde() {
        let status: LeadStatus = serde_json::from_str("\"unqualified\"").unwrap();
        assert_eq!(status, LeadStatus::Unqualified);
        assert_eq!(serde_json::to_string(&LeadStatus::New).unwrap(), "\"new\"");
    }

    #[test]
    fn test_create_validation() {
        let lead = CreateLead {
            first_name: "Jane".to_string(),
            estimated_value: Some(-5.0),
            ..Default::default()
        };
        let errors = lead.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("estimated_value"));
    }
}
