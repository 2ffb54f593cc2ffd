/// Contacts (people, optionally attached to an account)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use super::like_pattern;
use crate::auth::scope::Owned;

const CONTACT_COLUMNS: &str = "c.*, a.name AS account_name, o.name AS owner_name";
const CONTACT_LOOKUPS: &str = "LEFT JOIN accounts a ON a.id = c.account_id LEFT JOIN users o ON o.id = c.owner_id";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub account_id: Option<Uuid>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub mobile: Option<String>,
    pub job_title: Option<String>,
    pub department: Option<String>,
    pub notes: Option<String>,
    pub owner_id: Option<Uuid>,

    #[sqlx(default)]
    pub account_name: Option<String>,
    #[sqlx(default)]
    pub owner_name: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Owned for Contact {
    const RESOURCE: &'static str = "contact";

    fn owner_id(&self) -> Option<Uuid> {
        self.owner_id
    }
}

impl Contact {
    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateContact {
    pub account_id: Option<Uuid>,
    #[validate(length(min = 1, max = 100, message = "First name is required (max 100 characters)"))]
    pub first_name: String,
    #[validate(length(max = 100))]
    pub last_name: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    #[validate(length(max = 50))]
    pub mobile: Option<String>,
    #[validate(length(max = 100))]
    pub job_title: Option<String>,
    #[validate(length(max = 100))]
    pub department: Option<String>,
    pub notes: Option<String>,
    pub owner_id: Option<Uuid>,
}

/// Partial update; `None` leaves a column untouched
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContact {
    pub account_id: Option<Uuid>,
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(max = 100))]
    pub last_name: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    #[validate(length(max = 50))]
    pub mobile: Option<String>,
    #[validate(length(max = 100))]
    pub job_title: Option<String>,
    #[validate(length(max = 100))]
    pub department: Option<String>,
    pub notes: Option<String>,
    pub owner_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactFilter {
    pub search: Option<String>,
    pub account_id: Option<Uuid>,
    pub owner_id: Option<Uuid>,
}

impl Contact {
    pub async fn create(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        owner_id: Uuid,
        data: CreateContact,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Contact>(&format!(
            r#"
            WITH c AS (
                INSERT INTO contacts (
                    tenant_id, account_id, first_name, last_name, email, phone, mobile,
                    job_title, department, notes, owner_id
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                RETURNING *
            )
            SELECT {CONTACT_COLUMNS} FROM c {CONTACT_LOOKUPS}
            "#
        ))
        .bind(tenant_id)
        .bind(data.account_id)
        .bind(data.first_name)
        .bind(data.last_name)
        .bind(data.email)
        .bind(data.phone)
        .bind(data.mobile)
        .bind(data.job_title)
        .bind(data.department)
        .bind(data.notes)
        .bind(owner_id)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Contact>(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts c {CONTACT_LOOKUPS} WHERE c.id = $1 AND c.tenant_id = $2"
        ))
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list(
        pool: &PgPool,
        tenant_id: Uuid,
        filter: &ContactFilter,
        scope_ids: Option<Vec<Uuid>>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let search = like_pattern(&filter.search);
        let predicate = "c.tenant_id = $1 \
            AND ($2::uuid[] IS NULL OR c.owner_id = ANY($2)) \
            AND ($3::text IS NULL OR c.first_name ILIKE $3 OR c.last_name ILIKE $3 OR c.email ILIKE $3) \
            AND ($4::uuid IS NULL OR c.account_id = $4) \
            AND ($5::uuid IS NULL OR c.owner_id = $5)";

        let contacts = sqlx::query_as::<_, Contact>(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts c {CONTACT_LOOKUPS} \
             WHERE {predicate} ORDER BY c.created_at DESC LIMIT $6 OFFSET $7"
        ))
        .bind(tenant_id)
        .bind(&scope_ids)
        .bind(&search)
        .bind(filter.account_id)
        .bind(filter.owner_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM contacts c WHERE {predicate}"))
            .bind(tenant_id)
            .bind(&scope_ids)
            .bind(&search)
            .bind(filter.account_id)
            .bind(filter.owner_id)
            .fetch_one(pool)
            .await?;

        Ok((contacts, total))
    }

    pub async fn update(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
        data: UpdateContact,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE contacts SET updated_at = NOW()");

        if let Some(account_id) = data.account_id {
            qb.push(", account_id = ").push_bind(account_id);
        }
        if let Some(first_name) = data.first_name {
            qb.push(", first_name = ").push_bind(first_name);
        }
        if let Some(last_name) = data.last_name {
            qb.push(", last_name = ").push_bind(last_name);
        }
        if let Some(email) = data.email {
            qb.push(", email = ").push_bind(email);
        }
        if let Some(phone) = data.phone {
            qb.push(", phone = ").push_bind(phone);
        }
        if let Some(mobile) = data.mobile {
            qb.push(", mobile = ").push_bind(mobile);
        }
        if let Some(job_title) = data.job_title {
            qb.push(", job_title = ").push_bind(job_title);
        }
        if let Some(department) = data.department {
            qb.push(", department = ").push_bind(department);
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
        let result = sqlx::query("DELETE FROM contacts WHERE id = $1 AND tenant_id = $2")
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

    fn contact(first: &str, last: Option<&str>) -> Contact {
        Contact {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            account_id: None,
            first_name: first.to_string(),
            last_name: last.map(str::to_string),
            email: None,
            phone: None,
            mobile: None,
            job_title: None,
            department: None,
            notes: None,
            owner_id: None,
            account_name: None,
            owner_name: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_full_name() {
        assert_eq!(contact("Ada", Some("Lovelace")).full_name(), "Ada Lovelace");
        assert_eq!(contact("Ada", None).full_name(), "Ada");
        assert_eq!(contact("Ada", Some("")).full_name(), "Ada");
    }

    #[test]
    fn test_create_requires_first_name() {
        assert!(CreateContact::default().validate().is_err());
        assert!(CreateContact {
            first_name: "Grace".to_string(),
            ..Default::default()
        }
        .validate()
        .is_ok());
    }
}
