/// Email templates and outgoing emails
///
/// Templates use `{{variable}}` placeholders. Composing an email from a
/// template substitutes the supplied variables into subject and body;
/// placeholders without a value are left verbatim so they stay visible in
/// the draft.
///
/// Emails are stored as drafts. "Sending" marks the row `sent` and stamps
/// `sent_at`; delivery itself is handled outside this service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

use super::like_pattern;
use crate::auth::scope::Owned;

/// Replaces each `{{ name }}` with `vars[name]`
pub fn render_template(template: &str, vars: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];

        match after_open.find("}}") {
            Some(end) => {
                let key = after_open[..end].trim();
                match vars.get(key) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(&rest[start..start + 2 + end + 2]),
                }
                rest = &after_open[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct EmailTemplate {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub subject: String,
    pub body: String,
    pub category: Option<String>,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateEmailTemplate {
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 1, max = 512, message = "Subject is required"))]
    pub subject: String,
    #[validate(length(min = 1, message = "Body is required"))]
    pub body: String,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEmailTemplate {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 512))]
    pub subject: Option<String>,
    #[validate(length(min = 1))]
    pub body: Option<String>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailTemplateFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub is_active: Option<bool>,
}

impl EmailTemplate {
    pub async fn create(
        pool: &PgPool,
        tenant_id: Uuid,
        created_by: Uuid,
        data: CreateEmailTemplate,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, EmailTemplate>(
            r#"
            INSERT INTO email_templates (tenant_id, name, subject, body, category, is_active, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(data.name)
        .bind(data.subject)
        .bind(data.body)
        .bind(data.category)
        .bind(data.is_active.unwrap_or(true))
        .bind(created_by)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, EmailTemplate>(
            "SELECT * FROM email_templates WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list(
        pool: &PgPool,
        tenant_id: Uuid,
        filter: &EmailTemplateFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let search = like_pattern(&filter.search);
        let predicate = "tenant_id = $1 \
            AND ($2::text IS NULL OR name ILIKE $2 OR subject ILIKE $2) \
            AND ($3::text IS NULL OR category = $3) \
            AND ($4::boolean IS NULL OR is_active = $4)";

        let templates = sqlx::query_as::<_, EmailTemplate>(&format!(
            "SELECT * FROM email_templates WHERE {predicate} ORDER BY name ASC LIMIT $5 OFFSET $6"
        ))
        .bind(tenant_id)
        .bind(&search)
        .bind(&filter.category)
        .bind(filter.is_active)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM email_templates WHERE {predicate}"))
            .bind(tenant_id)
            .bind(&search)
            .bind(&filter.category)
            .bind(filter.is_active)
            .fetch_one(pool)
            .await?;

        Ok((templates, total))
    }

    pub async fn update(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
        data: UpdateEmailTemplate,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE email_templates SET updated_at = NOW()");

        if let Some(name) = data.name {
            qb.push(", name = ").push_bind(name);
        }
        if let Some(subject) = data.subject {
            qb.push(", subject = ").push_bind(subject);
        }
        if let Some(body) = data.body {
            qb.push(", body = ").push_bind(body);
        }
        if let Some(category) = data.category {
            qb.push(", category = ").push_bind(category);
        }
        if let Some(is_active) = data.is_active {
            qb.push(", is_active = ").push_bind(is_active);
        }

        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" AND tenant_id = ").push_bind(tenant_id);
        qb.push(" RETURNING *");

        qb.build_query_as::<EmailTemplate>().fetch_optional(pool).await
    }

    pub async fn delete(pool: &PgPool, tenant_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM email_templates WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "email_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EmailStatus {
    Draft,
    Sent,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Email {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub template_id: Option<Uuid>,
    pub to_address: String,
    pub cc: Option<String>,
    pub subject: String,
    pub body: String,
    pub status: EmailStatus,
    pub related_type: Option<String>,
    pub related_id: Option<Uuid>,
    pub sender_id: Option<Uuid>,
    pub sent_at: Option<DateTime<Utc>>,

    #[sqlx(default)]
    pub sender_name: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Owned for Email {
    const RESOURCE: &'static str = "email";

    fn owner_id(&self) -> Option<Uuid> {
        self.sender_id
    }
}

/// New draft, written directly or composed from a template
///
/// With `template_id`, missing `subject`/`body` come from the template and
/// `variables` are substituted into both.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ComposeEmail {
    pub template_id: Option<Uuid>,
    #[validate(email(message = "Invalid recipient address"))]
    pub to_address: String,
    #[validate(length(max = 1024))]
    pub cc: Option<String>,
    #[validate(length(min = 1, max = 512))]
    pub subject: Option<String>,
    pub body: Option<String>,
    #[serde(default)]
    pub variables: HashMap<String, String>,
    #[validate(length(max = 50))]
    pub related_type: Option<String>,
    pub related_id: Option<Uuid>,
}

/// Fully resolved draft ready to insert
#[derive(Debug, Clone, PartialEq)]
pub struct EmailDraft {
    pub template_id: Option<Uuid>,
    pub to_address: String,
    pub cc: Option<String>,
    pub subject: String,
    pub body: String,
    pub related_type: Option<String>,
    pub related_id: Option<Uuid>,
}

impl ComposeEmail {
    /// Resolves subject and body against an optional template; `None` when
    /// neither the request nor the template provides them
    pub fn into_draft(self, template: Option<&EmailTemplate>) -> Option<EmailDraft> {
        let subject = self.subject.or_else(|| template.map(|t| t.subject.clone()))?;
        let body = self.body.or_else(|| template.map(|t| t.body.clone()))?;

        Some(EmailDraft {
            template_id: template.map(|t| t.id),
            to_address: self.to_address,
            cc: self.cc,
            subject: render_template(&subject, &self.variables),
            body: render_template(&body, &self.variables),
            related_type: self.related_type,
            related_id: self.related_id,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailFilter {
    pub status: Option<EmailStatus>,
    pub related_type: Option<String>,
    pub related_id: Option<Uuid>,
}

impl Email {
    pub async fn create(
        pool: &PgPool,
        tenant_id: Uuid,
        sender_id: Uuid,
        draft: EmailDraft,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Email>(
            r#"
            WITH e AS (
                INSERT INTO emails (
                    tenant_id, template_id, to_address, cc, subject, body,
                    related_type, related_id, sender_id
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                RETURNING *
            )
            SELECT e.*, u.name AS sender_name FROM e LEFT JOIN users u ON u.id = e.sender_id
            "#,
        )
        .bind(tenant_id)
        .bind(draft.template_id)
        .bind(draft.to_address)
        .bind(draft.cc)
        .bind(draft.subject)
        .bind(draft.body)
        .bind(draft.related_type)
        .bind(draft.related_id)
        .bind(sender_id)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Email>(
            "SELECT e.*, u.name AS sender_name FROM emails e LEFT JOIN users u ON u.id = e.sender_id \
             WHERE e.id = $1 AND e.tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list(
        pool: &PgPool,
        tenant_id: Uuid,
        filter: &EmailFilter,
        scope_ids: Option<Vec<Uuid>>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let predicate = "e.tenant_id = $1 \
            AND ($2::uuid[] IS NULL OR e.sender_id = ANY($2)) \
            AND ($3::email_status IS NULL OR e.status = $3) \
            AND ($4::text IS NULL OR e.related_type = $4) \
            AND ($5::uuid IS NULL OR e.related_id = $5)";

        let emails = sqlx::query_as::<_, Email>(&format!(
            "SELECT e.*, u.name AS sender_name FROM emails e LEFT JOIN users u ON u.id = e.sender_id \
             WHERE {predicate} ORDER BY e.created_at DESC LIMIT $6 OFFSET $7"
        ))
        .bind(tenant_id)
        .bind(&scope_ids)
        .bind(filter.status)
        .bind(&filter.related_type)
        .bind(filter.related_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM emails e WHERE {predicate}"))
            .bind(tenant_id)
            .bind(&scope_ids)
            .bind(filter.status)
            .bind(&filter.related_type)
            .bind(filter.related_id)
            .fetch_one(pool)
            .await?;

        Ok((emails, total))
    }

    /// Marks a draft as sent; `None` when the email is missing or not a draft
    pub async fn mark_sent(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Email>(
            r#"
            WITH e AS (
                UPDATE emails SET status = 'sent', sent_at = NOW(), updated_at = NOW()
                WHERE id = $1 AND tenant_id = $2 AND status <> 'sent'
                RETURNING *
            )
            SELECT e.*, u.name AS sender_name FROM e LEFT JOIN users u ON u.id = e.sender_id
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, tenant_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM emails WHERE id = $1 AND tenant_id = $2")
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

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_render_substitutes_known_variables() {
        let rendered = render_template(
            "Hi {{firstName}}, your quote {{ quoteNumber }} is ready.",
            &vars(&[("firstName", "Ada"), ("quoteNumber", "Q-2025-00042")]),
        );
        assert_eq!(rendered, "Hi Ada, your quote Q-2025-00042 is ready.");
    }

    #[test]
    fn test_render_keeps_unknown_and_unclosed_placeholders() {
        let vars = vars(&[("name", "Ada")]);
        assert_eq!(render_template("{{name}} {{missing}}", &vars), "Ada {{missing}}");
        assert_eq!(render_template("Hello {{name", &vars), "Hello {{name");
        assert_eq!(render_template("no placeholders", &vars), "no placeholders");
    }

    #[test]
    fn test_render_repeated_placeholder() {
        let vars = vars(&[("x", "1")]);
        assert_eq!(render_template("{{x}}+{{x}}={{y}}", &vars), "1+1={{y}}");
    }

    fn template() -> EmailTemplate {
        EmailTemplate {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            name: "Follow-up".to_string(),
            subject: "Following up, {{name}}".to_string(),
            body: "Dear {{name}}, thanks for your time.".to_string(),
            category: None,
            is_active: true,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_compose_from_template() {
        let template = template();
        let compose = ComposeEmail {
            template_id: Some(template.id),
            to_address: "ada@example.com".to_string(),
            variables: vars(&[("name", "Ada")]),
            ..Default::default()
        };

        let draft = compose.into_draft(Some(&template)).unwrap();
        assert_eq!(draft.subject, "Following up, Ada");
        assert_eq!(draft.body, "Dear Ada, thanks for your time.");
        assert_eq!(draft.template_id, Some(template.id));
    }

    #[test]
    fn test_compose_override_and_missing_body() {
        let template = template();
        let compose = ComposeEmail {
            to_address: "ada@example.com".to_string(),
            subject: Some("Custom".to_string()),
            ..Default::default()
        };
        let draft = compose.clone().into_draft(Some(&template)).unwrap();
        assert_eq!(draft.subject, "Custom");

        assert!(compose.into_draft(None).is_none());
    }
}
