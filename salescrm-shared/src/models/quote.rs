/// Quotes, quote line items and terms & conditions
///
/// A quote is created in one transaction: allocate the next
/// `Q-<year>-<counter>` number from the tenant, insert the header, insert
/// the priced items, attach the selected terms (or the tenant's default
/// terms when none are chosen) and store the computed totals.
///
/// Totals, all rounded to two decimals:
///
/// ```text
/// line_total = quantity * unit_price * (1 - discount_percent / 100)
/// line_tax   = line_total * tax_rate / 100
/// subtotal   = sum(line_total)
/// tax_amount = sum(line_tax)
/// total      = subtotal - discount_amount + tax_amount
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;
use validator::Validate;

use super::tenant::Tenant;
use super::{line_total, round_money};
use crate::auth::scope::Owned;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "quote_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Draft,
    Sent,
    Accepted,
    Rejected,
    Expired,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteStatus::Draft => "draft",
            QuoteStatus::Sent => "sent",
            QuoteStatus::Accepted => "accepted",
            QuoteStatus::Rejected => "rejected",
            QuoteStatus::Expired => "expired",
        }
    }
}

const QUOTE_COLUMNS: &str = "q.*, a.name AS account_name, \
    TRIM(c.first_name || ' ' || COALESCE(c.last_name, '')) AS contact_name, \
    d.name AS deal_name, o.name AS owner_name";
const QUOTE_JOINS: &str = "quotes q \
    LEFT JOIN accounts a ON a.id = q.account_id \
    LEFT JOIN contacts c ON c.id = q.contact_id \
    LEFT JOIN deals d ON d.id = q.deal_id \
    LEFT JOIN users o ON o.id = q.owner_id";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub quote_number: String,
    pub title: String,
    pub deal_id: Option<Uuid>,
    pub account_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
    pub status: QuoteStatus,
    pub valid_until: Option<NaiveDate>,
    pub subtotal: f64,
    pub discount_amount: f64,
    pub tax_amount: f64,
    pub total: f64,
    pub notes: Option<String>,
    pub owner_id: Option<Uuid>,

    #[sqlx(default)]
    pub account_name: Option<String>,
    #[sqlx(default)]
    pub contact_name: Option<String>,
    #[sqlx(default)]
    pub deal_name: Option<String>,
    #[sqlx(default)]
    pub owner_name: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Owned for Quote {
    const RESOURCE: &'static str = "quote";

    fn owner_id(&self) -> Option<Uuid> {
        self.owner_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct QuoteLineItem {
    pub id: Uuid,
    pub quote_id: Uuid,
    pub product_id: Option<Uuid>,
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub discount_percent: f64,
    pub tax_rate: f64,
    pub line_total: f64,
    pub sort_order: i32,
}

/// A quote together with its items and selected terms
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteDetail {
    #[serde(flatten)]
    pub quote: Quote,
    pub items: Vec<QuoteLineItem>,
    pub terms: Vec<QuoteTerm>,
}

impl Owned for QuoteDetail {
    const RESOURCE: &'static str = "quote";

    fn owner_id(&self) -> Option<Uuid> {
        self.quote.owner_id
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QuoteLineInput {
    pub product_id: Option<Uuid>,
    #[validate(length(min = 1, max = 512, message = "Description is required"))]
    pub description: String,
    #[validate(range(exclusive_min = 0.0, message = "Quantity must be positive"))]
    pub quantity: f64,
    #[validate(range(min = 0.0, message = "Unit price cannot be negative"))]
    pub unit_price: f64,
    #[validate(range(min = 0.0, max = 100.0, message = "Discount must be between 0 and 100"))]
    #[serde(default)]
    pub discount_percent: f64,
    #[validate(range(min = 0.0, max = 100.0, message = "Tax rate must be between 0 and 100"))]
    #[serde(default)]
    pub tax_rate: f64,
}

impl QuoteLineInput {
    pub fn line_total(&self) -> f64 {
        line_total(self.quantity, self.unit_price, self.discount_percent)
    }

    pub fn line_tax(&self) -> f64 {
        self.line_total() * self.tax_rate / 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteTotals {
    pub subtotal: f64,
    pub tax_amount: f64,
    pub total: f64,
}

/// Computes quote totals from its lines and header discount
pub fn compute_totals(items: &[QuoteLineInput], discount_amount: f64) -> QuoteTotals {
    let subtotal = round_money(items.iter().map(QuoteLineInput::line_total).sum());
    let tax_amount = round_money(items.iter().map(QuoteLineInput::line_tax).sum());

    QuoteTotals {
        subtotal,
        tax_amount,
        total: round_money(subtotal - discount_amount + tax_amount),
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuote {
    #[validate(length(min = 1, max = 255, message = "Title is required (max 255 characters)"))]
    pub title: String,
    pub deal_id: Option<Uuid>,
    pub account_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
    pub status: Option<QuoteStatus>,
    pub valid_until: Option<NaiveDate>,
    #[validate(range(min = 0.0, message = "Discount cannot be negative"))]
    pub discount_amount: Option<f64>,
    pub notes: Option<String>,
    pub owner_id: Option<Uuid>,
    #[validate(nested)]
    #[serde(default)]
    pub items: Vec<QuoteLineInput>,
    /// Terms to attach; the tenant's default terms when absent
    pub term_ids: Option<Vec<Uuid>>,
}

/// Header changes plus optional wholesale replacement of items and terms
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuote {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    pub deal_id: Option<Uuid>,
    pub account_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
    pub status: Option<QuoteStatus>,
    pub valid_until: Option<NaiveDate>,
    #[validate(range(min = 0.0, message = "Discount cannot be negative"))]
    pub discount_amount: Option<f64>,
    pub notes: Option<String>,
    pub owner_id: Option<Uuid>,
    #[validate(nested)]
    pub items: Option<Vec<QuoteLineInput>>,
    pub term_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteFilter {
    pub status: Option<QuoteStatus>,
    pub account_id: Option<Uuid>,
    pub deal_id: Option<Uuid>,
}

impl Quote {
    /// Creates the quote, its items and term links atomically
    pub async fn create(
        pool: &PgPool,
        tenant_id: Uuid,
        owner_id: Uuid,
        data: CreateQuote,
    ) -> Result<QuoteDetail, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let quote_number = Tenant::next_quote_number(&mut *tx, tenant_id).await?;
        let discount_amount = data.discount_amount.unwrap_or(0.0);
        let totals = compute_totals(&data.items, discount_amount);

        let quote = sqlx::query_as::<_, Quote>(
            r#"
            INSERT INTO quotes (
                tenant_id, quote_number, title, deal_id, account_id, contact_id, status,
                valid_until, subtotal, discount_amount, tax_amount, total, notes, owner_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(&quote_number)
        .bind(data.title)
        .bind(data.deal_id)
        .bind(data.account_id)
        .bind(data.contact_id)
        .bind(data.status.unwrap_or(QuoteStatus::Draft))
        .bind(data.valid_until)
        .bind(totals.subtotal)
        .bind(discount_amount)
        .bind(totals.tax_amount)
        .bind(totals.total)
        .bind(data.notes)
        .bind(owner_id)
        .fetch_one(&mut *tx)
        .await?;

        insert_items(&mut tx, quote.id, &data.items).await?;

        match data.term_ids {
            Some(term_ids) => attach_terms(&mut tx, tenant_id, quote.id, &term_ids).await?,
            None => attach_default_terms(&mut tx, tenant_id, quote.id).await?,
        }

        tx.commit().await?;

        tracing::debug!(quote_id = %quote.id, quote_number = %quote_number, "Created quote");

        Self::find_detail(pool, tenant_id, quote.id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn find_by_id(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Quote>(&format!(
            "SELECT {QUOTE_COLUMNS} FROM {QUOTE_JOINS} WHERE q.id = $1 AND q.tenant_id = $2"
        ))
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_detail(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<QuoteDetail>, sqlx::Error> {
        let Some(quote) = Self::find_by_id(pool, tenant_id, id).await? else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, QuoteLineItem>(
            "SELECT * FROM quote_line_items WHERE quote_id = $1 ORDER BY sort_order ASC",
        )
        .bind(id)
        .fetch_all(pool)
        .await?;

        let terms = sqlx::query_as::<_, QuoteTerm>(
            r#"
            SELECT t.* FROM quote_terms t
            JOIN quote_selected_terms s ON s.term_id = t.id
            WHERE s.quote_id = $1
            ORDER BY t.sort_order ASC, t.title ASC
            "#,
        )
        .bind(id)
        .fetch_all(pool)
        .await?;

        Ok(Some(QuoteDetail { quote, items, terms }))
    }

    pub async fn list(
        pool: &PgPool,
        tenant_id: Uuid,
        filter: &QuoteFilter,
        scope_ids: Option<Vec<Uuid>>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let predicate = "q.tenant_id = $1 \
            AND ($2::uuid[] IS NULL OR q.owner_id = ANY($2)) \
            AND ($3::quote_status IS NULL OR q.status = $3) \
            AND ($4::uuid IS NULL OR q.account_id = $4) \
            AND ($5::uuid IS NULL OR q.deal_id = $5)";

        let quotes = sqlx::query_as::<_, Quote>(&format!(
            "SELECT {QUOTE_COLUMNS} FROM {QUOTE_JOINS} \
             WHERE {predicate} ORDER BY q.created_at DESC LIMIT $6 OFFSET $7"
        ))
        .bind(tenant_id)
        .bind(&scope_ids)
        .bind(filter.status)
        .bind(filter.account_id)
        .bind(filter.deal_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM quotes q WHERE {predicate}"))
            .bind(tenant_id)
            .bind(&scope_ids)
            .bind(filter.status)
            .bind(filter.account_id)
            .bind(filter.deal_id)
            .fetch_one(pool)
            .await?;

        Ok((quotes, total))
    }

    /// Applies header changes, replaces items/terms when given, and
    /// recomputes totals, all in one transaction
    pub async fn update(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
        data: UpdateQuote,
    ) -> Result<Option<QuoteDetail>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE quotes SET updated_at = NOW()");

        if let Some(title) = data.title {
            qb.push(", title = ").push_bind(title);
        }
        if let Some(deal_id) = data.deal_id {
            qb.push(", deal_id = ").push_bind(deal_id);
        }
        if let Some(account_id) = data.account_id {
            qb.push(", account_id = ").push_bind(account_id);
        }
        if let Some(contact_id) = data.contact_id {
            qb.push(", contact_id = ").push_bind(contact_id);
        }
        if let Some(status) = data.status {
            qb.push(", status = ").push_bind(status);
        }
        if let Some(valid_until) = data.valid_until {
            qb.push(", valid_until = ").push_bind(valid_until);
        }
        if let Some(discount_amount) = data.discount_amount {
            qb.push(", discount_amount = ").push_bind(discount_amount);
        }
        if let Some(notes) = data.notes {
            qb.push(", notes = ").push_bind(notes);
        }
        if let Some(owner_id) = data.owner_id {
            qb.push(", owner_id = ").push_bind(owner_id);
        }

        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" AND tenant_id = ").push_bind(tenant_id);
        qb.push(" RETURNING *");

        let Some(quote) = qb.build_query_as::<Quote>().fetch_optional(&mut *tx).await? else {
            return Ok(None);
        };

        let items = match data.items {
            Some(items) => {
                sqlx::query("DELETE FROM quote_line_items WHERE quote_id = $1")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                insert_items(&mut tx, id, &items).await?;
                items
            }
            None => load_line_inputs(&mut *tx, id).await?,
        };

        let totals = compute_totals(&items, quote.discount_amount);
        sqlx::query("UPDATE quotes SET subtotal = $2, tax_amount = $3, total = $4 WHERE id = $1")
            .bind(id)
            .bind(totals.subtotal)
            .bind(totals.tax_amount)
            .bind(totals.total)
            .execute(&mut *tx)
            .await?;

        if let Some(term_ids) = data.term_ids {
            sqlx::query("DELETE FROM quote_selected_terms WHERE quote_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            attach_terms(&mut tx, tenant_id, id, &term_ids).await?;
        }

        tx.commit().await?;

        Self::find_detail(pool, tenant_id, id).await
    }

    pub async fn delete(pool: &PgPool, tenant_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM quotes WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

async fn insert_items(
    tx: &mut Transaction<'_, Postgres>,
    quote_id: Uuid,
    items: &[QuoteLineInput],
) -> Result<(), sqlx::Error> {
    for (index, item) in items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO quote_line_items (
                quote_id, product_id, description, quantity, unit_price,
                discount_percent, tax_rate, line_total, sort_order
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(quote_id)
        .bind(item.product_id)
        .bind(&item.description)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.discount_percent)
        .bind(item.tax_rate)
        .bind(item.line_total())
        .bind(index as i32)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

async fn load_line_inputs(
    executor: impl PgExecutor<'_>,
    quote_id: Uuid,
) -> Result<Vec<QuoteLineInput>, sqlx::Error> {
    let rows = sqlx::query_as::<_, QuoteLineItem>(
        "SELECT * FROM quote_line_items WHERE quote_id = $1 ORDER BY sort_order ASC",
    )
    .bind(quote_id)
    .fetch_all(executor)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| QuoteLineInput {
            product_id: row.product_id,
            description: row.description,
            quantity: row.quantity,
            unit_price: row.unit_price,
            discount_percent: row.discount_percent,
            tax_rate: row.tax_rate,
        })
        .collect())
}

/// Links terms by id; ids from other tenants are ignored
async fn attach_terms(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: Uuid,
    quote_id: Uuid,
    term_ids: &[Uuid],
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO quote_selected_terms (quote_id, term_id)
        SELECT $1, id FROM quote_terms WHERE tenant_id = $2 AND id = ANY($3)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(quote_id)
    .bind(tenant_id)
    .bind(term_ids)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn attach_default_terms(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: Uuid,
    quote_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO quote_selected_terms (quote_id, term_id)
        SELECT $1, id FROM quote_terms WHERE tenant_id = $2 AND is_default
        "#,
    )
    .bind(quote_id)
    .bind(tenant_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Reusable terms & conditions paragraph
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct QuoteTerm {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub title: String,
    pub content: String,
    /// Attached to new quotes that do not pick terms explicitly
    pub is_default: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuoteTerm {
    #[validate(length(min = 1, max = 255, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Content is required"))]
    pub content: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuoteTerm {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[validate(length(min = 1))]
    pub content: Option<String>,
    pub is_default: Option<bool>,
    pub sort_order: Option<i32>,
}

impl QuoteTerm {
    pub async fn list(pool: &PgPool, tenant_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, QuoteTerm>(
            "SELECT * FROM quote_terms WHERE tenant_id = $1 ORDER BY sort_order ASC, title ASC",
        )
        .bind(tenant_id)
        .fetch_all(pool)
        .await
    }

    pub async fn create(
        pool: &PgPool,
        tenant_id: Uuid,
        data: CreateQuoteTerm,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, QuoteTerm>(
            r#"
            INSERT INTO quote_terms (tenant_id, title, content, is_default, sort_order)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(data.title)
        .bind(data.content)
        .bind(data.is_default)
        .bind(data.sort_order)
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
        data: UpdateQuoteTerm,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE quote_terms SET updated_at = NOW()");

        if let Some(title) = data.title {
            qb.push(", title = ").push_bind(title);
        }
        if let Some(content) = data.content {
            qb.push(", content = ").push_bind(content);
        }
        if let Some(is_default) = data.is_default {
            qb.push(", is_default = ").push_bind(is_default);
        }
        if let Some(sort_order) = data.sort_order {
            qb.push(", sort_order = ").push_bind(sort_order);
        }

        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" AND tenant_id = ").push_bind(tenant_id);
        qb.push(" RETURNING *");

        qb.build_query_as::<QuoteTerm>().fetch_optional(pool).await
    }

    pub async fn delete(pool: &PgPool, tenant_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM quote_terms WHERE id = $1 AND tenant_id = $2")
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

    fn item(quantity: f64, unit_price: f64, discount_percent: f64, tax_rate: f64) -> QuoteLineInput {
        QuoteLineInput {
            product_id: None,
            description: "Item".to_string(),
            quantity,
            unit_price,
            discount_percent,
            tax_rate,
        }
    }

    #[test]
    fn test_totals_without_discounts() {
        let totals = compute_totals(&[item(2.0, 50.0, 0.0, 0.0), item(1.0, 25.5, 0.0, 0.0)], 0.0);
        assert_eq!(totals.subtotal, 125.5);
        assert_eq!(totals.tax_amount, 0.0);
        assert_eq!(totals.total, 125.5);
    }

    #[test]
    fn test_totals_with_line_discount_tax_and_header_discount() {
        // 10 * 100 * 0.9 = 900, tax 18% = 162
        // 3 * 19.99 = 59.97, tax 5% = 2.9985
        let totals = compute_totals(&[item(10.0, 100.0, 10.0, 18.0), item(3.0, 19.99, 0.0, 5.0)], 50.0);

        assert_eq!(totals.subtotal, 959.97);
        assert_eq!(totals.tax_amount, 165.0);
        assert_eq!(totals.total, 1074.97);
    }

    #[test]
    fn test_empty_quote() {
        let totals = compute_totals(&[], 0.0);
        assert_eq!(totals, QuoteTotals { subtotal: 0.0, tax_amount: 0.0, total: 0.0 });
    }

    #[test]
    fn test_line_input_defaults() {
        let input: QuoteLineInput = serde_json::from_value(serde_json::json!({
            "description": "Onboarding",
            "quantity": 1,
            "unitPrice": 500
        }))
        .unwrap();

        assert_eq!(input.discount_percent, 0.0);
        assert_eq!(input.tax_rate, 0.0);
        assert_eq!(input.line_total(), 500.0);
    }

    #[test]
    fn test_nested_item_validation() {
        let quote = CreateQuote {
            title: "Proposal".to_string(),
            items: vec![item(0.0, 10.0, 0.0, 0.0)],
            ..Default::default()
        };
        assert!(quote.validate().is_err());

        let quote = CreateQuote {
            title: "Proposal".to_string(),
            items: vec![item(1.0, 10.0, 0.0, 0.0)],
            ..Default::default()
        };
        assert!(quote.validate().is_ok());
    }
}
