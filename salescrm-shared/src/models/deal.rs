/// Deals, their line items and activity timeline
///
/// Stage drives probability: moving a deal to a new stage resets its
/// probability to the stage default unless the caller sets one explicitly,
/// and entering a closed stage stamps `actual_close_date`.
///
/// | Stage         | Default probability |
/// |---------------|---------------------|
/// | prospecting   | 10                  |
/// | qualification | 25                  |
/// | proposal      | 50                  |
/// | negotiation   | 75                  |
/// | closed_won    | 100                 |
/// | closed_lost   | 0                   |
///
/// When a deal has line items its `amount` is the sum of their totals and is
/// recomputed whenever an item is added or removed.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use super::{like_pattern, line_total};
use crate::auth::scope::Owned;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "deal_stage", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DealStage {
    Prospecting,
    Qualification,
    Proposal,
    Negotiation,
    ClosedWon,
    ClosedLost,
}

impl DealStage {
    pub const ALL: [DealStage; 6] = [
        DealStage::Prospecting,
        DealStage::Qualification,
        DealStage::Proposal,
        DealStage::Negotiation,
        DealStage::ClosedWon,
        DealStage::ClosedLost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DealStage::Prospecting => "prospecting",
            DealStage::Qualification => "qualification",
            DealStage::Proposal => "proposal",
            DealStage::Negotiation => "negotiation",
            DealStage::ClosedWon => "closed_won",
            DealStage::ClosedLost => "closed_lost",
        }
    }

    pub fn default_probability(&self) -> i32 {
        match self {
            DealStage::Prospecting => 10,
            DealStage::Qualification => 25,
            DealStage::Proposal => 50,
            DealStage::Negotiation => 75,
            DealStage::ClosedWon => 100,
            DealStage::ClosedLost => 0,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, DealStage::ClosedWon | DealStage::ClosedLost)
    }
}

const DEAL_COLUMNS: &str = "d.*, a.name AS account_name, \
    TRIM(c.first_name || ' ' || COALESCE(c.last_name, '')) AS contact_name, o.name AS owner_name";
const DEAL_LOOKUPS: &str = "LEFT JOIN accounts a ON a.id = d.account_id \
    LEFT JOIN contacts c ON c.id = d.contact_id \
    LEFT JOIN users o ON o.id = d.owner_id";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub account_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
    pub partner_id: Option<Uuid>,
    pub lead_id: Option<Uuid>,
    pub stage: DealStage,
    pub amount: f64,
    pub probability: i32,
    pub expected_close_date: Option<NaiveDate>,
    pub actual_close_date: Option<NaiveDate>,
    pub lost_reason: Option<String>,
    pub description: Option<String>,
    pub owner_id: Option<Uuid>,

    #[sqlx(default)]
    pub account_name: Option<String>,
    #[sqlx(default)]
    pub contact_name: Option<String>,
    #[sqlx(default)]
    pub owner_name: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Owned for Deal {
    const RESOURCE: &'static str = "deal";

    fn owner_id(&self) -> Option<Uuid> {
        self.owner_id
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeal {
    #[validate(length(min = 1, max = 255, message = "Name is required (max 255 characters)"))]
    pub name: String,
    pub account_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
    pub partner_id: Option<Uuid>,
    pub lead_id: Option<Uuid>,
    pub stage: Option<DealStage>,
    #[validate(range(min = 0.0, message = "Amount cannot be negative"))]
    pub amount: Option<f64>,
    #[validate(range(min = 0, max = 100, message = "Probability must be between 0 and 100"))]
    pub probability: Option<i32>,
    pub expected_close_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub owner_id: Option<Uuid>,
}

/// Partial update; `None` leaves a column untouched
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDeal {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub account_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
    pub partner_id: Option<Uuid>,
    pub stage: Option<DealStage>,
    #[validate(range(min = 0.0))]
    pub amount: Option<f64>,
    #[validate(range(min = 0, max = 100, message = "Probability must be between 0 and 100"))]
    pub probability: Option<i32>,
    pub expected_close_date: Option<NaiveDate>,
    pub actual_close_date: Option<NaiveDate>,
    pub lost_reason: Option<String>,
    pub description: Option<String>,
    pub owner_id: Option<Uuid>,

    /// Set by [`UpdateDeal::apply_stage_rules`] when a closed deal reopens
    #[serde(skip)]
    pub clear_close_date: bool,
}

impl UpdateDeal {
    /// Fills in the side effects of a stage change against `current`
    pub fn apply_stage_rules(&mut self, current: &Deal, today: NaiveDate) {
        let Some(stage) = self.stage else {
            return;
        };
        if stage == current.stage {
            return;
        }

        if self.probability.is_none() {
            self.probability = Some(stage.default_probability());
        }

        if stage.is_closed() {
            if self.actual_close_date.is_none() {
                self.actual_close_date = Some(today);
            }
        } else if current.stage.is_closed() {
            self.clear_close_date = true;
            self.actual_close_date = None;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealFilter {
    pub search: Option<String>,
    pub stage: Option<DealStage>,
    pub account_id: Option<Uuid>,
    pub owner_id: Option<Uuid>,
}

impl Deal {
    pub async fn create(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        owner_id: Uuid,
        data: CreateDeal,
    ) -> Result<Self, sqlx::Error> {
        let stage = data.stage.unwrap_or(DealStage::Prospecting);
        let probability = data.probability.unwrap_or_else(|| stage.default_probability());
        let actual_close_date = stage.is_closed().then(|| Utc::now().date_naive());

        sqlx::query_as::<_, Deal>(&format!(
            r#"
            WITH d AS (
                INSERT INTO deals (
                    tenant_id, name, account_id, contact_id, partner_id, lead_id, stage,
                    amount, probability, expected_close_date, actual_close_date, description, owner_id
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                RETURNING *
            )
            SELECT {DEAL_COLUMNS} FROM d {DEAL_LOOKUPS}
            "#
        ))
        .bind(tenant_id)
        .bind(data.name)
        .bind(data.account_id)
        .bind(data.contact_id)
        .bind(data.partner_id)
        .bind(data.lead_id)
        .bind(stage)
        .bind(data.amount.unwrap_or(0.0))
        .bind(probability)
        .bind(data.expected_close_date)
        .bind(actual_close_date)
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
        sqlx::query_as::<_, Deal>(&format!(
            "SELECT {DEAL_COLUMNS} FROM deals d {DEAL_LOOKUPS} WHERE d.id = $1 AND d.tenant_id = $2"
        ))
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list(
        pool: &PgPool,
        tenant_id: Uuid,
        filter: &DealFilter,
        scope_ids: Option<Vec<Uuid>>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let search = like_pattern(&filter.search);
        let predicate = "d.tenant_id = $1 \
            AND ($2::uuid[] IS NULL OR d.owner_id = ANY($2)) \
            AND ($3::text IS NULL OR d.name ILIKE $3) \
            AND ($4::deal_stage IS NULL OR d.stage = $4) \
            AND ($5::uuid IS NULL OR d.account_id = $5) \
            AND ($6::uuid IS NULL OR d.owner_id = $6)";

        let deals = sqlx::query_as::<_, Deal>(&format!(
            "SELECT {DEAL_COLUMNS} FROM deals d {DEAL_LOOKUPS} \
             WHERE {predicate} ORDER BY d.created_at DESC LIMIT $7 OFFSET $8"
        ))
        .bind(tenant_id)
        .bind(&scope_ids)
        .bind(&search)
        .bind(filter.stage)
        .bind(filter.account_id)
        .bind(filter.owner_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM deals d WHERE {predicate}"))
            .bind(tenant_id)
            .bind(&scope_ids)
            .bind(&search)
            .bind(filter.stage)
            .bind(filter.account_id)
            .bind(filter.owner_id)
            .fetch_one(pool)
            .await?;

        Ok((deals, total))
    }

    pub async fn update(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
        data: UpdateDeal,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE deals SET updated_at = NOW()");

        if let Some(name) = data.name {
            qb.push(", name = ").push_bind(name);
        }
        if let Some(account_id) = data.account_id {
            qb.push(", account_id = ").push_bind(account_id);
        }
        if let Some(contact_id) = data.contact_id {
            qb.push(", contact_id = ").push_bind(contact_id);
        }
        if let Some(partner_id) = data.partner_id {
            qb.push(", partner_id = ").push_bind(partner_id);
        }
        if let Some(stage) = data.stage {
            qb.push(", stage = ").push_bind(stage);
        }
        if let Some(amount) = data.amount {
            qb.push(", amount = ").push_bind(amount);
        }
        if let Some(probability) = data.probability {
            qb.push(", probability = ").push_bind(probability);
        }
        if let Some(expected_close_date) = data.expected_close_date {
            qb.push(", expected_close_date = ").push_bind(expected_close_date);
        }
        if data.clear_close_date {
            qb.push(", actual_close_date = NULL");
        } else if let Some(actual_close_date) = data.actual_close_date {
            qb.push(", actual_close_date = ").push_bind(actual_close_date);
        }
        if let Some(lost_reason) = data.lost_reason {
            qb.push(", lost_reason = ").push_bind(lost_reason);
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

        let Some(id) = qb.build_query_scalar::<Uuid>().fetch_optional(pool).await? else {
            return Ok(None);
        };
        Self::find_by_id(pool, tenant_id, id).await
    }

    pub async fn delete(pool: &PgPool, tenant_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM deals WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Sets `amount` to the sum of the deal's line items
    pub async fn recompute_amount(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<f64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            UPDATE deals SET
                amount = COALESCE((SELECT ROUND(SUM(total)::numeric, 2)::float8 FROM deal_line_items WHERE deal_id = $1), 0),
                updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING amount
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_one(executor)
        .await
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DealLineItem {
    pub id: Uuid,
    pub deal_id: Uuid,
    pub product_id: Option<Uuid>,
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub discount_percent: f64,
    pub total: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateDealLineItem {
    pub product_id: Option<Uuid>,
    #[validate(length(min = 1, max = 512, message = "Description is required"))]
    pub description: String,
    #[validate(range(exclusive_min = 0.0, message = "Quantity must be positive"))]
    pub quantity: f64,
    #[validate(range(min = 0.0, message = "Unit price cannot be negative"))]
    pub unit_price: f64,
    #[validate(range(min = 0.0, max = 100.0, message = "Discount must be between 0 and 100"))]
    pub discount_percent: Option<f64>,
}

impl DealLineItem {
    pub async fn list(
        pool: &PgPool,
        deal_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, DealLineItem>(
            "SELECT * FROM deal_line_items WHERE deal_id = $1 ORDER BY created_at ASC",
        )
        .bind(deal_id)
        .fetch_all(pool)
        .await
    }

    pub async fn create(
        executor: impl PgExecutor<'_>,
        deal_id: Uuid,
        data: CreateDealLineItem,
    ) -> Result<Self, sqlx::Error> {
        let discount = data.discount_percent.unwrap_or(0.0);
        let total = line_total(data.quantity, data.unit_price, discount);

        sqlx::query_as::<_, DealLineItem>(
            r#"
            INSERT INTO deal_line_items (deal_id, product_id, description, quantity, unit_price, discount_percent, total)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(deal_id)
        .bind(data.product_id)
        .bind(data.description)
        .bind(data.quantity)
        .bind(data.unit_price)
        .bind(discount)
        .bind(total)
        .fetch_one(executor)
        .await
    }

    pub async fn delete(
        executor: impl PgExecutor<'_>,
        deal_id: Uuid,
        id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM deal_line_items WHERE id = $1 AND deal_id = $2")
            .bind(id)
            .bind(deal_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DealActivity {
    pub id: Uuid,
    pub deal_id: Uuid,
    pub activity_type: String,
    pub subject: String,
    pub description: Option<String>,
    pub activity_date: DateTime<Utc>,
    pub created_by: Option<Uuid>,

    #[sqlx(default)]
    pub created_by_name: Option<String>,

    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateDealActivity {
    #[validate(length(min = 1, max = 50, message = "Activity type is required"))]
    pub activity_type: String,
    #[validate(length(min = 1, max = 255, message = "Subject is required"))]
    pub subject: String,
    pub description: Option<String>,
    /// Defaults to now
    pub activity_date: Option<DateTime<Utc>>,
}

impl DealActivity {
    pub async fn list(pool: &PgPool, deal_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, DealActivity>(
            r#"
            SELECT da.*, u.name AS created_by_name
            FROM deal_activities da
            LEFT JOIN users u ON u.id = da.created_by
            WHERE da.deal_id = $1
            ORDER BY da.activity_date DESC
            "#,
        )
        .bind(deal_id)
        .fetch_all(pool)
        .await
    }

    pub async fn create(
        pool: &PgPool,
        deal_id: Uuid,
        created_by: Uuid,
        data: CreateDealActivity,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, DealActivity>(
            r#"
            WITH da AS (
                INSERT INTO deal_activities (deal_id, activity_type, subject, description, activity_date, created_by)
                VALUES ($1, $2, $3, $4, COALESCE($5, NOW()), $6)
                RETURNING *
            )
            SELECT da.*, u.name AS created_by_name FROM da LEFT JOIN users u ON u.id = da.created_by
            "#,
        )
        .bind(deal_id)
        .bind(data.activity_type)
        .bind(data.subject)
        .bind(data.description)
        .bind(data.activity_date)
        .bind(created_by)
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deal_in(stage: DealStage) -> Deal {
        Deal {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            name: "Renewal".to_string(),
            account_id: None,
            contact_id: None,
            partner_id: None,
            lead_id: None,
            stage,
            amount: 1000.0,
            probability: stage.default_probability(),
            expected_close_date: None,
            actual_close_date: None,
            lost_reason: None,
            description: None,
            owner_id: None,
            account_name: None,
            contact_name: None,
            owner_name: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    #[test]
    fn test_stage_probabilities() {
        assert_eq!(DealStage::Prospecting.default_probability(), 10);
        assert_eq!(DealStage::Negotiation.default_probability(), 75);
        assert_eq!(DealStage::ClosedWon.default_probability(), 100);
        assert_eq!(DealStage::ClosedLost.default_probability(), 0);
        assert!(DealStage::ClosedLost.is_closed());
        assert!(!DealStage::Proposal.is_closed());
    }

    #[test]
    fn test_stage_change_sets_probability() {
        let mut update = UpdateDeal {
            stage: Some(DealStage::Proposal),
            ..Default::default()
        };
        update.apply_stage_rules(&deal_in(DealStage::Qualification), today());

        assert_eq!(update.probability, Some(50));
        assert_eq!(update.actual_close_date, None);
        assert!(!update.clear_close_date);
    }

    #[test]
    fn test_explicit_probability_wins() {
        let mut update = UpdateDeal {
            stage: Some(DealStage::Proposal),
            probability: Some(40),
            ..Default::default()
        };
        update.apply_stage_rules(&deal_in(DealStage::Prospecting), today());
        assert_eq!(update.probability, Some(40));
    }

    #[test]
    fn test_closing_stamps_close_date() {
        let mut update = UpdateDeal {
            stage: Some(DealStage::ClosedWon),
            ..Default::default()
        };
        update.apply_stage_rules(&deal_in(DealStage::Negotiation), today());

        assert_eq!(update.probability, Some(100));
        assert_eq!(update.actual_close_date, Some(today()));
    }

    #[test]
    fn test_reopening_clears_close_date() {
        let mut update = UpdateDeal {
            stage: Some(DealStage::Negotiation),
            ..Default::default()
        };
        update.apply_stage_rules(&deal_in(DealStage::ClosedLost), today());

        assert!(update.clear_close_date);
        assert_eq!(update.probability, Some(75));
    }

    #[test]
    fn test_same_stage_is_noop() {
        let mut update = UpdateDeal {
            stage: Some(DealStage::Proposal),
            ..Default::default()
        };
        update.apply_stage_rules(&deal_in(DealStage::Proposal), today());
        assert_eq!(update.probability, None);
    }

    #[test]
    fn test_line_item_validation() {
        let item = CreateDealLineItem {
            description: "Licence".to_string(),
            quantity: 0.0,
            unit_price: 10.0,
            ..Default::default()
        };
        assert!(item.validate().is_err());

        let item = CreateDealLineItem {
            description: "Licence".to_string(),
            quantity: 2.0,
            unit_price: 10.0,
            discount_percent: Some(150.0),
            ..Default::default()
        };
        assert!(item.validate().is_err());
    }
}
