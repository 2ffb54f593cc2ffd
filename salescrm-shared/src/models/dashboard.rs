/// Dashboard aggregates
///
/// Every query takes the caller's owner filter (`None` = unrestricted), so
/// a rep's dashboard only counts their own records and a manager's counts
/// their team's.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use super::deal::DealStage;
use super::round_money;

pub const DEFAULT_TREND_MONTHS: u32 = 6;
pub const MAX_TREND_MONTHS: u32 = 24;
pub const DEFAULT_TOP_LIMIT: i64 = 10;
pub const MAX_TOP_LIMIT: i64 = 50;

#[derive(Debug, Clone, Default, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_leads: i64,
    pub new_leads_this_month: i64,
    pub open_deals: i64,
    pub pipeline_value: f64,
    pub deals_won_this_month: i64,
    pub won_value_this_month: f64,
    pub sales_this_month: f64,
    pub tasks_due_today: i64,
    pub overdue_tasks: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StageSummary {
    pub stage: DealStage,
    pub count: i64,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyTotal {
    /// `YYYY-MM`
    pub month: String,
    pub total: f64,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Performer {
    pub user_id: Uuid,
    pub name: String,
    pub total: f64,
    pub count: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendParams {
    pub months: Option<u32>,
}

impl TrendParams {
    pub fn months(&self) -> u32 {
        self.months
            .unwrap_or(DEFAULT_TREND_MONTHS)
            .clamp(1, MAX_TREND_MONTHS)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopPerformerParams {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub limit: Option<i64>,
}

impl TopPerformerParams {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_TOP_LIMIT).clamp(1, MAX_TOP_LIMIT)
    }
}

/// First day of the month `back` months before `today`'s month
pub fn month_start(today: NaiveDate, back: u32) -> NaiveDate {
    let index = today.year() * 12 + today.month0() as i32 - back as i32;
    let year = index.div_euclid(12);
    let month0 = index.rem_euclid(12) as u32;

    // Day 1 exists in every month
    NaiveDate::from_ymd_opt(year, month0 + 1, 1).unwrap_or(today)
}

/// Month starts of the last `months` months, oldest first, ending at `today`'s month
pub fn trend_months(today: NaiveDate, months: u32) -> Vec<NaiveDate> {
    (0..months).rev().map(|back| month_start(today, back)).collect()
}

/// Fills months without sales with zeros
pub fn fill_trend(months: &[NaiveDate], rows: &[(NaiveDate, f64, i64)]) -> Vec<MonthlyTotal> {
    let by_month: HashMap<NaiveDate, (f64, i64)> =
        rows.iter().map(|(m, total, count)| (*m, (*total, *count))).collect();

    months
        .iter()
        .map(|month| {
            let (total, count) = by_month.get(month).copied().unwrap_or((0.0, 0));
            MonthlyTotal {
                month: month.format("%Y-%m").to_string(),
                total: round_money(total),
                count,
            }
        })
        .collect()
}

/// One entry per stage in pipeline order, zero for empty stages
pub fn fill_pipeline(rows: Vec<StageSummary>) -> Vec<StageSummary> {
    let mut by_stage: HashMap<DealStage, StageSummary> =
        rows.into_iter().map(|row| (row.stage, row)).collect();

    DealStage::ALL
        .iter()
        .map(|stage| {
            by_stage.remove(stage).map_or(
                StageSummary {
                    stage: *stage,
                    count: 0,
                    amount: 0.0,
                },
                |row| StageSummary {
                    amount: round_money(row.amount),
                    ..row
                },
            )
        })
        .collect()
}

pub async fn summary(
    pool: &PgPool,
    tenant_id: Uuid,
    scope_ids: Option<Vec<Uuid>>,
) -> Result<DashboardSummary, sqlx::Error> {
    let mut summary = sqlx::query_as::<_, DashboardSummary>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM leads
                WHERE tenant_id = $1 AND ($2::uuid[] IS NULL OR assigned_to = ANY($2))) AS total_leads,
            (SELECT COUNT(*) FROM leads
                WHERE tenant_id = $1 AND ($2::uuid[] IS NULL OR assigned_to = ANY($2))
                AND created_at >= date_trunc('month', NOW())) AS new_leads_this_month,
            (SELECT COUNT(*) FROM deals
                WHERE tenant_id = $1 AND ($2::uuid[] IS NULL OR owner_id = ANY($2))
                AND stage NOT IN ('closed_won', 'closed_lost')) AS open_deals,
            (SELECT COALESCE(SUM(amount), 0)::float8 FROM deals
                WHERE tenant_id = $1 AND ($2::uuid[] IS NULL OR owner_id = ANY($2))
                AND stage NOT IN ('closed_won', 'closed_lost')) AS pipeline_value,
            (SELECT COUNT(*) FROM deals
                WHERE tenant_id = $1 AND ($2::uuid[] IS NULL OR owner_id = ANY($2))
                AND stage = 'closed_won'
                AND actual_close_date >= date_trunc('month', CURRENT_DATE)::date) AS deals_won_this_month,
            (SELECT COALESCE(SUM(amount), 0)::float8 FROM deals
                WHERE tenant_id = $1 AND ($2::uuid[] IS NULL OR owner_id = ANY($2))
                AND stage = 'closed_won'
                AND actual_close_date >= date_trunc('month', CURRENT_DATE)::date) AS won_value_this_month,
            (SELECT COALESCE(SUM(amount), 0)::float8 FROM sales_entries
                WHERE tenant_id = $1 AND ($2::uuid[] IS NULL OR salesperson_id = ANY($2))
                AND sale_date >= date_trunc('month', CURRENT_DATE)::date) AS sales_this_month,
            (SELECT COUNT(*) FROM tasks
                WHERE tenant_id = $1 AND ($2::uuid[] IS NULL OR assigned_to = ANY($2))
                AND status IN ('todo', 'in_progress')
                AND due_date::date = CURRENT_DATE) AS tasks_due_today,
            (SELECT COUNT(*) FROM tasks
                WHERE tenant_id = $1 AND ($2::uuid[] IS NULL OR assigned_to = ANY($2))
                AND status IN ('todo', 'in_progress')
                AND due_date < NOW()) AS overdue_tasks
        "#,
    )
    .bind(tenant_id)
    .bind(&scope_ids)
    .fetch_one(pool)
    .await?;

    summary.pipeline_value = round_money(summary.pipeline_value);
    summary.won_value_this_month = round_money(summary.won_value_this_month);
    summary.sales_this_month = round_money(summary.sales_this_month);

    Ok(summary)
}

pub async fn pipeline(
    pool: &PgPool,
    tenant_id: Uuid,
    scope_ids: Option<Vec<Uuid>>,
) -> Result<Vec<StageSummary>, sqlx::Error> {
    let rows = sqlx::query_as::<_, StageSummary>(
        r#"
        SELECT stage, COUNT(*) AS count, COALESCE(SUM(amount), 0)::float8 AS amount
        FROM deals
        WHERE tenant_id = $1 AND ($2::uuid[] IS NULL OR owner_id = ANY($2))
        GROUP BY stage
        "#,
    )
    .bind(tenant_id)
    .bind(&scope_ids)
    .fetch_all(pool)
    .await?;

    Ok(fill_pipeline(rows))
}

pub async fn sales_trend(
    pool: &PgPool,
    tenant_id: Uuid,
    scope_ids: Option<Vec<Uuid>>,
    today: NaiveDate,
    months: u32,
) -> Result<Vec<MonthlyTotal>, sqlx::Error> {
    let months = trend_months(today, months);
    let start = months.first().copied().unwrap_or(today);

    let rows: Vec<(NaiveDate, f64, i64)> = sqlx::query_as(
        r#"
        SELECT date_trunc('month', sale_date)::date AS month,
               COALESCE(SUM(amount), 0)::float8 AS total,
               COUNT(*) AS count
        FROM sales_entries
        WHERE tenant_id = $1
          AND ($2::uuid[] IS NULL OR salesperson_id = ANY($2))
          AND sale_date >= $3
        GROUP BY 1
        "#,
    )
    .bind(tenant_id)
    .bind(&scope_ids)
    .bind(start)
    .fetch_all(pool)
    .await?;

    Ok(fill_trend(&months, &rows))
}

pub async fn top_performers(
    pool: &PgPool,
    tenant_id: Uuid,
    scope_ids: Option<Vec<Uuid>>,
    params: &TopPerformerParams,
) -> Result<Vec<Performer>, sqlx::Error> {
    let mut performers = sqlx::query_as::<_, Performer>(
        r#"
        SELECT u.id AS user_id, u.name,
               COALESCE(SUM(s.amount), 0)::float8 AS total,
               COUNT(*) AS count
        FROM sales_entries s
        JOIN users u ON u.id = s.salesperson_id
        WHERE s.tenant_id = $1
          AND ($2::uuid[] IS NULL OR s.salesperson_id = ANY($2))
          AND ($3::date IS NULL OR s.sale_date >= $3)
          AND ($4::date IS NULL OR s.sale_date <= $4)
        GROUP BY u.id, u.name
        ORDER BY total DESC, u.name ASC
        LIMIT $5
        "#,
    )
    .bind(tenant_id)
    .bind(&scope_ids)
    .bind(params.from)
    .bind(params.to)
    .bind(params.limit())
    .fetch_all(pool)
    .await?;

    for performer in &mut performers {
        performer.total = round_money(performer.total);
    }

    Ok(performers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_month_start_crosses_year() {
        assert_eq!(month_start(date(2025, 3, 17), 0), date(2025, 3, 1));
        assert_eq!(month_start(date(2025, 3, 17), 2), date(2025, 1, 1));
        assert_eq!(month_start(date(2025, 3, 17), 3), date(2024, 12, 1));
        assert_eq!(month_start(date(2025, 1, 31), 13), date(2023, 12, 1));
    }

    #[test]
    fn test_trend_months_oldest_first() {
        let months = trend_months(date(2025, 2, 10), 3);
        assert_eq!(months, vec![date(2024, 12, 1), date(2025, 1, 1), date(2025, 2, 1)]);
    }

    #[test]
    fn test_fill_trend_zeroes_gaps() {
        let months = trend_months(date(2025, 3, 1), 3);
        let filled = fill_trend(&months, &[(date(2025, 2, 1), 1200.456, 3)]);

        assert_eq!(filled.len(), 3);
        assert_eq!(filled[0].month, "2025-01");
        assert_eq!(filled[0].total, 0.0);
        assert_eq!(filled[1].month, "2025-02");
        assert_eq!(filled[1].total, 1200.46);
        assert_eq!(filled[1].count, 3);
        assert_eq!(filled[2].count, 0);
    }

    #[test]
    fn test_fill_pipeline_has_every_stage_in_order() {
        let filled = fill_pipeline(vec![StageSummary {
            stage: DealStage::Negotiation,
            count: 2,
            amount: 5000.0,
        }]);

        let stages: Vec<DealStage> = filled.iter().map(|s| s.stage).collect();
        assert_eq!(stages, DealStage::ALL.to_vec());
        assert_eq!(filled[3].count, 2);
        assert_eq!(filled[0].count, 0);
    }

    #[test]
    fn test_param_clamping() {
        assert_eq!(TrendParams::default().months(), 6);
        assert_eq!(TrendParams { months: Some(0) }.months(), 1);
        assert_eq!(TrendParams { months: Some(100) }.months(), 24);

        assert_eq!(TopPerformerParams::default().limit(), 10);
        let params = TopPerformerParams {
            limit: Some(500),
            ..Default::default()
        };
        assert_eq!(params.limit(), 50);
    }
}
