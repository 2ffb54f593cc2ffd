/// Dashboard aggregates
///
/// Every figure is computed over the records the caller can see, using the
/// same scope as the list endpoints.

use axum::{extract::State, Extension};
use chrono::Utc;
use salescrm_shared::auth::{
    authorization::{Action, Module},
    middleware::AuthContext,
};
use salescrm_shared::models::dashboard::{
    self, DashboardSummary, MonthlyTotal, Performer, StageSummary, TopPerformerParams, TrendParams,
};

use crate::{
    access::authorize,
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ApiQuery,
    response::ApiResponse,
};

pub async fn summary(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<ApiResponse<DashboardSummary>> {
    let scope = authorize(&state, &auth, Module::Dashboard, Action::View).await?;

    let summary = dashboard::summary(&state.db, auth.tenant_id, scope.owner_filter()).await?;
    Ok(ApiResponse::ok(summary))
}

pub async fn pipeline(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<ApiResponse<Vec<StageSummary>>> {
    let scope = authorize(&state, &auth, Module::Dashboard, Action::View).await?;

    let stages = dashboard::pipeline(&state.db, auth.tenant_id, scope.owner_filter()).await?;
    Ok(ApiResponse::ok(stages))
}

pub async fn sales_trend(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(params): ApiQuery<TrendParams>,
) -> ApiResult<ApiResponse<Vec<MonthlyTotal>>> {
    let scope = authorize(&state, &auth, Module::Dashboard, Action::View).await?;

    let trend = dashboard::sales_trend(
        &state.db,
        auth.tenant_id,
        scope.owner_filter(),
        Utc::now().date_naive(),
        params.months(),
    )
    .await?;
    Ok(ApiResponse::ok(trend))
}

pub async fn top_performers(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(params): ApiQuery<TopPerformerParams>,
) -> ApiResult<ApiResponse<Vec<Performer>>> {
    let scope = authorize(&state, &auth, Module::Dashboard, Action::View).await?;

    if let (Some(from), Some(to)) = (params.from, params.to) {
        if from > to {
            return Err(ApiError::validation("from", "Start date must not be after end date"));
        }
    }

    let performers = dashboard::top_performers(&state.db, auth.tenant_id, scope.owner_filter(), &params).await?;
    Ok(ApiResponse::ok(performers))
}
