/// Activity log browsing, scoped by the acting user

use axum::{extract::State, Extension};
use salescrm_shared::auth::{
    authorization::{Action, Module},
    middleware::AuthContext,
};
use salescrm_shared::models::activity_log::{ActivityLog, ActivityLogFilter};
use salescrm_shared::pagination::PageParams;

use crate::{
    access::authorize,
    app::AppState,
    error::ApiResult,
    extract::ApiQuery,
    response::ApiResponse,
};

pub async fn list_activity_logs(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(page): ApiQuery<PageParams>,
    ApiQuery(filter): ApiQuery<ActivityLogFilter>,
) -> ApiResult<ApiResponse<Vec<ActivityLog>>> {
    let scope = authorize(&state, &auth, Module::ActivityLogs, Action::View).await?;

    let (entries, total) = ActivityLog::list(
        &state.db,
        auth.tenant_id,
        &filter,
        scope.owner_filter(),
        page.limit(),
        page.offset(),
    )
    .await?;

    Ok(ApiResponse::page(entries, page.paginate(total)))
}
