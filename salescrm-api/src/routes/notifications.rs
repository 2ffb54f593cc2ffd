/// The caller's own notifications
///
/// No module permission applies: every user can read and clear what was
/// sent to them, and nothing else.

use axum::{extract::State, Extension};
use salescrm_shared::auth::middleware::AuthContext;
use salescrm_shared::models::notification::{Notification, NotificationFilter};
use salescrm_shared::pagination::PageParams;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiPath, ApiQuery},
    response::ApiResponse,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCount {
    pub unread: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkedRead {
    pub updated: u64,
}

pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(page): ApiQuery<PageParams>,
    ApiQuery(filter): ApiQuery<NotificationFilter>,
) -> ApiResult<ApiResponse<Vec<Notification>>> {
    let (notifications, total) = Notification::list(
        &state.db,
        auth.tenant_id,
        auth.user_id,
        &filter,
        page.limit(),
        page.offset(),
    )
    .await?;

    Ok(ApiResponse::page(notifications, page.paginate(total)))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<ApiResponse<UnreadCount>> {
    let unread = Notification::unread_count(&state.db, auth.tenant_id, auth.user_id).await?;
    Ok(ApiResponse::ok(UnreadCount { unread }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<Notification>> {
    let notification = Notification::mark_read(&state.db, auth.tenant_id, auth.user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Notification"))?;

    Ok(ApiResponse::ok(notification))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<ApiResponse<MarkedRead>> {
    let updated = Notification::mark_all_read(&state.db, auth.tenant_id, auth.user_id).await?;
    Ok(ApiResponse::ok(MarkedRead { updated }))
}

pub async fn delete_notification(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<Option<()>>> {
    if !Notification::delete(&state.db, auth.tenant_id, auth.user_id, id).await? {
        return Err(ApiError::not_found("Notification"));
    }

    Ok(ApiResponse::empty("Notification deleted"))
}
