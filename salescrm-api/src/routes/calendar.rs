/// Calendar endpoints
///
/// ```text
/// GET    /v1/calendar?from=&to=&ownerId=&eventType=
/// POST   /v1/calendar
/// GET    /v1/calendar/:id
/// PUT    /v1/calendar/:id
/// DELETE /v1/calendar/:id
/// ```
///
/// An event may not end before it starts; violations answer 422 on
/// `endTime`.

use axum::{extract::State, Extension};
use salescrm_shared::auth::{
    authorization::{Action, Module},
    middleware::AuthContext,
    scope::{enforce_scope, Scope},
};
use salescrm_shared::models::activity_log::LogAction;
use salescrm_shared::models::calendar_event::{
    CalendarEvent, CalendarFilter, CreateCalendarEvent, UpdateCalendarEvent,
};
use salescrm_shared::pagination::PageParams;
use serde_json::json;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    access::{assign_owner, authorize, log_activity},
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath, ApiQuery},
    response::ApiResponse,
};

fn window_error(err: ValidationError) -> ApiError {
    let message = err
        .message
        .map(|m| m.to_string())
        .unwrap_or_else(|| "End time must not be before start time".to_string());
    ApiError::validation("endTime", message)
}

async fn load_event(state: &AppState, auth: &AuthContext, scope: &Scope, id: Uuid) -> ApiResult<CalendarEvent> {
    let event = CalendarEvent::find_by_id(&state.db, auth.tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Calendar event"))?;
    enforce_scope(&event, scope)?;
    Ok(event)
}

pub async fn list_events(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(page): ApiQuery<PageParams>,
    ApiQuery(filter): ApiQuery<CalendarFilter>,
) -> ApiResult<ApiResponse<Vec<CalendarEvent>>> {
    let scope = authorize(&state, &auth, Module::Calendar, Action::View).await?;

    if let (Some(from), Some(to)) = (filter.from, filter.to) {
        if to < from {
            return Err(ApiError::validation("to", "Window end must not be before its start"));
        }
    }

    let (events, total) = CalendarEvent::list(
        &state.db,
        auth.tenant_id,
        &filter,
        scope.owner_filter(),
        page.limit(),
        page.offset(),
    )
    .await?;

    Ok(ApiResponse::page(events, page.paginate(total)))
}

pub async fn get_event(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<CalendarEvent>> {
    let scope = authorize(&state, &auth, Module::Calendar, Action::View).await?;

    Ok(ApiResponse::ok(load_event(&state, &auth, &scope, id).await?))
}

pub async fn create_event(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<CreateCalendarEvent>,
) -> ApiResult<ApiResponse<CalendarEvent>> {
    let scope = authorize(&state, &auth, Module::Calendar, Action::Create).await?;
    req.validate()?;
    req.validate_window().map_err(window_error)?;

    let owner_id = assign_owner(&state, &auth, &scope, req.owner_id).await?;
    let event = CalendarEvent::create(&state.db, auth.tenant_id, owner_id, req).await?;

    log_activity(
        &state,
        &auth,
        LogAction::Create,
        "calendar_event",
        Some(event.id),
        json!({ "title": event.title, "startTime": event.start_time }),
    )
    .await;

    Ok(ApiResponse::created(event))
}

pub async fn update_event(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateCalendarEvent>,
) -> ApiResult<ApiResponse<CalendarEvent>> {
    let scope = authorize(&state, &auth, Module::Calendar, Action::Edit).await?;
    req.validate()?;

    let current = load_event(&state, &auth, &scope, id).await?;
    req.validate_against(&current).map_err(window_error)?;

    if req.owner_id.is_some() {
        assign_owner(&state, &auth, &scope, req.owner_id).await?;
    }

    let event = CalendarEvent::update(&state.db, auth.tenant_id, id, req)
        .await?
        .ok_or_else(|| ApiError::not_found("Calendar event"))?;

    log_activity(&state, &auth, LogAction::Update, "calendar_event", Some(id), json!({ "title": event.title })).await;

    Ok(ApiResponse::ok(event))
}

pub async fn delete_event(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<Option<()>>> {
    let scope = authorize(&state, &auth, Module::Calendar, Action::Delete).await?;
    let current = load_event(&state, &auth, &scope, id).await?;

    CalendarEvent::delete(&state.db, auth.tenant_id, id).await?;

    log_activity(&state, &auth, LogAction::Delete, "calendar_event", Some(id), json!({ "title": current.title })).await;

    Ok(ApiResponse::empty("Calendar event deleted"))
}
