/// Task endpoints
///
/// ```text
/// GET    /v1/tasks?search=&status=&priority=&assignedTo=&dueFrom=&dueTo=&relatedType=&relatedId=
/// POST   /v1/tasks
/// GET    /v1/tasks/:id
/// PUT    /v1/tasks/:id
/// DELETE /v1/tasks/:id
/// ```
///
/// Assigning a task to someone else notifies the assignee.

use axum::{extract::State, Extension};
use salescrm_shared::auth::{
    authorization::{Action, Module},
    middleware::AuthContext,
    scope::{enforce_scope, Scope},
};
use salescrm_shared::models::activity_log::LogAction;
use salescrm_shared::models::notification::{kind, NewNotification};
use salescrm_shared::models::task::{CreateTask, Task, TaskFilter, UpdateTask};
use salescrm_shared::pagination::PageParams;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    access::{assign_owner, authorize, log_activity, notify},
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath, ApiQuery},
    response::ApiResponse,
};

fn assignment_notice(task: &Task, user_id: Uuid) -> NewNotification {
    NewNotification {
        user_id,
        kind: kind::TASK_ASSIGNED,
        title: "New task assigned".to_string(),
        message: format!("You have been assigned the task \"{}\"", task.title),
        link: Some(format!("/tasks/{}", task.id)),
    }
}

/// `relatedType` and `relatedId` travel together
fn check_related(related_type: &Option<String>, related_id: Option<Uuid>) -> ApiResult<()> {
    match (related_type.as_deref().map(str::trim), related_id) {
        (Some(t), None) if !t.is_empty() => Err(ApiError::validation("relatedId", "Required when relatedType is set")),
        (None, Some(_)) => Err(ApiError::validation("relatedType", "Required when relatedId is set")),
        _ => Ok(()),
    }
}

async fn load_task(state: &AppState, auth: &AuthContext, scope: &Scope, id: Uuid) -> ApiResult<Task> {
    let task = Task::find_by_id(&state.db, auth.tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Task"))?;
    enforce_scope(&task, scope)?;
    Ok(task)
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(page): ApiQuery<PageParams>,
    ApiQuery(filter): ApiQuery<TaskFilter>,
) -> ApiResult<ApiResponse<Vec<Task>>> {
    let scope = authorize(&state, &auth, Module::Tasks, Action::View).await?;

    let (tasks, total) = Task::list(
        &state.db,
        auth.tenant_id,
        &filter,
        scope.owner_filter(),
        page.limit(),
        page.offset(),
    )
    .await?;

    Ok(ApiResponse::page(tasks, page.paginate(total)))
}

pub async fn get_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<Task>> {
    let scope = authorize(&state, &auth, Module::Tasks, Action::View).await?;

    Ok(ApiResponse::ok(load_task(&state, &auth, &scope, id).await?))
}

pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<CreateTask>,
) -> ApiResult<ApiResponse<Task>> {
    let scope = authorize(&state, &auth, Module::Tasks, Action::Create).await?;
    req.validate()?;
    check_related(&req.related_type, req.related_id)?;

    let assigned_to = assign_owner(&state, &auth, &scope, req.assigned_to).await?;
    let task = Task::create(&state.db, auth.tenant_id, auth.user_id, assigned_to, req).await?;

    notify(&state, &auth, assignment_notice(&task, assigned_to)).await;
    log_activity(&state, &auth, LogAction::Create, "task", Some(task.id), json!({ "title": task.title })).await;

    Ok(ApiResponse::created(task))
}

pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateTask>,
) -> ApiResult<ApiResponse<Task>> {
    let scope = authorize(&state, &auth, Module::Tasks, Action::Edit).await?;
    req.validate()?;

    let current = load_task(&state, &auth, &scope, id).await?;

    let reassigned_to = match req.assigned_to {
        Some(user_id) if current.assigned_to != Some(user_id) => {
            Some(assign_owner(&state, &auth, &scope, Some(user_id)).await?)
        }
        _ => None,
    };

    let task = Task::update(&state.db, auth.tenant_id, id, req)
        .await?
        .ok_or_else(|| ApiError::not_found("Task"))?;

    if let Some(user_id) = reassigned_to {
        notify(&state, &auth, assignment_notice(&task, user_id)).await;
    }
    log_activity(&state, &auth, LogAction::Update, "task", Some(id), json!({ "status": task.status })).await;

    Ok(ApiResponse::ok(task))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<Option<()>>> {
    let scope = authorize(&state, &auth, Module::Tasks, Action::Delete).await?;
    let current = load_task(&state, &auth, &scope, id).await?;

    Task::delete(&state.db, auth.tenant_id, id).await?;

    log_activity(&state, &auth, LogAction::Delete, "task", Some(id), json!({ "title": current.title })).await;

    Ok(ApiResponse::empty("Task deleted"))
}
