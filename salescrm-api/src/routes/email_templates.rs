/// Email template endpoints
///
/// Templates are shared across the tenant; `{{ variable }}` placeholders are
/// filled in when an email is composed from one.

use axum::{extract::State, Extension};
use salescrm_shared::auth::{
    authorization::{Action, Module},
    middleware::AuthContext,
};
use salescrm_shared::models::activity_log::LogAction;
use salescrm_shared::models::email::{
    CreateEmailTemplate, EmailTemplate, EmailTemplateFilter, UpdateEmailTemplate,
};
use salescrm_shared::pagination::PageParams;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    access::{log_activity, permit},
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath, ApiQuery},
    response::ApiResponse,
};

pub async fn list_templates(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(page): ApiQuery<PageParams>,
    ApiQuery(filter): ApiQuery<EmailTemplateFilter>,
) -> ApiResult<ApiResponse<Vec<EmailTemplate>>> {
    permit(&state, &auth, Module::EmailTemplates, Action::View).await?;

    let (templates, total) =
        EmailTemplate::list(&state.db, auth.tenant_id, &filter, page.limit(), page.offset()).await?;

    Ok(ApiResponse::page(templates, page.paginate(total)))
}

pub async fn get_template(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<EmailTemplate>> {
    permit(&state, &auth, Module::EmailTemplates, Action::View).await?;

    let template = EmailTemplate::find_by_id(&state.db, auth.tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Email template"))?;

    Ok(ApiResponse::ok(template))
}

pub async fn create_template(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<CreateEmailTemplate>,
) -> ApiResult<ApiResponse<EmailTemplate>> {
    permit(&state, &auth, Module::EmailTemplates, Action::Create).await?;
    req.validate()?;

    let template = EmailTemplate::create(&state.db, auth.tenant_id, auth.user_id, req).await?;

    log_activity(
        &state,
        &auth,
        LogAction::Create,
        "email_template",
        Some(template.id),
        json!({ "name": template.name }),
    )
    .await;

    Ok(ApiResponse::created(template))
}

pub async fn update_template(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateEmailTemplate>,
) -> ApiResult<ApiResponse<EmailTemplate>> {
    permit(&state, &auth, Module::EmailTemplates, Action::Edit).await?;
    req.validate()?;

    let template = EmailTemplate::update(&state.db, auth.tenant_id, id, req)
        .await?
        .ok_or_else(|| ApiError::not_found("Email template"))?;

    log_activity(&state, &auth, LogAction::Update, "email_template", Some(id), json!({ "name": template.name })).await;

    Ok(ApiResponse::ok(template))
}

pub async fn delete_template(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<Option<()>>> {
    permit(&state, &auth, Module::EmailTemplates, Action::Delete).await?;

    if !EmailTemplate::delete(&state.db, auth.tenant_id, id).await? {
        return Err(ApiError::not_found("Email template"));
    }

    log_activity(&state, &auth, LogAction::Delete, "email_template", Some(id), json!({})).await;

    Ok(ApiResponse::empty("Email template deleted"))
}
