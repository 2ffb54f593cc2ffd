/// Outgoing email records
///
/// ```text
/// GET    /v1/emails?status=&relatedType=&relatedId=
/// POST   /v1/emails             (draft, optionally from a template)
/// GET    /v1/emails/:id
/// POST   /v1/emails/:id/send
/// DELETE /v1/emails/:id
/// ```
///
/// Delivery is out of scope: sending marks the draft `sent` and stamps
/// `sentAt`. The sender plays the owner role for scoping.

use axum::{extract::State, Extension};
use salescrm_shared::auth::{
    authorization::{Action, Module},
    middleware::AuthContext,
    scope::{enforce_scope, Scope},
};
use salescrm_shared::models::activity_log::LogAction;
use salescrm_shared::models::email::{ComposeEmail, Email, EmailFilter, EmailStatus, EmailTemplate};
use salescrm_shared::pagination::PageParams;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    access::{authorize, ensure_reference, log_activity, Reference},
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath, ApiQuery},
    response::ApiResponse,
};

async fn load_email(state: &AppState, auth: &AuthContext, scope: &Scope, id: Uuid) -> ApiResult<Email> {
    let email = Email::find_by_id(&state.db, auth.tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Email"))?;
    enforce_scope(&email, scope)?;
    Ok(email)
}

pub async fn list_emails(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(page): ApiQuery<PageParams>,
    ApiQuery(filter): ApiQuery<EmailFilter>,
) -> ApiResult<ApiResponse<Vec<Email>>> {
    let scope = authorize(&state, &auth, Module::Emails, Action::View).await?;

    let (emails, total) = Email::list(
        &state.db,
        auth.tenant_id,
        &filter,
        scope.owner_filter(),
        page.limit(),
        page.offset(),
    )
    .await?;

    Ok(ApiResponse::page(emails, page.paginate(total)))
}

pub async fn get_email(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<Email>> {
    let scope = authorize(&state, &auth, Module::Emails, Action::View).await?;

    Ok(ApiResponse::ok(load_email(&state, &auth, &scope, id).await?))
}

/// Stores a draft; with `templateId` the template supplies any missing
/// subject or body and `variables` are substituted into both
pub async fn compose_email(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<ComposeEmail>,
) -> ApiResult<ApiResponse<Email>> {
    authorize(&state, &auth, Module::Emails, Action::Create).await?;
    req.validate()?;
    ensure_reference(&state.db, auth.tenant_id, Reference::EmailTemplate, req.template_id).await?;

    let template = match req.template_id {
        Some(id) => {
            let template = EmailTemplate::find_by_id(&state.db, auth.tenant_id, id)
                .await?
                .ok_or_else(|| ApiError::validation("templateId", "Referenced record does not exist"))?;
            if !template.is_active {
                return Err(ApiError::validation("templateId", "Template is inactive"));
            }
            Some(template)
        }
        None => None,
    };

    let draft = req
        .into_draft(template.as_ref())
        .ok_or_else(|| ApiError::validation("body", "Subject and body are required without a template"))?;

    let email = Email::create(&state.db, auth.tenant_id, auth.user_id, draft).await?;

    log_activity(
        &state,
        &auth,
        LogAction::Create,
        "email",
        Some(email.id),
        json!({ "to": email.to_address, "templateId": email.template_id }),
    )
    .await;

    Ok(ApiResponse::created(email))
}

/// `POST /v1/emails/:id/send`
pub async fn send_email(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<Email>> {
    let scope = authorize(&state, &auth, Module::Emails, Action::Edit).await?;
    let current = load_email(&state, &auth, &scope, id).await?;

    if current.status == EmailStatus::Sent {
        return Err(ApiError::Conflict("Email has already been sent".to_string()));
    }

    let email = Email::mark_sent(&state.db, auth.tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::Conflict("Email has already been sent".to_string()))?;

    tracing::info!(email_id = %id, "Email marked as sent");
    log_activity(&state, &auth, LogAction::Send, "email", Some(id), json!({ "to": email.to_address })).await;

    Ok(ApiResponse::ok(email).message("Email sent"))
}

pub async fn delete_email(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<Option<()>>> {
    let scope = authorize(&state, &auth, Module::Emails, Action::Delete).await?;
    load_email(&state, &auth, &scope, id).await?;

    Email::delete(&state.db, auth.tenant_id, id).await?;

    log_activity(&state, &auth, LogAction::Delete, "email", Some(id), json!({})).await;

    Ok(ApiResponse::empty("Email deleted"))
}
