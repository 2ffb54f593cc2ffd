/// Quote terms & conditions
///
/// Readable by anyone with `quote_terms:view`; writes are admin only.

use axum::{extract::State, Extension};
use salescrm_shared::auth::{
    authorization::{require_admin, Action, Module},
    middleware::AuthContext,
};
use salescrm_shared::models::activity_log::LogAction;
use salescrm_shared::models::quote::{CreateQuoteTerm, QuoteTerm, UpdateQuoteTerm};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    access::{log_activity, permit},
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath},
    response::ApiResponse,
};

pub async fn list_terms(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<ApiResponse<Vec<QuoteTerm>>> {
    permit(&state, &auth, Module::QuoteTerms, Action::View).await?;

    Ok(ApiResponse::ok(QuoteTerm::list(&state.db, auth.tenant_id).await?))
}

pub async fn create_term(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<CreateQuoteTerm>,
) -> ApiResult<ApiResponse<QuoteTerm>> {
    require_admin(&auth)?;
    req.validate()?;

    let term = QuoteTerm::create(&state.db, auth.tenant_id, req).await?;

    log_activity(&state, &auth, LogAction::Create, "quote_term", Some(term.id), json!({ "title": term.title })).await;

    Ok(ApiResponse::created(term))
}

pub async fn update_term(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateQuoteTerm>,
) -> ApiResult<ApiResponse<QuoteTerm>> {
    require_admin(&auth)?;
    req.validate()?;

    let term = QuoteTerm::update(&state.db, auth.tenant_id, id, req)
        .await?
        .ok_or_else(|| ApiError::not_found("Quote term"))?;

    log_activity(&state, &auth, LogAction::Update, "quote_term", Some(id), json!({ "title": term.title })).await;

    Ok(ApiResponse::ok(term))
}

pub async fn delete_term(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<Option<()>>> {
    require_admin(&auth)?;

    if !QuoteTerm::delete(&state.db, auth.tenant_id, id).await? {
        return Err(ApiError::not_found("Quote term"));
    }

    log_activity(&state, &auth, LogAction::Delete, "quote_term", Some(id), json!({})).await;

    Ok(ApiResponse::empty("Quote term deleted"))
}
