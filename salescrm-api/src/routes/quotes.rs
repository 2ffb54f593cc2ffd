/// Quote endpoints
///
/// ```text
/// GET    /v1/quotes?status=&accountId=&dealId=
/// POST   /v1/quotes
/// GET    /v1/quotes/:id            (with items and terms)
/// PUT    /v1/quotes/:id
/// DELETE /v1/quotes/:id
/// GET    /v1/quotes/:id/pdf
/// ```
///
/// Totals are always derived from the line items on the server; clients
/// never send `subtotal`, `taxAmount` or `total`.

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Extension,
};
use salescrm_shared::auth::{
    authorization::{Action, Module},
    middleware::AuthContext,
    scope::enforce_scope,
};
use salescrm_shared::models::activity_log::LogAction;
use salescrm_shared::models::product::Product;
use salescrm_shared::models::quote::{
    CreateQuote, Quote, QuoteDetail, QuoteFilter, QuoteLineInput, UpdateQuote,
};
use salescrm_shared::models::tenant::Tenant;
use salescrm_shared::pagination::PageParams;
use salescrm_shared::quote_pdf;
use serde_json::json;
use std::collections::HashSet;
use uuid::Uuid;
use validator::Validate;

use crate::{
    access::{assign_owner, authorize, ensure_reference, log_activity, Reference},
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath, ApiQuery},
    response::ApiResponse,
};

async fn check_references(
    state: &AppState,
    auth: &AuthContext,
    deal_id: Option<Uuid>,
    account_id: Option<Uuid>,
    contact_id: Option<Uuid>,
) -> ApiResult<()> {
    ensure_reference(&state.db, auth.tenant_id, Reference::Deal, deal_id).await?;
    ensure_reference(&state.db, auth.tenant_id, Reference::Account, account_id).await?;
    ensure_reference(&state.db, auth.tenant_id, Reference::Contact, contact_id).await
}

/// Every product a line points at must exist in the tenant
async fn check_products(state: &AppState, auth: &AuthContext, items: &[QuoteLineInput]) -> ApiResult<()> {
    let wanted: HashSet<Uuid> = items.iter().filter_map(|item| item.product_id).collect();
    if wanted.is_empty() {
        return Ok(());
    }

    let ids: Vec<Uuid> = wanted.iter().copied().collect();
    let found = Product::find_many(&state.db, auth.tenant_id, &ids).await?;
    if found.len() != wanted.len() {
        return Err(ApiError::validation("items", "One or more products do not exist"));
    }
    Ok(())
}

async fn load_detail(state: &AppState, auth: &AuthContext, id: Uuid) -> ApiResult<QuoteDetail> {
    Quote::find_detail(&state.db, auth.tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Quote"))
}

pub async fn list_quotes(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(page): ApiQuery<PageParams>,
    ApiQuery(filter): ApiQuery<QuoteFilter>,
) -> ApiResult<ApiResponse<Vec<Quote>>> {
    let scope = authorize(&state, &auth, Module::Quotes, Action::View).await?;

    let (quotes, total) = Quote::list(
        &state.db,
        auth.tenant_id,
        &filter,
        scope.owner_filter(),
        page.limit(),
        page.offset(),
    )
    .await?;

    Ok(ApiResponse::page(quotes, page.paginate(total)))
}

pub async fn get_quote(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<QuoteDetail>> {
    let scope = authorize(&state, &auth, Module::Quotes, Action::View).await?;

    let detail = load_detail(&state, &auth, id).await?;
    enforce_scope(&detail, &scope)?;

    Ok(ApiResponse::ok(detail))
}

pub async fn create_quote(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<CreateQuote>,
) -> ApiResult<ApiResponse<QuoteDetail>> {
    let scope = authorize(&state, &auth, Module::Quotes, Action::Create).await?;
    req.validate()?;
    check_references(&state, &auth, req.deal_id, req.account_id, req.contact_id).await?;
    check_products(&state, &auth, &req.items).await?;

    let owner_id = assign_owner(&state, &auth, &scope, req.owner_id).await?;
    let detail = Quote::create(&state.db, auth.tenant_id, owner_id, req).await?;

    tracing::info!(quote_id = %detail.quote.id, number = %detail.quote.quote_number, "Created quote");
    log_activity(
        &state,
        &auth,
        LogAction::Create,
        "quote",
        Some(detail.quote.id),
        json!({ "quoteNumber": detail.quote.quote_number, "total": detail.quote.total }),
    )
    .await;

    Ok(ApiResponse::created(detail))
}

pub async fn update_quote(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateQuote>,
) -> ApiResult<ApiResponse<QuoteDetail>> {
    let scope = authorize(&state, &auth, Module::Quotes, Action::Edit).await?;
    req.validate()?;

    let current = Quote::find_by_id(&state.db, auth.tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Quote"))?;
    enforce_scope(&current, &scope)?;

    check_references(&state, &auth, req.deal_id, req.account_id, req.contact_id).await?;
    if let Some(items) = &req.items {
        check_products(&state, &auth, items).await?;
    }
    if req.owner_id.is_some() {
        assign_owner(&state, &auth, &scope, req.owner_id).await?;
    }

    let detail = Quote::update(&state.db, auth.tenant_id, id, req)
        .await?
        .ok_or_else(|| ApiError::not_found("Quote"))?;

    log_activity(
        &state,
        &auth,
        LogAction::Update,
        "quote",
        Some(id),
        json!({ "status": detail.quote.status, "total": detail.quote.total }),
    )
    .await;

    Ok(ApiResponse::ok(detail))
}

pub async fn delete_quote(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<Option<()>>> {
    let scope = authorize(&state, &auth, Module::Quotes, Action::Delete).await?;

    let current = Quote::find_by_id(&state.db, auth.tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Quote"))?;
    enforce_scope(&current, &scope)?;

    Quote::delete(&state.db, auth.tenant_id, id).await?;

    log_activity(
        &state,
        &auth,
        LogAction::Delete,
        "quote",
        Some(id),
        json!({ "quoteNumber": current.quote_number }),
    )
    .await;

    Ok(ApiResponse::empty("Quote deleted"))
}

/// `GET /v1/quotes/:id/pdf`: the quote rendered as an A4 PDF download
pub async fn quote_pdf(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Response> {
    let scope = authorize(&state, &auth, Module::Quotes, Action::View).await?;

    let detail = load_detail(&state, &auth, id).await?;
    enforce_scope(&detail, &scope)?;

    let company = Tenant::find_by_id(&state.db, auth.tenant_id)
        .await?
        .map(|tenant| tenant.name)
        .unwrap_or_default();

    let bytes = quote_pdf::render(&detail, &company)?;
    tracing::debug!(quote_id = %id, size = bytes.len(), "Rendered quote PDF");

    let disposition = format!("attachment; filename=\"{}.pdf\"", detail.quote.quote_number);
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
