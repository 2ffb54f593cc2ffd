/// Sales entry endpoints
///
/// ```text
/// GET    /v1/sales?salespersonId=&accountId=&from=&to=
/// POST   /v1/sales
/// GET    /v1/sales/:id
/// PUT    /v1/sales/:id
/// DELETE /v1/sales/:id
/// ```
///
/// The salesperson plays the owner role for scoping.

use axum::{extract::State, Extension};
use salescrm_shared::auth::{
    authorization::{Action, Module},
    middleware::AuthContext,
    scope::{enforce_scope, Scope},
};
use salescrm_shared::models::activity_log::LogAction;
use salescrm_shared::models::sales_entry::{CreateSalesEntry, SalesEntry, SalesEntryFilter, UpdateSalesEntry};
use salescrm_shared::pagination::PageParams;
use serde_json::json;
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
    account_id: Option<Uuid>,
    deal_id: Option<Uuid>,
    product_id: Option<Uuid>,
) -> ApiResult<()> {
    ensure_reference(&state.db, auth.tenant_id, Reference::Account, account_id).await?;
    ensure_reference(&state.db, auth.tenant_id, Reference::Deal, deal_id).await?;
    ensure_reference(&state.db, auth.tenant_id, Reference::Product, product_id).await
}

async fn load_entry(state: &AppState, auth: &AuthContext, scope: &Scope, id: Uuid) -> ApiResult<SalesEntry> {
    let entry = SalesEntry::find_by_id(&state.db, auth.tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Sales entry"))?;
    enforce_scope(&entry, scope)?;
    Ok(entry)
}

pub async fn list_sales(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(page): ApiQuery<PageParams>,
    ApiQuery(filter): ApiQuery<SalesEntryFilter>,
) -> ApiResult<ApiResponse<Vec<SalesEntry>>> {
    let scope = authorize(&state, &auth, Module::Sales, Action::View).await?;

    if let (Some(from), Some(to)) = (filter.from, filter.to) {
        if from > to {
            return Err(ApiError::validation("from", "Start date must not be after end date"));
        }
    }

    let (entries, total) = SalesEntry::list(
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

pub async fn get_sale(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<SalesEntry>> {
    let scope = authorize(&state, &auth, Module::Sales, Action::View).await?;

    Ok(ApiResponse::ok(load_entry(&state, &auth, &scope, id).await?))
}

pub async fn create_sale(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<CreateSalesEntry>,
) -> ApiResult<ApiResponse<SalesEntry>> {
    let scope = authorize(&state, &auth, Module::Sales, Action::Create).await?;
    req.validate()?;
    check_references(&state, &auth, req.account_id, req.deal_id, req.product_id).await?;

    let salesperson_id = assign_owner(&state, &auth, &scope, req.salesperson_id).await?;
    let entry = SalesEntry::create(&state.db, auth.tenant_id, salesperson_id, req).await?;

    log_activity(
        &state,
        &auth,
        LogAction::Create,
        "sales_entry",
        Some(entry.id),
        json!({ "amount": entry.amount, "saleDate": entry.sale_date }),
    )
    .await;

    Ok(ApiResponse::created(entry))
}

pub async fn update_sale(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateSalesEntry>,
) -> ApiResult<ApiResponse<SalesEntry>> {
    let scope = authorize(&state, &auth, Module::Sales, Action::Edit).await?;
    req.validate()?;
    load_entry(&state, &auth, &scope, id).await?;
    check_references(&state, &auth, req.account_id, req.deal_id, req.product_id).await?;

    if req.salesperson_id.is_some() {
        assign_owner(&state, &auth, &scope, req.salesperson_id).await?;
    }

    let entry = SalesEntry::update(&state.db, auth.tenant_id, id, req)
        .await?
        .ok_or_else(|| ApiError::not_found("Sales entry"))?;

    log_activity(&state, &auth, LogAction::Update, "sales_entry", Some(id), json!({ "amount": entry.amount })).await;

    Ok(ApiResponse::ok(entry))
}

pub async fn delete_sale(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<Option<()>>> {
    let scope = authorize(&state, &auth, Module::Sales, Action::Delete).await?;
    let current = load_entry(&state, &auth, &scope, id).await?;

    SalesEntry::delete(&state.db, auth.tenant_id, id).await?;

    log_activity(&state, &auth, LogAction::Delete, "sales_entry", Some(id), json!({ "amount": current.amount })).await;

    Ok(ApiResponse::empty("Sales entry deleted"))
}
