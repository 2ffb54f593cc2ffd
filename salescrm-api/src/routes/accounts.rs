/// Account endpoints
///
/// ```text
/// GET    /v1/accounts?search=&industry=&ownerId=&page=&pageSize=
/// POST   /v1/accounts
/// GET    /v1/accounts/:id
/// PUT    /v1/accounts/:id
/// DELETE /v1/accounts/:id
/// ```

use axum::{extract::State, Extension};
use salescrm_shared::auth::{
    authorization::{Action, Module},
    middleware::AuthContext,
    scope::enforce_scope,
};
use salescrm_shared::models::account::{Account, AccountFilter, CreateAccount, UpdateAccount};
use salescrm_shared::models::activity_log::LogAction;
use salescrm_shared::pagination::PageParams;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    access::{assign_owner, authorize, log_activity},
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath, ApiQuery},
    response::ApiResponse,
};

pub async fn list_accounts(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(page): ApiQuery<PageParams>,
    ApiQuery(filter): ApiQuery<AccountFilter>,
) -> ApiResult<ApiResponse<Vec<Account>>> {
    let scope = authorize(&state, &auth, Module::Accounts, Action::View).await?;

    let (accounts, total) = Account::list(
        &state.db,
        auth.tenant_id,
        &filter,
        scope.owner_filter(),
        page.limit(),
        page.offset(),
    )
    .await?;

    Ok(ApiResponse::page(accounts, page.paginate(total)))
}

pub async fn get_account(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<Account>> {
    let scope = authorize(&state, &auth, Module::Accounts, Action::View).await?;

    let account = Account::find_by_id(&state.db, auth.tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Account"))?;
    enforce_scope(&account, &scope)?;

    Ok(ApiResponse::ok(account))
}

pub async fn create_account(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<CreateAccount>,
) -> ApiResult<ApiResponse<Account>> {
    let scope = authorize(&state, &auth, Module::Accounts, Action::Create).await?;
    req.validate()?;

    let owner_id = assign_owner(&state, &auth, &scope, req.owner_id).await?;
    let account = Account::create(&state.db, auth.tenant_id, owner_id, req).await?;

    log_activity(&state, &auth, LogAction::Create, "account", Some(account.id), json!({ "name": account.name })).await;

    Ok(ApiResponse::created(account))
}

pub async fn update_account(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateAccount>,
) -> ApiResult<ApiResponse<Account>> {
    let scope = authorize(&state, &auth, Module::Accounts, Action::Edit).await?;
    req.validate()?;

    let current = Account::find_by_id(&state.db, auth.tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Account"))?;
    enforce_scope(&current, &scope)?;

    if req.owner_id.is_some() {
        assign_owner(&state, &auth, &scope, req.owner_id).await?;
    }

    let account = Account::update(&state.db, auth.tenant_id, id, req)
        .await?
        .ok_or_else(|| ApiError::not_found("Account"))?;

    log_activity(&state, &auth, LogAction::Update, "account", Some(id), json!({ "name": account.name })).await;

    Ok(ApiResponse::ok(account))
}

pub async fn delete_account(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<Option<()>>> {
    let scope = authorize(&state, &auth, Module::Accounts, Action::Delete).await?;

    let current = Account::find_by_id(&state.db, auth.tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Account"))?;
    enforce_scope(&current, &scope)?;

    Account::delete(&state.db, auth.tenant_id, id).await?;

    log_activity(&state, &auth, LogAction::Delete, "account", Some(id), json!({ "name": current.name })).await;

    Ok(ApiResponse::empty("Account deleted"))
}
