/// Partner (reseller, referral, ...) endpoints
///
/// ```text
/// GET    /v1/partners?search=&partnerType=&isActive=
/// POST   /v1/partners
/// GET    /v1/partners/:id
/// PUT    /v1/partners/:id
/// DELETE /v1/partners/:id
/// ```

use axum::{extract::State, Extension};
use salescrm_shared::auth::{
    authorization::{Action, Module},
    middleware::AuthContext,
    scope::enforce_scope,
};
use salescrm_shared::models::activity_log::LogAction;
use salescrm_shared::models::partner::{CreatePartner, Partner, PartnerFilter, UpdatePartner};
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

pub async fn list_partners(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(page): ApiQuery<PageParams>,
    ApiQuery(filter): ApiQuery<PartnerFilter>,
) -> ApiResult<ApiResponse<Vec<Partner>>> {
    let scope = authorize(&state, &auth, Module::Partners, Action::View).await?;

    let (partners, total) = Partner::list(
        &state.db,
        auth.tenant_id,
        &filter,
        scope.owner_filter(),
        page.limit(),
        page.offset(),
    )
    .await?;

    Ok(ApiResponse::page(partners, page.paginate(total)))
}

pub async fn get_partner(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<Partner>> {
    let scope = authorize(&state, &auth, Module::Partners, Action::View).await?;

    let partner = Partner::find_by_id(&state.db, auth.tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Partner"))?;
    enforce_scope(&partner, &scope)?;

    Ok(ApiResponse::ok(partner))
}

pub async fn create_partner(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<CreatePartner>,
) -> ApiResult<ApiResponse<Partner>> {
    let scope = authorize(&state, &auth, Module::Partners, Action::Create).await?;
    req.validate()?;

    let owner_id = assign_owner(&state, &auth, &scope, req.owner_id).await?;
    let partner = Partner::create(&state.db, auth.tenant_id, owner_id, req).await?;

    log_activity(&state, &auth, LogAction::Create, "partner", Some(partner.id), json!({ "name": partner.name })).await;

    Ok(ApiResponse::created(partner))
}

pub async fn update_partner(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdatePartner>,
) -> ApiResult<ApiResponse<Partner>> {
    let scope = authorize(&state, &auth, Module::Partners, Action::Edit).await?;
    req.validate()?;

    let current = Partner::find_by_id(&state.db, auth.tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Partner"))?;
    enforce_scope(&current, &scope)?;

    if req.owner_id.is_some() {
        assign_owner(&state, &auth, &scope, req.owner_id).await?;
    }

    let partner = Partner::update(&state.db, auth.tenant_id, id, req)
        .await?
        .ok_or_else(|| ApiError::not_found("Partner"))?;

    log_activity(&state, &auth, LogAction::Update, "partner", Some(id), json!({ "name": partner.name })).await;

    Ok(ApiResponse::ok(partner))
}

pub async fn delete_partner(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<Option<()>>> {
    let scope = authorize(&state, &auth, Module::Partners, Action::Delete).await?;

    let current = Partner::find_by_id(&state.db, auth.tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Partner"))?;
    enforce_scope(&current, &scope)?;

    Partner::delete(&state.db, auth.tenant_id, id).await?;

    log_activity(&state, &auth, LogAction::Delete, "partner", Some(id), json!({ "name": current.name })).await;

    Ok(ApiResponse::empty("Partner deleted"))
}
