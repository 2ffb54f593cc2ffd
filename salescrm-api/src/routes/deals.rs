/// Deal endpoints
///
/// ```text
/// GET    /v1/deals?search=&stage=&accountId=&ownerId=
/// POST   /v1/deals
/// GET    /v1/deals/:id                     (with items and activities)
/// PUT    /v1/deals/:id
/// DELETE /v1/deals/:id
/// GET    /v1/deals/:id/items
/// POST   /v1/deals/:id/items
/// DELETE /v1/deals/:id/items/:item_id
/// GET    /v1/deals/:id/activities
/// POST   /v1/deals/:id/activities
/// ```

use axum::{extract::State, Extension};
use chrono::Utc;
use salescrm_shared::auth::{
    authorization::{Action, Module},
    middleware::AuthContext,
    scope::{enforce_scope, Scope},
};
use salescrm_shared::models::activity_log::LogAction;
use salescrm_shared::models::deal::{
    CreateDeal, CreateDealActivity, CreateDealLineItem, Deal, DealActivity, DealFilter, DealLineItem,
    UpdateDeal,
};
use salescrm_shared::models::notification::{kind, NewNotification};
use salescrm_shared::pagination::PageParams;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    access::{assign_owner, authorize, ensure_reference, log_activity, notify, Reference},
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath, ApiQuery},
    response::ApiResponse,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DealDetail {
    #[serde(flatten)]
    pub deal: Deal,
    pub items: Vec<DealLineItem>,
    pub activities: Vec<DealActivity>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemChange {
    pub item: Option<DealLineItem>,
    /// Deal amount after recomputation
    pub deal_amount: f64,
}

fn assignment_notice(deal: &Deal, user_id: Uuid) -> NewNotification {
    NewNotification {
        user_id,
        kind: kind::DEAL_ASSIGNED,
        title: "Deal assigned to you".to_string(),
        message: format!("You are now the owner of the deal {}", deal.name),
        link: Some(format!("/deals/{}", deal.id)),
    }
}

/// Loads a deal the caller may see
async fn load_deal(state: &AppState, auth: &AuthContext, scope: &Scope, id: Uuid) -> ApiResult<Deal> {
    let deal = Deal::find_by_id(&state.db, auth.tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Deal"))?;
    enforce_scope(&deal, scope)?;
    Ok(deal)
}

async fn check_references(
    state: &AppState,
    auth: &AuthContext,
    account_id: Option<Uuid>,
    contact_id: Option<Uuid>,
    partner_id: Option<Uuid>,
) -> ApiResult<()> {
    ensure_reference(&state.db, auth.tenant_id, Reference::Account, account_id).await?;
    ensure_reference(&state.db, auth.tenant_id, Reference::Contact, contact_id).await?;
    ensure_reference(&state.db, auth.tenant_id, Reference::Partner, partner_id).await
}

pub async fn list_deals(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(page): ApiQuery<PageParams>,
    ApiQuery(filter): ApiQuery<DealFilter>,
) -> ApiResult<ApiResponse<Vec<Deal>>> {
    let scope = authorize(&state, &auth, Module::Deals, Action::View).await?;

    let (deals, total) = Deal::list(
        &state.db,
        auth.tenant_id,
        &filter,
        scope.owner_filter(),
        page.limit(),
        page.offset(),
    )
    .await?;

    Ok(ApiResponse::page(deals, page.paginate(total)))
}

pub async fn get_deal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<DealDetail>> {
    let scope = authorize(&state, &auth, Module::Deals, Action::View).await?;
    let deal = load_deal(&state, &auth, &scope, id).await?;

    let items = DealLineItem::list(&state.db, id).await?;
    let activities = DealActivity::list(&state.db, id).await?;

    Ok(ApiResponse::ok(DealDetail { deal, items, activities }))
}

pub async fn create_deal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<CreateDeal>,
) -> ApiResult<ApiResponse<Deal>> {
    let scope = authorize(&state, &auth, Module::Deals, Action::Create).await?;
    req.validate()?;
    check_references(&state, &auth, req.account_id, req.contact_id, req.partner_id).await?;
    ensure_reference(&state.db, auth.tenant_id, Reference::Lead, req.lead_id).await?;

    let owner_id = assign_owner(&state, &auth, &scope, req.owner_id).await?;
    let deal = Deal::create(&state.db, auth.tenant_id, owner_id, req).await?;

    notify(&state, &auth, assignment_notice(&deal, owner_id)).await;
    log_activity(
        &state,
        &auth,
        LogAction::Create,
        "deal",
        Some(deal.id),
        json!({ "name": deal.name, "stage": deal.stage, "amount": deal.amount }),
    )
    .await;

    Ok(ApiResponse::created(deal))
}

/// Stage changes reset probability to the stage default unless one is given,
/// stamp `actualCloseDate` on entering a closed stage and clear it when a
/// closed deal reopens.
pub async fn update_deal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(mut req): ApiJson<UpdateDeal>,
) -> ApiResult<ApiResponse<Deal>> {
    let scope = authorize(&state, &auth, Module::Deals, Action::Edit).await?;
    req.validate()?;

    let current = load_deal(&state, &auth, &scope, id).await?;
    check_references(&state, &auth, req.account_id, req.contact_id, req.partner_id).await?;

    let reassigned_to = match req.owner_id {
        Some(user_id) if current.owner_id != Some(user_id) => {
            Some(assign_owner(&state, &auth, &scope, Some(user_id)).await?)
        }
        _ => None,
    };

    req.apply_stage_rules(&current, Utc::now().date_naive());

    let deal = Deal::update(&state.db, auth.tenant_id, id, req)
        .await?
        .ok_or_else(|| ApiError::not_found("Deal"))?;

    if let Some(user_id) = reassigned_to {
        notify(&state, &auth, assignment_notice(&deal, user_id)).await;
    }

    let mut details = json!({ "name": deal.name });
    if deal.stage != current.stage {
        details["fromStage"] = json!(current.stage);
        details["toStage"] = json!(deal.stage);
        tracing::info!(deal_id = %id, from = current.stage.as_str(), to = deal.stage.as_str(), "Deal stage changed");
    }
    log_activity(&state, &auth, LogAction::Update, "deal", Some(id), details).await;

    Ok(ApiResponse::ok(deal))
}

pub async fn delete_deal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<Option<()>>> {
    let scope = authorize(&state, &auth, Module::Deals, Action::Delete).await?;
    let current = load_deal(&state, &auth, &scope, id).await?;

    Deal::delete(&state.db, auth.tenant_id, id).await?;

    log_activity(&state, &auth, LogAction::Delete, "deal", Some(id), json!({ "name": current.name })).await;

    Ok(ApiResponse::empty("Deal deleted"))
}

pub async fn list_items(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<Vec<DealLineItem>>> {
    let scope = authorize(&state, &auth, Module::Deals, Action::View).await?;
    load_deal(&state, &auth, &scope, id).await?;

    Ok(ApiResponse::ok(DealLineItem::list(&state.db, id).await?))
}

pub async fn add_item(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<CreateDealLineItem>,
) -> ApiResult<ApiResponse<LineItemChange>> {
    let scope = authorize(&state, &auth, Module::Deals, Action::Edit).await?;
    req.validate()?;
    load_deal(&state, &auth, &scope, id).await?;
    ensure_reference(&state.db, auth.tenant_id, Reference::Product, req.product_id).await?;

    let mut tx = state.db.begin().await?;
    let item = DealLineItem::create(&mut *tx, id, req).await?;
    let deal_amount = Deal::recompute_amount(&mut *tx, auth.tenant_id, id).await?;
    tx.commit().await?;

    log_activity(
        &state,
        &auth,
        LogAction::Update,
        "deal",
        Some(id),
        json!({ "itemAdded": item.id, "amount": deal_amount }),
    )
    .await;

    Ok(ApiResponse::created(LineItemChange {
        item: Some(item),
        deal_amount,
    }))
}

pub async fn remove_item(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath((id, item_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<ApiResponse<LineItemChange>> {
    let scope = authorize(&state, &auth, Module::Deals, Action::Edit).await?;
    load_deal(&state, &auth, &scope, id).await?;

    let mut tx = state.db.begin().await?;
    if !DealLineItem::delete(&mut *tx, id, item_id).await? {
        return Err(ApiError::not_found("Line item"));
    }
    let deal_amount = Deal::recompute_amount(&mut *tx, auth.tenant_id, id).await?;
    tx.commit().await?;

    log_activity(
        &state,
        &auth,
        LogAction::Update,
        "deal",
        Some(id),
        json!({ "itemRemoved": item_id, "amount": deal_amount }),
    )
    .await;

    Ok(ApiResponse::ok(LineItemChange { item: None, deal_amount }).message("Line item removed"))
}

pub async fn list_activities(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<Vec<DealActivity>>> {
    let scope = authorize(&state, &auth, Module::Deals, Action::View).await?;
    load_deal(&state, &auth, &scope, id).await?;

    Ok(ApiResponse::ok(DealActivity::list(&state.db, id).await?))
}

pub async fn add_activity(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<CreateDealActivity>,
) -> ApiResult<ApiResponse<DealActivity>> {
    let scope = authorize(&state, &auth, Module::Deals, Action::Edit).await?;
    req.validate()?;
    load_deal(&state, &auth, &scope, id).await?;

    let activity = DealActivity::create(&state.db, id, auth.user_id, req).await?;

    Ok(ApiResponse::created(activity))
}
