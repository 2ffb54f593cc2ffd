/// Master dropdown values
///
/// ```text
/// GET    /v1/master-data/:category?includeInactive=
/// POST   /v1/master-data/:category
/// PUT    /v1/master-data/:category/:id
/// DELETE /v1/master-data/:category/:id
/// ```
///
/// Category segments are normalised (`Lead-Sources` and `lead_sources` name
/// the same list). Writes are admin only.

use axum::{extract::State, Extension};
use salescrm_shared::auth::{
    authorization::{require_admin, Action, Module},
    middleware::AuthContext,
};
use salescrm_shared::models::activity_log::LogAction;
use salescrm_shared::models::master_data::{
    normalize_category, CreateMasterDropdown, MasterDropdown, UpdateMasterDropdown,
};
use serde::Deserialize;
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

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateValueRequest {
    #[validate(length(min = 1, max = 100, message = "Value is required"))]
    pub value: String,
    /// Defaults to the value
    #[validate(length(min = 1, max = 255))]
    pub label: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateValueRequest {
    #[validate(length(min = 1, max = 100))]
    pub value: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub label: Option<String>,
    pub sort_order: Option<i32>,
    pub is_active: Option<bool>,
}

fn category(raw: &str) -> ApiResult<String> {
    normalize_category(raw).ok_or_else(|| ApiError::BadRequest(format!("Invalid category '{}'", raw)))
}

/// Loads a value and checks it belongs to the category in the path
async fn load_value(state: &AppState, auth: &AuthContext, category: &str, id: Uuid) -> ApiResult<MasterDropdown> {
    MasterDropdown::find_by_id(&state.db, auth.tenant_id, id)
        .await?
        .filter(|value| value.category == category)
        .ok_or_else(|| ApiError::not_found("Master data value"))
}

pub async fn list_values(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(raw): ApiPath<String>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<ApiResponse<Vec<MasterDropdown>>> {
    permit(&state, &auth, Module::MasterData, Action::View).await?;
    let category = category(&raw)?;

    let values = MasterDropdown::list(&state.db, auth.tenant_id, &category, params.include_inactive).await?;

    Ok(ApiResponse::ok(values))
}

pub async fn create_value(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(raw): ApiPath<String>,
    ApiJson(req): ApiJson<CreateValueRequest>,
) -> ApiResult<ApiResponse<MasterDropdown>> {
    require_admin(&auth)?;
    req.validate()?;
    let category = category(&raw)?;

    let value = req.value.trim().to_string();
    let label = req.label.map(|l| l.trim().to_string()).unwrap_or_else(|| value.clone());

    let created = MasterDropdown::create(
        &state.db,
        auth.tenant_id,
        CreateMasterDropdown {
            category,
            value,
            label,
            sort_order: req.sort_order,
        },
    )
    .await?;

    log_activity(
        &state,
        &auth,
        LogAction::Create,
        "master_data",
        Some(created.id),
        json!({ "category": created.category, "value": created.value }),
    )
    .await;

    Ok(ApiResponse::created(created))
}

pub async fn update_value(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath((raw, id)): ApiPath<(String, Uuid)>,
    ApiJson(req): ApiJson<UpdateValueRequest>,
) -> ApiResult<ApiResponse<MasterDropdown>> {
    require_admin(&auth)?;
    req.validate()?;
    let category = category(&raw)?;
    load_value(&state, &auth, &category, id).await?;

    let updated = MasterDropdown::update(
        &state.db,
        auth.tenant_id,
        id,
        UpdateMasterDropdown {
            value: req.value.map(|v| v.trim().to_string()),
            label: req.label,
            sort_order: req.sort_order,
            is_active: req.is_active,
        },
    )
    .await?
    .ok_or_else(|| ApiError::not_found("Master data value"))?;

    log_activity(&state, &auth, LogAction::Update, "master_data", Some(id), json!({ "value": updated.value })).await;

    Ok(ApiResponse::ok(updated))
}

pub async fn delete_value(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath((raw, id)): ApiPath<(String, Uuid)>,
) -> ApiResult<ApiResponse<Option<()>>> {
    require_admin(&auth)?;
    let category = category(&raw)?;
    let current = load_value(&state, &auth, &category, id).await?;

    MasterDropdown::delete(&state.db, auth.tenant_id, id).await?;

    log_activity(
        &state,
        &auth,
        LogAction::Delete,
        "master_data",
        Some(id),
        json!({ "category": current.category, "value": current.value }),
    )
    .await;

    Ok(ApiResponse::empty("Master data value deleted"))
}
