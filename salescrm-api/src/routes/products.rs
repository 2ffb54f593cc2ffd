/// Product catalogue
///
/// Products are tenant-wide reference data: access is governed by the
/// `products` module permission only, without owner scoping.

use axum::{extract::State, Extension};
use salescrm_shared::auth::{
    authorization::{Action, Module},
    middleware::AuthContext,
};
use salescrm_shared::models::activity_log::LogAction;
use salescrm_shared::models::product::{CreateProduct, Product, ProductFilter, UpdateProduct};
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

pub async fn list_products(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(page): ApiQuery<PageParams>,
    ApiQuery(filter): ApiQuery<ProductFilter>,
) -> ApiResult<ApiResponse<Vec<Product>>> {
    permit(&state, &auth, Module::Products, Action::View).await?;

    let (products, total) =
        Product::list(&state.db, auth.tenant_id, &filter, page.limit(), page.offset()).await?;

    Ok(ApiResponse::page(products, page.paginate(total)))
}

pub async fn get_product(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<Product>> {
    permit(&state, &auth, Module::Products, Action::View).await?;

    let product = Product::find_by_id(&state.db, auth.tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product"))?;

    Ok(ApiResponse::ok(product))
}

pub async fn create_product(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<CreateProduct>,
) -> ApiResult<ApiResponse<Product>> {
    permit(&state, &auth, Module::Products, Action::Create).await?;
    req.validate()?;

    let product = Product::create(&state.db, auth.tenant_id, req).await?;

    log_activity(&state, &auth, LogAction::Create, "product", Some(product.id), json!({ "sku": product.sku })).await;

    Ok(ApiResponse::created(product))
}

pub async fn update_product(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateProduct>,
) -> ApiResult<ApiResponse<Product>> {
    permit(&state, &auth, Module::Products, Action::Edit).await?;
    req.validate()?;

    let product = Product::update(&state.db, auth.tenant_id, id, req)
        .await?
        .ok_or_else(|| ApiError::not_found("Product"))?;

    log_activity(&state, &auth, LogAction::Update, "product", Some(id), json!({ "sku": product.sku })).await;

    Ok(ApiResponse::ok(product))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<Option<()>>> {
    permit(&state, &auth, Module::Products, Action::Delete).await?;

    if !Product::delete(&state.db, auth.tenant_id, id).await? {
        return Err(ApiError::not_found("Product"));
    }

    log_activity(&state, &auth, LogAction::Delete, "product", Some(id), json!({})).await;

    Ok(ApiResponse::empty("Product deleted"))
}
