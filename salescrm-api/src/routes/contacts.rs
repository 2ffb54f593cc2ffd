/// Contact endpoints
///
/// ```text
/// GET    /v1/contacts?search=&accountId=&ownerId=
/// POST   /v1/contacts
/// GET    /v1/contacts/:id
/// PUT    /v1/contacts/:id
/// DELETE /v1/contacts/:id
/// ```

use axum::{extract::State, Extension};
use salescrm_shared::auth::{
    authorization::{Action, Module},
    middleware::AuthContext,
    scope::enforce_scope,
};
use salescrm_shared::models::activity_log::LogAction;
use salescrm_shared::models::contact::{Contact, ContactFilter, CreateContact, UpdateContact};
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

pub async fn list_contacts(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(page): ApiQuery<PageParams>,
    ApiQuery(filter): ApiQuery<ContactFilter>,
) -> ApiResult<ApiResponse<Vec<Contact>>> {
    let scope = authorize(&state, &auth, Module::Contacts, Action::View).await?;

    let (contacts, total) = Contact::list(
        &state.db,
        auth.tenant_id,
        &filter,
        scope.owner_filter(),
        page.limit(),
        page.offset(),
    )
    .await?;

    Ok(ApiResponse::page(contacts, page.paginate(total)))
}

pub async fn get_contact(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<Contact>> {
    let scope = authorize(&state, &auth, Module::Contacts, Action::View).await?;

    let contact = Contact::find_by_id(&state.db, auth.tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Contact"))?;
    enforce_scope(&contact, &scope)?;

    Ok(ApiResponse::ok(contact))
}

pub async fn create_contact(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<CreateContact>,
) -> ApiResult<ApiResponse<Contact>> {
    let scope = authorize(&state, &auth, Module::Contacts, Action::Create).await?;
    req.validate()?;
    ensure_reference(&state.db, auth.tenant_id, Reference::Account, req.account_id).await?;

    let owner_id = assign_owner(&state, &auth, &scope, req.owner_id).await?;
    let contact = Contact::create(&state.db, auth.tenant_id, owner_id, req).await?;

    log_activity(
        &state,
        &auth,
        LogAction::Create,
        "contact",
        Some(contact.id),
        json!({ "name": contact.full_name() }),
    )
    .await;

    Ok(ApiResponse::created(contact))
}

pub async fn update_contact(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateContact>,
) -> ApiResult<ApiResponse<Contact>> {
    let scope = authorize(&state, &auth, Module::Contacts, Action::Edit).await?;
    req.validate()?;

    let current = Contact::find_by_id(&state.db, auth.tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Contact"))?;
    enforce_scope(&current, &scope)?;

    ensure_reference(&state.db, auth.tenant_id, Reference::Account, req.account_id).await?;
    if req.owner_id.is_some() {
        assign_owner(&state, &auth, &scope, req.owner_id).await?;
    }

    let contact = Contact::update(&state.db, auth.tenant_id, id, req)
        .await?
        .ok_or_else(|| ApiError::not_found("Contact"))?;

    log_activity(&state, &auth, LogAction::Update, "contact", Some(id), json!({ "name": contact.full_name() })).await;

    Ok(ApiResponse::ok(contact))
}

pub async fn delete_contact(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<Option<()>>> {
    let scope = authorize(&state, &auth, Module::Contacts, Action::Delete).await?;

    let current = Contact::find_by_id(&state.db, auth.tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Contact"))?;
    enforce_scope(&current, &scope)?;

    Contact::delete(&state.db, auth.tenant_id, id).await?;

    log_activity(&state, &auth, LogAction::Delete, "contact", Some(id), json!({ "name": current.full_name() })).await;

    Ok(ApiResponse::empty("Contact deleted"))
}
