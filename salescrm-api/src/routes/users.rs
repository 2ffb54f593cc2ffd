/// User management
///
/// Everyone with `users:view` can browse the users in their scope; creating,
/// changing and deleting users is reserved to the admin tier. Reports-to
/// changes are checked against the current tree so the hierarchy stays
/// acyclic.

use axum::{extract::State, Extension};
use salescrm_shared::auth::{
    authorization::{require_admin, Action, Module},
    middleware::AuthContext,
    password,
    scope::{creates_cycle, enforce_scope, scope_for, Scope},
};
use salescrm_shared::models::activity_log::LogAction;
use salescrm_shared::models::role_permission::{ModulePermissions, RolePermission};
use salescrm_shared::models::user::{CreateUser, UpdateUser, User, UserFilter, UserRole};
use salescrm_shared::pagination::PageParams;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use sqlx::PgConnection;
use uuid::Uuid;
use validator::Validate;

use crate::{
    access::{authorize, log_activity},
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath, ApiQuery},
    response::ApiResponse,
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub search: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    pub role: UserRole,
    pub manager_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    pub role: Option<UserRole>,
    /// Absent leaves the manager alone; `null` detaches the user
    #[serde(default, deserialize_with = "present")]
    pub manager_id: Option<Option<Uuid>>,
    pub is_active: Option<bool>,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: Option<String>,
}

/// Distinguishes an explicit `null` from a missing field
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user: User,
    pub permissions: Vec<ModulePermissions>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamResponse {
    /// True for admin tiers, whose scope is the whole tenant
    pub unrestricted: bool,
    pub members: Vec<User>,
}

/// Only a super admin may hand out or take away the super admin role
fn guard_super_admin(auth: &AuthContext, target: Option<&User>, role: Option<UserRole>) -> ApiResult<()> {
    if auth.role == UserRole::SuperAdmin {
        return Ok(());
    }
    let touches_super = role == Some(UserRole::SuperAdmin)
        || target.is_some_and(|user| user.role == UserRole::SuperAdmin);
    if touches_super {
        return Err(ApiError::Forbidden("Only a super admin can manage super admins".to_string()));
    }
    Ok(())
}

/// Validates a new reports-to edge `user_id -> manager_id`
///
/// Callers that go on to write the edge run this inside a transaction
/// holding [`User::lock_hierarchy`].
async fn check_manager(
    conn: &mut PgConnection,
    auth: &AuthContext,
    user_id: Option<Uuid>,
    manager_id: Uuid,
) -> ApiResult<()> {
    let manager = User::find_by_id(&mut *conn, auth.tenant_id, manager_id).await?;
    if !manager.is_some_and(|m| m.is_active) {
        return Err(ApiError::validation("managerId", "Manager does not exist or is inactive"));
    }

    if let Some(user_id) = user_id {
        let edges = User::manager_edges(&mut *conn, auth.tenant_id).await?;
        if creates_cycle(user_id, manager_id, &edges) {
            return Err(ApiError::validation(
                "managerId",
                "A user cannot report to themselves or to one of their reports",
            ));
        }
    }

    Ok(())
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(page): ApiQuery<PageParams>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> ApiResult<ApiResponse<Vec<User>>> {
    let scope = authorize(&state, &auth, Module::Users, Action::View).await?;

    let filter = UserFilter {
        search: query.search,
        role: query.role,
        is_active: query.is_active,
    };
    let (users, total) = User::list(
        &state.db,
        auth.tenant_id,
        &filter,
        scope.owner_filter(),
        page.limit(),
        page.offset(),
    )
    .await?;

    Ok(ApiResponse::page(users, page.paginate(total)))
}

pub async fn get_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<User>> {
    let scope = authorize(&state, &auth, Module::Users, Action::View).await?;

    let user = User::find_by_id(&state.db, auth.tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    enforce_scope(&user, &scope)?;

    Ok(ApiResponse::ok(user))
}

/// `GET /v1/users/me`: the caller's profile and effective permissions
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<ApiResponse<MeResponse>> {
    let user = User::find_by_id(&state.db, auth.tenant_id, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    let permissions = RolePermission::for_role(&state.db, auth.tenant_id, auth.role).await?;

    Ok(ApiResponse::ok(MeResponse { user, permissions }))
}

/// `GET /v1/users/:id/team`: the users whose records `id` can see, paginated
pub async fn get_team(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(page): ApiQuery<PageParams>,
) -> ApiResult<ApiResponse<TeamResponse>> {
    let scope = authorize(&state, &auth, Module::Users, Action::View).await?;

    let user = User::find_by_id(&state.db, auth.tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    enforce_scope(&user, &scope)?;

    let edges = User::manager_edges(&state.db, auth.tenant_id).await?;
    let team = scope_for(user.id, user.role.scope_tier(), &edges);

    let (members, total) = User::list(
        &state.db,
        auth.tenant_id,
        &UserFilter::default(),
        team.owner_filter(),
        page.limit(),
        page.offset(),
    )
    .await?;

    Ok(ApiResponse::page(
        TeamResponse {
            unrestricted: matches!(team, Scope::Unrestricted),
            members,
        },
        page.paginate(total),
    ))
}

pub async fn create_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<CreateUserRequest>,
) -> ApiResult<ApiResponse<User>> {
    require_admin(&auth)?;
    req.validate()?;
    password::validate_password_strength(&req.password)
        .map_err(|msg| ApiError::validation("password", msg))?;
    guard_super_admin(&auth, None, Some(req.role))?;

    if let Some(manager_id) = req.manager_id {
        let mut conn = state.db.acquire().await?;
        check_manager(&mut *conn, &auth, None, manager_id).await?;
    }

    let email = req.email.trim().to_lowercase();
    if User::find_by_email(&state.db, &email).await?.is_some() {
        return Err(ApiError::Conflict("Email already registered".to_string()));
    }

    let user = User::create(
        &state.db,
        auth.tenant_id,
        CreateUser {
            email,
            password_hash: password::hash_password(&req.password)?,
            name: req.name.trim().to_string(),
            phone: req.phone,
            role: req.role,
            manager_id: req.manager_id,
        },
    )
    .await?;

    log_activity(&state, &auth, LogAction::Create, "user", Some(user.id), json!({ "role": user.role })).await;

    Ok(ApiResponse::created(user))
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateUserRequest>,
) -> ApiResult<ApiResponse<User>> {
    require_admin(&auth)?;
    req.validate()?;

    let current = User::find_by_id(&state.db, auth.tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    guard_super_admin(&auth, Some(&current), req.role)?;

    if id == auth.user_id && (req.is_active == Some(false) || req.role.is_some_and(|r| r != current.role)) {
        return Err(ApiError::BadRequest("You cannot deactivate or demote yourself".to_string()));
    }

    let password_hash = match req.password.as_deref() {
        Some(pw) => {
            password::validate_password_strength(pw).map_err(|msg| ApiError::validation("password", msg))?;
            Some(password::hash_password(pw)?)
        }
        None => None,
    };

    let mut tx = state.db.begin().await?;
    if let Some(Some(manager_id)) = req.manager_id {
        User::lock_hierarchy(&mut *tx, auth.tenant_id).await?;
        check_manager(&mut *tx, &auth, Some(id), manager_id).await?;
    }

    let user = User::update(
        &mut *tx,
        auth.tenant_id,
        id,
        UpdateUser {
            name: req.name,
            phone: req.phone,
            role: req.role,
            manager_id: req.manager_id,
            is_active: req.is_active,
            password_hash,
        },
    )
    .await?
    .ok_or_else(|| ApiError::not_found("User"))?;
    tx.commit().await?;

    log_activity(&state, &auth, LogAction::Update, "user", Some(id), json!({})).await;

    Ok(ApiResponse::ok(user))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<Option<()>>> {
    require_admin(&auth)?;

    if id == auth.user_id {
        return Err(ApiError::BadRequest("You cannot delete your own account".to_string()));
    }

    let current = User::find_by_id(&state.db, auth.tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    guard_super_admin(&auth, Some(&current), None)?;

    if !User::delete(&state.db, auth.tenant_id, id).await? {
        return Err(ApiError::not_found("User"));
    }

    log_activity(&state, &auth, LogAction::Delete, "user", Some(id), json!({ "email": current.email })).await;

    Ok(ApiResponse::empty("User deleted"))
}
