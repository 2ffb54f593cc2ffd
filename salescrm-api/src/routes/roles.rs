/// Role permission matrix
///
/// `GET /v1/roles/:role/permissions` lists every module with the grants in
/// force for the role; `PUT` stores overrides (admin only). The super admin
/// role always holds every grant and cannot be edited.

use axum::{extract::State, Extension};
use salescrm_shared::auth::{
    authorization::{require_admin, Action, Module, Permissions},
    middleware::AuthContext,
};
use salescrm_shared::models::activity_log::LogAction;
use salescrm_shared::models::role_permission::{ModulePermissions, RolePermission};
use salescrm_shared::models::user::UserRole;
use serde::Deserialize;
use serde_json::json;

use crate::{
    access::{log_activity, permit},
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath},
    response::ApiResponse,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionUpdate {
    pub module: Module,
    #[serde(flatten)]
    pub permissions: Permissions,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePermissionsRequest {
    pub permissions: Vec<PermissionUpdate>,
}

pub async fn get_permissions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(role): ApiPath<UserRole>,
) -> ApiResult<ApiResponse<Vec<ModulePermissions>>> {
    permit(&state, &auth, Module::Roles, Action::View).await?;

    let permissions = if role == UserRole::SuperAdmin {
        Module::ALL
            .into_iter()
            .map(|module| ModulePermissions {
                module,
                permissions: Permissions::ALL,
                customized: false,
            })
            .collect()
    } else {
        RolePermission::for_role(&state.db, auth.tenant_id, role).await?
    };

    Ok(ApiResponse::ok(permissions))
}

pub async fn update_permissions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(role): ApiPath<UserRole>,
    ApiJson(req): ApiJson<UpdatePermissionsRequest>,
) -> ApiResult<ApiResponse<Vec<ModulePermissions>>> {
    require_admin(&auth)?;

    if role == UserRole::SuperAdmin {
        return Err(ApiError::BadRequest(
            "Super admin permissions cannot be changed".to_string(),
        ));
    }
    if req.permissions.is_empty() {
        return Err(ApiError::validation("permissions", "At least one module is required"));
    }

    for update in &req.permissions {
        let mut granted = update.permissions;
        // Any write grant implies view
        if granted.can_create || granted.can_edit || granted.can_delete {
            granted.can_view = true;
        }
        RolePermission::upsert(&state.db, auth.tenant_id, role, update.module, granted).await?;
    }

    tracing::info!(tenant_id = %auth.tenant_id, role = %role, modules = req.permissions.len(), "Updated role permissions");
    log_activity(
        &state,
        &auth,
        LogAction::Update,
        "role_permissions",
        None,
        json!({ "role": role, "modules": req.permissions.iter().map(|p| p.module).collect::<Vec<_>>() }),
    )
    .await;

    let permissions = RolePermission::for_role(&state.db, auth.tenant_id, role).await?;
    Ok(ApiResponse::ok(permissions).message("Permissions updated"))
}
