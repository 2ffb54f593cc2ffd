/// Per-request access helpers shared by the handlers
///
/// A typical scoped handler calls [`authorize`] (module permission, then the
/// caller's visibility scope), loads the record, and passes it through
/// `enforce_scope` before acting on it.

use salescrm_shared::auth::{
    authorization::{require_permission, Action, Module},
    middleware::AuthContext,
    scope::{resolve_scope, Scope},
};
use salescrm_shared::models::activity_log::{ActivityLog, LogAction};
use salescrm_shared::models::notification::{NewNotification, Notification};
use salescrm_shared::models::user::User;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};

/// Checks the module permission and resolves the caller's scope
pub async fn authorize(
    state: &AppState,
    auth: &AuthContext,
    module: Module,
    action: Action,
) -> ApiResult<Scope> {
    require_permission(&state.db, auth, module, action).await?;
    Ok(resolve_scope(&state.db, auth).await?)
}

/// Checks the module permission for modules without owned records
pub async fn permit(state: &AppState, auth: &AuthContext, module: Module, action: Action) -> ApiResult<()> {
    require_permission(&state.db, auth, module, action).await?;
    Ok(())
}

/// Resolves the owner of a created or reassigned record
///
/// Defaults to the caller. Any other owner must be an active user of the
/// same tenant and inside the caller's scope.
pub async fn assign_owner(
    state: &AppState,
    auth: &AuthContext,
    scope: &Scope,
    requested: Option<Uuid>,
) -> ApiResult<Uuid> {
    let owner = match requested {
        None => return Ok(auth.user_id),
        Some(id) if id == auth.user_id => return Ok(id),
        Some(id) => id,
    };

    scope.ensure_assignable(owner)?;

    match User::find_by_id(&state.db, auth.tenant_id, owner).await? {
        Some(user) if user.is_active => Ok(owner),
        _ => Err(ApiError::validation("ownerId", "Assigned user does not exist or is inactive")),
    }
}

/// Tables a request body may point at
#[derive(Debug, Clone, Copy)]
pub enum Reference {
    Account,
    Contact,
    Deal,
    Lead,
    Partner,
    Product,
    EmailTemplate,
}

impl Reference {
    fn table(&self) -> &'static str {
        match self {
            Reference::Account => "accounts",
            Reference::Contact => "contacts",
            Reference::Deal => "deals",
            Reference::Lead => "leads",
            Reference::Partner => "partners",
            Reference::Product => "products",
            Reference::EmailTemplate => "email_templates",
        }
    }

    fn field(&self) -> &'static str {
        match self {
            Reference::Account => "accountId",
            Reference::Contact => "contactId",
            Reference::Deal => "dealId",
            Reference::Lead => "leadId",
            Reference::Partner => "partnerId",
            Reference::Product => "productId",
            Reference::EmailTemplate => "templateId",
        }
    }
}

/// Rejects ids that do not belong to the caller's tenant
pub async fn ensure_reference(
    pool: &PgPool,
    tenant_id: Uuid,
    reference: Reference,
    id: Option<Uuid>,
) -> ApiResult<()> {
    let Some(id) = id else {
        return Ok(());
    };

    let exists: bool = sqlx::query_scalar(&format!(
        "SELECT EXISTS (SELECT 1 FROM {} WHERE id = $1 AND tenant_id = $2)",
        reference.table()
    ))
    .bind(id)
    .bind(tenant_id)
    .fetch_one(pool)
    .await?;

    if exists {
        Ok(())
    } else {
        Err(ApiError::validation(reference.field(), "Referenced record does not exist"))
    }
}

/// Appends to the activity log; never fails the request
pub async fn log_activity(
    state: &AppState,
    auth: &AuthContext,
    action: LogAction,
    entity_type: &str,
    entity_id: Option<Uuid>,
    details: serde_json::Value,
) {
    ActivityLog::record(
        &state.db,
        auth.tenant_id,
        auth.user_id,
        action,
        entity_type,
        entity_id,
        details,
    )
    .await;
}

/// Notifies a user about something the caller did; self-assignments are
/// skipped and failures are only logged
pub async fn notify(state: &AppState, auth: &AuthContext, notification: NewNotification) {
    if notification.user_id == auth.user_id {
        return;
    }

    let kind = notification.kind;
    if let Err(e) = Notification::create(&state.db, auth.tenant_id, notification).await {
        tracing::warn!(error = %e, kind, "Failed to create notification");
    }
}
