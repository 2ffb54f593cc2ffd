/// Module-level permissions
///
/// Two checks guard every endpoint:
///
/// 1. **Module permission**: may this role perform `Action` on `Module` at
///    all? Answered by the tenant's `role_permissions` rows, falling back to
///    [`default_permissions`] when the tenant never customised the role.
/// 2. **Record scope**: may this user touch this particular record? See
///    [`crate::auth::scope`].
///
/// `super_admin` always passes the module check; its permissions cannot be
/// lowered.
///
/// # Example
///
/// ```no_run
/// use salescrm_shared::auth::authorization::{require_permission, Action, Module};
/// use salescrm_shared::auth::middleware::AuthContext;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool, auth: AuthContext) -> Result<(), Box<dyn std::error::Error>> {
/// require_permission(&pool, &auth, Module::Deals, Action::Edit).await?;
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::fmt;

use super::middleware::AuthContext;
use super::scope::ScopeError;
use crate::models::role_permission::RolePermission;
use crate::models::user::UserRole;

#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("You do not have permission to {action} {module}")]
    MissingPermission { module: Module, action: Action },

    #[error("Administrator role required")]
    AdminRequired,

    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Functional areas permissions are granted on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Module {
    Dashboard,
    Accounts,
    Contacts,
    Leads,
    Deals,
    Partners,
    Products,
    Quotes,
    QuoteTerms,
    Sales,
    Tasks,
    Calendar,
    EmailTemplates,
    Emails,
    ActivityLogs,
    Users,
    Roles,
    MasterData,
}

impl Module {
    pub const ALL: [Module; 18] = [
        Module::Dashboard,
        Module::Accounts,
        Module::Contacts,
        Module::Leads,
        Module::Deals,
        Module::Partners,
        Module::Products,
        Module::Quotes,
        Module::QuoteTerms,
        Module::Sales,
        Module::Tasks,
        Module::Calendar,
        Module::EmailTemplates,
        Module::Emails,
        Module::ActivityLogs,
        Module::Users,
        Module::Roles,
        Module::MasterData,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Module::Dashboard => "dashboard",
            Module::Accounts => "accounts",
            Module::Contacts => "contacts",
            Module::Leads => "leads",
            Module::Deals => "deals",
            Module::Partners => "partners",
            Module::Products => "products",
            Module::Quotes => "quotes",
            Module::QuoteTerms => "quote_terms",
            Module::Sales => "sales",
            Module::Tasks => "tasks",
            Module::Calendar => "calendar",
            Module::EmailTemplates => "email_templates",
            Module::Emails => "emails",
            Module::ActivityLogs => "activity_logs",
            Module::Users => "users",
            Module::Roles => "roles",
            Module::MasterData => "master_data",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == s)
    }

    /// Tenant configuration rather than day-to-day sales work
    pub fn is_settings(&self) -> bool {
        matches!(
            self,
            Module::Users
                | Module::Roles
                | Module::MasterData
                | Module::Products
                | Module::QuoteTerms
                | Module::EmailTemplates
        )
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    View,
    Create,
    Edit,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::View => "view",
            Action::Create => "create",
            Action::Edit => "edit",
            Action::Delete => "delete",
        })
    }
}

/// The four grants a role holds on one module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permissions {
    pub can_view: bool,
    pub can_create: bool,
    pub can_edit: bool,
    pub can_delete: bool,
}

impl Permissions {
    pub const ALL: Permissions = Permissions::new(true, true, true, true);
    pub const VIEW_ONLY: Permissions = Permissions::new(true, false, false, false);
    pub const NO_DELETE: Permissions = Permissions::new(true, true, true, false);

    pub const fn new(can_view: bool, can_create: bool, can_edit: bool, can_delete: bool) -> Self {
        Self {
            can_view,
            can_create,
            can_edit,
            can_delete,
        }
    }

    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::View => self.can_view,
            Action::Create => self.can_create,
            Action::Edit => self.can_edit,
            Action::Delete => self.can_delete,
        }
    }
}

/// Built-in grants used until a tenant customises a role
pub fn default_permissions(role: UserRole, module: Module) -> Permissions {
    match role {
        UserRole::SuperAdmin | UserRole::Admin => Permissions::ALL,
        UserRole::SalesManager => match module {
            Module::EmailTemplates => Permissions::NO_DELETE,
            m if m.is_settings() => Permissions::VIEW_ONLY,
            Module::Dashboard | Module::ActivityLogs => Permissions::VIEW_ONLY,
            _ => Permissions::ALL,
        },
        UserRole::SalesRep => match module {
            m if m.is_settings() => Permissions::VIEW_ONLY,
            Module::Dashboard | Module::ActivityLogs => Permissions::VIEW_ONLY,
            _ => Permissions::NO_DELETE,
        },
        UserRole::Support => match module {
            Module::Tasks | Module::Calendar => Permissions::NO_DELETE,
            _ => Permissions::VIEW_ONLY,
        },
    }
}

/// Effective grants for `role` on `module` within the caller's tenant
pub async fn effective_permissions(
    pool: &PgPool,
    auth: &AuthContext,
    role: UserRole,
    module: Module,
) -> Result<Permissions, sqlx::Error> {
    if role == UserRole::SuperAdmin {
        return Ok(Permissions::ALL);
    }

    let stored = RolePermission::find(pool, auth.tenant_id, role, module).await?;
    Ok(stored
        .map(|row| row.permissions())
        .unwrap_or_else(|| default_permissions(role, module)))
}

/// Fails with [`AuthzError::MissingPermission`] unless the actor's role may
/// perform `action` on `module`
pub async fn require_permission(
    pool: &PgPool,
    auth: &AuthContext,
    module: Module,
    action: Action,
) -> Result<(), AuthzError> {
    let granted = effective_permissions(pool, auth, auth.role, module).await?;

    if !granted.allows(action) {
        tracing::debug!(
            user_id = %auth.user_id,
            role = %auth.role,
            module = %module,
            action = %action,
            "Permission denied"
        );
        return Err(AuthzError::MissingPermission { module, action });
    }

    Ok(())
}

/// Fails unless the actor is in an admin tier
pub fn require_admin(auth: &AuthContext) -> Result<(), AuthzError> {
    if !auth.is_admin() {
        return Err(AuthzError::AdminRequired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_admin_defaults_grant_everything() {
        for module in Module::ALL {
            assert_eq!(default_permissions(UserRole::SuperAdmin, module), Permissions::ALL);
            assert_eq!(default_permissions(UserRole::Admin, module), Permissions::ALL);
        }
    }

    #[test]
    fn test_manager_and_rep_defaults() {
        let manager = default_permissions(UserRole::SalesManager, Module::Deals);
        assert!(manager.allows(Action::Delete));

        let rep = default_permissions(UserRole::SalesRep, Module::Deals);
        assert!(rep.allows(Action::Create));
        assert!(rep.allows(Action::Edit));
        assert!(!rep.allows(Action::Delete));

        for role in [UserRole::SalesManager, UserRole::SalesRep] {
            let users = default_permissions(role, Module::Users);
            assert!(users.allows(Action::View));
            assert!(!users.allows(Action::Create));
        }

        assert!(default_permissions(UserRole::SalesManager, Module::EmailTemplates).allows(Action::Edit));
        assert!(!default_permissions(UserRole::SalesRep, Module::EmailTemplates).allows(Action::Edit));
    }

    #[test]
    fn test_support_defaults() {
        assert_eq!(default_permissions(UserRole::Support, Module::Leads), Permissions::VIEW_ONLY);
        assert!(default_permissions(UserRole::Support, Module::Tasks).allows(Action::Edit));
        assert!(!default_permissions(UserRole::Support, Module::Tasks).allows(Action::Delete));
    }

    #[test]
    fn test_module_parse_roundtrip() {
        for module in Module::ALL {
            assert_eq!(Module::parse(module.as_str()), Some(module));
        }
        assert_eq!(Module::parse("widgets"), None);
    }

    #[test]
    fn test_require_admin() {
        let mut auth = AuthContext {
            user_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            role: UserRole::Admin,
        };
        assert!(require_admin(&auth).is_ok());

        auth.role = UserRole::SalesManager;
        assert!(matches!(require_admin(&auth), Err(AuthzError::AdminRequired)));
    }

    #[test]
    fn test_missing_permission_message() {
        let err = AuthzError::MissingPermission {
            module: Module::QuoteTerms,
            action: Action::Delete,
        };
        assert_eq!(err.to_string(), "You do not have permission to delete quote_terms");
    }
}
