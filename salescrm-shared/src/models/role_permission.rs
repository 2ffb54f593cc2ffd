/// Per-tenant overrides of role permissions
///
/// A missing row means "use the built-in default" (see
/// [`crate::auth::authorization::default_permissions`]).

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::user::UserRole;
use crate::auth::authorization::{default_permissions, Module, Permissions};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RolePermission {
    pub tenant_id: Uuid,
    pub role: UserRole,
    pub module: String,
    pub can_view: bool,
    pub can_create: bool,
    pub can_edit: bool,
    pub can_delete: bool,
    pub updated_at: DateTime<Utc>,
}

/// One module's effective grants, as returned to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModulePermissions {
    pub module: Module,
    #[serde(flatten)]
    pub permissions: Permissions,
    /// False when the built-in default applies
    pub customized: bool,
}

impl RolePermission {
    pub fn permissions(&self) -> Permissions {
        Permissions::new(self.can_view, self.can_create, self.can_edit, self.can_delete)
    }

    pub async fn find(
        pool: &PgPool,
        tenant_id: Uuid,
        role: UserRole,
        module: Module,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, RolePermission>(
            "SELECT * FROM role_permissions WHERE tenant_id = $1 AND role = $2 AND module = $3",
        )
        .bind(tenant_id)
        .bind(role)
        .bind(module.as_str())
        .fetch_optional(pool)
        .await
    }

    /// Every module's grants for `role`, merging stored rows over defaults
    pub async fn for_role(
        pool: &PgPool,
        tenant_id: Uuid,
        role: UserRole,
    ) -> Result<Vec<ModulePermissions>, sqlx::Error> {
        let rows = sqlx::query_as::<_, RolePermission>(
            "SELECT * FROM role_permissions WHERE tenant_id = $1 AND role = $2",
        )
        .bind(tenant_id)
        .bind(role)
        .fetch_all(pool)
        .await?;

        Ok(merge_with_defaults(role, &rows))
    }

    /// Inserts or replaces the row for `(tenant, role, module)`
    pub async fn upsert(
        pool: &PgPool,
        tenant_id: Uuid,
        role: UserRole,
        module: Module,
        permissions: Permissions,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, RolePermission>(
            r#"
            INSERT INTO role_permissions (tenant_id, role, module, can_view, can_create, can_edit, can_delete)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (tenant_id, role, module) DO UPDATE SET
                can_view = EXCLUDED.can_view,
                can_create = EXCLUDED.can_create,
                can_edit = EXCLUDED.can_edit,
                can_delete = EXCLUDED.can_delete,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(role)
        .bind(module.as_str())
        .bind(permissions.can_view)
        .bind(permissions.can_create)
        .bind(permissions.can_edit)
        .bind(permissions.can_delete)
        .fetch_one(pool)
        .await
    }
}

/// Stored rows win; modules without a row get the role default. Rows naming
/// modules that no longer exist are ignored.
pub fn merge_with_defaults(role: UserRole, rows: &[RolePermission]) -> Vec<ModulePermissions> {
    Module::ALL
        .into_iter()
        .map(|module| {
            match rows.iter().find(|row| row.module == module.as_str()) {
                Some(row) => ModulePermissions {
                    module,
                    permissions: row.permissions(),
                    customized: true,
                },
                None => ModulePermissions {
                    module,
                    permissions: default_permissions(role, module),
                    customized: false,
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(module: &str, perms: Permissions) -> RolePermission {
        RolePermission {
            tenant_id: Uuid::new_v4(),
            role: UserRole::SalesRep,
            module: module.to_string(),
            can_view: perms.can_view,
            can_create: perms.can_create,
            can_edit: perms.can_edit,
            can_delete: perms.can_delete,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_merge_prefers_stored_rows() {
        let rows = vec![row("deals", Permissions::ALL), row("obsolete", Permissions::ALL)];
        let merged = merge_with_defaults(UserRole::SalesRep, &rows);

        assert_eq!(merged.len(), Module::ALL.len());

        let deals = merged.iter().find(|m| m.module == Module::Deals).unwrap();
        assert!(deals.customized);
        assert!(deals.permissions.can_delete);

        let leads = merged.iter().find(|m| m.module == Module::Leads).unwrap();
        assert!(!leads.customized);
        assert_eq!(leads.permissions, default_permissions(UserRole::SalesRep, Module::Leads));
    }

    #[test]
    fn test_module_permissions_serialize_flat() {
        let value = serde_json::to_value(ModulePermissions {
            module: Module::QuoteTerms,
            permissions: Permissions::VIEW_ONLY,
            customized: false,
        })
        .unwrap();

        assert_eq!(value["module"], "quote_terms");
        assert_eq!(value["canView"], true);
        assert_eq!(value["canDelete"], false);
    }
}
