/// Users, roles and the manager tree
///
/// Every user belongs to exactly one tenant. `manager_id` points at the
/// user's direct manager and, across the tenant, forms the reports-to tree
/// that drives record visibility (see [`crate::auth::scope`]).
///
/// # Schema
///
/// ```sql
/// CREATE TYPE user_role AS ENUM ('super_admin', 'admin', 'sales_manager', 'sales_rep', 'support');
///
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
///     email VARCHAR(255) NOT NULL,          -- unique on LOWER(email)
///     password_hash VARCHAR(255) NOT NULL,
///     name VARCHAR(255) NOT NULL,
///     phone VARCHAR(50),
///     role user_role NOT NULL DEFAULT 'sales_rep',
///     manager_id UUID REFERENCES users(id) ON DELETE SET NULL,
///     is_active BOOLEAN NOT NULL DEFAULT TRUE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_login_at TIMESTAMPTZ
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor, PgPool, Postgres, QueryBuilder};
use std::fmt;
use uuid::Uuid;

use super::like_pattern;
use crate::auth::scope::Owned;

/// How much of the tenant's data a role can see
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeTier {
    /// Every record in the tenant
    Unrestricted,

    /// Own records plus those of direct and indirect reports
    Team,

    /// Own records only
    Own,
}

/// Closed set of user roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    SuperAdmin,
    Admin,
    SalesManager,
    SalesRep,
    Support,
}

impl UserRole {
    pub const ALL: [UserRole; 5] = [
        UserRole::SuperAdmin,
        UserRole::Admin,
        UserRole::SalesManager,
        UserRole::SalesRep,
        UserRole::Support,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::SuperAdmin => "super_admin",
            UserRole::Admin => "admin",
            UserRole::SalesManager => "sales_manager",
            UserRole::SalesRep => "sales_rep",
            UserRole::Support => "support",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.as_str() == s)
    }

    pub fn scope_tier(&self) -> ScopeTier {
        match self {
            UserRole::SuperAdmin | UserRole::Admin => ScopeTier::Unrestricted,
            UserRole::SalesManager => ScopeTier::Team,
            UserRole::SalesRep | UserRole::Support => ScopeTier::Own,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.scope_tier() == ScopeTier::Unrestricted
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const USER_COLUMNS: &str = "u.id, u.tenant_id, u.email, u.password_hash, u.name, u.phone, u.role, \
    u.manager_id, m.name AS manager_name, u.is_active, u.created_at, u.updated_at, u.last_login_at";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,

    /// Argon2id PHC string; never serialized
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    pub name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub manager_id: Option<Uuid>,

    #[sqlx(default)]
    pub manager_name: Option<String>,

    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CreateUser {
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub manager_id: Option<Uuid>,
}

/// Partial update; `None` leaves a column untouched
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<UserRole>,
    /// `Some(None)` detaches the user from their manager
    pub manager_id: Option<Option<Uuid>>,
    pub is_active: Option<bool>,
    pub password_hash: Option<String>,
}

/// One `(id, manager_id)` edge of the reports-to tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct ManagerEdge {
    pub id: Uuid,
    pub manager_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub search: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

/// Users are visible to whoever has them in scope
impl Owned for User {
    const RESOURCE: &'static str = "user";

    fn owner_id(&self) -> Option<Uuid> {
        Some(self.id)
    }
}

impl User {
    pub async fn create(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        data: CreateUser,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            WITH u AS (
                INSERT INTO users (tenant_id, email, password_hash, name, phone, role, manager_id)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *
            )
            SELECT {USER_COLUMNS} FROM u LEFT JOIN users m ON m.id = u.manager_id
            "#
        ))
        .bind(tenant_id)
        .bind(data.email)
        .bind(data.password_hash)
        .bind(data.name)
        .bind(data.phone)
        .bind(data.role)
        .bind(data.manager_id)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users u LEFT JOIN users m ON m.id = u.manager_id \
             WHERE u.id = $1 AND u.tenant_id = $2"
        ))
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(executor)
        .await
    }

    /// Case-insensitive lookup across all tenants (used by login)
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users u LEFT JOIN users m ON m.id = u.manager_id \
             WHERE LOWER(u.email) = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(pool)
        .await
    }

    /// Lists users whose id is in `scope_ids` (all users when `None`)
    pub async fn list(
        pool: &PgPool,
        tenant_id: Uuid,
        filter: &UserFilter,
        scope_ids: Option<Vec<Uuid>>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let search = like_pattern(&filter.search);
        let predicate = "u.tenant_id = $1 \
            AND ($2::uuid[] IS NULL OR u.id = ANY($2)) \
            AND ($3::text IS NULL OR u.name ILIKE $3 OR u.email ILIKE $3) \
            AND ($4::user_role IS NULL OR u.role = $4) \
            AND ($5::boolean IS NULL OR u.is_active = $5)";

        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users u LEFT JOIN users m ON m.id = u.manager_id \
             WHERE {predicate} ORDER BY u.name ASC LIMIT $6 OFFSET $7"
        ))
        .bind(tenant_id)
        .bind(&scope_ids)
        .bind(&search)
        .bind(filter.role)
        .bind(filter.is_active)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM users u WHERE {predicate}"))
            .bind(tenant_id)
            .bind(&scope_ids)
            .bind(&search)
            .bind(filter.role)
            .bind(filter.is_active)
            .fetch_one(pool)
            .await?;

        Ok((users, total))
    }

    /// Runs on a connection so a manager change can share the transaction
    /// that checked it (see [`User::lock_hierarchy`])
    pub async fn update(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        id: Uuid,
        data: UpdateUser,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE users SET updated_at = NOW()");

        if let Some(name) = data.name {
            qb.push(", name = ").push_bind(name);
        }
        if let Some(phone) = data.phone {
            qb.push(", phone = ").push_bind(phone);
        }
        if let Some(role) = data.role {
            qb.push(", role = ").push_bind(role);
        }
        if let Some(manager_id) = data.manager_id {
            qb.push(", manager_id = ").push_bind(manager_id);
        }
        if let Some(is_active) = data.is_active {
            qb.push(", is_active = ").push_bind(is_active);
        }
        if let Some(password_hash) = data.password_hash {
            qb.push(", password_hash = ").push_bind(password_hash);
        }

        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" AND tenant_id = ").push_bind(tenant_id);
        qb.push(" RETURNING id");

        let Some(id) = qb.build_query_scalar::<Uuid>().fetch_optional(&mut *conn).await? else {
            return Ok(None);
        };
        Self::find_by_id(&mut *conn, tenant_id, id).await
    }

    pub async fn delete(pool: &PgPool, tenant_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn update_last_login(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }

    /// All reports-to edges of a tenant
    pub async fn manager_edges(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
    ) -> Result<Vec<ManagerEdge>, sqlx::Error> {
        sqlx::query_as::<_, ManagerEdge>("SELECT id, manager_id FROM users WHERE tenant_id = $1")
            .bind(tenant_id)
            .fetch_all(executor)
            .await
    }

    /// Serialises manager-tree writes within a tenant until the transaction ends
    ///
    /// Concurrent reassignments each check the tree for cycles before writing;
    /// holding this lock across check and write keeps two opposite edges from
    /// both passing.
    pub async fn lock_hierarchy(conn: &mut PgConnection, tenant_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended('user_hierarchy:' || $1::uuid::text, 0))")
            .bind(tenant_id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }
}
