/// Bearer authentication
///
/// Turns an `Authorization` header into an [`AuthContext`]. The token only
/// proves identity; the user row is loaded on every request so that role
/// changes and deactivations take effect without waiting for expiry.
///
/// The HTTP layer wires [`authenticate_bearer`] into an axum
/// `from_fn_with_state` middleware and stores the resulting context in the
/// request extensions, where handlers pick it up with
/// `Extension<AuthContext>`.
///
/// # Example
///
/// ```no_run
/// use salescrm_shared::auth::middleware::authenticate_bearer;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let auth = authenticate_bearer(&pool, "jwt-secret", Some("Bearer eyJ...")).await?;
/// println!("{} acting as {}", auth.user_id, auth.role);
/// # Ok(())
/// # }
/// ```

use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::jwt::{validate_access_token, JwtError};
use crate::models::user::{User, UserRole};

/// The authenticated actor of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthContext {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub role: UserRole,
}

impl AuthContext {
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            tenant_id: user.tenant_id,
            role: user.role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingCredentials,

    #[error("{0}")]
    InvalidFormat(String),

    #[error("{0}")]
    InvalidToken(String),

    /// Token is valid but the user is gone or deactivated
    #[error("User account is inactive or no longer exists")]
    InactiveUser,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Extracts the token from a `Bearer <token>` header value
pub fn parse_bearer(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header.ok_or(AuthError::MissingCredentials)?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))?
        .trim();

    if token.is_empty() {
        return Err(AuthError::InvalidFormat("Empty bearer token".to_string()));
    }

    Ok(token)
}

/// Validates the bearer token and loads the active user it names
pub async fn authenticate_bearer(
    pool: &PgPool,
    secret: &str,
    header: Option<&str>,
) -> Result<AuthContext, AuthError> {
    let token = parse_bearer(header)?;

    let claims = validate_access_token(token, secret).map_err(|e| match e {
        JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
        JwtError::InvalidIssuer => AuthError::InvalidToken("Invalid issuer".to_string()),
        _ => AuthError::InvalidToken(format!("Invalid token: {}", e)),
    })?;

    let user = User::find_by_id(pool, claims.tenant_id, claims.sub)
        .await?
        .filter(|user| user.is_active)
        .ok_or(AuthError::InactiveUser)?;

    Ok(AuthContext::from_user(&user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bearer() {
        assert_eq!(parse_bearer(Some("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
        assert!(matches!(parse_bearer(None), Err(AuthError::MissingCredentials)));
        assert!(matches!(
            parse_bearer(Some("Basic dXNlcjpwYXNz")),
            Err(AuthError::InvalidFormat(_))
        ));
        assert!(matches!(parse_bearer(Some("Bearer   ")), Err(AuthError::InvalidFormat(_))));
    }

    #[test]
    fn test_auth_context_admin() {
        let ctx = AuthContext {
            user_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            role: UserRole::Admin,
        };
        assert!(ctx.is_admin());
        assert!(!AuthContext { role: UserRole::SalesManager, ..ctx }.is_admin());
    }
}
