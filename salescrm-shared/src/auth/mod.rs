/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing
/// - [`jwt`]: access/refresh token issuance and validation
/// - [`middleware`]: bearer-token authentication into an [`middleware::AuthContext`]
/// - [`authorization`]: module × action permissions per role
/// - [`scope`]: hierarchical data-visibility scope (own / team / everything)
///
/// # Example
///
/// ```no_run
/// use salescrm_shared::auth::password::{hash_password, verify_password};
/// use salescrm_shared::auth::jwt::issue_token_pair;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("correct horse battery staple")?;
/// assert!(verify_password("correct horse battery staple", &hash)?);
///
/// let tokens = issue_token_pair(Uuid::new_v4(), Uuid::new_v4(), "a-secret-of-at-least-32-characters!")?;
/// println!("{}", tokens.access_token);
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod scope;
