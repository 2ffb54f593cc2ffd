/// Middleware for the API server
///
/// - `security`: security response headers
/// - `auth`: bearer-token authentication

pub mod auth;
pub mod security;
