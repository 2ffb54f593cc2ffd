/// Bearer authentication
///
/// Validates the access token, reloads the user so deactivation and role
/// changes apply immediately, and stores an [`AuthContext`] in the request
/// extensions for handlers to pick up with `Extension<AuthContext>`.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use salescrm_shared::auth::middleware::{authenticate_bearer, AuthContext};

use crate::{app::AppState, error::ApiError};

pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let auth: AuthContext = authenticate_bearer(&state.db, state.jwt_secret(), header_value)
        .await
        .map_err(|e| {
            tracing::debug!(error = %e, "Rejected request authentication");
            ApiError::from(e)
        })?;

    req.extensions_mut().insert(auth);

    Ok(next.run(req).await)
}
