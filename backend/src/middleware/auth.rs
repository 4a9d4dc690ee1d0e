use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::{error::AppError, state::AppState, utils::request::bearer_token};

/// Rejects the request unless its bearer access token validates, then makes
/// the authenticated [`Identity`](crate::types::Identity) available to
/// handlers as a request extension.
pub async fn auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())
        .ok_or_else(AppError::unauthorized)?
        .to_string();

    let identity = state.sessions.validate(&token).await?;
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}
