use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::auth::{IssueTokenRequest, MessageResponse, TokenResponse},
    services::{ClientContext, IssuedTokens},
    state::AppState,
    types::Identity,
    utils::{
        cookies::{clear_refresh_cookie, refresh_cookie, refresh_token_from_cookies},
        request::bearer_token,
    },
};

fn cookie_headers(headers: &HeaderMap) -> impl Iterator<Item = &str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
}

fn token_response(state: &AppState, tokens: IssuedTokens) -> Result<Response, AppError> {
    let policy = state.sessions.policy();
    let max_age = policy
        .refresh_ttl
        .to_std()
        .map_err(|e| AppError::InternalServerError(anyhow::anyhow!("Invalid refresh TTL: {}", e)))?;
    let cookie = refresh_cookie(&tokens.refresh_token, max_age, state.config.cookie_options());

    let body = TokenResponse {
        access_token: tokens.access_token,
        token_type: "Bearer".to_string(),
        expires_in: policy.access_ttl.num_seconds(),
    };
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

pub async fn issue_token(
    State(state): State<AppState>,
    client: ClientContext,
    payload: Result<Json<IssueTokenRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(payload) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Rejected token request body");
        AppError::BadRequest("Failed to decode request body".to_string())
    })?;
    payload.validate()?;

    let identity: Identity = payload
        .guid
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid GUID".to_string()))?;

    let tokens = state.sessions.issue(identity, &client).await?;
    token_response(&state, tokens)
}

pub async fn refresh(
    State(state): State<AppState>,
    client: ClientContext,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let access_token = bearer_token(&headers).ok_or_else(AppError::unauthorized)?;
    let refresh_token = refresh_token_from_cookies(cookie_headers(&headers)).map_err(|err| {
        tracing::info!(reason = %err, "Refresh without a usable refresh cookie");
        AppError::unauthorized()
    })?;

    let tokens = state
        .sessions
        .refresh(access_token, &refresh_token, &client)
        .await?;
    token_response(&state, tokens)
}

pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let access_token = bearer_token(&headers).ok_or_else(AppError::unauthorized)?;
    let refresh_token = refresh_token_from_cookies(cookie_headers(&headers)).ok();

    state
        .sessions
        .logout(access_token, refresh_token.as_deref())
        .await?;

    let cookie = clear_refresh_cookie(state.config.cookie_options());
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(MessageResponse {
            message: "Logged out".to_string(),
        }),
    )
        .into_response())
}
