#![allow(dead_code)] // OpenAPI doc stubs are only referenced by utoipa macros.

use crate::{
    error::ErrorResponse,
    models::auth::{IssueTokenRequest, MeResponse, MessageResponse, TokenResponse},
};
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(issue_token_doc, refresh_doc, logout_doc, me_doc),
    components(schemas(
        IssueTokenRequest,
        TokenResponse,
        MeResponse,
        MessageResponse,
        ErrorResponse
    )),
    modifiers(&SecuritySchemes),
    tags(
        (name = "Auth", description = "Token issuance, rotation and revocation"),
        (name = "Identity", description = "Endpoints behind bearer authentication")
    ),
    security(("BearerAuth" = []))
)]
pub struct ApiDoc;

struct SecuritySchemes;

impl Modify for SecuritySchemes {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_default();

        let mut bearer = Http::new(HttpAuthScheme::Bearer);
        bearer.bearer_format = Some("JWT".to_string());

        components.add_security_scheme("BearerAuth", SecurityScheme::Http(bearer));
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/token",
    request_body = IssueTokenRequest,
    responses(
        (status = 200, description = "Token pair issued; refresh token set as cookie", body = TokenResponse),
        (status = 400, description = "Invalid GUID, missing User-Agent or GUID already exists", body = ErrorResponse),
        (status = 500, description = "Store or signing failure", body = ErrorResponse)
    ),
    tag = "Auth",
    security(())
)]
fn issue_token_doc() {}

#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    responses(
        (status = 200, description = "Pair rotated; new refresh token set as cookie", body = TokenResponse),
        (status = 401, description = "Missing, revoked, expired or mismatched tokens, or User-Agent changed", body = ErrorResponse),
        (status = 500, description = "Store or signing failure", body = ErrorResponse)
    ),
    tag = "Auth"
)]
fn refresh_doc() {}

#[utoipa::path(
    method(post, put),
    path = "/api/v1/auth/logout",
    responses(
        (status = 200, description = "Tokens revoked and session deactivated", body = MessageResponse),
        (status = 401, description = "Access token invalid or already revoked", body = ErrorResponse),
        (status = 500, description = "Store or ledger failure", body = ErrorResponse)
    ),
    tag = "Auth"
)]
fn logout_doc() {}

#[utoipa::path(
    get,
    path = "/api/v1/me",
    responses(
        (status = 200, description = "Identity behind the access token", body = MeResponse),
        (status = 401, description = "Access token invalid, revoked or session inactive", body = ErrorResponse)
    ),
    tag = "Identity"
)]
fn me_doc() {}
