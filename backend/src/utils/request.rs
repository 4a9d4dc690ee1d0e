use std::net::SocketAddr;

use axum::http::{header, HeaderMap};

pub const UNKNOWN_CLIENT_IP: &str = "unknown";

/// Extracts the token from `Authorization: Bearer <token>`.
///
/// The header must have exactly two space-separated segments and the scheme
/// must be `Bearer` (any case).
pub fn parse_bearer_token(header: &str) -> Option<&str> {
    let mut segments = header.split(' ');
    let scheme = segments.next()?;
    let token = segments.next()?;
    if segments.next().is_some() || token.is_empty() {
        return None;
    }
    scheme.eq_ignore_ascii_case("bearer").then_some(token)
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_bearer_token)
}

pub fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| value.to_string())
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| value.to_string())
}

/// Proxy headers are consulted only when the deployment says a trusted proxy
/// sets them; otherwise the TCP peer address is used.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy_headers: bool) -> String {
    trust_proxy_headers
        .then(|| forwarded_ip(headers))
        .flatten()
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| UNKNOWN_CLIENT_IP.to_string())
}
