use std::{convert::Infallible, net::SocketAddr};

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::request::Parts,
};

use crate::{
    services::ClientContext,
    state::AppState,
    utils::request::{client_ip, user_agent},
};

impl FromRequestParts<AppState> for ClientContext {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Ok(ClientContext {
            user_agent: user_agent(&parts.headers),
            ip: client_ip(&parts.headers, peer, state.config.trust_proxy_headers),
        })
    }
}
