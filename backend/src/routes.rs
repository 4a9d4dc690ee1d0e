use axum::{
    http::{header, Method},
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{docs::ApiDoc, handlers, middleware, state::AppState};

pub const API_PREFIX: &str = "/api/v1";

/// The complete HTTP surface with shared layers applied.
pub fn app_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/token", post(handlers::auth::issue_token))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route(
            "/auth/logout",
            post(handlers::auth::logout).put(handlers::auth::logout),
        );

    let protected_routes = Router::new()
        .route("/me", get(handlers::me::me))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth,
        ));

    let api = Router::new().merge(public_routes).merge(protected_routes);

    Router::new()
        .nest(API_PREFIX, api)
        .merge(
            SwaggerUi::new("/api/v1/swagger-ui").url("/api/v1/openapi.json", ApiDoc::openapi()),
        )
        .layer(
            ServiceBuilder::new()
                .layer(axum_middleware::from_fn(middleware::request_id::request_id))
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
                        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
                        .max_age(std::time::Duration::from_secs(24 * 60 * 60)),
                ),
        )
        .with_state(state)
}
