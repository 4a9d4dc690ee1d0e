use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tokenkeeper_backend::{
    repositories::SessionRecordRepository,
    types::Identity,
    utils::{
        cookies::{refresh_token_from_cookies, REFRESH_COOKIE_NAME},
        jwt::{TokenCodec, TokenKind},
    },
};
use tower::ServiceExt;
use uuid::Uuid;

mod support;

const UA: &str = "Mozilla/5.0 (X11; Linux x86_64)";
const IP: &str = "198.51.100.10";

struct Pair {
    access: String,
    refresh_cookie: String,
}

async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

fn set_cookie(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::SET_COOKIE)
        .expect("set-cookie header")
        .to_str()
        .expect("ascii cookie")
        .to_string()
}

/// `name=value` part of a `Set-Cookie` header, as a browser would send it back.
fn cookie_pair(set_cookie: &str) -> String {
    set_cookie
        .split(';')
        .next()
        .expect("cookie pair")
        .to_string()
}

async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.expect("router response")
}

fn issue_request(guid: &str, ua: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/v1/auth/token")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", IP);
    if let Some(ua) = ua {
        builder = builder.header(header::USER_AGENT, ua);
    }
    builder
        .body(Body::from(json!({ "guid": guid }).to_string()))
        .unwrap()
}

fn refresh_request(pair: &Pair, ua: &str, ip: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/auth/refresh")
        .header(header::AUTHORIZATION, format!("Bearer {}", pair.access))
        .header(header::COOKIE, &pair.refresh_cookie)
        .header(header::USER_AGENT, ua)
        .header("x-forwarded-for", ip)
        .body(Body::empty())
        .unwrap()
}

fn me_request(access: &str) -> Request<Body> {
    Request::builder()
        .uri("/api/v1/me")
        .header(header::AUTHORIZATION, format!("Bearer {}", access))
        .body(Body::empty())
        .unwrap()
}

fn logout_request(pair: &Pair, method: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri("/api/v1/auth/logout")
        .header(header::AUTHORIZATION, format!("Bearer {}", pair.access))
        .header(header::COOKIE, &pair.refresh_cookie)
        .body(Body::empty())
        .unwrap()
}

async fn pair_from(response: Response<Body>) -> Pair {
    assert_eq!(response.status(), StatusCode::OK);
    let refresh_cookie = cookie_pair(&set_cookie(&response));
    let json = body_json(response).await;
    Pair {
        access: json["access_token"].as_str().expect("access token").to_string(),
        refresh_cookie,
    }
}

async fn issue(app: &Router, guid: &str) -> Pair {
    pair_from(send(app, issue_request(guid, Some(UA))).await).await
}

#[tokio::test]
async fn issue_returns_access_token_and_refresh_cookie() {
    let app = support::memory_app();
    let guid = Uuid::new_v4().to_string();

    let response = send(&app.router, issue_request(&guid, Some(UA))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = set_cookie(&response);
    assert!(cookie.starts_with(&format!("{}=", REFRESH_COOKIE_NAME)));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Path=/"));
    assert!(cookie.contains(&format!("Max-Age={}", 7 * 24 * 60 * 60)));

    let refresh = refresh_token_from_cookies([cookie_pair(&cookie).as_str()]).expect("decode cookie");
    let codec = TokenCodec::new(support::TEST_SECRET);
    let verified = codec.verify(&refresh, TokenKind::Refresh).expect("refresh token");
    assert_eq!(verified.identity.to_string(), guid);

    let json = body_json(response).await;
    assert_eq!(json["token_type"], "Bearer");
    assert_eq!(json["expires_in"], 3600);
    let access = json["access_token"].as_str().unwrap();
    assert!(codec.verify(access, TokenKind::Access).is_ok());
}

#[tokio::test]
async fn full_lifecycle() {
    let app = support::memory_app();
    let guid = Uuid::new_v4().to_string();

    let first = issue(&app.router, &guid).await;
    let me = send(&app.router, me_request(&first.access)).await;
    assert_eq!(me.status(), StatusCode::OK);
    assert_eq!(body_json(me).await, json!({ "guid": guid }));

    let second = pair_from(send(&app.router, refresh_request(&first, UA, IP)).await).await;
    assert_ne!(second.access, first.access);
    assert_ne!(second.refresh_cookie, first.refresh_cookie);

    let stale = send(&app.router, me_request(&first.access)).await;
    assert_eq!(stale.status(), StatusCode::UNAUTHORIZED);
    let replay = send(&app.router, refresh_request(&first, UA, IP)).await;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);

    let logout = send(&app.router, logout_request(&second, "POST")).await;
    assert_eq!(logout.status(), StatusCode::OK);
    assert!(set_cookie(&logout).contains("Max-Age=0"));
    assert_eq!(body_json(logout).await, json!({ "message": "Logged out" }));

    let after = send(&app.router, me_request(&second.access)).await;
    assert_eq!(after.status(), StatusCode::UNAUTHORIZED);
    let refresh_after = send(&app.router, refresh_request(&second, UA, IP)).await;
    assert_eq!(refresh_after.status(), StatusCode::UNAUTHORIZED);

    // Two tokens revoked by rotation, two by logout.
    assert_eq!(app.ledger.len(), 4);
    assert!(app.notifier.calls().is_empty());
}

#[tokio::test]
async fn issue_rejects_duplicate_invalid_and_anonymous_requests() {
    let app = support::memory_app();
    let guid = Uuid::new_v4().to_string();
    issue(&app.router, &guid).await;

    let duplicate = send(&app.router, issue_request(&guid, Some(UA))).await;
    assert_eq!(duplicate.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(duplicate).await["error"], "GUID already exists");

    let invalid = send(&app.router, issue_request("not-a-guid", Some(UA))).await;
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

    let no_ua = send(&app.router, issue_request(&Uuid::new_v4().to_string(), None)).await;
    assert_eq!(no_ua.status(), StatusCode::BAD_REQUEST);

    let malformed = send(
        &app.router,
        Request::builder()
            .method("POST")
            .uri("/api/v1/auth/token")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::USER_AGENT, UA)
            .body(Body::from("{not json"))
            .unwrap(),
    )
    .await;
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn user_agent_change_is_rejected_and_session_survives() {
    let app = support::memory_app();
    let first = issue(&app.router, &Uuid::new_v4().to_string()).await;

    let hijack = send(&app.router, refresh_request(&first, "curl/8.5.0", IP)).await;
    assert_eq!(hijack.status(), StatusCode::UNAUTHORIZED);
    assert!(app.ledger.is_empty());

    let me = send(&app.router, me_request(&first.access)).await;
    assert_eq!(me.status(), StatusCode::OK);
    let legit = send(&app.router, refresh_request(&first, UA, IP)).await;
    assert_eq!(legit.status(), StatusCode::OK);
}

#[tokio::test]
async fn ip_change_rotates_and_notifies_once() {
    let app = support::memory_app();
    let first = issue(&app.router, &Uuid::new_v4().to_string()).await;

    let moved = send(&app.router, refresh_request(&first, UA, "203.0.113.99")).await;
    let second = pair_from(moved).await;
    assert_eq!(app.notifier.calls(), vec!["203.0.113.99".to_string()]);

    let stayed = send(&app.router, refresh_request(&second, UA, "203.0.113.99")).await;
    assert_eq!(stayed.status(), StatusCode::OK);
    assert_eq!(app.notifier.calls().len(), 1);
}

#[tokio::test]
async fn refresh_rejects_mixed_pairs() {
    let app = support::memory_app();
    let mine = issue(&app.router, &Uuid::new_v4().to_string()).await;
    let theirs = issue(&app.router, &Uuid::new_v4().to_string()).await;

    let mixed = Pair {
        access: mine.access.clone(),
        refresh_cookie: theirs.refresh_cookie.clone(),
    };
    let response = send(&app.router, refresh_request(&mixed, UA, IP)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(app.ledger.is_empty());
}

#[tokio::test]
async fn refresh_requires_bearer_and_cookie() {
    let app = support::memory_app();
    let pair = issue(&app.router, &Uuid::new_v4().to_string()).await;

    let no_cookie = Request::builder()
        .method("POST")
        .uri("/api/v1/auth/refresh")
        .header(header::AUTHORIZATION, format!("Bearer {}", pair.access))
        .header(header::USER_AGENT, UA)
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app.router, no_cookie).await.status(), StatusCode::UNAUTHORIZED);

    let no_bearer = Request::builder()
        .method("POST")
        .uri("/api/v1/auth/refresh")
        .header(header::COOKIE, &pair.refresh_cookie)
        .header(header::USER_AGENT, UA)
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app.router, no_bearer).await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_rejects_malformed_authorization() {
    let app = support::memory_app();
    let pair = issue(&app.router, &Uuid::new_v4().to_string()).await;

    for value in [
        pair.access.clone(),
        format!("Basic {}", pair.access),
        format!("Bearer {} extra", pair.access),
        "Bearer ".to_string(),
    ] {
        let request = Request::builder()
            .uri("/api/v1/me")
            .header(header::AUTHORIZATION, value)
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app.router, request).await.status(), StatusCode::UNAUTHORIZED);
    }

    let missing = Request::builder().uri("/api/v1/me").body(Body::empty()).unwrap();
    assert_eq!(send(&app.router, missing).await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_accepts_put_and_cannot_be_replayed() {
    let app = support::memory_app();
    let guid: Identity = Uuid::new_v4().into();
    let pair = issue(&app.router, &guid.to_string()).await;

    let first = send(&app.router, logout_request(&pair, "PUT")).await;
    assert_eq!(first.status(), StatusCode::OK);
    assert!(!app.records.is_active(guid).await.unwrap());

    let replay = send(&app.router, logout_request(&pair, "PUT")).await;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn responses_carry_request_id() {
    let app = support::memory_app();
    let request = Request::builder()
        .uri("/api/v1/me")
        .header("x-request-id", "client-req-123")
        .body(Body::empty())
        .unwrap();
    let response = send(&app.router, request).await;
    assert_eq!(response.headers().get("x-request-id").unwrap(), "client-req-123");
}

#[tokio::test]
async fn openapi_document_lists_endpoints() {
    let app = support::memory_app();
    let request = Request::builder()
        .uri("/api/v1/openapi.json")
        .body(Body::empty())
        .unwrap();
    let response = send(&app.router, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    for path in [
        "/api/v1/auth/token",
        "/api/v1/auth/refresh",
        "/api/v1/auth/logout",
        "/api/v1/me",
    ] {
        assert!(json["paths"].get(path).is_some(), "missing {path}");
    }

    let logout = &json["paths"]["/api/v1/auth/logout"];
    for method in ["post", "put"] {
        assert!(
            logout[method]["responses"].get("500").is_some(),
            "logout {method} lacks a 500 response"
        );
    }
}
