//! Integration tests for the reqwest-backed `HttpClient` and the resolver
//! running over real HTTP against a local mock server.

use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use livewatch_common::error::HttpError;
use livewatch_common::types::{IdentitySeed, LiveStatus, Mode, Timeouts};
use livewatch_resolver::{
    Endpoints, HttpClient, HttpClientConfig, LiveResolver, ReqwestHttpClient, ResolverSettings,
    RetryPolicy,
};

fn client() -> ReqwestHttpClient {
    ReqwestHttpClient::new(&HttpClientConfig {
        timeout: Duration::from_secs(5),
        user_agent: "livewatch-test".to_string(),
        proxy_url: None,
    })
    .unwrap()
}

fn settings(server: &MockServer) -> ResolverSettings {
    ResolverSettings {
        endpoints: Endpoints::new(server.uri(), server.uri()),
        timeouts: Timeouts::default(),
        retry: RetryPolicy::none(),
    }
}

#[tokio::test]
async fn test_redirect_is_returned_when_not_following() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/@walled/live"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", format!("{}/login", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string("login page"))
        .mount(&server)
        .await;

    let http = client();
    let url = format!("{}/@walled/live", server.uri());

    let raw = http.get(&url, false).await.unwrap();
    assert_eq!(raw.status, 302);

    let followed = http.get(&url, true).await.unwrap();
    assert_eq!(followed.status, 200);
    assert_eq!(followed.body, "login page");
}

#[tokio::test]
async fn test_user_agent_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ua"))
        .and(wiremock::matchers::header("user-agent", "livewatch-test"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let response = client()
        .get(&format!("{}/ua", server.uri()), true)
        .await
        .unwrap();
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_unreachable_host_is_request_error() {
    // Reserve a free port, then release it so nothing is listening there.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let err = client()
        .get(&format!("http://127.0.0.1:{port}/x"), true)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        HttpError::Request(_) | HttpError::ConnectionAborted(_)
    ));
}

#[tokio::test]
async fn test_resolver_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/@alice/live"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<link href="https://www.tiktok.com/@alice/live"/><meta content="x?room_id=424242"/>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/live/detail/"))
        .and(query_param("aid", "1988"))
        .and(query_param("roomID", "424242"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"LiveRoomInfo":{"status":2,"owner":{"uniqueId":"alice",}}}"#),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/webcast/room/info/"))
        .and(query_param("room_id", "424242"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {"stream_url": {"rtmp_pull_url": "https://pull.example.test/424242.flv"}}
        })))
        .mount(&server)
        .await;

    let resolver = LiveResolver::new(
        Arc::new(client()),
        Mode::Automatic,
        IdentitySeed::from_username("alice"),
        settings(&server),
    )
    .await
    .unwrap();

    assert_eq!(resolver.room_id(), Some("424242"));
    assert_eq!(resolver.check_live_status().await, LiveStatus::Live);
    assert_eq!(
        resolver.live_source_url().await.unwrap().as_deref(),
        Some("https://pull.example.test/424242.flv")
    );
}

#[tokio::test]
async fn test_resolver_rejects_blacklisted_user_in_automatic_mode() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/live/detail/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"LiveRoomInfo":{"owner":{"uniqueId":"walled","x":1}}}"#),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/@walled/live"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/login"))
        .mount(&server)
        .await;

    let err = LiveResolver::new(
        Arc::new(client()),
        Mode::Automatic,
        IdentitySeed::from_room_id("1"),
        settings(&server),
    )
    .await
    .err()
    .unwrap();

    assert!(matches!(
        err,
        livewatch_common::error::ResolveError::AutomaticModeUnsupported
    ));
}
