//! SendGrid notifier against a local mock of the API.

use std::time::Duration;

use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use livewatch_common::error::NotifyError;
use livewatch_notifier::{LivePayload, Notifier, SendGridConfig, SendGridNotifier};

fn notifier(server: &MockServer) -> SendGridNotifier {
    SendGridNotifier::new(SendGridConfig {
        api_key: "SG.test".to_string(),
        base_url: server.uri(),
        from_email: "live@example.com".to_string(),
        template_id: "d-template".to_string(),
        list_id: "list-1".to_string(),
        export_poll_interval: Duration::from_millis(10),
        export_max_polls: 3,
    })
}

async fn mount_export(server: &MockServer, status: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/v3/marketing/contacts/exports"))
        .and(header("authorization", "Bearer SG.test"))
        .and(body_partial_json(
            serde_json::json!({"list_ids": ["list-1"], "file_type": "json"}),
        ))
        .respond_with(ResponseTemplate::new(202).set_body_json(serde_json::json!({"id": "exp-1"})))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/marketing/contacts/exports/exp-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_notify_sends_template_to_exported_contacts() {
    let server = MockServer::start().await;
    let download = format!("{}/downloads/exp-1.json", server.uri());
    mount_export(
        &server,
        serde_json::json!({"status": "ready", "urls": [download]}),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/downloads/exp-1.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "{\"email\":\"a@example.com\"}\n{\"email\":\"b@example.com\"}\n",
        ))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v3/mail/send"))
        .and(header("authorization", "Bearer SG.test"))
        .and(body_partial_json(serde_json::json!({
            "template_id": "d-template",
            "from": {"email": "live@example.com"},
            "personalizations": [
                {"to": [{"email": "a@example.com"}], "dynamic_template_data": {"tiktok": "alice"}},
                {"to": [{"email": "b@example.com"}], "dynamic_template_data": {"tiktok": "alice"}}
            ]
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    notifier(&server)
        .notify(&LivePayload::new("alice"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_empty_contact_list_sends_nothing() {
    let server = MockServer::start().await;
    let download = format!("{}/downloads/empty.json", server.uri());
    mount_export(
        &server,
        serde_json::json!({"status": "ready", "urls": [download]}),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/downloads/empty.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v3/mail/send"))
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&server)
        .await;

    notifier(&server)
        .notify(&LivePayload::new("alice"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_failed_export_is_reported() {
    let server = MockServer::start().await;
    mount_export(
        &server,
        serde_json::json!({"status": "failure", "message": "list not found"}),
    )
    .await;

    let err = notifier(&server)
        .notify(&LivePayload::new("alice"))
        .await
        .unwrap_err();
    assert!(matches!(err, NotifyError::ExportFailed(reason) if reason == "list not found"));
}

#[tokio::test]
async fn test_export_that_never_finishes_times_out() {
    let server = MockServer::start().await;
    mount_export(&server, serde_json::json!({"status": "pending"})).await;

    let err = notifier(&server).export_contacts().await.unwrap_err();
    assert!(matches!(err, NotifyError::ExportTimedOut));
}

#[tokio::test]
async fn test_api_error_status_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/marketing/contacts/exports"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let err = notifier(&server).export_contacts().await.unwrap_err();
    assert!(matches!(err, NotifyError::Api { status: 401, ref body } if body == "bad key"));
}
