//! Gateway tests against a local mock server.
//!
//! The gateway is a blocking client, so every call runs on a blocking
//! thread while wiremock serves from the test runtime.

use reqwest::Method;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use manai::error::ApiError;
use manai::gateway::{Backend, CallOpts, HttpGateway};

async fn call(
    uri: String,
    key: Option<&str>,
    endpoint: &'static str,
    http_method: Method,
    body: Option<Value>,
    opts: CallOpts,
) -> Result<Value, ApiError> {
    let key = key.map(str::to_owned);
    tokio::task::spawn_blocking(move || {
        let gateway = HttpGateway::new(uri, key).expect("gateway builds");
        gateway.call(endpoint, http_method, body, opts)
    })
    .await
    .expect("blocking task completes")
}

#[tokio::test]
async fn json_bodies_pass_through_unchanged() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/CheckUsageLimit"))
        .and(body_json(json!({ "Language": "en" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "success": true, "dailyLimit": 5 })),
        )
        .mount(&server)
        .await;

    let value = call(
        server.uri(),
        None,
        "CheckUsageLimit",
        Method::POST,
        Some(json!({ "Language": "en" })),
        CallOpts::public(),
    )
    .await
    .unwrap();

    assert_eq!(value, json!({ "success": true, "dailyLimit": 5 }));
}

#[tokio::test]
async fn plain_text_bodies_are_wrapped_as_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ManaiAgentHttpTrigger"))
        .respond_with(ResponseTemplate::new(200).set_body_string("service is up"))
        .mount(&server)
        .await;

    let value = call(
        server.uri(),
        None,
        "ManaiAgentHttpTrigger",
        Method::GET,
        None,
        CallOpts::public(),
    )
    .await
    .unwrap();

    assert_eq!(value["success"], true);
    assert_eq!(value["message"], "service is up");
}

#[tokio::test]
async fn statuses_map_onto_the_taxonomy() {
    let cases: &[(u16, fn(&ApiError) -> bool)] = &[
        (401, |e| matches!(e, ApiError::Unauthenticated)),
        (403, |e| matches!(e, ApiError::Forbidden)),
        (404, |e| matches!(e, ApiError::NotFound(ep) if ep == "GetUserProfile")),
        (429, |e| matches!(e, ApiError::QuotaExceeded)),
        (500, |e| matches!(e, ApiError::Server(500))),
        (418, |e| matches!(e, ApiError::UnexpectedStatus(418, _))),
    ];

    for (status, check) in cases {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/GetUserProfile"))
            .respond_with(ResponseTemplate::new(*status))
            .mount(&server)
            .await;

        let err = call(
            server.uri(),
            None,
            "GetUserProfile",
            Method::GET,
            None,
            CallOpts::public(),
        )
        .await
        .unwrap_err();

        assert!(check(&err), "status {status} classified as {err:?}");
    }
}

#[tokio::test]
async fn authenticated_calls_carry_all_four_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ValidateToken"))
        .and(header("content-type", "application/json"))
        .and(header("x-functions-key", "key-1"))
        .and(header("authorization", "Bearer T1"))
        .and(header_exists("user-agent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "valid": true })))
        .expect(1)
        .mount(&server)
        .await;

    call(
        server.uri(),
        Some("key-1"),
        "ValidateToken",
        Method::POST,
        None,
        CallOpts::authed("T1"),
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn no_access_key_means_no_key_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/LoginUser"))
        .and(header_exists("x-functions-key"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/LoginUser"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    call(
        server.uri(),
        None,
        "LoginUser",
        Method::POST,
        Some(json!({ "Email": "a@b.com", "Password": "pw" })),
        CallOpts::public(),
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn unreachable_host_is_a_connection_error() {
    let err = call(
        "http://127.0.0.1:1".to_string(),
        None,
        "LoginUser",
        Method::POST,
        None,
        CallOpts::public(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ApiError::Connection(_)), "got {err:?}");
}
