//! Request dispatch through the full middleware stack, in process.

use axum::body::Body;
use axum::http::header::{ACCEPT, ALLOW, CONTENT_TYPE, ETAG, HOST, LOCATION};
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use restconf_server::config::RestconfConfig;
use restconf_server::negotiation::media_type::ACCEPT_PATCH;

mod common;

async fn send(request: Request<Body>) -> Response {
    let (router, _) = common::router(&RestconfConfig::default());
    router.oneshot(request).await.unwrap()
}

fn request(method: Method, uri: &str) -> axum::http::request::Builder {
    Request::builder().method(method).uri(uri).header(HOST, "device.example")
}

async fn json_body(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn text_body(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_get_list_entry_with_encoded_key() {
    let response = send(
        request(
            Method::GET,
            "/restconf/data/example-jukebox:jukebox/library/artist=Foo%20Fighters",
        )
        .body(Body::empty())
        .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "application/yang-data+json");
    assert!(response.headers().contains_key(ETAG));
    let body = json_body(response).await;
    assert_eq!(body["example-jukebox:artist"]["name"], "Foo Fighters");
    assert_eq!(body["example-jukebox:artist"]["album=Wasting%20Light"]["year"], 2011);
}

#[tokio::test]
async fn test_get_as_xml() {
    let response = send(
        request(Method::GET, "/restconf/data/example-jukebox:jukebox")
            .header(ACCEPT, "application/yang-data+xml")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "application/yang-data+xml");
    let body = text_body(response).await;
    assert!(body.contains("<jukebox"));
}

#[tokio::test]
async fn test_unacceptable_output_is_406() {
    let response = send(
        request(Method::GET, "/restconf/data")
            .header(ACCEPT, "text/html")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
    assert_eq!(
        response.headers()[ACCEPT],
        "application/yang-data+json, application/yang-data+xml"
    );
    let body = json_body(response).await;
    assert_eq!(body["ietf-restconf:errors"]["error"][0]["error-tag"], "invalid-value");
}

#[tokio::test]
async fn test_unsupported_input_is_415() {
    let response = send(
        request(Method::PUT, "/restconf/data/example-jukebox:jukebox")
            .header(CONTENT_TYPE, "text/plain")
            .body(Body::from("hello"))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert!(response.headers().contains_key(ACCEPT));
}

#[tokio::test]
async fn test_malformed_path_is_400() {
    let response = send(
        request(Method::GET, "/restconf/data/example-jukebox:jukebox/artist=%zz")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_datastore_delete_is_405() {
    let response = send(
        request(Method::DELETE, "/restconf/data")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()[ALLOW], "GET, HEAD, OPTIONS, PATCH, POST, PUT");
}

#[tokio::test]
async fn test_post_creates_with_location() {
    let response = send(
        request(Method::POST, "/restconf/data")
            .header(CONTENT_TYPE, "application/yang-data+json")
            .body(Body::from(json!({ "example-ops:settings": { "mode": "fast" } }).to_string()))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        response.headers()[LOCATION],
        "http://device.example/restconf/data/example-ops:settings"
    );
}

#[tokio::test]
async fn test_put_then_get() {
    let (router, _) = common::router(&RestconfConfig::default());
    let put = router
        .clone()
        .oneshot(
            request(Method::PUT, "/restconf/data/example-ops:settings")
                .header(CONTENT_TYPE, "application/yang-data+json")
                .body(Body::from(r#"{"example-ops:settings":{"mode":"slow"}}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(put.status(), StatusCode::CREATED);

    let get = router
        .oneshot(
            request(Method::GET, "/restconf/data/example-ops:settings/mode")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(get.status(), StatusCode::OK);
    assert_eq!(json_body(get).await["example-ops:mode"], "slow");
}

#[tokio::test]
async fn test_yang_patch_failure_reports_status() {
    let patch = json!({
        "ietf-yang-patch:yang-patch": {
            "patch-id": "p1",
            "edit": [
                { "edit-id": "e1", "operation": "delete", "target": "/example-jukebox:absent" }
            ]
        }
    });
    let response = send(
        request(Method::PATCH, "/restconf/data")
            .header(CONTENT_TYPE, "application/yang-patch+json")
            .body(Body::from(patch.to_string()))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = json_body(response).await;
    assert_eq!(body["ietf-yang-patch:yang-patch-status"]["patch-id"], "p1");
}

#[tokio::test]
async fn test_patch_with_unknown_type_lists_accept_patch() {
    let response = send(
        request(Method::PATCH, "/restconf/data/example-jukebox:jukebox")
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(Body::from("x"))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert!(response.headers()[ACCEPT_PATCH]
        .to_str()
        .unwrap()
        .contains("application/yang-patch+json"));
}

#[tokio::test]
async fn test_operations_post_echo() {
    let response = send(
        request(Method::POST, "/restconf/operations/restconf-server:echo")
            .header(CONTENT_TYPE, "application/yang-data+json")
            .body(Body::from(r#"{"restconf-server:input":{"message":"hi"}}"#))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["restconf-server:output"]["message"], "hi");
}

#[tokio::test]
async fn test_head_has_no_body() {
    let response = send(
        request(Method::HEAD, "/restconf/data/example-jukebox:jukebox")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(text_body(response).await.is_empty());
}

#[tokio::test]
async fn test_module_source() {
    let response = send(
        request(Method::GET, "/restconf/modules/example-jukebox?revision=2016-08-15")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "application/yang");
    assert!(text_body(response).await.starts_with("module example-jukebox"));
}

#[tokio::test]
async fn test_discovery() {
    let response = send(
        request(Method::GET, "/.well-known/host-meta.json")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["links"][0]["rel"], "restconf");
}

#[tokio::test]
async fn test_custom_base_path() {
    let mut config = RestconfConfig::default();
    config.endpoint.base_path = "/rests/api".into();
    let (router, _) = common::router(&config);

    let hit = router
        .clone()
        .oneshot(request(Method::GET, "/rests/api/data").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(hit.status(), StatusCode::OK);

    let miss = router
        .oneshot(request(Method::GET, "/rests/data").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(miss.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let mut config = RestconfConfig::default();
    config.security.max_body_size = 16;
    let (router, _) = common::router(&config);
    let response = router
        .oneshot(
            request(Method::PUT, "/restconf/data/example-ops:settings")
                .header(CONTENT_TYPE, "application/yang-data+json")
                .header("content-length", "64")
                .body(Body::from("x".repeat(64)))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_event_stream_requires_accept() {
    let response = send(
        request(Method::GET, "/restconf/streams/json/NETCONF")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
}

#[tokio::test]
async fn test_malformed_subscription_id_is_404() {
    let response = send(
        request(Method::GET, "/restconf/subscriptions/not-a-number")
            .header(ACCEPT, "text/event-stream")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
