mod common;

use axum::http::StatusCode;
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use xapi::models::HttpMethod;

use common::{Factory, TestApp};

#[tokio::test]
async fn test_send_unauthorized() {
    let app = TestApp::new().await;

    let response = app
        .server
        .post("/api/send-request")
        .json(&json!({
            "url": "http://echo.test/x",
            "method": "GET"
        }))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_send_fills_header_placeholder_from_global_pre_request() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth"))
        .respond_with(ResponseTemplate::new(200).insert_header("authorization", "Bearer abc"))
        .expect(1)
        .mount(&upstream)
        .await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .and(body_json(json!({"token": "Bearer abc"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 42})))
        .expect(1)
        .mount(&upstream)
        .await;

    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user();

    let login = factory
        .create_request(1, &format!("{}/auth", upstream.uri()), HttpMethod::Get, "login")
        .await;
    let config_id = factory.create_global_config(1, login).await;
    let orders_url = format!("{}/orders", upstream.uri());
    let target = factory
        .create_request(1, &orders_url, HttpMethod::Post, "create order")
        .await;

    let response = app
        .server
        .post("/api/send-request")
        .add_header("Authorization", auth.auth_header())
        .json(&json!({
            "url": orders_url,
            "method": "POST",
            "body": {"token": format!("$xapi.global.{}.header.authorization", config_id)},
            "request_name": "create order",
            "project_id": 1,
            "request_info_id": target
        }))
        .await;

    response.assert_status(StatusCode::OK);

    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], 201);
    assert_eq!(body["body"], json!({"id": 42}));
    assert_eq!(body["execution_status"], "成功");
    assert_eq!(body["response_time"], body["responseTime"]);
    assert_eq!(body["request_info"]["body"], json!({"token": "Bearer abc"}));
    assert_eq!(body["request_info"]["request_name"], "create order");
    assert_eq!(
        body["pre_request_results"]["global"][config_id.to_string()]["header"]["authorization"],
        "Bearer abc"
    );
    assert_eq!(body["pre_request_results"]["custom"], json!({}));

    let history = app
        .server
        .get(&format!("/api/history/{}", target))
        .add_header("Authorization", auth.auth_header())
        .await;

    history.assert_status(StatusCode::OK);
    let entries: serde_json::Value = history.json();
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["execution_status"], "成功");
    assert_eq!(entries[0]["response_status"], 201);
    assert_eq!(entries[0]["username"], "tester");
    assert_eq!(entries[0]["request_body"], json!({"token": "Bearer abc"}));
    assert_eq!(entries[0]["execution_details"]["statusCode"], 201);
}

#[tokio::test]
async fn test_send_encodes_query_and_skips_empty_values() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/x"))
        .and(query_param("q", "a b"))
        .respond_with(ResponseTemplate::new(200).set_body_string("plain text"))
        .expect(1)
        .mount(&upstream)
        .await;

    let app = TestApp::new().await;
    let auth = Factory::new(&app.state).create_user();

    let response = app
        .server
        .post("/api/send-request")
        .add_header("Authorization", auth.auth_header())
        .json(&json!({
            "url": format!("{}/x", upstream.uri()),
            "method": "GET",
            "query": {"q": "a b", "empty": ""}
        }))
        .await;

    response.assert_status(StatusCode::OK);

    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], 200);
    assert_eq!(body["body"], "plain text");
    assert_eq!(body["pre_request_results"], json!({}));
    assert!(body["execution_message"]
        .as_str()
        .unwrap()
        .starts_with("HTTP 200 - "));

    let received = upstream.received_requests().await.unwrap();
    assert_eq!(received[0].url.query(), Some("q=a%20b"));
}

#[tokio::test]
async fn test_send_connection_error_is_recorded() {
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user();
    let target = factory
        .create_request(1, "http://127.0.0.1:1/down", HttpMethod::Get, "down")
        .await;

    let response = app
        .server
        .post("/api/send-request")
        .add_header("Authorization", auth.auth_header())
        .json(&json!({
            "url": "http://127.0.0.1:1/down",
            "method": "GET",
            "project_id": 1,
            "request_info_id": target
        }))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);

    let body: serde_json::Value = response.json();
    let error = body["error"].as_str().unwrap().to_string();
    assert!(!error.is_empty());
    assert_eq!(body["pre_request_results"], json!({}));

    let history: serde_json::Value = app
        .server
        .get(&format!("/api/history/{}", target))
        .add_header("Authorization", auth.auth_header())
        .await
        .json();
    let entries = history.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["execution_status"], "异常");
    assert_eq!(entries[0]["execution_message"], error.as_str());
    assert_eq!(entries[0]["response_status"], 500);
    assert_eq!(entries[0]["response_body"], json!({"error": error}));
    assert_eq!(entries[0]["execution_details"], json!({"exception": error}));
}

#[tokio::test]
async fn test_send_without_request_id_keeps_no_history() {
    let upstream = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/items/1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&upstream)
        .await;

    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user();
    let url = format!("{}/items/1", upstream.uri());
    let saved = factory
        .create_request(1, &url, HttpMethod::Delete, "remove item")
        .await;

    let response = app
        .server
        .post("/api/send-request")
        .add_header("Authorization", auth.auth_header())
        .json(&json!({"url": url, "method": "DELETE"}))
        .await;

    response.assert_status(StatusCode::OK);
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], 404);
    assert_eq!(body["execution_status"], "失败");
    assert_eq!(body["body"], "");

    let history: serde_json::Value = app
        .server
        .get(&format!("/api/history/{}", saved))
        .add_header("Authorization", auth.auth_header())
        .await
        .json();
    assert_eq!(history, json!([]));
}

#[tokio::test]
async fn test_send_stream_forwards_upstream_body() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/events"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("data: one\n\ndata: two\n\n", "text/event-stream"),
        )
        .mount(&upstream)
        .await;

    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user();
    let url = format!("{}/events", upstream.uri());
    let target = factory
        .create_request(1, &url, HttpMethod::Get, "events")
        .await;

    let response = app
        .server
        .post("/api/send-request")
        .add_header("Authorization", auth.auth_header())
        .json(&json!({
            "url": url,
            "method": "GET",
            "request_info_id": target,
            "stream": true
        }))
        .await;

    response.assert_status(StatusCode::OK);
    assert_eq!(response.text(), "data: one\n\ndata: two\n\n");
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );

    let history: serde_json::Value = app
        .server
        .get(&format!("/api/history/{}", target))
        .add_header("Authorization", auth.auth_header())
        .await
        .json();
    assert_eq!(history[0]["response_body"], "data: one");
    assert_eq!(history[0]["execution_status"], "成功");
}
