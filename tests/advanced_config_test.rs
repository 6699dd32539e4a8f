mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{Factory, TestApp};

#[tokio::test]
async fn test_create_advanced_config() {
    let app = TestApp::new().await;
    let auth = Factory::new(&app.state).create_user();

    let response = app
        .server
        .post("/api/advanced-config")
        .add_header("Authorization", auth.auth_header())
        .json(&json!({
            "project_id": 1,
            "request_info_id": 5,
            "is_global": 1,
            "body_info": {"user": "u"},
            "query_info": {"tenant": "a"},
            "host": "http://auth.test",
            "request_name": "login"
        }))
        .await;

    response.assert_status(StatusCode::OK);
    let body: serde_json::Value = response.json();
    assert!(body["id"].as_i64().is_some());
    assert_eq!(body["is_global"], true);
    assert_eq!(body["private_request_id"], json!(null));
    assert_eq!(body["body_info"], r#"{"user":"u"}"#);
    assert_eq!(body["query_info"], r#"{"tenant":"a"}"#);
    assert_eq!(body["host"], "http://auth.test");
}

#[tokio::test]
async fn test_create_advanced_config_validation() {
    let app = TestApp::new().await;
    let auth = Factory::new(&app.state).create_user();

    app.server
        .post("/api/advanced-config")
        .add_header("Authorization", auth.auth_header())
        .json(&json!({"project_id": 1, "request_info_id": 5, "is_global": false}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    app.server
        .post("/api/advanced-config")
        .add_header("Authorization", auth.auth_header())
        .json(&json!({"project_id": -1, "is_global": true}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_advanced_config_unauthorized() {
    let app = TestApp::new().await;

    app.server
        .post("/api/advanced-config")
        .json(&json!({"project_id": 1, "is_global": true}))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_list_advanced_configs_paginates_and_filters() {
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user();

    let mut global_ids = Vec::new();
    for _ in 0..3 {
        global_ids.push(factory.create_global_config(1, 10).await);
    }
    let custom = factory.create_custom_config(1, 10, 7).await;
    factory.create_custom_config(1, 10, 8).await;
    factory.create_global_config(2, 10).await;

    let response = app
        .server
        .get("/api/advanced-config/list")
        .add_header("Authorization", auth.auth_header())
        .add_query_param("project_id", 1)
        .add_query_param("is_global", true)
        .add_query_param("page", 2)
        .add_query_param("limit", 2)
        .await;

    response.assert_status(StatusCode::OK);
    let body: serde_json::Value = response.json();
    assert_eq!(body["total"], 3);
    assert_eq!(body["page"], 2);
    assert_eq!(body["limit"], 2);
    assert_eq!(body["total_pages"], 2);
    // newest first, so the oldest config is alone on page two
    assert_eq!(body["configs"].as_array().unwrap().len(), 1);
    assert_eq!(body["configs"][0]["id"], global_ids[0]);

    let matching: serde_json::Value = app
        .server
        .get("/api/advanced-config/list")
        .add_header("Authorization", auth.auth_header())
        .add_query_param("project_id", 1)
        .add_query_param("is_global", false)
        .add_query_param("private_request_id", 7)
        .await
        .json();
    assert_eq!(matching["total"], 1);
    assert_eq!(matching["configs"][0]["id"], custom);
    assert_eq!(matching["configs"][0]["private_request_id"], 7);

    let everything: serde_json::Value = app
        .server
        .get("/api/advanced-config/list")
        .add_header("Authorization", auth.auth_header())
        .add_query_param("project_id", 1)
        .await
        .json();
    assert_eq!(everything["total"], 5);
    assert_eq!(everything["page"], 1);
    assert_eq!(everything["limit"], 10);
    assert_eq!(everything["total_pages"], 1);
}

#[tokio::test]
async fn test_list_advanced_configs_requires_project() {
    let app = TestApp::new().await;
    let auth = Factory::new(&app.state).create_user();

    app.server
        .get("/api/advanced-config/list")
        .add_header("Authorization", auth.auth_header())
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_update_and_delete_advanced_config() {
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user();
    let id = factory.create_global_config(1, 10).await;
    let path = format!("/api/advanced-config/{}", id);

    let fetched: serde_json::Value = app
        .server
        .get(&path)
        .add_header("Authorization", auth.auth_header())
        .await
        .json();
    assert_eq!(fetched["id"], id);
    assert_eq!(fetched["is_global"], true);

    let response = app
        .server
        .put(&path)
        .add_header("Authorization", auth.auth_header())
        .json(&json!({
            "project_id": 1,
            "request_info_id": 11,
            "is_global": false,
            "private_request_id": 7,
            "body_info": "raw body"
        }))
        .await;
    response.assert_status(StatusCode::OK);
    let updated: serde_json::Value = response.json();
    assert_eq!(updated["id"], id);
    assert_eq!(updated["is_global"], false);
    assert_eq!(updated["private_request_id"], 7);
    assert_eq!(updated["request_info_id"], 11);
    assert_eq!(updated["body_info"], "raw body");
    assert_eq!(updated["created_at"], fetched["created_at"]);

    let deleted = app
        .server
        .delete(&path)
        .add_header("Authorization", auth.auth_header())
        .await;
    deleted.assert_status(StatusCode::OK);
    let body: serde_json::Value = deleted.json();
    assert_eq!(body["success"], true);

    app.server
        .get(&path)
        .add_header("Authorization", auth.auth_header())
        .await
        .assert_status(StatusCode::NOT_FOUND);

    app.server
        .put(&path)
        .add_header("Authorization", auth.auth_header())
        .json(&json!({"project_id": 1, "is_global": true}))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
