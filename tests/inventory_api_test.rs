mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::TestApp;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let app = TestApp::new().await;
    let response = app
        .router()
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn inventory_status_round_trip_over_http() {
    let app = TestApp::new().await;
    let product = app.seed_item(25, 0).await;

    let response = app
        .router()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/inventory/{}", product))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["quantity"], 25);
    assert_eq!(body["data"]["available_quantity"], 25);
}

#[tokio::test]
async fn unknown_product_returns_404_envelope() {
    let app = TestApp::new().await;

    let response = app
        .router()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/inventory/{}", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Not Found");
}

#[tokio::test]
async fn restock_endpoint_adds_stock() {
    let app = TestApp::new().await;
    let product = app.seed_item(5, 0).await;

    let response = app
        .router()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri(format!("/api/v1/inventory/{}/restock", product))
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({ "quantity": 15, "reason": "Delivery" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["quantity"], 20);
}

#[tokio::test]
async fn order_with_insufficient_stock_returns_409_with_available() {
    let app = TestApp::new().await;
    let product = app.seed_item(3, 0).await;

    let response = app
        .router()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/v1/orders")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({
                        "order_number": "SO-HTTP-1",
                        "items": [{ "product_id": product, "quantity": 10 }]
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["available"], 3);
}

#[tokio::test]
async fn order_create_and_fetch_over_http() {
    let app = TestApp::new().await;
    let product = app.seed_item(30, 0).await;

    let response = app
        .router()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/v1/orders")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({
                        "order_number": "SO-HTTP-2",
                        "items": [{ "product_id": product, "quantity": 2 }]
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    let order_id = body["data"]["id"].as_str().expect("order id").to_string();
    assert_eq!(body["data"]["status"], "pending");

    let response = app
        .router()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/orders/{}", order_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["order_number"], "SO-HTTP-2");
}

#[tokio::test]
async fn low_stock_alert_listed_over_http() {
    let app = TestApp::new().await;
    let product = app.seed_item(10, 8).await;

    app.state
        .inventory
        .reserve_stock(product, 5, None, "SO-HTTP-3")
        .await
        .expect("reserve");
    app.state
        .inventory
        .confirm_sale(product, 5, None, "SO-HTTP-3")
        .await
        .expect("confirm");

    let response = app
        .router()
        .oneshot(
            Request::builder()
                .uri("/api/v1/alerts/low-stock")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let alerts = body["data"]["alerts"].as_array().expect("alerts array");
    assert!(alerts
        .iter()
        .any(|a| a["product_id"] == json!(product) && a["status"] == "active"));
}
