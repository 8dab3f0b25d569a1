//! In-process HTTP tests: the router is driven with `tower::ServiceExt::oneshot`,
//! no socket is bound.

mod common;

use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use common::*;
use http_body_util::BodyExt;
use order_service::api;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_router() -> axum::Router {
    let service = service(vec![
        book(1, "The Long Road", "20.00", 5),
        book(2, "Sold Out", "12.00", 0),
    ]);
    api::create_router(Arc::new(service))
}

async fn call(router: &axum::Router, req: Request<Body>) -> (StatusCode, Bytes) {
    let resp = router.clone().oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    (status, body)
}

fn parse_json(b: Bytes) -> Value {
    serde_json::from_slice(&b).expect("body is not valid JSON")
}

fn as_user(method: &str, uri: &str, user_id: i64, body: Option<Value>) -> Request<Body> {
    request_with_role(method, uri, user_id, "customer", body)
}

fn as_admin(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    request_with_role(method, uri, ADMIN, "admin", body)
}

fn request_with_role(
    method: &str,
    uri: &str,
    user_id: i64,
    role: &str,
    body: Option<Value>,
) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(api::USER_ID_HEADER, user_id.to_string())
        .header(api::USER_ROLE_HEADER, role);

    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn order_body(book_id: i64, quantity: i32) -> Value {
    json!({
        "items": [{ "book_id": book_id, "quantity": quantity }],
        "shipping_address": {
            "street": "221B Baker Street",
            "city": "London",
            "state": "Greater London",
            "postal_code": "NW1 6XE",
            "country": "UK"
        },
        "payment_method": "card"
    })
}

async fn place(router: &axum::Router, user_id: i64) -> Value {
    let (status, body) = call(
        router,
        as_user("POST", "/orders", user_id, Some(order_body(1, 2))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    parse_json(body)
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_ok() {
    let router = make_router();
    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let (status, body) = call(&router, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"OK");
}

#[tokio::test]
async fn placing_without_identity_is_unauthorized() {
    let router = make_router();
    let req = Request::builder()
        .method("POST")
        .uri("/orders")
        .header("content-type", "application/json")
        .body(Body::from(order_body(1, 1).to_string()))
        .unwrap();

    let (status, body) = call(&router, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(parse_json(body)["error"], "unauthenticated");
}

#[tokio::test]
async fn placed_order_is_returned_with_totals() {
    let router = make_router();

    let json = place(&router, CUSTOMER).await;
    assert_eq!(json["status"], "pending");
    assert_eq!(json["subtotal"], "40.00");
    assert_eq!(json["shipping"], "9.99");
    assert_eq!(json["tax"], "3.20");
    assert_eq!(json["total"], "53.19");
    assert_eq!(json["items"][0]["quantity"], 2);
    assert!(json["order_number"].as_str().unwrap().starts_with("ORD-"));

    let uri = format!("/orders/{}", json["id"]);
    let (status, body) = call(&router, as_user("GET", &uri, CUSTOMER, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_json(body)["order_number"], json["order_number"]);

    let (status, body) = call(&router, as_user("GET", &uri, OTHER_CUSTOMER, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(parse_json(body)["error"], "not_found");
}

#[tokio::test]
async fn insufficient_stock_names_book_and_availability() {
    let router = make_router();

    let (status, body) = call(
        &router,
        as_user("POST", "/orders", CUSTOMER, Some(order_body(2, 1))),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    let json = parse_json(body);
    assert_eq!(json["error"], "insufficient_stock");
    assert_eq!(json["book_id"], 2);
    assert_eq!(json["available"], 0);
}

#[tokio::test]
async fn invalid_payment_method_is_bad_request() {
    let router = make_router();
    let mut body = order_body(1, 1);
    body["payment_method"] = json!("cheque");

    let (status, body) = call(&router, as_user("POST", "/orders", CUSTOMER, Some(body))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(parse_json(body)["error"], "validation_error");
}

#[tokio::test]
async fn cancel_twice_conflicts() {
    let router = make_router();
    let json = place(&router, CUSTOMER).await;
    let uri = format!("/orders/{}/cancel", json["id"]);

    let (status, _) = call(
        &router,
        as_user("PUT", &uri, CUSTOMER, Some(json!({ "reason": "ordered twice" }))),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = call(&router, as_user("PUT", &uri, CUSTOMER, None)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(parse_json(body)["error"], "invalid_state");
}

#[tokio::test]
async fn status_updates_are_admin_only() {
    let router = make_router();
    let json = place(&router, CUSTOMER).await;
    let uri = format!("/orders/{}/status", json["id"]);

    let (status, _) = call(
        &router,
        as_user("PUT", &uri, CUSTOMER, Some(json!({ "status": "shipped" }))),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(&router, as_admin("PUT", &uri, Some(json!({ "status": "lost" })))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(
        &router,
        as_admin(
            "PUT",
            &uri,
            Some(json!({ "status": "shipped", "tracking_number": "TRK-1" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let order = parse_json(body);
    assert_eq!(order["status"], "shipped");
    assert_eq!(order["tracking_number"], "TRK-1");
}

#[tokio::test]
async fn listing_validates_page_size() {
    let router = make_router();
    place(&router, CUSTOMER).await;

    let (status, body) = call(&router, as_user("GET", "/orders?limit=10", CUSTOMER, None)).await;
    assert_eq!(status, StatusCode::OK);
    let page = parse_json(body);
    assert_eq!(page["total"], 1);
    assert_eq!(page["orders"].as_array().unwrap().len(), 1);

    let (status, _) = call(&router, as_user("GET", "/orders?limit=500", CUSTOMER, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
