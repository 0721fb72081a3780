//! Order placement.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use serde_json::json;

use secure_commerce_api::db::OrderRepository;
use secure_commerce_core::{OrderId, PostalCode};
use secure_commerce_integration_tests::{TestApp, checkout};

async fn row_counts(app: &TestApp) -> (u64, u64) {
    (
        app.store.count_orders().await.unwrap(),
        app.store.count_order_items().await.unwrap(),
    )
}

#[tokio::test]
async fn test_total_is_sum_of_lines() {
    let app = TestApp::new();
    let seller = app.seller("seller@example.com").await;
    let buyer = app.customer("buyer@example.com").await;
    let widget = app.listing(&seller, "Widget", 100).await;
    let gadget = app.listing(&seller, "Gadget", 7).await;

    let response = app
        .post(
            "/place_order",
            Some(&buyer),
            checkout(json!([
                { "id": widget, "quantity": 2 },
                { "id": gadget.to_string(), "quantity": "3" },
            ])),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
    assert_eq!(response.detail(), "Order placed successfully.");
    assert_eq!(response.body["total"], "$221");
    assert_eq!(row_counts(&app).await, (1, 2));

    let id = i32::try_from(response.body["order_id"].as_i64().unwrap()).unwrap();
    let (order, lines) = app.store.find_with_items(OrderId::from(id)).await.unwrap().unwrap();
    assert_eq!(order.total.to_string(), "$221");
    assert_eq!(order.postal_code, PostalCode::parse("K1A 0B1").unwrap());
    assert_eq!(order.contact_number.as_str(), "+16139954422");
    let quantities: Vec<u32> = lines.iter().map(|line| line.quantity).collect();
    assert_eq!(quantities, [2, 3]);
}

#[tokio::test]
async fn test_missing_listing_writes_nothing() {
    let app = TestApp::new();
    let seller = app.seller("seller@example.com").await;
    let buyer = app.customer("buyer@example.com").await;
    let widget = app.listing(&seller, "Widget", 100).await;

    let response = app
        .post(
            "/place_order",
            Some(&buyer),
            checkout(json!([
                { "id": widget, "quantity": 1 },
                { "id": widget + 1000, "quantity": 1 },
            ])),
        )
        .await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.detail(), "Item not found.");
    assert_eq!(row_counts(&app).await, (0, 0));
}

#[tokio::test]
async fn test_bad_quantity_rejects_whole_order() {
    let app = TestApp::new();
    let seller = app.seller("seller@example.com").await;
    let buyer = app.customer("buyer@example.com").await;
    let widget = app.listing(&seller, "Widget", 100).await;

    for quantity in [
        json!(0),
        json!(-1),
        json!("many"),
        json!(1.5),
        json!(2_147_483_648_i64),
    ] {
        let response = app
            .post(
                "/place_order",
                Some(&buyer),
                checkout(json!([
                    { "id": widget, "quantity": 1 },
                    { "id": widget, "quantity": quantity },
                ])),
            )
            .await;
        assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY, "{quantity}");
    }
    assert_eq!(row_counts(&app).await, (0, 0));
}

#[tokio::test]
async fn test_storage_failure_rolls_back() {
    let app = TestApp::new();
    let seller = app.seller("seller@example.com").await;
    let buyer = app.customer("buyer@example.com").await;
    let widget = app.listing(&seller, "Widget", 100).await;
    app.store.set_fail_order_writes(true);

    let response = app
        .post(
            "/place_order",
            Some(&buyer),
            checkout(json!([{ "id": widget, "quantity": 1 }])),
        )
        .await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.detail(), "Failed to place order.");
    assert_eq!(row_counts(&app).await, (0, 0));
}

#[tokio::test]
async fn test_field_checks_in_order() {
    let app = TestApp::new();
    let seller = app.seller("seller@example.com").await;
    let buyer = app.customer("buyer@example.com").await;
    let widget = app.listing(&seller, "Widget", 100).await;
    let items = json!([{ "id": widget, "quantity": 1 }]);

    let with = |field: &str, value: serde_json::Value| {
        let mut body = checkout(items.clone());
        body[field] = value;
        body
    };

    let cases = [
        (with("address", json!(null)), StatusCode::BAD_REQUEST, "Missing 'address' field."),
        (
            with("address", json!("x".repeat(401))),
            StatusCode::UNPROCESSABLE_ENTITY,
            "Address must be upto 400 characters with no invalid characters.",
        ),
        (with("zip", json!(" ")), StatusCode::BAD_REQUEST, "Missing 'zip code' field."),
        (with("zip", json!("12345")), StatusCode::UNPROCESSABLE_ENTITY, "Invalid zip code."),
        (with("phone", json!("")), StatusCode::BAD_REQUEST, "Missing 'phone number' field."),
        (with("phone", json!("2125551234")), StatusCode::UNPROCESSABLE_ENTITY, "Invalid phone number."),
        (
            with("csc", json!(null)),
            StatusCode::BAD_REQUEST,
            "Missing required fields: card, exp, or csc.",
        ),
        (with("exp", json!("01/20")), StatusCode::UNPROCESSABLE_ENTITY, "Invalid card."),
        (with("items", json!([])), StatusCode::BAD_REQUEST, "Missing 'items' field."),
    ];
    for (body, status, message) in cases {
        let response = app.post("/place_order", Some(&buyer), body).await;
        assert_eq!(response.status, status, "{message}");
        assert_eq!(response.detail(), message);
    }
    assert_eq!(row_counts(&app).await, (0, 0));
}

#[tokio::test]
async fn test_only_customers_order() {
    let app = TestApp::new();
    let seller = app.seller("seller@example.com").await;
    let widget = app.listing(&seller, "Widget", 100).await;

    let response = app
        .post(
            "/place_order",
            Some(&seller),
            checkout(json!([{ "id": widget, "quantity": 1 }])),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}
