//! Category and product endpoint tests.

mod common;

use common::{money, TestApp};
use serde_json::{json, Value};

#[tokio::test]
async fn create_and_fetch_category() {
    let app = TestApp::spawn().await;

    let response = app
        .post(
            "/categories",
            &json!({ "name": "  Hardware ", "description": "Nuts and bolts" }),
        )
        .await;
    assert_eq!(response.status(), 201);
    let created: Value = response.json().await.unwrap();
    assert_eq!(created["name"], "Hardware");

    let id = created["id"].as_i64().unwrap();
    let response = app.get(&format!("/categories/{}", id)).await;
    assert_eq!(response.status(), 200);
    let fetched: Value = response.json().await.unwrap();
    assert_eq!(fetched["description"], "Nuts and bolts");
    assert!(fetched["createdUtc"].is_string());
}

#[tokio::test]
async fn duplicate_category_name_conflicts() {
    let app = TestApp::spawn().await;
    app.create_category("Tools").await;

    let response = app.post("/categories", &json!({ "name": "tools" })).await;

    assert_eq!(response.status(), 409);
}

#[tokio::test]
async fn blank_category_name_is_rejected() {
    let app = TestApp::spawn().await;

    let response = app.post("/categories", &json!({ "name": "" })).await;

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Validation error");
}

#[tokio::test]
async fn update_and_missing_category() {
    let app = TestApp::spawn().await;
    let id = app.create_category("Paint").await;

    let response = app
        .put(&format!("/categories/{}", id), &json!({ "name": "Paints" }))
        .await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["name"], "Paints");

    assert_eq!(app.get("/categories/9999").await.status(), 404);
    assert_eq!(app.delete("/categories/9999").await.status(), 404);
}

#[tokio::test]
async fn product_reports_margin_and_low_stock() {
    let app = TestApp::spawn().await;
    let category_id = app.create_category("Fasteners").await;

    let response = app
        .post(
            "/products",
            &json!({
                "name": "Hex bolt",
                "sku": "HB-10",
                "categoryId": category_id,
                "costPrice": 15.0,
                "sellingPrice": 20.0,
                "stockQuantity": 3,
                "reorderLevel": 5
            }),
        )
        .await;

    assert_eq!(response.status(), 201);
    let product: Value = response.json().await.unwrap();
    assert_eq!(product["categoryId"], category_id);
    assert_eq!(money(&product["profitMargin"]), 25.0);
    assert_eq!(product["lowStock"], true);
}

#[tokio::test]
async fn product_with_unknown_category_is_rejected() {
    let app = TestApp::spawn().await;

    let response = app
        .post(
            "/products",
            &json!({ "name": "Widget", "categoryId": 404, "costPrice": 1.0, "sellingPrice": 2.0 }),
        )
        .await;

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn product_supplier_must_be_a_supplier() {
    let app = TestApp::spawn().await;
    let client_id = app.create_client("Acme").await;
    let supplier_id = app.create_supplier("Bolt Co").await;

    let response = app
        .post(
            "/products",
            &json!({ "name": "Washer", "supplierId": client_id, "costPrice": 1.0, "sellingPrice": 2.0 }),
        )
        .await;
    assert_eq!(response.status(), 400);

    let response = app
        .post(
            "/products",
            &json!({ "name": "Washer", "supplierId": supplier_id, "costPrice": 1.0, "sellingPrice": 2.0 }),
        )
        .await;
    assert_eq!(response.status(), 201);
}

#[tokio::test]
async fn negative_or_fractional_cent_prices_are_rejected() {
    let app = TestApp::spawn().await;

    for price in [-1.0, 1.005] {
        let response = app
            .post(
                "/products",
                &json!({ "name": "Bad", "costPrice": price, "sellingPrice": 2.0 }),
            )
            .await;
        assert_eq!(response.status(), 400, "price {} accepted", price);
    }
}

#[tokio::test]
async fn duplicate_sku_conflicts() {
    let app = TestApp::spawn().await;
    app.create(
        "/products",
        json!({ "name": "A", "sku": "SKU-1", "costPrice": 1.0, "sellingPrice": 2.0 }),
    )
    .await;

    let response = app
        .post(
            "/products",
            &json!({ "name": "B", "sku": "SKU-1", "costPrice": 1.0, "sellingPrice": 2.0 }),
        )
        .await;

    assert_eq!(response.status(), 409);
}

#[tokio::test]
async fn list_products_filters_by_category_and_search() {
    let app = TestApp::spawn().await;
    let tools = app.create_category("Tools").await;
    app.create(
        "/products",
        json!({ "name": "Hammer", "categoryId": tools, "costPrice": 5.0, "sellingPrice": 9.0 }),
    )
    .await;
    app.create_product("Nail", 0.01, 0.02).await;

    let response = app.get(&format!("/products?categoryId={}", tools)).await;
    assert_eq!(response.status(), 200);
    let by_category: Vec<Value> = response.json().await.unwrap();
    assert_eq!(by_category.len(), 1);
    assert_eq!(by_category[0]["name"], "Hammer");

    let by_search: Vec<Value> = app.get("/products?search=nai").await.json().await.unwrap();
    assert_eq!(by_search.len(), 1);
    assert_eq!(by_search[0]["name"], "Nail");
}

#[tokio::test]
async fn update_product_changes_prices() {
    let app = TestApp::spawn().await;
    let id = app.create_product("Drill", 40.0, 60.0).await;

    let response = app
        .put(&format!("/products/{}", id), &json!({ "sellingPrice": 80.0 }))
        .await;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(money(&body["sellingPrice"]), 80.0);
    assert_eq!(money(&body["costPrice"]), 40.0);
}
