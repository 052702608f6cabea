//! Quote lifecycle tests.

mod common;

use common::{money, test_config, TestApp};
use serde_json::{json, Value};

#[tokio::test]
async fn new_quote_is_draft_with_computed_total() {
    let app = TestApp::spawn().await;
    let client_id = app.create_client("Acme").await;
    let product_id = app.create_product("Bracket", 20.0, 35.0).await;

    let quote = app.create_client_quote(client_id, product_id, 2, 30.0).await;

    assert_eq!(quote["status"], "DRAFT");
    assert_eq!(quote["clientId"], client_id);
    assert!(quote.get("supplierId").is_none());
    assert_eq!(quote["currency"], "EUR");
    assert_eq!(money(&quote["totalAmount"]), 60.0);
    assert_eq!(money(&quote["items"][0]["totalPrice"]), 60.0);
}

#[tokio::test]
async fn unit_price_defaults_from_product_side() {
    let app = TestApp::spawn().await;
    let client_id = app.create_client("Acme").await;
    let supplier_id = app.create_supplier("Bolt Co").await;
    let product_id = app.create_product("Bracket", 20.0, 35.0).await;

    let response = app
        .post(
            "/quotes/client",
            &json!({ "clientId": client_id, "items": [{ "productId": product_id, "quantity": 3 }] }),
        )
        .await;
    assert_eq!(response.status(), 201);
    let client_quote: Value = response.json().await.unwrap();
    assert_eq!(money(&client_quote["totalAmount"]), 105.0);

    let response = app
        .post(
            "/quotes/supplier",
            &json!({ "supplierId": supplier_id, "items": [{ "productId": product_id, "quantity": 3 }] }),
        )
        .await;
    assert_eq!(response.status(), 201);
    let supplier_quote: Value = response.json().await.unwrap();
    assert_eq!(money(&supplier_quote["totalAmount"]), 60.0);
    assert_eq!(supplier_quote["supplierId"], supplier_id);
}

#[tokio::test]
async fn quote_requires_matching_party_field() {
    let app = TestApp::spawn().await;
    let client_id = app.create_client("Acme").await;
    let product_id = app.create_product("Bracket", 1.0, 2.0).await;
    let items = json!([{ "productId": product_id, "quantity": 1 }]);

    let wrong_field = app
        .post("/quotes/client", &json!({ "supplierId": client_id, "items": items }))
        .await;
    assert_eq!(wrong_field.status(), 400);

    let missing_party = app
        .post("/quotes/client", &json!({ "clientId": 999, "items": items }))
        .await;
    assert_eq!(missing_party.status(), 400);

    let no_items = app
        .post("/quotes/client", &json!({ "clientId": client_id, "items": [] }))
        .await;
    assert_eq!(no_items.status(), 400);

    let unknown_product = app
        .post(
            "/quotes/client",
            &json!({ "clientId": client_id, "items": [{ "productId": 999, "quantity": 1 }] }),
        )
        .await;
    assert_eq!(unknown_product.status(), 400);
}

#[tokio::test]
async fn amounts_beyond_the_column_limit_are_rejected() {
    let app = TestApp::spawn().await;
    let client_id = app.create_client("Acme").await;
    let product_id = app.create_product("Bracket", 1.0, 2.0).await;

    for (quantity, unit_price) in [
        (2, json!(5e28)),
        (1, json!(1e13)),
        (2, json!("999999999999.99")),
    ] {
        let response = app
            .post(
                "/quotes/client",
                &json!({
                    "clientId": client_id,
                    "items": [{ "productId": product_id, "quantity": quantity, "unitPrice": unit_price }]
                }),
            )
            .await;
        assert_eq!(response.status(), 400, "unitPrice {} accepted", unit_price);
    }

    let quotes: Vec<Value> = app.get("/quotes/client").await.json().await.unwrap();
    assert!(quotes.is_empty());

    let response = app
        .post(
            "/quotes/client",
            &json!({
                "clientId": client_id,
                "items": [{ "productId": product_id, "quantity": 1, "unitPrice": "999999999999.99" }]
            }),
        )
        .await;
    assert_eq!(response.status(), 201);
    let quote: Value = response.json().await.unwrap();
    assert_eq!(quote["totalAmount"], "999999999999.99");
}

#[tokio::test]
async fn amounts_are_two_place_decimal_strings() {
    let app = TestApp::spawn().await;
    let client_id = app.create_client("Acme").await;
    let product_id = app.create_product("Bracket", 20.0, 35.0).await;

    let quote = app.create_client_quote(client_id, product_id, 2, 30.0).await;

    assert_eq!(quote["totalAmount"], "60.00");
    assert_eq!(quote["items"][0]["unitPrice"], "30.00");
}

#[tokio::test]
async fn unknown_party_segment_is_rejected() {
    let app = TestApp::spawn().await;

    let response = app.get("/quotes/vendors").await;

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn quote_walks_the_workflow() {
    let app = TestApp::spawn().await;
    let client_id = app.create_client("Acme").await;
    let product_id = app.create_product("Bracket", 20.0, 35.0).await;
    let quote = app.create_client_quote(client_id, product_id, 2, 30.0).await;
    let id = quote["id"].as_i64().unwrap();

    for status in ["PENDING", "CONFIRMED", "APPROVED"] {
        let response = app.set_quote_status("client", id, status).await;
        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["status"], status);
    }
}

#[tokio::test]
async fn skipping_a_step_is_rejected() {
    let app = TestApp::spawn().await;
    let client_id = app.create_client("Acme").await;
    let product_id = app.create_product("Bracket", 1.0, 2.0).await;
    let quote = app.create_client_quote(client_id, product_id, 1, 2.0).await;
    let id = quote["id"].as_i64().unwrap();

    let response = app.set_quote_status("client", id, "APPROVED").await;
    assert_eq!(response.status(), 400);

    let response = app.set_quote_status("client", id, "CONVERTED").await;
    assert_eq!(response.status(), 400);

    let current: Value = app.get(&format!("/quotes/client/{}", id)).await.json().await.unwrap();
    assert_eq!(current["status"], "DRAFT");
}

#[tokio::test]
async fn rejected_quote_is_terminal() {
    let app = TestApp::spawn().await;
    let client_id = app.create_client("Acme").await;
    let product_id = app.create_product("Bracket", 1.0, 2.0).await;
    let quote = app.create_client_quote(client_id, product_id, 1, 2.0).await;
    let id = quote["id"].as_i64().unwrap();

    assert_eq!(app.set_quote_status("client", id, "PENDING").await.status(), 200);
    assert_eq!(app.set_quote_status("client", id, "REJECTED").await.status(), 200);
    assert_eq!(app.set_quote_status("client", id, "PENDING").await.status(), 400);
}

#[tokio::test]
async fn same_status_is_a_no_op() {
    let app = TestApp::spawn().await;
    let client_id = app.create_client("Acme").await;
    let product_id = app.create_product("Bracket", 1.0, 2.0).await;
    let quote = app.create_client_quote(client_id, product_id, 1, 2.0).await;
    let id = quote["id"].as_i64().unwrap();

    let response = app.set_quote_status("client", id, "DRAFT").await;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "DRAFT");
}

#[tokio::test]
async fn relaxed_transitions_allow_any_move_except_converted() {
    let mut config = test_config();
    config.quotes.enforce_transitions = false;
    let app = TestApp::spawn_with(config).await;
    let client_id = app.create_client("Acme").await;
    let product_id = app.create_product("Bracket", 1.0, 2.0).await;
    let quote = app.create_client_quote(client_id, product_id, 1, 2.0).await;
    let id = quote["id"].as_i64().unwrap();

    assert_eq!(app.set_quote_status("client", id, "APPROVED").await.status(), 200);
    assert_eq!(app.set_quote_status("client", id, "CONVERTED").await.status(), 400);
}

#[tokio::test]
async fn only_draft_quotes_can_be_edited() {
    let app = TestApp::spawn().await;
    let client_id = app.create_client("Acme").await;
    let product_id = app.create_product("Bracket", 1.0, 2.0).await;
    let quote = app.create_client_quote(client_id, product_id, 1, 2.0).await;
    let id = quote["id"].as_i64().unwrap();

    let edit = json!({
        "notes": "Bulk order",
        "items": [{ "productId": product_id, "quantity": 10, "unitPrice": 1.5 }]
    });
    let response = app.put(&format!("/quotes/client/{}", id), &edit).await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(money(&body["totalAmount"]), 15.0);
    assert_eq!(body["notes"], "Bulk order");

    app.set_quote_status("client", id, "PENDING").await;
    let response = app.put(&format!("/quotes/client/{}", id), &edit).await;
    assert_eq!(response.status(), 409);
}

#[tokio::test]
async fn quotes_are_scoped_to_their_side() {
    let app = TestApp::spawn().await;
    let client_id = app.create_client("Acme").await;
    let product_id = app.create_product("Bracket", 1.0, 2.0).await;
    let quote = app.create_client_quote(client_id, product_id, 1, 2.0).await;
    let id = quote["id"].as_i64().unwrap();

    assert_eq!(app.get(&format!("/quotes/supplier/{}", id)).await.status(), 404);

    let supplier_quotes: Vec<Value> = app.get("/quotes/supplier").await.json().await.unwrap();
    assert!(supplier_quotes.is_empty());
}

#[tokio::test]
async fn list_quotes_filters_by_status() {
    let app = TestApp::spawn().await;
    let client_id = app.create_client("Acme").await;
    let product_id = app.create_product("Bracket", 1.0, 2.0).await;
    let first = app.create_client_quote(client_id, product_id, 1, 2.0).await;
    app.create_client_quote(client_id, product_id, 2, 2.0).await;
    let first_id = first["id"].as_i64().unwrap();
    app.set_quote_status("client", first_id, "PENDING").await;

    let pending: Vec<Value> = app
        .get("/quotes/client?status=PENDING")
        .await
        .json()
        .await
        .unwrap();

    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0]["id"], first_id);
    assert!(pending[0].get("items").is_none());
}

#[tokio::test]
async fn missing_quote_returns_404() {
    let app = TestApp::spawn().await;

    assert_eq!(app.get("/quotes/client/4242").await.status(), 404);
    assert_eq!(app.set_quote_status("client", 4242, "PENDING").await.status(), 404);
}
