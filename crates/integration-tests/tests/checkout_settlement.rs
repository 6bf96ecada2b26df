//! Cart, hosted checkout and webhook-driven settlement.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use axum::http::StatusCode;
use rust_decimal::Decimal;
use serde_json::json;

use cartline_api::db::OrderRepository;
use cartline_api::models::SettlementOutcome;
use cartline_api::payments::{USER_ID_METADATA_KEY, WebhookEvent};
use cartline_api::services::settlement::SettlementService;
use cartline_core::OrderStatus;
use cartline_integration_tests::{TestApp, paid_checkout_event};

#[tokio::test]
async fn test_add_to_cart_rules() {
    let app = TestApp::new();
    let session = app.sign_up("cart@example.com").await;
    let product = app.add_product("Kettle", "59.00", 3);

    let added = app.add_to_cart(&session, product.id, 2).await;
    assert_eq!(added.status, StatusCode::CREATED);
    assert_eq!(added.body["quantity"], 2);

    let duplicate = app.add_to_cart(&session, product.id, 1).await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);

    let other = app.add_product("Beans", "24.50", 1);
    let too_many = app.add_to_cart(&session, other.id, 2).await;
    assert_eq!(too_many.status, StatusCode::BAD_REQUEST);

    let zero = app.add_to_cart(&session, other.id, 0).await;
    assert_eq!(zero.status, StatusCode::BAD_REQUEST);

    let unknown = app
        .add_to_cart(&session, cartline_core::ProductId::generate(), 1)
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);

    let cart = app.get("/cart-items", Some(&session.access_token)).await;
    assert_eq!(cart.body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_cart_item_show_update_remove() {
    let app = TestApp::new();
    let owner = app.sign_up("owner@example.com").await;
    let stranger = app.sign_up("stranger@example.com").await;
    let kettle = app.add_product("Kettle", "59.00", 3);

    let added = app.add_to_cart(&owner, kettle.id, 1).await;
    let id = added.body["cartItemId"].as_str().unwrap().to_owned();
    let path = format!("/cart-items/{id}");

    let shown = app.get(&path, Some(&owner.access_token)).await;
    assert_eq!(shown.status, StatusCode::OK);
    assert_eq!(shown.body["productName"], "Kettle");

    let hidden = app.get(&path, Some(&stranger.access_token)).await;
    assert_eq!(hidden.status, StatusCode::NOT_FOUND);

    let too_many = app
        .patch_json(&path, &json!({ "quantity": 4 }), &owner.access_token)
        .await;
    assert_eq!(too_many.status, StatusCode::BAD_REQUEST);

    let zero = app
        .patch_json(&path, &json!({ "quantity": 0 }), &owner.access_token)
        .await;
    assert_eq!(zero.status, StatusCode::BAD_REQUEST);

    let foreign = app
        .patch_json(&path, &json!({ "quantity": 2 }), &stranger.access_token)
        .await;
    assert_eq!(foreign.status, StatusCode::NOT_FOUND);

    let updated = app
        .patch_json(&path, &json!({ "quantity": 3 }), &owner.access_token)
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["quantity"], 3);

    let bad_id = app
        .get("/cart-items/not-a-uuid", Some(&owner.access_token))
        .await;
    assert_eq!(bad_id.status, StatusCode::BAD_REQUEST);

    assert_eq!(
        app.delete(&path, &stranger.access_token).await.status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        app.delete(&path, &owner.access_token).await.status,
        StatusCode::NO_CONTENT
    );
    assert_eq!(
        app.delete(&path, &owner.access_token).await.status,
        StatusCode::NOT_FOUND
    );

    let cart = app.get("/cart-items", Some(&owner.access_token)).await;
    assert!(cart.body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_cart_change_after_checkout_is_what_settles() {
    let app = TestApp::new();
    let session = app.sign_up("changer@example.com").await;
    let kettle = app.add_product("Kettle", "59.00", 5);

    let added = app.add_to_cart(&session, kettle.id, 1).await;
    let id = added.body["cartItemId"].as_str().unwrap().to_owned();
    let checkout = app
        .post_json("/checkout", &json!({}), Some(&session.access_token))
        .await;
    assert_eq!(checkout.status, StatusCode::OK);

    let updated = app
        .patch_json(
            &format!("/cart-items/{id}"),
            &json!({ "quantity": 2 }),
            &session.access_token,
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK);

    let response = app
        .deliver_webhook(&paid_checkout_event("evt_changed", "cs_changed", session.user_id))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(app.eventually(|store| store.order_count() == 1).await);

    assert_eq!(app.store.product(kettle.id).unwrap().quantity, 3);
}

#[tokio::test]
async fn test_checkout_builds_provider_session() {
    let app = TestApp::new();
    let session = app.sign_up("buyer@example.com").await;
    let kettle = app.add_product("Kettle", "59.00", 3);
    app.add_to_cart(&session, kettle.id, 2).await;

    let response = app
        .post_json("/checkout", &json!({}), Some(&session.access_token))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.body["stripeSessionUrl"],
        "https://checkout.stripe.test/pay/cs_test_1"
    );

    let requests = app.provider.requests();
    let request = requests.first().unwrap();
    let line = request.line_items.first().unwrap();
    assert_eq!(line.unit_amount, 5900);
    assert_eq!(line.quantity, 2);
    assert_eq!(
        request.metadata.get(USER_ID_METADATA_KEY),
        Some(&session.user_id.to_string())
    );
    assert_eq!(request.success_url, "https://shop.test/checkout?success=true");
    assert_eq!(request.cancel_url, "https://shop.test/checkout?canceled=true");

    // Checkout alone changes nothing locally
    assert_eq!(app.store.product(kettle.id).unwrap().quantity, 3);
    assert_eq!(app.store.order_count(), 0);
}

#[tokio::test]
async fn test_checkout_empty_cart() {
    let app = TestApp::new();
    let session = app.sign_up("empty@example.com").await;

    let response = app
        .post_json("/checkout", &json!({}), Some(&session.access_token))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(app.provider.requests().is_empty());
}

#[tokio::test]
async fn test_checkout_return_messages() {
    let app = TestApp::new();

    let success = app.get("/checkout?success=true", None).await;
    assert_eq!(success.status, StatusCode::OK);
    assert_eq!(success.body["message"], "Checkout successful!");

    let canceled = app.get("/checkout?canceled=true", None).await;
    assert_eq!(canceled.body["message"], "Checkout canceled.");

    let neither = app.get("/checkout", None).await;
    assert_eq!(neither.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_rejects_bad_signatures() {
    let app = TestApp::new();
    let session = app.sign_up("forged@example.com").await;
    let body = paid_checkout_event("evt_forged", "cs_forged", session.user_id).to_string();

    let missing = app.deliver_raw_webhook(body.clone(), None).await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);

    let forged = app
        .deliver_raw_webhook(body.clone(), Some("t=1700000000,v1=deadbeef"))
        .await;
    assert_eq!(forged.status, StatusCode::UNAUTHORIZED);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(app.store.order_count(), 0);
}

#[tokio::test]
async fn test_webhook_settles_paid_checkout() {
    let app = TestApp::new();
    let session = app.sign_up("settle@example.com").await;
    let kettle = app.add_product("Kettle", "59.00", 3);
    let beans = app.add_product("Beans", "24.50", 10);
    app.add_to_cart(&session, kettle.id, 2).await;
    app.add_to_cart(&session, beans.id, 1).await;

    let response = app
        .deliver_webhook(&paid_checkout_event("evt_1", "cs_test_1", session.user_id))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!({ "received": true }));

    assert!(app.eventually(|store| store.order_count() == 1).await);

    assert_eq!(app.store.product(kettle.id).unwrap().quantity, 1);
    assert_eq!(app.store.product(beans.id).unwrap().quantity, 9);

    let cart = app.get("/cart-items", Some(&session.access_token)).await;
    assert!(cart.body.as_array().unwrap().is_empty());

    let orders = app.get("/orders", Some(&session.access_token)).await;
    let order = orders.body.as_array().unwrap().first().unwrap().clone();
    assert_eq!(order["status"], "DELIVERING");
    assert_eq!(order["items"].as_array().unwrap().len(), 2);

    let order_id = order["id"].as_str().unwrap();
    let shown = app
        .get(&format!("/orders/{order_id}"), Some(&session.access_token))
        .await;
    assert_eq!(shown.status, StatusCode::OK);
    assert_eq!(shown.body["checkoutSessionId"], "cs_test_1");

    let stranger = app.sign_up("stranger@example.com").await;
    let hidden = app
        .get(&format!("/orders/{order_id}"), Some(&stranger.access_token))
        .await;
    assert_eq!(hidden.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_webhook_ignores_unpaid_and_other_events() {
    let app = TestApp::new();
    let session = app.sign_up("unpaid@example.com").await;
    let kettle = app.add_product("Kettle", "59.00", 3);
    app.add_to_cart(&session, kettle.id, 1).await;

    let mut unpaid = paid_checkout_event("evt_unpaid", "cs_unpaid", session.user_id);
    unpaid["data"]["object"]["payment_status"] = json!("unpaid");
    assert_eq!(app.deliver_webhook(&unpaid).await.status, StatusCode::OK);

    let other = json!({
        "id": "evt_other",
        "type": "customer.created",
        "data": { "object": { "id": "cus_1" } }
    });
    assert_eq!(app.deliver_webhook(&other).await.status, StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(app.store.order_count(), 0);
    assert_eq!(app.store.product(kettle.id).unwrap().quantity, 3);
}

#[tokio::test]
async fn test_redelivered_event_settles_once() {
    let app = TestApp::new();
    let session = app.sign_up("replay@example.com").await;
    let kettle = app.add_product("Kettle", "59.00", 5);
    app.add_to_cart(&session, kettle.id, 2).await;

    let event = paid_checkout_event("evt_replay", "cs_replay", session.user_id);
    app.deliver_webhook(&event).await;
    assert!(app.eventually(|store| store.order_count() == 1).await);

    // Same cart contents again, so a second settlement would succeed
    app.add_to_cart(&session, kettle.id, 2).await;
    app.deliver_webhook(&event).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(app.store.order_count(), 1);
    assert_eq!(app.store.product(kettle.id).unwrap().quantity, 3);
}

#[tokio::test]
async fn test_settlement_service_reports_replay() {
    let app = TestApp::new();
    let session = app.sign_up("service@example.com").await;
    let kettle = app.add_product("Kettle", "10.00", 5);
    app.add_to_cart(&session, kettle.id, 3).await;

    let event: WebhookEvent =
        serde_json::from_value(paid_checkout_event("evt_s", "cs_s", session.user_id)).unwrap();
    let service = SettlementService::new(&app.store);

    let Some(SettlementOutcome::Settled(order)) = service.settle(&event).await.unwrap() else {
        panic!("expected a settled order");
    };
    assert_eq!(order.total.amount, Decimal::new(3000, 2));
    assert_eq!(order.status, OrderStatus::Delivering);

    assert!(matches!(
        service.settle(&event).await.unwrap(),
        Some(SettlementOutcome::AlreadyProcessed)
    ));

    let listed = app
        .store
        .list_for_user(session.user_id, OrderStatus::Delivering)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn test_concurrent_buyers_cannot_oversell() {
    let app = TestApp::new();
    let last_one = app.add_product("Limited Print", "80.00", 1);

    let alice = app.sign_up("alice@example.com").await;
    let bob = app.sign_up("bob@example.com").await;
    app.add_to_cart(&alice, last_one.id, 1).await;
    app.add_to_cart(&bob, last_one.id, 1).await;

    let event_a = paid_checkout_event("evt_a", "cs_a", alice.user_id);
    let event_b = paid_checkout_event("evt_b", "cs_b", bob.user_id);
    let (a, b) = tokio::join!(
        app.deliver_webhook(&event_a),
        app.deliver_webhook(&event_b),
    );
    assert_eq!(a.status, StatusCode::OK);
    assert_eq!(b.status, StatusCode::OK);

    assert!(app.eventually(|store| store.order_count() == 1).await);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(app.store.order_count(), 1);
    assert_eq!(app.store.product(last_one.id).unwrap().quantity, 0);
}
