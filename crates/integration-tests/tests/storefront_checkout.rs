//! Integration tests for the storefront cart, checkout and M-Pesa payment.
//!
//! Run with: cargo test -p duka-integration-tests --test storefront_checkout

use std::time::Duration;

use duka_integration_tests::mock_api::{ADMIN_ID, CUSTOMER_EMAIL, PASSWORD, RECEIPT};
use duka_integration_tests::{
    MockApi, TestServer, location, spawn_storefront, spawn_storefront_with,
};
use reqwest::StatusCode;

async fn logged_in_storefront() -> (MockApi, TestServer) {
    let api = MockApi::start().await;
    let server = spawn_storefront(&api).await;
    log_in(&server).await;
    (api, server)
}

async fn log_in(server: &TestServer) {

    let resp = server
        .post_form(
            "/auth/login",
            &[("email", CUSTOMER_EMAIL), ("password", PASSWORD)],
        )
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), Some("/"));
}

async fn add_to_cart(server: &TestServer, product_id: &str) {
    let resp = server
        .hx_post_form("/cart/add", &[("product_id", product_id)])
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
}

async fn cart_count(server: &TestServer) -> String {
    let body = server.get("/cart/count").await.text().await.expect("Failed to read body");
    body.split('>')
        .nth(1)
        .and_then(|rest| rest.split('<').next())
        .unwrap_or_default()
        .trim()
        .to_string()
}

// ============================================================================
// Cart
// ============================================================================

#[tokio::test]
async fn test_add_to_cart_triggers_count_refresh() {
    let api = MockApi::start().await;
    let server = spawn_storefront(&api).await;

    let resp = server.hx_post_form("/cart/add", &[("product_id", "1")]).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("HX-Trigger").and_then(|v| v.to_str().ok()),
        Some("cart-updated")
    );

    add_to_cart(&server, "1").await;
    assert_eq!(cart_count(&server).await, "2");

    let page = server.get("/cart").await.text().await.expect("Failed to read body");
    assert!(page.contains("Maasai Shuka"));
}

#[tokio::test]
async fn test_cart_never_exceeds_stock() {
    let api = MockApi::start().await;
    let server = spawn_storefront(&api).await;

    let resp = server.hx_post_form("/cart/add", &[("product_id", "3")]).await;
    let body = resp.text().await.expect("Failed to read body");
    assert!(body.contains("Only 0 of Solar Lantern in stock"));
    assert_eq!(cart_count(&server).await, "0");
}

#[tokio::test]
async fn test_increase_checks_current_stock() {
    let api = MockApi::start().await;
    let server = spawn_storefront(&api).await;
    add_to_cart(&server, "1").await;
    add_to_cart(&server, "1").await;

    // Sold elsewhere since the shuka went into the cart
    api.state().await.products[0].stock_quantity = 2;

    let resp = server
        .hx_post_form("/cart/increase", &[("product_id", "1")])
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.expect("Failed to read body");
    assert!(body.contains("Only 2 of Maasai Shuka in stock"));
    assert_eq!(cart_count(&server).await, "2");
}

// ============================================================================
// Checkout
// ============================================================================

#[tokio::test]
async fn test_checkout_requires_login() {
    let api = MockApi::start().await;
    let server = spawn_storefront(&api).await;

    let resp = server.get("/checkout").await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), Some("/auth/login?next=%2Fcheckout"));
}

#[tokio::test]
async fn test_checkout_with_empty_cart_goes_back_to_cart() {
    let (_api, server) = logged_in_storefront().await;

    let resp = server.get("/checkout").await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), Some("/cart"));
}

#[tokio::test]
async fn test_missing_delivery_method_is_refused() {
    let (api, server) = logged_in_storefront().await;
    add_to_cart(&server, "1").await;

    let resp = server
        .post_form("/checkout", &[("payment_method", "pay-later")])
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert!(location(&resp).is_some_and(|l| l.starts_with("/checkout")));
    assert!(api.state().await.orders.is_empty());
    assert_eq!(cart_count(&server).await, "1");
}

#[tokio::test]
async fn test_pay_later_pickup_order_is_confirmed() {
    let (api, server) = logged_in_storefront().await;
    add_to_cart(&server, "1").await;
    add_to_cart(&server, "1").await;
    add_to_cart(&server, "2").await;

    let resp = server
        .post_form(
            "/checkout",
            &[("delivery_method", "pickup"), ("payment_method", "pay-later")],
        )
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), Some("/order-confirmation"));

    {
        let state = api.state().await;
        assert_eq!(state.orders.len(), 1);
        let order = &state.orders[0];
        assert_eq!(order.lines.len(), 2);
        assert_eq!(order.address_id, None);
        assert!(order.delivery_fee.amount().is_zero());
    }

    let page = server
        .get("/order-confirmation")
        .await
        .text()
        .await
        .expect("Failed to read body");
    assert!(page.contains("#101"));
    assert_eq!(cart_count(&server).await, "0");
}

#[tokio::test]
async fn test_other_customers_order_is_not_found() {
    let (api, server) = logged_in_storefront().await;
    let order_id = api.insert_order(ADMIN_ID, 2, 1).await;

    let resp = server.get(&format!("/orders/{order_id}")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// M-Pesa
// ============================================================================

async fn place_pay_now_order(api: &MockApi, server: &TestServer) -> i64 {
    add_to_cart(server, "1").await;
    let resp = server
        .post_form(
            "/checkout",
            &[("delivery_method", "pickup"), ("payment_method", "pay-now")],
        )
        .await;
    assert_eq!(location(&resp), Some("/payment"));
    api.state().await.orders[0].order_id
}

#[tokio::test]
async fn test_pay_now_order_confirms_after_payment() {
    let (api, server) = logged_in_storefront().await;
    let order_id = place_pay_now_order(&api, &server).await;

    let resp = server.get("/payment").await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = server
        .post_form("/payment", &[("phone_number", "0712345678")])
        .await;
    assert_eq!(location(&resp), Some("/payment"));
    {
        let state = api.state().await;
        assert_eq!(state.stk_pushes.len(), 1);
        assert_eq!(state.stk_pushes[0]["phone_number"], "254712345678");
        assert_eq!(state.stk_pushes[0]["amount"], 1200);
    }

    api.script_transaction(order_id, &[1, 4]).await;

    let resp = server.hx_get("/payment/status").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.expect("Failed to read body");
    assert!(body.contains("Waiting for payment confirmation"));

    let resp = server.hx_get("/payment/status").await;
    assert_eq!(
        resp.headers().get("HX-Redirect").and_then(|v| v.to_str().ok()),
        Some("/order-confirmation")
    );
    assert_eq!(
        api.state().await.status_updates,
        [(order_id, "processing".to_string())]
    );

    let page = server
        .get("/order-confirmation")
        .await
        .text()
        .await
        .expect("Failed to read body");
    assert!(page.contains(RECEIPT));
}

#[tokio::test]
async fn test_rejected_payment_stops_polling() {
    let (api, server) = logged_in_storefront().await;
    let order_id = place_pay_now_order(&api, &server).await;

    server
        .post_form("/payment", &[("phone_number", "0712345678")])
        .await;
    api.script_transaction(order_id, &[3]).await;

    let body = server
        .hx_get("/payment/status")
        .await
        .text()
        .await
        .expect("Failed to read body");
    assert!(body.contains("Payment was rejected or failed. Please try again."));
    assert!(!body.contains("hx-trigger"));
    assert!(api.state().await.status_updates.is_empty());
}

#[tokio::test]
async fn test_invalid_phone_number_sends_no_push() {
    let (api, server) = logged_in_storefront().await;
    place_pay_now_order(&api, &server).await;

    for phone in ["12345", "07١٢٣٤٥٦٧٨"] {
        let resp = server
            .post_form("/payment", &[("phone_number", phone)])
            .await;
        assert_eq!(location(&resp), Some("/payment"), "{phone}");
    }
    assert!(api.state().await.stk_pushes.is_empty());

    let page = server.get("/payment").await;
    assert_eq!(page.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_payment_stops_polling_after_deadline() {
    let api = MockApi::start().await;
    let server = spawn_storefront_with(&api, |config| {
        config.payment.timeout = Duration::ZERO;
    })
    .await;
    log_in(&server).await;
    place_pay_now_order(&api, &server).await;
    server
        .post_form("/payment", &[("phone_number", "0712345678")])
        .await;

    let body = server
        .hx_get("/payment/status")
        .await
        .text()
        .await
        .expect("Failed to read body");
    assert!(body.contains("Payment confirmation timed out"));
    assert!(!body.contains("hx-trigger"));

    let lookups = api.state().await.transaction_lookups;
    server.hx_get("/payment/status").await;
    assert_eq!(api.state().await.transaction_lookups, lookups);
    assert!(api.state().await.status_updates.is_empty());
}

#[tokio::test]
async fn test_expired_token_during_polling_shows_auth_error() {
    let (api, server) = logged_in_storefront().await;
    let order_id = place_pay_now_order(&api, &server).await;
    server
        .post_form("/payment", &[("phone_number", "0712345678")])
        .await;
    api.script_transaction(order_id, &[1]).await;
    api.state().await.reject_transaction_lookups = true;

    let resp = server.hx_get("/payment/status").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.expect("Failed to read body");
    assert!(body.contains("Authentication error. Please refresh and try again."));
    assert!(!body.contains("hx-trigger"));
    assert!(api.state().await.status_updates.is_empty());
}
