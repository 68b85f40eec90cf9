//! Integration tests for admin sign-in and order management.
//!
//! Run with: cargo test -p duka-integration-tests --test admin_orders

use duka_integration_tests::mock_api::{ADMIN_EMAIL, CUSTOMER_EMAIL, CUSTOMER_ID, PASSWORD};
use duka_integration_tests::{MockApi, TestServer, location, spawn_admin};
use reqwest::StatusCode;

async fn signed_in_admin() -> (MockApi, TestServer) {
    let api = MockApi::start().await;
    let server = spawn_admin(&api).await;

    let resp = server
        .post_form("/auth/login", &[("email", ADMIN_EMAIL), ("password", PASSWORD)])
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), Some("/"));
    (api, server)
}

// ============================================================================
// Sign-in
// ============================================================================

#[tokio::test]
async fn test_pages_require_sign_in() {
    let api = MockApi::start().await;
    let server = spawn_admin(&api).await;

    let resp = server.get("/orders").await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), Some("/auth/login"));

    let resp = server.hx_post_form("/orders/101/status", &[("status", "delivered")]).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(api.state().await.status_updates.is_empty());
}

#[tokio::test]
async fn test_customer_account_is_turned_away() {
    let api = MockApi::start().await;
    let server = spawn_admin(&api).await;

    let resp = server
        .post_form("/auth/login", &[("email", CUSTOMER_EMAIL), ("password", PASSWORD)])
        .await;
    assert_eq!(location(&resp), Some("/auth/login?error=forbidden"));

    let resp = server.get("/").await;
    assert_eq!(location(&resp), Some("/auth/login"));
}

#[tokio::test]
async fn test_wrong_password_shows_credentials_error() {
    let api = MockApi::start().await;
    let server = spawn_admin(&api).await;

    let resp = server
        .post_form("/auth/login", &[("email", ADMIN_EMAIL), ("password", "nope")])
        .await;
    assert_eq!(location(&resp), Some("/auth/login?error=credentials"));
}

// ============================================================================
// Orders
// ============================================================================

#[tokio::test]
async fn test_dashboard_and_order_list() {
    let (api, server) = signed_in_admin().await;
    let order_id = api.insert_order(CUSTOMER_ID, 1, 1).await;

    let resp = server.get("/").await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = server
        .get("/orders")
        .await
        .text()
        .await
        .expect("Failed to read body");
    assert!(body.contains(&format!("#{order_id}")));
    assert!(body.contains("wanjiru"));

    let resp = server.get(&format!("/orders/{order_id}")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.expect("Failed to read body");
    assert!(body.contains("Maasai Shuka"));
}

#[tokio::test]
async fn test_status_change_over_htmx_returns_panel() {
    let (api, server) = signed_in_admin().await;
    let order_id = api.insert_order(CUSTOMER_ID, 2, 3).await;

    let resp = server
        .hx_post_form(&format!("/orders/{order_id}/status"), &[("status", "delivered")])
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.expect("Failed to read body");
    assert!(body.contains("id=\"order-status\""));
    assert!(body.contains("Delivered"));

    assert_eq!(
        api.state().await.status_updates,
        [(order_id, "delivered".to_string())]
    );
}

#[tokio::test]
async fn test_status_change_without_htmx_redirects_to_order() {
    let (api, server) = signed_in_admin().await;
    let order_id = api.insert_order(CUSTOMER_ID, 2, 1).await;

    let resp = server
        .post_form(&format!("/orders/{order_id}/status"), &[("status", "cancelled")])
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), Some(format!("/orders/{order_id}").as_str()));
    assert_eq!(api.state().await.orders[0].status, "cancelled");
}

#[tokio::test]
async fn test_unknown_status_is_refused() {
    let (api, server) = signed_in_admin().await;
    let order_id = api.insert_order(CUSTOMER_ID, 2, 1).await;

    let resp = server
        .hx_post_form(&format!("/orders/{order_id}/status"), &[("status", "shipped")])
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(api.state().await.status_updates.is_empty());
}
