//! Integration tests for the REST client against the mock API.
//!
//! Run with: cargo test -p duka-integration-tests --test api_client

use duka_api_client::{
    AccessToken, ApiClient, ApiError, CreateOrderRequest, OrderLine, OrderQuery, ProductQuery,
};
use duka_core::{CategoryId, OrderStatus, Price, ProductId, Role, UserId};
use duka_integration_tests::MockApi;
use duka_integration_tests::mock_api::{ADMIN_EMAIL, CUSTOMER_EMAIL, EXPIRED_TOKEN, PASSWORD};
use reqwest::StatusCode;
use secrecy::SecretString;

fn client(api: &MockApi) -> ApiClient {
    ApiClient::new(&api.config()).expect("Failed to build API client")
}

async fn login(client: &ApiClient, email: &str) -> AccessToken {
    client
        .login(email, &SecretString::from(PASSWORD))
        .await
        .expect("Login failed")
        .access_token
}

fn order_for(product_id: i64, quantity: u32) -> CreateOrderRequest {
    CreateOrderRequest {
        cart: vec![OrderLine {
            id: ProductId::new(product_id),
            quantity,
        }],
        delivery_fee: Price::ZERO,
        address_id: None,
    }
}

// ============================================================================
// Auth
// ============================================================================

#[tokio::test]
async fn test_login_and_profile() {
    let api = MockApi::start().await;
    let client = client(&api);

    let login = client
        .login(CUSTOMER_EMAIL, &SecretString::from(PASSWORD))
        .await
        .expect("Login failed");
    assert_eq!(login.user_role, Role::Customer);
    assert_eq!(login.username, "wanjiru");

    let me = client.me(&login.access_token).await.expect("Profile failed");
    assert_eq!(me.id, UserId::new(2));
    assert_eq!(me.email, CUSTOMER_EMAIL);
}

#[tokio::test]
async fn test_wrong_password_is_unauthorized() {
    let api = MockApi::start().await;
    let client = client(&api);

    let err = client
        .login(CUSTOMER_EMAIL, &SecretString::from("guess"))
        .await
        .expect_err("Login should fail");
    assert!(err.is_auth_error());
    assert_eq!(err.user_message(), "Incorrect email or password");
}

#[tokio::test]
async fn test_expired_token_asks_to_log_in_again() {
    let api = MockApi::start().await;
    let client = client(&api);

    let err = client
        .me(&AccessToken::new(EXPIRED_TOKEN.to_string()))
        .await
        .expect_err("Expired token should be refused");
    assert!(err.is_auth_error());
    assert_eq!(err.user_message(), "Your session has expired. Please log in again.");
}

// ============================================================================
// Catalog
// ============================================================================

#[tokio::test]
async fn test_product_listing_is_paginated_and_cached() {
    let api = MockApi::start().await;
    let client = client(&api);
    let query = ProductQuery {
        limit: Some(2),
        ..ProductQuery::default()
    };

    let page = client.list_products(&query).await.expect("Listing failed");
    assert_eq!(page.total, 3);
    assert_eq!(page.pages, 2);
    assert_eq!(page.items.len(), 2);
    assert!(page.has_next());
    assert!(!page.has_previous());

    client.list_products(&query).await.expect("Listing failed");
    assert_eq!(api.state().await.product_list_requests, 1);

    client.invalidate_catalog();
    client.list_products(&query).await.expect("Listing failed");
    assert_eq!(api.state().await.product_list_requests, 2);
}

#[tokio::test]
async fn test_product_search_and_category_filter() {
    let api = MockApi::start().await;
    let client = client(&api);

    let found = client
        .list_products(&ProductQuery {
            search: Some("shuka".to_string()),
            ..ProductQuery::default()
        })
        .await
        .expect("Search failed");
    assert_eq!(found.items.len(), 1);
    assert_eq!(found.items[0].name, "Maasai Shuka");

    let electronics = client
        .list_products(&ProductQuery {
            category_id: Some(CategoryId::new(2)),
            ..ProductQuery::default()
        })
        .await
        .expect("Category filter failed");
    assert_eq!(electronics.items.len(), 1);
    assert!(!electronics.items[0].in_stock());
}

#[tokio::test]
async fn test_products_by_ids() {
    let api = MockApi::start().await;
    let client = client(&api);

    let products = client
        .products_by_ids(&[ProductId::new(2), ProductId::new(3)])
        .await
        .expect("Lookup failed");
    let names: Vec<&str> = products.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["Kiondo Basket", "Solar Lantern"]);

    assert!(client.products_by_ids(&[]).await.expect("Empty lookup failed").is_empty());
    assert_eq!(api.state().await.product_list_requests, 1);
}

#[tokio::test]
async fn test_unknown_product_is_not_found() {
    let api = MockApi::start().await;
    let client = client(&api);

    let err = client
        .get_product(ProductId::new(404))
        .await
        .expect_err("Unknown product should fail");
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_subcategories_filter_by_category() {
    let api = MockApi::start().await;
    let client = client(&api);

    let fashion = client
        .list_subcategories(Some(CategoryId::new(1)))
        .await
        .expect("Subcategories failed");
    assert_eq!(fashion.len(), 1);
    assert_eq!(fashion[0].name, "Blankets");

    let electronics = client
        .list_subcategories(Some(CategoryId::new(2)))
        .await
        .expect("Subcategories failed");
    assert!(electronics.is_empty());
}

#[tokio::test]
async fn test_refresh_product_skips_stale_cache() {
    let api = MockApi::start().await;
    let client = client(&api);

    let cached = client.get_product(ProductId::new(1)).await.expect("Product failed");
    assert_eq!(cached.stock_quantity, 4);
    api.state().await.products[0].stock_quantity = 1;

    let stale = client.get_product(ProductId::new(1)).await.expect("Product failed");
    assert_eq!(stale.stock_quantity, 4);

    let fresh = client.refresh_product(ProductId::new(1)).await.expect("Product failed");
    assert_eq!(fresh.stock_quantity, 1);
    let recached = client.get_product(ProductId::new(1)).await.expect("Product failed");
    assert_eq!(recached.stock_quantity, 1);
}

// ============================================================================
// Orders
// ============================================================================

#[tokio::test]
async fn test_create_order_and_fetch_it() {
    let api = MockApi::start().await;
    let client = client(&api);
    let token = login(&client, CUSTOMER_EMAIL).await;

    // Warm the cache so the stock change below proves it was dropped
    let before = client.get_product(ProductId::new(1)).await.expect("Product failed");
    assert_eq!(before.stock_quantity, 4);

    let created = client
        .create_order(&token, &order_for(1, 2))
        .await
        .expect("Order failed");

    let order = client.get_order(&token, created.order_id).await.expect("Order lookup failed");
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.item_count(), 2);
    assert_eq!(order.total, Price::from_shillings(2400));
    assert_eq!(order.order_details[0].product_name(), "Maasai Shuka");

    let after = client.get_product(ProductId::new(1)).await.expect("Product failed");
    assert_eq!(after.stock_quantity, 2);

    let mine = client
        .my_orders(&token, &OrderQuery::page(1, 10, None))
        .await
        .expect("Order history failed");
    assert_eq!(mine.total, 1);
    assert_eq!(mine.items[0].order_id, created.order_id);
}

#[tokio::test]
async fn test_insufficient_stock_keeps_the_api_detail() {
    let api = MockApi::start().await;
    let client = client(&api);
    let token = login(&client, CUSTOMER_EMAIL).await;

    let err = client
        .create_order(&token, &order_for(1, 5))
        .await
        .expect_err("Order should be refused");
    assert!(matches!(
        &err,
        ApiError::Status { status, .. } if *status == StatusCode::BAD_REQUEST
    ));
    assert_eq!(err.user_message(), "Insufficient stock for Maasai Shuka");
    assert!(api.state().await.orders.is_empty());
}

#[tokio::test]
async fn test_all_orders_requires_staff() {
    let api = MockApi::start().await;
    let client = client(&api);
    let customer = login(&client, CUSTOMER_EMAIL).await;
    let admin = login(&client, ADMIN_EMAIL).await;
    api.insert_order(2, 2, 1).await;

    let err = client
        .all_orders(&customer, &OrderQuery::page(1, 20, None))
        .await
        .expect_err("Customers cannot list every order");
    assert!(err.is_auth_error());

    let all = client
        .all_orders(&admin, &OrderQuery::page(1, 20, Some(OrderStatus::Pending)))
        .await
        .expect("Admin listing failed");
    assert_eq!(all.items.len(), 1);
    assert_eq!(all.items[0].user.username, "wanjiru");
}

#[tokio::test]
async fn test_update_order_status_and_cancellation_request() {
    let api = MockApi::start().await;
    let client = client(&api);
    let customer = login(&client, CUSTOMER_EMAIL).await;
    let admin = login(&client, ADMIN_EMAIL).await;
    let order_id = api.insert_order(2, 1, 1).await;

    client
        .request_cancellation(&customer, order_id.into(), "Ordered the wrong colour")
        .await
        .expect("Cancellation request failed");
    assert_eq!(api.state().await.cancellation_requests, [order_id]);

    client
        .update_order_status(&admin, order_id.into(), OrderStatus::Delivered)
        .await
        .expect("Status update failed");
    assert_eq!(
        api.state().await.status_updates,
        [(order_id, "delivered".to_string())]
    );
}
