//! Integration tests for M-Pesa payment confirmation polling.
//!
//! Run with: cargo test -p duka-integration-tests --test payment_polling

use std::time::{Duration, Instant};

use duka_api_client::{AccessToken, ApiClient, PaymentOutcome, PaymentPoller, StkPushRequest};
use duka_core::OrderId;
use duka_integration_tests::MockApi;
use duka_integration_tests::mock_api::{CUSTOMER_EMAIL, CUSTOMER_ID, EXPIRED_TOKEN, PASSWORD, RECEIPT};
use secrecy::SecretString;

const INTERVAL: Duration = Duration::from_millis(10);

struct Fixture {
    api: MockApi,
    client: ApiClient,
    token: AccessToken,
    order_id: OrderId,
}

async fn fixture() -> Fixture {
    let api = MockApi::start().await;
    let client = ApiClient::new(&api.config()).expect("Failed to build API client");
    let token = client
        .login(CUSTOMER_EMAIL, &SecretString::from(PASSWORD))
        .await
        .expect("Login failed")
        .access_token;
    let order_id = OrderId::new(api.insert_order(CUSTOMER_ID, 1, 2).await);
    Fixture {
        api,
        client,
        token,
        order_id,
    }
}

fn poller(client: &ApiClient, timeout: Duration) -> PaymentPoller {
    PaymentPoller::new(client.clone())
        .with_interval(INTERVAL)
        .with_timeout(timeout)
}

#[tokio::test]
async fn test_stk_push_starts_a_pending_transaction() {
    let f = fixture().await;

    let response = f
        .client
        .initiate_stk_push(
            &f.token,
            &StkPushRequest {
                order_id: f.order_id,
                phone_number: "254712345678".to_string(),
                amount: 2400,
            },
        )
        .await
        .expect("STK push failed");
    assert_eq!(response.checkout_request_id(), Some("ws_CO_101"));
    assert!(response.customer_message().is_some());

    let outcome = poller(&f.client, Duration::from_secs(1))
        .check_once(&f.token, f.order_id)
        .await;
    assert_eq!(outcome, PaymentOutcome::Pending);
    assert_eq!(f.api.state().await.stk_pushes[0]["amount"], 2400);
}

#[tokio::test]
async fn test_wait_returns_paid_once_accepted() {
    let f = fixture().await;
    f.api.script_transaction(f.order_id.as_i64(), &[0, 1, 4]).await;

    let outcome = poller(&f.client, Duration::from_secs(5))
        .wait(&f.token, f.order_id)
        .await;
    assert_eq!(
        outcome,
        PaymentOutcome::Paid {
            transaction_id: Some("ws_CO_101".to_string()),
            receipt: Some(RECEIPT.to_string()),
        }
    );
    assert_eq!(f.api.state().await.transaction_lookups, 3);
}

#[tokio::test]
async fn test_rejected_and_cancelled_transactions_stop_polling() {
    let f = fixture().await;
    let poller = poller(&f.client, Duration::from_secs(5));

    f.api.script_transaction(f.order_id.as_i64(), &[3]).await;
    let rejected = poller.wait(&f.token, f.order_id).await;
    assert_eq!(rejected, PaymentOutcome::Rejected);
    assert!(rejected.failure_message().is_some());

    f.api.script_transaction(f.order_id.as_i64(), &[2]).await;
    let cancelled = poller.wait(&f.token, f.order_id).await;
    assert_eq!(cancelled, PaymentOutcome::Cancelled);
    assert_eq!(
        cancelled.failure_message(),
        Some("Payment was cancelled. Please try again.")
    );
}

#[tokio::test]
async fn test_missing_transaction_times_out() {
    let f = fixture().await;

    let outcome = poller(&f.client, Duration::from_millis(60))
        .wait(&f.token, f.order_id)
        .await;
    assert_eq!(outcome, PaymentOutcome::TimedOut);
    assert!(f.api.state().await.transaction_lookups >= 1);
}

#[tokio::test]
async fn test_wait_does_not_sleep_past_the_deadline() {
    let f = fixture().await;
    let poller = PaymentPoller::new(f.client.clone())
        .with_interval(Duration::from_secs(3))
        .with_timeout(Duration::from_millis(100));

    let started = Instant::now();
    let outcome = poller.wait(&f.token, f.order_id).await;
    assert_eq!(outcome, PaymentOutcome::TimedOut);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(f.api.state().await.transaction_lookups, 0);
}

#[tokio::test]
async fn test_wait_abandons_a_slow_lookup_at_the_deadline() {
    let f = fixture().await;
    f.api.script_transaction(f.order_id.as_i64(), &[4]).await;
    f.api.state().await.transaction_delay = Some(Duration::from_secs(3));

    let started = Instant::now();
    let outcome = poller(&f.client, Duration::from_millis(150))
        .wait(&f.token, f.order_id)
        .await;
    assert_eq!(outcome, PaymentOutcome::TimedOut);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(f.api.state().await.transaction_lookups, 1);
}

#[tokio::test]
async fn test_expired_token_fails_authentication() {
    let f = fixture().await;
    f.api.script_transaction(f.order_id.as_i64(), &[0]).await;

    let outcome = poller(&f.client, Duration::from_secs(1))
        .check_once(&AccessToken::new(EXPIRED_TOKEN.to_string()), f.order_id)
        .await;
    assert_eq!(outcome, PaymentOutcome::AuthFailed);
    assert!(outcome.is_terminal());
}

#[tokio::test]
async fn test_mark_processing_updates_the_order() {
    let f = fixture().await;

    let marked = poller(&f.client, Duration::from_secs(1))
        .mark_processing(&f.token, f.order_id)
        .await;
    assert!(marked);

    let order = f.client.get_order(&f.token, f.order_id).await.expect("Order lookup failed");
    assert_eq!(order.status, duka_core::OrderStatus::Processing);
}

#[tokio::test]
async fn test_mark_processing_reports_unknown_order() {
    let f = fixture().await;

    let marked = poller(&f.client, Duration::from_secs(1))
        .mark_processing(&f.token, OrderId::new(9999))
        .await;
    assert!(!marked);
    assert!(f.api.state().await.status_updates.is_empty());
}
