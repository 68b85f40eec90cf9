//! Watch an order's M-Pesa payment from the terminal.

use std::time::Duration;

use duka_api_client::{PaymentOutcome, PaymentPoller};
use duka_core::OrderId;
use tracing::{info, warn};

use super::{CliError, login};

/// Shortest interval between checks from the terminal.
const MIN_INTERVAL: Duration = Duration::from_secs(1);

fn clamp_interval(interval: Duration) -> Duration {
    interval.max(MIN_INTERVAL)
}

/// Poll until the payment settles, then mark a paid order processing.
///
/// # Errors
///
/// Returns an error if login fails or the payment does not complete.
pub async fn watch(order_id: OrderId, interval: Duration, timeout: Duration) -> Result<(), CliError> {
    let interval = clamp_interval(interval);
    let session = login().await?;
    let poller = PaymentPoller::new(session.client)
        .with_interval(interval)
        .with_timeout(timeout);

    info!(
        order_id = %order_id,
        interval_secs = interval.as_secs(),
        timeout_secs = timeout.as_secs(),
        "Waiting for payment"
    );

    let outcome = poller.wait(&session.token, order_id).await;
    match outcome {
        PaymentOutcome::Paid {
            transaction_id,
            receipt,
        } => {
            info!(
                order_id = %order_id,
                receipt = receipt.as_deref().unwrap_or("-"),
                transaction_id = transaction_id.as_deref().unwrap_or("-"),
                "Payment confirmed"
            );
            if poller.mark_processing(&session.token, order_id).await {
                info!(order_id = %order_id, "Order marked processing");
            } else {
                warn!(order_id = %order_id, "Payment confirmed but the order status was not updated");
            }
            Ok(())
        }
        other => Err(CliError::PaymentFailed {
            order_id: order_id.as_i64(),
            reason: other
                .failure_message()
                .unwrap_or("still pending")
                .to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_is_at_least_one_second() {
        assert_eq!(clamp_interval(Duration::ZERO), MIN_INTERVAL);
        assert_eq!(clamp_interval(Duration::from_millis(300)), MIN_INTERVAL);
        assert_eq!(clamp_interval(Duration::from_secs(8)), Duration::from_secs(8));
    }
}
