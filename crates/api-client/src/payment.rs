//! M-Pesa payment confirmation by polling.
//!
//! After an STK push the customer approves the payment on their phone and
//! Safaricom calls the API back. The frontend has no push channel, so it asks
//! the API for the order's latest transaction at a fixed interval until the
//! transaction settles or a deadline passes.

use std::time::Duration;

use duka_core::{OrderId, OrderStatus, TransactionStatus};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::client::ApiClient;
use crate::error::ApiError;
use crate::types::{AccessToken, Transaction};

/// Result of checking, or waiting for, a payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// Accepted by M-Pesa.
    Paid {
        /// M-Pesa checkout request id.
        transaction_id: Option<String>,
        /// M-Pesa receipt number.
        receipt: Option<String>,
    },
    /// Declined, e.g. insufficient funds or a wrong PIN.
    Rejected,
    /// The customer dismissed the prompt.
    Cancelled,
    /// Nothing final yet.
    Pending,
    /// The API no longer accepts our token.
    AuthFailed,
    /// The deadline passed while still pending.
    TimedOut,
}

impl PaymentOutcome {
    /// Whether polling should stop.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Customer-facing explanation for the failure outcomes.
    #[must_use]
    pub const fn failure_message(&self) -> Option<&'static str> {
        match self {
            Self::Rejected => Some("Payment was rejected or failed. Please try again."),
            Self::Cancelled => Some("Payment was cancelled. Please try again."),
            Self::TimedOut => Some(
                "Payment confirmation timed out. Please try again or contact support if payment was deducted.",
            ),
            Self::AuthFailed => Some("Authentication error. Please refresh and try again."),
            Self::Paid { .. } | Self::Pending => None,
        }
    }

    /// Classify one transaction lookup.
    ///
    /// A missing transaction, an unknown status code and transient failures
    /// (timeouts, 5xx, parse errors, rate limiting) all count as pending so
    /// a single bad poll does not abort the payment.
    #[must_use]
    pub fn classify(lookup: &Result<Option<Transaction>, ApiError>) -> Self {
        match lookup {
            Ok(Some(transaction)) => match transaction.status {
                TransactionStatus::Accepted => Self::Paid {
                    transaction_id: transaction.transaction_id.clone(),
                    receipt: transaction.transaction_code.clone(),
                },
                TransactionStatus::Rejected => Self::Rejected,
                TransactionStatus::Processed => Self::Cancelled,
                TransactionStatus::Pending
                | TransactionStatus::Processing
                | TransactionStatus::Unknown(_) => Self::Pending,
            },
            Ok(None) => Self::Pending,
            Err(ApiError::Unauthorized(_)) => Self::AuthFailed,
            Err(_) => Self::Pending,
        }
    }
}

/// Polls the API for the outcome of an STK push.
#[derive(Clone)]
pub struct PaymentPoller {
    client: ApiClient,
    interval: Duration,
    timeout: Duration,
}

impl PaymentPoller {
    /// Time between polls.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(8);
    /// How long to wait for the customer before giving up.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
    /// Shortest accepted interval; zero would poll in a tight loop.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(10);

    #[must_use]
    pub const fn new(client: ApiClient) -> Self {
        Self {
            client,
            interval: Self::DEFAULT_INTERVAL,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Self::MIN_INTERVAL);
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Look up the order's transaction once.
    #[instrument(skip(self, token), fields(order_id = %order_id))]
    pub async fn check_once(&self, token: &AccessToken, order_id: OrderId) -> PaymentOutcome {
        let lookup = self.client.transaction_for_order(token, order_id).await;
        if let Err(e) = &lookup {
            if e.is_auth_error() {
                warn!(error = %e, "Payment status check rejected our token");
            } else {
                debug!(error = %e, "Transient failure checking payment status");
            }
        }
        PaymentOutcome::classify(&lookup)
    }

    /// Poll until the payment settles or the timeout passes.
    ///
    /// The first check happens one interval after the call, giving the
    /// customer time to see the prompt on their phone. The deadline is hard:
    /// neither the sleep nor an in-flight check runs past it.
    #[instrument(skip(self, token), fields(order_id = %order_id))]
    pub async fn wait(&self, token: &AccessToken, order_id: OrderId) -> PaymentOutcome {
        let deadline = Instant::now() + self.timeout;
        let mut attempts: u32 = 0;

        loop {
            tokio::time::sleep_until(deadline.min(Instant::now() + self.interval)).await;
            if Instant::now() >= deadline {
                break;
            }
            attempts += 1;

            match tokio::time::timeout_at(deadline, self.check_once(token, order_id)).await {
                Ok(outcome) if outcome.is_terminal() => {
                    info!(attempts, outcome = ?outcome, "Payment settled");
                    return outcome;
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }

        warn!(attempts, "Payment confirmation timed out");
        PaymentOutcome::TimedOut
    }

    /// Mark a paid order as processing, returning whether the API took it.
    ///
    /// The payment already went through, so a failure here is logged rather
    /// than shown to the customer.
    #[instrument(skip(self, token), fields(order_id = %order_id))]
    pub async fn mark_processing(&self, token: &AccessToken, order_id: OrderId) -> bool {
        match self
            .client
            .update_order_status(token, order_id, OrderStatus::Processing)
            .await
        {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(error = %e, "Failed to mark paid order as processing");
                false
            }
        }
    }
}
