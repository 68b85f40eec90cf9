//! Session-related types.
//!
//! Everything the storefront remembers about a browser lives in the session:
//! who is logged in, the cart, the order waiting for payment and the last
//! confirmation.

use chrono::{DateTime, Utc};
use duka_api_client::AccessToken;
use duka_core::cart::Cart;
use duka_core::checkout::OrderSummary;
use duka_core::{OrderId, Price, Role, UserId};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

/// Session-stored customer identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentCustomer {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub role: Role,
    /// Bearer token for the commerce API.
    pub token: AccessToken,
}

/// An order created with "pay now" that has not been paid yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPayment {
    pub order_id: OrderId,
    pub summary: OrderSummary,
    /// Number to pre-fill on the payment form.
    pub phone_hint: Option<String>,
    /// When the current STK push stops being polled; `None` before one is sent.
    pub deadline: Option<DateTime<Utc>>,
}

impl PendingPayment {
    #[must_use]
    pub fn new(summary: OrderSummary, phone_hint: Option<String>) -> Self {
        Self {
            order_id: summary.order_id,
            summary,
            phone_hint,
            deadline: None,
        }
    }

    /// Amount due, including delivery.
    #[must_use]
    pub const fn amount(&self) -> Price {
        self.summary.total
    }

    /// Start the polling window for a freshly sent STK push.
    pub fn start_polling(&mut self, now: DateTime<Utc>, timeout: std::time::Duration) {
        let timeout = chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::MAX);
        self.deadline = Some(now.checked_add_signed(timeout).unwrap_or(DateTime::<Utc>::MAX_UTC));
    }

    /// Close the polling window so the form shows again.
    pub const fn stop_polling(&mut self) {
        self.deadline = None;
    }

    #[must_use]
    pub const fn is_polling(&self) -> bool {
        self.deadline.is_some()
    }

    /// Whether the polling window has closed.
    #[must_use]
    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }
}

/// An account created here that has not followed its email link yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingVerification {
    pub user_id: UserId,
    pub email: String,
}

/// Session keys.
pub mod keys {
    /// The logged-in customer.
    pub const CURRENT_CUSTOMER: &str = "current_customer";

    /// The cart.
    pub const CART: &str = "cart";

    /// The order awaiting M-Pesa payment.
    pub const PENDING_PAYMENT: &str = "pending_payment";

    /// Summary shown on the confirmation page.
    pub const CONFIRMATION: &str = "order_confirmation";

    /// Account waiting for email verification.
    pub const PENDING_VERIFICATION: &str = "pending_verification";

    /// One-shot messages for the next page.
    pub const FLASHES: &str = "flashes";
}

/// Read the cart, empty if there is none yet.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn load_cart(session: &Session) -> Result<Cart, tower_sessions::session::Error> {
    Ok(session.get::<Cart>(keys::CART).await?.unwrap_or_default())
}

/// Write the cart back to the session.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn save_cart(session: &Session, cart: &Cart) -> Result<(), tower_sessions::session::Error> {
    session.insert(keys::CART, cart).await
}

/// # Errors
///
/// Returns an error if the session store fails.
pub async fn load_pending_payment(
    session: &Session,
) -> Result<Option<PendingPayment>, tower_sessions::session::Error> {
    session.get(keys::PENDING_PAYMENT).await
}

/// # Errors
///
/// Returns an error if the session store fails.
pub async fn save_pending_payment(
    session: &Session,
    pending: &PendingPayment,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(keys::PENDING_PAYMENT, pending).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use chrono::NaiveDate;
    use duka_core::checkout::CheckoutSelection;
    use duka_core::delivery::{DeliveryMethod, PaymentMethod};

    use super::*;

    fn pending() -> PendingPayment {
        let selection = CheckoutSelection {
            delivery_method: Some(DeliveryMethod::Pickup),
            payment_method: Some(PaymentMethod::PayNow),
            address: None,
        };
        let summary = OrderSummary::new(
            OrderId::new(31),
            &selection,
            Price::from_shillings(2400),
            NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
        );
        PendingPayment::new(summary, Some("0712345678".to_string()))
    }

    #[test]
    fn test_pending_payment_amount() {
        let pending = pending();
        assert_eq!(pending.order_id, OrderId::new(31));
        assert_eq!(pending.amount(), Price::from_shillings(2400));
        assert!(!pending.is_polling());
    }

    #[test]
    fn test_polling_window() {
        let mut pending = pending();
        let start = Utc::now();
        pending.start_polling(start, Duration::from_secs(120));
        assert!(pending.is_polling());
        assert!(!pending.is_past_deadline(start + chrono::Duration::seconds(119)));
        assert!(pending.is_past_deadline(start + chrono::Duration::seconds(120)));

        pending.stop_polling();
        assert!(!pending.is_polling());
        assert!(!pending.is_past_deadline(start + chrono::Duration::seconds(500)));
    }

    #[test]
    fn test_pending_payment_session_roundtrip_shape() {
        let json = serde_json::to_value(pending()).unwrap();
        assert_eq!(json["order_id"], 31);
        assert!(json["deadline"].is_null());
    }
}
