//! Checkout choices, their validation and the confirmation summary.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::delivery::{self, DeliveryMethod, Locality, PaymentMethod};
use crate::types::{AddressId, OrderId, Price};

/// Shown wherever pickup orders have no address.
pub const STORE_PICKUP: &str = "Store Pickup";

/// Shown when no phone number is known.
pub const NOT_AVAILABLE: &str = "N/A";

/// A validation failure at checkout. The messages are shown to the customer.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutError {
    #[error("Your cart is empty")]
    EmptyCart,
    #[error("Please select a delivery method")]
    MissingDeliveryMethod,
    #[error("Please select a delivery address")]
    MissingAddress,
    #[error("Please select a payment method")]
    MissingPaymentMethod,
}

/// The address fields checkout needs, copied out of the customer's address
/// book when they pick one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAddress {
    pub id: AddressId,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub address: String,
    pub city: String,
    pub region: String,
}

impl DeliveryAddress {
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// `street, city, region`.
    #[must_use]
    pub fn one_line(&self) -> String {
        format!("{}, {}, {}", self.address, self.city, self.region)
    }
}

impl Locality for DeliveryAddress {
    fn region(&self) -> &str {
        &self.region
    }

    fn city(&self) -> &str {
        &self.city
    }
}

/// What the customer picked on the checkout page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSelection {
    pub delivery_method: Option<DeliveryMethod>,
    pub payment_method: Option<PaymentMethod>,
    pub address: Option<DeliveryAddress>,
}

impl CheckoutSelection {
    /// Check the choices, reporting the first problem in page order.
    ///
    /// # Errors
    ///
    /// Returns the [`CheckoutError`] for the first missing choice. An
    /// address is only required for delivery.
    pub const fn validate(&self) -> Result<(), CheckoutError> {
        let Some(method) = self.delivery_method else {
            return Err(CheckoutError::MissingDeliveryMethod);
        };
        if matches!(method, DeliveryMethod::Delivery) && self.address.is_none() {
            return Err(CheckoutError::MissingAddress);
        }
        if self.payment_method.is_none() {
            return Err(CheckoutError::MissingPaymentMethod);
        }
        Ok(())
    }

    #[must_use]
    pub fn delivery_fee(&self) -> Price {
        delivery::delivery_fee(self.delivery_method, self.address.as_ref())
    }

    /// Address to send with the order; pickup orders carry none.
    #[must_use]
    pub fn order_address_id(&self) -> Option<AddressId> {
        match self.delivery_method {
            Some(DeliveryMethod::Delivery) => self.address.as_ref().map(|a| a.id),
            _ => None,
        }
    }
}

/// Everything the confirmation page shows about a freshly placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub order_id: OrderId,
    /// e.g. `October 19, 2026`.
    pub order_date: String,
    pub name: String,
    pub address: String,
    pub phone_number: String,
    pub subtotal: Price,
    pub delivery_fee: Price,
    pub total: Price,
    pub delivery_method: Option<DeliveryMethod>,
    pub payment_method: Option<PaymentMethod>,
    /// M-Pesa receipt, when the order was paid online.
    pub receipt: Option<String>,
}

impl OrderSummary {
    /// Build the summary for an order placed with `selection`.
    ///
    /// The name comes from any selected address, but the address line is
    /// only used for delivery; pickup orders read "Store Pickup".
    #[must_use]
    pub fn new(
        order_id: OrderId,
        selection: &CheckoutSelection,
        subtotal: Price,
        placed_on: NaiveDate,
    ) -> Self {
        let address = selection.address.as_ref();
        let delivery_fee = selection.delivery_fee();
        let is_delivery = matches!(selection.delivery_method, Some(DeliveryMethod::Delivery));

        Self {
            order_id,
            order_date: format_order_date(placed_on),
            name: address.map_or_else(|| STORE_PICKUP.to_string(), DeliveryAddress::full_name),
            address: address
                .filter(|_| is_delivery)
                .map_or_else(|| STORE_PICKUP.to_string(), DeliveryAddress::one_line),
            phone_number: address
                .map(|a| a.phone_number.clone())
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            subtotal,
            delivery_fee,
            total: subtotal + delivery_fee,
            delivery_method: selection.delivery_method,
            payment_method: selection.payment_method,
            receipt: None,
        }
    }

    /// Record the M-Pesa receipt once payment is confirmed.
    #[must_use]
    pub fn with_receipt(mut self, receipt: Option<String>) -> Self {
        self.receipt = receipt;
        self
    }
}

/// Long US-style date, e.g. `October 19, 2026`.
#[must_use]
pub fn format_order_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn address() -> DeliveryAddress {
        DeliveryAddress {
            id: AddressId::new(3),
            first_name: "Achieng".to_string(),
            last_name: "Otieno".to_string(),
            phone_number: "0712345678".to_string(),
            address: "Oginga Odinga St".to_string(),
            city: "Kisumu".to_string(),
            region: "Nyanza".to_string(),
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 7).unwrap()
    }

    #[test]
    fn test_validate_reports_first_missing_choice() {
        let mut selection = CheckoutSelection::default();
        assert_eq!(selection.validate(), Err(CheckoutError::MissingDeliveryMethod));

        selection.delivery_method = Some(DeliveryMethod::Delivery);
        assert_eq!(selection.validate(), Err(CheckoutError::MissingAddress));

        selection.address = Some(address());
        assert_eq!(selection.validate(), Err(CheckoutError::MissingPaymentMethod));

        selection.payment_method = Some(PaymentMethod::PayLater);
        assert_eq!(selection.validate(), Ok(()));
    }

    #[test]
    fn test_pickup_needs_no_address() {
        let selection = CheckoutSelection {
            delivery_method: Some(DeliveryMethod::Pickup),
            payment_method: Some(PaymentMethod::PayNow),
            address: None,
        };
        assert_eq!(selection.validate(), Ok(()));
        assert_eq!(selection.delivery_fee(), Price::ZERO);
        assert_eq!(selection.order_address_id(), None);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            CheckoutError::MissingAddress.to_string(),
            "Please select a delivery address"
        );
    }

    #[test]
    fn test_summary_for_delivery() {
        let selection = CheckoutSelection {
            delivery_method: Some(DeliveryMethod::Delivery),
            payment_method: Some(PaymentMethod::PayLater),
            address: Some(address()),
        };
        let summary = OrderSummary::new(OrderId::new(42), &selection, Price::from_shillings(1500), date());

        assert_eq!(summary.order_date, "March 7, 2026");
        assert_eq!(summary.name, "Achieng Otieno");
        assert_eq!(summary.address, "Oginga Odinga St, Kisumu, Nyanza");
        assert_eq!(summary.phone_number, "0712345678");
        assert_eq!(summary.delivery_fee, Price::from_shillings(900));
        assert_eq!(summary.total, Price::from_shillings(2400));
        assert_eq!(selection.order_address_id(), Some(AddressId::new(3)));
    }

    #[test]
    fn test_summary_for_pickup_falls_back() {
        let selection = CheckoutSelection {
            delivery_method: Some(DeliveryMethod::Pickup),
            payment_method: Some(PaymentMethod::PayLater),
            address: None,
        };
        let summary = OrderSummary::new(OrderId::new(1), &selection, Price::from_shillings(300), date());
        assert_eq!(summary.name, STORE_PICKUP);
        assert_eq!(summary.address, STORE_PICKUP);
        assert_eq!(summary.phone_number, NOT_AVAILABLE);
        assert_eq!(summary.total, Price::from_shillings(300));
    }

    #[test]
    fn test_pickup_with_address_keeps_name_only() {
        let selection = CheckoutSelection {
            delivery_method: Some(DeliveryMethod::Pickup),
            payment_method: Some(PaymentMethod::PayNow),
            address: Some(address()),
        };
        let summary = OrderSummary::new(OrderId::new(1), &selection, Price::from_shillings(300), date());
        assert_eq!(summary.name, "Achieng Otieno");
        assert_eq!(summary.address, STORE_PICKUP);
    }
}
