//! Delivery and payment choices made at checkout, and regional delivery fees.

use serde::{Deserialize, Serialize};

use crate::types::Price;

/// How the order reaches the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMethod {
    Pickup,
    Delivery,
}

impl DeliveryMethod {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pickup => "pickup",
            Self::Delivery => "delivery",
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Pickup => "Store Pickup",
            Self::Delivery => "Home Delivery",
        }
    }
}

impl std::fmt::Display for DeliveryMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeliveryMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pickup" => Ok(Self::Pickup),
            "delivery" => Ok(Self::Delivery),
            other => Err(format!("invalid delivery method: {other}")),
        }
    }
}

/// When the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    /// M-Pesa STK push right after the order is created.
    #[serde(rename = "pay-now", alias = "pay-online")]
    PayNow,
    /// Cash or M-Pesa on delivery/pickup.
    #[serde(rename = "pay-later")]
    PayLater,
}

impl PaymentMethod {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PayNow => "pay-now",
            Self::PayLater => "pay-later",
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::PayNow => "Pay now with M-Pesa",
            Self::PayLater => "Pay on delivery",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pay-now" | "pay-online" => Ok(Self::PayNow),
            "pay-later" => Ok(Self::PayLater),
            other => Err(format!("invalid payment method: {other}")),
        }
    }
}

/// Fee when delivery is chosen but no address is selected yet.
pub const FEE_WITHOUT_ADDRESS: i64 = 500;

/// Fee for regions missing from the table.
pub const FALLBACK_FEE: i64 = 1000;

/// Per-region city fees in whole shillings. Each region ends with its
/// `default` entry.
const DELIVERY_FEES: &[(&str, &[(&str, i64)])] = &[
    (
        "Nairobi",
        &[
            ("Nairobi", 200),
            ("Kiambu", 300),
            ("Machakos", 400),
            ("Kajiado", 350),
            ("default", 500),
        ],
    ),
    (
        "Central",
        &[
            ("Nyeri", 600),
            ("Murang'a", 550),
            ("Kirinyaga", 700),
            ("Nyandarua", 800),
            ("Kiambu", 300),
            ("default", 750),
        ],
    ),
    (
        "Coast",
        &[
            ("Mombasa", 800),
            ("Kilifi", 1000),
            ("Kwale", 1200),
            ("Malindi", 1100),
            ("default", 1300),
        ],
    ),
    (
        "Western",
        &[
            ("Kisumu", 900),
            ("Kakamega", 1000),
            ("Bungoma", 1100),
            ("Vihiga", 950),
            ("default", 1200),
        ],
    ),
    (
        "Rift Valley",
        &[
            ("Nakuru", 500),
            ("Eldoret", 800),
            ("Naivasha", 400),
            ("Kericho", 700),
            ("default", 900),
        ],
    ),
    (
        "Eastern",
        &[
            ("Machakos", 400),
            ("Kitui", 600),
            ("Makueni", 650),
            ("Embu", 550),
            ("default", 700),
        ],
    ),
    (
        "Nyanza",
        &[
            ("Kisumu", 900),
            ("Homa Bay", 1000),
            ("Migori", 1100),
            ("Siaya", 950),
            ("default", 1200),
        ],
    ),
    (
        "North Eastern",
        &[
            ("Garissa", 1500),
            ("Wajir", 1800),
            ("Mandera", 2000),
            ("default", 1700),
        ],
    ),
];

/// Regions with a fee table, for the address form's region dropdown.
#[must_use]
pub fn regions() -> impl Iterator<Item = &'static str> {
    DELIVERY_FEES.iter().map(|(region, _)| *region)
}

/// Delivery fee to a region and city.
///
/// Both names are trimmed and matched exactly. An unknown city gets its
/// region's default; an unknown region gets [`FALLBACK_FEE`].
#[must_use]
pub fn fee_for_location(region: &str, city: &str) -> Price {
    let region = region.trim();
    let city = city.trim();

    let fee = DELIVERY_FEES
        .iter()
        .find(|(name, _)| *name == region)
        .and_then(|(_, cities)| {
            let lookup = |key: &str| {
                cities
                    .iter()
                    .find(|(name, _)| *name == key)
                    .map(|(_, fee)| *fee)
            };
            lookup(city).or_else(|| lookup("default"))
        })
        .unwrap_or(FALLBACK_FEE);

    Price::from_shillings(fee)
}

/// Where a delivery goes. Implemented by address records so the fee rules
/// stay independent of the API's types.
pub trait Locality {
    fn region(&self) -> &str;
    fn city(&self) -> &str;
}

/// Delivery fee for the current checkout choices.
///
/// Pickup is free, delivery to a known address uses the regional table,
/// delivery without an address costs [`FEE_WITHOUT_ADDRESS`] and no choice
/// yet costs nothing.
#[must_use]
pub fn delivery_fee<L: Locality + ?Sized>(method: Option<DeliveryMethod>, address: Option<&L>) -> Price {
    match (method, address) {
        (Some(DeliveryMethod::Delivery), Some(address)) => {
            fee_for_location(address.region(), address.city())
        }
        (Some(DeliveryMethod::Delivery), None) => Price::from_shillings(FEE_WITHOUT_ADDRESS),
        (Some(DeliveryMethod::Pickup) | None, _) => Price::ZERO,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct Place(&'static str, &'static str);

    impl Locality for Place {
        fn region(&self) -> &str {
            self.0
        }
        fn city(&self) -> &str {
            self.1
        }
    }

    #[test]
    fn test_fee_table_lookup() {
        assert_eq!(fee_for_location("Nairobi", "Nairobi"), Price::from_shillings(200));
        assert_eq!(fee_for_location(" Coast ", " Mombasa"), Price::from_shillings(800));
        assert_eq!(fee_for_location("Central", "Murang'a"), Price::from_shillings(550));
        assert_eq!(fee_for_location("North Eastern", "Mandera"), Price::from_shillings(2000));
    }

    #[test]
    fn test_fee_defaults() {
        assert_eq!(fee_for_location("Nairobi", "Ruiru"), Price::from_shillings(500));
        assert_eq!(fee_for_location("Rift Valley", ""), Price::from_shillings(900));
        assert_eq!(fee_for_location("Atlantis", "Nairobi"), Price::from_shillings(1000));
        assert_eq!(fee_for_location("nairobi", "Nairobi"), Price::from_shillings(1000));
    }

    #[test]
    fn test_delivery_fee_rules() {
        let home = Place("Western", "Kisumu");
        assert_eq!(
            delivery_fee(Some(DeliveryMethod::Pickup), Some(&home)),
            Price::ZERO
        );
        assert_eq!(
            delivery_fee(Some(DeliveryMethod::Delivery), Some(&home)),
            Price::from_shillings(900)
        );
        assert_eq!(
            delivery_fee::<Place>(Some(DeliveryMethod::Delivery), None),
            Price::from_shillings(500)
        );
        assert_eq!(delivery_fee(None, Some(&home)), Price::ZERO);
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("pickup".parse::<DeliveryMethod>().unwrap(), DeliveryMethod::Pickup);
        assert_eq!("pay-online".parse::<PaymentMethod>().unwrap(), PaymentMethod::PayNow);
        assert!("courier".parse::<DeliveryMethod>().is_err());
        let json = serde_json::to_string(&PaymentMethod::PayNow).unwrap();
        assert_eq!(json, "\"pay-now\"");
    }

    #[test]
    fn test_regions_listed() {
        let all: Vec<_> = regions().collect();
        assert_eq!(all.len(), 8);
        assert!(all.contains(&"Rift Valley"));
    }
}
