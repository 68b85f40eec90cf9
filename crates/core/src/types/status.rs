//! Status enums mirrored from the remote API.

use serde::{Deserialize, Serialize};

/// Lifecycle of an order as stored by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Placed but not yet paid or dispatched.
    #[default]
    Pending,
    /// Paid and being prepared.
    Processing,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// All statuses, in the order the filters list them.
    pub const ALL: [Self; 4] = [
        Self::Pending,
        Self::Processing,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// Wire name, as accepted by `/update-order-status`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Customer-facing label. Pending orders are shown as in transit.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Pending => "In Transit",
            Self::Processing => "Processing",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
        }
    }

    /// CSS modifier for the status badge.
    #[must_use]
    pub const fn badge_class(&self) -> &'static str {
        match self {
            Self::Pending => "badge-pending",
            Self::Processing => "badge-processing",
            Self::Delivered => "badge-delivered",
            Self::Cancelled => "badge-cancelled",
        }
    }

    /// Whether the customer may still ask for cancellation.
    #[must_use]
    pub const fn is_cancellable(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}

/// State of an M-Pesa transaction, sent by the API as an integer code.
///
/// Unknown codes are preserved so that a newer server does not break
/// polling; they are treated as still pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum TransactionStatus {
    Pending,
    Processing,
    /// Code 2. Reached when the customer dismisses the STK prompt.
    Processed,
    Rejected,
    Accepted,
    Unknown(i64),
}

impl TransactionStatus {
    /// Wire code.
    #[must_use]
    pub const fn code(&self) -> i64 {
        match self {
            Self::Pending => 0,
            Self::Processing => 1,
            Self::Processed => 2,
            Self::Rejected => 3,
            Self::Accepted => 4,
            Self::Unknown(code) => *code,
        }
    }

    /// Whether polling can stop.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Processed | Self::Rejected | Self::Accepted)
    }
}

impl From<i64> for TransactionStatus {
    fn from(code: i64) -> Self {
        match code {
            0 => Self::Pending,
            1 => Self::Processing,
            2 => Self::Processed,
            3 => Self::Rejected,
            4 => Self::Accepted,
            other => Self::Unknown(other),
        }
    }
}

impl From<TransactionStatus> for i64 {
    fn from(status: TransactionStatus) -> Self {
        status.code()
    }
}

/// Account role returned at login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Role {
    #[serde(rename = "SUPERADMIN")]
    SuperAdmin,
    #[serde(rename = "admin")]
    Admin,
    #[default]
    #[serde(rename = "customer")]
    Customer,
}

impl Role {
    /// Whether the role may use the admin site.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::SuperAdmin | Self::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SuperAdmin => write!(f, "SUPERADMIN"),
            Self::Admin => write!(f, "admin"),
            Self::Customer => write!(f, "customer"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUPERADMIN" => Ok(Self::SuperAdmin),
            "admin" => Ok(Self::Admin),
            "customer" => Ok(Self::Customer),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}
