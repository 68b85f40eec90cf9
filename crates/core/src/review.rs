//! Product reviews.
//!
//! Customers review what they received: every product on a delivered order
//! can be reviewed once per order.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{OrderId, ProductId};

/// Errors for an out-of-range rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Please select a rating")]
pub struct RatingError;

/// One to five stars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct Rating(u8);

impl Rating {
    pub const MAX: u8 = 5;

    /// # Errors
    ///
    /// Returns [`RatingError`] outside 1 to 5; 0 means no star was picked.
    pub fn new(stars: i32) -> Result<Self, RatingError> {
        u8::try_from(stars)
            .ok()
            .filter(|s| (1..=Self::MAX).contains(s))
            .map(Self)
            .ok_or(RatingError)
    }

    #[must_use]
    pub const fn stars(&self) -> u8 {
        self.0
    }

    /// Word shown next to the stars.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self.0 {
            5 => "Amazing!",
            4 => "Great!",
            3 => "Good",
            2 => "Could be better",
            _ => "Needs improvement",
        }
    }

    /// `★★★★☆`
    #[must_use]
    pub fn display(&self) -> String {
        let filled = usize::from(self.0);
        let empty = usize::from(Self::MAX - self.0);
        format!("{}{}", "★".repeat(filled), "☆".repeat(empty))
    }
}

impl TryFrom<i32> for Rating {
    type Error = RatingError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for i32 {
    fn from(rating: Rating) -> Self {
        Self::from(rating.0)
    }
}

/// Purchases that still await a review.
///
/// `delivered` lists the order and product of each line on a delivered
/// order; `reviewed` the pairs already reviewed. Duplicate lines collapse
/// and the delivered order is kept.
#[must_use]
pub fn pending_reviews(
    delivered: impl IntoIterator<Item = (OrderId, ProductId)>,
    reviewed: impl IntoIterator<Item = (OrderId, ProductId)>,
) -> Vec<(OrderId, ProductId)> {
    let mut seen: HashSet<(OrderId, ProductId)> = reviewed.into_iter().collect();
    delivered
        .into_iter()
        .filter(|pair| seen.insert(*pair))
        .collect()
}
