//! Customer reviews.
//!
//! Every product on a delivered order can be reviewed once per order. The
//! reviews page lists what is still waiting for a review next to what the
//! customer already wrote.

use std::collections::HashMap;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use duka_api_client::{ApiError, Order, OrderQuery, Review, ReviewInput, ReviewUpdate};
use duka_core::review::{Rating, RatingError, pending_reviews};
use duka_core::{OrderId, OrderStatus, ProductId, ReviewId};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::Result;
use crate::filters;
use crate::middleware::RequireAuth;
use crate::models::{Flash, push_flash};
use crate::state::AppState;
use crate::views::PageContext;

pub(crate) const REVIEWS_PATH: &str = "/account/reviews";

/// Delivered orders looked at for pending reviews.
const DELIVERED_ORDER_LIMIT: u32 = 100;

/// Longest review text accepted.
const MAX_COMMENT_LENGTH: usize = 1000;

/// New review form.
#[derive(Debug, Deserialize)]
pub struct NewReviewForm {
    pub product_id: i64,
    pub order_id: i64,
    /// Empty when no star was picked.
    #[serde(default)]
    pub rating: String,
    pub comment: Option<String>,
}

/// Edit review form.
#[derive(Debug, Deserialize)]
pub struct EditReviewForm {
    #[serde(default)]
    pub rating: String,
    pub comment: Option<String>,
}

/// A purchase waiting for a review.
#[derive(Clone)]
pub struct PendingReviewView {
    pub order_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub delivered_on: String,
}

/// A review the customer wrote.
#[derive(Clone)]
pub struct MyReviewView {
    pub id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub rating: i32,
    pub stars: String,
    pub label: &'static str,
    pub comment: String,
    pub written_on: Option<String>,
}

/// Star choice in the rating dropdown.
#[derive(Clone)]
pub struct RatingOption {
    pub value: i32,
    pub label: String,
}

fn rating_options() -> Vec<RatingOption> {
    (1..=Rating::MAX)
        .rev()
        .filter_map(|stars| Rating::new(i32::from(stars)).ok())
        .map(|rating| RatingOption {
            value: i32::from(rating),
            label: format!("{} {}", rating.display(), rating.label()),
        })
        .collect()
}

/// Reviews page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/reviews.html")]
pub struct ReviewsTemplate {
    pub ctx: PageContext,
    pub pending: Vec<PendingReviewView>,
    pub reviews: Vec<MyReviewView>,
    pub ratings: Vec<RatingOption>,
}

/// Product names and delivery dates from delivered orders.
struct Deliveries<'a> {
    names: HashMap<ProductId, &'a str>,
    dates: HashMap<OrderId, String>,
}

impl<'a> Deliveries<'a> {
    fn new(orders: &'a [Order]) -> Self {
        let names = orders
            .iter()
            .flat_map(|o| o.order_details.iter())
            .filter_map(|d| Some((d.product_id?, d.product_name())))
            .collect();
        let dates = orders
            .iter()
            .map(|o| {
                let when = o.completed_at.unwrap_or(o.datetime);
                (o.order_id, when.format("%b %-d, %Y").to_string())
            })
            .collect();
        Self { names, dates }
    }

    fn name(&self, product_id: ProductId) -> String {
        self.names
            .get(&product_id)
            .map_or_else(|| format!("Product #{product_id}"), |n| (*n).to_string())
    }
}

fn lines(orders: &[Order]) -> impl Iterator<Item = (OrderId, ProductId)> + '_ {
    orders.iter().flat_map(|o| {
        o.order_details
            .iter()
            .filter_map(move |d| d.product_id.map(|p| (o.order_id, p)))
    })
}

fn reviewed(reviews: &[Review]) -> impl Iterator<Item = (OrderId, ProductId)> + '_ {
    reviews
        .iter()
        .filter_map(|r| r.order_id.map(|order| (order, r.product_id)))
}

fn parse_rating(raw: &str) -> std::result::Result<Rating, RatingError> {
    raw.trim().parse().map_or(Err(RatingError), Rating::new)
}

/// Trimmed comment, `None` when blank.
fn clean_comment(comment: Option<&str>) -> std::result::Result<Option<String>, String> {
    let comment = comment.map(str::trim).filter(|c| !c.is_empty());
    if comment.is_some_and(|c| c.chars().count() > MAX_COMMENT_LENGTH) {
        return Err(format!(
            "Reviews can be at most {MAX_COMMENT_LENGTH} characters long"
        ));
    }
    Ok(comment.map(str::to_string))
}

/// Flash for a review the API refused, or the error to propagate.
fn rejected(error: ApiError) -> Result<Flash> {
    match &error {
        ApiError::Status { status, .. } if status.is_client_error() => {
            Ok(Flash::error(error.user_message()))
        }
        ApiError::NotFound(_) => Ok(Flash::error("Review not found")),
        _ => Err(error.into()),
    }
}

/// Show pending and written reviews.
#[instrument(skip(state, ctx, customer))]
pub async fn index(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireAuth(customer): RequireAuth,
) -> Result<ReviewsTemplate> {
    let query = OrderQuery::page(1, DELIVERED_ORDER_LIMIT, Some(OrderStatus::Delivered));
    let (orders, reviews) = tokio::join!(
        state.api().my_orders(&customer.token, &query),
        state.api().my_reviews(&customer.token),
    );
    let orders = orders?.items;
    let reviews = reviews?;
    let deliveries = Deliveries::new(&orders);

    let pending = pending_reviews(lines(&orders), reviewed(&reviews))
        .into_iter()
        .map(|(order_id, product_id)| PendingReviewView {
            order_id: order_id.as_i64(),
            product_id: product_id.as_i64(),
            product_name: deliveries.name(product_id),
            delivered_on: deliveries.dates.get(&order_id).cloned().unwrap_or_default(),
        })
        .collect();

    let reviews = reviews
        .iter()
        .map(|review| {
            let rating = Rating::new(review.rating).ok();
            MyReviewView {
                id: review.id.as_i64(),
                product_id: review.product_id.as_i64(),
                product_name: deliveries.name(review.product_id),
                rating: review.rating,
                stars: super::products::stars(review.rating),
                label: rating.map_or("", |r| r.label()),
                comment: review.comment.clone().unwrap_or_default(),
                written_on: review.created_at.map(|d| d.format("%b %-d, %Y").to_string()),
            }
        })
        .collect();

    Ok(ReviewsTemplate {
        ctx,
        pending,
        reviews,
        ratings: rating_options(),
    })
}

/// Review a delivered product.
#[instrument(skip(state, session, customer, form))]
pub async fn create(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    Form(form): Form<NewReviewForm>,
) -> Result<Response> {
    let flash = match (parse_rating(&form.rating), clean_comment(form.comment.as_deref())) {
        (Err(e), _) => Flash::error(e.to_string()),
        (_, Err(message)) => Flash::error(message),
        (Ok(rating), Ok(comment)) => {
            let input = ReviewInput {
                product_id: ProductId::new(form.product_id),
                order_id: OrderId::new(form.order_id),
                rating,
                comment,
            };
            match state.api().create_review(&customer.token, &input).await {
                Ok(review) => {
                    tracing::info!(review_id = %review.id, "Review submitted");
                    Flash::success("Thank you for your review!")
                }
                Err(e) => rejected(e)?,
            }
        }
    };
    push_flash(&session, flash).await;
    Ok(Redirect::to(REVIEWS_PATH).into_response())
}

/// Change the rating or text of a review.
#[instrument(skip(state, session, customer, form))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    Path(id): Path<i64>,
    Form(form): Form<EditReviewForm>,
) -> Result<Response> {
    let flash = match (parse_rating(&form.rating), clean_comment(form.comment.as_deref())) {
        (Err(e), _) => Flash::error(e.to_string()),
        (_, Err(message)) => Flash::error(message),
        (Ok(rating), Ok(comment)) => {
            let input = ReviewUpdate { rating, comment };
            match state
                .api()
                .update_review(&customer.token, ReviewId::new(id), &input)
                .await
            {
                Ok(_) => Flash::success("Review updated"),
                Err(e) => rejected(e)?,
            }
        }
    };
    push_flash(&session, flash).await;
    Ok(Redirect::to(REVIEWS_PATH).into_response())
}

/// Delete a review.
#[instrument(skip(state, session, customer))]
pub async fn delete(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    Path(id): Path<i64>,
) -> Result<Response> {
    let flash = match state.api().delete_review(&customer.token, ReviewId::new(id)).await {
        Ok(()) => Flash::success("Review deleted"),
        Err(e) => rejected(e)?,
    };
    push_flash(&session, flash).await;
    Ok(Redirect::to(REVIEWS_PATH).into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rating() {
        assert_eq!(parse_rating("4").unwrap().stars(), 4);
        assert_eq!(parse_rating(" 5 ").unwrap().stars(), 5);
        assert_eq!(parse_rating(""), Err(RatingError));
        assert_eq!(parse_rating("7"), Err(RatingError));
    }

    #[test]
    fn test_clean_comment() {
        assert_eq!(clean_comment(None).unwrap(), None);
        assert_eq!(clean_comment(Some("   ")).unwrap(), None);
        assert_eq!(
            clean_comment(Some("  Warm and soft ")).unwrap(),
            Some("Warm and soft".to_string())
        );
        assert!(clean_comment(Some(&"a".repeat(MAX_COMMENT_LENGTH + 1))).is_err());
    }

    #[test]
    fn test_rating_options_best_first() {
        let options = rating_options();
        assert_eq!(options.len(), 5);
        assert_eq!(options[0].value, 5);
        assert_eq!(options[0].label, "★★★★★ Amazing!");
        assert_eq!(options[4].label, "★☆☆☆☆ Needs improvement");
    }

    #[test]
    fn test_rejected_keeps_api_detail() {
        let duplicate = ApiError::Status {
            status: reqwest::StatusCode::BAD_REQUEST,
            detail: "You have already reviewed this product for this order".to_string(),
        };
        let flash = rejected(duplicate).unwrap();
        assert_eq!(
            flash.message,
            "You have already reviewed this product for this order"
        );

        let outage = ApiError::Status {
            status: reqwest::StatusCode::BAD_GATEWAY,
            detail: "upstream".to_string(),
        };
        assert!(rejected(outage).is_err());
    }
}
