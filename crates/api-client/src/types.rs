//! Request and response shapes of the REST API.
//!
//! Responses are deserialized leniently: list fields the API sometimes sends
//! as `null` default to empty, quantities sent as floats become whole units
//! and timestamps are accepted with or without a UTC offset.

use chrono::NaiveDateTime;
use duka_core::cart::CartProduct;
use duka_core::checkout::DeliveryAddress;
use duka_core::delivery::Locality;
use duka_core::specification::format_inline;
use duka_core::review::Rating;
use duka_core::{
    AddressId, BannerId, CategoryId, FavoriteId, ImageId, OrderDetailId, OrderId, OrderStatus,
    Price, ProductId, ReviewId, Role, SpecificationId, SubcategoryId, TransactionId,
    TransactionStatus, UserId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

pub use duka_core::specification::{ProductSpecification, Specification};

// =============================================================================
// Lenient field helpers
// =============================================================================

mod lenient {
    use chrono::{DateTime, NaiveDateTime};
    use serde::{Deserialize, Deserializer};

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.naive_utc());
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
    }

    pub fn datetime<'de, D: Deserializer<'de>>(de: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(de)?;
        parse_datetime(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid datetime: {raw}")))
    }

    pub fn optional_datetime<'de, D: Deserializer<'de>>(
        de: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        match Option::<String>::deserialize(de)? {
            Some(raw) => parse_datetime(&raw)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid datetime: {raw}"))),
            None => Ok(None),
        }
    }

    /// Quantities arrive as floats (`3.0`). Negative or fractional values are
    /// clamped and truncated to whole units.
    pub fn units<'de, D: Deserializer<'de>>(de: D) -> Result<u32, D::Error> {
        let value = f64::deserialize(de)?;
        if !value.is_finite() || value <= 0.0 {
            return Ok(0);
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Ok(value.min(f64::from(u32::MAX)) as u32)
    }
}

fn null_as_default<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(de)?.unwrap_or_default())
}

// =============================================================================
// Auth
// =============================================================================

/// Bearer token issued at login. Redacted in debug output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    #[must_use]
    pub const fn new(token: String) -> Self {
        Self(token)
    }

    /// The raw token, for the `Authorization` header.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

/// Response of `POST /auth/login`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: AccessToken,
    #[serde(default)]
    pub token_type: String,
    pub user_role: Role,
    pub username: String,
}

/// Response of `GET /me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub role: Role,
}

/// Response of `POST /auth/register/customer` and of admin creation.
///
/// The account cannot log in until the email link is followed.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisteredUser {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub user_id: Option<UserId>,
}

/// Response of `POST /auth/verify-email`; the account is logged in.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifiedEmail {
    #[serde(default)]
    pub message: String,
    pub access_token: AccessToken,
    pub user_role: Role,
    pub username: String,
}

/// Plain `{"message": ...}` acknowledgement.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}

// =============================================================================
// Catalog
// =============================================================================

/// A page of results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub pages: u32,
}

impl<T> Paginated<T> {
    #[must_use]
    pub const fn has_previous(&self) -> bool {
        self.page > 1
    }

    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.page < self.pages
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub features: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subcategory {
    pub id: SubcategoryId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category_id: CategoryId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    pub id: ImageId,
    pub img_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Favorite {
    pub id: FavoriteId,
    pub user_id: UserId,
    pub product_id: ProductId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub user_id: UserId,
    pub product_id: ProductId,
    #[serde(default)]
    pub order_id: Option<OrderId>,
    pub rating: i32,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_datetime")]
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub cost: Price,
    pub price: Price,
    #[serde(default)]
    pub original_price: Option<Price>,
    #[serde(deserialize_with = "lenient::units")]
    pub stock_quantity: u32,
    pub barcode: i64,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub subcategory_id: Option<SubcategoryId>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        serialize_with = "rust_decimal::serde::float::serialize"
    )]
    pub discount: Decimal,
    #[serde(default)]
    pub is_new: bool,
    #[serde(default, deserialize_with = "lenient::optional_datetime")]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub subcategory: Option<Subcategory>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub images: Vec<ProductImage>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub product_specifications: Vec<ProductSpecification>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub favorites: Vec<Favorite>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub reviews: Vec<Review>,
}

impl Product {
    /// First image, used on cards and in the cart.
    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(|img| img.img_url.as_str())
    }

    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock_quantity > 0
    }

    /// Whether to show a struck-through original price.
    #[must_use]
    pub fn has_markdown(&self) -> bool {
        self.original_price.is_some_and(|original| original > self.price)
    }

    /// Mean review rating, if any reviews exist.
    #[must_use]
    pub fn average_rating(&self) -> Option<f64> {
        if self.reviews.is_empty() {
            return None;
        }
        let sum: i32 = self.reviews.iter().map(|r| r.rating).sum();
        #[allow(clippy::cast_precision_loss)]
        Some(f64::from(sum) / self.reviews.len() as f64)
    }

    /// `RAM: 8GB, Storage: 256GB` style summary.
    #[must_use]
    pub fn spec_summary(&self) -> String {
        format_inline(&self.product_specifications)
    }

    /// The facts the cart keeps about this product.
    #[must_use]
    pub fn to_cart_product(&self) -> CartProduct {
        CartProduct {
            product_id: self.id,
            name: self.name.clone(),
            price: self.price,
            image_url: self.primary_image().map(str::to_string),
            stock_quantity: self.stock_quantity,
        }
    }
}

/// Filters for `GET /public/products`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ProductQuery {
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub category_id: Option<CategoryId>,
    pub subcategory_id: Option<SubcategoryId>,
    /// Batch fetch by id; other filters are ignored by the API when set.
    pub ids: Vec<ProductId>,
}

impl ProductQuery {
    /// Query string pairs, skipping unset filters.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            pairs.push(("search", search.to_string()));
        }
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(id) = self.category_id {
            pairs.push(("category_id", id.to_string()));
        }
        if let Some(id) = self.subcategory_id {
            pairs.push(("subcategory_id", id.to_string()));
        }
        if !self.ids.is_empty() {
            let ids = self
                .ids
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",");
            pairs.push(("ids", ids));
        }
        pairs
    }
}

/// Image reference inside a product body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageUrl {
    pub img_url: String,
}

/// A specification value inside a product body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpecificationValue {
    pub specification_id: SpecificationId,
    pub value: String,
}

/// Body for creating or updating a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductInput {
    pub name: String,
    pub cost: Price,
    pub price: Price,
    pub original_price: Option<Price>,
    pub stock_quantity: i64,
    pub barcode: i64,
    pub category_id: Option<CategoryId>,
    pub subcategory_id: Option<SubcategoryId>,
    pub brand: Option<String>,
    pub description: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub discount: Decimal,
    pub is_new: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageUrl>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub specifications: Vec<SpecificationValue>,
}

/// Response of `POST /upload-image`.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadedImage {
    #[serde(default)]
    pub message: String,
    pub img_url: String,
}

/// Body for creating or updating a category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryInput {
    pub name: String,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub features: Option<Vec<String>>,
}

/// Body for creating or updating a subcategory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubcategoryInput {
    pub name: String,
    pub description: Option<String>,
    pub category_id: CategoryId,
}

/// Body for creating or updating a specification definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpecificationInput {
    pub name: String,
    pub value_type: String,
    pub subcategory_id: SubcategoryId,
}

// =============================================================================
// Addresses
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub address: String,
    #[serde(default)]
    pub additional_info: Option<String>,
    pub region: String,
    pub city: String,
    #[serde(default)]
    pub is_default: bool,
}

impl Address {
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// The subset checkout keeps in the session.
    #[must_use]
    pub fn to_delivery_address(&self) -> DeliveryAddress {
        DeliveryAddress {
            id: self.id,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            phone_number: self.phone_number.clone(),
            address: self.address.clone(),
            city: self.city.clone(),
            region: self.region.clone(),
        }
    }

    /// Body for re-saving this address, e.g. to change the default flag.
    #[must_use]
    pub fn to_input(&self) -> AddressInput {
        AddressInput {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            phone_number: self.phone_number.clone(),
            address: self.address.clone(),
            additional_info: self.additional_info.clone(),
            region: self.region.clone(),
            city: self.city.clone(),
            is_default: self.is_default,
        }
    }
}

impl Locality for Address {
    fn region(&self) -> &str {
        &self.region
    }

    fn city(&self) -> &str {
        &self.city
    }
}

/// Body for creating or updating an address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInput {
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub address: String,
    pub additional_info: Option<String>,
    pub region: String,
    pub city: String,
    pub is_default: bool,
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetail {
    pub order_detail_id: OrderDetailId,
    #[serde(default)]
    pub product_id: Option<ProductId>,
    #[serde(deserialize_with = "lenient::units")]
    pub quantity: u32,
    pub total_price: Price,
    #[serde(default)]
    pub product: Option<Product>,
}

impl OrderDetail {
    /// Product name, or a placeholder when the product was deleted.
    #[must_use]
    pub fn product_name(&self) -> &str {
        self.product
            .as_ref()
            .map_or("Product no longer available", |p| p.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub total: Price,
    #[serde(deserialize_with = "lenient::datetime")]
    pub datetime: NaiveDateTime,
    pub status: OrderStatus,
    pub user_id: UserId,
    pub delivery_fee: Price,
    #[serde(default, deserialize_with = "lenient::optional_datetime")]
    pub completed_at: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub order_details: Vec<OrderDetail>,
    #[serde(default)]
    pub address: Option<Address>,
}

impl Order {
    /// Units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.order_details.iter().map(|d| d.quantity).sum()
    }

    /// Order total without the delivery fee.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.order_details.iter().map(|d| d.total_price).sum()
    }
}

/// Customer attached to an order in the admin listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderUser {
    pub id: UserId,
    pub username: String,
    pub email: String,
}

/// Admin order listing row: no line items, but the customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderWithUser {
    pub order_id: OrderId,
    pub total: Price,
    #[serde(deserialize_with = "lenient::datetime")]
    pub datetime: NaiveDateTime,
    pub status: OrderStatus,
    pub user_id: UserId,
    pub delivery_fee: Price,
    #[serde(default, deserialize_with = "lenient::optional_datetime")]
    pub completed_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub address: Option<Address>,
    pub user: OrderUser,
}

/// Paging and filtering for order listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderQuery {
    pub skip: u32,
    pub limit: u32,
    pub status: Option<OrderStatus>,
    /// Customer name search, admin listing only.
    pub search: Option<String>,
}

impl OrderQuery {
    /// Query for a 1-based page of `limit` orders.
    #[must_use]
    pub fn page(page: u32, limit: u32, status: Option<OrderStatus>) -> Self {
        let limit = limit.clamp(1, 100);
        Self {
            skip: page.saturating_sub(1).saturating_mul(limit),
            limit,
            status,
            search: None,
        }
    }

    #[must_use]
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("skip", self.skip.to_string()),
            ("limit", self.limit.max(1).to_string()),
        ];
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            pairs.push(("search", search.to_string()));
        }
        pairs
    }
}

/// One cart line in an order body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderLine {
    pub id: ProductId,
    pub quantity: u32,
}

/// Body of `POST /create_order`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateOrderRequest {
    pub cart: Vec<OrderLine>,
    pub delivery_fee: Price,
    pub address_id: Option<AddressId>,
}

/// Response of `POST /create_order`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedOrder {
    #[serde(default)]
    pub message: String,
    pub order_id: OrderId,
}

// =============================================================================
// Payments
// =============================================================================

/// Body of `POST /payments/lnmo/transact`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StkPushRequest {
    pub order_id: OrderId,
    pub phone_number: String,
    /// Whole shillings.
    pub amount: i64,
}

/// Response of `POST /payments/lnmo/transact`.
#[derive(Debug, Clone, Deserialize)]
pub struct StkPushResponse {
    pub status: String,
    pub message: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl StkPushResponse {
    /// The M-Pesa checkout request id, once Safaricom accepted the push.
    #[must_use]
    pub fn checkout_request_id(&self) -> Option<&str> {
        self.data.get("CheckoutRequestID").and_then(serde_json::Value::as_str)
    }

    /// Message Safaricom wants shown to the customer, if any.
    #[must_use]
    pub fn customer_message(&self) -> Option<&str> {
        self.data.get("CustomerMessage").and_then(serde_json::Value::as_str)
    }
}

/// The latest M-Pesa transaction for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    #[serde(default)]
    pub order_id: Option<i64>,
    pub amount: Price,
    pub status: TransactionStatus,
    /// M-Pesa receipt number, set once paid.
    #[serde(default)]
    pub transaction_code: Option<String>,
    /// M-Pesa checkout request id.
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

/// Wrapper of `POST /payments/transactions`.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionEnvelope {
    pub transaction: Transaction,
}

// =============================================================================
// Reviews
// =============================================================================

/// Body of `POST /reviews`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewInput {
    pub product_id: ProductId,
    pub order_id: OrderId,
    pub rating: Rating,
    pub comment: Option<String>,
}

/// Body of `PUT /reviews/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewUpdate {
    pub rating: Rating,
    pub comment: Option<String>,
}

/// Response of `POST /admin/recalculate-product-ratings`.
#[derive(Debug, Clone, Deserialize)]
pub struct RecalculatedRatings {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub products_updated: u64,
    #[serde(default)]
    pub total_products: u64,
}

// =============================================================================
// Banners
// =============================================================================

/// Where a banner is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BannerKind {
    /// The home page carousel.
    Homepage,
    /// The top of one category page.
    #[default]
    Category,
}

impl BannerKind {
    pub const ALL: [Self; 2] = [Self::Homepage, Self::Category];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Homepage => "homepage",
            Self::Category => "category",
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Homepage => "Homepage",
            Self::Category => "Category",
        }
    }
}

impl std::fmt::Display for BannerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BannerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "homepage" => Ok(Self::Homepage),
            "category" => Ok(Self::Category),
            other => Err(format!("invalid banner type: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Banner {
    pub id: BannerId,
    /// Empty after the image was removed.
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(rename = "type", default)]
    pub kind: BannerKind,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub button_text: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_datetime")]
    pub created_at: Option<NaiveDateTime>,
}

const fn default_true() -> bool {
    true
}

impl Banner {
    /// The body that saves this banner unchanged; `PUT` replaces every field.
    #[must_use]
    pub fn to_input(&self) -> BannerInput {
        BannerInput {
            image_url: self.image_url.clone(),
            title: self.title.clone(),
            subtitle: self.subtitle.clone(),
            active: self.active,
            kind: self.kind,
            category_id: self.category_id,
            button_text: self.button_text.clone(),
        }
    }
}

/// Body for creating or replacing a banner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BannerInput {
    pub image_url: String,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub active: bool,
    #[serde(rename = "type")]
    pub kind: BannerKind,
    pub category_id: Option<CategoryId>,
    pub button_text: Option<String>,
}

// =============================================================================
// Superadmin
// =============================================================================

/// A row of the user directory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub role: Role,
    #[serde(default, deserialize_with = "lenient::optional_datetime")]
    pub created_at: Option<NaiveDateTime>,
}

/// Filters for `GET /superadmin/users`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserQuery {
    pub page: u32,
    pub limit: u32,
    pub search: Option<String>,
    /// `None` lists every role.
    pub role: Option<Role>,
}

impl UserQuery {
    /// Largest page the API serves.
    pub const MAX_LIMIT: u32 = 100;

    /// Query parameter pairs; the limit is capped at [`Self::MAX_LIMIT`].
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.max(1).to_string()),
            ("limit", self.limit.clamp(1, Self::MAX_LIMIT).to_string()),
        ];
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            pairs.push(("search", search.to_string()));
        }
        let role = match self.role {
            None => "all",
            Some(Role::SuperAdmin) => "superadmin",
            Some(Role::Admin) => "admin",
            Some(Role::Customer) => "customer",
        };
        pairs.push(("role_filter", role.to_string()));
        pairs
    }
}

/// Response of `GET /superadmin/stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserStats {
    pub total_users: u64,
    pub total_superadmins: u64,
    pub total_admins: u64,
    pub total_customers: u64,
    #[serde(default)]
    pub superadmins_this_month: u64,
    #[serde(default)]
    pub admins_this_month: u64,
    #[serde(default)]
    pub customers_this_month: u64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn product_json() -> serde_json::Value {
        json!({
            "id": 11,
            "name": "Maasai Shuka",
            "cost": 800.0,
            "price": 1200.0,
            "original_price": 1500.0,
            "stock_quantity": 4.0,
            "barcode": 123456,
            "category_id": 2,
            "subcategory_id": null,
            "brand": null,
            "description": "Red checked blanket",
            "discount": null,
            "is_new": true,
            "created_at": "2025-01-04T10:15:30.123456",
            "user_id": 1,
            "category": {"id": 2, "name": "Fashion", "description": null},
            "subcategory": null,
            "images": [{"id": 5, "img_url": "/uploads/shuka.png"}],
            "product_specifications": [{
                "id": 1, "product_id": 11, "specification_id": 3, "value": "Wool",
                "specification": {"id": 3, "name": "Material", "value_type": "text", "subcategory_id": 9}
            }],
            "favorites": null,
            "reviews": [
                {"id": 1, "user_id": 2, "product_id": 11, "order_id": 4, "rating": 5, "comment": null, "created_at": "2025-01-05T00:00:00"},
                {"id": 2, "user_id": 3, "product_id": 11, "order_id": 6, "rating": 4, "comment": "Warm", "created_at": "2025-01-06T00:00:00"}
            ]
        })
    }

    #[test]
    fn test_product_deserializes_leniently() {
        let product: Product = serde_json::from_value(product_json()).unwrap();
        assert_eq!(product.stock_quantity, 4);
        assert_eq!(product.discount, Decimal::ZERO);
        assert!(product.favorites.is_empty());
        assert_eq!(product.primary_image(), Some("/uploads/shuka.png"));
        assert!(product.has_markdown());
        assert_eq!(product.average_rating(), Some(4.5));
        assert_eq!(product.spec_summary(), "Material: Wool");
        assert!(product.created_at.is_some());
    }

    #[test]
    fn test_product_to_cart_product() {
        let product: Product = serde_json::from_value(product_json()).unwrap();
        let item = product.to_cart_product();
        assert_eq!(item.product_id, ProductId::new(11));
        assert_eq!(item.price, Price::from_shillings(1200));
        assert_eq!(item.stock_quantity, 4);
    }

    #[test]
    fn test_product_query_pairs() {
        let query = ProductQuery {
            search: Some("  shuka ".to_string()),
            page: Some(2),
            limit: Some(8),
            category_id: Some(CategoryId::new(3)),
            subcategory_id: None,
            ids: vec![ProductId::new(1), ProductId::new(4)],
        };
        assert_eq!(
            query.to_pairs(),
            vec![
                ("search", "shuka".to_string()),
                ("page", "2".to_string()),
                ("limit", "8".to_string()),
                ("category_id", "3".to_string()),
                ("ids", "1,4".to_string()),
            ]
        );
        assert!(ProductQuery::default().to_pairs().is_empty());
    }

    #[test]
    fn test_order_with_offset_timestamps() {
        let order: Order = serde_json::from_value(json!({
            "order_id": 9,
            "total": 2400.0,
            "datetime": "2025-02-01T08:00:00+03:00",
            "status": "pending",
            "user_id": 2,
            "delivery_fee": 900.0,
            "completed_at": null,
            "order_details": [
                {"order_detail_id": 1, "product_id": 11, "quantity": 2.0, "total_price": 1500.0, "product": null}
            ],
            "address": null
        }))
        .unwrap();
        assert_eq!(order.datetime.to_string(), "2025-02-01 05:00:00");
        assert_eq!(order.item_count(), 2);
        assert_eq!(order.subtotal(), Price::from_shillings(1500));
        assert_eq!(order.order_details[0].product_name(), "Product no longer available");
    }

    #[test]
    fn test_order_query_paging() {
        let query = OrderQuery::page(3, 10, Some(OrderStatus::Delivered));
        assert_eq!(
            query.to_pairs(),
            vec![
                ("skip", "20".to_string()),
                ("limit", "10".to_string()),
                ("status", "delivered".to_string()),
            ]
        );
        assert_eq!(OrderQuery::page(0, 500, None).skip, 0);
        assert_eq!(OrderQuery::page(0, 500, None).limit, 100);
    }

    #[test]
    fn test_transaction_envelope() {
        let envelope: TransactionEnvelope = serde_json::from_value(json!({
            "transaction": {
                "id": 77, "order_id": 9, "amount": 2400.0, "status": 4,
                "transaction_code": "SGR7XYZ123", "transaction_id": "ws_CO_123",
                "phone_number": "254712345678", "feedback": {}
            }
        }))
        .unwrap();
        assert_eq!(envelope.transaction.status, TransactionStatus::Accepted);
        assert_eq!(envelope.transaction.transaction_code.as_deref(), Some("SGR7XYZ123"));
    }

    #[test]
    fn test_stk_push_response() {
        let response: StkPushResponse = serde_json::from_value(json!({
            "status": "success",
            "message": "Payment initiated successfully",
            "data": {"CheckoutRequestID": "ws_CO_1", "CustomerMessage": "Success. Request accepted for processing"}
        }))
        .unwrap();
        assert_eq!(response.checkout_request_id(), Some("ws_CO_1"));
        assert!(response.customer_message().is_some());
    }

    #[test]
    fn test_create_order_body() {
        let body = CreateOrderRequest {
            cart: vec![OrderLine { id: ProductId::new(1), quantity: 2 }],
            delivery_fee: Price::from_shillings(200),
            address_id: None,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"cart": [{"id": 1, "quantity": 2}], "delivery_fee": 200.0, "address_id": null})
        );
    }

    #[test]
    fn test_access_token_debug_redacts() {
        let token = AccessToken::new("eyJhbGciOi.secret".to_string());
        assert_eq!(format!("{token:?}"), "AccessToken([REDACTED])");
        assert_eq!(token.expose(), "eyJhbGciOi.secret");
    }

    #[test]
    fn test_banner_wire_shape() {
        let banner: Banner = serde_json::from_value(json!({
            "id": 3, "image_url": "/uploads/rains.png", "title": "Long rains sale",
            "subtitle": null, "type": "homepage", "category_id": null,
            "button_text": "Shop now", "created_at": "2025-03-01T09:00:00"
        }))
        .unwrap();
        assert_eq!(banner.kind, BannerKind::Homepage);
        assert!(banner.active);

        let mut input = banner.to_input();
        input.active = false;
        let body = serde_json::to_value(&input).unwrap();
        assert_eq!(body["type"], "homepage");
        assert_eq!(body["active"], false);
        assert_eq!(body["button_text"], "Shop now");
    }

    #[test]
    fn test_user_query_pairs() {
        let query = UserQuery {
            page: 0,
            limit: 500,
            search: Some("  wan ".to_string()),
            role: Some(Role::SuperAdmin),
        };
        assert_eq!(
            query.to_pairs(),
            vec![
                ("page", "1".to_string()),
                ("limit", "100".to_string()),
                ("search", "wan".to_string()),
                ("role_filter", "superadmin".to_string()),
            ]
        );
        let all = UserQuery { page: 2, limit: 50, ..UserQuery::default() };
        assert_eq!(all.to_pairs().last(), Some(&("role_filter", "all".to_string())));
    }

    #[test]
    fn test_review_input_sends_plain_rating() {
        let body = ReviewInput {
            product_id: ProductId::new(1),
            order_id: OrderId::new(9),
            rating: Rating::new(4).unwrap(),
            comment: None,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"product_id": 1, "order_id": 9, "rating": 4, "comment": null})
        );
    }
}
