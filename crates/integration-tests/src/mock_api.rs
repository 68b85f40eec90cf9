//! In-memory stand-in for the commerce REST API.
//!
//! Implements the endpoints the frontends call with the same paths, JSON
//! shapes and `{"detail": ...}` errors. Tokens are `token-<user id>`; the
//! literal token `expired` answers like a lapsed session. Emailed links
//! carry `verify-<user id>` and `reset-<user id>` tokens.
//!
//! A chat completion endpoint for the shopping assistant is served under
//! `/openai`, outside the API.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post, put},
};
use duka_api_client::{
    Address, ApiConfig, Banner, BannerKind, Category, Favorite, Paginated, Product, ProductImage,
    ProductSpecification, Review, Specification, Subcategory,
};
use duka_core::{
    AddressId, BannerId, CategoryId, FavoriteId, ImageId, OrderId, Price, ProductId,
    ProductSpecificationId, ReviewId, SpecificationId, SubcategoryId, UserId,
};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, MutexGuard};

pub const CUSTOMER_EMAIL: &str = "wanjiru@example.com";
pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const SUPERADMIN_EMAIL: &str = "owner@example.com";
pub const PASSWORD: &str = "correct-horse-battery";
pub const EXPIRED_TOKEN: &str = "expired";
pub const CUSTOMER_ID: i64 = 2;
pub const ADMIN_ID: i64 = 1;
pub const SUPERADMIN_ID: i64 = 3;

/// What the assistant endpoint answers.
pub const ASSISTANT_REPLY: &str = "Karibu! The Maasai Shuka is a warm checked blanket.";

const UNVERIFIED_DETAIL: &str =
    "Please verify your email address before logging in. Check your inbox for a verification link.";

/// Receipt number on accepted transactions.
pub const RECEIPT: &str = "SJK4H2L9QX";

const ORDER_DATETIME: &str = "2026-10-19T09:30:00";
const FIRST_ORDER_ID: i64 = 101;
const FIRST_CREATED_ID: i64 = 1000;
const DEFAULT_LIMIT: u32 = 12;

/// An account.
#[derive(Debug, Clone)]
pub struct MockUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    /// `customer`, `admin` or `SUPERADMIN`.
    pub role: String,
    pub password: String,
    /// Customers cannot log in until this is set.
    pub verified: bool,
}

impl MockUser {
    fn new(id: i64, username: &str, email: &str, role: &str) -> Self {
        Self {
            id,
            username: username.to_string(),
            email: email.to_string(),
            role: role.to_string(),
            password: PASSWORD.to_string(),
            verified: true,
        }
    }

    #[must_use]
    pub fn token(&self) -> String {
        format!("token-{}", self.id)
    }

    fn is_admin(&self) -> bool {
        self.role != "customer"
    }

    fn is_super_admin(&self) -> bool {
        self.role == "SUPERADMIN"
    }

    fn summary(&self) -> Value {
        json!({
            "id": self.id,
            "username": self.username,
            "email": self.email,
            "role": self.role,
            "created_at": ORDER_DATETIME,
            "status": "active",
        })
    }
}

/// An order placed through `create_order`.
#[derive(Debug, Clone)]
pub struct MockOrder {
    pub order_id: i64,
    pub user_id: i64,
    /// `(product id, quantity, line total)`
    pub lines: Vec<(ProductId, u32, Price)>,
    pub delivery_fee: Price,
    pub total: Price,
    pub address_id: Option<AddressId>,
    pub status: String,
}

/// Everything the mock knows and everything it was asked to do.
#[derive(Debug, Default)]
pub struct MockState {
    pub users: Vec<MockUser>,
    pub products: Vec<Product>,
    pub categories: Vec<Category>,
    pub subcategories: Vec<Subcategory>,
    pub specifications: Vec<Specification>,
    pub addresses: Vec<Address>,
    pub favorites: Vec<Favorite>,
    pub banners: Vec<Banner>,
    pub orders: Vec<MockOrder>,
    /// Transaction status codes per order, served in sequence; the last one
    /// repeats.
    pub transactions: HashMap<i64, VecDeque<i64>>,
    pub stk_pushes: Vec<Value>,
    /// `(order id, status)` for every accepted status change.
    pub status_updates: Vec<(i64, String)>,
    pub cancellation_requests: Vec<i64>,
    pub product_list_requests: usize,
    pub transaction_lookups: usize,
    /// Answer transaction lookups this late.
    pub transaction_delay: Option<std::time::Duration>,
    /// Answer transaction lookups as if the token had expired.
    pub reject_transaction_lookups: bool,
    /// Refuse every product specification value.
    pub reject_spec_values: bool,
    /// File names received by `upload-image`.
    pub uploads: Vec<String>,
    pub newsletter: Vec<String>,
    /// User ids a verification email went to.
    pub verification_emails: Vec<i64>,
    /// User ids a password reset link went to.
    pub reset_emails: Vec<i64>,
    pub rating_recalculations: usize,
    next_id: i64,
}

impl MockState {
    /// A small catalog, one address for the customer and no orders.
    #[must_use]
    pub fn seeded() -> Self {
        let fashion = category(1, "Fashion");
        let electronics = category(2, "Electronics");
        Self {
            users: vec![
                MockUser::new(ADMIN_ID, "duka-admin", ADMIN_EMAIL, "admin"),
                MockUser::new(CUSTOMER_ID, "wanjiru", CUSTOMER_EMAIL, "customer"),
                MockUser::new(SUPERADMIN_ID, "mwenye-duka", SUPERADMIN_EMAIL, "SUPERADMIN"),
            ],
            products: vec![
                product(1, "Maasai Shuka", 1200, 4, fashion.id),
                product(2, "Kiondo Basket", 850, 10, fashion.id),
                product(3, "Solar Lantern", 2500, 0, electronics.id),
            ],
            subcategories: vec![Subcategory {
                id: SubcategoryId::new(1),
                name: "Blankets".to_string(),
                description: None,
                category_id: fashion.id,
            }],
            specifications: vec![Specification {
                id: SpecificationId::new(1),
                name: "Material".to_string(),
                value_type: "text".to_string(),
                subcategory_id: Some(SubcategoryId::new(1)),
            }],
            banners: vec![
                banner(1, "Long rains sale", true),
                banner(2, "Old Mashujaa promo", false),
            ],
            categories: vec![fashion, electronics],
            addresses: vec![Address {
                id: AddressId::new(7),
                first_name: "Wanjiru".to_string(),
                last_name: "Kamau".to_string(),
                phone_number: "0712345678".to_string(),
                address: "Moi Avenue 12".to_string(),
                additional_info: None,
                region: "Nairobi".to_string(),
                city: "Westlands".to_string(),
                is_default: true,
            }],
            ..Self::default()
        }
    }

    fn product(&self, id: i64) -> Option<&Product> {
        self.products.iter().find(|p| p.id.as_i64() == id)
    }

    fn product_mut(&mut self, id: i64) -> Option<&mut Product> {
        self.products.iter_mut().find(|p| p.id.as_i64() == id)
    }

    /// Ids for records created through the API.
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        FIRST_CREATED_ID + self.next_id
    }

    fn user_by_email(&self, email: &str) -> Option<&MockUser> {
        self.users.iter().find(|u| u.email == email)
    }

    fn order_json(&self, order: &MockOrder) -> Value {
        let details: Vec<Value> = order
            .lines
            .iter()
            .enumerate()
            .map(|(index, (product_id, quantity, line_total))| {
                json!({
                    "order_detail_id": index + 1,
                    "product_id": product_id,
                    "quantity": quantity,
                    "total_price": line_total,
                    "product": self.product(product_id.as_i64()),
                })
            })
            .collect();
        let address = order
            .address_id
            .and_then(|id| self.addresses.iter().find(|a| a.id == id));
        json!({
            "order_id": order.order_id,
            "total": order.total,
            "datetime": ORDER_DATETIME,
            "status": order.status,
            "user_id": order.user_id,
            "delivery_fee": order.delivery_fee,
            "completed_at": null,
            "order_details": details,
            "address": address,
        })
    }
}

fn category(id: i64, name: &str) -> Category {
    Category {
        id: CategoryId::new(id),
        name: name.to_string(),
        title: None,
        subtitle: None,
        description: None,
        features: Vec::new(),
    }
}

fn banner(id: i64, title: &str, active: bool) -> Banner {
    Banner {
        id: BannerId::new(id),
        image_url: format!("/uploads/banner-{id}.png"),
        title: Some(title.to_string()),
        subtitle: None,
        active,
        kind: BannerKind::Homepage,
        category_id: None,
        button_text: Some("Shop now".to_string()),
        created_at: None,
    }
}

fn product(id: i64, name: &str, shillings: i64, stock: u32, category_id: CategoryId) -> Product {
    Product {
        id: ProductId::new(id),
        name: name.to_string(),
        cost: Price::from_shillings(shillings / 2),
        price: Price::from_shillings(shillings),
        original_price: None,
        stock_quantity: stock,
        barcode: 600_000 + id,
        category_id: Some(category_id),
        subcategory_id: None,
        brand: None,
        description: Some(format!("{name} made in Kenya")),
        discount: Decimal::ZERO,
        is_new: false,
        created_at: None,
        category: None,
        subcategory: None,
        images: Vec::new(),
        product_specifications: Vec::new(),
        favorites: Vec::new(),
        reviews: Vec::new(),
    }
}

type Shared = Arc<Mutex<MockState>>;

/// A running mock API.
#[derive(Clone)]
pub struct MockApi {
    state: Shared,
    root: String,
    base_url: String,
}

impl MockApi {
    /// Start with [`MockState::seeded`].
    pub async fn start() -> Self {
        Self::start_with(MockState::seeded()).await
    }

    /// Start serving `state` on a random local port.
    pub async fn start_with(state: MockState) -> Self {
        let state = Arc::new(Mutex::new(state));
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock API");
        let addr = listener.local_addr().expect("Failed to read mock API address");

        let app = Router::new()
            .nest("/api", routes())
            .route("/openai/v1/chat/completions", post(chat_completion))
            .with_state(state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            state,
            root: format!("http://{addr}"),
            base_url: format!("http://{addr}/api"),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Base URL of the chat completion endpoint.
    #[must_use]
    pub fn assistant_url(&self) -> String {
        format!("{}/openai", self.root)
    }

    /// A URL on this server where nothing is served.
    #[must_use]
    pub fn missing_url(&self) -> String {
        format!("{}/nothing-here", self.root)
    }

    /// Client settings pointing at this mock.
    #[must_use]
    pub fn config(&self) -> ApiConfig {
        ApiConfig::new(&self.base_url).expect("Mock API URL is valid")
    }

    /// Inspect or change what the mock holds.
    pub async fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().await
    }

    /// Make the order's transaction report `statuses` on successive lookups.
    pub async fn script_transaction(&self, order_id: i64, statuses: &[i64]) {
        self.state
            .lock()
            .await
            .transactions
            .insert(order_id, statuses.iter().copied().collect());
    }

    /// Record an order directly, as if the customer had placed it.
    pub async fn insert_order(&self, user_id: i64, product_id: i64, quantity: u32) -> i64 {
        let mut state = self.state.lock().await;
        let price = state
            .product(product_id)
            .map(|p| p.price)
            .expect("Unknown product in test order");
        let order_id = FIRST_ORDER_ID + i64::try_from(state.orders.len()).unwrap_or_default();
        let line_total = price.times(quantity);
        state.orders.push(MockOrder {
            order_id,
            user_id,
            lines: vec![(ProductId::new(product_id), quantity, line_total)],
            delivery_fee: Price::ZERO,
            total: line_total,
            address_id: None,
            status: "pending".to_string(),
        });
        order_id
    }

    /// Record an order and mark it delivered.
    pub async fn insert_delivered_order(&self, user_id: i64, product_id: i64) -> i64 {
        let order_id = self.insert_order(user_id, product_id, 1).await;
        if let Some(order) = self
            .state
            .lock()
            .await
            .orders
            .iter_mut()
            .find(|o| o.order_id == order_id)
        {
            order.status = "delivered".to_string();
        }
        order_id
    }
}

fn routes() -> Router<Shared> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register/customer", post(register_customer))
        .route("/auth/verify-email", post(verify_email))
        .route("/auth/resend-verification", post(resend_verification))
        .route("/auth/request-password-reset", post(request_password_reset))
        .route("/auth/reset-password", post(reset_password))
        .route("/auth/superadmin/create-admin", post(create_admin))
        .route("/auth/superadmin/users/{id}", delete(delete_user))
        .route("/superadmin/users", get(list_users))
        .route("/superadmin/stats", get(user_stats))
        .route("/me", get(me))
        .route("/public/products", get(list_products))
        .route("/public/products/{id}", get(get_product))
        .route("/public/categories", get(list_categories))
        .route("/public/subcategories", get(list_subcategories))
        .route("/public/banners", get(public_banners))
        .route("/products", post(create_product))
        .route("/update-product/{id}", put(update_product))
        .route("/delete-product/{id}", delete(delete_product))
        .route("/upload-image", post(upload_image))
        .route("/products/{id}/images", get(product_images).post(add_product_image))
        .route("/products/{id}/images/{image_id}", delete(delete_product_image))
        .route("/products/{id}/specifications", post(add_product_specification))
        .route("/categories", post(create_category))
        .route("/categories/{id}", put(update_category).delete(delete_category))
        .route("/subcategories", post(create_subcategory))
        .route("/subcategories/{id}", put(update_subcategory).delete(delete_subcategory))
        .route(
            "/subcategories/{id}/specifications",
            get(list_specifications).post(create_specification),
        )
        .route(
            "/subcategories/{id}/specifications/{spec_id}",
            put(update_specification).delete(delete_specification),
        )
        .route("/addresses", get(list_addresses).post(create_address))
        .route("/addresses/{id}", put(update_address).delete(delete_address))
        .route("/favorites", get(list_favorites).post(add_favorite))
        .route("/favorites/{id}", delete(remove_favorite))
        .route("/reviews", post(create_review))
        .route("/reviews/{id}", put(update_review).delete(delete_review))
        .route("/my-reviews", get(my_reviews))
        .route("/admin/recalculate-product-ratings", post(recalculate_ratings))
        .route("/banners", get(list_banners).post(create_banner))
        .route("/banners/{id}", put(update_banner).delete(delete_banner))
        .route("/banners/{id}/remove-image", patch(remove_banner_image))
        .route("/newsletter/subscribe", post(subscribe_newsletter))
        .route("/create_order", post(create_order))
        .route("/orders", get(my_orders))
        .route("/orders/{id}", get(get_order))
        .route("/admin/orders", get(all_orders))
        .route("/update-order-status/{id}", put(update_order_status))
        .route("/auth/cancel-order/{id}", post(cancel_order))
        .route("/payments/lnmo/transact", post(stk_push))
        .route("/payments/transactions", post(transaction_for_order))
}

// =============================================================================
// Helpers
// =============================================================================

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

fn ack(message: &str) -> Response {
    Json(json!({ "message": message })).into_response()
}

async fn caller(state: &Shared, headers: &HeaderMap) -> Result<MockUser, Response> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| detail(StatusCode::UNAUTHORIZED, "Not authenticated"))?;
    if token == EXPIRED_TOKEN {
        return Err(detail(StatusCode::UNAUTHORIZED, "Token has expired"));
    }
    state
        .lock()
        .await
        .users
        .iter()
        .find(|u| u.token() == token)
        .cloned()
        .ok_or_else(|| detail(StatusCode::UNAUTHORIZED, "Could not validate credentials"))
}

async fn staff(state: &Shared, headers: &HeaderMap) -> Result<MockUser, Response> {
    let user = caller(state, headers).await?;
    if user.is_admin() {
        Ok(user)
    } else {
        Err(detail(StatusCode::FORBIDDEN, "Admin access required"))
    }
}

async fn superadmin(state: &Shared, headers: &HeaderMap) -> Result<MockUser, Response> {
    let user = caller(state, headers).await?;
    if user.is_super_admin() {
        Ok(user)
    } else {
        Err(detail(
            StatusCode::FORBIDDEN,
            "Only superadmins can access this resource",
        ))
    }
}

fn text(body: &Value, key: &str) -> Option<String> {
    body[key]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn page_of<T>(items: Vec<T>, page: u32, limit: u32) -> Paginated<T> {
    let total = items.len();
    let limit = limit.max(1);
    let skip = usize::try_from(page.saturating_sub(1) * limit).unwrap_or(usize::MAX);
    let items: Vec<T> = items
        .into_iter()
        .skip(skip)
        .take(usize::try_from(limit).unwrap_or(usize::MAX))
        .collect();
    let pages = u32::try_from(total.div_ceil(limit as usize)).unwrap_or(u32::MAX);
    Paginated {
        items,
        total: total as u64,
        page,
        limit,
        pages,
    }
}

fn query_u32(query: &HashMap<String, String>, key: &str) -> Option<u32> {
    query.get(key).and_then(|v| v.parse().ok())
}

// =============================================================================
// Auth
// =============================================================================

fn session_json(user: &MockUser) -> Value {
    json!({
        "access_token": user.token(),
        "token_type": "bearer",
        "user_role": user.role,
        "username": user.username,
    })
}

async fn login(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    let state = state.lock().await;
    match state.user_by_email(email) {
        Some(user) if password == user.password => {
            if user.role == "customer" && !user.verified {
                return detail(StatusCode::UNAUTHORIZED, UNVERIFIED_DETAIL);
            }
            Json(session_json(user)).into_response()
        }
        _ => detail(StatusCode::UNAUTHORIZED, "Incorrect email or password"),
    }
}

fn add_user(state: &mut MockState, body: &Value, role: &str) -> Result<i64, Response> {
    let (Some(username), Some(email), Some(password)) =
        (text(body, "username"), text(body, "email"), text(body, "password"))
    else {
        return Err(detail(StatusCode::UNPROCESSABLE_ENTITY, "field required"));
    };
    if state
        .users
        .iter()
        .any(|u| u.username == username || u.email == email)
    {
        return Err(detail(StatusCode::BAD_REQUEST, "Username or email already exists"));
    }
    let id = state.next_id();
    state.users.push(MockUser {
        id,
        username,
        email,
        role: role.to_string(),
        password,
        verified: role != "customer",
    });
    Ok(id)
}

async fn register_customer(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut state = state.lock().await;
    match add_user(&mut state, &body, "customer") {
        Ok(id) => {
            state.verification_emails.push(id);
            (
                StatusCode::CREATED,
                Json(json!({ "message": "Customer created successfully", "user_id": id })),
            )
                .into_response()
        }
        Err(rejection) => rejection,
    }
}

fn user_from_link(state: &MockState, token: &str, prefix: &str) -> Option<i64> {
    let id = token.strip_prefix(prefix)?.parse::<i64>().ok()?;
    state.users.iter().any(|u| u.id == id).then_some(id)
}

async fn verify_email(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let token = body["token"].as_str().unwrap_or_default();
    let mut state = state.lock().await;
    let Some(id) = user_from_link(&state, token, "verify-") else {
        return detail(StatusCode::BAD_REQUEST, "Invalid or expired verification token");
    };
    let Some(user) = state.users.iter_mut().find(|u| u.id == id && !u.verified) else {
        return detail(StatusCode::BAD_REQUEST, "Invalid or expired verification token");
    };
    user.verified = true;
    let mut session = session_json(user);
    session["message"] = json!("Email verified successfully");
    Json(session).into_response()
}

async fn resend_verification(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let id = body["user_id"].as_i64().unwrap_or_default();
    let mut state = state.lock().await;
    if !state.users.iter().any(|u| u.id == id && !u.verified) {
        return detail(StatusCode::NOT_FOUND, "User not found or already verified");
    }
    state.verification_emails.push(id);
    ack("Verification email sent successfully")
}

async fn request_password_reset(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default();
    let mut state = state.lock().await;
    if let Some(id) = state.user_by_email(email).map(|u| u.id) {
        state.reset_emails.push(id);
    }
    ack("If the email exists, a reset link has been sent.")
}

async fn reset_password(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let token = body["token"].as_str().unwrap_or_default();
    let Some(password) = text(&body, "new_password") else {
        return detail(StatusCode::UNPROCESSABLE_ENTITY, "field required");
    };
    let mut state = state.lock().await;
    let id = user_from_link(&state, token, "reset-").filter(|id| state.reset_emails.contains(id));
    let Some(user) = id.and_then(|id| state.users.iter_mut().find(|u| u.id == id)) else {
        return detail(StatusCode::BAD_REQUEST, "Invalid or expired reset token.");
    };
    user.password = password;
    ack("Password has been reset successfully.")
}

async fn me(State(state): State<Shared>, headers: HeaderMap) -> Response {
    match caller(&state, &headers).await {
        Ok(user) => Json(json!({
            "id": user.id,
            "username": user.username,
            "email": user.email,
            "role": user.role,
        }))
        .into_response(),
        Err(rejection) => rejection,
    }
}

// =============================================================================
// Catalog
// =============================================================================

async fn list_products(
    State(state): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let mut state = state.lock().await;
    state.product_list_requests += 1;

    let search = query.get("search").map(|s| s.to_lowercase());
    let category_id = query.get("category_id").and_then(|v| v.parse::<i64>().ok());
    let ids: Vec<i64> = query
        .get("ids")
        .map(|raw| raw.split(',').filter_map(|id| id.parse().ok()).collect())
        .unwrap_or_default();

    let matching: Vec<Product> = state
        .products
        .iter()
        .filter(|p| search.as_ref().is_none_or(|s| p.name.to_lowercase().contains(s)))
        .filter(|p| category_id.is_none_or(|id| p.category_id.map(i64::from) == Some(id)))
        .filter(|p| ids.is_empty() || ids.contains(&p.id.as_i64()))
        .cloned()
        .collect();

    let page = query_u32(&query, "page").unwrap_or(1).max(1);
    let limit = query_u32(&query, "limit").unwrap_or(DEFAULT_LIMIT);
    Json(page_of(matching, page, limit)).into_response()
}

async fn get_product(State(state): State<Shared>, Path(id): Path<i64>) -> Response {
    let state = state.lock().await;
    state.product(id).map_or_else(
        || detail(StatusCode::NOT_FOUND, "Product not found"),
        |p| Json(p).into_response(),
    )
}

async fn list_categories(State(state): State<Shared>) -> Response {
    Json(state.lock().await.categories.clone()).into_response()
}

async fn list_subcategories(
    State(state): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let category_id = query.get("category_id").and_then(|v| v.parse::<i64>().ok());
    let state = state.lock().await;
    let subcategories: Vec<&Subcategory> = state
        .subcategories
        .iter()
        .filter(|s| category_id.is_none_or(|id| s.category_id.as_i64() == id))
        .collect();
    Json(subcategories).into_response()
}

async fn list_addresses(State(state): State<Shared>, headers: HeaderMap) -> Response {
    match caller(&state, &headers).await {
        Ok(_) => Json(state.lock().await.addresses.clone()).into_response(),
        Err(rejection) => rejection,
    }
}

// =============================================================================
// Orders
// =============================================================================

async fn create_order(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let user = match caller(&state, &headers).await {
        Ok(user) => user,
        Err(rejection) => return rejection,
    };
    let mut state = state.lock().await;

    let requested: Vec<(i64, u32)> = body["cart"]
        .as_array()
        .map(|lines| {
            lines
                .iter()
                .filter_map(|line| {
                    let id = line["id"].as_i64()?;
                    let quantity = u32::try_from(line["quantity"].as_u64()?).ok()?;
                    Some((id, quantity))
                })
                .collect()
        })
        .unwrap_or_default();
    if requested.is_empty() {
        return detail(StatusCode::BAD_REQUEST, "Cart is empty");
    }

    let mut lines = Vec::new();
    for &(id, quantity) in &requested {
        let Some(product) = state.product(id) else {
            return detail(StatusCode::NOT_FOUND, &format!("Product {id} not found"));
        };
        if product.stock_quantity < quantity {
            return detail(
                StatusCode::BAD_REQUEST,
                &format!("Insufficient stock for {}", product.name),
            );
        }
        lines.push((product.id, quantity, product.price.times(quantity)));
    }
    for &(id, quantity, _) in &lines {
        if let Some(product) = state.products.iter_mut().find(|p| p.id == id) {
            product.stock_quantity -= quantity;
        }
    }

    let delivery_fee = body["delivery_fee"]
        .as_f64()
        .and_then(|fee| Decimal::try_from(fee).ok())
        .map_or(Price::ZERO, Price::new);
    let subtotal: Price = lines.iter().map(|&(_, _, total)| total).sum();
    let order_id = FIRST_ORDER_ID + i64::try_from(state.orders.len()).unwrap_or_default();
    state.orders.push(MockOrder {
        order_id,
        user_id: user.id,
        lines,
        delivery_fee,
        total: subtotal + delivery_fee,
        address_id: body["address_id"].as_i64().map(AddressId::new),
        status: "pending".to_string(),
    });

    Json(json!({ "message": "Order created successfully", "order_id": order_id })).into_response()
}

async fn my_orders(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let user = match caller(&state, &headers).await {
        Ok(user) => user,
        Err(rejection) => return rejection,
    };
    let status = query.get("status");
    let state = state.lock().await;
    let orders: Vec<Value> = state
        .orders
        .iter()
        .filter(|o| o.user_id == user.id)
        .filter(|o| status.is_none_or(|s| &o.status == s))
        .map(|o| state.order_json(o))
        .collect();
    let limit = query_u32(&query, "limit").unwrap_or(DEFAULT_LIMIT).max(1);
    let page = query_u32(&query, "skip").unwrap_or(0) / limit + 1;
    Json(page_of(orders, page, limit)).into_response()
}

async fn get_order(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    let user = match caller(&state, &headers).await {
        Ok(user) => user,
        Err(rejection) => return rejection,
    };
    let state = state.lock().await;
    state
        .orders
        .iter()
        .find(|o| o.order_id == id && (o.user_id == user.id || user.is_admin()))
        .map_or_else(
            || detail(StatusCode::NOT_FOUND, "Order not found"),
            |o| Json(state.order_json(o)).into_response(),
        )
}

async fn all_orders(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Err(rejection) = staff(&state, &headers).await {
        return rejection;
    }
    let state = state.lock().await;
    let status = query.get("status");
    let orders: Vec<Value> = state
        .orders
        .iter()
        .filter(|o| status.is_none_or(|s| &o.status == s))
        .map(|o| {
            let mut value = state.order_json(o);
            let owner = state.users.iter().find(|u| u.id == o.user_id);
            value["user"] = json!({
                "id": o.user_id,
                "username": owner.map_or("unknown", |u| u.username.as_str()),
                "email": owner.map_or("unknown@example.com", |u| u.email.as_str()),
            });
            value
        })
        .collect();
    let limit = query_u32(&query, "limit").unwrap_or(DEFAULT_LIMIT).max(1);
    let page = query_u32(&query, "skip").unwrap_or(0) / limit + 1;
    Json(page_of(orders, page, limit)).into_response()
}

async fn update_order_status(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    let user = match caller(&state, &headers).await {
        Ok(user) => user,
        Err(rejection) => return rejection,
    };
    let Some(status) = body["status"]
        .as_str()
        .filter(|s| ["pending", "processing", "delivered", "cancelled"].contains(s))
    else {
        return detail(StatusCode::UNPROCESSABLE_ENTITY, "Invalid status");
    };

    let mut state = state.lock().await;
    let Some(order) = state
        .orders
        .iter_mut()
        .find(|o| o.order_id == id && (o.user_id == user.id || user.is_admin()))
    else {
        return detail(StatusCode::NOT_FOUND, "Order not found");
    };
    order.status = status.to_string();
    state.status_updates.push((id, status.to_string()));
    Json(json!({ "message": "Order status updated" })).into_response()
}

async fn cancel_order(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    let user = match caller(&state, &headers).await {
        Ok(user) => user,
        Err(rejection) => return rejection,
    };
    let mut state = state.lock().await;
    if !state.orders.iter().any(|o| o.order_id == id && o.user_id == user.id) {
        return detail(StatusCode::NOT_FOUND, "Order not found");
    }
    state.cancellation_requests.push(id);
    Json(json!({ "message": "Cancellation request sent" })).into_response()
}

// =============================================================================
// Payments
// =============================================================================

async fn stk_push(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Err(rejection) = caller(&state, &headers).await {
        return rejection;
    }
    let mut state = state.lock().await;
    let Some(order_id) = body["order_id"].as_i64() else {
        return detail(StatusCode::UNPROCESSABLE_ENTITY, "order_id is required");
    };
    if !state.orders.iter().any(|o| o.order_id == order_id) {
        return detail(StatusCode::NOT_FOUND, "Order not found");
    }
    state.transactions.entry(order_id).or_insert_with(|| VecDeque::from([0]));
    state.stk_pushes.push(body);

    Json(json!({
        "status": "success",
        "message": "STK push sent",
        "data": {
            "CheckoutRequestID": format!("ws_CO_{order_id}"),
            "CustomerMessage": "Success. Request accepted for processing",
        },
    }))
    .into_response()
}

async fn transaction_for_order(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejection) = caller(&state, &headers).await {
        return rejection;
    }
    let (delay, rejected) = {
        let mut state = state.lock().await;
        state.transaction_lookups += 1;
        (state.transaction_delay, state.reject_transaction_lookups)
    };
    if rejected {
        return detail(StatusCode::UNAUTHORIZED, "Token has expired");
    }
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    let mut state = state.lock().await;

    let Some(order_id) = body["order_id"].as_str().and_then(|id| id.parse::<i64>().ok()) else {
        return detail(StatusCode::UNPROCESSABLE_ENTITY, "order_id must be a string");
    };
    let amount = state
        .orders
        .iter()
        .find(|o| o.order_id == order_id)
        .map_or(Price::ZERO, |o| o.total);
    let Some(queue) = state.transactions.get_mut(&order_id) else {
        return detail(StatusCode::NOT_FOUND, "Transaction not found");
    };
    let status = if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().copied()
    };
    let Some(status) = status else {
        return detail(StatusCode::NOT_FOUND, "Transaction not found");
    };

    Json(json!({
        "transaction": {
            "id": order_id,
            "order_id": order_id,
            "amount": amount,
            "status": status,
            "transaction_code": (status == 4).then_some(RECEIPT),
            "transaction_id": format!("ws_CO_{order_id}"),
            "phone_number": "254712345678",
        }
    }))
    .into_response()
}

// =============================================================================
// Admin catalog
// =============================================================================

/// Build a product from a create or update body.
fn product_from_body(id: i64, body: &Value) -> Result<Product, Response> {
    let mut value = body.clone();
    value["id"] = json!(id);
    value["images"] = json!([]);
    value["product_specifications"] = json!([]);
    serde_json::from_value(value)
        .map_err(|e| detail(StatusCode::UNPROCESSABLE_ENTITY, &e.to_string()))
}

async fn create_product(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejection) = staff(&state, &headers).await {
        return rejection;
    }
    let mut state = state.lock().await;
    let id = state.next_id();
    let mut product = match product_from_body(id, &body) {
        Ok(product) => product,
        Err(rejection) => return rejection,
    };
    for image in body["images"].as_array().into_iter().flatten() {
        let image_id = state.next_id();
        product.images.push(ProductImage {
            id: ImageId::new(image_id),
            img_url: image["img_url"].as_str().unwrap_or_default().to_string(),
        });
    }
    for spec in body["specifications"].as_array().into_iter().flatten() {
        let spec_id = spec["specification_id"].as_i64().unwrap_or_default();
        let value = spec["value"].as_str().unwrap_or_default();
        let value_id = state.next_id();
        let definition = state
            .specifications
            .iter()
            .find(|s| s.id.as_i64() == spec_id)
            .cloned();
        product.product_specifications.push(ProductSpecification {
            id: ProductSpecificationId::new(value_id),
            product_id: product.id,
            specification_id: SpecificationId::new(spec_id),
            value: value.to_string(),
            specification: definition,
        });
    }
    state.products.push(product);
    (
        StatusCode::CREATED,
        Json(json!({ "message": "Product created successfully", "product_id": id })),
    )
        .into_response()
}

async fn update_product(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejection) = staff(&state, &headers).await {
        return rejection;
    }
    let mut state = state.lock().await;
    let Some(existing) = state.product_mut(id) else {
        return detail(StatusCode::NOT_FOUND, "Product not found");
    };
    let mut updated = match product_from_body(id, &body) {
        Ok(product) => product,
        Err(rejection) => return rejection,
    };
    updated.images = std::mem::take(&mut existing.images);
    updated.product_specifications = std::mem::take(&mut existing.product_specifications);
    updated.reviews = std::mem::take(&mut existing.reviews);
    *existing = updated;
    ack("Product updated successfully")
}

async fn delete_product(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    if let Err(rejection) = staff(&state, &headers).await {
        return rejection;
    }
    let mut state = state.lock().await;
    if state
        .orders
        .iter()
        .any(|o| o.lines.iter().any(|(product, _, _)| product.as_i64() == id))
    {
        return detail(
            StatusCode::BAD_REQUEST,
            "Cannot delete product that is part of existing orders",
        );
    }
    let before = state.products.len();
    state.products.retain(|p| p.id.as_i64() != id);
    if state.products.len() == before {
        return detail(StatusCode::NOT_FOUND, "Product not found");
    }
    ack("Product deleted successfully")
}

async fn upload_image(State(state): State<Shared>, headers: HeaderMap, mut multipart: Multipart) -> Response {
    if let Err(rejection) = staff(&state, &headers).await {
        return rejection;
    }
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        if field.bytes().await.is_err() {
            return detail(StatusCode::BAD_REQUEST, "Could not read the upload");
        }
        state.lock().await.uploads.push(file_name.clone());
        return Json(json!({
            "message": "Image uploaded successfully",
            "img_url": format!("/uploads/{file_name}"),
        }))
        .into_response();
    }
    detail(StatusCode::UNPROCESSABLE_ENTITY, "file is required")
}

async fn product_images(State(state): State<Shared>, Path(id): Path<i64>) -> Response {
    let state = state.lock().await;
    state.product(id).map_or_else(
        || detail(StatusCode::NOT_FOUND, "Product not found"),
        |p| Json(&p.images).into_response(),
    )
}

async fn add_product_image(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejection) = staff(&state, &headers).await {
        return rejection;
    }
    let Some(img_url) = text(&body, "img_url") else {
        return detail(StatusCode::UNPROCESSABLE_ENTITY, "img_url is required");
    };
    let mut state = state.lock().await;
    let image_id = state.next_id();
    let Some(product) = state.product_mut(id) else {
        return detail(StatusCode::NOT_FOUND, "Product not found");
    };
    let image = ProductImage {
        id: ImageId::new(image_id),
        img_url,
    };
    product.images.push(image.clone());
    Json(image).into_response()
}

async fn delete_product_image(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path((id, image_id)): Path<(i64, i64)>,
) -> Response {
    if let Err(rejection) = staff(&state, &headers).await {
        return rejection;
    }
    let mut state = state.lock().await;
    let Some(product) = state.product_mut(id) else {
        return detail(StatusCode::NOT_FOUND, "Product not found");
    };
    let before = product.images.len();
    product.images.retain(|i| i.id.as_i64() != image_id);
    if product.images.len() == before {
        return detail(StatusCode::NOT_FOUND, "Image not found");
    }
    ack("Image deleted successfully")
}

async fn add_product_specification(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejection) = staff(&state, &headers).await {
        return rejection;
    }
    let mut state = state.lock().await;
    if state.reject_spec_values {
        return detail(
            StatusCode::BAD_REQUEST,
            "Specification does not belong to this product's subcategory",
        );
    }
    let spec_id = body["specification_id"].as_i64().unwrap_or_default();
    let Some(definition) = state
        .specifications
        .iter()
        .find(|s| s.id.as_i64() == spec_id)
        .cloned()
    else {
        return detail(StatusCode::NOT_FOUND, "Specification not found");
    };
    let value_id = state.next_id();
    let Some(product) = state.product_mut(id) else {
        return detail(StatusCode::NOT_FOUND, "Product not found");
    };
    let value = ProductSpecification {
        id: ProductSpecificationId::new(value_id),
        product_id: product.id,
        specification_id: definition.id,
        value: body["value"].as_str().unwrap_or_default().to_string(),
        specification: Some(definition),
    };
    product
        .product_specifications
        .retain(|s| s.specification_id != value.specification_id);
    product.product_specifications.push(value.clone());
    Json(value).into_response()
}

// =============================================================================
// Categories and specifications
// =============================================================================

fn category_from_body(id: i64, body: &Value) -> Category {
    Category {
        id: CategoryId::new(id),
        name: text(body, "name").unwrap_or_default(),
        title: text(body, "title"),
        subtitle: text(body, "subtitle"),
        description: text(body, "description"),
        features: body["features"]
            .as_array()
            .map(|f| f.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default(),
    }
}

async fn create_category(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Err(rejection) = staff(&state, &headers).await {
        return rejection;
    }
    let mut state = state.lock().await;
    let id = state.next_id();
    let category = category_from_body(id, &body);
    if state.categories.iter().any(|c| c.name.eq_ignore_ascii_case(&category.name)) {
        return detail(StatusCode::BAD_REQUEST, "Category already exists");
    }
    state.categories.push(category.clone());
    (StatusCode::CREATED, Json(category)).into_response()
}

async fn update_category(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejection) = staff(&state, &headers).await {
        return rejection;
    }
    let mut state = state.lock().await;
    let Some(category) = state.categories.iter_mut().find(|c| c.id.as_i64() == id) else {
        return detail(StatusCode::NOT_FOUND, "Category not found");
    };
    *category = category_from_body(id, &body);
    Json(category.clone()).into_response()
}

async fn delete_category(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    if let Err(rejection) = staff(&state, &headers).await {
        return rejection;
    }
    let mut state = state.lock().await;
    if state.products.iter().any(|p| p.category_id.map(i64::from) == Some(id)) {
        return detail(StatusCode::BAD_REQUEST, "Cannot delete category with products");
    }
    let before = state.categories.len();
    state.categories.retain(|c| c.id.as_i64() != id);
    if state.categories.len() == before {
        return detail(StatusCode::NOT_FOUND, "Category not found");
    }
    ack("Category deleted successfully")
}

fn subcategory_from_body(state: &MockState, id: i64, body: &Value) -> Result<Subcategory, Response> {
    let category_id = body["category_id"].as_i64().unwrap_or_default();
    if !state.categories.iter().any(|c| c.id.as_i64() == category_id) {
        return Err(detail(StatusCode::NOT_FOUND, "Category not found"));
    }
    Ok(Subcategory {
        id: SubcategoryId::new(id),
        name: text(body, "name").unwrap_or_default(),
        description: text(body, "description"),
        category_id: CategoryId::new(category_id),
    })
}

async fn create_subcategory(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Err(rejection) = staff(&state, &headers).await {
        return rejection;
    }
    let mut state = state.lock().await;
    let id = state.next_id();
    match subcategory_from_body(&state, id, &body) {
        Ok(subcategory) => {
            state.subcategories.push(subcategory.clone());
            (StatusCode::CREATED, Json(subcategory)).into_response()
        }
        Err(rejection) => rejection,
    }
}

async fn update_subcategory(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejection) = staff(&state, &headers).await {
        return rejection;
    }
    let mut state = state.lock().await;
    let updated = match subcategory_from_body(&state, id, &body) {
        Ok(subcategory) => subcategory,
        Err(rejection) => return rejection,
    };
    let Some(subcategory) = state.subcategories.iter_mut().find(|s| s.id.as_i64() == id) else {
        return detail(StatusCode::NOT_FOUND, "Subcategory not found");
    };
    *subcategory = updated.clone();
    Json(updated).into_response()
}

async fn delete_subcategory(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    if let Err(rejection) = staff(&state, &headers).await {
        return rejection;
    }
    let mut state = state.lock().await;
    let before = state.subcategories.len();
    state.subcategories.retain(|s| s.id.as_i64() != id);
    if state.subcategories.len() == before {
        return detail(StatusCode::NOT_FOUND, "Subcategory not found");
    }
    ack("Subcategory deleted successfully")
}

async fn list_specifications(State(state): State<Shared>, Path(id): Path<i64>) -> Response {
    let state = state.lock().await;
    let specifications: Vec<&Specification> = state
        .specifications
        .iter()
        .filter(|s| s.subcategory_id.map(i64::from) == Some(id))
        .collect();
    Json(specifications).into_response()
}

async fn create_specification(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejection) = staff(&state, &headers).await {
        return rejection;
    }
    let mut state = state.lock().await;
    if !state.subcategories.iter().any(|s| s.id.as_i64() == id) {
        return detail(StatusCode::NOT_FOUND, "Subcategory not found");
    }
    let spec_id = state.next_id();
    let specification = Specification {
        id: SpecificationId::new(spec_id),
        name: text(&body, "name").unwrap_or_default(),
        value_type: text(&body, "value_type").unwrap_or_default(),
        subcategory_id: Some(SubcategoryId::new(id)),
    };
    state.specifications.push(specification.clone());
    (StatusCode::CREATED, Json(specification)).into_response()
}

async fn update_specification(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path((id, spec_id)): Path<(i64, i64)>,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejection) = staff(&state, &headers).await {
        return rejection;
    }
    let mut state = state.lock().await;
    let Some(specification) = state
        .specifications
        .iter_mut()
        .find(|s| s.id.as_i64() == spec_id && s.subcategory_id.map(i64::from) == Some(id))
    else {
        return detail(StatusCode::NOT_FOUND, "Specification not found");
    };
    specification.name = text(&body, "name").unwrap_or_default();
    specification.value_type = text(&body, "value_type").unwrap_or_default();
    Json(specification.clone()).into_response()
}

async fn delete_specification(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path((id, spec_id)): Path<(i64, i64)>,
) -> Response {
    if let Err(rejection) = staff(&state, &headers).await {
        return rejection;
    }
    let mut state = state.lock().await;
    let before = state.specifications.len();
    state
        .specifications
        .retain(|s| !(s.id.as_i64() == spec_id && s.subcategory_id.map(i64::from) == Some(id)));
    if state.specifications.len() == before {
        return detail(StatusCode::NOT_FOUND, "Specification not found");
    }
    ack("Specification deleted successfully")
}

// =============================================================================
// Addresses and favorites
// =============================================================================

fn address_from_body(id: i64, body: &Value) -> Result<Address, Response> {
    let mut value = body.clone();
    value["id"] = json!(id);
    serde_json::from_value(value)
        .map_err(|e| detail(StatusCode::UNPROCESSABLE_ENTITY, &e.to_string()))
}

fn store_address(state: &mut MockState, address: Address) {
    if address.is_default {
        for other in &mut state.addresses {
            other.is_default = false;
        }
    }
    match state.addresses.iter_mut().find(|a| a.id == address.id) {
        Some(existing) => *existing = address,
        None => state.addresses.push(address),
    }
}

async fn create_address(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Err(rejection) = caller(&state, &headers).await {
        return rejection;
    }
    let mut state = state.lock().await;
    let id = state.next_id();
    match address_from_body(id, &body) {
        Ok(address) => {
            store_address(&mut state, address.clone());
            (StatusCode::CREATED, Json(address)).into_response()
        }
        Err(rejection) => rejection,
    }
}

async fn update_address(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejection) = caller(&state, &headers).await {
        return rejection;
    }
    let mut state = state.lock().await;
    if !state.addresses.iter().any(|a| a.id.as_i64() == id) {
        return detail(StatusCode::NOT_FOUND, "Address not found");
    }
    match address_from_body(id, &body) {
        Ok(address) => {
            store_address(&mut state, address.clone());
            Json(address).into_response()
        }
        Err(rejection) => rejection,
    }
}

async fn delete_address(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    if let Err(rejection) = caller(&state, &headers).await {
        return rejection;
    }
    let mut state = state.lock().await;
    let before = state.addresses.len();
    state.addresses.retain(|a| a.id.as_i64() != id);
    if state.addresses.len() == before {
        return detail(StatusCode::NOT_FOUND, "Address not found");
    }
    ack("Address deleted successfully")
}

async fn list_favorites(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let user = match caller(&state, &headers).await {
        Ok(user) => user,
        Err(rejection) => return rejection,
    };
    let state = state.lock().await;
    let favorites: Vec<&Favorite> = state
        .favorites
        .iter()
        .filter(|f| f.user_id.as_i64() == user.id)
        .collect();
    Json(favorites).into_response()
}

async fn add_favorite(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let user = match caller(&state, &headers).await {
        Ok(user) => user,
        Err(rejection) => return rejection,
    };
    let product_id = body["product_id"].as_i64().unwrap_or_default();
    let mut state = state.lock().await;
    if state.product(product_id).is_none() {
        return detail(StatusCode::NOT_FOUND, "Product not found");
    }
    if state
        .favorites
        .iter()
        .any(|f| f.user_id.as_i64() == user.id && f.product_id.as_i64() == product_id)
    {
        return detail(StatusCode::BAD_REQUEST, "Product already in favorites");
    }
    let id = state.next_id();
    let favorite = Favorite {
        id: FavoriteId::new(id),
        user_id: UserId::new(user.id),
        product_id: ProductId::new(product_id),
    };
    state.favorites.push(favorite.clone());
    (StatusCode::CREATED, Json(favorite)).into_response()
}

async fn remove_favorite(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    let user = match caller(&state, &headers).await {
        Ok(user) => user,
        Err(rejection) => return rejection,
    };
    let mut state = state.lock().await;
    let before = state.favorites.len();
    state
        .favorites
        .retain(|f| !(f.id.as_i64() == id && f.user_id.as_i64() == user.id));
    if state.favorites.len() == before {
        return detail(StatusCode::NOT_FOUND, "Favorite not found");
    }
    ack("Favorite removed")
}

// =============================================================================
// Reviews
// =============================================================================

fn all_reviews(state: &MockState) -> impl Iterator<Item = &Review> {
    state.products.iter().flat_map(|p| p.reviews.iter())
}

fn rating_of(body: &Value) -> Result<i32, Response> {
    body["rating"]
        .as_i64()
        .filter(|r| (1..=5).contains(r))
        .and_then(|r| i32::try_from(r).ok())
        .ok_or_else(|| detail(StatusCode::BAD_REQUEST, "Rating must be between 1 and 5"))
}

async fn create_review(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let user = match caller(&state, &headers).await {
        Ok(user) => user,
        Err(rejection) => return rejection,
    };
    let rating = match rating_of(&body) {
        Ok(rating) => rating,
        Err(rejection) => return rejection,
    };
    let product_id = body["product_id"].as_i64().unwrap_or_default();
    let order_id = body["order_id"].as_i64().unwrap_or_default();
    let mut state = state.lock().await;

    let delivered = state.orders.iter().any(|o| {
        o.order_id == order_id
            && o.user_id == user.id
            && o.status == "delivered"
            && o.lines.iter().any(|(p, _, _)| p.as_i64() == product_id)
    });
    if !delivered {
        return detail(
            StatusCode::BAD_REQUEST,
            "You can only review products from delivered orders",
        );
    }
    if all_reviews(&state).any(|r| {
        r.user_id.as_i64() == user.id
            && r.product_id.as_i64() == product_id
            && r.order_id.map(i64::from) == Some(order_id)
    }) {
        return detail(
            StatusCode::BAD_REQUEST,
            "You have already reviewed this product for this order",
        );
    }

    let id = state.next_id();
    let review = Review {
        id: ReviewId::new(id),
        user_id: UserId::new(user.id),
        product_id: ProductId::new(product_id),
        order_id: Some(OrderId::new(order_id)),
        rating,
        comment: text(&body, "comment"),
        username: Some(user.username.clone()),
        created_at: None,
    };
    if let Some(product) = state.product_mut(product_id) {
        product.reviews.push(review.clone());
    }
    (StatusCode::CREATED, Json(review)).into_response()
}

fn own_review<'a>(state: &'a mut MockState, user: &MockUser, id: i64) -> Option<&'a mut Review> {
    state
        .products
        .iter_mut()
        .flat_map(|p| p.reviews.iter_mut())
        .find(|r| r.id.as_i64() == id && r.user_id.as_i64() == user.id)
}

async fn update_review(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    let user = match caller(&state, &headers).await {
        Ok(user) => user,
        Err(rejection) => return rejection,
    };
    let rating = match rating_of(&body) {
        Ok(rating) => rating,
        Err(rejection) => return rejection,
    };
    let mut state = state.lock().await;
    let Some(review) = own_review(&mut state, &user, id) else {
        return detail(StatusCode::NOT_FOUND, "Review not found");
    };
    review.rating = rating;
    review.comment = text(&body, "comment");
    Json(review.clone()).into_response()
}

async fn delete_review(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    let user = match caller(&state, &headers).await {
        Ok(user) => user,
        Err(rejection) => return rejection,
    };
    let mut state = state.lock().await;
    if own_review(&mut state, &user, id).is_none() {
        return detail(StatusCode::NOT_FOUND, "Review not found");
    }
    for product in &mut state.products {
        product.reviews.retain(|r| r.id.as_i64() != id);
    }
    ack("Review deleted successfully")
}

async fn my_reviews(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let user = match caller(&state, &headers).await {
        Ok(user) => user,
        Err(rejection) => return rejection,
    };
    let state = state.lock().await;
    let mut reviews: Vec<&Review> = all_reviews(&state)
        .filter(|r| r.user_id.as_i64() == user.id)
        .collect();
    reviews.sort_by_key(|r| std::cmp::Reverse(r.id));
    Json(reviews).into_response()
}

async fn recalculate_ratings(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(rejection) = staff(&state, &headers).await {
        return rejection;
    }
    let mut state = state.lock().await;
    state.rating_recalculations += 1;
    let updated = state.products.iter().filter(|p| !p.reviews.is_empty()).count();
    Json(json!({
        "message": "Product ratings recalculated successfully",
        "products_updated": updated,
        "total_products": state.products.len(),
    }))
    .into_response()
}

// =============================================================================
// Banners
// =============================================================================

fn banner_from_body(id: i64, body: &Value) -> Result<Banner, Response> {
    let mut value = body.clone();
    value["id"] = json!(id);
    let banner: Banner = serde_json::from_value(value)
        .map_err(|e| detail(StatusCode::UNPROCESSABLE_ENTITY, &e.to_string()))?;
    if banner.image_url.trim().is_empty() {
        return Err(detail(StatusCode::UNPROCESSABLE_ENTITY, "image_url is required"));
    }
    Ok(banner)
}

async fn public_banners(
    State(state): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let kind = query.get("type").and_then(|t| t.parse::<BannerKind>().ok());
    let category_id = query.get("category_id").and_then(|v| v.parse::<i64>().ok());
    let state = state.lock().await;
    let banners: Vec<&Banner> = state
        .banners
        .iter()
        .rev()
        .filter(|b| b.active)
        .filter(|b| kind.is_none_or(|k| b.kind == k))
        .filter(|b| category_id.is_none_or(|id| b.category_id.map(i64::from) == Some(id)))
        .collect();
    Json(banners).into_response()
}

async fn list_banners(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(rejection) = staff(&state, &headers).await {
        return rejection;
    }
    let state = state.lock().await;
    let banners: Vec<&Banner> = state.banners.iter().rev().collect();
    Json(banners).into_response()
}

async fn create_banner(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Err(rejection) = staff(&state, &headers).await {
        return rejection;
    }
    let mut state = state.lock().await;
    let id = state.next_id();
    match banner_from_body(id, &body) {
        Ok(banner) => {
            state.banners.push(banner.clone());
            (StatusCode::CREATED, Json(banner)).into_response()
        }
        Err(rejection) => rejection,
    }
}

async fn update_banner(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejection) = staff(&state, &headers).await {
        return rejection;
    }
    let updated = match banner_from_body(id, &body) {
        Ok(banner) => banner,
        Err(rejection) => return rejection,
    };
    let mut state = state.lock().await;
    let Some(banner) = state.banners.iter_mut().find(|b| b.id.as_i64() == id) else {
        return detail(StatusCode::NOT_FOUND, "Banner not found");
    };
    *banner = updated.clone();
    Json(updated).into_response()
}

async fn delete_banner(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    if let Err(rejection) = staff(&state, &headers).await {
        return rejection;
    }
    let mut state = state.lock().await;
    let before = state.banners.len();
    state.banners.retain(|b| b.id.as_i64() != id);
    if state.banners.len() == before {
        return detail(StatusCode::NOT_FOUND, "Banner not found");
    }
    ack("Banner deleted successfully")
}

async fn remove_banner_image(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    if let Err(rejection) = staff(&state, &headers).await {
        return rejection;
    }
    let mut state = state.lock().await;
    let Some(banner) = state.banners.iter_mut().find(|b| b.id.as_i64() == id) else {
        return detail(StatusCode::NOT_FOUND, "Banner not found");
    };
    banner.image_url.clear();
    Json(json!({ "message": "Banner image removed", "banner": id })).into_response()
}

// =============================================================================
// Superadmin
// =============================================================================

async fn list_users(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Err(rejection) = superadmin(&state, &headers).await {
        return rejection;
    }
    let search = query.get("search").map(|s| s.to_lowercase());
    let role = match query.get("role_filter").map(String::as_str) {
        None | Some("all") => None,
        Some("superadmin") => Some("SUPERADMIN"),
        Some("admin") => Some("admin"),
        Some("customer") => Some("customer"),
        Some(_) => return detail(StatusCode::BAD_REQUEST, "Invalid role filter"),
    };
    let state = state.lock().await;
    let users: Vec<Value> = state
        .users
        .iter()
        .filter(|u| role.is_none_or(|r| u.role == r))
        .filter(|u| {
            search.as_ref().is_none_or(|s| {
                u.username.to_lowercase().contains(s) || u.email.to_lowercase().contains(s)
            })
        })
        .map(MockUser::summary)
        .collect();
    let page = query_u32(&query, "page").unwrap_or(1).max(1);
    let limit = query_u32(&query, "limit").unwrap_or(50).min(100);
    Json(page_of(users, page, limit)).into_response()
}

async fn user_stats(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(rejection) = superadmin(&state, &headers).await {
        return rejection;
    }
    let state = state.lock().await;
    let count = |role: &str| state.users.iter().filter(|u| u.role == role).count();
    Json(json!({
        "total_superadmins": count("SUPERADMIN"),
        "total_admins": count("admin"),
        "total_customers": count("customer"),
        "superadmins_this_month": 0,
        "admins_this_month": 0,
        "customers_this_month": 0,
        "total_users": state.users.len(),
    }))
    .into_response()
}

async fn create_admin(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Err(rejection) = superadmin(&state, &headers).await {
        return rejection;
    }
    let mut state = state.lock().await;
    match add_user(&mut state, &body, "admin") {
        Ok(id) => (
            StatusCode::CREATED,
            Json(json!({ "message": "Admin created successfully", "user_id": id })),
        )
            .into_response(),
        Err(rejection) => rejection,
    }
}

async fn delete_user(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    let current = match superadmin(&state, &headers).await {
        Ok(user) => user,
        Err(rejection) => return rejection,
    };
    if current.id == id {
        return detail(StatusCode::BAD_REQUEST, "Cannot delete your own account");
    }
    let mut state = state.lock().await;
    let Some(target) = state.users.iter().find(|u| u.id == id).cloned() else {
        return detail(StatusCode::NOT_FOUND, "User not found");
    };
    if target.is_super_admin() {
        return detail(StatusCode::BAD_REQUEST, "Cannot delete superadmin accounts");
    }
    state.users.retain(|u| u.id != id);
    let role = if target.is_admin() { "Admin" } else { "Customer" };
    ack(&format!("{role} {} deleted successfully", target.username))
}

// =============================================================================
// Newsletter and assistant
// =============================================================================

async fn subscribe_newsletter(
    State(state): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let Some(email) = query.get("email").map(|e| e.trim().to_lowercase()).filter(|e| e.contains('@')) else {
        return detail(StatusCode::UNPROCESSABLE_ENTITY, "value is not a valid email address");
    };
    let mut state = state.lock().await;
    if state.newsletter.contains(&email) {
        return detail(StatusCode::BAD_REQUEST, "Email is already subscribed to the newsletter");
    }
    state.newsletter.push(email.clone());
    (
        StatusCode::CREATED,
        Json(json!({ "message": "Successfully subscribed to newsletter", "email": email })),
    )
        .into_response()
}

async fn chat_completion(Json(body): Json<Value>) -> Response {
    if body["messages"].as_array().is_none_or(Vec::is_empty) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": { "type": "invalid_request_error", "message": "messages is required" } })),
        )
            .into_response();
    }
    Json(json!({
        "id": "chatcmpl-duka",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": ASSISTANT_REPLY },
            "finish_reason": "stop",
        }],
    }))
    .into_response()
}
