//! REST client implementation.
//!
//! Uses `reqwest` 0.13 for HTTP. Public catalog reads are cached with `moka`
//! (5-minute TTL); every admin catalog mutation drops the whole cache.

use std::sync::Arc;
use std::time::Duration;

use duka_core::{
    AddressId, BannerId, CategoryId, FavoriteId, ImageId, OrderId, OrderStatus, ProductId,
    ReviewId, SpecificationId, SubcategoryId, UserId,
};
use moka::future::Cache;
use reqwest::{RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, instrument};

use crate::cache::{CacheKey, CacheValue};
use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::types::{
    AccessToken, Address, AddressInput, Banner, BannerInput, BannerKind, Category, CategoryInput,
    CreateOrderRequest, CreatedOrder, CurrentUser, Favorite, LoginResponse, MessageResponse,
    Order, OrderQuery, OrderWithUser, Paginated, Product, ProductImage, ProductInput, ProductQuery,
    ProductSpecification, RecalculatedRatings, RegisteredUser, Review, ReviewInput, ReviewUpdate,
    Specification, SpecificationInput, SpecificationValue, StkPushRequest, StkPushResponse,
    Subcategory, SubcategoryInput, Transaction, TransactionEnvelope, UploadedImage, UserQuery,
    UserStats, UserSummary, VerifiedEmail,
};

const CACHE_TTL: Duration = Duration::from_secs(300);
const CACHE_CAPACITY: u64 = 1000;

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the Duka REST API.
///
/// Cheap to clone; clones share the connection pool and the catalog cache.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: String,
    cache: Cache<CacheKey, CacheValue>,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built (TLS backend
    /// initialisation failure).
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("duka/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(CACHE_TTL)
            .build();

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.base_url.to_string(),
                cache,
            }),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.inner.base_url, path.trim_start_matches('/'))
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.inner.client.get(self.url(path))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.inner.client.post(self.url(path))
    }

    fn put(&self, path: &str) -> RequestBuilder {
        self.inner.client.put(self.url(path))
    }

    fn delete(&self, path: &str) -> RequestBuilder {
        self.inner.client.delete(self.url(path))
    }

    fn patch(&self, path: &str) -> RequestBuilder {
        self.inner.client.patch(self.url(path))
    }

    /// Send a request and decode the JSON body.
    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        // Read as text first for better error diagnostics
        let body = response.text().await?;

        if !status.is_success() {
            let detail = error_detail(&body);
            if status.is_server_error() {
                tracing::error!(
                    status = %status,
                    body = %body.chars().take(500).collect::<String>(),
                    "API returned server error"
                );
            } else {
                debug!(status = %status, detail = ?detail, "API returned client error");
            }
            return Err(ApiError::from_status(status, detail));
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse API response"
            );
            ApiError::Parse(e)
        })
    }

    /// Send a request whose body is only an acknowledgement.
    async fn execute_ack(&self, request: RequestBuilder) -> Result<(), ApiError> {
        self.execute::<serde_json::Value>(request).await.map(|_| ())
    }

    /// Drop every cached catalog response.
    pub fn invalidate_catalog(&self) {
        self.inner.cache.invalidate_all();
        debug!("Catalog cache invalidated");
    }

    // =========================================================================
    // Auth
    // =========================================================================

    /// Log in with email and password.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] for bad credentials or an
    /// unverified account; the `detail` explains which.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<LoginResponse, ApiError> {
        let body = json!({ "email": email, "password": password.expose_secret() });
        self.execute(self.post("auth/login").json(&body)).await
    }

    /// Register a customer account. The API emails a verification link.
    ///
    /// # Errors
    ///
    /// Returns an error with the API's `detail` (e.g. email already taken).
    #[instrument(skip(self, password))]
    pub async fn register_customer(
        &self,
        username: &str,
        email: &str,
        password: &SecretString,
    ) -> Result<RegisteredUser, ApiError> {
        let body = json!({
            "username": username,
            "email": email,
            "password": password.expose_secret(),
        });
        self.execute(self.post("auth/register/customer").json(&body)).await
    }

    /// Confirm an email address with the token from the emailed link.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid or expired token.
    #[instrument(skip(self, token))]
    pub async fn verify_email(&self, token: &str) -> Result<VerifiedEmail, ApiError> {
        self.execute(self.post("auth/verify-email").json(&json!({ "token": token })))
            .await
    }

    /// Send the verification email again.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] once the account is verified.
    #[instrument(skip(self))]
    pub async fn resend_verification(&self, user_id: UserId) -> Result<MessageResponse, ApiError> {
        self.execute(
            self.post("auth/resend-verification")
                .json(&json!({ "user_id": user_id })),
        )
        .await
    }

    /// Ask for a password reset link. The answer is the same whether or not
    /// the address has an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, email))]
    pub async fn request_password_reset(&self, email: &str) -> Result<MessageResponse, ApiError> {
        self.execute(
            self.post("auth/request-password-reset")
                .json(&json!({ "email": email })),
        )
        .await
    }

    /// Set a new password with the token from the reset link.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid or expired token.
    #[instrument(skip(self, token, new_password))]
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &SecretString,
    ) -> Result<MessageResponse, ApiError> {
        let body = json!({ "token": token, "new_password": new_password.expose_secret() });
        self.execute(self.post("auth/reset-password").json(&body)).await
    }

    /// The user the token belongs to.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] for an invalid or expired token.
    #[instrument(skip(self, token))]
    pub async fn me(&self, token: &AccessToken) -> Result<CurrentUser, ApiError> {
        self.execute(self.get("me").bearer_auth(token.expose())).await
    }

    // =========================================================================
    // Public catalog (cached)
    // =========================================================================

    /// Search and page through products.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_products(&self, query: &ProductQuery) -> Result<Paginated<Product>, ApiError> {
        let key = CacheKey::Products(query.clone());
        if let Some(CacheValue::Products(page)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for products");
            return Ok(page);
        }

        let page: Paginated<Product> = self
            .execute(self.get("public/products").query(&query.to_pairs()))
            .await?;

        self.inner
            .cache
            .insert(key, CacheValue::Products(page.clone()))
            .await;
        Ok(page)
    }

    /// Fetch a batch of products by id, e.g. for the wishlist.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn products_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>, ApiError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = ProductQuery {
            ids: ids.to_vec(),
            ..ProductQuery::default()
        };
        Ok(self.list_products(&query).await?.items)
    }

    /// Get a product by id.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] for an unknown product.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(&self, id: ProductId) -> Result<Product, ApiError> {
        let key = CacheKey::Product(id);
        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        self.refresh_product(id).await
    }

    /// Fetch a product past the cache and store the fresh copy.
    ///
    /// For stock checks, where a cached quantity may be minutes old.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] for an unknown product.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn refresh_product(&self, id: ProductId) -> Result<Product, ApiError> {
        let product: Product = self.execute(self.get(&format!("public/products/{id}"))).await?;

        self.inner
            .cache
            .insert(CacheKey::Product(id), CacheValue::Product(Box::new(product.clone())))
            .await;
        Ok(product)
    }

    /// All categories.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_categories(&self) -> Result<Vec<Category>, ApiError> {
        if let Some(CacheValue::Categories(categories)) =
            self.inner.cache.get(&CacheKey::Categories).await
        {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let categories: Vec<Category> = self.execute(self.get("public/categories")).await?;

        self.inner
            .cache
            .insert(CacheKey::Categories, CacheValue::Categories(categories.clone()))
            .await;
        Ok(categories)
    }

    /// Subcategories, optionally limited to one category.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_subcategories(
        &self,
        category_id: Option<CategoryId>,
    ) -> Result<Vec<Subcategory>, ApiError> {
        let key = CacheKey::Subcategories(category_id);
        if let Some(CacheValue::Subcategories(subcategories)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for subcategories");
            return Ok(subcategories);
        }

        let mut request = self.get("public/subcategories");
        if let Some(id) = category_id {
            request = request.query(&[("category_id", id.to_string())]);
        }
        let subcategories: Vec<Subcategory> = self.execute(request).await?;

        self.inner
            .cache
            .insert(key, CacheValue::Subcategories(subcategories.clone()))
            .await;
        Ok(subcategories)
    }

    // =========================================================================
    // Admin catalog
    // =========================================================================

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the product or the token.
    #[instrument(skip(self, token, input), fields(name = %input.name))]
    pub async fn create_product(&self, token: &AccessToken, input: &ProductInput) -> Result<(), ApiError> {
        self.execute_ack(self.post("products").bearer_auth(token.expose()).json(input))
            .await?;
        self.invalidate_catalog();
        Ok(())
    }

    /// Update a product's fields. Images and specification values are
    /// managed through their own endpoints.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the update.
    #[instrument(skip(self, token, input), fields(product_id = %id))]
    pub async fn update_product(
        &self,
        token: &AccessToken,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<(), ApiError> {
        self.execute_ack(
            self.put(&format!("update-product/{id}"))
                .bearer_auth(token.expose())
                .json(input),
        )
        .await?;
        self.invalidate_catalog();
        Ok(())
    }

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the API refuses, e.g. the product is on an order.
    #[instrument(skip(self, token), fields(product_id = %id))]
    pub async fn delete_product(&self, token: &AccessToken, id: ProductId) -> Result<(), ApiError> {
        self.execute_ack(self.delete(&format!("delete-product/{id}")).bearer_auth(token.expose()))
            .await?;
        self.invalidate_catalog();
        Ok(())
    }

    /// Upload an image file; the returned URL can then be attached to a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the content type is malformed or the API rejects
    /// the file.
    #[instrument(skip(self, token, bytes), fields(size = bytes.len()))]
    pub async fn upload_image(
        &self,
        token: &AccessToken,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadedImage, ApiError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(content_type)?;
        let form = reqwest::multipart::Form::new().part("file", part);
        self.execute(self.post("upload-image").bearer_auth(token.expose()).multipart(form))
            .await
    }

    /// Images attached to a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn product_images(&self, id: ProductId) -> Result<Vec<ProductImage>, ApiError> {
        self.execute(self.get(&format!("products/{id}/images"))).await
    }

    /// Attach an image URL to a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the request.
    #[instrument(skip(self, token), fields(product_id = %id))]
    pub async fn add_product_image(
        &self,
        token: &AccessToken,
        id: ProductId,
        img_url: &str,
    ) -> Result<ProductImage, ApiError> {
        let image = self
            .execute(
                self.post(&format!("products/{id}/images"))
                    .bearer_auth(token.expose())
                    .json(&json!({ "img_url": img_url })),
            )
            .await?;
        self.invalidate_catalog();
        Ok(image)
    }

    /// Detach an image from a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the request.
    #[instrument(skip(self, token), fields(product_id = %id, image_id = %image_id))]
    pub async fn delete_product_image(
        &self,
        token: &AccessToken,
        id: ProductId,
        image_id: ImageId,
    ) -> Result<(), ApiError> {
        self.execute_ack(
            self.delete(&format!("products/{id}/images/{image_id}"))
                .bearer_auth(token.expose()),
        )
        .await?;
        self.invalidate_catalog();
        Ok(())
    }

    /// Set a product's value for a specification.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the request.
    #[instrument(skip(self, token, value), fields(product_id = %id))]
    pub async fn add_product_specification(
        &self,
        token: &AccessToken,
        id: ProductId,
        value: &SpecificationValue,
    ) -> Result<ProductSpecification, ApiError> {
        let spec = self
            .execute(
                self.post(&format!("products/{id}/specifications"))
                    .bearer_auth(token.expose())
                    .json(value),
            )
            .await?;
        self.invalidate_catalog();
        Ok(spec)
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the category.
    #[instrument(skip(self, token, input), fields(name = %input.name))]
    pub async fn create_category(
        &self,
        token: &AccessToken,
        input: &CategoryInput,
    ) -> Result<Category, ApiError> {
        let category = self
            .execute(self.post("categories").bearer_auth(token.expose()).json(input))
            .await?;
        self.invalidate_catalog();
        Ok(category)
    }

    /// Update a category.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the update.
    #[instrument(skip(self, token, input), fields(category_id = %id))]
    pub async fn update_category(
        &self,
        token: &AccessToken,
        id: CategoryId,
        input: &CategoryInput,
    ) -> Result<Category, ApiError> {
        let category = self
            .execute(
                self.put(&format!("categories/{id}"))
                    .bearer_auth(token.expose())
                    .json(input),
            )
            .await?;
        self.invalidate_catalog();
        Ok(category)
    }

    /// Delete a category.
    ///
    /// # Errors
    ///
    /// Returns an error if the API refuses, e.g. products still use it.
    #[instrument(skip(self, token), fields(category_id = %id))]
    pub async fn delete_category(&self, token: &AccessToken, id: CategoryId) -> Result<(), ApiError> {
        self.execute_ack(self.delete(&format!("categories/{id}")).bearer_auth(token.expose()))
            .await?;
        self.invalidate_catalog();
        Ok(())
    }

    /// Create a subcategory.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the subcategory.
    #[instrument(skip(self, token, input), fields(name = %input.name))]
    pub async fn create_subcategory(
        &self,
        token: &AccessToken,
        input: &SubcategoryInput,
    ) -> Result<Subcategory, ApiError> {
        let subcategory = self
            .execute(self.post("subcategories").bearer_auth(token.expose()).json(input))
            .await?;
        self.invalidate_catalog();
        Ok(subcategory)
    }

    /// Update a subcategory.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the update.
    #[instrument(skip(self, token, input), fields(subcategory_id = %id))]
    pub async fn update_subcategory(
        &self,
        token: &AccessToken,
        id: SubcategoryId,
        input: &SubcategoryInput,
    ) -> Result<Subcategory, ApiError> {
        let subcategory = self
            .execute(
                self.put(&format!("subcategories/{id}"))
                    .bearer_auth(token.expose())
                    .json(input),
            )
            .await?;
        self.invalidate_catalog();
        Ok(subcategory)
    }

    /// Delete a subcategory.
    ///
    /// # Errors
    ///
    /// Returns an error if the API refuses the deletion.
    #[instrument(skip(self, token), fields(subcategory_id = %id))]
    pub async fn delete_subcategory(
        &self,
        token: &AccessToken,
        id: SubcategoryId,
    ) -> Result<(), ApiError> {
        self.execute_ack(self.delete(&format!("subcategories/{id}")).bearer_auth(token.expose()))
            .await?;
        self.invalidate_catalog();
        Ok(())
    }

    /// Specification definitions of a subcategory.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn list_specifications(
        &self,
        subcategory_id: SubcategoryId,
    ) -> Result<Vec<Specification>, ApiError> {
        self.execute(self.get(&format!("subcategories/{subcategory_id}/specifications")))
            .await
    }

    /// Define a new specification on a subcategory.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the definition.
    #[instrument(skip(self, token, input), fields(name = %input.name))]
    pub async fn create_specification(
        &self,
        token: &AccessToken,
        input: &SpecificationInput,
    ) -> Result<Specification, ApiError> {
        self.execute(
            self.post(&format!("subcategories/{}/specifications", input.subcategory_id))
                .bearer_auth(token.expose())
                .json(input),
        )
        .await
    }

    /// Update a specification definition.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] if it does not belong to the subcategory.
    #[instrument(skip(self, token, input), fields(spec_id = %spec_id))]
    pub async fn update_specification(
        &self,
        token: &AccessToken,
        spec_id: SpecificationId,
        input: &SpecificationInput,
    ) -> Result<Specification, ApiError> {
        let spec = self
            .execute(
                self.put(&format!(
                    "subcategories/{}/specifications/{spec_id}",
                    input.subcategory_id
                ))
                .bearer_auth(token.expose())
                .json(input),
            )
            .await?;
        self.invalidate_catalog();
        Ok(spec)
    }

    /// Delete a specification definition.
    ///
    /// # Errors
    ///
    /// Returns an error if the API refuses the deletion.
    #[instrument(skip(self, token), fields(spec_id = %spec_id))]
    pub async fn delete_specification(
        &self,
        token: &AccessToken,
        subcategory_id: SubcategoryId,
        spec_id: SpecificationId,
    ) -> Result<(), ApiError> {
        self.execute_ack(
            self.delete(&format!("subcategories/{subcategory_id}/specifications/{spec_id}"))
                .bearer_auth(token.expose()),
        )
        .await?;
        self.invalidate_catalog();
        Ok(())
    }

    // =========================================================================
    // Addresses
    // =========================================================================

    /// The customer's address book.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn list_addresses(&self, token: &AccessToken) -> Result<Vec<Address>, ApiError> {
        self.execute(self.get("addresses").bearer_auth(token.expose())).await
    }

    /// Add an address. Marking it default clears the previous default.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the address.
    #[instrument(skip(self, token, input))]
    pub async fn create_address(
        &self,
        token: &AccessToken,
        input: &AddressInput,
    ) -> Result<Address, ApiError> {
        self.execute(self.post("addresses").bearer_auth(token.expose()).json(input))
            .await
    }

    /// Replace an address.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the update.
    #[instrument(skip(self, token, input), fields(address_id = %id))]
    pub async fn update_address(
        &self,
        token: &AccessToken,
        id: AddressId,
        input: &AddressInput,
    ) -> Result<Address, ApiError> {
        self.execute(
            self.put(&format!("addresses/{id}"))
                .bearer_auth(token.expose())
                .json(input),
        )
        .await
    }

    /// Delete an address.
    ///
    /// # Errors
    ///
    /// Returns an error if the API refuses the deletion.
    #[instrument(skip(self, token), fields(address_id = %id))]
    pub async fn delete_address(&self, token: &AccessToken, id: AddressId) -> Result<(), ApiError> {
        self.execute_ack(self.delete(&format!("addresses/{id}")).bearer_auth(token.expose()))
            .await
    }

    // =========================================================================
    // Favorites
    // =========================================================================

    /// The customer's favorites.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn list_favorites(&self, token: &AccessToken) -> Result<Vec<Favorite>, ApiError> {
        self.execute(self.get("favorites").bearer_auth(token.expose())).await
    }

    /// Mark a product as a favorite.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the request.
    #[instrument(skip(self, token), fields(product_id = %product_id))]
    pub async fn add_favorite(
        &self,
        token: &AccessToken,
        product_id: ProductId,
    ) -> Result<Favorite, ApiError> {
        self.execute(
            self.post("favorites")
                .bearer_auth(token.expose())
                .json(&json!({ "product_id": product_id })),
        )
        .await
    }

    /// Remove a favorite.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the request.
    #[instrument(skip(self, token), fields(favorite_id = %id))]
    pub async fn remove_favorite(&self, token: &AccessToken, id: FavoriteId) -> Result<(), ApiError> {
        self.execute_ack(self.delete(&format!("favorites/{id}")).bearer_auth(token.expose()))
            .await
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Place an order for the cart lines.
    ///
    /// # Errors
    ///
    /// Returns an error with the API's `detail`, e.g. insufficient stock.
    #[instrument(skip(self, token, request), fields(lines = request.cart.len()))]
    pub async fn create_order(
        &self,
        token: &AccessToken,
        request: &CreateOrderRequest,
    ) -> Result<CreatedOrder, ApiError> {
        let created: CreatedOrder = self
            .execute(self.post("create_order").bearer_auth(token.expose()).json(request))
            .await?;
        // Stock levels changed
        self.invalidate_catalog();
        Ok(created)
    }

    /// The customer's own orders.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn my_orders(
        &self,
        token: &AccessToken,
        query: &OrderQuery,
    ) -> Result<Paginated<Order>, ApiError> {
        self.execute(
            self.get("orders")
                .bearer_auth(token.expose())
                .query(&query.to_pairs()),
        )
        .await
    }

    /// One order with its lines and address.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] for an unknown order.
    #[instrument(skip(self, token), fields(order_id = %id))]
    pub async fn get_order(&self, token: &AccessToken, id: OrderId) -> Result<Order, ApiError> {
        self.execute(self.get(&format!("orders/{id}")).bearer_auth(token.expose()))
            .await
    }

    /// Every order, for staff.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] for non-admin tokens.
    #[instrument(skip(self, token))]
    pub async fn all_orders(
        &self,
        token: &AccessToken,
        query: &OrderQuery,
    ) -> Result<Paginated<OrderWithUser>, ApiError> {
        self.execute(
            self.get("admin/orders")
                .bearer_auth(token.expose())
                .query(&query.to_pairs()),
        )
        .await
    }

    /// Move an order to a new status.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the change.
    #[instrument(skip(self, token), fields(order_id = %id, status = %status))]
    pub async fn update_order_status(
        &self,
        token: &AccessToken,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<(), ApiError> {
        self.execute_ack(
            self.put(&format!("update-order-status/{id}"))
                .bearer_auth(token.expose())
                .json(&json!({ "status": status })),
        )
        .await
    }

    /// Ask staff to cancel an order. The order status does not change.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the request.
    #[instrument(skip(self, token, reason), fields(order_id = %id))]
    pub async fn request_cancellation(
        &self,
        token: &AccessToken,
        id: OrderId,
        reason: &str,
    ) -> Result<MessageResponse, ApiError> {
        self.execute(
            self.post(&format!("auth/cancel-order/{id}"))
                .bearer_auth(token.expose())
                .json(&json!({ "reason": reason })),
        )
        .await
    }

    // =========================================================================
    // Reviews
    // =========================================================================

    /// Review a product from a delivered order.
    ///
    /// # Errors
    ///
    /// Returns an error if the product was already reviewed for that order.
    #[instrument(skip(self, token, input), fields(product_id = %input.product_id, order_id = %input.order_id))]
    pub async fn create_review(&self, token: &AccessToken, input: &ReviewInput) -> Result<Review, ApiError> {
        let review = self
            .execute(self.post("reviews").bearer_auth(token.expose()).json(input))
            .await?;
        // Product pages embed their reviews
        self.invalidate_catalog();
        Ok(review)
    }

    /// Change the rating or comment of one of the customer's reviews.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] for someone else's review.
    #[instrument(skip(self, token, input), fields(review_id = %id))]
    pub async fn update_review(
        &self,
        token: &AccessToken,
        id: ReviewId,
        input: &ReviewUpdate,
    ) -> Result<Review, ApiError> {
        let review = self
            .execute(
                self.put(&format!("reviews/{id}"))
                    .bearer_auth(token.expose())
                    .json(input),
            )
            .await?;
        self.invalidate_catalog();
        Ok(review)
    }

    /// Delete one of the customer's reviews.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] for someone else's review.
    #[instrument(skip(self, token), fields(review_id = %id))]
    pub async fn delete_review(&self, token: &AccessToken, id: ReviewId) -> Result<(), ApiError> {
        self.execute_ack(self.delete(&format!("reviews/{id}")).bearer_auth(token.expose()))
            .await?;
        self.invalidate_catalog();
        Ok(())
    }

    /// Reviews the customer has written, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn my_reviews(&self, token: &AccessToken) -> Result<Vec<Review>, ApiError> {
        self.execute(self.get("my-reviews").bearer_auth(token.expose())).await
    }

    /// Recompute every product's stored average rating.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] for non-admin tokens.
    #[instrument(skip(self, token))]
    pub async fn recalculate_ratings(&self, token: &AccessToken) -> Result<RecalculatedRatings, ApiError> {
        let result = self
            .execute(
                self.post("admin/recalculate-product-ratings")
                    .bearer_auth(token.expose()),
            )
            .await?;
        self.invalidate_catalog();
        Ok(result)
    }

    // =========================================================================
    // Banners
    // =========================================================================

    /// Active banners of a kind, newest first. Cached with the catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn public_banners(
        &self,
        kind: BannerKind,
        category_id: Option<CategoryId>,
    ) -> Result<Vec<Banner>, ApiError> {
        let key = CacheKey::Banners(kind, category_id);
        if let Some(CacheValue::Banners(banners)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for banners");
            return Ok(banners);
        }

        let mut pairs = vec![("type", kind.to_string())];
        if let Some(id) = category_id {
            pairs.push(("category_id", id.to_string()));
        }
        let banners: Vec<Banner> = self.execute(self.get("public/banners").query(&pairs)).await?;

        self.inner
            .cache
            .insert(key, CacheValue::Banners(banners.clone()))
            .await;
        Ok(banners)
    }

    /// Every banner, active or not, for staff.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] for non-admin tokens.
    #[instrument(skip(self, token))]
    pub async fn list_banners(&self, token: &AccessToken) -> Result<Vec<Banner>, ApiError> {
        self.execute(self.get("banners").bearer_auth(token.expose())).await
    }

    /// Create a banner.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the banner.
    #[instrument(skip(self, token, input), fields(kind = %input.kind))]
    pub async fn create_banner(&self, token: &AccessToken, input: &BannerInput) -> Result<Banner, ApiError> {
        let banner = self
            .execute(self.post("banners").bearer_auth(token.expose()).json(input))
            .await?;
        self.invalidate_catalog();
        Ok(banner)
    }

    /// Replace every field of a banner.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] for an unknown banner.
    #[instrument(skip(self, token, input), fields(banner_id = %id))]
    pub async fn update_banner(
        &self,
        token: &AccessToken,
        id: BannerId,
        input: &BannerInput,
    ) -> Result<Banner, ApiError> {
        let banner = self
            .execute(
                self.put(&format!("banners/{id}"))
                    .bearer_auth(token.expose())
                    .json(input),
            )
            .await?;
        self.invalidate_catalog();
        Ok(banner)
    }

    /// Delete a banner.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] for an unknown banner.
    #[instrument(skip(self, token), fields(banner_id = %id))]
    pub async fn delete_banner(&self, token: &AccessToken, id: BannerId) -> Result<(), ApiError> {
        self.execute_ack(self.delete(&format!("banners/{id}")).bearer_auth(token.expose()))
            .await?;
        self.invalidate_catalog();
        Ok(())
    }

    /// Clear a banner's image, keeping the rest.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] for an unknown banner.
    #[instrument(skip(self, token), fields(banner_id = %id))]
    pub async fn remove_banner_image(&self, token: &AccessToken, id: BannerId) -> Result<(), ApiError> {
        self.execute_ack(
            self.patch(&format!("banners/{id}/remove-image"))
                .bearer_auth(token.expose()),
        )
        .await?;
        self.invalidate_catalog();
        Ok(())
    }

    // =========================================================================
    // Superadmin
    // =========================================================================

    /// Search and page through every account.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] unless the token is a superadmin's.
    #[instrument(skip(self, token))]
    pub async fn list_users(
        &self,
        token: &AccessToken,
        query: &UserQuery,
    ) -> Result<Paginated<UserSummary>, ApiError> {
        self.execute(
            self.get("superadmin/users")
                .bearer_auth(token.expose())
                .query(&query.to_pairs()),
        )
        .await
    }

    /// Account counts by role.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] unless the token is a superadmin's.
    #[instrument(skip(self, token))]
    pub async fn user_stats(&self, token: &AccessToken) -> Result<UserStats, ApiError> {
        self.execute(self.get("superadmin/stats").bearer_auth(token.expose()))
            .await
    }

    /// Create an admin account.
    ///
    /// # Errors
    ///
    /// Returns an error if the username or email is taken.
    #[instrument(skip(self, token, password))]
    pub async fn create_admin(
        &self,
        token: &AccessToken,
        username: &str,
        email: &str,
        password: &SecretString,
    ) -> Result<RegisteredUser, ApiError> {
        let body = json!({
            "username": username,
            "email": email,
            "password": password.expose_secret(),
        });
        self.execute(
            self.post("auth/superadmin/create-admin")
                .bearer_auth(token.expose())
                .json(&body),
        )
        .await
    }

    /// Delete an admin or customer account. Superadmins cannot be deleted.
    ///
    /// # Errors
    ///
    /// Returns an error for the caller's own account, a superadmin or an
    /// unknown user.
    #[instrument(skip(self, token), fields(user_id = %id))]
    pub async fn delete_user(&self, token: &AccessToken, id: UserId) -> Result<MessageResponse, ApiError> {
        self.execute(
            self.delete(&format!("auth/superadmin/users/{id}"))
                .bearer_auth(token.expose()),
        )
        .await
    }

    // =========================================================================
    // Newsletter
    // =========================================================================

    /// Subscribe an email address to the newsletter.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is already subscribed.
    #[instrument(skip(self, email))]
    pub async fn subscribe_newsletter(&self, email: &str) -> Result<MessageResponse, ApiError> {
        self.execute(self.post("newsletter/subscribe").query(&[("email", email)]))
            .await
    }

    // =========================================================================
    // Payments
    // =========================================================================

    /// Send an M-Pesa STK push for an order.
    ///
    /// # Errors
    ///
    /// Returns an error if the API refuses, e.g. the order is already paid.
    #[instrument(skip(self, token, request), fields(order_id = %request.order_id, amount = request.amount))]
    pub async fn initiate_stk_push(
        &self,
        token: &AccessToken,
        request: &StkPushRequest,
    ) -> Result<StkPushResponse, ApiError> {
        self.execute(
            self.post("payments/lnmo/transact")
                .bearer_auth(token.expose())
                .json(request),
        )
        .await
    }

    /// Latest transaction for an order, `None` until the push is recorded.
    ///
    /// # Errors
    ///
    /// Returns an error for anything other than "no transaction yet".
    #[instrument(skip(self, token), fields(order_id = %order_id))]
    pub async fn transaction_for_order(
        &self,
        token: &AccessToken,
        order_id: OrderId,
    ) -> Result<Option<Transaction>, ApiError> {
        let result: Result<TransactionEnvelope, ApiError> = self
            .execute(
                self.post("payments/transactions")
                    .bearer_auth(token.expose())
                    .json(&json!({ "order_id": order_id.to_string() })),
            )
            .await;
        match result {
            Ok(envelope) => Ok(Some(envelope.transaction)),
            Err(ApiError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Pull a readable message out of an error body.
///
/// The API sends `{"detail": "..."}`, or for request validation failures
/// `{"detail": [{"msg": "...", ...}, ...]}`.
fn error_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(detail) => Some(detail.clone()),
        serde_json::Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(serde_json::Value::as_str))
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_detail_string() {
        assert_eq!(
            error_detail(r#"{"detail": "Order not found"}"#).as_deref(),
            Some("Order not found")
        );
    }

    #[test]
    fn test_error_detail_validation_list() {
        let body = r#"{"detail": [{"loc": ["body", "email"], "msg": "value is not a valid email address"}, {"msg": "field required"}]}"#;
        assert_eq!(
            error_detail(body).as_deref(),
            Some("value is not a valid email address; field required")
        );
    }

    #[test]
    fn test_error_detail_missing() {
        assert_eq!(error_detail("<html>Bad Gateway</html>"), None);
        assert_eq!(error_detail(r#"{"message": "nope"}"#), None);
        assert_eq!(error_detail(r#"{"detail": []}"#), None);
    }

    #[test]
    fn test_url_joins_paths() {
        let client = ApiClient::new(&ApiConfig::new("http://127.0.0.1:8000/v1").unwrap()).unwrap();
        assert_eq!(client.url("public/products"), "http://127.0.0.1:8000/v1/public/products");
        assert_eq!(client.url("/me"), "http://127.0.0.1:8000/v1/me");
    }
}
