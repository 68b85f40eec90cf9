//! Integration tests for storefront accounts: sign-up and verification,
//! password resets, the address book, the wishlist, reviews and the
//! newsletter.
//!
//! Run with: cargo test -p duka-integration-tests --test storefront_account

use duka_integration_tests::mock_api::{CUSTOMER_EMAIL, CUSTOMER_ID, PASSWORD};
use duka_integration_tests::{MockApi, TestServer, location, spawn_storefront};
use reqwest::{Response, StatusCode};

async fn body(resp: Response) -> String {
    resp.text().await.expect("Failed to read body")
}

async fn logged_in_storefront() -> (MockApi, TestServer) {
    let api = MockApi::start().await;
    let server = spawn_storefront(&api).await;

    let resp = server
        .post_form(
            "/auth/login",
            &[("email", CUSTOMER_EMAIL), ("password", PASSWORD)],
        )
        .await;
    assert_eq!(location(&resp), Some("/"));
    (api, server)
}

// ============================================================================
// Sign-up and verification
// ============================================================================

const NEW_EMAIL: &str = "akinyi@example.com";
const NEW_PASSWORD: &str = "karibu-sana-2026";

async fn register(server: &TestServer) -> Response {
    server
        .post_form(
            "/auth/register",
            &[
                ("username", "akinyi"),
                ("email", NEW_EMAIL),
                ("password", NEW_PASSWORD),
                ("password_confirm", NEW_PASSWORD),
            ],
        )
        .await
}

#[tokio::test]
async fn test_new_account_logs_in_after_verifying_email() {
    let api = MockApi::start().await;
    let server = spawn_storefront(&api).await;

    let resp = register(&server).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), Some("/auth/check-email"));

    let user_id = {
        let state = api.state().await;
        let user = state.users.last().expect("Registered user missing");
        assert_eq!(state.verification_emails, [user.id]);
        user.id
    };

    let page = body(server.get("/auth/check-email").await).await;
    assert!(page.contains(NEW_EMAIL));

    let resp = server
        .post_form("/auth/login", &[("email", NEW_EMAIL), ("password", NEW_PASSWORD)])
        .await;
    assert_eq!(location(&resp), Some("/auth/login?error=unverified"));
    let page = body(server.get("/auth/login?error=unverified").await).await;
    assert!(page.contains("Please verify your email address before logging in."));

    let resp = server
        .get(&format!("/auth/verify-email?token=verify-{user_id}"))
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), Some("/"));

    let home = body(server.get("/").await).await;
    assert!(home.contains("Email verified successfully! Welcome to Duka!"));
    assert!(home.contains("akinyi"));
}

#[tokio::test]
async fn test_verification_link_can_be_sent_again() {
    let api = MockApi::start().await;
    let server = spawn_storefront(&api).await;
    register(&server).await;

    let resp = server.post_form("/auth/resend-verification", &[]).await;
    assert_eq!(location(&resp), Some("/auth/check-email"));
    assert_eq!(api.state().await.verification_emails.len(), 2);

    let page = body(server.get("/auth/check-email").await).await;
    assert!(page.contains("Verification email sent. Please check your inbox."));
}

#[tokio::test]
async fn test_bad_verification_link_is_refused() {
    let api = MockApi::start().await;
    let server = spawn_storefront(&api).await;

    let resp = server.get("/auth/verify-email?token=verify-999").await;
    assert_eq!(location(&resp), Some("/auth/login?error=verification"));

    let resp = server.get("/").await;
    let home = body(resp).await;
    assert!(!home.contains("Log out"));
}

// ============================================================================
// Password reset
// ============================================================================

#[tokio::test]
async fn test_password_reset_link_sets_new_password() {
    let api = MockApi::start().await;
    let server = spawn_storefront(&api).await;

    let resp = server
        .post_form("/auth/forgot-password", &[("email", CUSTOMER_EMAIL)])
        .await;
    assert_eq!(location(&resp), Some("/auth/login?success=reset_sent"));
    assert_eq!(api.state().await.reset_emails, [CUSTOMER_ID]);

    let token = format!("reset-{CUSTOMER_ID}");
    let resp = server
        .get(&format!("/auth/reset-password?token={token}"))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = server
        .post_form(
            "/auth/reset-password",
            &[
                ("token", token.as_str()),
                ("password", "mpya-kabisa-2026"),
                ("password_confirm", "mpya-kabisa-2026"),
            ],
        )
        .await;
    assert_eq!(location(&resp), Some("/auth/login?success=password_reset"));

    let resp = server
        .post_form(
            "/auth/login",
            &[("email", CUSTOMER_EMAIL), ("password", "mpya-kabisa-2026")],
        )
        .await;
    assert_eq!(location(&resp), Some("/"));
}

#[tokio::test]
async fn test_unrequested_reset_token_is_refused() {
    let api = MockApi::start().await;
    let server = spawn_storefront(&api).await;

    let resp = server
        .post_form(
            "/auth/reset-password",
            &[
                ("token", "reset-2"),
                ("password", "mpya-kabisa-2026"),
                ("password_confirm", "mpya-kabisa-2026"),
            ],
        )
        .await;
    assert_eq!(location(&resp), Some("/auth/forgot-password?error=reset_token"));

    let state = api.state().await;
    let customer = state
        .users
        .iter()
        .find(|u| u.id == CUSTOMER_ID)
        .expect("Seeded customer missing");
    assert_eq!(customer.password, PASSWORD);
}

#[tokio::test]
async fn test_reset_page_without_token_goes_back_to_request_form() {
    let api = MockApi::start().await;
    let server = spawn_storefront(&api).await;

    let resp = server.get("/auth/reset-password").await;
    assert_eq!(location(&resp), Some("/auth/forgot-password"));
}

// ============================================================================
// Addresses
// ============================================================================

fn address_form<'a>(city: &'a str, region: &'a str) -> Vec<(&'a str, &'a str)> {
    vec![
        ("first_name", "Wanjiru"),
        ("last_name", "Kamau"),
        ("phone_number", "0722000111"),
        ("address", "Ngong Road 40"),
        ("region", region),
        ("city", city),
        ("is_default", "on"),
    ]
}

#[tokio::test]
async fn test_address_book_create_update_default_delete() {
    let (api, server) = logged_in_storefront().await;

    let resp = server
        .post_form("/account/addresses", &address_form("Kilimani", "Nairobi"))
        .await;
    assert_eq!(location(&resp), Some("/account/addresses"));
    let new_id = {
        let state = api.state().await;
        assert_eq!(state.addresses.len(), 2);
        let added = state.addresses.last().expect("Address missing");
        assert!(added.is_default);
        assert!(state.addresses.iter().filter(|a| a.is_default).count() == 1);
        added.id.as_i64()
    };
    let page = body(server.get("/account/addresses").await).await;
    assert!(page.contains("Address added"));
    assert!(page.contains("Ngong Road 40"));

    let resp = server
        .post_form(
            &format!("/account/addresses/{new_id}"),
            &address_form("Mombasa", "Coast"),
        )
        .await;
    assert_eq!(location(&resp), Some("/account/addresses"));
    assert_eq!(api.state().await.addresses[1].city, "Mombasa");

    server.post_form("/account/addresses/7/default", &[]).await;
    {
        let state = api.state().await;
        assert!(state.addresses[0].is_default);
        assert!(!state.addresses[1].is_default);
    }

    let resp = server
        .post_form(&format!("/account/addresses/{new_id}/delete"), &[])
        .await;
    assert_eq!(location(&resp), Some("/account/addresses"));
    assert_eq!(api.state().await.addresses.len(), 1);
    let page = body(server.get("/account/addresses").await).await;
    assert!(page.contains("Address removed"));
}

#[tokio::test]
async fn test_unknown_region_is_not_saved() {
    let (api, server) = logged_in_storefront().await;

    server
        .post_form("/account/addresses", &address_form("Atlantis", "Narnia"))
        .await;
    assert_eq!(api.state().await.addresses.len(), 1);

    let page = body(server.get("/account/addresses").await).await;
    assert!(page.contains("Please select a region from the list"));
}

#[tokio::test]
async fn test_account_overview_shows_default_address_and_orders() {
    let (api, server) = logged_in_storefront().await;
    let order_id = api.insert_order(CUSTOMER_ID, 2, 1).await;

    let page = body(server.get("/account").await).await;
    assert!(page.contains(CUSTOMER_EMAIL));
    assert!(page.contains("Moi Avenue 12"));
    assert!(page.contains(&format!("#{order_id}")));
}

// ============================================================================
// Wishlist
// ============================================================================

#[tokio::test]
async fn test_wishlist_toggle_over_htmx_swaps_button() {
    let (api, server) = logged_in_storefront().await;

    let resp = server
        .hx_post_form("/wishlist/toggle", &[("product_id", "2")])
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let fragment = body(resp).await;
    assert!(fragment.contains("id=\"favorite-2\""));
    assert!(fragment.contains("In your wishlist"));
    assert_eq!(api.state().await.favorites.len(), 1);

    let page = body(server.get("/wishlist").await).await;
    assert!(page.contains("Kiondo Basket"));

    let fragment = body(
        server
            .hx_post_form("/wishlist/toggle", &[("product_id", "2")])
            .await,
    )
    .await;
    assert!(fragment.contains("Add to wishlist"));
    assert!(api.state().await.favorites.is_empty());
}

#[tokio::test]
async fn test_wishlist_toggle_without_htmx_flashes_and_returns() {
    let (_api, server) = logged_in_storefront().await;

    let resp = server
        .post_form(
            "/wishlist/toggle",
            &[("product_id", "1"), ("redirect_to", "/products/1")],
        )
        .await;
    assert_eq!(location(&resp), Some("/products/1"));
    let page = body(server.get("/products/1").await).await;
    assert!(page.contains("Added to your wishlist"));

    let resp = server
        .post_form(
            "/wishlist/toggle",
            &[("product_id", "1"), ("redirect_to", "https://evil.example")],
        )
        .await;
    assert_eq!(location(&resp), Some("/wishlist"));
}

#[tokio::test]
async fn test_wishlist_requires_login() {
    let api = MockApi::start().await;
    let server = spawn_storefront(&api).await;

    let resp = server.post_form("/wishlist/toggle", &[("product_id", "1")]).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert!(location(&resp).is_some_and(|l| l.starts_with("/auth/login")));
    assert!(api.state().await.favorites.is_empty());
}

// ============================================================================
// Reviews
// ============================================================================

#[tokio::test]
async fn test_delivered_product_can_be_reviewed_once() {
    let (api, server) = logged_in_storefront().await;
    let order_id = api.insert_delivered_order(CUSTOMER_ID, 1).await;
    let order = order_id.to_string();

    let page = body(server.get("/account/reviews").await).await;
    assert!(page.contains("Maasai Shuka"));
    assert!(page.contains(&format!("Order #{order_id}")));

    let review = [
        ("product_id", "1"),
        ("order_id", order.as_str()),
        ("rating", "5"),
        ("comment", "Warm on cold Limuru nights"),
    ];
    let resp = server.post_form("/reviews", &review).await;
    assert_eq!(location(&resp), Some("/account/reviews"));

    let page = body(server.get("/account/reviews").await).await;
    assert!(page.contains("Thank you for your review!"));
    assert!(page.contains("Warm on cold Limuru nights"));
    assert!(page.contains("★★★★★"));
    assert!(!page.contains(&format!("Order #{order_id}")));

    server.post_form("/reviews", &review).await;
    let page = body(server.get("/account/reviews").await).await;
    assert!(page.contains("You have already reviewed this product for this order"));

    let state = api.state().await;
    let shuka = state.products.iter().find(|p| p.id.as_i64() == 1).expect("Seeded product missing");
    assert_eq!(shuka.reviews.len(), 1);
}

#[tokio::test]
async fn test_review_needs_rating_and_delivery() {
    let (api, server) = logged_in_storefront().await;
    let order_id = api.insert_delivered_order(CUSTOMER_ID, 1).await.to_string();

    server
        .post_form(
            "/reviews",
            &[("product_id", "1"), ("order_id", order_id.as_str()), ("rating", "")],
        )
        .await;
    let page = body(server.get("/account/reviews").await).await;
    assert!(page.contains("Please select a rating"));

    let pending = api.insert_order(CUSTOMER_ID, 2, 1).await.to_string();
    server
        .post_form(
            "/reviews",
            &[("product_id", "2"), ("order_id", pending.as_str()), ("rating", "4")],
        )
        .await;
    let page = body(server.get("/account/reviews").await).await;
    assert!(page.contains("You can only review products from delivered orders"));

    let state = api.state().await;
    assert!(state.products.iter().all(|p| p.reviews.is_empty()));
}

#[tokio::test]
async fn test_review_can_be_edited_and_deleted() {
    let (api, server) = logged_in_storefront().await;
    let order_id = api.insert_delivered_order(CUSTOMER_ID, 2).await.to_string();
    server
        .post_form(
            "/reviews",
            &[("product_id", "2"), ("order_id", order_id.as_str()), ("rating", "3")],
        )
        .await;
    let review_id = api.state().await.products[1].reviews[0].id.as_i64();

    let resp = server
        .post_form(
            &format!("/reviews/{review_id}"),
            &[("rating", "4"), ("comment", "Sturdy weave")],
        )
        .await;
    assert_eq!(location(&resp), Some("/account/reviews"));
    {
        let state = api.state().await;
        let review = &state.products[1].reviews[0];
        assert_eq!(review.rating, 4);
        assert_eq!(review.comment.as_deref(), Some("Sturdy weave"));
    }

    server
        .post_form(&format!("/reviews/{review_id}/delete"), &[])
        .await;
    let page = body(server.get("/account/reviews").await).await;
    assert!(page.contains("Review deleted"));
    assert!(api.state().await.products[1].reviews.is_empty());
}

// ============================================================================
// Newsletter
// ============================================================================

#[tokio::test]
async fn test_newsletter_signup_over_htmx() {
    let api = MockApi::start().await;
    let server = spawn_storefront(&api).await;

    let fragment = body(
        server
            .hx_post_form("/newsletter", &[("email", "mteja@example.com")])
            .await,
    )
    .await;
    assert!(fragment.contains("Thanks for subscribing! Watch your inbox for offers."));
    assert_eq!(api.state().await.newsletter, ["mteja@example.com"]);

    let fragment = body(
        server
            .hx_post_form("/newsletter", &[("email", "mteja@example.com")])
            .await,
    )
    .await;
    assert!(fragment.contains("Email is already subscribed to the newsletter"));
    assert_eq!(api.state().await.newsletter.len(), 1);
}

#[tokio::test]
async fn test_newsletter_rejects_bad_email_without_calling_api() {
    let api = MockApi::start().await;
    let server = spawn_storefront(&api).await;

    let resp = server
        .post_form(
            "/newsletter",
            &[("email", "not-an-email"), ("redirect_to", "/store")],
        )
        .await;
    assert_eq!(location(&resp), Some("/store"));
    assert!(api.state().await.newsletter.is_empty());

    let page = body(server.get("/store").await).await;
    assert!(page.contains("Please enter a valid email address."));
}
