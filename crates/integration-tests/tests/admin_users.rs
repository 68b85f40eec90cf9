//! Integration tests for account management by super admins.
//!
//! Run with: cargo test -p duka-integration-tests --test admin_users

use duka_integration_tests::mock_api::{
    ADMIN_EMAIL, ADMIN_ID, CUSTOMER_ID, MockUser, PASSWORD, SUPERADMIN_EMAIL, SUPERADMIN_ID,
};
use duka_integration_tests::{MockApi, TestServer, location, spawn_admin};
use reqwest::StatusCode;

async fn signed_in_as(email: &str) -> (MockApi, TestServer) {
    let api = MockApi::start().await;
    let server = spawn_admin(&api).await;

    let resp = server
        .post_form("/auth/login", &[("email", email), ("password", PASSWORD)])
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), Some("/"));
    (api, server)
}

async fn users_page(server: &TestServer, path: &str) -> String {
    let resp = server.get(path).await;
    assert_eq!(resp.status(), StatusCode::OK);
    resp.text().await.expect("Failed to read body")
}

/// POST and land back on the users page.
async fn submit(server: &TestServer, path: &str, form: &[(&str, &str)]) -> String {
    let resp = server.post_form(path, form).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), Some("/users"));
    users_page(server, "/users").await
}

// ============================================================================
// Access
// ============================================================================

#[tokio::test]
async fn test_super_admin_sees_users_and_counts() {
    let (_api, server) = signed_in_as(SUPERADMIN_EMAIL).await;

    let home = users_page(&server, "/").await;
    assert!(home.contains("href=\"/users\""));

    let page = users_page(&server, "/users").await;
    assert!(page.contains("duka-admin"));
    assert!(page.contains("wanjiru"));
    assert!(page.contains("mwenye-duka"));
    assert!(page.contains("Super admin"));
}

#[tokio::test]
async fn test_users_can_be_searched_and_filtered() {
    let (_api, server) = signed_in_as(SUPERADMIN_EMAIL).await;

    let page = users_page(&server, "/users?search=wanj").await;
    assert!(page.contains("wanjiru"));
    assert!(!page.contains(ADMIN_EMAIL));

    let page = users_page(&server, "/users?role=admin").await;
    assert!(page.contains(ADMIN_EMAIL));
    assert!(!page.contains("wanjiru@example.com"));
}

#[tokio::test]
async fn test_plain_admin_is_kept_out() {
    let (api, server) = signed_in_as(ADMIN_EMAIL).await;

    let home = users_page(&server, "/").await;
    assert!(!home.contains("href=\"/users\""));

    let resp = server.get("/users").await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = server
        .post_form(&format!("/users/{CUSTOMER_ID}/delete"), &[])
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert!(api.state().await.users.iter().any(|u| u.id == CUSTOMER_ID));
}

// ============================================================================
// Creating admins
// ============================================================================

#[tokio::test]
async fn test_create_admin() {
    let (api, server) = signed_in_as(SUPERADMIN_EMAIL).await;

    let page = submit(
        &server,
        "/users",
        &[
            ("username", "msaidizi"),
            ("email", "msaidizi@example.com"),
            ("password", "password-2026"),
            ("password_confirm", "password-2026"),
        ],
    )
    .await;
    assert!(page.contains("Admin msaidizi created"));

    let state = api.state().await;
    let created = state
        .users
        .iter()
        .find(|u| u.username == "msaidizi")
        .expect("Admin not created");
    assert_eq!(created.role, "admin");
}

#[tokio::test]
async fn test_create_admin_rejections_are_flashed() {
    let (api, server) = signed_in_as(SUPERADMIN_EMAIL).await;

    let page = submit(
        &server,
        "/users",
        &[
            ("username", "msaidizi"),
            ("email", "msaidizi@example.com"),
            ("password", "password-2026"),
            ("password_confirm", "password-2027"),
        ],
    )
    .await;
    assert!(page.contains("Passwords do not match"));

    let page = submit(
        &server,
        "/users",
        &[
            ("username", "msaidizi"),
            ("email", "msaidizi@example.com"),
            ("password", "short"),
            ("password_confirm", "short"),
        ],
    )
    .await;
    assert!(page.contains("Password must be at least 8 characters long"));

    let page = submit(
        &server,
        "/users",
        &[
            ("username", "duka-admin"),
            ("email", "another@example.com"),
            ("password", "password-2026"),
            ("password_confirm", "password-2026"),
        ],
    )
    .await;
    assert!(page.contains("Username or email already exists"));

    assert_eq!(api.state().await.users.len(), 3);
}

// ============================================================================
// Deleting accounts
// ============================================================================

#[tokio::test]
async fn test_delete_customer_and_admin() {
    let (api, server) = signed_in_as(SUPERADMIN_EMAIL).await;

    let page = submit(&server, &format!("/users/{CUSTOMER_ID}/delete"), &[]).await;
    assert!(page.contains("Customer wanjiru deleted successfully"));

    let page = submit(&server, &format!("/users/{ADMIN_ID}/delete"), &[]).await;
    assert!(page.contains("Admin duka-admin deleted successfully"));

    let state = api.state().await;
    assert_eq!(state.users.len(), 1);
    assert_eq!(state.users[0].id, SUPERADMIN_ID);
}

#[tokio::test]
async fn test_own_and_super_admin_accounts_stay() {
    let (api, server) = signed_in_as(SUPERADMIN_EMAIL).await;
    api.state().await.users.push(MockUser {
        id: 40,
        username: "mwenzi".to_string(),
        email: "partner@example.com".to_string(),
        role: "SUPERADMIN".to_string(),
        password: PASSWORD.to_string(),
        verified: true,
    });

    let page = submit(&server, &format!("/users/{SUPERADMIN_ID}/delete"), &[]).await;
    assert!(page.contains("You cannot delete your own account"));

    let page = submit(&server, "/users/40/delete", &[]).await;
    assert!(page.contains("Cannot delete superadmin accounts"));
    assert!(!page.contains("action=\"/users/40/delete\""));

    let state = api.state().await;
    assert_eq!(state.users.len(), 4);
}
