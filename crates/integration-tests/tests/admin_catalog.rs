//! Integration tests for admin catalog management: products, categories,
//! specifications, images and banners.
//!
//! Run with: cargo test -p duka-integration-tests --test admin_catalog

use duka_api_client::ProductImage;
use duka_core::{ImageId, Price};
use duka_integration_tests::mock_api::{ADMIN_EMAIL, PASSWORD};
use duka_integration_tests::{MockApi, TestServer, location, spawn_admin};
use reqwest::{Response, StatusCode};

const PNG: &[u8] = b"\x89PNG\r\n\x1a\nnot really an image";

async fn signed_in_admin() -> (MockApi, TestServer) {
    let api = MockApi::start().await;
    let server = spawn_admin(&api).await;

    let resp = server
        .post_form("/auth/login", &[("email", ADMIN_EMAIL), ("password", PASSWORD)])
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), Some("/"));
    (api, server)
}

/// Follow a redirect to `expected` and return the page it lands on.
async fn follow(server: &TestServer, resp: Response, expected: &str) -> String {
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), Some(expected));
    let page = server.get(expected).await;
    assert_eq!(page.status(), StatusCode::OK);
    page.text().await.expect("Failed to read body")
}

fn shuka_form<'a>(extra: &[(&'a str, &'a str)]) -> Vec<(&'a str, &'a str)> {
    let mut form = vec![
        ("name", "Maasai Shuka"),
        ("cost", "700"),
        ("price", "1200"),
        ("stock_quantity", "4"),
        ("barcode", "600100"),
        ("category_id", "1"),
    ];
    form.extend_from_slice(extra);
    form
}

// ============================================================================
// Products
// ============================================================================

#[tokio::test]
async fn test_create_product() {
    let (api, server) = signed_in_admin().await;

    let resp = server
        .post_form(
            "/products",
            &[
                ("name", "Sisal Mat"),
                ("cost", "300"),
                ("price", "650"),
                ("stock_quantity", "12"),
                ("barcode", "600200"),
                ("category_id", "1"),
            ],
        )
        .await;
    let page = follow(&server, resp, "/products").await;
    assert!(page.contains("Created Sisal Mat"));

    let state = api.state().await;
    let mat = state
        .products
        .iter()
        .find(|p| p.name == "Sisal Mat")
        .expect("Product not created");
    assert_eq!(mat.stock_quantity, 12);
}

#[tokio::test]
async fn test_create_product_shows_field_errors() {
    let (api, server) = signed_in_admin().await;

    let resp = server
        .post_form(
            "/products",
            &[
                ("name", "Sisal Mat"),
                ("cost", "300"),
                ("price", "0"),
                ("stock_quantity", "12"),
                ("barcode", "600200"),
            ],
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.expect("Failed to read body");
    assert!(body.contains("Price must be greater than 0"));
    assert!(body.contains("Sisal Mat"));
    assert_eq!(api.state().await.products.len(), 3);
}

#[tokio::test]
async fn test_update_product() {
    let (api, server) = signed_in_admin().await;

    let resp = server
        .post_form("/products/1", &shuka_form(&[("price", "1350")]))
        .await;
    let page = follow(&server, resp, "/products/1/edit").await;
    assert!(page.contains("Product updated"));

    let state = api.state().await;
    let shuka = state.products.iter().find(|p| p.id.as_i64() == 1).expect("Missing product");
    assert_eq!(shuka.price, Price::from_shillings(1350));
}

#[tokio::test]
async fn test_refused_specification_value_keeps_product_update() {
    let (api, server) = signed_in_admin().await;
    api.state().await.reject_spec_values = true;

    let resp = server
        .post_form(
            "/products/1",
            &shuka_form(&[("name", "Maasai Shuka Red"), ("subcategory_id", "1"), ("spec_1", "Wool")]),
        )
        .await;
    let page = follow(&server, resp, "/products/1/edit").await;
    assert!(page.contains("Could not save specification 1"));
    assert!(page.contains("Product updated"));

    let state = api.state().await;
    let shuka = state.products.iter().find(|p| p.id.as_i64() == 1).expect("Missing product");
    assert_eq!(shuka.name, "Maasai Shuka Red");
    assert!(shuka.product_specifications.is_empty());
}

#[tokio::test]
async fn test_delete_product() {
    let (api, server) = signed_in_admin().await;

    let resp = server.post_form("/products/2/delete", &[]).await;
    let page = follow(&server, resp, "/products").await;
    assert!(page.contains("Product deleted"));
    assert!(api.state().await.products.iter().all(|p| p.id.as_i64() != 2));
}

#[tokio::test]
async fn test_delete_ordered_product_is_refused() {
    let (api, server) = signed_in_admin().await;
    api.insert_order(2, 1, 1).await;

    let resp = server.post_form("/products/1/delete", &[]).await;
    let page = follow(&server, resp, "/products").await;
    assert!(page.contains("Cannot delete product that is part of existing orders"));
    assert_eq!(api.state().await.products.len(), 3);
}

#[tokio::test]
async fn test_recalculate_ratings() {
    let (api, server) = signed_in_admin().await;

    let resp = server.post_form("/products/recalculate-ratings", &[]).await;
    let page = follow(&server, resp, "/products").await;
    assert!(page.contains("Ratings recalculated"));
    assert!(page.contains("of 3 products updated"));
    assert_eq!(api.state().await.rating_recalculations, 1);
}

// ============================================================================
// Images
// ============================================================================

#[tokio::test]
async fn test_upload_product_image() {
    let (api, server) = signed_in_admin().await;

    let resp = server
        .post_file("/products/1/images", "file", "shuka.png", "image/png", PNG)
        .await;
    let page = follow(&server, resp, "/products/1/edit").await;
    assert!(page.contains("Image uploaded"));

    let state = api.state().await;
    assert_eq!(state.uploads, vec!["shuka.png".to_string()]);
    let shuka = state.products.iter().find(|p| p.id.as_i64() == 1).expect("Missing product");
    assert!(shuka.images.iter().any(|i| i.img_url == "/uploads/shuka.png"));
}

#[tokio::test]
async fn test_upload_rejects_non_images() {
    let (api, server) = signed_in_admin().await;

    let resp = server
        .post_file("/products/1/images", "file", "notes.txt", "text/plain", b"hello")
        .await;
    let page = follow(&server, resp, "/products/1/edit").await;
    assert!(page.contains("Please select an image file (jpg, png, gif)"));

    let resp = server
        .post_file("/products/1/images", "file", "shuka.webp", "image/webp", PNG)
        .await;
    let page = follow(&server, resp, "/products/1/edit").await;
    assert!(page.contains("Please select an image file (jpg, png, gif)"));

    assert!(api.state().await.uploads.is_empty());
}

#[tokio::test]
async fn test_upload_stops_at_five_images() {
    let (api, server) = signed_in_admin().await;
    {
        let mut state = api.state().await;
        let shuka = state
            .products
            .iter_mut()
            .find(|p| p.id.as_i64() == 1)
            .expect("Missing product");
        shuka.images = (1..=5)
            .map(|n| ProductImage {
                id: ImageId::new(500 + n),
                img_url: format!("/uploads/shuka-{n}.png"),
            })
            .collect();
    }

    let resp = server
        .post_file("/products/1/images", "file", "shuka.png", "image/png", PNG)
        .await;
    let page = follow(&server, resp, "/products/1/edit").await;
    assert!(page.contains("Maximum 5 images allowed"));
    assert!(api.state().await.uploads.is_empty());
}

// ============================================================================
// Categories and subcategories
// ============================================================================

#[tokio::test]
async fn test_category_lifecycle() {
    let (api, server) = signed_in_admin().await;

    let resp = server
        .post_form("/categories", &[("name", "Home Living"), ("features", "Hand made\nLocal")])
        .await;
    let page = follow(&server, resp, "/categories").await;
    assert!(page.contains("Created category Home Living"));

    let id = {
        let state = api.state().await;
        assert_eq!(state.categories.len(), 3);
        state
            .categories
            .iter()
            .find(|c| c.name == "Home Living")
            .expect("Category not created")
            .id
    };

    let resp = server
        .post_form(&format!("/categories/{id}"), &[("name", "Home and Living")])
        .await;
    let page = follow(&server, resp, "/categories").await;
    assert!(page.contains("Category updated"));
    assert!(page.contains("Home and Living"));

    let resp = server.post_form(&format!("/categories/{id}/delete"), &[]).await;
    let page = follow(&server, resp, "/categories").await;
    assert!(page.contains("Category deleted"));
    assert_eq!(api.state().await.categories.len(), 2);
}

#[tokio::test]
async fn test_category_rejections_are_flashed() {
    let (api, server) = signed_in_admin().await;

    let resp = server.post_form("/categories", &[("name", "fashion")]).await;
    let page = follow(&server, resp, "/categories").await;
    assert!(page.contains("Category already exists"));

    let resp = server.post_form("/categories", &[("name", "   ")]).await;
    let page = follow(&server, resp, "/categories").await;
    assert!(page.contains("Name is required"));

    let resp = server.post_form("/categories/1/delete", &[]).await;
    let page = follow(&server, resp, "/categories").await;
    assert!(page.contains("Cannot delete category with products"));

    assert_eq!(api.state().await.categories.len(), 2);
}

#[tokio::test]
async fn test_subcategory_lifecycle() {
    let (api, server) = signed_in_admin().await;

    let resp = server
        .post_form("/subcategories", &[("name", "Phones"), ("category_id", "2")])
        .await;
    let page = follow(&server, resp, "/categories").await;
    assert!(page.contains("Created subcategory Phones"));

    let id = api
        .state()
        .await
        .subcategories
        .iter()
        .find(|s| s.name == "Phones")
        .expect("Subcategory not created")
        .id;

    let resp = server
        .post_form(
            &format!("/subcategories/{id}"),
            &[("name", "Smartphones"), ("category_id", "2")],
        )
        .await;
    let page = follow(&server, resp, "/categories").await;
    assert!(page.contains("Subcategory updated"));

    let resp = server.post_form(&format!("/subcategories/{id}/delete"), &[]).await;
    let page = follow(&server, resp, "/categories").await;
    assert!(page.contains("Subcategory deleted"));
    assert!(api.state().await.subcategories.iter().all(|s| s.id != id));
}

// ============================================================================
// Specifications
// ============================================================================

#[tokio::test]
async fn test_specification_lifecycle() {
    let (api, server) = signed_in_admin().await;
    let path = "/subcategories/1/specifications";

    let page = server.get(path).await.text().await.expect("Failed to read body");
    assert!(page.contains("Blankets"));
    assert!(page.contains("Material"));

    let resp = server
        .post_form(path, &[("name", "Colour"), ("value_type", "text")])
        .await;
    let page = follow(&server, resp, path).await;
    assert!(page.contains("Added Colour"));

    let id = api
        .state()
        .await
        .specifications
        .iter()
        .find(|s| s.name == "Colour")
        .expect("Specification not created")
        .id;

    let resp = server
        .post_form(&format!("{path}/{id}"), &[("name", "Width"), ("value_type", "number")])
        .await;
    let page = follow(&server, resp, path).await;
    assert!(page.contains("Specification updated"));

    let resp = server.post_form(&format!("{path}/{id}/delete"), &[]).await;
    let page = follow(&server, resp, path).await;
    assert!(page.contains("Specification deleted"));
    assert!(api.state().await.specifications.iter().all(|s| s.id != id));
}

#[tokio::test]
async fn test_specification_value_type_checked() {
    let (api, server) = signed_in_admin().await;
    let path = "/subcategories/1/specifications";

    let resp = server
        .post_form(path, &[("name", "Made on"), ("value_type", "date")])
        .await;
    let page = follow(&server, resp, path).await;
    assert!(page.contains("Value type must be text or number"));
    assert_eq!(api.state().await.specifications.len(), 1);
}

// ============================================================================
// Banners
// ============================================================================

#[tokio::test]
async fn test_banner_page_lists_banners() {
    let (_api, server) = signed_in_admin().await;

    let page = server.get("/banners").await.text().await.expect("Failed to read body");
    assert!(page.contains("Long rains sale"));
    assert!(page.contains("Old Mashujaa promo"));
    assert!(page.contains("/uploads/banner-1.png"));
}

#[tokio::test]
async fn test_create_banner_uploads_image() {
    let (api, server) = signed_in_admin().await;

    let resp = server
        .post_multipart(
            "/banners",
            &[("title", "Jamhuri deals"), ("type", "homepage"), ("active", "on")],
            Some(("jamhuri.png", "image/png", PNG)),
        )
        .await;
    let page = follow(&server, resp, "/banners").await;
    assert!(page.contains("Banner created"));

    let state = api.state().await;
    assert_eq!(state.uploads, vec!["jamhuri.png".to_string()]);
    let banner = state
        .banners
        .iter()
        .find(|b| b.title.as_deref() == Some("Jamhuri deals"))
        .expect("Banner not created");
    assert_eq!(banner.image_url, "/uploads/jamhuri.png");
    assert!(banner.active);
}

#[tokio::test]
async fn test_create_banner_rejections() {
    let (api, server) = signed_in_admin().await;

    let resp = server
        .post_multipart("/banners", &[("title", "No picture"), ("type", "homepage")], None)
        .await;
    let page = follow(&server, resp, "/banners").await;
    assert!(page.contains("Please upload an image"));

    let resp = server
        .post_multipart(
            "/banners",
            &[("title", "Kikoi week"), ("type", "category")],
            Some(("kikoi.png", "image/png", PNG)),
        )
        .await;
    let page = follow(&server, resp, "/banners").await;
    assert!(page.contains("Please choose a category for a category banner"));

    let resp = server
        .post_multipart(
            "/banners",
            &[("title", "Kikoi week"), ("type", "homepage")],
            Some(("kikoi.pdf", "application/pdf", b"%PDF")),
        )
        .await;
    let page = follow(&server, resp, "/banners").await;
    assert!(page.contains("Please select an image file (jpg, png, gif)"));

    let state = api.state().await;
    assert_eq!(state.banners.len(), 2);
    assert!(state.uploads.is_empty());
}

#[tokio::test]
async fn test_update_banner_keeps_image_without_upload() {
    let (api, server) = signed_in_admin().await;

    let resp = server
        .post_multipart(
            "/banners/1",
            &[
                ("title", "Short rains sale"),
                ("type", "category"),
                ("category_id", "2"),
                ("active", "on"),
            ],
            None,
        )
        .await;
    let page = follow(&server, resp, "/banners").await;
    assert!(page.contains("Banner updated"));
    assert!(page.contains("Category: Electronics"));

    let state = api.state().await;
    let banner = state.banners.iter().find(|b| b.id.as_i64() == 1).expect("Missing banner");
    assert_eq!(banner.title.as_deref(), Some("Short rains sale"));
    assert_eq!(banner.image_url, "/uploads/banner-1.png");
    assert_eq!(banner.category_id.map(|c| c.as_i64()), Some(2));
    assert!(state.uploads.is_empty());
}

#[tokio::test]
async fn test_banner_toggle_image_removal_and_delete() {
    let (api, server) = signed_in_admin().await;

    let resp = server.post_form("/banners/2/toggle", &[]).await;
    let page = follow(&server, resp, "/banners").await;
    assert!(page.contains("Banner activated"));
    assert!(api.state().await.banners.iter().all(|b| b.active));

    let resp = server.post_form("/banners/1/remove-image", &[]).await;
    let page = follow(&server, resp, "/banners").await;
    assert!(page.contains("Banner image removed"));

    let resp = server.post_form("/banners/2/delete", &[]).await;
    let page = follow(&server, resp, "/banners").await;
    assert!(page.contains("Banner deleted"));

    let state = api.state().await;
    assert_eq!(state.banners.len(), 1);
    assert!(state.banners[0].image_url.is_empty());
}
