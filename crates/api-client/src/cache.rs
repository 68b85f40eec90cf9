//! Cache types for public catalog reads.

use duka_core::{CategoryId, ProductId};

use crate::types::{Banner, BannerKind, Category, Paginated, Product, ProductQuery, Subcategory};

/// What was fetched.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Product(ProductId),
    Products(ProductQuery),
    Categories,
    Subcategories(Option<CategoryId>),
    Banners(BannerKind, Option<CategoryId>),
}

/// Cached response bodies.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Product(Box<Product>),
    Products(Paginated<Product>),
    Categories(Vec<Category>),
    Subcategories(Vec<Subcategory>),
    Banners(Vec<Banner>),
}
