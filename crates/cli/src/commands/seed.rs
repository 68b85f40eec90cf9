//! Seed the catalog with the initial categories and subcategories.
//!
//! Both commands are idempotent: anything whose name already exists is
//! left alone, so they can be re-run after a partial failure.

use duka_api_client::{Category, CategoryInput, Subcategory, SubcategoryInput};
use tracing::{info, warn};

use super::{CliError, login};

/// Top-level categories as `(name, description)`.
pub const CATEGORIES: [(&str, &str); 8] = [
    (
        "Electronics",
        "Electronic devices, gadgets, and accessories including computers, phones, tablets, and audio equipment.",
    ),
    (
        "Fashion",
        "Clothing, footwear, and fashion accessories for men, women, and children.",
    ),
    (
        "Home & Garden",
        "Furniture, home decor, kitchen appliances, and garden tools for your living space.",
    ),
    (
        "Sports & Outdoors",
        "Sports equipment, fitness gear, outdoor activities, and athletic wear.",
    ),
    (
        "Books & Media",
        "Books, magazines, digital media, and educational materials.",
    ),
    (
        "Beauty & Health",
        "Beauty products, skincare, makeup, health supplements, and personal care items.",
    ),
    (
        "Automotive",
        "Car parts, accessories, tools, and automotive maintenance products.",
    ),
    (
        "Toys & Games",
        "Toys, board games, video games, and entertainment products for all ages.",
    ),
];

/// Sample subcategories as `(category, name, description)`.
pub const SUBCATEGORIES: &[(&str, &str, &str)] = &[
    ("Electronics", "Laptops", "High-performance laptops for work and gaming"),
    ("Electronics", "Smartphones", "Mobile phones and devices"),
    ("Electronics", "Tablets", "Portable computing devices"),
    ("Electronics", "Audio & Headphones", "Sound equipment and accessories"),
    ("Electronics", "Monitors & Displays", "Computer displays and screens"),
    ("Electronics", "Cameras", "Digital cameras and photography equipment"),
    ("Fashion", "Men's Clothing", "Clothing for men"),
    ("Fashion", "Women's Clothing", "Clothing for women"),
    ("Fashion", "Kids' Clothing", "Clothing for children"),
    ("Fashion", "Shoes", "Footwear for all ages"),
    ("Fashion", "Bags & Wallets", "Handbags, backpacks, and wallets"),
    ("Home & Garden", "Furniture", "Home and office furniture"),
    ("Home & Garden", "Kitchen & Dining", "Kitchen appliances and dining items"),
    ("Home & Garden", "Bedding", "Bed sheets, pillows, and bedding"),
    ("Home & Garden", "Garden Tools", "Tools for gardening"),
    ("Sports & Outdoors", "Fitness Equipment", "Exercise and fitness equipment"),
    ("Sports & Outdoors", "Team Sports", "Equipment for team sports"),
    ("Sports & Outdoors", "Camping", "Camping gear and equipment"),
    ("Books & Media", "Fiction", "Fictional literature"),
    ("Books & Media", "Educational", "Educational and academic books"),
    ("Books & Media", "Children's Books", "Books for children"),
    ("Beauty & Health", "Skincare", "Skin care products"),
    ("Beauty & Health", "Hair Care", "Hair care products"),
    ("Beauty & Health", "Fragrances", "Perfumes and fragrances"),
    ("Automotive", "Car Parts", "Automotive parts and components"),
    ("Automotive", "Car Care", "Car maintenance products"),
    ("Toys & Games", "Board Games", "Traditional board games"),
    ("Toys & Games", "Educational Toys", "Learning and educational toys"),
    ("Toys & Games", "Puzzles", "Jigsaw puzzles and brain teasers"),
];

/// Categories from [`CATEGORIES`] not present in `existing`, compared
/// case-insensitively.
#[must_use]
pub fn missing_categories(existing: &[Category]) -> Vec<CategoryInput> {
    CATEGORIES
        .iter()
        .filter(|(name, _)| !existing.iter().any(|c| c.name.eq_ignore_ascii_case(name)))
        .map(|&(name, description)| CategoryInput {
            name: name.to_string(),
            description: Some(description.to_string()),
            ..CategoryInput::default()
        })
        .collect()
}

/// What seeding subcategories would do.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SubcategoryPlan {
    pub create: Vec<SubcategoryInput>,
    /// Parent names that do not exist yet.
    pub missing_parents: Vec<&'static str>,
}

/// Subcategories from [`SUBCATEGORIES`] to create under `categories`.
#[must_use]
pub fn plan_subcategories(categories: &[Category], existing: &[Subcategory]) -> SubcategoryPlan {
    let mut plan = SubcategoryPlan::default();
    for &(parent, name, description) in SUBCATEGORIES {
        let Some(category) = categories
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(parent))
        else {
            if !plan.missing_parents.contains(&parent) {
                plan.missing_parents.push(parent);
            }
            continue;
        };
        let exists = existing
            .iter()
            .any(|s| s.category_id == category.id && s.name.eq_ignore_ascii_case(name));
        if !exists {
            plan.create.push(SubcategoryInput {
                name: name.to_string(),
                description: Some(description.to_string()),
                category_id: category.id,
            });
        }
    }
    plan
}

/// Create the top-level categories.
///
/// # Errors
///
/// Returns an error if login fails or the API refuses a category.
pub async fn categories() -> Result<(), CliError> {
    let session = login().await?;
    let existing = session.client.list_categories().await?;
    let missing = missing_categories(&existing);

    if missing.is_empty() {
        info!(total = existing.len(), "All categories already exist");
        return Ok(());
    }

    for input in &missing {
        let category = session
            .client
            .create_category(&session.token, input)
            .await?;
        info!(id = %category.id, name = %category.name, "Added category");
    }

    info!(
        added = missing.len(),
        skipped = CATEGORIES.len() - missing.len(),
        "Categories seeded"
    );
    Ok(())
}

/// Create the sample subcategories.
///
/// # Errors
///
/// Returns an error if login fails or the API refuses a subcategory.
pub async fn subcategories() -> Result<(), CliError> {
    let session = login().await?;
    let (categories, existing) = tokio::try_join!(
        session.client.list_categories(),
        session.client.list_subcategories(None),
    )?;
    let plan = plan_subcategories(&categories, &existing);

    for parent in &plan.missing_parents {
        warn!(category = %parent, "Category not found; run `duka seed categories` first");
    }

    for input in &plan.create {
        let subcategory = session
            .client
            .create_subcategory(&session.token, input)
            .await?;
        info!(id = %subcategory.id, name = %subcategory.name, "Added subcategory");
    }

    info!(added = plan.create.len(), "Subcategories seeded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use duka_core::{CategoryId, SubcategoryId};

    use super::*;

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

    #[test]
    fn test_missing_categories_skips_existing_names() {
        let existing = vec![category(1, "electronics"), category(2, "Toys & Games")];
        let missing = missing_categories(&existing);
        assert_eq!(missing.len(), 6);
        assert!(missing.iter().all(|c| c.name != "Electronics"));
        assert_eq!(missing[0].name, "Fashion");
        assert!(missing[0].description.is_some());
    }

    #[test]
    fn test_plan_subcategories() {
        let categories = vec![category(1, "Electronics")];
        let existing = vec![Subcategory {
            id: SubcategoryId::new(5),
            name: "Laptops".to_string(),
            description: None,
            category_id: CategoryId::new(1),
        }];
        let plan = plan_subcategories(&categories, &existing);

        let electronics = SUBCATEGORIES
            .iter()
            .filter(|(parent, _, _)| *parent == "Electronics")
            .count();
        assert_eq!(plan.create.len(), electronics - 1);
        assert!(plan.create.iter().all(|s| s.category_id == CategoryId::new(1)));
        assert!(plan.missing_parents.contains(&"Fashion"));
        assert_eq!(plan.missing_parents.len(), CATEGORIES.len() - 1);
    }
}
