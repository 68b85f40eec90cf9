//! Validation for the admin forms.
//!
//! The API validates again on its side; these checks exist so an admin gets
//! every problem with a form at once instead of one API round-trip each.

use rust_decimal::Decimal;

/// Largest accepted image upload, 20 MiB.
pub const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

/// Most images a product can carry.
pub const MAX_PRODUCT_IMAGES: usize = 5;

/// Shortest password accepted for a staff account.
pub const MIN_ADMIN_PASSWORD_LENGTH: usize = 8;

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];

/// One failed rule, tied to the form field it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// All failed rules for a form.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Default)]
#[error("Please fix the errors in the form")]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    /// Message for a field, if that field failed.
    #[must_use]
    pub fn for_field(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    fn into_result(self) -> Result<(), Self> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// The numeric and text fields of the product form, already parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDraft {
    pub name: String,
    pub cost: Decimal,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub stock_quantity: i64,
    pub barcode: i64,
    pub discount: Decimal,
}

/// Check a product form.
///
/// # Errors
///
/// Returns every failed rule: name required, cost, price and original
/// price above zero, stock not negative, barcode positive and discount
/// within 0 to 100.
pub fn validate_product(draft: &ProductDraft) -> Result<(), ValidationError> {
    let mut errors = ValidationError::default();

    if draft.name.trim().is_empty() {
        errors.push("name", "Product name is required");
    }
    if draft.cost <= Decimal::ZERO {
        errors.push("cost", "Cost must be greater than 0");
    }
    if draft.price <= Decimal::ZERO {
        errors.push("price", "Price must be greater than 0");
    }
    if draft.original_price.is_some_and(|p| p <= Decimal::ZERO) {
        errors.push("original_price", "Original price must be greater than 0");
    }
    if draft.stock_quantity < 0 {
        errors.push("stock_quantity", "Stock quantity cannot be negative");
    }
    if draft.barcode <= 0 {
        errors.push("barcode", "Barcode must be a positive number");
    }
    if draft.discount < Decimal::ZERO || draft.discount > Decimal::ONE_HUNDRED {
        errors.push("discount", "Discount must be between 0 and 100");
    }

    errors.into_result()
}

/// Check a category or subcategory name.
///
/// # Errors
///
/// Returns an error when the trimmed name is empty.
pub fn validate_category_name(name: &str) -> Result<(), ValidationError> {
    let mut errors = ValidationError::default();
    if name.trim().is_empty() {
        errors.push("name", "Name is required");
    }
    errors.into_result()
}

/// Check a specification definition.
///
/// # Errors
///
/// Returns an error when the name or value type is empty.
pub fn validate_specification(name: &str, value_type: &str) -> Result<(), ValidationError> {
    let mut errors = ValidationError::default();
    if name.trim().is_empty() {
        errors.push("name", "Specification name is required");
    }
    if value_type.trim().is_empty() {
        errors.push("value_type", "Value type is required");
    }
    errors.into_result()
}

/// Check an uploaded image before forwarding it to the API.
///
/// # Errors
///
/// Rejects non-image content types, extensions other than jpg, jpeg, png
/// and gif, and files larger than [`MAX_IMAGE_BYTES`].
pub fn validate_image(file_name: &str, content_type: &str, size: usize) -> Result<(), ValidationError> {
    let mut errors = ValidationError::default();

    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if !content_type.starts_with("image/") || !IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        errors.push("file", "Please select an image file (jpg, png, gif)");
    }
    if size > MAX_IMAGE_BYTES {
        errors.push("file", "Image size must be less than 20MB");
    }

    errors.into_result()
}

/// Check that a product can take one more image.
///
/// # Errors
///
/// Returns an error once [`MAX_PRODUCT_IMAGES`] is reached.
pub fn validate_image_count(existing: usize) -> Result<(), ValidationError> {
    let mut errors = ValidationError::default();
    if existing >= MAX_PRODUCT_IMAGES {
        errors.push("file", format!("Maximum {MAX_PRODUCT_IMAGES} images allowed"));
    }
    errors.into_result()
}

/// Check the new-admin form.
///
/// # Errors
///
/// Returns every failed rule: username and email required, password at
/// least [`MIN_ADMIN_PASSWORD_LENGTH`] characters and matching its
/// confirmation.
pub fn validate_admin_account(
    username: &str,
    email: &str,
    password: &str,
    password_confirm: &str,
) -> Result<(), ValidationError> {
    let mut errors = ValidationError::default();
    if username.trim().is_empty() || email.trim().is_empty() {
        errors.push("username", "Username and email are required");
    } else if crate::Email::parse(email).is_err() {
        errors.push("email", "Please enter a valid email address");
    }
    if password != password_confirm {
        errors.push("password_confirm", "Passwords do not match");
    }
    if password.chars().count() < MIN_ADMIN_PASSWORD_LENGTH {
        errors.push(
            "password",
            format!("Password must be at least {MIN_ADMIN_PASSWORD_LENGTH} characters long"),
        );
    }
    errors.into_result()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn draft() -> ProductDraft {
        ProductDraft {
            name: "Kikoy Towel".to_string(),
            cost: Decimal::from(400),
            price: Decimal::from(650),
            original_price: Some(Decimal::from(800)),
            stock_quantity: 12,
            barcode: 600_123,
            discount: Decimal::from(10),
        }
    }

    #[test]
    fn test_valid_product() {
        assert!(validate_product(&draft()).is_ok());
        let mut no_original = draft();
        no_original.original_price = None;
        no_original.stock_quantity = 0;
        no_original.discount = Decimal::ONE_HUNDRED;
        assert!(validate_product(&no_original).is_ok());
    }

    #[test]
    fn test_product_collects_all_errors() {
        let bad = ProductDraft {
            name: "  ".to_string(),
            cost: Decimal::ZERO,
            price: Decimal::from(-1),
            original_price: Some(Decimal::ZERO),
            stock_quantity: -1,
            barcode: 0,
            discount: Decimal::from(101),
        };
        let err = validate_product(&bad).unwrap_err();
        assert_eq!(err.errors.len(), 7);
        assert_eq!(err.for_field("name"), Some("Product name is required"));
        assert_eq!(err.for_field("discount"), Some("Discount must be between 0 and 100"));
        assert_eq!(err.to_string(), "Please fix the errors in the form");
    }

    #[test]
    fn test_category_and_specification() {
        assert!(validate_category_name("Electronics").is_ok());
        assert!(validate_category_name(" ").is_err());
        assert!(validate_specification("RAM", "text").is_ok());
        let err = validate_specification("", "").unwrap_err();
        assert_eq!(err.errors.len(), 2);
    }

    #[test]
    fn test_image_rules() {
        assert!(validate_image("shoe.JPG", "image/jpeg", 1024).is_ok());
        assert!(validate_image("shoe.webp", "image/webp", 1024).is_err());
        assert!(validate_image("notes.png", "text/plain", 10).is_err());
        let err = validate_image("big.png", "image/png", MAX_IMAGE_BYTES + 1).unwrap_err();
        assert_eq!(err.for_field("file"), Some("Image size must be less than 20MB"));
        assert!(validate_image("exact.gif", "image/gif", MAX_IMAGE_BYTES).is_ok());
    }

    #[test]
    fn test_admin_account() {
        assert!(validate_admin_account("otieno", "otieno@duka.co.ke", "s3cure-pass", "s3cure-pass").is_ok());

        let err = validate_admin_account(" ", "", "short", "other").unwrap_err();
        assert_eq!(err.for_field("username"), Some("Username and email are required"));
        assert_eq!(err.for_field("password_confirm"), Some("Passwords do not match"));
        assert_eq!(
            err.for_field("password"),
            Some("Password must be at least 8 characters long")
        );

        let err = validate_admin_account("otieno", "not-an-email", "s3cure-pass", "s3cure-pass").unwrap_err();
        assert_eq!(err.errors.len(), 1);
        assert!(err.for_field("email").is_some());
    }

    #[test]
    fn test_image_count() {
        assert!(validate_image_count(4).is_ok());
        assert!(validate_image_count(5).is_err());
    }
}
