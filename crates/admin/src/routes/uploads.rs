//! Multipart forms carrying an image.

use std::collections::HashMap;

use axum::extract::Multipart;
use duka_core::validation::ValidationError;

use crate::error::{AppError, Result};

/// Name of the file input.
const FILE_FIELD: &str = "file";

/// An uploaded file, read into memory.
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Text fields of a multipart form plus its file, if one was chosen.
#[derive(Default)]
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub file: Option<Upload>,
}

impl MultipartForm {
    /// Trimmed text value; empty when the field is missing.
    pub fn text(&self, name: &str) -> &str {
        self.fields.get(name).map_or("", |v| v.trim())
    }

    /// Whether a checkbox was ticked.
    pub fn checked(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }
}

/// Read the whole form. A file input left empty yields no file.
///
/// # Errors
///
/// Returns [`AppError::BadRequest`] for a malformed body.
pub async fn read_multipart(mut multipart: Multipart) -> Result<MultipartForm> {
    let mut form = MultipartForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if name == FILE_FIELD {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            if !(file_name.is_empty() && bytes.is_empty()) {
                form.file = Some(Upload {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            form.fields.insert(name, value);
        }
    }
    Ok(form)
}

/// The first rule that failed, for a flash.
pub fn first_message(errors: &ValidationError) -> String {
    errors
        .errors
        .first()
        .map_or_else(|| errors.to_string(), |e| e.message.clone())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use duka_core::validation::validate_image;

    use super::*;

    #[test]
    fn test_first_message_picks_first_rule() {
        let errors = validate_image("notes.txt", "text/plain", usize::MAX).unwrap_err();
        assert_eq!(
            first_message(&errors),
            "Please select an image file (jpg, png, gif)"
        );
    }

    #[test]
    fn test_text_trims_and_defaults() {
        let mut form = MultipartForm::default();
        form.fields.insert("title".to_string(), "  Long rains sale ".to_string());
        form.fields.insert("active".to_string(), "on".to_string());
        assert_eq!(form.text("title"), "Long rains sale");
        assert_eq!(form.text("subtitle"), "");
        assert!(form.checked("active"));
        assert!(!form.checked("missing"));
    }
}
