//! Product specifications: the per-subcategory attributes (RAM, screen size,
//! fabric...) and the values individual products carry for them.

use serde::{Deserialize, Serialize};

use crate::types::{ProductId, ProductSpecificationId, SpecificationId, SubcategoryId};

/// An attribute defined on a subcategory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Specification {
    pub id: SpecificationId,
    pub name: String,
    /// Free-form hint for the input, e.g. `text` or `number`.
    #[serde(default)]
    pub value_type: String,
    #[serde(default)]
    pub subcategory_id: Option<SubcategoryId>,
}

/// A product's value for one specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSpecification {
    pub id: ProductSpecificationId,
    pub product_id: ProductId,
    pub specification_id: SpecificationId,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub specification: Option<Specification>,
}

/// A specification row on the product page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpecDetail {
    pub name: String,
    pub value: String,
    pub value_type: String,
}

fn displayable(specs: &[ProductSpecification]) -> impl Iterator<Item = (&Specification, &str)> {
    specs.iter().filter_map(|spec| {
        let definition = spec.specification.as_ref()?;
        (!spec.value.is_empty()).then_some((definition, spec.value.as_str()))
    })
}

/// One-line summary for product cards, e.g. `RAM: 8GB, Storage: 256GB`.
///
/// Values without a definition or with an empty value are skipped.
#[must_use]
pub fn format_inline(specs: &[ProductSpecification]) -> String {
    displayable(specs)
        .map(|(definition, value)| format!("{}: {value}", definition.name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Rows for the specifications tab of the product page.
#[must_use]
pub fn format_detail(specs: &[ProductSpecification]) -> Vec<SpecDetail> {
    displayable(specs)
        .map(|(definition, value)| SpecDetail {
            name: definition.name.clone(),
            value: value.to_string(),
            value_type: definition.value_type.clone(),
        })
        .collect()
}

/// Specifications whose name contains `needle`, ignoring case.
#[must_use]
pub fn matching<'a>(specs: &'a [ProductSpecification], needle: &str) -> Vec<&'a ProductSpecification> {
    let needle = needle.to_lowercase();
    specs
        .iter()
        .filter(|spec| {
            spec.specification
                .as_ref()
                .is_some_and(|d| d.name.to_lowercase().contains(&needle))
        })
        .collect()
}

/// Specification definitions whose name or value type contains `needle`,
/// ignoring case. Backs the admin search box.
#[must_use]
pub fn search_definitions<'a>(definitions: &'a [Specification], needle: &str) -> Vec<&'a Specification> {
    let needle = needle.trim().to_lowercase();
    definitions
        .iter()
        .filter(|d| {
            needle.is_empty()
                || d.name.to_lowercase().contains(&needle)
                || d.value_type.to_lowercase().contains(&needle)
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn spec(id: i64, name: Option<&str>, value: &str) -> ProductSpecification {
        ProductSpecification {
            id: ProductSpecificationId::new(id),
            product_id: ProductId::new(1),
            specification_id: SpecificationId::new(id),
            value: value.to_string(),
            specification: name.map(|n| Specification {
                id: SpecificationId::new(id),
                name: n.to_string(),
                value_type: "text".to_string(),
                subcategory_id: Some(SubcategoryId::new(5)),
            }),
        }
    }

    #[test]
    fn test_format_inline_skips_incomplete() {
        let specs = vec![
            spec(1, Some("RAM"), "8GB"),
            spec(2, None, "orphan"),
            spec(3, Some("Colour"), ""),
            spec(4, Some("Storage"), "256GB"),
        ];
        assert_eq!(format_inline(&specs), "RAM: 8GB, Storage: 256GB");
        assert_eq!(format_inline(&[]), "");
    }

    #[test]
    fn test_format_detail() {
        let rows = format_detail(&[spec(1, Some("RAM"), "8GB"), spec(2, None, "x")]);
        assert_eq!(
            rows,
            vec![SpecDetail {
                name: "RAM".to_string(),
                value: "8GB".to_string(),
                value_type: "text".to_string(),
            }]
        );
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let specs = vec![
            spec(1, Some("Screen Size"), "6.1in"),
            spec(2, Some("Battery"), "4000mAh"),
            spec(3, None, "x"),
        ];
        let found = matching(&specs, "screen");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value, "6.1in");
    }

    #[test]
    fn test_search_definitions() {
        let defs: Vec<Specification> = [spec(1, Some("Weight"), "")]
            .into_iter()
            .filter_map(|s| s.specification)
            .collect();
        assert_eq!(search_definitions(&defs, "TEXT").len(), 1);
        assert_eq!(search_definitions(&defs, "").len(), 1);
        assert!(search_definitions(&defs, "colour").is_empty());
    }
}
