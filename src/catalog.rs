//! JSON catalog adapter
//!
//! Reads a catalog snapshot exported as a JSON array of products. Products
//! without an id or title are skipped, and only the first product with a
//! given id is kept, so downstream orderings never see duplicates.

use ahash::AHashSet;
use marketnav_core::{Product, Result};
use std::path::Path;
use tracing::{info, warn};

pub fn parse_catalog(json: &str) -> Result<Vec<Product>> {
    let products: Vec<Product> = serde_json::from_str(json)?;
    let total = products.len();

    let mut seen = AHashSet::with_capacity(total);
    let catalog: Vec<Product> = products
        .into_iter()
        .filter(|p| {
            if p.id.trim().is_empty() || p.title.trim().is_empty() {
                warn!(id = %p.id, "skipping product without id or title");
                return false;
            }
            if !seen.insert(p.id.clone()) {
                warn!(id = %p.id, "skipping duplicate product id");
                return false;
            }
            true
        })
        .collect();

    if catalog.len() != total {
        info!(kept = catalog.len(), total, "catalog cleaned");
    }
    Ok(catalog)
}

pub fn load_catalog(path: &Path) -> Result<Vec<Product>> {
    let raw = std::fs::read_to_string(path)?;
    let catalog = parse_catalog(&raw)?;
    info!(path = %path.display(), products = catalog.len(), "catalog loaded");
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_camel_case_products() {
        let catalog = parse_catalog(
            r#"[
                {"id": "1", "title": "Red Kurti", "price": "₹499", "currency": "INR",
                 "platform": "Meesho", "keywords": "women,ethnic", "rating": 4.2,
                 "image": "https://img.example/1.jpg"},
                {"id": "2", "title": "Blue Jeans"}
            ]"#,
        )
        .unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog[0].keywords.as_deref(), Some("women,ethnic"));
        assert_eq!(catalog[0].rating, Some(4.2));
        assert_eq!(catalog[1].price, "");
        assert!(catalog[1].brand.is_none());
    }

    #[test]
    fn test_drops_duplicates_and_blank_ids() {
        let catalog = parse_catalog(
            r#"[
                {"id": "1", "title": "First"},
                {"id": "1", "title": "Second"},
                {"id": " ", "title": "Nameless"},
                {"id": "3", "title": ""}
            ]"#,
        )
        .unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].title, "First");
    }

    #[test]
    fn test_rejects_non_array() {
        assert!(parse_catalog(r#"{"id": "1"}"#).is_err());
    }
}
