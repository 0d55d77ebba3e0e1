use serde::{Deserialize, Serialize};

use crate::Product;

/// A named list of lowercase substrings identifying a product category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordFamily {
    pub name: String,
    pub keywords: Vec<String>,
}

impl KeywordFamily {
    pub fn new(name: impl Into<String>, keywords: &[&str]) -> Self {
        Self {
            name: name.into(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }
}

/// Preferred-category families. Products matching any family are placed
/// ahead of the rest of their platform bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryBias {
    pub families: Vec<KeywordFamily>,
}

impl Default for CategoryBias {
    fn default() -> Self {
        Self {
            families: vec![
                KeywordFamily::new(
                    "womens-fashion",
                    &[
                        "women", "kurti", "saree", "dress", "top", "tshirt", "shirt", "jeans",
                        "leggings", "salwar", "ethnic",
                    ],
                ),
                KeywordFamily::new(
                    "mens-fashion",
                    &["men", "tracks", "jogger", "hoodie", "jacket", "cargo", "pant"],
                ),
                KeywordFamily::new(
                    "footwear",
                    &["shoe", "sandal", "sneaker", "flip flop", "footwear"],
                ),
                KeywordFamily::new(
                    "skincare",
                    &["face wash", "cleanser", "facewash", "skin", "beauty", "cosmetic"],
                ),
            ],
        }
    }
}

impl CategoryBias {
    /// No preferred categories; every product ranks as "rest"
    pub fn none() -> Self {
        Self {
            families: Vec::new(),
        }
    }

    pub fn is_preferred(&self, product: &Product) -> bool {
        if self.families.is_empty() {
            return false;
        }
        let text = product.category_text();
        self.families
            .iter()
            .flat_map(|f| f.keywords.iter())
            .any(|k| text.contains(k.as_str()))
    }
}
