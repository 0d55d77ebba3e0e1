use serde::{Deserialize, Serialize};

use crate::normalize::parse_price;
use crate::{Error, Result};

/// A catalog product as delivered by the catalog provider.
///
/// Products are treated as immutable values: ranking never writes scratch
/// state onto them. Per-query relevance travels next to the product in a
/// [`SearchHit`](crate::SearchHit) instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub title: String,
    /// Display price, possibly with currency symbols and separators
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub currency: String,
    /// Origin marketplace, free-form (e.g. "Meesho", "amazon.in")
    #[serde(default)]
    pub platform: String,
    /// Comma-separated tags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Image URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl Product {
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_keywords(mut self, keywords: impl Into<String>) -> Self {
        self.keywords = Some(keywords.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_price(mut self, price: impl Into<String>) -> Self {
        self.price = price.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Numeric price, or [`Error::MalformedPrice`] when the display string
    /// carries no number.
    pub fn price_value(&self) -> Result<f64> {
        parse_price(&self.price).ok_or_else(|| Error::MalformedPrice(self.price.clone()))
    }

    /// Price used as a sort key. Unparsable prices sort as 0.
    #[inline]
    pub fn price_or_zero(&self) -> f64 {
        parse_price(&self.price).unwrap_or(0.0)
    }

    /// Rating used as a sort key. Missing ratings sort as 0.
    #[inline]
    pub fn rating_or_zero(&self) -> f64 {
        self.rating.unwrap_or(0.0)
    }

    /// Lowercased `title + " " + keywords`, the text preferred-category
    /// families are matched against.
    pub fn category_text(&self) -> String {
        format!(
            "{} {}",
            self.title,
            self.keywords.as_deref().unwrap_or_default()
        )
        .to_lowercase()
    }
}

/// A product matched by a search, with the relevance weight computed for
/// that one call.
///
/// Relevance is 2 when both title and keywords contain the query and 1 when
/// exactly one of them does.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub product: Product,
    pub relevance: u8,
}

impl SearchHit {
    #[inline]
    pub fn id(&self) -> &str {
        &self.product.id
    }
}
