// Structural product filters applied after query matching
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::normalize::{normalize, parse_price};
use crate::{Error, Product};

pub trait Filter {
    fn matches(&self, product: &Product) -> bool;
}

/// Requested result ordering. `None` in [`SearchFilters::sort_by`] means the
/// platform-fair interleave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortBy {
    Relevance,
    PriceLow,
    PriceHigh,
    Rating,
}

impl FromStr for SortBy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "relevance" => Ok(SortBy::Relevance),
            "price-low" => Ok(SortBy::PriceLow),
            "price-high" => Ok(SortBy::PriceHigh),
            "rating" => Ok(SortBy::Rating),
            other => Err(Error::InvalidConfig(format!("unknown sort key: {other}"))),
        }
    }
}

/// User-facing search filters. Every supplied filter must pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchFilters {
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub platforms: Vec<String>,
    pub brands: Vec<String>,
    pub min_rating: Option<f64>,
    pub sort_by: Option<SortBy>,
}

impl SearchFilters {
    #[must_use]
    pub fn sorted(mut self, sort_by: SortBy) -> Self {
        self.sort_by = Some(sort_by);
        self
    }

    /// True when `other` selects the same products, ignoring the sort key.
    pub fn same_selection(&self, other: &SearchFilters) -> bool {
        self.min_price == other.min_price
            && self.max_price == other.max_price
            && self.platforms == other.platforms
            && self.brands == other.brands
            && self.min_rating == other.min_rating
    }

    /// Compile the supplied filters into one conjunction.
    pub fn to_condition(&self) -> FilterCondition {
        let mut conditions = Vec::new();

        if self.min_price.is_some() || self.max_price.is_some() {
            conditions.push(FilterCondition::PriceRange {
                min: self.min_price.unwrap_or(0.0),
                max: self.max_price.unwrap_or(f64::INFINITY),
            });
        }
        if !self.platforms.is_empty() {
            conditions.push(FilterCondition::PlatformIn(
                self.platforms.iter().map(|p| normalize(p)).collect(),
            ));
        }
        if !self.brands.is_empty() {
            conditions.push(FilterCondition::BrandContains(
                self.brands.iter().map(|b| normalize(b)).collect(),
            ));
        }
        if let Some(min) = self.min_rating {
            conditions.push(FilterCondition::MinRating(min));
        }

        FilterCondition::And(conditions)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterCondition {
    /// Inclusive bounds. Products whose price does not parse are excluded.
    PriceRange { min: f64, max: f64 },
    /// Normalized platform must equal one of the (normalized) values
    PlatformIn(Vec<String>),
    /// Normalized brand, or title when no brand is set, must contain one of
    /// the (normalized) values
    BrandContains(Vec<String>),
    /// Products without a rating pass
    MinRating(f64),
    And(Vec<FilterCondition>),
}

impl FilterCondition {
    fn matches_condition(condition: &FilterCondition, product: &Product) -> bool {
        match condition {
            FilterCondition::PriceRange { min, max } => parse_price(&product.price)
                .map(|price| price >= *min && price <= *max)
                .unwrap_or(false),
            FilterCondition::PlatformIn(platforms) => {
                let platform = normalize(&product.platform);
                platforms.iter().any(|p| *p == platform)
            }
            FilterCondition::BrandContains(brands) => {
                let brand = product
                    .brand
                    .as_deref()
                    .filter(|b| !b.trim().is_empty())
                    .unwrap_or(&product.title);
                let brand = normalize(brand);
                brands.iter().any(|b| brand.contains(b.as_str()))
            }
            FilterCondition::MinRating(min) => product.rating.map(|r| r >= *min).unwrap_or(true),
            FilterCondition::And(conditions) => conditions
                .iter()
                .all(|c| Self::matches_condition(c, product)),
        }
    }
}

impl Filter for FilterCondition {
    fn matches(&self, product: &Product) -> bool {
        Self::matches_condition(self, product)
    }
}

impl Filter for SearchFilters {
    fn matches(&self, product: &Product) -> bool {
        self.to_condition().matches(product)
    }
}
