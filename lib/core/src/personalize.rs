//! Per-user personalization profile
//!
//! The caller owns a [`Profile`] built from whatever preference store it
//! uses and passes it into search and feed composition. Nothing here reads
//! or writes ambient storage.

use ahash::AHashSet;
use chrono::{DateTime, Duration, Utc};
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::Product;

/// Records kept by [`Profile::record_search`]
pub const MAX_HISTORY: usize = 50;

const HISTORY_WINDOW: usize = 20;
const HISTORY_BOOST_CAP: f64 = 2.0;
const RECENCY_BOOST_CAP: f64 = 1.8;
const INTEREST_BOOST: f64 = 1.4;

const GENERAL_CATEGORY: &str = "general";

const MALE_CATEGORIES: &[(&str, f64)] = &[
    ("electronics", 1.3),
    ("automotive", 1.4),
    ("sports", 1.3),
    ("gaming", 1.5),
    ("tools", 1.4),
    ("gadgets", 1.3),
    ("fitness", 1.2),
    ("tech", 1.4),
];

const FEMALE_CATEGORIES: &[(&str, f64)] = &[
    ("fashion", 1.4),
    ("beauty", 1.5),
    ("home", 1.3),
    ("jewelry", 1.4),
    ("skincare", 1.4),
    ("makeup", 1.3),
    ("bags", 1.3),
    ("shoes", 1.3),
];

const INTEREST_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "electronics",
        &["phone", "laptop", "tablet", "headphones", "speaker", "camera", "tv", "gadget", "tech", "electronic"],
    ),
    (
        "fashion",
        &["shirt", "dress", "jeans", "jacket", "clothing", "fashion", "wear", "outfit", "style"],
    ),
    (
        "home",
        &["kitchen", "furniture", "decor", "home", "house", "room", "living", "dining", "bedroom"],
    ),
    (
        "sports",
        &["fitness", "gym", "sport", "exercise", "workout", "athletic", "running", "yoga", "training"],
    ),
    (
        "books",
        &["book", "novel", "education", "learning", "study", "reading", "literature"],
    ),
    (
        "beauty",
        &["beauty", "skincare", "makeup", "cosmetic", "face", "skin", "hair", "nail"],
    ),
    (
        "automotive",
        &["car", "auto", "vehicle", "motor", "driving", "automotive", "bike", "motorcycle"],
    ),
    (
        "toys",
        &["toy", "game", "gaming", "play", "kids", "children", "fun", "entertainment"],
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    fn category_multipliers(self) -> &'static [(&'static str, f64)] {
        match self {
            Gender::Male => MALE_CATEGORIES,
            Gender::Female => FEMALE_CATEGORIES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub gender: Gender,
    #[serde(default)]
    pub interests: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
    pub query: String,
    pub category: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub preferences: Option<Preferences>,
    #[serde(default)]
    pub history: Vec<SearchRecord>,
}

fn category_keywords(category: &str) -> &'static [&'static str] {
    INTEREST_KEYWORDS
        .iter()
        .find(|(name, _)| *name == category)
        .map(|(_, keywords)| *keywords)
        .unwrap_or(&[])
}

fn matches_category(product: &Product, category: &str) -> bool {
    let keywords = category_keywords(category);
    if keywords.is_empty() {
        return false;
    }
    let text = format!(
        "{} {} {}",
        product.title,
        product.description.as_deref().unwrap_or_default(),
        product.brand.as_deref().unwrap_or_default()
    )
    .to_lowercase();
    keywords.iter().any(|k| text.contains(k))
}

fn days_between(earlier: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - earlier).num_milliseconds() as f64 / Duration::days(1).num_milliseconds() as f64
}

/// Keep the first occurrence of every value, preserving order
fn dedup_stable(values: Vec<String>) -> Vec<String> {
    let mut seen = AHashSet::with_capacity(values.len());
    values.into_iter().filter(|v| seen.insert(v.clone())).collect()
}

impl Profile {
    pub fn new(preferences: Option<Preferences>) -> Self {
        Self {
            preferences,
            history: Vec::new(),
        }
    }

    /// First interest category whose keyword appears in `query`, else
    /// `"general"`.
    pub fn categorize_query(query: &str) -> &'static str {
        let query = query.to_lowercase();
        INTEREST_KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| query.contains(k)))
            .map(|(name, _)| *name)
            .unwrap_or(GENERAL_CATEGORY)
    }

    pub fn record_search(&mut self, query: &str, now: DateTime<Utc>) {
        self.history.push(SearchRecord {
            query: query.to_lowercase(),
            category: Self::categorize_query(query).to_string(),
            timestamp: now,
        });
        if self.history.len() > MAX_HISTORY {
            let excess = self.history.len() - MAX_HISTORY;
            self.history.drain(..excess);
        }
    }

    /// Multiplicative affinity of this profile for `product`; 1.0 is neutral.
    ///
    /// Without preferences every product scores 1.0.
    pub fn score(&self, product: &Product, now: DateTime<Utc>) -> f64 {
        let Some(preferences) = &self.preferences else {
            return 1.0;
        };

        let mut score = 1.0;
        for (category, multiplier) in preferences.gender.category_multipliers() {
            if matches_category(product, category) {
                score *= multiplier;
            }
        }
        for interest in &preferences.interests {
            if matches_category(product, interest) {
                score *= INTEREST_BOOST;
            }
        }

        score * self.history_score(product, now) * self.recency_boost(product, now)
    }

    fn history_score(&self, product: &Product, now: DateTime<Utc>) -> f64 {
        let start = self.history.len().saturating_sub(HISTORY_WINDOW);
        let mut score = 1.0;
        for record in &self.history[start..] {
            if matches_category(product, &record.category) {
                let days_ago = days_between(record.timestamp, now);
                score *= (1.5 - days_ago * 0.1).max(1.1);
            }
        }
        score.min(HISTORY_BOOST_CAP)
    }

    fn recency_boost(&self, product: &Product, now: DateTime<Utc>) -> f64 {
        let cutoff = now - Duration::hours(24);
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for record in self.history.iter().filter(|r| r.timestamp > cutoff) {
            match counts.iter_mut().find(|(c, _)| *c == record.category) {
                Some((_, n)) => *n += 1,
                None => counts.push((record.category.as_str(), 1)),
            }
        }

        let mut boost = 1.0;
        for (category, count) in counts {
            if matches_category(product, category) {
                boost *= 1.0 + count as f64 * 0.2;
            }
        }
        boost.min(RECENCY_BOOST_CAP)
    }

    /// Interests, then gender categories, then the three most searched
    /// categories; deduplicated, at most 8.
    pub fn recommended_categories(&self) -> Vec<String> {
        let Some(preferences) = &self.preferences else {
            return Vec::new();
        };

        let mut categories = preferences.interests.clone();
        categories.extend(
            preferences
                .gender
                .category_multipliers()
                .iter()
                .map(|(c, _)| c.to_string()),
        );

        let mut frequency: Vec<(&str, usize)> = Vec::new();
        for record in &self.history {
            match frequency.iter_mut().find(|(c, _)| *c == record.category) {
                Some((_, n)) => *n += 1,
                None => frequency.push((record.category.as_str(), 1)),
            }
        }
        frequency.sort_by(|a, b| b.1.cmp(&a.1));
        categories.extend(frequency.into_iter().take(3).map(|(c, _)| c.to_string()));

        let mut categories = dedup_stable(categories);
        categories.truncate(8);
        categories
    }

    /// One random keyword per interest and gender category, then recent
    /// queries longer than two characters; deduplicated, at most 6.
    pub fn suggestions<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<String> {
        let mut suggestions = Vec::new();

        if let Some(preferences) = &self.preferences {
            let categories = preferences.interests.iter().map(String::as_str).chain(
                preferences
                    .gender
                    .category_multipliers()
                    .iter()
                    .map(|(c, _)| *c),
            );
            for category in categories {
                if let Some(keyword) = category_keywords(category).choose(rng) {
                    suggestions.push(keyword.to_string());
                }
            }
        }

        let start = self.history.len().saturating_sub(10);
        suggestions.extend(
            self.history[start..]
                .iter()
                .map(|r| r.query.clone())
                .filter(|q| q.len() > 2),
        );

        let mut suggestions = dedup_stable(suggestions);
        suggestions.truncate(6);
        suggestions
    }
}
