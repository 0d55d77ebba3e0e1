//! Platform classification
//!
//! Maps free-form marketplace names onto canonical buckets by substring
//! match on the normalized name. Rules are data, so a new marketplace is a
//! new [`PlatformRule`], not a new code path.

use serde::{Deserialize, Serialize};

use crate::normalize::normalize;
use crate::{Error, Result};

/// Bucket for every platform no rule matches
pub const OTHER_BUCKET: &str = "other";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformRule {
    pub bucket: String,
    /// Substrings searched for in the normalized platform name
    pub patterns: Vec<String>,
}

impl PlatformRule {
    pub fn new(bucket: impl Into<String>, patterns: &[&str]) -> Self {
        Self {
            bucket: bucket.into(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Ordered classification table. The first matching rule wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<PlatformRule>", into = "Vec<PlatformRule>")]
pub struct PlatformTable {
    rules: Vec<PlatformRule>,
}

impl Default for PlatformTable {
    fn default() -> Self {
        Self::new(vec![
            PlatformRule::new("meesho", &["meesho"]),
            PlatformRule::new("ajio", &["ajio"]),
            PlatformRule::new("amazon", &["amazon"]),
        ])
    }
}

impl From<Vec<PlatformRule>> for PlatformTable {
    fn from(rules: Vec<PlatformRule>) -> Self {
        Self::new(rules)
    }
}

impl From<PlatformTable> for Vec<PlatformRule> {
    fn from(table: PlatformTable) -> Self {
        table.rules
    }
}

/// A named group of items produced by [`PlatformTable::partition`]
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket<T> {
    pub name: String,
    pub items: Vec<T>,
}

impl<T> Bucket<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
        }
    }

    #[must_use]
    pub fn map_items<U>(self, f: impl FnOnce(Vec<T>) -> Vec<U>) -> Bucket<U> {
        Bucket {
            name: self.name,
            items: f(self.items),
        }
    }
}

impl PlatformTable {
    pub fn new(rules: Vec<PlatformRule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| PlatformRule {
                bucket: rule.bucket,
                patterns: rule.patterns.iter().map(|p| normalize(p)).collect(),
            })
            .collect();
        Self { rules }
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            if rule.bucket == OTHER_BUCKET {
                return Err(Error::InvalidConfig(format!(
                    "bucket name '{OTHER_BUCKET}' is reserved"
                )));
            }
            if seen.contains(&rule.bucket.as_str()) {
                return Err(Error::InvalidConfig(format!(
                    "duplicate platform bucket: {}",
                    rule.bucket
                )));
            }
            if rule.patterns.is_empty() || rule.patterns.iter().any(|p| p.trim().is_empty()) {
                return Err(Error::InvalidConfig(format!(
                    "platform bucket '{}' needs non-empty patterns",
                    rule.bucket
                )));
            }
            seen.push(rule.bucket.as_str());
        }
        Ok(())
    }

    pub fn rules(&self) -> &[PlatformRule] {
        &self.rules
    }

    /// Bucket names in table order, ending with [`OTHER_BUCKET`]
    pub fn bucket_names(&self) -> impl Iterator<Item = &str> {
        self.rules
            .iter()
            .map(|r| r.bucket.as_str())
            .chain(std::iter::once(OTHER_BUCKET))
    }

    pub fn classify(&self, platform: &str) -> &str {
        let platform = normalize(platform);
        self.rules
            .iter()
            .find(|rule| rule.patterns.iter().any(|p| platform.contains(p.as_str())))
            .map(|rule| rule.bucket.as_str())
            .unwrap_or(OTHER_BUCKET)
    }

    /// One empty bucket per table entry, in table order
    pub fn empty_buckets<T>(&self) -> Vec<Bucket<T>> {
        self.bucket_names().map(Bucket::new).collect()
    }

    /// Split `items` into one bucket per table entry, preserving input order
    /// within each bucket.
    pub fn partition<T>(
        &self,
        items: impl IntoIterator<Item = T>,
        platform_of: impl Fn(&T) -> &str,
    ) -> Vec<Bucket<T>> {
        let mut buckets = self.empty_buckets();
        let other = buckets.len() - 1;
        for item in items {
            let name = self.classify(platform_of(&item));
            let idx = self
                .rules
                .iter()
                .position(|r| r.bucket == name)
                .unwrap_or(other);
            buckets[idx].items.push(item);
        }
        buckets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_substring() {
        let table = PlatformTable::default();
        assert_eq!(table.classify("Meesho"), "meesho");
        assert_eq!(table.classify("meesho-supplier-hub"), "meesho");
        assert_eq!(table.classify("AJIO.com"), "ajio");
        assert_eq!(table.classify("Amazon India"), "amazon");
        assert_eq!(table.classify("Flipkart"), OTHER_BUCKET);
        assert_eq!(table.classify(""), OTHER_BUCKET);
    }

    #[test]
    fn test_new_platform_is_data() {
        let table = PlatformTable::new(vec![
            PlatformRule::new("flipkart", &["flipkart", "fkrt"]),
            PlatformRule::new("meesho", &["Meesho"]),
        ]);
        assert_eq!(table.classify("FKRT store"), "flipkart");
        assert_eq!(table.classify("MEESHO"), "meesho");
        assert_eq!(
            table.bucket_names().collect::<Vec<_>>(),
            vec!["flipkart", "meesho", OTHER_BUCKET]
        );
    }

    #[test]
    fn test_partition_preserves_order() {
        let table = PlatformTable::default();
        let items = vec![("a", "Amazon"), ("b", "Meesho"), ("c", "Myntra"), ("d", "meesho")];
        let buckets = table.partition(items, |(_, platform)| *platform);

        assert_eq!(buckets.len(), 4);
        assert_eq!(buckets[0].name, "meesho");
        assert_eq!(
            buckets[0].items.iter().map(|(id, _)| *id).collect::<Vec<_>>(),
            vec!["b", "d"]
        );
        assert!(buckets[1].items.is_empty());
        assert_eq!(buckets[2].items.len(), 1);
        assert_eq!(buckets[3].name, OTHER_BUCKET);
        assert_eq!(buckets[3].items[0].0, "c");
    }

    #[test]
    fn test_deserialize_normalizes_patterns() {
        let table: PlatformTable = serde_json::from_value(serde_json::json!([
            { "bucket": "nykaa", "patterns": ["Nykaa"] }
        ]))
        .unwrap();
        assert_eq!(table.classify("NYKAA Fashion"), "nykaa");
    }

    #[test]
    fn test_validate() {
        assert!(PlatformTable::default().validate().is_ok());

        let reserved = PlatformTable::new(vec![PlatformRule::new("other", &["x"])]);
        assert!(reserved.validate().is_err());

        let empty = PlatformTable::new(vec![PlatformRule::new("x", &["!!"])]);
        assert!(empty.validate().is_err());

        let dup = PlatformTable::new(vec![
            PlatformRule::new("x", &["x"]),
            PlatformRule::new("x", &["y"]),
        ]);
        assert!(dup.validate().is_err());
    }
}
