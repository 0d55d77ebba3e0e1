//! Free-text search ranking
//!
//! A product matches when its normalized title or keywords contain the
//! normalized query. Matches pass through the structural filters and are
//! then either sorted by an explicit key or interleaved across platforms.
//!
//! Relevance is computed per call and carried in [`SearchHit`]; the catalog
//! is never written to.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

use crate::category::CategoryBias;
use crate::filter::{Filter, SearchFilters, SortBy};
use crate::interleave::{interleave, prioritize, InterleavePlan};
use crate::normalize::normalize;
use crate::personalize::Profile;
use crate::platform::PlatformTable;
use crate::{Product, Result, SearchHit};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketCap {
    pub bucket: String,
    pub max: usize,
}

impl BucketCap {
    pub fn new(bucket: impl Into<String>, max: usize) -> Self {
        Self {
            bucket: bucket.into(),
            max,
        }
    }
}

/// Limits for [`SearchSession::preview`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreviewConfig {
    pub caps: Vec<BucketCap>,
    /// Cap for buckets not listed in `caps`
    pub default_cap: usize,
    /// Scanning stops once this many matches are sampled
    pub max_matches: usize,
    /// Length of the returned preview
    pub limit: usize,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            caps: vec![
                BucketCap::new("meesho", 40),
                BucketCap::new("ajio", 30),
                BucketCap::new("amazon", 20),
            ],
            default_cap: 20,
            max_matches: 110,
            limit: 30,
        }
    }
}

impl PreviewConfig {
    fn cap_for(&self, bucket: &str) -> usize {
        self.caps
            .iter()
            .find(|c| c.bucket == bucket)
            .map(|c| c.max)
            .unwrap_or(self.default_cap)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchConfig {
    pub platforms: PlatformTable,
    pub plan: InterleavePlan,
    pub bias: CategoryBias,
    pub preview: PreviewConfig,
}

impl SearchConfig {
    pub fn validate(&self) -> Result<()> {
        self.platforms.validate()?;
        self.plan.validate()
    }
}

/// Normalized, trimmed query text. Empty means "no results".
pub fn normalized_query(query: &str) -> String {
    normalize(query).trim().to_string()
}

/// Relevance weight of `product` for an already normalized query: 2 when
/// both title and keywords contain it, 1 when one does, 0 otherwise.
pub fn relevance(query: &str, product: &Product) -> u8 {
    let in_title = normalize(&product.title).contains(query);
    let in_keywords = product
        .keywords
        .as_deref()
        .map(|k| normalize(k).contains(query))
        .unwrap_or(false);
    u8::from(in_title) + u8::from(in_keywords)
}

/// Sort hits strictly by `key`. The sort is stable.
pub fn sort_hits(mut hits: Vec<SearchHit>, key: SortBy) -> Vec<SearchHit> {
    match key {
        SortBy::Relevance => hits.sort_by(|a, b| b.relevance.cmp(&a.relevance)),
        SortBy::PriceLow => hits.sort_by(|a, b| {
            a.product
                .price_or_zero()
                .partial_cmp(&b.product.price_or_zero())
                .unwrap_or(Ordering::Equal)
        }),
        SortBy::PriceHigh => hits.sort_by(|a, b| {
            b.product
                .price_or_zero()
                .partial_cmp(&a.product.price_or_zero())
                .unwrap_or(Ordering::Equal)
        }),
        SortBy::Rating => hits.sort_by(|a, b| {
            b.product
                .rating_or_zero()
                .partial_cmp(&a.product.rating_or_zero())
                .unwrap_or(Ordering::Equal)
        }),
    }
    hits
}

fn interleave_hits<R: Rng + ?Sized>(
    hits: Vec<SearchHit>,
    config: &SearchConfig,
    profile: Option<&Profile>,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Vec<SearchHit> {
    let scored = hits.into_iter().map(|hit| {
        let affinity = profile.map_or(1.0, |p| p.score(&hit.product, now));
        (hit, affinity)
    });
    let buckets = config
        .platforms
        .partition(scored, |(hit, _)| hit.product.platform.as_str())
        .into_iter()
        .map(|bucket| {
            bucket.map_items(|items| {
                prioritize(
                    items,
                    |(hit, _)| config.bias.is_preferred(&hit.product),
                    |(hit, affinity)| (hit.relevance, *affinity),
                    &mut *rng,
                )
            })
        })
        .collect();

    interleave(buckets, &config.plan)
        .into_iter()
        .map(|(hit, _)| hit)
        .collect()
}

fn order_hits<R: Rng + ?Sized>(
    hits: Vec<SearchHit>,
    sort_by: Option<SortBy>,
    config: &SearchConfig,
    profile: Option<&Profile>,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Vec<SearchHit> {
    match sort_by {
        Some(key) => sort_hits(hits, key),
        None => interleave_hits(hits, config, profile, now, rng),
    }
}

/// Rank `catalog` against `query`.
///
/// A blank query returns no results. With no sort key the matches are
/// interleaved across platforms; within a platform, preferred-category items
/// come first, then higher relevance, then higher profile affinity.
pub fn search<R: Rng + ?Sized>(
    query: &str,
    catalog: &[Product],
    filters: &SearchFilters,
    config: &SearchConfig,
    profile: Option<&Profile>,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Vec<SearchHit> {
    let query = normalized_query(query);
    if query.is_empty() {
        return Vec::new();
    }

    let condition = filters.to_condition();
    let hits: Vec<SearchHit> = catalog
        .iter()
        .filter_map(|product| {
            let relevance = relevance(&query, product);
            (relevance > 0 && condition.matches(product)).then(|| SearchHit {
                product: product.clone(),
                relevance,
            })
        })
        .collect();

    debug!(
        query = %query,
        catalog = catalog.len(),
        matched = hits.len(),
        sort_by = ?filters.sort_by,
        "search"
    );

    order_hits(hits, filters.sort_by, config, profile, now, rng)
}

/// Capped per-platform sample of matches for a fast first paint.
///
/// Filters are not applied. The sample is interleaved like a full search and
/// truncated to [`PreviewConfig::limit`].
pub fn preview<R: Rng + ?Sized>(
    query: &str,
    catalog: &[Product],
    config: &SearchConfig,
    rng: &mut R,
) -> Vec<SearchHit> {
    let query = normalized_query(query);
    if query.is_empty() {
        return Vec::new();
    }

    let caps = &config.preview;
    let mut buckets = config.platforms.empty_buckets::<SearchHit>();
    let mut sampled = 0usize;

    for product in catalog {
        if sampled >= caps.max_matches {
            break;
        }
        let relevance = relevance(&query, product);
        if relevance == 0 {
            continue;
        }
        let name = config.platforms.classify(&product.platform);
        let cap = caps.cap_for(name);
        if let Some(bucket) = buckets.iter_mut().find(|b| b.name == name) {
            if bucket.items.len() < cap {
                bucket.items.push(SearchHit {
                    product: product.clone(),
                    relevance,
                });
                sampled += 1;
            }
        }
    }

    let buckets = buckets
        .into_iter()
        .map(|bucket| {
            bucket.map_items(|items| {
                prioritize(
                    items,
                    |hit| config.bias.is_preferred(&hit.product),
                    |hit| hit.relevance,
                    &mut *rng,
                )
            })
        })
        .collect();

    let mut hits = interleave(buckets, &config.plan);
    hits.truncate(caps.limit);
    hits
}

#[derive(Debug, Clone)]
struct LastSearch {
    query: String,
    filters: SearchFilters,
    hits: Vec<SearchHit>,
}

/// Search state across calls from one user.
///
/// Reissuing the previous query with the same structural filters, changing
/// at most the sort key, reorders the previous result set instead of
/// re-running the match. The catalog argument is not consulted on that path.
#[derive(Debug, Clone, Default)]
pub struct SearchSession {
    config: SearchConfig,
    last: Option<LastSearch>,
}

impl SearchSession {
    pub fn new(config: SearchConfig) -> Self {
        Self { config, last: None }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Normalized text of the previous query
    pub fn last_query(&self) -> Option<&str> {
        self.last.as_ref().map(|l| l.query.as_str())
    }

    pub fn reset(&mut self) {
        self.last = None;
    }

    pub fn search<R: Rng + ?Sized>(
        &mut self,
        query: &str,
        catalog: &[Product],
        filters: &SearchFilters,
        profile: Option<&Profile>,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Vec<SearchHit> {
        let normalized = normalized_query(query);

        if let Some(last) = self.last.as_mut() {
            if !normalized.is_empty()
                && last.query == normalized
                && last.filters.same_selection(filters)
            {
                debug!(query = %normalized, sort_by = ?filters.sort_by, "re-sorting previous results");
                let hits = std::mem::take(&mut last.hits);
                last.hits = order_hits(hits, filters.sort_by, &self.config, profile, now, rng);
                last.filters = filters.clone();
                return last.hits.clone();
            }
        }

        let hits = search(query, catalog, filters, &self.config, profile, now, rng);
        self.last = Some(LastSearch {
            query: normalized,
            filters: filters.clone(),
            hits: hits.clone(),
        });
        hits
    }

    pub fn preview<R: Rng + ?Sized>(
        &self,
        query: &str,
        catalog: &[Product],
        rng: &mut R,
    ) -> Vec<SearchHit> {
        preview(query, catalog, &self.config, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::personalize::{Gender, Preferences};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_740_830_400, 0).unwrap()
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn run(query: &str, catalog: &[Product], filters: &SearchFilters) -> Vec<SearchHit> {
        search(
            query,
            catalog,
            filters,
            &SearchConfig::default(),
            None,
            now(),
            &mut rng(),
        )
    }

    fn ids(hits: &[SearchHit]) -> Vec<&str> {
        hits.iter().map(|h| h.id()).collect()
    }

    fn kurti_catalog() -> Vec<Product> {
        vec![
            Product::new("1", "Red Kurti").with_keywords("women,ethnic,red"),
            Product::new("2", "Blue Jeans").with_keywords("men,casual"),
        ]
    }

    fn mixed_catalog() -> Vec<Product> {
        vec![
            Product::new("m1", "Cotton Kurti")
                .with_platform("Meesho")
                .with_price("₹450")
                .with_rating(4.1),
            Product::new("z1", "Printed Kurti")
                .with_platform("Amazon")
                .with_price("₹1,299")
                .with_rating(4.6),
            Product::new("a1", "Kurti Set")
                .with_platform("AJIO")
                .with_keywords("kurti,ethnic")
                .with_price("call for price"),
            Product::new("f1", "Anarkali Kurti")
                .with_platform("Flipkart")
                .with_price("₹799"),
        ]
    }

    #[test]
    fn test_kurti_example() {
        let hits = run("kurti", &kurti_catalog(), &SearchFilters::default());
        assert_eq!(ids(&hits), vec!["1"]);
        assert_eq!(hits[0].relevance, 1);
    }

    #[test]
    fn test_blank_and_unmatched_queries() {
        let catalog = kurti_catalog();
        assert!(run("", &catalog, &SearchFilters::default()).is_empty());
        assert!(run("   ", &catalog, &SearchFilters::default()).is_empty());
        assert!(run("!!", &catalog, &SearchFilters::default()).is_empty());
        assert!(run("saree", &catalog, &SearchFilters::default()).is_empty());
    }

    #[test]
    fn test_relevance_weight() {
        let both = Product::new("1", "Red Kurti").with_keywords("kurti");
        let title = Product::new("2", "Red Kurti");
        let keywords = Product::new("3", "Top").with_keywords("Kurti, cotton");
        assert_eq!(relevance("kurti", &both), 2);
        assert_eq!(relevance("kurti", &title), 1);
        assert_eq!(relevance("kurti", &keywords), 1);
        assert_eq!(relevance("saree", &both), 0);
    }

    #[test]
    fn test_query_is_normalized() {
        let hits = run("  RED-Kurti ", &kurti_catalog(), &SearchFilters::default());
        assert!(hits.is_empty());
        let hits = run("  Kurti! ", &kurti_catalog(), &SearchFilters::default());
        assert_eq!(ids(&hits), vec!["1"]);
    }

    #[test]
    fn test_filters_apply_after_matching() {
        let filters = SearchFilters {
            max_price: Some(800.0),
            ..Default::default()
        };
        let hits = run("kurti", &mixed_catalog(), &filters);
        let mut found = ids(&hits);
        found.sort_unstable();
        // a1 has no parsable price and drops out of the price filter
        assert_eq!(found, vec!["f1", "m1"]);
    }

    #[test]
    fn test_explicit_sorts() {
        let catalog = mixed_catalog();
        let low = run("kurti", &catalog, &SearchFilters::default().sorted(SortBy::PriceLow));
        assert_eq!(ids(&low), vec!["a1", "m1", "f1", "z1"]);

        let high = run("kurti", &catalog, &SearchFilters::default().sorted(SortBy::PriceHigh));
        assert_eq!(ids(&high), vec!["z1", "f1", "m1", "a1"]);

        let rating = run("kurti", &catalog, &SearchFilters::default().sorted(SortBy::Rating));
        assert_eq!(ids(&rating)[..2], ["z1", "m1"]);

        let relevance = run("kurti", &catalog, &SearchFilters::default().sorted(SortBy::Relevance));
        assert_eq!(ids(&relevance)[0], "a1");
    }

    #[test]
    fn test_default_order_is_a_fair_permutation() {
        let mut catalog: Vec<Product> = (0..30)
            .map(|i| Product::new(format!("z{i}"), "Steel Bottle").with_platform("Amazon"))
            .collect();
        catalog.extend(
            (0..10).map(|i| Product::new(format!("m{i}"), "Steel Bottle").with_platform("Meesho")),
        );

        let hits = run("bottle", &catalog, &SearchFilters::default());
        assert_eq!(hits.len(), catalog.len());

        let mut found: Vec<&str> = ids(&hits);
        found.sort_unstable();
        let mut expected: Vec<&str> = catalog.iter().map(|p| p.id.as_str()).collect();
        expected.sort_unstable();
        assert_eq!(found, expected);

        assert!(hits[0].product.platform == "Meesho");
        let head_amazon = hits[..12]
            .iter()
            .filter(|h| h.product.platform == "Amazon")
            .count();
        assert!(head_amazon <= 3);
    }

    #[test]
    fn test_preferred_and_relevance_lead_within_bucket() {
        let catalog = vec![
            Product::new("plain", "Bottle").with_platform("Meesho"),
            Product::new("strong", "Bottle").with_platform("Meesho").with_keywords("bottle"),
            Product::new("kurti", "Kurti Bottle Print").with_platform("Meesho"),
        ];
        let hits = run("bottle", &catalog, &SearchFilters::default());
        assert_eq!(ids(&hits), vec!["kurti", "strong", "plain"]);
    }

    #[test]
    fn test_profile_affinity_breaks_relevance_ties() {
        let catalog = vec![
            Product::new("bag", "Travel Organizer").with_platform("Meesho"),
            Product::new("phone", "Phone Organizer").with_platform("Meesho"),
        ];
        let profile = Profile::new(Some(Preferences {
            gender: Gender::Male,
            interests: vec!["electronics".to_string()],
        }));
        let config = SearchConfig {
            bias: CategoryBias::none(),
            ..Default::default()
        };
        let hits = search(
            "organizer",
            &catalog,
            &SearchFilters::default(),
            &config,
            Some(&profile),
            now(),
            &mut rng(),
        );
        assert_eq!(ids(&hits), vec!["phone", "bag"]);
    }

    #[test]
    fn test_sort_only_requery_keeps_membership() {
        let catalog = mixed_catalog();
        let mut session = SearchSession::default();
        let mut rng = rng();

        let first = session.search("Kurti", &catalog, &SearchFilters::default(), None, now(), &mut rng);
        assert_eq!(session.last_query(), Some("kurti"));

        // The previous result set is reused, so an empty catalog still sorts
        let sorted = session.search(
            "kurti ",
            &[],
            &SearchFilters::default().sorted(SortBy::PriceLow),
            None,
            now(),
            &mut rng,
        );
        assert_eq!(ids(&sorted), vec!["a1", "m1", "f1", "z1"]);

        let mut before = ids(&first);
        let mut after = ids(&sorted);
        before.sort_unstable();
        after.sort_unstable();
        assert_eq!(before, after);
    }

    #[test]
    fn test_changed_filters_rerun_the_match() {
        let catalog = mixed_catalog();
        let mut session = SearchSession::default();
        let mut rng = rng();

        session.search("kurti", &catalog, &SearchFilters::default(), None, now(), &mut rng);
        let filters = SearchFilters {
            platforms: vec!["meesho".to_string()],
            ..Default::default()
        };
        let hits = session.search("kurti", &catalog, &filters, None, now(), &mut rng);
        assert_eq!(ids(&hits), vec!["m1"]);

        let other = session.search("bottle", &catalog, &filters, None, now(), &mut rng);
        assert!(other.is_empty());
        session.reset();
        assert_eq!(session.last_query(), None);
    }

    #[test]
    fn test_preview_caps_buckets() {
        let mut catalog: Vec<Product> = (0..60)
            .map(|i| Product::new(format!("z{i}"), "Steel Bottle").with_platform("Amazon"))
            .collect();
        catalog.extend(
            (0..5).map(|i| Product::new(format!("m{i}"), "Steel Bottle").with_platform("Meesho")),
        );

        let session = SearchSession::default();
        let hits = session.preview("bottle", &catalog, &mut rng());
        // 20 amazon + 5 meesho sampled
        assert_eq!(hits.len(), 25);
        assert_eq!(hits.iter().filter(|h| h.product.platform == "Amazon").count(), 20);
        assert!(session.preview("", &catalog, &mut rng()).is_empty());
    }

    #[test]
    fn test_preview_truncates() {
        let catalog: Vec<Product> = (0..100)
            .map(|i| Product::new(format!("m{i}"), "Steel Bottle").with_platform("Meesho"))
            .collect();
        let hits = preview("bottle", &catalog, &SearchConfig::default(), &mut rng());
        assert_eq!(hits.len(), 30);
    }
}
