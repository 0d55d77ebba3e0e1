//! # marketnav
//!
//! In-memory product discovery over catalogs scraped from several
//! marketplaces.
//!
//! marketnav answers three questions about a catalog snapshot the caller
//! already holds in memory:
//!
//! - **Search**: which products match a free-text query, ordered so that no
//!   single marketplace monopolizes the top of the list
//! - **Similar**: which products look and read like a given one
//! - **Feed**: what a balanced, personalized browsing feed looks like right now
//!
//! ## Quick Start
//!
//! ### From the command line
//!
//! ```bash
//! marketnav --catalog catalog.json search kurti --sort price-low
//! marketnav --catalog catalog.json feed --limit 24
//! marketnav --catalog catalog.json similar SKU-1042
//! ```
//!
//! ### As a Library
//!
//! ```rust,no_run
//! use marketnav::prelude::*;
//!
//! let catalog = marketnav::catalog::load_catalog("catalog.json".as_ref()).unwrap();
//! let mut rng = rand::rng();
//!
//! // Search
//! let mut session = SearchSession::new(SearchConfig::default());
//! let hits = session.search(
//!     "kurti",
//!     &catalog,
//!     &SearchFilters::default(),
//!     None,
//!     chrono::Utc::now(),
//!     &mut rng,
//! );
//!
//! // Instant re-sort of the same result set
//! let cheapest = session.search(
//!     "kurti",
//!     &catalog,
//!     &SearchFilters::default().sorted(SortBy::PriceLow),
//!     None,
//!     chrono::Utc::now(),
//!     &mut rng,
//! );
//! assert_eq!(hits.len(), cheapest.len());
//!
//! // Feed
//! let feed = compose_feed(&catalog, &FeedConfig::default(), None, chrono::Utc::now(), &mut rng);
//! ```
//!
//! ## Crate Structure
//!
//! - `marketnav-core` - product model, normalizer, filters, interleaver,
//!   search ranking, feed composition and personalization
//! - `marketnav-similarity` - feature extraction and two-phase similarity
//!   scoring

pub mod catalog;
pub mod config;

// Re-export core types
pub use marketnav_core::{
    compose_feed, normalize, parse_price, search, Bucket, BucketQuota, CategoryBias, Error,
    FeedConfig, Filter, FilterCondition, Gender, InterleavePlan, KeywordFamily, PlatformRule,
    PlatformTable, Preferences, PreviewConfig, Product, Profile, Result, SearchConfig,
    SearchFilters, SearchHit, SearchRecord, SearchSession, SortBy, OTHER_BUCKET,
};

// Re-export similarity
pub use marketnav_similarity::{
    features_from_image, ExtractorConfig, FeatureExtractor, HttpImageLoader, ImageError,
    ImageFeatures, ImageLoader, SimilarityConfig, SimilarityScore, SimilarityScorer,
};

pub use config::EngineConfig;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        compose_feed, normalize, search, EngineConfig, Error, ExtractorConfig, FeatureExtractor,
        FeedConfig, Filter, HttpImageLoader, ImageLoader, Preferences, Product, Profile, Result,
        SearchConfig, SearchFilters, SearchHit, SearchSession, SimilarityConfig, SimilarityScore,
        SimilarityScorer, SortBy,
    };
}

/// The fairness interleaver used by search and feed composition
pub mod interleave {
    pub use marketnav_core::interleave::{
        enforce_head_constraints, interleave, mix_with_bias, prioritize, Placed,
    };
}
