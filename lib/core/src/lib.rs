//! # marketnav Core
//!
//! Synchronous ranking core for the marketnav product discovery engine.
//! Everything here works on an in-memory `&[Product]` snapshot supplied by
//! the caller and never performs I/O.
//!
//! - [`normalize`] - the text normalizer shared by every matcher
//! - [`search`] / [`SearchSession`] - free-text ranking with filters, sorts
//!   and the sort-only re-query path
//! - [`compose_feed`] - shuffled, platform-balanced browsing feed
//! - [`interleave`] - the fairness interleaver both of the above use
//! - [`Profile`] - caller-owned personalization state
//!
//! ## Example
//!
//! ```rust
//! use marketnav_core::{search, Product, SearchConfig, SearchFilters};
//!
//! let catalog = vec![
//!     Product::new("1", "Red Kurti").with_keywords("women,ethnic,red"),
//!     Product::new("2", "Blue Jeans").with_keywords("men,casual"),
//! ];
//!
//! let hits = search(
//!     "kurti",
//!     &catalog,
//!     &SearchFilters::default(),
//!     &SearchConfig::default(),
//!     None,
//!     chrono::Utc::now(),
//!     &mut rand::rng(),
//! );
//! assert_eq!(hits.len(), 1);
//! assert_eq!(hits[0].id(), "1");
//! ```

pub mod category;
pub mod error;
pub mod feed;
pub mod filter;
pub mod interleave;
pub mod normalize;
pub mod personalize;
pub mod platform;
pub mod product;
pub mod search;

pub use category::{CategoryBias, KeywordFamily};
pub use error::{Error, Result};
pub use feed::{compose_feed, FeedConfig};
pub use filter::{Filter, FilterCondition, SearchFilters, SortBy};
pub use interleave::{BucketQuota, InterleavePlan, Placed};
pub use normalize::{normalize, parse_price};
pub use personalize::{Gender, Preferences, Profile, SearchRecord};
pub use platform::{Bucket, PlatformRule, PlatformTable, OTHER_BUCKET};
pub use product::{Product, SearchHit};
pub use search::{preview, search, BucketCap, PreviewConfig, SearchConfig, SearchSession};
