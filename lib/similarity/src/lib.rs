//! # marketnav Similarity
//!
//! "More like this" scoring for catalog products.
//!
//! Similarity is decided in two phases:
//!
//! - **Quick pass**: keyword overlap, title/description Jaccard and brand
//!   similarity over the whole catalog, pruned to a small candidate pool
//! - **Image pass**: color, brightness and hue fingerprints of the reference
//!   and the best candidates, fetched through an [`ImageLoader`] with
//!   bounded concurrency and per-image timeouts
//!
//! ## Example
//!
//! ```rust,no_run
//! use marketnav_core::Product;
//! use marketnav_similarity::{
//!     ExtractorConfig, FeatureExtractor, HttpImageLoader, SimilarityConfig, SimilarityScorer,
//! };
//!
//! # async fn run(catalog: Vec<Product>) -> Result<(), Box<dyn std::error::Error>> {
//! let loader = HttpImageLoader::new()?;
//! let extractor = FeatureExtractor::new(loader, ExtractorConfig::default());
//! let scorer = SimilarityScorer::new(extractor, SimilarityConfig::default());
//!
//! let results = scorer.find_similar(&catalog[0], &catalog, 10).await;
//! for result in results {
//!     println!("{} {:.3}", result.product.title, result.score);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌──────────────┐
//! │  Catalog    │────>│ Quick pass  │────>│ Candidates   │
//! │ (products)  │     │ (text only) │     │ (top 20)     │
//! └─────────────┘     └─────────────┘     └──────────────┘
//!                                                │
//!                     ┌─────────────┐            │
//!                     │ ImageLoader │<───────────┤
//!                     │ (≤10 live)  │            │
//!                     └─────────────┘            │
//!                            │                   │
//!                     ┌─────────────┐     ┌──────────────┐
//!                     │  Features   │────>│ Final scores │
//!                     │ (histogram) │     │ (top 15)     │
//!                     └─────────────┘     └──────────────┘
//! ```

pub mod cache;
pub mod distance;
pub mod error;
pub mod features;
pub mod loader;
pub mod scorer;

pub use cache::FeatureCache;
pub use distance::{
    brand_name_similarity, brand_similarity, brightness_similarity, color_similarity,
    count_matching_keywords, hue_similarity_fast, jaccard, levenshtein, resolve_brand,
    rgb_similarity, text_similarity, TextSignature, KNOWN_BRANDS,
};
pub use error::{ImageError, Result};
pub use features::{features_from_image, ExtractorConfig, FeatureExtractor, Hsv, ImageFeatures, Rgb};
pub use loader::{HttpImageLoader, ImageLoader, DEFAULT_MAX_IMAGE_BYTES};
pub use scorer::{QuickCandidate, SimilarityConfig, SimilarityScore, SimilarityScorer};
