//! Two-phase similarity scorer
//!
//! Phase one scores every catalog product on text alone and keeps a small
//! pool of candidates. Phase two extracts image features for the reference
//! and the best candidates with bounded concurrency, and blends packaging
//! similarity into the final score. A candidate whose image cannot be read
//! keeps its text-only score.

use futures_util::stream::{self, StreamExt};
use marketnav_core::{Error as CoreError, Product, Result as CoreResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

use crate::distance::{brightness_similarity, color_similarity, hue_similarity_fast, TextSignature};
use crate::error::ImageError;
use crate::features::{FeatureExtractor, ImageFeatures};
use crate::loader::ImageLoader;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimilarityConfig {
    /// Used by callers that do not pass their own minimum
    pub min_keyword_matches: usize,
    /// Phase-one candidates must score strictly above this
    pub quick_score_threshold: f64,
    /// Phase-one candidates kept for scoring
    pub candidate_pool: usize,
    /// Leading pool candidates whose images are analysed
    pub image_candidates: usize,
    /// Image extractions in flight at once, reference included
    pub max_in_flight: usize,
    pub candidate_timeout_ms: u64,
    /// Results must score strictly above this
    pub final_score_threshold: f64,
    pub max_results: usize,
    /// Shared keyword count at which the keyword term saturates
    pub keyword_saturation: usize,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            min_keyword_matches: 10,
            quick_score_threshold: 0.3,
            candidate_pool: 20,
            image_candidates: 10,
            max_in_flight: 10,
            candidate_timeout_ms: 800,
            final_score_threshold: 0.4,
            max_results: 15,
            keyword_saturation: 20,
        }
    }
}

impl SimilarityConfig {
    pub fn validate(&self) -> CoreResult<()> {
        if self.max_in_flight == 0 {
            return Err(CoreError::InvalidConfig(
                "max_in_flight must be at least 1".to_string(),
            ));
        }
        if self.keyword_saturation == 0 {
            return Err(CoreError::InvalidConfig(
                "keyword_saturation must be at least 1".to_string(),
            ));
        }
        if !self.quick_score_threshold.is_finite() || !self.final_score_threshold.is_finite() {
            return Err(CoreError::InvalidConfig(
                "score thresholds must be finite".to_string(),
            ));
        }
        Ok(())
    }

    #[inline]
    pub fn candidate_timeout(&self) -> Duration {
        Duration::from_millis(self.candidate_timeout_ms)
    }

    #[inline]
    fn keyword_term(&self, matching_keywords: usize) -> f64 {
        (matching_keywords as f64 / self.keyword_saturation as f64).min(1.0)
    }
}

/// A phase-one survivor
#[derive(Debug, Clone, PartialEq)]
pub struct QuickCandidate<'a> {
    pub product: &'a Product,
    pub matching_keywords: usize,
    pub text_similarity: f64,
    pub brand_similarity: f64,
    pub quick_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityScore {
    pub product: Product,
    pub score: f64,
    pub matching_keywords: usize,
    /// 0.0 unless both images were analysed
    pub color_similarity: f64,
    pub text_similarity: f64,
    pub brand_similarity: f64,
    /// 0.0 unless both images were analysed
    pub packaging_similarity: f64,
}

/// `0.7 * color + 0.2 * brightness + 0.1 * hue` plus the color term alone
fn packaging_similarity(reference: &ImageFeatures, candidate: &ImageFeatures) -> (f64, f64) {
    let color = color_similarity(&reference.dominant_colors, &candidate.dominant_colors);
    let brightness = brightness_similarity(reference.brightness, candidate.brightness);
    let hue = hue_similarity_fast(&reference.dominant_hues, &candidate.dominant_hues);
    (color * 0.7 + brightness * 0.2 + hue * 0.1, color)
}

pub struct SimilarityScorer<L> {
    extractor: FeatureExtractor<L>,
    config: SimilarityConfig,
}

impl<L: ImageLoader> SimilarityScorer<L> {
    pub fn new(extractor: FeatureExtractor<L>, config: SimilarityConfig) -> Self {
        Self { extractor, config }
    }

    pub fn config(&self) -> &SimilarityConfig {
        &self.config
    }

    pub fn extractor(&self) -> &FeatureExtractor<L> {
        &self.extractor
    }

    /// Text-only phase: every product other than `reference` sharing at
    /// least `min_keyword_matches` keywords and scoring above the quick
    /// threshold, best first, at most `candidate_pool` of them.
    pub fn quick_candidates<'a>(
        &self,
        reference: &Product,
        catalog: &'a [Product],
        min_keyword_matches: usize,
    ) -> Vec<QuickCandidate<'a>> {
        let signature = TextSignature::new(reference);

        let mut candidates: Vec<QuickCandidate<'a>> = catalog
            .iter()
            .filter(|product| product.id != reference.id)
            .filter_map(|product| {
                let other = TextSignature::new(product);
                let matching_keywords = signature.matching_keywords(&other);
                if matching_keywords < min_keyword_matches {
                    return None;
                }
                let text_similarity = signature.text_similarity(&other);
                let brand_similarity = signature.brand_similarity(&other);
                let quick_score = text_similarity * 0.6
                    + brand_similarity * 0.25
                    + self.config.keyword_term(matching_keywords) * 0.15;
                (quick_score > self.config.quick_score_threshold).then_some(QuickCandidate {
                    product,
                    matching_keywords,
                    text_similarity,
                    brand_similarity,
                    quick_score,
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.quick_score
                .partial_cmp(&a.quick_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(self.config.candidate_pool);
        candidates
    }

    /// Products most similar to `reference`, best first.
    ///
    /// Image failures only cost the affected candidate its image boost. Any
    /// other failure is logged and yields an empty list.
    pub async fn find_similar(
        &self,
        reference: &Product,
        catalog: &[Product],
        min_keyword_matches: usize,
    ) -> Vec<SimilarityScore> {
        match self.try_find_similar(reference, catalog, min_keyword_matches).await {
            Ok(results) => results,
            Err(err) => {
                error!(reference = %reference.id, error = %err, "similarity search failed");
                Vec::new()
            }
        }
    }

    async fn try_find_similar(
        &self,
        reference: &Product,
        catalog: &[Product],
        min_keyword_matches: usize,
    ) -> CoreResult<Vec<SimilarityScore>> {
        self.config.validate()?;
        let started = Instant::now();

        let candidates = self.quick_candidates(reference, catalog, min_keyword_matches);
        debug!(
            reference = %reference.id,
            catalog = catalog.len(),
            candidates = candidates.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "quick pass done"
        );
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let analysed = candidates.len().min(self.config.image_candidates);
        let (reference_features, candidate_features) =
            self.analyse_images(reference, &candidates[..analysed]).await;
        debug!(
            reference_image = reference_features.is_some(),
            analysed = candidate_features.iter().filter(|f| f.is_some()).count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "image pass done"
        );

        let mut results: Vec<SimilarityScore> = candidates
            .iter()
            .enumerate()
            .map(|(i, candidate)| {
                let features = candidate_features.get(i).and_then(Option::as_ref);
                self.final_score(candidate, reference_features.as_deref(), features.map(Arc::as_ref))
            })
            .filter(|r| r.score > self.config.final_score_threshold)
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(self.config.max_results);

        debug!(
            reference = %reference.id,
            results = results.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "similarity search done"
        );
        Ok(results)
    }

    fn final_score(
        &self,
        candidate: &QuickCandidate<'_>,
        reference: Option<&ImageFeatures>,
        features: Option<&ImageFeatures>,
    ) -> SimilarityScore {
        let (score, packaging, color) = match (reference, features) {
            (Some(reference), Some(features)) => {
                let (packaging, color) = packaging_similarity(reference, features);
                let score = packaging * 0.5
                    + candidate.text_similarity * 0.25
                    + candidate.brand_similarity * 0.15
                    + self.config.keyword_term(candidate.matching_keywords) * 0.1;
                (score, packaging, color)
            }
            _ => (candidate.quick_score, 0.0, 0.0),
        };

        SimilarityScore {
            product: candidate.product.clone(),
            score,
            matching_keywords: candidate.matching_keywords,
            color_similarity: color,
            text_similarity: candidate.text_similarity,
            brand_similarity: candidate.brand_similarity,
            packaging_similarity: packaging,
        }
    }

    /// Extract features for the reference and `candidates`, at most
    /// `max_in_flight` at a time, each under the candidate timeout.
    async fn analyse_images(
        &self,
        reference: &Product,
        candidates: &[QuickCandidate<'_>],
    ) -> (Option<Arc<ImageFeatures>>, Vec<Option<Arc<ImageFeatures>>>) {
        let timeout = self.config.candidate_timeout();
        let extractor = &self.extractor;

        let jobs = std::iter::once(reference)
            .chain(candidates.iter().map(|c| c.product))
            .enumerate();

        let mut slots: Vec<Option<Arc<ImageFeatures>>> = vec![None; candidates.len() + 1];
        let finished: Vec<(usize, Option<Arc<ImageFeatures>>)> = stream::iter(jobs)
            .map(|(slot, product)| async move {
                let outcome = match product.image.as_deref().filter(|u| !u.is_empty()) {
                    None => Err(ImageError::MissingImage),
                    Some(url) => tokio::time::timeout(timeout, extractor.extract(url))
                        .await
                        .unwrap_or(Err(ImageError::Timeout(timeout))),
                };
                match outcome {
                    Ok(features) => (slot, Some(features)),
                    Err(ImageError::MissingImage) => (slot, None),
                    Err(err) => {
                        warn!(product = %product.id, error = %err, "image features unavailable");
                        (slot, None)
                    }
                }
            })
            .buffer_unordered(self.config.max_in_flight)
            .collect()
            .await;

        for (slot, features) in finished {
            slots[slot] = features;
        }
        let reference_features = slots[0].take();
        slots.remove(0);
        (reference_features, slots)
    }
}
