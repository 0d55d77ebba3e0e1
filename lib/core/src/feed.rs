//! Browsing feed composition
//!
//! Every call draws a fresh permutation from the caller's RNG; no shuffle
//! state is kept between calls.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::category::CategoryBias;
use crate::interleave::{interleave, prioritize, BucketQuota, InterleavePlan};
use crate::normalize::normalize;
use crate::personalize::Profile;
use crate::platform::{PlatformRule, PlatformTable, OTHER_BUCKET};
use crate::{Product, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeedConfig {
    pub platforms: PlatformTable,
    pub plan: InterleavePlan,
    pub bias: CategoryBias,
}

impl FeedConfig {
    /// Feed whose round pattern follows `bias_platforms`: the first platform
    /// contributes two items per round, every other listed platform one.
    ///
    /// Platforms the default table does not know get a rule of their own.
    /// The dominant bucket is kept from the default plan.
    pub fn with_bias<S: AsRef<str>>(bias_platforms: &[S], max_dominant_ratio: f64) -> Self {
        let base = Self::default();
        let mut rules = base.platforms.rules().to_vec();
        let mut quotas = Vec::with_capacity(bias_platforms.len());

        for platform in bias_platforms {
            let name = normalize(platform.as_ref()).trim().to_string();
            if name.is_empty() || quotas.iter().any(|q: &BucketQuota| q.bucket == name) {
                continue;
            }
            if name != OTHER_BUCKET && !rules.iter().any(|r| r.bucket == name) {
                rules.push(PlatformRule::new(name.clone(), &[name.as_str()]));
            }
            let per_round = if quotas.is_empty() { 2 } else { 1 };
            quotas.push(BucketQuota::new(name, per_round));
        }

        Self {
            platforms: PlatformTable::new(rules),
            plan: InterleavePlan {
                quotas,
                max_dominant_ratio,
                ..base.plan
            },
            bias: base.bias,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.platforms.validate()?;
        self.plan.validate()
    }
}

/// Compose a platform-balanced, category-biased feed over `catalog`.
///
/// Products are bucketed by platform. Inside a bucket, preferred-category
/// products come first; each group is shuffled and, when a profile is given,
/// ordered by descending affinity. Buckets are then interleaved and the head
/// is corrected. The result is a permutation of `catalog`.
pub fn compose_feed<'a, R: Rng + ?Sized>(
    catalog: &'a [Product],
    config: &FeedConfig,
    profile: Option<&Profile>,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Vec<&'a Product> {
    let scored = catalog.iter().map(|product| {
        let affinity = profile.map_or(1.0, |p| p.score(product, now));
        (product, affinity)
    });

    let buckets: Vec<_> = config
        .platforms
        .partition(scored, |(product, _)| product.platform.as_str())
        .into_iter()
        .map(|bucket| {
            bucket.map_items(|items| {
                prioritize(
                    items,
                    |(product, _)| config.bias.is_preferred(product),
                    |(_, affinity)| *affinity,
                    &mut *rng,
                )
            })
        })
        .collect();

    debug!(
        products = catalog.len(),
        buckets = ?buckets.iter().map(|b| (b.name.as_str(), b.items.len())).collect::<Vec<_>>(),
        "composing feed"
    );

    interleave(buckets, &config.plan)
        .into_iter()
        .map(|(product, _)| product)
        .collect()
}
