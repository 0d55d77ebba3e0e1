//! Platform-fairness interleaving
//!
//! Merges per-platform buckets into one sequence using a fixed per-round
//! pattern, then tightens the head of the sequence. One bucket may be marked
//! dominant: it is emitted at most once per round, never twice in a row, and
//! only while its share of everything emitted so far stays within
//! [`InterleavePlan::max_dominant_ratio`].
//!
//! Both steps only reorder. Once every other bucket is drained the leftover
//! dominant items are appended, so the output is always a permutation of the
//! input.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::platform::Bucket;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketQuota {
    pub bucket: String,
    pub per_round: usize,
}

impl BucketQuota {
    pub fn new(bucket: impl Into<String>, per_round: usize) -> Self {
        Self {
            bucket: bucket.into(),
            per_round,
        }
    }
}

/// Round pattern and fairness caps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InterleavePlan {
    /// Buckets in priority order with how many items each contributes per
    /// round. Buckets not listed contribute one item at the end of a round.
    pub quotas: Vec<BucketQuota>,
    /// The capped bucket, if any
    pub dominant: Option<String>,
    pub max_dominant_ratio: f64,
    /// Number of leading items subject to the stricter head cap
    pub head_window: usize,
    pub max_dominant_in_head: usize,
}

impl Default for InterleavePlan {
    fn default() -> Self {
        Self {
            quotas: vec![
                BucketQuota::new("meesho", 2),
                BucketQuota::new("ajio", 1),
                BucketQuota::new("amazon", 1),
                BucketQuota::new("other", 1),
            ],
            dominant: Some("amazon".to_string()),
            max_dominant_ratio: 0.22,
            head_window: 12,
            max_dominant_in_head: 3,
        }
    }
}

impl InterleavePlan {
    pub fn validate(&self) -> Result<()> {
        if !(self.max_dominant_ratio > 0.0 && self.max_dominant_ratio <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "max_dominant_ratio must be in (0, 1], got {}",
                self.max_dominant_ratio
            )));
        }
        if let Some(quota) = self.quotas.iter().find(|q| q.per_round == 0) {
            return Err(Error::InvalidConfig(format!(
                "bucket '{}' has a zero per-round quota",
                quota.bucket
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn is_dominant(&self, bucket: &str) -> bool {
        self.dominant.as_deref() == Some(bucket)
    }

    fn per_round(&self, bucket: &str) -> usize {
        self.quotas
            .iter()
            .find(|q| q.bucket == bucket)
            .map(|q| q.per_round)
            .unwrap_or(1)
    }

    /// Would emitting one more dominant item keep its running share within
    /// the cap?
    #[inline]
    fn ratio_allows(&self, dominant_used: usize, emitted: usize) -> bool {
        (dominant_used + 1) as f64 / (emitted + 1) as f64 <= self.max_dominant_ratio + f64::EPSILON
    }
}

/// An interleaved item tagged with whether it came from the dominant bucket
#[derive(Debug, Clone, PartialEq)]
pub struct Placed<T> {
    pub item: T,
    pub dominant: bool,
}

struct Lane<T> {
    per_round: usize,
    dominant: bool,
    items: VecDeque<T>,
}

/// Order `items` as shuffled preferred items followed by shuffled rest, then
/// stable-sort each group by `rank` descending so ties keep shuffle order.
///
/// Shuffling is Fisher–Yates via [`SliceRandom::shuffle`].
pub fn prioritize<T, K, R>(
    items: Vec<T>,
    is_preferred: impl Fn(&T) -> bool,
    rank: impl Fn(&T) -> K,
    rng: &mut R,
) -> Vec<T>
where
    K: PartialOrd,
    R: Rng + ?Sized,
{
    let (mut preferred, mut rest): (Vec<T>, Vec<T>) = items.into_iter().partition(|i| is_preferred(i));
    for group in [&mut preferred, &mut rest] {
        group.shuffle(rng);
        group.sort_by(|a, b| {
            rank(b)
                .partial_cmp(&rank(a))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }
    preferred.extend(rest);
    preferred
}

/// Merge buckets round by round following `plan`.
///
/// Lanes are visited in quota order. Non-dominant lanes emit up to their
/// per-round quota. The dominant lane emits at most one item per round and
/// only when the previous item was not dominant and the ratio cap holds
/// after the emission.
pub fn mix_with_bias<T>(buckets: Vec<Bucket<T>>, plan: &InterleavePlan) -> Vec<Placed<T>> {
    let total: usize = buckets.iter().map(|b| b.items.len()).sum();
    let mut lanes = order_lanes(buckets, plan);

    let mut out: Vec<Placed<T>> = Vec::with_capacity(total);
    let mut dominant_used = 0usize;
    let mut last_dominant = false;

    while lanes.iter().any(|l| !l.items.is_empty()) {
        let before = out.len();
        for lane in lanes.iter_mut() {
            if lane.dominant {
                if lane.items.is_empty()
                    || last_dominant
                    || !plan.ratio_allows(dominant_used, out.len())
                {
                    continue;
                }
                if let Some(item) = lane.items.pop_front() {
                    out.push(Placed { item, dominant: true });
                    dominant_used += 1;
                    last_dominant = true;
                }
            } else {
                for _ in 0..lane.per_round {
                    match lane.items.pop_front() {
                        Some(item) => {
                            out.push(Placed { item, dominant: false });
                            last_dominant = false;
                        }
                        None => break,
                    }
                }
            }
        }
        // Only capped dominant items are left
        if out.len() == before {
            break;
        }
    }

    for lane in lanes {
        let dominant = lane.dominant;
        out.extend(lane.items.into_iter().map(|item| Placed { item, dominant }));
    }
    out
}

fn order_lanes<T>(buckets: Vec<Bucket<T>>, plan: &InterleavePlan) -> Vec<Lane<T>> {
    let mut ranked: Vec<(usize, Bucket<T>)> = buckets
        .into_iter()
        .map(|bucket| {
            let position = plan
                .quotas
                .iter()
                .position(|q| q.bucket == bucket.name)
                .unwrap_or(usize::MAX);
            (position, bucket)
        })
        .collect();
    // Stable: unlisted buckets keep their table order at the end of a round
    ranked.sort_by_key(|(position, _)| *position);

    ranked
        .into_iter()
        .map(|(_, bucket)| Lane {
            per_round: plan.per_round(&bucket.name),
            dominant: plan.is_dominant(&bucket.name),
            items: bucket.items.into(),
        })
        .collect()
}

/// Enforce the stricter head cap on the first `plan.head_window` items.
///
/// Dominant items beyond `plan.max_dominant_in_head`, or directly following
/// another dominant item, are bumped out of the head. The gaps are filled
/// with non-dominant items pulled forward from the tail. Bumped items are
/// merged back into the tail at the earliest positions that respect the
/// ratio cap and the no-consecutive rule; non-dominant tail order is kept.
pub fn enforce_head_constraints<T>(items: Vec<Placed<T>>, plan: &InterleavePlan) -> Vec<Placed<T>> {
    let total = items.len();
    let window = plan.head_window.min(total);
    let mut head = items;
    let tail = head.split_off(window);

    let mut out: Vec<Placed<T>> = Vec::with_capacity(total);
    let mut tail_dominant: VecDeque<Placed<T>> = VecDeque::new();
    let mut kept_dominant = 0usize;

    for placed in head {
        if !placed.dominant {
            out.push(placed);
            continue;
        }
        let follows_dominant = out.last().map_or(false, |p| p.dominant);
        if kept_dominant < plan.max_dominant_in_head && !follows_dominant {
            kept_dominant += 1;
            out.push(placed);
        } else {
            tail_dominant.push_back(placed);
        }
    }

    let mut tail_other: VecDeque<Placed<T>> = VecDeque::new();
    for placed in tail {
        if placed.dominant {
            tail_dominant.push_back(placed);
        } else {
            tail_other.push_back(placed);
        }
    }

    while out.len() < window {
        match tail_other.pop_front() {
            Some(placed) => out.push(placed),
            None => break,
        }
    }

    let mut dominant_used = out.iter().filter(|p| p.dominant).count();
    let mut last_dominant = out.last().map_or(false, |p| p.dominant);
    loop {
        let dominant_fits = !tail_dominant.is_empty()
            && !last_dominant
            && plan.ratio_allows(dominant_used, out.len());
        if dominant_fits {
            if let Some(placed) = tail_dominant.pop_front() {
                out.push(placed);
                dominant_used += 1;
                last_dominant = true;
                continue;
            }
        }
        match tail_other.pop_front() {
            Some(placed) => {
                out.push(placed);
                last_dominant = false;
            }
            None => break,
        }
    }
    out.extend(tail_dominant);
    out
}

/// [`mix_with_bias`] followed by [`enforce_head_constraints`]
pub fn interleave<T>(buckets: Vec<Bucket<T>>, plan: &InterleavePlan) -> Vec<T> {
    enforce_head_constraints(mix_with_bias(buckets, plan), plan)
        .into_iter()
        .map(|p| p.item)
        .collect()
}
