//! Usage-diversity recommender.
//!
//! Suggests notices the user has not used yet, drawn from their least-used
//! categories and spread across sub-tags they have not reached for recently.

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::db::models::{Notice, UsageRecord};
use crate::services::usage_stats::{
    compute_category_stats, compute_sub_tag_stats, least_used_categories, used_notice_ids,
};

pub const DEFAULT_RECOMMENDATION_COUNT: usize = 2;

/// Candidate pool size per requested notice.
const POOL_FACTOR: usize = 20;
/// Bonus for a candidate that adds a sub-tag not yet in the batch.
const NEW_SUB_TAG_BONUS: i64 = 10_000;
/// Baseline from which the least-used sub-tag's count is subtracted.
/// Candidates without sub-tags score as if their usage were this value.
const SUB_TAG_USAGE_BASELINE: i64 = 1_000;

fn score(
    candidate: &Notice,
    batch_tags: &HashSet<&str>,
    sub_tag_usage: &HashMap<&str, usize>,
) -> i64 {
    let adds_new_tag = candidate
        .tags
        .iter()
        .any(|t| !batch_tags.contains(t.as_str()));
    let min_usage = candidate
        .tags
        .iter()
        .map(|t| sub_tag_usage.get(t.as_str()).copied().unwrap_or(0) as i64)
        .min()
        .unwrap_or(SUB_TAG_USAGE_BASELINE);

    let bonus = if adds_new_tag { NEW_SUB_TAG_BONUS } else { 0 };
    bonus + (SUB_TAG_USAGE_BASELINE - min_usage)
}

/// Recommend up to `count` notices from `catalog` that `user_id` has never used.
///
/// Category and sub-tag usage come from `history` alone, so `catalog` only
/// needs to hold the candidates (it may omit the notices already used). Never returns a used notice or the same notice twice. Returns an empty list
/// when nothing is left to recommend. Output is deterministic for a given RNG
/// state.
pub fn recommend_diverse<R: Rng + ?Sized>(
    user_id: Uuid,
    history: &[UsageRecord],
    catalog: &[Notice],
    count: usize,
    rng: &mut R,
) -> Vec<Notice> {
    if count == 0 || catalog.is_empty() {
        return Vec::new();
    }

    let stats = compute_category_stats(user_id, history);
    let (min_usage, least_used) = least_used_categories(&stats);
    let used = used_notice_ids(user_id, history);

    let mut seen = HashSet::new();
    let unused: Vec<&Notice> = catalog
        .iter()
        .filter(|n| !used.contains(n.id.as_str()))
        .filter(|n| seen.insert(n.id.as_str()))
        .collect();

    let mut pool: Vec<&Notice> = unused
        .iter()
        .copied()
        .filter(|n| n.categories.iter().any(|c| least_used.contains(c)))
        .collect();
    if pool.is_empty() {
        tracing::info!(
            "No unused notices in least-used categories {:?} for user {}; widening to all unused",
            least_used,
            user_id
        );
        pool = unused;
    }
    if pool.is_empty() {
        return Vec::new();
    }

    pool.shuffle(rng);
    pool.truncate(count.saturating_mul(POOL_FACTOR));

    let sub_tag_stats = compute_sub_tag_stats(user_id, history);
    let sub_tag_usage: HashMap<&str, usize> = sub_tag_stats
        .iter()
        .map(|s| (s.sub_tag.as_str(), s.usage_count))
        .collect();

    let mut taken = vec![false; pool.len()];
    let mut batch_tags: HashSet<&str> = HashSet::new();
    let mut results: Vec<Notice> = Vec::with_capacity(count.min(pool.len()));

    while results.len() < count {
        let mut best: Option<(usize, i64)> = None;
        for (i, candidate) in pool.iter().enumerate() {
            if taken[i] {
                continue;
            }
            let s = score(candidate, &batch_tags, &sub_tag_usage);
            // Strictly greater: earlier pool entries win ties
            if best.map_or(true, |(_, best_score)| s > best_score) {
                best = Some((i, s));
            }
        }

        let Some((index, _)) = best else {
            break;
        };
        taken[index] = true;
        let chosen = pool[index];
        batch_tags.extend(chosen.tags.iter().map(String::as_str));
        results.push(chosen.clone());
    }

    tracing::debug!(
        "Recommended {} of {} requested notices for user {} (least-used level {}, {} categories)",
        results.len(),
        count,
        user_id,
        min_usage,
        least_used.len()
    );

    results
}
