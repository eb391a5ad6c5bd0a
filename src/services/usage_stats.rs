//! Per-user usage statistics derived from usage history.
//!
//! Usage records carry the categories and sub-tags of their notice, so
//! statistics cover every notice the user used, weather notices included.
//! All functions are pure views: they never mutate their inputs. Records of
//! other users are ignored.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

use crate::db::models::UsageRecord;
use crate::helpers::percentage_1dp;
use crate::services::categories::{category_for_sub_tag, Category};

/// How often one notice was used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoticeUsage {
    pub notice_id: String,
    /// Usage events
    pub usage_count: usize,
}

/// Usage of one category by one user.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryStat {
    pub category: Category,
    /// Distinct notices used that carry this category
    pub usage_count: usize,
    /// Share of the user's distinct used notices, 1 decimal place
    pub usage_percentage: Decimal,
    pub last_used: DateTime<Utc>,
    /// Notices used in this category, most used first
    pub notices: Vec<NoticeUsage>,
}

/// Usage of one sub-tag by one user, counted per usage event.
#[derive(Debug, Clone, PartialEq)]
pub struct SubTagStat {
    pub sub_tag: String,
    /// `None` when the sub-tag is not in the category table
    pub category: Option<Category>,
    pub usage_count: usize,
}

fn user_records(user_id: Uuid, history: &[UsageRecord]) -> impl Iterator<Item = &UsageRecord> {
    history.iter().filter(move |r| r.user_id == user_id)
}

/// Distinct notice ids the user has used.
pub fn used_notice_ids(user_id: Uuid, history: &[UsageRecord]) -> HashSet<&str> {
    user_records(user_id, history)
        .map(|r| r.notice_id.as_str())
        .collect()
}

/// Category statistics, sorted by `usage_count` descending (ties in category
/// order). Only categories the user actually used appear.
pub fn compute_category_stats(user_id: Uuid, history: &[UsageRecord]) -> Vec<CategoryStat> {
    struct Acc<'a> {
        notices: HashMap<&'a str, usize>,
        last_used: DateTime<Utc>,
    }

    let mut per_category: BTreeMap<Category, Acc> = BTreeMap::new();
    let mut all_notices: HashSet<&str> = HashSet::new();

    for record in user_records(user_id, history) {
        all_notices.insert(record.notice_id.as_str());
        for category in &record.categories {
            let acc = per_category.entry(*category).or_insert_with(|| Acc {
                notices: HashMap::new(),
                last_used: record.used_at,
            });
            *acc.notices.entry(record.notice_id.as_str()).or_default() += 1;
            if record.used_at > acc.last_used {
                acc.last_used = record.used_at;
            }
        }
    }

    let total = all_notices.len();
    let mut stats: Vec<CategoryStat> = per_category
        .into_iter()
        .map(|(category, acc)| {
            let mut notices: Vec<NoticeUsage> = acc
                .notices
                .into_iter()
                .map(|(id, usage_count)| NoticeUsage {
                    notice_id: id.to_string(),
                    usage_count,
                })
                .collect();
            notices.sort_by(|a, b| {
                b.usage_count
                    .cmp(&a.usage_count)
                    .then_with(|| a.notice_id.cmp(&b.notice_id))
            });
            CategoryStat {
                category,
                usage_count: notices.len(),
                usage_percentage: percentage_1dp(notices.len(), total),
                last_used: acc.last_used,
                notices,
            }
        })
        .collect();
    stats.sort_by(|a, b| b.usage_count.cmp(&a.usage_count));
    stats
}

/// Sub-tag statistics, sorted by `usage_count` descending then sub-tag name.
/// A notice used three times counts three times for each of its sub-tags.
pub fn compute_sub_tag_stats(user_id: Uuid, history: &[UsageRecord]) -> Vec<SubTagStat> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in user_records(user_id, history) {
        for tag in &record.tags {
            *counts.entry(tag.as_str()).or_default() += 1;
        }
    }

    let mut stats: Vec<SubTagStat> = counts
        .into_iter()
        .map(|(tag, usage_count)| SubTagStat {
            sub_tag: tag.to_string(),
            category: category_for_sub_tag(tag),
            usage_count,
        })
        .collect();
    stats.sort_by(|a, b| {
        b.usage_count
            .cmp(&a.usage_count)
            .then_with(|| a.sub_tag.cmp(&b.sub_tag))
    });
    stats
}

/// Smallest category usage and every category at that level.
///
/// Considers only the categories present in `stats`; with no stats at all,
/// every category is tied at zero.
pub fn least_used_categories(stats: &[CategoryStat]) -> (usize, Vec<Category>) {
    let Some(min_usage) = stats.iter().map(|s| s.usage_count).min() else {
        return (0, Category::ALL.to_vec());
    };
    let categories = stats
        .iter()
        .filter(|s| s.usage_count == min_usage)
        .map(|s| s.category)
        .collect();
    (min_usage, categories)
}

/// Short nudge shown next to a recommended category.
pub fn recommendation_message(category: Category, usage_count: usize) -> String {
    if usage_count == 0 {
        format!("Try something new from '{}'!", category)
    } else {
        format!("Revisit '{}' with a fresh notice!", category)
    }
}
