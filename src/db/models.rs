use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::services::categories::Category;
use crate::services::conditions::WeatherConditionSpec;

/// A row of the `notices` table as stored.
#[derive(Debug, Clone, FromRow)]
pub struct NoticeRow {
    pub id: String,
    pub content: String,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub author: String,
    pub like_count: i32,
    pub usage_count: i32,
    pub created_at: DateTime<Utc>,
    pub is_weather_notice: bool,
    pub weather_conditions: Option<serde_json::Value>,
}

/// A classroom notice with typed categories and conditions.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub id: String,
    pub content: String,
    pub categories: Vec<Category>,
    /// Sub-tags
    pub tags: Vec<String>,
    pub author: String,
    pub like_count: i32,
    pub usage_count: i32,
    pub created_at: DateTime<Utc>,
    pub is_weather_notice: bool,
    pub weather_conditions: Option<WeatherConditionSpec>,
}

/// Parse stored category names, logging and dropping unknown ones.
fn parse_categories(notice_id: &str, names: &[String]) -> Vec<Category> {
    names
        .iter()
        .filter_map(|c| match c.parse::<Category>() {
            Ok(category) => Some(category),
            Err(e) => {
                tracing::warn!("Notice {}: {}", notice_id, e);
                None
            }
        })
        .collect()
}

impl From<NoticeRow> for Notice {
    /// Unknown category names and malformed condition JSON are logged and
    /// dropped rather than failing the whole query.
    fn from(row: NoticeRow) -> Self {
        let categories = parse_categories(&row.id, &row.categories);

        let weather_conditions = row.weather_conditions.and_then(|value| {
            serde_json::from_value(value)
                .map_err(|e| {
                    tracing::warn!("Notice {} has invalid weather_conditions: {}", row.id, e);
                })
                .ok()
        });

        Self {
            id: row.id,
            content: row.content,
            categories,
            tags: row.tags,
            author: row.author,
            like_count: row.like_count,
            usage_count: row.usage_count,
            created_at: row.created_at,
            is_weather_notice: row.is_weather_notice,
            weather_conditions,
        }
    }
}

/// A `user_notice_usage` row joined with its notice's categories and sub-tags.
#[derive(Debug, Clone, FromRow)]
pub struct UsageRow {
    pub user_id: Uuid,
    pub notice_id: String,
    pub used_at: DateTime<Utc>,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
}

/// One "notice used" event, carrying the categories and sub-tags of the
/// notice at query time. Append-only.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageRecord {
    pub user_id: Uuid,
    pub notice_id: String,
    pub used_at: DateTime<Utc>,
    pub categories: Vec<Category>,
    /// Sub-tags
    pub tags: Vec<String>,
}

impl From<UsageRow> for UsageRecord {
    fn from(row: UsageRow) -> Self {
        let categories = parse_categories(&row.notice_id, &row.categories);
        Self {
            user_id: row.user_id,
            notice_id: row.notice_id,
            used_at: row.used_at,
            categories,
            tags: row.tags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> NoticeRow {
        NoticeRow {
            id: "n-1".to_string(),
            content: "Bring an umbrella".to_string(),
            categories: vec!["safety_health".to_string(), "miscellaneous".to_string()],
            tags: vec!["wet_road_safety".to_string()],
            author: "teacher".to_string(),
            like_count: 3,
            usage_count: 7,
            created_at: Utc::now(),
            is_weather_notice: true,
            weather_conditions: Some(serde_json::json!({ "condition": ["rainy"] })),
        }
    }

    #[test]
    fn test_notice_from_row() {
        let notice = Notice::from(row());
        assert_eq!(
            notice.categories,
            vec![Category::SafetyHealth, Category::Miscellaneous]
        );
        assert!(notice.weather_conditions.unwrap().condition.is_some());
    }

    #[test]
    fn test_unknown_category_is_dropped() {
        let mut r = row();
        r.categories.push("astronomy".to_string());
        let notice = Notice::from(r);
        assert_eq!(notice.categories.len(), 2);
    }

    #[test]
    fn test_invalid_conditions_become_none() {
        let mut r = row();
        r.weather_conditions = Some(serde_json::json!({ "temperature": "hot" }));
        let notice = Notice::from(r);
        assert!(notice.weather_conditions.is_none());
    }

    #[test]
    fn test_usage_record_from_joined_row() {
        let record = UsageRecord::from(UsageRow {
            user_id: Uuid::nil(),
            notice_id: "n-1".to_string(),
            used_at: Utc::now(),
            categories: vec!["events".to_string(), "astronomy".to_string()],
            tags: vec!["sports_day".to_string()],
        });
        assert_eq!(record.categories, vec![Category::Events]);
        assert_eq!(record.tags, vec!["sports_day".to_string()]);
    }
}
