use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::models::{Notice, NoticeRow, UsageRecord, UsageRow};

/// How weather notices are treated when listing notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WeatherFilter {
    /// Regular notices only
    #[default]
    Exclude,
    /// Weather notices only
    Only,
}

impl WeatherFilter {
    fn is_weather_notice(self) -> bool {
        matches!(self, WeatherFilter::Only)
    }
}

/// List notices, newest first.
pub async fn list_notices(
    pool: &PgPool,
    weather: WeatherFilter,
) -> Result<Vec<Notice>, sqlx::Error> {
    let rows = sqlx::query_as::<_, NoticeRow>(
        "SELECT id, content, categories, tags, author, like_count, usage_count,
                created_at, is_weather_notice, weather_conditions
         FROM notices
         WHERE is_weather_notice = $1
         ORDER BY created_at DESC, id",
    )
    .bind(weather.is_weather_notice())
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Notice::from).collect())
}

/// Full usage history of one user, most recent first, joined with each
/// notice's categories and sub-tags. Covers weather and regular notices alike.
pub async fn get_usage_history(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<UsageRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, UsageRow>(
        "SELECT u.user_id, u.notice_id, u.used_at, n.categories, n.tags
         FROM user_notice_usage u
         JOIN notices n ON n.id = u.notice_id
         WHERE u.user_id = $1
         ORDER BY u.used_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(UsageRecord::from).collect())
}

/// IDs from `ids` that do not exist in `notices`.
pub async fn find_missing_notice_ids(
    pool: &PgPool,
    ids: &[String],
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT requested.id
         FROM UNNEST($1::text[]) AS requested(id)
         WHERE NOT EXISTS (SELECT 1 FROM notices n WHERE n.id = requested.id)",
    )
    .bind(ids)
    .fetch_all(pool)
    .await
}

/// Append one usage record per notice ID and bump each notice's usage counter.
///
/// Runs in a single transaction: either every record is stored or none is.
pub async fn insert_usage_records(
    pool: &PgPool,
    user_id: Uuid,
    notice_ids: &[String],
    used_at: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        "INSERT INTO user_notice_usage (id, user_id, notice_id, used_at)
         SELECT gen_random_uuid(), $1, notice_id, $3
         FROM UNNEST($2::text[]) AS t(notice_id)",
    )
    .bind(user_id)
    .bind(notice_ids)
    .bind(used_at)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    // A notice listed twice is counted twice, matching the usage rows
    sqlx::query(
        "UPDATE notices n
         SET usage_count = n.usage_count + t.uses
         FROM (SELECT notice_id, COUNT(*)::int AS uses
               FROM UNNEST($1::text[]) AS u(notice_id)
               GROUP BY notice_id) t
         WHERE n.id = t.notice_id",
    )
    .bind(notice_ids)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(inserted)
}
