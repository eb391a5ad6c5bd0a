use axum::extract::{Path, Query, State};
use axum::Json;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::db::models::Notice;
use crate::db::queries::{self, WeatherFilter};
use crate::errors::{AppError, ErrorResponse};
use crate::services::categories::Category;
use crate::services::conditions::WeatherConditionSpec;
use crate::services::recommender::{recommend_diverse, DEFAULT_RECOMMENDATION_COUNT};
use crate::services::usage_stats::{
    compute_category_stats, least_used_categories, recommendation_message,
};

/// Upper bound for `?count=`.
const MAX_RECOMMENDATION_COUNT: usize = 20;

/// A stored notice as returned by the API.
#[derive(Debug, Serialize, ToSchema)]
pub struct NoticeResponse {
    pub id: String,
    pub content: String,
    pub categories: Vec<Category>,
    /// Sub-tags
    pub tags: Vec<String>,
    pub author: String,
    pub like_count: i32,
    pub usage_count: i32,
    /// ISO 8601 / RFC 3339
    pub created_at: String,
    pub is_weather_notice: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather_conditions: Option<WeatherConditionSpec>,
}

impl From<Notice> for NoticeResponse {
    fn from(n: Notice) -> Self {
        Self {
            id: n.id,
            content: n.content,
            categories: n.categories,
            tags: n.tags,
            author: n.author,
            like_count: n.like_count,
            usage_count: n.usage_count,
            created_at: n.created_at.to_rfc3339(),
            is_weather_notice: n.is_weather_notice,
            weather_conditions: n.weather_conditions,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct RecommendationQuery {
    /// Number of notices to recommend (1–20, default 2)
    pub count: Option<usize>,
}

/// Response for GET /api/v1/users/:user_id/recommendations.
#[derive(Debug, Serialize, ToSchema)]
pub struct RecommendationResponse {
    pub user_id: Uuid,
    /// Categories the recommendations were drawn from
    pub target_categories: Vec<Category>,
    /// Nudge line for the first target category
    pub message: Option<String>,
    pub notices: Vec<NoticeResponse>,
}

/// Recommend unused notices from the user's least-used categories.
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}/recommendations",
    tag = "Recommendations",
    params(
        ("user_id" = Uuid, Path, description = "User UUID"),
        RecommendationQuery,
    ),
    responses(
        (status = 200, description = "Up to `count` notices the user has not used yet", body = RecommendationResponse),
        (status = 400, description = "Invalid count", body = ErrorResponse),
    )
)]
pub async fn get_recommendations(
    State(pool): State<PgPool>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<RecommendationQuery>,
) -> Result<Json<RecommendationResponse>, AppError> {
    let count = query.count.unwrap_or(DEFAULT_RECOMMENDATION_COUNT);
    if !(1..=MAX_RECOMMENDATION_COUNT).contains(&count) {
        return Err(AppError::BadRequest(format!(
            "count must be between 1 and {}",
            MAX_RECOMMENDATION_COUNT
        )));
    }

    // History covers every notice used; candidates are regular notices only
    let (history, candidates) = futures::try_join!(
        queries::get_usage_history(&pool, user_id),
        queries::list_notices(&pool, WeatherFilter::Exclude),
    )?;

    let stats = compute_category_stats(user_id, &history);
    let (min_usage, target_categories) = least_used_categories(&stats);
    let message = target_categories
        .first()
        .map(|c| recommendation_message(*c, min_usage));

    let mut rng = StdRng::from_entropy();
    let notices = recommend_diverse(user_id, &history, &candidates, count, &mut rng);

    tracing::info!(
        "Recommended {} notices for user {} ({} history records, {} candidates)",
        notices.len(),
        user_id,
        history.len(),
        candidates.len()
    );

    Ok(Json(RecommendationResponse {
        user_id,
        target_categories,
        message,
        notices: notices.into_iter().map(NoticeResponse::from).collect(),
    }))
}
