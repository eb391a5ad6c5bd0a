use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::queries;
use crate::errors::{AppError, ErrorResponse};
use crate::helpers::dec_to_f64;
use crate::services::categories::Category;
use crate::services::usage_stats::{
    compute_category_stats, compute_sub_tag_stats, CategoryStat, NoticeUsage, SubTagStat,
};

/// Maximum number of notice IDs accepted in one usage batch.
const MAX_USAGE_BATCH: usize = 100;

#[derive(Debug, Serialize, ToSchema)]
pub struct NoticeUsageResponse {
    pub notice_id: String,
    /// Usage events
    pub usage_count: usize,
}

impl From<NoticeUsage> for NoticeUsageResponse {
    fn from(u: NoticeUsage) -> Self {
        Self {
            notice_id: u.notice_id,
            usage_count: u.usage_count,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryStatResponse {
    pub category: Category,
    /// Distinct notices used in this category
    pub usage_count: usize,
    /// Share of all distinct notices used, 1 decimal place
    pub usage_percentage: f64,
    /// ISO 8601 / RFC 3339
    pub last_used: String,
    /// Notices used in this category, most used first
    pub notices: Vec<NoticeUsageResponse>,
}

impl From<CategoryStat> for CategoryStatResponse {
    fn from(s: CategoryStat) -> Self {
        Self {
            category: s.category,
            usage_count: s.usage_count,
            usage_percentage: dec_to_f64(s.usage_percentage),
            last_used: s.last_used.to_rfc3339(),
            notices: s.notices.into_iter().map(NoticeUsageResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubTagStatResponse {
    pub sub_tag: String,
    /// Owning category; absent for tags outside the category table
    pub category: Option<Category>,
    /// Usage events involving this sub-tag
    pub usage_count: usize,
}

impl From<SubTagStat> for SubTagStatResponse {
    fn from(s: SubTagStat) -> Self {
        Self {
            sub_tag: s.sub_tag,
            category: s.category,
            usage_count: s.usage_count,
        }
    }
}

/// Response for GET /api/v1/users/:user_id/category-stats.
#[derive(Debug, Serialize, ToSchema)]
pub struct UsageStatsResponse {
    pub user_id: Uuid,
    /// Sorted by usage descending
    pub categories: Vec<CategoryStatResponse>,
    /// Sorted by usage descending
    pub sub_tags: Vec<SubTagStatResponse>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RecordUsageRequest {
    /// Notices the user just used
    pub notice_ids: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RecordUsageResponse {
    pub recorded: u64,
}

/// Per-category and per-sub-tag usage statistics for a user.
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}/category-stats",
    tag = "Usage",
    params(
        ("user_id" = Uuid, Path, description = "User UUID"),
    ),
    responses(
        (status = 200, description = "Usage statistics", body = UsageStatsResponse),
    )
)]
pub async fn get_category_stats(
    State(pool): State<PgPool>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UsageStatsResponse>, AppError> {
    let history = queries::get_usage_history(&pool, user_id).await?;

    let categories = compute_category_stats(user_id, &history);
    let sub_tags = compute_sub_tag_stats(user_id, &history);

    Ok(Json(UsageStatsResponse {
        user_id,
        categories: categories.into_iter().map(CategoryStatResponse::from).collect(),
        sub_tags: sub_tags.into_iter().map(SubTagStatResponse::from).collect(),
    }))
}

/// Record that a user used one or more notices.
#[utoipa::path(
    post,
    path = "/api/v1/users/{user_id}/usage",
    tag = "Usage",
    params(
        ("user_id" = Uuid, Path, description = "User UUID"),
    ),
    request_body = RecordUsageRequest,
    responses(
        (status = 201, description = "Usage recorded", body = RecordUsageResponse),
        (status = 400, description = "Empty or oversized batch", body = ErrorResponse),
        (status = 404, description = "Unknown notice ID", body = ErrorResponse),
    )
)]
pub async fn record_usage(
    State(pool): State<PgPool>,
    Path(user_id): Path<Uuid>,
    Json(body): Json<RecordUsageRequest>,
) -> Result<(StatusCode, Json<RecordUsageResponse>), AppError> {
    validate_batch(&body.notice_ids)?;

    let missing = queries::find_missing_notice_ids(&pool, &body.notice_ids).await?;
    ensure_all_found(&missing)?;

    let recorded =
        queries::insert_usage_records(&pool, user_id, &body.notice_ids, Utc::now()).await?;
    tracing::info!("Recorded {} notice uses for user {}", recorded, user_id);

    Ok((StatusCode::CREATED, Json(RecordUsageResponse { recorded })))
}

fn validate_batch(notice_ids: &[String]) -> Result<(), AppError> {
    if notice_ids.is_empty() {
        return Err(AppError::BadRequest("notice_ids must not be empty".to_string()));
    }
    if notice_ids.len() > MAX_USAGE_BATCH {
        return Err(AppError::BadRequest(format!(
            "at most {} notice_ids per request",
            MAX_USAGE_BATCH
        )));
    }
    if notice_ids.iter().any(|id| id.trim().is_empty()) {
        return Err(AppError::BadRequest("notice_ids must not contain blanks".to_string()));
    }
    Ok(())
}

fn ensure_all_found(missing: &[String]) -> Result<(), AppError> {
    if missing.is_empty() {
        return Ok(());
    }
    Err(AppError::NotFound(format!(
        "Notices not found: {}",
        missing.join(", ")
    )))
}
