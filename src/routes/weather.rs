use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::db::queries::{self, WeatherFilter};
use crate::errors::{AppError, ErrorResponse};
use crate::routes::recommendations::NoticeResponse;
use crate::services::catalog::{ConditionGroup, NoticeTemplate, WeatherCatalog};
use crate::services::conditions::{PrecipitationType, SkyCondition, WeatherObservation};
use crate::services::grid::{self, GridPoint};
use crate::services::kma::{dummy_observation, KmaClient, KmaNowcast};
use crate::services::weather_notices::{pick_matching_notices, select_weather_notices};

/// Stored weather notices returned alongside the templates.
const MATCHING_NOTICE_LIMIT: usize = 2;

/// Shared state for the weather routes.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub catalog: Arc<WeatherCatalog>,
    /// `None` when no KMA API key is configured
    pub kma_client: Option<KmaClient>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct WeatherNoticesRequest {
    /// Latitude (WGS84) of the school
    pub lat: f64,
    /// Longitude (WGS84) of the school
    pub lng: f64,
    /// Free-form address, echoed back
    pub address: Option<String>,
}

/// Where the observation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WeatherSource {
    /// Live KMA nowcast
    Kma,
    /// No API key configured
    Dummy,
    /// KMA failed; generated observation used instead
    Fallback,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ObservationResponse {
    /// °C
    pub temperature: f64,
    /// %
    pub humidity: f64,
    /// mm/h
    pub precipitation: f64,
    /// m/s
    pub wind_speed: f64,
    pub precipitation_type: PrecipitationType,
    pub sky_condition: SkyCondition,
    /// KMA base date (`YYYYMMDD`, KST), live data only
    pub base_date: Option<String>,
    /// KMA base time (`HHMM`, KST), live data only
    pub base_time: Option<String>,
}

impl ObservationResponse {
    fn new(obs: &WeatherObservation, base: Option<(String, String)>) -> Self {
        let (base_date, base_time) = base.unzip();
        Self {
            temperature: obs.temperature,
            humidity: obs.humidity,
            precipitation: obs.precipitation,
            wind_speed: obs.wind_speed,
            precipitation_type: obs.precipitation_type,
            sky_condition: obs.sky_condition(),
            base_date,
            base_time,
        }
    }
}

/// Response for POST /api/v1/weather/notices.
#[derive(Debug, Serialize, ToSchema)]
pub struct WeatherNoticesResponse {
    pub source: WeatherSource,
    pub grid: GridPoint,
    /// Center of the grid cell the observation applies to
    pub grid_center: LatLng,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub observation: ObservationResponse,
    /// Selected templates, most urgent first
    pub templates: Vec<NoticeTemplate>,
    /// Stored weather notices whose conditions match the observation
    pub matching_notices: Vec<NoticeResponse>,
}

/// WGS84 coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConditionSummary {
    pub group: ConditionGroup,
    pub template_count: usize,
}

/// Validate a school location and project it onto the KMA grid.
fn grid_for_location(lat: f64, lng: f64) -> Result<GridPoint, AppError> {
    if !lat.is_finite() || !lng.is_finite() {
        return Err(AppError::BadRequest(
            "lat and lng must be finite numbers".to_string(),
        ));
    }
    if !grid::is_within_korea(lat, lng) {
        return Err(AppError::BadRequest(format!(
            "({}, {}) is outside the Korean peninsula",
            lat, lng
        )));
    }
    let point = grid::to_grid(lat, lng);
    if !point.is_valid() {
        return Err(AppError::BadRequest(format!(
            "({}, {}) maps to grid ({}, {}), outside the KMA grid",
            lat, lng, point.nx, point.ny
        )));
    }
    Ok(point)
}

/// Outcome of the live weather lookup.
#[derive(Debug)]
enum Nowcast {
    Live(KmaNowcast),
    Failed(AppError),
    Unconfigured,
}

/// Observation to select with, its source and the KMA base slot if live.
fn resolve_observation<R: rand::Rng + ?Sized>(
    nowcast: Nowcast,
    rng: &mut R,
) -> (WeatherSource, WeatherObservation, Option<(String, String)>) {
    match nowcast {
        Nowcast::Live(live) => (
            WeatherSource::Kma,
            live.observation,
            Some((live.base_date, live.base_time)),
        ),
        Nowcast::Failed(e) => {
            tracing::warn!("KMA nowcast failed, using generated weather: {}", e);
            (WeatherSource::Fallback, dummy_observation(rng), None)
        }
        Nowcast::Unconfigured => (WeatherSource::Dummy, dummy_observation(rng), None),
    }
}

fn grid_center(point: GridPoint) -> LatLng {
    let (lat, lng) = grid::to_lat_lng(point);
    LatLng { lat, lng }
}

/// Weather-based notice suggestions for a school location.
#[utoipa::path(
    post,
    path = "/api/v1/weather/notices",
    tag = "Weather",
    request_body = WeatherNoticesRequest,
    responses(
        (status = 200, description = "Current weather with selected notice templates", body = WeatherNoticesResponse),
        (status = 400, description = "Location outside Korea", body = ErrorResponse),
    )
)]
pub async fn post_weather_notices(
    State(state): State<AppState>,
    Json(req): Json<WeatherNoticesRequest>,
) -> Result<Json<WeatherNoticesResponse>, AppError> {
    let point = grid_for_location(req.lat, req.lng)?;
    tracing::debug!(
        "Location ({}, {}) → grid ({}, {})",
        req.lat,
        req.lng,
        point.nx,
        point.ny
    );

    let nowcast = async {
        match &state.kma_client {
            Some(client) => match client.fetch_nowcast(point, Utc::now()).await {
                Ok(live) => Nowcast::Live(live),
                Err(e) => Nowcast::Failed(e),
            },
            None => Nowcast::Unconfigured,
        }
    };
    let (nowcast, weather_notices) = futures::join!(
        nowcast,
        queries::list_notices(&state.pool, WeatherFilter::Only),
    );
    let weather_notices = weather_notices?;

    let mut rng = StdRng::from_entropy();
    let (source, observation, base) = resolve_observation(nowcast, &mut rng);

    let templates: Vec<NoticeTemplate> =
        select_weather_notices(&observation, &state.catalog, &mut rng)
            .into_iter()
            .cloned()
            .collect();
    let matching = pick_matching_notices(
        &observation,
        weather_notices,
        MATCHING_NOTICE_LIMIT,
        &mut rng,
    );

    tracing::info!(
        "Weather notices for grid ({}, {}) from {:?}: {} templates, {} stored notices",
        point.nx,
        point.ny,
        source,
        templates.len(),
        matching.len()
    );

    Ok(Json(WeatherNoticesResponse {
        source,
        grid: point,
        grid_center: grid_center(point),
        address: req.address,
        observation: ObservationResponse::new(&observation, base),
        templates,
        matching_notices: matching.into_iter().map(NoticeResponse::from).collect(),
    }))
}

/// Condition groups that have templates in the catalog.
#[utoipa::path(
    get,
    path = "/api/v1/weather/conditions",
    tag = "Weather",
    responses(
        (status = 200, description = "Condition groups with template counts", body = Vec<ConditionSummary>),
    )
)]
pub async fn list_conditions(State(state): State<AppState>) -> Json<Vec<ConditionSummary>> {
    let summaries = state
        .catalog
        .available_conditions()
        .into_iter()
        .map(|group| ConditionSummary {
            group,
            template_count: state.catalog.templates_for(group).len(),
        })
        .collect();
    Json(summaries)
}

/// All templates of one condition group (preview).
#[utoipa::path(
    get,
    path = "/api/v1/weather/conditions/{group}",
    tag = "Weather",
    params(
        ("group" = String, Path, description = "Condition group, e.g. hot_weather"),
    ),
    responses(
        (status = 200, description = "Templates in the group", body = Vec<NoticeTemplate>),
        (status = 404, description = "Unknown condition group", body = ErrorResponse),
    )
)]
pub async fn get_condition_templates(
    State(state): State<AppState>,
    Path(group): Path<String>,
) -> Result<Json<Vec<NoticeTemplate>>, AppError> {
    let group: ConditionGroup = group.parse().map_err(AppError::NotFound)?;
    Ok(Json(state.catalog.templates_for(group).to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_grid_for_seoul() {
        assert_eq!(
            grid_for_location(37.5665, 126.9780).unwrap(),
            GridPoint { nx: 60, ny: 127 }
        );
    }

    #[test]
    fn test_grid_center_is_near_request() {
        let point = grid_for_location(35.1796, 129.0756).unwrap();
        let center = grid_center(point);
        assert!((center.lat - 35.1796).abs() < 0.05);
        assert!((center.lng - 129.0756).abs() < 0.05);
    }

    #[test]
    fn test_location_outside_korea_rejected() {
        assert!(matches!(
            grid_for_location(47.3769, 8.5417),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_non_finite_location_rejected() {
        assert!(grid_for_location(f64::NAN, 127.0).is_err());
    }

    #[test]
    fn test_off_grid_corner_rejected() {
        // Inside the bounding box but east of the grid
        assert!(grid_for_location(33.0, 132.0).is_err());
    }

    #[test]
    fn test_failed_nowcast_falls_back_to_generated_weather() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let failed = Nowcast::Failed(AppError::ExternalServiceError("timeout".to_string()));
        let (source, observation, base) = resolve_observation(failed, &mut rng);
        assert_eq!(source, WeatherSource::Fallback);
        assert!(base.is_none());
        assert!((10.0..=24.0).contains(&observation.temperature));

        let (source, _, _) = resolve_observation(Nowcast::Unconfigured, &mut rng);
        assert_eq!(source, WeatherSource::Dummy);
    }

    #[test]
    fn test_live_nowcast_keeps_base_slot() {
        let live = KmaNowcast {
            observation: WeatherObservation {
                temperature: 30.5,
                humidity: 70.0,
                precipitation: 0.0,
                wind_speed: 2.0,
                precipitation_type: PrecipitationType::None,
            },
            base_date: "20250707".to_string(),
            base_time: "1430".to_string(),
        };
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let (source, observation, base) = resolve_observation(Nowcast::Live(live), &mut rng);
        assert_eq!(source, WeatherSource::Kma);
        assert_eq!(observation.temperature, 30.5);
        assert_eq!(base, Some(("20250707".to_string(), "1430".to_string())));
    }

    #[test]
    fn test_observation_response_includes_sky_and_base_time() {
        let obs = WeatherObservation {
            temperature: 2.0,
            humidity: 90.0,
            precipitation: 1.0,
            wind_speed: 3.0,
            precipitation_type: PrecipitationType::Snow,
        };
        let response =
            ObservationResponse::new(&obs, Some(("20250107".to_string(), "0830".to_string())));
        assert_eq!(response.sky_condition, SkyCondition::Snowy);
        assert_eq!(response.base_time.as_deref(), Some("0830"));

        let generated = ObservationResponse::new(&obs, None);
        assert!(generated.base_date.is_none());
    }
}
