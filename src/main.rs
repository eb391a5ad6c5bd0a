// Classroom Notices API v0.1
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod db;
mod errors;
mod helpers;
mod routes;
mod services;

use config::AppConfig;
use routes::weather::AppState;
use services::kma::KmaClient;

/// Maximum number of connections in the database pool.
const DB_POOL_MAX_CONNECTIONS: u32 = 5;
/// Minimum number of connections kept alive in the database pool.
const DB_POOL_MIN_CONNECTIONS: u32 = 2;

/// OpenAPI document for the Classroom Notices API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Classroom Notices API",
        version = "0.1.0",
        description = "Notice suggestions for homeroom teachers. \
            Picks weather-appropriate notice templates from the current KMA nowcast \
            at the school's location, and recommends unused notices from the \
            categories a teacher has used least so daily notices stay varied.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Health", description = "Service health check"),
        (name = "Weather", description = "Weather-based notice templates"),
        (name = "Recommendations", description = "Usage-diverse notice recommendations"),
        (name = "Usage", description = "Notice usage log and statistics"),
    ),
    paths(
        routes::health::health_check,
        routes::weather::post_weather_notices,
        routes::weather::list_conditions,
        routes::weather::get_condition_templates,
        routes::recommendations::get_recommendations,
        routes::usage::get_category_stats,
        routes::usage::record_usage,
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            routes::weather::WeatherNoticesRequest,
            routes::weather::WeatherNoticesResponse,
            routes::weather::WeatherSource,
            routes::weather::ObservationResponse,
            routes::weather::LatLng,
            routes::weather::ConditionSummary,
            routes::recommendations::NoticeResponse,
            routes::recommendations::RecommendationResponse,
            routes::usage::NoticeUsageResponse,
            routes::usage::CategoryStatResponse,
            routes::usage::SubTagStatResponse,
            routes::usage::UsageStatsResponse,
            routes::usage::RecordUsageRequest,
            routes::usage::RecordUsageResponse,
            services::catalog::NoticeTemplate,
            services::catalog::ConditionGroup,
            services::catalog::TemplateCategory,
            services::categories::Category,
            services::conditions::PrecipitationType,
            services::conditions::SkyCondition,
            services::conditions::Range,
            services::conditions::WeatherConditionSpec,
            services::grid::GridPoint,
            errors::ErrorResponse,
        )
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "classroom_notices_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();

    // The weather catalog is required; refuse to start without it
    let data_dir = std::path::Path::new(&config.data_dir);
    let catalog = match services::catalog::load_catalog_from_dir(data_dir) {
        Ok(catalog) => catalog,
        Err(e) => {
            tracing::error!(
                "Failed to load weather notice catalog from {}: {}",
                data_dir.display(),
                e
            );
            std::process::exit(1);
        }
    };

    // Set up database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(DB_POOL_MAX_CONNECTIONS)
        .min_connections(DB_POOL_MIN_CONNECTIONS)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Database migrations completed");

    let kma_client = match (&config.kma_api_key, &config.kma_base_url) {
        (Some(key), Some(base_url)) => {
            tracing::info!("Using KMA nowcast endpoint {}", base_url);
            Some(KmaClient::with_base_url(key, base_url))
        }
        (Some(key), None) => Some(KmaClient::new(key)),
        (None, _) => {
            tracing::warn!("KMA_API_KEY not set; weather notices use generated weather");
            None
        }
    };

    let app_state = AppState {
        pool: pool.clone(),
        catalog: Arc::new(catalog),
        kma_client,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers(Any);

    // Build router
    // Weather and health routes use AppState; user routes use PgPool state directly.
    let weather_routes = Router::new()
        .route(
            "/api/v1/weather/notices",
            post(routes::weather::post_weather_notices),
        )
        .route(
            "/api/v1/weather/conditions",
            get(routes::weather::list_conditions),
        )
        .route(
            "/api/v1/weather/conditions/:group",
            get(routes::weather::get_condition_templates),
        )
        .route("/api/v1/health", get(routes::health::health_check))
        .with_state(app_state);

    let user_routes = Router::new()
        .route(
            "/api/v1/users/:user_id/recommendations",
            get(routes::recommendations::get_recommendations),
        )
        .route(
            "/api/v1/users/:user_id/category-stats",
            get(routes::usage::get_category_stats),
        )
        .route(
            "/api/v1/users/:user_id/usage",
            post(routes::usage::record_usage),
        )
        .with_state(pool);

    let app = Router::new()
        .merge(weather_routes)
        .merge(user_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("API server listening on {}", addr);
    tracing::info!(
        "Swagger UI available at http://localhost:{}/swagger-ui/",
        config.port
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");
    axum::serve(listener, app)
        .await
        .expect("Server terminated unexpectedly");
}
