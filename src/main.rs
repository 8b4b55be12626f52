use axum::routing::{get, post};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod aggregation;
mod cache;
mod config;
mod db;
mod errors;
mod geocode;
mod helpers;
mod location;
mod normalize;
mod providers;
mod routes;
mod scheduler;

use cache::CacheAdapter;
use config::AppConfig;
use geocode::GeocoderClient;
use providers::ProviderClient;
use scheduler::{ManualTriggerHandles, SchedulerDeps, SchedulerState, SharedSchedulerState};

/// Maximum number of connections in the database pool.
const DB_POOL_MAX_CONNECTIONS: u32 = 5;
/// Minimum number of connections kept alive in the database pool.
const DB_POOL_MIN_CONNECTIONS: u32 = 2;

/// Shared application state, cloned into every route handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::PgPool,
    pub cache: CacheAdapter,
    pub providers: Vec<ProviderClient>,
    pub geocoder: GeocoderClient,
    pub config: AppConfig,
    pub scheduler_state: SharedSchedulerState,
    pub scheduler_handles: ManualTriggerHandles,
}

/// Weather aggregation API — OpenAPI specification.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Weather Aggregation API",
        version = "0.1.0",
        description = "Aggregates current, hourly, and daily weather forecasts from multiple \
            providers behind a tiered cache, with location resolution by name or coordinates.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Health", description = "Service health check"),
        (name = "Weather", description = "Current, hourly, and daily forecast retrieval"),
        (name = "Admin", description = "Development and operational endpoints"),
    ),
    paths(
        routes::health::health_check,
        routes::weather::get_current_weather,
        routes::weather::get_hourly_forecast,
        routes::weather::get_daily_forecast,
        routes::admin::reset_db,
        routes::admin::run_scheduler_jobs,
        routes::admin::get_config,
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            routes::weather::LocationSummary,
            routes::weather::CurrentWeatherEntry,
            routes::weather::CurrentWeatherResponse,
            routes::weather::HourlyForecastEntry,
            routes::weather::HourlyForecastResponse,
            routes::weather::DailyForecastEntry,
            routes::weather::DailyForecastResponse,
            routes::admin::ResetDbResponse,
            routes::admin::RunSchedulerJobsResponse,
            routes::admin::ConfigResponse,
            scheduler::SchedulerState,
            scheduler::JobStatus,
            errors::ErrorResponse,
        )
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weather_aggregator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(DB_POOL_MAX_CONNECTIONS)
        .min_connections(DB_POOL_MIN_CONNECTIONS)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Database migrations completed");

    let cache = CacheAdapter::connect(&config.redis_url)
        .await
        .expect("Failed to connect to cache");

    let geocoder = GeocoderClient::new(&config.geocoder_url, config.geocoder_api_key.as_deref());

    let providers: Vec<ProviderClient> = config
        .providers
        .iter()
        .map(ProviderClient::from_config)
        .collect();

    let scheduler_state: SharedSchedulerState = Arc::new(RwLock::new(SchedulerState::new()));
    let scheduler_deps = SchedulerDeps {
        pool: pool.clone(),
        cache: cache.clone(),
        providers: providers.clone(),
        config: config.clone(),
    };
    let scheduler_handles = scheduler::spawn_jobs(scheduler_deps, scheduler_state.clone());

    let app_state = AppState {
        pool: pool.clone(),
        cache,
        providers,
        geocoder,
        config: config.clone(),
        scheduler_state,
        scheduler_handles,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers(Any);

    let weather_routes = Router::new()
        .route("/api/currentweather", get(routes::weather::get_current_weather))
        .route("/api/hourlyforecast", get(routes::weather::get_hourly_forecast))
        .route("/api/dailyforecast", get(routes::weather::get_daily_forecast))
        .with_state(app_state.clone());

    let mut admin_router = Router::new().route("/api/config", get(routes::admin::get_config));
    if config.dev_mode {
        admin_router = admin_router
            .route("/dev/reset-db", post(routes::admin::reset_db))
            .route(
                "/dev/run-scheduler-jobs",
                post(routes::admin::run_scheduler_jobs),
            );
    } else {
        tracing::info!("dev_mode is off, /dev/* endpoints are not mounted");
    }
    let admin_router = admin_router.with_state(app_state.clone());

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let app = Router::new()
        .merge(health_routes)
        .merge(weather_routes)
        .merge(admin_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

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
