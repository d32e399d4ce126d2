pub mod dto;
pub mod errors;
pub mod extract;
pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    auth::TokenIssuer, liveness::LivenessEvaluator, telemetry::TelemetryService,
    users::UserService,
};
use handlers::ApiDoc;

/// Shared handler state. Every member is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub users: UserService,
    pub telemetry: TelemetryService,
    pub liveness: LivenessEvaluator,
    pub tokens: TokenIssuer,
}

impl AppState {
    pub fn new(pool: PgPool, tokens: TokenIssuer, auto_register_servers: bool) -> Self {
        let telemetry = TelemetryService::new(pool.clone(), auto_register_servers);
        Self {
            users: UserService::new(pool),
            liveness: LivenessEvaluator::new(telemetry.clone()),
            telemetry,
            tokens,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route("/", get(handlers::root))
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route(
            "/data",
            post(handlers::ingest_sensor_data).get(handlers::query_sensor_data),
        )
        .route("/health/all", get(handlers::all_servers_health))
        .route("/health/{server_ulid}", get(handlers::server_health))
        .with_state(state)
        .split_for_parts();

    router
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
        .layer(TraceLayer::new_for_http())
}
