use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use tracing::{debug, info, warn};
use utoipa::OpenApi;

use super::{
    dto::{
        DataPointDto, DataQueryParams, LoginForm, MessageResponse, RegisterRequest,
        SensorDataCreate, ServerHealthDto, TokenResponse,
    },
    errors::AppError,
    extract::{AuthUser, ValidForm, ValidJson, ValidQuery},
    AppState,
};
use crate::{
    db::models::{Bucket, SensorField},
    error::ServiceError,
    liveness::Status,
    telemetry::ReadingQuery,
};

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

/// Liveness of the API itself.
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service is running", body = MessageResponse),
    ),
    tag = "system"
)]
pub async fn root() -> Json<MessageResponse> {
    Json(MessageResponse::new("API is running!"))
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "User created", body = MessageResponse),
        (status = 400, description = "Malformed body, or empty username or password"),
        (status = 409, description = "Username already registered"),
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<RegisterRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state.users.register(&body.username, &body.password).await?;
    Ok(Json(MessageResponse::new("User created successfully")))
}

/// Exchange username and password (form-encoded) for a bearer token.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Bearer token", body = TokenResponse),
        (status = 400, description = "Malformed form body"),
        (status = 401, description = "Invalid credentials"),
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    ValidForm(form): ValidForm<LoginForm>,
) -> Result<Json<TokenResponse>, AppError> {
    if !state.users.verify(&form.username, &form.password).await? {
        warn!(username = %form.username, "Failed login attempt");
        return Err(ServiceError::InvalidCredentials.into());
    }

    let access_token = state.tokens.issue_default(&form.username)?;
    info!(username = %form.username, "User logged in");

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_owned(),
    }))
}

// ---------------------------------------------------------------------------
// Sensor data
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/data",
    request_body = SensorDataCreate,
    responses(
        (status = 200, description = "Reading stored", body = MessageResponse),
        (status = 400, description = "Malformed body or no sensor value provided"),
        (status = 404, description = "Unknown server ULID"),
    ),
    tag = "data"
)]
pub async fn ingest_sensor_data(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<SensorDataCreate>,
) -> Result<Json<MessageResponse>, AppError> {
    state.telemetry.append(&body.into()).await?;
    Ok(Json(MessageResponse::new("Sensor data registered successfully")))
}

/// Readings of one sensor field, raw or averaged per time bucket.
///
/// The time range applies only when both `start_time` and `end_time` are
/// given. Results are ordered by timestamp.
#[utoipa::path(
    get,
    path = "/data",
    params(
        ("server_ulid" = Option<String>, Query, description = "Restrict to one server"),
        ("start_time"  = Option<String>, Query, description = "Start of range (RFC3339, inclusive)"),
        ("end_time"    = Option<String>, Query, description = "End of range (RFC3339, inclusive)"),
        ("sensor_type" = SensorField,    Query, description = "Field to return"),
        ("aggregation" = Option<Bucket>, Query, description = "Average per minute, hour or day"),
    ),
    responses(
        (status = 200, description = "Data points", body = Vec<DataPointDto>),
        (status = 400, description = "Malformed query, missing or unknown sensor_type, or bad aggregation"),
        (status = 401, description = "Missing or invalid bearer token"),
    ),
    tag = "data"
)]
pub async fn query_sensor_data(
    State(state): State<AppState>,
    user: AuthUser,
    ValidQuery(params): ValidQuery<DataQueryParams>,
) -> Result<Json<Vec<DataPointDto>>, AppError> {
    let field: SensorField = params
        .sensor_type
        .as_deref()
        .ok_or_else(|| ServiceError::Validation("sensor_type is required".into()))?
        .parse()?;
    let bucket = params
        .aggregation
        .as_deref()
        .map(str::parse::<Bucket>)
        .transpose()?;

    debug!(username = %user.username, field = %field, bucket = ?bucket, "Querying sensor data");

    let query = ReadingQuery {
        server_ulid: params.server_ulid,
        start_time: params.start_time,
        end_time: params.end_time,
        field,
        bucket,
    };
    let points = state.telemetry.query(&query).await?;

    Ok(Json(points.into_iter().map(Into::into).collect()))
}

// ---------------------------------------------------------------------------
// Server health
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health/{server_ulid}",
    params(
        ("server_ulid" = String, Path, description = "Server ULID"),
    ),
    responses(
        (status = 200, description = "Server status", body = ServerHealthDto),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 404, description = "Server not found"),
    ),
    tag = "health"
)]
pub async fn server_health(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(server_ulid): Path<String>,
) -> Result<Json<ServerHealthDto>, AppError> {
    let health = state.liveness.status_of(&server_ulid, Utc::now()).await?;
    Ok(Json(health.into()))
}

#[utoipa::path(
    get,
    path = "/health/all",
    responses(
        (status = 200, description = "Status of every known server", body = Vec<ServerHealthDto>),
        (status = 401, description = "Missing or invalid bearer token"),
    ),
    tag = "health"
)]
pub async fn all_servers_health(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Result<Json<Vec<ServerHealthDto>>, AppError> {
    let all = state.liveness.status_of_all(Utc::now()).await?;
    Ok(Json(all.into_iter().map(Into::into).collect()))
}

// ---------------------------------------------------------------------------
// OpenAPI document
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(
        root,
        register,
        login,
        ingest_sensor_data,
        query_sensor_data,
        server_health,
        all_servers_health,
    ),
    components(schemas(
        RegisterRequest,
        LoginForm,
        TokenResponse,
        MessageResponse,
        SensorDataCreate,
        DataPointDto,
        ServerHealthDto,
        SensorField,
        Bucket,
        Status,
    )),
    tags(
        (name = "auth",   description = "Registration and login"),
        (name = "data",   description = "Sensor reading ingestion and queries"),
        (name = "health", description = "Server liveness"),
        (name = "system", description = "System endpoints"),
    ),
    info(
        title = "Telemetry Service API",
        version = "0.1.0",
        description = "Sensor telemetry ingestion and query API"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
