use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    db::models::NewReading,
    liveness::{ServerHealth, Status},
    telemetry::DataPoint,
};

/// Request body for `POST /auth/register`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

/// Form body for `POST /auth/login`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    /// Always `"bearer"`.
    pub token_type: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Request body for `POST /data`. At least one measurement must be set.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SensorDataCreate {
    pub server_ulid: String,
    pub server_name: String,
    /// Degrees Celsius
    pub temperature: Option<f64>,
    /// Relative humidity percentage
    pub humidity: Option<f64>,
    /// Volts
    pub voltage: Option<f64>,
    /// Amperes
    pub current: Option<f64>,
    /// Measurement time (RFC3339). Defaults to ingestion time.
    pub timestamp: Option<DateTime<Utc>>,
}

impl From<SensorDataCreate> for NewReading {
    fn from(d: SensorDataCreate) -> Self {
        Self {
            server_ulid: d.server_ulid,
            server_name: d.server_name,
            temperature: d.temperature,
            humidity: d.humidity,
            voltage: d.voltage,
            current: d.current,
            timestamp: d.timestamp,
        }
    }
}

/// Query string of `GET /data`. Field and bucket names are validated by the
/// handler so that bad values surface as domain errors.
#[derive(Debug, Deserialize)]
pub struct DataQueryParams {
    pub server_ulid: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub sensor_type: Option<String>,
    pub aggregation: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DataPointDto {
    pub timestamp: DateTime<Utc>,
    pub value: Option<f64>,
}

impl From<DataPoint> for DataPointDto {
    fn from(p: DataPoint) -> Self {
        Self {
            timestamp: p.timestamp,
            value: p.value,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ServerHealthDto {
    pub server_ulid: String,
    pub status: Status,
    pub server_name: String,
}

impl From<ServerHealth> for ServerHealthDto {
    fn from(h: ServerHealth) -> Self {
        Self {
            server_ulid: h.server_ulid,
            status: h.status,
            server_name: h.server_name,
        }
    }
}
