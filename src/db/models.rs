use std::{fmt, str::FromStr};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::error::ServiceError;

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    /// PHC string; algorithm parameters and salt are embedded.
    pub hashed_password: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SensorReading {
    pub id: i64,
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
    pub timestamp: DateTime<Utc>,
}

/// A reading as submitted by a client, before it has an id.
#[derive(Debug, Clone, Default)]
pub struct NewReading {
    pub server_ulid: String,
    pub server_name: String,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub voltage: Option<f64>,
    pub current: Option<f64>,
    /// Falls back to ingestion time when absent.
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewReading {
    /// True when at least one of the four measurements is set.
    ///
    /// Presence is `Some(_)`, so a reading whose only value is `0.0` is
    /// accepted. This intentionally departs from truthiness-based checks,
    /// which would reject an all-zero reading.
    pub fn has_measurement(&self) -> bool {
        self.temperature.is_some()
            || self.humidity.is_some()
            || self.voltage.is_some()
            || self.current.is_some()
    }
}

/// Most recent timestamp seen for a server, with the display name carried by
/// that reading.
#[derive(Debug, Clone, FromRow)]
pub struct ServerLastSeen {
    pub server_ulid: String,
    pub server_name: String,
    pub last_timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// SensorField
// ---------------------------------------------------------------------------

/// The numeric columns of `sensor_data` a query may select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SensorField {
    Temperature,
    Humidity,
    Voltage,
    Current,
}

impl SensorField {
    pub const ALL: [SensorField; 4] = [
        SensorField::Temperature,
        SensorField::Humidity,
        SensorField::Voltage,
        SensorField::Current,
    ];

    /// Quoted column name, safe to splice into SQL.
    pub fn column(self) -> &'static str {
        match self {
            SensorField::Temperature => r#""temperature""#,
            SensorField::Humidity => r#""humidity""#,
            SensorField::Voltage => r#""voltage""#,
            SensorField::Current => r#""current""#,
        }
    }
}

impl fmt::Display for SensorField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SensorField::Temperature => "temperature",
            SensorField::Humidity => "humidity",
            SensorField::Voltage => "voltage",
            SensorField::Current => "current",
        };
        f.write_str(s)
    }
}

impl FromStr for SensorField {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "temperature" => Ok(Self::Temperature),
            "humidity" => Ok(Self::Humidity),
            "voltage" => Ok(Self::Voltage),
            "current" => Ok(Self::Current),
            other => Err(ServiceError::UnknownField(other.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// Bucket
// ---------------------------------------------------------------------------

/// Aggregation granularity. Timestamps are truncated in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Minute,
    Hour,
    Day,
}

impl Bucket {
    fn width_secs(self) -> i64 {
        match self {
            Bucket::Minute => 60,
            Bucket::Hour => 60 * 60,
            Bucket::Day => 24 * 60 * 60,
        }
    }

    /// Truncate `ts` down to the start of its bucket.
    pub fn truncate(self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let into_bucket = ts.timestamp().rem_euclid(self.width_secs());
        ts - TimeDelta::seconds(into_bucket)
            - TimeDelta::nanoseconds(i64::from(ts.timestamp_subsec_nanos()))
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Bucket::Minute => "minute",
            Bucket::Hour => "hour",
            Bucket::Day => "day",
        };
        f.write_str(s)
    }
}

impl FromStr for Bucket {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "minute" => Ok(Self::Minute),
            "hour" => Ok(Self::Hour),
            "day" => Ok(Self::Day),
            other => Err(ServiceError::Validation(format!(
                "aggregation must be one of minute, hour, day; got {other:?}"
            ))),
        }
    }
}
