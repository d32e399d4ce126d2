use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{error::ServiceError, telemetry::TelemetryService};

/// A server is online when its newest reading is at most this many seconds old.
pub const ONLINE_THRESHOLD_SECS: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Online,
    Offline,
}

impl Status {
    /// Classifies a server from the timestamp of its newest reading.
    /// Readings stamped in the future count as fresh.
    pub fn from_last_seen(last_seen: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if now - last_seen <= TimeDelta::seconds(ONLINE_THRESHOLD_SECS) {
            Status::Online
        } else {
            Status::Offline
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerHealth {
    pub server_ulid: String,
    pub status: Status,
    pub server_name: String,
}

/// Derives online/offline status from the telemetry store.
#[derive(Clone)]
pub struct LivenessEvaluator {
    telemetry: TelemetryService,
}

impl LivenessEvaluator {
    pub fn new(telemetry: TelemetryService) -> Self {
        Self { telemetry }
    }

    pub async fn status_of(
        &self,
        server_ulid: &str,
        now: DateTime<Utc>,
    ) -> Result<ServerHealth, ServiceError> {
        let last = self
            .telemetry
            .last_reading(server_ulid)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Server not found".into()))?;

        Ok(ServerHealth {
            server_ulid: last.server_ulid,
            status: Status::from_last_seen(last.timestamp, now),
            server_name: last.server_name,
        })
    }

    /// Status of every server that has reported at least once. All entries
    /// are judged against the same `now`.
    pub async fn status_of_all(&self, now: DateTime<Utc>) -> Result<Vec<ServerHealth>, ServiceError> {
        let rows = self.telemetry.all_latest_per_server().await?;
        Ok(rows
            .into_iter()
            .map(|row| ServerHealth {
                status: Status::from_last_seen(row.last_timestamp, now),
                server_ulid: row.server_ulid,
                server_name: row.server_name,
            })
            .collect())
    }
}
