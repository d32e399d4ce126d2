use sqlx::PgPool;
use tracing::{debug, info, warn};

use super::aggregate::{bucket_averages, DataPoint, ReadingQuery};
use crate::{
    db::models::{NewReading, SensorReading, ServerLastSeen},
    error::ServiceError,
};

/// Telemetry store and query engine over the `sensor_data` table.
#[derive(Clone)]
pub struct TelemetryService {
    pool: PgPool,
    /// Accept the first reading of a server nobody has seen before.
    auto_register: bool,
}

impl TelemetryService {
    pub fn new(pool: PgPool, auto_register: bool) -> Self {
        Self { pool, auto_register }
    }

    /// Persists `reading` and returns its id.
    ///
    /// Rejects readings without any measurement, and readings for servers
    /// with no prior reading unless auto-registration is enabled.
    pub async fn append(&self, reading: &NewReading) -> Result<i64, ServiceError> {
        if !reading.has_measurement() {
            return Err(ServiceError::Validation(
                "At least one sensor value must be provided".into(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let known: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM sensor_data WHERE server_ulid = $1)",
        )
        .bind(&reading.server_ulid)
        .fetch_one(&mut *tx)
        .await?;

        if !known {
            if !self.auto_register {
                warn!(server_ulid = %reading.server_ulid, "Rejected reading for unknown server");
                return Err(ServiceError::NotFound("Server ULID not found".into()));
            }
            info!(server_ulid = %reading.server_ulid, "Registering server from first reading");
        }

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO sensor_data
                (server_ulid, server_name, temperature, humidity, voltage, "current", "timestamp")
            VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, now()))
            RETURNING id
            "#,
        )
        .bind(&reading.server_ulid)
        .bind(&reading.server_name)
        .bind(reading.temperature)
        .bind(reading.humidity)
        .bind(reading.voltage)
        .bind(reading.current)
        .bind(reading.timestamp)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(id, server_ulid = %reading.server_ulid, "Sensor reading persisted");
        Ok(id)
    }

    /// Most recent reading for `server_ulid`, by timestamp.
    pub async fn last_reading(
        &self,
        server_ulid: &str,
    ) -> Result<Option<SensorReading>, ServiceError> {
        let row = sqlx::query_as::<_, SensorReading>(
            r#"
            SELECT id, server_ulid, server_name,
                   temperature, humidity, voltage, "current", "timestamp"
            FROM sensor_data
            WHERE server_ulid = $1
            ORDER BY "timestamp" DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(server_ulid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// One row per server: its latest timestamp and the display name of the
    /// reading carrying it.
    pub async fn all_latest_per_server(&self) -> Result<Vec<ServerLastSeen>, ServiceError> {
        let rows = sqlx::query_as::<_, ServerLastSeen>(
            r#"
            SELECT DISTINCT ON (server_ulid)
                server_ulid,
                server_name,
                "timestamp" AS last_timestamp
            FROM sensor_data
            ORDER BY server_ulid, "timestamp" DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Raw or bucket-averaged values of one field, ordered by timestamp.
    pub async fn query(&self, query: &ReadingQuery) -> Result<Vec<DataPoint>, ServiceError> {
        let (start, end) = query.time_range().unzip();

        // The column comes from a closed enum, never from caller input.
        let sql = format!(
            r#"
            SELECT "timestamp", {column} AS value
            FROM sensor_data
            WHERE ($1::text IS NULL OR server_ulid = $1)
              AND ($2::timestamptz IS NULL OR "timestamp" BETWEEN $2 AND $3::timestamptz)
            ORDER BY "timestamp" ASC, id ASC
            "#,
            column = query.field.column(),
        );

        let points = sqlx::query_as::<_, DataPoint>(&sql)
            .bind(query.server_ulid.as_deref())
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;

        debug!(
            field = %query.field,
            bucket = ?query.bucket,
            rows = points.len(),
            "Sensor query executed"
        );

        Ok(match query.bucket {
            Some(bucket) => bucket_averages(points, bucket),
            None => points,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use sqlx::PgPool;

    use super::*;
    use crate::db::models::{Bucket, SensorField};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, h, m, 0).unwrap()
    }

    async fn seed(pool: &PgPool, server_ulid: &str, name: &str, ts: DateTime<Utc>, temp: Option<f64>) {
        sqlx::query(
            r#"INSERT INTO sensor_data (server_ulid, server_name, temperature, "timestamp")
               VALUES ($1, $2, $3, $4)"#,
        )
        .bind(server_ulid)
        .bind(name)
        .bind(temp)
        .bind(ts)
        .execute(pool)
        .await
        .unwrap();
    }

    fn reading(server_ulid: &str) -> NewReading {
        NewReading {
            server_ulid: server_ulid.into(),
            server_name: "rack-1".into(),
            voltage: Some(230.0),
            ..Default::default()
        }
    }

    fn temperature_query() -> ReadingQuery {
        ReadingQuery {
            server_ulid: None,
            start_time: None,
            end_time: None,
            field: SensorField::Temperature,
            bucket: None,
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn append_without_measurement_is_rejected(pool: PgPool) {
        seed(&pool, "srv1", "rack-1", at(10, 0), Some(1.0)).await;
        let telemetry = TelemetryService::new(pool, true);

        let empty = NewReading { voltage: None, ..reading("srv1") };
        assert!(matches!(
            telemetry.append(&empty).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn append_for_unknown_server_is_rejected(pool: PgPool) {
        let telemetry = TelemetryService::new(pool.clone(), false);
        assert!(matches!(
            telemetry.append(&reading("srv1")).await,
            Err(ServiceError::NotFound(_))
        ));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sensor_data")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn append_for_known_server_succeeds(pool: PgPool) {
        seed(&pool, "srv1", "rack-1", at(10, 0), Some(1.0)).await;
        let telemetry = TelemetryService::new(pool, false);

        let id = telemetry.append(&reading("srv1")).await.unwrap();
        let last = telemetry.last_reading("srv1").await.unwrap().unwrap();
        assert_eq!(last.id, id);
        assert_eq!(last.voltage, Some(230.0));
        assert_eq!(last.temperature, None);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn auto_register_accepts_first_reading(pool: PgPool) {
        let telemetry = TelemetryService::new(pool, true);
        telemetry.append(&reading("fresh")).await.unwrap();
        assert!(telemetry.last_reading("fresh").await.unwrap().is_some());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn append_keeps_supplied_timestamp(pool: PgPool) {
        seed(&pool, "srv1", "rack-1", at(9, 0), Some(1.0)).await;
        let telemetry = TelemetryService::new(pool, false);

        let r = NewReading { timestamp: Some(at(10, 30)), ..reading("srv1") };
        telemetry.append(&r).await.unwrap();
        let last = telemetry.last_reading("srv1").await.unwrap().unwrap();
        assert_eq!(last.timestamp, at(10, 30));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn last_reading_is_latest_by_timestamp(pool: PgPool) {
        seed(&pool, "srv1", "old-name", at(11, 0), Some(2.0)).await;
        seed(&pool, "srv1", "older-name", at(10, 0), Some(1.0)).await;
        let telemetry = TelemetryService::new(pool, false);

        let last = telemetry.last_reading("srv1").await.unwrap().unwrap();
        assert_eq!(last.timestamp, at(11, 0));
        assert_eq!(last.server_name, "old-name");
        assert!(telemetry.last_reading("srv2").await.unwrap().is_none());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn latest_per_server_uses_name_of_latest_reading(pool: PgPool) {
        seed(&pool, "srv1", "before-rename", at(10, 0), Some(1.0)).await;
        seed(&pool, "srv1", "after-rename", at(11, 0), Some(1.0)).await;
        seed(&pool, "srv2", "other", at(9, 0), Some(1.0)).await;
        let telemetry = TelemetryService::new(pool, false);

        let rows = telemetry.all_latest_per_server().await.unwrap();
        assert_eq!(rows.len(), 2);
        let srv1 = rows.iter().find(|r| r.server_ulid == "srv1").unwrap();
        assert_eq!(srv1.server_name, "after-rename");
        assert_eq!(srv1.last_timestamp, at(11, 0));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn hourly_aggregation(pool: PgPool) {
        seed(&pool, "srv1", "rack-1", at(10, 5), Some(10.0)).await;
        seed(&pool, "srv1", "rack-1", at(10, 50), Some(20.0)).await;
        seed(&pool, "srv1", "rack-1", at(11, 10), Some(30.0)).await;
        let telemetry = TelemetryService::new(pool, false);

        let q = ReadingQuery { bucket: Some(Bucket::Hour), ..temperature_query() };
        let got = telemetry.query(&q).await.unwrap();
        assert_eq!(
            got,
            vec![
                DataPoint { timestamp: at(10, 0), value: Some(15.0) },
                DataPoint { timestamp: at(11, 0), value: Some(30.0) },
            ]
        );
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn raw_query_returns_nulls_for_missing_field(pool: PgPool) {
        seed(&pool, "srv1", "rack-1", at(10, 0), Some(10.0)).await;
        seed(&pool, "srv1", "rack-1", at(10, 1), None).await;
        let telemetry = TelemetryService::new(pool, false);

        let got = telemetry.query(&temperature_query()).await.unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].value, Some(10.0));
        assert_eq!(got[1].value, None);

        let q = ReadingQuery { field: SensorField::Humidity, ..temperature_query() };
        let got = telemetry.query(&q).await.unwrap();
        assert!(got.iter().all(|p| p.value.is_none()));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn query_filters_by_server(pool: PgPool) {
        seed(&pool, "srv1", "rack-1", at(10, 0), Some(1.0)).await;
        seed(&pool, "srv2", "rack-2", at(10, 0), Some(2.0)).await;
        let telemetry = TelemetryService::new(pool, false);

        let q = ReadingQuery { server_ulid: Some("srv2".into()), ..temperature_query() };
        let got = telemetry.query(&q).await.unwrap();
        assert_eq!(got, vec![DataPoint { timestamp: at(10, 0), value: Some(2.0) }]);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn query_range_is_inclusive(pool: PgPool) {
        for m in [0, 10, 20, 30] {
            seed(&pool, "srv1", "rack-1", at(10, m), Some(f64::from(m))).await;
        }
        let telemetry = TelemetryService::new(pool, false);

        let q = ReadingQuery {
            start_time: Some(at(10, 10)),
            end_time: Some(at(10, 20)),
            ..temperature_query()
        };
        let got: Vec<_> = telemetry.query(&q).await.unwrap().into_iter().map(|p| p.value).collect();
        assert_eq!(got, vec![Some(10.0), Some(20.0)]);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn query_with_single_bound_applies_no_time_filter(pool: PgPool) {
        for m in [0, 10, 20, 30] {
            seed(&pool, "srv1", "rack-1", at(10, m), Some(f64::from(m))).await;
        }
        let telemetry = TelemetryService::new(pool, false);

        let only_start = ReadingQuery { start_time: Some(at(10, 15)), ..temperature_query() };
        assert_eq!(telemetry.query(&only_start).await.unwrap().len(), 4);

        let only_end = ReadingQuery { end_time: Some(at(10, 5)), ..temperature_query() };
        assert_eq!(telemetry.query(&only_end).await.unwrap().len(), 4);
    }
}
