//! Time-bucketed averaging over a single sensor field.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::db::models::{Bucket, SensorField};

/// One `(timestamp, value)` pair of a query result. `value` is `None` when
/// the reading did not report the field, or when every reading in a bucket
/// lacked it.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct DataPoint {
    pub timestamp: DateTime<Utc>,
    pub value: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ReadingQuery {
    pub server_ulid: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub field: SensorField,
    pub bucket: Option<Bucket>,
}

impl ReadingQuery {
    /// The inclusive range to filter on. A lone bound is ignored: filtering
    /// happens only when both ends are given.
    pub fn time_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.start_time.zip(self.end_time)
    }
}

/// Groups points by their truncated timestamp and averages the non-null
/// values of each group. Output is ordered by bucket start.
pub fn bucket_averages<I>(points: I, bucket: Bucket) -> Vec<DataPoint>
where
    I: IntoIterator<Item = DataPoint>,
{
    let mut groups: BTreeMap<DateTime<Utc>, (f64, u32)> = BTreeMap::new();

    for point in points {
        let (sum, count) = groups.entry(bucket.truncate(point.timestamp)).or_default();
        if let Some(v) = point.value {
            *sum += v;
            *count += 1;
        }
    }

    groups
        .into_iter()
        .map(|(timestamp, (sum, count))| DataPoint {
            timestamp,
            value: (count > 0).then(|| sum / f64::from(count)),
        })
        .collect()
}
