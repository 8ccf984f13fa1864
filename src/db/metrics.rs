//! Read-only access to the time-series store populated by the collector.

use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use super::models::{MetricWindow, Series, SeriesLabel};

const BUSY_GRACE: Duration = Duration::from_secs(1);

/// Metric route slugs and the metric names the collector writes.
pub const METRICS: &[(&str, &str)] = &[
    ("cpu-temp", "cpu_temp"),
    ("ram-used", "ram_used"),
    ("load-1m", "load_1m"),
    ("fan-rpm", "fan_rpm"),
    ("disk-usage", "disk_usage"),
];

/// Resolve a route slug to the stored metric name.
pub fn metric_for_slug(slug: &str) -> Option<&'static str> {
    METRICS
        .iter()
        .find(|(s, _)| *s == slug)
        .map(|(_, name)| *name)
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("metrics store unavailable: {0}")]
    Unavailable(String),
    #[error("metrics query timed out after {0:?}")]
    Timeout(Duration),
}

impl From<rusqlite::Error> for QueryError {
    fn from(e: rusqlite::Error) -> Self {
        QueryError::Unavailable(e.to_string())
    }
}

/// Handle on the metrics database. A connection is opened per query.
#[derive(Debug, Clone)]
pub struct MetricsStore {
    path: PathBuf,
    timeout: Duration,
}

impl MetricsStore {
    pub fn new<P: AsRef<Path>>(path: P, timeout: Duration) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            timeout,
        }
    }

    /// Samples for `metric` inside `window`, oldest first.
    ///
    /// The window start is computed by SQLite in local time, matching how
    /// the collector stamps its rows.
    pub fn query_series(&self, metric: &str, window: MetricWindow) -> Result<Series, QueryError> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        // Outwait the async ceiling so a locked store surfaces as Timeout
        conn.busy_timeout(self.timeout + BUSY_GRACE)?;

        let mut stmt = conn.prepare(
            "SELECT ts, value FROM metrics
             WHERE name = ?1 AND ts >= datetime('now', ?2, 'localtime')
             ORDER BY ts",
        )?;

        let mut series = Series::default();
        let mut rows = stmt.query(params![metric, window.sqlite_modifier()])?;
        while let Some(row) = rows.next()? {
            let label = match row.get_ref(0)? {
                ValueRef::Integer(i) => SeriesLabel::Integer(i),
                ValueRef::Real(f) => SeriesLabel::Text(f.to_string()),
                ValueRef::Text(t) | ValueRef::Blob(t) => {
                    SeriesLabel::Text(String::from_utf8_lossy(t).into_owned())
                }
                ValueRef::Null => continue,
            };
            series.labels.push(label);
            series.values.push(row.get(1)?);
        }

        Ok(series)
    }

    /// Run [`Self::query_series`] on the blocking pool, bounded by the timeout.
    pub async fn series(&self, metric: &str, window: MetricWindow) -> Result<Series, QueryError> {
        let store = self.clone();
        let metric = metric.to_string();
        let task = tokio::task::spawn_blocking(move || store.query_series(&metric, window));

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(QueryError::Unavailable(format!("query task failed: {}", e))),
            Err(_) => Err(QueryError::Timeout(self.timeout)),
        }
    }
}
