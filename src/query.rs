//! Query value type and its canonical cache signature
//!
//! Two logically identical queries must serialize to byte-identical
//! signatures: metric names are sorted and deduplicated, dates use a fixed
//! format, field order never changes.

use crate::types::{Result, ServiceKind, StreamboardError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Reporting granularity for a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Daily,
    Weekly,
    Monthly,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Daily => "daily",
            Granularity::Weekly => "weekly",
            Granularity::Monthly => "monthly",
        }
    }
}

/// Inclusive date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(StreamboardError::Config(format!(
                "invalid date range: {} is after {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Range covering the last `days` days ending at `end`
    pub fn last_days(end: NaiveDate, days: u32) -> Self {
        Self {
            start: end - chrono::Duration::days(i64::from(days.saturating_sub(1))),
            end,
        }
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// What to fetch: service kind, metric set, date range, granularity.
///
/// A value type; `signature()` is the cache key component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub service_kind: ServiceKind,
    pub metric_set: Vec<String>,
    pub date_range: DateRange,
    pub granularity: Granularity,
}

impl Query {
    pub fn new(
        service_kind: ServiceKind,
        metric_set: Vec<String>,
        date_range: DateRange,
        granularity: Granularity,
    ) -> Self {
        Self {
            service_kind,
            metric_set,
            date_range,
            granularity,
        }
    }

    /// Canonical serialization used as the cache key signature.
    ///
    /// Stable under metric-set reordering and duplicates.
    pub fn signature(&self) -> String {
        let mut metrics: Vec<&str> = self.metric_set.iter().map(String::as_str).collect();
        metrics.sort_unstable();
        metrics.dedup();
        format!(
            "{}|{}|{}..{}|{}",
            self.service_kind.as_str(),
            metrics.join(","),
            self.date_range.start.format("%Y-%m-%d"),
            self.date_range.end.format("%Y-%m-%d"),
            self.granularity.as_str()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn range() -> DateRange {
        DateRange::new(date(2025, 1, 1), date(2025, 1, 30)).unwrap()
    }

    #[test]
    fn test_signature_fixed_format() {
        let q = Query::new(
            ServiceKind::Analytics,
            vec!["sessions".into(), "bounce_rate".into()],
            range(),
            Granularity::Daily,
        );
        assert_eq!(
            q.signature(),
            "analytics|bounce_rate,sessions|2025-01-01..2025-01-30|daily"
        );
    }

    #[test]
    fn test_signature_stable_under_metric_ordering() {
        let a = Query::new(
            ServiceKind::AdRevenue,
            vec!["earnings".into(), "clicks".into(), "impressions".into()],
            range(),
            Granularity::Daily,
        );
        let b = Query::new(
            ServiceKind::AdRevenue,
            vec!["impressions".into(), "earnings".into(), "clicks".into()],
            range(),
            Granularity::Daily,
        );
        assert_eq!(a.signature(), b.signature());
    }

    #[test]
    fn test_signature_dedups_metrics() {
        let a = Query::new(
            ServiceKind::Analytics,
            vec!["sessions".into(), "sessions".into()],
            range(),
            Granularity::Daily,
        );
        let b = Query::new(
            ServiceKind::Analytics,
            vec!["sessions".into()],
            range(),
            Granularity::Daily,
        );
        assert_eq!(a.signature(), b.signature());
    }

    #[test]
    fn test_signature_differs_by_granularity() {
        let daily = Query::new(
            ServiceKind::CloudMetrics,
            vec!["cost".into()],
            range(),
            Granularity::Daily,
        );
        let monthly = Query::new(
            ServiceKind::CloudMetrics,
            vec!["cost".into()],
            range(),
            Granularity::Monthly,
        );
        assert_ne!(daily.signature(), monthly.signature());
    }

    #[test]
    fn test_date_range_rejects_inverted() {
        assert!(DateRange::new(date(2025, 2, 1), date(2025, 1, 1)).is_err());
    }

    #[test]
    fn test_last_days() {
        let r = DateRange::last_days(date(2025, 1, 30), 30);
        assert_eq!(r.start, date(2025, 1, 1));
        assert_eq!(r.days(), 30);
    }
}
