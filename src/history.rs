use chrono::{DateTime, Duration, Utc};
use clap::ValueEnum;

use crate::session::SessionRecord;
use crate::util::{mean, std_dev};

/// Number of results shown in the progress chart
pub const CHART_POINTS: usize = 7;

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Period {
    Week,
    Month,
    All,
}

impl Period {
    /// Maximum age of a result for the period, `None` for no limit.
    pub fn max_age(&self) -> Option<Duration> {
        match self {
            Period::Week => Some(Duration::days(7)),
            Period::Month => Some(Duration::days(30)),
            Period::All => None,
        }
    }
}

/// Results no older than the period, in stored order.
pub fn filter_by_period(
    records: &[SessionRecord],
    period: Period,
    now: DateTime<Utc>,
) -> Vec<SessionRecord> {
    records
        .iter()
        .filter(|r| period.max_age().map_or(true, |age| now - r.started_at <= age))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistorySummary {
    pub count: usize,
    pub total_distance: u64,
    pub average_distance: u32,
    pub best_distance: u32,
    pub std_dev: f64,
}

impl HistorySummary {
    pub fn from_records(records: &[SessionRecord]) -> Self {
        let distances: Vec<f64> = records.iter().map(|r| r.distance_meters as f64).collect();

        Self {
            count: records.len(),
            total_distance: records.iter().map(|r| r.distance_meters as u64).sum(),
            average_distance: mean(&distances).map_or(0, |m| m.round() as u32),
            best_distance: records.iter().map(|r| r.distance_meters).max().unwrap_or(0),
            std_dev: std_dev(&distances).unwrap_or(0.0),
        }
    }
}

/// The last `limit` results as (short date label, distance) pairs.
pub fn chart_series(records: &[SessionRecord], limit: usize) -> Vec<(String, u32)> {
    let skip = records.len().saturating_sub(limit);
    records
        .iter()
        .skip(skip)
        .map(|r| (r.started_at.format("%b %-d").to_string(), r.distance_meters))
        .collect()
}

/// Period results newest first, as listed under "Recent Tests".
pub fn recent(records: &[SessionRecord]) -> Vec<&SessionRecord> {
    records.iter().rev().collect()
}

/// Long date and 12-hour time labels for one result, e.g. `("January 2, 2024", "10:00 AM")`.
pub fn date_time_labels(record: &SessionRecord) -> (String, String) {
    (
        record.started_at.format("%B %-d, %Y").to_string(),
        record.started_at.format("%I:%M %p").to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 30, 12, 0, 0).unwrap()
    }

    fn result(days_ago: i64, distance_meters: u32) -> SessionRecord {
        SessionRecord {
            started_at: now() - Duration::days(days_ago),
            distance_meters,
            duration_seconds: 360,
            samples: vec![],
        }
    }

    #[test]
    fn period_filters_by_age() {
        let records = vec![result(40, 300), result(20, 400), result(7, 450), result(1, 500)];

        let week = filter_by_period(&records, Period::Week, now());
        assert_eq!(week, vec![result(7, 450), result(1, 500)]);

        let month = filter_by_period(&records, Period::Month, now());
        assert_eq!(month.len(), 3);

        let all = filter_by_period(&records, Period::All, now());
        assert_eq!(all, records);
    }

    #[test]
    fn summary_of_empty_history_is_zero() {
        let summary = HistorySummary::from_records(&[]);
        assert_eq!(summary.count, 0);
        assert_eq!(summary.average_distance, 0);
        assert_eq!(summary.best_distance, 0);
        assert_eq!(summary.std_dev, 0.0);
    }

    #[test]
    fn summary_rounds_average() {
        let summary = HistorySummary::from_records(&[result(1, 400), result(2, 401)]);
        assert_eq!(summary.count, 2);
        assert_eq!(summary.total_distance, 801);
        assert_eq!(summary.average_distance, 401);
        assert_eq!(summary.best_distance, 401);
        assert_eq!(summary.std_dev, 0.5);
    }

    #[test]
    fn chart_keeps_last_points_in_order() {
        let records: Vec<SessionRecord> = (0..10).map(|i| result(10 - i, 300 + i as u32)).collect();
        let series = chart_series(&records, CHART_POINTS);
        assert_eq!(series.len(), CHART_POINTS);
        assert_eq!(series[0].1, 303);
        assert_eq!(series[6], ("Sep 29".to_string(), 309));
    }

    #[test]
    fn chart_with_few_results() {
        let series = chart_series(&[result(0, 10)], CHART_POINTS);
        assert_eq!(series, vec![("Sep 30".to_string(), 10)]);
    }

    #[test]
    fn period_labels() {
        assert_eq!(Period::Week.to_string(), "week");
        assert_eq!(Period::All.to_string(), "all");
    }

    #[test]
    fn recent_lists_newest_first() {
        let records = vec![result(9, 300), result(5, 350), result(2, 420)];
        let distances: Vec<u32> = recent(&records).iter().map(|r| r.distance_meters).collect();
        assert_eq!(distances, vec![420, 350, 300]);
        assert!(recent(&[]).is_empty());
    }

    #[test]
    fn date_time_labels_use_long_date_and_12_hour_clock() {
        let record = SessionRecord {
            started_at: Utc.with_ymd_and_hms(2024, 1, 2, 15, 5, 0).unwrap(),
            distance_meters: 512,
            duration_seconds: 360,
            samples: vec![],
        };
        assert_eq!(
            date_time_labels(&record),
            ("January 2, 2024".to_string(), "03:05 PM".to_string())
        );
    }
}
