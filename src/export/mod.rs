//! Export of detection results
//!
//! Two forms are produced:
//! - **CSV**: one row per interval or per bucket, for spreadsheets
//! - **JSON**: the full report or analysis, for programmatic consumers
//!
//! Floats are written with their shortest round-trip representation, so
//! values read back from either form are bit-identical to the originals.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::analytics::{BucketSeries, BurstAnalysis, BurstInterval};
use crate::error::{Error, Result};
use crate::parser::csv::RecordWriter;

/// Header of the interval CSV
pub const INTERVAL_HEADER: [&str; 12] = [
    "category",
    "start",
    "end",
    "duration_buckets",
    "peak_start",
    "peak_count",
    "baseline",
    "magnitude",
    "z_score",
    "total_excess",
    "strength",
    "granularity",
];

/// Header of the bucket CSV
pub const BUCKET_HEADER: [&str; 4] = ["category", "bucket_start", "bucket_end", "count"];

/// Output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    /// MIME type for HTTP responses
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Csv => "text/csv; charset=utf-8",
            Self::Json => "application/json",
        }
    }

    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(Error::config(format!("Unknown export format: {other}"))),
        }
    }
}

/// What to export
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportTarget {
    #[default]
    Intervals,
    Buckets,
}

impl FromStr for ExportTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "intervals" | "bursts" => Ok(Self::Intervals),
            "buckets" | "series" => Ok(Self::Buckets),
            other => Err(Error::config(format!("Unknown export target: {other}"))),
        }
    }
}

fn csv_error(err: ::csv::Error) -> Error {
    Error::with_source("CSV export failed", err)
}

/// Write intervals as CSV, one row per interval
///
/// `granularity` fills the last column so that rows from different runs can
/// be concatenated.
pub fn intervals_to_csv<'a, I>(intervals: I, granularity: &str) -> Result<String>
where
    I: IntoIterator<Item = &'a BurstInterval>,
{
    let mut writer = RecordWriter::with_header(INTERVAL_HEADER).map_err(csv_error)?;

    for interval in intervals {
        let row = [
            interval.category.clone().unwrap_or_default(),
            interval.start.to_string(),
            interval.end.to_string(),
            interval.duration_buckets.to_string(),
            interval.peak_start.to_string(),
            interval.peak_count.to_string(),
            interval.baseline.to_string(),
            interval.magnitude.to_string(),
            interval.z_score.to_string(),
            interval.total_excess.to_string(),
            interval.strength.to_string(),
            granularity.to_string(),
        ];
        writer.write(row).map_err(csv_error)?;
    }

    writer.finish().map_err(csv_error)
}

/// Write bucket series as CSV, one row per bucket
///
/// Each series is paired with its category label (empty for the overall
/// series).
pub fn buckets_to_csv<'a, I>(series: I) -> Result<String>
where
    I: IntoIterator<Item = (Option<&'a str>, &'a BucketSeries)>,
{
    let mut writer = RecordWriter::with_header(BUCKET_HEADER).map_err(csv_error)?;

    for (category, series) in series {
        for bucket in &series.buckets {
            let row = [
                category.unwrap_or_default().to_string(),
                bucket.start.to_string(),
                bucket.end.to_string(),
                bucket.count.to_string(),
            ];
            writer.write(row).map_err(csv_error)?;
        }
    }

    writer.finish().map_err(csv_error)
}

/// Bucket series of an analysis: the overall series plus one per category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketExport {
    pub overall: BucketSeries,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub categories: BTreeMap<String, BucketSeries>,
}

impl BucketExport {
    pub fn from_analysis(analysis: &BurstAnalysis) -> Self {
        let categories = analysis
            .categories
            .iter()
            .flat_map(|c| c.reports.iter())
            .map(|(name, report)| (name.clone(), report.series.clone()))
            .collect();

        Self {
            overall: analysis.overall.series.clone(),
            categories,
        }
    }

    /// Total buckets across all series
    pub fn bucket_count(&self) -> usize {
        self.overall.len() + self.categories.values().map(BucketSeries::len).sum::<usize>()
    }

    /// Labelled series in CSV row order
    fn labelled(&self) -> impl Iterator<Item = (Option<&str>, &BucketSeries)> {
        std::iter::once((None, &self.overall)).chain(
            self.categories
                .iter()
                .map(|(name, series)| (Some(name.as_str()), series)),
        )
    }
}

/// Serialize any report or analysis as pretty JSON
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Render an analysis for download
///
/// CSV carries the overall rows first (empty category), then each
/// category's rows when the analysis has a breakdown. JSON intervals export
/// the whole analysis; JSON buckets export a [`BucketExport`]. Both forms
/// carry the same rows.
pub fn render_analysis(
    analysis: &BurstAnalysis,
    format: ExportFormat,
    target: ExportTarget,
) -> Result<String> {
    let overall = &analysis.overall;

    match (format, target) {
        (ExportFormat::Csv, ExportTarget::Intervals) => {
            let mut intervals: Vec<&BurstInterval> = overall.intervals.iter().collect();
            if let Some(categories) = &analysis.categories {
                intervals.extend(categories.reports.values().flat_map(|r| r.intervals.iter()));
            }
            intervals_to_csv(intervals, overall.granularity.as_str())
        }
        (ExportFormat::Csv, ExportTarget::Buckets) => {
            buckets_to_csv(BucketExport::from_analysis(analysis).labelled())
        }
        (ExportFormat::Json, ExportTarget::Intervals) => to_json(analysis),
        (ExportFormat::Json, ExportTarget::Buckets) => {
            to_json(&BucketExport::from_analysis(analysis))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{BurstDetector, Granularity, Sensitivity};
    use crate::parser::csv::read_records;
    use chrono::NaiveDate;

    fn report() -> crate::analytics::BurstReport {
        let series = BucketSeries::from_counts(
            Granularity::Day,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            &[1, 1, 1, 1, 20, 22, 1, 1, 1],
        )
        .unwrap();
        BurstDetector::default()
            .detect_series(series, Sensitivity::default())
            .with_category("Cyber, Intrusion")
    }

    #[test]
    fn test_intervals_csv() {
        let report = report();
        let csv = intervals_to_csv(&report.intervals, "day").unwrap();
        let records = read_records(&csv).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].1, INTERVAL_HEADER);
        let row = &records[1].1;
        assert_eq!(row[0], "Cyber, Intrusion");
        assert_eq!(row[1], "2024-01-05");
        assert_eq!(row[2], "2024-01-07");
        assert_eq!(row[5], "22");
        assert_eq!(row[11], "day");
    }

    #[test]
    fn test_interval_floats_are_lossless() {
        let report = report();
        let csv = intervals_to_csv(&report.intervals, "day").unwrap();
        let records = read_records(&csv).unwrap();
        let row = &records[1].1;
        let interval = &report.intervals[0];

        assert_eq!(row[7].parse::<f64>().unwrap(), interval.magnitude);
        assert_eq!(row[8].parse::<f64>().unwrap(), interval.z_score);
        assert_eq!(row[10].parse::<f64>().unwrap(), interval.strength);
    }

    #[test]
    fn test_buckets_csv() {
        let report = report();
        let csv = buckets_to_csv([(None, &report.series)]).unwrap();
        let records = read_records(&csv).unwrap();

        assert_eq!(records.len(), 1 + report.series.len());
        assert_eq!(records[1].1, vec!["", "2024-01-01", "2024-01-02", "1"]);
    }

    #[test]
    fn test_json_export() {
        let report = report();
        let json = to_json(&report).unwrap();
        let back: crate::analytics::BurstReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn test_export_format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!("xlsx".parse::<ExportFormat>().is_err());
        assert_eq!(ExportFormat::Csv.content_type(), "text/csv; charset=utf-8");
        assert_eq!("series".parse::<ExportTarget>().unwrap(), ExportTarget::Buckets);
        assert!("pdf".parse::<ExportTarget>().is_err());
    }

    #[test]
    fn test_render_analysis_with_categories() {
        use crate::analytics::{run_query, BurstQuery};
        use crate::models::{FilterSet, NewEvent};
        use crate::storage::MockEventRepository;
        use chrono::{Duration, TimeZone, Utc};

        let origin = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let mut events = Vec::new();
        for (day, count) in [1, 1, 1, 1, 20, 22, 1, 1, 1].into_iter().enumerate() {
            for _ in 0..count {
                events.push(NewEvent {
                    timestamp: Some(origin + Duration::days(day as i64)),
                    taxonomy: Some("Cyber - Intrusion".to_string()),
                    is_relevant: true,
                    ..Default::default()
                });
            }
        }
        let repo = MockEventRepository::with_events(&events).unwrap();
        let query = BurstQuery::new(FilterSet::all(), Granularity::Day, Sensitivity::default())
            .with_per_category(true);
        let analysis = run_query(&repo, &BurstDetector::default(), &query).unwrap();

        let csv = render_analysis(&analysis, ExportFormat::Csv, ExportTarget::Intervals).unwrap();
        let records = read_records(&csv).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].1[0], "");
        assert_eq!(records[2].1[0], "Cyber");

        let buckets = render_analysis(&analysis, ExportFormat::Csv, ExportTarget::Buckets).unwrap();
        let csv_rows = read_records(&buckets).unwrap().len() - 1;
        assert_eq!(csv_rows, 2 * 9);

        let json = render_analysis(&analysis, ExportFormat::Json, ExportTarget::Buckets).unwrap();
        let exported: BucketExport = serde_json::from_str(&json).unwrap();
        assert_eq!(exported.bucket_count(), csv_rows);
        assert_eq!(exported.categories["Cyber"], analysis.categories.as_ref().unwrap().reports["Cyber"].series);

        let json = render_analysis(&analysis, ExportFormat::Json, ExportTarget::Intervals).unwrap();
        let back: BurstAnalysis = serde_json::from_str(&json).unwrap();
        assert_eq!(back, analysis);
    }
}
