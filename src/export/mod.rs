use crate::analysis::{CorrelationResult, ExerciseBpAnalyzer};
use crate::categories::{
    categorize_all, category_trends, BpStatistics, CategorizedReading, CategoryTrendBucket,
    TrendFrequency,
};
use crate::interpretation::CorrelationSummary;
use crate::models::{BpReading, ExerciseEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

pub mod csv;
pub mod json;
pub mod text;

/// Export format types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Text,
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Text => "txt",
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "txt" => Ok(ExportFormat::Text),
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            _ => Err(ExportError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExportFormat::Text => "text",
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        })
    }
}

/// Export errors
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),
}

/// Everything a consumer needs from one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub generated_at: DateTime<Utc>,
    pub lookback_window_days: u32,
    pub bp_statistics: Option<BpStatistics>,
    pub summary: CorrelationSummary,
    pub correlation: Option<CorrelationResult>,
}

impl AnalysisReport {
    /// Run the analysis and collect statistics, result and summary
    pub fn generate(
        analyzer: &ExerciseBpAnalyzer,
        bp_readings: &[BpReading],
        exercise_events: &[ExerciseEvent],
    ) -> Self {
        let bp_statistics = categorize_all(bp_readings)
            .and_then(|categorized| BpStatistics::from_readings(&categorized));
        let correlation = analyzer.analyze(bp_readings, exercise_events);
        let summary = analyzer.summarize(correlation.as_ref());

        AnalysisReport {
            generated_at: Utc::now(),
            lookback_window_days: analyzer.config().lookback_window_days,
            bp_statistics,
            summary,
            correlation,
        }
    }
}

/// Categorized readings with their statistics and trend series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorizationReport {
    pub statistics: BpStatistics,
    pub trend_frequency: TrendFrequency,
    pub trends: Vec<CategoryTrendBucket>,
    pub readings: Vec<CategorizedReading>,
}

impl CategorizationReport {
    /// `None` for an empty series
    pub fn generate(bp_readings: &[BpReading], frequency: TrendFrequency) -> Option<Self> {
        let readings = categorize_all(bp_readings)?;
        let statistics = BpStatistics::from_readings(&readings)?;
        let trends = category_trends(&readings, frequency)?;

        Some(CategorizationReport {
            statistics,
            trend_frequency: frequency,
            trends,
            readings,
        })
    }
}

/// Write an analysis report in the given format
pub fn write_analysis<W: Write>(
    report: &AnalysisReport,
    format: ExportFormat,
    max_interpretations: usize,
    writer: W,
) -> Result<(), ExportError> {
    match format {
        ExportFormat::Text => text::write_analysis_report(report, max_interpretations, writer),
        ExportFormat::Json => json::write_json(report, writer),
        ExportFormat::Csv => {
            let impacts = report
                .correlation
                .as_ref()
                .map(|result| result.exercise_impact_data.as_slice())
                .unwrap_or_default();
            csv::write_impact_table(impacts, writer)
        }
    }
}

/// Export an analysis report to a file
pub fn export_analysis<P: AsRef<Path>>(
    report: &AnalysisReport,
    format: ExportFormat,
    max_interpretations: usize,
    output_path: P,
) -> Result<(), ExportError> {
    let file = File::create(output_path)?;
    write_analysis(report, format, max_interpretations, BufWriter::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Intensity;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn sample() -> (Vec<BpReading>, Vec<ExerciseEvent>) {
        let at = |d: u32, h: u32| {
            NaiveDate::from_ymd_opt(2024, 5, d)
                .unwrap()
                .and_hms_opt(h, 0, 0)
                .unwrap()
        };
        let readings = vec![
            BpReading::new(at(1, 7), 132.0, 86.0, 72.0),
            BpReading::new(at(2, 7), 126.0, 82.0, 70.0),
            BpReading::new(at(3, 7), 124.0, 80.0, 69.0),
        ];
        let events = vec![ExerciseEvent::new(at(1, 18), "Cycling", Intensity::Moderate, 60.0)];
        (readings, events)
    }

    #[test]
    fn test_export_format_parsing() {
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("txt".parse::<ExportFormat>().unwrap(), ExportFormat::Text);
        assert!(matches!(
            "pdf".parse::<ExportFormat>(),
            Err(ExportError::UnsupportedFormat(_))
        ));
        assert_eq!(ExportFormat::Csv.to_string(), "csv");
    }

    #[test]
    fn test_generate_analysis_report() {
        let (readings, events) = sample();
        let report = AnalysisReport::generate(&ExerciseBpAnalyzer::new(), &readings, &events);

        assert_eq!(report.lookback_window_days, 3);
        assert_eq!(report.bp_statistics.as_ref().unwrap().reading_count, 3);
        let result = report.correlation.as_ref().unwrap();
        assert_eq!(result.exercise_impact_data.len(), 1);
        assert_eq!(result.exercise_impact_data[0].systolic_change, -7.0);
        assert_eq!(report.summary.status, "Correlation analysis complete");
    }

    #[test]
    fn test_report_without_exercise() {
        let (readings, _) = sample();
        let report = AnalysisReport::generate(&ExerciseBpAnalyzer::new(), &readings, &[]);

        assert!(report.correlation.is_none());
        assert!(report.bp_statistics.is_some());
        assert_eq!(report.summary.status, "No correlation analysis available");
    }

    #[test]
    fn test_export_analysis_each_format() {
        let (readings, events) = sample();
        let report = AnalysisReport::generate(&ExerciseBpAnalyzer::new(), &readings, &events);
        let dir = tempdir().unwrap();

        for format in [ExportFormat::Text, ExportFormat::Json, ExportFormat::Csv] {
            let path = dir.path().join(format!("report.{}", format.extension()));
            export_analysis(&report, format, 10, &path).unwrap();
            let content = std::fs::read_to_string(&path).unwrap();
            assert!(content.contains("Cycling"), "{} export lacks exercise type", format);
        }
    }

    #[test]
    fn test_categorization_report() {
        let (readings, _) = sample();
        let report = CategorizationReport::generate(&readings, TrendFrequency::Daily).unwrap();

        assert_eq!(report.readings.len(), 3);
        assert_eq!(report.trends.len(), 3);
        assert!(CategorizationReport::generate(&[], TrendFrequency::Daily).is_none());
    }
}
