//! Exercise / blood pressure correlation analysis
//!
//! Ties the matcher, the correlation engine and the interpreter together
//! and packages their output into the single result handed to report and
//! prompt-building consumers.

use crate::config::AnalysisConfig;
use crate::correlation::{
    CorrelationAnalysis, CorrelationEngine, ExerciseTypeImpact, MetricCorrelation,
};
use crate::interpretation::{CorrelationSummary, Interpreter};
use crate::matcher::ImpactMatcher;
use crate::models::{BpMetric, BpReading, ExerciseEvent, ExerciseImpact};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, info_span};

/// Complete result of one analysis run.
///
/// `exercise_impact_data` is the per-event detail table; the other two fields
/// are summaries derived from it and must not be recomputed by consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationResult {
    /// Empty when there were too few impact records
    pub overall_correlation: BTreeMap<BpMetric, MetricCorrelation>,
    pub exercise_type_impact: BTreeMap<String, ExerciseTypeImpact>,
    pub exercise_impact_data: Vec<ExerciseImpact>,
}

impl CorrelationResult {
    /// Package engine output together with the impact table it came from
    pub fn assemble(analysis: CorrelationAnalysis, impacts: Vec<ExerciseImpact>) -> Self {
        CorrelationResult {
            overall_correlation: analysis.overall_correlation,
            exercise_type_impact: analysis.exercise_type_impact,
            exercise_impact_data: impacts,
        }
    }

    /// True when coefficients were attempted (enough impact records)
    pub fn has_overall_correlation(&self) -> bool {
        !self.overall_correlation.is_empty()
    }

    pub fn correlation(&self, metric: BpMetric) -> Option<&MetricCorrelation> {
        self.overall_correlation.get(&metric)
    }
}

/// Entry point for the correlation analysis
pub struct ExerciseBpAnalyzer {
    config: AnalysisConfig,
    matcher: ImpactMatcher,
    engine: CorrelationEngine,
    interpreter: Interpreter,
}

impl ExerciseBpAnalyzer {
    /// Create analyzer with default thresholds
    pub fn new() -> Self {
        Self::with_config(AnalysisConfig::default())
    }

    /// Create analyzer with custom thresholds
    pub fn with_config(config: AnalysisConfig) -> Self {
        ExerciseBpAnalyzer {
            matcher: ImpactMatcher::with_config(&config),
            engine: CorrelationEngine::with_config(config.clone()),
            interpreter: Interpreter::with_config(&config),
            config,
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Match exercise events against readings and aggregate the result.
    ///
    /// Returns `None` when either series is empty or no event has both a
    /// baseline and a follow-up reading.
    pub fn analyze(
        &self,
        bp_readings: &[BpReading],
        exercise_events: &[ExerciseEvent],
    ) -> Option<CorrelationResult> {
        if bp_readings.is_empty() || exercise_events.is_empty() {
            info!(
                bp_readings = bp_readings.len(),
                exercise_events = exercise_events.len(),
                "Empty input, no analysis performed"
            );
            return None;
        }

        let span = info_span!(
            "exercise_bp_analysis",
            window_days = self.config.lookback_window_days
        );
        let _guard = span.enter();

        let impacts = self.matcher.match_events(bp_readings, exercise_events);
        if impacts.is_empty() {
            info!(
                exercise_events = exercise_events.len(),
                "No exercise event could be matched, no analysis performed"
            );
            return None;
        }

        let analysis = self.engine.analyze(&impacts);

        info!(
            impact_records = impacts.len(),
            metrics = analysis.overall_correlation.len(),
            exercise_types = analysis.exercise_type_impact.len(),
            "Correlation analysis complete"
        );

        Some(CorrelationResult::assemble(analysis, impacts))
    }

    /// Re-aggregate an existing impact table without matching again
    pub fn reaggregate(&self, impacts: &[ExerciseImpact]) -> CorrelationResult {
        CorrelationResult::assemble(self.engine.analyze(impacts), impacts.to_vec())
    }

    /// Plain-language summary of a result, or the "unavailable" summary
    pub fn summarize(&self, result: Option<&CorrelationResult>) -> CorrelationSummary {
        match result {
            Some(result) => self.interpreter.summarize(result),
            None => CorrelationSummary::unavailable(),
        }
    }
}

impl Default for ExerciseBpAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Intensity;
    use chrono::{NaiveDate, NaiveDateTime};

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, d)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_empty_inputs_return_none() {
        let analyzer = ExerciseBpAnalyzer::new();
        let readings = vec![BpReading::new(day(1), 120.0, 80.0, 70.0)];
        let events = vec![ExerciseEvent::new(day(2), "Walking", Intensity::Low, 30.0)];

        assert!(analyzer.analyze(&[], &events).is_none());
        assert!(analyzer.analyze(&readings, &[]).is_none());
    }

    #[test]
    fn test_unmatched_events_return_none() {
        let analyzer = ExerciseBpAnalyzer::new();
        // No reading before the session
        let readings = vec![BpReading::new(day(5), 120.0, 80.0, 70.0)];
        let events = vec![ExerciseEvent::new(day(2), "Walking", Intensity::Low, 30.0)];

        assert!(analyzer.analyze(&readings, &events).is_none());
        assert_eq!(
            analyzer.summarize(analyzer.analyze(&readings, &events).as_ref()),
            CorrelationSummary::unavailable()
        );
    }

    #[test]
    fn test_result_serializes_three_top_level_keys() {
        let analyzer = ExerciseBpAnalyzer::new();
        let readings = vec![
            BpReading::new(day(1), 130.0, 85.0, 72.0),
            BpReading::new(day(3), 125.0, 80.0, 70.0),
        ];
        let events = vec![ExerciseEvent::new(
            day(1) + chrono::Duration::hours(24),
            "Running",
            Intensity::High,
            40.0,
        )];

        let result = analyzer.analyze(&readings, &events).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        let object = json.as_object().unwrap();

        assert_eq!(object.len(), 3);
        assert!(object.contains_key("overall_correlation"));
        assert!(object.contains_key("exercise_type_impact"));
        assert_eq!(json["exercise_impact_data"][0]["systolic_change"], -5.0);
        assert_eq!(json["exercise_impact_data"][0]["intensity"], "High");
    }

    #[test]
    fn test_summarize_without_result() {
        let analyzer = ExerciseBpAnalyzer::new();
        let summary = analyzer.summarize(None);
        assert_eq!(summary.status, "No correlation analysis available");
    }
}
