use crate::config::AnalysisConfig;
use crate::models::{BpMetric, ExerciseImpact, Intensity};
use crate::stats::{self, CorrelationFailure, CorrelationOutcome};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Correlation between intensity score and one metric's change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricCorrelation {
    pub correlation: f64,
    pub p_value: f64,
    pub significant: bool,

    /// Set when the coefficient could not be computed; the numbers above are
    /// then the neutral 0 / 1 / false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CorrelationFailure>,
}

impl MetricCorrelation {
    /// Turn a statistical outcome into a reportable entry
    pub fn from_outcome(outcome: CorrelationOutcome, significance_level: f64) -> Self {
        match outcome {
            CorrelationOutcome::Computed(result) => MetricCorrelation {
                correlation: result.coefficient,
                p_value: result.p_value,
                significant: result.p_value < significance_level,
                error: None,
            },
            CorrelationOutcome::Failed(failure) => MetricCorrelation {
                correlation: 0.0,
                p_value: 1.0,
                significant: false,
                error: Some(failure),
            },
        }
    }

    pub fn is_computed(&self) -> bool {
        self.error.is_none()
    }
}

/// Average changes over a group of impact records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactAverages {
    pub count: usize,
    pub avg_systolic_change: f64,
    pub avg_diastolic_change: f64,
    pub avg_pulse_change: f64,
}

impl ImpactAverages {
    fn from_records(records: &[&ExerciseImpact]) -> Option<Self> {
        let changes = |metric: BpMetric| -> Vec<f64> {
            records.iter().map(|r| r.change(metric)).collect()
        };

        Some(ImpactAverages {
            count: records.len(),
            avg_systolic_change: stats::mean(&changes(BpMetric::Systolic))?,
            avg_diastolic_change: stats::mean(&changes(BpMetric::Diastolic))?,
            avg_pulse_change: stats::mean(&changes(BpMetric::Pulse))?,
        })
    }
}

/// Aggregated impact of one exercise type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseTypeImpact {
    #[serde(flatten)]
    pub averages: ImpactAverages,

    /// Present only when the type has enough records; may be empty when no
    /// single intensity level has enough records on its own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity_breakdown: Option<BTreeMap<Intensity, ImpactAverages>>,
}

/// Output of the correlation engine
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CorrelationAnalysis {
    /// Empty when there were too few impact records to compute anything
    pub overall_correlation: BTreeMap<BpMetric, MetricCorrelation>,
    pub exercise_type_impact: BTreeMap<String, ExerciseTypeImpact>,
}

/// Computes correlations and per-type statistics from an impact table
pub struct CorrelationEngine {
    config: AnalysisConfig,
}

impl CorrelationEngine {
    /// Create engine with default thresholds
    pub fn new() -> Self {
        CorrelationEngine {
            config: AnalysisConfig::default(),
        }
    }

    /// Create engine with custom thresholds
    pub fn with_config(config: AnalysisConfig) -> Self {
        CorrelationEngine { config }
    }

    /// Aggregate an impact table. Pure function of `impacts`.
    pub fn analyze(&self, impacts: &[ExerciseImpact]) -> CorrelationAnalysis {
        CorrelationAnalysis {
            overall_correlation: self.overall_correlation(impacts),
            exercise_type_impact: self.exercise_type_impact(impacts),
        }
    }

    /// Pearson correlation of intensity score against each metric's change.
    ///
    /// Returns an empty map below the minimum record count.
    pub fn overall_correlation(
        &self,
        impacts: &[ExerciseImpact],
    ) -> BTreeMap<BpMetric, MetricCorrelation> {
        let mut results = BTreeMap::new();

        if impacts.len() < self.config.min_records_for_correlation {
            debug!(
                records = impacts.len(),
                required = self.config.min_records_for_correlation,
                "Not enough impact records for correlation"
            );
            return results;
        }

        let scores: Vec<f64> = impacts.iter().map(|i| i.intensity_score).collect();

        for metric in BpMetric::ALL {
            let changes: Vec<f64> = impacts.iter().map(|i| i.change(metric)).collect();
            let outcome: CorrelationOutcome = stats::pearson(&scores, &changes).into();

            match &outcome {
                CorrelationOutcome::Computed(result) => debug!(
                    metric = %metric,
                    r = result.coefficient,
                    p = result.p_value,
                    "Correlation computed"
                ),
                CorrelationOutcome::Failed(failure) => warn!(
                    metric = %metric,
                    reason = %failure,
                    "Correlation could not be computed"
                ),
            }

            results.insert(
                metric,
                MetricCorrelation::from_outcome(outcome, self.config.significance_level),
            );
        }

        results
    }

    /// Mean changes per exercise type, with an intensity breakdown for types
    /// that have enough records
    pub fn exercise_type_impact(
        &self,
        impacts: &[ExerciseImpact],
    ) -> BTreeMap<String, ExerciseTypeImpact> {
        let mut by_type: BTreeMap<&str, Vec<&ExerciseImpact>> = BTreeMap::new();
        for impact in impacts {
            by_type
                .entry(impact.exercise_type.as_str())
                .or_default()
                .push(impact);
        }

        let mut results = BTreeMap::new();

        for (exercise_type, records) in by_type {
            if records.len() < self.config.min_records_per_type {
                debug!(
                    exercise_type,
                    records = records.len(),
                    "Too few records for exercise type, excluded"
                );
                continue;
            }

            let averages = match ImpactAverages::from_records(&records) {
                Some(averages) => averages,
                None => continue,
            };

            let intensity_breakdown = if records.len()
                >= self.config.min_records_for_intensity_breakdown
            {
                Some(self.intensity_breakdown(&records))
            } else {
                None
            };

            results.insert(
                exercise_type.to_string(),
                ExerciseTypeImpact {
                    averages,
                    intensity_breakdown,
                },
            );
        }

        results
    }

    fn intensity_breakdown(
        &self,
        records: &[&ExerciseImpact],
    ) -> BTreeMap<Intensity, ImpactAverages> {
        let mut breakdown = BTreeMap::new();

        for intensity in Intensity::ALL {
            let bucket: Vec<&ExerciseImpact> = records
                .iter()
                .copied()
                .filter(|r| r.intensity == intensity)
                .collect();

            if bucket.len() < self.config.min_records_per_intensity {
                continue;
            }

            if let Some(averages) = ImpactAverages::from_records(&bucket) {
                breakdown.insert(intensity, averages);
            }
        }

        breakdown
    }
}

impl Default for CorrelationEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn impact(
        exercise_type: &str,
        intensity: Intensity,
        score: f64,
        systolic: f64,
        diastolic: f64,
    ) -> ExerciseImpact {
        ExerciseImpact {
            exercise_timestamp: NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_opt(7, 0, 0)
                .unwrap(),
            exercise_type: exercise_type.to_string(),
            intensity,
            duration_minutes: 30.0,
            intensity_score: score,
            baseline_systolic: 130.0,
            baseline_diastolic: 85.0,
            baseline_pulse: 70.0,
            avg_after_systolic: 130.0 + systolic,
            avg_after_diastolic: 85.0 + diastolic,
            avg_after_pulse: 72.0,
            systolic_change: systolic,
            diastolic_change: diastolic,
            pulse_change: 2.0,
            follow_up_readings: 1,
        }
    }

    #[test]
    fn test_insufficient_records_give_empty_correlation() {
        let engine = CorrelationEngine::new();
        let impacts: Vec<ExerciseImpact> = (0..4)
            .map(|i| impact("Walking", Intensity::Low, i as f64, -(i as f64), -1.0))
            .collect();

        let analysis = engine.analyze(&impacts);
        assert!(analysis.overall_correlation.is_empty());
        assert!(analysis.exercise_type_impact.contains_key("Walking"));
    }

    #[test]
    fn test_negative_correlation_is_significant() {
        let engine = CorrelationEngine::new();
        let impacts: Vec<ExerciseImpact> = (1..=8)
            .map(|i| {
                let score = i as f64;
                let diastolic = -1.0 * score + (i % 2) as f64;
                impact("Running", Intensity::High, score, -2.0 * score, diastolic)
            })
            .collect();

        let overall = engine.overall_correlation(&impacts);
        let systolic = &overall[&BpMetric::Systolic];
        assert!(systolic.correlation < -0.99);
        assert!(systolic.significant);
        assert!(systolic.is_computed());

        let diastolic = &overall[&BpMetric::Diastolic];
        assert!(diastolic.correlation < -0.9);
        assert!(diastolic.significant);
    }

    #[test]
    fn test_zero_variance_metric_reports_error_marker() {
        let engine = CorrelationEngine::new();
        let impacts: Vec<ExerciseImpact> = (1..=6)
            .map(|i| impact("Cycling", Intensity::Moderate, i as f64, -(i as f64), -1.0))
            .collect();

        let overall = engine.overall_correlation(&impacts);
        assert_eq!(overall.len(), 3);

        // Pulse change is constant in every record
        let pulse = &overall[&BpMetric::Pulse];
        assert_eq!(pulse.correlation, 0.0);
        assert_eq!(pulse.p_value, 1.0);
        assert!(!pulse.significant);
        assert_eq!(pulse.error, Some(CorrelationFailure::ZeroVariance));

        // Other metrics are unaffected
        assert!(overall[&BpMetric::Systolic].is_computed());
    }

    #[test]
    fn test_custom_significance_level() {
        let config = AnalysisConfig {
            significance_level: 0.2,
            ..AnalysisConfig::default()
        };
        let engine = CorrelationEngine::with_config(config);
        // r = 0.8, n = 5, p ~ 0.104
        let systolic = [1.0, 3.0, 2.0, 5.0, 4.0];
        let impacts: Vec<ExerciseImpact> = systolic
            .iter()
            .enumerate()
            .map(|(i, s)| impact("Yoga", Intensity::Low, (i + 1) as f64, *s, *s))
            .collect();

        let overall = engine.overall_correlation(&impacts);
        assert!(overall[&BpMetric::Systolic].significant);
        let strict = CorrelationEngine::new().overall_correlation(&impacts);
        assert!(!strict[&BpMetric::Systolic].significant);
    }

    #[test]
    fn test_type_with_three_records_has_no_breakdown() {
        let engine = CorrelationEngine::new();
        let impacts = vec![
            impact("Swimming", Intensity::Low, 1.0, -4.0, -2.0),
            impact("Swimming", Intensity::High, 3.0, -6.0, -4.0),
            impact("Swimming", Intensity::High, 3.0, -8.0, -3.0),
            impact("Yoga", Intensity::Low, 1.0, -1.0, -1.0),
            impact("Yoga", Intensity::Low, 1.0, -1.0, -1.0),
        ];

        let by_type = engine.exercise_type_impact(&impacts);
        assert!(!by_type.contains_key("Yoga"));

        let swimming = &by_type["Swimming"];
        assert_eq!(swimming.averages.count, 3);
        assert_eq!(swimming.averages.avg_systolic_change, -6.0);
        assert_eq!(swimming.averages.avg_diastolic_change, -3.0);
        assert_eq!(swimming.averages.avg_pulse_change, 2.0);
        assert!(swimming.intensity_breakdown.is_none());

        let json = serde_json::to_value(swimming).unwrap();
        assert!(json.get("intensity_breakdown").is_none());
        assert_eq!(json["count"], 3);
    }

    #[test]
    fn test_intensity_breakdown_requires_two_per_bucket() {
        let engine = CorrelationEngine::new();
        let impacts = vec![
            impact("HIIT", Intensity::High, 3.0, -10.0, -5.0),
            impact("HIIT", Intensity::High, 3.0, -6.0, -3.0),
            impact("HIIT", Intensity::Moderate, 2.0, -4.0, -2.0),
            impact("HIIT", Intensity::Moderate, 2.0, -2.0, -2.0),
            impact("HIIT", Intensity::Low, 1.0, 1.0, 0.0),
        ];

        let by_type = engine.exercise_type_impact(&impacts);
        let breakdown = by_type["HIIT"].intensity_breakdown.as_ref().unwrap();

        assert_eq!(breakdown.len(), 2);
        assert!(!breakdown.contains_key(&Intensity::Low));
        assert_eq!(breakdown[&Intensity::High].count, 2);
        assert_eq!(breakdown[&Intensity::High].avg_systolic_change, -8.0);
        assert_eq!(breakdown[&Intensity::Moderate].avg_diastolic_change, -2.0);
    }

    #[test]
    fn test_breakdown_skips_sparse_levels() {
        let engine = CorrelationEngine::new();
        let impacts = vec![
            impact("Walking", Intensity::High, 3.0, -1.0, -1.0),
            impact("Walking", Intensity::Moderate, 2.0, -1.0, -1.0),
            impact("Walking", Intensity::Low, 1.0, -1.0, -1.0),
            impact("Walking", Intensity::High, 3.0, -1.0, -1.0),
            impact("Walking", Intensity::Moderate, 2.0, -1.0, -1.0),
            impact("Walking", Intensity::Low, 1.0, -1.0, -1.0),
        ];
        // Six records, two per level: every bucket qualifies
        let by_type = engine.exercise_type_impact(&impacts);
        assert_eq!(by_type["Walking"].intensity_breakdown.as_ref().unwrap().len(), 3);

        let sparse = &impacts[..5];
        let by_type = engine.exercise_type_impact(sparse);
        let breakdown = by_type["Walking"].intensity_breakdown.as_ref().unwrap();
        assert_eq!(breakdown.len(), 2);
        assert!(!breakdown.contains_key(&Intensity::Low));
    }

    #[test]
    fn test_analysis_is_pure_function_of_impacts() {
        let engine = CorrelationEngine::new();
        let impacts: Vec<ExerciseImpact> = (1..=7)
            .map(|i| {
                let score = i as f64;
                impact("Running", Intensity::High, score, -score * 1.5, 1.0 - score)
            })
            .collect();

        let first = engine.analyze(&impacts);
        let second = engine.analyze(&impacts.clone());
        assert_eq!(first, second);
    }

    #[test]
    fn test_metric_correlation_serialization() {
        let failed = MetricCorrelation::from_outcome(
            CorrelationOutcome::Failed(CorrelationFailure::ZeroVariance),
            0.05,
        );
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["correlation"], 0.0);
        assert_eq!(json["p_value"], 1.0);
        assert_eq!(json["significant"], false);
        assert_eq!(json["error"]["reason"], "zero_variance");
    }
}
