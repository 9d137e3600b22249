use crate::analysis::CorrelationResult;
use crate::config::AnalysisConfig;
use crate::correlation::{ExerciseTypeImpact, MetricCorrelation};
use crate::models::BpMetric;
use serde::{Deserialize, Serialize};

/// Condensed view of a correlation result for display and prompt building
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationSummary {
    pub status: String,
    pub systolic_correlation: f64,
    pub systolic_significant: bool,
    pub diastolic_correlation: f64,
    pub diastolic_significant: bool,

    /// Independent sentences in generation order
    pub interpretations: Vec<String>,

    pub exercise_types: Vec<String>,
}

impl CorrelationSummary {
    /// Summary used when no analysis could be run
    pub fn unavailable() -> Self {
        CorrelationSummary {
            status: "No correlation analysis available".to_string(),
            systolic_correlation: 0.0,
            systolic_significant: false,
            diastolic_correlation: 0.0,
            diastolic_significant: false,
            interpretations: Vec::new(),
            exercise_types: Vec::new(),
        }
    }

    /// First `limit` interpretations, for consumers that cap prompt length
    pub fn top_interpretations(&self, limit: usize) -> &[String] {
        &self.interpretations[..self.interpretations.len().min(limit)]
    }
}

/// Turns statistics into plain-language statements
pub struct Interpreter {
    correlation_threshold: f64,
    systolic_change_threshold: f64,
    diastolic_change_threshold: f64,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_config(&AnalysisConfig::default())
    }

    pub fn with_config(config: &AnalysisConfig) -> Self {
        Interpreter {
            correlation_threshold: config.correlation_interest_threshold,
            systolic_change_threshold: config.systolic_change_threshold,
            diastolic_change_threshold: config.diastolic_change_threshold,
        }
    }

    /// Statements for significant correlations, then for exercise types with
    /// a notable average change
    pub fn interpret(&self, result: &CorrelationResult) -> Vec<String> {
        let mut interpretations = Vec::new();

        for metric in [BpMetric::Systolic, BpMetric::Diastolic] {
            if let Some(statement) = result
                .overall_correlation
                .get(&metric)
                .and_then(|correlation| self.correlation_statement(metric, correlation))
            {
                interpretations.push(statement);
            }
        }

        for (exercise_type, impact) in &result.exercise_type_impact {
            if let Some(statement) = self.exercise_type_statement(exercise_type, impact) {
                interpretations.push(statement);
            }
        }

        interpretations
    }

    /// Full summary of a result
    pub fn summarize(&self, result: &CorrelationResult) -> CorrelationSummary {
        let coefficient = |metric: BpMetric| {
            result
                .overall_correlation
                .get(&metric)
                .map(|c| (c.correlation, c.significant))
                .unwrap_or((0.0, false))
        };
        let (systolic_correlation, systolic_significant) = coefficient(BpMetric::Systolic);
        let (diastolic_correlation, diastolic_significant) = coefficient(BpMetric::Diastolic);

        CorrelationSummary {
            status: "Correlation analysis complete".to_string(),
            systolic_correlation,
            systolic_significant,
            diastolic_correlation,
            diastolic_significant,
            interpretations: self.interpret(result),
            exercise_types: result.exercise_type_impact.keys().cloned().collect(),
        }
    }

    fn correlation_statement(
        &self,
        metric: BpMetric,
        correlation: &MetricCorrelation,
    ) -> Option<String> {
        if !correlation.significant {
            return None;
        }

        if correlation.correlation < -self.correlation_threshold {
            Some(format!(
                "Exercise appears to significantly reduce {} blood pressure.",
                metric
            ))
        } else if correlation.correlation > self.correlation_threshold {
            Some(format!(
                "Exercise appears to be associated with increased {} blood pressure, \
                 which is unusual. Consider consulting a healthcare provider.",
                metric
            ))
        } else {
            None
        }
    }

    fn exercise_type_statement(
        &self,
        exercise_type: &str,
        impact: &ExerciseTypeImpact,
    ) -> Option<String> {
        let systolic = impact.averages.avg_systolic_change;
        let diastolic = impact.averages.avg_diastolic_change;

        if systolic.abs() <= self.systolic_change_threshold
            && diastolic.abs() <= self.diastolic_change_threshold
        {
            return None;
        }

        let direction = if systolic < 0.0 && diastolic < 0.0 {
            "decrease"
        } else {
            "increase"
        };

        Some(format!(
            "{} appears to {} your blood pressure by an average of {:.1}/{:.1} mmHg.",
            exercise_type,
            direction,
            systolic.abs(),
            diastolic.abs()
        ))
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}
