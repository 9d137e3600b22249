use crate::config::AnalysisConfig;
use crate::models::{BpMetric, BpReading, ExerciseEvent, ExerciseImpact, Intensity};
use chrono::{Duration, NaiveDateTime};
use tracing::{debug, info};

/// Pairs exercise events with the blood pressure readings around them
pub struct ImpactMatcher {
    lookback_window: Duration,
    normalization_minutes: f64,
}

impl ImpactMatcher {
    /// Create a matcher with the default 3-day window and 30-minute normalization
    pub fn new() -> Self {
        Self::with_config(&AnalysisConfig::default())
    }

    /// Create a matcher from analysis settings
    pub fn with_config(config: &AnalysisConfig) -> Self {
        ImpactMatcher {
            lookback_window: Duration::try_days(i64::from(config.lookback_window_days))
                .unwrap_or(Duration::MAX),
            normalization_minutes: config.intensity_normalization_minutes,
        }
    }

    /// Intensity weight scaled by session length relative to the normalization
    /// period
    pub fn intensity_score(&self, intensity: Intensity, duration_minutes: f64) -> f64 {
        intensity.weight() * duration_minutes / self.normalization_minutes
    }

    /// Build one impact record per exercise event that has both a baseline
    /// reading before it and at least one reading in `(t, t + window]`.
    ///
    /// The result does not depend on the order of `bp_readings`.
    pub fn match_events(
        &self,
        bp_readings: &[BpReading],
        exercise_events: &[ExerciseEvent],
    ) -> Vec<ExerciseImpact> {
        let sorted = Self::sorted_readings(bp_readings);
        let mut impacts = Vec::with_capacity(exercise_events.len());

        for event in exercise_events {
            if let Some(impact) = self.match_event(&sorted, event) {
                impacts.push(impact);
            }
        }

        info!(
            exercise_events = exercise_events.len(),
            bp_readings = bp_readings.len(),
            matched = impacts.len(),
            "Matched exercise events against blood pressure readings"
        );

        impacts
    }

    fn match_event(&self, sorted: &[BpReading], event: &ExerciseEvent) -> Option<ExerciseImpact> {
        let t = event.timestamp;

        let baseline = match Self::baseline(sorted, t) {
            Some(readings) => readings,
            None => {
                debug!(
                    exercise_time = %t,
                    exercise_type = %event.exercise_type,
                    "No baseline reading, skipping"
                );
                return None;
            }
        };

        let until = t
            .checked_add_signed(self.lookback_window)
            .unwrap_or(NaiveDateTime::MAX);
        let follow_up = Self::follow_up(sorted, t, until);
        if follow_up.is_empty() {
            debug!(
                exercise_time = %t,
                exercise_type = %event.exercise_type,
                "No follow-up readings, skipping"
            );
            return None;
        }

        let baseline_systolic = Self::metric_mean(baseline, BpMetric::Systolic)?;
        let baseline_diastolic = Self::metric_mean(baseline, BpMetric::Diastolic)?;
        let baseline_pulse = Self::metric_mean(baseline, BpMetric::Pulse)?;

        let avg_after_systolic = Self::metric_mean(follow_up, BpMetric::Systolic)?;
        let avg_after_diastolic = Self::metric_mean(follow_up, BpMetric::Diastolic)?;
        let avg_after_pulse = Self::metric_mean(follow_up, BpMetric::Pulse)?;

        Some(ExerciseImpact {
            exercise_timestamp: t,
            exercise_type: event.exercise_type.clone(),
            intensity: event.intensity,
            duration_minutes: event.duration_minutes,
            intensity_score: self.intensity_score(event.intensity, event.duration_minutes),
            baseline_systolic,
            baseline_diastolic,
            baseline_pulse,
            avg_after_systolic,
            avg_after_diastolic,
            avg_after_pulse,
            systolic_change: avg_after_systolic - baseline_systolic,
            diastolic_change: avg_after_diastolic - baseline_diastolic,
            pulse_change: avg_after_pulse - baseline_pulse,
            follow_up_readings: follow_up.len(),
        })
    }

    /// Readings sharing the latest timestamp strictly before `t`
    fn baseline(sorted: &[BpReading], t: NaiveDateTime) -> Option<&[BpReading]> {
        let end = sorted.partition_point(|r| r.timestamp < t);
        if end == 0 {
            return None;
        }

        let latest = sorted[end - 1].timestamp;
        let start = sorted[..end].partition_point(|r| r.timestamp < latest);
        Some(&sorted[start..end])
    }

    /// Readings in `(t, until]`
    fn follow_up(sorted: &[BpReading], t: NaiveDateTime, until: NaiveDateTime) -> &[BpReading] {
        let start = sorted.partition_point(|r| r.timestamp <= t);
        let end = sorted.partition_point(|r| r.timestamp <= until);
        if start >= end {
            &[]
        } else {
            &sorted[start..end]
        }
    }

    fn metric_mean(readings: &[BpReading], metric: BpMetric) -> Option<f64> {
        if readings.is_empty() {
            return None;
        }
        let sum: f64 = readings.iter().map(|r| r.metric(metric)).sum();
        Some(sum / readings.len() as f64)
    }

    /// Copy of the series in a total order, so sums are taken in the same
    /// sequence whatever the input order was
    fn sorted_readings(bp_readings: &[BpReading]) -> Vec<BpReading> {
        let mut sorted = bp_readings.to_vec();
        sorted.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.systolic.total_cmp(&b.systolic))
                .then_with(|| a.diastolic.total_cmp(&b.diastolic))
                .then_with(|| a.pulse.total_cmp(&b.pulse))
        });
        sorted
    }
}

impl Default for ImpactMatcher {
    fn default() -> Self {
        Self::new()
    }
}
