use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Self-reported intensity of an exercise session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Intensity {
    Low,
    Moderate,
    High,
}

impl Intensity {
    /// All intensity levels, lowest first
    pub const ALL: [Intensity; 3] = [Intensity::Low, Intensity::Moderate, Intensity::High];

    /// Multiplier used when deriving the intensity score
    pub fn weight(&self) -> f64 {
        match self {
            Intensity::Low => 1.0,
            Intensity::Moderate => 2.0,
            Intensity::High => 3.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Intensity::Low => "Low",
            Intensity::Moderate => "Moderate",
            Intensity::High => "High",
        }
    }
}

impl fmt::Display for Intensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intensity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" | "light" | "easy" => Ok(Intensity::Low),
            "moderate" | "medium" | "mod" => Ok(Intensity::Moderate),
            "high" | "hard" | "vigorous" => Ok(Intensity::High),
            _ => Err(format!("Invalid intensity: {}", s)),
        }
    }
}

/// One blood pressure measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BpReading {
    /// When the reading was taken (date and time of day combined)
    pub timestamp: NaiveDateTime,

    /// Systolic pressure in mmHg
    pub systolic: f64,

    /// Diastolic pressure in mmHg
    pub diastolic: f64,

    /// Pulse in beats per minute
    pub pulse: f64,
}

impl BpReading {
    pub fn new(timestamp: NaiveDateTime, systolic: f64, diastolic: f64, pulse: f64) -> Self {
        BpReading {
            timestamp,
            systolic,
            diastolic,
            pulse,
        }
    }

    /// Value of a single metric for this reading
    pub fn metric(&self, metric: BpMetric) -> f64 {
        match metric {
            BpMetric::Systolic => self.systolic,
            BpMetric::Diastolic => self.diastolic,
            BpMetric::Pulse => self.pulse,
        }
    }
}

/// One recorded exercise session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseEvent {
    /// Start of the session
    pub timestamp: NaiveDateTime,

    /// Activity name, e.g. "Walking" or "Weight Training"
    pub exercise_type: String,

    /// Reported intensity
    pub intensity: Intensity,

    /// Session length in minutes (always positive)
    pub duration_minutes: f64,
}

impl ExerciseEvent {
    pub fn new(
        timestamp: NaiveDateTime,
        exercise_type: impl Into<String>,
        intensity: Intensity,
        duration_minutes: f64,
    ) -> Self {
        ExerciseEvent {
            timestamp,
            exercise_type: exercise_type.into(),
            intensity,
            duration_minutes,
        }
    }
}

/// The three blood pressure metrics tracked by the analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BpMetric {
    Systolic,
    Diastolic,
    Pulse,
}

impl BpMetric {
    pub const ALL: [BpMetric; 3] = [BpMetric::Systolic, BpMetric::Diastolic, BpMetric::Pulse];

    pub fn as_str(&self) -> &'static str {
        match self {
            BpMetric::Systolic => "systolic",
            BpMetric::Diastolic => "diastolic",
            BpMetric::Pulse => "pulse",
        }
    }
}

impl fmt::Display for BpMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Before/after blood pressure comparison for a single exercise event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseImpact {
    pub exercise_timestamp: NaiveDateTime,
    pub exercise_type: String,
    pub intensity: Intensity,
    pub duration_minutes: f64,

    /// Intensity weight scaled by normalized duration
    pub intensity_score: f64,

    pub baseline_systolic: f64,
    pub baseline_diastolic: f64,
    pub baseline_pulse: f64,

    pub avg_after_systolic: f64,
    pub avg_after_diastolic: f64,
    pub avg_after_pulse: f64,

    pub systolic_change: f64,
    pub diastolic_change: f64,
    pub pulse_change: f64,

    /// Number of readings averaged in the follow-up window
    pub follow_up_readings: usize,
}

impl ExerciseImpact {
    /// Change (follow-up mean minus baseline) for one metric
    pub fn change(&self, metric: BpMetric) -> f64 {
        match metric {
            BpMetric::Systolic => self.systolic_change,
            BpMetric::Diastolic => self.diastolic_change,
            BpMetric::Pulse => self.pulse_change,
        }
    }
}
