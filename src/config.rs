use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::categories::TrendFrequency;
use crate::error::BpImpactError;
use crate::export::ExportFormat;
use crate::logging::LogConfig;

/// Longest follow-up window accepted by [`AnalysisConfig::validate`]
pub const MAX_LOOKBACK_WINDOW_DAYS: u32 = 365;

/// Thresholds and windows used by the matcher, the correlation engine and the
/// interpretation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// p-value below which a correlation is reported as significant
    pub significance_level: f64,

    /// Absolute correlation coefficient worth a written interpretation
    pub correlation_interest_threshold: f64,

    /// Days after an exercise event whose readings count as follow-up
    pub lookback_window_days: u32,

    /// Session length (minutes) that scores as one unit of intensity
    pub intensity_normalization_minutes: f64,

    /// Impact records needed before any coefficient is computed
    pub min_records_for_correlation: usize,

    /// Records needed for an exercise type to be reported
    pub min_records_per_type: usize,

    /// Records of one type needed before the intensity breakdown is added
    pub min_records_for_intensity_breakdown: usize,

    /// Records needed for an intensity bucket to be reported
    pub min_records_per_intensity: usize,

    /// Mean systolic change (mmHg) that makes an exercise type noteworthy
    pub systolic_change_threshold: f64,

    /// Mean diastolic change (mmHg) that makes an exercise type noteworthy
    pub diastolic_change_threshold: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            significance_level: 0.05,
            correlation_interest_threshold: 0.3,
            lookback_window_days: 3,
            intensity_normalization_minutes: 30.0,
            min_records_for_correlation: 5,
            min_records_per_type: 3,
            min_records_for_intensity_breakdown: 5,
            min_records_per_intensity: 2,
            systolic_change_threshold: 5.0,
            diastolic_change_threshold: 3.0,
        }
    }
}

impl AnalysisConfig {
    /// Reject values that would make the analysis meaningless
    pub fn validate(&self) -> std::result::Result<(), BpImpactError> {
        if !(self.significance_level > 0.0 && self.significance_level < 1.0) {
            return Err(BpImpactError::Configuration(format!(
                "significance_level must be in (0, 1), got {}",
                self.significance_level
            )));
        }
        if !(0.0..=1.0).contains(&self.correlation_interest_threshold) {
            return Err(BpImpactError::Configuration(format!(
                "correlation_interest_threshold must be in [0, 1], got {}",
                self.correlation_interest_threshold
            )));
        }
        if !(1..=MAX_LOOKBACK_WINDOW_DAYS).contains(&self.lookback_window_days) {
            return Err(BpImpactError::Configuration(format!(
                "lookback_window_days must be between 1 and {}, got {}",
                MAX_LOOKBACK_WINDOW_DAYS, self.lookback_window_days
            )));
        }
        if !(self.intensity_normalization_minutes > 0.0) {
            return Err(BpImpactError::Configuration(format!(
                "intensity_normalization_minutes must be positive, got {}",
                self.intensity_normalization_minutes
            )));
        }
        if self.min_records_per_type == 0 || self.min_records_per_intensity == 0 {
            return Err(BpImpactError::Configuration(
                "minimum record counts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Configuration metadata
    pub metadata: ConfigMetadata,

    /// Analysis thresholds
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Logging setup for the CLI
    #[serde(default)]
    pub logging: LogConfig,

    /// Report output preferences
    #[serde(default)]
    pub report: ReportSettings,
}

/// Configuration metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigMetadata {
    /// Configuration format version
    pub version: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

/// Report output preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    /// Output format used when none is given on the command line
    pub default_format: ExportFormat,

    /// Resampling period for category trends
    pub trend_frequency: TrendFrequency,

    /// Cap on interpretations printed in text reports
    pub max_interpretations: usize,
}

impl Default for ReportSettings {
    fn default() -> Self {
        ReportSettings {
            default_format: ExportFormat::Text,
            trend_frequency: TrendFrequency::Weekly,
            max_interpretations: 10,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let now = Utc::now();

        AppConfig {
            metadata: ConfigMetadata {
                version: "1.0".to_string(),
                created_at: now,
                updated_at: now,
            },
            analysis: AnalysisConfig::default(),
            logging: LogConfig::default(),
            report: ReportSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;

        config.analysis.validate()?;

        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.metadata.updated_at = Utc::now();

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".bpimpact")
            .join("config.toml")
    }

    /// Load the configuration at the default path, or defaults when no file
    /// exists there
    pub fn load_or_default() -> Result<Self> {
        Self::load_or_default_from(Self::default_config_path())
    }

    /// Load configuration, falling back to defaults only when the file is
    /// missing. Unreadable, malformed or invalid files are errors.
    pub fn load_or_default_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        match fs::metadata(&path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            _ => Self::load_from_file(path),
        }
    }

    /// Save configuration to default location
    pub fn save_default(&mut self) -> Result<PathBuf> {
        let config_path = Self::default_config_path();
        self.save_to_file(&config_path)?;
        Ok(config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_thresholds() {
        let config = AnalysisConfig::default();
        assert_eq!(config.significance_level, 0.05);
        assert_eq!(config.correlation_interest_threshold, 0.3);
        assert_eq!(config.lookback_window_days, 3);
        assert_eq!(config.min_records_for_correlation, 5);
        assert_eq!(config.min_records_per_type, 3);
        assert_eq!(config.min_records_per_intensity, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_analysis_config() {
        let config = AnalysisConfig {
            significance_level: 1.5,
            ..AnalysisConfig::default()
        };
        assert!(config.validate().is_err());

        let config = AnalysisConfig {
            lookback_window_days: 0,
            ..AnalysisConfig::default()
        };
        assert!(config.validate().is_err());

        let config = AnalysisConfig {
            lookback_window_days: 100_000_000,
            ..AnalysisConfig::default()
        };
        assert!(config.validate().is_err());

        let config = AnalysisConfig {
            lookback_window_days: MAX_LOOKBACK_WINDOW_DAYS,
            ..AnalysisConfig::default()
        };
        assert!(config.validate().is_ok());

        let config = AnalysisConfig {
            intensity_normalization_minutes: 0.0,
            ..AnalysisConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.metadata.version, deserialized.metadata.version);
        assert_eq!(config.analysis, deserialized.analysis);
    }

    #[test]
    fn test_partial_analysis_section_uses_defaults() {
        let toml_str = r#"
            [metadata]
            version = "1.0"
            created_at = "2024-03-01T00:00:00Z"
            updated_at = "2024-03-01T00:00:00Z"

            [analysis]
            lookback_window_days = 5
        "#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(config.analysis.lookback_window_days, 5);
        assert_eq!(config.analysis.significance_level, 0.05);
        assert_eq!(config.report.max_interpretations, 10);
    }

    #[test]
    fn test_config_file_io() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut original_config = AppConfig::default();
        original_config.analysis.significance_level = 0.01;

        original_config.save_to_file(&config_path).unwrap();
        let loaded_config = AppConfig::load_from_file(&config_path).unwrap();

        assert_eq!(loaded_config.analysis.significance_level, 0.01);
    }

    #[test]
    fn test_load_or_default_only_falls_back_when_missing() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let config = AppConfig::load_or_default_from(&config_path).unwrap();
        assert_eq!(config.analysis, AnalysisConfig::default());

        fs::write(&config_path, "[analysis\nlookback_window_days = 5\n").unwrap();
        let err = AppConfig::load_or_default_from(&config_path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse TOML"));

        let mut invalid = AppConfig::default();
        invalid.analysis.significance_level = 0.0;
        invalid.save_to_file(&config_path).unwrap();
        assert!(AppConfig::load_or_default_from(&config_path).is_err());
    }

    #[test]
    fn test_load_rejects_invalid_thresholds() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let mut config = AppConfig::default();
        config.analysis.lookback_window_days = 0;
        config.save_to_file(&config_path).unwrap();

        assert!(AppConfig::load_from_file(&config_path).is_err());
    }
}
