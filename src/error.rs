//! Unified error hierarchy for bpimpact
//!
//! The analysis core resolves insufficient data and numeric degeneracy
//! locally, so these errors only surface at the edges: ingestion, export
//! and configuration.

use thiserror::Error;

pub use crate::export::ExportError;

/// Top-level error type for all bpimpact operations
#[derive(Debug, Error)]
pub enum BpImpactError {
    /// Input file ingestion errors
    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    /// Data validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Report export errors
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Errors raised while turning tabular input into typed records
#[derive(Debug, Error)]
pub enum ImportError {
    /// A required column is absent from the header
    #[error("Missing required column '{column}' in {source_name}")]
    MissingColumn { source_name: String, column: String },

    /// A required field is empty on a row
    #[error("Row {row}: missing value for '{column}'")]
    MissingValue { row: usize, column: String },

    /// A numeric field could not be parsed
    #[error("Row {row}: invalid value '{value}' for '{column}'")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },

    /// Date/time fields could not be combined into an instant
    #[error("Row {row}: unable to parse timestamp '{value}'")]
    InvalidTimestamp { row: usize, value: String },

    /// Intensity outside Low/Moderate/High
    #[error("Row {row}: unknown intensity '{value}'")]
    UnknownIntensity { row: usize, value: String },

    /// Exercise duration of zero or less
    #[error("Row {row}: duration must be positive, got {value}")]
    NonPositiveDuration { row: usize, value: f64 },

    /// No importer accepts the file
    #[error("No importer found for file: {path}")]
    UnsupportedFile { path: String },

    /// Underlying CSV reader failure
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl ImportError {
    /// Row the error refers to, if any (1-based, header excluded)
    pub fn row(&self) -> Option<usize> {
        match self {
            ImportError::MissingValue { row, .. }
            | ImportError::InvalidValue { row, .. }
            | ImportError::InvalidTimestamp { row, .. }
            | ImportError::UnknownIntensity { row, .. }
            | ImportError::NonPositiveDuration { row, .. } => Some(*row),
            ImportError::MissingColumn { .. }
            | ImportError::UnsupportedFile { .. }
            | ImportError::Csv(_) => None,
        }
    }
}

/// Result type alias for bpimpact operations
pub type Result<T> = std::result::Result<T, BpImpactError>;

impl BpImpactError {
    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            BpImpactError::Validation(_) => ErrorSeverity::Warning,
            BpImpactError::Import(ImportError::MissingColumn { .. }) => ErrorSeverity::Error,
            BpImpactError::Import(_) => ErrorSeverity::Warning,
            BpImpactError::Configuration(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            BpImpactError::Import(ImportError::MissingColumn {
                source_name,
                column,
            }) => {
                format!(
                    "The file {} has no '{}' column. \
                     Please check that you exported the right data.",
                    source_name, column
                )
            }
            BpImpactError::Import(err) if err.row().is_some() => {
                format!("Your data file contains an invalid row: {}", err)
            }
            BpImpactError::Configuration(reason) => {
                format!("The configuration is invalid: {}", reason)
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Error that makes every further analysis meaningless
    Critical,
    /// Error that prevents the operation
    Error,
    /// Warning that doesn't prevent operation
    Warning,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_severity() {
        let err = BpImpactError::Import(ImportError::UnknownIntensity {
            row: 3,
            value: "extreme".to_string(),
        });
        assert_eq!(err.severity(), ErrorSeverity::Warning);

        let err = BpImpactError::Configuration("bad window".to_string());
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert_eq!(err.severity().to_tracing_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_context_wrapped_error_keeps_user_message() {
        use anyhow::Context;

        let failed: Result<()> = Err(ImportError::UnknownIntensity {
            row: 4,
            value: "extreme".to_string(),
        }
        .into());
        let err = failed
            .context("Failed to import exercise events from fit.csv")
            .unwrap_err();

        let known = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<BpImpactError>())
            .unwrap();
        assert_eq!(known.severity().to_tracing_level(), tracing::Level::WARN);
        assert_eq!(
            known.user_message(),
            "Your data file contains an invalid row: Row 4: unknown intensity 'extreme'"
        );
    }

    #[test]
    fn test_validation_error_is_a_warning() {
        let err = crate::range::DateRange::new(
            chrono::NaiveDate::from_ymd_opt(2024, 3, 10),
            chrono::NaiveDate::from_ymd_opt(2024, 3, 1),
        )
        .unwrap_err();

        assert_eq!(err.severity(), ErrorSeverity::Warning);
        assert!(err.user_message().starts_with("Validation error: date range start"));
    }

    #[test]
    fn test_import_error_row() {
        let err = ImportError::NonPositiveDuration { row: 7, value: 0.0 };
        assert_eq!(err.row(), Some(7));

        let err = ImportError::MissingColumn {
            source_name: "bp.csv".to_string(),
            column: "systolic".to_string(),
        };
        assert_eq!(err.row(), None);
    }

    #[test]
    fn test_user_messages() {
        let err = BpImpactError::Import(ImportError::MissingColumn {
            source_name: "omron.csv".to_string(),
            column: "diastolic".to_string(),
        });
        assert!(err.user_message().contains("no 'diastolic' column"));

        let err = BpImpactError::Import(ImportError::InvalidValue {
            row: 2,
            column: "pulse".to_string(),
            value: "abc".to_string(),
        });
        assert!(err.user_message().contains("invalid row"));
    }
}
