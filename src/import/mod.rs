use crate::error::ImportError;
use crate::models::{BpReading, ExerciseEvent};
use std::path::Path;

pub mod csv;

/// Trait for importing records from a file format
pub trait ImportFormat {
    /// Record type this importer produces
    type Record;

    /// Check if this importer can handle the given file
    fn can_import(&self, file_path: &Path) -> bool;

    /// Import all records from the file
    fn import_file(&self, file_path: &Path) -> Result<Vec<Self::Record>, ImportError>;

    /// Get the format name for this importer
    fn get_format_name(&self) -> &'static str;
}

/// Coordinates the readings importers and the exercise importers
pub struct ImportManager {
    bp_importers: Vec<Box<dyn ImportFormat<Record = BpReading>>>,
    exercise_importers: Vec<Box<dyn ImportFormat<Record = ExerciseEvent>>>,
}

impl ImportManager {
    /// Create a new import manager with all available importers
    pub fn new() -> Self {
        Self {
            bp_importers: vec![Box::new(csv::BpCsvImporter::new())],
            exercise_importers: vec![Box::new(csv::ExerciseCsvImporter::new())],
        }
    }

    /// Import blood pressure readings, picking the importer by file type
    pub fn import_bp_readings(&self, file_path: &Path) -> Result<Vec<BpReading>, ImportError> {
        Self::import_with(&self.bp_importers, file_path)
    }

    /// Import exercise events, picking the importer by file type
    pub fn import_exercise_events(
        &self,
        file_path: &Path,
    ) -> Result<Vec<ExerciseEvent>, ImportError> {
        Self::import_with(&self.exercise_importers, file_path)
    }

    fn import_with<T: 'static>(
        importers: &[Box<dyn ImportFormat<Record = T>>],
        file_path: &Path,
    ) -> Result<Vec<T>, ImportError> {
        let importer = importers
            .iter()
            .find(|importer| importer.can_import(file_path))
            .ok_or_else(|| ImportError::UnsupportedFile {
                path: file_path.display().to_string(),
            })?;

        tracing::debug!(
            file = %file_path.display(),
            format = importer.get_format_name(),
            "Selected importer"
        );
        importer.import_file(file_path)
    }
}

impl Default for ImportManager {
    fn default() -> Self {
        Self::new()
    }
}
