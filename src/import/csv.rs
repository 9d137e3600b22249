use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use crate::error::ImportError;
use crate::import::ImportFormat;
use crate::models::{BpReading, ExerciseEvent, Intensity};

/// Maps header variations onto standard column names
struct ColumnMapping {
    aliases: HashMap<String, &'static str>,
}

impl ColumnMapping {
    fn new() -> Self {
        ColumnMapping {
            aliases: HashMap::new(),
        }
    }

    fn add_mapping(mut self, standard: &'static str, variations: &[&str]) -> Self {
        for variation in variations {
            self.aliases.insert(variation.to_lowercase(), standard);
        }
        self
    }

    /// Timestamp columns shared by both input files
    fn with_timestamp_columns(self) -> Self {
        self.add_mapping("datetime", &["datetime", "date_time", "timestamp"])
            .add_mapping("date", &["date", "day", "measurement_date"])
            .add_mapping("time", &["time", "time_of_day", "measurement_time"])
    }

    fn normalize_column_name(&self, name: &str) -> String {
        let normalized = name.trim().to_lowercase().replace([' ', '-'], "_");

        self.aliases
            .get(&normalized)
            .map(|standard| standard.to_string())
            .unwrap_or(normalized)
    }

    /// Resolve a header row into standard-name -> index
    fn resolve(&self, headers: &StringRecord) -> HeaderIndex {
        let mut columns = HashMap::new();
        for (i, header) in headers.iter().enumerate() {
            // First occurrence wins when two headers normalize to the same name
            columns.entry(self.normalize_column_name(header)).or_insert(i);
        }
        HeaderIndex { columns }
    }
}

/// Resolved header of one file
struct HeaderIndex {
    columns: HashMap<String, usize>,
}

impl HeaderIndex {
    fn require(&self, column: &str, source_name: &str) -> Result<usize, ImportError> {
        self.columns
            .get(column)
            .copied()
            .ok_or_else(|| ImportError::MissingColumn {
                source_name: source_name.to_string(),
                column: column.to_string(),
            })
    }

    /// Either a combined datetime column or separate date and time columns
    fn timestamp_columns(&self, source_name: &str) -> Result<TimestampColumns, ImportError> {
        if let Some(&index) = self.columns.get("datetime") {
            return Ok(TimestampColumns::Combined(index));
        }
        Ok(TimestampColumns::Split {
            date: self.require("date", source_name)?,
            time: self.require("time", source_name)?,
        })
    }
}

enum TimestampColumns {
    Combined(usize),
    Split { date: usize, time: usize },
}

/// Accessors for one data row with row-numbered errors
struct Row<'a> {
    record: &'a StringRecord,
    number: usize,
}

impl<'a> Row<'a> {
    fn text(&self, index: usize, column: &str) -> Result<&'a str, ImportError> {
        match self.record.get(index).map(str::trim) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(ImportError::MissingValue {
                row: self.number,
                column: column.to_string(),
            }),
        }
    }

    fn number(&self, index: usize, column: &str) -> Result<f64, ImportError> {
        let value = self.text(index, column)?;
        value
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| ImportError::InvalidValue {
                row: self.number,
                column: column.to_string(),
                value: value.to_string(),
            })
    }

    fn timestamp(&self, columns: &TimestampColumns) -> Result<NaiveDateTime, ImportError> {
        match *columns {
            TimestampColumns::Combined(index) => {
                let value = self.text(index, "datetime")?;
                parse_datetime(value).ok_or_else(|| ImportError::InvalidTimestamp {
                    row: self.number,
                    value: value.to_string(),
                })
            }
            TimestampColumns::Split { date, time } => {
                let date_value = self.text(date, "date")?;
                let time_value = self.text(time, "time")?;
                combine_date_time(date_value, time_value).ok_or_else(|| {
                    ImportError::InvalidTimestamp {
                        row: self.number,
                        value: format!("{} {}", date_value, time_value),
                    }
                })
            }
        }
    }
}

const DATETIME_FORMATS: [&str; 8] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%d.%m.%Y"];

const TIME_FORMATS: [&str; 5] = ["%H:%M:%S", "%H:%M", "%H:%M:%S%.f", "%I:%M %p", "%I:%M:%S %p"];

/// Parse a combined date-time string
fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim().trim_end_matches('Z');
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}

/// Combine separate date and time-of-day fields into one instant
fn combine_date_time(date: &str, time: &str) -> Option<NaiveDateTime> {
    // Some exports write the date column as a full midnight timestamp
    let date = DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date.trim(), format).ok())
        .or_else(|| parse_datetime(date).map(|dt| dt.date()))?;
    let time = TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(time.trim(), format).ok())?;

    Some(date.and_time(time))
}

fn source_name(file_path: &Path) -> String {
    file_path
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}

fn is_csv(file_path: &Path) -> bool {
    file_path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

fn reader_builder() -> ReaderBuilder {
    let mut builder = ReaderBuilder::new();
    builder.has_headers(true).trim(Trim::All).flexible(true);
    builder
}

/// Importer for home blood pressure monitor exports
/// (`date,time,systolic,diastolic,pulse`)
pub struct BpCsvImporter {
    mapping: ColumnMapping,
}

impl BpCsvImporter {
    pub fn new() -> Self {
        let mapping = ColumnMapping::new()
            .with_timestamp_columns()
            .add_mapping(
                "systolic",
                &["systolic", "sys", "systolic_mmhg", "sbp", "systolic_bp"],
            )
            .add_mapping(
                "diastolic",
                &["diastolic", "dia", "diastolic_mmhg", "dbp", "diastolic_bp"],
            )
            .add_mapping(
                "pulse",
                &["pulse", "heart_rate", "hr", "bpm", "pulse_bpm"],
            );

        BpCsvImporter { mapping }
    }

    /// Parse readings from any CSV source
    pub fn read_from<R: Read>(
        &self,
        reader: R,
        source_name: &str,
    ) -> Result<Vec<BpReading>, ImportError> {
        let mut reader = reader_builder().from_reader(reader);
        let header = self.mapping.resolve(reader.headers()?);

        let timestamp = header.timestamp_columns(source_name)?;
        let systolic = header.require("systolic", source_name)?;
        let diastolic = header.require("diastolic", source_name)?;
        let pulse = header.require("pulse", source_name)?;

        let mut readings = Vec::new();
        for (i, result) in reader.records().enumerate() {
            let record = result?;
            let row = Row {
                record: &record,
                number: i + 1,
            };

            readings.push(BpReading::new(
                row.timestamp(&timestamp)?,
                row.number(systolic, "systolic")?,
                row.number(diastolic, "diastolic")?,
                row.number(pulse, "pulse")?,
            ));
        }

        debug!(source = source_name, readings = readings.len(), "Parsed blood pressure readings");
        Ok(readings)
    }
}

impl Default for BpCsvImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportFormat for BpCsvImporter {
    type Record = BpReading;

    fn can_import(&self, file_path: &Path) -> bool {
        is_csv(file_path)
    }

    fn import_file(&self, file_path: &Path) -> Result<Vec<BpReading>, ImportError> {
        let name = source_name(file_path);
        let file = std::fs::File::open(file_path).map_err(csv::Error::from)?;
        let readings = self.read_from(file, &name)?;
        info!(
            file = %file_path.display(),
            readings = readings.len(),
            "Imported blood pressure readings"
        );
        Ok(readings)
    }

    fn get_format_name(&self) -> &'static str {
        "Blood pressure CSV"
    }
}

/// Importer for activity tracker exports
/// (`date,time,exercise_type,intensity,duration_minutes`)
pub struct ExerciseCsvImporter {
    mapping: ColumnMapping,
}

impl ExerciseCsvImporter {
    pub fn new() -> Self {
        let mapping = ColumnMapping::new()
            .with_timestamp_columns()
            .add_mapping(
                "exercise_type",
                &["exercise_type", "activity", "activity_type", "type", "exercise", "sport"],
            )
            .add_mapping("intensity", &["intensity", "effort", "intensity_level"])
            .add_mapping(
                "duration_minutes",
                &["duration_minutes", "duration", "duration_min", "minutes", "duration_mins"],
            );

        ExerciseCsvImporter { mapping }
    }

    /// Parse exercise events from any CSV source
    pub fn read_from<R: Read>(
        &self,
        reader: R,
        source_name: &str,
    ) -> Result<Vec<ExerciseEvent>, ImportError> {
        let mut reader = reader_builder().from_reader(reader);
        let header = self.mapping.resolve(reader.headers()?);

        let timestamp = header.timestamp_columns(source_name)?;
        let exercise_type = header.require("exercise_type", source_name)?;
        let intensity = header.require("intensity", source_name)?;
        let duration = header.require("duration_minutes", source_name)?;

        let mut events = Vec::new();
        for (i, result) in reader.records().enumerate() {
            let record = result?;
            let row = Row {
                record: &record,
                number: i + 1,
            };

            let intensity_value = row.text(intensity, "intensity")?;
            let level = intensity_value
                .parse::<Intensity>()
                .map_err(|_| ImportError::UnknownIntensity {
                    row: row.number,
                    value: intensity_value.to_string(),
                })?;

            let minutes = row.number(duration, "duration_minutes")?;
            if minutes <= 0.0 {
                return Err(ImportError::NonPositiveDuration {
                    row: row.number,
                    value: minutes,
                });
            }

            events.push(ExerciseEvent::new(
                row.timestamp(&timestamp)?,
                row.text(exercise_type, "exercise_type")?,
                level,
                minutes,
            ));
        }

        debug!(source = source_name, events = events.len(), "Parsed exercise events");
        Ok(events)
    }
}

impl Default for ExerciseCsvImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportFormat for ExerciseCsvImporter {
    type Record = ExerciseEvent;

    fn can_import(&self, file_path: &Path) -> bool {
        is_csv(file_path)
    }

    fn import_file(&self, file_path: &Path) -> Result<Vec<ExerciseEvent>, ImportError> {
        let name = source_name(file_path);
        let file = std::fs::File::open(file_path).map_err(csv::Error::from)?;
        let events = self.read_from(file, &name)?;
        info!(file = %file_path.display(), events = events.len(), "Imported exercise events");
        Ok(events)
    }

    fn get_format_name(&self) -> &'static str {
        "Exercise CSV"
    }
}
