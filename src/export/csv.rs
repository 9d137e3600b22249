use super::ExportError;
use crate::categories::CategorizedReading;
use crate::models::ExerciseImpact;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::io::Write;

/// Write the per-event impact table, one row per matched exercise event
pub fn write_impact_table<W: Write>(
    impacts: &[ExerciseImpact],
    writer: W,
) -> Result<(), ExportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    if impacts.is_empty() {
        csv_writer.write_record(IMPACT_HEADER)?;
    }
    for impact in impacts {
        csv_writer.serialize(impact)?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Header emitted for an empty impact table so consumers still see the columns
const IMPACT_HEADER: [&str; 15] = [
    "exercise_timestamp",
    "exercise_type",
    "intensity",
    "duration_minutes",
    "intensity_score",
    "baseline_systolic",
    "baseline_diastolic",
    "baseline_pulse",
    "avg_after_systolic",
    "avg_after_diastolic",
    "avg_after_pulse",
    "systolic_change",
    "diastolic_change",
    "pulse_change",
    "follow_up_readings",
];

#[derive(Serialize)]
struct CategorizedRow<'a> {
    timestamp: NaiveDateTime,
    systolic: f64,
    diastolic: f64,
    pulse: f64,
    category: &'a str,
    category_color: &'a str,
}

/// Write categorized readings (reading plus category label and color)
pub fn write_categorized_readings<W: Write>(
    readings: &[CategorizedReading],
    writer: W,
) -> Result<(), ExportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    for entry in readings {
        csv_writer.serialize(CategorizedRow {
            timestamp: entry.reading.timestamp,
            systolic: entry.reading.systolic,
            diastolic: entry.reading.diastolic,
            pulse: entry.reading.pulse,
            category: entry.category.label(),
            category_color: &entry.category_color,
        })?;
    }

    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::categorize_all;
    use crate::models::{BpReading, Intensity};
    use chrono::NaiveDate;

    fn timestamp(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 4, 10)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn impact() -> ExerciseImpact {
        ExerciseImpact {
            exercise_timestamp: timestamp(17),
            exercise_type: "Running".to_string(),
            intensity: Intensity::High,
            duration_minutes: 45.0,
            intensity_score: 4.5,
            baseline_systolic: 130.0,
            baseline_diastolic: 85.0,
            baseline_pulse: 72.0,
            avg_after_systolic: 124.0,
            avg_after_diastolic: 81.0,
            avg_after_pulse: 70.0,
            systolic_change: -6.0,
            diastolic_change: -4.0,
            pulse_change: -2.0,
            follow_up_readings: 3,
        }
    }

    #[test]
    fn test_impact_table() {
        let mut buffer = Vec::new();
        write_impact_table(&[impact()], &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();

        let header = lines.next().unwrap();
        assert!(header.starts_with("exercise_timestamp,exercise_type,intensity,duration_minutes"));
        assert!(header.ends_with("follow_up_readings"));
        assert_eq!(
            lines.next().unwrap(),
            "2024-04-10T17:00:00,Running,High,45.0,4.5,130.0,85.0,72.0,124.0,81.0,70.0,-6.0,-4.0,-2.0,3"
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_empty_impact_table_has_header() {
        let mut buffer = Vec::new();
        write_impact_table(&[], &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.starts_with("exercise_timestamp,"));
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn test_categorized_readings() {
        let readings = vec![BpReading::new(timestamp(7), 142.0, 88.0, 74.0)];
        let categorized = categorize_all(&readings).unwrap();

        let mut buffer = Vec::new();
        write_categorized_readings(&categorized, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert!(text.starts_with("timestamp,systolic,diastolic,pulse,category,category_color\n"));
        assert!(text.contains("Hypertension Stage 2,#e74c3c"));
    }
}
