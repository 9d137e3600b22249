use super::{AnalysisReport, ExportError};
use crate::analysis::CorrelationResult;
use crate::categories::BpStatistics;
use crate::models::BpMetric;
use std::io::Write;

/// Write an analysis report in human-readable text format
pub fn write_analysis_report<W: Write>(
    report: &AnalysisReport,
    max_interpretations: usize,
    mut out: W,
) -> Result<(), ExportError> {
    writeln!(out, "{:=<72}", "")?;
    writeln!(out, "EXERCISE / BLOOD PRESSURE IMPACT REPORT")?;
    writeln!(out, "{:=<72}", "")?;
    writeln!(out, "Generated: {}", report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
    writeln!(out, "Follow-up window: {} days", report.lookback_window_days)?;
    writeln!(out)?;

    if let Some(stats) = &report.bp_statistics {
        write_statistics(stats, &mut out)?;
    }

    writeln!(out, "CORRELATION ANALYSIS")?;
    writeln!(out, "{:-<72}", "")?;
    writeln!(out, "Status: {}", report.summary.status)?;

    match &report.correlation {
        Some(result) => write_correlation(result, &mut out)?,
        None => writeln!(out, "Blood pressure readings and exercise events are both required.")?,
    }
    writeln!(out)?;

    let interpretations = report.summary.top_interpretations(max_interpretations);
    if !interpretations.is_empty() {
        writeln!(out, "INTERPRETATION")?;
        writeln!(out, "{:-<72}", "")?;
        for interpretation in interpretations {
            writeln!(out, "• {}", interpretation)?;
        }
        writeln!(out)?;
    }

    writeln!(out, "{:=<72}", "")?;
    writeln!(out, "End of Report")?;
    out.flush()?;

    Ok(())
}

fn write_statistics<W: Write>(stats: &BpStatistics, out: &mut W) -> Result<(), ExportError> {
    writeln!(out, "BLOOD PRESSURE SUMMARY")?;
    writeln!(out, "{:-<72}", "")?;
    writeln!(out, "Readings: {}", stats.reading_count)?;
    writeln!(
        out,
        "Systolic:  avg {:.1} mmHg (range {:.0}-{:.0})",
        stats.avg_systolic, stats.min_systolic, stats.max_systolic
    )?;
    writeln!(
        out,
        "Diastolic: avg {:.1} mmHg (range {:.0}-{:.0})",
        stats.avg_diastolic, stats.min_diastolic, stats.max_diastolic
    )?;
    writeln!(out, "Pulse:     avg {:.1} bpm", stats.avg_pulse)?;

    let distribution = &stats.category_distribution;
    for (category, count) in &distribution.counts {
        let percentage = distribution.percentages.get(category).copied().unwrap_or(0.0);
        writeln!(out, "  {:<22} {:>5} ({:>5.1}%)", category.label(), count, percentage)?;
    }
    writeln!(out)?;

    Ok(())
}

fn write_correlation<W: Write>(result: &CorrelationResult, out: &mut W) -> Result<(), ExportError> {
    writeln!(out, "Matched exercise events: {}", result.exercise_impact_data.len())?;

    if result.overall_correlation.is_empty() {
        writeln!(out, "Not enough matched events to compute correlations.")?;
    }
    for (metric, correlation) in &result.overall_correlation {
        match &correlation.error {
            Some(failure) => {
                writeln!(out, "  {:<10} not computable: {}", metric.as_str(), failure)?
            }
            None => writeln!(
                out,
                "  {:<10} r = {:>6.3}  p = {:.4}  {}",
                metric.as_str(),
                correlation.correlation,
                correlation.p_value,
                if correlation.significant { "significant" } else { "not significant" }
            )?,
        }
    }

    if !result.exercise_type_impact.is_empty() {
        writeln!(out)?;
        writeln!(out, "EXERCISE TYPE IMPACT (mean change after exercise)")?;
        writeln!(out, "{:-<72}", "")?;
        writeln!(
            out,
            "{:<20} {:>6} {:>12} {:>12} {:>10}",
            "Exercise", "Count", "Systolic", "Diastolic", "Pulse"
        )?;
        for (exercise_type, impact) in &result.exercise_type_impact {
            let averages = &impact.averages;
            writeln!(
                out,
                "{:<20} {:>6} {:>+12.1} {:>+12.1} {:>+10.1}",
                exercise_type,
                averages.count,
                averages.avg_systolic_change,
                averages.avg_diastolic_change,
                averages.avg_pulse_change
            )?;

            for (intensity, level) in impact.intensity_breakdown.iter().flatten() {
                writeln!(
                    out,
                    "  {:<18} {:>6} {:>+12.1} {:>+12.1} {:>+10.1}",
                    intensity.as_str(),
                    level.count,
                    level.avg_systolic_change,
                    level.avg_diastolic_change,
                    level.avg_pulse_change
                )?;
            }
        }
    }

    if !result.exercise_impact_data.is_empty() {
        writeln!(out)?;
        writeln!(out, "MATCHED EVENTS")?;
        writeln!(out, "{:-<72}", "")?;
        writeln!(
            out,
            "{:<17} {:<16} {:<9} {:>6} {:>10} {:>10}",
            "When", "Exercise", "Intensity", "Score", "Systolic", "Diastolic"
        )?;
        for impact in &result.exercise_impact_data {
            writeln!(
                out,
                "{:<17} {:<16} {:<9} {:>6.2} {:>+10.1} {:>+10.1}",
                impact.exercise_timestamp.format("%Y-%m-%d %H:%M"),
                impact.exercise_type,
                impact.intensity.as_str(),
                impact.intensity_score,
                impact.change(BpMetric::Systolic),
                impact.change(BpMetric::Diastolic)
            )?;
        }
    }

    Ok(())
}
