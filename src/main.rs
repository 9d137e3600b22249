use anyhow::{Context, Result};
use bpimpact::categories::{BpCategory, TrendFrequency};
use bpimpact::config::AppConfig;
use bpimpact::error::{BpImpactError, ErrorSeverity};
use bpimpact::export::{self, AnalysisReport, CategorizationReport, ExportFormat};
use bpimpact::import::ImportManager;
use bpimpact::logging::init_logging;
use bpimpact::range::{data_span, DateRange};
use bpimpact::{BpReading, ExerciseBpAnalyzer, ExerciseEvent};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use colored::*;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tabled::{settings::Style, Table, Tabled};

/// bpimpact - Exercise / Blood Pressure Impact Analysis CLI
///
/// Matches exercise sessions against home blood pressure readings and
/// reports how the readings changed in the days after each session.
#[derive(Parser)]
#[command(name = "bpimpact")]
#[command(version)]
#[command(about = "Exercise / blood pressure impact analysis", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Correlate exercise sessions with blood pressure changes
    Analyze {
        /// Blood pressure readings (CSV: date,time,systolic,diastolic,pulse)
        #[arg(long, value_name = "FILE")]
        bp: PathBuf,

        /// Exercise sessions (CSV: date,time,exercise_type,intensity,duration_minutes)
        #[arg(long, value_name = "FILE")]
        exercise: PathBuf,

        /// Follow-up window in days (overrides the config file)
        #[arg(short, long, value_name = "DAYS")]
        window: Option<u32>,

        /// First day to include (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        from: Option<NaiveDate>,

        /// Last day to include (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        to: Option<NaiveDate>,

        /// Output format (text, json, csv)
        #[arg(short = 'f', long)]
        format: Option<ExportFormat>,

        /// Write the report to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Classify readings into blood pressure categories
    Categorize {
        /// Blood pressure readings (CSV)
        #[arg(long, value_name = "FILE")]
        bp: PathBuf,

        /// Trend resampling period (daily, weekly, monthly)
        #[arg(short, long)]
        trend: Option<TrendFrequency>,

        /// First day to include (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        from: Option<NaiveDate>,

        /// Last day to include (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        to: Option<NaiveDate>,

        /// Output format (text, json, csv)
        #[arg(short = 'f', long)]
        format: Option<ExportFormat>,

        /// Write the result to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Configure application settings
    Config {
        /// Print the effective configuration
        #[arg(short, long)]
        list: bool,

        /// Write a default configuration file
        #[arg(short, long)]
        init: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let app_config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path)?,
        None => AppConfig::load_or_default()?,
    };

    init_logging(&app_config.logging.clone().with_verbosity(cli.verbose))?;

    match cli.command {
        Commands::Analyze {
            bp,
            exercise,
            window,
            from,
            to,
            format,
            output,
        } => {
            let range = DateRange::new(from, to)?;
            run_analyze(&app_config, &bp, &exercise, window, range, format, output.as_deref())
        }

        Commands::Categorize {
            bp,
            trend,
            from,
            to,
            format,
            output,
        } => {
            let range = DateRange::new(from, to)?;
            run_categorize(&app_config, &bp, trend, range, format, output.as_deref())
        }

        Commands::Config { list, init } => {
            run_config(app_config, cli.config.as_deref(), list, init)
        }
    }
}

/// Print a failure, using the library's wording when the cause is one of its
/// errors
fn report_error(err: &anyhow::Error) {
    let known = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<BpImpactError>());

    let known = match known {
        Some(known) => known,
        None => {
            tracing::error!(error = %format!("{:#}", err), "Command failed");
            eprintln!("{} {:#}", "Error:".red().bold(), err);
            return;
        }
    };

    let severity = known.severity();
    if severity.to_tracing_level() == tracing::Level::WARN {
        tracing::warn!(error = %known, "Command failed");
    } else {
        tracing::error!(error = %known, "Command failed");
    }

    // Outer context (which file, which step) when there is any
    if err.to_string() != known.to_string() {
        eprintln!("{} {}", "Error:".red().bold(), err);
        eprintln!("  {}", known.user_message());
    } else {
        eprintln!("{} {}", "Error:".red().bold(), known.user_message());
    }

    if severity == ErrorSeverity::Critical {
        eprintln!(
            "  Fix the configuration file or write a fresh one with `bpimpact config --init`."
        );
    }
}

fn import_readings(manager: &ImportManager, path: &Path) -> Result<Vec<BpReading>> {
    manager
        .import_bp_readings(path)
        .map_err(BpImpactError::from)
        .with_context(|| {
            format!("Failed to import blood pressure readings from {}", path.display())
        })
}

fn import_events(manager: &ImportManager, path: &Path) -> Result<Vec<ExerciseEvent>> {
    manager
        .import_exercise_events(path)
        .map_err(BpImpactError::from)
        .with_context(|| format!("Failed to import exercise events from {}", path.display()))
}

/// Output path with the format's extension added when none was given
fn output_path(path: &Path, format: ExportFormat) -> PathBuf {
    if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.with_extension(format.extension())
    }
}

fn run_analyze(
    app_config: &AppConfig,
    bp_path: &Path,
    exercise_path: &Path,
    window: Option<u32>,
    range: DateRange,
    format: Option<ExportFormat>,
    output: Option<&Path>,
) -> Result<()> {
    let mut analysis_config = app_config.analysis.clone();
    if let Some(days) = window {
        analysis_config.lookback_window_days = days;
    }
    analysis_config.validate()?;

    let manager = ImportManager::new();
    let readings = range.filter(&import_readings(&manager, bp_path)?);
    let events = range.filter(&import_events(&manager, exercise_path)?);

    let span = data_span(&readings, &events);
    if let Some((first, last)) = span {
        tracing::info!(%range, %first, %last, "Analyzing selected data");
    }

    let analyzer = ExerciseBpAnalyzer::with_config(analysis_config);
    let report = AnalysisReport::generate(&analyzer, &readings, &events);

    let format = format.unwrap_or(app_config.report.default_format);
    let max_interpretations = app_config.report.max_interpretations;

    match (output, format) {
        (Some(path), _) => {
            let path = output_path(path, format);
            export::export_analysis(&report, format, max_interpretations, &path)
                .map_err(BpImpactError::from)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            println!("{} {}", "✓ Report written to".green(), path.display());
        }
        (None, ExportFormat::Text) => print_analysis(&report, span, max_interpretations),
        (None, _) => {
            let stdout = io::stdout();
            export::write_analysis(&report, format, max_interpretations, stdout.lock())?;
        }
    }

    Ok(())
}

fn run_categorize(
    app_config: &AppConfig,
    bp_path: &Path,
    trend: Option<TrendFrequency>,
    range: DateRange,
    format: Option<ExportFormat>,
    output: Option<&Path>,
) -> Result<()> {
    let readings = range.filter(&import_readings(&ImportManager::new(), bp_path)?);

    let frequency = trend.unwrap_or(app_config.report.trend_frequency);
    let report = CategorizationReport::generate(&readings, frequency).with_context(|| {
        format!("No blood pressure readings in {} ({})", bp_path.display(), range)
    })?;

    let format = format.unwrap_or(app_config.report.default_format);
    if output.is_none() && format == ExportFormat::Text {
        println!("{}", "Blood pressure categories".blue().bold());
        for (category, count) in &report.statistics.category_distribution.counts {
            let percentage = report
                .statistics
                .category_distribution
                .percentages
                .get(category)
                .copied()
                .unwrap_or(0.0);
            println!(
                "  {} {:>5} ({:.1}%)",
                paint(*category, &format!("{:<22}", category.label())),
                count,
                percentage
            );
        }
        println!();
        println!("{}", render_categorization(&report));
        return Ok(());
    }

    let output = output.map(|path| output_path(path, format));
    let mut writer: Box<dyn Write> = match &output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    };

    match format {
        ExportFormat::Text => writeln!(writer, "{}", render_categorization(&report))?,
        ExportFormat::Json => export::json::write_json(&report, &mut writer)?,
        ExportFormat::Csv => {
            export::csv::write_categorized_readings(&report.readings, &mut writer)?
        }
    }
    writer.flush()?;

    if let Some(path) = output {
        println!("{} {}", "✓ Categories written to".green(), path.display());
    }
    Ok(())
}

fn run_config(
    mut app_config: AppConfig,
    path: Option<&Path>,
    list: bool,
    init: bool,
) -> Result<()> {
    if init {
        let mut fresh = AppConfig::default();
        let written = match path {
            Some(path) => {
                fresh.save_to_file(path)?;
                path.to_path_buf()
            }
            None => fresh.save_default()?,
        };
        println!("{} {}", "✓ Default configuration written to".green(), written.display());
        app_config = fresh;
    }

    if list || !init {
        let content =
            toml::to_string_pretty(&app_config).context("Failed to render configuration")?;
        println!("{}", "Current configuration".blue().bold());
        println!("{}", content);
    }

    Ok(())
}

#[derive(Tabled)]
struct StatisticRow {
    #[tabled(rename = "Metric")]
    metric: &'static str,
    #[tabled(rename = "Average")]
    average: String,
    #[tabled(rename = "Min")]
    min: String,
    #[tabled(rename = "Max")]
    max: String,
}

#[derive(Tabled)]
struct TrendRow {
    #[tabled(rename = "Period")]
    period: String,
    #[tabled(rename = "Normal")]
    normal: usize,
    #[tabled(rename = "Elevated")]
    elevated: usize,
    #[tabled(rename = "Stage 1")]
    stage1: usize,
    #[tabled(rename = "Stage 2")]
    stage2: usize,
    #[tabled(rename = "Crisis")]
    crisis: usize,
}

#[derive(Tabled)]
struct ImpactRow {
    #[tabled(rename = "Exercise")]
    exercise_type: String,
    #[tabled(rename = "Sessions")]
    count: usize,
    #[tabled(rename = "Systolic")]
    systolic: String,
    #[tabled(rename = "Diastolic")]
    diastolic: String,
    #[tabled(rename = "Pulse")]
    pulse: String,
}

fn render_categorization(report: &CategorizationReport) -> String {
    let stats = &report.statistics;
    let statistics = vec![
        StatisticRow {
            metric: "Systolic (mmHg)",
            average: format!("{:.1}", stats.avg_systolic),
            min: format!("{:.0}", stats.min_systolic),
            max: format!("{:.0}", stats.max_systolic),
        },
        StatisticRow {
            metric: "Diastolic (mmHg)",
            average: format!("{:.1}", stats.avg_diastolic),
            min: format!("{:.0}", stats.min_diastolic),
            max: format!("{:.0}", stats.max_diastolic),
        },
        StatisticRow {
            metric: "Pulse (bpm)",
            average: format!("{:.1}", stats.avg_pulse),
            min: "-".to_string(),
            max: "-".to_string(),
        },
    ];

    let trends: Vec<TrendRow> = report
        .trends
        .iter()
        .map(|bucket| {
            let count = |category| bucket.counts.get(&category).copied().unwrap_or(0);
            TrendRow {
                period: bucket.period.format("%Y-%m-%d").to_string(),
                normal: count(BpCategory::Normal),
                elevated: count(BpCategory::Elevated),
                stage1: count(BpCategory::HypertensionStage1),
                stage2: count(BpCategory::HypertensionStage2),
                crisis: count(BpCategory::HypertensiveCrisis),
            }
        })
        .collect();

    format!(
        "Readings: {}\n{}\n\nTrend ({:?})\n{}",
        stats.reading_count,
        Table::new(statistics).with(Style::rounded()),
        report.trend_frequency,
        Table::new(trends).with(Style::rounded())
    )
}

fn print_analysis(
    report: &AnalysisReport,
    span: Option<(NaiveDate, NaiveDate)>,
    max_interpretations: usize,
) {
    println!("{}", "Exercise / blood pressure impact".blue().bold());
    if let Some((first, last)) = span {
        println!("  Data: {} to {}", first, last);
    }
    println!("  Follow-up window: {} days", report.lookback_window_days);

    if let Some(stats) = &report.bp_statistics {
        println!(
            "  Readings: {}  avg {:.0}/{:.0} mmHg",
            stats.reading_count, stats.avg_systolic, stats.avg_diastolic
        );
        if let Some(dominant) = stats.category_distribution.dominant() {
            println!("  Most frequent category: {}", paint(dominant, dominant.label()));
        }
    }
    println!();

    let result = match &report.correlation {
        Some(result) => result,
        None => {
            println!("{}", report.summary.status.yellow());
            return;
        }
    };

    println!("  Matched exercise events: {}", result.exercise_impact_data.len());
    if result.overall_correlation.is_empty() {
        println!("  {}", "Not enough matched events to compute correlations".yellow());
    }
    for (metric, correlation) in &result.overall_correlation {
        let line = match &correlation.error {
            Some(failure) => format!("  {:<10} not computable ({})", metric.as_str(), failure),
            None => format!(
                "  {:<10} r = {:>6.3}  p = {:.4}",
                metric.as_str(),
                correlation.correlation,
                correlation.p_value
            ),
        };
        if correlation.significant {
            println!("{}", line.green());
        } else {
            println!("{}", line.dimmed());
        }
    }

    if !result.exercise_type_impact.is_empty() {
        let rows: Vec<ImpactRow> = result
            .exercise_type_impact
            .iter()
            .map(|(exercise_type, impact)| ImpactRow {
                exercise_type: exercise_type.clone(),
                count: impact.averages.count,
                systolic: format!("{:+.1}", impact.averages.avg_systolic_change),
                diastolic: format!("{:+.1}", impact.averages.avg_diastolic_change),
                pulse: format!("{:+.1}", impact.averages.avg_pulse_change),
            })
            .collect();
        println!();
        println!("{}", "Mean change after exercise".bold());
        println!("{}", Table::new(rows).with(Style::rounded()));
    }

    let interpretations = report.summary.top_interpretations(max_interpretations);
    if !interpretations.is_empty() {
        println!();
        println!("{}", "Interpretation".bold());
        for interpretation in interpretations {
            println!("  • {}", interpretation);
        }
    }
}

/// Color a label with its category's display color
fn paint(category: BpCategory, text: &str) -> ColoredString {
    let hex = category.color().trim_start_matches('#');
    let channel = |range: std::ops::Range<usize>| {
        hex.get(range)
            .and_then(|digits| u8::from_str_radix(digits, 16).ok())
            .unwrap_or(255)
    };
    text.truecolor(channel(0..2), channel(2..4), channel(4..6))
}
