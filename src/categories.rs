use crate::models::BpReading;
use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Clinical blood pressure categories, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BpCategory {
    #[serde(rename = "Normal")]
    Normal,
    #[serde(rename = "Elevated")]
    Elevated,
    #[serde(rename = "Hypertension Stage 1")]
    HypertensionStage1,
    #[serde(rename = "Hypertension Stage 2")]
    HypertensionStage2,
    #[serde(rename = "Hypertensive Crisis")]
    HypertensiveCrisis,
}

impl BpCategory {
    /// All categories, least severe first
    pub const ALL: [BpCategory; 5] = [
        BpCategory::Normal,
        BpCategory::Elevated,
        BpCategory::HypertensionStage1,
        BpCategory::HypertensionStage2,
        BpCategory::HypertensiveCrisis,
    ];

    /// Classify a reading; the more severe axis wins
    pub fn classify(systolic: f64, diastolic: f64) -> Self {
        if systolic >= 180.0 || diastolic >= 120.0 {
            BpCategory::HypertensiveCrisis
        } else if systolic >= 140.0 || diastolic >= 90.0 {
            BpCategory::HypertensionStage2
        } else if systolic >= 130.0 || diastolic >= 80.0 {
            BpCategory::HypertensionStage1
        } else if systolic >= 120.0 {
            BpCategory::Elevated
        } else {
            BpCategory::Normal
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BpCategory::Normal => "Normal",
            BpCategory::Elevated => "Elevated",
            BpCategory::HypertensionStage1 => "Hypertension Stage 1",
            BpCategory::HypertensionStage2 => "Hypertension Stage 2",
            BpCategory::HypertensiveCrisis => "Hypertensive Crisis",
        }
    }

    /// Display color, carried through for presentation layers
    pub fn color(&self) -> &'static str {
        match self {
            BpCategory::Normal => "#2ecc71",
            BpCategory::Elevated => "#f1c40f",
            BpCategory::HypertensionStage1 => "#e67e22",
            BpCategory::HypertensionStage2 => "#e74c3c",
            BpCategory::HypertensiveCrisis => "#c0392b",
        }
    }
}

impl fmt::Display for BpCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Categorize a single reading, returning the category and its display color
pub fn categorize(systolic: f64, diastolic: f64) -> (BpCategory, &'static str) {
    let category = BpCategory::classify(systolic, diastolic);
    (category, category.color())
}

/// A reading annotated with its category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorizedReading {
    #[serde(flatten)]
    pub reading: BpReading,
    pub category: BpCategory,
    pub category_color: String,
}

/// Annotate every reading with its category.
///
/// Returns `None` for an empty series so callers can tell "no data" apart from
/// an empty annotation.
pub fn categorize_all(readings: &[BpReading]) -> Option<Vec<CategorizedReading>> {
    if readings.is_empty() {
        return None;
    }

    let categorized = readings
        .iter()
        .map(|reading| {
            let (category, color) = categorize(reading.systolic, reading.diastolic);
            CategorizedReading {
                reading: reading.clone(),
                category,
                category_color: color.to_string(),
            }
        })
        .collect();

    Some(categorized)
}

/// Category counts and percentages over a set of readings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDistribution {
    pub counts: BTreeMap<BpCategory, usize>,
    pub percentages: BTreeMap<BpCategory, f64>,
}

impl CategoryDistribution {
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Most frequent category (the most severe one on ties)
    pub fn dominant(&self) -> Option<BpCategory> {
        self.counts
            .iter()
            .max_by_key(|(category, count)| (**count, **category))
            .map(|(category, _)| *category)
    }
}

/// Count how often each category occurs. Only categories that occur are listed.
pub fn category_distribution(categorized: &[CategorizedReading]) -> Option<CategoryDistribution> {
    if categorized.is_empty() {
        return None;
    }

    let mut counts: BTreeMap<BpCategory, usize> = BTreeMap::new();
    for entry in categorized {
        *counts.entry(entry.category).or_insert(0) += 1;
    }

    let total = categorized.len() as f64;
    let percentages = counts
        .iter()
        .map(|(category, count)| (*category, *count as f64 / total * 100.0))
        .collect();

    Some(CategoryDistribution {
        counts,
        percentages,
    })
}

/// Resampling period for category trends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendFrequency {
    Daily,
    Weekly,
    Monthly,
}

impl TrendFrequency {
    /// Label of the bucket containing `date`.
    ///
    /// Daily buckets are labelled by the day, weekly buckets (Monday to Sunday)
    /// by their closing Sunday and monthly buckets by the last day of the month.
    pub fn bucket_label(&self, date: NaiveDate) -> NaiveDate {
        match self {
            TrendFrequency::Daily => date,
            TrendFrequency::Weekly => {
                let days_to_sunday = 6 - date.weekday().num_days_from_monday();
                date.checked_add_days(Days::new(days_to_sunday as u64))
                    .unwrap_or(date)
            }
            TrendFrequency::Monthly => last_day_of_month(date),
        }
    }

    /// Label of the bucket following the one labelled `label`
    fn next_label(&self, label: NaiveDate) -> Option<NaiveDate> {
        match self {
            TrendFrequency::Daily => label.succ_opt(),
            TrendFrequency::Weekly => label.checked_add_days(Days::new(7)),
            TrendFrequency::Monthly => label.succ_opt().map(last_day_of_month),
        }
    }
}

impl FromStr for TrendFrequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "d" | "day" | "daily" => Ok(TrendFrequency::Daily),
            "w" | "week" | "weekly" => Ok(TrendFrequency::Weekly),
            "m" | "month" | "monthly" => Ok(TrendFrequency::Monthly),
            _ => Err(format!("Invalid trend frequency: {}", s)),
        }
    }
}

fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };

    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .unwrap_or(date)
}

/// Category counts for one resampling bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTrendBucket {
    pub period: NaiveDate,

    /// Always holds every category, zero when absent
    pub counts: BTreeMap<BpCategory, usize>,
}

impl CategoryTrendBucket {
    fn empty(period: NaiveDate) -> Self {
        CategoryTrendBucket {
            period,
            counts: BpCategory::ALL.iter().map(|c| (*c, 0)).collect(),
        }
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

/// Category counts resampled into daily, weekly or monthly buckets.
///
/// Buckets between the first and last reading that hold no readings are
/// still emitted with zero counts.
pub fn category_trends(
    categorized: &[CategorizedReading],
    frequency: TrendFrequency,
) -> Option<Vec<CategoryTrendBucket>> {
    if categorized.is_empty() {
        return None;
    }

    let mut buckets: BTreeMap<NaiveDate, CategoryTrendBucket> = BTreeMap::new();
    for entry in categorized {
        let label = frequency.bucket_label(entry.reading.timestamp.date());
        let bucket = buckets
            .entry(label)
            .or_insert_with(|| CategoryTrendBucket::empty(label));
        *bucket.counts.entry(entry.category).or_insert(0) += 1;
    }

    let first = *buckets.keys().next()?;
    let last = *buckets.keys().next_back()?;

    let mut series = Vec::with_capacity(buckets.len());
    let mut current = Some(first);
    while let Some(label) = current {
        if label > last {
            break;
        }
        let bucket = buckets
            .remove(&label)
            .unwrap_or_else(|| CategoryTrendBucket::empty(label));
        series.push(bucket);
        current = frequency.next_label(label);
    }

    Some(series)
}

/// Summary statistics over a categorized reading series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BpStatistics {
    pub reading_count: usize,
    pub avg_systolic: f64,
    pub max_systolic: f64,
    pub min_systolic: f64,
    pub avg_diastolic: f64,
    pub max_diastolic: f64,
    pub min_diastolic: f64,
    pub avg_pulse: f64,
    pub category_distribution: CategoryDistribution,
}

impl BpStatistics {
    /// `None` for an empty series
    pub fn from_readings(categorized: &[CategorizedReading]) -> Option<Self> {
        let category_distribution = category_distribution(categorized)?;
        let (avg_systolic, min_systolic, max_systolic) =
            summarize(categorized.iter().map(|c| c.reading.systolic));
        let (avg_diastolic, min_diastolic, max_diastolic) =
            summarize(categorized.iter().map(|c| c.reading.diastolic));
        let (avg_pulse, _, _) = summarize(categorized.iter().map(|c| c.reading.pulse));

        Some(BpStatistics {
            reading_count: categorized.len(),
            avg_systolic,
            max_systolic,
            min_systolic,
            avg_diastolic,
            max_diastolic,
            min_diastolic,
            avg_pulse,
            category_distribution,
        })
    }
}

/// (mean, min, max) of a non-empty series
fn summarize(values: impl Iterator<Item = f64>) -> (f64, f64, f64) {
    let (sum, count, min, max) = values.fold(
        (0.0, 0usize, f64::INFINITY, f64::NEG_INFINITY),
        |(sum, count, min, max), v| (sum + v, count + 1, min.min(v), max.max(v)),
    );
    (sum / count.max(1) as f64, min, max)
}
