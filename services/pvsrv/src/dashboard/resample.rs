//! History resampling for the power chart
//!
//! Maps any number of history samples onto a fixed number of columns.
//! Works on a copied sample slice only; the stored history is never touched.

use chrono::{DateTime, Local};

use crate::runtime::history::HistorySample;

/// Load tier thresholds on the series maximum, in watts
pub const HIGH_LOAD_W: f64 = 5000.0;
pub const MEDIUM_LOAD_W: f64 = 3000.0;

/// Glyph for columns with no sample behind them
pub const NO_DATA_GLYPH: char = '·';

/// Relative fill band of one column
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Intensity {
    Empty,
    Low,
    MediumLow,
    MediumHigh,
    Full,
}

impl Intensity {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio.is_nan() || ratio <= 0.0 {
            Self::Empty
        } else if ratio < 0.25 {
            Self::Low
        } else if ratio < 0.5 {
            Self::MediumLow
        } else if ratio < 0.75 {
            Self::MediumHigh
        } else {
            Self::Full
        }
    }

    pub fn glyph(self) -> char {
        match self {
            Self::Empty => ' ',
            Self::Low => '▂',
            Self::MediumLow => '▄',
            Self::MediumHigh => '▆',
            Self::Full => '█',
        }
    }
}

/// Absolute load tier of the whole series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadTier {
    Low,
    Medium,
    High,
}

impl LoadTier {
    pub fn from_max(max: f64) -> Self {
        if max > HIGH_LOAD_W {
            Self::High
        } else if max > MEDIUM_LOAD_W {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// One display column
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bucket {
    NoData,
    Sample {
        value: f64,
        timestamp: DateTime<Local>,
        /// `value / scale_max`
        ratio: f64,
        intensity: Intensity,
    },
}

impl Bucket {
    pub fn glyph(&self) -> char {
        match self {
            Self::NoData => NO_DATA_GLYPH,
            Self::Sample { intensity, .. } => intensity.glyph(),
        }
    }

    pub fn ratio(&self) -> Option<f64> {
        match self {
            Self::NoData => None,
            Self::Sample { ratio, .. } => Some(*ratio),
        }
    }

    pub fn timestamp(&self) -> Option<DateTime<Local>> {
        match self {
            Self::NoData => None,
            Self::Sample { timestamp, .. } => Some(*timestamp),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResampledSeries {
    pub buckets: Vec<Bucket>,
    /// Divisor used for every ratio, never below 1
    pub scale_max: f64,
    pub load: LoadTier,
    pub sample_count: usize,
}

/// Index of the sample shown in column `i` of `width`
fn source_index(i: usize, len: usize, width: usize) -> usize {
    (i * len / width).min(len - 1)
}

/// Resample `samples` onto `width` columns
pub fn resample(samples: &[HistorySample], width: usize) -> ResampledSeries {
    let max = samples
        .iter()
        .map(|s| s.value)
        .fold(f64::NEG_INFINITY, f64::max);
    let max = if max.is_finite() { max } else { 0.0 };
    let scale_max = max.max(1.0);

    let buckets = if samples.is_empty() {
        vec![Bucket::NoData; width]
    } else {
        (0..width)
            .map(|i| {
                let sample = samples[source_index(i, samples.len(), width)];
                let ratio = sample.value / scale_max;
                Bucket::Sample {
                    value: sample.value,
                    timestamp: sample.timestamp,
                    ratio,
                    intensity: Intensity::from_ratio(ratio),
                }
            })
            .collect()
    };

    ResampledSeries {
        buckets,
        scale_max,
        load: LoadTier::from_max(max),
        sample_count: samples.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn series(values: &[f64]) -> Vec<HistorySample> {
        let base = Local::now();
        values
            .iter()
            .enumerate()
            .map(|(i, &value)| HistorySample {
                timestamp: base + Duration::seconds(i as i64 * 10),
                value,
            })
            .collect()
    }

    #[test]
    fn test_empty_history_gives_no_data_columns() {
        let out = resample(&[], 40);
        assert_eq!(out.buckets.len(), 40);
        assert!(out.buckets.iter().all(|b| *b == Bucket::NoData));
        assert_eq!(out.scale_max, 1.0);
        assert_eq!(out.load, LoadTier::Low);
        assert_eq!(out.buckets[0].glyph(), NO_DATA_GLYPH);
    }

    #[test]
    fn test_zero_width() {
        let out = resample(&series(&[1.0, 2.0]), 0);
        assert!(out.buckets.is_empty());
        assert_eq!(out.sample_count, 2);
    }

    #[test]
    fn test_is_deterministic() {
        let samples = series(&[100.0, 2500.0, 4000.0, 0.0, 3200.0, 900.0, 1800.0]);
        for width in [1, 3, 7, 20, 133] {
            assert_eq!(resample(&samples, width), resample(&samples, width));
        }
    }

    #[test]
    fn test_column_mapping() {
        // N=4, W=8: each sample spans two columns
        let samples = series(&[10.0, 20.0, 30.0, 40.0]);
        let out = resample(&samples, 8);
        let values: Vec<f64> = out
            .buckets
            .iter()
            .map(|b| match b {
                Bucket::Sample { value, .. } => *value,
                Bucket::NoData => f64::NAN,
            })
            .collect();
        assert_eq!(values, vec![10.0, 10.0, 20.0, 20.0, 30.0, 30.0, 40.0, 40.0]);

        // N=10, W=3: indices 0, 3, 6
        let samples = series(&(0..10).map(f64::from).collect::<Vec<_>>());
        let out = resample(&samples, 3);
        let values: Vec<f64> = out
            .buckets
            .iter()
            .filter_map(|b| b.ratio().map(|r| r * out.scale_max))
            .collect();
        assert_eq!(values, vec![0.0, 3.0, 6.0]);
    }

    #[test]
    fn test_zero_sample_differs_from_no_data() {
        let out = resample(&series(&[0.0]), 2);
        assert_ne!(out.buckets[0], Bucket::NoData);
        assert_eq!(out.buckets[0].glyph(), ' ');
    }

    #[test]
    fn test_intensity_bands() {
        assert_eq!(Intensity::from_ratio(-0.1), Intensity::Empty);
        assert_eq!(Intensity::from_ratio(0.0), Intensity::Empty);
        assert_eq!(Intensity::from_ratio(0.1), Intensity::Low);
        assert_eq!(Intensity::from_ratio(0.25), Intensity::MediumLow);
        assert_eq!(Intensity::from_ratio(0.5), Intensity::MediumHigh);
        assert_eq!(Intensity::from_ratio(0.75), Intensity::Full);
        assert_eq!(Intensity::from_ratio(1.0), Intensity::Full);

        let out = resample(&series(&[1000.0, 4000.0]), 2);
        assert_eq!(out.buckets[0].glyph(), '▄');
        assert_eq!(out.buckets[1].glyph(), '█');
    }

    #[test]
    fn test_small_values_scaled_against_one() {
        let out = resample(&series(&[0.5]), 1);
        assert_eq!(out.scale_max, 1.0);
        assert_eq!(out.buckets[0].ratio(), Some(0.5));
    }

    #[test]
    fn test_load_tier_uses_absolute_max() {
        assert_eq!(resample(&series(&[2000.0, 3000.0]), 4).load, LoadTier::Low);
        assert_eq!(resample(&series(&[3000.5]), 4).load, LoadTier::Medium);
        assert_eq!(resample(&series(&[100.0, 5200.0]), 4).load, LoadTier::High);
    }
}
