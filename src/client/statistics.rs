//! Sample statistics shared by the window and lifetime views.
//!
//! Jitter here is the mean absolute deviation of each sample from the
//! sample mean.

/// min/avg/max plus jitter over one sample set
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SampleStats {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
    pub jitter: f64,
}

impl SampleStats {
    /// Summarise a sample; an empty sample yields all zeros
    pub fn from_samples(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let (min, max) = values
            .iter()
            .fold((f64::MAX, f64::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let avg = mean(values);

        Self {
            min,
            avg,
            max,
            jitter: mean_abs_deviation(values, avg),
        }
    }
}

/// Arithmetic mean, zero for an empty sample
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Mean of `|x - center|` over the sample
pub fn mean_abs_deviation(values: &[f64], center: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|v| (v - center).abs()).sum::<f64>() / values.len() as f64
}

/// Percentile `p` in `[0, 100]` of an ascending-sorted sample.
///
/// Linear interpolation between the order statistics at `floor(pos)` and
/// `ceil(pos)` where `pos = p / 100 * (n - 1)`.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    let Some((&first, &last)) = sorted.first().zip(sorted.last()) else {
        return 0.0;
    };
    if p <= 0.0 {
        return first;
    }
    if p >= 100.0 {
        return last;
    }

    let pos = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let weight = pos - lower as f64;
    sorted[lower] * (1.0 - weight) + sorted[upper] * weight
}

/// Sort a copy of `values` and return the 50th, 90th and 99th percentiles
pub fn p50_p90_p99(values: &[f64]) -> (f64, f64, f64) {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    (
        percentile(&sorted, 50.0),
        percentile(&sorted, 90.0),
        percentile(&sorted, 99.0),
    )
}
