//! Means and proportions with confidence intervals.

use super::distributions::{normal_quantile, student_t_quantile};
use serde::{Deserialize, Serialize};

/// Interval construction for a binomial proportion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalMethod {
    /// Normal approximation, `p ± z·√(p(1−p)/n)`, clamped to [0, 1].
    #[default]
    Wald,
    /// Wilson score interval.
    Wilson,
}

impl IntervalMethod {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            IntervalMethod::Wald => "wald",
            IntervalMethod::Wilson => "wilson",
        }
    }
}

/// Two-sided normal critical value for a confidence level, e.g. 1.96 for 0.95.
#[must_use]
pub fn critical_z(confidence: f64) -> f64 {
    normal_quantile(1.0 - (1.0 - confidence) / 2.0)
}

/// Two-sided t critical value for a confidence level.
#[must_use]
pub fn critical_t(confidence: f64, df: f64) -> f64 {
    student_t_quantile(1.0 - (1.0 - confidence) / 2.0, df)
}

/// Arithmetic mean; `None` for an empty slice.
#[must_use]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample variance (n − 1 denominator); `None` below two values.
#[must_use]
pub fn sample_variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|x| (x - m).powi(2)).sum();
    Some(ss / (values.len() - 1) as f64)
}

/// Percentile of already-sorted values, linear interpolation between ranks.
#[must_use]
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    match sorted.len() {
        0 => None,
        1 => Some(sorted[0]),
        len => {
            let idx = p.clamp(0.0, 1.0) * (len - 1) as f64;
            let lo = idx.floor() as usize;
            let hi = (lo + 1).min(len - 1);
            let frac = idx - lo as f64;
            Some(sorted[lo] * (1.0 - frac) + sorted[hi] * frac)
        }
    }
}

/// Median of unsorted values.
#[must_use]
pub fn median(values: &[f64]) -> Option<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    percentile(&sorted, 0.5)
}

// =============================================================================
// MEAN ESTIMATE
// =============================================================================

/// Sample mean with a t-based confidence interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeanEstimate {
    pub n: usize,
    pub mean: f64,
    /// Sample standard deviation (n − 1). Zero when n = 1.
    pub sd: f64,
    /// Standard error of the mean.
    pub se: f64,
    pub median: f64,
    pub ci_low: f64,
    pub ci_high: f64,
    pub confidence: f64,
}

impl MeanEstimate {
    /// Estimate from raw values. `None` for an empty slice; a single value
    /// yields a degenerate interval at the value itself.
    #[must_use]
    pub fn from_values(values: &[f64], confidence: f64) -> Option<Self> {
        let m = mean(values)?;
        let n = values.len();
        let sd = sample_variance(values).map_or(0.0, f64::sqrt);
        let se = sd / (n as f64).sqrt();
        let half = if n >= 2 && se > 0.0 {
            critical_t(confidence, (n - 1) as f64) * se
        } else {
            0.0
        };

        Some(Self {
            n,
            mean: m,
            sd,
            se,
            median: median(values).unwrap_or(m),
            ci_low: m - half,
            ci_high: m + half,
            confidence,
        })
    }
}

// =============================================================================
// PROPORTION ESTIMATE
// =============================================================================

/// Binomial proportion with a confidence interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProportionEstimate {
    pub successes: usize,
    pub n: usize,
    pub proportion: f64,
    pub ci_low: f64,
    pub ci_high: f64,
    pub confidence: f64,
    pub method: IntervalMethod,
}

impl ProportionEstimate {
    /// Estimate from counts. `None` when `n` is zero or `successes > n`.
    #[must_use]
    pub fn from_counts(
        successes: usize,
        n: usize,
        confidence: f64,
        method: IntervalMethod,
    ) -> Option<Self> {
        if n == 0 || successes > n {
            return None;
        }
        let nf = n as f64;
        let p = successes as f64 / nf;
        let z = critical_z(confidence);

        let (low, high) = match method {
            IntervalMethod::Wald => {
                let half = z * (p * (1.0 - p) / nf).sqrt();
                (p - half, p + half)
            }
            IntervalMethod::Wilson => {
                let z2 = z * z;
                let denom = 1.0 + z2 / nf;
                let center = (p + z2 / (2.0 * nf)) / denom;
                let half = z / denom * (p * (1.0 - p) / nf + z2 / (4.0 * nf * nf)).sqrt();
                (center - half, center + half)
            }
        };

        Some(Self {
            successes,
            n,
            proportion: p,
            ci_low: low.clamp(0.0, 1.0),
            ci_high: high.clamp(0.0, 1.0),
            confidence,
            method,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
