//! # Inference Module
//!
//! Two-sample tests of the expert sample against published summary
//! statistics, plus multiple-testing correction.
//!
//! The comparison sample is only known through its published summaries
//! (proportion and n, or mean, sd and n), so every test works from
//! summary statistics on both sides:
//! - Expert estimate is reduced to the same summary shape
//! - Test is computed, or explicitly skipped with a reason
//! - Adjusted p-values decide significance

use crate::stats::{
    MeanEstimate, ProportionEstimate, critical_t, critical_z, normal_two_sided_p,
    student_t_two_sided_p,
};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

// =============================================================================
// PUBLISHED SUMMARY STATISTICS
// =============================================================================

/// A proportion and the sample size it was computed on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProportionSummary {
    /// In [0, 1].
    pub proportion: f64,
    pub n: u64,
}

impl ProportionSummary {
    #[must_use]
    pub fn new(proportion: f64, n: u64) -> Self {
        Self { proportion, n }
    }

    fn validate(&self, what: &str) -> Result<()> {
        if !(0.0..=1.0).contains(&self.proportion) {
            return Err(Error::Reference(format!(
                "{}: proportion must be in [0, 1], got {}",
                what, self.proportion
            )));
        }
        if self.n == 0 {
            return Err(Error::Reference(format!("{}: n must be at least 1", what)));
        }
        Ok(())
    }
}

impl From<&ProportionEstimate> for ProportionSummary {
    fn from(est: &ProportionEstimate) -> Self {
        Self::new(est.proportion, est.n as u64)
    }
}

/// A mean with its standard deviation and sample size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeanSummary {
    pub mean: f64,
    pub sd: f64,
    pub n: u64,
}

impl MeanSummary {
    #[must_use]
    pub fn new(mean: f64, sd: f64, n: u64) -> Self {
        Self { mean, sd, n }
    }

    fn validate(&self, what: &str) -> Result<()> {
        if !self.mean.is_finite() {
            return Err(Error::Reference(format!("{}: mean is not finite", what)));
        }
        if !(self.sd.is_finite() && self.sd >= 0.0) {
            return Err(Error::Reference(format!(
                "{}: sd must be non-negative, got {}",
                what, self.sd
            )));
        }
        if self.n == 0 {
            return Err(Error::Reference(format!("{}: n must be at least 1", what)));
        }
        Ok(())
    }
}

impl From<&MeanEstimate> for MeanSummary {
    fn from(est: &MeanEstimate) -> Self {
        Self::new(est.mean, est.sd, est.n as u64)
    }
}

/// Published statistics for one vignette. Any measure may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceVignette {
    pub redistributing: Option<ProportionSummary>,
    pub share: Option<MeanSummary>,
    pub fairness: Option<MeanSummary>,
}

/// Published statistics of the comparison sample, keyed by vignette id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceSummary {
    /// Where the numbers come from (study, table).
    pub source: String,
    pub vignettes: BTreeMap<String, ReferenceVignette>,
}

impl ReferenceSummary {
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            vignettes: BTreeMap::new(),
        }
    }

    /// Parse from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let reference: Self = serde_json::from_str(text)?;
        reference.validate()?;
        Ok(reference)
    }

    /// Check every published number is usable.
    pub fn validate(&self) -> Result<()> {
        for (id, v) in &self.vignettes {
            if let Some(p) = &v.redistributing {
                p.validate(&format!("{}.redistributing", id))?;
            }
            if let Some(m) = &v.share {
                m.validate(&format!("{}.share", id))?;
            }
            if let Some(m) = &v.fairness {
                m.validate(&format!("{}.fairness", id))?;
            }
        }
        Ok(())
    }
}

// =============================================================================
// TEST RESULTS
// =============================================================================

/// Which quantity a comparison is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    /// Share of respondents at or above the redistribution threshold.
    Redistributing,
    /// Mean allocated share.
    Share,
    /// Mean fairness rating.
    Fairness,
}

impl Measure {
    pub const ALL: [Measure; 3] = [Measure::Redistributing, Measure::Share, Measure::Fairness];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Measure::Redistributing => "redistributing",
            Measure::Share => "share",
            Measure::Fairness => "fairness",
        }
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which test produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    TwoProportionZ,
    WelchT,
}

impl TestKind {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            TestKind::TwoProportionZ => "two-proportion z",
            TestKind::WelchT => "Welch t",
        }
    }

    /// Name of the standardized effect size reported with this test.
    #[must_use]
    pub fn effect_size_name(self) -> &'static str {
        match self {
            TestKind::TwoProportionZ => "cohen_h",
            TestKind::WelchT => "cohen_d",
        }
    }
}

/// A computed two-sample comparison (expert minus reference).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub kind: TestKind,
    pub expert_estimate: f64,
    pub expert_n: u64,
    pub reference_estimate: f64,
    pub reference_n: u64,
    pub difference: f64,
    /// Confidence interval of the difference.
    pub ci_low: f64,
    pub ci_high: f64,
    /// z or t statistic.
    pub statistic: f64,
    /// Welch-Satterthwaite degrees of freedom; `None` for z tests.
    pub df: Option<f64>,
    /// Unadjusted two-sided p-value.
    pub p_value: f64,
    /// Cohen's h or d; `None` when undefined.
    pub effect_size: Option<f64>,
}

/// Either a computed result or the reason it could not be computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TestOutcome {
    Computed(TestResult),
    Skipped { reason: String },
}

impl TestOutcome {
    fn skipped(reason: impl Into<String>) -> Self {
        TestOutcome::Skipped {
            reason: reason.into(),
        }
    }

    /// The result, if computed.
    #[must_use]
    pub fn result(&self) -> Option<&TestResult> {
        match self {
            TestOutcome::Computed(r) => Some(r),
            TestOutcome::Skipped { .. } => None,
        }
    }
}

// =============================================================================
// TESTS FROM SUMMARY STATISTICS
// =============================================================================

/// Two-proportion z-test, H0: p_expert == p_reference.
///
/// The statistic uses the pooled standard error; the interval of the
/// difference uses the unpooled one.
#[must_use]
pub fn two_proportion_z_test(
    expert: &ProportionSummary,
    reference: &ProportionSummary,
    confidence: f64,
) -> TestOutcome {
    if expert.n == 0 || reference.n == 0 {
        return TestOutcome::skipped("empty sample");
    }
    let (p1, n1) = (expert.proportion, expert.n as f64);
    let (p2, n2) = (reference.proportion, reference.n as f64);

    let pooled = (p1 * n1 + p2 * n2) / (n1 + n2);
    let se_pooled = (pooled * (1.0 - pooled) * (1.0 / n1 + 1.0 / n2)).sqrt();
    if !(se_pooled > 0.0) {
        return TestOutcome::skipped("pooled proportion is 0 or 1; standard error is zero");
    }

    let diff = p1 - p2;
    let z = diff / se_pooled;
    let se_unpooled = (p1 * (1.0 - p1) / n1 + p2 * (1.0 - p2) / n2).sqrt();
    let half = critical_z(confidence) * se_unpooled;
    let cohen_h = 2.0 * p1.sqrt().asin() - 2.0 * p2.sqrt().asin();

    TestOutcome::Computed(TestResult {
        kind: TestKind::TwoProportionZ,
        expert_estimate: p1,
        expert_n: expert.n,
        reference_estimate: p2,
        reference_n: reference.n,
        difference: diff,
        ci_low: diff - half,
        ci_high: diff + half,
        statistic: z,
        df: None,
        p_value: normal_two_sided_p(z),
        effect_size: Some(cohen_h),
    })
}

/// Welch's t-test from summary statistics, H0: mean_expert == mean_reference.
#[must_use]
pub fn welch_t_test_summary(
    expert: &MeanSummary,
    reference: &MeanSummary,
    confidence: f64,
) -> TestOutcome {
    if expert.n < 2 || reference.n < 2 {
        return TestOutcome::skipped("fewer than two observations in a sample");
    }
    let (n1, n2) = (expert.n as f64, reference.n as f64);
    let v1 = expert.sd.powi(2) / n1;
    let v2 = reference.sd.powi(2) / n2;
    let se = (v1 + v2).sqrt();
    if !(se > 0.0) {
        return TestOutcome::skipped("both samples have zero variance");
    }

    let diff = expert.mean - reference.mean;
    let t = diff / se;

    // Welch-Satterthwaite degrees of freedom
    let df = (v1 + v2).powi(2) / (v1.powi(2) / (n1 - 1.0) + v2.powi(2) / (n2 - 1.0));
    let half = critical_t(confidence, df) * se;

    let pooled_sd = (((n1 - 1.0) * expert.sd.powi(2) + (n2 - 1.0) * reference.sd.powi(2))
        / (n1 + n2 - 2.0))
        .sqrt();
    let cohen_d = (pooled_sd > 0.0).then(|| diff / pooled_sd);

    TestOutcome::Computed(TestResult {
        kind: TestKind::WelchT,
        expert_estimate: expert.mean,
        expert_n: expert.n,
        reference_estimate: reference.mean,
        reference_n: reference.n,
        difference: diff,
        ci_low: diff - half,
        ci_high: diff + half,
        statistic: t,
        df: Some(df),
        p_value: student_t_two_sided_p(t, df),
        effect_size: cohen_d,
    })
}

// =============================================================================
// MULTIPLE-TESTING CORRECTION
// =============================================================================

/// Family-wise / false-discovery correction applied across all tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Adjustment {
    None,
    Bonferroni,
    #[default]
    Holm,
    BenjaminiHochberg,
}

impl Adjustment {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Adjustment::None => "none",
            Adjustment::Bonferroni => "bonferroni",
            Adjustment::Holm => "holm",
            Adjustment::BenjaminiHochberg => "benjamini_hochberg",
        }
    }
}

impl fmt::Display for Adjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Adjust a family of p-values. Output is in input order, each value in
/// [raw p, 1].
#[must_use]
pub fn adjust_p_values(p_values: &[f64], method: Adjustment) -> Vec<f64> {
    let m = p_values.len();
    if m == 0 {
        return Vec::new();
    }
    let mf = m as f64;

    // Indices sorted by ascending p.
    let mut order: Vec<usize> = (0..m).collect();
    order.sort_by(|&a, &b| {
        p_values[a]
            .partial_cmp(&p_values[b])
            .unwrap_or(Ordering::Equal)
    });

    let mut adjusted = vec![1.0; m];
    match method {
        Adjustment::None => adjusted.copy_from_slice(p_values),
        Adjustment::Bonferroni => {
            for (adj, &p) in adjusted.iter_mut().zip(p_values) {
                *adj = (p * mf).min(1.0);
            }
        }
        Adjustment::Holm => {
            // Step-down: running maximum over ascending p.
            let mut running = 0.0_f64;
            for (rank, &i) in order.iter().enumerate() {
                let value = ((mf - rank as f64) * p_values[i]).min(1.0);
                running = running.max(value);
                adjusted[i] = running;
            }
        }
        Adjustment::BenjaminiHochberg => {
            // Step-up: running minimum over descending p.
            let mut running = 1.0_f64;
            for (rank, &i) in order.iter().enumerate().rev() {
                let value = (p_values[i] * mf / (rank as f64 + 1.0)).min(1.0);
                running = running.min(value);
                adjusted[i] = running;
            }
        }
    }
    adjusted
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn welch_from_summaries() {
        let expert = MeanSummary::new(25.0, 10.0, 40);
        let reference = MeanSummary::new(20.0, 12.0, 1000);
        let outcome = welch_t_test_summary(&expert, &reference, 0.95);
        let r = outcome.result().unwrap();

        assert_eq!(r.kind, TestKind::WelchT);
        assert!(close(r.difference, 5.0, 1e-12));
        assert!(close(r.statistic, 3.074_958_6, 1e-6));
        assert!(close(r.df.unwrap(), 43.616_543, 1e-5));
        assert!(close(r.p_value, 0.003_626_18, 1e-6));
        assert!(close(r.ci_low, 1.722_121_6, 1e-5));
        assert!(close(r.ci_high, 8.277_878_4, 1e-5));
        assert!(close(r.effect_size.unwrap(), 0.419_079_2, 1e-6));
    }

    #[test]
    fn welch_skips_degenerate_inputs() {
        let one = MeanSummary::new(10.0, 0.0, 1);
        let many = MeanSummary::new(12.0, 3.0, 100);
        assert!(matches!(
            welch_t_test_summary(&one, &many, 0.95),
            TestOutcome::Skipped { .. }
        ));

        let flat_a = MeanSummary::new(10.0, 0.0, 20);
        let flat_b = MeanSummary::new(12.0, 0.0, 20);
        assert!(welch_t_test_summary(&flat_a, &flat_b, 0.95).result().is_none());
    }

    #[test]
    fn two_proportion_from_summaries() {
        let expert = ProportionSummary::new(0.6, 50);
        let reference = ProportionSummary::new(0.45, 1000);
        let r = two_proportion_z_test(&expert, &reference, 0.95);
        let r = r.result().unwrap();

        assert_eq!(r.kind, TestKind::TwoProportionZ);
        assert!(r.df.is_none());
        assert!(close(r.statistic, 2.077_843_6, 1e-6));
        assert!(close(r.p_value, 0.037_723_8, 1e-6));
        assert!(close(r.ci_low, 0.010_752_9, 1e-6));
        assert!(close(r.ci_high, 0.289_247_1, 1e-6));
        assert!(close(r.effect_size.unwrap(), 0.301_525_3, 1e-6));
    }

    #[test]
    fn two_proportion_skips_zero_variance() {
        let a = ProportionSummary::new(1.0, 30);
        let b = ProportionSummary::new(1.0, 300);
        assert!(matches!(
            two_proportion_z_test(&a, &b, 0.95),
            TestOutcome::Skipped { .. }
        ));
    }

    #[test]
    fn identical_samples_are_not_different() {
        let a = MeanSummary::new(15.0, 5.0, 80);
        let r = welch_t_test_summary(&a, &a, 0.95);
        let r = r.result().unwrap();
        assert!(close(r.statistic, 0.0, 1e-12));
        assert!(close(r.p_value, 1.0, 1e-9));
    }

    #[test]
    fn reference_validation() {
        let mut reference = ReferenceSummary::new("test");
        reference.vignettes.insert(
            "V1".to_string(),
            ReferenceVignette {
                redistributing: Some(ProportionSummary::new(45.0, 1000)),
                ..ReferenceVignette::default()
            },
        );
        assert!(matches!(reference.validate(), Err(Error::Reference(_))));

        let text = r#"{
            "source": "General population survey",
            "vignettes": {
                "V1": {
                    "redistributing": { "proportion": 0.45, "n": 1000 },
                    "share": { "mean": 18.2, "sd": 9.5, "n": 1000 }
                }
            }
        }"#;
        let parsed = ReferenceSummary::from_json(text).unwrap();
        assert_eq!(parsed.vignettes.len(), 1);
        assert!(parsed.vignettes["V1"].fairness.is_none());

        let bad = r#"{ "vignettes": { "V1": { "share": { "mean": 1.0, "sd": -1.0, "n": 5 } } } }"#;
        assert!(ReferenceSummary::from_json(bad).is_err());
    }

    #[test]
    fn bonferroni_and_holm() {
        let p = [0.01, 0.04, 0.03, 0.5];
        let bonf = adjust_p_values(&p, Adjustment::Bonferroni);
        for (got, want) in bonf.iter().zip([0.04, 0.16, 0.12, 1.0]) {
            assert!(close(*got, want, 1e-12));
        }

        let holm = adjust_p_values(&p, Adjustment::Holm);
        // sorted: 0.01*4, 0.03*3, 0.04*2, 0.5*1 with running max
        assert!(close(holm[0], 0.04, 1e-12));
        assert!(close(holm[2], 0.09, 1e-12));
        assert!(close(holm[1], 0.09, 1e-12));
        assert!(close(holm[3], 0.5, 1e-12));
    }

    #[test]
    fn benjamini_hochberg() {
        let p = [0.01, 0.04, 0.03, 0.5];
        let bh = adjust_p_values(&p, Adjustment::BenjaminiHochberg);
        // sorted: 0.01*4/1=0.04, 0.03*4/2=0.06, 0.04*4/3=0.0533, 0.5
        // step-up min from the top: 0.5, 0.0533, 0.0533, 0.04
        assert!(close(bh[0], 0.04, 1e-12));
        assert!(close(bh[2], 0.04 * 4.0 / 3.0, 1e-12));
        assert!(close(bh[1], 0.04 * 4.0 / 3.0, 1e-12));
        assert!(close(bh[3], 0.5, 1e-12));
    }

    #[test]
    fn adjustment_none_and_empty() {
        assert!(adjust_p_values(&[], Adjustment::Holm).is_empty());
        assert_eq!(adjust_p_values(&[0.2, 0.3], Adjustment::None), vec![0.2, 0.3]);
    }

    proptest! {
        #[test]
        fn adjusted_p_values_are_bounded(ps in prop::collection::vec(0.0f64..=1.0, 1..30)) {
            for method in [Adjustment::Bonferroni, Adjustment::Holm, Adjustment::BenjaminiHochberg] {
                let adj = adjust_p_values(&ps, method);
                prop_assert_eq!(adj.len(), ps.len());
                for (a, p) in adj.iter().zip(&ps) {
                    prop_assert!(*a >= *p - 1e-12);
                    prop_assert!(*a <= 1.0);
                }
            }
        }

        #[test]
        fn holm_preserves_order(ps in prop::collection::vec(0.0f64..=1.0, 2..30)) {
            let adj = adjust_p_values(&ps, Adjustment::Holm);
            for i in 0..ps.len() {
                for j in 0..ps.len() {
                    if ps[i] < ps[j] {
                        prop_assert!(adj[i] <= adj[j] + 1e-12);
                    }
                }
            }
        }

        #[test]
        fn holm_never_exceeds_bonferroni(ps in prop::collection::vec(0.0f64..=1.0, 1..30)) {
            let holm = adjust_p_values(&ps, Adjustment::Holm);
            let bonf = adjust_p_values(&ps, Adjustment::Bonferroni);
            for (h, b) in holm.iter().zip(&bonf) {
                prop_assert!(*h <= *b + 1e-12);
            }
        }

        #[test]
        fn welch_p_value_in_unit_interval(
            m1 in 0.0f64..100.0, s1 in 0.1f64..30.0, n1 in 2u64..500,
            m2 in 0.0f64..100.0, s2 in 0.1f64..30.0, n2 in 2u64..5000,
        ) {
            let outcome = welch_t_test_summary(
                &MeanSummary::new(m1, s1, n1),
                &MeanSummary::new(m2, s2, n2),
                0.95,
            );
            let r = outcome.result();
            prop_assert!(r.is_some());
            let r = r.unwrap();
            prop_assert!((0.0..=1.0).contains(&r.p_value));
            prop_assert!(r.ci_low <= r.difference && r.difference <= r.ci_high);
        }
    }
}
