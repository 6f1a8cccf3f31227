use crate::{sampler::SampleSet, util::wei_to_gwei};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use time::OffsetDateTime;

/// The window average must be strictly above this to count as stable.
pub const MIN_AVG_UTILIZATION: f64 = 0.50;
/// `max - min` utilization must be strictly below this to count as stable.
pub const MAX_UTILIZATION_RANGE: f64 = 0.40;
/// Resolution the rule is evaluated at. Ratio and subtraction rounding below this must not
/// move a value across a threshold (0.95 - 0.55 is 0.3999999999999999 in f64).
pub const RULE_PRECISION: f64 = 1e9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Stable,
    Unstable,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Stable => "stable",
            Verdict::Unstable => "unstable",
        }
    }

    pub fn exit_code(self) -> i32 {
        match self {
            Verdict::Stable => 0,
            Verdict::Unstable => 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HealthReport {
    pub sample_count: usize,
    pub requested_count: u32,
    pub head_block: u64,
    pub avg_utilization: f64,
    pub min_utilization: f64,
    pub max_utilization: f64,
    pub avg_base_fee_gwei: Option<f64>,
    pub verdict: Verdict,
    pub started_at: OffsetDateTime,
    pub duration: Duration,
}

impl HealthReport {
    pub fn utilization_range(&self) -> f64 {
        self.max_utilization - self.min_utilization
    }
}

/// Fractions, not percentages. Both comparisons are strict.
pub fn classify(avg_utilization: f64, utilization_range: f64) -> Verdict {
    let avg = snap(avg_utilization);
    let range = snap(utilization_range);
    if avg > MIN_AVG_UTILIZATION && range < MAX_UTILIZATION_RANGE {
        Verdict::Stable
    } else {
        Verdict::Unstable
    }
}

fn snap(value: f64) -> f64 {
    (value * RULE_PRECISION).round() / RULE_PRECISION
}

pub fn evaluate(set: &SampleSet, started_at: OffsetDateTime, duration: Duration) -> HealthReport {
    let samples = set.samples();

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    for s in samples {
        min = min.min(s.utilization);
        max = max.max(s.utilization);
        sum += s.utilization;
    }
    // Summation error can push the mean a ulp outside the observed range.
    let avg = (sum / samples.len() as f64).clamp(min, max);

    let fees: Vec<f64> = samples
        .iter()
        .filter_map(|s| s.base_fee_wei)
        .map(wei_to_gwei)
        .collect();
    let avg_base_fee_gwei = if fees.is_empty() {
        None
    } else {
        Some(fees.iter().sum::<f64>() / fees.len() as f64)
    };

    HealthReport {
        sample_count: samples.len(),
        requested_count: set.requested(),
        head_block: set.head(),
        avg_utilization: avg,
        min_utilization: min,
        max_utilization: max,
        avg_base_fee_gwei,
        verdict: classify(avg, max - min),
        started_at,
        duration,
    }
}
