use crate::{
    sampler::{BlockSample, SampleSet},
    soundness::{HealthReport, Verdict},
    util::{rfc3339, wei_to_gwei},
};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use time::OffsetDateTime;

const BAR_SEGMENTS: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRecord {
    pub sample_count: usize,
    pub requested_count: u32,
    pub head_block: u64,
    pub avg_utilization_pct: f64,
    pub min_utilization_pct: f64,
    pub max_utilization_pct: f64,
    pub utilization_range_pct: f64,
    pub avg_base_fee_gwei: Option<f64>,
    pub verdict: Verdict,
    pub started_at: String,
    pub duration_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<BlockRecord>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRecord {
    pub number: u64,
    /// RFC 3339, UTC.
    pub timestamp: Option<String>,
    pub tx_count: usize,
    pub gas_used: u64,
    pub gas_limit: u64,
    pub utilization_pct: f64,
    pub base_fee_gwei: Option<f64>,
}

impl From<&BlockSample> for BlockRecord {
    fn from(s: &BlockSample) -> Self {
        Self {
            number: s.number,
            timestamp: s.timestamp.and_then(block_time),
            tx_count: s.tx_count,
            gas_used: s.gas_used,
            gas_limit: s.gas_limit,
            utilization_pct: s.utilization * 100.0,
            base_fee_gwei: s.base_fee_wei.map(wei_to_gwei),
        }
    }
}

impl ReportRecord {
    pub fn new(report: &HealthReport, blocks: Option<&SampleSet>) -> Self {
        Self {
            sample_count: report.sample_count,
            requested_count: report.requested_count,
            head_block: report.head_block,
            avg_utilization_pct: report.avg_utilization * 100.0,
            min_utilization_pct: report.min_utilization * 100.0,
            max_utilization_pct: report.max_utilization * 100.0,
            utilization_range_pct: report.utilization_range() * 100.0,
            avg_base_fee_gwei: report.avg_base_fee_gwei,
            verdict: report.verdict,
            started_at: rfc3339(report.started_at),
            duration_seconds: report.duration.as_secs_f64(),
            blocks: blocks.map(|set| set.samples().iter().map(BlockRecord::from).collect()),
        }
    }
}

pub fn render_text(record: &ReportRecord, endpoint: &str, with_bar: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "gas-health");
    let _ = writeln!(out, "  rpc:           {endpoint}");
    let _ = writeln!(out, "  started:       {}", record.started_at);
    let _ = writeln!(
        out,
        "  blocks:        {} sampled of {} requested (head {})",
        record.sample_count, record.requested_count, record.head_block
    );
    let _ = writeln!(
        out,
        "  utilization:   avg {:.1}%, range {:.1}% -> {:.1}%",
        record.avg_utilization_pct, record.min_utilization_pct, record.max_utilization_pct
    );
    match record.avg_base_fee_gwei {
        Some(fee) => {
            let _ = writeln!(out, "  base fee:      {fee:.3} Gwei");
        }
        None => {
            let _ = writeln!(out, "  base fee:      n/a (no fee market data)");
        }
    }
    let status = match record.verdict {
        Verdict::Stable => "stable gas pattern",
        Verdict::Unstable => "unstable gas behavior",
    };
    let _ = writeln!(out, "  soundness:     {status}");
    if with_bar {
        let _ = writeln!(
            out,
            "  bar:           |{}| ({:.1}%)",
            utilization_bar(record.avg_utilization_pct),
            record.avg_utilization_pct
        );
    }
    let _ = writeln!(out, "  duration:      {:.2}s", record.duration_seconds);
    out
}

fn block_time(unix: u64) -> Option<String> {
    let secs = i64::try_from(unix).ok()?;
    OffsetDateTime::from_unix_timestamp(secs).ok().map(rfc3339)
}

/// One filled segment per 5% of utilization, capped at the bar width.
pub fn utilization_bar(pct: f64) -> String {
    let filled = ((pct / 5.0).floor().max(0.0) as usize).min(BAR_SEGMENTS);
    let mut bar = "█".repeat(filled);
    bar.push_str(&"-".repeat(BAR_SEGMENTS - filled));
    bar
}
