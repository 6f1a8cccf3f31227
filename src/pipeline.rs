use crate::{
    config::Config,
    error::HealthError,
    rpc::ChainClient,
    sampler::{BlockSampler, SampleSet},
    soundness::{self, HealthReport},
};
use std::time::Instant;
use time::OffsetDateTime;
use tracing::info;

pub struct Pipeline<'a, C: ChainClient> {
    cfg: Config,
    client: &'a C,
}

#[derive(Debug)]
pub struct RunOutput {
    pub report: HealthReport,
    pub samples: SampleSet,
}

impl<'a, C: ChainClient> Pipeline<'a, C> {
    pub fn new(cfg: &Config, client: &'a C) -> Self {
        Self {
            cfg: cfg.clone(),
            client,
        }
    }

    fn sampler(&self) -> BlockSampler<'_> {
        BlockSampler::new(
            self.client,
            self.cfg.rpc.max_parallel_requests,
            self.cfg.limits.max_block_count,
        )
    }

    /// Samples without evaluating.
    pub fn sample(&self, count: i64) -> Result<SampleSet, HealthError> {
        self.sampler().sample(count)
    }

    pub fn run(&self, count: i64) -> Result<RunOutput, HealthError> {
        let started_at = OffsetDateTime::now_utc();
        let started = Instant::now();

        let samples = self.sampler().sample(count)?;
        let report = soundness::evaluate(&samples, started_at, started.elapsed());

        info!(
            "verdict={} samples={}/{} avg_util={:.4} range={:.4} skipped={}",
            report.verdict.as_str(),
            report.sample_count,
            report.requested_count,
            report.avg_utilization,
            report.utilization_range(),
            samples.skipped()
        );

        Ok(RunOutput { report, samples })
    }
}
