use crate::core::pipeline::{CheckPipeline, RunDecision};
use crate::core::{ConfigProvider, ObservationSource, Pipeline, Storage};
use crate::utils::error::Result;
use crate::utils::monitor::RunMonitor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Tables were written; holds the output location.
    Processed(String),
    Skipped(RunDecision),
}

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: RunMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: RunMonitor::new(monitor_enabled),
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub async fn run(&self) -> Result<String> {
        tracing::info!("Starting check run...");
        self.monitor.log_stats("start");

        tracing::info!("Extracting observations...");
        let observations = self.pipeline.extract().await?;
        tracing::info!("Extracted {} observations", observations.len());
        self.monitor.log_stats("extract");

        tracing::info!("Checking observations...");
        let result = self.pipeline.transform(observations).await?;
        tracing::info!(
            "Checked {} observations, {} flagged",
            result.summary.records,
            result.summary.flagged_records
        );
        self.monitor.log_stats("transform");

        tracing::info!("Saving tables...");
        let output_path = self.pipeline.load(result).await?;
        tracing::info!("Output saved to: {}", output_path);
        self.monitor.log_stats("load");
        self.monitor.log_final_stats();

        Ok(output_path)
    }
}

impl<S: Storage, C: ConfigProvider, Src: ObservationSource> EtlEngine<CheckPipeline<S, C, Src>> {
    /// Runs unless the selection is already stored or still awaiting upload.
    pub async fn run_unless_done(&self, forced: bool) -> Result<RunOutcome> {
        match self.pipeline.decide(forced).await? {
            RunDecision::Process => Ok(RunOutcome::Processed(self.run().await?)),
            skipped => {
                tracing::info!("Skipping run: {:?}", skipped);
                Ok(RunOutcome::Skipped(skipped))
            }
        }
    }
}
