use crate::core::checks::FlaggingEngine;
use crate::core::export;
use crate::core::normalize::Normalizer;
use crate::core::{ConfigProvider, ObservationSource, Pipeline, Storage};
use crate::domain::catalog::ExpectationCatalog;
use crate::domain::model::{
    CheckSummary, CheckedObservation, Observation, RunSelection, Station, TransformResult,
};
use crate::utils::error::Result;

/// What a scheduled run should do for its selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunDecision {
    Process,
    /// Both raw tables are already in storage.
    AlreadyProcessed,
    /// The source has not published every station yet; holds the ones it has.
    AwaitingUpload(Vec<Station>),
}

pub struct CheckPipeline<S: Storage, C: ConfigProvider, Src: ObservationSource> {
    storage: S,
    config: C,
    source: Src,
}

impl<S: Storage, C: ConfigProvider, Src: ObservationSource> CheckPipeline<S, C, Src> {
    pub fn new(storage: S, config: C, source: Src) -> Self {
        Self {
            storage,
            config,
            source,
        }
    }

    fn table_path(&self, folder: &str, station: Station) -> String {
        format!(
            "{}/{}_{}.csv",
            folder,
            self.config.selection().file_stem(),
            station.file_suffix()
        )
    }

    pub async fn already_processed(&self) -> Result<bool> {
        for station in Station::ALL {
            if !self.storage.exists(&self.table_path("raw", station)).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Storage is consulted first; `forced` only overrides a missing upload.
    pub async fn decide(&self, forced: bool) -> Result<RunDecision> {
        if self.already_processed().await? {
            return Ok(RunDecision::AlreadyProcessed);
        }

        let selection = self.config.selection();
        if matches!(selection, RunSelection::Season { .. }) {
            return Ok(RunDecision::Process);
        }

        let available = self.source.available_stations(&selection).await?;
        if available.len() < Station::ALL.len() && !forced {
            tracing::warn!(
                "{} of {} stations uploaded for {}",
                available.len(),
                Station::ALL.len(),
                selection.file_stem()
            );
            return Ok(RunDecision::AwaitingUpload(available));
        }
        Ok(RunDecision::Process)
    }

    fn catalog(&self) -> Result<ExpectationCatalog> {
        match self.config.catalog_file() {
            Some(path) => {
                tracing::debug!("Loading expectation catalog from {}", path);
                ExpectationCatalog::from_file(path)
            }
            None => Ok(ExpectationCatalog::builtin()),
        }
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider, Src: ObservationSource> Pipeline for CheckPipeline<S, C, Src> {
    async fn extract(&self) -> Result<Vec<Observation>> {
        let selection = self.config.selection();
        tracing::debug!("Fetching export for {}", selection.file_stem());
        let export = self.source.fetch_export(&selection).await?;

        Normalizer::new(selection)
            .with_sessions(self.config.count_sessions().to_vec())
            .parse_export(&export)
    }

    async fn transform(&self, data: Vec<Observation>) -> Result<TransformResult> {
        let engine = FlaggingEngine::new(self.catalog()?, self.config.check_parameters()?);
        let checked = engine.annotate(data)?;
        let summary = CheckSummary::from_checked(&checked);
        Ok(TransformResult { checked, summary })
    }

    async fn load(&self, result: TransformResult) -> Result<String> {
        let stem = self.config.selection().file_stem();
        let mut bundle = Vec::new();

        let observations: Vec<&Observation> = result.checked.iter().map(|c| &c.observation).collect();
        let (raw_s1, raw_s2) = export::split_by_station(&observations, |o| o.station);
        let (checked_s1, checked_s2) =
            export::split_by_station(&result.checked, |c: &CheckedObservation| c.observation.station);

        for (station, raw, checked) in [
            (Station::Sakhalvasho, raw_s1, checked_s1),
            (Station::Shuamta, raw_s2, checked_s2),
        ] {
            let raw: Vec<&Observation> = raw.into_iter().copied().collect();
            self.storage
                .write_file(
                    &self.table_path("raw", station),
                    &export::write_observations(&raw)?,
                )
                .await?;

            let annotated = export::write_checked(&checked)?;
            let path = self.table_path("inprogress", station);
            self.storage.write_file(&path, &annotated).await?;
            tracing::debug!("Wrote {} ({} records)", path, checked.len());
            bundle.push((format!("{}_{}.csv", stem, station.file_suffix()), annotated));
        }

        let summary = export::summary_json(&result.summary)?;
        self.storage
            .write_file(&format!("{}_summary.json", stem), &summary)
            .await?;

        if self.config.write_bundle() {
            bundle.push((format!("{}_summary.json", stem), summary));
            let zip_data = export::bundle_zip(&bundle)?;
            tracing::debug!("Writing bundle ({} bytes)", zip_data.len());
            self.storage
                .write_file(&format!("{}_checked.zip", stem), &zip_data)
                .await?;
        }

        Ok(format!("{}/inprogress", self.config.output_path()))
    }
}
