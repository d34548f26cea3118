use crate::core::checks::CheckParameters;
use crate::core::normalize::CountSession;
use crate::domain::model::{Observation, RunSelection, Station, TransformResult};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn exists(&self, path: &str) -> impl std::future::Future<Output = Result<bool>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn output_path(&self) -> &str;
    fn selection(&self) -> RunSelection;
    fn check_parameters(&self) -> Result<CheckParameters>;
    /// Path to a TOML expectation catalog; `None` uses the built-in table.
    fn catalog_file(&self) -> Option<&str>;
    fn write_bundle(&self) -> bool {
        false
    }
    /// Opening hours added as `START`/`END` rows on single-day runs.
    fn count_sessions(&self) -> &[CountSession] {
        &[]
    }
}

/// Where raw export text comes from (Trektellen, a local file, a fixture).
#[async_trait]
pub trait ObservationSource: Send + Sync {
    /// Stations that have published counts for the selected day.
    async fn available_stations(&self, selection: &RunSelection) -> Result<Vec<Station>>;
    /// The raw CSV export covering the selection.
    async fn fetch_export(&self, selection: &RunSelection) -> Result<String>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<Observation>>;
    async fn transform(&self, data: Vec<Observation>) -> Result<TransformResult>;
    async fn load(&self, result: TransformResult) -> Result<String>;
}
