// Observation sources: where raw export text comes from.

pub mod file;
pub mod trektellen;

pub use file::FileSource;
pub use trektellen::{TrektellenSettings, TrektellenSource};

use crate::core::ObservationSource;
use crate::domain::model::{RunSelection, Station};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Source picked at runtime from configuration.
pub enum ExportSource {
    File(FileSource),
    Trektellen(TrektellenSource),
}

#[async_trait]
impl ObservationSource for ExportSource {
    async fn available_stations(&self, selection: &RunSelection) -> Result<Vec<Station>> {
        match self {
            ExportSource::File(source) => source.available_stations(selection).await,
            ExportSource::Trektellen(source) => source.available_stations(selection).await,
        }
    }

    async fn fetch_export(&self, selection: &RunSelection) -> Result<String> {
        match self {
            ExportSource::File(source) => source.fetch_export(selection).await,
            ExportSource::Trektellen(source) => source.fetch_export(selection).await,
        }
    }
}
