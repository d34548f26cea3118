use crate::core::normalize::Normalizer;
use crate::core::ObservationSource;
use crate::domain::model::{RunSelection, Station};
use crate::utils::error::{CheckError, Result};
use async_trait::async_trait;
use std::path::PathBuf;

/// A Trektellen export already saved to disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read(&self) -> Result<String> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| CheckError::SourceUnavailableError {
                message: format!("cannot read {}: {}", self.path.display(), e),
            })
    }
}

#[async_trait]
impl ObservationSource for FileSource {
    /// Stations with at least one record in the selection.
    async fn available_stations(&self, selection: &RunSelection) -> Result<Vec<Station>> {
        let export = self.read().await?;
        let observations = Normalizer::new(*selection).parse_export(&export)?;
        Ok(Station::ALL
            .into_iter()
            .filter(|station| observations.iter().any(|o| o.station == Some(*station)))
            .collect())
    }

    async fn fetch_export(&self, _selection: &RunSelection) -> Result<String> {
        self.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_file_source_reports_present_stations() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "date,timestamp,telpost,speciesname,count,countback,local,age,sex,plumage,remark,location,migtype,counttype\n\
             2019-09-01,09:00:00,1048,HB,10,0,0,,,,,O,,\n\
             2019-09-02,09:00:00,1047,HB,10,0,0,,,,,O,,"
        )
        .unwrap();

        let source = FileSource::new(file.path());
        let day = RunSelection::Day(NaiveDate::from_ymd_opt(2019, 9, 1).unwrap());
        assert_eq!(
            source.available_stations(&day).await.unwrap(),
            vec![Station::Shuamta]
        );
        assert!(source.fetch_export(&day).await.unwrap().contains("1047"));
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let source = FileSource::new("/nonexistent/export.csv");
        let day = RunSelection::Day(NaiveDate::from_ymd_opt(2019, 9, 1).unwrap());
        assert!(matches!(
            source.fetch_export(&day).await,
            Err(CheckError::SourceUnavailableError { .. })
        ));
    }
}
