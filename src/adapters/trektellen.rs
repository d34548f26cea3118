//! HTTP source for the Trektellen count portal.
//!
//! Trektellen has no API: a session is opened by submitting the login form,
//! a station/day is considered published when its count page is served
//! without a redirect, and the season export is a CSV download.

use crate::config::{optional_env, required_env};
use crate::core::ObservationSource;
use crate::domain::model::{RunSelection, Station};
use crate::utils::error::{CheckError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_url, Validate};
use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::OnceCell;
use url::Url;

#[derive(Debug, Clone)]
pub struct TrektellenSettings {
    pub login_url: String,
    /// Where a successful login lands after redirects.
    pub success_url: String,
    pub username: String,
    pub password: String,
    /// Base of the per-station count pages, `{count_url}/{station_id}/{YYYYMMDD}`.
    pub count_url: String,
    /// Prefix of the season export, completed with the year.
    pub download_url: String,
    pub station_ids: Vec<(Station, u32)>,
}

impl TrektellenSettings {
    pub fn default_station_ids() -> Vec<(Station, u32)> {
        Station::ALL
            .into_iter()
            .map(|station| (station, station.trektellen_id()))
            .collect()
    }

    /// Reads the `TREKTELLEN_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut station_ids = Self::default_station_ids();
        for ((_, id), var) in station_ids
            .iter_mut()
            .zip(["TREKTELLEN_STATION1_ID", "TREKTELLEN_STATION2_ID"])
        {
            if let Some(value) = optional_env(var) {
                *id = value.trim().parse().map_err(|_| CheckError::InvalidConfigValueError {
                    field: var.to_string(),
                    value: value.clone(),
                    reason: "expected a numeric Trektellen site id".to_string(),
                })?;
            }
        }

        Ok(Self {
            login_url: required_env("TREKTELLEN_LOGIN_URL")?,
            success_url: required_env("TREKTELLEN_SUCCESSFUL_LOGIN_URL")?,
            username: required_env("TREKTELLEN_USERNAME")?,
            password: required_env("TREKTELLEN_PASSWORD")?,
            count_url: required_env("TREKTELLEN_COUNT_URL")?,
            download_url: required_env("TREKTELLEN_DOWNLOAD_URL")?,
            station_ids,
        })
    }
}

impl Validate for TrektellenSettings {
    fn validate(&self) -> Result<()> {
        validate_url("trektellen.login_url", &self.login_url)?;
        validate_url("trektellen.success_url", &self.success_url)?;
        validate_url("trektellen.count_url", &self.count_url)?;
        validate_url("trektellen.download_url", &self.download_url)?;
        validate_non_empty_string("trektellen.username", &self.username)?;
        validate_non_empty_string("trektellen.password", &self.password)?;
        Ok(())
    }
}

pub struct TrektellenSource {
    client: Client,
    settings: TrektellenSettings,
    session: OnceCell<()>,
}

impl TrektellenSource {
    pub fn new(settings: TrektellenSettings) -> Result<Self> {
        let client = Client::builder().cookie_store(true).build()?;
        Ok(Self {
            client,
            settings,
            session: OnceCell::new(),
        })
    }

    /// Logs in once per source; later calls reuse the cookie session.
    pub async fn login(&self) -> Result<()> {
        self.session
            .get_or_try_init(|| async {
                tracing::debug!("Logging in to Trektellen as {}", self.settings.username);
                let response = self
                    .client
                    .post(&self.settings.login_url)
                    .form(&[
                        ("identity", self.settings.username.as_str()),
                        ("password", self.settings.password.as_str()),
                    ])
                    .send()
                    .await?;

                if !same_url(response.url(), &self.settings.success_url) {
                    return Err(CheckError::AuthenticationError {
                        message: format!(
                            "login landed on {} instead of {}",
                            response.url(),
                            self.settings.success_url
                        ),
                    });
                }
                tracing::info!("Logged in to Trektellen");
                Ok::<(), CheckError>(())
            })
            .await
            .map(|_| ())
    }

    pub async fn is_published(&self, station_id: u32, date: &str) -> Result<bool> {
        self.login().await?;
        let page = format!(
            "{}/{}/{}",
            self.settings.count_url.trim_end_matches('/'),
            station_id,
            date
        );
        let response = self.client.get(&page).send().await?;
        Ok(same_url(response.url(), &page))
    }
}

fn same_url(landed: &Url, expected: &str) -> bool {
    Url::parse(expected).is_ok_and(|expected| &expected == landed)
}

#[async_trait]
impl ObservationSource for TrektellenSource {
    async fn available_stations(&self, selection: &RunSelection) -> Result<Vec<Station>> {
        let date = selection.file_stem();
        let mut available = Vec::new();
        for (station, id) in &self.settings.station_ids {
            if self.is_published(*id, &date).await? {
                available.push(*station);
            }
        }
        tracing::info!(
            "Trektellen has {} of {} stations for {}",
            available.len(),
            self.settings.station_ids.len(),
            date
        );
        Ok(available)
    }

    async fn fetch_export(&self, selection: &RunSelection) -> Result<String> {
        self.login().await?;
        let url = format!("{}{}", self.settings.download_url, selection.export_year());
        tracing::debug!("Downloading export from {}", url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(CheckError::SourceUnavailableError {
                message: format!("export download returned {}", response.status()),
            });
        }
        let body = response.bytes().await?;
        String::from_utf8(body.to_vec()).map_err(|e| CheckError::SourceUnavailableError {
            message: format!("export is not UTF-8: {}", e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use httpmock::prelude::*;

    fn settings(server: &MockServer, password: &str) -> TrektellenSettings {
        TrektellenSettings {
            login_url: server.url("/user/login"),
            success_url: server.url("/home"),
            username: "counter".to_string(),
            password: password.to_string(),
            count_url: server.url("/count/view"),
            download_url: server.url("/export/"),
            station_ids: TrektellenSettings::default_station_ids(),
        }
    }

    async fn login_mocks(server: &MockServer) {
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/user/login")
                    .body_contains("identity=counter")
                    .body_contains("password=secret");
                then.status(302).header("location", "/home");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/user/login")
                    .body_contains("password=wrong");
                then.status(302).header("location", "/user/login_failed");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.path("/home");
                then.status(200).body("welcome");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.path("/user/login_failed");
                then.status(200).body("try again");
            })
            .await;
    }

    fn day() -> RunSelection {
        RunSelection::Day(NaiveDate::from_ymd_opt(2019, 9, 1).unwrap())
    }

    #[tokio::test]
    async fn test_availability_follows_redirects() {
        let server = MockServer::start_async().await;
        login_mocks(&server).await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/count/view/1047/20190901");
                then.status(200).body("<table></table>");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/count/view/1048/20190901");
                then.status(302).header("location", "/count/view");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/count/view");
                then.status(200).body("no counts");
            })
            .await;

        let source = TrektellenSource::new(settings(&server, "secret")).unwrap();
        let available = source.available_stations(&day()).await.unwrap();
        assert_eq!(available, vec![Station::Sakhalvasho]);
    }

    #[tokio::test]
    async fn test_fetch_export_downloads_season_year() {
        let server = MockServer::start_async().await;
        login_mocks(&server).await;
        let export = server
            .mock_async(|when, then| {
                when.method(GET).path("/export/2019");
                then.status(200).body("date,timestamp\n");
            })
            .await;

        let source = TrektellenSource::new(settings(&server, "secret")).unwrap();
        let body = source.fetch_export(&day()).await.unwrap();
        assert_eq!(body, "date,timestamp\n");
        export.assert_async().await;
    }

    #[tokio::test]
    async fn test_wrong_credentials_fail_login() {
        let server = MockServer::start_async().await;
        login_mocks(&server).await;

        let source = TrektellenSource::new(settings(&server, "wrong")).unwrap();
        assert!(matches!(
            source.fetch_export(&day()).await,
            Err(CheckError::AuthenticationError { .. })
        ));
    }

    #[test]
    fn test_settings_validation() {
        let server = MockServer::start();
        assert!(settings(&server, "secret").validate().is_ok());
        let mut bad = settings(&server, "secret");
        bad.count_url = "not a url".to_string();
        assert!(bad.validate().is_err());
    }
}
