use crate::adapters::TrektellenSettings;
use crate::config::parse_run_date;
use crate::core::checks::{
    parse_datetime_bound, CheckParameters, FocusPeriod, UnknownSpeciesPolicy,
};
use crate::core::normalize::CountSession;
use crate::core::ConfigProvider;
use crate::domain::model::RunSelection;
use crate::utils::error::{CheckError, Result};
use crate::utils::validation::{
    validate_date_order, validate_path, validate_positive_number, Validate,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub run: RunConfig,
    pub season: Option<SeasonConfig>,
    pub checks: ChecksConfig,
    pub source: SourceConfig,
    pub load: LoadConfig,
    pub monitoring: Option<MonitoringConfig>,
    /// `run.date`, or the load day when it is omitted.
    #[serde(skip)]
    run_day: NaiveDate,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    /// `YYYYMMDD`; today when omitted.
    pub date: Option<String>,
    #[serde(default)]
    pub whole_season: bool,
    #[serde(default)]
    pub forced: bool,
    /// Station opening hours such as `"S1=07:00-17:30"`.
    #[serde(default)]
    pub sessions: Vec<CountSession>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonConfig {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecksConfig {
    pub window_minutes: Option<i64>,
    pub focus_start: String,
    pub focus_end: String,
    #[serde(default)]
    pub unknown_species: UnknownSpeciesPolicy,
    pub catalog_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
    File {
        path: String,
    },
    Trektellen {
        login_url: String,
        success_url: String,
        username: String,
        password: String,
        count_url: String,
        download_url: String,
        station1_id: Option<u32>,
        station2_id: Option<u32>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub output_path: String,
    #[serde(default)]
    pub bundle: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub log_level: Option<String>,
}

impl TomlConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(CheckError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        let mut config: Self =
            toml::from_str(&processed_content).map_err(|e| CheckError::ConfigValidationError {
                field: "toml_parsing".to_string(),
                message: format!("TOML parsing error: {}", e),
            })?;
        config.run_day = match &config.run.date {
            Some(date) => parse_run_date("run.date", date)?,
            None => chrono::Local::now().date_naive(),
        };
        Ok(config)
    }

    /// Replaces `${VAR}` with the variable's value; unset variables are left as is.
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| CheckError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    fn season_bounds(&self) -> Result<Option<(chrono::NaiveDateTime, chrono::NaiveDateTime)>> {
        match &self.season {
            Some(season) => Ok(Some((
                parse_datetime_bound("season.start", &season.start)?,
                parse_datetime_bound("season.end", &season.end)?,
            ))),
            None => Ok(None),
        }
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_path("load.output_path", &self.load.output_path)?;

        let params = self.check_parameters()?;
        validate_positive_number("checks.window_minutes", params.window_minutes, 0)?;
        validate_date_order(
            "checks.focus",
            params.focus_period.start,
            params.focus_period.end,
        )?;
        if let Some(path) = &self.checks.catalog_file {
            validate_path("checks.catalog_file", path)?;
        }

        match self.season_bounds()? {
            Some((start, end)) => validate_date_order("season", start, end)?,
            None if self.run.whole_season => {
                return Err(CheckError::MissingConfigError {
                    field: "season".to_string(),
                })
            }
            None => {}
        }
        if self.run.whole_season && !self.run.sessions.is_empty() {
            return Err(CheckError::ConfigValidationError {
                field: "run.sessions".to_string(),
                message: "count sessions only apply to single-day runs".to_string(),
            });
        }

        match &self.source {
            SourceConfig::File { path } => validate_path("source.path", path)?,
            SourceConfig::Trektellen { .. } => {
                if let Some(settings) = self.trektellen_settings() {
                    settings.validate()?;
                }
            }
        }
        Ok(())
    }

    pub fn trektellen_settings(&self) -> Option<TrektellenSettings> {
        let SourceConfig::Trektellen {
            login_url,
            success_url,
            username,
            password,
            count_url,
            download_url,
            station1_id,
            station2_id,
        } = &self.source
        else {
            return None;
        };

        let mut station_ids = TrektellenSettings::default_station_ids();
        for ((_, id), configured) in station_ids.iter_mut().zip([station1_id, station2_id]) {
            if let Some(configured) = configured {
                *id = *configured;
            }
        }

        Some(TrektellenSettings {
            login_url: login_url.clone(),
            success_url: success_url.clone(),
            username: username.clone(),
            password: password.clone(),
            count_url: count_url.clone(),
            download_url: download_url.clone(),
            station_ids,
        })
    }

    pub fn forced(&self) -> bool {
        self.run.forced
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn log_level(&self) -> Option<&str> {
        self.monitoring.as_ref().and_then(|m| m.log_level.as_deref())
    }
}

impl ConfigProvider for TomlConfig {
    fn output_path(&self) -> &str {
        &self.load.output_path
    }

    fn selection(&self) -> RunSelection {
        if self.run.whole_season {
            if let Ok(Some((start, end))) = self.season_bounds() {
                return RunSelection::Season { start, end };
            }
        }
        RunSelection::Day(self.run_day)
    }

    fn check_parameters(&self) -> Result<CheckParameters> {
        Ok(CheckParameters {
            window_minutes: self.checks.window_minutes.unwrap_or(10),
            focus_period: FocusPeriod::parse(&self.checks.focus_start, &self.checks.focus_end)?,
            unknown_species: self.checks.unknown_species,
        })
    }

    fn catalog_file(&self) -> Option<&str> {
        self.checks.catalog_file.as_deref()
    }

    fn write_bundle(&self) -> bool {
        self.load.bundle
    }

    fn count_sessions(&self) -> &[CountSession] {
        &self.run.sessions
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FILE_CONFIG: &str = r#"
[run]
date = "20190901"

[checks]
window_minutes = 15
focus_start = "2019-08-20"
focus_end = "2019-09-10"
unknown_species = "reject"

[source]
type = "file"
path = "./exports/2019.csv"

[load]
output_path = "./output"
bundle = true
"#;

    #[test]
    fn test_parse_file_source_config() {
        let config = TomlConfig::from_toml_str(FILE_CONFIG).unwrap();

        assert_eq!(
            config.selection(),
            RunSelection::Day(NaiveDate::from_ymd_opt(2019, 9, 1).unwrap())
        );
        let params = config.check_parameters().unwrap();
        assert_eq!(params.window_minutes, 15);
        assert_eq!(params.unknown_species, UnknownSpeciesPolicy::Reject);
        assert!(config.write_bundle());
        assert!(config.trektellen_settings().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("RAPTOR_TEST_TREK_PASSWORD", "hunter2");

        let toml_content = r#"
[run]
whole_season = true

[season]
start = "2019-08-15"
end = "2019-10-15"

[checks]
focus_start = "2019-08-20"
focus_end = "2019-09-10"

[source]
type = "trektellen"
login_url = "https://www.trektellen.org/user/login"
success_url = "https://www.trektellen.org/"
username = "counter"
password = "${RAPTOR_TEST_TREK_PASSWORD}"
count_url = "https://www.trektellen.org/count/view"
download_url = "https://www.trektellen.org/export/season/"
station2_id = 2000

[load]
output_path = "./output"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        let settings = config.trektellen_settings().unwrap();
        assert_eq!(settings.password, "hunter2");
        assert_eq!(settings.station_ids[1].1, 2000);
        assert!(matches!(config.selection(), RunSelection::Season { .. }));
        assert!(config.validate().is_ok());

        std::env::remove_var("RAPTOR_TEST_TREK_PASSWORD");
    }

    #[test]
    fn test_config_validation() {
        let bad_focus = FILE_CONFIG.replace("2019-09-10", "2019-08-01");
        assert!(TomlConfig::from_toml_str(&bad_focus)
            .unwrap()
            .validate()
            .is_err());

        let missing_season = FILE_CONFIG.replace("[run]", "[run]\nwhole_season = true");
        assert!(TomlConfig::from_toml_str(&missing_season)
            .unwrap()
            .validate()
            .is_err());

        let bad_policy = FILE_CONFIG.replace("\"reject\"", "\"maybe\"");
        assert!(TomlConfig::from_toml_str(&bad_policy).is_err());

        let bad_date = FILE_CONFIG.replace("20190901", "2019-09-01");
        assert!(TomlConfig::from_toml_str(&bad_date).is_err());
    }

    #[test]
    fn test_count_sessions_and_default_day() {
        let with_sessions = FILE_CONFIG.replace(
            "date = \"20190901\"",
            "sessions = [\"S1=07:00-17:30\", \"S2=07:30-16:00\"]",
        );
        let config = TomlConfig::from_toml_str(&with_sessions).unwrap();
        assert_eq!(config.count_sessions().len(), 2);
        assert!(config.validate().is_ok());

        let first = config.selection();
        assert_eq!(first, RunSelection::Day(config.run_day));
        assert_eq!(config.selection(), first);

        let bad_hours = with_sessions.replace("07:30-16:00", "16:00-07:30");
        assert!(TomlConfig::from_toml_str(&bad_hours).is_err());

        let season = with_sessions
            .replace("[run]", "[run]\nwhole_season = true")
            .replace("[checks]", "[season]\nstart = \"2019-08-15\"\nend = \"2019-10-15\"\n\n[checks]");
        assert!(TomlConfig::from_toml_str(&season)
            .unwrap()
            .validate()
            .is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(FILE_CONFIG.as_bytes()).unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.output_path(), "./output");
    }
}
