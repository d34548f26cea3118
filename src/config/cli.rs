use crate::core::Storage;
use crate::utils::error::Result;
use std::fs;
use std::path::Path;

#[cfg(feature = "cli")]
pub use self::args::CliConfig;

#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: String,
}

impl LocalStorage {
    pub fn new(base_path: String) -> Self {
        Self { base_path }
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = Path::new(&self.base_path).join(path);
        let data = fs::read(full_path)?;
        Ok(data)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = Path::new(&self.base_path).join(path);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(full_path, data)?;
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(Path::new(&self.base_path).join(path).is_file())
    }
}

#[cfg(feature = "cli")]
mod args {
    use crate::config::parse_run_date;
    use crate::core::checks::{parse_datetime_bound, CheckParameters, FocusPeriod};
    use crate::core::normalize::CountSession;
    use crate::core::ConfigProvider;
    use crate::domain::model::RunSelection;
    use crate::utils::error::{CheckError, Result};
    use crate::utils::validation::{
        validate_date_order, validate_path, validate_positive_number, Validate,
    };
    use chrono::NaiveDate;
    use clap::Parser;

    fn day_arg(value: &str) -> std::result::Result<NaiveDate, String> {
        parse_run_date("date", value).map_err(|e| e.to_string())
    }

    fn session_arg(value: &str) -> std::result::Result<CountSession, String> {
        value.parse::<CountSession>().map_err(|e| e.to_string())
    }

    #[derive(Debug, Clone, Parser)]
    #[command(name = "raptor-check")]
    #[command(about = "Flags raptor count records that need review")]
    pub struct CliConfig {
        /// Local Trektellen export; fetched from Trektellen when omitted
        #[arg(long)]
        pub input: Option<String>,

        /// Day to check (YYYYMMDD), defaults to today
        #[arg(long, value_parser = day_arg, conflicts_with = "whole_season")]
        pub date: Option<NaiveDate>,

        /// Check the whole season instead of one day
        #[arg(long)]
        pub whole_season: bool,

        /// Station opening hours, e.g. S1=07:00-17:30; repeat or comma-separate
        #[arg(
            long = "session",
            env = "COUNT_SESSIONS",
            value_parser = session_arg,
            value_delimiter = ','
        )]
        pub sessions: Vec<CountSession>,

        #[arg(long, env = "CURRENT_SEASON_START", required_if_eq("whole_season", "true"))]
        pub season_start: Option<String>,

        #[arg(long, env = "CURRENT_SEASON_END", required_if_eq("whole_season", "true"))]
        pub season_end: Option<String>,

        /// Half-width of the aged-count window, in minutes
        #[arg(long, env = "TIME_WINDOW_MINUTES", default_value = "10")]
        pub window_minutes: i64,

        #[arg(long, env = "HB_FOCUS_START")]
        pub focus_start: String,

        #[arg(long, env = "HB_FOCUS_END")]
        pub focus_end: String,

        /// What to do with species missing from the catalog: ignore or reject
        #[arg(long, default_value = "ignore")]
        pub unknown_species: String,

        /// TOML expectation catalog replacing the built-in one
        #[arg(long)]
        pub catalog: Option<String>,

        #[arg(long, default_value = "./output")]
        pub output_path: String,

        /// Process even when a station has not uploaded yet
        #[arg(long)]
        pub forced: bool,

        /// Also write a zip bundle of the checked tables
        #[arg(long)]
        pub bundle: bool,

        #[arg(long, help = "Enable verbose output")]
        pub verbose: bool,

        #[arg(long, help = "Log CPU and memory per phase")]
        pub monitor: bool,

        /// Run day used when `--date` is omitted, fixed once at parse time.
        #[arg(skip = chrono::Local::now().date_naive())]
        pub today: NaiveDate,
    }

    impl CliConfig {
        fn season_bounds(&self) -> Result<Option<(chrono::NaiveDateTime, chrono::NaiveDateTime)>> {
            match (&self.season_start, &self.season_end) {
                (Some(start), Some(end)) if self.whole_season => Ok(Some((
                    parse_datetime_bound("season_start", start)?,
                    parse_datetime_bound("season_end", end)?,
                ))),
                _ => Ok(None),
            }
        }
    }

    impl ConfigProvider for CliConfig {
        fn output_path(&self) -> &str {
            &self.output_path
        }

        fn selection(&self) -> RunSelection {
            match self.season_bounds() {
                Ok(Some((start, end))) => RunSelection::Season { start, end },
                _ => RunSelection::Day(self.date.unwrap_or(self.today)),
            }
        }

        fn check_parameters(&self) -> Result<CheckParameters> {
            Ok(CheckParameters {
                window_minutes: self.window_minutes,
                focus_period: FocusPeriod::parse(&self.focus_start, &self.focus_end)?,
                unknown_species: self.unknown_species.parse()?,
            })
        }

        fn catalog_file(&self) -> Option<&str> {
            self.catalog.as_deref()
        }

        fn write_bundle(&self) -> bool {
            self.bundle
        }

        fn count_sessions(&self) -> &[CountSession] {
            &self.sessions
        }
    }

    impl Validate for CliConfig {
        fn validate(&self) -> Result<()> {
            validate_path("output_path", &self.output_path)?;
            if let Some(input) = &self.input {
                validate_path("input", input)?;
            }
            if let Some(catalog) = &self.catalog {
                validate_path("catalog", catalog)?;
            }
            validate_positive_number("window_minutes", self.window_minutes, 0)?;

            let params = self.check_parameters()?;
            validate_date_order("focus", params.focus_period.start, params.focus_period.end)?;
            if let Some((start, end)) = self.season_bounds()? {
                validate_date_order("season", start, end)?;
            }
            if self.whole_season && !self.sessions.is_empty() {
                return Err(CheckError::ConfigValidationError {
                    field: "session".to_string(),
                    message: "count sessions only apply to single-day runs".to_string(),
                });
            }
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn parse(args: &[&str]) -> CliConfig {
            let mut argv = vec!["raptor-check", "--focus-start", "2019-08-20", "--focus-end", "2019-09-10"];
            argv.extend_from_slice(args);
            CliConfig::try_parse_from(argv).unwrap()
        }

        #[test]
        fn test_day_selection() {
            let config = parse(&["--date", "20190901", "--unknown-species", "reject"]);
            assert_eq!(
                config.selection(),
                RunSelection::Day(NaiveDate::from_ymd_opt(2019, 9, 1).unwrap())
            );
            assert!(config.validate().is_ok());
            assert_eq!(config.check_parameters().unwrap().window_minutes, 10);
        }

        #[test]
        fn test_season_selection() {
            let config = parse(&[
                "--whole-season",
                "--season-start",
                "2019-08-15",
                "--season-end",
                "2019-10-15",
            ]);
            assert!(matches!(config.selection(), RunSelection::Season { .. }));
        }

        #[test]
        fn test_invalid_values_fail_validation() {
            assert!(parse(&["--window-minutes=-5"]).validate().is_err());
            assert!(parse(&["--unknown-species", "maybe"]).validate().is_err());
            assert!(CliConfig::try_parse_from(["raptor-check", "--date", "2019-09-01"]).is_err());
        }

        #[test]
        fn test_default_day_is_fixed_at_parse_time() {
            let config = parse(&[]);
            let first = config.selection();
            assert_eq!(first, RunSelection::Day(config.today));
            assert_eq!(config.selection(), first);
        }

        #[test]
        fn test_count_sessions() {
            let config = parse(&[
                "--date",
                "20190901",
                "--session",
                "S1=07:00-17:30",
                "--session",
                "S2=07:30-16:00",
            ]);
            assert_eq!(config.count_sessions().len(), 2);
            assert!(config.validate().is_ok());

            let joined = parse(&["--session", "S1=07:00-17:30,S2=07:30-16:00"]);
            assert_eq!(joined.count_sessions(), config.count_sessions());

            let season = parse(&[
                "--whole-season",
                "--season-start",
                "2019-08-15",
                "--season-end",
                "2019-10-15",
                "--session",
                "S1=07:00-17:30",
            ]);
            assert!(season.validate().is_err());
            assert!(CliConfig::try_parse_from([
                "raptor-check",
                "--focus-start",
                "2019-08-20",
                "--focus-end",
                "2019-09-10",
                "--session",
                "S1=17:00-07:00",
            ])
            .is_err());
        }
    }
}
