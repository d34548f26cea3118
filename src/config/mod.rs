pub mod cli;
pub mod lambda;
pub mod toml_config;

use crate::utils::error::{CheckError, Result};
use chrono::NaiveDate;

/// Reads a required environment variable.
pub fn required_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| CheckError::MissingConfigError {
        field: name.to_string(),
    })
}

pub fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// Parses a run date written as `YYYYMMDD`.
pub fn parse_run_date(field: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y%m%d").map_err(|_| {
        CheckError::InvalidConfigValueError {
            field: field.to_string(),
            value: value.to_string(),
            reason: "expected YYYYMMDD".to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_date() {
        assert_eq!(
            parse_run_date("date", "20190901").unwrap(),
            NaiveDate::from_ymd_opt(2019, 9, 1).unwrap()
        );
        assert!(parse_run_date("date", "2019-09-01").is_err());
    }

    #[test]
    fn test_required_env_reports_missing_variable() {
        match required_env("RAPTOR_CHECK_SURELY_UNSET") {
            Err(CheckError::MissingConfigError { field }) => {
                assert_eq!(field, "RAPTOR_CHECK_SURELY_UNSET")
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
