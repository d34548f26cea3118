#[cfg(feature = "lambda")]
use crate::adapters::TrektellenSettings;
#[cfg(feature = "lambda")]
use crate::config::{optional_env, required_env};
#[cfg(feature = "lambda")]
use crate::core::checks::{parse_datetime_bound, CheckParameters, FocusPeriod};
#[cfg(feature = "lambda")]
use crate::core::normalize::{parse_sessions, CountSession};
#[cfg(feature = "lambda")]
use crate::core::{ConfigProvider, Storage};
#[cfg(feature = "lambda")]
use crate::domain::model::RunSelection;
#[cfg(feature = "lambda")]
use crate::utils::error::{CheckError, Result};
#[cfg(feature = "lambda")]
use aws_sdk_s3::operation::head_object::HeadObjectError;
#[cfg(feature = "lambda")]
use aws_sdk_s3::Client as S3Client;
#[cfg(feature = "lambda")]
use chrono::{NaiveDate, NaiveDateTime};

#[cfg(feature = "lambda")]
#[derive(Debug, Clone)]
pub struct LambdaConfig {
    pub date: NaiveDate,
    pub season_start: NaiveDateTime,
    pub season_end: NaiveDateTime,
    pub focus_period: FocusPeriod,
    pub window_minutes: i64,
    pub sessions: Vec<CountSession>,
    pub trektellen: TrektellenSettings,
    pub s3_bucket: String,
    pub s3_prefix: String,
    pub s3_region: String,
}

#[cfg(feature = "lambda")]
impl LambdaConfig {
    /// Reads the environment; `date` comes from the triggering request.
    pub fn from_env(date: NaiveDate) -> Result<Self> {
        let window_minutes = match optional_env("TIME_WINDOW_MINUTES") {
            Some(value) => value.trim().parse().map_err(|_| CheckError::InvalidConfigValueError {
                field: "TIME_WINDOW_MINUTES".to_string(),
                value,
                reason: "expected a whole number of minutes".to_string(),
            })?,
            None => 10,
        };

        Ok(Self {
            date,
            season_start: parse_datetime_bound(
                "CURRENT_SEASON_START",
                &required_env("CURRENT_SEASON_START")?,
            )?,
            season_end: parse_datetime_bound(
                "CURRENT_SEASON_END",
                &required_env("CURRENT_SEASON_END")?,
            )?,
            focus_period: FocusPeriod::parse(
                &required_env("HB_FOCUS_START")?,
                &required_env("HB_FOCUS_END")?,
            )?,
            window_minutes,
            sessions: match optional_env("COUNT_SESSIONS") {
                Some(value) => parse_sessions(&value)?,
                None => Vec::new(),
            },
            trektellen: TrektellenSettings::from_env()?,
            s3_bucket: required_env("S3_BUCKET")?,
            s3_prefix: optional_env("S3_PREFIX").unwrap_or_else(|| "raptor-check".to_string()),
            s3_region: optional_env("S3_REGION").unwrap_or_else(|| "eu-central-1".to_string()),
        })
    }
}

#[cfg(feature = "lambda")]
impl ConfigProvider for LambdaConfig {
    fn output_path(&self) -> &str {
        &self.s3_prefix
    }

    fn selection(&self) -> RunSelection {
        RunSelection::Day(self.date)
    }

    fn check_parameters(&self) -> Result<CheckParameters> {
        Ok(CheckParameters::new(self.window_minutes, self.focus_period))
    }

    fn catalog_file(&self) -> Option<&str> {
        None
    }

    fn count_sessions(&self) -> &[CountSession] {
        &self.sessions
    }
}

#[cfg(feature = "lambda")]
impl crate::utils::validation::Validate for LambdaConfig {
    fn validate(&self) -> Result<()> {
        use crate::utils::validation::*;

        validate_s3_bucket_name("s3_bucket", &self.s3_bucket)?;
        validate_non_empty_string("s3_prefix", &self.s3_prefix)?;
        validate_aws_region("s3_region", &self.s3_region)?;
        validate_range("window_minutes", self.window_minutes, 0, 24 * 60)?;
        validate_date_order("season", self.season_start, self.season_end)?;
        validate_date_order("focus", self.focus_period.start, self.focus_period.end)?;
        self.trektellen.validate()?;

        tracing::info!("Lambda configuration validation passed");
        Ok(())
    }
}

#[cfg(feature = "lambda")]
fn validate_s3_bucket_name(field_name: &str, bucket_name: &str) -> Result<()> {
    let invalid = |reason: &str| CheckError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: bucket_name.to_string(),
        reason: reason.to_string(),
    };

    if bucket_name.len() < 3 || bucket_name.len() > 63 {
        return Err(invalid("S3 bucket name must be between 3 and 63 characters"));
    }
    if !bucket_name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return Err(invalid(
            "S3 bucket name can only contain lowercase letters, numbers, hyphens, and dots",
        ));
    }
    if bucket_name.starts_with('-') || bucket_name.ends_with('-') {
        return Err(invalid("S3 bucket name cannot start or end with a hyphen"));
    }
    Ok(())
}

#[cfg(feature = "lambda")]
fn validate_aws_region(field_name: &str, region: &str) -> Result<()> {
    crate::utils::validation::validate_non_empty_string(field_name, region)?;

    if !region
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(CheckError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: region.to_string(),
            reason: "AWS region can only contain lowercase letters, numbers, and hyphens"
                .to_string(),
        });
    }
    Ok(())
}

/// Objects live under `{prefix}/{path}` in one bucket.
#[cfg(feature = "lambda")]
#[derive(Debug, Clone)]
pub struct S3Storage {
    client: S3Client,
    bucket: String,
    prefix: String,
}

#[cfg(feature = "lambda")]
impl S3Storage {
    pub fn new(client: S3Client, bucket: String, prefix: String) -> Self {
        Self {
            client,
            bucket,
            prefix,
        }
    }

    fn key(&self, path: &str) -> String {
        match self.prefix.trim_matches('/') {
            "" => path.to_string(),
            prefix => format!("{}/{}", prefix, path),
        }
    }
}

#[cfg(feature = "lambda")]
impl Storage for S3Storage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.key(path))
            .send()
            .await
            .map_err(|e| CheckError::StorageError {
                message: format!("Failed to read s3://{}/{}: {}", self.bucket, self.key(path), e),
            })?;

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| CheckError::StorageError {
                message: format!("Failed to collect S3 data: {}", e),
            })?;

        Ok(data.into_bytes().to_vec())
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let key = self.key(path);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(data.to_vec().into())
            .send()
            .await
            .map_err(|e| CheckError::StorageError {
                message: format!("Failed to write s3://{}/{}: {}", self.bucket, key, e),
            })?;
        tracing::debug!("Uploaded s3://{}/{} ({} bytes)", self.bucket, key, data.len());
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let key = self.key(path);
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) => match err.into_service_error() {
                HeadObjectError::NotFound(_) => Ok(false),
                other => Err(CheckError::StorageError {
                    message: format!("Failed to look up s3://{}/{}: {}", self.bucket, key, other),
                }),
            },
        }
    }
}

#[cfg(all(test, feature = "lambda"))]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_name_rules() {
        assert!(validate_s3_bucket_name("s3_bucket", "brc-counts").is_ok());
        assert!(validate_s3_bucket_name("s3_bucket", "BRC").is_err());
        assert!(validate_s3_bucket_name("s3_bucket", "-brc").is_err());
        assert!(validate_aws_region("s3_region", "eu-central-1").is_ok());
        assert!(validate_aws_region("s3_region", "EU Central").is_err());
    }
}
