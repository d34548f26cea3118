#[cfg(feature = "lambda")]
use aws_config::BehaviorVersion;
#[cfg(feature = "lambda")]
use aws_sdk_s3::config::Region;
#[cfg(feature = "lambda")]
use aws_sdk_s3::Client as S3Client;
#[cfg(feature = "lambda")]
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
#[cfg(feature = "lambda")]
use raptor_check::adapters::TrektellenSource;
#[cfg(feature = "lambda")]
use raptor_check::config::parse_run_date;
#[cfg(feature = "lambda")]
use raptor_check::utils::{logger, validation::Validate};
#[cfg(feature = "lambda")]
use raptor_check::{CheckPipeline, EtlEngine, LambdaConfig, RunDecision, RunOutcome, S3Storage};
#[cfg(feature = "lambda")]
use serde::{Deserialize, Serialize};
#[cfg(feature = "lambda")]
use std::collections::HashMap;

/// API Gateway request; only the query string is used.
#[cfg(feature = "lambda")]
#[derive(Deserialize)]
pub struct Request {
    #[serde(rename = "queryStringParameters")]
    pub query: Option<HashMap<String, String>>,
}

#[cfg(feature = "lambda")]
#[derive(Serialize)]
pub struct Response {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

#[cfg(feature = "lambda")]
fn html_response(message: &str) -> Response {
    Response {
        status_code: 200,
        headers: HashMap::from([("Content-Type".to_string(), "text/html".to_string())]),
        body: format!(
            "<html><head><title>BRC Data Preprocessor - Results</title></head><body>{}</body></html>",
            message
        ),
    }
}

#[cfg(feature = "lambda")]
async fn function_handler(event: LambdaEvent<Request>) -> Result<Response, Error> {
    tracing::info!("Starting raptor-check Lambda function");

    let query = event.payload.query.unwrap_or_default();
    let date = match query.get("date") {
        Some(value) => parse_run_date("date", value)?,
        None => chrono::Local::now().date_naive(),
    };
    let forced = query.get("forced").is_some_and(|value| value == "yes");
    let shown = date.format("%d-%m-%Y");

    let lambda_config = LambdaConfig::from_env(date)?;
    lambda_config.validate()?;

    let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let config = aws_sdk_s3::config::Builder::from(&config)
        .region(Region::new(lambda_config.s3_region.clone()))
        .force_path_style(true)
        .build();
    let storage = S3Storage::new(
        S3Client::from_conf(config),
        lambda_config.s3_bucket.clone(),
        lambda_config.s3_prefix.clone(),
    );

    let source = TrektellenSource::new(lambda_config.trektellen.clone())?;
    let pipeline = CheckPipeline::new(storage, lambda_config, source);
    let engine = EtlEngine::new(pipeline);

    let message = match engine.run_unless_done(forced).await? {
        RunOutcome::Processed(_) => {
            format!("Data for {} has finished processing and is uploaded to S3", shown)
        }
        RunOutcome::Skipped(RunDecision::AlreadyProcessed) => {
            format!("Data for {} is processed already and stored in S3.", shown)
        }
        RunOutcome::Skipped(_) => format!(
            "Data for {} for both stations is not uploaded to Trektellen yet.",
            shown
        ),
    };

    tracing::info!("{}", message);
    Ok(html_response(&message))
}

#[cfg(feature = "lambda")]
#[tokio::main]
async fn main() -> Result<(), Error> {
    logger::init_lambda_logger();
    run(service_fn(function_handler)).await
}
