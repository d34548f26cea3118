pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::cli::CliConfig;
pub use crate::config::cli::LocalStorage;
#[cfg(feature = "lambda")]
pub use crate::config::lambda::{LambdaConfig, S3Storage};
pub use crate::config::toml_config::TomlConfig;
pub use crate::core::checks::{CheckParameters, FlaggingEngine, FocusPeriod, UnknownSpeciesPolicy};
pub use crate::core::etl::{EtlEngine, RunOutcome};
pub use crate::core::pipeline::{CheckPipeline, RunDecision};
pub use crate::domain::catalog::ExpectationCatalog;
pub use crate::domain::model::{CheckedObservation, Flag, Observation, RunSelection, Station};
pub use crate::utils::error::{CheckError, Result};
