use clap::Parser;
use raptor_check::adapters::{ExportSource, FileSource, TrektellenSettings, TrektellenSource};
use raptor_check::utils::error::{CheckError, ErrorSeverity};
use raptor_check::utils::{logger, validation::Validate};
use raptor_check::{CheckPipeline, CliConfig, EtlEngine, LocalStorage, RunDecision, RunOutcome};

fn exit_code(e: &CheckError) -> i32 {
    match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}

fn fail(e: CheckError) -> ! {
    tracing::error!(
        "Check run failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
    std::process::exit(exit_code(&e));
}

fn build_source(config: &CliConfig) -> raptor_check::utils::error::Result<ExportSource> {
    match &config.input {
        Some(path) => Ok(ExportSource::File(FileSource::new(path))),
        None => {
            let settings = TrektellenSettings::from_env()?;
            settings.validate()?;
            Ok(ExportSource::Trektellen(TrektellenSource::new(settings)?))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::parse();

    logger::init_cli_logger(config.verbose);

    tracing::info!("Starting raptor-check");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    if let Err(e) = config.validate() {
        tracing::error!("Configuration validation failed: {}", e);
        tracing::error!("Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let monitor_enabled = config.monitor;
    if monitor_enabled {
        tracing::info!("System monitoring enabled");
    }

    let source = build_source(&config).unwrap_or_else(|e| fail(e));
    let forced = config.forced;
    let storage = LocalStorage::new(config.output_path.clone());
    let pipeline = CheckPipeline::new(storage, config, source);
    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run_unless_done(forced).await {
        Ok(RunOutcome::Processed(output_path)) => {
            tracing::info!("Check run completed");
            println!("✅ Check run completed");
            println!("📁 Checked tables saved to: {}", output_path);
        }
        Ok(RunOutcome::Skipped(RunDecision::AlreadyProcessed)) => {
            println!("Already processed; nothing to do");
        }
        Ok(RunOutcome::Skipped(RunDecision::AwaitingUpload(available))) => {
            println!(
                "Not every station has uploaded yet ({} of 2); rerun later or pass --forced",
                available.len()
            );
        }
        Ok(RunOutcome::Skipped(RunDecision::Process)) => {}
        Err(e) => fail(e),
    }

    Ok(())
}
