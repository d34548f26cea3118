use anyhow::Context;
use clap::Parser;
use raptor_check::adapters::{ExportSource, FileSource, TrektellenSource};
use raptor_check::config::toml_config::{SourceConfig, TomlConfig};
use raptor_check::core::ConfigProvider;
use raptor_check::utils::error::ErrorSeverity;
use raptor_check::utils::{logger, validation::Validate};
use raptor_check::{
    CheckPipeline, EtlEngine, ExpectationCatalog, LocalStorage, RunDecision, RunOutcome,
};

#[derive(Parser)]
#[command(name = "toml-check")]
#[command(about = "Raptor count checks driven by a TOML configuration")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "raptor-check.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Override the forced setting from config
    #[arg(long)]
    forced: Option<bool>,

    /// Show what would be processed without fetching or writing anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = TomlConfig::from_file(&args.config)
        .with_context(|| format!("failed to load config file '{}'", args.config))?;

    logger::init_cli_logger(args.verbose || config.log_level() == Some("debug"));
    tracing::info!("Loaded configuration from: {}", args.config);

    if let Err(e) = config.validate() {
        tracing::error!("Configuration validation failed: {}", e);
        tracing::error!("Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    display_config_summary(&config, &args);

    if args.dry_run {
        tracing::info!("DRY RUN MODE - No actual processing will occur");
        return perform_dry_run(&config);
    }

    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    let forced = args.forced.unwrap_or_else(|| config.forced());

    let source = match (&config.source, config.trektellen_settings()) {
        (SourceConfig::File { path }, _) => ExportSource::File(FileSource::new(path)),
        (_, Some(settings)) => ExportSource::Trektellen(TrektellenSource::new(settings)?),
        (SourceConfig::Trektellen { .. }, None) => anyhow::bail!("incomplete Trektellen source"),
    };
    let storage = LocalStorage::new(config.output_path().to_string());
    let pipeline = CheckPipeline::new(storage, config, source);
    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run_unless_done(forced).await {
        Ok(RunOutcome::Processed(output_path)) => {
            println!("✅ Check run completed");
            println!("📁 Checked tables saved to: {}", output_path);
        }
        Ok(RunOutcome::Skipped(RunDecision::AwaitingUpload(available))) => {
            println!(
                "Only {} station(s) uploaded so far; set run.forced to process anyway",
                available.len()
            );
        }
        Ok(RunOutcome::Skipped(_)) => println!("Already processed; nothing to do"),
        Err(e) => {
            tracing::error!(
                "Check run failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

fn display_config_summary(config: &TomlConfig, args: &Args) {
    println!("📋 Configuration Summary:");
    println!("  Selection: {}", config.selection().file_stem());
    match &config.source {
        SourceConfig::File { path } => println!("  Source: file {}", path),
        SourceConfig::Trektellen { count_url, .. } => println!("  Source: Trektellen {}", count_url),
    }
    println!("  Output: {}", config.output_path());
    println!("  Bundle: {}", config.write_bundle());

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }
    println!();
}

fn perform_dry_run(config: &TomlConfig) -> anyhow::Result<()> {
    let params = config.check_parameters()?;
    let catalog = match config.catalog_file() {
        Some(path) => ExpectationCatalog::from_file(path)
            .with_context(|| format!("failed to load catalog '{}'", path))?,
        None => ExpectationCatalog::builtin(),
    };

    println!("🔍 Dry Run Analysis:");
    println!("  Catalog: {} species", catalog.len());
    println!("  Aged-count window: ±{} min", params.window_minutes);
    println!(
        "  HB focus period: {} .. {}",
        params.focus_period.start, params.focus_period.end
    );
    println!("  Unknown species: {:?}", params.unknown_species);
    for session in config.count_sessions() {
        println!("  Count session: {}", String::from(*session));
    }
    println!();
    println!("✅ Dry run analysis complete.");
    Ok(())
}
