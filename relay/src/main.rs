mod config;
mod telemetry;

use clap::{Args, Parser};
use config::Config;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(version, about = "Relays city route selections to an automation webhook")]
enum CliCommand {
    /// Serve the relay and its admin endpoints
    Run(ConfigArgs),
    /// Load and validate the config file, then exit
    CheckConfig(ConfigArgs),
}

#[derive(Args)]
struct ConfigArgs {
    #[arg(long, short = 'c', default_value = "relay.yaml")]
    config_file: PathBuf,
}

fn main() -> ExitCode {
    let cli = CliCommand::parse();

    match cli {
        CliCommand::Run(args) => run(args),
        CliCommand::CheckConfig(args) => check_config(args),
    }
}

fn load_config(args: &ConfigArgs) -> Option<Config> {
    match Config::from_file(&args.config_file) {
        Ok(config) => Some(config),
        Err(e) => {
            eprintln!("{}: {e}", args.config_file.display());
            None
        }
    }
}

fn check_config(args: ConfigArgs) -> ExitCode {
    let Some(config) = load_config(&args) else {
        return ExitCode::FAILURE;
    };

    match config.route_hook.validate() {
        Ok(()) => {
            println!("{}: ok", args.config_file.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {e}", args.config_file.display());
            ExitCode::FAILURE
        }
    }
}

fn run(args: ConfigArgs) -> ExitCode {
    let Some(config) = load_config(&args) else {
        return ExitCode::FAILURE;
    };

    let _sentry = telemetry::init_logging(&config.common.logging);

    if let Some(metrics) = &config.common.metrics {
        if let Err(e) = telemetry::init_metrics(metrics) {
            tracing::error!(error = %e, "failed to initialize metrics");
            return ExitCode::FAILURE;
        }
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "failed to start runtime");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(config_file = %args.config_file.display(), "starting relay");
    match runtime.block_on(route_hook::run(config.route_hook)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "relay stopped");
            ExitCode::FAILURE
        }
    }
}
