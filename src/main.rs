//! webhook-call: signed, retryable outbound webhook calls
//!
//! Entry point for the webhook-call application.

use std::process::ExitCode;
use webhook_call::config::{Cli, Command, ValidatedConfig, write_default_config};
use webhook_call::webhook::DeliveryReport;

mod app;
mod run;

use app::{exit_code, exit_code_for, print_config_hint, setup_tracing};

/// Main entry point.
///
/// Excluded from coverage as it's the thin wrapper around testable components.
#[cfg(not(tarpaulin_include))]
fn main() -> ExitCode {
    let cli = Cli::parse_args();

    // Handle init subcommand
    if let Some(Command::Init { output }) = &cli.command {
        return handle_init(output);
    }

    // Load and validate configuration
    let config = match ValidatedConfig::load(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            print_config_hint(&e);
            return exit_code::CONFIG_ERROR;
        }
    };

    // Setup logging and run
    setup_tracing(config.verbose);
    tracing::info!("{config}");

    run_application(config)
}

/// Handles the `init` subcommand.
fn handle_init(output: &std::path::Path) -> ExitCode {
    match write_default_config(output) {
        Ok(()) => {
            println!("Configuration template written to: {}", output.display());
            exit_code::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            exit_code::CONFIG_ERROR
        }
    }
}

/// Runs the delivery with the given configuration.
///
/// Excluded from coverage - requires async runtime.
#[cfg(not(tarpaulin_include))]
fn run_application(config: ValidatedConfig) -> ExitCode {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to create Tokio runtime: {e}");
            return exit_code::runtime_error();
        }
    };

    match runtime.block_on(run::execute(config)) {
        Ok(DeliveryReport::Succeeded {
            uuid,
            attempts,
            status,
        }) => {
            tracing::info!(%uuid, attempts, "Webhook delivered with status {status}");
            exit_code::SUCCESS
        }
        Ok(DeliveryReport::Exhausted {
            uuid,
            attempts,
            last_error,
        }) => {
            tracing::warn!(%uuid, attempts, "Webhook not delivered: {last_error}");
            exit_code::SUCCESS
        }
        Err(e) => {
            tracing::error!("Application error: {e}");
            exit_code_for(&e)
        }
    }
}
