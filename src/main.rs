//! urbanform CLI - street-network metrics for world cities
//!
//! Usage: urbanform <command> [arguments]

mod cities_cmd;
mod cli;
mod compute_cmd;
mod fetch_cmd;
mod progress;
mod status_cmd;

use std::process::ExitCode;

use cli::{parse_args_from, print_usage, requested_output_format, Command};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use urbanform::error_codes;
use urbanform::output::{generate_execution_id, output_json, ErrorResponse, JsonResponse};
use urbanform::OutputFormat;

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "urbanform=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Print a failure in the requested format
fn report_error(err: &anyhow::Error, code: &str, output_format: OutputFormat) {
    match output_format {
        OutputFormat::Json => {
            let response = ErrorResponse {
                error: code.to_string(),
                message: format!("{:#}", err),
            };
            if output_json(&JsonResponse::new(response, generate_execution_id())).is_err() {
                eprintln!("Error: {:#}", err);
            }
        }
        OutputFormat::Human => eprintln!("Error: {:#}", err),
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = match parse_args_from(&args) {
        Ok(command) => command,
        Err(e) => {
            let output_format = requested_output_format(&args);
            report_error(&e, error_codes::URB_CLI_001_INVALID_ARGS, output_format);
            if output_format == OutputFormat::Human {
                eprintln!();
                print_usage();
            }
            return ExitCode::from(1);
        }
    };

    let output_format = command.output_format();
    let result = match command {
        Command::Version => {
            println!("{}", urbanform::version::version());
            return ExitCode::SUCCESS;
        }
        Command::Help => {
            print_usage();
            return ExitCode::SUCCESS;
        }
        Command::Cities {
            config,
            band,
            output_format,
        } => {
            init_tracing();
            cities_cmd::run_cities(config, band, output_format)
        }
        Command::Fetch {
            config,
            fetch,
            band,
            progress,
            output_format,
        } => {
            init_tracing();
            fetch_cmd::run_fetch(config, fetch, band, progress, output_format)
        }
        Command::Compute {
            config,
            progress,
            output_format,
        } => {
            init_tracing();
            compute_cmd::run_compute(config, progress, output_format)
        }
        Command::Status {
            config,
            output_format,
        } => {
            init_tracing();
            status_cmd::run_status(config, output_format)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e, error_codes::code_for(&e), output_format);
            ExitCode::from(1)
        }
    }
}
