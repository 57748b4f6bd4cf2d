use std::process::ExitCode;

use craftwire::utils::logging::init_logging;
use craftwire::utils::metrics::global_metrics;
use craftwire::{HandlerRegistry, Server, ServerSettings};
use tracing::{error, info};

/// Load settings from the file named by the first argument (or
/// `CRAFTWIRE_CONFIG`), then apply `CRAFTWIRE_*` overrides.
fn load_settings() -> craftwire::Result<ServerSettings> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("CRAFTWIRE_CONFIG").ok());

    let mut settings = match path {
        Some(path) => ServerSettings::from_file(path)?,
        None => ServerSettings::default(),
    };
    settings.apply_env()?;
    settings.validate_strict()?;
    Ok(settings)
}

#[tokio::main]
async fn main() -> ExitCode {
    let settings = match load_settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&settings.logging) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }
    info!(app = %settings.logging.app_name, "Starting");

    let server = match Server::bind(settings, HandlerRegistry::with_defaults()).await {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "Failed to bind");
            return ExitCode::FAILURE;
        }
    };

    let outcome = server.run().await;
    global_metrics().log_metrics();

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Server stopped");
            ExitCode::FAILURE
        }
    }
}
