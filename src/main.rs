use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use billgate::core::{Config, Error, Result};
use clap::Parser;

/// Bill validator session controller
#[derive(Parser, Debug)]
#[command(name = "billgate")]
#[command(version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Validator serial port
    #[arg(short = 'p', long)]
    port: Option<String>,

    /// Relay actuator serial port
    #[arg(short = 'a', long)]
    actuator_port: Option<String>,

    /// Amount that unlocks the service
    #[arg(short = 't', long)]
    target: Option<u64>,

    /// Session idle timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Keep the session after unlock until reset or timeout
    #[arg(long)]
    keep_session: bool,

    /// Keep-alive poll interval in seconds
    #[arg(long)]
    poll_interval: Option<f64>,

    /// Show debug output
    #[arg(short = 'v', long)]
    verbose: bool,
}

impl Args {
    /// Loads the config file, if any, and applies command line overrides
    fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        if let Some(port) = self.port {
            config.validator_port = port;
        }
        if let Some(port) = self.actuator_port {
            config.actuator_port = Some(port);
        }
        if let Some(target) = self.target {
            config.target_amount = target;
        }
        if let Some(secs) = self.timeout {
            config.session_timeout = Duration::from_secs(secs);
        }
        if self.keep_session {
            config.reset_on_unlock = false;
        }
        if let Some(secs) = self.poll_interval {
            let interval = Duration::try_from_secs_f64(secs)
                .map_err(|e| Error::config(format!("Invalid poll interval: {}", e)))?;
            config.poll_interval = Some(interval);
        }

        Ok(config)
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    billgate::app::init_logging(args.verbose);

    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(billgate::app::run(config));
    // stdin reads block a runtime thread; do not wait for them
    runtime.shutdown_background();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_apply_over_defaults() {
        let args = Args::parse_from([
            "billgate",
            "--port",
            "/dev/ttyUSB0",
            "--target",
            "250",
            "--timeout",
            "5",
            "--keep-session",
            "--poll-interval",
            "0.5",
        ]);
        let config = args.into_config().unwrap();

        assert_eq!(config.validator_port, "/dev/ttyUSB0");
        assert_eq!(config.target_amount, 250);
        assert_eq!(config.session_timeout, Duration::from_secs(5));
        assert!(!config.reset_on_unlock);
        assert_eq!(config.poll_interval, Some(Duration::from_millis(500)));
        assert_eq!(config.actuator_port, None);
    }

    #[test]
    fn test_missing_config_file_is_error() {
        let args = Args::parse_from(["billgate", "--config", "/nonexistent/billgate.toml"]);
        assert!(matches!(args.into_config(), Err(Error::Config(_))));
    }
}
