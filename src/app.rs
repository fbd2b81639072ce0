//! Process wiring
//!
//! Opens the links, builds the session and state machine, and runs the
//! control loop next to the operator reset listener until Ctrl-C.

use std::sync::Arc;
use std::time::Instant;

use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

use crate::actuator::{self, Actuator};
use crate::control::{run_reset_listener, ControlLoop};
use crate::core::{Config, Error, Result};
use crate::protocol::ValidatorMachine;
use crate::session::{SessionHandle, SessionPolicy};
use crate::transport::{open_validator_link, ValidatorLink};

/// Installs the log subscriber with `HH:MM:SS` timestamps.
///
/// `RUST_LOG` takes precedence over the verbosity flag.
pub fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("billgate={}", level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(ChronoLocal::new("%H:%M:%S".to_string()))
        .with_target(false)
        .try_init();
}

/// Runs the service with the given configuration until Ctrl-C
pub async fn run(config: Config) -> Result<()> {
    config.validate()?;

    let link = open_validator_link(
        &config.validator_port,
        config.validator_baud,
        config.read_timeout,
    )?;
    let actuator = actuator::connect(config.actuator_port.as_deref(), config.actuator_baud);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutting down");
            }
            cancel.cancel();
        });
    }

    serve(link, actuator, &config, cancel).await
}

/// Runs the control loop over an open link until cancelled.
///
/// The loop runs on a blocking thread; the reset listener reads stdin.
pub async fn serve<L>(
    link: L,
    actuator: Arc<dyn Actuator>,
    config: &Config,
    cancel: CancellationToken,
) -> Result<()>
where
    L: ValidatorLink + 'static,
{
    let session = SessionHandle::new(SessionPolicy::from(config), actuator, Instant::now());
    let machine = ValidatorMachine::new(config.denominations.clone(), session.clone());
    let mut control = ControlLoop::new(link, machine, config.poll_interval);

    let policy = session.policy();
    tracing::info!(
        target_amount = policy.target_amount,
        timeout_secs = policy.timeout.as_secs_f64(),
        reset_on_unlock = policy.reset_on_unlock,
        denominations = config.denominations.len(),
        "session configured"
    );

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            let stdin = BufReader::new(tokio::io::stdin());
            if let Err(e) = run_reset_listener(stdin, session, cancel).await {
                tracing::warn!(error = %e, "operator input failed");
            }
        }
    });

    let loop_cancel = cancel.clone();
    let outcome = tokio::task::spawn_blocking(move || control.run(&loop_cancel))
        .await
        .map_err(|e| Error::transport(format!("Control loop task failed: {}", e)))?;

    // the listener has nothing left to reset once the loop is gone
    cancel.cancel();
    outcome
}
