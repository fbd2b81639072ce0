//! Control loop
//!
//! Drives the validator pipeline: decode one event, answer it, then run the
//! session timeout check and the optional keep-alive poll. Every read is bounded
//! by the link timeout, so one iteration never blocks for long and the loop
//! notices cancellation promptly.

mod listener;

pub use self::listener::{is_reset_command, run_reset_listener};

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::core::Result;
use crate::protocol::{decode_next, ProtocolResponse, ValidatorMachine, ValidatorState};
use crate::session::SessionHandle;
use crate::transport::ValidatorLink;

/// Drives one validator link
pub struct ControlLoop<L> {
    link: L,
    machine: ValidatorMachine,
    poll_interval: Option<Duration>,
    last_poll: Option<Instant>,
}

impl<L: ValidatorLink> ControlLoop<L> {
    /// Creates a loop over a link and a machine
    pub fn new(link: L, machine: ValidatorMachine, poll_interval: Option<Duration>) -> Self {
        ControlLoop {
            link,
            machine,
            poll_interval,
            last_poll: None,
        }
    }

    /// Session driven by this loop
    pub fn session(&self) -> &SessionHandle {
        self.machine.session()
    }

    /// Validator handshake state
    pub fn validator_state(&self) -> ValidatorState {
        self.machine.state()
    }

    /// The validator link
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Runs until cancelled or the link fails
    pub fn run(&mut self, cancel: &CancellationToken) -> Result<()> {
        tracing::info!("ready, waiting for bills");
        while !cancel.is_cancelled() {
            self.step()?;
        }
        tracing::info!("control loop stopped");
        Ok(())
    }

    /// Performs one iteration: at most one event, then housekeeping
    pub fn step(&mut self) -> Result<()> {
        if let Some(event) = decode_next(&mut self.link)? {
            if let Some(response) = self.machine.handle_event(event, Instant::now()) {
                self.respond(response);
            }
        }
        self.housekeeping(Instant::now());
        Ok(())
    }

    /// Session timeout check and keep-alive poll
    pub fn housekeeping(&mut self, now: Instant) {
        self.machine.session().check_timeout(now);

        let Some(interval) = self.poll_interval else {
            return;
        };
        if self.machine.state() != ValidatorState::Armed {
            return;
        }
        let due = match self.last_poll {
            Some(last) => now.saturating_duration_since(last) >= interval,
            None => true,
        };
        if due {
            self.last_poll = Some(now);
            self.respond(ProtocolResponse::Poll);
        }
    }

    fn respond(&mut self, response: ProtocolResponse) {
        tracing::trace!(?response, "sending response");
        if let Err(e) = response.send(&mut self.link) {
            tracing::warn!(?response, error = %e, "failed to write to validator");
        }
    }
}
