//! Payment session
//!
//! There is one session per process. The control loop credits bills and runs
//! the idle timeout; the operator listener resets it. Both go through a
//! `SessionHandle`, which holds the lock only for each read-modify-write and
//! calls the actuator after the lock is released. A separate dispatch lock
//! spans each mutation and the relay command it produces, so relay commands
//! reach the actuator in the same order as the session changes.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::actuator::Actuator;
use crate::core::Config;

/// Session record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    /// Sum of accepted bills since the last reset
    pub accumulated_value: u64,
    /// Last accepted bill or reset
    pub last_activity: Instant,
    /// Whether value has been accumulated in this session
    pub active: bool,
    /// Whether this session already fired unlock
    pub unlocked: bool,
}

impl Session {
    /// Creates an empty session
    pub fn new(now: Instant) -> Self {
        Session {
            accumulated_value: 0,
            last_activity: now,
            active: false,
            unlocked: false,
        }
    }

    fn clear(&mut self) {
        self.accumulated_value = 0;
        self.active = false;
        self.unlocked = false;
    }
}

/// Session rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    /// Amount that triggers unlock
    pub target_amount: u64,
    /// Idle time after which an active session is dropped
    pub timeout: Duration,
    /// Clear the session as soon as it unlocks instead of keeping it until
    /// reset or timeout
    pub reset_on_unlock: bool,
}

impl From<&Config> for SessionPolicy {
    fn from(config: &Config) -> Self {
        SessionPolicy {
            target_amount: config.target_amount,
            timeout: config.session_timeout,
            reset_on_unlock: config.reset_on_unlock,
        }
    }
}

/// Result of crediting a bill
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Credit {
    /// Session total including this bill
    pub total: u64,
    /// Whether this bill crossed the target
    pub unlocked: bool,
}

/// Why a session was reset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    /// Operator command
    Manual,
    /// No bill within the session timeout
    Timeout,
}

/// Shared handle to the session
#[derive(Clone)]
pub struct SessionHandle {
    session: Arc<Mutex<Session>>,
    dispatch: Arc<Mutex<()>>,
    actuator: Arc<dyn Actuator>,
    policy: SessionPolicy,
}

impl SessionHandle {
    /// Creates the process session
    pub fn new(policy: SessionPolicy, actuator: Arc<dyn Actuator>, now: Instant) -> Self {
        SessionHandle {
            session: Arc::new(Mutex::new(Session::new(now))),
            dispatch: Arc::new(Mutex::new(())),
            actuator,
            policy,
        }
    }

    /// Session rules in effect
    pub fn policy(&self) -> SessionPolicy {
        self.policy
    }

    /// Copy of the current session
    pub fn snapshot(&self) -> Session {
        *self.lock()
    }

    /// Adds an accepted bill and unlocks on the first crossing of the target
    pub fn credit(&self, value: u64, now: Instant) -> Credit {
        let _dispatch = self.dispatch();
        let credit = {
            let mut session = self.lock();
            session.accumulated_value = session.accumulated_value.saturating_add(value);
            session.last_activity = now;
            session.active = true;

            let total = session.accumulated_value;
            let unlocked = !session.unlocked && total >= self.policy.target_amount;
            if unlocked {
                if self.policy.reset_on_unlock {
                    session.clear();
                } else {
                    session.unlocked = true;
                }
            }
            Credit { total, unlocked }
        };

        tracing::info!(value, total = credit.total, "bill accepted");
        if credit.unlocked {
            tracing::info!(
                total = credit.total,
                target = self.policy.target_amount,
                "UNLOCK triggered"
            );
            self.actuator.unlock();
        }
        credit
    }

    /// Drops an active session that has been idle longer than the timeout.
    ///
    /// Returns whether the session was reset.
    pub fn check_timeout(&self, now: Instant) -> bool {
        let _dispatch = self.dispatch();
        let expired = {
            let mut session = self.lock();
            let idle = now.saturating_duration_since(session.last_activity);
            let expired = session.active && idle > self.policy.timeout;
            if expired {
                session.clear();
            }
            expired
        };

        if expired {
            self.relock(ResetReason::Timeout);
        }
        expired
    }

    /// Resets the session unconditionally and locks
    pub fn reset(&self, now: Instant) {
        let _dispatch = self.dispatch();
        {
            let mut session = self.lock();
            session.clear();
            session.last_activity = now;
        }
        self.relock(ResetReason::Manual);
    }

    fn relock(&self, reason: ResetReason) {
        match reason {
            ResetReason::Manual => tracing::info!("session reset by operator"),
            ResetReason::Timeout => tracing::info!(
                timeout_secs = self.policy.timeout.as_secs_f64(),
                "session timed out"
            ),
        }
        tracing::info!("LOCK triggered");
        self.actuator.lock();
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(&self) -> MutexGuard<'_, ()> {
        self.dispatch.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::recording::RecordingActuator;

    fn handle(
        target: u64,
        timeout_secs: u64,
        reset_on_unlock: bool,
    ) -> (SessionHandle, Arc<RecordingActuator>, Instant) {
        let actuator = Arc::new(RecordingActuator::default());
        let start = Instant::now();
        let policy = SessionPolicy {
            target_amount: target,
            timeout: Duration::from_secs(timeout_secs),
            reset_on_unlock,
        };
        (SessionHandle::new(policy, actuator.clone(), start), actuator, start)
    }

    #[test]
    fn test_new_session_is_empty() {
        let (session, actuator, start) = handle(100, 60, true);
        let snapshot = session.snapshot();
        assert_eq!(snapshot.accumulated_value, 0);
        assert!(!snapshot.active);
        assert_eq!(snapshot.last_activity, start);
        assert_eq!(actuator.unlocks(), 0);
    }

    #[test]
    fn test_credit_below_target() {
        let (session, actuator, start) = handle(250, 60, true);
        let later = start + Duration::from_secs(3);

        let credit = session.credit(100, later);

        assert_eq!(credit, Credit { total: 100, unlocked: false });
        let snapshot = session.snapshot();
        assert_eq!(snapshot.accumulated_value, 100);
        assert!(snapshot.active);
        assert_eq!(snapshot.last_activity, later);
        assert_eq!(actuator.unlocks(), 0);
    }

    #[test]
    fn test_unlock_clears_session_when_configured() {
        let (session, actuator, start) = handle(100, 60, true);

        let credit = session.credit(100, start);
        assert_eq!(credit, Credit { total: 100, unlocked: true });
        assert_eq!(actuator.unlocks(), 1);

        let snapshot = session.snapshot();
        assert_eq!(snapshot.accumulated_value, 0);
        assert!(!snapshot.active);

        // next payment starts a new session and unlocks again
        let credit = session.credit(200, start);
        assert_eq!(credit, Credit { total: 200, unlocked: true });
        assert_eq!(actuator.unlocks(), 2);
    }

    #[test]
    fn test_unlock_fires_once_when_session_kept() {
        let (session, actuator, start) = handle(100, 60, false);

        assert!(session.credit(100, start).unlocked);
        assert!(!session.credit(200, start).unlocked);
        assert_eq!(actuator.unlocks(), 1);

        let snapshot = session.snapshot();
        assert_eq!(snapshot.accumulated_value, 300);
        assert!(snapshot.active);
        assert!(snapshot.unlocked);

        // a reset re-arms the crossing
        session.reset(start);
        assert!(session.credit(100, start).unlocked);
        assert_eq!(actuator.unlocks(), 2);
    }

    #[test]
    fn test_timeout_resets_idle_session() {
        let (session, actuator, start) = handle(100, 5, true);
        session.credit(50, start);

        assert!(!session.check_timeout(start + Duration::from_secs(5)));
        assert_eq!(session.snapshot().accumulated_value, 50);

        assert!(session.check_timeout(start + Duration::from_secs(6)));
        let snapshot = session.snapshot();
        assert_eq!(snapshot.accumulated_value, 0);
        assert!(!snapshot.active);
        assert_eq!(actuator.locks(), 1);

        // an inactive session never times out again
        assert!(!session.check_timeout(start + Duration::from_secs(60)));
        assert_eq!(actuator.locks(), 1);
    }

    #[test]
    fn test_timeout_applies_after_unlock_when_session_kept() {
        let (session, actuator, start) = handle(100, 5, false);
        session.credit(200, start);
        assert_eq!(actuator.unlocks(), 1);

        assert!(session.check_timeout(start + Duration::from_secs(10)));
        assert_eq!(session.snapshot().accumulated_value, 0);
        assert!(!session.snapshot().unlocked);
        assert_eq!(actuator.locks(), 1);
    }

    #[test]
    fn test_activity_postpones_timeout() {
        let (session, actuator, start) = handle(1000, 5, true);
        session.credit(100, start);
        session.credit(100, start + Duration::from_secs(4));

        assert!(!session.check_timeout(start + Duration::from_secs(8)));
        assert!(session.check_timeout(start + Duration::from_secs(10)));
        assert_eq!(actuator.locks(), 1);
    }

    #[test]
    fn test_manual_reset_always_locks() {
        let (session, actuator, start) = handle(1000, 60, true);

        // idle session
        session.reset(start);
        assert_eq!(actuator.locks(), 1);

        // mid-accumulation
        session.credit(200, start);
        let later = start + Duration::from_secs(1);
        session.reset(later);

        let snapshot = session.snapshot();
        assert_eq!(snapshot.accumulated_value, 0);
        assert!(!snapshot.active);
        assert_eq!(snapshot.last_activity, later);
        assert_eq!(actuator.locks(), 2);
    }

    #[test]
    fn test_policy_from_config() {
        let mut config = Config::default();
        config.target_amount = 300;
        config.reset_on_unlock = false;

        let policy = SessionPolicy::from(&config);
        assert_eq!(policy.target_amount, 300);
        assert_eq!(policy.timeout, Duration::from_secs(60));
        assert!(!policy.reset_on_unlock);
    }

    #[test]
    fn test_concurrent_credit_and_reset() {
        let (session, _actuator, start) = handle(u64::MAX, 60, false);
        let worker = {
            let session = session.clone();
            std::thread::spawn(move || {
                for _ in 0..1000 {
                    session.credit(1, start);
                }
            })
        };
        for _ in 0..10 {
            session.reset(start);
        }
        worker.join().unwrap();

        let snapshot = session.snapshot();
        assert!(snapshot.accumulated_value <= 1000);
    }

    /// Relay that takes a while to switch and records command order
    #[derive(Default)]
    struct SlowRelay {
        commands: Mutex<Vec<&'static str>>,
    }

    impl Actuator for SlowRelay {
        fn unlock(&self) {
            std::thread::sleep(Duration::from_millis(50));
            self.commands.lock().unwrap().push("UNLOCK");
        }

        fn lock(&self) {
            self.commands.lock().unwrap().push("LOCK");
        }
    }

    #[test]
    fn test_reset_during_unlock_ends_locked() {
        let relay = Arc::new(SlowRelay::default());
        let start = Instant::now();
        let policy = SessionPolicy {
            target_amount: 100,
            timeout: Duration::from_secs(60),
            reset_on_unlock: false,
        };
        let session = SessionHandle::new(policy, relay.clone(), start);

        let payer = {
            let session = session.clone();
            std::thread::spawn(move || session.credit(100, start))
        };
        while !session.snapshot().unlocked {
            std::thread::yield_now();
        }
        // the unlock command is still being sent
        session.reset(start);
        assert!(payer.join().unwrap().unlocked);

        assert_eq!(*relay.commands.lock().unwrap(), vec!["UNLOCK", "LOCK"]);
        let snapshot = session.snapshot();
        assert_eq!(snapshot.accumulated_value, 0);
        assert!(!snapshot.active);
    }
}
