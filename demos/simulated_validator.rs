use billgate::actuator::RelayActuator;
use billgate::control::ControlLoop;
use billgate::core::Config;
use billgate::protocol::{ValidatorMachine, ESCROW, POWER1};
use billgate::session::{SessionHandle, SessionPolicy};
use billgate::transport::StreamLink;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Validator stand-in that replays a fixed byte sequence
struct ScriptedValidator {
    script: VecDeque<Option<u8>>,
}

impl Read for ScriptedValidator {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.script.pop_front() {
            Some(Some(byte)) => {
                buf[0] = byte;
                Ok(1)
            }
            _ => Err(io::Error::new(io::ErrorKind::TimedOut, "no data")),
        }
    }
}

impl Write for ScriptedValidator {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        println!("host -> validator: {:02X?}", buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn main() {
    let mut config = Config::default();
    config.target_amount = 250;
    config.session_timeout = Duration::from_secs(5);

    println!("Simulated validator session:");
    println!("- Target amount: {}", config.target_amount);
    for denomination in config.denominations.iter() {
        println!("- Bill 0x{:02X} = {}", denomination.code, denomination.value);
    }

    let script = [
        Some(POWER1),
        Some(ESCROW),
        Some(0x40),
        None,
        Some(ESCROW),
        Some(0x42), // unknown bill, rejected
        Some(ESCROW),
        Some(0x41),
    ];
    let link = StreamLink::new(ScriptedValidator {
        script: script.iter().copied().collect(),
    });

    // relay commands go to stdout
    let actuator = Arc::new(RelayActuator::new(io::stdout()));
    let session = SessionHandle::new(SessionPolicy::from(&config), actuator, Instant::now());
    let machine = ValidatorMachine::new(config.denominations.clone(), session.clone());
    let mut control = ControlLoop::new(link, machine, config.poll_interval);

    for _ in 0..script.len() {
        if let Err(e) = control.step() {
            eprintln!("Control loop error: {}", e);
            return;
        }
    }

    let snapshot = session.snapshot();
    println!(
        "\nSession: amount={} active={}",
        snapshot.accumulated_value, snapshot.active
    );

    // a later bill left idle past the timeout relocks
    session.credit(100, Instant::now());
    session.check_timeout(Instant::now() + Duration::from_secs(6));
    println!("After timeout: amount={}", session.snapshot().accumulated_value);
}
