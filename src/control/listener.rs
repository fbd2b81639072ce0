use std::time::{Duration, Instant};

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;

use crate::core::Result;
use crate::session::SessionHandle;

/// Longest single wait for operator input
const INPUT_WAIT: Duration = Duration::from_secs(1);

/// Whether an operator line asks for a session reset
pub fn is_reset_command(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("reset")
}

/// Reads operator lines and resets the session on `reset`.
///
/// Ends when cancelled or when the input closes.
pub async fn run_reset_listener<R>(
    input: R,
    session: SessionHandle,
    cancel: CancellationToken,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    tracing::info!("type 'reset' to restart session");
    let mut lines = input.lines();

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            read = tokio::time::timeout(INPUT_WAIT, lines.next_line()) => match read {
                Err(_) => continue,
                Ok(line) => line?,
            },
        };

        match line {
            Some(line) if is_reset_command(&line) => session.reset(Instant::now()),
            Some(line) => tracing::debug!(input = line.trim(), "ignoring operator input"),
            None => {
                tracing::debug!("operator input closed");
                break;
            }
        }
    }

    Ok(())
}
