use std::{
    io::{Read, Seek, SeekFrom},
    process::{Command, Stdio},
    thread,
    time::{Duration, Instant},
};
use tracing::{debug, warn};

use crate::error::ExtractError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Run `command` to completion, killing it once `timeout` has elapsed.
///
/// stdout is discarded and stderr is spooled to an anonymous temp file, so a
/// chatty child can never block on a full pipe while we poll it.
pub fn run_with_timeout(mut command: Command, timeout: Duration) -> Result<(), ExtractError> {
    let program = command.get_program().to_string_lossy().into_owned();

    let mut stderr_file = tempfile::tempfile().map_err(|source| ExtractError::Io {
        action: format!("creating stderr spool for {program}"),
        source,
    })?;
    let stderr_handle = stderr_file.try_clone().map_err(|source| ExtractError::Io {
        action: format!("cloning stderr spool for {program}"),
        source,
    })?;

    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::from(stderr_handle));

    let start = Instant::now();
    let mut child = command.spawn().map_err(|source| ExtractError::Spawn {
        program: program.clone(),
        source,
    })?;

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if start.elapsed() >= timeout => {
                let _ = child.kill();
                let _ = child.wait();
                warn!(program = %program, timeout = ?timeout, "subprocess timed out");
                return Err(ExtractError::Timeout {
                    program,
                    secs: timeout.as_secs(),
                });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(source) => {
                let _ = child.kill();
                return Err(ExtractError::Spawn { program, source });
            }
        }
    };
    debug!(program = %program, elapsed = ?start.elapsed(), %status, "subprocess finished");

    if !status.success() {
        let mut stderr = String::new();
        // best effort: the exit status is the real error
        let _ = stderr_file
            .seek(SeekFrom::Start(0))
            .and_then(|_| stderr_file.read_to_string(&mut stderr));
        return Err(ExtractError::Tool {
            program,
            status: status.to_string(),
            stderr: stderr.trim().to_string(),
        });
    }

    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn succeeds_for_zero_exit() {
        run_with_timeout(sh("exit 0"), Duration::from_secs(5)).unwrap();
    }

    #[test]
    fn reports_exit_status_and_stderr() {
        match run_with_timeout(sh("echo broken page >&2; exit 3"), Duration::from_secs(5)) {
            Err(ExtractError::Tool {
                program, stderr, ..
            }) => {
                assert_eq!(program, "sh");
                assert_eq!(stderr, "broken page");
            }
            other => panic!("expected Tool error, got {other:?}"),
        }
    }

    #[test]
    fn kills_hung_children() {
        let start = Instant::now();
        let err = run_with_timeout(sh("sleep 10"), Duration::from_millis(200)).unwrap_err();
        assert!(matches!(err, ExtractError::Timeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let err = run_with_timeout(
            Command::new("definitely-not-an-ocr-binary"),
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, ExtractError::Spawn { .. }));
    }
}
