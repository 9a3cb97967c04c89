//! External tool invocation under wall-clock deadlines
//!
//! Converters and the OCR engine may hang on odd inputs or be missing
//! entirely. Both conditions surface as [`Error::ExternalTool`] so callers
//! can move on to the next fallback tier.

use std::io::Read;
use std::process::{Command, Output, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Check whether `binary` can be spawned at all
pub fn is_available(binary: &str, probe_arg: &str) -> bool {
    Command::new(binary)
        .arg(probe_arg)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|_| true) // some tools exit non-zero on a bare probe, spawning is enough
        .unwrap_or(false)
}

/// Run `command` to completion, killing it once `timeout` elapses.
///
/// Stdout and stderr are drained on helper threads so a chatty tool cannot
/// block on a full pipe while we wait for it.
///
/// This blocks the calling thread. The whole pipeline is synchronous and the
/// upload workflow runs it on `spawn_blocking`, so no runtime worker is held.
pub fn run_with_timeout(command: &mut Command, tool: &str, timeout: Duration) -> Result<Output> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::external_tool(tool, format!("failed to spawn: {}", e)))?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let stdout_reader = thread::spawn(move || drain(stdout));
    let stderr_reader = thread::spawn(move || drain(stderr));

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                tracing::warn!("{} killed after {}s timeout", tool, timeout.as_secs());
                return Err(Error::external_tool(
                    tool,
                    format!("timed out after {}s", timeout.as_secs()),
                ));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                let _ = child.kill();
                return Err(Error::external_tool(tool, format!("wait failed: {}", e)));
            }
        }
    };

    Ok(Output {
        status,
        stdout: stdout_reader.join().unwrap_or_default(),
        stderr: stderr_reader.join().unwrap_or_default(),
    })
}

/// Like [`run_with_timeout`] but a non-zero exit status is also an error
pub fn run_checked(command: &mut Command, tool: &str, timeout: Duration) -> Result<Output> {
    let output = run_with_timeout(command, tool, timeout)?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::external_tool(
            tool,
            format!("exited with {}: {}", output.status, stderr.trim()),
        ));
    }
    Ok(output)
}

/// Run an in-process job on a helper thread and give up waiting after `timeout`.
///
/// Used for parsing libraries that can spin forever on malformed fonts. A
/// panic inside the job comes back as [`Error::Internal`] instead of
/// unwinding into the caller. The thread cannot be cancelled, only abandoned.
pub fn run_with_deadline<T, F>(label: &str, timeout: Duration, job: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();

    let handle = thread::spawn(move || {
        let _ = tx.send(job());
    });

    match rx.recv_timeout(timeout) {
        Ok(value) => {
            let _ = handle.join();
            Ok(value)
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            tracing::error!("{} still running after {}s, abandoning it", label, timeout.as_secs());
            Err(Error::external_tool(
                label,
                format!("timed out after {}s", timeout.as_secs()),
            ))
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            tracing::error!("{} thread crashed", label);
            Err(Error::internal(format!("{} worker thread panicked", label)))
        }
    }
}

fn drain<R: Read>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf);
    }
    buf
}


/// Executable shell scripts standing in for converters and the OCR engine
#[cfg(all(test, unix))]
pub(crate) mod stubs {
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use std::process::Command;
    use std::time::Duration;

    /// Write `body` as an executable `/bin/sh` script named `name` in `dir`
    pub fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

        // a concurrent fork in another test can briefly hold the write fd (ETXTBSY)
        for _ in 0..100 {
            match Command::new(&path).output() {
                Err(e) if e.raw_os_error() == Some(26) => std::thread::sleep(Duration::from_millis(20)),
                _ => break,
            }
        }
        path
    }
}
