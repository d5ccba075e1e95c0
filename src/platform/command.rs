//! Timeout-bounded external commands.
//!
//! GPU probes shell out to vendor tools that can hang (or, like
//! `intel_gpu_top`, never exit on their own). Every call here has a
//! deadline after which the child is killed. Streaming commands can also be
//! stopped early once their output is complete.

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Result, SysfeedError};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Run `program` to completion, killing it after `timeout`.
///
/// Returns stdout when the command exits successfully.
pub fn run_with_timeout(program: &str, args: &[&str], timeout: Duration) -> Result<String> {
    let (mut child, reader) = spawn_captured(program, args)?;
    let deadline = Instant::now() + timeout;

    loop {
        if let Some(status) = child.try_wait()? {
            let stdout = join_reader(reader);
            if !status.success() {
                return Err(SysfeedError::other(format!(
                    "{} exited with {}",
                    program, status
                )));
            }
            return Ok(stdout);
        }

        if Instant::now() >= deadline {
            kill(&mut child);
            // a grandchild may still hold the pipe; don't wait on the reader
            drop(reader);
            return Err(SysfeedError::command_timeout(
                program,
                timeout.as_millis() as u64,
            ));
        }

        thread::sleep(POLL_INTERVAL);
    }
}

/// Let a streaming command run for at most `window`, stopping it as soon as
/// `done` accepts what it has printed so far.
///
/// Returns the captured stdout. A command that exits early with a failure
/// status is an error; one that exits early successfully just returns its
/// output.
pub fn capture_until<F>(program: &str, args: &[&str], window: Duration, done: F) -> Result<String>
where
    F: Fn(&str) -> bool,
{
    let (mut child, captured, reader) = spawn_streaming(program, args)?;
    let deadline = Instant::now() + window;

    while Instant::now() < deadline {
        if let Some(status) = child.try_wait()? {
            let _ = reader.join();
            if !status.success() {
                return Err(SysfeedError::other(format!(
                    "{} exited with {}",
                    program, status
                )));
            }
            return Ok(snapshot(&captured));
        }

        let so_far = snapshot(&captured);
        if done(&so_far) {
            kill(&mut child);
            return Ok(so_far);
        }

        thread::sleep(POLL_INTERVAL);
    }

    kill(&mut child);
    let _ = reader.join();
    Ok(snapshot(&captured))
}

/// Run a PowerShell command and parse its JSON output
pub fn run_powershell_json<T: DeserializeOwned>(command: &str, timeout: Duration) -> Result<T> {
    let stdout = run_with_timeout(
        "powershell",
        &["-NoProfile", "-NonInteractive", "-Command", command],
        timeout,
    )?;

    serde_json::from_str(stdout.trim())
        .map_err(|e| SysfeedError::other(format!("JSON parsing failed: {e}. Output: {stdout}")))
}

fn spawn_captured(program: &str, args: &[&str]) -> Result<(Child, thread::JoinHandle<String>)> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| SysfeedError::other(format!("Failed to run {}: {}", program, e)))?;

    // Drain stdout on a separate thread so a chatty child never blocks on a
    // full pipe while we poll it.
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| SysfeedError::other(format!("{} has no stdout", program)))?;
    let reader = thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stdout.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    });

    Ok((child, reader))
}

fn join_reader(reader: thread::JoinHandle<String>) -> String {
    reader.join().unwrap_or_default()
}

type Captured = Arc<Mutex<Vec<u8>>>;

/// Like `spawn_captured`, but stdout lands in a shared buffer chunk by chunk
/// so it can be inspected while the child is still running.
fn spawn_streaming(
    program: &str,
    args: &[&str],
) -> Result<(Child, Captured, thread::JoinHandle<()>)> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| SysfeedError::other(format!("Failed to run {}: {}", program, e)))?;

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| SysfeedError::other(format!("{} has no stdout", program)))?;
    let captured: Captured = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&captured);
    let reader = thread::spawn(move || {
        let mut chunk = [0u8; 4096];
        loop {
            match stdout.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => sink.lock().extend_from_slice(&chunk[..n]),
            }
        }
    });

    Ok((child, captured, reader))
}

fn snapshot(captured: &Captured) -> String {
    String::from_utf8_lossy(&captured.lock()).into_owned()
}

fn kill(child: &mut Child) {
    if let Err(e) = child.kill() {
        log::debug!("Failed to kill child process: {}", e);
    }
    let _ = child.wait();
}
