//! Blocking external-process invocation with captured output and a deadline.
//!
//! Spawns the tool as a child process, drains stdout and stderr on background
//! threads so the pipes never fill, and waits for completion. A deadline, when
//! given, kills the child rather than letting one stuck invocation hold a
//! worker slot forever.

use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::AppError;

/// How often a deadline-bounded wait checks the child.
const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Keep only the last N bytes of each stream to avoid unbounded memory growth.
const MAX_CAPTURED_BYTES: usize = 64 * 1024;

/// Captured streams of a successful invocation.
#[derive(Debug)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

fn capture_stream<R: Read + Send + 'static>(
    reader: R,
    sink: Arc<Mutex<Vec<u8>>>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut stream_reader = BufReader::new(reader);
        let mut line = Vec::with_capacity(256);
        while stream_reader.read_until(b'\n', &mut line).unwrap_or(0) > 0 {
            let mut guard = sink.lock();
            guard.extend_from_slice(&line);
            if guard.len() > MAX_CAPTURED_BYTES {
                let excess = guard.len() - MAX_CAPTURED_BYTES;
                guard.drain(..excess);
            }
            line.clear();
        }
    })
}

/// Run a tool and block until it exits or the deadline passes.
///
/// A non-zero exit maps to [`AppError::ToolFailed`] carrying the captured
/// stderr; a blown deadline kills the child and maps to
/// [`AppError::ToolTimedOut`].
pub fn run_tool_blocking(
    program: &Path,
    args: &[String],
    timeout: Option<Duration>,
) -> Result<ToolOutput, AppError> {
    let tool = program
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.to_string_lossy().into_owned());

    log::debug!(
        target: "playclip::ffmpeg::runner",
        "spawning {}: {}",
        tool,
        args.join(" ")
    );

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = match child.stdout.take() {
        Some(stream) => stream,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(std::io::Error::other("failed to capture stdout").into());
        }
    };
    let stderr = match child.stderr.take() {
        Some(stream) => stream,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(std::io::Error::other("failed to capture stderr").into());
        }
    };

    let stdout_buffer = Arc::new(Mutex::new(Vec::new()));
    let stderr_buffer = Arc::new(Mutex::new(Vec::new()));
    let stdout_handle = capture_stream(stdout, Arc::clone(&stdout_buffer));
    let stderr_handle = capture_stream(stderr, Arc::clone(&stderr_buffer));

    let status = match timeout {
        None => child.wait()?,
        Some(limit) => {
            let deadline = Instant::now() + limit;
            loop {
                if let Some(status) = child.try_wait()? {
                    break status;
                }
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    let _ = stdout_handle.join();
                    let _ = stderr_handle.join();
                    log::error!(
                        target: "playclip::ffmpeg::runner",
                        "{} timed out after {}s",
                        tool,
                        limit.as_secs()
                    );
                    return Err(AppError::ToolTimedOut {
                        tool,
                        limit_secs: limit.as_secs(),
                    });
                }
                thread::sleep(POLL_INTERVAL);
            }
        }
    };

    let _ = stdout_handle.join();
    let _ = stderr_handle.join();

    let stdout_str = String::from_utf8_lossy(&stdout_buffer.lock()).into_owned();
    let stderr_str = String::from_utf8_lossy(&stderr_buffer.lock()).into_owned();

    if status.success() {
        log::debug!(target: "playclip::ffmpeg::runner", "{} completed", tool);
        Ok(ToolOutput {
            stdout: stdout_str,
            stderr: stderr_str,
        })
    } else {
        let code = status.code().unwrap_or(-1);
        let preview = stderr_str.lines().rev().take(3).collect::<Vec<_>>().join("; ");
        log::error!(
            target: "playclip::ffmpeg::runner",
            "{} failed (code={}): {}",
            tool,
            code,
            preview
        );
        Err(AppError::ToolFailed {
            tool,
            code,
            output: stderr_str,
        })
    }
}
