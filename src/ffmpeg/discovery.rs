//! External tool discovery: ffmpeg, ffprobe, rtmpdump.
//!
//! Resolution order: env override, common install paths, then PATH. Results
//! are cached for the process lifetime.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

use parking_lot::Mutex;

use crate::error::AppError;

static TOOL_PATH_CACHE: LazyLock<Mutex<HashMap<String, PathBuf>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

#[cfg(target_os = "windows")]
fn find_in_path(tool: &str) -> Option<PathBuf> {
    let output = Command::new("where").arg(tool).output().ok()?;
    if output.status.success() {
        let path = String::from_utf8_lossy(&output.stdout);
        let first = path.lines().next()?.trim();
        if !first.is_empty() {
            return Some(PathBuf::from(first));
        }
    }
    None
}

#[cfg(not(target_os = "windows"))]
fn find_in_path(tool: &str) -> Option<PathBuf> {
    let output = Command::new("which").arg(tool).output().ok()?;
    if output.status.success() {
        let path = String::from_utf8_lossy(&output.stdout);
        let first = path.lines().next()?.trim();
        if !first.is_empty() {
            return Some(PathBuf::from(first));
        }
    }
    None
}

fn common_paths(tool: &str) -> Vec<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from(format!("/opt/homebrew/bin/{tool}")),
            PathBuf::from(format!("/usr/local/bin/{tool}")),
            PathBuf::from(format!("/opt/local/bin/{tool}")),
        ]
    }

    #[cfg(target_os = "windows")]
    {
        vec![
            PathBuf::from(format!("C:\\ffmpeg\\bin\\{tool}.exe")),
            PathBuf::from(format!("C:\\Program Files\\ffmpeg\\bin\\{tool}.exe")),
        ]
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    {
        vec![
            PathBuf::from(format!("/usr/bin/{tool}")),
            PathBuf::from(format!("/usr/local/bin/{tool}")),
        ]
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows", unix)))]
    {
        let _ = tool;
        vec![]
    }
}

/// Sibling of an already-resolved binary, e.g. ffprobe next to ffmpeg.
/// ffmpeg and ffprobe ship together, so the sibling is tried before PATH.
fn sibling_candidate(anchor: &Path, tool: &str) -> Option<PathBuf> {
    let parent = anchor.parent()?;
    #[cfg(target_os = "windows")]
    {
        Some(parent.join(format!("{tool}.exe")))
    }
    #[cfg(not(target_os = "windows"))]
    {
        Some(parent.join(tool))
    }
}

fn resolve_tool(tool: &str, env_override: Option<PathBuf>) -> Result<PathBuf, AppError> {
    if let Some(path) = env_override {
        if path.exists() {
            log::debug!(
                target: "playclip::ffmpeg::discovery",
                "{} path from env override: {}",
                tool,
                path.display()
            );
            return Ok(path);
        }
        log::warn!(
            target: "playclip::ffmpeg::discovery",
            "env override for {} points at missing {}; ignoring",
            tool,
            path.display()
        );
    }

    for path in common_paths(tool) {
        if path.exists() {
            log::debug!(
                target: "playclip::ffmpeg::discovery",
                "{} found in common path: {}",
                tool,
                path.display()
            );
            return Ok(path);
        }
    }

    if let Some(path) = find_in_path(tool) {
        if path.exists() {
            log::debug!(
                target: "playclip::ffmpeg::discovery",
                "{} found in PATH: {}",
                tool,
                path.display()
            );
            return Ok(path);
        }
    }

    log::error!(
        target: "playclip::ffmpeg::discovery",
        "{} not found in PATH or common locations",
        tool
    );
    Err(AppError::ToolNotFound(format!(
        "{tool} not found. Install it and make sure it is on PATH, \
         or point the {} env var at the binary.",
        env_var_for(tool)
    )))
}

fn env_var_for(tool: &str) -> String {
    format!("{}_PATH", tool.to_ascii_uppercase())
}

fn get_tool_path(tool: &str, resolve: impl FnOnce() -> Result<PathBuf, AppError>) -> Result<PathBuf, AppError> {
    if let Some(path) = TOOL_PATH_CACHE.lock().get(tool) {
        return Ok(path.clone());
    }
    let path = resolve()?;
    TOOL_PATH_CACHE
        .lock()
        .entry(tool.to_string())
        .or_insert(path.clone());
    Ok(path)
}

/// Get the ffmpeg path. Env override: `FFMPEG_PATH`.
pub fn get_ffmpeg_path() -> Result<PathBuf, AppError> {
    get_tool_path("ffmpeg", || {
        resolve_tool("ffmpeg", std::env::var_os("FFMPEG_PATH").map(PathBuf::from))
    })
}

/// Get the ffprobe path. Env override `FFPROBE_PATH`, then the directory
/// ffmpeg resolved to, then the usual lookup.
pub fn get_ffprobe_path() -> Result<PathBuf, AppError> {
    get_tool_path("ffprobe", || {
        if let Some(path) = std::env::var_os("FFPROBE_PATH").map(PathBuf::from) {
            if path.exists() {
                return Ok(path);
            }
        }
        if let Ok(ffmpeg) = get_ffmpeg_path() {
            if let Some(sibling) = sibling_candidate(&ffmpeg, "ffprobe") {
                if sibling.exists() {
                    return Ok(sibling);
                }
            }
        }
        resolve_tool("ffprobe", None)
    })
}

/// Get the rtmpdump path. Env override: `RTMPDUMP_PATH`.
pub fn get_rtmpdump_path() -> Result<PathBuf, AppError> {
    get_tool_path("rtmpdump", || {
        resolve_tool(
            "rtmpdump",
            std::env::var_os("RTMPDUMP_PATH").map(PathBuf::from),
        )
    })
}
