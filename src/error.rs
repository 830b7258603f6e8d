//! Crate error type, covering feed parsing, timecode arithmetic, and the
//! external tool boundary.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    ToolNotFound(String),

    #[error("{tool} failed (code {code}): {output}")]
    ToolFailed {
        tool: String,
        code: i32,
        output: String,
    },

    #[error("{tool} did not finish within {limit_secs}s")]
    ToolTimedOut { tool: String, limit_secs: u64 },

    #[error("could not determine video duration: {0}")]
    ProbeFailed(String),

    #[error("bad timecode {0:?}: expected HH:MM:SS:ff or HH:MM:SS:fff")]
    MalformedTimecode(String),

    #[error("timecode {later} does not follow {earlier}")]
    OutOfOrderTimecode { earlier: String, later: String },

    #[error("no usable timing data in feed")]
    NoTimingData,

    #[error("footage already exists at {}", .0.display())]
    OutputExists(PathBuf),

    #[error("play {play_id} resolves to a non-positive clip length ({seconds:.3}s)")]
    EmptySlice { play_id: String, seconds: f64 },
}
