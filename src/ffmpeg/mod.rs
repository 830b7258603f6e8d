//! Everything that touches the external tools: binary discovery, blocking
//! invocation, duration probing, and argument construction.

mod builder;
mod discovery;
mod probe;
mod runner;

pub use builder::{build_broadcast_download_args, build_coach_download_args, build_slice_args};
pub use discovery::{get_ffmpeg_path, get_ffprobe_path, get_rtmpdump_path};
pub use probe::probe_duration;
pub use runner::{ToolOutput, run_tool_blocking};
