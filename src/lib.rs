//! Locate, time, and slice archival football game footage into per-play
//! clips.
//!
//! Play timing comes from a vendor XML feed that records where each play
//! starts inside a continuous recording. Parsing pairs each start with the
//! next to form intervals, broadcast timings are realigned against the
//! downloaded file's real duration, and slicing fans the intervals out to a
//! bounded pool of ffmpeg invocations, skipping clips that already exist.

pub mod error;
pub mod feed;
pub mod ffmpeg;
pub mod footage;
pub mod slicer;
pub mod timecode;

pub use error::AppError;
pub use feed::{GameId, Play, PlayMap, TimingDialect, parse_feed};
pub use slicer::{SliceOptions, SliceOutcome, slice_game};
pub use timecode::PlayTime;
