//! Offset reconciliation and incremental per-play slicing.
//!
//! Slicing is re-entrant: a play is only dispatched when no clip for it
//! exists in the output directory, so a failed run can simply be re-run.
//! Dispatch fans out through a bounded worker pool; each worker performs one
//! blocking ffmpeg invocation and failures never abort siblings.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rayon::prelude::*;

use crate::error::AppError;
use crate::feed::{Play, PlayMap, TimingDialect};
use crate::ffmpeg::{build_slice_args, get_ffmpeg_path, probe_duration, run_tool_blocking};
use crate::footage::sliced_clips;
use crate::timecode::PlayTime;

/// Padding added to the reported-vs-actual end delta. The feed's reported
/// broadcast end runs a couple of seconds hot; without the pad, clips clip
/// the snap.
pub const BROADCAST_OFFSET_PADDING_SECS: f64 = 2.0;
/// Tail length for the final play, which has no successor to bound it.
pub const FINAL_PLAY_TAIL_SECS: f64 = 40.0;
/// Broadcast clips are capped to keep storage bounded; long gaps between
/// snaps are replays and commentary, not football.
pub const BROADCAST_MAX_PLAY_SECS: i64 = 25;
/// Coach tape has no dead air, so it goes uncapped.
pub const COACH_MAX_PLAY_SECS: i64 = 0;
/// Lead-in trimmed from each clip to skip the scoreboard graphic shown
/// before the snap.
pub const SCOREBOARD_LEAD_IN_SECS: f64 = 3.0;
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Dry runs look at only this many plays.
const DRY_RUN_PLAY_LIMIT: usize = 10;
/// Slice deadline: floor plus a per-expected-second allowance. Stream copies
/// finish in a fraction of this; anything slower is stuck.
const SLICE_TIMEOUT_FLOOR_SECS: u64 = 60;
const SLICE_TIMEOUT_SECS_PER_CLIP_SEC: u64 = 10;

#[derive(Debug, Clone)]
pub struct SliceOptions {
    /// Worker pool size; each worker runs one ffmpeg at a time.
    pub concurrency: usize,
    /// Slice only the first few plays, for a fast end-to-end check.
    pub dry_run: bool,
    /// Cap on a single clip's length in whole seconds; 0 means uncapped.
    pub max_play_secs: i64,
    /// Seconds to trim from each clip's head; 0 disables the trim.
    pub trim_lead_in_secs: f64,
}

impl SliceOptions {
    /// Defaults appropriate to a timing dialect.
    pub fn for_dialect(dialect: TimingDialect) -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            dry_run: false,
            max_play_secs: match dialect {
                TimingDialect::Coach => COACH_MAX_PLAY_SECS,
                TimingDialect::Broadcast => BROADCAST_MAX_PLAY_SECS,
            },
            trim_lead_in_secs: SCOREBOARD_LEAD_IN_SECS,
        }
    }
}

/// One resolved unit of slicing work.
#[derive(Debug)]
pub struct SliceTask {
    pub play_id: String,
    pub start: PlayTime,
    pub duration: PlayTime,
    pub source: PathBuf,
    pub dest: PathBuf,
}

/// Why a slicing run ended without dispatching any work, or what it did.
#[derive(Debug)]
pub enum SliceOutcome {
    /// Every play already has a clip on disk.
    NothingToSlice,
    /// Nothing was scheduled and no clips exist either: the timing feed is
    /// probably missing or corrupt.
    NoClipsOnDisk,
    Completed(SliceReport),
}

#[derive(Debug)]
pub struct SliceReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failures: Vec<SliceFailure>,
}

#[derive(Debug)]
pub struct SliceFailure {
    pub play_id: String,
    pub error: AppError,
}

/// Constant correction subtracted from every broadcast start time.
///
/// The feed's reported end of broadcast is unreliable against the file we
/// actually downloaded; the difference between the two, plus a little
/// padding, realigns the timeline. A negative result means the heuristic
/// broke down, and zero is the safe fallback.
pub fn compute_broadcast_offset(feed_end: &PlayTime, actual_duration: &PlayTime) -> f64 {
    let offset =
        feed_end.fractional() - actual_duration.fractional() + BROADCAST_OFFSET_PADDING_SECS;
    if offset < 0.0 {
        log::warn!(
            target: "playclip::slicer",
            "reported broadcast end {} precedes the file's duration {}; slicing without an offset",
            feed_end,
            actual_duration
        );
        0.0
    } else {
        offset
    }
}

/// Resolve one play into a slice task.
///
/// The length cap is computed from the untrimmed start, then the lead-in
/// trim moves the start forward, so the effective clip length is
/// `(capped end) - (trimmed start)`.
pub fn build_slice_task(
    play: &Play,
    video: &Path,
    out_dir: &Path,
    offset_secs: f64,
    max_play_secs: i64,
    trim_lead_in_secs: f64,
) -> Result<SliceTask, AppError> {
    let mut start = if offset_secs > play.start.fractional() {
        log::warn!(
            target: "playclip::slicer",
            "offset {:.3}s exceeds the start of play {}; clamping to the head of the file",
            offset_secs,
            play.id
        );
        PlayTime::from_seconds(0.0)
    } else {
        play.start.add_seconds(-offset_secs)
    };

    let mut end = match play.end {
        Some(end) => end,
        None => start.add_seconds(FINAL_PLAY_TAIL_SECS),
    };
    if max_play_secs > 0 && end.minus(&start)? > max_play_secs {
        end = start.add_seconds(max_play_secs as f64);
    }
    if trim_lead_in_secs > 0.0 {
        start = start.add_seconds(trim_lead_in_secs);
    }

    let seconds = end.fractional() - start.fractional();
    if seconds <= 0.0 {
        return Err(AppError::EmptySlice {
            play_id: play.id.clone(),
            seconds,
        });
    }

    Ok(SliceTask {
        play_id: play.id.clone(),
        start,
        duration: PlayTime::from_seconds(seconds),
        source: video.to_path_buf(),
        dest: out_dir.join(format!("{}.mp4", play.file_stem())),
    })
}

/// Plays with no clip in `out_dir` yet, in feed order. A dry run inspects
/// only the first few plays.
pub fn unsliced_plays<'a>(plays: &'a PlayMap, out_dir: &Path, dry_run: bool) -> Vec<&'a Play> {
    let limit = if dry_run { DRY_RUN_PLAY_LIMIT } else { usize::MAX };
    plays
        .iter()
        .take(limit)
        .filter(|play| !out_dir.join(format!("{}.mp4", play.file_stem())).is_file())
        .collect()
}

/// Slice a single play. [`slice_game`] is the usual entry point; it skips
/// work that is already done.
pub fn slice_play(
    play: &Play,
    video: &Path,
    out_dir: &Path,
    offset_secs: f64,
    opts: &SliceOptions,
) -> Result<(), AppError> {
    let ffmpeg = get_ffmpeg_path()?;
    slice_one(&ffmpeg, play, video, out_dir, offset_secs, opts)
}

fn slice_one(
    ffmpeg: &Path,
    play: &Play,
    video: &Path,
    out_dir: &Path,
    offset_secs: f64,
    opts: &SliceOptions,
) -> Result<(), AppError> {
    let task = build_slice_task(
        play,
        video,
        out_dir,
        offset_secs,
        opts.max_play_secs,
        opts.trim_lead_in_secs,
    )?;
    let limit = Duration::from_secs(
        SLICE_TIMEOUT_FLOOR_SECS + SLICE_TIMEOUT_SECS_PER_CLIP_SEC * task.duration.whole_seconds(),
    );
    let args = build_slice_args(&task.source, &task.start, &task.duration, &task.dest);
    match run_tool_blocking(ffmpeg, &args, Some(limit)) {
        Ok(_) => {
            log::info!(
                target: "playclip::slicer",
                "sliced play {} ({} + {})",
                task.play_id,
                task.start,
                task.duration
            );
            Ok(())
        }
        Err(err) => {
            // A partial clip would read as done on the next run.
            let _ = fs::remove_file(&task.dest);
            Err(err)
        }
    }
}

/// Slice every play that does not have a clip yet, fanning out across a
/// bounded worker pool. Blocks until every dispatched play has finished,
/// success or not.
pub fn slice_game(
    plays: &PlayMap,
    video: &Path,
    out_dir: &Path,
    dialect: TimingDialect,
    opts: &SliceOptions,
) -> Result<SliceOutcome, AppError> {
    // Before the fan-out: workers must not race on directory creation.
    fs::create_dir_all(out_dir)?;

    let unsliced = unsliced_plays(plays, out_dir, opts.dry_run);
    if unsliced.is_empty() {
        return Ok(if sliced_clips(out_dir).is_empty() {
            log::warn!(
                target: "playclip::slicer",
                "no plays to slice and no clips in {}; the timing feed may be missing or corrupt",
                out_dir.display()
            );
            SliceOutcome::NoClipsOnDisk
        } else {
            log::info!(target: "playclip::slicer", "all plays already sliced");
            SliceOutcome::NothingToSlice
        });
    }

    let offset_secs = match dialect {
        TimingDialect::Coach => 0.0,
        TimingDialect::Broadcast => match plays.broadcast_end() {
            Some(feed_end) => {
                let actual = probe_duration(video)?;
                compute_broadcast_offset(feed_end, &actual)
            }
            None => {
                log::warn!(
                    target: "playclip::slicer",
                    "feed carries no end-of-broadcast timestamp; slicing without an offset"
                );
                0.0
            }
        },
    };

    let ffmpeg = get_ffmpeg_path()?;
    log::info!(
        target: "playclip::slicer",
        "slicing {} plays from {} ({} timings, offset {:.3}s)",
        unsliced.len(),
        video.display(),
        dialect.as_str(),
        offset_secs
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.concurrency.max(1))
        .build()
        .map_err(|err| AppError::Io(std::io::Error::other(err.to_string())))?;
    let failures: Vec<SliceFailure> = pool.install(|| {
        unsliced
            .par_iter()
            .filter_map(|play| {
                match slice_one(&ffmpeg, play, video, out_dir, offset_secs, opts) {
                    Ok(()) => None,
                    Err(error) => {
                        log::error!(
                            target: "playclip::slicer",
                            "failed to slice play {}: {}",
                            play.id,
                            error
                        );
                        Some(SliceFailure {
                            play_id: play.id.clone(),
                            error,
                        })
                    }
                }
            })
            .collect()
    });

    let report = SliceReport {
        attempted: unsliced.len(),
        succeeded: unsliced.len() - failures.len(),
        failures,
    };
    log::info!(
        target: "playclip::slicer",
        "done slicing: {}/{} plays",
        report.succeeded,
        report.attempted
    );
    Ok(SliceOutcome::Completed(report))
}
