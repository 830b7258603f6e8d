//! Footage layout on disk, and the full-game download entry points.
//!
//! A game's full recording lives at `{footage_dir}/{eid}.mp4`; its per-play
//! clips live under `{clip_dir}/{eid}/{playid}.mp4`. URL construction and
//! validity probing happen upstream; this module takes a resolved source and
//! drives the external tool.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AppError;
use crate::ffmpeg::{
    build_broadcast_download_args, build_coach_download_args, get_ffmpeg_path, get_rtmpdump_path,
    run_tool_blocking,
};

/// rtmpdump's "download ended early" exit code. The partial file is usable
/// and the download can be resumed by hand, so it is not a failure.
const RTMPDUMP_INCOMPLETE_EXIT: i32 = 2;

/// An RTMP stream location, as rtmpdump wants it.
#[derive(Debug, Clone)]
pub struct RtmpSource {
    pub server: String,
    pub app: String,
    pub playpath: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    Complete,
    /// The tool stopped before the end of the stream but left usable
    /// footage; retrying later may finish the job.
    Incomplete,
}

/// Path of a game's full recording inside a footage directory.
pub fn full_footage_path(footage_dir: &Path, eid: &str) -> PathBuf {
    footage_dir.join(format!("{eid}.mp4"))
}

/// Directory holding a game's per-play clips.
pub fn game_clip_dir(clip_dir: &Path, eid: &str) -> PathBuf {
    clip_dir.join(eid)
}

/// File stems of the clips already sliced in a game directory, numeric ids
/// in play order first.
pub fn sliced_clips(game_dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(game_dir) else {
        return Vec::new();
    };
    let mut stems: Vec<String> = entries
        .flatten()
        .filter_map(|entry| {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "mp4") {
                path.file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
            } else {
                None
            }
        })
        .collect();
    stems.sort_by(|a, b| match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => std::cmp::Ordering::Less,
        (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    });
    stems
}

fn ensure_absent(dest: &Path) -> Result<(), AppError> {
    if dest.exists() {
        return Err(AppError::OutputExists(dest.to_path_buf()));
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Download a full broadcast from a resolved stream URL.
///
/// Fails fast if footage already exists at `dest`; a partial file left by a
/// failed attempt is deleted so the next attempt starts clean.
pub fn download_broadcast(url: &str, dest: &Path, dry_run: bool) -> Result<(), AppError> {
    ensure_absent(dest)?;
    let ffmpeg = get_ffmpeg_path()?;
    let args = build_broadcast_download_args(url, dest, dry_run);
    log::info!(
        target: "playclip::footage",
        "downloading broadcast to {}",
        dest.display()
    );
    match run_tool_blocking(&ffmpeg, &args, None) {
        Ok(_) => {
            log::info!(target: "playclip::footage", "done: {}", dest.display());
            Ok(())
        }
        Err(err) => {
            let _ = fs::remove_file(dest);
            Err(err)
        }
    }
}

/// Download full coach footage over RTMP.
///
/// rtmpdump exiting with its "incomplete" code keeps the partial file and
/// reports [`DownloadOutcome::Incomplete`]; any other failure deletes the
/// partial. A zero-byte result usually means the coach tape is not published
/// yet and counts as a failure.
pub fn download_coach(
    source: &RtmpSource,
    dest: &Path,
    dry_run: bool,
) -> Result<DownloadOutcome, AppError> {
    ensure_absent(dest)?;
    let rtmpdump = get_rtmpdump_path()?;
    let args = build_coach_download_args(
        &source.server,
        &source.app,
        &source.playpath,
        dest,
        dry_run,
    );
    log::info!(
        target: "playclip::footage",
        "downloading coach tape to {}",
        dest.display()
    );
    match run_tool_blocking(&rtmpdump, &args, None) {
        Ok(_) => {
            let size = fs::metadata(dest).map(|meta| meta.len()).unwrap_or(0);
            if size == 0 {
                let _ = fs::remove_file(dest);
                return Err(AppError::ToolFailed {
                    tool: "rtmpdump".to_string(),
                    code: 0,
                    output: "no data retrieved; the coach tape may not exist yet".to_string(),
                });
            }
            log::info!(target: "playclip::footage", "done: {}", dest.display());
            Ok(DownloadOutcome::Complete)
        }
        Err(AppError::ToolFailed { code, .. }) if code == RTMPDUMP_INCOMPLETE_EXIT => {
            log::warn!(
                target: "playclip::footage",
                "download of {} stopped early; keeping the partial file",
                dest.display()
            );
            Ok(DownloadOutcome::Incomplete)
        }
        Err(err) => {
            let _ = fs::remove_file(dest);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn footage_paths_are_keyed_by_event_id() {
        assert_eq!(
            full_footage_path(Path::new("/footage"), "2013090800"),
            PathBuf::from("/footage/2013090800.mp4")
        );
        assert_eq!(
            game_clip_dir(Path::new("/clips"), "2013090800"),
            PathBuf::from("/clips/2013090800")
        );
    }

    #[test]
    fn sliced_clips_sort_in_play_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["0010.mp4", "0002.mp4", "0120.mp4", "extra-clip.mp4"] {
            fs::write(dir.path().join(name), b"clip").expect("write");
        }
        fs::write(dir.path().join("notes.txt"), b"not a clip").expect("write");
        assert_eq!(
            sliced_clips(dir.path()),
            vec!["0002", "0010", "0120", "extra-clip"]
        );
    }

    #[test]
    fn sliced_clips_of_missing_directory_is_empty() {
        assert!(sliced_clips(Path::new("/nonexistent/game")).is_empty());
    }

    #[test]
    fn existing_footage_fails_fast() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("2013090800.mp4");
        fs::write(&dest, b"already here").expect("write");
        let err = download_broadcast("http://example.com/game.m3u8", &dest, true)
            .expect_err("must not overwrite");
        assert!(matches!(err, AppError::OutputExists(_)));
        // The existing footage is untouched.
        assert_eq!(fs::read(&dest).unwrap(), b"already here");
    }
}
