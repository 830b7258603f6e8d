//! Argument lists for the external tools.
//!
//! Slicing and downloading are stream copies; nothing here re-encodes.

use std::path::Path;

use crate::timecode::PlayTime;

/// Dry-run downloads stop after this many seconds of footage.
const DRY_RUN_DOWNLOAD_SECS: u32 = 30;
/// rtmpdump gives the server this long to respond before giving up.
const RTMP_SOCKET_TIMEOUT_SECS: u32 = 10;

/// ffmpeg arguments to copy one play's window out of the full game file.
///
/// `-y` is deliberate: the scheduler only dispatches plays with no clip on
/// disk, so anything at the destination is a partial left by a crashed run.
pub fn build_slice_args(
    video: &Path,
    start: &PlayTime,
    duration: &PlayTime,
    dest: &Path,
) -> Vec<String> {
    vec![
        "-nostdin".to_string(),
        "-y".to_string(),
        "-ss".to_string(),
        start.ffmpeg_timestamp(),
        "-i".to_string(),
        video.to_string_lossy().into_owned(),
        "-c:v".to_string(),
        "copy".to_string(),
        "-c:a".to_string(),
        "copy".to_string(),
        "-t".to_string(),
        duration.ffmpeg_timestamp(),
        dest.to_string_lossy().into_owned(),
    ]
}

/// ffmpeg arguments to pull a full broadcast stream down to one file.
pub fn build_broadcast_download_args(url: &str, dest: &Path, dry_run: bool) -> Vec<String> {
    let mut args = vec![
        "-nostdin".to_string(),
        "-i".to_string(),
        url.to_string(),
    ];
    if dry_run {
        args.extend(["-t".to_string(), DRY_RUN_DOWNLOAD_SECS.to_string()]);
    }
    args.extend([
        // The vendor's HLS segments carry ADTS audio; MP4 needs it repackaged.
        "-bsf:a".to_string(),
        "aac_adtstoasc".to_string(),
        "-c:v".to_string(),
        "copy".to_string(),
        "-c:a".to_string(),
        "copy".to_string(),
        dest.to_string_lossy().into_owned(),
    ]);
    args
}

/// rtmpdump arguments to pull a full coach-tape stream down to one file.
pub fn build_coach_download_args(
    server: &str,
    app: &str,
    playpath: &str,
    dest: &Path,
    dry_run: bool,
) -> Vec<String> {
    let mut args = vec![
        "--rtmp".to_string(),
        server.to_string(),
        "--app".to_string(),
        app.to_string(),
        "--playpath".to_string(),
        playpath.to_string(),
        "--timeout".to_string(),
        RTMP_SOCKET_TIMEOUT_SECS.to_string(),
    ];
    if dry_run {
        args.extend(["--stop".to_string(), DRY_RUN_DOWNLOAD_SECS.to_string()]);
    }
    args.extend(["-o".to_string(), dest.to_string_lossy().into_owned()]);
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_args_copy_both_streams() {
        let start = PlayTime::from_seconds(561.0);
        let duration = PlayTime::from_seconds(22.0);
        let args = build_slice_args(
            Path::new("/footage/2013090800.mp4"),
            &start,
            &duration,
            Path::new("/footage/2013090800/0001.mp4"),
        );
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        assert_eq!(args[ss + 1], "00:09:21.000");
        let t = args.iter().position(|a| a == "-t").unwrap();
        assert_eq!(args[t + 1], "00:00:22.000");
        assert!(args.contains(&"-nostdin".to_string()));
        assert!(args.contains(&"-y".to_string()));
        assert_eq!(args.iter().filter(|a| *a == "copy").count(), 2);
        assert_eq!(args.last().unwrap(), "/footage/2013090800/0001.mp4");
    }

    #[test]
    fn slice_args_seek_before_input() {
        let start = PlayTime::from_seconds(10.0);
        let duration = PlayTime::from_seconds(5.0);
        let args = build_slice_args(Path::new("/v.mp4"), &start, &duration, Path::new("/o.mp4"));
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(ss < input, "-ss must precede -i for a fast seek");
    }

    #[test]
    fn broadcast_download_dry_run_caps_length() {
        let args = build_broadcast_download_args(
            "http://example.com/game.m3u8",
            Path::new("/footage/2013090800.mp4"),
            true,
        );
        let t = args.iter().position(|a| a == "-t").unwrap();
        assert_eq!(args[t + 1], "30");
        assert!(args.contains(&"aac_adtstoasc".to_string()));
        assert_eq!(args.last().unwrap(), "/footage/2013090800.mp4");
    }

    #[test]
    fn broadcast_download_full_has_no_cap() {
        let args = build_broadcast_download_args(
            "http://example.com/game.m3u8",
            Path::new("/footage/2013090800.mp4"),
            false,
        );
        assert!(!args.contains(&"-t".to_string()));
    }

    #[test]
    fn coach_download_names_the_stream() {
        let args = build_coach_download_args(
            "rtmp://example.com",
            "live/e1",
            "mp4:coach/2013/56000_all",
            Path::new("/footage/2013090800.mp4"),
            false,
        );
        let rtmp = args.iter().position(|a| a == "--rtmp").unwrap();
        assert_eq!(args[rtmp + 1], "rtmp://example.com");
        let playpath = args.iter().position(|a| a == "--playpath").unwrap();
        assert_eq!(args[playpath + 1], "mp4:coach/2013/56000_all");
        assert!(!args.contains(&"--stop".to_string()));
        let out = args.iter().position(|a| a == "-o").unwrap();
        assert_eq!(args[out + 1], "/footage/2013090800.mp4");
    }

    #[test]
    fn coach_download_dry_run_stops_early() {
        let args = build_coach_download_args(
            "rtmp://example.com",
            "live/e1",
            "mp4:coach/2013/56000_all",
            Path::new("/footage/2013090800.mp4"),
            true,
        );
        let stop = args.iter().position(|a| a == "--stop").unwrap();
        assert_eq!(args[stop + 1], "30");
    }
}
