//! Video duration probing.
//!
//! ffprobe's JSON output is the primary source. When ffprobe is not
//! installed, the `Duration:` line of `ffmpeg -i`'s banner is scraped
//! instead; ffmpeg exits non-zero for an input-only invocation, so the
//! banner arrives wrapped in the failure.

use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

use super::discovery::{get_ffmpeg_path, get_ffprobe_path};
use super::runner::run_tool_blocking;
use crate::error::AppError;
use crate::timecode::PlayTime;

const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Duration: (\d+):(\d+):([\d.]+)").expect("invalid duration regex"));

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: Option<ProbeFormat>,
}

/// Measure the duration of the video at `path`.
pub fn probe_duration(path: &Path) -> Result<PlayTime, AppError> {
    let seconds = match ffprobe_duration(path) {
        Ok(seconds) => seconds,
        Err(AppError::ToolNotFound(reason)) => {
            log::debug!(
                target: "playclip::ffmpeg::probe",
                "ffprobe unavailable ({}); scraping the ffmpeg banner instead",
                reason
            );
            ffmpeg_banner_duration(path)?
        }
        Err(err) => return Err(err),
    };
    log::debug!(
        target: "playclip::ffmpeg::probe",
        "{} runs {:.3}s",
        path.display(),
        seconds
    );
    Ok(PlayTime::from_seconds(seconds))
}

fn ffprobe_duration(path: &Path) -> Result<f64, AppError> {
    let ffprobe = get_ffprobe_path()?;
    let args = vec![
        "-loglevel".to_string(),
        "error".to_string(),
        "-show_format".to_string(),
        "-print_format".to_string(),
        "json".to_string(),
        path.to_string_lossy().into_owned(),
    ];
    let output = run_tool_blocking(&ffprobe, &args, Some(PROBE_TIMEOUT))?;
    parse_probe_json(&output.stdout)
}

/// Pull the format duration out of ffprobe's JSON.
pub(crate) fn parse_probe_json(json: &str) -> Result<f64, AppError> {
    let parsed: ProbeOutput = serde_json::from_str(json)
        .map_err(|err| AppError::ProbeFailed(format!("bad ffprobe output: {err}")))?;
    parsed
        .format
        .and_then(|format| format.duration)
        .and_then(|text| text.parse::<f64>().ok())
        .filter(|&secs| secs >= 0.0)
        .ok_or_else(|| AppError::ProbeFailed("ffprobe reported no duration".to_string()))
}

fn ffmpeg_banner_duration(path: &Path) -> Result<f64, AppError> {
    let ffmpeg = get_ffmpeg_path()?;
    let args = vec![
        "-hide_banner".to_string(),
        "-i".to_string(),
        path.to_string_lossy().into_owned(),
    ];
    let banner = match run_tool_blocking(&ffmpeg, &args, Some(PROBE_TIMEOUT)) {
        Ok(output) => output.stderr,
        // Input-only invocations always exit non-zero; the banner is intact.
        Err(AppError::ToolFailed { output, .. }) => output,
        Err(err) => return Err(err),
    };
    scrape_duration(&banner).ok_or_else(|| {
        AppError::ProbeFailed(format!("no Duration line for {}", path.display()))
    })
}

/// Scrape `Duration: HH:MM:SS.cc` from ffmpeg's stderr banner.
pub(crate) fn scrape_duration(stderr: &str) -> Option<f64> {
    let caps = DURATION_RE.captures(stderr)?;
    let hours: f64 = caps[1].parse().ok()?;
    let minutes: f64 = caps[2].parse().ok()?;
    let seconds: f64 = caps[3].parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_probe_json_extracts_duration() {
        let json = r#"{"format": {"duration": "7150.250", "size": "123"}}"#;
        assert_eq!(parse_probe_json(json).unwrap(), 7150.25);
    }

    #[test]
    fn parse_probe_json_rejects_missing_duration() {
        let err = parse_probe_json(r#"{"format": {}}"#).expect_err("no duration");
        assert!(matches!(err, AppError::ProbeFailed(_)));
        let err = parse_probe_json(r#"{}"#).expect_err("no format");
        assert!(matches!(err, AppError::ProbeFailed(_)));
    }

    #[test]
    fn parse_probe_json_rejects_garbage() {
        assert!(parse_probe_json("not json").is_err());
    }

    #[test]
    fn scrape_duration_reads_the_banner_line() {
        let banner = "Input #0, mov,mp4, from 'game.mp4':\n  Duration: 01:59:10.52, start: 0.0\n";
        let secs = scrape_duration(banner).unwrap();
        assert!((secs - (3600.0 + 59.0 * 60.0 + 10.52)).abs() < 0.001);
    }

    #[test]
    fn scrape_duration_ignores_unrelated_output() {
        assert_eq!(scrape_duration("frame=  100 fps= 25"), None);
    }
}
