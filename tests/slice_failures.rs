//! Failure isolation: a play whose ffmpeg invocation fails is reported,
//! leaves no partial clip, and never aborts its siblings.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use playclip::feed::{TimingDialect, parse_feed};
use playclip::slicer::{SliceOptions, SliceOutcome, slice_game};

const FEED: &[u8] = br#"<dataset>
    <row><id>1</id><CATIN>00:10:00:000</CATIN></row>
    <row><id>2</id><CATIN>00:10:20:000</CATIN></row>
    <row><id>3</id><CATIN>00:10:40:000</CATIN></row>
</dataset>"#;

fn write_stub(dir: &Path, name: &str, script: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, script).expect("write stub");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod stub");
    path
}

#[test]
fn failing_tool_leaves_no_partial_clip_behind() {
    let dir = tempfile::tempdir().expect("tempdir");
    let bin = dir.path().join("bin");
    fs::create_dir_all(&bin).expect("mkdir bin");
    // Writes a partial output and then fails.
    let ffmpeg = write_stub(
        &bin,
        "ffmpeg",
        "#!/bin/sh\n\
         for last; do :; done\n\
         printf 'partial' > \"$last\"\n\
         echo 'muxer exploded' >&2\n\
         exit 1\n",
    );
    // Discovery caches the first resolution for the process lifetime; this
    // file holds a single test so the cache only ever sees this stub.
    unsafe {
        std::env::set_var("FFMPEG_PATH", &ffmpeg);
    }

    let video = dir.path().join("game.mp4");
    fs::write(&video, b"full game").expect("write video");
    let out_dir = dir.path().join("clips");

    let plays = parse_feed(FEED, TimingDialect::Coach).expect("parse feed");
    let mut opts = SliceOptions::for_dialect(TimingDialect::Coach);
    opts.concurrency = 2;

    let outcome = slice_game(&plays, &video, &out_dir, TimingDialect::Coach, &opts)
        .expect("run completes even when every play fails");
    match outcome {
        SliceOutcome::Completed(report) => {
            assert_eq!(report.attempted, 3);
            assert_eq!(report.succeeded, 0);
            assert_eq!(report.failures.len(), 3);
            for failure in &report.failures {
                assert!(failure.error.to_string().contains("muxer exploded"));
            }
        }
        other => panic!("expected a completed run, got {other:?}"),
    }
    // Partial outputs were cleaned up, so the next run re-selects every play.
    for stem in ["0001", "0002", "0003"] {
        assert!(
            !out_dir.join(format!("{stem}.mp4")).exists(),
            "{stem} lingers"
        );
    }
}
