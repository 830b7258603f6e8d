//! Command-line surface: slice a game into per-play clips, probe a file's
//! duration, or download full-game footage from a resolved source.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use playclip::error::AppError;
use playclip::feed::store::read_feed_file;
use playclip::feed::{TimingDialect, parse_feed};
use playclip::footage::{DownloadOutcome, RtmpSource, download_broadcast, download_coach};
use playclip::slicer::{DEFAULT_CONCURRENCY, SliceOptions, SliceOutcome, slice_game};

#[derive(Parser)]
#[command(
    name = "playclip",
    version,
    about = "Slice archival football game footage into per-play clips"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Slice a downloaded game into per-play clips using its timing feed.
    Slice {
        /// Full-game video file.
        video: PathBuf,
        /// Timing feed (.xml, or .xml.gz as stored by the feed cache).
        feed: PathBuf,
        /// Directory the clips are written to.
        out_dir: PathBuf,
        /// Feed timestamps are broadcast timings rather than coach timings.
        #[arg(long)]
        broadcast: bool,
        /// Number of simultaneous ffmpeg invocations.
        #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,
        /// Slice only the first 10 plays, as a fast end-to-end check.
        #[arg(long)]
        dry_run: bool,
        /// Cap each clip's length in seconds; 0 disables the cap.
        /// Defaults to 25 for broadcast timings and uncapped for coach.
        #[arg(long)]
        max_play_secs: Option<i64>,
        /// Keep the scoreboard lead-in instead of trimming it.
        #[arg(long)]
        keep_scoreboard: bool,
    },
    /// Print the duration of a video file.
    Probe {
        video: PathBuf,
    },
    /// Download a full broadcast from a resolved stream URL.
    DownloadBroadcast {
        url: String,
        dest: PathBuf,
        /// Download only the first 30 seconds.
        #[arg(long)]
        dry_run: bool,
    },
    /// Download full coach footage over RTMP.
    DownloadCoach {
        server: String,
        app: String,
        playpath: String,
        dest: PathBuf,
        /// Download only the first 30 seconds.
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, AppError> {
    match cli.command {
        Command::Slice {
            video,
            feed,
            out_dir,
            broadcast,
            concurrency,
            dry_run,
            max_play_secs,
            keep_scoreboard,
        } => {
            let dialect = if broadcast {
                TimingDialect::Broadcast
            } else {
                TimingDialect::Coach
            };
            let raw = read_feed_file(&feed)?;
            let plays = parse_feed(&raw, dialect)?;

            let mut opts = SliceOptions::for_dialect(dialect);
            opts.concurrency = concurrency;
            opts.dry_run = dry_run;
            if let Some(cap) = max_play_secs {
                opts.max_play_secs = cap;
            }
            if keep_scoreboard {
                opts.trim_lead_in_secs = 0.0;
            }

            match slice_game(&plays, &video, &out_dir, dialect, &opts)? {
                SliceOutcome::NothingToSlice => {
                    println!("all plays already sliced");
                    Ok(ExitCode::SUCCESS)
                }
                SliceOutcome::NoClipsOnDisk => {
                    println!(
                        "no plays to slice and no clips on disk; \
                         the timing feed may be missing or corrupt"
                    );
                    Ok(ExitCode::SUCCESS)
                }
                SliceOutcome::Completed(report) => {
                    println!("sliced {}/{} plays", report.succeeded, report.attempted);
                    for failure in &report.failures {
                        eprintln!("play {}: {}", failure.play_id, failure.error);
                    }
                    Ok(if report.failures.is_empty() {
                        ExitCode::SUCCESS
                    } else {
                        ExitCode::FAILURE
                    })
                }
            }
        }
        Command::Probe { video } => {
            let duration = playclip::ffmpeg::probe_duration(&video)?;
            println!("{duration}");
            Ok(ExitCode::SUCCESS)
        }
        Command::DownloadBroadcast { url, dest, dry_run } => {
            download_broadcast(&url, &dest, dry_run)?;
            println!("downloaded {}", dest.display());
            Ok(ExitCode::SUCCESS)
        }
        Command::DownloadCoach {
            server,
            app,
            playpath,
            dest,
            dry_run,
        } => {
            let source = RtmpSource {
                server,
                app,
                playpath,
            };
            match download_coach(&source, &dest, dry_run)? {
                DownloadOutcome::Complete => println!("downloaded {}", dest.display()),
                DownloadOutcome::Incomplete => {
                    println!("downloaded {} (incomplete)", dest.display());
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
