use chrono::{DateTime, TimeZone};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use super::frames::FrameList;

/// Second-resolution stamp shared by the list file and the video of one run.
pub const RUN_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Paths and timing for one encoder invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderJob {
  pub list_path: PathBuf,
  pub output_path: PathBuf,
  pub frame_duration: f64,
}

impl EncoderJob {
  /// `<output_dir>/<segment>-<timestamp>.txt` and the matching `.mp4`.
  pub fn new<Tz: TimeZone>(
    output_dir: &Path,
    segment: &str,
    at: &DateTime<Tz>,
    frame_duration: f64,
  ) -> Self
  where
    Tz::Offset: std::fmt::Display,
  {
    let stem = format!("{}-{}", segment, at.format(RUN_TIMESTAMP_FORMAT));
    Self {
      list_path: output_dir.join(format!("{}.txt", stem)),
      output_path: output_dir.join(format!("{}.mp4", stem)),
      frame_duration,
    }
  }
}

fn quote(entry: &str) -> String {
  format!("'{}'", entry.replace('\'', r"'\''"))
}

/// Render a concat-demuxer list for `frames`.
///
/// Entries are relative to the output root (`<segment>/<name>`), which is
/// where the list file itself lives. The last frame is listed twice so it is
/// held for a full frame duration.
pub fn render_manifest(segment: &str, frames: &FrameList, frame_duration: f64) -> String {
  let mut manifest = String::new();

  for frame in frames {
    let entry = quote(&format!("{}/{}", segment, frame.name));
    let _ = writeln!(manifest, "file {}", entry);
    let _ = writeln!(manifest, "duration {:.6}", frame_duration);
  }

  if let Some(last) = frames.last() {
    let _ = writeln!(manifest, "file {}", quote(&format!("{}/{}", segment, last.name)));
  }

  manifest
}
