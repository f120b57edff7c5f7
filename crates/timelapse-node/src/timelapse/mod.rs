pub mod assembler;
pub mod command;
pub mod frames;
pub mod manifest;

pub use assembler::{assemble, Assembled};
pub use command::{build_command, render, CommandTemplate, EncoderCommand};
pub use frames::{collect_frames, Frame, FrameList};
pub use manifest::{render_manifest, EncoderJob};

use common::cameras::CameraConfig;
use std::path::Path;
use std::time::Instant;
use telemetry::metrics::{TIMELAPSES_TOTAL, TIMELAPSE_FRAMES};
use tracing::{error, info};

use crate::error::{AssembleError, JobError, Stage};

/// Run one assembly for `camera`, recording metrics and tagging failures with
/// the camera name.
pub async fn create_timelapse(camera: &CameraConfig, output_dir: &Path) -> Result<Assembled, JobError> {
  let name = camera.name();

  let started = Instant::now();
  let result = assemble(camera, output_dir).await;
  let elapsed = started.elapsed().as_secs_f64();

  match result {
    Ok(assembled) => {
      TIMELAPSES_TOTAL.with_label_values(&[name, "success"]).inc();
      TIMELAPSE_FRAMES
        .with_label_values(&[name])
        .inc_by(assembled.frames as u64);
      info!(
        camera = %name,
        output = %assembled.output_path.display(),
        frames = assembled.frames,
        duration_secs = elapsed,
        "timelapse complete"
      );
      Ok(assembled)
    }
    Err(e) => {
      let status = match &e {
        AssembleError::NoFrames { .. } => "no_frames",
        AssembleError::EncoderNotFound { .. } => "encoder_missing",
        AssembleError::EncoderExecution { .. } | AssembleError::EncoderSpawn { .. } => "encoder_error",
        _ => "error",
      };
      TIMELAPSES_TOTAL.with_label_values(&[name, status]).inc();
      error!(camera = %name, error = %e, "failed to create timelapse");
      Err(JobError::new(name, Stage::Timelapse, e))
    }
  }
}
