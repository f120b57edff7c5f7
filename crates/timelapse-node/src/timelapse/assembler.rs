use chrono::Local;
use common::cameras::{CameraConfig, CommandMode};
use std::path::{Path, PathBuf};
use std::time::Instant;
use telemetry::metrics::ENCODER_DURATION;
use tokio::fs;
use tracing::{debug, info, warn};

use super::command::{build_command, CommandTemplate, SHELL};
use super::frames::collect_frames;
use super::manifest::{render_manifest, EncoderJob};
use crate::error::{AssembleError, CollectError, TemplateError};

/// Outcome of a successful assembly run.
#[derive(Debug, Clone, PartialEq)]
pub struct Assembled {
  pub output_path: PathBuf,
  pub frames: usize,
  /// Source frames deleted after encoding.
  pub removed: usize,
  /// Source frames that could not be deleted.
  pub failed_removals: Vec<PathBuf>,
}

/// Resolve the executable the encoder run starts on `PATH`.
///
/// Argv mode starts the template's first word directly. Shell mode starts
/// `sh`, and the shell resolves whatever the line names.
fn preflight(mode: CommandMode, template: &CommandTemplate) -> Result<PathBuf, AssembleError> {
  let program = match mode {
    CommandMode::Argv => template.program()?.ok_or_else(|| TemplateError::Parse {
      position: 0,
      reason: "template names no program".to_string(),
    })?,
    CommandMode::Shell => SHELL.to_string(),
  };

  which::which(&program).map_err(|e| {
    debug!(program = %program, error = %e, "encoder lookup failed");
    AssembleError::EncoderNotFound { program }
  })
}

/// Assemble every frame under `output_dir/<segment>` into one video.
///
/// The list file is always removed afterwards. Source frames are removed
/// only after a successful encode and only when the camera's `delete` flag is
/// set; individual removal failures are reported in the result.
pub async fn assemble(camera: &CameraConfig, output_dir: &Path) -> Result<Assembled, AssembleError> {
  let name = camera.name();
  let segment = camera.segment();

  let template = CommandTemplate::parse(&camera.ffmpeg_template)?;
  let encoder = preflight(camera.command_mode, &template)?;
  debug!(camera = %name, encoder = %encoder.display(), "encoder resolved");

  let camera_dir = output_dir.join(&segment);
  let frames = match collect_frames(&camera_dir).await {
    Ok(frames) => frames,
    Err(CollectError::DirectoryMissing { path }) => return Err(AssembleError::NoFrames { path }),
    Err(e) => return Err(e.into()),
  };
  if frames.is_empty() {
    return Err(AssembleError::NoFrames { path: camera_dir });
  }

  let job = EncoderJob::new(output_dir, &segment, &Local::now(), camera.frame_duration);
  let manifest = render_manifest(&segment, &frames, job.frame_duration);
  fs::write(&job.list_path, manifest)
    .await
    .map_err(|source| AssembleError::ManifestWrite {
      path: job.list_path.clone(),
      source,
    })?;

  info!(
    camera = %name,
    frames = frames.len(),
    output = %job.output_path.display(),
    "creating timelapse"
  );

  let encoded = match build_command(camera.command_mode, &template, &job.list_path, &job.output_path) {
    Ok(command) => {
      let started = Instant::now();
      let result = command.run().await;
      ENCODER_DURATION
        .with_label_values(&[name])
        .observe(started.elapsed().as_secs_f64());
      result
    }
    Err(e) => Err(e.into()),
  };

  if let Err(e) = fs::remove_file(&job.list_path).await {
    warn!(
      camera = %name,
      path = %job.list_path.display(),
      error = %e,
      "failed to remove frame list"
    );
  }

  let output = encoded?;
  debug!(camera = %name, output = %output.trim_end(), "encoder finished");
  info!(camera = %name, output = %job.output_path.display(), "timelapse created");

  let mut removed = 0;
  let mut failed_removals = Vec::new();
  if camera.delete {
    for path in frames.paths() {
      match fs::remove_file(&path).await {
        Ok(()) => removed += 1,
        Err(e) => {
          warn!(camera = %name, path = %path.display(), error = %e, "failed to remove snapshot");
          failed_removals.push(path);
        }
      }
    }
    info!(
      camera = %name,
      removed,
      failed = failed_removals.len(),
      "snapshots removed"
    );
  }

  Ok(Assembled {
    output_path: job.output_path,
    frames: frames.len(),
    removed,
    failed_removals,
  })
}
