use common::cameras::CameraConfig;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use telemetry::metrics::SKIPPED_TICKS;
use tokio::sync::Mutex;
use tracing::{debug, info_span, warn, Instrument, Span};

use crate::capture::{take_snapshot, SnapshotFetcher};
use crate::error::JobError;
use crate::scheduler::expression::CronSchedule;
use crate::timelapse::create_timelapse;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
  Snapshot,
  Timelapse,
}

impl JobKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      JobKind::Snapshot => "snapshot",
      JobKind::Timelapse => "timelapse",
    }
  }
}

impl fmt::Display for JobKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Clone)]
pub enum JobAction {
  Snapshot(SnapshotFetcher),
  Timelapse,
}

impl JobAction {
  pub fn kind(&self) -> JobKind {
    match self {
      JobAction::Snapshot(_) => JobKind::Snapshot,
      JobAction::Timelapse => JobKind::Timelapse,
    }
  }
}

#[derive(Debug)]
pub enum FireOutcome {
  Completed,
  Failed(JobError),
  /// The previous run of the same job was still in flight.
  Skipped,
}

/// One recurring job: everything it needs is owned here, captured when the
/// job is registered.
pub struct JobDescriptor {
  camera: Arc<CameraConfig>,
  action: JobAction,
  expression: String,
  schedule: CronSchedule,
  output_dir: PathBuf,
  running: Mutex<()>,
  span: Span,
}

impl JobDescriptor {
  pub fn new(
    camera: Arc<CameraConfig>,
    action: JobAction,
    expression: String,
    schedule: CronSchedule,
    output_dir: PathBuf,
  ) -> Self {
    let span = info_span!("job", camera = %camera.name(), job = action.kind().as_str());
    Self {
      camera,
      action,
      expression,
      schedule,
      output_dir,
      running: Mutex::new(()),
      span,
    }
  }

  pub fn camera(&self) -> &CameraConfig {
    &self.camera
  }

  pub fn kind(&self) -> JobKind {
    self.action.kind()
  }

  pub fn expression(&self) -> &str {
    &self.expression
  }

  pub fn schedule(&self) -> &CronSchedule {
    &self.schedule
  }

  pub fn span(&self) -> &Span {
    &self.span
  }

  /// Run the job once unless a previous run is still going.
  pub async fn fire(&self) -> FireOutcome {
    async {
      let Ok(_running) = self.running.try_lock() else {
        SKIPPED_TICKS
          .with_label_values(&[self.camera.name(), self.kind().as_str()])
          .inc();
        warn!("previous run still in progress, skipping tick");
        return FireOutcome::Skipped;
      };

      debug!("job started");
      let result = match &self.action {
        JobAction::Snapshot(fetcher) => take_snapshot(&self.camera, fetcher, &self.output_dir)
          .await
          .map(|_| ()),
        JobAction::Timelapse => create_timelapse(&self.camera, &self.output_dir)
          .await
          .map(|_| ()),
      };

      match result {
        Ok(()) => {
          debug!("job finished");
          FireOutcome::Completed
        }
        Err(e) => FireOutcome::Failed(e),
      }
    }
    .instrument(self.span.clone())
    .await
  }

  #[cfg(test)]
  pub(crate) fn running(&self) -> &Mutex<()> {
    &self.running
  }
}

impl fmt::Debug for JobDescriptor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("JobDescriptor")
      .field("camera", &self.camera.name())
      .field("kind", &self.kind())
      .field("expression", &self.expression)
      .field("output_dir", &self.output_dir)
      .finish()
  }
}
