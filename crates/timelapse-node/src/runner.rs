//! One-shot runs over a set of cameras.
//!
//! Every selected camera is processed even when an earlier one fails; the
//! report tells the caller whether to exit non-zero.

use common::cameras::CameraConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::capture::{take_snapshot, HttpTransport, SnapshotFetcher};
use crate::error::{JobError, Stage};
use crate::timelapse::create_timelapse;

#[derive(Debug, Default)]
pub struct BatchReport {
  pub succeeded: Vec<(String, PathBuf)>,
  pub failed: Vec<JobError>,
}

impl BatchReport {
  pub fn is_success(&self) -> bool {
    self.failed.is_empty()
  }

  /// First failure as an error, after the rest have been logged.
  pub fn into_result(self) -> Result<Vec<(String, PathBuf)>, JobError> {
    match self.failed.into_iter().next() {
      Some(e) => Err(e),
      None => Ok(self.succeeded),
    }
  }
}

/// Take one snapshot per camera. `transport` replaces the per-camera HTTP
/// clients when given.
pub async fn snapshot_all<'a>(
  cameras: impl IntoIterator<Item = &'a CameraConfig>,
  output_dir: &Path,
  transport: Option<Arc<dyn HttpTransport>>,
) -> BatchReport {
  let mut report = BatchReport::default();

  for camera in cameras {
    let fetcher = match &transport {
      Some(transport) => SnapshotFetcher::new(Arc::clone(transport)),
      None => match SnapshotFetcher::for_camera(camera) {
        Ok(fetcher) => fetcher,
        Err(e) => {
          report.failed.push(JobError::new(camera.name(), Stage::Fetch, e));
          continue;
        }
      },
    };

    match take_snapshot(camera, &fetcher, output_dir).await {
      Ok(path) => report.succeeded.push((camera.name().to_string(), path)),
      Err(e) => report.failed.push(e),
    }
  }

  info!(
    succeeded = report.succeeded.len(),
    failed = report.failed.len(),
    "snapshot run complete"
  );
  report
}

/// Assemble one timelapse per camera.
pub async fn timelapse_all<'a>(
  cameras: impl IntoIterator<Item = &'a CameraConfig>,
  output_dir: &Path,
) -> BatchReport {
  let mut report = BatchReport::default();

  for camera in cameras {
    match create_timelapse(camera, output_dir).await {
      Ok(assembled) => report
        .succeeded
        .push((camera.name().to_string(), assembled.output_path)),
      Err(e) => report.failed.push(e),
    }
  }

  info!(
    succeeded = report.succeeded.len(),
    failed = report.failed.len(),
    "timelapse run complete"
  );
  report
}
