pub mod fetcher;
pub mod writer;

pub use fetcher::{build_client, build_request, HttpTransport, SnapshotFetcher};
pub use writer::{snapshot_file_name, write_snapshot};

use common::cameras::CameraConfig;
use std::path::{Path, PathBuf};
use std::time::Instant;
use telemetry::metrics::{SNAPSHOTS_TOTAL, SNAPSHOT_BYTES, SNAPSHOT_FETCH_DURATION};
use tracing::{error, info};

use crate::error::{JobError, Stage};

/// Fetch one snapshot for `camera` and write it under `output_dir`.
pub async fn take_snapshot(
  camera: &CameraConfig,
  fetcher: &SnapshotFetcher,
  output_dir: &Path,
) -> Result<PathBuf, JobError> {
  let name = camera.name();

  let started = Instant::now();
  let fetched = fetcher.fetch(camera).await;
  SNAPSHOT_FETCH_DURATION
    .with_label_values(&[name])
    .observe(started.elapsed().as_secs_f64());

  let bytes = match fetched {
    Ok(bytes) => bytes,
    Err(e) => {
      SNAPSHOTS_TOTAL.with_label_values(&[name, "fetch_error"]).inc();
      error!(camera = %name, error = %e, "failed to fetch snapshot");
      return Err(JobError::new(name, Stage::Fetch, e));
    }
  };

  match write_snapshot(&camera.identity, &bytes, output_dir).await {
    Ok(path) => {
      SNAPSHOTS_TOTAL.with_label_values(&[name, "success"]).inc();
      SNAPSHOT_BYTES
        .with_label_values(&[name])
        .inc_by(bytes.len() as u64);
      info!(camera = %name, path = %path.display(), "snapshot saved");
      Ok(path)
    }
    Err(e) => {
      SNAPSHOTS_TOTAL.with_label_values(&[name, "write_error"]).inc();
      error!(camera = %name, error = %e, "failed to write snapshot");
      Err(JobError::new(name, Stage::Write, e))
    }
  }
}
