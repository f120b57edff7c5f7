use chrono::{DateTime, Utc};
use common::cameras::CameraIdentity;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::error::WriteError;

/// Snapshot file name for a capture taken at `at`.
///
/// The `.png` extension is fixed whatever the camera actually returned.
pub fn snapshot_file_name(at: DateTime<Utc>) -> String {
  format!("{}.png", at.timestamp_nanos_opt().unwrap_or(i64::MAX))
}

/// Persist snapshot bytes under `output_dir/<segment>/` and return the absolute
/// path written.
pub async fn write_snapshot(
  identity: &CameraIdentity,
  bytes: &[u8],
  output_dir: &Path,
) -> Result<PathBuf, WriteError> {
  let camera_dir = output_dir.join(identity.segment());

  fs::create_dir_all(&camera_dir)
    .await
    .map_err(|source| WriteError::DirectoryCreate {
      path: camera_dir.clone(),
      source,
    })?;

  let path = camera_dir.join(snapshot_file_name(Utc::now()));
  fs::write(&path, bytes)
    .await
    .map_err(|source| WriteError::FileWrite {
      path: path.clone(),
      source,
    })?;

  let path = std::path::absolute(&path).unwrap_or(path);
  debug!(
    camera = %identity,
    path = %path.display(),
    size_bytes = bytes.len(),
    "snapshot written"
  );

  Ok(path)
}
