use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tracing::debug;

use crate::error::CollectError;

/// Extensions accepted as frames, compared lowercased.
pub const FRAME_EXTENSIONS: [&str; 2] = ["jpg", "png"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
  pub name: String,
  pub modified: SystemTime,
}

/// Point-in-time listing of a camera directory, oldest frame first.
#[derive(Debug, Clone)]
pub struct FrameList {
  dir: PathBuf,
  frames: Vec<Frame>,
}

impl FrameList {
  pub fn dir(&self) -> &Path {
    &self.dir
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Frame> {
    self.frames.iter()
  }

  pub fn len(&self) -> usize {
    self.frames.len()
  }

  pub fn is_empty(&self) -> bool {
    self.frames.is_empty()
  }

  pub fn last(&self) -> Option<&Frame> {
    self.frames.last()
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.frames.iter().map(|f| f.name.as_str())
  }

  pub fn paths(&self) -> impl Iterator<Item = PathBuf> + '_ {
    self.frames.iter().map(|f| self.dir.join(&f.name))
  }
}

impl<'a> IntoIterator for &'a FrameList {
  type Item = &'a Frame;
  type IntoIter = std::slice::Iter<'a, Frame>;

  fn into_iter(self) -> Self::IntoIter {
    self.frames.iter()
  }
}

fn is_frame(name: &str) -> bool {
  Path::new(name)
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
    .unwrap_or(false)
}

/// List the frames in `dir` ordered by modification time, then by name.
///
/// A missing directory is an error; an empty one is not.
pub async fn collect_frames(dir: &Path) -> Result<FrameList, CollectError> {
  let read_error = |source: std::io::Error| CollectError::Read {
    path: dir.to_path_buf(),
    source,
  };

  let mut entries = match fs::read_dir(dir).await {
    Ok(entries) => entries,
    Err(e) if e.kind() == ErrorKind::NotFound => {
      return Err(CollectError::DirectoryMissing {
        path: dir.to_path_buf(),
      })
    }
    Err(e) => return Err(read_error(e)),
  };

  let mut frames = Vec::new();
  while let Some(entry) = entries.next_entry().await.map_err(read_error)? {
    let metadata = entry.metadata().await.map_err(read_error)?;
    if metadata.is_dir() {
      continue;
    }

    let Ok(name) = entry.file_name().into_string() else {
      debug!(path = %entry.path().display(), "skipping non UTF-8 file name");
      continue;
    };
    if !is_frame(&name) {
      continue;
    }

    let modified = metadata.modified().map_err(read_error)?;
    frames.push(Frame { name, modified });
  }

  frames.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.name.cmp(&b.name)));

  debug!(dir = %dir.display(), count = frames.len(), "collected frames");

  Ok(FrameList {
    dir: dir.to_path_buf(),
    frames,
  })
}
