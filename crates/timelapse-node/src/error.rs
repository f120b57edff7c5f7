use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum FetchError {
  #[error("failed to build snapshot request for '{url}': {reason}")]
  RequestBuild { url: String, reason: String },

  #[error("snapshot request failed: {0}")]
  Transport(#[source] BoxError),

  #[error("unexpected status code: {code}")]
  UnexpectedStatus { code: u16 },

  #[error("failed to read snapshot body: {0}")]
  Body(#[source] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum WriteError {
  #[error("failed to create camera directory {}: {source}", path.display())]
  DirectoryCreate { path: PathBuf, source: io::Error },

  #[error("failed to write snapshot {}: {source}", path.display())]
  FileWrite { path: PathBuf, source: io::Error },
}

#[derive(Debug, Error)]
pub enum CollectError {
  #[error("camera directory {} does not exist", path.display())]
  DirectoryMissing { path: PathBuf },

  #[error("failed to read camera directory {}: {source}", path.display())]
  Read { path: PathBuf, source: io::Error },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
  #[error("malformed encoder template at byte {position}: {reason}")]
  Parse { position: usize, reason: String },

  #[error("encoder template references unknown variable '{variable}' (expected ListPath or OutputPath)")]
  Exec { variable: String },
}

#[derive(Debug, Error)]
pub enum AssembleError {
  #[error("encoder '{program}' not found in PATH")]
  EncoderNotFound { program: String },

  #[error("no snapshots found in {}", path.display())]
  NoFrames { path: PathBuf },

  #[error(transparent)]
  Collect(#[from] CollectError),

  #[error("failed to write frame list {}: {source}", path.display())]
  ManifestWrite { path: PathBuf, source: io::Error },

  #[error("error building encoder command: {0}")]
  Template(#[from] TemplateError),

  #[error("failed to start encoder '{program}': {source}")]
  EncoderSpawn { program: String, source: io::Error },

  #[error("encoder exited with {status}: {output}")]
  EncoderExecution { status: String, output: String },
}

#[derive(Debug, Error)]
pub enum ScheduleError {
  #[error("invalid cron expression '{expression}': {reason}")]
  Expression { expression: String, reason: String },

  #[error("camera '{camera}' has an invalid {job} schedule '{expression}': {reason}")]
  Registration {
    camera: String,
    job: String,
    expression: String,
    reason: String,
  },

  #[error("failed to prepare HTTP client for camera '{camera}': {reason}")]
  Client { camera: String, reason: String },
}

/// Pipeline stage a job failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
  Fetch,
  Write,
  Timelapse,
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Stage::Fetch => write!(f, "snapshot fetch"),
      Stage::Write => write!(f, "snapshot write"),
      Stage::Timelapse => write!(f, "timelapse"),
    }
  }
}

#[derive(Debug, Error)]
pub enum StageError {
  #[error(transparent)]
  Fetch(#[from] FetchError),

  #[error(transparent)]
  Write(#[from] WriteError),

  #[error(transparent)]
  Assemble(#[from] AssembleError),
}

/// A failed job invocation, tagged with the camera and the stage that failed.
#[derive(Debug, Error)]
#[error("camera '{camera}' {stage} failed: {error}")]
pub struct JobError {
  pub camera: String,
  pub stage: Stage,
  pub error: StageError,
}

impl JobError {
  pub fn new(camera: impl Into<String>, stage: Stage, error: impl Into<StageError>) -> Self {
    Self {
      camera: camera.into(),
      stage,
      error: error.into(),
    }
  }
}
