use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::naming::to_path_segment;

/// Human readable camera name plus the directory segment derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CameraIdentity {
  name: String,
}

impl CameraIdentity {
  pub fn new(name: impl Into<String>) -> Self {
    Self { name: name.into() }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Recomputed from the name on every call.
  pub fn segment(&self) -> String {
    to_path_segment(&self.name)
  }
}

impl fmt::Display for CameraIdentity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.name)
  }
}

/// Authentication applied to a snapshot request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthSpec {
  #[default]
  None,
  Basic { username: String, password: String },
  Bearer { token: String },
  /// Merged into the snapshot URL query string.
  Query { params: BTreeMap<String, String> },
}

impl AuthSpec {
  pub fn kind(&self) -> &'static str {
    match self {
      AuthSpec::None => "none",
      AuthSpec::Basic { .. } => "basic",
      AuthSpec::Bearer { .. } => "bearer",
      AuthSpec::Query { .. } => "query",
    }
  }
}

/// How a rendered encoder template is turned into a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CommandMode {
  /// Template is split into words before substitution and spawned directly.
  #[default]
  Argv,
  /// Template is rendered to one string and handed to `sh -c`.
  Shell,
}

impl fmt::Display for CommandMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      CommandMode::Argv => write!(f, "argv"),
      CommandMode::Shell => write!(f, "shell"),
    }
  }
}

/// Fully resolved camera configuration. Every per-camera override has already
/// been filled from the global defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraConfig {
  pub identity: CameraIdentity,
  pub snapshot_url: String,
  pub insecure: bool,
  pub auth: AuthSpec,
  pub delete: bool,
  pub interval: String,
  pub timelapse_interval: String,
  pub frame_duration: f64,
  pub ffmpeg_template: String,
  pub command_mode: CommandMode,
}

impl CameraConfig {
  pub fn name(&self) -> &str {
    self.identity.name()
  }

  pub fn segment(&self) -> String {
    self.identity.segment()
  }
}
