//! YAML configuration file loading and load-time default resolution.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::cameras::{AuthSpec, CameraConfig, CameraIdentity, CommandMode};
use crate::validation;

pub const DEFAULT_OUTPUT_DIR: &str = "/tmp";
pub const DEFAULT_INTERVAL: &str = "*/5 * * * *";
pub const DEFAULT_TIMELAPSE_INTERVAL: &str = "0 * * * *";
pub const DEFAULT_FRAME_DURATION: f64 = 0.0416667;
pub const DEFAULT_FFMPEG_TEMPLATE: &str = "ffmpeg -f concat -safe 0 -i {{.ListPath}} -vf fps=24,format=yuv420p -c:v libx264 -preset medium -crf 23 -movflags +faststart -y {{.OutputPath}}";

/// Authentication block as written in the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuthFileConfig {
  #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
  pub kind: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub username: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub password: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub token: Option<String>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub params: BTreeMap<String, String>,
}

impl AuthFileConfig {
  /// Missing, empty and `none` types yield [`AuthSpec::None`]; unknown types
  /// are rejected.
  pub fn resolve(&self) -> Result<AuthSpec> {
    let kind = self.kind.as_deref().map(str::trim).unwrap_or_default().to_lowercase();
    match kind.as_str() {
      "" | "none" => Ok(AuthSpec::None),
      "basic" => Ok(AuthSpec::Basic {
        username: self.username.clone().unwrap_or_default(),
        password: self.password.clone().unwrap_or_default(),
      }),
      "bearer" => {
        let token = self
          .token
          .clone()
          .filter(|t| !t.is_empty())
          .ok_or_else(|| anyhow!("bearer auth requires a token"))?;
        Ok(AuthSpec::Bearer { token })
      }
      "query" => {
        if self.params.is_empty() {
          bail!("query auth requires at least one entry in params");
        }
        Ok(AuthSpec::Query {
          params: self.params.clone(),
        })
      }
      other => Err(anyhow!(
        "unknown auth type '{}' (expected none, basic, bearer or query)",
        other
      )),
    }
  }
}

/// Camera entry as written in the file; unset overrides are `None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CameraFileConfig {
  pub name: String,
  pub snapshot_url: String,
  #[serde(default)]
  pub insecure: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub auth: Option<AuthFileConfig>,
  #[serde(default)]
  pub delete: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub interval: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub timelapse_interval: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub frame_duration: Option<f64>,
  #[serde(rename = "ffmpeg_template", default, skip_serializing_if = "Option::is_none")]
  pub ffmpeg_template: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub command_mode: Option<CommandMode>,
}

/// Whole configuration file with global defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileConfig {
  #[serde(default = "default_output_dir")]
  pub output_dir: PathBuf,
  #[serde(default = "default_interval")]
  pub interval: String,
  #[serde(default = "default_timelapse_interval")]
  pub timelapse_interval: String,
  #[serde(default = "default_frame_duration")]
  pub frame_duration: f64,
  #[serde(rename = "ffmpeg_template", default = "default_ffmpeg_template")]
  pub ffmpeg_template: String,
  #[serde(default)]
  pub command_mode: CommandMode,
  #[serde(default)]
  pub cameras: Vec<CameraFileConfig>,
}

fn default_output_dir() -> PathBuf {
  PathBuf::from(DEFAULT_OUTPUT_DIR)
}

fn default_interval() -> String {
  DEFAULT_INTERVAL.to_string()
}

fn default_timelapse_interval() -> String {
  DEFAULT_TIMELAPSE_INTERVAL.to_string()
}

fn default_frame_duration() -> f64 {
  DEFAULT_FRAME_DURATION
}

fn default_ffmpeg_template() -> String {
  DEFAULT_FFMPEG_TEMPLATE.to_string()
}

impl Default for FileConfig {
  fn default() -> Self {
    Self {
      output_dir: default_output_dir(),
      interval: default_interval(),
      timelapse_interval: default_timelapse_interval(),
      frame_duration: default_frame_duration(),
      ffmpeg_template: default_ffmpeg_template(),
      command_mode: CommandMode::default(),
      cameras: Vec::new(),
    }
  }
}

/// Resolved configuration handed to the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
  pub output_dir: PathBuf,
  pub interval: String,
  pub timelapse_interval: String,
  pub frame_duration: f64,
  pub ffmpeg_template: String,
  pub command_mode: CommandMode,
  pub cameras: Vec<CameraConfig>,
}

impl AppConfig {
  /// Read, parse and resolve a YAML configuration file.
  pub fn load(path: &Path) -> Result<Self> {
    let data = std::fs::read_to_string(path)
      .with_context(|| format!("error reading config file {}", path.display()))?;
    Self::from_yaml(&data).with_context(|| format!("error loading config file {}", path.display()))
  }

  pub fn from_yaml(data: &str) -> Result<Self> {
    let file: FileConfig = serde_yaml::from_str(data).context("error parsing config file")?;
    Self::resolve(file)
  }

  /// Fill every unset camera override from the global defaults and validate
  /// the result.
  pub fn resolve(file: FileConfig) -> Result<Self> {
    validation::validate_non_empty(&file.interval, "interval")?;
    validation::validate_non_empty(&file.timelapse_interval, "timelapseInterval")?;
    validation::validate_frame_duration(file.frame_duration, "frameDuration")?;
    validation::validate_template(&file.ffmpeg_template, "ffmpeg_template")?;

    let mut seen_segments = HashSet::new();
    let mut cameras = Vec::with_capacity(file.cameras.len());

    for (index, cam) in file.cameras.into_iter().enumerate() {
      let field = |name: &str| format!("cameras[{}].{}", index, name);

      validation::validate_name(&cam.name, &field("name"))?;
      validation::validate_snapshot_url(&cam.snapshot_url, &field("snapshotUrl"))?;

      let identity = CameraIdentity::new(cam.name.clone());
      let segment = identity.segment();
      validation::validate_segment(&segment, &field("name"))?;
      if !seen_segments.insert(segment.clone()) {
        bail!(
          "camera '{}' maps to directory '{}' which is already used by another camera",
          cam.name,
          segment
        );
      }

      let auth = cam
        .auth
        .as_ref()
        .map(AuthFileConfig::resolve)
        .transpose()
        .with_context(|| format!("invalid {}", field("auth")))?
        .unwrap_or_default();

      let interval = inherit(&cam.name, "interval", cam.interval, &file.interval);
      let timelapse_interval = inherit(
        &cam.name,
        "timelapseInterval",
        cam.timelapse_interval,
        &file.timelapse_interval,
      );
      let ffmpeg_template = inherit(&cam.name, "ffmpeg_template", cam.ffmpeg_template, &file.ffmpeg_template);

      let frame_duration = match cam.frame_duration {
        Some(d) if d != 0.0 => d,
        _ => {
          debug!(camera = %cam.name, to = file.frame_duration, "applying default frameDuration");
          file.frame_duration
        }
      };
      validation::validate_frame_duration(frame_duration, &field("frameDuration"))?;
      validation::validate_template(&ffmpeg_template, &field("ffmpeg_template"))?;

      cameras.push(CameraConfig {
        identity,
        snapshot_url: cam.snapshot_url,
        insecure: cam.insecure,
        auth,
        delete: cam.delete,
        interval,
        timelapse_interval,
        frame_duration,
        ffmpeg_template,
        command_mode: cam.command_mode.unwrap_or(file.command_mode),
      });
    }

    Ok(Self {
      output_dir: file.output_dir,
      interval: file.interval,
      timelapse_interval: file.timelapse_interval,
      frame_duration: file.frame_duration,
      ffmpeg_template: file.ffmpeg_template,
      command_mode: file.command_mode,
      cameras,
    })
  }

  /// Case-insensitive lookup by name or directory segment.
  pub fn find_camera(&self, name: &str) -> Option<&CameraConfig> {
    self
      .cameras
      .iter()
      .find(|c| c.name().eq_ignore_ascii_case(name) || c.segment() == name)
  }
}

fn inherit(camera: &str, key: &str, value: Option<String>, default: &str) -> String {
  match value.filter(|v| !v.trim().is_empty()) {
    Some(v) => v,
    None => {
      debug!(camera = %camera, key = key, to = %default, "applying default");
      default.to_string()
    }
  }
}

/// Example configuration with the defaults and one camera using basic auth.
pub fn example_config() -> Result<String> {
  let mut config = FileConfig::default();
  config.cameras.push(CameraFileConfig {
    name: "camera1".to_string(),
    snapshot_url: "http://localhost:8080/snapshot".to_string(),
    auth: Some(AuthFileConfig {
      kind: Some("basic".to_string()),
      username: Some("admin".to_string()),
      password: Some("admin".to_string()),
      ..Default::default()
    }),
    ..Default::default()
  });
  serde_yaml::to_string(&config).context("error creating example configuration")
}
