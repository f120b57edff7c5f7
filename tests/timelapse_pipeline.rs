use anyhow::Result;
use common::config::AppConfig;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use timelapse_node::{create_timelapse, runner::timelapse_all, AssembleError, Stage, StageError};

fn config(output_dir: &Path, delete: bool) -> Result<AppConfig> {
  let yaml = format!(
    r#"
outputDir: {dir}
frameDuration: 0.25
ffmpeg_template: "cp {{{{.ListPath}}}} {{{{.OutputPath}}}}"
cameras:
  - name: Front Door
    snapshotUrl: http://10.0.0.10/snapshot.jpg
    delete: {delete}
"#,
    dir = output_dir.display(),
    delete = delete,
  );
  AppConfig::from_yaml(&yaml)
}

fn seed_old_frames(dir: &Path, names: &[&str]) -> Result<()> {
  std::fs::create_dir_all(dir)?;
  let base = SystemTime::now() - Duration::from_secs(3600);
  for (i, name) in names.iter().enumerate() {
    File::create(dir.join(name))?.set_modified(base + Duration::from_secs(i as u64 * 60))?;
  }
  Ok(())
}

fn entries_with_extension(dir: &Path, ext: &str) -> Result<Vec<PathBuf>> {
  let mut found = Vec::new();
  for entry in std::fs::read_dir(dir)? {
    let path = entry?.path();
    if path.extension().map(|e| e == ext).unwrap_or(false) {
      found.push(path);
    }
  }
  Ok(found)
}

#[tokio::test]
async fn assembles_video_and_keeps_frames() -> Result<()> {
  let _ = tracing_subscriber::fmt::try_init();
  let temp = TempDir::new()?;
  let config = config(temp.path(), false)?;
  let camera_dir = temp.path().join("frontDoor");
  // Name order is the reverse of capture order.
  seed_old_frames(&camera_dir, &["c.png", "b.jpg", "a.png"])?;

  let camera = &config.cameras[0];
  let assembled = create_timelapse(camera, &config.output_dir).await?;

  assert_eq!(assembled.frames, 3);
  assert_eq!(entries_with_extension(temp.path(), "mp4")?, vec![assembled.output_path.clone()]);
  assert!(entries_with_extension(temp.path(), "txt")?.is_empty());
  assert_eq!(std::fs::read_dir(&camera_dir)?.count(), 3);

  let file_name = assembled
    .output_path
    .file_name()
    .and_then(|n| n.to_str())
    .unwrap_or_default();
  assert!(file_name.starts_with("frontDoor-"));
  assert_eq!(file_name.len(), "frontDoor-20240101-000000.mp4".len());

  // The stand-in encoder copied the list file into the output.
  let manifest = std::fs::read_to_string(&assembled.output_path)?;
  assert_eq!(
    manifest,
    "file 'frontDoor/c.png'\nduration 0.250000\n\
     file 'frontDoor/b.jpg'\nduration 0.250000\n\
     file 'frontDoor/a.png'\nduration 0.250000\n\
     file 'frontDoor/a.png'\n"
  );
  Ok(())
}

#[tokio::test]
async fn missing_directory_creates_nothing() -> Result<()> {
  let temp = TempDir::new()?;
  let config = config(temp.path(), false)?;

  let err = create_timelapse(&config.cameras[0], &config.output_dir)
    .await
    .expect_err("no frames to assemble");

  assert_eq!(err.camera, "Front Door");
  assert_eq!(err.stage, Stage::Timelapse);
  assert!(matches!(err.error, StageError::Assemble(AssembleError::NoFrames { .. })));
  assert_eq!(std::fs::read_dir(temp.path())?.count(), 0);
  Ok(())
}

#[tokio::test]
async fn delete_flag_clears_frames_after_success() -> Result<()> {
  let temp = TempDir::new()?;
  let config = config(temp.path(), true)?;
  let camera_dir = temp.path().join("frontDoor");
  seed_old_frames(&camera_dir, &["1.png", "2.png"])?;
  std::fs::create_dir(camera_dir.join("archive"))?;

  let report = timelapse_all(&config.cameras, &config.output_dir).await;
  assert!(report.is_success());

  let remaining: Vec<_> = std::fs::read_dir(&camera_dir)?
    .map(|e| e.map(|e| e.file_name()))
    .collect::<Result<_, _>>()?;
  assert_eq!(remaining, vec!["archive"]);
  assert_eq!(entries_with_extension(temp.path(), "mp4")?.len(), 1);
  Ok(())
}

#[tokio::test]
async fn failing_encoder_keeps_frames() -> Result<()> {
  let temp = TempDir::new()?;
  let mut config = config(temp.path(), true)?;
  config.cameras[0].ffmpeg_template = "false {{ListPath}} {{OutputPath}}".to_string();
  let camera_dir = temp.path().join("frontDoor");
  seed_old_frames(&camera_dir, &["1.png"])?;

  let err = create_timelapse(&config.cameras[0], &config.output_dir)
    .await
    .expect_err("encoder exits non-zero");

  assert!(matches!(
    err.error,
    StageError::Assemble(AssembleError::EncoderExecution { .. })
  ));
  assert!(camera_dir.join("1.png").exists());
  assert!(entries_with_extension(temp.path(), "txt")?.is_empty());
  Ok(())
}
