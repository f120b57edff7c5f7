use anyhow::Result;
use axum::{
  extract::Query,
  http::{header::AUTHORIZATION, HeaderMap, StatusCode},
  routing::get,
  Router,
};
use base64::Engine;
use common::config::AppConfig;
use std::collections::HashMap;
use std::net::SocketAddr;
use tempfile::TempDir;
use timelapse_node::{
  runner::snapshot_all, take_snapshot, FetchError, SnapshotFetcher, Stage, StageError,
};
use tokio::{net::TcpListener, task::JoinHandle};

const FRAME: &[u8] = b"\x89PNG fake frame";

fn authorized(headers: &HeaderMap, expected: &str) -> bool {
  headers
    .get(AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .map(|v| v == expected)
    .unwrap_or(false)
}

fn camera_router() -> Router {
  Router::new()
    .route("/snapshot.jpg", get(|| async { FRAME }))
    .route("/forbidden.jpg", get(|| async { (StatusCode::UNAUTHORIZED, "denied") }))
    .route(
      "/basic.jpg",
      get(|headers: HeaderMap| async move {
        let expected = format!(
          "Basic {}",
          base64::engine::general_purpose::STANDARD.encode("admin:secret")
        );
        if authorized(&headers, &expected) {
          (StatusCode::OK, FRAME)
        } else {
          (StatusCode::UNAUTHORIZED, &b""[..])
        }
      }),
    )
    .route(
      "/bearer.jpg",
      get(|headers: HeaderMap| async move {
        if authorized(&headers, "Bearer tok-123") {
          (StatusCode::OK, FRAME)
        } else {
          (StatusCode::UNAUTHORIZED, &b""[..])
        }
      }),
    )
    .route(
      "/query.jpg",
      get(|headers: HeaderMap, Query(params): Query<HashMap<String, String>>| async move {
        let ok = headers.get(AUTHORIZATION).is_none()
          && params.get("user").map(String::as_str) == Some("viewer")
          && params.get("key").map(String::as_str) == Some("k1")
          && params.get("channel").map(String::as_str) == Some("2");
        if ok {
          (StatusCode::OK, FRAME)
        } else {
          (StatusCode::UNAUTHORIZED, &b""[..])
        }
      }),
    )
}

async fn spawn_router(router: Router) -> Result<(SocketAddr, JoinHandle<()>)> {
  let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
  let addr = listener.local_addr()?;
  let handle = tokio::spawn(async move {
    axum::serve(listener, router.into_make_service())
      .await
      .expect("server failed");
  });
  Ok((addr, handle))
}

fn config_for(addr: SocketAddr, output_dir: &std::path::Path) -> Result<AppConfig> {
  let yaml = format!(
    r#"
outputDir: {dir}
cameras:
  - name: Open Cam
    snapshotUrl: http://{addr}/snapshot.jpg
  - name: Basic Cam
    snapshotUrl: http://{addr}/basic.jpg
    auth:
      type: basic
      username: admin
      password: secret
  - name: Bearer Cam
    snapshotUrl: http://{addr}/bearer.jpg
    auth:
      type: bearer
      token: tok-123
  - name: Query Cam
    snapshotUrl: http://{addr}/query.jpg?channel=1
    auth:
      type: query
      params:
        user: viewer
        key: k1
        channel: "2"
  - name: Locked Cam
    snapshotUrl: http://{addr}/forbidden.jpg
  - name: Wrong Password
    snapshotUrl: http://{addr}/basic.jpg
    auth:
      type: basic
      username: admin
      password: guess
"#,
    dir = output_dir.display(),
    addr = addr,
  );
  AppConfig::from_yaml(&yaml)
}

#[tokio::test]
async fn fetches_with_each_auth_mode() -> Result<()> {
  let _ = tracing_subscriber::fmt::try_init();
  let (addr, server) = spawn_router(camera_router()).await?;
  let temp = TempDir::new()?;
  let config = config_for(addr, temp.path())?;

  for name in ["Open Cam", "Basic Cam", "Bearer Cam", "Query Cam"] {
    let camera = config.find_camera(name).expect("camera configured");
    let fetcher = SnapshotFetcher::for_camera(camera)?;
    let body = fetcher.fetch(camera).await?;
    assert_eq!(body.as_ref(), FRAME, "camera {}", name);
  }

  server.abort();
  Ok(())
}

#[tokio::test]
async fn unauthorized_response_is_status_error() -> Result<()> {
  let (addr, server) = spawn_router(camera_router()).await?;
  let temp = TempDir::new()?;
  let config = config_for(addr, temp.path())?;

  for name in ["Locked Cam", "Wrong Password"] {
    let camera = config.find_camera(name).expect("camera configured");
    let err = SnapshotFetcher::for_camera(camera)?
      .fetch(camera)
      .await
      .expect_err("fetch should fail");
    assert!(matches!(err, FetchError::UnexpectedStatus { code: 401 }), "{name}: {err}");
  }

  server.abort();
  Ok(())
}

#[tokio::test]
async fn connection_refused_is_transport_error() -> Result<()> {
  // Bind then drop a listener so the port is known to be closed.
  let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
  let addr = listener.local_addr()?;
  drop(listener);

  let temp = TempDir::new()?;
  let config = config_for(addr, temp.path())?;
  let camera = config.find_camera("Open Cam").expect("camera configured");

  let err = SnapshotFetcher::for_camera(camera)?
    .fetch(camera)
    .await
    .expect_err("fetch should fail");
  assert!(matches!(err, FetchError::Transport(_)));
  Ok(())
}

#[tokio::test]
async fn snapshot_lands_in_camera_directory() -> Result<()> {
  let (addr, server) = spawn_router(camera_router()).await?;
  let temp = TempDir::new()?;
  let config = config_for(addr, temp.path())?;
  let camera = config.find_camera("Bearer Cam").expect("camera configured");

  let fetcher = SnapshotFetcher::for_camera(camera)?;
  let path = take_snapshot(camera, &fetcher, &config.output_dir).await?;

  assert!(path.is_absolute());
  assert!(path.starts_with(temp.path().join("bearerCam")));
  assert_eq!(path.extension().and_then(|e| e.to_str()), Some("png"));
  assert_eq!(std::fs::read(&path)?, FRAME);

  server.abort();
  Ok(())
}

#[tokio::test]
async fn batch_snapshot_isolates_failures() -> Result<()> {
  let (addr, server) = spawn_router(camera_router()).await?;
  let temp = TempDir::new()?;
  let config = config_for(addr, temp.path())?;

  let report = snapshot_all(&config.cameras, &config.output_dir, None).await;

  assert_eq!(report.succeeded.len(), 4);
  assert_eq!(report.failed.len(), 2);
  for failure in &report.failed {
    assert_eq!(failure.stage, Stage::Fetch);
    assert!(matches!(
      failure.error,
      StageError::Fetch(FetchError::UnexpectedStatus { code: 401 })
    ));
  }
  assert!(temp.path().join("openCam").is_dir());
  assert!(!temp.path().join("lockedCam").exists());

  server.abort();
  Ok(())
}
