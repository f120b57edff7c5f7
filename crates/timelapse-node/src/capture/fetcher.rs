//! Authenticated HTTP snapshot fetching

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use common::cameras::{AuthSpec, CameraConfig};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Method, Request, Response, StatusCode};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;
use url::{form_urlencoded, Url};

use crate::error::{BoxError, FetchError};

/// Executes a prepared snapshot request.
///
/// `reqwest::Client` is the production implementation; tests substitute a
/// transport that answers without touching the network.
#[async_trait]
pub trait HttpTransport: Send + Sync {
  async fn send(&self, request: Request) -> Result<Response, BoxError>;
}

#[async_trait]
impl HttpTransport for reqwest::Client {
  async fn send(&self, request: Request) -> Result<Response, BoxError> {
    self.execute(request).await.map_err(Into::into)
  }
}

/// Build the HTTP client used for one camera.
///
/// `insecure` only affects this camera's client.
pub fn build_client(camera: &CameraConfig) -> Result<reqwest::Client, FetchError> {
  reqwest::Client::builder()
    .user_agent(concat!("timelapser/", env!("CARGO_PKG_VERSION")))
    .danger_accept_invalid_certs(camera.insecure)
    .build()
    .map_err(|e| FetchError::RequestBuild {
      url: camera.snapshot_url.clone(),
      reason: e.to_string(),
    })
}

#[derive(Clone)]
pub struct SnapshotFetcher {
  transport: Arc<dyn HttpTransport>,
}

impl SnapshotFetcher {
  pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
    Self { transport }
  }

  /// Fetcher backed by a real HTTP client configured for `camera`.
  pub fn for_camera(camera: &CameraConfig) -> Result<Self, FetchError> {
    Ok(Self::new(Arc::new(build_client(camera)?)))
  }

  /// Perform one GET against the camera's snapshot endpoint and return the
  /// full body. No retries.
  pub async fn fetch(&self, camera: &CameraConfig) -> Result<Bytes, FetchError> {
    let request = build_request(camera)?;

    debug!(
      camera = %camera.name(),
      url = %camera.snapshot_url,
      auth = camera.auth.kind(),
      "requesting snapshot"
    );

    let response = self.transport.send(request).await.map_err(FetchError::Transport)?;

    let status = response.status();
    if status != StatusCode::OK {
      // Dropping the response releases the connection without reading the body.
      return Err(FetchError::UnexpectedStatus {
        code: status.as_u16(),
      });
    }

    let body = response.bytes().await.map_err(FetchError::Body)?;

    debug!(camera = %camera.name(), size_bytes = body.len(), "snapshot received");

    Ok(body)
  }
}

/// Build the GET request for a camera, applying its authentication.
pub fn build_request(camera: &CameraConfig) -> Result<Request, FetchError> {
  let build_error = |reason: String| FetchError::RequestBuild {
    url: camera.snapshot_url.clone(),
    reason,
  };

  let mut url = Url::parse(&camera.snapshot_url).map_err(|e| build_error(e.to_string()))?;
  if let AuthSpec::Query { params } = &camera.auth {
    merge_query(&mut url, params);
  }

  let mut request = Request::new(Method::GET, url);

  let authorization = match &camera.auth {
    AuthSpec::Basic { username, password } => {
      let encoded =
        base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", username, password));
      Some(format!("Basic {}", encoded))
    }
    AuthSpec::Bearer { token } => Some(format!("Bearer {}", token)),
    AuthSpec::None | AuthSpec::Query { .. } => None,
  };

  if let Some(value) = authorization {
    let mut value = HeaderValue::from_str(&value)
      .map_err(|e| build_error(format!("invalid authorization header: {}", e)))?;
    value.set_sensitive(true);
    request.headers_mut().insert(AUTHORIZATION, value);
  }

  Ok(request)
}

/// Merge `params` into the query string. Existing parameters are kept as
/// written unless a key is overwritten by `params`.
fn merge_query(url: &mut Url, params: &BTreeMap<String, String>) {
  let mut parts: Vec<String> = url
    .query()
    .unwrap_or_default()
    .split('&')
    .filter(|raw| !raw.is_empty())
    .filter(|raw| {
      form_urlencoded::parse(raw.as_bytes())
        .next()
        .map(|(key, _)| !params.contains_key(key.as_ref()))
        .unwrap_or(true)
    })
    .map(str::to_string)
    .collect();

  let added = form_urlencoded::Serializer::new(String::new())
    .extend_pairs(params.iter())
    .finish();
  if !added.is_empty() {
    parts.push(added);
  }

  if parts.is_empty() {
    url.set_query(None);
  } else {
    url.set_query(Some(&parts.join("&")));
  }
}
