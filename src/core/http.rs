//! Google Play Developer API (v2 edits) over blocking HTTP
//!
//! Each [`PublisherApi`] method is one request. Non-2xx responses become
//! [`ApiError::Status`] with the message from Google's error envelope, and a
//! client timeout becomes [`ApiError::Timeout`] so the commit path can tell an
//! ambiguous commit from a failed one.

use crate::core::api::{ApiError, ExpansionFileInfo, ExpansionFileType, PublisherApi, RemoteArtifact, TrackState};
use crate::core::config::ApiConfig;
use crate::core::error::{PublishError, PublishResult};
use reqwest::StatusCode;
use reqwest::blocking::{Body, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs::File;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const APK_CONTENT_TYPE: &str = "application/vnd.android.package-archive";
const OCTET_STREAM: &str = "application/octet-stream";

pub struct HttpPublisher {
  client: Client,
  base_url: String,
  upload_url: String,
  token: String,
}

impl HttpPublisher {
  pub fn new(api: &ApiConfig, token: String) -> PublishResult<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(api.timeout_secs))
      .user_agent(concat!("playtrack/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| PublishError::message(format!("Failed to build HTTP client: {}", e)))?;
    Ok(Self {
      client,
      base_url: api.base_url.trim_end_matches('/').to_string(),
      upload_url: api.upload_url.trim_end_matches('/').to_string(),
      token,
    })
  }

  fn edit_url(&self, application_id: &str, edit_id: &str) -> String {
    format!("{}/{}/edits/{}", self.base_url, application_id, edit_id)
  }

  fn upload_edit_url(&self, application_id: &str, edit_id: &str) -> String {
    format!("{}/{}/edits/{}", self.upload_url, application_id, edit_id)
  }

  fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
    let response = request.bearer_auth(&self.token).send().map_err(transport_error)?;
    let status = response.status();
    debug!(status = status.as_u16(), url = %response.url(), "response");
    if status.is_success() {
      Ok(response)
    } else {
      Err(status_error(status, response))
    }
  }

  fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
    self.send(request)?.json::<T>().map_err(transport_error)
  }
}

fn transport_error(err: reqwest::Error) -> ApiError {
  if err.is_timeout() {
    ApiError::Timeout
  } else {
    ApiError::Transport(err.to_string())
  }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
  error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
  message: Option<String>,
}

fn status_error(status: StatusCode, response: Response) -> ApiError {
  let message = response
    .text()
    .ok()
    .and_then(|body| serde_json::from_str::<ErrorEnvelope>(&body).ok())
    .and_then(|envelope| envelope.error.message);
  ApiError::Status {
    code: status.as_u16(),
    message,
  }
}

fn open_file(path: &Path) -> Result<Body, ApiError> {
  let file = File::open(path).map_err(|e| ApiError::Transport(format!("Failed to open {}: {}", path.display(), e)))?;
  Ok(Body::from(file))
}

#[derive(Deserialize)]
struct EditWire {
  id: String,
}

#[derive(Deserialize)]
struct ApksWire {
  #[serde(default)]
  apks: Vec<ApkWire>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApkWire {
  version_code: u32,
  #[serde(default)]
  binary: Option<BinaryWire>,
}

#[derive(Deserialize)]
struct BinaryWire {
  #[serde(default)]
  sha1: String,
}

impl From<ApkWire> for RemoteArtifact {
  fn from(apk: ApkWire) -> Self {
    RemoteArtifact {
      version_code: apk.version_code,
      sha1: apk.binary.map(|b| b.sha1.to_ascii_lowercase()).unwrap_or_default(),
    }
  }
}

/// int64 fields arrive as JSON strings
fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Lenient {
    Number(u64),
    Text(String),
  }
  Ok(match Option::<Lenient>::deserialize(deserializer)? {
    Some(Lenient::Number(n)) => Some(n),
    Some(Lenient::Text(s)) => s.parse().ok(),
    None => None,
  })
}

#[derive(Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExpansionFileWire {
  #[serde(default, deserialize_with = "lenient_u64", skip_serializing_if = "Option::is_none")]
  file_size: Option<u64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  references_version: Option<u32>,
}

impl From<ExpansionFileWire> for ExpansionFileInfo {
  fn from(wire: ExpansionFileWire) -> Self {
    ExpansionFileInfo {
      file_size: wire.file_size,
      references_version: wire.references_version,
    }
  }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExpansionUploadWire {
  expansion_file: ExpansionFileWire,
}

#[derive(Deserialize)]
struct TracksWire {
  #[serde(default)]
  tracks: Vec<TrackState>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListingWire<'a> {
  language: &'a str,
  recent_changes: &'a str,
}

impl PublisherApi for HttpPublisher {
  fn open_edit(&self, application_id: &str) -> Result<String, ApiError> {
    let url = format!("{}/{}/edits", self.base_url, application_id);
    let edit: EditWire = self.send_json(self.client.post(url).json(&serde_json::json!({})))?;
    Ok(edit.id)
  }

  fn list_artifacts(&self, application_id: &str, edit_id: &str) -> Result<Vec<RemoteArtifact>, ApiError> {
    let url = format!("{}/apks", self.edit_url(application_id, edit_id));
    let list: ApksWire = self.send_json(self.client.get(url))?;
    Ok(list.apks.into_iter().map(RemoteArtifact::from).collect())
  }

  fn upload_artifact(&self, application_id: &str, edit_id: &str, apk: &Path) -> Result<RemoteArtifact, ApiError> {
    let url = format!("{}/apks", self.upload_edit_url(application_id, edit_id));
    let request = self
      .client
      .post(url)
      .query(&[("uploadType", "media")])
      .header(reqwest::header::CONTENT_TYPE, APK_CONTENT_TYPE)
      .body(open_file(apk)?);
    let uploaded: ApkWire = self.send_json(request)?;
    Ok(uploaded.into())
  }

  fn expansion_file(
    &self,
    application_id: &str,
    edit_id: &str,
    version_code: u32,
    file_type: ExpansionFileType,
  ) -> Result<Option<ExpansionFileInfo>, ApiError> {
    let url = format!(
      "{}/apks/{}/expansionFiles/{}",
      self.edit_url(application_id, edit_id),
      version_code,
      file_type
    );
    match self.send_json::<ExpansionFileWire>(self.client.get(url)) {
      Ok(wire) => Ok(Some(wire.into())),
      Err(ApiError::Status { code: 404, .. }) => Ok(None),
      Err(err) => Err(err),
    }
  }

  fn upload_expansion_file(
    &self,
    application_id: &str,
    edit_id: &str,
    version_code: u32,
    file_type: ExpansionFileType,
    file: &Path,
  ) -> Result<ExpansionFileInfo, ApiError> {
    let url = format!(
      "{}/apks/{}/expansionFiles/{}",
      self.upload_edit_url(application_id, edit_id),
      version_code,
      file_type
    );
    let request = self
      .client
      .post(url)
      .query(&[("uploadType", "media")])
      .header(reqwest::header::CONTENT_TYPE, OCTET_STREAM)
      .body(open_file(file)?);
    let uploaded: ExpansionUploadWire = self.send_json(request)?;
    Ok(uploaded.expansion_file.into())
  }

  fn reference_expansion_file(
    &self,
    application_id: &str,
    edit_id: &str,
    version_code: u32,
    file_type: ExpansionFileType,
    references_version: u32,
  ) -> Result<ExpansionFileInfo, ApiError> {
    let url = format!(
      "{}/apks/{}/expansionFiles/{}",
      self.edit_url(application_id, edit_id),
      version_code,
      file_type
    );
    let body = ExpansionFileWire {
      file_size: None,
      references_version: Some(references_version),
    };
    let stored: ExpansionFileWire = self.send_json(self.client.put(url).json(&body))?;
    Ok(stored.into())
  }

  fn list_tracks(&self, application_id: &str, edit_id: &str) -> Result<Vec<TrackState>, ApiError> {
    let url = format!("{}/tracks", self.edit_url(application_id, edit_id));
    let list: TracksWire = self.send_json(self.client.get(url))?;
    Ok(list.tracks)
  }

  fn update_track(&self, application_id: &str, edit_id: &str, track: &TrackState) -> Result<TrackState, ApiError> {
    let url = format!("{}/tracks/{}", self.edit_url(application_id, edit_id), track.track);
    self.send_json(self.client.put(url).json(track))
  }

  fn update_listing(
    &self,
    application_id: &str,
    edit_id: &str,
    version_code: u32,
    language: &str,
    recent_changes: &str,
  ) -> Result<(), ApiError> {
    let url = format!(
      "{}/apks/{}/listings/{}",
      self.edit_url(application_id, edit_id),
      version_code,
      language
    );
    let body = ListingWire {
      language,
      recent_changes,
    };
    self.send(self.client.put(url).json(&body))?;
    Ok(())
  }

  fn commit_edit(&self, application_id: &str, edit_id: &str) -> Result<(), ApiError> {
    let url = format!("{}:commit", self.edit_url(application_id, edit_id));
    self.send(self.client.post(url))?;
    Ok(())
  }
}
