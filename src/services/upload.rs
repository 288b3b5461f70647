use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;

use crate::error::RemoteError;
use crate::models::{Session, Settings};

/// Object storage behind the API: takes a binary and a destination path,
/// returns a durable URL.
#[async_trait]
pub trait UploadService: Send + Sync {
    async fn upload(
        &self,
        session: &Session,
        bytes: Vec<u8>,
        content_type: &str,
        object_path: &str,
    ) -> Result<String, RemoteError>;
}

#[derive(Debug, Clone)]
pub struct HttpUploadService {
    base_url: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct UploadResponse {
    #[allow(dead_code)]
    path: String,
    public_url: Option<String>,
    signed_url: Option<String>,
}

impl HttpUploadService {
    pub fn new(settings: &Settings) -> Self {
        Self {
            base_url: settings.api.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(settings.api.request_timeout_secs),
        }
    }
}

#[async_trait]
impl UploadService for HttpUploadService {
    async fn upload(
        &self,
        session: &Session,
        bytes: Vec<u8>,
        content_type: &str,
        object_path: &str,
    ) -> Result<String, RemoteError> {
        let client = reqwest::Client::builder().timeout(self.timeout).build()?;
        let part = Part::bytes(bytes)
            .file_name("photo")
            .mime_str(content_type)
            .map_err(|e| RemoteError::Upload(e.to_string()))?;
        let form = Form::new().part("file", part);

        let mut request = client
            .post(format!("{}/storage/upload", self.base_url))
            .query(&[("object_path", object_path)])
            .multipart(form);
        if let Some(token) = &session.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: UploadResponse =
            serde_json::from_str(&text).map_err(|e| RemoteError::Decode(e.to_string()))?;
        parsed
            .public_url
            .or(parsed.signed_url)
            .ok_or_else(|| RemoteError::Upload("upload response carried no url".to_string()))
    }
}
