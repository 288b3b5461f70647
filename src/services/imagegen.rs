use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::RemoteError;
use crate::models::Settings;

#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub url: String,
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        style: &str,
        aspect_ratio: &str,
    ) -> Result<GeneratedImage, RemoteError>;
}

#[derive(Debug, Clone)]
pub struct HttpImageGenerator {
    base_url: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct ImageGenerateRequest<'a> {
    prompt: &'a str,
    style: &'a str,
    aspect_ratio: &'a str,
}

#[derive(Deserialize)]
struct ImageGenerateResponse {
    #[allow(dead_code)]
    path: String,
    public_url: Option<String>,
    signed_url: Option<String>,
}

impl HttpImageGenerator {
    pub fn new(settings: &Settings) -> Self {
        Self {
            base_url: settings.api.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(settings.api.request_timeout_secs),
        }
    }
}

#[async_trait]
impl ImageGenerator for HttpImageGenerator {
    async fn generate(
        &self,
        prompt: &str,
        style: &str,
        aspect_ratio: &str,
    ) -> Result<GeneratedImage, RemoteError> {
        let client = reqwest::Client::builder().timeout(self.timeout).build()?;
        let request = ImageGenerateRequest {
            prompt,
            style,
            aspect_ratio,
        };
        let response = client
            .post(format!("{}/image/generate", self.base_url))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: ImageGenerateResponse =
            serde_json::from_str(&text).map_err(|e| RemoteError::Decode(e.to_string()))?;
        let url = parsed
            .public_url
            .or(parsed.signed_url)
            .ok_or_else(|| RemoteError::Decode("image response carried no url".to_string()))?;
        Ok(GeneratedImage { url })
    }
}
