use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::RemoteError;
use crate::models::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationKind {
    /// A future-tense diary entry written from tomorrow's plan (or, when
    /// the plan is empty, suggested from the user's interests).
    Plan,
    /// Cleanup of a raw end-of-day reflection into readable diary prose.
    Reflection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedText {
    pub generated_text: String,
    pub image_prompt: String,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        kind: GenerationKind,
        input: &str,
        interests: &[String],
        style: &str,
    ) -> Result<GeneratedText, RemoteError>;
}

#[derive(Debug, Clone)]
pub struct HttpTextGenerator {
    base_url: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct FutureDiaryRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    plan: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    interests: Option<&'a [String]>,
    style: &'a str,
}

#[derive(Serialize)]
struct ReflectionRequest<'a> {
    reflection_text: &'a str,
    style: &'a str,
}

impl HttpTextGenerator {
    pub fn new(settings: &Settings) -> Self {
        Self {
            base_url: settings.api.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(settings.api.request_timeout_secs),
        }
    }

    async fn post_json<T: Serialize>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<GeneratedText, RemoteError> {
        let client = reqwest::Client::builder().timeout(self.timeout).build()?;
        let response = client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
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
        serde_json::from_str(&text).map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(
        &self,
        kind: GenerationKind,
        input: &str,
        interests: &[String],
        style: &str,
    ) -> Result<GeneratedText, RemoteError> {
        match kind {
            GenerationKind::Plan => {
                let input = input.trim();
                let request = FutureDiaryRequest {
                    plan: (!input.is_empty()).then_some(input),
                    interests: (input.is_empty() && !interests.is_empty()).then_some(interests),
                    style,
                };
                self.post_json("/text/future-diary", &request).await
            }
            GenerationKind::Reflection => {
                let request = ReflectionRequest {
                    reflection_text: input,
                    style,
                };
                self.post_json("/text/today-reflection", &request).await
            }
        }
    }
}
