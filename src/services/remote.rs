use async_trait::async_trait;
use chrono::NaiveDate;
use futures_util::future::join_all;
use reqwest::RequestBuilder;
use serde::Deserialize;
use std::time::Duration;

use crate::error::RemoteError;
use crate::models::{DiaryEntry, Session, Settings};
use crate::utils::dates::{date_key, month_key};

/// The remote diary store, addressed by (user, date). The server owns
/// `version` and `updatedAt`; the client treats its responses as the new
/// local truth after every save.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn load_entries_for_month(
        &self,
        session: &Session,
        year: i32,
        month: u32,
    ) -> Result<Vec<DiaryEntry>, RemoteError>;

    async fn save_entry(
        &self,
        session: &Session,
        date: NaiveDate,
        entry: &DiaryEntry,
    ) -> Result<DiaryEntry, RemoteError>;

    async fn generate_diff(
        &self,
        session: &Session,
        date: NaiveDate,
    ) -> Result<String, RemoteError>;

    /// The service only exposes month queries, so a year is twelve month
    /// fetches in flight at once.
    async fn load_entries_for_year(
        &self,
        session: &Session,
        year: i32,
    ) -> Result<Vec<DiaryEntry>, RemoteError> {
        let months = (1..=12).map(|month| self.load_entries_for_month(session, year, month));
        let mut entries = Vec::new();
        for result in join_all(months).await {
            entries.extend(result?);
        }
        Ok(entries)
    }
}

#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    base_url: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct DiffResponse {
    #[serde(rename = "diffText")]
    diff_text: String,
}

impl HttpRemoteStore {
    pub fn new(settings: &Settings) -> Self {
        Self {
            base_url: settings.api.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(settings.api.request_timeout_secs),
        }
    }

    fn client(&self) -> Result<reqwest::Client, RemoteError> {
        Ok(reqwest::Client::builder().timeout(self.timeout).build()?)
    }

    fn authorize(request: RequestBuilder, session: &Session) -> RequestBuilder {
        match &session.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn expect_success(response: reqwest::Response) -> Result<String, RemoteError> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn load_entries_for_month(
        &self,
        session: &Session,
        year: i32,
        month: u32,
    ) -> Result<Vec<DiaryEntry>, RemoteError> {
        let url = format!("{}/diary/entries", self.base_url);
        let month = month_key(year, month);
        let request = self.client()?.get(&url).query(&[
            ("month", month.as_str()),
            ("user_id", session.user_id.as_str()),
        ]);
        let response = Self::authorize(request, session).send().await?;
        let body = Self::expect_success(response).await?;
        serde_json::from_str(&body).map_err(|e| RemoteError::Decode(e.to_string()))
    }

    async fn save_entry(
        &self,
        session: &Session,
        date: NaiveDate,
        entry: &DiaryEntry,
    ) -> Result<DiaryEntry, RemoteError> {
        let url = format!("{}/diary/entries/{}", self.base_url, date_key(date));
        let request = self.client()?.post(&url).json(entry);
        let response = Self::authorize(request, session).send().await?;
        let body = Self::expect_success(response).await?;
        serde_json::from_str(&body).map_err(|e| RemoteError::Decode(e.to_string()))
    }

    async fn generate_diff(
        &self,
        session: &Session,
        date: NaiveDate,
    ) -> Result<String, RemoteError> {
        let url = format!(
            "{}/diary/entries/{}/diff",
            self.base_url,
            date_key(date)
        );
        let request = self
            .client()?
            .post(&url)
            .query(&[("user_id", session.user_id.as_str())]);
        let response = Self::authorize(request, session).send().await?;
        let body = Self::expect_success(response).await?;
        let parsed: DiffResponse =
            serde_json::from_str(&body).map_err(|e| RemoteError::Decode(e.to_string()))?;
        Ok(parsed.diff_text)
    }
}
