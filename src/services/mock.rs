//! In-memory service doubles shared by the reconciler and controller tests.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::RemoteError;
use crate::models::{DiaryEntry, Session};
use crate::services::imagegen::{GeneratedImage, ImageGenerator};
use crate::services::remote::RemoteStore;
use crate::services::textgen::{GeneratedText, GenerationKind, TextGenerator};
use crate::services::upload::UploadService;

fn failure(what: &str) -> RemoteError {
    RemoteError::Status {
        status: 500,
        body: format!("{} unavailable", what),
    }
}

#[derive(Default)]
pub struct MockRemote {
    pub entries: Mutex<HashMap<(String, NaiveDate), DiaryEntry>>,
    pub fail_loads: AtomicBool,
    pub fail_saves: AtomicBool,
    pub load_calls: AtomicUsize,
    pub save_calls: AtomicUsize,
    pub diff_text: Mutex<String>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self {
            diff_text: Mutex::new("mostly as planned".to_string()),
            ..Self::default()
        }
    }

    pub fn seed(&self, entry: DiaryEntry) {
        let key = (entry.user_id.clone(), entry.date);
        self.entries.lock().unwrap().insert(key, entry);
    }

    pub fn stored(&self, user_id: &str, date: NaiveDate) -> Option<DiaryEntry> {
        self.entries
            .lock()
            .unwrap()
            .get(&(user_id.to_string(), date))
            .cloned()
    }
}

#[async_trait]
impl RemoteStore for MockRemote {
    async fn load_entries_for_month(
        &self,
        session: &Session,
        year: i32,
        month: u32,
    ) -> Result<Vec<DiaryEntry>, RemoteError> {
        self.load_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_loads.load(Ordering::Relaxed) {
            return Err(failure("load"));
        }
        use chrono::Datelike;
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .values()
            .filter(|e| {
                e.user_id == session.user_id && e.date.year() == year && e.date.month() == month
            })
            .cloned()
            .collect())
    }

    async fn save_entry(
        &self,
        session: &Session,
        date: NaiveDate,
        entry: &DiaryEntry,
    ) -> Result<DiaryEntry, RemoteError> {
        self.save_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_saves.load(Ordering::Relaxed) {
            return Err(failure("save"));
        }
        let key = (session.user_id.clone(), date);
        let mut entries = self.entries.lock().unwrap();
        let now = Utc::now();
        let mut saved = entry.clone();
        match entries.get(&key) {
            Some(existing) => {
                saved.created_at = existing.created_at;
                saved.version = existing.version + 1;
            }
            None => {
                saved.created_at = Some(now);
                saved.version = 1;
            }
        }
        saved.updated_at = Some(now);
        entries.insert(key, saved.clone());
        Ok(saved)
    }

    async fn generate_diff(
        &self,
        _session: &Session,
        _date: NaiveDate,
    ) -> Result<String, RemoteError> {
        if self.fail_loads.load(Ordering::Relaxed) {
            return Err(failure("diff"));
        }
        Ok(self.diff_text.lock().unwrap().clone())
    }
}

pub struct MockTextGenerator {
    pub text: String,
    pub image_prompt: String,
    pub fail: AtomicBool,
    pub last_request: Mutex<Option<(GenerationKind, String, Vec<String>)>>,
}

impl MockTextGenerator {
    pub fn new(text: &str, image_prompt: &str) -> Self {
        Self {
            text: text.to_string(),
            image_prompt: image_prompt.to_string(),
            fail: AtomicBool::new(false),
            last_request: Mutex::new(None),
        }
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    async fn generate(
        &self,
        kind: GenerationKind,
        input: &str,
        interests: &[String],
        _style: &str,
    ) -> Result<GeneratedText, RemoteError> {
        *self.last_request.lock().unwrap() =
            Some((kind, input.to_string(), interests.to_vec()));
        if self.fail.load(Ordering::Relaxed) {
            return Err(failure("textgen"));
        }
        Ok(GeneratedText {
            generated_text: self.text.clone(),
            image_prompt: self.image_prompt.clone(),
        })
    }
}

pub struct MockImageGenerator {
    pub url: String,
    pub fail: AtomicBool,
}

impl MockImageGenerator {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            fail: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ImageGenerator for MockImageGenerator {
    async fn generate(
        &self,
        _prompt: &str,
        _style: &str,
        _aspect_ratio: &str,
    ) -> Result<GeneratedImage, RemoteError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(failure("imagegen"));
        }
        Ok(GeneratedImage {
            url: self.url.clone(),
        })
    }
}

pub struct MockUploadService {
    pub url: String,
    pub fail: AtomicBool,
    pub last_path: Mutex<Option<String>>,
}

impl MockUploadService {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            fail: AtomicBool::new(false),
            last_path: Mutex::new(None),
        }
    }
}

#[async_trait]
impl UploadService for MockUploadService {
    async fn upload(
        &self,
        _session: &Session,
        _bytes: Vec<u8>,
        _content_type: &str,
        object_path: &str,
    ) -> Result<String, RemoteError> {
        *self.last_path.lock().unwrap() = Some(object_path.to_string());
        if self.fail.load(Ordering::Relaxed) {
            return Err(RemoteError::Upload("connection reset".to_string()));
        }
        Ok(self.url.clone())
    }
}
