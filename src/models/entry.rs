use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Which image slot to show when an entry carries both a user-uploaded photo
/// and a generated illustration. Sticky once set: the fallback rule only
/// applies while the preference is unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayChoice {
    Uploaded,
    Generated,
}

/// The persisted record for one (user, date) pair. Field names follow the
/// wire format of the diary service (camelCase JSON).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiaryEntry {
    pub user_id: String,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_uploaded_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_uploaded_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_plan_image: Option<DisplayChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_actual_image: Option<DisplayChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_input_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_input_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_text: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default = "default_version")]
    pub version: i64,
}

fn default_version() -> i64 {
    1
}

impl DiaryEntry {
    pub fn new(user_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            user_id: user_id.into(),
            date,
            plan_text: None,
            actual_text: None,
            plan_image_url: None,
            actual_image_url: None,
            plan_uploaded_image_url: None,
            actual_uploaded_image_url: None,
            display_plan_image: None,
            display_actual_image: None,
            plan_input_prompt: None,
            actual_input_prompt: None,
            diff_text: None,
            tags: Vec::new(),
            created_at: None,
            updated_at: None,
            version: 1,
        }
    }

    /// Drop URL fields that are not real references. Guards against
    /// in-progress placeholders ("uploading...") or other junk that leaked
    /// into a stored entry ever being rendered as a broken image.
    pub fn sanitize(&mut self) {
        clear_unless(&mut self.plan_image_url, is_http_url);
        clear_unless(&mut self.actual_image_url, is_http_url);
        // Uploaded slots may also hold an inline data-URL preview.
        clear_unless(&mut self.plan_uploaded_image_url, is_preview_url);
        clear_unless(&mut self.actual_uploaded_image_url, is_preview_url);
    }
}

fn clear_unless(slot: &mut Option<String>, keep: fn(&str) -> bool) {
    if slot.as_deref().map_or(false, |s| !keep(s)) {
        *slot = None;
    }
}

pub fn is_http_url(s: &str) -> bool {
    match Url::parse(s) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https")
                && url.host_str().map_or(false, |h| !h.is_empty())
        }
        Err(_) => false,
    }
}

pub fn is_preview_url(s: &str) -> bool {
    is_http_url(s) || s.starts_with("data:image/")
}
