use chrono::{DateTime, Datelike, NaiveDate, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::cache::EntryCache;
use crate::error::RemoteError;
use crate::models::{DiaryEntry, DisplayChoice, EntryPatch, Field, Session};
use crate::services::RemoteStore;

/// A loaded entry plus the image each slot should actually display,
/// derived here and nowhere else so a stale cached entry still renders
/// sensibly.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedEntry {
    pub entry: DiaryEntry,
    pub plan_display_url: Option<String>,
    pub actual_display_url: Option<String>,
}

impl LoadedEntry {
    pub fn derive(entry: DiaryEntry) -> Self {
        let plan_display_url = resolve_display(
            entry.display_plan_image,
            entry.plan_uploaded_image_url.as_deref(),
            entry.plan_image_url.as_deref(),
        )
        .map(|url| cache_busted(url, entry.updated_at));
        let actual_display_url = resolve_display(
            entry.display_actual_image,
            entry.actual_uploaded_image_url.as_deref(),
            entry.actual_image_url.as_deref(),
        )
        .map(|url| cache_busted(url, entry.updated_at));
        Self {
            entry,
            plan_display_url,
            actual_display_url,
        }
    }
}

/// Which image to show for one slot. An explicit preference wins while its
/// URL exists; otherwise fall back to uploaded, then generated, then none.
pub fn resolve_display(
    choice: Option<DisplayChoice>,
    uploaded: Option<&str>,
    generated: Option<&str>,
) -> Option<String> {
    match choice {
        Some(DisplayChoice::Uploaded) if uploaded.is_some() => uploaded.map(str::to_string),
        Some(DisplayChoice::Generated) if generated.is_some() => generated.map(str::to_string),
        _ => uploaded.or(generated).map(str::to_string),
    }
}

// updatedAt doubles as a cache-busting token for image URLs; inline data
// previews are left alone.
fn cache_busted(url: String, updated_at: Option<DateTime<Utc>>) -> String {
    if !url.starts_with("http") {
        return url;
    }
    match updated_at {
        Some(ts) if url.contains('?') => format!("{}&v={}", url, ts.timestamp()),
        Some(ts) => format!("{}?v={}", url, ts.timestamp()),
        None => url,
    }
}

fn next_display(
    prev: Option<DisplayChoice>,
    had_uploaded: bool,
    had_generated: bool,
    has_uploaded: bool,
    has_generated: bool,
) -> Option<DisplayChoice> {
    if !had_uploaded && has_uploaded {
        Some(DisplayChoice::Uploaded)
    } else if !had_generated && has_generated && !has_uploaded {
        Some(DisplayChoice::Generated)
    } else {
        prev
    }
}

/// The single path through which an entry is loaded for display or durably
/// saved. Owns the cache: the page layer reads through `load` and never
/// writes the cache directly.
pub struct Reconciler {
    cache: Mutex<EntryCache>,
    remote: Arc<dyn RemoteStore>,
}

impl Reconciler {
    pub fn new(cache: EntryCache, remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            cache: Mutex::new(cache),
            remote,
        }
    }

    /// Cache first. A year not yet in memory is fetched whole; a date still
    /// missing from a loaded year refetches its containing month and
    /// re-checks before reporting no entry, so an entry written from another
    /// device shows up on revisit. `Ok(None)` means genuinely absent.
    pub async fn load(
        &self,
        session: &Session,
        date: NaiveDate,
    ) -> Result<Option<LoadedEntry>, RemoteError> {
        let mut cache = self.cache.lock().await;
        if let Some(entry) = cache.find(date) {
            return Ok(Some(LoadedEntry::derive(entry.clone())));
        }
        if cache.get(date.year()).is_none() {
            cache.load(self.remote.as_ref(), session, date.year()).await?;
        } else {
            let fetched = self
                .remote
                .load_entries_for_month(session, date.year(), date.month())
                .await?;
            for mut entry in fetched {
                entry.sanitize();
                cache.upsert(entry);
            }
        }
        Ok(cache.find(date).cloned().map(LoadedEntry::derive))
    }

    /// Merge a partial update over the previously loaded entry and persist
    /// it. On success the server's response, not the locally merged object,
    /// becomes the new cached truth (it carries the server-assigned
    /// `version` and `updatedAt`). A failed save leaves the cache untouched.
    pub async fn save(
        &self,
        session: &Session,
        date: NaiveDate,
        patch: EntryPatch,
    ) -> Result<DiaryEntry, RemoteError> {
        let base = {
            let cache = self.cache.lock().await;
            cache.find(date).cloned()
        }
        .unwrap_or_else(|| DiaryEntry::new(session.user_id.clone(), date));

        let mut merged = base.clone();
        patch.merge_into(&mut merged);
        merged.user_id = session.user_id.clone();
        merged.date = date;
        // In-progress placeholders and malformed references must never be
        // persisted; drop them before deciding what the update introduced.
        merged.sanitize();

        if !patch.display_plan_image.is_set() {
            merged.display_plan_image = next_display(
                base.display_plan_image,
                base.plan_uploaded_image_url.is_some(),
                base.plan_image_url.is_some(),
                merged.plan_uploaded_image_url.is_some(),
                merged.plan_image_url.is_some(),
            );
        }
        if !patch.display_actual_image.is_set() {
            merged.display_actual_image = next_display(
                base.display_actual_image,
                base.actual_uploaded_image_url.is_some(),
                base.actual_image_url.is_some(),
                merged.actual_uploaded_image_url.is_some(),
                merged.actual_image_url.is_some(),
            );
        }

        let mut saved = self.remote.save_entry(session, date, &merged).await?;
        saved.sanitize();

        let mut cache = self.cache.lock().await;
        cache.upsert(saved.clone());
        Ok(saved)
    }

    /// Remote plan/actual comparison, then a normal merge-save of the
    /// returned summary.
    pub async fn generate_diff(
        &self,
        session: &Session,
        date: NaiveDate,
    ) -> Result<DiaryEntry, RemoteError> {
        let diff = self.remote.generate_diff(session, date).await?;
        let patch = EntryPatch {
            diff_text: Field::Set(diff),
            ..EntryPatch::default()
        };
        self.save(session, date, patch).await
    }

    /// Best-effort year prefetch; failures are logged, never surfaced.
    pub async fn warm_year(&self, session: &Session, year: i32) {
        let mut cache = self.cache.lock().await;
        if let Err(e) = cache.load(self.remote.as_ref(), session, year).await {
            log::warn!("cache warm for {} failed: {}", year, e);
        }
    }

    pub async fn restore_local(&self, session: &Session, year: i32) -> bool {
        let mut cache = self.cache.lock().await;
        cache.restore(&session.user_id, year)
    }

    pub async fn invalidate_cache(&self) {
        let mut cache = self.cache.lock().await;
        cache.invalidate_all();
    }

    pub async fn clear_user_local(&self, user_id: &str) {
        let cache = self.cache.lock().await;
        cache.clear_user_durable(user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::LocalStore;
    use crate::models::Field;
    use crate::services::mock::MockRemote;
    use std::sync::atomic::Ordering;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn setup() -> (tempfile::TempDir, Arc<MockRemote>, Reconciler) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(&dir.path().join("diarysync.db")).unwrap();
        let remote = Arc::new(MockRemote::new());
        let reconciler = Reconciler::new(EntryCache::new(store), remote.clone());
        (dir, remote, reconciler)
    }

    #[tokio::test]
    async fn missing_date_is_not_an_error() {
        let (_dir, _remote, reconciler) = setup();
        let session = Session::anonymous();
        let loaded = reconciler.load(&session, date(2024, 3, 1)).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn year_fetch_fills_the_cache() {
        let (_dir, remote, reconciler) = setup();
        let session = Session::anonymous();
        let mut entry = DiaryEntry::new("anonymous", date(2024, 3, 1));
        entry.plan_text = Some("hike".to_string());
        remote.seed(entry);

        let first = reconciler.load(&session, date(2024, 3, 1)).await.unwrap();
        assert_eq!(first.unwrap().entry.plan_text.as_deref(), Some("hike"));
        let calls_after_first = remote.load_calls.load(Ordering::Relaxed);

        let second = reconciler.load(&session, date(2024, 3, 1)).await.unwrap();
        assert!(second.is_some());
        assert_eq!(remote.load_calls.load(Ordering::Relaxed), calls_after_first);
    }

    #[tokio::test]
    async fn entry_written_elsewhere_is_found_on_revisit() {
        let (_dir, remote, reconciler) = setup();
        let session = Session::anonymous();
        let empty = reconciler.load(&session, date(2024, 3, 1)).await.unwrap();
        assert!(empty.is_none());

        // Another device writes the entry after the year was cached.
        let mut entry = DiaryEntry::new("anonymous", date(2024, 3, 1));
        entry.plan_text = Some("hike".to_string());
        remote.seed(entry);

        let revisit = reconciler.load(&session, date(2024, 3, 1)).await.unwrap();
        assert_eq!(revisit.unwrap().entry.plan_text.as_deref(), Some("hike"));
    }

    #[tokio::test]
    async fn partial_save_preserves_unrelated_fields() {
        let (_dir, remote, reconciler) = setup();
        let session = Session::anonymous();
        let mut entry = DiaryEntry::new("anonymous", date(2024, 3, 1));
        entry.actual_text = Some("rained all day".to_string());
        entry.tags = vec!["weather".to_string()];
        remote.seed(entry);

        reconciler.load(&session, date(2024, 3, 1)).await.unwrap();
        let patch = EntryPatch {
            plan_text: Field::Set("went hiking".to_string()),
            ..EntryPatch::default()
        };
        reconciler.save(&session, date(2024, 3, 1), patch).await.unwrap();

        let reloaded = reconciler
            .load(&session, date(2024, 3, 1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.entry.plan_text.as_deref(), Some("went hiking"));
        assert_eq!(reloaded.entry.actual_text.as_deref(), Some("rained all day"));
        assert_eq!(reloaded.entry.tags, vec!["weather".to_string()]);
    }

    #[tokio::test]
    async fn server_response_becomes_local_truth() {
        let (_dir, remote, reconciler) = setup();
        let session = Session::anonymous();
        let mut entry = DiaryEntry::new("anonymous", date(2024, 3, 1));
        entry.plan_text = Some("v1".to_string());
        remote.seed(entry);

        reconciler.load(&session, date(2024, 3, 1)).await.unwrap();
        let patch = EntryPatch {
            plan_text: Field::Set("v2".to_string()),
            ..EntryPatch::default()
        };
        let saved = reconciler.save(&session, date(2024, 3, 1), patch).await.unwrap();
        assert_eq!(saved.version, 2);
        assert!(saved.updated_at.is_some());

        // The cache holds the server-confirmed entry, not the local merge.
        let reloaded = reconciler
            .load(&session, date(2024, 3, 1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.entry.version, 2);
    }

    #[tokio::test]
    async fn failed_save_leaves_cache_untouched() {
        let (_dir, remote, reconciler) = setup();
        let session = Session::anonymous();
        let mut entry = DiaryEntry::new("anonymous", date(2024, 3, 1));
        entry.plan_text = Some("original".to_string());
        remote.seed(entry);
        reconciler.load(&session, date(2024, 3, 1)).await.unwrap();

        remote.fail_saves.store(true, Ordering::Relaxed);
        let patch = EntryPatch {
            plan_text: Field::Set("doomed".to_string()),
            ..EntryPatch::default()
        };
        assert!(reconciler.save(&session, date(2024, 3, 1), patch).await.is_err());

        let reloaded = reconciler
            .load(&session, date(2024, 3, 1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.entry.plan_text.as_deref(), Some("original"));
    }

    #[tokio::test]
    async fn new_uploaded_image_flips_preference_to_uploaded() {
        let (_dir, _remote, reconciler) = setup();
        let session = Session::anonymous();
        let patch = EntryPatch {
            plan_uploaded_image_url: Field::Set("https://cdn/x.jpg".to_string()),
            ..EntryPatch::default()
        };
        let saved = reconciler.save(&session, date(2024, 3, 1), patch).await.unwrap();
        assert_eq!(
            saved.plan_uploaded_image_url.as_deref(),
            Some("https://cdn/x.jpg")
        );
        assert_eq!(saved.display_plan_image, Some(DisplayChoice::Uploaded));
    }

    #[tokio::test]
    async fn first_generated_image_sets_preference_when_no_upload_exists() {
        let (_dir, _remote, reconciler) = setup();
        let session = Session::anonymous();
        let patch = EntryPatch {
            plan_image_url: Field::Set("https://cdn/gen.png".to_string()),
            ..EntryPatch::default()
        };
        let saved = reconciler.save(&session, date(2024, 3, 1), patch).await.unwrap();
        assert_eq!(saved.display_plan_image, Some(DisplayChoice::Generated));
    }

    #[tokio::test]
    async fn sticky_preference_survives_regeneration() {
        let (_dir, remote, reconciler) = setup();
        let session = Session::anonymous();
        let mut entry = DiaryEntry::new("anonymous", date(2024, 3, 1));
        entry.plan_uploaded_image_url = Some("https://cdn/photo.jpg".to_string());
        entry.plan_image_url = Some("https://cdn/gen1.png".to_string());
        entry.display_plan_image = Some(DisplayChoice::Uploaded);
        remote.seed(entry);
        reconciler.load(&session, date(2024, 3, 1)).await.unwrap();

        // Regenerating the illustration replaces an already-present URL, so
        // the user's choice of their own photo stays.
        let patch = EntryPatch {
            plan_image_url: Field::Set("https://cdn/gen2.png".to_string()),
            ..EntryPatch::default()
        };
        let saved = reconciler.save(&session, date(2024, 3, 1), patch).await.unwrap();
        assert_eq!(saved.display_plan_image, Some(DisplayChoice::Uploaded));
    }

    #[tokio::test]
    async fn explicit_display_choice_in_patch_wins() {
        let (_dir, _remote, reconciler) = setup();
        let session = Session::anonymous();
        let patch = EntryPatch {
            plan_uploaded_image_url: Field::Set("https://cdn/x.jpg".to_string()),
            plan_image_url: Field::Set("https://cdn/gen.png".to_string()),
            display_plan_image: Field::Set(DisplayChoice::Generated),
            ..EntryPatch::default()
        };
        let saved = reconciler.save(&session, date(2024, 3, 1), patch).await.unwrap();
        assert_eq!(saved.display_plan_image, Some(DisplayChoice::Generated));
    }

    #[tokio::test]
    async fn sentinel_is_never_persisted() {
        let (_dir, remote, reconciler) = setup();
        let session = Session::anonymous();
        let patch = EntryPatch {
            plan_uploaded_image_url: Field::Set("uploading...".to_string()),
            plan_text: Field::Set("hike".to_string()),
            ..EntryPatch::default()
        };
        let saved = reconciler.save(&session, date(2024, 3, 1), patch).await.unwrap();
        assert_eq!(saved.plan_uploaded_image_url, None);
        // A dropped placeholder is not "an introduced image" either.
        assert_eq!(saved.display_plan_image, None);
        let stored = remote.stored("anonymous", date(2024, 3, 1)).unwrap();
        assert_eq!(stored.plan_uploaded_image_url, None);
    }

    #[tokio::test]
    async fn diff_generation_merges_like_any_save() {
        let (_dir, remote, reconciler) = setup();
        let session = Session::anonymous();
        let mut entry = DiaryEntry::new("anonymous", date(2024, 3, 1));
        entry.plan_text = Some("hike".to_string());
        entry.actual_text = Some("rain".to_string());
        remote.seed(entry);
        reconciler.load(&session, date(2024, 3, 1)).await.unwrap();

        let saved = reconciler
            .generate_diff(&session, date(2024, 3, 1))
            .await
            .unwrap();
        assert_eq!(saved.diff_text.as_deref(), Some("mostly as planned"));
        assert_eq!(saved.plan_text.as_deref(), Some("hike"));
        assert_eq!(saved.actual_text.as_deref(), Some("rain"));
    }

    #[test]
    fn display_table_is_exact() {
        let up = Some("up");
        let gen = Some("gen");
        let cases = [
            (None, up, gen, Some("up")),
            (None, up, None, Some("up")),
            (None, None, gen, Some("gen")),
            (None, None, None, None),
            (Some(DisplayChoice::Uploaded), up, gen, Some("up")),
            (Some(DisplayChoice::Uploaded), up, None, Some("up")),
            (Some(DisplayChoice::Uploaded), None, gen, Some("gen")),
            (Some(DisplayChoice::Uploaded), None, None, None),
            (Some(DisplayChoice::Generated), up, gen, Some("gen")),
            (Some(DisplayChoice::Generated), None, gen, Some("gen")),
            (Some(DisplayChoice::Generated), up, None, Some("up")),
            (Some(DisplayChoice::Generated), None, None, None),
        ];
        for (choice, uploaded, generated, expected) in cases {
            assert_eq!(
                resolve_display(choice, uploaded, generated).as_deref(),
                expected,
                "choice={:?} uploaded={:?} generated={:?}",
                choice,
                uploaded,
                generated
            );
        }
    }

    #[test]
    fn derived_urls_carry_a_cache_busting_token() {
        let mut entry = DiaryEntry::new("u1", date(2024, 3, 1));
        entry.plan_image_url = Some("https://cdn/gen.png".to_string());
        entry.updated_at = Some(DateTime::from_timestamp(1_700_000_000, 0).unwrap());
        let view = LoadedEntry::derive(entry);
        assert_eq!(
            view.plan_display_url.as_deref(),
            Some("https://cdn/gen.png?v=1700000000")
        );

        let mut preview = DiaryEntry::new("u1", date(2024, 3, 1));
        preview.plan_uploaded_image_url = Some("data:image/png;base64,abcd".to_string());
        preview.updated_at = Some(DateTime::from_timestamp(1_700_000_000, 0).unwrap());
        let view = LoadedEntry::derive(preview);
        assert_eq!(
            view.plan_display_url.as_deref(),
            Some("data:image/png;base64,abcd")
        );
    }
}
