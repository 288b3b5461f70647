use chrono::{Datelike, NaiveDate};
use futures_util::future::join_all;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::cache::EntryCache;
use crate::database::{tags_key, LocalStore};
use crate::error::RemoteError;
use crate::models::{
    DiaryEntry, EntryPatch, Field, Session, Settings, TagLibrary, UploadState,
};
use crate::services::{
    GenerationKind, HttpImageGenerator, HttpRemoteStore, HttpTextGenerator, HttpUploadService,
    ImageGenerator, TextGenerator, UploadService,
};
use crate::sync::{LoadedEntry, Reconciler};
use crate::utils::{config, dates};

const SUGGESTION_DEBOUNCE_MS: u64 = 600;

/// Which image slot a user action targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSlot {
    Plan,
    Actual,
}

/// Transient per-page UI state. None of this is the persisted entry; it is
/// rebuilt from the reconciler's result on every date change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageState {
    pub plan_input: String,
    pub actual_input: String,
    pub plan_text: Option<String>,
    pub actual_text: Option<String>,
    pub plan_display_url: Option<String>,
    pub actual_display_url: Option<String>,
    pub plan_upload: UploadState,
    pub actual_upload: UploadState,
    pub plan_tags: Vec<String>,
    pub actual_tags: Vec<String>,
    pub diff_text: Option<String>,
    pub suggestion: Option<String>,
    pub loading: bool,
    pub status: Option<String>,
}

/// Handed out when a date is selected; a load result is only applied while
/// its ticket still matches the current selection, so a slow response for an
/// abandoned date is discarded instead of clobbering the new page.
#[derive(Debug, Clone)]
pub struct LoadTicket {
    pub date: NaiveDate,
    seq: u64,
}

#[derive(Debug, Clone)]
pub struct SuggestionTicket {
    load_seq: u64,
    suggest_seq: u64,
}

/// Orchestrates user actions against the reconciler and the generator
/// services. Never writes the entry cache directly — all persistence goes
/// through `Reconciler::save`.
pub struct PageController {
    reconciler: Arc<Reconciler>,
    textgen: Arc<dyn TextGenerator>,
    imagegen: Arc<dyn ImageGenerator>,
    uploads: Arc<dyn UploadService>,
    store: LocalStore,
    settings: Settings,
    session: Session,
    selected_date: NaiveDate,
    load_seq: u64,
    suggest_seq: u64,
    tag_library: TagLibrary,
    pub state: PageState,
}

impl PageController {
    pub fn new(
        reconciler: Arc<Reconciler>,
        textgen: Arc<dyn TextGenerator>,
        imagegen: Arc<dyn ImageGenerator>,
        uploads: Arc<dyn UploadService>,
        store: LocalStore,
        settings: Settings,
        session: Session,
    ) -> Self {
        Self {
            reconciler,
            textgen,
            imagegen,
            uploads,
            store,
            settings,
            session,
            selected_date: dates::today(),
            load_seq: 0,
            suggest_seq: 0,
            tag_library: TagLibrary::default(),
            state: PageState::default(),
        }
    }

    /// Wire up the full HTTP stack against the configured API base. A bearer
    /// token resolved from settings or the environment rides along when the
    /// caller's session does not carry one of its own.
    pub fn connect(
        mut settings: Settings,
        db_path: &Path,
        mut session: Session,
    ) -> anyhow::Result<Self> {
        config::load_dotenv();
        config::apply_env_defaults(&mut settings);
        if session.token.is_none() && !settings.api.access_token.trim().is_empty() {
            session.token = Some(settings.api.access_token.clone());
        }
        let store = LocalStore::open(db_path)?;
        let remote = Arc::new(HttpRemoteStore::new(&settings));
        let reconciler = Arc::new(Reconciler::new(EntryCache::new(store.clone()), remote));
        Ok(Self::new(
            reconciler,
            Arc::new(HttpTextGenerator::new(&settings)),
            Arc::new(HttpImageGenerator::new(&settings)),
            Arc::new(HttpUploadService::new(&settings)),
            store,
            settings,
            session,
        ))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn selected_date(&self) -> NaiveDate {
        self.selected_date
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    /// Restore the mirror for the current year and load today's entry.
    pub async fn start(&mut self) {
        self.load_tag_library();
        self.reconciler
            .restore_local(&self.session, self.selected_date.year())
            .await;
        self.go_to_date(self.selected_date).await;
    }

    // ─── Date navigation ───

    /// Switching dates clears every transient field synchronously, before
    /// any network traffic, and invalidates outstanding load tickets.
    pub fn select_date(&mut self, date: NaiveDate) -> LoadTicket {
        self.selected_date = date;
        self.load_seq += 1;
        self.suggest_seq += 1;
        self.state = PageState {
            loading: true,
            ..PageState::default()
        };
        LoadTicket {
            date,
            seq: self.load_seq,
        }
    }

    pub async fn run_load(
        &self,
        ticket: &LoadTicket,
    ) -> Result<Option<LoadedEntry>, RemoteError> {
        self.reconciler.load(&self.session, ticket.date).await
    }

    /// Returns false when the result was stale and dropped.
    pub fn apply_load(
        &mut self,
        ticket: &LoadTicket,
        outcome: Result<Option<LoadedEntry>, RemoteError>,
    ) -> bool {
        if ticket.seq != self.load_seq {
            log::debug!("discarding stale load for {}", ticket.date);
            return false;
        }
        self.state.loading = false;
        match outcome {
            Ok(Some(view)) => {
                // Editable inputs come back too, so the user can resume a
                // previous generation.
                self.state.plan_input = view.entry.plan_input_prompt.clone().unwrap_or_default();
                self.state.actual_input =
                    view.entry.actual_input_prompt.clone().unwrap_or_default();
                self.state.plan_text = view.entry.plan_text.clone();
                self.state.actual_text = view.entry.actual_text.clone();
                self.state.diff_text = view.entry.diff_text.clone();
                self.state.plan_tags = view.entry.tags.clone();
                self.state.plan_display_url = view.plan_display_url;
                self.state.actual_display_url = view.actual_display_url;
            }
            Ok(None) => {
                // Expected for a fresh date; the cleared state stands.
            }
            Err(e) => {
                log::warn!("load failed for {}: {}", ticket.date, e);
                self.state.status = Some(format!("could not load {}: {}", ticket.date, e));
            }
        }
        true
    }

    pub async fn go_to_date(&mut self, date: NaiveDate) {
        let ticket = self.select_date(date);
        let outcome = self.run_load(&ticket).await;
        self.apply_load(&ticket, outcome);
    }

    pub async fn next_day(&mut self) {
        if let Some(date) = self.selected_date.succ_opt() {
            self.go_to_date(date).await;
        }
    }

    pub async fn prev_day(&mut self) {
        if let Some(date) = self.selected_date.pred_opt() {
            self.go_to_date(date).await;
        }
    }

    // ─── Editing ───

    pub fn set_plan_input(&mut self, text: impl Into<String>) {
        self.state.plan_input = text.into();
        // Any typing cancels a pending auto-suggestion.
        self.suggest_seq += 1;
    }

    pub fn set_actual_input(&mut self, text: impl Into<String>) {
        self.state.actual_input = text.into();
    }

    pub fn set_plan_tags(&mut self, tags: Vec<String>) {
        self.state.plan_tags = tags;
    }

    pub fn set_actual_tags(&mut self, tags: Vec<String>) {
        self.state.actual_tags = tags;
    }

    // ─── Generation ───

    /// Generate the future-diary text (and its illustration) from the plan
    /// input, falling back to the tag library as interests when the input
    /// is empty, then save everything as one merged update.
    pub async fn generate_plan(&mut self) {
        let input = self.state.plan_input.trim().to_string();
        let interests = if input.is_empty() {
            self.tag_library.tags.clone()
        } else {
            Vec::new()
        };

        let generated = match self
            .textgen
            .generate(
                GenerationKind::Plan,
                &input,
                &interests,
                &self.settings.generation.text_style,
            )
            .await
        {
            Ok(g) => g,
            Err(e) => {
                log::error!("plan generation failed: {}", e);
                self.state.status = Some(format!("text generation failed: {}", e));
                return;
            }
        };
        self.state.plan_text = Some(generated.generated_text.clone());
        self.state.suggestion = None;

        let image_url = self.illustrate(&generated.image_prompt).await;

        let mut patch = EntryPatch {
            plan_text: Field::Set(generated.generated_text),
            plan_input_prompt: Field::Set(input),
            plan_tags: Some(self.state.plan_tags.clone()),
            actual_tags: Some(self.state.actual_tags.clone()),
            ..EntryPatch::default()
        };
        if let Some(url) = image_url {
            patch.plan_image_url = Field::Set(url);
        }
        self.save_patch(patch).await;
    }

    /// Clean up the end-of-day reflection and illustrate it.
    pub async fn generate_actual(&mut self) {
        let input = self.state.actual_input.trim().to_string();
        if input.is_empty() {
            self.state.status = Some("write a few words about your day first".to_string());
            return;
        }

        let generated = match self
            .textgen
            .generate(
                GenerationKind::Reflection,
                &input,
                &[],
                &self.settings.generation.text_style,
            )
            .await
        {
            Ok(g) => g,
            Err(e) => {
                log::error!("reflection generation failed: {}", e);
                self.state.status = Some(format!("text generation failed: {}", e));
                return;
            }
        };
        self.state.actual_text = Some(generated.generated_text.clone());

        let image_url = self.illustrate(&generated.image_prompt).await;

        let mut patch = EntryPatch {
            actual_text: Field::Set(generated.generated_text),
            actual_input_prompt: Field::Set(input),
            plan_tags: Some(self.state.plan_tags.clone()),
            actual_tags: Some(self.state.actual_tags.clone()),
            ..EntryPatch::default()
        };
        if let Some(url) = image_url {
            patch.actual_image_url = Field::Set(url);
        }
        self.save_patch(patch).await;
    }

    /// Illustration is best-effort: a failed image never blocks saving the
    /// generated text.
    async fn illustrate(&mut self, prompt: &str) -> Option<String> {
        match self
            .imagegen
            .generate(
                prompt,
                &self.settings.generation.image_style,
                &self.settings.generation.aspect_ratio,
            )
            .await
        {
            Ok(image) => Some(image.url),
            Err(e) => {
                log::warn!("illustration failed: {}", e);
                None
            }
        }
    }

    // ─── Photo uploads ───

    /// Upload a photo for one slot and auto-save the durable URL. The slot
    /// holds a tagged Pending state while the upload is in flight; only the
    /// resolved URL is ever handed to the save path.
    pub async fn upload_photo(&mut self, slot: ImageSlot, bytes: Vec<u8>, content_type: &str) {
        let ext = match content_type {
            "image/png" => "png",
            "image/jpeg" => "jpg",
            "image/webp" => "webp",
            _ => "bin",
        };
        let object_path = format!(
            "uploads/{}/{}.{}",
            self.session.user_id,
            Uuid::new_v4(),
            ext
        );

        *self.upload_slot_mut(slot) = UploadState::Pending;

        let url = match self
            .uploads
            .upload(&self.session, bytes, content_type, &object_path)
            .await
        {
            Ok(url) => url,
            Err(e) => {
                log::error!("photo upload failed: {}", e);
                *self.upload_slot_mut(slot) = UploadState::Failed;
                self.state.status = Some(format!("photo upload failed: {}", e));
                return;
            }
        };
        *self.upload_slot_mut(slot) = UploadState::Resolved(url.clone());

        let mut patch = EntryPatch::default();
        match slot {
            ImageSlot::Plan => patch.plan_uploaded_image_url = Field::Set(url),
            ImageSlot::Actual => patch.actual_uploaded_image_url = Field::Set(url),
        }
        self.save_patch(patch).await;
    }

    fn upload_slot_mut(&mut self, slot: ImageSlot) -> &mut UploadState {
        match slot {
            ImageSlot::Plan => &mut self.state.plan_upload,
            ImageSlot::Actual => &mut self.state.actual_upload,
        }
    }

    // ─── Diff ───

    pub async fn build_diff(&mut self) {
        if self.state.plan_text.is_none() || self.state.actual_text.is_none() {
            self.state.status =
                Some("both a plan and a reflection are needed before comparing".to_string());
            return;
        }
        match self
            .reconciler
            .generate_diff(&self.session, self.selected_date)
            .await
        {
            Ok(saved) => self.apply_saved(&saved),
            Err(e) => {
                log::error!("diff generation failed: {}", e);
                self.state.status = Some(format!("diff generation failed: {}", e));
            }
        }
    }

    // ─── Sessions ───

    /// Switching the signed-in user drops the whole in-memory cache, swaps
    /// the tag library, warms the surrounding years and reloads the page.
    pub async fn switch_user(&mut self, session: Session) {
        if session.user_id == self.session.user_id {
            self.session = session;
            return;
        }
        self.change_session(session).await;
    }

    /// Logout wipes the current user's durable blobs before falling back to
    /// the anonymous session.
    pub async fn logout(&mut self) {
        let user_id = self.session.user_id.clone();
        self.reconciler.clear_user_local(&user_id).await;
        if let Err(e) = self.store.delete(&tags_key(&user_id)) {
            log::warn!("failed to clear tag library for {}: {}", user_id, e);
        }
        self.change_session(Session::anonymous()).await;
    }

    async fn change_session(&mut self, session: Session) {
        self.session = session;
        self.load_seq += 1;
        self.suggest_seq += 1;
        self.state = PageState::default();
        self.tag_library = TagLibrary::default();

        self.reconciler.invalidate_cache().await;
        self.load_tag_library();

        let year = self.selected_date.year();
        self.reconciler.restore_local(&self.session, year).await;
        // Warm current year ± 1 so near-term navigation is cache-hot.
        let span = [year - 1, year, year + 1];
        join_all(
            span.iter()
                .map(|&y| self.reconciler.warm_year(&self.session, y)),
        )
        .await;

        self.go_to_date(self.selected_date).await;
    }

    fn load_tag_library(&mut self) {
        self.tag_library = match self.store.get_json(&tags_key(&self.session.user_id)) {
            Ok(Some(library)) => library,
            Ok(None) => TagLibrary::default(),
            Err(e) => {
                log::warn!("failed to read tag library: {}", e);
                TagLibrary::default()
            }
        };
    }

    // ─── Suggestions ───

    /// Ask for an interest-based plan suggestion. Returns None when
    /// suppressed: the user has typed something, a plan already exists, or
    /// there are no interests to draw from.
    pub fn request_suggestion(&mut self) -> Option<SuggestionTicket> {
        if !self.state.plan_input.trim().is_empty() || self.state.plan_text.is_some() {
            return None;
        }
        if self.tag_library.is_empty() {
            return None;
        }
        self.suggest_seq += 1;
        Some(SuggestionTicket {
            load_seq: self.load_seq,
            suggest_seq: self.suggest_seq,
        })
    }

    /// Debounced fetch: waits out the quiet period, then re-checks the
    /// ticket before touching the network.
    pub async fn run_suggestion(&self, ticket: &SuggestionTicket) -> Option<String> {
        tokio::time::sleep(Duration::from_millis(SUGGESTION_DEBOUNCE_MS)).await;
        if ticket.suggest_seq != self.suggest_seq || ticket.load_seq != self.load_seq {
            return None;
        }
        match self
            .textgen
            .generate(
                GenerationKind::Plan,
                "",
                &self.tag_library.tags,
                &self.settings.generation.text_style,
            )
            .await
        {
            Ok(generated) => Some(generated.generated_text),
            Err(e) => {
                log::warn!("suggestion fetch failed: {}", e);
                None
            }
        }
    }

    pub fn apply_suggestion(
        &mut self,
        ticket: &SuggestionTicket,
        suggestion: Option<String>,
    ) -> bool {
        if ticket.suggest_seq != self.suggest_seq || ticket.load_seq != self.load_seq {
            return false;
        }
        if !self.state.plan_input.trim().is_empty() || self.state.plan_text.is_some() {
            return false;
        }
        self.state.suggestion = suggestion;
        true
    }

    // ─── Saving ───

    async fn save_patch(&mut self, patch: EntryPatch) {
        match self
            .reconciler
            .save(&self.session, self.selected_date, patch)
            .await
        {
            Ok(saved) => {
                self.apply_saved(&saved);
                self.remember_tags();
            }
            Err(e) => {
                // Transient edits stay in place; they are just not saved.
                log::error!("save failed for {}: {}", self.selected_date, e);
                self.state.status = Some(format!("save failed: {}", e));
            }
        }
    }

    /// Re-render from the server-confirmed entry, not pre-save local state.
    fn apply_saved(&mut self, saved: &DiaryEntry) {
        let view = LoadedEntry::derive(saved.clone());
        self.state.plan_text = view.entry.plan_text.clone();
        self.state.actual_text = view.entry.actual_text.clone();
        self.state.diff_text = view.entry.diff_text.clone();
        self.state.plan_display_url = view.plan_display_url;
        self.state.actual_display_url = view.actual_display_url;
        self.state.status = None;
    }

    fn remember_tags(&mut self) {
        self.tag_library.absorb(&self.state.plan_tags);
        self.tag_library.absorb(&self.state.actual_tags);
        if let Err(e) = self
            .store
            .put_json(&tags_key(&self.session.user_id), &self.tag_library)
        {
            log::warn!("failed to persist tag library: {}", e);
        }
    }
}
