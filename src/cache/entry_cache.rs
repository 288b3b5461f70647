use chrono::{Datelike, NaiveDate};
use std::collections::HashMap;

use crate::database::{entries_key, user_prefix, LocalStore};
use crate::error::RemoteError;
use crate::models::{DiaryEntry, Session};
use crate::services::RemoteStore;

/// Per-year client-side mirror of diary entries. Memory is the working set;
/// every mutation is written through to a durable per-(user, year) blob so a
/// fresh session can restore without a remote round-trip. The remote store
/// stays the source of truth — this is a denormalized, possibly stale copy.
pub struct EntryCache {
    years: HashMap<i32, Vec<DiaryEntry>>,
    store: LocalStore,
}

impl EntryCache {
    pub fn new(store: LocalStore) -> Self {
        Self {
            years: HashMap::new(),
            store,
        }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn get(&self, year: i32) -> Option<&[DiaryEntry]> {
        self.years.get(&year).map(Vec::as_slice)
    }

    pub fn find(&self, date: NaiveDate) -> Option<&DiaryEntry> {
        self.years
            .get(&date.year())
            .and_then(|entries| entries.iter().find(|e| e.date == date))
    }

    /// Fetch a whole year from the remote store. On failure the year is
    /// still marked present in memory (empty if nothing was there before) so
    /// repeated failures do not block every navigation; the durable mirror
    /// is left untouched.
    pub async fn load(
        &mut self,
        remote: &dyn RemoteStore,
        session: &Session,
        year: i32,
    ) -> Result<&[DiaryEntry], RemoteError> {
        match remote.load_entries_for_year(session, year).await {
            Ok(mut entries) => {
                for entry in &mut entries {
                    entry.sanitize();
                }
                self.years.insert(year, entries);
                self.write_mirror(&session.user_id, year);
                Ok(self.years.get(&year).map(Vec::as_slice).unwrap_or(&[]))
            }
            Err(e) => {
                self.years.entry(year).or_default();
                Err(e)
            }
        }
    }

    /// Bring a year back from the durable mirror, if one exists and the year
    /// is not already in memory. Returns whether the year is now present.
    pub fn restore(&mut self, user_id: &str, year: i32) -> bool {
        if self.years.contains_key(&year) {
            return true;
        }
        match self.store.get_json::<Vec<DiaryEntry>>(&entries_key(user_id, year)) {
            Ok(Some(mut entries)) => {
                for entry in &mut entries {
                    entry.sanitize();
                }
                self.years.insert(year, entries);
                true
            }
            Ok(None) => false,
            Err(e) => {
                log::warn!("failed to read mirror for {}/{}: {}", user_id, year, e);
                false
            }
        }
    }

    /// The only mutation path: replace whatever entry exists for that date
    /// and rewrite the year's mirror blob.
    pub fn upsert(&mut self, entry: DiaryEntry) {
        let user_id = entry.user_id.clone();
        let year = entry.date.year();
        let entries = self.years.entry(year).or_default();
        entries.retain(|e| e.date != entry.date);
        entries.push(entry);
        self.write_mirror(&user_id, year);
    }

    /// Clears memory only; durable mirrors are namespaced per user and are
    /// left alone.
    pub fn invalidate_all(&mut self) {
        self.years.clear();
    }

    /// Wipes a user's durable entry mirrors (logout).
    pub fn clear_user_durable(&self, user_id: &str) {
        if let Err(e) = self.store.delete_prefix(&user_prefix(user_id)) {
            log::warn!("failed to clear mirrors for {}: {}", user_id, e);
        }
    }

    fn write_mirror(&self, user_id: &str, year: i32) {
        // Mirrors are per user; never let another user's rows bleed into the blob.
        let entries: Vec<&DiaryEntry> = self
            .years
            .get(&year)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .filter(|e| e.user_id == user_id)
            .collect();
        if let Err(e) = self.store.put_json(&entries_key(user_id, year), &entries) {
            log::warn!("failed to mirror {}/{}: {}", user_id, year, e);
        }
    }
}
