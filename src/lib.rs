//! Client-side synchronization and caching core for an AI-illustrated
//! plan/reflect diary. The [`sync::Reconciler`] is the single load/save
//! path; [`controller::PageController`] drives it from user actions and
//! keeps the per-page transient state.

pub mod cache;
pub mod controller;
pub mod database;
pub mod error;
pub mod models;
pub mod services;
pub mod sync;
pub mod utils;

pub use controller::{ImageSlot, LoadTicket, PageController, PageState, SuggestionTicket};
pub use error::RemoteError;
pub use models::{DiaryEntry, DisplayChoice, EntryPatch, Field, Session, Settings, UploadState};
pub use sync::{LoadedEntry, Reconciler};
