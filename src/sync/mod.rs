pub mod reconciler;

pub use reconciler::{resolve_display, LoadedEntry, Reconciler};
