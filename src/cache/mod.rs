pub mod entry_cache;

pub use entry_cache::EntryCache;
