use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Durable local mirror: a plain key -> JSON document store on sqlite.
/// Keys are namespaced per user so one user's logout never disturbs
/// another's mirrors.
#[derive(Debug, Clone)]
pub struct LocalStore {
    db_path: PathBuf,
}

pub fn entries_key(user_id: &str, year: i32) -> String {
    format!("entries/{}/{}", user_id, year)
}

pub fn user_prefix(user_id: &str) -> String {
    format!("entries/{}/", user_id)
}

pub fn tags_key(user_id: &str) -> String {
    format!("tags/{}", user_id)
}

impl LocalStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        super::init_database(db_path)?;
        Ok(Self {
            db_path: db_path.to_path_buf(),
        })
    }

    fn conn(&self) -> Result<Connection> {
        Ok(Connection::open(&self.db_path)?)
    }

    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let conn = self.conn()?;
        let value: Option<String> = conn
            .query_row("SELECT value FROM blobs WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;

        match value {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let conn = self.conn()?;
        let raw = serde_json::to_string(value)?;
        let now = chrono::Utc::now().timestamp();
        conn.execute(
            "INSERT INTO blobs (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            rusqlite::params![key, raw, now],
        )?;
        Ok(())
    }

    pub fn delete(&self, key: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM blobs WHERE key = ?1", [key])?;
        Ok(())
    }

    pub fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM blobs WHERE key LIKE ?1 || '%'",
            [prefix],
        )?;
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, LocalStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(&dir.path().join("diarysync.db")).unwrap();
        (dir, store)
    }

    #[test]
    fn round_trips_json_documents() {
        let (_dir, store) = temp_store();
        store.put_json("tags/u1", &vec!["a".to_string(), "b".to_string()]).unwrap();
        let tags: Option<Vec<String>> = store.get_json("tags/u1").unwrap();
        assert_eq!(tags, Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn missing_keys_read_as_none() {
        let (_dir, store) = temp_store();
        let value: Option<Vec<String>> = store.get_json("tags/nobody").unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn overwrite_replaces_value() {
        let (_dir, store) = temp_store();
        store.put_json("k", &1_i64).unwrap();
        store.put_json("k", &2_i64).unwrap();
        let value: Option<i64> = store.get_json("k").unwrap();
        assert_eq!(value, Some(2));
    }

    #[test]
    fn delete_prefix_only_touches_matching_keys() {
        let (_dir, store) = temp_store();
        store.put_json(&entries_key("u1", 2024), &1_i64).unwrap();
        store.put_json(&entries_key("u1", 2025), &2_i64).unwrap();
        store.put_json(&entries_key("u2", 2024), &3_i64).unwrap();

        let deleted = store.delete_prefix(&user_prefix("u1")).unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.get_json::<i64>(&entries_key("u1", 2024)).unwrap(), None);
        assert_eq!(store.get_json::<i64>(&entries_key("u2", 2024)).unwrap(), Some(3));
    }
}
