use crate::error::StorageError;
use crate::fold::{collapsed_storage_key, deserialize_collapsed};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Per-document keyed storage for collapsed block ids.
pub trait FoldStorage {
    fn load(&self, doc_id: &str) -> Result<Vec<String>, StorageError>;

    fn save(&mut self, doc_id: &str, ids: &[String]) -> Result<(), StorageError>;
}

fn sorted_ids(ids: HashSet<String>) -> Vec<String> {
    let mut ids: Vec<_> = ids.into_iter().collect();
    ids.sort();
    ids
}

#[derive(Clone, Debug, Default)]
pub struct MemoryFoldStorage {
    entries: HashMap<String, String>,
}

impl MemoryFoldStorage {
    pub fn raw(&self, doc_id: &str) -> Option<&str> {
        self.entries
            .get(&collapsed_storage_key(doc_id))
            .map(String::as_str)
    }
}

impl FoldStorage for MemoryFoldStorage {
    fn load(&self, doc_id: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .raw(doc_id)
            .map(|raw| sorted_ids(deserialize_collapsed(raw)))
            .unwrap_or_default())
    }

    fn save(&mut self, doc_id: &str, ids: &[String]) -> Result<(), StorageError> {
        self.entries
            .insert(collapsed_storage_key(doc_id), serde_json::to_string(ids)?);
        Ok(())
    }
}

/// Fold state in a SQLite `kv` table, one row per document.
pub struct SqliteFoldStorage {
    conn: Connection,
}

impl SqliteFoldStorage {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(Self { conn })
    }

    pub fn get_kv(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?)
    }

    pub fn set_kv(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }
}

impl FoldStorage for SqliteFoldStorage {
    fn load(&self, doc_id: &str) -> Result<Vec<String>, StorageError> {
        let raw = self.get_kv(&collapsed_storage_key(doc_id))?;
        Ok(raw
            .map(|raw| sorted_ids(deserialize_collapsed(&raw)))
            .unwrap_or_default())
    }

    fn save(&mut self, doc_id: &str, ids: &[String]) -> Result<(), StorageError> {
        let raw = serde_json::to_string(ids)?;
        self.set_kv(&collapsed_storage_key(doc_id), &raw)
    }
}

/// Fold state for every document in one JSON file.
pub struct JsonFileFoldStorage {
    path: PathBuf,
}

impl JsonFileFoldStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn default_store() -> Result<Self, StorageError> {
        let project_dirs =
            ProjectDirs::from("app", "sandpaper", "Sandpaper").ok_or(StorageError::ProjectDir)?;
        Ok(Self::new(project_dirs.config_dir().join("outline-folds.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, Vec<String>>, StorageError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

impl FoldStorage for JsonFileFoldStorage {
    fn load(&self, doc_id: &str) -> Result<Vec<String>, StorageError> {
        let mut all = self.read_all()?;
        Ok(all.remove(doc_id).unwrap_or_default())
    }

    /// A file that no longer parses is overwritten with the new state.
    fn save(&mut self, doc_id: &str, ids: &[String]) -> Result<(), StorageError> {
        let mut all = match self.read_all() {
            Ok(all) => all,
            Err(StorageError::Serde(err)) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "discarding unreadable fold file"
                );
                BTreeMap::new()
            }
            Err(err) => return Err(err),
        };
        if ids.is_empty() {
            all.remove(doc_id);
        } else {
            all.insert(doc_id.to_string(), ids.to_vec());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&all)?)?;
        Ok(())
    }
}
