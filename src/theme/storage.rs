//! persisting the chosen theme
use {
    crate::{error::Result, theme::ThemeChoice},
    chrono::{DateTime, Utc},
    hashbrown::HashMap,
    serde::{Deserialize, Serialize},
    std::{fs, path::PathBuf},
    tracing::warn,
};

/// a tiny key-value store, the way browser local storage works
pub trait ThemeStorage: Send {
    /// read the raw value stored under a key
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// replace the value stored under a key
    fn write(&mut self, key: &str, value: &str) -> Result<()>;
}

/// what gets written to storage
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersistedTheme {
    /// the user's choice
    pub active_theme: ThemeChoice,
    /// when it was chosen, in unix millis
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_updated: DateTime<Utc>,
}

impl PersistedTheme {
    /// read and decode the persisted theme
    ///
    /// missing or unreadable state is logged and treated as absent
    pub fn load(storage: &dyn ThemeStorage, key: &str) -> Option<Self> {
        let raw = match storage.read(key) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(key, error = %e, "theme storage unavailable");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!(key, error = %e, "ignoring corrupt persisted theme state");
                None
            }
        }
    }

    /// encode and write the persisted theme
    pub fn save(&self, storage: &mut dyn ThemeStorage, key: &str) -> Result<()> {
        storage.write(key, &serde_json::to_string(self)?)
    }
}

/// storage that lives and dies with the process
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    /// the stored values
    values: HashMap<String, String>,
    /// how many writes have happened
    writes: usize,
}

impl MemoryStorage {
    /// make an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// how many writes have happened
    pub fn write_count(&self) -> usize {
        self.writes
    }

    /// how many keys are stored
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl ThemeStorage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        self.writes += 1;
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// storage backed by one json file per key
#[derive(Debug, Clone)]
pub struct FileStorage {
    /// the directory files are kept in
    dir: PathBuf,
}

impl FileStorage {
    /// store values under a directory (created on first write)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// the file a key is stored in
    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

impl ThemeStorage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path_for(key), value)?;
        Ok(())
    }
}
