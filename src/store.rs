use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("flag store io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("flag store {path} is not a JSON object of strings: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Key-value store remembering completion flags across sessions.
///
/// Keys are stringified problem ids, values are [`Flag`] markers.
pub trait FlagStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    Done,
    Open,
}

impl Flag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flag::Done => "t",
            Flag::Open => "f",
        }
    }

    pub fn from_completed(completed: bool) -> Self {
        if completed {
            Flag::Done
        } else {
            Flag::Open
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryFlagStore {
    flags: HashMap<String, String>,
}

impl MemoryFlagStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MemoryFlagStore {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            flags: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl FlagStore for MemoryFlagStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.flags.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.flags.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Flags kept in a JSON object file, rewritten on every write.
#[derive(Debug)]
pub struct FileFlagStore {
    path: PathBuf,
    flags: HashMap<String, String>,
}

impl FileFlagStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let flags = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => HashMap::new(),
            Ok(content) => serde_json::from_str(&content).map_err(|source| StoreError::Format {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => HashMap::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        debug!(path = %path.display(), count = flags.len(), "opened flag store");
        Ok(Self { path, flags })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(&self.flags).map_err(|source| StoreError::Format {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, json).map_err(io_err)
    }
}

impl FlagStore for FileFlagStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.flags.get(key).cloned())
    }

    /// A failed save leaves the previous value in place.
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let previous = self.flags.insert(key.to_string(), value.to_string());
        self.save().map_err(|e| {
            match previous {
                Some(v) => self.flags.insert(key.to_string(), v),
                None => self.flags.remove(key),
            };
            e
        })
    }
}
