use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use trawl_core::error::AppError;
use trawl_core::models::JobSource;
use trawl_core::traits::{SourceStore, remove_source, upsert_source};

/// Custom sources persisted as a pretty-printed JSON array.
///
/// A missing file reads as an empty list. Writes go to a sibling temp file
/// first and are renamed into place.
#[derive(Debug, Clone)]
pub struct JsonFileSourceStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl JsonFileSourceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl JsonFileSourceStore {
    fn lock(&self) -> Result<MutexGuard<'_, ()>, AppError> {
        self.write_lock
            .lock()
            .map_err(|_| AppError::StorageError("source file lock poisoned".into()))
    }

    fn read(&self) -> Result<Vec<JobSource>, AppError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(AppError::StorageError(format!(
                    "Failed to read {}: {e}",
                    self.path.display()
                )));
            }
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&raw).map_err(|e| {
            AppError::StorageError(format!("Invalid sources file {}: {e}", self.path.display()))
        })
    }

    /// Callers hold `write_lock`.
    fn write(&self, sources: &[JobSource]) -> Result<(), AppError> {
        let json = serde_json::to_string_pretty(sources)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .and_then(|()| fs::rename(&tmp, &self.path))
            .map_err(|e| {
                AppError::StorageError(format!("Failed to write {}: {e}", self.path.display()))
            })?;
        tracing::debug!(path = %self.path.display(), count = sources.len(), "Saved custom sources");
        Ok(())
    }
}

impl SourceStore for JsonFileSourceStore {
    fn get_custom_sources(&self) -> Result<Vec<JobSource>, AppError> {
        self.read()
    }

    fn save_custom_sources(&self, sources: &[JobSource]) -> Result<(), AppError> {
        let _guard = self.lock()?;
        self.write(sources)
    }

    fn add_custom_source(&self, source: JobSource) -> Result<(), AppError> {
        let _guard = self.lock()?;
        let mut sources = self.read()?;
        upsert_source(&mut sources, source);
        self.write(&sources)
    }

    fn remove_custom_source(&self, id: &str) -> Result<bool, AppError> {
        let _guard = self.lock()?;
        let mut sources = self.read()?;
        let removed = remove_source(&mut sources, id);
        if removed {
            self.write(&sources)?;
        }
        Ok(removed)
    }
}
