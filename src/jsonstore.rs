//! Atomic JSON persistence shared by the five secondary documents (provas,
//! turnos, exames, anotações, usuários).
//!
//! `load_json` never fails: a missing, unreadable or wrong-shape file yields
//! the caller's default so no call site needs recovery logic. `save_json`
//! writes `path.tmp` then renames over the target, so the previous document
//! survives any failed save intact.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

pub fn load_json<T: DeserializeOwned>(path: &Path, default: T) -> T {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(_) => return default,
    };
    match serde_json::from_str(&text) {
        Ok(v) => v,
        Err(e) => {
            log::warn!(
                "{}: JSON inválido ({}), usando documento vazio",
                path.to_string_lossy(),
                e
            );
            default
        }
    }
}

pub fn save_json<T: Serialize>(path: &Path, doc: &T) -> bool {
    let text = match serde_json::to_string_pretty(doc) {
        Ok(t) => t,
        Err(e) => {
            log::error!("{}: falha ao serializar: {}", path.to_string_lossy(), e);
            return false;
        }
    };
    if let Some(parent) = path.parent() {
        if std::fs::create_dir_all(parent).is_err() {
            return false;
        }
    }
    let tmp = PathBuf::from(format!("{}.tmp", path.to_string_lossy()));
    if let Err(e) = std::fs::write(&tmp, text) {
        log::error!("{}: falha ao gravar: {}", tmp.to_string_lossy(), e);
        return false;
    }
    if let Err(e) = std::fs::rename(&tmp, path) {
        log::error!("{}: falha ao substituir: {}", path.to_string_lossy(), e);
        return false;
    }
    true
}

/// One JSON document plus its in-memory cache. The cache is loaded once at
/// construction and written back on every mutation; there is no transaction
/// spanning two stores.
pub struct JsonStore<T> {
    path: PathBuf,
    cache: Mutex<T>,
}

impl<T: Serialize + DeserializeOwned + Clone> JsonStore<T> {
    pub fn open(path: impl Into<PathBuf>, default: T) -> Self {
        let path = path.into();
        let cache = Mutex::new(load_json(&path, default));
        JsonStore { path, cache }
    }

    pub fn read(&self) -> MutexGuard<'_, T> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Applies `f` to the cached document and persists the result. Returns
    /// false when the write fails; the cache keeps the mutated value so a
    /// later save can retry.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> (R, bool) {
        let mut doc = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        let out = f(&mut doc);
        let saved = save_json(&self.path, &*doc);
        (out, saved)
    }
}
