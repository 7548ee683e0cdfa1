//! Utilities for loading RON files and watching directories for changes.
//!
//! This module provides a small helper for reading RON files from disk and a
//! simple filesystem watcher that sets a shared flag when files change. It is
//! used for hot-reloading RON-based configuration (blocks, materials) at
//! runtime without restarting the host application.

use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// File-watcher handle for RON hot-reload.
///
/// Polling `changed` is the caller's responsibility; this type never spawns
/// its own timer. A host polls it once per frame, outside the `remesh`/
/// `update` hot path (see the crate's concurrency design).
pub struct RonWatcher {
    pub changed: Arc<Mutex<bool>>,
    _watcher: Option<RecommendedWatcher>,
}

impl RonWatcher {
    /// A watcher with no underlying OS handle; `changed` never flips.
    /// Used as a fallback when watcher creation fails.
    #[must_use]
    pub fn stub() -> Self {
        RonWatcher {
            changed: Arc::new(Mutex::new(false)),
            _watcher: None,
        }
    }

    /// Take and reset the `changed` flag, returning whether it was set.
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    pub fn take_changed(&self) -> bool {
        let mut guard = self.changed.lock().expect("RonWatcher::changed lock");
        std::mem::replace(&mut *guard, false)
    }
}

/// Load all `.ron` files from a directory and deserialize them into `T`.
///
/// Files that fail to parse are skipped and a warning is logged; this keeps
/// one malformed file from taking down an otherwise-valid registry reload.
#[must_use]
pub fn load_ron_files<T: DeserializeOwned>(path: &str) -> Vec<T> {
    let mut items = Vec::new();

    let Ok(entries) = std::fs::read_dir(path) else {
        return items;
    };

    for entry in entries.flatten() {
        let Ok(metadata) = entry.metadata() else { continue };
        if !metadata.is_file() {
            continue;
        }
        if entry.path().extension().and_then(|e| e.to_str()) != Some("ron") {
            continue;
        }
        let Ok(content) = std::fs::read_to_string(entry.path()) else { continue };
        match ron::from_str::<T>(&content) {
            Ok(item) => items.push(item),
            Err(e) => log::warn!("failed to parse {}: {e}", entry.path().display()),
        }
    }

    items
}

/// Create a `RonWatcher` that watches a directory for modifications.
///
/// # Errors
/// Returns the underlying `notify::Error` if the OS watcher cannot be
/// created or registered for `path`.
pub fn setup_ron_watcher(path: &str) -> Result<RonWatcher, notify::Error> {
    let changed = Arc::new(Mutex::new(false));
    let changed_clone = changed.clone();
    let watched_path: PathBuf = std::fs::canonicalize(path).unwrap_or_else(|_| PathBuf::from(path));

    let mut watcher: RecommendedWatcher = Watcher::new(
        move |res: Result<notify::Event, notify::Error>| match res {
            Ok(event) => {
                if matches!(event.kind, notify::EventKind::Modify(_)) {
                    let relevant = event.paths.iter().any(|p| {
                        let p_canon = std::fs::canonicalize(p).unwrap_or_else(|_| p.clone());
                        p_canon.starts_with(&watched_path)
                    });
                    if relevant {
                        *changed_clone.lock().expect("RonWatcher::changed lock") = true;
                    }
                }
            }
            Err(e) => log::warn!("ron watch error: {e}"),
        },
        Config::default(),
    )?;

    watcher.watch(Path::new(path), RecursiveMode::NonRecursive)?;
    Ok(RonWatcher { changed, _watcher: Some(watcher) })
}
