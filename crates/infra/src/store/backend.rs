//! Persistence backends for the vendor store.
//!
//! A backend only knows how to read and replace the full serialized bytes of
//! a collection. Parsing, locking and rollback live in [`JsonStore`].
//!
//! [`JsonStore`]: super::JsonStore

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::r#trait::{Collection, StoreError};

/// Narrow storage interface: whole-collection read and rewrite.
pub trait CollectionBackend: Send + Sync {
    /// Current bytes of the collection, `None` if it was never written.
    fn load(&self, collection: Collection) -> Result<Option<Vec<u8>>, StoreError>;

    /// Replace the collection with `bytes`. Must be durable on `Ok`.
    fn save(&self, collection: Collection, bytes: &[u8]) -> Result<(), StoreError>;
}

impl<B> CollectionBackend for Arc<B>
where
    B: CollectionBackend + ?Sized,
{
    fn load(&self, collection: Collection) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).load(collection)
    }

    fn save(&self, collection: Collection, bytes: &[u8]) -> Result<(), StoreError> {
        (**self).save(collection, bytes)
    }
}

/// One JSON file per collection.
///
/// Saves go to a sibling `*.tmp` file which is synced and then renamed over
/// the target, so an interrupted write leaves the previous file in place.
#[derive(Debug, Clone)]
pub struct FileBackend {
    vendors_path: PathBuf,
    history_path: PathBuf,
}

impl FileBackend {
    /// Creates missing parent directories of both files.
    pub fn new(
        vendors_path: impl Into<PathBuf>,
        history_path: impl Into<PathBuf>,
    ) -> Result<Self, StoreError> {
        let backend = Self {
            vendors_path: vendors_path.into(),
            history_path: history_path.into(),
        };
        for collection in [Collection::Vendors, Collection::History] {
            ensure_parent_dir(backend.path(collection))
                .map_err(|source| StoreError::Io { collection, source })?;
        }
        Ok(backend)
    }

    pub fn path(&self, collection: Collection) -> &Path {
        match collection {
            Collection::Vendors => &self.vendors_path,
            Collection::History => &self.history_path,
        }
    }
}

impl CollectionBackend for FileBackend {
    fn load(&self, collection: Collection) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(self.path(collection)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { collection, source }),
        }
    }

    fn save(&self, collection: Collection, bytes: &[u8]) -> Result<(), StoreError> {
        replace_file(self.path(collection), bytes)
            .map_err(|source| StoreError::Io { collection, source })
    }
}

fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir),
        _ => Ok(()),
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn replace_file(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = tmp_path(path);
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.flush()?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)
}

#[derive(Debug, Default)]
struct MemoryState {
    data: HashMap<Collection, Vec<u8>>,
    saves: HashMap<Collection, usize>,
    /// Successful saves still allowed before failures start.
    failing: HashMap<Collection, usize>,
}

/// In-process backend for tests and benchmarks.
///
/// Save failures can be injected per collection to exercise rollback paths.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Seed a collection with raw bytes (e.g. a previously persisted file).
    pub fn with(self, collection: Collection, bytes: impl Into<Vec<u8>>) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.data.insert(collection, bytes.into());
        }
        self
    }

    pub fn contents(&self, collection: Collection) -> Option<Vec<u8>> {
        let state = self.state.lock().ok()?;
        state.data.get(&collection).cloned()
    }

    /// Number of successful saves of a collection so far.
    pub fn save_count(&self, collection: Collection) -> usize {
        match self.state.lock() {
            Ok(state) => state.saves.get(&collection).copied().unwrap_or(0),
            Err(_) => 0,
        }
    }

    /// Make subsequent saves of `collection` fail (or succeed again).
    pub fn fail_saves(&self, collection: Collection, fail: bool) {
        if fail {
            self.fail_saves_after(collection, 0);
        } else if let Ok(mut state) = self.state.lock() {
            state.failing.remove(&collection);
        }
    }

    /// Let `successes` more saves of `collection` through, then fail.
    pub fn fail_saves_after(&self, collection: Collection, successes: usize) {
        if let Ok(mut state) = self.state.lock() {
            state.failing.insert(collection, successes);
        }
    }
}

impl CollectionBackend for MemoryBackend {
    fn load(&self, collection: Collection) -> Result<Option<Vec<u8>>, StoreError> {
        let state = self
            .state
            .lock()
            .map_err(|_| StoreError::LockPoisoned(collection))?;
        Ok(state.data.get(&collection).cloned())
    }

    fn save(&self, collection: Collection, bytes: &[u8]) -> Result<(), StoreError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| StoreError::LockPoisoned(collection))?;
        if let Some(remaining) = state.failing.get_mut(&collection) {
            if *remaining == 0 {
                return Err(StoreError::Io {
                    collection,
                    source: io::Error::other("injected save failure"),
                });
            }
            *remaining -= 1;
        }
        state.data.insert(collection, bytes.to_vec());
        *state.saves.entry(collection).or_default() += 1;
        Ok(())
    }
}
