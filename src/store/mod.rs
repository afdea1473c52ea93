//! store
//!
//! Keyed result cache.
//!
//! # Layout
//!
//! ```text
//! <cache>/
//!   VERSION              first line "plugcli-cache", second the format version
//!   data/<uuid>.json     stored result envelopes
//!   keys/<key>.json      {"data": uuid} | {"collection": [[k, uuid]]} | {"pool": name}
//!   pools/<name>/<uuid>  pool membership; file content is the step id
//!   .lock                exclusive lock
//! ```
//!
//! A directory is a cache iff it contains a `VERSION` file whose first line
//! is `plugcli-cache`.
//!
//! # Invariants
//!
//! - Data is written before the key that references it
//! - Removing keys garbage-collects data nothing references
//! - Every mutation holds the cache lock
//!
//! # Example
//!
//! ```no_run
//! use plugcli::core::result::Artifact;
//! use plugcli::core::types::SemanticType;
//! use plugcli::store::ResultCache;
//! use std::path::Path;
//!
//! let cache = ResultCache::create(Path::new("/tmp/my-cache")).unwrap();
//! let artifact = Artifact::new(SemanticType::new("IntSequence1"), serde_json::json!([1, 2]));
//! cache.save(&artifact, "ints").unwrap();
//! let loaded = cache.load("ints").unwrap();
//! ```

pub mod lock;

pub use lock::{CacheLock, LockError};

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::core::atomic::{write_atomic, write_json_atomic};
use crate::core::naming::{validate_key, NamingError};
use crate::core::result::{is_no_space, Artifact, QResult, ResultCollection, ResultError};

const VERSION_FILE: &str = "VERSION";
const CACHE_MARKER: &str = "plugcli-cache";
const FORMAT_VERSION: &str = "1";

/// Errors from cache operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} is not a valid cache")]
    NotACache(PathBuf),

    #[error("{0} already exists and is not a cache")]
    AlreadyExists(PathBuf),

    #[error("Cache at '{cache}' does not contain the key '{key}'")]
    KeyNotFound { cache: PathBuf, key: String },

    #[error("Key '{key}' in cache '{cache}' refers to a pool, not a result")]
    PoolKey { cache: PathBuf, key: String },

    #[error("Key '{key}' in cache '{cache}' already holds a result; choose another pool name")]
    KeyTaken { cache: PathBuf, key: String },

    #[error("cache entry '{path}' is corrupt: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error(transparent)]
    InvalidKey(#[from] NamingError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Result(#[from] ResultError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Location that ran out of space, if that is what failed.
    pub fn no_space_path(&self) -> Option<&Path> {
        match self {
            StoreError::Io { path, source } if is_no_space(source) => Some(path),
            StoreError::Result(e) => e.no_space_path(),
            _ => None,
        }
    }
}

/// What a key points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyEntry {
    Data(Uuid),
    Collection(Vec<(String, Uuid)>),
    Pool(String),
}

/// Snapshot of cache contents, for `tools cache-status`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStatus {
    pub keys: BTreeMap<String, KeyEntry>,
    /// Display type per key, peeked while the lock is held.
    pub key_types: BTreeMap<String, String>,
    pub pools: BTreeMap<String, usize>,
    pub data_count: usize,
}

/// Handle to an on-disk result cache.
#[derive(Debug, Clone)]
pub struct ResultCache {
    root: PathBuf,
}

impl ResultCache {
    /// Whether `path` is a cache directory.
    pub fn is_cache(path: &Path) -> bool {
        fs::read_to_string(path.join(VERSION_FILE))
            .map(|v| v.lines().next() == Some(CACHE_MARKER))
            .unwrap_or(false)
    }

    /// Open an existing cache.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if !Self::is_cache(path) {
            return Err(StoreError::NotACache(path.to_path_buf()));
        }
        Ok(Self {
            root: path.to_path_buf(),
        })
    }

    /// Create a cache, or open it if it already exists.
    ///
    /// Fails if `path` is a non-empty directory that is not a cache.
    pub fn create(path: &Path) -> Result<Self, StoreError> {
        if Self::is_cache(path) {
            return Self::open(path);
        }
        if path.exists() {
            let non_empty = fs::read_dir(path)
                .map_err(|e| StoreError::io(path, e))?
                .next()
                .is_some();
            if non_empty || !path.is_dir() {
                return Err(StoreError::AlreadyExists(path.to_path_buf()));
            }
        }

        for dir in ["data", "keys", "pools"] {
            let sub = path.join(dir);
            fs::create_dir_all(&sub).map_err(|e| StoreError::io(&sub, e))?;
        }
        let version = path.join(VERSION_FILE);
        write_atomic(
            &version,
            format!("{}\n{}\n", CACHE_MARKER, FORMAT_VERSION).as_bytes(),
        )
        .map_err(|e| StoreError::io(&version, e))?;

        Ok(Self {
            root: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Hold the cache lock.
    pub fn lock(&self) -> Result<CacheLock, StoreError> {
        Ok(CacheLock::acquire(&self.root)?)
    }

    fn data_path(&self, uuid: &Uuid) -> PathBuf {
        self.root.join("data").join(format!("{}.json", uuid))
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.root.join("keys").join(format!("{}.json", key))
    }

    fn pool_dir(&self, name: &str) -> PathBuf {
        self.root.join("pools").join(name)
    }

    fn write_data(&self, artifact: &Artifact) -> Result<(), StoreError> {
        let path = self.data_path(&artifact.uuid);
        if !path.exists() {
            write_json_atomic(&path, artifact).map_err(|e| StoreError::io(&path, e))?;
        }
        Ok(())
    }

    fn read_data(&self, uuid: &Uuid) -> Result<Artifact, StoreError> {
        Ok(Artifact::load(&self.data_path(uuid))?)
    }

    fn write_key(&self, key: &str, entry: &KeyEntry) -> Result<(), StoreError> {
        let path = self.key_path(key);
        write_json_atomic(&path, entry).map_err(|e| StoreError::io(&path, e))
    }

    /// Read a key entry.
    pub fn key_entry(&self, key: &str) -> Result<KeyEntry, StoreError> {
        validate_key(key)?;
        let path = self.key_path(key);
        if !path.is_file() {
            return Err(StoreError::KeyNotFound {
                cache: self.root.clone(),
                key: key.to_string(),
            });
        }
        let bytes = fs::read(&path).map_err(|e| StoreError::io(&path, e))?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
            path,
            message: e.to_string(),
        })
    }

    pub fn has_key(&self, key: &str) -> bool {
        validate_key(key).is_ok() && self.key_path(key).is_file()
    }

    /// Store any result under `key`.
    pub fn save_result(&self, result: &QResult, key: &str) -> Result<(), StoreError> {
        match result {
            QResult::Artifact(a) | QResult::Visualization(a) => self.save(a, key),
            QResult::Collection(c) => self.save_collection(c, key),
        }
    }

    /// Store a single result under `key`, replacing any previous value.
    pub fn save(&self, artifact: &Artifact, key: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        let _lock = self.lock()?;
        self.write_data(artifact)?;
        self.write_key(key, &KeyEntry::Data(artifact.uuid))?;
        self.collect_garbage_locked()
    }

    /// Store a collection under `key`.
    pub fn save_collection(&self, collection: &ResultCollection, key: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        let _lock = self.lock()?;
        let mut members = Vec::with_capacity(collection.members.len());
        for (member_key, artifact) in &collection.members {
            self.write_data(artifact)?;
            members.push((member_key.clone(), artifact.uuid));
        }
        self.write_key(key, &KeyEntry::Collection(members))?;
        self.collect_garbage_locked()
    }

    /// Load the value stored under `key`.
    pub fn load(&self, key: &str) -> Result<QResult, StoreError> {
        match self.key_entry(key)? {
            KeyEntry::Data(uuid) => Ok(self.read_data(&uuid)?.into()),
            KeyEntry::Collection(members) => {
                let members = members
                    .iter()
                    .map(|(k, uuid)| Ok((k.clone(), self.read_data(uuid)?)))
                    .collect::<Result<Vec<_>, StoreError>>()?;
                Ok(QResult::Collection(ResultCollection::new(members)))
            }
            KeyEntry::Pool(_) => Err(StoreError::PoolKey {
                cache: self.root.clone(),
                key: key.to_string(),
            }),
        }
    }

    /// Remove `key` and collect unreferenced data.
    ///
    /// Removing a pool key also removes the pool.
    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _lock = self.lock()?;
        let entry = self.key_entry(key)?;
        let path = self.key_path(key);
        fs::remove_file(&path).map_err(|e| StoreError::io(&path, e))?;
        if let KeyEntry::Pool(name) = entry {
            let dir = self.pool_dir(&name);
            if dir.exists() {
                fs::remove_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
            }
        }
        self.collect_garbage_locked()
    }

    /// Open a named pool, creating it (and its key) when missing.
    ///
    /// A key that already holds a result is never replaced.
    pub fn create_pool(&self, name: &str) -> Result<Pool, StoreError> {
        validate_key(name)?;
        let _lock = self.lock()?;
        match self.key_entry(name) {
            Ok(KeyEntry::Pool(_)) => {}
            Ok(KeyEntry::Data(_)) | Ok(KeyEntry::Collection(_)) => {
                return Err(StoreError::KeyTaken {
                    cache: self.root.clone(),
                    key: name.to_string(),
                })
            }
            Err(StoreError::KeyNotFound { .. }) => {
                self.write_key(name, &KeyEntry::Pool(name.to_string()))?;
            }
            Err(e) => return Err(e),
        }
        let dir = self.pool_dir(name);
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        Ok(Pool {
            cache: self.clone(),
            name: name.to_string(),
        })
    }

    /// Delete a pool and its key.
    pub fn remove_pool(&self, name: &str) -> Result<(), StoreError> {
        if self.has_key(name) {
            self.remove(name)
        } else {
            Ok(())
        }
    }

    /// List keys, pools and data.
    ///
    /// Holds the lock so the listing and the peeks that follow agree.
    pub fn status(&self) -> Result<CacheStatus, StoreError> {
        let _lock = self.lock()?;
        self.status_locked()
    }

    fn status_locked(&self) -> Result<CacheStatus, StoreError> {
        let mut status = CacheStatus::default();

        for stem in list_stems(&self.root.join("keys"), "json")? {
            let entry = self.key_entry(&stem)?;
            let type_name = match &entry {
                KeyEntry::Data(uuid) => self.read_data(uuid)?.type_name(),
                KeyEntry::Collection(members) => match members.first() {
                    Some((_, uuid)) => format!(
                        "Collection of {} x {}",
                        members.len(),
                        self.read_data(uuid)?.type_name()
                    ),
                    None => "Collection (empty)".to_string(),
                },
                KeyEntry::Pool(_) => "Pool".to_string(),
            };
            status.key_types.insert(stem.clone(), type_name);
            status.keys.insert(stem, entry);
        }

        let pools = self.root.join("pools");
        if pools.is_dir() {
            for entry in fs::read_dir(&pools).map_err(|e| StoreError::io(&pools, e))? {
                let entry = entry.map_err(|e| StoreError::io(&pools, e))?;
                let count = fs::read_dir(entry.path())
                    .map_err(|e| StoreError::io(&entry.path(), e))?
                    .count();
                status
                    .pools
                    .insert(entry.file_name().to_string_lossy().to_string(), count);
            }
        }

        status.data_count = list_stems(&self.root.join("data"), "json")?.len();
        Ok(status)
    }

    /// Remove data no key or pool references. Caller holds the lock.
    fn collect_garbage_locked(&self) -> Result<(), StoreError> {
        let mut referenced: HashSet<String> = HashSet::new();
        let keys_dir = self.root.join("keys");
        for stem in list_stems(&keys_dir, "json")? {
            match self.key_entry(&stem)? {
                KeyEntry::Data(uuid) => {
                    referenced.insert(uuid.to_string());
                }
                KeyEntry::Collection(members) => {
                    referenced.extend(members.iter().map(|(_, u)| u.to_string()));
                }
                KeyEntry::Pool(name) => {
                    let dir = self.pool_dir(&name);
                    if dir.is_dir() {
                        for entry in fs::read_dir(&dir).map_err(|e| StoreError::io(&dir, e))? {
                            let entry = entry.map_err(|e| StoreError::io(&dir, e))?;
                            referenced.insert(entry.file_name().to_string_lossy().to_string());
                        }
                    }
                }
            }
        }

        let data_dir = self.root.join("data");
        for stem in list_stems(&data_dir, "json")? {
            if !referenced.contains(&stem) {
                let path = data_dir.join(format!("{}.json", stem));
                fs::remove_file(&path).map_err(|e| StoreError::io(&path, e))?;
            }
        }
        Ok(())
    }
}

fn list_stems(dir: &Path, ext: &str) -> Result<Vec<String>, StoreError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut stems = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| StoreError::io(dir, e))? {
        let path = entry.map_err(|e| StoreError::io(dir, e))?.path();
        if path.extension().is_some_and(|e| e == ext) {
            if let Some(stem) = path.file_stem() {
                stems.push(stem.to_string_lossy().to_string());
            }
        }
    }
    stems.sort();
    Ok(stems)
}

/// A resumption pool: results recorded by step id.
///
/// A pipeline records each step's output here. When the pipeline is rerun
/// after a failure, completed steps are found by id and reused.
#[derive(Debug, Clone)]
pub struct Pool {
    cache: ResultCache,
    name: String,
}

impl Pool {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Record `artifact` as the output of `step`.
    pub fn record(&self, step: &str, artifact: &Artifact) -> Result<(), StoreError> {
        let _lock = self.cache.lock()?;
        self.cache.write_data(artifact)?;
        let marker = self.cache.pool_dir(&self.name).join(artifact.uuid.to_string());
        write_atomic(&marker, step.as_bytes()).map_err(|e| StoreError::io(&marker, e))
    }

    /// Find a previously recorded output of `step`.
    pub fn lookup(&self, step: &str) -> Result<Option<Artifact>, StoreError> {
        let dir = self.cache.pool_dir(&self.name);
        if !dir.is_dir() {
            return Ok(None);
        }
        for entry in fs::read_dir(&dir).map_err(|e| StoreError::io(&dir, e))? {
            let path = entry.map_err(|e| StoreError::io(&dir, e))?.path();
            let recorded = fs::read_to_string(&path).map_err(|e| StoreError::io(&path, e))?;
            if recorded == step {
                let name = path.file_name().map(|n| n.to_string_lossy().to_string());
                if let Some(uuid) = name.and_then(|n| Uuid::parse_str(&n).ok()) {
                    return Ok(Some(self.cache.read_data(&uuid)?));
                }
            }
        }
        Ok(None)
    }

    pub fn len(&self) -> usize {
        fs::read_dir(self.cache.pool_dir(&self.name))
            .map(|d| d.count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
