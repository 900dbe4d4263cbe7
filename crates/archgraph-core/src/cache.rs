//! Content-addressed analysis cache.
//!
//! Keys are SHA-256 digests over every input that can change a result, so
//! lookups are plain key equality. Anything unreadable is a miss.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::parser::ParseOutcome;
use crate::types::Diagnostic;

const KEY_SCHEMA: &[u8] = b"archgraph-cache-v1";
const ENTRY_SUFFIX: &str = ".json";

/// Hex-encoded SHA-256 cache key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Returns the hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the key, returning the hex digest.
    #[must_use]
    pub fn into_hex(self) -> String {
        self.0
    }

    fn file_name(&self) -> String {
        format!("{}{ENTRY_SUFFIX}", self.0)
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Incremental hasher for cache keys and fingerprints.
///
/// Every field is length-prefixed so adjacent fields cannot run together.
pub struct Fingerprint {
    hasher: Sha256,
}

impl Fingerprint {
    /// Starts a fingerprint in the given domain (e.g., `"parse"`).
    #[must_use]
    pub fn new(domain: &str) -> Self {
        let mut fp = Self {
            hasher: Sha256::new(),
        };
        fp.push(KEY_SCHEMA);
        fp.push(domain.as_bytes());
        fp
    }

    /// Appends a field.
    #[must_use]
    pub fn field(mut self, bytes: impl AsRef<[u8]>) -> Self {
        self.push(bytes);
        self
    }

    /// Appends a field in place.
    pub fn push(&mut self, bytes: impl AsRef<[u8]>) {
        let bytes = bytes.as_ref();
        self.hasher.update((bytes.len() as u64).to_le_bytes());
        self.hasher.update(bytes);
    }

    /// Finishes the digest.
    #[must_use]
    pub fn finish(self) -> CacheKey {
        CacheKey(format!("{:x}", self.hasher.finalize()))
    }
}

/// A cached result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CachedValue {
    /// Parse outcome for one file.
    Parse(ParseOutcome),
    /// Diagnostics from one analyzer over one graph.
    Analysis(Vec<Diagnostic>),
}

/// A cache entry as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Entry key.
    pub key: CacheKey,
    /// RFC 3339 creation time.
    pub cached_at: String,
    /// Cached result.
    pub value: CachedValue,
}

impl CacheEntry {
    /// Creates an entry stamped with the current time.
    #[must_use]
    pub fn new(key: CacheKey, value: CachedValue) -> Self {
        Self {
            key,
            cached_at: chrono::Utc::now().to_rfc3339(),
            value,
        }
    }
}

/// Cache I/O errors.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Filesystem failure.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Entry could not be encoded.
    #[error("failed to encode cache entry: {0}")]
    Encode(#[from] serde_json::Error),

    /// The directory is a workspace or package root, not a dedicated cache.
    #[error("{} is the root of package `{package}`", path.display())]
    SharedDirectory {
        /// Configured cache directory.
        path: PathBuf,
        /// Package rooted there.
        package: String,
    },
}

/// Key-value store for cached results.
///
/// Implementations must tolerate concurrent readers and writers; writes to
/// distinct keys never contend.
pub trait CacheStore: Send + Sync {
    /// Looks up an entry. Missing, unreadable or corrupt entries are `None`.
    fn get(&self, key: &CacheKey) -> Option<CacheEntry>;

    /// Stores an entry, replacing any previous value under the key.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the entry cannot be written.
    fn put(&self, entry: CacheEntry) -> Result<(), CacheError>;

    /// Removes every entry whose key is not in `live`. Returns the count removed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the store cannot be enumerated.
    fn prune(&self, live: &HashSet<CacheKey>) -> Result<usize, CacheError>;
}

/// One JSON file per key in a directory.
#[derive(Debug)]
pub struct DiskCache {
    dir: PathBuf,
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

impl DiskCache {
    /// Opens (creating if needed) a cache directory and checks it is writable.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the directory cannot be created or written.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| CacheError::Io {
            path: dir.clone(),
            source: e,
        })?;
        let cache = Self { dir };
        let check = cache.temp_path("writable");
        std::fs::write(&check, b"").map_err(|e| CacheError::Io {
            path: check.clone(),
            source: e,
        })?;
        let _ = std::fs::remove_file(&check);
        Ok(cache)
    }

    /// Cache directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Deletes the cache entries in `dir`, then the directory itself if
    /// nothing else is left in it. Returns false if it did not exist.
    ///
    /// Files that are not cache entries are never touched.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the directory cannot be read or an
    /// entry cannot be removed.
    pub fn clear(dir: &Path) -> Result<bool, CacheError> {
        let io = |e| CacheError::Io {
            path: dir.to_path_buf(),
            source: e,
        };
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(io(e)),
        };
        let mut kept = 0;
        for entry in entries {
            let entry = entry.map_err(io)?;
            let name = entry.file_name();
            let ours = name
                .to_str()
                .is_some_and(|n| entry_key(n).is_some() || temp_file_pid(n).is_some());
            if ours {
                std::fs::remove_file(entry.path()).map_err(|e| CacheError::Io {
                    path: entry.path(),
                    source: e,
                })?;
            } else {
                kept += 1;
            }
        }
        if kept == 0 {
            std::fs::remove_dir(dir).map_err(io)?;
        } else {
            warn!(
                dir = %dir.display(),
                kept,
                "cache directory holds other files, leaving it in place"
            );
        }
        Ok(true)
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    fn temp_path(&self, stem: &str) -> PathBuf {
        let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.dir
            .join(format!(".{stem}.{}.{n}.tmp", std::process::id()))
    }
}

impl CacheStore for DiskCache {
    fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let path = self.entry_path(key);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "unreadable cache entry, treating as miss"
                );
                return None;
            }
        };
        match serde_json::from_slice::<CacheEntry>(&bytes) {
            Ok(entry) if entry.key == *key => Some(entry),
            Ok(_) => {
                warn!(path = %path.display(), "cache entry key mismatch, treating as miss");
                None
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt cache entry, treating as miss");
                None
            }
        }
    }

    fn put(&self, entry: CacheEntry) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(&entry)?;
        let temp = self.temp_path(entry.key.as_str());
        std::fs::write(&temp, bytes).map_err(|e| CacheError::Io {
            path: temp.clone(),
            source: e,
        })?;
        let target = self.entry_path(&entry.key);
        std::fs::rename(&temp, &target).map_err(|e| {
            let _ = std::fs::remove_file(&temp);
            CacheError::Io {
                path: target,
                source: e,
            }
        })
    }

    fn prune(&self, live: &HashSet<CacheKey>) -> Result<usize, CacheError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| CacheError::Io {
            path: self.dir.clone(),
            source: e,
        })?;
        let mut removed = 0;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let stale = match entry_key(name) {
                Some(key) => !live.contains(&key),
                // only temp files this process left behind
                None => temp_file_pid(name) == Some(std::process::id()),
            };
            if !stale {
                continue;
            }
            match std::fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => warn!(
                    path = %entry.path().display(),
                    error = %e,
                    "failed to prune cache entry"
                ),
            }
        }
        debug!(removed, "pruned cache");
        Ok(removed)
    }
}

/// Key of a cache entry file name: 64 lowercase hex digits plus `.json`.
fn entry_key(name: &str) -> Option<CacheKey> {
    let stem = name.strip_suffix(ENTRY_SUFFIX)?;
    is_digest(stem).then(|| CacheKey(stem.to_string()))
}

fn is_digest(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Process id of a temp file written by [`DiskCache`]
/// (`.<digest|writable>.<pid>.<n>.tmp`).
fn temp_file_pid(name: &str) -> Option<u32> {
    let inner = name.strip_prefix('.')?.strip_suffix(".tmp")?;
    let mut parts = inner.split('.');
    let (Some(stem), Some(pid), Some(n), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return None;
    };
    let numeric = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());
    if (stem == "writable" || is_digest(stem)) && numeric(n) {
        pid.parse().ok()
    } else {
        None
    }
}

/// In-memory store, mainly for tests and one-shot runs.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<CacheKey, CacheEntry>,
}

impl MemoryCache {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    fn put(&self, entry: CacheEntry) -> Result<(), CacheError> {
        self.entries.insert(entry.key.clone(), entry);
        Ok(())
    }

    fn prune(&self, live: &HashSet<CacheKey>) -> Result<usize, CacheError> {
        let before = self.entries.len();
        self.entries.retain(|key, _| live.contains(key));
        Ok(before - self.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{ParseError, ParsedModule};

    fn key(s: &str) -> CacheKey {
        Fingerprint::new("test").field(s).finish()
    }

    fn parse_entry(k: &CacheKey) -> CacheEntry {
        CacheEntry::new(
            k.clone(),
            CachedValue::Parse(ParseOutcome::Parsed(ParsedModule::default())),
        )
    }

    #[test]
    fn fingerprint_is_stable_and_field_separated() {
        assert_eq!(key("abc"), key("abc"));
        assert_ne!(key("abc"), key("abd"));
        let a = Fingerprint::new("t").field("ab").field("c").finish();
        let b = Fingerprint::new("t").field("a").field("bc").finish();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn fingerprint_domain_matters() {
        let a = Fingerprint::new("parse").field("x").finish();
        let b = Fingerprint::new("analysis").field("x").finish();
        assert_ne!(a, b);
    }

    #[test]
    fn disk_round_trip_and_prune() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(dir.path().join("cache")).unwrap();
        let k1 = key("one");
        let k2 = key("two");
        cache.put(parse_entry(&k1)).unwrap();
        cache.put(parse_entry(&k2)).unwrap();
        assert!(cache.get(&k1).is_some());

        let live: HashSet<CacheKey> = [k1.clone()].into_iter().collect();
        assert_eq!(cache.prune(&live).unwrap(), 1);
        assert!(cache.get(&k1).is_some());
        assert!(cache.get(&k2).is_none());
    }

    #[test]
    fn corrupt_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(dir.path()).unwrap();
        let k = key("bad");
        std::fs::write(dir.path().join(k.file_name()), b"{ truncated").unwrap();
        assert!(cache.get(&k).is_none());
    }

    #[test]
    fn entry_under_wrong_key_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(dir.path()).unwrap();
        let real = key("real");
        let other = key("other");
        let bytes = serde_json::to_vec(&parse_entry(&real)).unwrap();
        std::fs::write(dir.path().join(other.file_name()), bytes).unwrap();
        assert!(cache.get(&other).is_none());
    }

    #[test]
    fn put_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(dir.path()).unwrap();
        cache.put(parse_entry(&key("a"))).unwrap();
        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].ends_with(".json"));
    }

    #[test]
    fn open_fails_when_path_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("occupied");
        std::fs::write(&file, b"x").unwrap();
        assert!(matches!(DiskCache::open(&file), Err(CacheError::Io { .. })));
    }

    #[test]
    fn clear_removes_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache");
        DiskCache::open(&path).unwrap();
        assert!(DiskCache::clear(&path).unwrap());
        assert!(!DiskCache::clear(&path).unwrap());
    }

    #[test]
    fn prune_only_touches_cache_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(dir.path()).unwrap();
        let live = key("live");
        let stale = key("stale");
        cache.put(parse_entry(&live)).unwrap();
        cache.put(parse_entry(&stale)).unwrap();
        std::fs::write(dir.path().join("package.json"), b"{}").unwrap();
        std::fs::write(dir.path().join("tsconfig.json"), b"{}").unwrap();
        std::fs::write(dir.path().join("ABCDEF.json"), b"{}").unwrap();
        std::fs::write(dir.path().join(".notes.tmp"), b"").unwrap();

        let keep: HashSet<CacheKey> = [live.clone()].into_iter().collect();
        assert_eq!(cache.prune(&keep).unwrap(), 1);
        assert!(cache.get(&live).is_some());
        assert!(cache.get(&stale).is_none());
        for name in ["package.json", "tsconfig.json", "ABCDEF.json", ".notes.tmp"] {
            assert!(dir.path().join(name).exists(), "{name} was deleted");
        }
    }

    #[test]
    fn prune_removes_own_temp_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(dir.path()).unwrap();
        let leftover = cache.temp_path(key("x").as_str());
        std::fs::write(&leftover, b"partial").unwrap();
        let other_pid = std::process::id().wrapping_add(1);
        let foreign = dir.path().join(format!(".{}.{other_pid}.2.tmp", key("y")));
        std::fs::write(&foreign, b"partial").unwrap();

        assert_eq!(cache.prune(&HashSet::new()).unwrap(), 1);
        assert!(!leftover.exists());
        assert!(foreign.exists());
    }

    #[test]
    fn clear_keeps_foreign_files_and_their_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(dir.path()).unwrap();
        let k = key("a");
        cache.put(parse_entry(&k)).unwrap();
        std::fs::write(dir.path().join("package.json"), b"{}").unwrap();

        assert!(DiskCache::clear(dir.path()).unwrap());
        assert!(!dir.path().join(k.file_name()).exists());
        assert!(dir.path().join("package.json").exists());
    }

    #[test]
    fn memory_cache_prune() {
        let cache = MemoryCache::new();
        let failed = CacheEntry::new(
            key("f"),
            CachedValue::Parse(ParseOutcome::Failed(ParseError::Encoding)),
        );
        cache.put(failed.clone()).unwrap();
        cache.put(parse_entry(&key("g"))).unwrap();
        assert_eq!(cache.get(&key("f")), Some(failed));

        let live: HashSet<CacheKey> = [key("g")].into_iter().collect();
        assert_eq!(cache.prune(&live).unwrap(), 1);
        assert_eq!(cache.len(), 1);
    }
}
