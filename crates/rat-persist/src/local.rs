//! # Local storage fallback
//!
//! The terminal tier. Entries live at `{base_dir}/{tenant}/{local_key}.json`,
//! one JSON document per record in the flat [`PendingLocalRecord`] shape.
//!
//! ## Key Layout
//!
//! A record with an id is keyed by that id, so a repeated offline save of the
//! same record overwrites its entry instead of adding a second one. A record
//! without an id gets `local-{epoch_millis}-{8 hex}`.
//!
//! Tenant and key become path segments through [`encode_segment`]: bytes
//! outside `[A-Za-z0-9._-]`, and a leading `.`, are written as `%XX`. The
//! encoding is injective, so two tenants never share a directory.
//!
//! ## Durability
//!
//! Every write goes to a temporary file in the target directory and is then
//! renamed over the entry, so a reader sees the old document or the new one.
//! Writers are serialized by a process-wide lock; read-modify-write updates
//! hold it across the read. Async callers go through [`run_blocking`] so the
//! lock and the `fsync` never stall a runtime worker.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rat_core::{PendingLocalRecord, Record, TenantId, Timestamp};

use crate::error::LocalStoreError;

/// Default root directory for local entries.
pub const DEFAULT_LOCAL_DIR: &str = ".rat-local";

const ENTRY_EXT: &str = "json";

// ---------------------------------------------------------------------------
// Path segments
// ---------------------------------------------------------------------------

/// Encode an arbitrary string as a single safe path segment.
pub fn encode_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for (i, b) in raw.bytes().enumerate() {
        let safe = b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || (b == b'.' && i > 0);
        if safe {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

/// Storage key for a record saved at `saved_at`.
pub fn key_for(record: &Record, saved_at: Timestamp) -> String {
    match &record.id {
        Some(id) => id.as_str().to_string(),
        None => {
            let suffix = uuid::Uuid::new_v4().simple().to_string();
            format!("local-{}-{}", saved_at.epoch_millis(), &suffix[..8])
        }
    }
}

// ---------------------------------------------------------------------------
// LocalStore
// ---------------------------------------------------------------------------

/// Filesystem-backed store for records no remote tier accepted.
#[derive(Debug)]
pub struct LocalStore {
    base_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl LocalStore {
    /// The directory is created on first write.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn tenant_dir(&self, tenant: &TenantId) -> PathBuf {
        self.base_dir.join(encode_segment(tenant.as_str()))
    }

    fn entry_path(&self, tenant: &TenantId, key: &str) -> PathBuf {
        self.tenant_dir(tenant)
            .join(format!("{}.{ENTRY_EXT}", encode_segment(key)))
    }

    /// Write `entry` under its tenant and key, replacing any previous entry.
    pub fn put(&self, entry: &PendingLocalRecord) -> Result<PathBuf, LocalStoreError> {
        let _guard = self.write_lock.lock();
        self.write_entry(entry)
    }

    fn write_entry(&self, entry: &PendingLocalRecord) -> Result<PathBuf, LocalStoreError> {
        let dir = self.tenant_dir(entry.tenant_id());
        fs::create_dir_all(&dir).map_err(|source| LocalStoreError::Io {
            path: dir.clone(),
            source,
        })?;
        let path = self.entry_path(entry.tenant_id(), &entry.local_key);

        let bytes = serde_json::to_vec_pretty(entry).map_err(|e| LocalStoreError::Corrupt {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        let io_err = |source| LocalStoreError::Io {
            path: path.clone(),
            source,
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err)?;
        tmp.write_all(&bytes).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&path).map_err(|e| io_err(e.error))?;
        Ok(path)
    }

    /// Read one entry. `Ok(None)` when no entry exists under `key`.
    pub fn get(
        &self,
        tenant: &TenantId,
        key: &str,
    ) -> Result<Option<PendingLocalRecord>, LocalStoreError> {
        read_entry(&self.entry_path(tenant, key))
    }

    /// Every entry in the tenant's partition, oldest first. Documents that
    /// fail to parse are skipped with a warning.
    pub fn list(&self, tenant: &TenantId) -> Result<Vec<PendingLocalRecord>, LocalStoreError> {
        let dir = self.tenant_dir(tenant);
        let read_dir = match fs::read_dir(&dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(LocalStoreError::Io { path: dir, source }),
        };

        let mut entries = Vec::new();
        for item in read_dir {
            let item = item.map_err(|source| LocalStoreError::Io {
                path: dir.clone(),
                source,
            })?;
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXT) {
                continue;
            }
            match read_entry(&path) {
                Ok(Some(entry)) if entry.tenant_id() == tenant => entries.push(entry),
                Ok(Some(entry)) => tracing::warn!(
                    path = %path.display(),
                    found = %entry.tenant_id(),
                    "local entry belongs to another tenant, skipping"
                ),
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "skipping unreadable local entry"),
            }
        }
        entries.sort_by(|a, b| {
            a.saved_at
                .cmp(&b.saved_at)
                .then_with(|| a.local_key.cmp(&b.local_key))
        });
        Ok(entries)
    }

    /// Entries still awaiting a remote store.
    pub fn list_pending(
        &self,
        tenant: &TenantId,
    ) -> Result<Vec<PendingLocalRecord>, LocalStoreError> {
        Ok(self
            .list(tenant)?
            .into_iter()
            .filter(|e| e.sync_pending)
            .collect())
    }

    /// Read-modify-write one entry under the write lock. `f` returns whether
    /// the modified entry should be written back.
    fn update<F>(
        &self,
        tenant: &TenantId,
        key: &str,
        f: F,
    ) -> Result<Option<PendingLocalRecord>, LocalStoreError>
    where
        F: FnOnce(&mut PendingLocalRecord) -> bool,
    {
        let _guard = self.write_lock.lock();
        let Some(mut entry) = read_entry(&self.entry_path(tenant, key))? else {
            return Ok(None);
        };
        if f(&mut entry) {
            self.write_entry(&entry)?;
        }
        Ok(Some(entry))
    }

    /// Record that a remote store accepted `replayed` as `stored`.
    ///
    /// The entry on disk is only marked when it still holds what was
    /// replayed. If a later save rewrote it in the meantime, it is returned
    /// untouched and still pending, so the newer content gets its own replay.
    pub fn mark_synced(
        &self,
        replayed: &PendingLocalRecord,
        stored: Record,
    ) -> Result<Option<PendingLocalRecord>, LocalStoreError> {
        self.update(replayed.tenant_id(), &replayed.local_key, |e| {
            let unchanged = e.sync_pending
                && e.saved_at == replayed.saved_at
                && e.record == replayed.record;
            if unchanged {
                e.mark_synced(stored);
            }
            unchanged
        })
    }

    /// Count a failed replay; the entry stays pending.
    pub fn record_sync_failure(
        &self,
        tenant: &TenantId,
        key: &str,
        reason: &str,
    ) -> Result<Option<PendingLocalRecord>, LocalStoreError> {
        self.update(tenant, key, |e| {
            e.record_failure(reason);
            true
        })
    }

    /// Delete entries a remote store has confirmed. Returns how many were
    /// removed. Pending entries are never touched.
    pub fn purge_synced(&self, tenant: &TenantId) -> Result<usize, LocalStoreError> {
        let _guard = self.write_lock.lock();
        let mut removed = 0;
        for entry in self.list(tenant)?.into_iter().filter(|e| !e.sync_pending) {
            let path = self.entry_path(tenant, &entry.local_key);
            fs::remove_file(&path).map_err(|source| LocalStoreError::Io { path, source })?;
            removed += 1;
        }
        Ok(removed)
    }
}

/// Run `op` against `store` on tokio's blocking pool.
pub async fn run_blocking<T, F>(store: &Arc<LocalStore>, op: F) -> Result<T, LocalStoreError>
where
    F: FnOnce(&LocalStore) -> Result<T, LocalStoreError> + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || op(&store))
        .await
        .map_err(|e| LocalStoreError::Task(e.to_string()))?
}

fn read_entry(path: &Path) -> Result<Option<PendingLocalRecord>, LocalStoreError> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(LocalStoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| LocalStoreError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rat_core::RecordId;

    fn acme() -> TenantId {
        TenantId::new("acme").unwrap()
    }

    fn pending(key: &str, millis: i64) -> PendingLocalRecord {
        let record = Record::new(acme()).with_activity_name(key);
        PendingLocalRecord::pending(record, key, Timestamp::from_epoch_millis(millis).unwrap())
    }

    #[test]
    fn encode_segment_keeps_safe_names() {
        assert_eq!(encode_segment("acme-cl_01.v2"), "acme-cl_01.v2");
    }

    #[test]
    fn encode_segment_escapes_traversal() {
        assert_eq!(encode_segment("../etc"), "%2E.%2Fetc");
        assert_eq!(encode_segment("a/b"), "a%2Fb");
        assert_ne!(encode_segment("a/b"), encode_segment("a_b"));
    }

    proptest! {
        #[test]
        fn encoded_segment_is_a_single_safe_component(raw in "\\PC{1,40}") {
            let seg = encode_segment(&raw);
            prop_assert!(!seg.starts_with('.'));
            prop_assert!(seg
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b"._-%".contains(&b)));
        }

        #[test]
        fn encoding_is_injective(a in "[a-z/._%]{1,8}", b in "[a-z/._%]{1,8}") {
            prop_assume!(a != b);
            prop_assert_ne!(encode_segment(&a), encode_segment(&b));
        }
    }

    #[test]
    fn key_uses_record_id_when_present() {
        let r = Record::new(acme()).with_id(RecordId::new("db-9").unwrap());
        assert_eq!(key_for(&r, Timestamp::now()), "db-9");
    }

    #[test]
    fn generated_key_has_time_and_suffix() {
        let at = Timestamp::from_epoch_millis(1_700_000_000_000).unwrap();
        let key = key_for(&Record::new(acme()), at);
        assert!(key.starts_with("local-1700000000000-"));
        assert_eq!(key.len(), "local-1700000000000-".len() + 8);
        assert_ne!(key, key_for(&Record::new(acme()), at));
    }

    #[test]
    fn put_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        let entry = pending("local-1-aaaaaaaa", 1);
        let path = store.put(&entry).unwrap();
        assert!(path.starts_with(dir.path().join("acme")));
        assert_eq!(store.get(&acme(), "local-1-aaaaaaaa").unwrap(), Some(entry));
        assert_eq!(store.get(&acme(), "missing").unwrap(), None);
    }

    #[test]
    fn list_is_tenant_scoped_and_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        store.put(&pending("b", 20)).unwrap();
        store.put(&pending("a", 10)).unwrap();

        let other = TenantId::new("globex").unwrap();
        let foreign = PendingLocalRecord::pending(Record::new(other.clone()), "c", Timestamp::now());
        store.put(&foreign).unwrap();

        let keys: Vec<_> = store
            .list(&acme())
            .unwrap()
            .into_iter()
            .map(|e| e.local_key)
            .collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(store.list(&other).unwrap().len(), 1);
    }

    #[test]
    fn list_of_unknown_tenant_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("never-created"));
        assert!(store.list(&acme()).unwrap().is_empty());
    }

    #[test]
    fn corrupt_entry_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        store.put(&pending("good", 1)).unwrap();
        fs::write(dir.path().join("acme").join("bad.json"), b"{not json").unwrap();
        assert_eq!(store.list(&acme()).unwrap().len(), 1);
    }

    #[test]
    fn mark_synced_then_purge() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        store.put(&pending("k1", 1)).unwrap();
        store.put(&pending("k2", 2)).unwrap();

        let replayed = store.get(&acme(), "k1").unwrap().unwrap();
        let stored = Record::new(acme()).with_id(RecordId::new("db-1").unwrap());
        let synced = store.mark_synced(&replayed, stored).unwrap().unwrap();
        assert!(!synced.sync_pending);
        assert_eq!(synced.remote_id.unwrap().as_str(), "db-1");

        assert_eq!(store.list_pending(&acme()).unwrap().len(), 1);
        assert_eq!(store.purge_synced(&acme()).unwrap(), 1);
        assert_eq!(store.list(&acme()).unwrap().len(), 1);
        assert!(store.get(&acme(), "k2").unwrap().unwrap().sync_pending);
    }

    #[test]
    fn sync_failure_is_counted() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        store.put(&pending("k1", 1)).unwrap();
        store.record_sync_failure(&acme(), "k1", "503").unwrap();
        let e = store
            .record_sync_failure(&acme(), "k1", "timeout")
            .unwrap()
            .unwrap();
        assert_eq!(e.sync_attempts, 2);
        assert_eq!(e.last_error.as_deref(), Some("timeout"));
        assert!(e.sync_pending);
    }

    #[test]
    fn update_of_missing_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        let stored = Record::new(acme());
        assert!(store.mark_synced(&pending("nope", 1), stored).unwrap().is_none());
    }

    #[test]
    fn mark_synced_leaves_rewritten_entry_pending() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        let first = pending("k1", 1);
        store.put(&first).unwrap();

        let newer = PendingLocalRecord::pending(
            Record::new(acme()).with_activity_name("edited again"),
            "k1",
            Timestamp::from_epoch_millis(2).unwrap(),
        );
        store.put(&newer).unwrap();

        let stored = Record::new(acme()).with_id(RecordId::new("db-1").unwrap());
        let after = store.mark_synced(&first, stored).unwrap().unwrap();
        assert!(after.sync_pending);
        assert_eq!(after, newer);
        assert_eq!(store.get(&acme(), "k1").unwrap(), Some(newer));
    }

    #[tokio::test]
    async fn run_blocking_reaches_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalStore::new(dir.path()));
        let entry = pending("k1", 1);
        let put = entry.clone();
        run_blocking(&store, move |s| s.put(&put)).await.unwrap();
        let listed = run_blocking(&store, |s| s.list_pending(&acme())).await.unwrap();
        assert_eq!(listed, vec![entry]);
    }
}
