//! Persisted drafts of unsynced edits.
//!
//! Both manifest kinds share one JSON blob under a single storage key:
//!
//! ```text
//! {
//!   "index": { "savedAt": 1700000000000, "data": {...}, "baselineSignature": "9f2c..." },
//!   "tabs":  { ... }
//! }
//! ```
//!
//! A missing kind means "no draft". The blob is removed entirely once both
//! kinds are gone.
//!
//! ## Fail-soft storage
//!
//! Browsers throw on quota, disabled storage and privacy modes; disks fill
//! up. None of that may interrupt editing, so every [`DraftStore`] operation
//! swallows [`StorageError`]s after logging them and the caller carries on
//! with in-memory state only. Corrupt or foreign blobs load as "no drafts".

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::normalize::{normalize, renormalize};
use crate::signature::{Signature, signature};
use crate::types::{Kind, Manifest};

/// Storage key used when the config does not name one.
pub const DEFAULT_STORAGE_KEY: &str = "ns_composer_drafts_v1";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Synchronous key-value persistence primitive (localStorage-shaped).
pub trait Storage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

impl<T: Storage + ?Sized> Storage for Rc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}

/// In-memory storage. Can be switched off to emulate a browser refusing
/// writes.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RefCell<HashMap<String, String>>,
    unavailable: Cell<bool>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// While unavailable every operation fails with [`StorageError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.set(unavailable);
    }

    /// Raw stored value, bypassing availability.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.items.borrow().get(key).cloned()
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.unavailable.get() {
            Err(StorageError::Unavailable("storage disabled".into()))
        } else {
            Ok(())
        }
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check()?;
        Ok(self.items.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check()?;
        self.items
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check()?;
        self.items.borrow_mut().remove(key);
        Ok(())
    }
}

/// One `<dir>/<key>.json` file per storage key.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.path_for(key), value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// A persisted snapshot of one kind's working state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub saved_at: DateTime<Utc>,
    pub data: Manifest,
    /// Signature of the baseline the snapshot was edited against.
    pub baseline_signature: Signature,
}

/// Drafts for both kinds, as stored in the blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Drafts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<Draft>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tabs: Option<Draft>,
}

impl Drafts {
    pub fn get(&self, kind: Kind) -> Option<&Draft> {
        match kind {
            Kind::Index => self.index.as_ref(),
            Kind::Tabs => self.tabs.as_ref(),
        }
    }

    fn slot(&mut self, kind: Kind) -> &mut Option<Draft> {
        match kind {
            Kind::Index => &mut self.index,
            Kind::Tabs => &mut self.tabs,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_none() && self.tabs.is_none()
    }
}

/// Reads and writes [`Drafts`] through a [`Storage`] primitive.
#[derive(Debug)]
pub struct DraftStore<P> {
    storage: P,
    key: String,
}

impl<P: Storage> DraftStore<P> {
    pub fn new(storage: P, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    pub fn storage(&self) -> &P {
        &self.storage
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Persist `manifest` as the draft for `kind`, stamped with the
    /// signature of `baseline`. Returns the draft even when persisting
    /// failed, so callers can keep its metadata in memory.
    pub fn save(
        &self,
        kind: Kind,
        manifest: &Manifest,
        baseline: Option<&Manifest>,
        now: DateTime<Utc>,
    ) -> Draft {
        let draft = Draft {
            saved_at: now,
            data: renormalize(kind, manifest),
            baseline_signature: signature(kind, baseline),
        };
        let mut drafts = self.load();
        *drafts.slot(kind) = Some(draft.clone());
        self.write(&drafts);
        debug!("Saved {} draft ({} entries)", kind, draft.data.len());
        draft
    }

    /// All stored drafts. Missing, unreadable or malformed data yields an
    /// empty set; a malformed entry for one kind does not hide the other.
    pub fn load(&self) -> Drafts {
        let raw = match self.storage.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Drafts::default(),
            Err(e) => {
                warn!("Could not read drafts: {e}");
                return Drafts::default();
            }
        };
        let Ok(Value::Object(blob)) = serde_json::from_str::<Value>(&raw) else {
            return Drafts::default();
        };
        let mut drafts = Drafts::default();
        for kind in Kind::ALL {
            *drafts.slot(kind) = blob.get(kind.as_str()).and_then(|v| parse_draft(kind, v));
        }
        drafts
    }

    /// Forget the draft for `kind`.
    pub fn clear(&self, kind: Kind) {
        let mut drafts = self.load();
        if drafts.slot(kind).take().is_none() {
            return;
        }
        self.write(&drafts);
        debug!("Cleared {} draft", kind);
    }

    fn write(&self, drafts: &Drafts) {
        let result = if drafts.is_empty() {
            self.storage.remove(&self.key)
        } else {
            match serde_json::to_string(drafts) {
                Ok(json) => self.storage.set(&self.key, &json),
                Err(e) => {
                    warn!("Could not serialize drafts: {e}");
                    return;
                }
            }
        };
        if let Err(e) = result {
            warn!("Could not persist drafts, keeping them in memory only: {e}");
        }
    }
}

fn parse_draft(kind: Kind, value: &Value) -> Option<Draft> {
    let obj = value.as_object()?;
    let data = obj.get("data")?;
    let saved_at = obj
        .get("savedAt")
        .and_then(Value::as_i64)
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_default();
    let baseline_signature = obj
        .get("baselineSignature")
        .and_then(Value::as_str)
        .map(|s| Signature::from(s.to_string()))
        .unwrap_or_default();
    Some(Draft {
        saved_at,
        data: normalize(kind, data),
        baseline_signature,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use tempfile::TempDir;

    fn store() -> DraftStore<Rc<MemoryStorage>> {
        DraftStore::new(Rc::new(MemoryStorage::new()), DEFAULT_STORAGE_KEY)
    }

    fn now() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
    }

    #[test]
    fn save_then_load_roundtrip() {
        let s = store();
        let base = index_manifest(&[("a", &[("en", "a.md")])]);
        let mut edited = base.clone();
        edited.insert("b", versions_entry("en", &["b2.md", "b.md"]));

        let saved = s.save(Kind::Index, &edited, Some(&base), now());
        let loaded = s.load();
        let draft = loaded.get(Kind::Index).unwrap();

        assert_eq!(draft.data, edited);
        assert_eq!(draft.saved_at, now());
        assert_eq!(draft.baseline_signature, signature(Kind::Index, Some(&base)));
        assert_eq!(*draft, saved);
        assert!(loaded.get(Kind::Tabs).is_none());
    }

    #[test]
    fn persisted_layout_uses_camel_case_fields() {
        let s = store();
        s.save(Kind::Tabs, &tabs_manifest(&[]), None, now());
        let raw: Value = serde_json::from_str(&s.storage().raw(DEFAULT_STORAGE_KEY).unwrap()).unwrap();
        let tabs = &raw["tabs"];
        assert_eq!(tabs["savedAt"], 1_700_000_000_000_i64);
        assert_eq!(tabs["baselineSignature"], "");
        assert!(tabs["data"].is_object());
        assert!(raw.get("index").is_none());
    }

    #[test]
    fn clear_removes_blob_when_last_kind_goes() {
        let s = store();
        let m = index_manifest(&[("a", &[("en", "a.md")])]);
        s.save(Kind::Index, &m, None, now());
        s.save(Kind::Tabs, &tabs_manifest(&[]), None, now());

        s.clear(Kind::Index);
        assert!(s.load().get(Kind::Index).is_none());
        assert!(s.load().get(Kind::Tabs).is_some());

        s.clear(Kind::Tabs);
        assert!(s.storage().raw(DEFAULT_STORAGE_KEY).is_none());
    }

    #[test]
    fn corrupt_blob_loads_empty() {
        let s = store();
        s.storage().set(DEFAULT_STORAGE_KEY, "{not json").unwrap();
        assert!(s.load().is_empty());
        s.storage().set(DEFAULT_STORAGE_KEY, "[1,2,3]").unwrap();
        assert!(s.load().is_empty());
    }

    #[test]
    fn malformed_kind_does_not_hide_the_other() {
        let s = store();
        s.storage()
            .set(
                DEFAULT_STORAGE_KEY,
                r#"{"index": 5, "tabs": {"savedAt": 1, "data": {"about": {"en": "tab/about.md"}}}}"#,
            )
            .unwrap();
        let drafts = s.load();
        assert!(drafts.get(Kind::Index).is_none());
        let tabs = drafts.get(Kind::Tabs).unwrap();
        assert_eq!(tabs.data.order, vec!["about"]);
        assert!(tabs.baseline_signature.is_empty());
    }

    #[test]
    fn unavailable_storage_is_a_no_op() {
        let s = store();
        s.storage().set_unavailable(true);
        let m = index_manifest(&[("a", &[("en", "a.md")])]);
        let draft = s.save(Kind::Index, &m, None, now());
        assert_eq!(draft.data, m);
        assert!(s.load().is_empty());
        s.clear(Kind::Index);

        s.storage().set_unavailable(false);
        assert!(s.storage().raw(DEFAULT_STORAGE_KEY).is_none());
    }

    #[test]
    fn file_storage_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let s = DraftStore::new(FileStorage::new(tmp.path().join("drafts")), "composer");
        let m = tabs_manifest(&[("about", &[("en", "About", "tab/about.md")])]);

        s.save(Kind::Tabs, &m, Some(&m), now());
        assert!(tmp.path().join("drafts/composer.json").is_file());
        assert_eq!(s.load().get(Kind::Tabs).unwrap().data, m);

        s.clear(Kind::Tabs);
        assert!(!tmp.path().join("drafts/composer.json").exists());
        assert!(s.load().is_empty());
    }
}
