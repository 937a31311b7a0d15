//! Manifest data model shared by every stage of the composer.
//!
//! A [`Manifest`] is always produced by [`normalize`](crate::normalize::normalize),
//! so the invariants documented on it hold for every value the rest of the
//! crate sees. Editing helpers keep those invariants while the author works.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Which of the two site manifests a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    /// Post listings per language (`index.yaml`).
    Index,
    /// Static page listings per language (`tabs.yaml`).
    Tabs,
}

impl Kind {
    pub const ALL: [Kind; 2] = [Kind::Index, Kind::Tabs];

    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Index => "index",
            Kind::Tabs => "tabs",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The value stored for one language of an entry.
///
/// Index manifests hold either a single content location or a list of
/// versions (most preferred first). Tabs manifests hold a titled location.
/// Serialized untagged, matching the raw manifest files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LanguageValue {
    Location(String),
    Versions(Vec<String>),
    Tab { title: String, location: String },
}

impl LanguageValue {
    pub fn tab(title: impl Into<String>, location: impl Into<String>) -> Self {
        LanguageValue::Tab {
            title: title.into(),
            location: location.into(),
        }
    }

    /// The value seen as a version list. Scalars are singleton lists.
    pub fn versions(&self) -> Vec<&str> {
        match self {
            LanguageValue::Location(loc) => vec![loc.as_str()],
            LanguageValue::Versions(list) => list.iter().map(String::as_str).collect(),
            LanguageValue::Tab { location, .. } => vec![location.as_str()],
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, LanguageValue::Versions(_))
    }

    /// `(title, location)` view used for tabs comparisons.
    pub fn title_and_location(&self) -> (&str, &str) {
        match self {
            LanguageValue::Tab { title, location } => (title, location),
            LanguageValue::Location(loc) => ("", loc),
            LanguageValue::Versions(list) => ("", list.first().map(String::as_str).unwrap_or("")),
        }
    }
}

/// Language code → value. Languages are kept sorted.
pub type Entry = BTreeMap<String, LanguageValue>;

/// Canonical ordered manifest.
///
/// Invariants (established by the normalizer, kept by the editing helpers):
/// - `order` has no duplicates
/// - every key in `order` has an entry, and every entry is listed in `order`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub order: Vec<String>,
    pub entries: HashMap<String, Entry>,
}

impl Manifest {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Entry> {
        self.entries.get_mut(key)
    }

    /// Entries in manifest order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Entry)> {
        self.order
            .iter()
            .filter_map(|key| self.entries.get(key).map(|entry| (key.as_str(), entry)))
    }

    /// Insert or replace an entry. New keys are appended to the order.
    pub fn insert(&mut self, key: impl Into<String>, entry: Entry) {
        let key = key.into();
        if !self.entries.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.entries.insert(key, entry);
    }

    /// Insert a new entry at the front of the order, the way the composer
    /// adds freshly created posts and tabs. An existing key is moved.
    pub fn insert_first(&mut self, key: impl Into<String>, entry: Entry) {
        let key = key.into();
        self.order.retain(|k| *k != key);
        self.order.insert(0, key.clone());
        self.entries.insert(key, entry);
    }

    pub fn remove(&mut self, key: &str) -> Option<Entry> {
        self.order.retain(|k| k != key);
        self.entries.remove(key)
    }

    /// Move `key` to position `to` (clamped to the end). Returns false when
    /// the key is unknown.
    pub fn move_key(&mut self, key: &str, to: usize) -> bool {
        let Some(from) = self.order.iter().position(|k| k == key) else {
            return false;
        };
        let key = self.order.remove(from);
        let to = to.min(self.order.len());
        self.order.insert(to, key);
        true
    }

    /// Set one language value of an existing entry.
    pub fn set_language(&mut self, key: &str, lang: impl Into<String>, value: LanguageValue) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.insert(lang.into(), value);
                true
            }
            None => false,
        }
    }

    /// Drop one language from an entry. The entry itself stays addressable
    /// even when it has no languages left.
    pub fn remove_language(&mut self, key: &str, lang: &str) -> Option<LanguageValue> {
        self.entries.get_mut(key)?.remove(lang)
    }
}
