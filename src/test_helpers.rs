//! Shared test utilities for the composer test suite.
//!
//! Builders for small manifests plus test doubles for the injected
//! collaborators (source, clock). Storage doubles live in
//! [`draft::MemoryStorage`](crate::draft::MemoryStorage) since hosts use it too.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let m = index_manifest(&[
//!     ("hello", &[("en", "post/hello/en.md"), ("zh", "post/hello/zh.md")]),
//!     ("about", &[("en", "post/about.md")]),
//! ]);
//! ```

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::source::{ManifestSource, SourceError};
use crate::sync::Clock;
use crate::types::{Entry, Kind, LanguageValue, Manifest};

// =========================================================================
// Manifest builders
// =========================================================================

/// Index entry with single-location languages.
pub fn index_entry(langs: &[(&str, &str)]) -> Entry {
    langs
        .iter()
        .map(|(lang, loc)| (lang.to_string(), LanguageValue::Location(loc.to_string())))
        .collect()
}

/// Index entry with one version-list language.
pub fn versions_entry(lang: &str, versions: &[&str]) -> Entry {
    Entry::from([(
        lang.to_string(),
        LanguageValue::Versions(versions.iter().map(|v| v.to_string()).collect()),
    )])
}

/// Tabs entry from `(lang, title, location)` triples.
pub fn tabs_entry(langs: &[(&str, &str, &str)]) -> Entry {
    langs
        .iter()
        .map(|(lang, title, loc)| (lang.to_string(), LanguageValue::tab(*title, *loc)))
        .collect()
}

pub fn index_manifest(entries: &[(&str, &[(&str, &str)])]) -> Manifest {
    let mut m = Manifest::empty();
    for (key, langs) in entries {
        m.insert(*key, index_entry(langs));
    }
    m
}

pub fn tabs_manifest(entries: &[(&str, &[(&str, &str, &str)])]) -> Manifest {
    let mut m = Manifest::empty();
    for (key, langs) in entries {
        m.insert(*key, tabs_entry(langs));
    }
    m
}

/// Keys only, each with an empty entry.
pub fn keys_manifest(keys: &[&str]) -> Manifest {
    let mut m = Manifest::empty();
    for key in keys {
        m.insert(*key, Entry::new());
    }
    m
}

// =========================================================================
// Collaborator doubles
// =========================================================================

/// Clock that only moves when told to. Clones share the same time.
#[derive(Clone)]
pub struct ManualClock(Rc<Cell<DateTime<Utc>>>);

impl ManualClock {
    pub fn new() -> Self {
        let start = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        Self(Rc::new(Cell::new(start)))
    }

    pub fn advance_ms(&self, ms: i64) {
        self.0.set(self.0.get() + TimeDelta::milliseconds(ms));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.0.get()
    }
}

/// Source serving canned documents per kind. Clones share responses, so a
/// test can change what the "remote" returns after handing it over.
#[derive(Clone, Default)]
pub struct FakeSource {
    responses: Rc<RefCell<HashMap<Kind, Result<Value, String>>>>,
    fetches: Rc<Cell<usize>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, kind: Kind, doc: Value) {
        self.responses.borrow_mut().insert(kind, Ok(doc));
    }

    pub fn serve_manifest(&self, kind: Kind, manifest: &Manifest) {
        self.serve(kind, serde_json::to_value(manifest).unwrap());
    }

    pub fn fail(&self, kind: Kind, message: &str) {
        self.responses
            .borrow_mut()
            .insert(kind, Err(message.to_string()));
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.get()
    }
}

impl ManifestSource for FakeSource {
    async fn fetch(&self, kind: Kind) -> Result<Value, SourceError> {
        self.fetches.set(self.fetches.get() + 1);
        match self.responses.borrow().get(&kind) {
            Some(Ok(doc)) => Ok(doc.clone()),
            Some(Err(message)) => Err(SourceError::Unavailable(message.clone())),
            None => Err(SourceError::Unavailable(format!("no {kind} manifest served"))),
        }
    }
}
