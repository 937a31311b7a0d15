//! Deterministic manifest fingerprints for drift detection.
//!
//! A signature covers both content and order. The manifest is first written
//! in a canonical form, then hashed:
//!
//! ```text
//! [ ["order", [k1, k2, ...]],
//!   [key, [[lang, "single"|"list", values] ...]],   // index
//!   [key, [[lang, title, location] ...]],           // tabs
//!   ... ]
//! ```
//!
//! Entry keys are sorted lexicographically and languages are sorted, so two
//! structurally equal manifests sign identically no matter how they were
//! built. Signatures are only ever compared, never parsed.

use crate::types::{Kind, LanguageValue, Manifest};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::fmt;

/// Opaque fingerprint of a manifest. Empty means "no manifest".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Signature {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sign a manifest. `None` yields the empty signature.
pub fn signature(kind: Kind, manifest: Option<&Manifest>) -> Signature {
    let Some(manifest) = manifest else {
        return Signature::empty();
    };
    let canonical = canonical_form(kind, manifest).to_string();
    let mut hasher = Sha256::new();
    hasher.update(kind.as_str().as_bytes());
    hasher.update(b"\0");
    hasher.update(canonical.as_bytes());
    Signature(format!("{:x}", hasher.finalize()))
}

fn canonical_form(kind: Kind, manifest: &Manifest) -> Value {
    let mut keys: Vec<&String> = manifest.entries.keys().collect();
    keys.sort();

    let mut parts = Vec::with_capacity(keys.len() + 1);
    parts.push(json!(["order", manifest.order]));
    for key in keys {
        let langs: Vec<Value> = manifest.entries[key]
            .iter()
            .map(|(lang, value)| language_form(kind, lang, value))
            .collect();
        parts.push(json!([key, langs]));
    }
    Value::Array(parts)
}

fn language_form(kind: Kind, lang: &str, value: &LanguageValue) -> Value {
    match kind {
        Kind::Index => {
            let shape = if value.is_list() { "list" } else { "single" };
            json!([lang, shape, value.versions()])
        }
        Kind::Tabs => {
            let (title, location) = value.title_and_location();
            json!([lang, title, location])
        }
    }
}
