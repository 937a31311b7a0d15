//! Coerces untrusted manifest documents into a canonical [`Manifest`].
//!
//! Two input layouts are understood:
//!
//! ```text
//! nested:  { "order": ["a", "b"], "entries": { "a": {...}, "b": {...} } }
//! flat:    { "__order": ["a", "b"], "a": {...}, "b": {...} }
//! ```
//!
//! The nested layout is what this crate serializes (drafts); the flat layout
//! is what the site's `index.yaml` / `tabs.yaml` look like once parsed. Any
//! other shape degrades to an empty manifest. Normalization never fails.

use crate::types::{Entry, Kind, LanguageValue, Manifest};
use serde_json::{Map, Value};
use std::collections::HashSet;

const ORDER_KEYS: [&str; 2] = ["order", "__order"];

/// Build a canonical manifest from any JSON value.
pub fn normalize(kind: Kind, raw: &Value) -> Manifest {
    let Value::Object(doc) = raw else {
        return Manifest::empty();
    };

    let (declared_order, entries, nested) = split_document(doc);
    let is_entry_key = |key: &str| !key.is_empty() && (nested || !ORDER_KEYS.contains(&key));

    let mut seen = HashSet::new();
    let mut order = Vec::new();
    let declared = declared_order
        .into_iter()
        .flat_map(|list| list.iter())
        .filter_map(Value::as_str);
    for key in declared.chain(entries.keys().map(String::as_str)) {
        if is_entry_key(key) && seen.insert(key) {
            order.push(key.to_string());
        }
    }

    let entries = order
        .iter()
        .map(|key| {
            let entry = entries
                .get(key)
                .map(|value| normalize_entry(kind, value))
                .unwrap_or_default();
            (key.clone(), entry)
        })
        .collect();

    Manifest { order, entries }
}

/// Serialize a manifest to the nested layout and normalize it back.
/// Used whenever a manifest is cloned out of untrusted hands (drafts).
pub fn renormalize(kind: Kind, manifest: &Manifest) -> Manifest {
    match serde_json::to_value(manifest) {
        Ok(value) => normalize(kind, &value),
        Err(_) => Manifest::empty(),
    }
}

/// Pick the order list and the entry map out of either layout. The nested
/// layout is only recognised when the document holds an order list plus
/// `entries` and nothing else, so a flat manifest may still have a post
/// named `entries`.
fn split_document(doc: &Map<String, Value>) -> (Option<&Vec<Value>>, &Map<String, Value>, bool) {
    let order = ORDER_KEYS
        .iter()
        .find_map(|k| doc.get(*k).and_then(Value::as_array));
    let only_nested_keys = doc
        .keys()
        .all(|k| k == "entries" || ORDER_KEYS.contains(&k.as_str()));
    match doc.get("entries") {
        Some(Value::Object(entries)) if only_nested_keys && order.is_some() => {
            (order, entries, true)
        }
        _ => (order, doc, false),
    }
}

fn normalize_entry(kind: Kind, value: &Value) -> Entry {
    let Value::Object(langs) = value else {
        return Entry::new();
    };
    langs
        .iter()
        .filter(|(lang, _)| !lang.is_empty())
        .map(|(lang, v)| {
            let value = match kind {
                Kind::Index => index_value(v),
                Kind::Tabs => tab_value(v),
            };
            (lang.clone(), value)
        })
        .collect()
}

fn index_value(value: &Value) -> LanguageValue {
    match value {
        Value::Array(items) => LanguageValue::Versions(items.iter().map(index_location).collect()),
        other => LanguageValue::Location(index_location(other)),
    }
}

/// Objects carry their location in `location` or, in older files, `path`.
fn index_location(value: &Value) -> String {
    match value {
        Value::Object(obj) => obj
            .get("location")
            .or_else(|| obj.get("path"))
            .map(coerce)
            .unwrap_or_default(),
        other => coerce(other),
    }
}

fn tab_value(value: &Value) -> LanguageValue {
    match value {
        Value::Object(obj) => LanguageValue::Tab {
            title: obj.get("title").map(coerce).unwrap_or_default(),
            location: obj.get("location").map(coerce).unwrap_or_default(),
        },
        other => LanguageValue::Tab {
            title: String::new(),
            location: coerce(other),
        },
    }
}

fn coerce(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items.iter().map(coerce).collect::<Vec<_>>().join(","),
        Value::Object(_) => String::new(),
    }
}
