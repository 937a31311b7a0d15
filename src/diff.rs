//! Structural delta between a working manifest and its baseline.
//!
//! The diff is what the composer badges are rendered from: which keys were
//! added or removed, which languages changed inside a kept key, and, for
//! index entries with several versions, how each version moved.
//!
//! # Classification
//!
//! For each key in the union of both sides:
//!
//! | current | baseline | result |
//! |---------|----------|--------|
//! | yes     | no       | [`KeyDiff::Added`] |
//! | no      | yes      | [`KeyDiff::Removed`] |
//! | yes     | yes      | [`KeyDiff::Modified`] if any language differs, else not recorded |
//!
//! Order is reported separately through [`Diff::order_changed`]: a pure
//! reordering records no keys but still counts as a change.
//!
//! # Version lists
//!
//! Index languages may hold a list of versions. [`list_diff`] aligns the
//! current list against the baseline one element at a time. A positional
//! match is always tried before a search, and every baseline element can be
//! consumed by at most one current element (first current index wins):
//!
//! ```text
//! baseline  a b c
//! current   b a c d
//!           │ │ │ └ added
//!           │ │ └── unchanged (2)
//!           │ └──── moved from 0
//!           └────── moved from 1
//! ```

use crate::types::{Entry, Kind, LanguageValue, Manifest};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

/// Result of comparing a working manifest against its baseline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diff {
    pub has_changes: bool,
    pub order_changed: bool,
    /// Keys only in the working manifest, in working order.
    pub added_keys: Vec<String>,
    /// Keys only in the baseline, in baseline order.
    pub removed_keys: Vec<String>,
    /// Every key that differs in any way.
    pub keys: BTreeMap<String, KeyDiff>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum KeyDiff {
    Added,
    Removed,
    Modified {
        languages: BTreeMap<String, LanguageDiff>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum LanguageDiff {
    Added,
    Removed,
    /// A tabs language whose title and/or location changed.
    Tab {
        title_changed: bool,
        location_changed: bool,
    },
    /// An index language whose version list changed.
    Versions(VersionDiff),
}

/// Element-level diff of one index language value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VersionDiff {
    /// One record per position of the current list.
    pub entries: Vec<VersionEntry>,
    /// Baseline elements no current element matched.
    pub removed: Vec<RemovedVersion>,
    pub changed: bool,
    pub order_changed: bool,
    /// The value switched between a single location and a list.
    pub kind_changed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionEntry {
    pub value: String,
    pub status: VersionStatus,
    /// Baseline position this element was matched with, if any.
    pub prev_index: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum VersionStatus {
    Unchanged,
    Moved { from: usize },
    /// Replaced in place: the baseline element at the same position is gone.
    Changed,
    Added,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovedVersion {
    pub value: String,
    pub index: usize,
}

impl Diff {
    pub fn key(&self, key: &str) -> Option<&KeyDiff> {
        self.keys.get(key)
    }

    /// Keys recorded as modified (present on both sides).
    pub fn modified_keys(&self) -> impl Iterator<Item = &str> {
        self.keys
            .iter()
            .filter(|(_, d)| matches!(d, KeyDiff::Modified { .. }))
            .map(|(k, _)| k.as_str())
    }
}

impl KeyDiff {
    pub fn language(&self, lang: &str) -> Option<&LanguageDiff> {
        match self {
            KeyDiff::Modified { languages } => languages.get(lang),
            KeyDiff::Added | KeyDiff::Removed => None,
        }
    }
}

impl fmt::Display for Diff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.has_changes {
            return f.write_str("no changes");
        }
        let mut parts = Vec::new();
        let modified = self.modified_keys().count();
        if modified > 0 {
            parts.push(format!("{modified} modified"));
        }
        if !self.added_keys.is_empty() {
            parts.push(format!("{} added", self.added_keys.len()));
        }
        if !self.removed_keys.is_empty() {
            parts.push(format!("{} removed", self.removed_keys.len()));
        }
        if self.order_changed {
            parts.push("order changed".to_string());
        }
        f.write_str(&parts.join(", "))
    }
}

/// Compare `current` against `baseline`. Missing manifests count as empty.
pub fn diff(kind: Kind, current: Option<&Manifest>, baseline: Option<&Manifest>) -> Diff {
    let empty = Manifest::empty();
    let current = current.unwrap_or(&empty);
    let baseline = baseline.unwrap_or(&empty);

    let mut result = Diff {
        order_changed: current.order != baseline.order,
        ..Diff::default()
    };

    let mut seen = HashSet::new();
    let union = current
        .order
        .iter()
        .chain(baseline.order.iter())
        .filter(|k| seen.insert(k.as_str()));

    for key in union {
        match (current.get(key), baseline.get(key)) {
            (Some(_), None) => {
                result.added_keys.push(key.clone());
                result.keys.insert(key.clone(), KeyDiff::Added);
            }
            (None, Some(_)) => {
                result.removed_keys.push(key.clone());
                result.keys.insert(key.clone(), KeyDiff::Removed);
            }
            (Some(cur), Some(base)) => {
                let languages = diff_languages(kind, cur, base);
                if !languages.is_empty() {
                    result.keys.insert(key.clone(), KeyDiff::Modified { languages });
                }
            }
            (None, None) => {}
        }
    }

    result.has_changes = result.order_changed
        || !result.added_keys.is_empty()
        || !result.removed_keys.is_empty()
        || !result.keys.is_empty();
    result
}

fn diff_languages(kind: Kind, current: &Entry, baseline: &Entry) -> BTreeMap<String, LanguageDiff> {
    let langs: BTreeSet<&String> = current.keys().chain(baseline.keys()).collect();
    let mut out = BTreeMap::new();
    for lang in langs {
        let change = match (current.get(lang), baseline.get(lang)) {
            (None, Some(_)) => Some(LanguageDiff::Removed),
            (Some(_), None) => Some(LanguageDiff::Added),
            (Some(cur), Some(base)) => match kind {
                Kind::Tabs => diff_tab(cur, base),
                Kind::Index => {
                    let versions = diff_versions(cur, base);
                    if versions.changed {
                        Some(LanguageDiff::Versions(versions))
                    } else {
                        None
                    }
                }
            },
            (None, None) => None,
        };
        if let Some(change) = change {
            out.insert(lang.clone(), change);
        }
    }
    out
}

fn diff_tab(current: &LanguageValue, baseline: &LanguageValue) -> Option<LanguageDiff> {
    let (cur_title, cur_loc) = current.title_and_location();
    let (base_title, base_loc) = baseline.title_and_location();
    let title_changed = cur_title != base_title;
    let location_changed = cur_loc != base_loc;
    (title_changed || location_changed).then_some(LanguageDiff::Tab {
        title_changed,
        location_changed,
    })
}

/// Diff two index language values, treating scalars as singleton lists.
pub fn diff_versions(current: &LanguageValue, baseline: &LanguageValue) -> VersionDiff {
    let mut result = list_diff(&current.versions(), &baseline.versions());
    result.kind_changed = current.is_list() != baseline.is_list();
    result.changed |= result.kind_changed;
    result
}

/// Align `current` against `baseline` element by element.
pub fn list_diff(current: &[&str], baseline: &[&str]) -> VersionDiff {
    let mut matched = vec![false; baseline.len()];
    let mut entries = Vec::with_capacity(current.len());

    for (i, value) in current.iter().enumerate() {
        let (status, prev_index) = if i < baseline.len() && !matched[i] && baseline[i] == *value {
            matched[i] = true;
            (VersionStatus::Unchanged, Some(i))
        } else if let Some(j) = (0..baseline.len()).find(|&j| !matched[j] && baseline[j] == *value) {
            matched[j] = true;
            (VersionStatus::Moved { from: j }, Some(j))
        } else if i < baseline.len() {
            matched[i] = true;
            (VersionStatus::Changed, Some(i))
        } else {
            (VersionStatus::Added, None)
        };
        entries.push(VersionEntry {
            value: (*value).to_string(),
            status,
            prev_index,
        });
    }

    let removed: Vec<RemovedVersion> = baseline
        .iter()
        .enumerate()
        .filter(|(j, _)| !matched[*j])
        .map(|(index, value)| RemovedVersion {
            value: (*value).to_string(),
            index,
        })
        .collect();

    let any_moved = entries
        .iter()
        .any(|e| matches!(e.status, VersionStatus::Moved { .. }));
    let changed = current.len() != baseline.len()
        || entries.iter().any(|e| e.status != VersionStatus::Unchanged)
        || !removed.is_empty();
    let order_changed = any_moved || (current.len() == baseline.len() && current != baseline);

    VersionDiff {
        entries,
        removed,
        changed,
        order_changed,
        kind_changed: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;

    fn statuses(d: &VersionDiff) -> Vec<(VersionStatus, Option<usize>)> {
        d.entries.iter().map(|e| (e.status, e.prev_index)).collect()
    }

    // =========================================================================
    // List diff
    // =========================================================================

    #[test]
    fn list_diff_swap_and_append() {
        let d = list_diff(&["b", "a", "c", "d"], &["a", "b", "c"]);
        assert_eq!(
            statuses(&d),
            vec![
                (VersionStatus::Moved { from: 1 }, Some(1)),
                (VersionStatus::Moved { from: 0 }, Some(0)),
                (VersionStatus::Unchanged, Some(2)),
                (VersionStatus::Added, None),
            ]
        );
        assert!(d.removed.is_empty());
        assert!(d.changed);
        assert!(d.order_changed);
    }

    #[test]
    fn list_diff_identical_lists() {
        let d = list_diff(&["a", "b"], &["a", "b"]);
        assert!(!d.changed);
        assert!(!d.order_changed);
        assert!(d.removed.is_empty());
    }

    #[test]
    fn list_diff_in_place_replacement() {
        let d = list_diff(&["a", "x"], &["a", "b"]);
        assert_eq!(
            statuses(&d),
            vec![(VersionStatus::Unchanged, Some(0)), (VersionStatus::Changed, Some(1))]
        );
        assert!(d.removed.is_empty());
        assert!(d.changed);
    }

    #[test]
    fn list_diff_reports_dropped_tail() {
        let d = list_diff(&["a"], &["a", "b", "c"]);
        assert_eq!(
            d.removed,
            vec![
                RemovedVersion { value: "b".into(), index: 1 },
                RemovedVersion { value: "c".into(), index: 2 },
            ]
        );
        assert!(d.changed);
        assert!(!d.order_changed);
    }

    #[test]
    fn list_diff_baseline_element_consumed_once() {
        // Both current elements equal baseline[0]; only the first may claim it.
        let d = list_diff(&["a", "a"], &["a", "b"]);
        assert_eq!(
            statuses(&d),
            vec![(VersionStatus::Unchanged, Some(0)), (VersionStatus::Changed, Some(1))]
        );
    }

    #[test]
    fn list_diff_unmatched_element_claims_its_slot() {
        // "x" has no equal in the baseline, so it replaces baseline[0] and
        // "a" still matches positionally at 1.
        let d = list_diff(&["x", "a"], &["a", "a"]);
        assert_eq!(
            statuses(&d),
            vec![(VersionStatus::Changed, Some(0)), (VersionStatus::Unchanged, Some(1))]
        );
        assert!(d.removed.is_empty());
    }

    #[test]
    fn list_diff_positional_match_wins_over_search() {
        let d = list_diff(&["a"], &["a", "a"]);
        assert_eq!(statuses(&d), vec![(VersionStatus::Unchanged, Some(0))]);
        assert_eq!(d.removed, vec![RemovedVersion { value: "a".into(), index: 1 }]);
    }

    #[test]
    fn scalar_to_list_is_a_kind_change() {
        let d = diff_versions(
            &LanguageValue::Versions(vec!["a".into()]),
            &LanguageValue::Location("a".into()),
        );
        assert!(d.kind_changed);
        assert!(d.changed);
    }

    // =========================================================================
    // Manifest diff
    // =========================================================================

    #[test]
    fn identical_manifests_have_no_changes() {
        let m = index_manifest(&[("a", &[("en", "post/a.md")]), ("b", &[("fr", "post/b.md")])]);
        let d = diff(Kind::Index, Some(&m), Some(&m.clone()));
        assert!(!d.has_changes);
        assert!(d.keys.is_empty());
        assert_eq!(d.to_string(), "no changes");
    }

    #[test]
    fn missing_sides_count_as_empty() {
        assert!(!diff(Kind::Index, None, None).has_changes);
        let m = index_manifest(&[("a", &[("en", "post/a.md")])]);
        let d = diff(Kind::Index, Some(&m), None);
        assert_eq!(d.added_keys, vec!["a"]);
        let d = diff(Kind::Index, None, Some(&m));
        assert_eq!(d.removed_keys, vec!["a"]);
        assert_eq!(d.key("a"), Some(&KeyDiff::Removed));
    }

    #[test]
    fn pure_reordering_records_no_keys() {
        let base = index_manifest(&[
            ("a", &[("en", "a.md")]),
            ("b", &[("en", "b.md")]),
            ("c", &[("en", "c.md")]),
        ]);
        let mut cur = base.clone();
        cur.move_key("c", 0);
        let d = diff(Kind::Index, Some(&cur), Some(&base));
        assert!(d.order_changed);
        assert!(d.has_changes);
        assert!(d.keys.is_empty());
        assert_eq!(d.to_string(), "order changed");
    }

    #[test]
    fn language_removal_marks_key_modified() {
        let base = index_manifest(&[("a", &[("en", "a.md"), ("fr", "a-fr.md")])]);
        let mut cur = base.clone();
        cur.remove_language("a", "fr");
        let d = diff(Kind::Index, Some(&cur), Some(&base));
        let key = d.key("a").unwrap();
        assert!(matches!(key, KeyDiff::Modified { .. }));
        assert_eq!(key.language("fr"), Some(&LanguageDiff::Removed));
        assert_eq!(key.language("en"), None);
    }

    #[test]
    fn removing_last_language_keeps_key_modified() {
        let base = index_manifest(&[("a", &[("en", "a.md")])]);
        let mut cur = base.clone();
        cur.remove_language("a", "en");
        let d = diff(Kind::Index, Some(&cur), Some(&base));
        assert!(matches!(d.key("a"), Some(KeyDiff::Modified { .. })));
        assert!(d.removed_keys.is_empty());
    }

    #[test]
    fn added_and_removed_keys() {
        let base = index_manifest(&[("a", &[("en", "a.md")]), ("b", &[("en", "b.md")])]);
        let mut cur = base.clone();
        cur.remove("b");
        cur.insert("c", index_entry(&[("en", "c.md")]));
        let d = diff(Kind::Index, Some(&cur), Some(&base));
        assert_eq!(d.added_keys, vec!["c"]);
        assert_eq!(d.removed_keys, vec!["b"]);
        assert_eq!(d.key("c"), Some(&KeyDiff::Added));
        assert_eq!(d.to_string(), "1 added, 1 removed, order changed");
    }

    #[test]
    fn index_version_change_is_recorded() {
        let base = index_manifest(&[("a", &[("en", "v1.md")])]);
        let mut cur = base.clone();
        cur.set_language(
            "a",
            "en",
            LanguageValue::Versions(vec!["v2.md".into(), "v1.md".into()]),
        );
        let d = diff(Kind::Index, Some(&cur), Some(&base));
        match d.key("a").and_then(|k| k.language("en")) {
            Some(LanguageDiff::Versions(v)) => {
                assert!(v.kind_changed);
                // v2 takes v1's slot; v1 then finds no unmatched baseline element.
                assert_eq!(v.entries[0].status, VersionStatus::Changed);
                assert_eq!(v.entries[1].status, VersionStatus::Added);
                assert!(v.removed.is_empty());
            }
            other => panic!("expected version diff, got {other:?}"),
        }
    }

    #[test]
    fn tabs_flags_title_and_location_independently() {
        let base = tabs_manifest(&[("about", &[("en", "About", "tab/about.md")])]);
        let mut cur = base.clone();
        cur.set_language("about", "en", LanguageValue::tab("About us", "tab/about.md"));
        let d = diff(Kind::Tabs, Some(&cur), Some(&base));
        assert_eq!(
            d.key("about").and_then(|k| k.language("en")),
            Some(&LanguageDiff::Tab {
                title_changed: true,
                location_changed: false,
            })
        );
        assert_eq!(d.to_string(), "1 modified");

        cur.set_language("about", "en", LanguageValue::tab("About", "tab/about-v2.md"));
        let d = diff(Kind::Tabs, Some(&cur), Some(&base));
        assert_eq!(
            d.key("about").and_then(|k| k.language("en")),
            Some(&LanguageDiff::Tab {
                title_changed: false,
                location_changed: true,
            })
        );

        cur.set_language("about", "en", LanguageValue::tab("About us", "tab/about-v2.md"));
        let d = diff(Kind::Tabs, Some(&cur), Some(&base));
        assert_eq!(
            d.key("about").and_then(|k| k.language("en")),
            Some(&LanguageDiff::Tab {
                title_changed: true,
                location_changed: true,
            })
        );
    }

    #[test]
    fn tabs_language_added() {
        let base = tabs_manifest(&[("about", &[("en", "About", "tab/about.md")])]);
        let mut cur = base.clone();
        cur.set_language("about", "ja", LanguageValue::tab("概要", "tab/about-ja.md"));
        let d = diff(Kind::Tabs, Some(&cur), Some(&base));
        assert_eq!(
            d.key("about").and_then(|k| k.language("ja")),
            Some(&LanguageDiff::Added)
        );
    }
}
