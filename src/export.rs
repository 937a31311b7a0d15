//! YAML rendering of a manifest in the layout the site loader reads.
//!
//! Output is written by hand rather than through `serde_yaml` so the file
//! stays diff-friendly: manifest key order, preferred languages first,
//! bare location scalars and a schema comment for editor tooling.
//!
//! ```yaml
//! # yaml-language-server: $schema=../assets/schema/index.json
//!
//! hello:
//!   en:
//!     - post/hello/en-v2.md
//!     - post/hello/en.md
//!   zh: post/hello/zh.md
//! ```

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::types::{Entry, Kind, LanguageValue, Manifest};

const EMPTY: &str = "\"\"";

/// Render `manifest` as YAML. Languages listed in `preferred_langs` come
/// first in that order; the rest follow alphabetically.
pub fn to_yaml(kind: Kind, manifest: &Manifest, preferred_langs: &[String]) -> String {
    let mut lines = vec![
        format!("# yaml-language-server: $schema=../assets/schema/{kind}.json"),
        String::new(),
    ];

    for (key, entry) in manifest.iter() {
        lines.push(format!("{}:", scalar(key)));
        for (lang, value) in sorted_languages(entry, preferred_langs) {
            match kind {
                Kind::Index => push_index_value(&mut lines, lang, value),
                Kind::Tabs => {
                    let (title, location) = value.title_and_location();
                    lines.push(format!("  {}:", scalar(lang)));
                    lines.push(format!("    title: {}", quote(title)));
                    lines.push(format!("    location: {}", scalar(location)));
                }
            }
        }
        if kind == Kind::Tabs {
            lines.push(String::new());
        }
    }

    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Write `<dir>/<kind>.yaml` and return its path.
pub fn write_yaml(
    dir: &Path,
    kind: Kind,
    manifest: &Manifest,
    preferred_langs: &[String],
) -> std::io::Result<PathBuf> {
    let path = dir.join(format!("{kind}.yaml"));
    fs::create_dir_all(dir)?;
    fs::write(&path, to_yaml(kind, manifest, preferred_langs))?;
    info!("Wrote {} ({} entries)", path.display(), manifest.len());
    Ok(path)
}

fn push_index_value(lines: &mut Vec<String>, lang: &str, value: &LanguageValue) {
    let lang = scalar(lang);
    match value {
        LanguageValue::Versions(list) if list.is_empty() => lines.push(format!("  {lang}: []")),
        LanguageValue::Versions(list) => {
            lines.push(format!("  {lang}:"));
            lines.extend(list.iter().map(|v| format!("    - {}", scalar(v))));
        }
        LanguageValue::Location(location) | LanguageValue::Tab { location, .. } => {
            lines.push(format!("  {lang}: {}", scalar(location)));
        }
    }
}

fn sorted_languages<'a>(
    entry: &'a Entry,
    preferred: &[String],
) -> Vec<(&'a str, &'a LanguageValue)> {
    let rank = |lang: &str| preferred.iter().position(|p| p == lang);
    let mut langs: Vec<_> = entry.iter().map(|(k, v)| (k.as_str(), v)).collect();
    langs.sort_by(|(a, _), (b, _)| match (rank(a), rank(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    });
    langs
}

/// `value` as a YAML scalar: bare when it reads back as the same string,
/// double-quoted otherwise.
fn scalar(value: &str) -> Cow<'_, str> {
    if value.is_empty() {
        Cow::Borrowed(EMPTY)
    } else if is_plain_safe(value) {
        Cow::Borrowed(value)
    } else {
        Cow::Owned(quote(value))
    }
}

fn is_plain_safe(value: &str) -> bool {
    const INDICATORS: &str = "-?:,[]{}#&*!|>'\"%@`<=~+.";
    let Some(first) = value.chars().next() else {
        return false;
    };
    if INDICATORS.contains(first) || first.is_ascii_digit() || first.is_whitespace() {
        return false;
    }
    if value.ends_with(char::is_whitespace) || value.ends_with(':') {
        return false;
    }
    if value.contains(": ") || value.contains(" #") || value.chars().any(char::is_control) {
        return false;
    }
    let lower = value.to_ascii_lowercase();
    !matches!(
        lower.as_str(),
        "null" | "true" | "false" | "yes" | "no" | "on" | "off" | "y" | "n"
    )
}

/// Double-quoted YAML scalar.
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '"' => out.push_str("\\\""),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
