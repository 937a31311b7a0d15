//! # NS Composer
//!
//! The state engine behind the site composer: it tracks edits to the two
//! site manifests (`index.yaml` for posts, `tabs.yaml` for static pages)
//! against the last published copy, keeps unsynced work in drafts, and
//! tells the UI exactly what changed.
//!
//! # Architecture: Baseline, Working, Draft
//!
//! Each manifest kind has three layers:
//!
//! ```text
//! remote file   ──fetch──▶  baseline   (last known published state)
//!                              │ diff
//! user edits    ──────────▶ working    (what the composer shows)
//!                              │ save
//! storage blob  ◀─────────── draft      (working + baseline signature)
//! ```
//!
//! Every raw document goes through [`normalize`] before anything else sees
//! it, so the rest of the crate works on one canonical [`Manifest`] shape.
//! The diff and signature are recomputed after every mutation; nothing
//! downstream holds stale derived state.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`types`] | `Kind`, `Manifest`, `Entry`, `LanguageValue` |
//! | [`normalize`] | Raw document → canonical manifest, absorbing malformed input |
//! | [`signature`] | Order-sensitive content hash of a manifest |
//! | [`diff`] | Structural key / language / version diff |
//! | [`order`] | Key-order alignment for the side-by-side order view |
//! | [`draft`] | Fail-soft draft persistence over a key-value [`Storage`](draft::Storage) |
//! | [`source`] | Where baselines come from: [`ManifestSource`](source::ManifestSource), `DirectorySource` |
//! | [`sync`] | The controller: edit, autosave, save, refresh, discard, load |
//! | [`config`] | `composer.toml` loading with stock defaults and validation |
//! | [`export`] | Hand-formatted YAML output in the site's layout |
//! | [`check`] | Pre-publish location checks |
//!
//! # Design Decisions
//!
//! ## Signatures Instead of Timestamps
//!
//! A draft records the signature of the baseline it was edited against.
//! On load, comparing that with the freshly fetched baseline's signature
//! detects remote drift regardless of clocks, caches or who published.
//!
//! ## Injected Collaborators
//!
//! The controller never touches the network, disk or wall clock directly.
//! [`ManifestSource`](source::ManifestSource), [`Storage`](draft::Storage)
//! and [`Clock`](sync::Clock) are type parameters, so the same engine runs
//! over a checked-out site, a browser shim or in-memory test doubles.
//!
//! ## Single-Threaded by Construction
//!
//! Methods take `&mut self` and the only suspension point is a source
//! fetch. Overlapping fetches are settled with per-kind generation
//! tickets: whichever fetch started last wins.

pub mod check;
pub mod config;
pub mod diff;
pub mod draft;
pub mod export;
pub mod normalize;
pub mod order;
pub mod signature;
pub mod source;
pub mod sync;
pub mod types;

pub use diff::{Diff, diff};
pub use normalize::normalize;
pub use signature::{Signature, signature};
pub use sync::SyncController;
pub use types::{Entry, Kind, LanguageValue, Manifest};

#[cfg(test)]
pub(crate) mod test_helpers;
