//! Directory Synthesizer.
//!
//! Manifests are flat `path -> hash` rows; directories only exist as the
//! first segment of longer paths (or as an explicit directory marker). This
//! turns the rows under a prefix into a one-level listing.

use crate::models::{DirectoryEntry, Entry, FileEntry, Listing};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry as MapEntry;
use vellum_storage::join;

/// Builds the listing of `prefix` (already validated, `""` for the root)
/// out of manifest entries.
///
/// Entries outside the prefix are ignored, so callers may pass a whole
/// manifest or only the matching rows.
pub fn synthesize(entries: impl IntoIterator<Item = Entry>, prefix: &str) -> Listing {
    let mut exact = None;
    let mut files = Vec::new();
    let mut dirs: BTreeMap<String, DirectoryEntry> = BTreeMap::new();
    let child_prefix = format!("{prefix}/");

    for entry in entries {
        let relative = match prefix.is_empty() {
            true => entry.path(),
            false if entry.path() == prefix => {
                if let Entry::File(file) = entry {
                    exact = Some(file);
                }
                continue;
            },
            false => match entry.path().strip_prefix(&child_prefix) {
                Some(relative) => relative,
                None => continue,
            },
        };

        match relative.split_once('/') {
            Some((name, _)) => {
                let timestamp = entry.timestamp();
                match dirs.entry(name.to_string()) {
                    MapEntry::Vacant(vacant) => {
                        vacant.insert(DirectoryEntry {
                            name: name.to_string(),
                            path: join(prefix, name),
                            timestamp,
                        });
                    },
                    MapEntry::Occupied(mut occupied) => {
                        let dir = occupied.get_mut();
                        dir.timestamp = dir.timestamp.max(timestamp);
                    },
                }
            },
            // A marker directly inside the prefix only says "this directory
            // exists", which the caller already knows.
            None => {
                if let Entry::File(file) = entry {
                    files.push(file);
                }
            },
        }
    }

    match exact {
        Some(file) if files.is_empty() && dirs.is_empty() => Listing::File(file),
        Some(file) => {
            files.push(file);
            sorted(files, dirs)
        },
        None => sorted(files, dirs),
    }
}

fn sorted(mut files: Vec<FileEntry>, dirs: BTreeMap<String, DirectoryEntry>) -> Listing {
    files.sort_by(|a, b| a.name().cmp(b.name()).then_with(|| a.path.cmp(&b.path)));
    Listing::Directory { files, dirs: dirs.into_values().collect() }
}
