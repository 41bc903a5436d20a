//! Set difference between a desired and an actual artifact set.
//!
//! Used at every tier that keeps a directory in step with a list of tracks:
//! the built destination directory and the remote mirror.

use std::collections::{BTreeMap, BTreeSet};

/// An artifact that currently exists at the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActualEntry {
    pub name: String,
    /// Size in bytes, when the target reports it cheaply.
    pub size: Option<u64>,
}

impl ActualEntry {
    pub fn new(name: impl Into<String>, size: Option<u64>) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }
}

/// Partition of the union of desired and actual keys.
///
/// Every key lands in exactly one list, and each list is sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactDiff {
    /// Desired, not present.
    pub to_create: Vec<String>,
    /// Present, but not current.
    pub to_update: Vec<String>,
    /// Present, not desired.
    pub to_remove: Vec<String>,
    /// Present and current.
    pub unchanged: Vec<String>,
}

impl ArtifactDiff {
    /// Whether applying the diff would change nothing.
    pub fn is_converged(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_remove.is_empty()
    }

    /// Keys that need a transfer, creations first.
    pub fn to_transfer(&self) -> impl Iterator<Item = &String> {
        self.to_create.iter().chain(self.to_update.iter())
    }

    pub fn total(&self) -> usize {
        self.to_create.len() + self.to_update.len() + self.to_remove.len() + self.unchanged.len()
    }
}

/// Computes the changes that make `actual` match `desired`.
///
/// `is_current` is only consulted for keys present on both sides. Duplicate
/// names in `actual` are treated as one entry (the first one wins).
pub fn diff<D, F>(
    desired: &BTreeMap<String, D>,
    actual: &[ActualEntry],
    mut is_current: F,
) -> ArtifactDiff
where
    F: FnMut(&D, &ActualEntry) -> bool,
{
    let mut result = ArtifactDiff::default();
    let mut present: BTreeMap<&str, &ActualEntry> = BTreeMap::new();
    for entry in actual {
        present.entry(entry.name.as_str()).or_insert(entry);
    }

    for (name, descriptor) in desired {
        match present.get(name.as_str()) {
            None => result.to_create.push(name.clone()),
            Some(entry) => {
                if is_current(descriptor, entry) {
                    result.unchanged.push(name.clone());
                } else {
                    result.to_update.push(name.clone());
                }
            }
        }
    }

    let desired_names: BTreeSet<&str> = desired.keys().map(String::as_str).collect();
    result.to_remove = present
        .keys()
        .filter(|name| !desired_names.contains(*name))
        .map(|name| name.to_string())
        .collect();

    result
}
