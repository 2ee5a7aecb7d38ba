//! Decoration cache: fully-qualified type name -> decoration token.
//!
//! A key is present iff the type carried `@Component` as of the most recent
//! completed scan of its owning project. The cache is an owned instance
//! handed to the orchestrator and the decorators; the scan thread writes
//! while the rendering side reads concurrently. A whole-project rescan swaps
//! that project's entries inside one write-lock critical section, so readers
//! never observe a cleared-but-not-yet-repopulated state.

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::project::ProjectHandle;

/// Immutable record for one annotated type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecorationToken {
    /// `package.unitStem` of the declaring compilation unit.
    pub parent_name: String,
    /// Developer-supplied display name from the annotation's `name` member.
    pub custom_label: Option<String>,
    pub project: ProjectHandle,
}

#[derive(Debug, Default)]
pub struct DecorationCache {
    entries: RwLock<BTreeMap<String, DecorationToken>>,
}

impl DecorationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, fqn: impl Into<String>, token: DecorationToken) {
        self.entries.write().insert(fqn.into(), token);
    }

    pub fn remove(&self, fqn: &str) {
        self.entries.write().remove(fqn);
    }

    pub fn get(&self, fqn: &str) -> Option<DecorationToken> {
        self.entries.read().get(fqn).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Replace every entry owned by `project` with `entries` in a single
    /// write-lock critical section.
    pub fn replace_project(
        &self,
        project: &ProjectHandle,
        entries: BTreeMap<String, DecorationToken>,
    ) {
        let mut map = self.entries.write();
        map.retain(|_, token| token.project != *project);
        map.extend(entries);
    }

    /// Drop every entry owned by `project`, regardless of whether the types
    /// still exist on disk.
    pub fn remove_project(&self, project: &ProjectHandle) {
        self.entries.write().retain(|_, token| token.project != *project);
    }

    /// Keys owned by `project`, sorted.
    pub fn keys_for_project(&self, project: &ProjectHandle) -> Vec<String> {
        self.entries
            .read()
            .iter()
            .filter(|(_, token)| token.project == *project)
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// The file-decorator query: number of tokens declared in the given unit
    /// plus the first match's custom label (keys are iterated in sorted
    /// order, so "first" is deterministic).
    pub fn count_for_unit(&self, parent_name: &str) -> (usize, Option<String>) {
        let map = self.entries.read();
        let mut count = 0;
        let mut custom_label = None;
        for token in map.values() {
            if token.parent_name == parent_name {
                count += 1;
                if count == 1 {
                    custom_label = token.custom_label.clone();
                }
            }
        }
        (count, custom_label)
    }

    /// The package-decorator query: keys with the package name as a literal
    /// string prefix. Sibling packages sharing a name prefix will match too;
    /// that quirk is part of the contract and covered by tests.
    pub fn count_with_prefix(&self, package: &str) -> usize {
        self.entries
            .read()
            .keys()
            .filter(|key| key.starts_with(package))
            .count()
    }
}
