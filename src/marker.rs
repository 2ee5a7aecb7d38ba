//! Process-local marker store and the marker emitter.
//!
//! Markers live under a single category and are rebuilt delete-then-create
//! per file, so repeated rescans never accumulate stale or duplicate
//! markers. The store is lock-guarded for the same reason as the decoration
//! cache: the rendering side may read while a scan writes.

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::scan::Detection;

pub const MARKER_CATEGORY: &str = "component-marker.component";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Marker {
    pub category: &'static str,
    pub severity: Severity,
    pub message: String,
    pub line: usize,
    pub location: String,
}

impl Marker {
    fn from_detection(detection: &Detection) -> Self {
        Self {
            category: MARKER_CATEGORY,
            severity: Severity::Info,
            message: detection.label.clone(),
            line: detection.line,
            location: format!("line {}", detection.line),
        }
    }
}

#[derive(Debug, Default)]
pub struct MarkerStore {
    markers: RwLock<BTreeMap<PathBuf, Vec<Marker>>>,
}

impl MarkerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delete all category markers on a file. Always runs before a file is
    /// rescanned.
    pub fn delete_markers(&self, file: &Path) {
        self.markers.write().remove(file);
    }

    pub fn markers_for(&self, file: &Path) -> Vec<Marker> {
        self.markers.read().get(file).cloned().unwrap_or_default()
    }

    pub fn marker_count(&self) -> usize {
        self.markers.read().values().map(Vec::len).sum()
    }

    /// All markers grouped per file, sorted by path.
    pub fn all(&self) -> BTreeMap<PathBuf, Vec<Marker>> {
        self.markers.read().clone()
    }

    fn create_markers(&self, file: &Path, markers: Vec<Marker>) {
        if markers.is_empty() {
            return;
        }
        self.markers.write().insert(file.to_path_buf(), markers);
    }
}

/// Replace the file's category markers with one Info marker per detection.
pub fn emit(store: &MarkerStore, file: &Path, detections: &[Detection]) {
    store.delete_markers(file);
    let markers = detections.iter().map(Marker::from_detection).collect();
    store.create_markers(file, markers);
}
