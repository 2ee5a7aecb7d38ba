//! Project scan orchestration.
//!
//! Drives the scanner and marker emitter over every qualifying compilation
//! unit of a project, one file at a time, then swaps the project's
//! decoration-cache entries and publishes a refresh event for the rendering
//! side. Safe to invoke once per build cycle; rescanning an unchanged
//! project is idempotent.

use anyhow::{Context, Result};
use ignore::WalkBuilder;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use tracing::{debug, error};

use crate::cache::{DecorationCache, DecorationToken};
use crate::decor::unit_parent_name;
use crate::marker::{self, MarkerStore};
use crate::project::Project;
use crate::scan::{
    component_in_imports, has_component_annotation, package_name, parse_unit, scan_detections,
    top_level_type_states,
};

/// Decorator ids carried on refresh events, mirroring the two registered
/// decorators.
pub const REFRESH_DECORATORS: &[&str] = &["componentDecorator", "componentPackageDecorator"];

/// Published on the refresh channel after a project's rescan completes. The
/// rendering layer subscribes; the orchestrator never waits for the redraw.
#[derive(Debug, Clone)]
pub struct RefreshRequest {
    pub project: crate::project::ProjectHandle,
    pub decorators: &'static [&'static str],
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectScan {
    pub project: String,
    /// A precondition failed; nothing was scanned and nothing was logged.
    pub skipped: bool,
    /// A framework-level error aborted the walk; the cache keeps the last
    /// successful pass for this project.
    pub aborted: bool,
    pub units_scanned: usize,
    pub markers: usize,
    pub components: usize,
}

impl ProjectScan {
    fn skipped(project: &Project) -> Self {
        Self {
            project: project.name().to_string(),
            skipped: true,
            aborted: false,
            units_scanned: 0,
            markers: 0,
            components: 0,
        }
    }
}

struct UnitOutcome {
    detections: usize,
    /// `Some(token)` writes, `None` removals, keyed by type FQN.
    token_updates: Vec<(String, Option<DecorationToken>)>,
}

/// Rescan one project: replace its decoration-cache entries and rebuild its
/// markers. Preconditions (closed project, not a Java project, no bnd
/// nature) are silent early returns.
pub fn rescan(
    project: &Project,
    cache: &DecorationCache,
    markers: &MarkerStore,
    refresh: Option<&Sender<RefreshRequest>>,
) -> Result<ProjectScan> {
    if !project.is_open() || !project.is_java_project() || !project.has_bnd_nature() {
        return Ok(ProjectScan::skipped(project));
    }

    let mut pending: BTreeMap<String, DecorationToken> = BTreeMap::new();
    let mut units_scanned = 0usize;
    let mut markers_created = 0usize;

    for root in project.scan_roots() {
        let units = match walk_units(&root) {
            Ok(units) => units,
            Err(err) => {
                error!(project = %project.name(), root = %root.display(), %err, "rescan aborted");
                return Ok(aborted(project, units_scanned));
            }
        };

        for unit in units {
            match scan_unit(project, &unit, markers) {
                Ok(outcome) => {
                    units_scanned += 1;
                    markers_created += outcome.detections;
                    for (fqn, update) in outcome.token_updates {
                        match update {
                            Some(token) => {
                                pending.insert(fqn, token);
                            }
                            None => {
                                pending.remove(&fqn);
                            }
                        }
                    }
                }
                Err(err) => {
                    error!(project = %project.name(), unit = %unit.display(), %err, "rescan aborted");
                    return Ok(aborted(project, units_scanned));
                }
            }
        }
    }

    let components = pending.len();
    cache.replace_project(project.handle(), pending);
    debug!(project = %project.name(), units_scanned, components, "rescan complete");

    if let Some(refresh) = refresh {
        // The rendering side may already be gone; completion is still valid.
        let _ = refresh.send(RefreshRequest {
            project: project.handle().clone(),
            decorators: REFRESH_DECORATORS,
        });
    }

    Ok(ProjectScan {
        project: project.name().to_string(),
        skipped: false,
        aborted: false,
        units_scanned,
        markers: markers_created,
        components,
    })
}

/// Rescan a single compilation unit against the live cache: the edit path.
/// A type found annotation-free has its entry removed without touching the
/// rest of the project.
pub fn rescan_unit(
    project: &Project,
    cache: &DecorationCache,
    markers: &MarkerStore,
    unit: &Path,
) -> Result<()> {
    if !project.is_open() || !project.is_java_project() || !project.has_bnd_nature() {
        return Ok(());
    }

    let outcome = scan_unit(project, unit, markers)?;
    for (fqn, update) in outcome.token_updates {
        match update {
            Some(token) => cache.put(fqn, token),
            None => cache.remove(&fqn),
        }
    }
    Ok(())
}

fn aborted(project: &Project, units_scanned: usize) -> ProjectScan {
    ProjectScan {
        project: project.name().to_string(),
        skipped: false,
        aborted: true,
        units_scanned,
        markers: 0,
        components: 0,
    }
}

/// The per-unit pipeline: delete category markers, import pre-filter,
/// structural pre-check, tree scan, marker emission, token updates.
fn scan_unit(project: &Project, unit: &Path, markers: &MarkerStore) -> Result<UnitOutcome> {
    let source = std::fs::read_to_string(unit)
        .with_context(|| format!("failed to read unit: {}", unit.display()))?;

    markers.delete_markers(unit);

    if !component_in_imports(&source) {
        return Ok(UnitOutcome {
            detections: 0,
            token_updates: Vec::new(),
        });
    }

    // A failed parse is "no components found", not an error.
    let Some(tree) = parse_unit(&source) else {
        return Ok(UnitOutcome {
            detections: 0,
            token_updates: Vec::new(),
        });
    };

    let detections = if has_component_annotation(&tree, &source) {
        let detections = scan_detections(&tree, &source);
        marker::emit(markers, unit, &detections);
        detections.len()
    } else {
        0
    };

    let package = package_name(&tree, &source);
    let parent_name = unit_parent_name(&source, unit)
        .with_context(|| format!("unit has no usable file stem: {}", unit.display()))?;

    let mut token_updates = Vec::new();
    for state in top_level_type_states(&tree, &source) {
        let fqn = if package.is_empty() {
            state.type_name.clone()
        } else {
            format!("{package}.{}", state.type_name)
        };
        if state.is_component {
            token_updates.push((
                fqn,
                Some(DecorationToken {
                    parent_name: parent_name.clone(),
                    custom_label: state.custom_label,
                    project: project.handle().clone(),
                }),
            ));
        } else {
            token_updates.push((fqn, None));
        }
    }

    Ok(UnitOutcome {
        detections,
        token_updates,
    })
}

/// Java compilation units under one source root, sorted for a deterministic
/// scan order. The walk is sequential; files are handed to the scanner one
/// at a time.
pub fn walk_units(root: &Path) -> Result<Vec<PathBuf>> {
    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .build();

    let mut units = Vec::new();
    for entry in walker {
        let entry = entry.with_context(|| format!("walk failed under: {}", root.display()))?;
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let path = entry.path();
        if path.extension().is_some_and(|e| e == "java") {
            units.push(path.to_path_buf());
        }
    }
    units.sort();
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::BND_FILE;
    use std::sync::mpsc;
    use tempfile::TempDir;

    const IMPORT: &str = "import org.osgi.service.component.annotations.Component;";

    fn write_unit(root: &Path, rel: &str, body: &str) -> PathBuf {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, body).unwrap();
        path
    }

    fn bnd_project(tmp: &TempDir, name: &str) -> Project {
        let root = tmp.path().join(name);
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::write(root.join(BND_FILE), "Bundle-Name: demo\n").unwrap();
        Project::load(&root).unwrap()
    }

    fn component_unit(package: &str, name: &str, annotation: &str) -> String {
        format!("package {package};\n\n{IMPORT}\n\n{annotation}\npublic class {name} {{\n}}\n")
    }

    #[test]
    fn rescan_emits_markers_and_populates_cache() {
        let tmp = TempDir::new().unwrap();
        let project = bnd_project(&tmp, "demo");
        let foo = write_unit(
            project.root(),
            "src/com/acme/Foo.java",
            &component_unit("com.acme", "Foo", "@Component"),
        );
        write_unit(
            project.root(),
            "src/com/acme/Plain.java",
            "package com.acme;\n\npublic class Plain {\n}\n",
        );

        let cache = DecorationCache::new();
        let markers = MarkerStore::new();
        let (tx, rx) = mpsc::channel();

        let report = rescan(&project, &cache, &markers, Some(&tx)).unwrap();
        assert!(!report.skipped && !report.aborted);
        assert_eq!(report.units_scanned, 2);
        assert_eq!(report.markers, 1);
        assert_eq!(report.components, 1);

        let file_markers = markers.markers_for(&foo);
        assert_eq!(file_markers.len(), 1);
        assert_eq!(file_markers[0].message, "OSGi Component");
        assert_eq!(file_markers[0].line, 5);

        let token = cache.get("com.acme.Foo").unwrap();
        assert_eq!(token.parent_name, "com.acme.Foo");
        assert!(token.custom_label.is_none());
        assert_eq!(token.project, *project.handle());

        let event = rx.try_recv().unwrap();
        assert_eq!(event.project, *project.handle());
        assert_eq!(event.decorators, REFRESH_DECORATORS);
    }

    #[test]
    fn custom_name_flows_into_marker_and_token() {
        let tmp = TempDir::new().unwrap();
        let project = bnd_project(&tmp, "demo");
        let foo = write_unit(
            project.root(),
            "src/com/acme/Foo.java",
            &component_unit("com.acme", "Foo", "@Component(name = \"Bar\")"),
        );

        let cache = DecorationCache::new();
        let markers = MarkerStore::new();
        rescan(&project, &cache, &markers, None).unwrap();

        assert_eq!(markers.markers_for(&foo)[0].message, "OSGi Component Bar");
        let token = cache.get("com.acme.Foo").unwrap();
        assert_eq!(token.custom_label.as_deref(), Some("Bar"));
    }

    #[test]
    fn rescan_twice_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let project = bnd_project(&tmp, "demo");
        let foo = write_unit(
            project.root(),
            "src/com/acme/Foo.java",
            &component_unit("com.acme", "Foo", "@Component"),
        );

        let cache = DecorationCache::new();
        let markers = MarkerStore::new();
        rescan(&project, &cache, &markers, None).unwrap();
        let first_markers = markers.markers_for(&foo);
        let first_token = cache.get("com.acme.Foo");

        rescan(&project, &cache, &markers, None).unwrap();
        assert_eq!(markers.markers_for(&foo), first_markers);
        assert_eq!(cache.get("com.acme.Foo"), first_token);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn rescan_removes_entries_for_deleted_types() {
        let tmp = TempDir::new().unwrap();
        let project = bnd_project(&tmp, "demo");

        let cache = DecorationCache::new();
        // A stale entry from a type that no longer exists in the project.
        cache.put(
            "com.acme.Gone",
            DecorationToken {
                parent_name: "com.acme.Gone".to_string(),
                custom_label: None,
                project: project.handle().clone(),
            },
        );

        let markers = MarkerStore::new();
        rescan(&project, &cache, &markers, None).unwrap();
        assert!(cache.get("com.acme.Gone").is_none());
    }

    #[test]
    fn preconditions_skip_silently() {
        let tmp = TempDir::new().unwrap();

        // No bnd.bnd.
        let root = tmp.path().join("plain");
        std::fs::create_dir_all(root.join("src")).unwrap();
        let plain = Project::load(&root).unwrap();

        let cache = DecorationCache::new();
        let markers = MarkerStore::new();
        let report = rescan(&plain, &cache, &markers, None).unwrap();
        assert!(report.skipped);
        assert_eq!(markers.marker_count(), 0);
        assert!(cache.is_empty());

        // Closed project.
        let closed = Project::load(&tmp.path().join("missing")).unwrap();
        assert!(rescan(&closed, &cache, &markers, None).unwrap().skipped);
    }

    #[test]
    fn files_without_the_import_are_never_parsed_into_markers() {
        let tmp = TempDir::new().unwrap();
        let project = bnd_project(&tmp, "demo");
        // Simple name matches but the OSGi import is missing.
        let foo = write_unit(
            project.root(),
            "src/com/acme/Foo.java",
            "package com.acme;\n\nimport org.springframework.stereotype.Component;\n\n@Component\npublic class Foo {\n}\n",
        );

        let cache = DecorationCache::new();
        let markers = MarkerStore::new();
        rescan(&project, &cache, &markers, None).unwrap();

        assert!(markers.markers_for(&foo).is_empty());
        assert!(cache.is_empty());
    }

    #[test]
    fn rescan_unit_handles_annotation_removal() {
        let tmp = TempDir::new().unwrap();
        let project = bnd_project(&tmp, "demo");
        let foo = write_unit(
            project.root(),
            "src/com/acme/Foo.java",
            &component_unit("com.acme", "Foo", "@Component"),
        );
        write_unit(
            project.root(),
            "src/com/acme/Other.java",
            &component_unit("com.acme", "Other", "@Component"),
        );

        let cache = DecorationCache::new();
        let markers = MarkerStore::new();
        rescan(&project, &cache, &markers, None).unwrap();
        assert_eq!(cache.len(), 2);

        // Drop the annotation but keep the import, then rescan only Foo.
        std::fs::write(
            &foo,
            format!("package com.acme;\n\n{IMPORT}\n\npublic class Foo {{\n}}\n"),
        )
        .unwrap();
        rescan_unit(&project, &cache, &markers, &foo).unwrap();

        assert!(cache.get("com.acme.Foo").is_none());
        assert!(cache.get("com.acme.Other").is_some());
        assert!(markers.markers_for(&foo).is_empty());
    }

    #[test]
    fn unreadable_unit_aborts_and_keeps_last_pass() {
        let tmp = TempDir::new().unwrap();
        let project = bnd_project(&tmp, "demo");
        let old = write_unit(
            project.root(),
            "src/com/acme/Old.java",
            &component_unit("com.acme", "Old", "@Component"),
        );

        let cache = DecorationCache::new();
        let markers = MarkerStore::new();
        let (tx, rx) = mpsc::channel();

        rescan(&project, &cache, &markers, Some(&tx)).unwrap();
        assert!(cache.get("com.acme.Old").is_some());
        assert!(rx.try_recv().is_ok());

        // Replace the project contents with a unit that is not valid UTF-8;
        // the read failure aborts the walk before the cache swap.
        std::fs::remove_file(&old).unwrap();
        std::fs::write(project.root().join("src/com/acme/Bad.java"), [0xC3, 0x28]).unwrap();

        let report = rescan(&project, &cache, &markers, Some(&tx)).unwrap();
        assert!(report.aborted);
        assert!(!report.skipped);
        assert!(cache.get("com.acme.Old").is_some());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn walk_units_skips_directories_named_like_units() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("src");
        std::fs::create_dir_all(root.join("Fake.java")).unwrap();
        let foo = write_unit(tmp.path(), "src/com/acme/Foo.java", "public class Foo {\n}\n");

        let units = walk_units(&root).unwrap();
        assert_eq!(units, vec![foo]);
    }

    #[test]
    fn source_roots_outside_bnd_source_path_are_ignored() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("narrow");
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::create_dir_all(root.join("src-gen")).unwrap();
        std::fs::write(root.join(".classpath"), "src\nsrc-gen\n").unwrap();
        std::fs::write(root.join(BND_FILE), "src: src\n").unwrap();
        let project = Project::load(&root).unwrap();

        write_unit(
            project.root(),
            "src-gen/com/acme/Gen.java",
            &component_unit("com.acme", "Gen", "@Component"),
        );

        let cache = DecorationCache::new();
        let markers = MarkerStore::new();
        let report = rescan(&project, &cache, &markers, None).unwrap();
        assert_eq!(report.units_scanned, 0);
        assert!(cache.is_empty());
    }
}
