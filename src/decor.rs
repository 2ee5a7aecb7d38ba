//! Read-only decorators for tree-view rendering.
//!
//! Dispatch is a tagged variant over the three element kinds rather than
//! runtime type inspection. Decorators only query the decoration cache;
//! they never scan or parse beyond the cheap import pre-filter.

use serde::Serialize;
use std::path::Path;
use tracing::warn;

use crate::cache::DecorationCache;
use crate::project::Project;
use crate::scan::{component_in_imports, declared_package};

const DEFAULT_SUFFIX_TEXT: &str = "Component";
pub const COMPONENT_ICON: &str = "component";

#[derive(Debug)]
pub enum DecorationTarget<'a> {
    /// A whole compilation unit in the tree.
    File { project: &'a Project, path: &'a Path },
    /// A single type, keyed directly by fully-qualified name. `unit_path` is
    /// the declaring compilation unit.
    Type {
        project: &'a Project,
        unit_path: &'a Path,
        fqn: &'a str,
    },
    /// A package node, matched by literal key prefix.
    Package { project: &'a Project, name: &'a str },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decoration {
    pub suffix: Option<String>,
    pub icon: Option<&'static str>,
}

/// Compute the decoration for one tree element, or `None` when the element
/// does not qualify. Read errors on the pre-filter path are logged and
/// treated as "no decoration".
pub fn decorate(cache: &DecorationCache, target: &DecorationTarget<'_>) -> Option<Decoration> {
    match target {
        DecorationTarget::File { project, path } => decorate_file(cache, project, path),
        DecorationTarget::Type {
            project,
            unit_path,
            fqn,
        } => decorate_type(cache, project, unit_path, fqn),
        DecorationTarget::Package { project, name } => decorate_package(cache, project, name),
    }
}

fn decorate_file(cache: &DecorationCache, project: &Project, path: &Path) -> Option<Decoration> {
    if !project.has_bnd_nature() {
        return None;
    }
    let source = read_unit(path)?;
    if !component_in_imports(&source) {
        return None;
    }

    let parent_name = unit_parent_name(&source, path)?;
    let (count, custom_label) = cache.count_for_unit(&parent_name);
    if count == 0 {
        return None;
    }

    let text = custom_label.unwrap_or_else(|| DEFAULT_SUFFIX_TEXT.to_string());
    Some(Decoration {
        suffix: Some(format!(" [{text}]")),
        icon: Some(COMPONENT_ICON),
    })
}

fn decorate_type(
    cache: &DecorationCache,
    project: &Project,
    unit_path: &Path,
    fqn: &str,
) -> Option<Decoration> {
    if !project.has_bnd_nature() {
        return None;
    }
    let source = read_unit(unit_path)?;
    if !component_in_imports(&source) {
        return None;
    }

    let token = cache.get(fqn)?;
    let text = token
        .custom_label
        .unwrap_or_else(|| DEFAULT_SUFFIX_TEXT.to_string());
    Some(Decoration {
        suffix: Some(format!(" [{text}]")),
        icon: Some(COMPONENT_ICON),
    })
}

fn decorate_package(cache: &DecorationCache, project: &Project, name: &str) -> Option<Decoration> {
    if !project.has_bnd_nature() {
        return None;
    }
    if cache.count_with_prefix(name) == 0 {
        return None;
    }
    Some(Decoration {
        suffix: None,
        icon: Some(COMPONENT_ICON),
    })
}

/// `package.unitStem` for the declaring unit; default-package units use the
/// bare stem.
pub fn unit_parent_name(source: &str, path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    Some(match declared_package(source) {
        Some(pkg) => format!("{pkg}.{stem}"),
        None => stem.to_string(),
    })
}

fn read_unit(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(source) => Some(source),
        Err(err) => {
            warn!(path = %path.display(), %err, "failed to read unit for decoration");
            None
        }
    }
}
