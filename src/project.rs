//! Workspace and project model for bnd-style directory layouts.
//!
//! A workspace is a directory of projects. A project qualifies for scanning
//! when it is open (readable on disk), looks like a Java project (declares
//! classpath source entries), and carries the bnd nature (a `bnd.bnd` file at
//! its root). Classpath source entries are only scanned when the bnd build
//! model also lists them in its `src` source path.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

pub const BND_FILE: &str = "bnd.bnd";
pub const CLASSPATH_FILE: &str = ".classpath";
const DEFAULT_SOURCE_ROOT: &str = "src";

/// Non-owning reference to a project, used to batch cache entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ProjectHandle(String);

impl ProjectHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Project {
    handle: ProjectHandle,
    root: PathBuf,
    /// Relative source entries declared on the classpath.
    classpath_sources: Vec<String>,
    /// Whether a classpath listing was present at all.
    has_classpath: bool,
    /// Source path declared by the bnd build model (`src` property).
    bnd_source_path: Vec<String>,
    has_bnd_file: bool,
}

impl Project {
    /// Load a project from its root directory. Missing `.classpath` and
    /// `bnd.bnd` files are not errors; they downgrade the project to
    /// "not a Java project" / "no bnd nature" at precondition time.
    pub fn load(root: &Path) -> Result<Self> {
        let name = root
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("project root has no usable name: {}", root.display()))?
            .to_string();

        let classpath_file = root.join(CLASSPATH_FILE);
        let (classpath_sources, has_classpath) = if classpath_file.is_file() {
            let text = std::fs::read_to_string(&classpath_file).with_context(|| {
                format!("failed to read classpath listing: {}", classpath_file.display())
            })?;
            (parse_classpath(&text), true)
        } else {
            (vec![DEFAULT_SOURCE_ROOT.to_string()], false)
        };

        let bnd_file = root.join(BND_FILE);
        let (bnd_source_path, has_bnd_file) = if bnd_file.is_file() {
            let text = std::fs::read_to_string(&bnd_file)
                .with_context(|| format!("failed to read bnd file: {}", bnd_file.display()))?;
            (bnd_source_path(&text), true)
        } else {
            (Vec::new(), false)
        };

        Ok(Self {
            handle: ProjectHandle::new(name),
            root: root.to_path_buf(),
            classpath_sources,
            has_classpath,
            bnd_source_path,
            has_bnd_file,
        })
    }

    pub fn handle(&self) -> &ProjectHandle {
        &self.handle
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_open(&self) -> bool {
        self.root.is_dir()
    }

    /// The "recognized managed project kind" check: a declared classpath
    /// listing, or the conventional `src` layout on disk.
    pub fn is_java_project(&self) -> bool {
        self.has_classpath || self.root.join(DEFAULT_SOURCE_ROOT).is_dir()
    }

    pub fn has_bnd_nature(&self) -> bool {
        self.has_bnd_file
    }

    /// Classpath source entries that the bnd build model also recognizes as
    /// part of its source path, resolved to existing directories.
    pub fn scan_roots(&self) -> Vec<PathBuf> {
        self.classpath_sources
            .iter()
            .filter(|entry| {
                self.bnd_source_path
                    .iter()
                    .any(|src| src == entry.as_str())
            })
            .map(|entry| self.root.join(entry))
            .filter(|path| path.is_dir())
            .collect()
    }
}

/// Enumerate candidate projects: the immediate child directories of the
/// workspace, sorted by name.
pub fn discover_projects(workspace: &Path) -> Result<Vec<Project>> {
    let entries = std::fs::read_dir(workspace)
        .with_context(|| format!("failed to read workspace: {}", workspace.display()))?;

    let mut projects = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'))
        {
            continue;
        }
        projects.push(Project::load(&path)?);
    }

    projects.sort_by(|a, b| a.name().cmp(b.name()));
    Ok(projects)
}

fn parse_classpath(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.trim_end_matches('/').to_string())
        .collect()
}

/// Read the `src` property from bnd.bnd. bnd properties are `key: value`
/// lines with backslash continuations; only the source path is of interest
/// here. Defaults to `src` when the property is absent.
fn bnd_source_path(text: &str) -> Vec<String> {
    let mut logical_lines: Vec<String> = Vec::new();
    let mut continued = false;
    for raw in text.lines() {
        let (line, continues) = match raw.strip_suffix('\\') {
            Some(rest) => (rest, true),
            None => (raw, false),
        };
        if continued {
            if let Some(last) = logical_lines.last_mut() {
                last.push_str(line.trim());
            }
        } else {
            logical_lines.push(line.trim().to_string());
        }
        continued = continues;
    }

    for line in logical_lines {
        if line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let Some((key, value)) = line.split_once([':', '=']) else {
            continue;
        };
        if key.trim() == "src" {
            return value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.trim_end_matches('/').to_string())
                .collect();
        }
    }

    vec![DEFAULT_SOURCE_ROOT.to_string()]
}
