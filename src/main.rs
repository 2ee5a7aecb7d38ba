use anyhow::{Context, Result};
use clap::Parser;
use component_marker::cache::DecorationCache;
use component_marker::cli::{Cli, Commands, OutputFormat};
use component_marker::decor::{DecorationTarget, decorate, unit_parent_name};
use component_marker::marker::{Marker, MarkerStore};
use component_marker::project::{Project, discover_projects};
use component_marker::rescan::{ProjectScan, RefreshRequest, rescan, walk_units};
use component_marker::scan::declared_package;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Instant;
use tracing::warn;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let workspace = resolve_workspace(&cli)?;

    match cli.command.clone() {
        Commands::Scan {
            projects,
            format,
            output,
        } => {
            let report = run_scan(&workspace, &projects)?;
            let content = match format {
                OutputFormat::Json => serde_json::to_string_pretty(&report)?,
                OutputFormat::Text => render_scan_text(&report),
            };
            write_output(&content, output.as_deref())?;
        }
        Commands::Tree {
            projects,
            format,
            output,
        } => {
            let report = run_tree(&workspace, &projects)?;
            let content = match format {
                OutputFormat::Json => serde_json::to_string_pretty(&report)?,
                OutputFormat::Text => render_tree_text(&report),
            };
            write_output(&content, output.as_deref())?;
        }
    }

    Ok(())
}

fn resolve_workspace(cli: &Cli) -> Result<PathBuf> {
    if let Some(p) = cli.workspace.clone() {
        return Ok(p);
    }
    std::env::current_dir().context("failed to resolve current directory")
}

fn select_projects(workspace: &Path, names: &[String]) -> Result<Vec<Project>> {
    let projects = discover_projects(workspace)?;
    if names.is_empty() {
        return Ok(projects);
    }

    let mut selected = Vec::new();
    for name in names {
        let project = projects
            .iter()
            .find(|p| p.name() == name.as_str())
            .cloned()
            .with_context(|| format!("unknown project: {name} (workspace: {})", workspace.display()))?;
        selected.push(project);
    }
    Ok(selected)
}

#[derive(Debug, Serialize)]
struct UnitMarkers {
    path: String,
    markers: Vec<Marker>,
}

#[derive(Debug, Serialize)]
struct ProjectReport {
    #[serde(flatten)]
    scan: ProjectScan,
    units: Vec<UnitMarkers>,
}

#[derive(Debug, Serialize)]
struct ScanReport {
    workspace: String,
    duration_ms: u64,
    /// Projects whose decorators were asked to refresh, in completion order.
    refreshed: Vec<String>,
    projects: Vec<ProjectReport>,
}

fn run_scan(workspace: &Path, names: &[String]) -> Result<ScanReport> {
    let start = Instant::now();
    let projects = select_projects(workspace, names)?;

    let cache = DecorationCache::new();
    let markers = MarkerStore::new();
    let (tx, rx) = mpsc::channel::<RefreshRequest>();

    let mut reports = Vec::new();
    for project in &projects {
        let scan = rescan(project, &cache, &markers, Some(&tx))?;
        let units = project_markers(project, &markers);
        reports.push(ProjectReport { scan, units });
    }
    drop(tx);

    let refreshed = rx.iter().map(|event| event.project.name().to_string()).collect();

    Ok(ScanReport {
        workspace: workspace.to_string_lossy().to_string(),
        duration_ms: start.elapsed().as_millis() as u64,
        refreshed,
        projects: reports,
    })
}

fn project_markers(project: &Project, markers: &MarkerStore) -> Vec<UnitMarkers> {
    markers
        .all()
        .into_iter()
        .filter(|(path, _)| path.starts_with(project.root()))
        .map(|(path, markers)| UnitMarkers {
            path: relative_display(project, &path),
            markers,
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct TypeNode {
    fqn: String,
    suffix: Option<String>,
    icon: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct UnitNode {
    path: String,
    package: String,
    suffix: Option<String>,
    icon: Option<&'static str>,
    types: Vec<TypeNode>,
}

#[derive(Debug, Serialize)]
struct PackageNode {
    name: String,
    icon: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct ProjectTree {
    project: String,
    packages: Vec<PackageNode>,
    units: Vec<UnitNode>,
}

#[derive(Debug, Serialize)]
struct TreeReport {
    workspace: String,
    projects: Vec<ProjectTree>,
}

/// Scan first, then render projects as their refresh events arrive: the
/// rendering side subscribes to the orchestrator's completion channel.
fn run_tree(workspace: &Path, names: &[String]) -> Result<TreeReport> {
    let projects = select_projects(workspace, names)?;

    let cache = DecorationCache::new();
    let markers = MarkerStore::new();
    let (tx, rx) = mpsc::channel::<RefreshRequest>();

    for project in &projects {
        rescan(project, &cache, &markers, Some(&tx))?;
    }
    drop(tx);

    let mut trees = Vec::new();
    for event in rx.iter() {
        let Some(project) = projects.iter().find(|p| *p.handle() == event.project) else {
            continue;
        };
        trees.push(project_tree(project, &cache)?);
    }

    Ok(TreeReport {
        workspace: workspace.to_string_lossy().to_string(),
        projects: trees,
    })
}

fn project_tree(project: &Project, cache: &DecorationCache) -> Result<ProjectTree> {
    let mut packages = BTreeSet::new();
    let mut units = Vec::new();

    for root in project.scan_roots() {
        for unit in walk_units(&root)? {
            let source = match std::fs::read_to_string(&unit) {
                Ok(source) => source,
                Err(err) => {
                    warn!(unit = %unit.display(), %err, "skipping unreadable unit");
                    continue;
                }
            };

            let package = declared_package(&source).unwrap_or_default();
            if !package.is_empty() {
                packages.insert(package.clone());
            }

            let decoration = decorate(
                cache,
                &DecorationTarget::File {
                    project,
                    path: &unit,
                },
            );

            let types = unit_types(project, cache, &source, &unit);
            units.push(UnitNode {
                path: relative_display(project, &unit),
                package,
                suffix: decoration.as_ref().and_then(|d| d.suffix.clone()),
                icon: decoration.as_ref().and_then(|d| d.icon),
                types,
            });
        }
    }

    let packages = packages
        .into_iter()
        .map(|name| {
            let decoration = decorate(
                cache,
                &DecorationTarget::Package {
                    project,
                    name: &name,
                },
            );
            PackageNode {
                name,
                icon: decoration.and_then(|d| d.icon),
            }
        })
        .collect();

    Ok(ProjectTree {
        project: project.name().to_string(),
        packages,
        units,
    })
}

/// Component types declared in one unit, looked up through the cache.
fn unit_types(
    project: &Project,
    cache: &DecorationCache,
    source: &str,
    unit: &Path,
) -> Vec<TypeNode> {
    let Some(parent_name) = unit_parent_name(source, unit) else {
        return Vec::new();
    };

    cache
        .keys_for_project(project.handle())
        .into_iter()
        .filter(|fqn| {
            cache
                .get(fqn)
                .is_some_and(|token| token.parent_name == parent_name)
        })
        .map(|fqn| {
            let decoration = decorate(
                cache,
                &DecorationTarget::Type {
                    project,
                    unit_path: unit,
                    fqn: &fqn,
                },
            );
            TypeNode {
                fqn,
                suffix: decoration.as_ref().and_then(|d| d.suffix.clone()),
                icon: decoration.and_then(|d| d.icon),
            }
        })
        .collect()
}

fn relative_display(project: &Project, path: &Path) -> String {
    path.strip_prefix(project.root())
        .unwrap_or(path)
        .to_string_lossy()
        .to_string()
}

fn render_scan_text(report: &ScanReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("workspace: {}\n", report.workspace));
    out.push_str(&format!("duration_ms: {}\n", report.duration_ms));
    for project in &report.projects {
        let status = if project.scan.skipped {
            " (skipped)"
        } else if project.scan.aborted {
            " (aborted)"
        } else {
            ""
        };
        out.push_str(&format!(
            "project {}{status}: {} units, {} markers, {} components\n",
            project.scan.project,
            project.scan.units_scanned,
            project.scan.markers,
            project.scan.components
        ));
        for unit in &project.units {
            for marker in &unit.markers {
                out.push_str(&format!(
                    "- {}: {} ({})\n",
                    unit.path, marker.message, marker.location
                ));
            }
        }
    }
    out
}

fn render_tree_text(report: &TreeReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("workspace: {}\n", report.workspace));
    for tree in &report.projects {
        out.push_str(&format!("project {}\n", tree.project));
        for package in &tree.packages {
            let icon = package.icon.map(|i| format!(" <{i}>")).unwrap_or_default();
            out.push_str(&format!("  {}{icon}\n", package.name));
        }
        for unit in &tree.units {
            let suffix = unit.suffix.as_deref().unwrap_or_default();
            out.push_str(&format!("  {}{suffix}\n", unit.path));
            for ty in &unit.types {
                let suffix = ty.suffix.as_deref().unwrap_or_default();
                out.push_str(&format!("    {}{suffix}\n", ty.fqn));
            }
        }
    }
    out
}

fn write_output(content: &str, output: Option<&Path>) -> Result<()> {
    if let Some(path) = output {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
    } else {
        print!("{content}");
        if !content.ends_with('\n') {
            println!();
        }
    }
    Ok(())
}
