//! # component-marker
//!
//! Scans Java sources in bnd-managed projects for the OSGi Declarative
//! Services `@Component` annotation and turns the results into line markers
//! and tree-view decorations.
//!
//! ## Architecture
//!
//! - **project**: Workspace discovery and the bnd project model (nature,
//!   classpath source entries, build-model source path)
//! - **scan**: Import pre-filter, structural pre-check, and tree-sitter
//!   based annotation extraction
//! - **marker**: Marker store and the delete-then-create marker emitter
//! - **cache**: Concurrent decoration cache keyed by fully-qualified type
//!   name
//! - **rescan**: Per-project scan orchestration plus the refresh channel
//! - **decor**: File, type, and package decorators over the cache
//! - **cli**: Command-line surface

pub mod cache;
pub mod cli;
pub mod decor;
pub mod marker;
pub mod project;
pub mod rescan;
pub mod scan;
