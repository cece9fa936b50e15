// src/extension/mod.rs

//! Extension engine
//!
//! Control files and scripts come either from an extension directory or from
//! virtual files stored in the reserved schema. Both go through the same
//! engine: the version graph picks the scripts, the script runner executes
//! them, and the catalog writer records the result.

pub mod available;
pub mod bootstrap;
pub mod catalog;
pub mod control;
pub mod create;
pub mod drop;
pub mod graph;
pub mod intercept;
pub mod manage;
pub mod names;
pub mod native;
pub mod script;
pub mod source;
pub mod store;
pub mod update;

pub use available::{AvailableExtension, AvailableVersion, UpdatePath};
pub use control::ExtensionControl;
pub use graph::{VersionGraph, identify_update_path};
pub use names::{VirtualFile, check_valid_extension_name, check_valid_version_name};
pub use source::ExtensionSource;
