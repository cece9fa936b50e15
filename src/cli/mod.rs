// src/cli/mod.rs
//! CLI definitions for tlext
//!
//! This module contains the command-line interface definitions using clap.
//! The command implementations are in the `commands` module.
//!
//! Catalog commands:
//! - `init` - Create the catalog and install the `tle` extension
//! - `exec` - Run SQL through a session
//!
//! Stored extensions:
//! - `install` / `install-local` / `install-version` - Store an extension
//! - `install-update-path` / `uninstall-update-path` - Manage update scripts
//! - `uninstall` - Remove stored files
//! - `set-default-version` - Change the default version
//! - `available` / `versions` / `update-paths` - Listings
//!
//! Administration:
//! - `role` - Role management
//! - `feature` - Feature registry

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod feature;
mod role;

pub use feature::FeatureCommands;
pub use role::RoleCommands;

#[derive(Parser)]
#[command(name = "tlext")]
#[command(author = "tlext contributors")]
#[command(version)]
#[command(about = "Trusted language extensions for SQLite catalogs", long_about = None)]
pub struct Cli {
    /// Configuration file (default: $TLEXT_CONFIG or /etc/tlext/tlext.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Catalog database, overriding the configuration
    #[arg(short, long, global = true)]
    pub db_path: Option<PathBuf>,

    /// Extension directory, overriding the configuration
    #[arg(long, global = true)]
    pub extension_dir: Option<PathBuf>,

    /// Role to connect as (default: the bootstrap role)
    #[arg(short, long, global = true)]
    pub user: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the catalog database and install the tle extension
    Init,

    /// Execute SQL statements
    Exec {
        /// SQL text; read from --file or stdin when omitted
        sql: Option<String>,

        /// Read SQL from a file
        #[arg(short, long, conflicts_with = "sql")]
        file: Option<PathBuf>,
    },

    // =========================================================================
    // Stored extensions
    // =========================================================================
    /// Store a new extension from a script file
    Install {
        /// Extension name
        name: String,

        /// Version installed by the script
        version: String,

        /// Install script
        script: PathBuf,

        /// Extension description (default: the name)
        #[arg(long)]
        description: Option<String>,

        /// Required extensions
        #[arg(short, long = "requires", value_delimiter = ',')]
        requires: Vec<String>,
    },

    /// Store an extension from `<path>/<name>.control` and `<path>/<name>--<version>.sql`
    InstallLocal {
        /// Directory holding the files
        path: PathBuf,

        /// Extension name
        name: String,

        /// Version to install
        version: String,
    },

    /// Add another installable version to a stored extension
    InstallVersion {
        name: String,
        version: String,
        script: PathBuf,
    },

    /// Store an update script between two versions
    InstallUpdatePath {
        name: String,
        from: String,
        to: String,
        script: PathBuf,
    },

    /// Remove a stored update script
    UninstallUpdatePath {
        name: String,
        from: String,
        to: String,

        /// Do not fail when the update path is missing
        #[arg(long)]
        if_exists: bool,
    },

    /// Remove a stored extension or one of its versions
    Uninstall {
        name: String,

        /// Only remove this version
        version: Option<String>,

        /// Do not fail when the extension is missing
        #[arg(long)]
        if_exists: bool,
    },

    /// Change the default version of a stored extension
    SetDefaultVersion { name: String, version: String },

    /// List stored extensions
    Available,

    /// List installable versions of stored extensions
    Versions,

    /// List update paths between versions of a stored extension
    UpdatePaths { name: String },

    // =========================================================================
    // Administration
    // =========================================================================
    /// Role management
    #[command(subcommand)]
    Role(RoleCommands),

    /// Feature registry
    #[command(subcommand)]
    Feature(FeatureCommands),
}
