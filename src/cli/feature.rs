// src/cli/feature.rs
//! Feature registry commands

use clap::Subcommand;

#[derive(Subcommand)]
pub enum FeatureCommands {
    /// Show the functions registered for a feature
    List {
        /// passcheck or clientauth
        feature: String,
    },

    /// Register a function for a feature
    Register {
        /// Function, as `schema.name` or `name(argtypes)`
        proc: String,
        feature: String,

        /// Do not fail when already registered
        #[arg(long)]
        if_not_exists: bool,
    },

    /// Unregister a function
    Unregister {
        proc: String,
        feature: String,

        /// Do not fail when not registered
        #[arg(long)]
        if_exists: bool,
    },
}
