// src/cli/role.rs
//! Role management commands

use clap::Subcommand;

#[derive(Subcommand)]
pub enum RoleCommands {
    /// List roles and their memberships
    List,

    /// Create a role
    Create {
        name: String,

        /// Make the role a superuser
        #[arg(long)]
        superuser: bool,

        /// Allow the role to create objects
        #[arg(long)]
        can_create: bool,
    },

    /// Grant membership in a role
    ///
    /// Example: tlext role grant tle_admin alice
    Grant {
        /// Role being granted
        role: String,

        /// Role receiving the membership
        member: String,
    },

    /// Revoke membership in a role
    Revoke { role: String, member: String },
}
