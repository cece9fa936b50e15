// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands, FeatureCommands, RoleCommands};
use commands::Context;
use std::process::ExitCode;
use tlext::Config;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter)),
        )
        .init();

    let ctx = Context {
        config,
        user: cli.user.clone(),
        json: cli.json,
    };

    match run(cli.command, &ctx) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR:  {:#}", e);
            if let Some(hint) = e.downcast_ref::<tlext::Error>().and_then(|e| e.hint()) {
                eprintln!("HINT:  {}", hint);
            }
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::discover(cli.config.as_deref())?;
    if let Some(db_path) = &cli.db_path {
        config.db_path = db_path.clone();
    }
    if let Some(dir) = &cli.extension_dir {
        config.extension_dir = dir.clone();
    }
    Ok(config)
}

fn run(command: Commands, ctx: &Context) -> Result<()> {
    match command {
        Commands::Init => commands::cmd_init(ctx),
        Commands::Exec { sql, file } => commands::cmd_exec(ctx, sql.as_deref(), file.as_deref()),

        Commands::Install {
            name,
            version,
            script,
            description,
            requires,
        } => commands::cmd_install(ctx, &name, &version, &script, description.as_deref(), &requires),
        Commands::InstallLocal { path, name, version } => {
            commands::cmd_install_local(ctx, &path, &name, &version)
        }
        Commands::InstallVersion {
            name,
            version,
            script,
        } => commands::cmd_install_version(ctx, &name, &version, &script),
        Commands::InstallUpdatePath {
            name,
            from,
            to,
            script,
        } => commands::cmd_install_update_path(ctx, &name, &from, &to, &script),
        Commands::UninstallUpdatePath {
            name,
            from,
            to,
            if_exists,
        } => commands::cmd_uninstall_update_path(ctx, &name, &from, &to, if_exists),
        Commands::Uninstall {
            name,
            version,
            if_exists,
        } => commands::cmd_uninstall(ctx, &name, version.as_deref(), if_exists),
        Commands::SetDefaultVersion { name, version } => {
            commands::cmd_set_default_version(ctx, &name, &version)
        }
        Commands::Available => commands::cmd_available(ctx),
        Commands::Versions => commands::cmd_versions(ctx),
        Commands::UpdatePaths { name } => commands::cmd_update_paths(ctx, &name),

        Commands::Role(role_cmd) => match role_cmd {
            RoleCommands::List => commands::cmd_role_list(ctx),
            RoleCommands::Create {
                name,
                superuser,
                can_create,
            } => commands::cmd_role_create(ctx, &name, superuser, can_create),
            RoleCommands::Grant { role, member } => commands::cmd_role_grant(ctx, &role, &member),
            RoleCommands::Revoke { role, member } => commands::cmd_role_revoke(ctx, &role, &member),
        },

        Commands::Feature(feature_cmd) => match feature_cmd {
            FeatureCommands::List { feature } => commands::cmd_feature_list(ctx, &feature),
            FeatureCommands::Register {
                proc,
                feature,
                if_not_exists,
            } => commands::cmd_feature_register(ctx, &proc, &feature, if_not_exists),
            FeatureCommands::Unregister {
                proc,
                feature,
                if_exists,
            } => commands::cmd_feature_unregister(ctx, &proc, &feature, if_exists),
        },
    }
}
