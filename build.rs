// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: extension name
fn name_arg() -> Arg {
    Arg::new("name").required(true).help("Extension name")
}

/// Common argument: script file
fn script_arg() -> Arg {
    Arg::new("script").required(true).help("Script file")
}

fn build_cli() -> Command {
    Command::new("tlext")
        .version(env!("CARGO_PKG_VERSION"))
        .author("tlext contributors")
        .about("Trusted language extensions for SQLite catalogs")
        .subcommand_required(true)
        .arg(Arg::new("config").short('c').long("config").global(true).help("Configuration file"))
        .arg(Arg::new("db_path").short('d').long("db-path").global(true).help("Catalog database"))
        .arg(Arg::new("extension_dir").long("extension-dir").global(true).help("Extension directory"))
        .arg(Arg::new("user").short('u').long("user").global(true).help("Role to connect as"))
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Print results as JSON"),
        )
        .subcommand(Command::new("init").about("Create the catalog database and install the tle extension"))
        .subcommand(
            Command::new("exec")
                .about("Execute SQL statements")
                .arg(Arg::new("sql").help("SQL text; read from --file or stdin when omitted"))
                .arg(Arg::new("file").short('f').long("file").help("Read SQL from a file")),
        )
        .subcommand(
            Command::new("install")
                .about("Store a new extension from a script file")
                .arg(name_arg())
                .arg(Arg::new("version").required(true).help("Version installed by the script"))
                .arg(script_arg())
                .arg(Arg::new("description").long("description").help("Extension description"))
                .arg(
                    Arg::new("requires")
                        .short('r')
                        .long("requires")
                        .value_delimiter(',')
                        .help("Required extensions"),
                ),
        )
        .subcommand(
            Command::new("install-local")
                .about("Store an extension from a control file and install script in a directory")
                .arg(Arg::new("path").required(true).help("Directory holding the files"))
                .arg(name_arg())
                .arg(Arg::new("version").required(true).help("Version to install")),
        )
        .subcommand(
            Command::new("install-version")
                .about("Add another installable version to a stored extension")
                .arg(name_arg())
                .arg(Arg::new("version").required(true))
                .arg(script_arg()),
        )
        .subcommand(
            Command::new("install-update-path")
                .about("Store an update script between two versions")
                .arg(name_arg())
                .arg(Arg::new("from").required(true))
                .arg(Arg::new("to").required(true))
                .arg(script_arg()),
        )
        .subcommand(
            Command::new("uninstall-update-path")
                .about("Remove a stored update script")
                .arg(name_arg())
                .arg(Arg::new("from").required(true))
                .arg(Arg::new("to").required(true))
                .arg(Arg::new("if_exists").long("if-exists").action(ArgAction::SetTrue)),
        )
        .subcommand(
            Command::new("uninstall")
                .about("Remove a stored extension or one of its versions")
                .arg(name_arg())
                .arg(Arg::new("version").help("Only remove this version"))
                .arg(Arg::new("if_exists").long("if-exists").action(ArgAction::SetTrue)),
        )
        .subcommand(
            Command::new("set-default-version")
                .about("Change the default version of a stored extension")
                .arg(name_arg())
                .arg(Arg::new("version").required(true)),
        )
        .subcommand(Command::new("available").about("List stored extensions"))
        .subcommand(Command::new("versions").about("List installable versions of stored extensions"))
        .subcommand(
            Command::new("update-paths")
                .about("List update paths between versions of a stored extension")
                .arg(name_arg()),
        )
        .subcommand(
            Command::new("role")
                .about("Role management")
                .subcommand(Command::new("list").about("List roles and their memberships"))
                .subcommand(
                    Command::new("create")
                        .about("Create a role")
                        .arg(Arg::new("name").required(true))
                        .arg(Arg::new("superuser").long("superuser").action(ArgAction::SetTrue))
                        .arg(Arg::new("can_create").long("can-create").action(ArgAction::SetTrue)),
                )
                .subcommand(
                    Command::new("grant")
                        .about("Grant membership in a role")
                        .arg(Arg::new("role").required(true))
                        .arg(Arg::new("member").required(true)),
                )
                .subcommand(
                    Command::new("revoke")
                        .about("Revoke membership in a role")
                        .arg(Arg::new("role").required(true))
                        .arg(Arg::new("member").required(true)),
                ),
        )
        .subcommand(
            Command::new("feature")
                .about("Feature registry")
                .subcommand(
                    Command::new("list")
                        .about("Show the functions registered for a feature")
                        .arg(Arg::new("feature").required(true)),
                )
                .subcommand(
                    Command::new("register")
                        .about("Register a function for a feature")
                        .arg(Arg::new("proc").required(true))
                        .arg(Arg::new("feature").required(true))
                        .arg(Arg::new("if_not_exists").long("if-not-exists").action(ArgAction::SetTrue)),
                )
                .subcommand(
                    Command::new("unregister")
                        .about("Unregister a function")
                        .arg(Arg::new("proc").required(true))
                        .arg(Arg::new("feature").required(true))
                        .arg(Arg::new("if_exists").long("if-exists").action(ArgAction::SetTrue)),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("tlext.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
