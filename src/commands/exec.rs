// src/commands/exec.rs

//! Catalog initialization and raw SQL execution

use super::{Context, print_notices, print_result};
use anyhow::{Context as _, Result};
use std::io::Read;
use std::path::Path;
use tracing::info;

/// Create the catalog and install the engine extension
pub fn cmd_init(ctx: &Context) -> Result<()> {
    info!("Initializing catalog at {}", ctx.config.db_path.display());
    tlext::extension::bootstrap::initialize(&ctx.config).with_context(|| {
        format!("Failed to initialize catalog {}", ctx.config.db_path.display())
    })?;
    println!("Catalog initialized at {}", ctx.config.db_path.display());
    Ok(())
}

/// Run SQL from the argument, a file or stdin
pub fn cmd_exec(ctx: &Context, sql: Option<&str>, file: Option<&Path>) -> Result<()> {
    let text = match (sql, file) {
        (Some(sql), _) => sql.to_string(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, None) => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read SQL from stdin")?;
            buf
        }
    };

    let mut session = ctx.session()?;
    let outcome = session.execute(&text);
    print_notices(&mut session);
    for result in outcome? {
        print_result(&result, ctx.json)?;
    }
    Ok(())
}
