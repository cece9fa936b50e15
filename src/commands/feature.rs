// src/commands/feature.rs

//! Feature registry CLI commands
//!
//! Registration goes through the `tle.*` functions so it gets the same
//! privilege checks as SQL callers.

use super::{Context, print_notices};
use anyhow::{Result, anyhow};
use std::str::FromStr;
use tlext::db::models::Feature;
use tlext::sql::quote_literal;
use tlext::{Session, Value};

fn call(session: &mut Session, function: &str, proc: &str, feature: &str) -> Result<bool> {
    let sql = format!(
        "SELECT tle.{}({}, {})",
        function,
        quote_literal(proc),
        quote_literal(feature)
    );
    let outcome = session.query(&sql);
    print_notices(session);
    Ok(outcome?.first_value() == Some(&Value::Bool(true)))
}

pub fn cmd_feature_list(ctx: &Context, feature: &str) -> Result<()> {
    let kind = Feature::from_str(feature).map_err(|e| anyhow!(e))?;
    let session = ctx.session()?;
    let procs = tlext::feature::feature_proc(session.conn(), kind)?;

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&procs)?);
        return Ok(());
    }
    if procs.is_empty() {
        println!("No functions registered for {}.", feature);
        return Ok(());
    }
    println!("Functions registered for {} ({}):", feature, procs.len());
    for proc in &procs {
        println!("  {}", proc);
    }
    Ok(())
}

pub fn cmd_feature_register(ctx: &Context, proc: &str, feature: &str, if_not_exists: bool) -> Result<()> {
    let mut session = ctx.session()?;
    let function = if if_not_exists {
        "register_feature_if_not_exists"
    } else {
        "register_feature"
    };
    if call(&mut session, function, proc, feature)? {
        println!("Registered {} for {}", proc, feature);
    } else {
        println!("{} is already registered for {}", proc, feature);
    }
    Ok(())
}

pub fn cmd_feature_unregister(ctx: &Context, proc: &str, feature: &str, if_exists: bool) -> Result<()> {
    let mut session = ctx.session()?;
    let function = if if_exists {
        "unregister_feature_if_exists"
    } else {
        "unregister_feature"
    };
    if call(&mut session, function, proc, feature)? {
        println!("Unregistered {} from {}", proc, feature);
    } else {
        println!("{} is not registered for {}", proc, feature);
    }
    Ok(())
}
