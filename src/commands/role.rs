// src/commands/role.rs

//! Role management CLI commands

use super::Context;
use anyhow::{Result, anyhow, bail};
use serde::Serialize;
use tlext::Session;
use tlext::db::models::Role;
use tracing::info;

#[derive(Serialize)]
struct RoleRow {
    name: String,
    superuser: bool,
    can_create: bool,
    member_of: Vec<String>,
}

fn require_superuser(session: &Session, action: &str) -> Result<()> {
    if !session.is_superuser()? {
        bail!("permission denied to {}: {} is not a superuser", action, session.current_user().name);
    }
    Ok(())
}

fn lookup_oid(session: &Session, name: &str) -> Result<i64> {
    Role::find_by_name(session.conn(), name)?
        .and_then(|role| role.oid)
        .ok_or_else(|| anyhow!("role \"{}\" does not exist", name))
}

pub fn cmd_role_list(ctx: &Context) -> Result<()> {
    let session = ctx.session()?;
    let mut rows = Vec::new();
    for role in Role::list_all(session.conn())? {
        let member_of = match role.oid {
            Some(oid) => Role::member_of(session.conn(), oid)?,
            None => Vec::new(),
        };
        rows.push(RoleRow {
            name: role.name,
            superuser: role.superuser,
            can_create: role.can_create,
            member_of,
        });
    }

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("Roles ({}):", rows.len());
    for row in &rows {
        let mut flags = Vec::new();
        if row.superuser {
            flags.push("superuser");
        }
        if row.can_create {
            flags.push("create");
        }
        print!("  {}", row.name);
        if !flags.is_empty() {
            print!(" [{}]", flags.join(", "));
        }
        if !row.member_of.is_empty() {
            print!(" member of {}", row.member_of.join(", "));
        }
        println!();
    }
    Ok(())
}

pub fn cmd_role_create(ctx: &Context, name: &str, superuser: bool, can_create: bool) -> Result<()> {
    let session = ctx.session()?;
    require_superuser(&session, "create role")?;

    let mut role = Role::new(name.to_string());
    role.superuser = superuser;
    role.can_create = can_create;
    role.insert(session.conn())?;
    info!("Created role {}", name);
    println!("Created role {}", name);
    Ok(())
}

pub fn cmd_role_grant(ctx: &Context, role: &str, member: &str) -> Result<()> {
    let session = ctx.session()?;
    require_superuser(&session, "grant role")?;

    let role_oid = lookup_oid(&session, role)?;
    let member_oid = lookup_oid(&session, member)?;
    if role_oid == member_oid {
        bail!("role \"{}\" cannot be a member of itself", role);
    }
    Role::grant_membership(session.conn(), role_oid, member_oid)?;
    info!("Granted {} to {}", role, member);
    println!("Granted {} to {}", role, member);
    Ok(())
}

pub fn cmd_role_revoke(ctx: &Context, role: &str, member: &str) -> Result<()> {
    let session = ctx.session()?;
    require_superuser(&session, "revoke role")?;

    let role_oid = lookup_oid(&session, role)?;
    let member_oid = lookup_oid(&session, member)?;
    Role::revoke_membership(session.conn(), role_oid, member_oid)?;
    info!("Revoked {} from {}", role, member);
    println!("Revoked {} from {}", role, member);
    Ok(())
}

