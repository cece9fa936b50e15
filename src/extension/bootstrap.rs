// src/extension/bootstrap.rs

//! The engine's own extension
//!
//! `tle` ships as real control and script files. Installing it creates the
//! management functions in the reserved schema; the interceptor only claims
//! statements while it is installed.

use super::names::VirtualFile;
use crate::config::Config;
use crate::db::{self, models::Extension};
use crate::error::{Error, Result};
use crate::session::Session;
use rusqlite::Connection;
use tracing::info;

/// Name of the engine extension
pub const TLE_EXTENSION: &str = "tle";

pub fn engine_installed(conn: &Connection) -> Result<bool> {
    Ok(Extension::oid_of(conn, TLE_EXTENSION)?.is_some())
}

/// Oid of the engine extension; an error when it is not installed
pub fn engine_oid(conn: &Connection) -> Result<i64> {
    Extension::oid_of(conn, TLE_EXTENSION)?
        .ok_or_else(|| Error::Internal(format!("could not find extension {}", TLE_EXTENSION)))
}

/// True when `tle.control` exists in the extension directory
pub fn engine_control_file_exists(config: &Config) -> bool {
    config
        .extension_dir
        .join(VirtualFile::control(TLE_EXTENSION).file_name())
        .is_file()
}

/// Install the engine extension in an open session
pub fn install_engine(session: &mut Session) -> Result<()> {
    session.execute(&format!("CREATE EXTENSION IF NOT EXISTS {}", TLE_EXTENSION))?;
    Ok(())
}

/// Create the catalog database and install the engine extension as the
/// bootstrap role
pub fn initialize(config: &Config) -> Result<()> {
    db::init(&config.db_path, &config.bootstrap_role)?;
    let mut session = Session::open(config.clone(), None)?;
    install_engine(&mut session)?;
    info!("Installed extension {} in {}", TLE_EXTENSION, config.db_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[test]
    fn test_engine_installed_after_bootstrap() {
        let session = testutil::session();
        assert!(engine_installed(session.conn()).unwrap());
        assert!(engine_control_file_exists(session.config()));
        assert!(engine_oid(session.conn()).is_ok());
    }

    #[test]
    fn test_fresh_catalog_has_no_engine() {
        let session = Session::open_in_memory().unwrap();
        assert!(!engine_installed(session.conn()).unwrap());
        assert!(engine_oid(session.conn()).is_err());
    }

    #[test]
    fn test_initialize_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            db_path: dir.path().join("catalog.db"),
            extension_dir: testutil::share_extension_dir(),
            ..Config::default()
        };
        initialize(&config).unwrap();
        initialize(&config).unwrap();

        let session = Session::open(config, None).unwrap();
        assert!(engine_installed(session.conn()).unwrap());
    }
}
