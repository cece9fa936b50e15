// src/extension/native.rs

//! File-based extensions
//!
//! Handles the extension commands the stored-extension interceptor passed
//! on: CREATE and ALTER EXTENSION read control files and scripts from the
//! configured extension directory, and DROP EXTENSION works for both kinds.

use super::source::ExtensionSource;
use super::{create, drop, update};
use crate::error::Result;
use crate::interceptor::{Next, Origin, StatementHandler};
use crate::session::Session;
use crate::sql::{QueryResult, Statement};

pub struct NativeExtensionHandler;

impl StatementHandler for NativeExtensionHandler {
    fn name(&self) -> &'static str {
        "native-extension"
    }

    fn handle(&self, session: &mut Session, stmt: Statement, origin: Origin, next: Next<'_>) -> Result<QueryResult> {
        match stmt {
            Statement::CreateExtension(cmd) => {
                let source = ExtensionSource::files(session.config());
                create::create_extension(session, &source, &cmd)
            }
            Statement::AlterExtensionUpdate(cmd) => {
                let source = ExtensionSource::files(session.config());
                update::alter_extension_update(session, &source, &cmd)
            }
            Statement::DropExtension(cmd) => drop::drop_extensions(session, &cmd),
            other => next.run(session, other, origin),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::db::models::Extension;
    use crate::testutil;

    #[test]
    fn test_file_extension_create_update_drop() {
        let dir = testutil::extension_dir(&[
            ("files.control", "default_version = '1.0'\ncomment = 'from disk'\n"),
            ("files--1.0.sql", "CREATE TABLE files_t(a int);"),
            ("files--1.0--1.1.sql", "ALTER TABLE files_t ADD COLUMN b int;"),
        ]);
        let mut session = testutil::session_with_extension_dir(dir.path().to_path_buf());

        session.execute("CREATE EXTENSION files").unwrap();
        let ext = Extension::find_by_name(session.conn(), "files").unwrap().unwrap();
        assert_eq!(ext.comment.as_deref(), Some("from disk"));

        session.execute("ALTER EXTENSION files UPDATE TO '1.1'").unwrap();
        session.execute("INSERT INTO files_t (a, b) VALUES (1, 2)").unwrap();

        session.execute("DROP EXTENSION files").unwrap();
        assert!(Extension::find_by_name(session.conn(), "files").unwrap().is_none());
        assert!(session.execute("SELECT * FROM files_t").is_err());
    }

    #[test]
    fn test_file_extension_wins_over_stored() {
        let dir = testutil::extension_dir(&[
            ("twin.control", "default_version = '1.0'\ncomment = 'file twin'\n"),
            ("twin--1.0.sql", "SELECT 1;"),
        ]);
        let mut session = testutil::session_with_extension_dir(dir.path().to_path_buf());
        let err = crate::extension::manage::install_extension(&mut session, "twin", "1.0", "stored", "SELECT 1;", &[])
            .unwrap_err();
        assert_eq!(err.to_string(), "control file already exists for the twin extension");

        session.execute("CREATE EXTENSION twin").unwrap();
        let ext = Extension::find_by_name(session.conn(), "twin").unwrap().unwrap();
        assert_eq!(ext.comment.as_deref(), Some("file twin"));
    }
}
