// src/extension/source.rs

//! Where control files and scripts are read from
//!
//! The engine runs the same way for both sources; only lookups differ.
//! File-based extensions live in the configured extension directory, stored
//! extensions in the virtual file store.

use super::control::ExtensionControl;
use super::names::{CONTROL_SUFFIX, SCRIPT_SUFFIX, VirtualFile};
use super::store;
use crate::config::Config;
use crate::error::{Error, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionSource {
    /// Control files in `control_dir`; relative `directory` entries resolve
    /// against `share_dir`
    Files {
        control_dir: PathBuf,
        share_dir: PathBuf,
    },
    /// Virtual files in the reserved schema
    Stored,
}

impl ExtensionSource {
    pub fn files(config: &Config) -> Self {
        ExtensionSource::Files {
            control_dir: config.extension_dir.clone(),
            share_dir: config.share_dir(),
        }
    }

    /// File-based extensions take precedence over stored ones of the same
    /// name. Stored extensions are only seen while the engine extension is
    /// installed; anything else falls back to files so the native error
    /// reports the missing control file.
    pub fn resolve(conn: &Connection, config: &Config, name: &str) -> Result<Self> {
        let files = Self::files(config);
        if files.control_exists(conn, name)? {
            return Ok(files);
        }
        if super::bootstrap::engine_installed(conn)? && ExtensionSource::Stored.control_exists(conn, name)? {
            return Ok(ExtensionSource::Stored);
        }
        Ok(files)
    }

    pub fn is_stored(&self) -> bool {
        matches!(self, ExtensionSource::Stored)
    }

    pub fn control_exists(&self, conn: &Connection, name: &str) -> Result<bool> {
        match self {
            ExtensionSource::Files { control_dir, .. } => {
                Ok(control_dir.join(VirtualFile::control(name).file_name()).is_file())
            }
            ExtensionSource::Stored => store::exists(conn, &VirtualFile::control(name)),
        }
    }

    fn not_available_hint(&self) -> &'static str {
        match self {
            ExtensionSource::Files { .. } => {
                "The extension must first be installed on the system where tlext is running."
            }
            ExtensionSource::Stored => "The extension must first be installed in the current database.",
        }
    }

    fn not_available(&self, extension: &str, detail: String) -> Error {
        Error::NotAvailable {
            message: format!("extension \"{}\" is not available", extension),
            detail: Some(detail),
            hint: Some(self.not_available_hint().to_string()),
        }
    }

    fn script_directory(&self, control: &ExtensionControl) -> Option<PathBuf> {
        match self {
            ExtensionSource::Files {
                control_dir,
                share_dir,
            } => Some(match control.directory.as_deref() {
                None => control_dir.clone(),
                Some(dir) if Path::new(dir).is_absolute() => PathBuf::from(dir),
                Some(dir) => share_dir.join(dir),
            }),
            ExtensionSource::Stored => None,
        }
    }

    /// Raw text of a file, `None` when missing
    fn read_text(&self, conn: &Connection, control: &ExtensionControl, file: &VirtualFile) -> Result<Option<String>> {
        match self {
            ExtensionSource::Files { control_dir, .. } => {
                let path = match file {
                    VirtualFile::Control { .. } => control_dir.join(file.file_name()),
                    _ => self
                        .script_directory(control)
                        .unwrap_or_else(|| control_dir.clone())
                        .join(file.file_name()),
                };
                match std::fs::read(&path) {
                    Ok(bytes) => {
                        let encoding = control.encoding.unwrap_or(super::control::Encoding::Utf8);
                        encoding.decode(&bytes).map(Some)
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                    Err(e) => Err(Error::Io(std::io::Error::new(
                        e.kind(),
                        format!("could not open extension file \"{}\": {}", path.display(), e),
                    ))),
                }
            }
            ExtensionSource::Stored => store::read(conn, file),
        }
    }

    /// Parse text into `control`, rewording syntax errors for stored files
    fn apply_text(&self, control: &mut ExtensionControl, text: &str, file: &VirtualFile, auxiliary: bool) -> Result<()> {
        let result = control.apply(text, &file.file_name(), auxiliary);
        match (self, result) {
            (ExtensionSource::Stored, Err(Error::Syntax { line, .. })) => Err(Error::Syntax {
                message: format!(
                    "syntax error in extension control function for \"{}\"",
                    control.name
                ),
                line,
            }),
            (_, result) => result,
        }
    }

    fn finish(&self, control: &mut ExtensionControl) -> Result<()> {
        if self.is_stored() {
            control.force_stored_values()?;
        }
        control.validate()
    }

    /// Read the primary control file
    pub fn read_control(&self, conn: &Connection, name: &str) -> Result<ExtensionControl> {
        let mut control = ExtensionControl::new(name);
        let file = VirtualFile::control(name);

        let text = self
            .read_text(conn, &control, &file)?
            .ok_or_else(|| self.not_available(name, format!("Could not find extension control file \"{}\".", file)))?;

        self.apply_text(&mut control, &text, &file, false)?;
        self.finish(&mut control)?;
        Ok(control)
    }

    /// Primary control overlaid with `name--version.control`, when present
    pub fn read_aux_control(&self, conn: &Connection, primary: &ExtensionControl, version: &str) -> Result<ExtensionControl> {
        let mut control = primary.clone();
        let file = VirtualFile::aux_control(&primary.name, version);

        if let Some(text) = self.read_text(conn, primary, &file)? {
            self.apply_text(&mut control, &text, &file, true)?;
            self.finish(&mut control)?;
        }
        Ok(control)
    }

    /// Sorted script names (`*.sql`) visible to this source
    pub fn script_names(&self, conn: &Connection, control: &ExtensionControl) -> Result<Vec<String>> {
        let mut names = match self.script_directory(control) {
            Some(dir) => {
                let entries = std::fs::read_dir(&dir).map_err(|e| {
                    Error::Io(std::io::Error::new(
                        e.kind(),
                        format!("could not open directory \"{}\": {}", dir.display(), e),
                    ))
                })?;
                let mut names = Vec::new();
                for entry in entries {
                    let entry = entry?;
                    if let Some(name) = entry.file_name().to_str() {
                        names.push(name.to_string());
                    }
                }
                names
            }
            None => store::list_names(conn)?,
        };
        names.retain(|n| n.ends_with(SCRIPT_SUFFIX));
        names.sort();
        Ok(names)
    }

    /// Names of every primary control file, sorted by extension name
    pub fn control_names(&self, conn: &Connection) -> Result<Vec<String>> {
        let mut names = match self {
            ExtensionSource::Files { control_dir, .. } => {
                let mut names = Vec::new();
                match std::fs::read_dir(control_dir) {
                    Ok(entries) => {
                        for entry in entries {
                            if let Some(name) = entry?.file_name().to_str() {
                                names.push(name.to_string());
                            }
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
                names
            }
            ExtensionSource::Stored => store::list_names(conn)?,
        };
        names.retain(|n| matches!(VirtualFile::parse(n), Some(VirtualFile::Control { .. })));
        names.sort();
        Ok(names
            .into_iter()
            .filter_map(|n| n.strip_suffix(CONTROL_SUFFIX).map(str::to_string))
            .collect())
    }

    /// Script text; a missing or empty script means the extension is not available
    pub fn read_script(&self, conn: &Connection, control: &ExtensionControl, file: &VirtualFile) -> Result<String> {
        debug!("Reading script {} for {}", file, control.name);
        match self.read_text(conn, control, file)? {
            Some(text) if !(self.is_stored() && text.is_empty()) => Ok(text),
            _ => Err(self.not_available(
                &control.name,
                format!("Could not find extension script file \"{}\".", file),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn files_source(dir: &Path) -> ExtensionSource {
        ExtensionSource::Files {
            control_dir: dir.to_path_buf(),
            share_dir: dir.parent().unwrap_or(dir).to_path_buf(),
        }
    }

    #[test]
    fn test_file_control_and_aux() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("demo.control"),
            "default_version = '1.0'\ncomment = 'demo'\nsuperuser = false\n",
        )
        .unwrap();
        fs::write(dir.path().join("demo--2.0.control"), "comment = 'second'\nrequires = 'a'\n").unwrap();
        fs::write(dir.path().join("demo--1.0.sql"), "SELECT 1;").unwrap();
        fs::write(dir.path().join("demo--1.0--2.0.sql"), "SELECT 2;").unwrap();
        fs::write(dir.path().join("README"), "ignored").unwrap();

        let conn = crate::db::open_in_memory("boot").unwrap();
        let source = files_source(dir.path());
        assert!(source.control_exists(&conn, "demo").unwrap());

        let control = source.read_control(&conn, "demo").unwrap();
        assert!(!control.superuser);
        let aux = source.read_aux_control(&conn, &control, "2.0").unwrap();
        assert_eq!(aux.comment.as_deref(), Some("second"));
        assert_eq!(aux.requires, vec!["a".to_string()]);
        let missing_aux = source.read_aux_control(&conn, &control, "1.0").unwrap();
        assert_eq!(missing_aux, control);

        assert_eq!(
            source.script_names(&conn, &control).unwrap(),
            vec!["demo--1.0--2.0.sql".to_string(), "demo--1.0.sql".to_string()]
        );
        assert_eq!(source.control_names(&conn).unwrap(), vec!["demo".to_string()]);
        assert_eq!(
            source
                .read_script(&conn, &control, &VirtualFile::install_script("demo", "1.0"))
                .unwrap(),
            "SELECT 1;"
        );
    }

    #[test]
    fn test_missing_control_is_not_available() {
        let dir = tempfile::tempdir().unwrap();
        let conn = crate::db::open_in_memory("boot").unwrap();
        let err = files_source(dir.path()).read_control(&conn, "nope").unwrap_err();
        assert_eq!(err.to_string(), "extension \"nope\" is not available");
        assert!(err.hint().unwrap().contains("on the system"));

        let err = ExtensionSource::Stored.read_control(&conn, "nope").unwrap_err();
        assert!(err.hint().unwrap().contains("current database"));
    }

    #[test]
    fn test_relative_directory() {
        let share = tempfile::tempdir().unwrap();
        let control_dir = share.path().join("extension");
        let scripts = share.path().join("demo_scripts");
        fs::create_dir_all(&control_dir).unwrap();
        fs::create_dir_all(&scripts).unwrap();
        fs::write(
            control_dir.join("demo.control"),
            "default_version = '1.0'\ndirectory = 'demo_scripts'\n",
        )
        .unwrap();
        fs::write(scripts.join("demo--1.0.sql"), "SELECT 1;").unwrap();

        let conn = crate::db::open_in_memory("boot").unwrap();
        let source = ExtensionSource::Files {
            control_dir,
            share_dir: share.path().to_path_buf(),
        };
        let control = source.read_control(&conn, "demo").unwrap();
        let script = source
            .read_script(&conn, &control, &VirtualFile::install_script("demo", "1.0"))
            .unwrap();
        assert_eq!(script, "SELECT 1;");
    }
}
