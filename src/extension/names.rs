// src/extension/names.rs

//! Extension and version names, and the virtual file names built from them
//!
//! Splitting `name--from--to.sql` on `--` only works because neither part may
//! contain `--` or start or end with `-`.

use crate::error::{Error, Result};
use std::fmt;

pub const CONTROL_SUFFIX: &str = ".control";
pub const SCRIPT_SUFFIX: &str = ".sql";

/// Reject a name that cannot be embedded in a virtual file name
pub fn check_valid_extension_name(name: &str) -> Result<()> {
    let invalid = |detail: &str| Error::InvalidName {
        message: format!("invalid extension name: \"{}\"", name),
        detail: detail.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("Extension names must not be empty."));
    }
    if name.contains("--") {
        return Err(invalid("Extension names must not contain \"--\"."));
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Err(invalid("Extension names must not begin or end with \"-\"."));
    }
    if name.contains(['/', '\\']) {
        return Err(invalid(
            "Extension names must not contain directory separator characters.",
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '@'))
    {
        return Err(invalid(
            "Extension names must only contain alphanumeric characters or valid separators.",
        ));
    }
    Ok(())
}

/// Same rules as extension names, with `.` also allowed
pub fn check_valid_version_name(version: &str) -> Result<()> {
    let invalid = |detail: &str| Error::InvalidName {
        message: format!("invalid extension version name: \"{}\"", version),
        detail: detail.to_string(),
    };

    if version.is_empty() {
        return Err(invalid("Version names must not be empty."));
    }
    if version.contains("--") {
        return Err(invalid("Version names must not contain \"--\"."));
    }
    if version.starts_with('-') || version.ends_with('-') {
        return Err(invalid("Version names must not begin or end with \"-\"."));
    }
    if version.contains(['/', '\\']) {
        return Err(invalid(
            "Version names must not contain directory separator characters.",
        ));
    }
    if !version
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '@' | '.'))
    {
        return Err(invalid(
            "Version names must only contain alphanumeric characters or valid separators.",
        ));
    }
    Ok(())
}

/// Identity of one control file or script
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VirtualFile {
    /// `name.control`
    Control { extension: String },
    /// `name--version.control`
    AuxControl { extension: String, version: String },
    /// `name--version.sql`
    InstallScript { extension: String, version: String },
    /// `name--from--to.sql`
    UpdateScript {
        extension: String,
        from: String,
        to: String,
    },
}

impl VirtualFile {
    pub fn control(extension: &str) -> Self {
        VirtualFile::Control {
            extension: extension.to_string(),
        }
    }

    pub fn aux_control(extension: &str, version: &str) -> Self {
        VirtualFile::AuxControl {
            extension: extension.to_string(),
            version: version.to_string(),
        }
    }

    pub fn install_script(extension: &str, version: &str) -> Self {
        VirtualFile::InstallScript {
            extension: extension.to_string(),
            version: version.to_string(),
        }
    }

    pub fn update_script(extension: &str, from: &str, to: &str) -> Self {
        VirtualFile::UpdateScript {
            extension: extension.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Script for one step: an install script without `from`, else an update
    pub fn script(extension: &str, from: Option<&str>, version: &str) -> Self {
        match from {
            Some(from) => Self::update_script(extension, from, version),
            None => Self::install_script(extension, version),
        }
    }

    pub fn extension(&self) -> &str {
        match self {
            VirtualFile::Control { extension }
            | VirtualFile::AuxControl { extension, .. }
            | VirtualFile::InstallScript { extension, .. }
            | VirtualFile::UpdateScript { extension, .. } => extension,
        }
    }

    pub fn file_name(&self) -> String {
        match self {
            VirtualFile::Control { extension } => format!("{}{}", extension, CONTROL_SUFFIX),
            VirtualFile::AuxControl { extension, version } => {
                format!("{}--{}{}", extension, version, CONTROL_SUFFIX)
            }
            VirtualFile::InstallScript { extension, version } => {
                format!("{}--{}{}", extension, version, SCRIPT_SUFFIX)
            }
            VirtualFile::UpdateScript {
                extension,
                from,
                to,
            } => format!("{}--{}--{}{}", extension, from, to, SCRIPT_SUFFIX),
        }
    }

    /// Classify a file name; `None` for names that follow neither grammar
    pub fn parse(file_name: &str) -> Option<Self> {
        if let Some(stem) = file_name.strip_suffix(CONTROL_SUFFIX) {
            return match stem.split_once("--") {
                None => Some(Self::control(stem)),
                Some((ext, version)) if !version.contains("--") => {
                    Some(Self::aux_control(ext, version))
                }
                Some(_) => None,
            };
        }

        let stem = file_name.strip_suffix(SCRIPT_SUFFIX)?;
        let (ext, rest) = stem.split_once("--")?;
        match rest.split_once("--") {
            None => Some(Self::install_script(ext, rest)),
            Some((from, to)) if !to.contains("--") => Some(Self::update_script(ext, from, to)),
            Some(_) => None,
        }
    }
}

impl fmt::Display for VirtualFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail(err: Error) -> String {
        err.detail().unwrap_or_default().to_string()
    }

    #[test]
    fn test_valid_names() {
        for name in ["pg_foo", "a", "my-ext", "x@y", "Ext2"] {
            check_valid_extension_name(name).unwrap();
        }
        for version in ["1.0", "2.0.1-beta", "v@1_2"] {
            check_valid_version_name(version).unwrap();
        }
    }

    #[test]
    fn test_invalid_extension_names() {
        let err = check_valid_extension_name("a--b").unwrap_err();
        assert_eq!(err.to_string(), "invalid extension name: \"a--b\"");
        assert_eq!(detail(err), "Extension names must not contain \"--\".");

        assert!(detail(check_valid_extension_name("").unwrap_err()).contains("empty"));
        assert!(detail(check_valid_extension_name("-a").unwrap_err()).contains("begin or end"));
        assert!(detail(check_valid_extension_name("a-").unwrap_err()).contains("begin or end"));
        assert!(detail(check_valid_extension_name("a/b").unwrap_err()).contains("separator"));
        assert!(detail(check_valid_extension_name("a.b").unwrap_err()).contains("alphanumeric"));
        assert!(detail(check_valid_extension_name("a;drop").unwrap_err()).contains("alphanumeric"));
    }

    #[test]
    fn test_invalid_version_names() {
        let err = check_valid_version_name("1--2").unwrap_err();
        assert_eq!(err.to_string(), "invalid extension version name: \"1--2\"");
        assert!(check_valid_version_name("").is_err());
        assert!(check_valid_version_name("1.0-").is_err());
        assert!(check_valid_version_name("..\\1").is_err());
        assert!(check_valid_version_name("1'0").is_err());
    }

    #[test]
    fn test_file_names() {
        assert_eq!(VirtualFile::control("e").file_name(), "e.control");
        assert_eq!(VirtualFile::aux_control("e", "1.0").file_name(), "e--1.0.control");
        assert_eq!(VirtualFile::script("e", None, "1.0").file_name(), "e--1.0.sql");
        assert_eq!(
            VirtualFile::script("e", Some("1.0"), "1.1").file_name(),
            "e--1.0--1.1.sql"
        );
    }

    #[test]
    fn test_parse_file_names() {
        assert_eq!(VirtualFile::parse("e.control"), Some(VirtualFile::control("e")));
        assert_eq!(
            VirtualFile::parse("e--1.0.control"),
            Some(VirtualFile::aux_control("e", "1.0"))
        );
        assert_eq!(
            VirtualFile::parse("e--1.0--2.0.sql"),
            Some(VirtualFile::update_script("e", "1.0", "2.0"))
        );
        assert_eq!(VirtualFile::parse("e--1--2--3.sql"), None);
        assert_eq!(VirtualFile::parse("e.sql"), None);
        assert_eq!(VirtualFile::parse("install_extension"), None);
    }
}
