//! Portable file and folder names.
//!
//! [`valid_filename`] removes characters that are invalid on Linux, Windows,
//! MS-DOS or Macintosh and trims the edges that confuse shells and file
//! systems:
//!
//! - characters with a code point of 31 or less
//! - `\ / : * ? " > < |`
//! - spaces at both ends, `.` at the end, `-` at the start
//!
//! Windows/MS-DOS reserved device names are rejected.

use std::path::{is_separator, MAIN_SEPARATOR};

use serde::{Deserialize, Serialize};

use crate::error::{FileError, FileResult};

/// Characters forbidden by Windows in addition to control characters.
const FORBIDDEN_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '>', '<', '|'];

const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

const POSIX_MAX_LEN: usize = 14;
const MSDOS_BASE_LEN: usize = 8;
/// Extension length including the dot.
const MSDOS_EXT_LEN: usize = 4;

/// Flags of [`valid_filename`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilenameOptions {
    /// The input is a path: only its last component is sanitized and the
    /// directory part is kept as is.
    pub full_path: bool,
    /// Keep only the POSIX portable set: ASCII letters, digits, `.`, `-`
    /// and `_`.
    pub posix_chars: bool,
    /// Remove every `-` (ISO 9660 level 1).
    pub iso9660: bool,
    /// Limit the name to 14 characters.
    pub posix_length: bool,
    /// Limit the name to 8 characters plus a 3 character extension.
    pub msdos_length: bool,
    /// Fail on a name that is too long instead of truncating it.
    pub length_error: bool,
}

/// Return a sanitized version of `name`.
///
/// # Examples
///
/// ```
/// use skio_file::names::{valid_filename, FilenameOptions};
///
/// let opts = FilenameOptions::default();
/// assert_eq!(valid_filename(" -report?.txt. ", &opts).unwrap(), "report.txt");
/// assert!(valid_filename("CON", &opts).is_err());
/// ```
pub fn valid_filename(name: &str, opts: &FilenameOptions) -> FileResult<String> {
    let (directory, name) = if opts.full_path {
        split_directory(name)
    } else {
        ("", name)
    };

    let mut valid: String = if opts.posix_chars {
        name.chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
            .collect()
    } else {
        name.chars()
            .filter(|c| *c as u32 > 31 && !FORBIDDEN_CHARS.contains(c))
            .collect()
    };

    if opts.iso9660 {
        valid.retain(|c| c != '-');
    }

    let mut valid = trim_edges(&valid);
    if valid.is_empty() {
        return Err(FileError::InvalidFilename(
            "all characters in filename are invalid".into(),
        ));
    }

    if opts.msdos_length {
        let (base, ext) = split_extension(&valid);
        let mut base = base.to_string();
        let mut ext = ext.to_string();
        if base.chars().count() > MSDOS_BASE_LEN {
            if opts.length_error {
                return Err(FileError::InvalidFilename(
                    "filename too long for MS-DOS (8 characters)".into(),
                ));
            }
            base = base.chars().take(MSDOS_BASE_LEN).collect();
        }
        if ext.chars().count() > MSDOS_EXT_LEN {
            if opts.length_error {
                return Err(FileError::InvalidFilename(
                    "extension too long for MS-DOS (3 characters)".into(),
                ));
            }
            ext = ext.chars().take(MSDOS_EXT_LEN).collect();
        }
        valid = trim_edges(&(base + &ext));
    }

    if opts.posix_length && valid.chars().count() > POSIX_MAX_LEN {
        if opts.length_error {
            return Err(FileError::InvalidFilename(
                "filename too long for POSIX (14 characters)".into(),
            ));
        }
        valid = trim_edges(&valid.chars().take(POSIX_MAX_LEN).collect::<String>());
    }

    if RESERVED_NAMES.contains(&valid.as_str()) {
        return Err(FileError::InvalidFilename(format!(
            "filename is a Windows/MS-DOS reserved name: {valid}"
        )));
    }

    Ok(join_directory(directory, &valid))
}

/// Strip surrounding whitespace, trailing dots and leading dashes until
/// none is left.
fn trim_edges(name: &str) -> String {
    let mut current = name;
    loop {
        let next = current
            .trim()
            .trim_end_matches('.')
            .trim_start_matches('-');
        if next.len() == current.len() {
            return next.to_string();
        }
        current = next;
    }
}

/// `("dir", "name")` for `"dir/name"`. Trailing separators of the directory
/// are dropped unless it is the root.
fn split_directory(path: &str) -> (&str, &str) {
    match path.rfind(is_separator) {
        Some(idx) => {
            let head = &path[..=idx];
            let trimmed = head.trim_end_matches(is_separator);
            let directory = if trimmed.is_empty() { head } else { trimmed };
            (directory, &path[idx + 1..])
        }
        None => ("", path),
    }
}

fn join_directory(directory: &str, name: &str) -> String {
    if directory.is_empty() {
        name.to_string()
    } else if directory.ends_with(is_separator) {
        format!("{directory}{name}")
    } else {
        format!("{directory}{MAIN_SEPARATOR}{name}")
    }
}

/// `("archive.tar", ".gz")`. Leading dots never start an extension.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if name[..idx].chars().any(|c| c != '.') => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sanitize(name: &str, opts: FilenameOptions) -> FileResult<String> {
        valid_filename(name, &opts)
    }

    fn message(result: FileResult<String>) -> String {
        result.unwrap_err().to_string()
    }

    #[test]
    fn removes_representative_invalid_characters() {
        let name = " - --  a*sf/J|<IZ?E->p\u{1f}v\\64\"8d:f.gfg. ... .";
        assert_eq!(
            sanitize(name, FilenameOptions::default()).unwrap(),
            "asfJIZE-pv648df.gfg"
        );
    }

    #[test]
    fn full_path_keeps_directory() {
        let path = format!("{MAIN_SEPARATOR}skio{MAIN_SEPARATOR}test{MAIN_SEPARATOR}test_system.py");
        let opts = FilenameOptions {
            full_path: true,
            ..Default::default()
        };
        assert_eq!(sanitize(&path, opts).unwrap(), path);
        assert_eq!(
            sanitize(&path, FilenameOptions::default()).unwrap(),
            "skiotesttest_system.py"
        );
    }

    #[test]
    fn full_path_sanitizes_last_component_only() {
        let opts = FilenameOptions {
            full_path: true,
            ..Default::default()
        };
        let path = format!("data{MAIN_SEPARATOR}-run?1.");
        assert_eq!(
            sanitize(&path, opts).unwrap(),
            format!("data{MAIN_SEPARATOR}run1")
        );
        let root = format!("{MAIN_SEPARATOR}file*");
        assert_eq!(sanitize(&root, opts).unwrap(), format!("{MAIN_SEPARATOR}file"));
    }

    #[test]
    fn iso9660_removes_dashes() {
        let opts = FilenameOptions {
            iso9660: true,
            ..Default::default()
        };
        assert_eq!(sanitize("--d1d5s1--11sd--dd--", opts).unwrap(), "d1d5s111sddd");
    }

    #[test]
    fn posix_chars_keep_portable_set() {
        let opts = FilenameOptions {
            posix_chars: true,
            ..Default::default()
        };
        let name = " - --  a*sf/J|<I,;çZ?E->p_%ésv\\64\"8d&+:f.gfg. ... .";
        assert_eq!(sanitize(name, opts).unwrap(), "asfJIZE-p_sv648df.gfg");
    }

    #[test]
    fn posix_length_truncates_or_fails() {
        let name = "12345678901234567890";
        let opts = FilenameOptions {
            posix_length: true,
            ..Default::default()
        };
        assert_eq!(sanitize(name, opts).unwrap(), "12345678901234");

        let strict = FilenameOptions {
            length_error: true,
            ..opts
        };
        assert!(message(sanitize(name, strict)).contains("filename too long for POSIX"));
    }

    #[test]
    fn msdos_length_truncates_base_and_extension() {
        let opts = FilenameOptions {
            msdos_length: true,
            ..Default::default()
        };
        assert_eq!(sanitize("1234567890.123456", opts).unwrap(), "12345678.123");
        assert_eq!(sanitize("1234567890.txt", opts).unwrap(), "12345678.txt");
        assert_eq!(sanitize("report.jpeg", opts).unwrap(), "report.jpe");
        assert_eq!(sanitize(".profile", opts).unwrap(), ".profile");
    }

    #[test]
    fn msdos_length_errors() {
        let opts = FilenameOptions {
            msdos_length: true,
            length_error: true,
            ..Default::default()
        };
        assert!(message(sanitize("1234567890.123", opts)).contains("filename too long for MS-DOS"));
        assert!(
            message(sanitize("12345678.123456", opts)).contains("extension too long for MS-DOS")
        );
        assert_eq!(sanitize("12345678.123", opts).unwrap(), "12345678.123");
    }

    #[test]
    fn reserved_names_are_rejected() {
        for name in RESERVED_NAMES {
            let msg = message(sanitize(name, FilenameOptions::default()));
            assert!(msg.contains("filename is a Windows/MS-DOS reserved name"));
        }
        assert_eq!(sanitize("CONSOLE", FilenameOptions::default()).unwrap(), "CONSOLE");
    }

    #[test]
    fn empty_result_is_rejected() {
        assert!(message(sanitize(" ", FilenameOptions::default()))
            .contains("all characters in filename are invalid"));
        assert!(sanitize("-..", FilenameOptions::default()).is_err());
    }

    #[test]
    fn options_from_partial_json() {
        let opts: FilenameOptions = serde_json::from_str(r#"{"posix_chars": true}"#).unwrap();
        assert!(opts.posix_chars);
        assert!(!opts.full_path);
    }
}
