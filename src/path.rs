//!
//! src/path.rs  Oct 16th, 2026
//!
//! Normalization of absolute media paths. Both catalogs report the same
//! files, so two paths only match when they are byte-identical after
//! this pass. No case folding, no basename or extension fallback.
//!

use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NormalizedPath(String);

impl NormalizedPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathError {
    #[error("empty path")]
    Empty,
    #[error("path contains NUL")]
    ContainsNul,
    #[error("path is not absolute")]
    Relative,
}

/// Prefix style of an absolute path
enum Root<'a> {
    Posix,
    Drive(&'a str),     // "C:"
    Unc,                // "\\server\share"
}

fn is_sep(c: char) -> bool {
    c == '/' || c == '\\'
}

fn split_root(raw: &str) -> Result<(Root<'_>, &str), PathError> {
    let bytes = raw.as_bytes();
    // only backslashes open a UNC root, "//x" is a posix path
    if raw.starts_with("\\\\") {
        return Ok((Root::Unc, &raw[2..]));
    }
    if raw.starts_with('/') {
        return Ok((Root::Posix, &raw[1..]));
    }
    if bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && is_sep(bytes[2] as char)
    {
        return Ok((Root::Drive(&raw[..2]), &raw[3..]));
    }
    Err(PathError::Relative)
}

/// Collapse separators, drop `.` and resolve `..` lexically, clamped at
/// the first segment handed in
fn resolve_segments<'a>(parts: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut segments: Vec<&str> = Vec::new();
    for seg in parts {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments
}

pub fn normalize(raw: &str) -> Result<NormalizedPath, PathError> {
    if raw.trim().is_empty() {
        return Err(PathError::Empty);
    }
    if raw.contains('\0') {
        return Err(PathError::ContainsNul);
    }

    let (root, rest) = split_root(raw)?;
    let normalized = match root {
        Root::Posix => {
            let segments = resolve_segments(rest.split('/'));
            format!("/{}", segments.join("/"))
        }
        Root::Drive(drive) => {
            let segments = resolve_segments(rest.split(is_sep));
            format!("{drive}\\{}", segments.join("\\"))
        }
        Root::Unc => {
            // server and share are the root, `..` never climbs above them
            let mut parts = rest.split(is_sep).filter(|s| !s.is_empty());
            let (Some(server), Some(share)) = (parts.next(), parts.next()) else {
                return Err(PathError::Relative);
            };
            if [server, share].iter().any(|s| *s == "." || *s == "..") {
                return Err(PathError::Relative);
            }
            let mut unc = format!("\\\\{server}\\{share}");
            for seg in resolve_segments(parts) {
                unc.push('\\');
                unc.push_str(seg);
            }
            unc
        }
    };
    Ok(NormalizedPath(normalized))
}
