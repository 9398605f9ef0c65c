//! Path helpers for the `/`-delimited namespace.
//!
//! Paths are absolute, contain no empty, `.` or `..` segments and no NUL
//! characters. Only the root path may end with `/`.

use crate::constants::PATH_SEPARATOR;
use crate::constants::PROTECTED_PREFIX;
use crate::constants::PROTECTED_SEPARATOR;
use crate::constants::ROOT_PATH;
use crate::constants::SEQUENCE_DIGITS;
use crate::CoordinationError;

pub(crate) fn validate_path(path: &str) -> Result<(), CoordinationError> {
    if path.is_empty() {
        return Err(CoordinationError::invalid_path(path, "path cannot be empty"));
    }
    if !path.starts_with(PATH_SEPARATOR) {
        return Err(CoordinationError::invalid_path(path, "path must start with '/'"));
    }
    if path == ROOT_PATH {
        return Ok(());
    }
    if path.ends_with(PATH_SEPARATOR) {
        return Err(CoordinationError::invalid_path(path, "path must not end with '/'"));
    }
    if path.contains('\0') {
        return Err(CoordinationError::invalid_path(path, "path contains a null character"));
    }
    for segment in path[1..].split(PATH_SEPARATOR) {
        match segment {
            "" => return Err(CoordinationError::invalid_path(path, "empty path segment")),
            "." | ".." => {
                return Err(CoordinationError::invalid_path(path, "relative path segment"))
            }
            _ => {}
        }
    }
    Ok(())
}

/// Validates the requested path of a sequential create.
///
/// The last segment may be empty (`/queue/`) since the counter alone can form the name.
pub(crate) fn validate_sequential_prefix(path: &str) -> Result<(), CoordinationError> {
    validate_path(&format!("{path}0")).map_err(|e| match e {
        CoordinationError::InvalidPath { reason, .. } => {
            CoordinationError::invalid_path(path, reason)
        }
        other => other,
    })
}

/// `/a/b` -> `/a`, `/a` -> `/`, `/` -> None
pub(crate) fn parent_of(path: &str) -> Option<&str> {
    if path == ROOT_PATH {
        return None;
    }
    match path.rfind(PATH_SEPARATOR) {
        Some(0) => Some(ROOT_PATH),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// Last segment of `path` (empty for the root)
pub(crate) fn node_name(path: &str) -> &str {
    match path.rfind(PATH_SEPARATOR) {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

pub(crate) fn join(
    parent: &str,
    name: &str,
) -> String {
    if parent == ROOT_PATH {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Every proper ancestor of `path` except the root, outermost first.
///
/// `/a/b/c` -> [`/a`, `/a/b`]
pub(crate) fn ancestors(path: &str) -> Vec<&str> {
    path.match_indices(PATH_SEPARATOR)
        .map(|(idx, _)| idx)
        .filter(|idx| *idx > 0)
        .map(|idx| &path[..idx])
        .collect()
}

/// Appends the zero-padded sequential counter to `path`.
///
/// The padding is a minimum width: from the 10^10th create under one parent
/// the suffix grows to 11 digits, and names sort in creation order only among
/// suffixes of equal width.
pub(crate) fn with_sequence(
    path: &str,
    sequence: u64,
) -> String {
    format!("{path}{sequence:0width$}", width = SEQUENCE_DIGITS)
}

/// Naming of one protected create
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProtectedName {
    pub(crate) parent: String,
    /// `_c_{token}-`; identifies the node among its siblings
    pub(crate) prefix: String,
    /// Requested path with the protected name substituted
    pub(crate) path: String,
}

/// `/a/lock` + `tok` -> parent `/a`, prefix `_c_tok-`, path `/a/_c_tok-lock`
pub(crate) fn protect(
    path: &str,
    token: &str,
) -> Result<ProtectedName, CoordinationError> {
    validate_sequential_prefix(path)?;
    let parent = parent_of(path)
        .ok_or_else(|| CoordinationError::invalid_path(path, "the root node cannot be protected"))?;
    let prefix = format!("{PROTECTED_PREFIX}{token}{PROTECTED_SEPARATOR}");
    let name = format!("{prefix}{}", node_name(path));
    Ok(ProtectedName {
        parent: parent.to_string(),
        path: join(parent, &name),
        prefix,
    })
}
