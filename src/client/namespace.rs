use crate::constants::PATH_SEPARATOR;
use crate::constants::ROOT_PATH;
use crate::storage::path;
use crate::storage::CreateMode;
use crate::CoordinationError;

/// Path prefix applied to everything a client touches.
///
/// With namespace `mydemo/v1`, the client path `/app` is stored as
/// `/mydemo/v1/app` and `/` addresses `/mydemo/v1` itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespace {
    root: Option<String>,
}

impl Namespace {
    /// `None` or an empty name leaves paths untouched
    pub fn new(name: Option<&str>) -> Result<Self, CoordinationError> {
        let trimmed = name.map(|n| n.trim_matches(PATH_SEPARATOR)).unwrap_or_default();
        if trimmed.is_empty() {
            return Ok(Self { root: None });
        }
        let root = format!("{ROOT_PATH}{trimmed}");
        path::validate_path(&root)?;
        Ok(Self { root: Some(root) })
    }

    /// Absolute path of the namespace node, if any
    pub fn root(&self) -> Option<&str> {
        self.root.as_deref()
    }

    /// Client path -> stored path
    pub fn fix(
        &self,
        client_path: &str,
    ) -> Result<String, CoordinationError> {
        path::validate_sequential_prefix(client_path)?;
        Ok(match &self.root {
            None => client_path.to_string(),
            Some(root) if client_path == ROOT_PATH => root.clone(),
            Some(root) => format!("{root}{client_path}"),
        })
    }

    /// Client path -> stored path for a create.
    ///
    /// A sequential `/` names a child of the namespace node, just as it names a
    /// child of the root without a namespace. Any other create of `/` targets
    /// the namespace node itself, which always exists.
    pub fn fix_create(
        &self,
        client_path: &str,
        mode: CreateMode,
    ) -> Result<String, CoordinationError> {
        match &self.root {
            Some(root) if client_path == ROOT_PATH => {
                if mode.is_sequential() {
                    Ok(format!("{root}{PATH_SEPARATOR}"))
                } else {
                    Err(CoordinationError::NodeExists {
                        path: ROOT_PATH.to_string(),
                    })
                }
            }
            _ => self.fix(client_path),
        }
    }

    /// Stored path -> client path; paths outside the namespace come back unchanged
    pub fn unfix(
        &self,
        stored_path: &str,
    ) -> String {
        let Some(root) = &self.root else {
            return stored_path.to_string();
        };
        match stored_path.strip_prefix(root.as_str()) {
            Some("") => ROOT_PATH.to_string(),
            Some(rest) if rest.starts_with(PATH_SEPARATOR) => rest.to_string(),
            _ => stored_path.to_string(),
        }
    }
}
