//! Relative-path computation for the mirrored export layout.
//!
//! A [`PathResolver`] is anchored once per traversal root (at the root's
//! parent path) and turns absolute repository paths into the relative paths
//! used both as pointer targets and as destinations under the export
//! directory. Resolution is a pure function: the same input always yields
//! the same relative path.

use thiserror::Error;

/// Raised when a path is resolved that is not below the anchor. The walk
/// only ever resolves descendants of its root, so hitting this means a
/// caller bug rather than bad repository data.
#[derive(Debug, Error, PartialEq)]
#[error("path {path:?} is not below the anchor {anchor:?}")]
pub struct PathOutsideAnchor {
    pub path: String,
    pub anchor: String,
}

#[derive(Debug, Clone)]
pub struct PathResolver {
    /// Normalized anchor: no trailing separator; empty for the repository
    /// root, so every absolute path is below it.
    anchor: String,
}

impl PathResolver {
    pub fn new(anchor_path: impl Into<String>) -> PathResolver {
        let mut anchor = anchor_path.into();
        while anchor.len() > 1 && anchor.ends_with('/') {
            anchor.pop();
        }
        if anchor == "/" {
            anchor.clear();
        }
        PathResolver { anchor }
    }

    /// The suffix of `full_path` beyond the anchor, without a leading
    /// separator. Resolving the anchor itself yields the empty string.
    pub fn relative_path(&self, full_path: &str) -> Result<String, PathOutsideAnchor> {
        let mut trimmed = full_path;
        while trimmed.len() > 1 && trimmed.ends_with('/') {
            trimmed = &trimmed[..trimmed.len() - 1];
        }

        let outside = || PathOutsideAnchor {
            path: full_path.to_string(),
            anchor: if self.anchor.is_empty() {
                "/".to_string()
            } else {
                self.anchor.clone()
            },
        };

        if trimmed == self.anchor {
            return Ok(String::new());
        }
        let rest = trimmed.strip_prefix(self.anchor.as_str()).ok_or_else(outside)?;
        // require a separator boundary so "/archives1" is not below "/archive"
        let rest = rest.strip_prefix('/').ok_or_else(outside)?;
        if rest.is_empty() {
            return Ok(String::new());
        }
        Ok(rest.to_string())
    }
}
