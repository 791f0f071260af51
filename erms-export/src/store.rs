//! Directory-backed mapping-profile store.
//!
//! Profiles live as `<name>.xml` files inside one configured directory.
//! The store only hands back the raw rule source; all parsing and
//! validation happen in the core crate.

use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use erms_export_core::contract::{CollaboratorError, ProfileStore};

pub struct DirProfileStore {
    dir: PathBuf,
}

impl DirProfileStore {
    pub fn new(dir: impl Into<PathBuf>) -> DirProfileStore {
        DirProfileStore { dir: dir.into() }
    }
}

#[async_trait]
impl ProfileStore for DirProfileStore {
    async fn mapping_source(&self, name: &str) -> Result<String, CollaboratorError> {
        // profile names are plain identifiers, not paths
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(format!("invalid mapping profile name {name:?}").into());
        }
        let path = self.dir.join(format!("{name}.xml"));
        debug!(profile = name, path = ?path, "reading mapping profile");
        fs::read_to_string(&path)
            .map_err(|e| format!("mapping profile {name:?} at {path:?}: {e}").into())
    }
}
