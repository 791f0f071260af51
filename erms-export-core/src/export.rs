//! Copies repository content into the mirrored export tree.
//!
//! The export directory has a fixed two-part layout: the finding aid goes
//! under the metadata subpath, document content under the data subpath with
//! the repository folder structure mirrored beneath it. Parent directories
//! are created on demand; every I/O failure is surfaced to the caller, never
//! swallowed.

use std::fs;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::contract::{CollaboratorError, Repository};

pub const METADATA_SUBDIR: &str = "metadata";
pub const DATA_SUBDIR: &str = "data";
pub const FINDING_AID_FILENAME: &str = "ead.xml";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to fetch content of node {node_id}: {cause}")]
    Content {
        node_id: String,
        cause: CollaboratorError,
    },
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("relative path {path:?} would escape the export root")]
    UnsafeRelativePath { path: String },
}

/// Writes beneath one export root. Destination paths are a deterministic
/// function of node identity, so the layout needs no locking discipline
/// beyond one writer per run.
#[derive(Debug)]
pub struct FileExporter {
    export_root: PathBuf,
}

impl FileExporter {
    pub fn new(export_root: impl Into<PathBuf>) -> FileExporter {
        FileExporter {
            export_root: export_root.into(),
        }
    }

    pub fn export_root(&self) -> &Path {
        &self.export_root
    }

    pub fn data_dir(&self) -> PathBuf {
        self.export_root.join(DATA_SUBDIR)
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.export_root.join(METADATA_SUBDIR)
    }

    /// Copies the binary content of a document node to
    /// `<export_root>/data/<relative_path>`, creating intermediate
    /// directories as needed. Returns the destination path.
    pub async fn export_document<R>(
        &self,
        repository: &R,
        node_id: &str,
        relative_path: &str,
    ) -> Result<PathBuf, ExportError>
    where
        R: Repository + ?Sized,
    {
        let destination = self.data_dir().join(checked_relative(relative_path)?);
        let content =
            repository
                .content(node_id)
                .await
                .map_err(|cause| ExportError::Content {
                    node_id: node_id.to_string(),
                    cause,
                })?;
        write_creating_parents(&destination, &content)?;
        info!(
            node_id,
            path = %destination.display(),
            bytes = content.len(),
            "exported document content"
        );
        Ok(destination)
    }

    /// Writes the validated finding aid to `<export_root>/metadata/ead.xml`.
    pub fn write_finding_aid(&self, xml: &str) -> Result<PathBuf, ExportError> {
        let destination = self.metadata_dir().join(FINDING_AID_FILENAME);
        write_creating_parents(&destination, xml.as_bytes())?;
        info!(path = %destination.display(), "wrote finding aid");
        Ok(destination)
    }
}

/// Repository-supplied names must stay inside the export root.
fn checked_relative(relative_path: &str) -> Result<&Path, ExportError> {
    let path = Path::new(relative_path);
    let safe = !relative_path.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if !safe {
        return Err(ExportError::UnsafeRelativePath {
            path: relative_path.to_string(),
        });
    }
    Ok(path)
}

fn write_creating_parents(destination: &Path, content: &[u8]) -> Result<(), ExportError> {
    let io_error = |source| ExportError::Io {
        path: destination.to_path_buf(),
        source,
    };
    if let Some(parent) = destination.parent() {
        debug!(dir = %parent.display(), "ensuring export directory");
        fs::create_dir_all(parent).map_err(io_error)?;
    }
    fs::write(destination, content).map_err(io_error)
}
