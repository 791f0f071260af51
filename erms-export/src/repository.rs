//! Snapshot-backed repository session.
//!
//! The core consumes the repository through the [`Repository`] trait; a
//! live ERMS session (CMIS or otherwise) is one implementor. This module
//! provides the one the CLI ships: a read-only repository served from a
//! JSON snapshot file, with document content read from files next to the
//! snapshot. It is a plain data adapter; all traversal logic lives in the
//! core crate.
//!
//! # Snapshot schema
//!
//! ```json
//! {
//!   "nodes": [
//!     {
//!       "id": "root",
//!       "typeId": "erms:archive",
//!       "kind": "folder",
//!       "name": "archive",
//!       "path": "/archive",
//!       "properties": {"cmis:name": "archive"},
//!       "children": ["series-1"]
//!     },
//!     {
//!       "id": "doc-1",
//!       "typeId": "cmis:document",
//!       "kind": "document",
//!       "name": "scan.pdf",
//!       "properties": {},
//!       "contentFile": "content/scan.pdf"
//!     }
//!   ]
//! }
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use erms_export_core::contract::{CollaboratorError, NodeKind, Repository, RepositoryNode};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotNode {
    id: String,
    type_id: String,
    kind: String,
    name: String,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    properties: HashMap<String, String>,
    #[serde(default)]
    children: Vec<String>,
    #[serde(default)]
    content_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct Snapshot {
    nodes: Vec<SnapshotNode>,
}

/// Read-only repository session over a JSON snapshot.
pub struct SnapshotRepository {
    base_dir: PathBuf,
    nodes: HashMap<String, SnapshotNode>,
}

impl SnapshotRepository {
    /// Loads and validates a snapshot file. Unknown node kinds and dangling
    /// child references are rejected here rather than mid-walk.
    pub fn load(path: &Path) -> Result<SnapshotRepository> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read repository snapshot {path:?}"))?;
        let snapshot: Snapshot = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse repository snapshot {path:?}"))?;

        let mut nodes = HashMap::new();
        for node in snapshot.nodes {
            parse_kind(&node.kind)
                .with_context(|| format!("node {:?} in snapshot {path:?}", node.id))?;
            let id = node.id.clone();
            if nodes.insert(id.clone(), node).is_some() {
                bail!("duplicate node id {id:?} in repository snapshot {path:?}");
            }
        }
        for node in nodes.values() {
            for child in &node.children {
                if !nodes.contains_key(child) {
                    bail!(
                        "node {:?} references unknown child {:?} in snapshot {path:?}",
                        node.id,
                        child
                    );
                }
            }
        }

        let base_dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
        info!(
            snapshot = ?path,
            nodes = nodes.len(),
            "loaded repository snapshot"
        );
        Ok(SnapshotRepository { base_dir, nodes })
    }

    fn lookup(&self, id: &str) -> Result<&SnapshotNode, CollaboratorError> {
        self.nodes
            .get(id)
            .ok_or_else(|| format!("unknown node id {id:?}").into())
    }
}

fn parse_kind(kind: &str) -> Result<NodeKind> {
    match kind {
        "folder" => Ok(NodeKind::Folder),
        "document" => Ok(NodeKind::Document),
        "other" => Ok(NodeKind::Other),
        unknown => bail!("unknown node kind {unknown:?}"),
    }
}

fn to_repository_node(node: &SnapshotNode) -> RepositoryNode {
    RepositoryNode {
        id: node.id.clone(),
        type_id: node.type_id.clone(),
        // kinds are validated at load time
        kind: parse_kind(&node.kind).unwrap_or(NodeKind::Other),
        name: node.name.clone(),
        path: node.path.clone(),
    }
}

#[async_trait]
impl Repository for SnapshotRepository {
    async fn node(&self, id: &str) -> Result<RepositoryNode, CollaboratorError> {
        Ok(to_repository_node(self.lookup(id)?))
    }

    async fn children(&self, id: &str) -> Result<Vec<RepositoryNode>, CollaboratorError> {
        let node = self.lookup(id)?;
        node.children
            .iter()
            .map(|child| self.lookup(child).map(to_repository_node))
            .collect()
    }

    async fn property(
        &self,
        id: &str,
        property_id: &str,
    ) -> Result<Option<String>, CollaboratorError> {
        Ok(self.lookup(id)?.properties.get(property_id).cloned())
    }

    async fn content(&self, id: &str) -> Result<Vec<u8>, CollaboratorError> {
        let node = self.lookup(id)?;
        let content_file = node
            .content_file
            .as_ref()
            .ok_or_else(|| format!("node {id:?} has no content file"))?;
        fs::read(self.base_dir.join(content_file))
            .map_err(|e| format!("failed to read content of node {id:?}: {e}").into())
    }
}
