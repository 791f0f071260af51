//! High-level pipeline: walks the repository tree, assembles the finding
//! aid, validates it and mirrors document content to disk.
//!
//! One call to [`extract`] is one extraction run: load and parse the named
//! mapping profile, seed the document builder from the EAD template, walk
//! every requested root, then hand the assembled document to the external
//! validator. Only a pass result permits writing the finding aid and
//! finalizing the report; a fail result carries the validator's diagnostic
//! back verbatim and writes nothing.
//!
//! # Traversal modes
//!
//! Each branch of the walk is in exactly one state:
//! - structural: the node's type is part of the semantic structure and not
//!   a leaf type. Map a fragment, append it, recurse into children.
//! - leaf flattening: the node's type is a leaf type. The mapped fragment
//!   becomes the fixed semantic element for the whole subtree, and every
//!   document below it turns into a file pointer plus an exported copy.
//! - excluded: the node id is on the request's exclusion list and the
//!   entire branch is skipped.
//! - unclassified: the type is not part of the semantic structure. The
//!   node and its descendants are skipped silently.
//!
//! Per-branch state (the anchor path of the current folder level, and
//! whether a semantic element still carries its placeholder pointer) lives
//! on the recursion frame, so concurrent runs and sibling subtrees can
//! never bleed into each other.
//!
//! # Error handling
//!
//! Configuration, template, mapping and validation problems abort the run
//! with a diagnostic naming the offender. A failed copy of an individual
//! document does not: it is recorded in the report and the run continues,
//! finishing with a partial-success status.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::contract::{
    CollaboratorError, EadValidator, NodeKind, ProfileStore, Repository, RepositoryNode,
    ValidationOutcome,
};
use crate::document::{EadBuilder, TemplateError};
use crate::dom::{Element, XmlError};
use crate::export::{ExportError, FileExporter, DATA_SUBDIR};
use crate::mapper::{self, MapError};
use crate::mapping::{Hook, MappingProfile, ProfileError};
use crate::paths::{PathOutsideAnchor, PathResolver};

/// One extraction request: which profile to apply, what to skip, which
/// roots to export. Field names follow the wire envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRequest {
    #[serde(rename = "mapName")]
    pub mapping_name: String,
    #[serde(rename = "excludeList", default)]
    pub exclude_ids: Vec<String>,
    #[serde(rename = "exportList")]
    pub export_ids: Vec<String>,
}

/// Completion marker of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    Done,
    /// The finding aid was written, but at least one document copy failed.
    DoneWithFailures,
}

/// One exported document: source node and its destination below the data
/// subpath.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRecord {
    pub node_id: String,
    pub relative_path: String,
}

/// One document whose content copy failed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyFailure {
    pub node_id: String,
    pub relative_path: String,
    pub error: String,
}

/// Outcome of a successful run.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionReport {
    pub export_root: PathBuf,
    pub finding_aid: PathBuf,
    pub status: ExtractionStatus,
    pub exported: Vec<ExportRecord>,
    pub failed_copies: Vec<CopyFailure>,
}

impl ExtractionReport {
    pub fn is_complete(&self) -> bool {
        self.failed_copies.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("mapping profile {name:?} unavailable: {cause}")]
    ProfileUnavailable {
        name: String,
        cause: CollaboratorError,
    },
    #[error("mapping profile {name:?} is invalid: {cause}")]
    Profile {
        name: String,
        #[source]
        cause: ProfileError,
    },
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Mapping(#[from] MapError),
    #[error("object type {type_id:?} of node {node_id} is not mapped to a semantic type")]
    UnmappedObjectType { node_id: String, type_id: String },
    #[error("node {node_id} must be a folder with a repository path")]
    NotAFolder { node_id: String },
    #[error("repository error: {0}")]
    Repository(CollaboratorError),
    #[error(transparent)]
    Path(#[from] PathOutsideAnchor),
    #[error("failed to serialize the finding aid: {0}")]
    Serialize(#[from] XmlError),
    #[error("finding aid failed schema validation: {message}")]
    Validation { message: String },
    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Runs one extraction end to end. Synchronous in effect: every step is
/// awaited in sequence on the caller's task, with no internal parallelism.
pub async fn extract<R, P, V>(
    request: &ExtractionRequest,
    repository: &R,
    profiles: &P,
    validator: &V,
    ead_template: &str,
    export_root: &Path,
) -> Result<ExtractionReport, ExtractionError>
where
    R: Repository,
    P: ProfileStore,
    V: EadValidator,
{
    info!(
        mapping = %request.mapping_name,
        roots = request.export_ids.len(),
        excluded = request.exclude_ids.len(),
        export_root = %export_root.display(),
        "starting extraction run"
    );

    let source = profiles
        .mapping_source(&request.mapping_name)
        .await
        .map_err(|cause| ExtractionError::ProfileUnavailable {
            name: request.mapping_name.clone(),
            cause,
        })?;
    let profile = MappingProfile::parse(&request.mapping_name, &source).map_err(|cause| {
        ExtractionError::Profile {
            name: request.mapping_name.clone(),
            cause,
        }
    })?;

    let mut builder = EadBuilder::from_template(ead_template)?;
    let exclude: HashSet<String> = request.exclude_ids.iter().cloned().collect();
    let exporter = FileExporter::new(export_root);

    let mut walk = Walk {
        repository,
        profile: &profile,
        exclude: &exclude,
        exporter: &exporter,
        exported: Vec::new(),
        failures: Vec::new(),
    };
    for root_id in &request.export_ids {
        walk.walk_root(root_id, &mut builder).await?;
    }
    let Walk {
        exported, failures, ..
    } = walk;

    let xml = builder.serialize()?;
    match validator.validate(&xml) {
        ValidationOutcome::Passed => {
            debug!("finding aid passed schema validation");
        }
        ValidationOutcome::Failed { message } => {
            error!(%message, "finding aid failed schema validation");
            return Err(ExtractionError::Validation { message });
        }
    }
    let finding_aid = exporter.write_finding_aid(&xml)?;

    let status = if failures.is_empty() {
        ExtractionStatus::Done
    } else {
        ExtractionStatus::DoneWithFailures
    };
    info!(
        ?status,
        exported = exported.len(),
        failed = failures.len(),
        "extraction run finished"
    );
    Ok(ExtractionReport {
        export_root: export_root.to_path_buf(),
        finding_aid,
        status,
        exported,
        failed_copies: failures,
    })
}

/// Mutable run state shared by all branches of one walk: the collaborators
/// and the accumulated export records. Branch-local traversal state stays
/// on the recursion frames.
struct Walk<'a, R: Repository> {
    repository: &'a R,
    profile: &'a MappingProfile,
    exclude: &'a HashSet<String>,
    exporter: &'a FileExporter,
    exported: Vec<ExportRecord>,
    failures: Vec<CopyFailure>,
}

impl<'a, R: Repository> Walk<'a, R> {
    /// Processes one requested root: map it, anchor the path resolver at
    /// its parent, recurse, and insert the finished fragment at the
    /// document's top level.
    async fn walk_root(
        &mut self,
        root_id: &str,
        builder: &mut EadBuilder,
    ) -> Result<(), ExtractionError> {
        if self.exclude.contains(root_id) {
            info!(node_id = root_id, "requested root is excluded, skipping");
            return Ok(());
        }

        let root = self
            .repository
            .node(root_id)
            .await
            .map_err(ExtractionError::Repository)?;
        let root_path = match (&root.kind, &root.path) {
            (NodeKind::Folder, Some(path)) => path.clone(),
            _ => {
                return Err(ExtractionError::NotAFolder {
                    node_id: root.id.clone(),
                })
            }
        };
        let semantic_type = self
            .profile
            .semantic_type_of(&root.type_id)
            .map_err(|_| ExtractionError::UnmappedObjectType {
                node_id: root.id.clone(),
                type_id: root.type_id.clone(),
            })?;
        debug!(node_id = %root.id, semantic_type, "mapping requested root");

        let mut fragment = self.map_fragment(&root, semantic_type).await?;
        let resolver = PathResolver::new(parent_path(&root_path));
        let children = self
            .repository
            .children(&root.id)
            .await
            .map_err(ExtractionError::Repository)?;

        if self.profile.is_leaf_type(&root.type_id) {
            let mut placeholder_stripped = false;
            for child in children {
                self.flatten(
                    child,
                    &mut fragment,
                    &resolver,
                    &root_path,
                    &mut placeholder_stripped,
                )
                .await?;
            }
            if !placeholder_stripped {
                // no documents anywhere below: drop the sample pointer too
                mapper::strip_pointer_elements(&mut fragment, &self.profile.pointer().template.name);
            }
        } else {
            for child in children {
                self.descend(child, &mut fragment, &resolver).await?;
            }
        }

        builder.insert_top_level(fragment);
        Ok(())
    }

    /// Structural mode: each classified child becomes a nested semantic
    /// element; a leaf-typed child switches its subtree to flattening.
    fn descend<'s>(
        &'s mut self,
        node: RepositoryNode,
        parent: &'s mut Element,
        resolver: &'s PathResolver,
    ) -> BoxFuture<'s, Result<(), ExtractionError>> {
        async move {
            if self.exclude.contains(&node.id) {
                debug!(node_id = %node.id, "excluded, skipping subtree");
                return Ok(());
            }
            if !self.profile.structural_types().contains(&node.type_id) {
                debug!(node_id = %node.id, type_id = %node.type_id, "unclassified type, skipping");
                return Ok(());
            }

            let semantic_type = self
                .profile
                .semantic_type_of(&node.type_id)
                .map_err(|_| ExtractionError::UnmappedObjectType {
                    node_id: node.id.clone(),
                    type_id: node.type_id.clone(),
                })?;
            let mut fragment = self.map_fragment(&node, semantic_type).await?;

            let children = self
                .repository
                .children(&node.id)
                .await
                .map_err(ExtractionError::Repository)?;

            if self.profile.is_leaf_type(&node.type_id) {
                let node_path =
                    node.path
                        .clone()
                        .ok_or_else(|| ExtractionError::NotAFolder {
                            node_id: node.id.clone(),
                        })?;
                let mut placeholder_stripped = false;
                for child in children {
                    self.flatten(
                        child,
                        &mut fragment,
                        resolver,
                        &node_path,
                        &mut placeholder_stripped,
                    )
                    .await?;
                }
                if !placeholder_stripped {
                    mapper::strip_pointer_elements(
                        &mut fragment,
                        &self.profile.pointer().template.name,
                    );
                }
            } else {
                for child in children {
                    self.descend(child, &mut fragment, resolver).await?;
                }
            }

            EadBuilder::append_child(parent, fragment);
            Ok(())
        }
        .boxed()
    }

    /// Flattening mode: the semantic element is fixed; folders only advance
    /// the anchor path, documents become pointers plus exported copies.
    fn flatten<'s>(
        &'s mut self,
        node: RepositoryNode,
        semantic_element: &'s mut Element,
        resolver: &'s PathResolver,
        parent_folder_path: &'s str,
        placeholder_stripped: &'s mut bool,
    ) -> BoxFuture<'s, Result<(), ExtractionError>> {
        async move {
            if self.exclude.contains(&node.id) {
                debug!(node_id = %node.id, "excluded, skipping subtree");
                return Ok(());
            }
            match node.kind {
                NodeKind::Document => {
                    let folder_relative = resolver.relative_path(parent_folder_path)?;
                    let relative_path = if folder_relative.is_empty() {
                        node.name.clone()
                    } else {
                        format!("{folder_relative}/{}", node.name)
                    };

                    if !*placeholder_stripped {
                        // the template's sample pointer goes before the first real one
                        mapper::strip_pointer_elements(
                            semantic_element,
                            &self.profile.pointer().template.name,
                        );
                        *placeholder_stripped = true;
                    }
                    let href = format!("{DATA_SUBDIR}/{relative_path}");
                    let pointer = mapper::map_pointer(&node.name, self.profile.pointer(), &href);
                    EadBuilder::append_child(semantic_element, pointer);

                    let copied = self
                        .exporter
                        .export_document(self.repository, &node.id, &relative_path)
                        .await;
                    match copied {
                        Ok(_) => self.exported.push(ExportRecord {
                            node_id: node.id.clone(),
                            relative_path,
                        }),
                        Err(e) => {
                            error!(node_id = %node.id, error = %e, "document copy failed, continuing");
                            self.failures.push(CopyFailure {
                                node_id: node.id.clone(),
                                relative_path,
                                error: e.to_string(),
                            });
                        }
                    }
                }
                NodeKind::Folder => {
                    let node_path =
                        node.path
                            .clone()
                            .ok_or_else(|| ExtractionError::NotAFolder {
                                node_id: node.id.clone(),
                            })?;
                    let children = self
                        .repository
                        .children(&node.id)
                        .await
                        .map_err(ExtractionError::Repository)?;
                    for child in children {
                        self.flatten(
                            child,
                            semantic_element,
                            resolver,
                            &node_path,
                            placeholder_stripped,
                        )
                        .await?;
                    }
                }
                NodeKind::Other => {
                    debug!(node_id = %node.id, "neither folder nor document, ignoring");
                }
            }
            Ok(())
        }
        .boxed()
    }

    /// Prefetches the hook properties of a node and maps it through its
    /// template.
    async fn map_fragment(
        &self,
        node: &RepositoryNode,
        semantic_type: &str,
    ) -> Result<Element, ExtractionError> {
        let hooks = self.profile.hooks_for(&node.type_id);
        let template = self
            .profile
            .template_for(semantic_type)
            .map_err(|cause| ExtractionError::Profile {
                name: self.profile.name().to_string(),
                cause,
            })?;
        let properties = self.fetch_properties(node, hooks).await?;
        Ok(mapper::map_element(&node.id, &properties, hooks, template)?)
    }

    async fn fetch_properties(
        &self,
        node: &RepositoryNode,
        hooks: &[Hook],
    ) -> Result<HashMap<String, String>, ExtractionError> {
        let mut properties = HashMap::new();
        for hook in hooks {
            if properties.contains_key(&hook.property_id) {
                continue;
            }
            let value = self
                .repository
                .property(&node.id, &hook.property_id)
                .await
                .map_err(ExtractionError::Repository)?;
            if let Some(value) = value {
                properties.insert(hook.property_id.clone(), value);
            }
        }
        Ok(properties)
    }
}

/// The path a root's resolver is anchored at: the parent of the root's own
/// path, or the path itself for the repository root.
fn parent_path(path: &str) -> &str {
    let trimmed = {
        let mut p = path;
        while p.len() > 1 && p.ends_with('/') {
            p = &p[..p.len() - 1];
        }
        p
    };
    match trimmed.rfind('/') {
        Some(0) if trimmed.len() == 1 => trimmed, // the repository root itself
        Some(0) => "/",                           // first-level folder
        Some(index) => &trimmed[..index],
        None => trimmed,
    }
}
