//! Collaborator interfaces for an extraction run.
//!
//! The pipeline never owns its externals: the repository session, the
//! mapping-profile store and the schema validator are injected behind the
//! traits below. All three are annotated for `mockall` so integration tests
//! can drive the whole pipeline against deterministic fakes.
//!
//! The repository trait is deliberately narrow (fetch a node, list its
//! children, read a property, stream content), mirroring what the walk
//! actually consumes. Session lifecycle, authentication and retries are the
//! implementor's business.

use async_trait::async_trait;

use mockall::{automock, predicate::*};

/// Base kind of a repository node. Closed set: traversal matches on this
/// exhaustively instead of probing type identity at each call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Folder,
    Document,
    /// Anything else the repository may hold (relationships, policies, …).
    /// Ignored by the walk, never an error.
    Other,
}

/// A node of the source repository, as much of it as the walk needs.
#[derive(Debug, Clone)]
pub struct RepositoryNode {
    /// Stable repository identifier.
    pub id: String,
    /// Repository object type id, the key into the mapping profile.
    pub type_id: String,
    pub kind: NodeKind,
    pub name: String,
    /// Absolute repository path; folders carry one, documents need not.
    pub path: Option<String>,
}

/// Transport-level error from a collaborator (simple boxed error).
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;

/// Read-only view of the content repository session.
#[cfg_attr(any(test, feature = "test-mocks"), automock)]
#[async_trait]
pub trait Repository: Send + Sync {
    /// Fetch a node by id.
    async fn node(&self, id: &str) -> Result<RepositoryNode, CollaboratorError>;

    /// List a node's direct children in repository order.
    async fn children(&self, id: &str) -> Result<Vec<RepositoryNode>, CollaboratorError>;

    /// Read a single property value in its natural textual representation.
    /// `None` means the node has no value for that property.
    async fn property(
        &self,
        id: &str,
        property_id: &str,
    ) -> Result<Option<String>, CollaboratorError>;

    /// Fetch the binary content of a document node.
    async fn content(&self, id: &str) -> Result<Vec<u8>, CollaboratorError>;
}

/// Source of named mapping profiles. The store only hands back the raw rule
/// source; parsing and validation happen in [`crate::mapping`].
#[cfg_attr(any(test, feature = "test-mocks"), automock)]
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn mapping_source(&self, name: &str) -> Result<String, CollaboratorError>;
}

/// Verdict of the external schema check.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Passed,
    Failed { message: String },
}

/// Pass/fail oracle for the assembled finding aid. The schema itself is an
/// external, versioned artifact owned by the implementor.
#[cfg_attr(any(test, feature = "test-mocks"), automock)]
pub trait EadValidator: Send + Sync {
    fn validate(&self, xml: &str) -> ValidationOutcome;
}
