#![doc = "erms-export-core: core extraction logic for erms-export."]

//! This crate contains the full extraction pipeline for turning a subtree
//! of an ERMS content repository into an EAD finding aid with a mirrored
//! file export: mapping profiles, the metadata mapper, the document
//! builder, relative-path resolution, file export and the tree walker.
//! Repository access, profile storage and schema validation are consumed
//! through the traits in [`contract`]; this crate never owns a session or
//! a schema.
//!
//! # Usage
//! Add this as a dependency wherever extraction runs are driven: the CLI
//! crate, integration tests, or a service wrapper that schedules runs on
//! its own workers.

pub mod contract;
pub mod document;
pub mod dom;
pub mod export;
pub mod extract;
pub mod locator;
pub mod mapper;
pub mod mapping;
pub mod paths;
