//! Applies mapping hooks to cloned template fragments.
//!
//! The mapper is pure tree surgery: property values are prefetched by the
//! orchestrator, so everything here is synchronous and testable without a
//! repository. Templates are cloned before every application, so the
//! stored profile is never mutated.

use std::collections::HashMap;

use thiserror::Error;

use crate::dom::{Element, XmlNode};
use crate::locator::{LocatorKind, ResolveError};
use crate::mapping::{Hook, PointerRules};

#[derive(Debug, Error)]
pub enum MapError {
    #[error(
        "locator {locator:?} of hook {property_id:?} matched nothing in the template applied to node {node_id}"
    )]
    UnresolvedTarget {
        node_id: String,
        property_id: String,
        locator: String,
    },
    #[error(
        "locator {locator:?} of hook {property_id:?} is ambiguous ({count} matches) in the template applied to node {node_id}"
    )]
    AmbiguousTarget {
        node_id: String,
        property_id: String,
        locator: String,
        count: usize,
    },
    #[error("node {node_id} has no value for property {property_id:?}")]
    MissingProperty {
        node_id: String,
        property_id: String,
    },
}

/// Clones `template` and writes the node's property values at each hook
/// target, in hook order. The template itself is left untouched.
pub fn map_element(
    node_id: &str,
    properties: &HashMap<String, String>,
    hooks: &[Hook],
    template: &Element,
) -> Result<Element, MapError> {
    let mut fragment = template.clone();
    for hook in hooks {
        let value =
            properties
                .get(&hook.property_id)
                .ok_or_else(|| MapError::MissingProperty {
                    node_id: node_id.to_string(),
                    property_id: hook.property_id.clone(),
                })?;
        apply_hook(node_id, hook, value, &mut fragment)?;
    }
    Ok(fragment)
}

fn apply_hook(
    node_id: &str,
    hook: &Hook,
    value: &str,
    fragment: &mut Element,
) -> Result<(), MapError> {
    let unresolved = || MapError::UnresolvedTarget {
        node_id: node_id.to_string(),
        property_id: hook.property_id.clone(),
        locator: hook.locator.as_str().to_string(),
    };
    let target = hook.locator.resolve_mut(fragment).map_err(|e| match e {
        ResolveError::NoMatch => unresolved(),
        ResolveError::Ambiguous { count } => MapError::AmbiguousTarget {
            node_id: node_id.to_string(),
            property_id: hook.property_id.clone(),
            locator: hook.locator.as_str().to_string(),
            count,
        },
    })?;
    match hook.locator.kind() {
        LocatorKind::ElementText => target.set_text(value),
        LocatorKind::Attribute(name) => {
            // the attribute must pre-exist: hooks fill slots, they do not
            // invent output structure
            if target.attribute(name).is_none() {
                return Err(unresolved());
            }
            target.set_attribute(name, value);
        }
    }
    Ok(())
}

/// Builds a file-pointer fragment for one exported document: clones the
/// pointer template, points its href attribute at the destination path and,
/// when configured, carries the document name as a title.
pub fn map_pointer(node_name: &str, pointer: &PointerRules, href: &str) -> Element {
    let mut fragment = pointer.template.clone();
    fragment.set_attribute(&pointer.href_attribute, href);
    if let Some(title_attribute) = &pointer.title_attribute {
        fragment.set_attribute(title_attribute, node_name);
    }
    fragment
}

/// Removes every direct file-pointer child from a fragment. Used to discard
/// a template's placeholder pointer before inserting real ones, and to strip
/// pointers entirely from leaves with no underlying documents.
pub fn strip_pointer_elements(fragment: &mut Element, pointer_name: &str) {
    fragment
        .children
        .retain(|child| !matches!(child, XmlNode::Element(e) if e.name == pointer_name));
}
