//! The finding-aid document skeleton.
//!
//! An [`EadBuilder`] is seeded from an EAD template source, keeps hold of
//! the designated top-level insertion point (the `<dsc>` container), and
//! appends mapped fragments in insertion order. The output is never
//! reordered.

use thiserror::Error;

use crate::dom::{self, Element, XmlError, XmlNode};

/// Element name of the top-level insertion point inside the EAD template.
const INSERTION_POINT: &str = "dsc";

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("EAD template is not well-formed: {0}")]
    Malformed(#[from] XmlError),
    #[error("EAD template lacks a <dsc> insertion point")]
    MissingInsertionPoint,
}

/// Owns the assembled document and its top-level insertion point.
#[derive(Debug)]
pub struct EadBuilder {
    root: Element,
    insertion_path: Vec<usize>,
}

impl EadBuilder {
    /// Seeds a builder from template source. Fails when the source does not
    /// parse or contains no insertion point; both abort a run before any
    /// traversal starts.
    pub fn from_template(source: &str) -> Result<EadBuilder, TemplateError> {
        let root = dom::parse(source)?;
        let insertion_path =
            find_insertion_point(&root).ok_or(TemplateError::MissingInsertionPoint)?;
        Ok(EadBuilder {
            root,
            insertion_path,
        })
    }

    /// Appends a mapped fragment under the top-level insertion point.
    pub fn insert_top_level(&mut self, fragment: Element) {
        follow_mut(&mut self.root, &self.insertion_path).append_child(fragment);
    }

    /// Appends a fragment as the last child of an in-construction parent
    /// fragment. Sibling order is visitation order.
    pub fn append_child(parent: &mut Element, fragment: Element) {
        parent.append_child(fragment);
    }

    /// The top-level insertion point and everything inserted under it.
    pub fn top_level(&self) -> &Element {
        follow(&self.root, &self.insertion_path)
    }

    /// The whole assembled document.
    pub fn document(&self) -> &Element {
        &self.root
    }

    /// Serializes the assembled document for validation and for writing the
    /// finding-aid file.
    pub fn serialize(&self) -> Result<String, XmlError> {
        dom::serialize_document(&self.root)
    }
}

fn find_insertion_point(root: &Element) -> Option<Vec<usize>> {
    if root.name == INSERTION_POINT {
        return Some(Vec::new());
    }
    for (index, child) in root.children.iter().enumerate() {
        if let XmlNode::Element(e) = child {
            if let Some(mut path) = find_insertion_point(e) {
                let mut full = vec![index];
                full.append(&mut path);
                return Some(full);
            }
        }
    }
    None
}

fn follow<'a>(element: &'a Element, path: &[usize]) -> &'a Element {
    let mut current = element;
    for &index in path {
        current = match &current.children[index] {
            XmlNode::Element(e) => e,
            XmlNode::Text(_) => unreachable!("insertion path points at a text node"),
        };
    }
    current
}

fn follow_mut<'a>(element: &'a mut Element, path: &[usize]) -> &'a mut Element {
    let mut current = element;
    for &index in path {
        current = match &mut current.children[index] {
            XmlNode::Element(e) => e,
            XmlNode::Text(_) => unreachable!("insertion path points at a text node"),
        };
    }
    current
}
