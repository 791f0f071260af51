//! Target locators: path expressions pointing at one position inside a
//! template fragment.
//!
//! A locator is the target half of a mapping hook. The grammar is a strict
//! subset of an XPath-like path: `/`-separated element name steps relative
//! to the fragment root, optionally ending in `@name` to address an
//! attribute instead of element text. A leading `.` step names the fragment
//! root itself (so `@level` and `./@level` both address an attribute on the
//! root).
//!
//! Resolution is the one place the mapping engine touches the tree
//! representation; everything else goes through [`Locator::resolve_mut`].

use thiserror::Error;

use crate::dom::{Element, XmlNode};

/// What a locator addresses once its element path has been resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum LocatorKind {
    /// The resolved element's text content.
    ElementText,
    /// A named attribute on the resolved element. The attribute must already
    /// exist in the template; a hook never invents output structure.
    Attribute(String),
}

/// A parsed locator expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Locator {
    steps: Vec<String>,
    kind: LocatorKind,
    raw: String,
}

#[derive(Debug, Error, PartialEq)]
#[error("malformed locator {expr:?}: {reason}")]
pub struct MalformedLocator {
    pub expr: String,
    pub reason: String,
}

/// Why a locator failed to resolve inside a fragment.
#[derive(Debug, PartialEq)]
pub enum ResolveError {
    /// No node matched the element path (or the addressed attribute is
    /// absent from the matched element).
    NoMatch,
    /// More than one element matched the path.
    Ambiguous { count: usize },
}

impl Locator {
    /// Parses a locator expression, rejecting malformed input outright so
    /// profile loading fails before any traversal starts.
    pub fn parse(expr: &str) -> Result<Locator, MalformedLocator> {
        let malformed = |reason: &str| MalformedLocator {
            expr: expr.to_string(),
            reason: reason.to_string(),
        };

        if expr.trim().is_empty() {
            return Err(malformed("empty expression"));
        }
        if expr.starts_with('/') {
            return Err(malformed("locators are relative to the fragment root"));
        }

        let mut steps: Vec<String> = Vec::new();
        let mut kind = LocatorKind::ElementText;
        let raw_steps: Vec<&str> = expr.split('/').collect();
        let last = raw_steps.len() - 1;

        for (position, step) in raw_steps.iter().enumerate() {
            if step.is_empty() {
                return Err(malformed("empty path step"));
            }
            if *step == "." {
                if position == 0 {
                    continue;
                }
                return Err(malformed("`.` is only allowed as the first step"));
            }
            if let Some(attribute) = step.strip_prefix('@') {
                if position != last {
                    return Err(malformed("attribute step must be the final step"));
                }
                if attribute.is_empty() {
                    return Err(malformed("attribute step has no name"));
                }
                kind = LocatorKind::Attribute(attribute.to_string());
                continue;
            }
            if step.contains('@') {
                return Err(malformed("`@` may only introduce an attribute step"));
            }
            if step.contains(char::is_whitespace) {
                return Err(malformed("whitespace in path step"));
            }
            steps.push((*step).to_string());
        }

        Ok(Locator {
            steps,
            kind,
            raw: expr.to_string(),
        })
    }

    pub fn kind(&self) -> &LocatorKind {
        &self.kind
    }

    /// The original expression, for diagnostics.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Resolves the element path inside `fragment`, demanding exactly one
    /// match. Zero matches and ties are both hard errors; a tie is never
    /// silently broken in favour of the first node.
    pub fn resolve_mut<'a>(
        &self,
        fragment: &'a mut Element,
    ) -> Result<&'a mut Element, ResolveError> {
        let mut paths = Vec::new();
        collect_paths(fragment, &self.steps, 0, &mut Vec::new(), &mut paths);
        match paths.len() {
            0 => Err(ResolveError::NoMatch),
            1 => Ok(follow_mut(fragment, &paths[0])),
            count => Err(ResolveError::Ambiguous { count }),
        }
    }
}

fn collect_paths(
    element: &Element,
    steps: &[String],
    depth: usize,
    prefix: &mut Vec<usize>,
    out: &mut Vec<Vec<usize>>,
) {
    if depth == steps.len() {
        out.push(prefix.clone());
        return;
    }
    for (index, child) in element.children.iter().enumerate() {
        if let XmlNode::Element(e) = child {
            if e.name == steps[depth] {
                prefix.push(index);
                collect_paths(e, steps, depth + 1, prefix, out);
                prefix.pop();
            }
        }
    }
}

fn follow_mut<'a>(element: &'a mut Element, path: &[usize]) -> &'a mut Element {
    let mut current = element;
    for &index in path {
        current = match &mut current.children[index] {
            XmlNode::Element(e) => e,
            // collect_paths only records element indices
            XmlNode::Text(_) => unreachable!("locator path points at a text node"),
        };
    }
    current
}
