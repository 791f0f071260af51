//! Mapping profiles: the declarative ruleset that drives an extraction run.
//!
//! A profile binds repository object types to the semantic structure of the
//! finding aid: which template fragment a type maps to, which hooks populate
//! that fragment, which types are leaves (everything beneath them flattens
//! into file pointers), and how pointer fragments are built.
//!
//! Parsing is pure (rule source string in, [`MappingProfile`] out) and
//! strict: undeclared semantic types, malformed locators and duplicate
//! declarations are rejected before any traversal begins. A parsed profile
//! is immutable and safe to share read-only across concurrent runs.
//!
//! # Rule source format
//!
//! ```xml
//! <mapping>
//!   <objectTypes>
//!     <objectType id="erms:series" semanticType="series">
//!       <hook property="cmis:name" locator="did/unittitle"/>
//!       <hook property="cmis:objectId" locator="@id"/>
//!     </objectType>
//!     <objectType id="erms:record" semanticType="record" leaf="true">
//!       <hook property="cmis:name" locator="did/unittitle"/>
//!     </objectType>
//!   </objectTypes>
//!   <templates>
//!     <template semanticType="series">
//!       <c level="series" id=""><did><unittitle/></did></c>
//!     </template>
//!     <template semanticType="record">
//!       <c level="file"><did><unittitle/></did><dao href=""/></c>
//!     </template>
//!     <pointer hrefAttribute="href" titleAttribute="title">
//!       <dao href=""/>
//!     </pointer>
//!   </templates>
//! </mapping>
//! ```

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tracing::warn;

use crate::dom::{self, Element, XmlError};
use crate::locator::{Locator, MalformedLocator};

/// One property-to-target binding: read the node's property, write it at
/// the locator's position inside the cloned template fragment.
#[derive(Debug, Clone)]
pub struct Hook {
    pub property_id: String,
    pub locator: Locator,
}

/// How file-pointer fragments are built under flattened leaves.
#[derive(Debug, Clone)]
pub struct PointerRules {
    /// The fragment cloned per exported document. Its root element name
    /// also identifies placeholder pointers inside leaf templates.
    pub template: Element,
    /// Attribute on the pointer root receiving the destination path.
    pub href_attribute: String,
    /// Optional attribute receiving the document's name.
    pub title_attribute: Option<String>,
}

/// A parsed, queryable mapping profile. Immutable once parsed.
#[derive(Debug, Clone)]
pub struct MappingProfile {
    name: String,
    semantic_types: HashMap<String, String>,
    hooks: HashMap<String, Vec<Hook>>,
    templates: HashMap<String, Element>,
    leaf_types: HashSet<String>,
    structural_types: HashSet<String>,
    pointer: PointerRules,
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error(transparent)]
    Xml(#[from] XmlError),
    #[error(transparent)]
    Locator(#[from] MalformedLocator),
    #[error("expected <mapping> root element, found <{found}>")]
    UnexpectedRoot { found: String },
    #[error("missing <{section}> section")]
    MissingSection { section: &'static str },
    #[error("<{element}> is missing its {attribute:?} attribute")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },
    #[error("invalid leaf flag {value:?} on object type {object_type:?}")]
    InvalidLeafFlag { object_type: String, value: String },
    #[error("object type {object_type:?} declared more than once")]
    DuplicateObjectType { object_type: String },
    #[error("template for semantic type {semantic_type:?} declared more than once")]
    DuplicateTemplate { semantic_type: String },
    #[error("<{element}> must contain exactly one element subtree")]
    MalformedTemplate { element: &'static str },
    #[error("object type {object_type:?} references undeclared semantic type {semantic_type:?}")]
    UndeclaredSemanticType {
        object_type: String,
        semantic_type: String,
    },
    #[error("no semantic type mapped for object type {object_type:?}")]
    NotMapped { object_type: String },
    #[error("no template for semantic type {semantic_type:?}")]
    NoTemplate { semantic_type: String },
}

impl MappingProfile {
    /// Parses a rule source into a profile. Pure: the only input is the
    /// supplied source string.
    pub fn parse(name: &str, source: &str) -> Result<MappingProfile, ProfileError> {
        let root = dom::parse(source)?;
        if root.name != "mapping" {
            return Err(ProfileError::UnexpectedRoot {
                found: root.name.clone(),
            });
        }

        let templates_section = root
            .child("templates")
            .ok_or(ProfileError::MissingSection { section: "templates" })?;
        let templates = parse_templates(templates_section)?;
        let pointer = parse_pointer(templates_section)?;

        let object_types_section = root
            .child("objectTypes")
            .ok_or(ProfileError::MissingSection { section: "objectTypes" })?;

        let mut semantic_types = HashMap::new();
        let mut hooks = HashMap::new();
        let mut leaf_types = HashSet::new();
        let mut structural_types = HashSet::new();

        for object_type in object_types_section.children_named("objectType") {
            let id = required_attribute(object_type, "objectType", "id")?;
            let semantic_type = required_attribute(object_type, "objectType", "semanticType")?;

            if structural_types.contains(id) {
                return Err(ProfileError::DuplicateObjectType {
                    object_type: id.to_string(),
                });
            }
            if !templates.contains_key(semantic_type) {
                return Err(ProfileError::UndeclaredSemanticType {
                    object_type: id.to_string(),
                    semantic_type: semantic_type.to_string(),
                });
            }

            match object_type.attribute("leaf").unwrap_or("false") {
                "true" => {
                    leaf_types.insert(id.to_string());
                }
                "false" => {}
                value => {
                    return Err(ProfileError::InvalidLeafFlag {
                        object_type: id.to_string(),
                        value: value.to_string(),
                    })
                }
            }

            let mut type_hooks = Vec::new();
            for hook in object_type.children_named("hook") {
                let property = required_attribute(hook, "hook", "property")?;
                let locator = required_attribute(hook, "hook", "locator")?;
                type_hooks.push(Hook {
                    property_id: property.to_string(),
                    locator: Locator::parse(locator)?,
                });
            }

            structural_types.insert(id.to_string());
            semantic_types.insert(id.to_string(), semantic_type.to_string());
            hooks.insert(id.to_string(), type_hooks);
        }

        for semantic_type in templates.keys() {
            if !semantic_types.values().any(|s| s == semantic_type) {
                warn!(
                    profile = name,
                    semantic_type = %semantic_type,
                    "template declared but no object type maps to it"
                );
            }
        }

        Ok(MappingProfile {
            name: name.to_string(),
            semantic_types,
            hooks,
            templates,
            leaf_types,
            structural_types,
            pointer,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The semantic type an object type maps to.
    pub fn semantic_type_of(&self, object_type: &str) -> Result<&str, ProfileError> {
        self.semantic_types
            .get(object_type)
            .map(String::as_str)
            .ok_or_else(|| ProfileError::NotMapped {
                object_type: object_type.to_string(),
            })
    }

    /// The template fragment for a semantic type.
    pub fn template_for(&self, semantic_type: &str) -> Result<&Element, ProfileError> {
        self.templates
            .get(semantic_type)
            .ok_or_else(|| ProfileError::NoTemplate {
                semantic_type: semantic_type.to_string(),
            })
    }

    /// The hooks for an object type, in declaration order.
    pub fn hooks_for(&self, object_type: &str) -> &[Hook] {
        self.hooks
            .get(object_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether structure beneath this object type flattens into pointers.
    pub fn is_leaf_type(&self, object_type: &str) -> bool {
        self.leaf_types.contains(object_type)
    }

    /// Every object type that is part of the semantic structure.
    pub fn structural_types(&self) -> &HashSet<String> {
        &self.structural_types
    }

    pub fn pointer(&self) -> &PointerRules {
        &self.pointer
    }
}

fn parse_templates(section: &Element) -> Result<HashMap<String, Element>, ProfileError> {
    let mut templates = HashMap::new();
    for template in section.children_named("template") {
        let semantic_type = required_attribute(template, "template", "semanticType")?;
        let fragment = single_element_child(template, "template")?;
        if templates
            .insert(semantic_type.to_string(), fragment.clone())
            .is_some()
        {
            return Err(ProfileError::DuplicateTemplate {
                semantic_type: semantic_type.to_string(),
            });
        }
    }
    Ok(templates)
}

fn parse_pointer(section: &Element) -> Result<PointerRules, ProfileError> {
    let pointer = section
        .child("pointer")
        .ok_or(ProfileError::MissingSection { section: "pointer" })?;
    let href_attribute = required_attribute(pointer, "pointer", "hrefAttribute")?;
    let template = single_element_child(pointer, "pointer")?;
    Ok(PointerRules {
        template: template.clone(),
        href_attribute: href_attribute.to_string(),
        title_attribute: pointer.attribute("titleAttribute").map(str::to_string),
    })
}

fn required_attribute<'a>(
    element: &'a Element,
    element_name: &'static str,
    attribute: &'static str,
) -> Result<&'a str, ProfileError> {
    element
        .attribute(attribute)
        .ok_or(ProfileError::MissingAttribute {
            element: element_name,
            attribute,
        })
}

fn single_element_child<'a>(
    element: &'a Element,
    element_name: &'static str,
) -> Result<&'a Element, ProfileError> {
    let mut elements = element.child_elements();
    match (elements.next(), elements.next()) {
        (Some(child), None) => Ok(child),
        _ => Err(ProfileError::MalformedTemplate {
            element: element_name,
        }),
    }
}
