//! Classifier members: attributes and operations.
//!
//! Invoked only for class-like elements. Type references are dereferenced
//! through the whole-document id index so the IR carries human type names
//! wherever the source resolves to a named element; a raw id survives only
//! when the index has no name for it.

use roxmltree::Node;

use super::ids::XmiIdIndex;
use super::keys;
use crate::ir::{Multiplicity, UmlAttribute, UmlMembers, UmlOperation, UmlParameter, Visibility};

/// Parse `ownedAttribute`/`ownedOperation` children of a classifier.
pub(crate) fn parse_members(node: Node<'_, '_>, index: &XmiIdIndex) -> Option<UmlMembers> {
    let mut members = UmlMembers::default();

    for child in keys::children_named(node, &["ownedAttribute"]) {
        // Properties with an `association` attribute are connector ends,
        // owned by the association pass.
        if keys::attr(child, "association").is_some() {
            continue;
        }
        members.attributes.push(parse_attribute(child, index));
    }

    for child in keys::children_named(node, &["ownedOperation"]) {
        members.operations.push(parse_operation(child, index));
    }

    (!members.is_empty()).then_some(members)
}

fn parse_attribute(node: Node<'_, '_>, index: &XmiIdIndex) -> UmlAttribute {
    UmlAttribute {
        name: keys::attr(node, "name").unwrap_or_default().to_string(),
        type_name: type_name_of(node, index),
        multiplicity: Multiplicity {
            lower: bound_value(node, "lowerValue"),
            upper: bound_value(node, "upperValue"),
        },
        visibility: visibility_of(node),
        is_static: keys::attr(node, "isStatic").is_some_and(keys::boolish),
        default_value: default_value_of(node),
    }
}

fn parse_operation(node: Node<'_, '_>, index: &XmiIdIndex) -> UmlOperation {
    let mut operation = UmlOperation {
        name: keys::attr(node, "name").unwrap_or_default().to_string(),
        visibility: visibility_of(node),
        is_static: keys::attr(node, "isStatic").is_some_and(keys::boolish),
        is_abstract: keys::attr(node, "isAbstract").is_some_and(keys::boolish),
        return_type: None,
        parameters: Vec::new(),
    };

    for param in keys::children_named(node, &["ownedParameter"]) {
        let type_name = type_name_of(param, index);
        if keys::attr(param, "direction") == Some("return") {
            operation.return_type = type_name;
        } else {
            operation.parameters.push(UmlParameter {
                name: keys::attr(param, "name").unwrap_or_default().to_string(),
                type_name,
            });
        }
    }

    operation
}

/// Resolve a typed feature's type name: `type` attribute or `<type>` child
/// reference, dereferenced to a human name where the index knows one.
fn type_name_of(node: Node<'_, '_>, index: &XmiIdIndex) -> Option<String> {
    let raw = keys::attr(node, "type")
        .or_else(|| keys::child_named(node, &["type"]).and_then(keys::idref_of))?;
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    Some(index.name_of(raw).unwrap_or(raw).to_string())
}

fn visibility_of(node: Node<'_, '_>) -> Visibility {
    keys::attr(node, "visibility")
        .map(Visibility::parse)
        .unwrap_or_default()
}

fn bound_value(node: Node<'_, '_>, tag: &str) -> Option<String> {
    let bound = keys::child_named(node, &[tag])?;
    keys::attr(bound, "value")
        .map(str::to_string)
        // An upperValue without a value attribute is UML shorthand for `*`.
        .or_else(|| (tag == "upperValue").then(|| "*".to_string()))
}

fn default_value_of(node: Node<'_, '_>) -> Option<String> {
    let default = keys::child_named(node, &["defaultValue"])?;
    keys::attr(default, "value")
        .map(str::to_string)
        .or_else(|| default.text().map(|t| t.trim().to_string()))
        .filter(|v| !v.is_empty())
}
