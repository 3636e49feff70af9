//! Element producers: generic UML classifiers, ArchiMate-profile elements,
//! BPMN-profile elements.
//!
//! Three independent single passes over all descendant elements, each with
//! its own acceptance predicate. Profile passes key their output by the
//! `base_*` reference back to the UML element when the export carries one,
//! which is what makes cross-producer id collisions (and the documented
//! merge tie-break) possible at all. Vendor extension blocks are the diagram
//! subsystem's territory and are skipped here.

use roxmltree::{Document, Node};
use rustc_hash::FxHashSet;

use super::ids::{SyntheticIds, XmiIdIndex};
use super::keys::{self, ID_KEYS};
use super::members;
use super::packages::FolderIndex;
use crate::ir::{ImportReport, IrElement, MetaValue, TaggedValue};

/// UML metaclass allowlist: metaclass → profile-qualified kind.
const UML_KINDS: &[(&str, &str)] = &[
    ("Class", "uml.class"),
    ("AssociationClass", "uml.class"),
    ("Interface", "uml.interface"),
    ("DataType", "uml.datatype"),
    ("PrimitiveType", "uml.datatype"),
    ("Enumeration", "uml.enumeration"),
    ("Component", "uml.component"),
    ("Node", "uml.node"),
    ("Device", "uml.node"),
    ("ExecutionEnvironment", "uml.node"),
    ("Artifact", "uml.artifact"),
    ("Actor", "uml.actor"),
    ("UseCase", "uml.usecase"),
    ("Activity", "uml.activity"),
    ("Action", "uml.action"),
    ("OpaqueAction", "uml.action"),
    ("CallBehaviorAction", "uml.action"),
    ("CallOperationAction", "uml.action"),
    ("InitialNode", "uml.initial-node"),
    ("ActivityFinalNode", "uml.final-node"),
    ("FlowFinalNode", "uml.final-node"),
    ("DecisionNode", "uml.decision-node"),
    ("MergeNode", "uml.merge-node"),
    ("ForkNode", "uml.fork-node"),
    ("JoinNode", "uml.join-node"),
    ("ActivityPartition", "uml.partition"),
    ("ObjectNode", "uml.object-node"),
    ("CentralBufferNode", "uml.object-node"),
    ("InstanceSpecification", "uml.object"),
    ("Signal", "uml.signal"),
    ("StateMachine", "uml.statemachine"),
    ("State", "uml.state"),
    ("Comment", "uml.note"),
    ("Note", "uml.note"),
];

/// Kinds whose members (§ attributes/operations) are parsed.
const CLASS_LIKE: &[&str] = &[
    "uml.class",
    "uml.interface",
    "uml.datatype",
    "uml.enumeration",
];

/// Kinds that may borrow their name from the documentation's first line.
const NOTE_LIKE: &[&str] = &["uml.note"];

/// BPMN profile tag allowlist: local tag → profile-qualified kind.
/// Flow tags are relationships and handled by the relationship pass.
const BPMN_KINDS: &[(&str, &str)] = &[
    ("Activity", "bpmn.activity"),
    ("Task", "bpmn.task"),
    ("BusinessProcess", "bpmn.process"),
    ("Process", "bpmn.process"),
    ("StartEvent", "bpmn.start-event"),
    ("IntermediateEvent", "bpmn.intermediate-event"),
    ("EndEvent", "bpmn.end-event"),
    ("Event", "bpmn.event"),
    ("Gateway", "bpmn.gateway"),
    ("ExclusiveGateway", "bpmn.exclusive-gateway"),
    ("ParallelGateway", "bpmn.parallel-gateway"),
    ("InclusiveGateway", "bpmn.inclusive-gateway"),
    ("Pool", "bpmn.pool"),
    ("Lane", "bpmn.lane"),
    ("DataObject", "bpmn.data-object"),
    ("DataStore", "bpmn.data-store"),
    ("Message", "bpmn.message"),
];

// ============================================================================
// UML PASS
// ============================================================================

pub(crate) fn parse_uml_elements(
    doc: &Document<'_>,
    index: &XmiIdIndex,
    folders: &FolderIndex,
    synth: &mut SyntheticIds,
    report: &mut ImportReport,
) -> Vec<IrElement> {
    let mut elements = Vec::new();
    let mut seen = FxHashSet::default();

    for node in model_candidates(doc) {
        let Some(kind) = keys::metaclass(node).and_then(|m| lookup(UML_KINDS, m)) else {
            continue;
        };

        let id = element_id(node, synth, report, "element");
        if !seen.insert(id.clone()) {
            report.warn(format!(
                "duplicate element id '{id}' in UML pass; dropping the later occurrence"
            ));
            continue;
        }

        let documentation = documentation_of(node);
        let name = element_name(node, kind, documentation.as_deref());

        let mut element = IrElement::new(id, kind, name);
        element.documentation = documentation;
        element.folder_id = folders.owning_folder(node).map(str::to_string);
        element.external_ids = external_ids_of(node);
        element.tagged_values = tagged_values_of(node);
        if let Some(raw) = keys::attr(node, "isAbstract") {
            element.meta
                .insert("isAbstract".to_string(), MetaValue::Bool(keys::boolish(raw)));
        }
        if let Some(alias) = keys::attr(node, "alias").filter(|a| !a.trim().is_empty()) {
            element
                .meta
                .insert("alias".to_string(), MetaValue::from(alias.trim()));
        }
        if CLASS_LIKE.contains(&kind) {
            element.members = members::parse_members(node, index);
        }

        elements.push(element);
    }

    elements
}

// ============================================================================
// PROFILE PASSES
// ============================================================================

pub(crate) fn parse_archimate_elements(
    doc: &Document<'_>,
    index: &XmiIdIndex,
    folders: &FolderIndex,
    synth: &mut SyntheticIds,
    report: &mut ImportReport,
) -> Vec<IrElement> {
    let mut elements = Vec::new();
    let mut seen = FxHashSet::default();

    for node in profile_candidates(doc) {
        let local = keys::local_name(node);
        let Some(stereo) = local.strip_prefix("ArchiMate_") else {
            continue;
        };
        // Relationship stereotypes ride on connectors, not profile elements;
        // anything with endpoint references belongs to the relationship pass.
        if keys::attr_any(node, &["source", "target", "base_Dependency", "base_Association"])
            .is_some()
        {
            continue;
        }

        let kind = format!("archimate.{}", kebab_case(stereo));
        push_profile_element(
            node, local, kind, "ArchiMate", index, folders, synth, report, &mut seen,
            &mut elements,
        );
    }

    elements
}

pub(crate) fn parse_bpmn_elements(
    doc: &Document<'_>,
    index: &XmiIdIndex,
    folders: &FolderIndex,
    synth: &mut SyntheticIds,
    report: &mut ImportReport,
) -> Vec<IrElement> {
    let mut elements = Vec::new();
    let mut seen = FxHashSet::default();

    for node in profile_candidates(doc) {
        if !is_bpmn_tag(node) {
            continue;
        }
        let local = keys::local_name(node);
        let Some(kind) = lookup(BPMN_KINDS, local) else {
            continue;
        };

        push_profile_element(
            node,
            local,
            kind.to_string(),
            "BPMN",
            index,
            folders,
            synth,
            report,
            &mut seen,
            &mut elements,
        );
    }

    elements
}

/// Whether a tag sits in a BPMN profile namespace (`BPMN2.0:Activity` and
/// friends; the prefix and URI both vary across EA versions).
pub(crate) fn is_bpmn_tag(node: Node<'_, '_>) -> bool {
    if let Some(prefix) = keys::tag_prefix(node) {
        if prefix.to_ascii_uppercase().starts_with("BPMN") {
            return true;
        }
    }
    node.tag_name()
        .namespace()
        .is_some_and(|uri| uri.to_ascii_uppercase().contains("BPMN"))
}

#[allow(clippy::too_many_arguments)]
fn push_profile_element(
    node: Node<'_, '_>,
    stereotype: &str,
    kind: String,
    producer: &str,
    index: &XmiIdIndex,
    folders: &FolderIndex,
    synth: &mut SyntheticIds,
    report: &mut ImportReport,
    seen: &mut FxHashSet<String>,
    out: &mut Vec<IrElement>,
) {
    let id = profile_base_id(node)
        .map(str::to_string)
        .unwrap_or_else(|| element_id(node, synth, report, "profile element"));
    if !seen.insert(id.clone()) {
        report.warn(format!(
            "duplicate element id '{id}' in {producer} pass; dropping the later occurrence"
        ));
        return;
    }

    let documentation = documentation_of(node);
    let name = keys::attr(node, "name")
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .or_else(|| index.name_of(&id).map(str::to_string))
        .unwrap_or_else(|| display_name(stereotype));

    // The base UML element's node gives the owning folder; profile
    // applications themselves sit outside the package tree.
    let folder_id = index
        .resolve(node.document(), &id)
        .and_then(|base| folders.owning_folder(base))
        .map(str::to_string)
        .or_else(|| folders.owning_folder(node).map(str::to_string));

    let mut element = IrElement::new(id, kind, name);
    element.documentation = documentation;
    element.folder_id = folder_id;
    element.external_ids = external_ids_of(node);
    element.tagged_values = tagged_values_of(node);
    element
        .meta
        .insert("stereotype".to_string(), MetaValue::from(stereotype));

    out.push(element);
}

// ============================================================================
// SHARED HELPERS
// ============================================================================

/// Model-section candidates: every descendant element outside vendor
/// extension blocks.
pub(crate) fn model_candidates<'a, 'input>(
    doc: &'a Document<'input>,
) -> impl Iterator<Item = Node<'a, 'input>> {
    doc.root()
        .descendants()
        .filter(Node::is_element)
        .filter(|n| !in_extension(*n))
}

/// Profile-application candidates: same scope as [`model_candidates`];
/// profile tags sit at the document root level in EA exports.
pub(crate) fn profile_candidates<'a, 'input>(
    doc: &'a Document<'input>,
) -> impl Iterator<Item = Node<'a, 'input>> {
    model_candidates(doc)
}

/// Whether a node lives inside a vendor `xmi:Extension` block.
pub(crate) fn in_extension(node: Node<'_, '_>) -> bool {
    node.ancestors()
        .skip(1)
        .any(|a| a.is_element() && keys::local_name(a) == "Extension")
}

/// The first `base_*` profile reference on a node.
pub(crate) fn profile_base_id<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    node.attributes()
        .find(|a| a.name().starts_with("base_") && !a.value().trim().is_empty())
        .map(|a| a.value().trim())
}

/// Element id: explicit id attribute, else a warning-flagged synthetic id
/// recorded in the side-table.
pub(crate) fn element_id(
    node: Node<'_, '_>,
    synth: &mut SyntheticIds,
    report: &mut ImportReport,
    what: &str,
) -> String {
    if let Some(id) = keys::attr_any(node, ID_KEYS) {
        return id.trim().to_string();
    }
    let (id, fresh) = synth.assign(node, "eaElem");
    if fresh {
        report.warn(format!(
            "{what} <{}> has no id; assigned synthetic id '{id}'",
            keys::local_name(node)
        ));
    }
    id
}

/// Documentation text, by the EA priority chain: `ownedComment`/`body` →
/// direct `<body>` child → documentation-ish attribute.
pub(crate) fn documentation_of(node: Node<'_, '_>) -> Option<String> {
    if let Some(comment) = keys::child_named(node, &["ownedComment"]) {
        let body = keys::child_named(comment, &["body"])
            .and_then(|b| b.text())
            .or_else(|| keys::attr(comment, "body"));
        if let Some(text) = body {
            let text = text.trim();
            if !text.is_empty() {
                return Some(text.to_string());
            }
        }
    }
    if let Some(body) = keys::child_named(node, &["body"]).and_then(|b| b.text()) {
        let body = body.trim();
        if !body.is_empty() {
            return Some(body.to_string());
        }
    }
    keys::attr_any(node, &["documentation", "doc", "notes", "note", "body"])
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

/// Element name: `name` attribute → first documentation line (note-like
/// kinds only) → metaclass display name.
fn element_name(node: Node<'_, '_>, kind: &str, documentation: Option<&str>) -> String {
    if let Some(name) = keys::attr(node, "name") {
        let name = name.trim();
        if !name.is_empty() {
            return name.to_string();
        }
    }
    if NOTE_LIKE.contains(&kind) {
        if let Some(first_line) = documentation.and_then(|d| d.lines().next()) {
            let first_line = first_line.trim();
            if !first_line.is_empty() {
                return first_line.to_string();
            }
        }
    }
    keys::metaclass(node)
        .map(display_name)
        .unwrap_or_else(|| display_name(keys::local_name(node)))
}

pub(crate) fn external_ids_of(node: Node<'_, '_>) -> Vec<String> {
    let mut ids = Vec::new();
    for key in ["ea_guid", "guid", "xmi:uuid"] {
        if let Some(value) = keys::attr(node, key) {
            let value = value.trim();
            if !value.is_empty() && !ids.iter().any(|existing| existing == value) {
                ids.push(value.to_string());
            }
        }
    }
    ids
}

pub(crate) fn tagged_values_of(node: Node<'_, '_>) -> Vec<TaggedValue> {
    let mut tags = Vec::new();
    for child in keys::children_named(node, &["taggedValue", "tag"]) {
        let Some(name) = keys::attr_any(child, &["name", "tag"]) else {
            continue;
        };
        let value = keys::attr(child, "value")
            .map(str::to_string)
            .or_else(|| child.text().map(|t| t.trim().to_string()))
            .unwrap_or_default();
        tags.push(TaggedValue {
            name: name.trim().to_string(),
            value,
        });
    }
    tags
}

fn lookup(table: &[(&str, &'static str)], key: &str) -> Option<&'static str> {
    table
        .iter()
        .find_map(|(candidate, kind)| (*candidate == key).then_some(*kind))
}

/// `ApplicationComponent` → `application-component`.
fn kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            if prev_lower {
                out.push('-');
            }
            out.push(ch.to_ascii_lowercase());
            prev_lower = false;
        } else if ch == '_' || ch == ' ' {
            out.push('-');
            prev_lower = false;
        } else {
            out.push(ch);
            prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
        }
    }
    out
}

/// `ApplicationComponent` → `Application Component` (human fallback name).
fn display_name(metaclass: &str) -> String {
    let mut out = String::with_capacity(metaclass.len() + 4);
    let mut prev_lower = false;
    for ch in metaclass.chars() {
        if ch.is_ascii_uppercase() && prev_lower {
            out.push(' ');
        }
        out.push(ch);
        prev_lower = ch.is_ascii_lowercase();
    }
    out
}
