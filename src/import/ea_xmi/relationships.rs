//! Relationship producers: generic UML, associations, ArchiMate connector
//! stereotypes, BPMN profile flows.
//!
//! Four independent passes; the orchestrator merges their outputs by id.
//! Endpoint attributes vary per metaclass, so the generic pass drives off a
//! table of `(source keys, target keys)` candidate lists, with an
//! ancestor-classifier fallback for the embedded-generalization case where
//! the source is only implied by ownership.

use roxmltree::{Document, Node};
use rustc_hash::FxHashSet;

use super::elements::{
    documentation_of, external_ids_of, in_extension, is_bpmn_tag, model_candidates,
    profile_base_id, tagged_values_of,
};
use super::ids::{self, SyntheticIds, XmiIdIndex};
use super::keys::{self, ID_KEYS};
use crate::ir::{
    Aggregation, AssociationEnd, AssociationEnds, ImportReport, IrRelationship, MetaValue,
};

// ============================================================================
// GENERIC UML PASS
// ============================================================================

struct EndpointSpec {
    metaclass: &'static str,
    kind: &'static str,
    source_keys: &'static [&'static str],
    target_keys: &'static [&'static str],
    /// Infer the source from the owning classifier when no source attribute
    /// exists (embedded generalizations and friends).
    ancestor_source: bool,
}

const UML_RELATIONSHIPS: &[EndpointSpec] = &[
    EndpointSpec {
        metaclass: "Generalization",
        kind: "uml.generalization",
        source_keys: &["specific", "source"],
        target_keys: &["general", "target"],
        ancestor_source: true,
    },
    EndpointSpec {
        metaclass: "Realization",
        kind: "uml.realization",
        source_keys: &["client", "implementingClassifier", "source"],
        target_keys: &["supplier", "contract", "target"],
        ancestor_source: true,
    },
    EndpointSpec {
        metaclass: "InterfaceRealization",
        kind: "uml.realization",
        source_keys: &["implementingClassifier", "client"],
        target_keys: &["contract", "supplier"],
        ancestor_source: true,
    },
    EndpointSpec {
        metaclass: "Dependency",
        kind: "uml.dependency",
        source_keys: &["client", "source"],
        target_keys: &["supplier", "target"],
        ancestor_source: false,
    },
    EndpointSpec {
        metaclass: "Usage",
        kind: "uml.dependency",
        source_keys: &["client"],
        target_keys: &["supplier"],
        ancestor_source: false,
    },
    EndpointSpec {
        metaclass: "Abstraction",
        kind: "uml.dependency",
        source_keys: &["client"],
        target_keys: &["supplier"],
        ancestor_source: false,
    },
    EndpointSpec {
        metaclass: "Include",
        kind: "uml.include",
        source_keys: &["includingCase"],
        target_keys: &["addition"],
        ancestor_source: true,
    },
    EndpointSpec {
        metaclass: "Extend",
        kind: "uml.extend",
        source_keys: &["extension"],
        target_keys: &["extendedCase"],
        ancestor_source: true,
    },
    EndpointSpec {
        metaclass: "ControlFlow",
        kind: "uml.control-flow",
        source_keys: &["source"],
        target_keys: &["target"],
        ancestor_source: false,
    },
    EndpointSpec {
        metaclass: "ObjectFlow",
        kind: "uml.object-flow",
        source_keys: &["source"],
        target_keys: &["target"],
        ancestor_source: false,
    },
];

pub(crate) fn parse_uml_relationships(
    doc: &Document<'_>,
    synth: &mut SyntheticIds,
    report: &mut ImportReport,
) -> Vec<IrRelationship> {
    let mut relationships = Vec::new();
    let mut seen = FxHashSet::default();

    for node in model_candidates(doc) {
        let Some(metaclass) = keys::metaclass(node) else {
            continue;
        };
        let Some(spec) = UML_RELATIONSHIPS.iter().find(|s| s.metaclass == metaclass) else {
            continue;
        };

        let mut sources = endpoint_tokens(node, spec.source_keys);
        if sources.is_empty() && spec.ancestor_source {
            sources.extend(ancestor_classifier_id(node));
        }
        let targets = endpoint_tokens(node, spec.target_keys);

        let base_id = relationship_id(node, synth, report);
        if sources.is_empty() || targets.is_empty() {
            report.warn(format!(
                "{metaclass} '{base_id}' has unresolved endpoints; dropped"
            ));
            continue;
        }

        let kind = retyped_kind(node, spec.kind);
        let name = keys::attr(node, "name").map(|n| n.trim().to_string());
        let documentation = documentation_of(node);
        let stereotype = keys::attr(node, "stereotype").map(str::trim);

        // Multi-valued endpoint lists expand to the full cross-product, one
        // relationship per pair, id-suffixed when more than one results.
        let multiple = sources.len() * targets.len() > 1;
        let mut pair = 0usize;
        for source in &sources {
            for target in &targets {
                pair += 1;
                let id = if multiple {
                    format!("{base_id}__{pair}")
                } else {
                    base_id.clone()
                };
                if !seen.insert(id.clone()) {
                    report.warn(format!(
                        "duplicate relationship id '{id}' in UML pass; dropping the later occurrence"
                    ));
                    continue;
                }
                let mut rel = IrRelationship::new(id, kind.clone(), source.clone(), target.clone());
                rel.name = name.clone();
                rel.documentation = documentation.clone();
                rel.external_ids = external_ids_of(node);
                rel.tagged_values = tagged_values_of(node);
                if let Some(stereo) = stereotype.filter(|s| !s.is_empty()) {
                    rel.meta
                        .insert("stereotype".to_string(), MetaValue::from(stereo));
                }
                relationships.push(rel);
            }
        }
    }

    relationships
}

/// A Dependency with an `include`/`extend`/`deployment` stereotype is that
/// relationship in EA's encoding.
fn retyped_kind(node: Node<'_, '_>, kind: &'static str) -> String {
    if kind == "uml.dependency" {
        match keys::attr(node, "stereotype").map(str::trim) {
            Some(s) if s.eq_ignore_ascii_case("include") => return "uml.include".to_string(),
            Some(s) if s.eq_ignore_ascii_case("extend") => return "uml.extend".to_string(),
            Some(s) if s.eq_ignore_ascii_case("deployment") => return "uml.deployment".to_string(),
            _ => {}
        }
    }
    kind.to_string()
}

/// Endpoint ids for the first candidate key that yields any: attribute value
/// (whitespace-separated list) or same-named idref children.
fn endpoint_tokens(node: Node<'_, '_>, candidate_keys: &[&str]) -> Vec<String> {
    for &key in candidate_keys {
        if let Some(raw) = keys::attr(node, key) {
            let tokens: Vec<String> = ids::parse_id_ref_list(raw)
                .into_iter()
                .map(|t| ids::resolve_href_id(t).to_string())
                .collect();
            if !tokens.is_empty() {
                return tokens;
            }
        }
        let from_children: Vec<String> = keys::children_named(node, &[key])
            .filter_map(keys::idref_of)
            .map(str::to_string)
            .collect();
        if !from_children.is_empty() {
            return from_children;
        }
    }
    Vec::new()
}

/// Nearest owning classifier that is not a package, for relationships whose
/// source is implied by nesting.
fn ancestor_classifier_id(node: Node<'_, '_>) -> Option<String> {
    node.ancestors().skip(1).filter(|a| a.is_element()).find_map(|a| {
        let metaclass = keys::metaclass(a)?;
        if matches!(metaclass, "Package" | "Model") {
            return None;
        }
        keys::attr_any(a, ID_KEYS).map(|id| id.trim().to_string())
    })
}

fn relationship_id(
    node: Node<'_, '_>,
    synth: &mut SyntheticIds,
    report: &mut ImportReport,
) -> String {
    if let Some(id) = keys::attr_any(node, ID_KEYS) {
        return id.trim().to_string();
    }
    let (id, fresh) = synth.assign(node, "eaRel");
    if fresh {
        report.warn(format!(
            "relationship <{}> has no id; assigned synthetic id '{id}'",
            keys::local_name(node)
        ));
    }
    id
}

// ============================================================================
// ASSOCIATION PASS
// ============================================================================

pub(crate) fn parse_associations(
    doc: &Document<'_>,
    index: &XmiIdIndex,
    synth: &mut SyntheticIds,
    report: &mut ImportReport,
) -> Vec<IrRelationship> {
    let mut relationships = Vec::new();
    let mut seen = FxHashSet::default();

    for node in model_candidates(doc) {
        let Some(metaclass) = keys::metaclass(node) else {
            continue;
        };
        if !matches!(metaclass, "Association" | "AssociationClass") {
            continue;
        }

        let assoc_id = relationship_id(node, synth, report);
        if seen.contains(&assoc_id) {
            report.warn(format!(
                "duplicate association id '{assoc_id}'; dropping the later occurrence"
            ));
            continue;
        }

        let ends = collect_end_properties(doc, index, node, metaclass, &assoc_id);
        let resolved: Vec<EndProperty> = ends
            .into_iter()
            .filter(|end| end.element_id.is_some())
            .collect();

        if resolved.len() < 2 {
            report.warn(format!(
                "association '{assoc_id}' has fewer than 2 resolvable ends; dropped"
            ));
            continue;
        }
        if resolved.len() > 2 {
            report.warn(format!(
                "association '{assoc_id}' has more than 2 ends ({}); using the first two",
                resolved.len()
            ));
        }

        let navigable_owned = keys::attr(node, "navigableOwnedEnd")
            .map(ids::parse_id_ref_list)
            .unwrap_or_default();
        let source = end_attrs(&resolved[0], &navigable_owned);
        let target = end_attrs(&resolved[1], &navigable_owned);

        let kind = association_kind(&source, &target);
        let mut rel = IrRelationship::new(
            assoc_id.clone(),
            kind,
            resolved[0].element_id.clone().unwrap_or_default(),
            resolved[1].element_id.clone().unwrap_or_default(),
        );
        rel.name = keys::attr(node, "name").map(|n| n.trim().to_string());
        rel.documentation = documentation_of(node);
        rel.external_ids = external_ids_of(node);
        rel.tagged_values = tagged_values_of(node);
        rel.ends = Some(AssociationEnds { source, target });
        if metaclass == "AssociationClass" {
            rel.meta
                .insert("associationClass".to_string(), MetaValue::Bool(true));
        }

        seen.insert(assoc_id);
        relationships.push(rel);
    }

    relationships
}

/// One association end, as harvested from its property element.
struct EndProperty {
    id: Option<String>,
    /// Type of the property = the element at this end.
    element_id: Option<String>,
    role: Option<String>,
    multiplicity: Option<String>,
    navigable_attr: Option<bool>,
    aggregation: Aggregation,
}

/// Discover end properties: `memberEnd` refs, `ownedEnd` children, and — for
/// AssociationClass only — a whole-document scan for properties whose
/// `association` attribute points back here.
fn collect_end_properties(
    doc: &Document<'_>,
    index: &XmiIdIndex,
    node: Node<'_, '_>,
    metaclass: &str,
    assoc_id: &str,
) -> Vec<EndProperty> {
    let mut ends: Vec<EndProperty> = Vec::new();
    let mut seen_nodes: FxHashSet<usize> = FxHashSet::default();

    let mut push_node = |property: Node<'_, '_>, ends: &mut Vec<EndProperty>| {
        if seen_nodes.insert(property.id().get_usize()) {
            ends.push(parse_end_property(property));
        }
    };

    for raw in endpoint_tokens(node, &["memberEnd"]) {
        if let Some(property) = index.resolve(doc, &raw) {
            push_node(property, &mut ends);
        }
    }
    for property in keys::children_named(node, &["ownedEnd"]) {
        push_node(property, &mut ends);
    }
    if metaclass == "AssociationClass" {
        for property in model_candidates(doc) {
            if keys::attr(property, "association").map(str::trim) == Some(assoc_id) {
                push_node(property, &mut ends);
            }
        }
    }

    ends
}

fn parse_end_property(property: Node<'_, '_>) -> EndProperty {
    let element_id = keys::attr(property, "type")
        .map(|t| ids::resolve_href_id(t).to_string())
        .or_else(|| {
            keys::child_named(property, &["type"])
                .and_then(keys::idref_of)
                .map(str::to_string)
        })
        .filter(|t| !t.is_empty());

    EndProperty {
        id: keys::attr_any(property, ID_KEYS).map(|id| id.trim().to_string()),
        element_id,
        role: keys::attr(property, "name")
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty()),
        multiplicity: multiplicity_of(property),
        navigable_attr: keys::attr(property, "isNavigable").map(keys::boolish),
        aggregation: keys::attr(property, "aggregation")
            .map(Aggregation::parse)
            .unwrap_or_default(),
    }
}

fn multiplicity_of(property: Node<'_, '_>) -> Option<String> {
    let lower = keys::child_named(property, &["lowerValue"]).and_then(|n| keys::attr(n, "value"));
    let upper = keys::child_named(property, &["upperValue"])
        .map(|n| keys::attr(n, "value").unwrap_or("*"));
    match (lower, upper) {
        (Some(l), Some(u)) => Some(format!("{l}..{u}")),
        (Some(l), None) => Some(l.to_string()),
        (None, Some(u)) => Some(u.to_string()),
        (None, None) => None,
    }
}

fn end_attrs(end: &EndProperty, navigable_owned: &[&str]) -> AssociationEnd {
    let in_navigable_list = end
        .id
        .as_deref()
        .is_some_and(|id| navigable_owned.contains(&id));
    AssociationEnd {
        role: end.role.clone(),
        multiplicity: end.multiplicity.clone(),
        navigable: match (end.navigable_attr, in_navigable_list) {
            (Some(explicit), _) => Some(explicit),
            (None, true) => Some(true),
            (None, false) => None,
        },
        aggregation: end.aggregation,
    }
}

/// Composite on either end ⇒ composition; shared on either ⇒ aggregation.
fn association_kind(source: &AssociationEnd, target: &AssociationEnd) -> &'static str {
    let kinds = [source.aggregation, target.aggregation];
    if kinds.contains(&Aggregation::Composite) {
        "uml.composition"
    } else if kinds.contains(&Aggregation::Shared) {
        "uml.aggregation"
    } else {
        "uml.association"
    }
}

// ============================================================================
// ARCHIMATE CONNECTOR PASS
// ============================================================================

/// ArchiMate relationship vocabulary, as EA spells the stereotypes.
const ARCHIMATE_RELATIONSHIPS: &[&str] = &[
    "Access",
    "Aggregation",
    "Assignment",
    "Association",
    "Composition",
    "Flow",
    "Influence",
    "Realization",
    "Serving",
    "Specialization",
    "Triggering",
];

pub(crate) fn parse_archimate_relationships(
    doc: &Document<'_>,
    synth: &mut SyntheticIds,
    report: &mut ImportReport,
) -> Vec<IrRelationship> {
    let mut relationships = Vec::new();
    let mut seen = FxHashSet::default();

    // EA encodes ArchiMate relationships as generic connectors in the vendor
    // extension whose stereotype names the ArchiMate type directly.
    for node in doc.root().descendants().filter(Node::is_element) {
        if !keys::local_name(node).eq_ignore_ascii_case("connector") || !in_extension(node) {
            continue;
        }

        let Some(stereo) = connector_stereotype(node) else {
            continue;
        };
        let Some(archi) = stereo.strip_prefix("ArchiMate_") else {
            continue;
        };
        if !ARCHIMATE_RELATIONSHIPS.contains(&archi) {
            continue;
        }

        let id = connector_id(node, synth, report);
        if !seen.insert(id.clone()) {
            report.warn(format!(
                "duplicate connector id '{id}' in ArchiMate pass; dropping the later occurrence"
            ));
            continue;
        }

        let source = keys::child_named(node, &["source"]).and_then(keys::idref_of);
        let target = keys::child_named(node, &["target"]).and_then(keys::idref_of);
        let (Some(source), Some(target)) = (source, target) else {
            report.warn(format!(
                "ArchiMate connector '{id}' has unresolved endpoints; dropped"
            ));
            continue;
        };

        let kind = format!("archimate.{}", archi_slug(archi));
        let mut rel = IrRelationship::new(id, kind, source, target);
        rel.name = connector_name(node);
        rel.documentation = connector_documentation(node);
        rel.meta
            .insert("stereotype".to_string(), MetaValue::from(stereo));
        relationships.push(rel);
    }

    relationships
}

fn connector_stereotype<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    keys::attr(node, "stereotype")
        .or_else(|| {
            keys::child_named(node, &["properties"]).and_then(|p| keys::attr(p, "stereotype"))
        })
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn connector_name(node: Node<'_, '_>) -> Option<String> {
    keys::attr(node, "name")
        .or_else(|| keys::child_named(node, &["properties"]).and_then(|p| keys::attr(p, "name")))
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
}

fn connector_documentation(node: Node<'_, '_>) -> Option<String> {
    keys::child_named(node, &["documentation"])
        .and_then(|d| keys::attr(d, "value").or_else(|| d.text()))
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

fn connector_id(
    node: Node<'_, '_>,
    synth: &mut SyntheticIds,
    report: &mut ImportReport,
) -> String {
    if let Some(id) = keys::attr_any(node, &["xmi:idref", "xmi.idref", "idref", "xmi:id", "id"]) {
        return id.trim().to_string();
    }
    let (id, fresh) = synth.assign(node, "eaRel");
    if fresh {
        report.warn(format!(
            "connector has no id; assigned synthetic id '{id}'"
        ));
    }
    id
}

fn archi_slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for ch in name.chars() {
        if ch.is_ascii_uppercase() && prev_lower {
            out.push('-');
        }
        if ch == '_' || ch == ' ' {
            out.push('-');
            prev_lower = false;
        } else {
            out.push(ch.to_ascii_lowercase());
            prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
        }
    }
    out
}

// ============================================================================
// BPMN PROFILE PASS
// ============================================================================

pub(crate) fn parse_bpmn_relationships(
    doc: &Document<'_>,
    synth: &mut SyntheticIds,
    report: &mut ImportReport,
) -> Vec<IrRelationship> {
    let mut relationships = Vec::new();
    let mut seen = FxHashSet::default();

    for node in model_candidates(doc) {
        if !is_bpmn_tag(node) {
            continue;
        }
        let kind = match keys::local_name(node) {
            "SequenceFlow" => "bpmn.sequence-flow",
            "MessageFlow" => "bpmn.message-flow",
            _ => continue,
        };

        let id = profile_base_id(node)
            .map(str::to_string)
            .unwrap_or_else(|| relationship_id(node, synth, report));
        if !seen.insert(id.clone()) {
            report.warn(format!(
                "duplicate relationship id '{id}' in BPMN pass; dropping the later occurrence"
            ));
            continue;
        }

        let source = keys::attr_any(node, &["sourceRef", "source"]).map(ids::resolve_href_id);
        let target = keys::attr_any(node, &["targetRef", "target"]).map(ids::resolve_href_id);
        let (Some(source), Some(target)) = (source, target) else {
            report.warn(format!(
                "BPMN flow '{id}' has unresolved endpoints; dropped"
            ));
            continue;
        };

        let mut rel = IrRelationship::new(id, kind, source, target);
        rel.name = keys::attr(node, "name").map(|n| n.trim().to_string());
        rel.documentation = documentation_of(node);
        relationships.push(rel);
    }

    relationships
}
