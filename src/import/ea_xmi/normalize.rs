//! IR normalization.
//!
//! Runs once after orchestration, in five steps: string trimming, orphan
//! rehoming, payload sanitation, view-reference resolution and
//! geometry-derived containment. Resolution runs before containment because
//! containment is expressed in element ids, which placed nodes only carry
//! once their raw references are resolved. Normalization may add warnings,
//! never removes them, and never drops an unresolved node or connection:
//! whatever stays unresolved keeps its `ref_raw` verbatim.

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};

use super::ids::resolve_href_id;
use crate::ir::{ImportReport, IrModel, MetaValue};

pub(crate) fn normalize(model: &mut IrModel, report: &mut ImportReport) {
    trim_strings(model);
    rehome_orphans(model, report);
    sanitize_payloads(model);
    resolve_view_refs(model);
    derive_containment(model);
}

// ============================================================================
// (a) STRING TRIMMING
// ============================================================================

fn trim_in_place(value: &mut String) {
    let trimmed = value.trim();
    if trimmed.len() != value.len() {
        *value = trimmed.to_string();
    }
}

fn trim_opt(value: &mut Option<String>) {
    if let Some(v) = value {
        trim_in_place(v);
    }
}

fn trim_strings(model: &mut IrModel) {
    for folder in &mut model.folders {
        trim_in_place(&mut folder.name);
    }
    for element in &mut model.elements {
        trim_in_place(&mut element.name);
        trim_opt(&mut element.documentation);
        for tag in &mut element.tagged_values {
            trim_in_place(&mut tag.name);
            trim_in_place(&mut tag.value);
        }
        if let Some(members) = &mut element.members {
            for attribute in &mut members.attributes {
                trim_in_place(&mut attribute.name);
            }
            for operation in &mut members.operations {
                trim_in_place(&mut operation.name);
            }
        }
    }
    for relationship in &mut model.relationships {
        trim_opt(&mut relationship.name);
        trim_opt(&mut relationship.documentation);
        for tag in &mut relationship.tagged_values {
            trim_in_place(&mut tag.name);
            trim_in_place(&mut tag.value);
        }
    }
    for view in &mut model.views {
        trim_in_place(&mut view.name);
        trim_opt(&mut view.viewpoint);
        trim_opt(&mut view.documentation);
    }
}

// ============================================================================
// (b) ORPHAN REHOMING
// ============================================================================

fn rehome_orphans(model: &mut IrModel, report: &mut ImportReport) {
    let known: FxHashSet<&str> = model.folders.iter().map(|f| f.id.as_str()).collect();

    for element in &mut model.elements {
        if let Some(folder_id) = &element.folder_id {
            if !known.contains(folder_id.as_str()) {
                report.warn(format!(
                    "element '{}' references unknown folder '{}'; rehomed to root",
                    element.id, folder_id
                ));
                element.folder_id = None;
            }
        }
    }
    for view in &mut model.views {
        if let Some(folder_id) = &view.folder_id {
            if !known.contains(folder_id.as_str()) {
                report.warn(format!(
                    "view '{}' references unknown folder '{}'; rehomed to root",
                    view.id, folder_id
                ));
                view.folder_id = None;
            }
        }
    }
}

// ============================================================================
// (c) PAYLOAD SANITATION
// ============================================================================

fn sanitize_payloads(model: &mut IrModel) {
    for element in &mut model.elements {
        if let Some(members) = &mut element.members {
            members.attributes.retain(|a| !a.name.is_empty());
            members.operations.retain(|o| !o.name.is_empty());
            if members.is_empty() {
                element.members = None;
            }
        }
    }
    for relationship in &mut model.relationships {
        if let Some(ends) = &mut relationship.ends {
            for end in [&mut ends.source, &mut ends.target] {
                end.role = end.role.take().filter(|r| !r.trim().is_empty());
                end.multiplicity = end.multiplicity.take().filter(|m| !m.trim().is_empty());
            }
        }
    }
}

// ============================================================================
// (e → d input) VIEW REFERENCE RESOLUTION
// ============================================================================

struct IdLookup {
    ids: FxHashSet<String>,
    /// External id (guid, xmi:id) → primary id.
    external: FxHashMap<String, String>,
    /// Alias → primary id.
    alias: FxHashMap<String, String>,
}

impl IdLookup {
    fn resolve(&self, raw: &str) -> Option<String> {
        let token = resolve_href_id(raw);
        if token.is_empty() {
            return None;
        }
        if self.ids.contains(token) {
            return Some(token.to_string());
        }
        if let Some(id) = self.external.get(token) {
            return Some(id.clone());
        }
        self.alias.get(token).cloned()
    }
}

fn element_lookup(model: &IrModel) -> IdLookup {
    let mut lookup = IdLookup {
        ids: FxHashSet::default(),
        external: FxHashMap::default(),
        alias: FxHashMap::default(),
    };
    for element in &model.elements {
        lookup.ids.insert(element.id.clone());
        for external in &element.external_ids {
            lookup
                .external
                .entry(external.clone())
                .or_insert_with(|| element.id.clone());
        }
        if let Some(MetaValue::String(alias)) = element.meta.get("alias") {
            lookup
                .alias
                .entry(alias.clone())
                .or_insert_with(|| element.id.clone());
        }
    }
    lookup
}

fn relationship_lookup(model: &IrModel) -> IdLookup {
    let mut lookup = IdLookup {
        ids: FxHashSet::default(),
        external: FxHashMap::default(),
        alias: FxHashMap::default(),
    };
    for relationship in &model.relationships {
        lookup.ids.insert(relationship.id.clone());
        for external in &relationship.external_ids {
            lookup
                .external
                .entry(external.clone())
                .or_insert_with(|| relationship.id.clone());
        }
    }
    lookup
}

/// Endpoint tokens owned by the connection endpoint logic, not the
/// relationship reference.
const ENDPOINT_REF_KEYS: &[&str] = &["SOID", "EOID"];

fn resolve_view_refs(model: &mut IrModel) {
    let elements = element_lookup(model);
    let relationships = relationship_lookup(model);
    let endpoints: FxHashMap<String, (String, String)> = model
        .relationships
        .iter()
        .map(|r| (r.id.clone(), (r.source_id.clone(), r.target_id.clone())))
        .collect();

    for view in &mut model.views {
        // Nodes first; connections then map endpoint elements back to the
        // node placed for them in this view.
        for node in &mut view.nodes {
            if node.element_id.is_some() {
                continue;
            }
            node.element_id = node
                .ref_raw
                .values()
                .find_map(|raw| elements.resolve(raw));
        }

        let mut node_of_element: FxHashMap<String, String> = FxHashMap::default();
        for node in &view.nodes {
            if let Some(element_id) = &node.element_id {
                node_of_element
                    .entry(element_id.clone())
                    .or_insert_with(|| node.id.clone());
            }
        }

        for connection in &mut view.connections {
            if connection.relationship_id.is_none() {
                connection.relationship_id = connection
                    .ref_raw
                    .iter()
                    .filter(|(key, _)| !ENDPOINT_REF_KEYS.contains(&key.as_str()))
                    .find_map(|(_, raw)| relationships.resolve(raw));
            }

            connection.source_element_id = connection
                .ref_raw
                .get("SOID")
                .and_then(|raw| elements.resolve(raw));
            connection.target_element_id = connection
                .ref_raw
                .get("EOID")
                .and_then(|raw| elements.resolve(raw));

            // Fall back to the resolved relationship's own endpoints.
            if let Some(relationship_id) = &connection.relationship_id {
                if let Some((source, target)) = endpoints.get(relationship_id) {
                    if connection.source_element_id.is_none() && elements.ids.contains(source) {
                        connection.source_element_id = Some(source.clone());
                    }
                    if connection.target_element_id.is_none() && elements.ids.contains(target) {
                        connection.target_element_id = Some(target.clone());
                    }
                }
            }

            connection.source_node_id = connection
                .source_element_id
                .as_ref()
                .and_then(|e| node_of_element.get(e))
                .cloned();
            connection.target_node_id = connection
                .target_element_id
                .as_ref()
                .and_then(|e| node_of_element.get(e))
                .cloned();
        }
    }
}

// ============================================================================
// (d) GEOMETRY-DERIVED CONTAINMENT
// ============================================================================

/// Derive containment that EA encodes only in diagram geometry: placed
/// nodes gain a `parent_node_id` (smallest enclosing node), and activity
/// elements gain `activityId`/`ownedNodeRefs` meta. Heuristic by
/// construction: elements never drawn on any diagram get no containment
/// data.
fn derive_containment(model: &mut IrModel) {
    let kind_of: FxHashMap<String, String> = model
        .elements
        .iter()
        .map(|e| (e.id.clone(), e.kind.clone()))
        .collect();

    // child element id → owning activity element id (innermost wins).
    let mut activity_of: IndexMap<String, String> = IndexMap::new();
    // activity element id → child element ids.
    let mut children_of: IndexMap<String, Vec<String>> = IndexMap::new();

    for view in &mut model.views {
        let placed: Vec<(usize, crate::ir::Bounds)> = view
            .nodes
            .iter()
            .enumerate()
            .filter_map(|(idx, node)| node.bounds.map(|b| (idx, b)))
            .collect();

        // Smallest strictly-larger enclosing node becomes the parent.
        for &(idx, bounds) in &placed {
            let parent = placed
                .iter()
                .filter(|&&(other, other_bounds)| {
                    other != idx && other_bounds.area() > bounds.area()
                        && other_bounds.contains(&bounds)
                })
                .min_by(|a, b| a.1.area().total_cmp(&b.1.area()))
                .map(|&(other, _)| view.nodes[other].id.clone());
            view.nodes[idx].parent_node_id = parent;
        }

        // Activities, outermost first so nested activities overwrite.
        let mut activities: Vec<(usize, crate::ir::Bounds, String)> = placed
            .iter()
            .filter_map(|&(idx, bounds)| {
                let element_id = view.nodes[idx].element_id.clone()?;
                (kind_of.get(&element_id).map(String::as_str) == Some("uml.activity"))
                    .then_some((idx, bounds, element_id))
            })
            .collect();
        activities.sort_by(|a, b| b.1.area().total_cmp(&a.1.area()));

        for (activity_idx, activity_bounds, activity_element) in &activities {
            for &(idx, bounds) in &placed {
                if idx == *activity_idx || !activity_bounds.contains(&bounds) {
                    continue;
                }
                let Some(child_element) = view.nodes[idx].element_id.clone() else {
                    continue;
                };
                if child_element == *activity_element {
                    continue;
                }
                activity_of.insert(child_element.clone(), activity_element.clone());
                let children = children_of.entry(activity_element.clone()).or_default();
                if !children.contains(&child_element) {
                    children.push(child_element);
                }
            }
        }
    }

    for element in &mut model.elements {
        if let Some(activity) = activity_of.get(&element.id) {
            element
                .meta
                .insert("activityId".to_string(), MetaValue::String(activity.clone()));
        }
        if let Some(children) = children_of.get(&element.id) {
            element.meta.insert(
                "ownedNodeRefs".to_string(),
                MetaValue::List(
                    children
                        .iter()
                        .map(|c| MetaValue::String(c.clone()))
                        .collect(),
                ),
            );
        }
    }
}
