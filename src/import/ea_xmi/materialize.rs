//! Package materialization.
//!
//! EA gives every package two identities: the package id (`EAPK_<guid>`)
//! that the folder tree uses, and an element-form alias (`EAID_<guid>`)
//! that relationships and diagram objects point at when the package itself
//! is drawn or connected. This pass reconciles the two: referenced aliases
//! are rewritten to the canonical `EAPK_*` id, and, policy permitting, a
//! `uml.package` element is synthesized so the reference resolves. Never
//! unconditionally: a package nobody references stays a plain folder.

use indexmap::IndexMap;
use rustc_hash::FxHashSet;

use crate::import::PackageElementPolicy;
use crate::ir::{IrElement, IrModel, MetaValue};

struct PackageAlias {
    folder_idx: usize,
    canonical: String,
}

pub(crate) fn materialize_packages(model: &mut IrModel, policy: PackageElementPolicy) {
    // Alias → folder, for every folder with an EA-style alternate id.
    // IndexMap keeps synthesized elements in folder order.
    let mut aliases: IndexMap<String, PackageAlias> = IndexMap::new();
    for (folder_idx, folder) in model.folders.iter().enumerate() {
        let Some(guid) = folder.id.strip_prefix("EAPK_") else {
            continue;
        };
        aliases.insert(
            format!("EAID_{guid}"),
            PackageAlias {
                folder_idx,
                canonical: folder.id.clone(),
            },
        );
    }
    if aliases.is_empty() {
        return;
    }

    // Which folders are actually referenced, and from where.
    let mut diagram_referenced: FxHashSet<usize> = FxHashSet::default();
    let mut relationship_referenced: FxHashSet<usize> = FxHashSet::default();

    for view in &model.views {
        for node in &view.nodes {
            for value in node.ref_raw.values() {
                if let Some(alias) = aliases.get(value.trim()) {
                    diagram_referenced.insert(alias.folder_idx);
                }
            }
        }
        for connection in &view.connections {
            for value in connection.ref_raw.values() {
                if let Some(alias) = aliases.get(value.trim()) {
                    diagram_referenced.insert(alias.folder_idx);
                }
            }
        }
    }
    for relationship in &model.relationships {
        for endpoint in [&relationship.source_id, &relationship.target_id] {
            if let Some(alias) = aliases.get(endpoint.trim()) {
                relationship_referenced.insert(alias.folder_idx);
            }
        }
    }

    // Synthesize elements per policy.
    for alias in aliases.values() {
        let eligible = match policy {
            PackageElementPolicy::Never => false,
            PackageElementPolicy::DiagramReferenced => {
                diagram_referenced.contains(&alias.folder_idx)
            }
            PackageElementPolicy::AnyReference => {
                diagram_referenced.contains(&alias.folder_idx)
                    || relationship_referenced.contains(&alias.folder_idx)
            }
        };
        if !eligible || model.element(&alias.canonical).is_some() {
            continue;
        }

        let folder = &model.folders[alias.folder_idx];
        tracing::debug!(package = %folder.id, "materializing referenced package as element");
        let mut element = IrElement::new(alias.canonical.clone(), "uml.package", &folder.name);
        element.folder_id = folder.parent_id.clone();
        element.external_ids = folder.external_ids.clone();
        element
            .meta
            .insert("packageId".to_string(), MetaValue::String(folder.id.clone()));
        model.elements.push(element);
    }

    // Rewrite alias references in place — no raw `EAID_*` package alias
    // survives into the IR, whether or not an element was synthesized.
    for relationship in &mut model.relationships {
        for endpoint in [&mut relationship.source_id, &mut relationship.target_id] {
            if let Some(alias) = aliases.get(endpoint.trim()) {
                *endpoint = alias.canonical.clone();
            }
        }
    }
    for view in &mut model.views {
        for node in &mut view.nodes {
            for value in node.ref_raw.values_mut() {
                if let Some(alias) = aliases.get(value.trim()) {
                    *value = alias.canonical.clone();
                }
            }
        }
        for connection in &mut view.connections {
            for value in connection.ref_raw.values_mut() {
                if let Some(alias) = aliases.get(value.trim()) {
                    *value = alias.canonical.clone();
                }
            }
        }
    }
}
