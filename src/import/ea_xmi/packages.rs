//! UML package hierarchy → folder tree.
//!
//! Depth-first recursive descent over package-typed elements, starting from
//! the first UML-Model-like element in the document. EA nests packages as
//! `packagedElement xmi:type="uml:Package"` (2.x) or `UML:Package` tags
//! (1.x); non-package wrappers in between are traversed without opening a
//! folder. The descent is not cycle-safe — a cyclic parent chain cannot be
//! produced by nested XML.

use roxmltree::{Document, Node};
use rustc_hash::{FxHashMap, FxHashSet};

use super::ids::SyntheticIds;
use super::keys::{self, ID_KEYS};
use crate::ir::{ImportReport, IrFolder};

/// Folder lookup tables shared with later passes.
#[derive(Default)]
pub(crate) struct FolderIndex {
    by_node: FxHashMap<usize, String>,
    known: FxHashSet<String>,
}

impl FolderIndex {
    /// The folder owning `node`: nearest package-typed ancestor.
    pub fn owning_folder(&self, node: Node<'_, '_>) -> Option<&str> {
        node.ancestors()
            .skip(1)
            .find_map(|a| self.by_node.get(&a.id().get_usize()))
            .map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.known.contains(id)
    }
}

/// Whether a node is package-typed in any of the EA dialects.
pub(crate) fn is_package_node(node: Node<'_, '_>) -> bool {
    matches!(keys::metaclass(node), Some("Package" | "Model"))
        || keys::local_name(node) == "Package"
}

/// The first UML-Model-like element, which roots the package descent.
pub(crate) fn find_model_node<'a, 'input>(doc: &'a Document<'input>) -> Option<Node<'a, 'input>> {
    doc.root()
        .descendants()
        .filter(Node::is_element)
        .find(|n| keys::metaclass(*n) == Some("Model") || keys::local_name(*n) == "Model")
}

/// Parse the package tree into folders.
pub(crate) fn parse_folders(
    doc: &Document<'_>,
    synth: &mut SyntheticIds,
    report: &mut ImportReport,
) -> (Vec<IrFolder>, FolderIndex) {
    let mut folders = Vec::new();
    let mut index = FolderIndex::default();

    let start = match find_model_node(doc) {
        Some(model) => model,
        None => {
            report.warn(
                "no UML Model element found; scanning document root children for packages",
            );
            doc.root_element()
        }
    };

    for child in start.children().filter(|c| c.is_element()) {
        descend(child, None, synth, report, &mut folders, &mut index);
    }

    (folders, index)
}

fn descend(
    node: Node<'_, '_>,
    parent_id: Option<&str>,
    synth: &mut SyntheticIds,
    report: &mut ImportReport,
    folders: &mut Vec<IrFolder>,
    index: &mut FolderIndex,
) {
    if !is_package_node(node) {
        // Wrapper or foreign element; keep descending under the same parent.
        for child in node.children().filter(|c| c.is_element()) {
            descend(child, parent_id, synth, report, folders, index);
        }
        return;
    }

    let id = match keys::attr_any(node, ID_KEYS) {
        Some(id) => id.trim().to_string(),
        None => {
            let (id, _) = synth.assign(node, "eaPkg");
            report.warn(format!(
                "package '{}' has no id; assigned synthetic id '{}'",
                package_name(node),
                id
            ));
            id
        }
    };

    if index.known.contains(&id) {
        report.warn(format!(
            "duplicate package id '{id}'; keeping the first occurrence"
        ));
        return;
    }

    let mut folder = IrFolder::new(id.clone(), package_name(node));
    folder.parent_id = parent_id.map(str::to_string);
    if let Some(guid) = keys::attr_any(node, &["ea_guid", "guid"]) {
        folder.external_ids.push(guid.trim().to_string());
    }

    index.by_node.insert(node.id().get_usize(), id.clone());
    index.known.insert(id.clone());
    folders.push(folder);

    for child in node.children().filter(|c| c.is_element()) {
        descend(child, Some(&id), synth, report, folders, index);
    }
}

/// Package name: `name` → `xmi:label` → `label` → the literal `"Package"`.
fn package_name(node: Node<'_, '_>) -> String {
    keys::attr_any(node, &["name", "xmi:label", "label"])
        .map(|n| n.trim().to_string())
        .unwrap_or_else(|| "Package".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::xml::parse_document;

    const NESTED: &str = r#"
        <xmi:XMI xmlns:xmi="http://www.omg.org/XMI" xmlns:uml="http://www.omg.org/spec/UML">
          <uml:Model xmi:id="m1" name="Model">
            <packagedElement xmi:type="uml:Package" xmi:id="p1" name="Top">
              <packagedElement xmi:type="uml:Package" xmi:id="p2" name="Nested"/>
              <packagedElement xmi:type="uml:Class" xmi:id="c1" name="NotAFolder"/>
            </packagedElement>
          </uml:Model>
        </xmi:XMI>"#;

    #[test]
    fn test_nested_packages_build_a_tree() {
        let doc = parse_document(NESTED).unwrap();
        let mut synth = SyntheticIds::new();
        let mut report = ImportReport::new();
        let (folders, index) = parse_folders(&doc, &mut synth, &mut report);

        assert_eq!(folders.len(), 2);
        assert_eq!(folders[0].id, "p1");
        assert_eq!(folders[0].parent_id, None);
        assert_eq!(folders[1].id, "p2");
        assert_eq!(folders[1].parent_id.as_deref(), Some("p1"));
        assert!(index.contains("p2"));
        assert!(report.is_empty());
    }

    #[test]
    fn test_package_without_id_gets_synthetic_id() {
        let doc = parse_document(
            r#"<xmi:XMI xmlns:xmi="http://www.omg.org/XMI" xmlns:uml="http://www.omg.org/spec/UML">
                 <uml:Model xmi:id="m1" name="Model">
                   <packagedElement xmi:type="uml:Package" name="Anon"/>
                 </uml:Model>
               </xmi:XMI>"#,
        )
        .unwrap();
        let mut synth = SyntheticIds::new();
        let mut report = ImportReport::new();
        let (folders, _) = parse_folders(&doc, &mut synth, &mut report);

        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0].id, "eaPkg_synth_1");
        assert!(report.contains("synthetic id"));
    }

    #[test]
    fn test_duplicate_package_ids_are_dropped_with_warning() {
        let doc = parse_document(
            r#"<xmi:XMI xmlns:xmi="http://www.omg.org/XMI" xmlns:uml="http://www.omg.org/spec/UML">
                 <uml:Model xmi:id="m1">
                   <packagedElement xmi:type="uml:Package" xmi:id="dup" name="First"/>
                   <packagedElement xmi:type="uml:Package" xmi:id="dup" name="Second"/>
                 </uml:Model>
               </xmi:XMI>"#,
        )
        .unwrap();
        let mut synth = SyntheticIds::new();
        let mut report = ImportReport::new();
        let (folders, _) = parse_folders(&doc, &mut synth, &mut report);

        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0].name, "First");
        assert!(report.contains("duplicate package id 'dup'"));
    }

    #[test]
    fn test_missing_model_falls_back_to_root_scan() {
        let doc = parse_document(
            r#"<xmi:XMI xmlns:xmi="http://www.omg.org/XMI" xmlns:uml="http://www.omg.org/spec/UML">
                 <packagedElement xmi:type="uml:Package" xmi:id="p1" name="Loose"/>
               </xmi:XMI>"#,
        )
        .unwrap();
        let mut synth = SyntheticIds::new();
        let mut report = ImportReport::new();
        let (folders, _) = parse_folders(&doc, &mut synth, &mut report);

        assert_eq!(folders.len(), 1);
        assert!(report.contains("scanning document root"));
    }

    #[test]
    fn test_fallback_package_name() {
        let doc = parse_document(
            r#"<xmi:XMI xmlns:xmi="http://www.omg.org/XMI" xmlns:uml="http://www.omg.org/spec/UML">
                 <uml:Model xmi:id="m1">
                   <packagedElement xmi:type="uml:Package" xmi:id="p1"/>
                 </uml:Model>
               </xmi:XMI>"#,
        )
        .unwrap();
        let mut synth = SyntheticIds::new();
        let mut report = ImportReport::new();
        let (folders, _) = parse_folders(&doc, &mut synth, &mut report);
        assert_eq!(folders[0].name, "Package");
    }
}
