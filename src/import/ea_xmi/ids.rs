//! Id indexing and synthetic id assignment.
//!
//! EA documents identify things through several competing schemes (`xmi:id`,
//! EA GUIDs, alias ids) and sometimes not at all. This module gives every
//! pass the same two tools: an O(n) id→node index built once over the whole
//! document, and a side-table that hands out deterministic synthetic ids for
//! id-less nodes without ever mutating the parsed document — later passes
//! find the same owner through the node handle, never by parsing a synthetic
//! id back out of text.

use indexmap::IndexMap;
use roxmltree::{Document, Node, NodeId};
use rustc_hash::FxHashMap;

use super::keys::{self, ID_KEYS};

// ============================================================================
// ID INDEX
// ============================================================================

/// Whole-document id lookup tables.
///
/// Built in a single pass over all descendant elements; first occurrence of
/// an id wins so repeated builds over the same document yield identical key
/// sets in identical order.
pub(crate) struct XmiIdIndex {
    nodes: IndexMap<String, NodeId>,
    names: FxHashMap<String, String>,
}

impl XmiIdIndex {
    pub fn build(doc: &Document<'_>) -> Self {
        let mut nodes = IndexMap::new();
        let mut names = FxHashMap::default();
        for node in doc.root().descendants().filter(Node::is_element) {
            let Some(id) = keys::attr_any(node, ID_KEYS) else {
                continue;
            };
            let id = id.trim();
            if !nodes.contains_key(id) {
                nodes.insert(id.to_string(), node.id());
                if let Some(name) = keys::attr(node, "name").filter(|n| !n.trim().is_empty()) {
                    names.insert(id.to_string(), name.trim().to_string());
                }
            }
        }
        Self { nodes, names }
    }

    /// Trim and look up, returning the indexed node.
    pub fn resolve<'a, 'input>(
        &self,
        doc: &'a Document<'input>,
        raw: &str,
    ) -> Option<Node<'a, 'input>> {
        let node_id = self.nodes.get(raw.trim())?;
        doc.get_node(*node_id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id.trim())
    }

    /// Human name recorded for an id, if the source carried one.
    pub fn name_of(&self, id: &str) -> Option<&str> {
        self.names.get(id.trim()).map(String::as_str)
    }

    /// Indexed ids, in document order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }
}

// ============================================================================
// REFERENCE-LIST / HREF HELPERS
// ============================================================================

/// Split a whitespace-separated reference-list attribute into ordered
/// tokens. Order is preserved for later pairwise expansion; duplicates are
/// kept.
pub(crate) fn parse_id_ref_list(raw: &str) -> Vec<&str> {
    raw.split_whitespace().collect()
}

/// Extract the id from an href-style reference: the fragment after the last
/// `#`, or the whole value when there is none.
pub(crate) fn resolve_href_id(raw: &str) -> &str {
    raw.rsplit('#').next().unwrap_or(raw).trim()
}

// ============================================================================
// SYNTHETIC IDS
// ============================================================================

/// Side-table of generated ids, keyed by node handle.
///
/// Counters are per prefix, so ids come out as `eaPkg_synth_1`,
/// `eaElem_synth_2`, … in document order — deterministic across runs over
/// the same input.
#[derive(Default)]
pub(crate) struct SyntheticIds {
    assigned: FxHashMap<usize, String>,
    counters: FxHashMap<&'static str, usize>,
}

impl SyntheticIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// The id assigned to `node`, generating `<prefix>_synth_N` on first
    /// sight. Returns `(id, freshly_assigned)` so the caller can warn once.
    pub fn assign(&mut self, node: Node<'_, '_>, prefix: &'static str) -> (String, bool) {
        self.assign_slugged(node, prefix, None)
    }

    /// As [`assign`](Self::assign), with a trailing name slug
    /// (`eaDiagram_synth_3_logical_view`).
    pub fn assign_slugged(
        &mut self,
        node: Node<'_, '_>,
        prefix: &'static str,
        slug: Option<&str>,
    ) -> (String, bool) {
        let key = node.id().get_usize();
        if let Some(existing) = self.assigned.get(&key) {
            return (existing.clone(), false);
        }
        let counter = self.counters.entry(prefix).or_insert(0);
        *counter += 1;
        let id = match slug.map(slugify).filter(|s| !s.is_empty()) {
            Some(slug) => format!("{prefix}_synth_{counter}_{slug}"),
            None => format!("{prefix}_synth_{counter}"),
        };
        self.assigned.insert(key, id.clone());
        (id, true)
    }

    /// The already-assigned id for a node, if any.
    pub fn lookup(&self, node: Node<'_, '_>) -> Option<&str> {
        self.assigned.get(&node.id().get_usize()).map(String::as_str)
    }
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.chars().take(32) {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.ends_with('_') && !slug.is_empty() {
            slug.push('_');
        }
    }
    slug.trim_end_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::xml::parse_document;

    #[test]
    fn test_index_build_is_deterministic() {
        let doc = parse_document(
            r#"<root xmlns:xmi="http://www.omg.org/XMI">
                 <a xmi:id="id1"/>
                 <b id="id2" name="B"/>
                 <c xmi:id="id1" name="shadowed"/>
               </root>"#,
        )
        .unwrap();

        let first = XmiIdIndex::build(&doc);
        let second = XmiIdIndex::build(&doc);
        let first_ids: Vec<_> = first.ids().collect();
        let second_ids: Vec<_> = second.ids().collect();

        assert_eq!(first_ids, vec!["id1", "id2"]);
        assert_eq!(first_ids, second_ids);
        assert_eq!(first.name_of("id2"), Some("B"));
        // First occurrence of a duplicated id wins.
        assert_eq!(first.name_of("id1"), None);
    }

    #[test]
    fn test_resolve_trims_input() {
        let doc = parse_document(r#"<root><a id="x" name="X"/></root>"#).unwrap();
        let index = XmiIdIndex::build(&doc);
        let node = index.resolve(&doc, "  x ").expect("resolved");
        assert_eq!(node.tag_name().name(), "a");
    }

    #[test]
    fn test_parse_id_ref_list_keeps_order_and_duplicates() {
        assert_eq!(parse_id_ref_list(" a  b a "), vec!["a", "b", "a"]);
        assert!(parse_id_ref_list("").is_empty());
    }

    #[test]
    fn test_resolve_href_id() {
        assert_eq!(resolve_href_id("model.xmi#EAID_123"), "EAID_123");
        assert_eq!(resolve_href_id("EAID_456"), "EAID_456");
        assert_eq!(resolve_href_id("a#b#c"), "c");
    }

    #[test]
    fn test_synthetic_ids_are_stable_per_node() {
        let doc = parse_document(r#"<root><a/><b name="My View"/></root>"#).unwrap();
        let nodes: Vec<_> = doc
            .root_element()
            .children()
            .filter(|n| n.is_element())
            .collect();

        let mut ids = SyntheticIds::new();
        let (first, fresh) = ids.assign(nodes[0], "eaPkg");
        assert!(fresh);
        assert_eq!(first, "eaPkg_synth_1");

        let (again, fresh) = ids.assign(nodes[0], "eaPkg");
        assert!(!fresh);
        assert_eq!(again, first);

        let (slugged, _) = ids.assign_slugged(nodes[1], "eaDiagram", Some("My View"));
        assert_eq!(slugged, "eaDiagram_synth_1_my_view");
        assert_eq!(ids.lookup(nodes[1]), Some(slugged.as_str()));
    }
}
