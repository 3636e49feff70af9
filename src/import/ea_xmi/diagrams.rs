//! Diagram subsystem: view catalog, node geometry, link geometry.
//!
//! EA keeps view data in vendor `xmi:Extension` blocks and the exact tag
//! names drift across versions, so matching is heuristic: a tag is
//! diagram-like when its local name equals or ends with `diagram`
//! (case-insensitive), but container and per-object tags
//! (`*DiagramObject`, `*DiagramLink`) never are. Element references on
//! objects and links are captured verbatim into `ref_raw` and deliberately
//! left unresolved here; normalization owns final id resolution.

use roxmltree::{Document, Node};
use rustc_hash::FxHashSet;

use super::geometry;
use super::ids::SyntheticIds;
use super::keys::{self, ID_KEYS};
use crate::ir::{ImportReport, IrView, IrViewConnection, IrViewNode, ViewNodeKind};

/// Guid-style id attribute candidates, in priority order.
const GUID_KEYS: &[&str] = &["guid", "ea_guid", "xmi:uuid"];

/// Non-guid, non-xmi id attribute candidates.
const OTHER_ID_KEYS: &[&str] = &["diagram_id", "diagramid", "localID"];

/// Reference attributes preserved verbatim on view nodes and connections.
const REF_KEYS: &[&str] = &[
    "subject",
    "xmi:idref",
    "xmi.idref",
    "idref",
    "element",
    "classifier",
    "instance_guid",
];

/// Attribute candidates holding a geometry string.
const GEOMETRY_KEYS: &[&str] = &["geometry", "Geometry", "rect", "position"];

/// Attribute candidates holding an explicit waypoint list.
const POINT_LIST_KEYS: &[&str] = &["points", "waypoints", "path"];

// ============================================================================
// CATALOG
// ============================================================================

/// Discover all views and populate their nodes and connections.
pub(crate) fn parse_views(
    doc: &Document<'_>,
    synth: &mut SyntheticIds,
    report: &mut ImportReport,
) -> Vec<IrView> {
    let mut views = catalog(doc, synth, report);

    for view in &mut views {
        match find_diagram_node(doc, synth, view) {
            Some(diagram) => {
                populate_objects(diagram, view, report);
                populate_connections(diagram, view, report);
            }
            None => report.warn(format!(
                "view '{}' could not be matched to its source diagram element; kept with empty contents",
                view.id
            )),
        }
    }

    views
}

/// Whether a local tag name is diagram-like.
fn is_diagram_tag(local: &str) -> bool {
    let lower = local.to_ascii_lowercase();
    (lower == "diagram" || lower.ends_with("diagram"))
        && !lower.contains("diagramobject")
        && !lower.contains("diagramlink")
}

fn diagram_nodes<'a, 'input>(
    doc: &'a Document<'input>,
) -> impl Iterator<Item = Node<'a, 'input>> {
    doc.root()
        .descendants()
        .filter(Node::is_element)
        .filter(|n| is_diagram_tag(keys::local_name(*n)))
}

/// Emit one empty view per diagram-like element.
fn catalog(
    doc: &Document<'_>,
    synth: &mut SyntheticIds,
    report: &mut ImportReport,
) -> Vec<IrView> {
    let mut views = Vec::new();
    let mut seen = FxHashSet::default();

    for node in diagram_nodes(doc) {
        let name = diagram_property(node, &["name"]).unwrap_or_else(|| "Diagram".to_string());

        let id = match keys::attr_any(node, GUID_KEYS)
            .or_else(|| keys::attr_any(node, ID_KEYS))
            .or_else(|| keys::attr_any(node, OTHER_ID_KEYS))
        {
            Some(id) => id.trim().to_string(),
            None => {
                let (id, fresh) = synth.assign_slugged(node, "eaDiagram", Some(&name));
                if fresh {
                    report.warn(format!(
                        "diagram '{name}' has no id; assigned synthetic id '{id}'"
                    ));
                }
                id
            }
        };

        if !seen.insert(id.clone()) {
            report.warn(format!(
                "duplicate diagram id '{id}'; keeping the first occurrence"
            ));
            continue;
        }

        let mut view = IrView::new(id.clone(), name);
        view.viewpoint = diagram_property(node, &["type", "viewpoint"]);
        view.documentation = diagram_property(node, &["documentation", "notes"]);
        view.folder_id = keys::child_named(node, &["model"])
            .and_then(|m| keys::attr_any(m, &["package", "owner"]))
            .map(|p| p.trim().to_string());

        // Every alternate id the diagram is known by, for later matching.
        for key_set in [GUID_KEYS, ID_KEYS, OTHER_ID_KEYS] {
            if let Some(other) = keys::attr_any(node, key_set) {
                let other = other.trim();
                if other != id && !view.external_ids.iter().any(|e| e == other) {
                    view.external_ids.push(other.to_string());
                }
            }
        }

        views.push(view);
    }

    views
}

/// A diagram property: own attribute first, then the EA `properties`/
/// `project`/`model` child attributes.
fn diagram_property(node: Node<'_, '_>, candidate_keys: &[&str]) -> Option<String> {
    if let Some(value) = keys::attr_any(node, candidate_keys) {
        return Some(value.trim().to_string());
    }
    for child_tag in ["properties", "project", "model"] {
        if let Some(child) = keys::child_named(node, &[child_tag]) {
            if let Some(value) = keys::attr_any(child, candidate_keys) {
                return Some(value.trim().to_string());
            }
        }
    }
    None
}

/// Locate a view's source diagram element by any matching candidate key.
fn find_diagram_node<'a, 'input>(
    doc: &'a Document<'input>,
    synth: &SyntheticIds,
    view: &IrView,
) -> Option<Node<'a, 'input>> {
    diagram_nodes(doc).find(|node| {
        if synth.lookup(*node) == Some(view.id.as_str()) {
            return true;
        }
        [GUID_KEYS, ID_KEYS, OTHER_ID_KEYS].iter().any(|key_set| {
            keys::attr_any(*node, key_set).is_some_and(|candidate| {
                let candidate = candidate.trim();
                candidate == view.id || view.external_ids.iter().any(|e| e == candidate)
            })
        })
    })
}

// ============================================================================
// OBJECTS
// ============================================================================

/// Whether a local tag name is a placed-object candidate.
fn is_object_tag(local: &str) -> bool {
    let lower = local.to_ascii_lowercase();
    lower == "element" || lower == "object" || lower.ends_with("diagramobject")
}

/// Whether a local tag name is a dedicated link tag.
fn is_link_tag(local: &str) -> bool {
    let lower = local.to_ascii_lowercase();
    lower == "connector" || lower == "link" || lower.ends_with("diagramlink")
}

/// Whether a placed element is edge-like (a link in disguise).
fn is_link_node(node: Node<'_, '_>) -> bool {
    if is_link_tag(keys::local_name(node)) {
        return true;
    }
    let style = keys::attr(node, "style").unwrap_or_default();
    style.contains("SOID=") && style.contains("EOID=")
}

fn populate_objects(diagram: Node<'_, '_>, view: &mut IrView, report: &mut ImportReport) {
    let mut seen: FxHashSet<String> = FxHashSet::default();
    let mut ordinal = 0usize;

    for node in diagram.descendants().filter(Node::is_element) {
        if node == diagram || !is_object_tag(keys::local_name(node)) || is_link_node(node) {
            continue;
        }
        ordinal += 1;

        let base_id = keys::attr_any(node, ID_KEYS)
            .map(|id| id.trim().to_string())
            .unwrap_or_else(|| format!("{}_obj_{}", view.id, ordinal));
        let id = disambiguate(base_id, &mut seen, "diagram object", report);

        let mut out = IrViewNode::new(id);
        out.kind = node_kind(node);
        out.bounds = decode_node_bounds(node);
        for &key in REF_KEYS {
            if let Some(value) = keys::attr(node, key) {
                out.ref_raw.insert(key.to_string(), value.to_string());
            }
        }
        view.nodes.push(out);
    }
}

/// Bounds priority: explicit LTRB attributes, explicit XYWH attributes,
/// then a geometry string.
fn decode_node_bounds(node: Node<'_, '_>) -> Option<crate::ir::Bounds> {
    let ltrb = [
        keys::attr_any(node, &["left", "Left"]),
        keys::attr_any(node, &["top", "Top"]),
        keys::attr_any(node, &["right", "Right"]),
        keys::attr_any(node, &["bottom", "Bottom"]),
    ];
    if let [Some(l), Some(t), Some(r), Some(b)] = ltrb {
        let parsed: Option<Vec<f64>> = [l, t, r, b]
            .iter()
            .map(|v| v.trim().parse::<f64>().ok())
            .collect();
        if let Some(v) = parsed {
            return geometry::decode_bounds_string(&format!(
                "Left={};Top={};Right={};Bottom={};",
                v[0], v[1], v[2], v[3]
            ));
        }
    }

    let xywh = [
        keys::attr_any(node, &["x"]),
        keys::attr_any(node, &["y"]),
        keys::attr_any(node, &["width", "w"]),
        keys::attr_any(node, &["height", "h"]),
    ];
    if let [Some(x), Some(y), Some(w), Some(h)] = xywh {
        let parsed: Option<Vec<f64>> = [x, y, w, h]
            .iter()
            .map(|v| v.trim().parse::<f64>().ok())
            .collect();
        if let Some(v) = parsed {
            return Some(crate::ir::Bounds::new(v[0], v[1], v[2], v[3]));
        }
    }

    keys::attr_any(node, GEOMETRY_KEYS).and_then(geometry::decode_bounds_string)
}

/// Node kind from style/type hints; element when a subject reference exists.
fn node_kind(node: Node<'_, '_>) -> ViewNodeKind {
    let hint = keys::attr_any(node, &["type", "style"])
        .unwrap_or_default()
        .to_ascii_lowercase();
    if hint.contains("note") {
        ViewNodeKind::Note
    } else if hint.contains("boundary") || hint.contains("group") {
        ViewNodeKind::Group
    } else if hint.contains("image") {
        ViewNodeKind::Image
    } else if hint.contains("text") {
        ViewNodeKind::Shape
    } else if keys::attr_any(node, REF_KEYS).is_some() {
        ViewNodeKind::Element
    } else {
        ViewNodeKind::Shape
    }
}

// ============================================================================
// CONNECTIONS
// ============================================================================

fn populate_connections(diagram: Node<'_, '_>, view: &mut IrView, report: &mut ImportReport) {
    let mut seen: FxHashSet<String> = FxHashSet::default();
    let mut ordinal = 0usize;

    for node in diagram.descendants().filter(Node::is_element) {
        if node == diagram || !is_connection_candidate(node) {
            continue;
        }
        ordinal += 1;

        let base_id = keys::attr_any(node, ID_KEYS)
            .map(|id| id.trim().to_string())
            .unwrap_or_else(|| format!("{}_lnk_{}", view.id, ordinal));
        let id = disambiguate(base_id, &mut seen, "diagram link", report);

        let mut out = IrViewConnection::new(id);
        for &key in REF_KEYS {
            if let Some(value) = keys::attr(node, key) {
                out.ref_raw.insert(key.to_string(), value.to_string());
            }
        }

        let style = keys::attr(node, "style").unwrap_or_default();
        for token_key in ["SOID", "EOID"] {
            if let Some(value) = style_token(style, token_key) {
                out.ref_raw.insert(token_key.to_string(), value.to_string());
            }
        }

        out.points = keys::attr_any(node, POINT_LIST_KEYS)
            .and_then(geometry::decode_point_list)
            .or_else(|| {
                keys::attr_any(node, GEOMETRY_KEYS).and_then(geometry::decode_path_points)
            })
            .or_else(|| geometry::decode_path_points(style));

        view.connections.push(out);
    }
}

/// Link-like: a dedicated link tag, or a generic placed element whose style
/// carries both endpoint tokens and whose geometry looks edge-like.
fn is_connection_candidate(node: Node<'_, '_>) -> bool {
    let local = keys::local_name(node);
    if is_link_tag(local) {
        return true;
    }
    if !is_object_tag(local) {
        return false;
    }
    let style = keys::attr(node, "style").unwrap_or_default();
    if !(style.contains("SOID=") && style.contains("EOID=")) {
        return false;
    }
    keys::attr_any(node, GEOMETRY_KEYS)
        .is_none_or(geometry::looks_edge_like)
}

/// Extract `key=value` from an EA style run (`Mode=3;SOID=EAID_x;…`).
fn style_token<'a>(style: &'a str, key: &str) -> Option<&'a str> {
    style.split(';').find_map(|token| {
        let (k, v) = token.split_once('=')?;
        (k.trim() == key && !v.trim().is_empty()).then(|| v.trim())
    })
}

fn disambiguate(
    base_id: String,
    seen: &mut FxHashSet<String>,
    what: &str,
    report: &mut ImportReport,
) -> String {
    if seen.insert(base_id.clone()) {
        return base_id;
    }
    let mut n = 2usize;
    loop {
        let candidate = format!("{base_id}_{n}");
        if seen.insert(candidate.clone()) {
            report.warn(format!(
                "duplicate {what} id '{base_id}'; disambiguated as '{candidate}'"
            ));
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::xml::parse_document;

    const DOC: &str = r#"
        <xmi:XMI xmlns:xmi="http://www.omg.org/XMI">
          <xmi:Extension extender="Enterprise Architect">
            <diagrams>
              <diagram xmi:id="d1" guid="{AAA-111}">
                <model package="p1"/>
                <properties name="Overview" type="Logical"/>
                <elements>
                  <element geometry="Left=35;Top=312;Right=128;Bottom=372;" subject="EAID_c1" seqno="1"/>
                  <element geometry="Left=10;Top=10;Right=20;Bottom=20;" style="sxNote;" seqno="2"/>
                  <element geometry="SX=0;SY=0;EX=0;EY=0;EDGE=2;Path=10:20;60:20;"
                           subject="EAID_rel1" style="Mode=3;SOID=EAID_c1;EOID=EAID_c2;"/>
                </elements>
              </diagram>
              <diagram xmi:id="d2">
                <properties name="Empty"/>
              </diagram>
            </diagrams>
          </xmi:Extension>
        </xmi:XMI>"#;

    fn run(text: &str) -> (Vec<IrView>, ImportReport) {
        let doc = parse_document(text).unwrap();
        let mut synth = SyntheticIds::new();
        let mut report = ImportReport::new();
        let views = parse_views(&doc, &mut synth, &mut report);
        (views, report)
    }

    #[test]
    fn test_catalog_prefers_guid_over_xmi_id() {
        let (views, _) = run(DOC);
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].id, "{AAA-111}");
        assert!(views[0].external_ids.contains(&"d1".to_string()));
        assert_eq!(views[0].name, "Overview");
        assert_eq!(views[0].viewpoint.as_deref(), Some("Logical"));
        assert_eq!(views[0].folder_id.as_deref(), Some("p1"));
    }

    #[test]
    fn test_objects_decode_bounds_and_keep_raw_refs() {
        let (views, _) = run(DOC);
        let view = &views[0];
        assert_eq!(view.nodes.len(), 2, "the edge-like element is not a node");

        let node = &view.nodes[0];
        assert_eq!(node.kind, ViewNodeKind::Element);
        let bounds = node.bounds.expect("bounds");
        assert_eq!(bounds.x, 35.0);
        assert_eq!(bounds.width, 93.0);
        assert_eq!(node.ref_raw.get("subject").map(String::as_str), Some("EAID_c1"));
        assert!(node.element_id.is_none(), "resolution happens in normalization");

        assert_eq!(view.nodes[1].kind, ViewNodeKind::Note);
    }

    #[test]
    fn test_connections_capture_endpoints_and_waypoints() {
        let (views, _) = run(DOC);
        let view = &views[0];
        assert_eq!(view.connections.len(), 1);

        let connection = &view.connections[0];
        assert_eq!(
            connection.ref_raw.get("SOID").map(String::as_str),
            Some("EAID_c1")
        );
        assert_eq!(
            connection.ref_raw.get("EOID").map(String::as_str),
            Some("EAID_c2")
        );
        let points = connection.points.as_ref().expect("points");
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].x, 10.0);
        assert!(connection.relationship_id.is_none());
    }

    #[test]
    fn test_empty_diagram_keeps_empty_contents() {
        let (views, _) = run(DOC);
        assert_eq!(views[1].name, "Empty");
        assert!(views[1].nodes.is_empty());
        assert!(views[1].connections.is_empty());
    }

    #[test]
    fn test_duplicate_object_ids_are_disambiguated() {
        let (views, report) = run(r#"
            <xmi:XMI xmlns:xmi="http://www.omg.org/XMI">
              <xmi:Extension extender="Enterprise Architect">
                <diagram xmi:id="d1">
                  <properties name="Dupes"/>
                  <elements>
                    <element xmi:id="o1" subject="a"/>
                    <element xmi:id="o1" subject="b"/>
                  </elements>
                </diagram>
              </xmi:Extension>
            </xmi:XMI>"#);

        let ids: Vec<_> = views[0].nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["o1", "o1_2"]);
        assert!(report.contains("disambiguated"));
    }

    #[test]
    fn test_diagram_tag_heuristic() {
        assert!(is_diagram_tag("diagram"));
        assert!(is_diagram_tag("EADiagram"));
        assert!(!is_diagram_tag("diagrams"));
        assert!(!is_diagram_tag("EADiagramObject"));
        assert!(!is_diagram_tag("EADiagramLink"));
        assert!(!is_diagram_tag("element"));
    }
}
