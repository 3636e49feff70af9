//! Intermediate Representation for imported models.
//!
//! Every importer produces one [`IrModel`] per run. The IR is format-agnostic:
//! it knows about folders, elements, relationships and views, but nothing
//! about the wire format they came from. The downstream applier assigns final
//! internal ids and merges the IR into the live domain model; nothing in this
//! crate mutates an `IrModel` after the importer's normalization pass returns
//! it.
//!
//! ## Design
//!
//! ```text
//! IrModel
//! ├── folders: Vec<IrFolder>             (tree via parent_id)
//! ├── elements: Vec<IrElement>           (profile-qualified kinds)
//! ├── relationships: Vec<IrRelationship>
//! ├── views: Vec<IrView>                 (nodes + connections)
//! └── meta: ImportMeta
//! ```
//!
//! Ids inside the IR are the source document's ids (or warning-flagged
//! synthetic ones); they are unique per collection in the final merged IR.
//! Open-ended profile payloads live in ordered `meta` maps of [`MetaValue`]s
//! so that no producer-specific data is lost in translation.

mod report;

pub use report::ImportReport;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered map of open-ended metadata attached to IR entities.
pub type MetaMap = IndexMap<String, MetaValue>;

// ============================================================================
// META VALUES
// ============================================================================

/// A metadata value attached to an IR entity.
///
/// Importers park producer-specific payloads here (stereotypes, guids,
/// derived containment data) without widening the IR structs themselves.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    /// String value.
    String(String),
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Real(f64),
    /// List of values.
    List(Vec<MetaValue>),
    /// Nested map of values.
    Map(IndexMap<String, MetaValue>),
}

impl MetaValue {
    /// Get the string value, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the list value, if this is a list.
    pub fn as_list(&self) -> Option<&[MetaValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for MetaValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for MetaValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

// ============================================================================
// MODEL
// ============================================================================

/// A complete imported model: the sole output contract of every importer.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IrModel {
    /// Package/folder tree.
    pub folders: Vec<IrFolder>,
    /// Model elements.
    pub elements: Vec<IrElement>,
    /// Relationships between elements.
    pub relationships: Vec<IrRelationship>,
    /// Diagrams/views.
    pub views: Vec<IrView>,
    /// Provenance metadata.
    pub meta: ImportMeta,
}

impl IrModel {
    /// Look up an element by id.
    pub fn element(&self, id: &str) -> Option<&IrElement> {
        self.elements.iter().find(|e| e.id == id)
    }

    /// Look up a relationship by id.
    pub fn relationship(&self, id: &str) -> Option<&IrRelationship> {
        self.relationships.iter().find(|r| r.id == id)
    }

    /// Look up a folder by id.
    pub fn folder(&self, id: &str) -> Option<&IrFolder> {
        self.folders.iter().find(|f| f.id == id)
    }

    /// Look up a view by id.
    pub fn view(&self, id: &str) -> Option<&IrView> {
        self.views.iter().find(|v| v.id == id)
    }
}

/// Provenance metadata for an imported model.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportMeta {
    /// Importer format id, e.g. `"ea-xmi-uml"`.
    pub format: String,
    /// Exporting tool as declared by the document.
    pub tool: String,
    /// Top-level model name, when the document declares one.
    pub model_name: Option<String>,
    /// Import timestamp, RFC 3339.
    pub imported_at_iso: String,
    /// Source system id, e.g. `"sparx-ea"`.
    pub source_system: String,
}

// ============================================================================
// FOLDERS
// ============================================================================

/// A package/folder in the imported model.
///
/// Folders form a tree rooted at entries with `parent_id == None`. The
/// package parser descends depth-first and is not cycle-safe; a cyclic
/// parent chain in the source is a malformed document.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IrFolder {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
    /// Alternate ids this folder is known by in the source (guids, aliases).
    pub external_ids: Vec<String>,
    pub meta: MetaMap,
}

impl IrFolder {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent_id: None,
            external_ids: Vec::new(),
            meta: MetaMap::new(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent_id = Some(parent.into());
        self
    }
}

// ============================================================================
// ELEMENTS
// ============================================================================

/// A model element.
///
/// `kind` is a profile-qualified string from a closed per-profile vocabulary
/// (`"uml.class"`, `"archimate.business-process"`, `"bpmn.pool"`, …). An
/// element is created once per producer pass; on id collision the merge
/// replaces it wholesale under the documented tie-break, never field-by-field.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IrElement {
    pub id: String,
    /// Profile-qualified element kind.
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub documentation: Option<String>,
    pub folder_id: Option<String>,
    pub external_ids: Vec<String>,
    pub tagged_values: Vec<TaggedValue>,
    /// Classifier members, for class-like kinds.
    #[serde(rename = "umlMembers", skip_serializing_if = "Option::is_none")]
    pub members: Option<UmlMembers>,
    pub meta: MetaMap,
}

impl IrElement {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            name: name.into(),
            documentation: None,
            folder_id: None,
            external_ids: Vec::new(),
            tagged_values: Vec::new(),
            members: None,
            meta: MetaMap::new(),
        }
    }

    pub fn with_documentation(mut self, documentation: impl Into<String>) -> Self {
        self.documentation = Some(documentation.into());
        self
    }

    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder_id = Some(folder.into());
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }
}

/// A name/value tagged value carried over from the source model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaggedValue {
    pub name: String,
    pub value: String,
}

/// Visibility of a classifier member.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
    Protected,
    Package,
}

impl Visibility {
    /// Parse a UML visibility string, defaulting to public.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "private" => Self::Private,
            "protected" => Self::Protected,
            "package" => Self::Package,
            _ => Self::Public,
        }
    }
}

/// Attributes and operations of a class-like element.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UmlMembers {
    pub attributes: Vec<UmlAttribute>,
    pub operations: Vec<UmlOperation>,
}

impl UmlMembers {
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.operations.is_empty()
    }
}

/// A classifier attribute.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UmlAttribute {
    pub name: String,
    /// Dereferenced type name; a raw id only when the index has no name for it.
    pub type_name: Option<String>,
    pub multiplicity: Multiplicity,
    pub visibility: Visibility,
    pub is_static: bool,
    pub default_value: Option<String>,
}

/// A classifier operation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UmlOperation {
    pub name: String,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_abstract: bool,
    pub return_type: Option<String>,
    pub parameters: Vec<UmlParameter>,
}

/// An operation parameter.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UmlParameter {
    pub name: String,
    pub type_name: Option<String>,
}

/// Lower/upper multiplicity bounds, kept as source strings (`"0"`, `"*"`).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Multiplicity {
    pub lower: Option<String>,
    pub upper: Option<String>,
}

// ============================================================================
// RELATIONSHIPS
// ============================================================================

/// A relationship between two elements.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IrRelationship {
    pub id: String,
    /// Profile-qualified relationship kind.
    #[serde(rename = "type")]
    pub kind: String,
    pub source_id: String,
    pub target_id: String,
    pub name: Option<String>,
    pub documentation: Option<String>,
    pub external_ids: Vec<String>,
    pub tagged_values: Vec<TaggedValue>,
    /// Association end attributes, for association-family relationships.
    #[serde(rename = "umlAttrs", skip_serializing_if = "Option::is_none")]
    pub ends: Option<AssociationEnds>,
    pub meta: MetaMap,
}

impl IrRelationship {
    pub fn new(
        id: impl Into<String>,
        kind: impl Into<String>,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            name: None,
            documentation: None,
            external_ids: Vec::new(),
            tagged_values: Vec::new(),
            ends: None,
            meta: MetaMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }
}

/// Source/target end attributes of an association.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AssociationEnds {
    pub source: AssociationEnd,
    pub target: AssociationEnd,
}

/// One end of an association.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationEnd {
    pub role: Option<String>,
    pub multiplicity: Option<String>,
    pub navigable: Option<bool>,
    pub aggregation: Aggregation,
}

/// UML aggregation kind of an association end.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    #[default]
    None,
    Shared,
    Composite,
}

impl Aggregation {
    /// Parse a UML aggregation string, defaulting to none.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "shared" => Self::Shared,
            "composite" => Self::Composite,
            _ => Self::None,
        }
    }
}

// ============================================================================
// VIEWS
// ============================================================================

/// A diagram/view of the model.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IrView {
    pub id: String,
    pub name: String,
    pub viewpoint: Option<String>,
    pub folder_id: Option<String>,
    pub documentation: Option<String>,
    pub nodes: Vec<IrViewNode>,
    pub connections: Vec<IrViewConnection>,
    pub external_ids: Vec<String>,
    pub meta: MetaMap,
}

impl IrView {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            viewpoint: None,
            folder_id: None,
            documentation: None,
            nodes: Vec::new(),
            connections: Vec::new(),
            external_ids: Vec::new(),
            meta: MetaMap::new(),
        }
    }
}

/// Kind of a node placed on a view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewNodeKind {
    #[default]
    Element,
    Note,
    Group,
    Shape,
    Image,
}

/// A node placed on a view.
///
/// `element_id` stays `None` until normalization resolves the node's raw
/// references; `ref_raw` keeps the original reference attributes verbatim so
/// nothing is lost when resolution fails.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IrViewNode {
    pub id: String,
    pub kind: ViewNodeKind,
    pub element_id: Option<String>,
    pub bounds: Option<Bounds>,
    pub parent_node_id: Option<String>,
    pub external_ids: Vec<String>,
    /// Raw reference attributes (attribute name → value), kept verbatim.
    pub ref_raw: IndexMap<String, String>,
    pub meta: MetaMap,
}

impl IrViewNode {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ViewNodeKind::Element,
            element_id: None,
            bounds: None,
            parent_node_id: None,
            external_ids: Vec::new(),
            ref_raw: IndexMap::new(),
            meta: MetaMap::new(),
        }
    }
}

/// A connection drawn on a view.
///
/// Same unresolved-until-resolved contract as [`IrViewNode`]: the
/// `relationship_id`/node/element fields are filled by normalization, and
/// `ref_raw` preserves the source attributes either way.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IrViewConnection {
    pub id: String,
    pub relationship_id: Option<String>,
    pub source_node_id: Option<String>,
    pub target_node_id: Option<String>,
    pub source_element_id: Option<String>,
    pub target_element_id: Option<String>,
    /// Waypoints, either fully present or absent.
    pub points: Option<Vec<Point>>,
    pub external_ids: Vec<String>,
    /// Raw reference attributes (attribute name → value), kept verbatim.
    pub ref_raw: IndexMap<String, String>,
    pub meta: MetaMap,
}

impl IrViewConnection {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            relationship_id: None,
            source_node_id: None,
            target_node_id: None,
            source_element_id: None,
            target_element_id: None,
            points: None,
            external_ids: Vec::new(),
            ref_raw: IndexMap::new(),
            meta: MetaMap::new(),
        }
    }
}

// ============================================================================
// GEOMETRY
// ============================================================================

/// Axis-aligned node bounds. Either fully present or absent on a node,
/// never partially populated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether `other` lies entirely inside `self`.
    pub fn contains(&self, other: &Bounds) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.x + other.width <= self.x + self.width
            && other.y + other.height <= self.y + self.height
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// A waypoint on a view connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}
