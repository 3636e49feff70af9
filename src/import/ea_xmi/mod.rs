//! Sparx Enterprise Architect XMI importer.
//!
//! EA's UML/ArchiMate/BPMN export is a loosely-standardized dialect: tag and
//! attribute names drift across versions, identifiers come from several
//! competing schemes, and diagram geometry hides in vendor extension blocks.
//! This importer translates one such document into the normalized IR in a
//! fixed sequence of passes over a single in-memory DOM:
//!
//! ```text
//! id index → folders → element producers (UML, ArchiMate, BPMN)
//!          → relationship producers (UML, associations, ArchiMate, BPMN)
//!          → views (catalog, objects, connections)
//!          → producer merge → package materialization → normalization
//! ```
//!
//! Execution is strictly sequential and synchronous; every pass shares the
//! same parsed document and appends to the same report. The importer throws
//! only on unreadable input (undecodable bytes, unparseable XML, non-XMI
//! root); everything else degrades to a warning and a best-effort IR.
//! Elements no producer recognizes are skipped without comment: not every
//! source element maps to a domain concept.

mod diagrams;
mod elements;
mod geometry;
mod ids;
mod keys;
mod materialize;
mod members;
mod merge;
mod normalize;
mod packages;
mod relationships;

use roxmltree::{Document, Node};

use super::xml;
use super::{ImportError, ImportOptions, ImportOutcome, ModelImporter, SniffContext};
use crate::ir::{ImportMeta, ImportReport, IrModel};
use ids::{SyntheticIds, XmiIdIndex};
use merge::Producer;

/// Root markers: one must appear for the document to sniff as XMI.
const XMI_ROOT_MARKERS: &[&str] = &["<xmi:XMI", "<XMI"];

/// UML markers: EA exports carry a UML namespace or prefix.
const UML_MARKERS: &[&str] = &["uml:", "UML:", "omg.org/spec/UML", "omg.org/UML"];

/// EA markers: something Sparx-specific must be present.
const EA_MARKERS: &[&str] = &[
    "Enterprise Architect",
    "EAID_",
    "EAPK_",
    "sparxsystems",
    "Sparx Systems",
];

/// The Sparx EA XMI importer.
#[derive(Debug, Clone, Copy, Default)]
pub struct EaXmi;

impl ModelImporter for EaXmi {
    fn name(&self) -> &'static str {
        "Sparx EA XMI"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["xmi"]
    }

    /// Cheap and conservative: an XMI root AND a UML marker AND an
    /// EA-specific marker, unless the extension is literally `xmi`.
    fn sniff(&self, ctx: &SniffContext<'_>) -> bool {
        if ctx.extension == Some("xmi") {
            return true;
        }
        let text = ctx.sniff_text;
        let has = |markers: &[&str]| markers.iter().any(|m| text.contains(m));
        has(XMI_ROOT_MARKERS) && has(UML_MARKERS) && has(EA_MARKERS)
    }

    fn import(
        &self,
        input: &[u8],
        options: &ImportOptions,
    ) -> Result<ImportOutcome, ImportError> {
        let text = xml::decode_xml_bytes(input)?;
        let doc = xml::parse_document(&text)?;

        let root = doc.root_element();
        if !root.tag_name().name().eq_ignore_ascii_case("XMI") {
            return Err(ImportError::not_xmi(root.tag_name().name()));
        }

        let mut report = ImportReport::new();
        let model = import_document(&doc, options, &mut report);
        Ok(ImportOutcome { model, report })
    }
}

/// Run every pass in dependency order over the parsed document.
fn import_document(
    doc: &Document<'_>,
    options: &ImportOptions,
    report: &mut ImportReport,
) -> IrModel {
    let index = XmiIdIndex::build(doc);
    tracing::debug!(indexed_ids = index.len(), "built xmi id index");
    let mut synth = SyntheticIds::new();

    let (folders, folder_index) = packages::parse_folders(doc, &mut synth, report);
    if folders.is_empty() {
        report.warn("no packages found in document");
    }

    let uml_elements =
        elements::parse_uml_elements(doc, &index, &folder_index, &mut synth, report);
    let archimate_elements =
        elements::parse_archimate_elements(doc, &index, &folder_index, &mut synth, report);
    let bpmn_elements =
        elements::parse_bpmn_elements(doc, &index, &folder_index, &mut synth, report);
    let elements = merge::merge_by_id(
        vec![
            (Producer::Uml, uml_elements),
            (Producer::ArchiMate, archimate_elements),
            (Producer::Bpmn, bpmn_elements),
        ],
        "element",
        report,
    );

    let uml_relationships = relationships::parse_uml_relationships(doc, &mut synth, report);
    let associations = relationships::parse_associations(doc, &index, &mut synth, report);
    let archimate_relationships =
        relationships::parse_archimate_relationships(doc, &mut synth, report);
    let bpmn_relationships = relationships::parse_bpmn_relationships(doc, &mut synth, report);
    let relationships = merge::merge_by_id(
        vec![
            (Producer::Uml, uml_relationships),
            (Producer::UmlAssociation, associations),
            (Producer::ArchiMate, archimate_relationships),
            (Producer::Bpmn, bpmn_relationships),
        ],
        "relationship",
        report,
    );

    let views = diagrams::parse_views(doc, &mut synth, report);

    let mut model = IrModel {
        folders,
        elements,
        relationships,
        views,
        meta: import_meta(doc),
    };

    materialize::materialize_packages(&mut model, options.package_elements);
    normalize::normalize(&mut model, report);

    tracing::debug!(
        folders = model.folders.len(),
        elements = model.elements.len(),
        relationships = model.relationships.len(),
        views = model.views.len(),
        warnings = report.len(),
        "ea xmi import complete"
    );
    model
}

fn import_meta(doc: &Document<'_>) -> ImportMeta {
    let tool = doc
        .root()
        .descendants()
        .filter(Node::is_element)
        .find(|n| keys::local_name(*n) == "Documentation")
        .and_then(|n| keys::attr_any(n, &["exporter"]))
        .unwrap_or("Enterprise Architect")
        .trim()
        .to_string();

    let model_name = packages::find_model_node(doc)
        .and_then(|m| keys::attr(m, "name"))
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    ImportMeta {
        format: "ea-xmi-uml".to_string(),
        tool,
        model_name,
        imported_at_iso: chrono::Utc::now().to_rfc3339(),
        source_system: "sparx-ea".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sniff_ctx<'a>(text: &'a str, extension: Option<&'a str>) -> SniffContext<'a> {
        SniffContext {
            sniff_text: text,
            sniff_bytes: text.as_bytes(),
            extension,
        }
    }

    #[test]
    fn test_sniff_requires_all_three_markers() {
        let ea_export = r#"<xmi:XMI xmlns:uml="http://www.omg.org/spec/UML"
            xmlns:xmi="http://www.omg.org/XMI">
            <xmi:Documentation exporter="Enterprise Architect"/></xmi:XMI>"#;
        assert!(EaXmi.sniff(&sniff_ctx(ea_export, Some("xml"))));

        let plain_uml = r#"<xmi:XMI xmlns:uml="http://www.omg.org/spec/UML"/>"#;
        assert!(!EaXmi.sniff(&sniff_ctx(plain_uml, Some("xml"))), "no EA marker");

        let not_xmi = r#"<model uml: EAID_ Enterprise Architect/>"#;
        assert!(!EaXmi.sniff(&sniff_ctx(not_xmi, Some("xml"))), "no XMI root");
    }

    #[test]
    fn test_sniff_accepts_literal_xmi_extension() {
        assert!(EaXmi.sniff(&sniff_ctx("anything", Some("xmi"))));
    }

    #[test]
    fn test_import_rejects_non_xmi_root() {
        let result = EaXmi.import(b"<model/>", &ImportOptions::default());
        assert!(matches!(result, Err(ImportError::NotXmi { root }) if root == "model"));
    }

    #[test]
    fn test_import_rejects_unparseable_xml() {
        let result = EaXmi.import(b"<xmi:XMI", &ImportOptions::default());
        assert!(matches!(result, Err(ImportError::Xml(_))));
    }

    #[test]
    fn test_empty_xmi_imports_with_informational_warning() {
        let outcome = EaXmi
            .import(
                br#"<xmi:XMI xmlns:xmi="http://www.omg.org/XMI"/>"#,
                &ImportOptions::default(),
            )
            .expect("best-effort IR");
        assert!(outcome.model.folders.is_empty());
        assert!(outcome.report.contains("no packages found"));
        assert_eq!(outcome.model.meta.format, "ea-xmi-uml");
        assert_eq!(outcome.model.meta.source_system, "sparx-ea");
    }
}
