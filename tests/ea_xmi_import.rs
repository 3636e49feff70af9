//! End-to-end tests for the Sparx EA XMI importer.
//!
//! One realistic export fixture exercises the whole pipeline: package tree,
//! the three element producers, the four relationship producers, vendor
//! extension diagrams, package materialization and normalization.

use archon::ir::MetaValue;
use archon::{EaXmi, ImportOptions, ImportOutcome, ModelImporter};
use std::collections::HashSet;

const FIXTURE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xmi:XMI xmi:version="2.1"
         xmlns:xmi="http://schema.omg.org/spec/XMI/2.1"
         xmlns:uml="http://schema.omg.org/spec/UML/2.1"
         xmlns:ArchiMate3="http://www.sparxsystems.com/profiles/ArchiMate3/1.0"
         xmlns:BPMN2.0="http://www.sparxsystems.com/profiles/BPMN2.0/1.0">
  <xmi:Documentation exporter="Enterprise Architect" exporterVersion="1558"/>
  <uml:Model xmi:type="uml:Model" name="DemoModel" visibility="public">
    <packagedElement xmi:type="uml:Package" xmi:id="EAPK_AAA" name="Domain">
      <packagedElement xmi:type="uml:Class" xmi:id="EAID_C1" name="Customer">
        <ownedAttribute xmi:type="uml:Property" xmi:id="EAID_AT1" name="name"
                        visibility="private" type="EAID_T1">
          <lowerValue xmi:type="uml:LiteralInteger" value="1"/>
          <upperValue xmi:type="uml:LiteralUnlimitedNatural" value="1"/>
        </ownedAttribute>
        <ownedOperation xmi:id="EAID_OP1" name="rename">
          <ownedParameter xmi:id="EAID_PR1" name="newName" type="EAID_T1"/>
          <ownedParameter xmi:id="EAID_PR2" direction="return" type="EAID_T1"/>
        </ownedOperation>
        <generalization xmi:type="uml:Generalization" xmi:id="EAID_G1" general="EAID_C2"/>
      </packagedElement>
      <packagedElement xmi:type="uml:Class" xmi:id="EAID_C2" name="Party"/>
      <packagedElement xmi:type="uml:Class" xmi:id="EAID_C3" name="Order"/>
      <packagedElement xmi:type="uml:DataType" xmi:id="EAID_T1" name="Name"/>
      <packagedElement xmi:type="uml:Association" xmi:id="EAID_AS1" memberEnd="EAID_E1 EAID_E2">
        <ownedEnd xmi:type="uml:Property" xmi:id="EAID_E1" type="EAID_C1" aggregation="composite"/>
        <ownedEnd xmi:type="uml:Property" xmi:id="EAID_E2" type="EAID_C3" name="orders">
          <upperValue xmi:type="uml:LiteralUnlimitedNatural" value="*"/>
        </ownedEnd>
      </packagedElement>
      <packagedElement xmi:type="uml:Dependency" xmi:id="EAID_D1"
                       client="EAID_C1 EAID_C2" supplier="EAID_C3 EAID_T1"/>
      <packagedElement xmi:type="uml:Activity" xmi:id="EAID_ACT" name="Fulfil Order"/>
      <packagedElement xmi:type="uml:Action" xmi:id="EAID_A1" name="Pick"/>
      <packagedElement xmi:type="uml:Action" xmi:id="EAID_A2" name="Ship"/>
    </packagedElement>
  </uml:Model>
  <ArchiMate3:ArchiMate_ApplicationComponent base_Class="EAID_C3"/>
  <BPMN2.0:StartEvent base_Element="EAID_BP1" name="Order received"/>
  <xmi:Extension extender="Enterprise Architect" extenderID="6.5">
    <connectors>
      <connector xmi:idref="EAID_R_SRV">
        <source xmi:idref="EAID_C3"/>
        <target xmi:idref="EAID_C1"/>
        <properties ea_type="Dependency" stereotype="ArchiMate_Serving" name="serves"/>
      </connector>
    </connectors>
    <diagrams>
      <diagram xmi:id="EAID_DIA1" guid="{DIA-0001}">
        <model package="EAPK_AAA" localID="42"/>
        <properties name="Domain Overview" type="Logical"/>
        <elements>
          <element geometry="Left=20;Top=20;Right=120;Bottom=80;" subject="EAID_C1"
                   seqno="1" style="DUID=1;"/>
          <element geometry="Left=200;Top=20;Right=300;Bottom=80;" subject="EAID_C3"
                   seqno="2" style="DUID=2;"/>
          <element geometry="Left=340;Top=20;Right=420;Bottom=60;" subject="EAID_AAA" seqno="3"/>
          <element geometry="SX=0;SY=0;EX=0;EY=0;EDGE=2;$LLB=;Path=10:20;60:20;60:40;200:40;"
                   subject="EAID_R_SRV" style="Mode=3;SOID=EAID_C3;EOID=EAID_C1;LWidth=0;"/>
        </elements>
      </diagram>
      <diagram xmi:id="EAID_DIA2">
        <model package="ghost_pkg"/>
        <properties name="Activity Detail" type="Activity"/>
        <elements>
          <element geometry="Left=0;Top=0;Right=400;Bottom=300;" subject="EAID_ACT" seqno="1"/>
          <element geometry="Left=10;Top=10;Right=60;Bottom=40;" subject="EAID_A1" seqno="2"/>
          <element geometry="Left=100;Top=50;Right=150;Bottom=80;" subject="EAID_A2" seqno="3"/>
        </elements>
      </diagram>
    </diagrams>
  </xmi:Extension>
</xmi:XMI>"#;

fn import_fixture() -> ImportOutcome {
    EaXmi
        .import(FIXTURE.as_bytes(), &ImportOptions::default())
        .expect("fixture imports")
}

/// Identical input bytes produce structurally identical IR and warnings.
#[test]
fn test_repeated_imports_are_deterministic() {
    let first = import_fixture();
    let second = import_fixture();

    assert_eq!(
        serde_json::to_value(&first.model.folders).unwrap(),
        serde_json::to_value(&second.model.folders).unwrap()
    );
    assert_eq!(
        serde_json::to_value(&first.model.elements).unwrap(),
        serde_json::to_value(&second.model.elements).unwrap()
    );
    assert_eq!(
        serde_json::to_value(&first.model.relationships).unwrap(),
        serde_json::to_value(&second.model.relationships).unwrap()
    );
    assert_eq!(
        serde_json::to_value(&first.model.views).unwrap(),
        serde_json::to_value(&second.model.views).unwrap()
    );
    assert_eq!(first.report.warnings(), second.report.warnings());
}

#[test]
fn test_folder_tree_and_meta() {
    let outcome = import_fixture();
    let model = &outcome.model;

    assert_eq!(model.folders.len(), 1);
    assert_eq!(model.folders[0].id, "EAPK_AAA");
    assert_eq!(model.folders[0].name, "Domain");
    assert_eq!(model.folders[0].parent_id, None);

    assert_eq!(model.meta.format, "ea-xmi-uml");
    assert_eq!(model.meta.tool, "Enterprise Architect");
    assert_eq!(model.meta.model_name.as_deref(), Some("DemoModel"));
    assert_eq!(model.meta.source_system, "sparx-ea");
    assert!(!model.meta.imported_at_iso.is_empty());
}

#[test]
fn test_classifier_members_are_parsed_and_dereferenced() {
    let outcome = import_fixture();
    let customer = outcome.model.element("EAID_C1").expect("Customer");

    assert_eq!(customer.kind, "uml.class");
    assert_eq!(customer.folder_id.as_deref(), Some("EAPK_AAA"));

    let members = customer.members.as_ref().expect("members");
    assert_eq!(members.attributes.len(), 1);
    assert_eq!(members.attributes[0].name, "name");
    assert_eq!(members.attributes[0].type_name.as_deref(), Some("Name"));
    assert_eq!(members.operations.len(), 1);
    assert_eq!(members.operations[0].return_type.as_deref(), Some("Name"));
    assert_eq!(members.operations[0].parameters.len(), 1);
}

/// An id produced by both the UML pass and the ArchiMate pass merges to the
/// ArchiMate fields, with a warning naming both producers.
#[test]
fn test_profile_collision_merges_to_archimate() {
    let outcome = import_fixture();
    let order = outcome.model.element("EAID_C3").expect("Order");

    assert_eq!(order.kind, "archimate.application-component");
    assert_eq!(order.name, "Order");
    assert!(outcome.report.contains("between UML and ArchiMate"));
}

#[test]
fn test_bpmn_element_survives_without_uml_counterpart() {
    let outcome = import_fixture();
    let event = outcome.model.element("EAID_BP1").expect("start event");
    assert_eq!(event.kind, "bpmn.start-event");
    assert_eq!(event.name, "Order received");
}

/// `client="A B" supplier="C D"` expands to the full cross-product with
/// distinct ids.
#[test]
fn test_dependency_cross_product() {
    let outcome = import_fixture();
    let dependencies: Vec<_> = outcome
        .model
        .relationships
        .iter()
        .filter(|r| r.id.starts_with("EAID_D1"))
        .collect();

    assert_eq!(dependencies.len(), 4);
    let ids: HashSet<_> = dependencies.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids.len(), 4);
    assert!(dependencies.iter().all(|r| r.kind == "uml.dependency"));
}

#[test]
fn test_embedded_generalization_and_composition() {
    let outcome = import_fixture();
    let model = &outcome.model;

    let generalization = model.relationship("EAID_G1").expect("generalization");
    assert_eq!(generalization.kind, "uml.generalization");
    assert_eq!(generalization.source_id, "EAID_C1");
    assert_eq!(generalization.target_id, "EAID_C2");

    let association = model.relationship("EAID_AS1").expect("association");
    assert_eq!(association.kind, "uml.composition");
    assert_eq!(association.source_id, "EAID_C1");
    assert_eq!(association.target_id, "EAID_C3");
    let ends = association.ends.as_ref().expect("ends");
    assert_eq!(ends.target.role.as_deref(), Some("orders"));
    assert_eq!(ends.target.multiplicity.as_deref(), Some("*"));
}

#[test]
fn test_archimate_connector_relationship() {
    let outcome = import_fixture();
    let serving = outcome.model.relationship("EAID_R_SRV").expect("serving");
    assert_eq!(serving.kind, "archimate.serving");
    assert_eq!(serving.source_id, "EAID_C3");
    assert_eq!(serving.target_id, "EAID_C1");
    assert_eq!(serving.name.as_deref(), Some("serves"));
}

#[test]
fn test_view_catalog_uses_guid_and_folder() {
    let outcome = import_fixture();
    let overview = outcome.model.view("{DIA-0001}").expect("overview");

    assert_eq!(overview.name, "Domain Overview");
    assert_eq!(overview.viewpoint.as_deref(), Some("Logical"));
    assert_eq!(overview.folder_id.as_deref(), Some("EAPK_AAA"));
    assert!(overview.external_ids.contains(&"EAID_DIA1".to_string()));
    assert_eq!(overview.nodes.len(), 3);
    assert_eq!(overview.connections.len(), 1);
}

/// The edge's `Path=` segment decodes to exactly its waypoints; the
/// connection resolves to its relationship and endpoint nodes.
#[test]
fn test_connection_waypoints_and_resolution() {
    let outcome = import_fixture();
    let overview = outcome.model.view("{DIA-0001}").expect("overview");
    let connection = &overview.connections[0];

    let points = connection.points.as_ref().expect("waypoints");
    let coords: Vec<(f64, f64)> = points.iter().map(|p| (p.x, p.y)).collect();
    assert_eq!(
        coords,
        vec![(10.0, 20.0), (60.0, 20.0), (60.0, 40.0), (200.0, 40.0)]
    );

    assert_eq!(connection.relationship_id.as_deref(), Some("EAID_R_SRV"));
    assert_eq!(connection.source_element_id.as_deref(), Some("EAID_C3"));
    assert_eq!(connection.target_element_id.as_deref(), Some("EAID_C1"));

    let source_node = overview
        .nodes
        .iter()
        .find(|n| n.element_id.as_deref() == Some("EAID_C3"))
        .expect("placed node");
    assert_eq!(connection.source_node_id.as_deref(), Some(source_node.id.as_str()));
}

/// A diagram node referencing the package through its `EAID_*` alias
/// resolves, post-materialization, to the synthesized `EAPK_*` element.
#[test]
fn test_package_alias_materialization() {
    let outcome = import_fixture();
    let model = &outcome.model;

    let package = model.element("EAPK_AAA").expect("materialized package");
    assert_eq!(package.kind, "uml.package");
    assert_eq!(package.name, "Domain");

    let overview = model.view("{DIA-0001}").expect("overview");
    let node = overview
        .nodes
        .iter()
        .find(|n| n.element_id.as_deref() == Some("EAPK_AAA"))
        .expect("package node resolved to the canonical id");
    assert!(
        node.ref_raw.values().all(|v| v != "EAID_AAA"),
        "no raw alias survives"
    );
}

/// Activity containment is derived from geometry: in-bounds children gain
/// `activityId` and the activity accumulates `ownedNodeRefs`.
#[test]
fn test_activity_containment_from_view_geometry() {
    let outcome = import_fixture();
    let model = &outcome.model;

    for action in ["EAID_A1", "EAID_A2"] {
        let element = model.element(action).expect("action");
        assert_eq!(
            element.meta.get("activityId"),
            Some(&MetaValue::String("EAID_ACT".to_string())),
            "{action} should belong to the activity"
        );
    }

    let activity = model.element("EAID_ACT").expect("activity");
    let owned: HashSet<&str> = activity
        .meta
        .get("ownedNodeRefs")
        .and_then(MetaValue::as_list)
        .expect("ownedNodeRefs")
        .iter()
        .filter_map(MetaValue::as_str)
        .collect();
    assert_eq!(owned, HashSet::from_iter(["EAID_A1", "EAID_A2"]));
}

/// A view pointing at an unknown folder is rehomed to root with one warning
/// naming both ids.
#[test]
fn test_unknown_view_folder_is_rehomed() {
    let outcome = import_fixture();
    let detail = outcome.model.view("EAID_DIA2").expect("detail view");

    assert_eq!(detail.folder_id, None);
    let matching: Vec<_> = outcome
        .report
        .warnings()
        .iter()
        .filter(|w| w.contains("EAID_DIA2") && w.contains("ghost_pkg"))
        .collect();
    assert_eq!(matching.len(), 1);
}

/// Unrecognized source elements are skipped without any warning.
#[test]
fn test_unrecognized_elements_are_silently_skipped() {
    let outcome = EaXmi
        .import(
            br#"<xmi:XMI xmlns:xmi="http://schema.omg.org/spec/XMI/2.1"
                         xmlns:uml="http://schema.omg.org/spec/UML/2.1">
                  <uml:Model xmi:type="uml:Model" name="M">
                    <packagedElement xmi:type="uml:Package" xmi:id="p1" name="P">
                      <packagedElement xmi:type="uml:ProfileApplication" xmi:id="weird"/>
                    </packagedElement>
                  </uml:Model>
                </xmi:XMI>"#,
            &ImportOptions::default(),
        )
        .expect("imports");

    assert!(outcome.model.element("weird").is_none());
    assert!(outcome.report.is_empty(), "skipping is silent by design");
}
