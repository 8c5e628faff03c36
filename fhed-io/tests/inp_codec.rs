mod golden;

use std::fs;
use std::path::PathBuf;

use fhed_core::document::{GroundPlaneDraft, Model, NodeUpdate, SegmentOverrides};
use fhed_core::geometry::Point3;
use fhed_io::{
    DocumentLoader, DocumentSaver, GeometryJsonFacade, InpFacade, IoError,
    decode_geometry_import, loader_for_path, parse_inp, write_inp,
};
use golden::{GoldenModel, assert_golden};
use tempfile::tempdir;

fn fixture(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/data");
    path.push(name);
    path
}

#[test]
fn load_two_traces_matches_expected_model() {
    let loader = InpFacade::new();
    let model = loader.load(&fixture("two_traces.inp")).expect("读取 .inp 失败");
    assert_golden("two_traces", &model);

    assert_eq!(model.defaults.w, Some(0.5));
    assert_eq!(model.defaults.z, Some(0.1));
    assert_eq!(model.defaults.rh, Some(2.0));
    assert!(model.node("n99").is_none());
}

#[test]
fn write_then_parse_preserves_entity_sets() {
    let original = parse_inp(&fs::read_to_string(fixture("two_traces.inp")).unwrap());
    let text = write_inp(&original);
    let reparsed = parse_inp(&text);

    assert_eq!(
        GoldenModel::from_model(&reparsed),
        GoldenModel::from_model(&original)
    );
    assert_eq!(reparsed.title, original.title);
    assert_eq!(reparsed.freq, original.freq);
}

#[test]
fn plane_owned_nodes_are_not_written_twice() {
    let model = parse_inp(&fs::read_to_string(fixture("two_traces.inp")).unwrap());
    let text = write_inp(&model);
    assert!(text.contains("+  ngnd  (0,5,0)"));
    assert!(!text.lines().any(|line| line.starts_with("ngnd ")));
    assert!(text.contains("+  hole rect (8,4,0,12,6,0)"));
    assert!(text.trim_end().ends_with(".end"));
}

#[test]
fn edited_model_survives_save_and_load() {
    let mut model = Model::new();
    model.title = "edited".to_string();
    model.add_node(None, Point3::new(0.0, 0.0, 0.0)).unwrap();
    model.add_node(None, Point3::new(12.5, -3.0, 0.25)).unwrap();
    model
        .add_segment(
            "n1",
            "n2",
            SegmentOverrides {
                w: Some(0.2),
                sigma: Some(3.5e7),
                rho: Some(2.0e-8),
                nwinc: Some(7),
                ..SegmentOverrides::default()
            },
        )
        .unwrap();
    model.add_ground_plane(GroundPlaneDraft {
        corners: [
            Point3::new(-1.0, -1.0, -0.5),
            Point3::new(14.0, -1.0, -0.5),
            Point3::new(14.0, 2.0, -0.5),
        ],
        thick: 0.1,
        seg1: 15.0,
        seg2: 3.0,
    });
    model.add_external("n1", "n2", Some("Port1")).unwrap();
    model.add_equiv(["n1", "n2"]).unwrap();

    let dir = tempdir().unwrap();
    let path = dir.path().join("edited.inp");
    let facade = InpFacade::new();
    facade.save(&model, &path).unwrap();
    let loaded = facade.load(&path).unwrap();

    assert_eq!(GoldenModel::from_model(&loaded), GoldenModel::from_model(&model));
    assert_eq!(loaded.externals()[0].port_name.as_deref(), Some("Port1"));
}

#[test]
fn plane_node_name_collision_keeps_first_definition() {
    let model = InpFacade::new().load(&fixture("gp_collision.inp")).unwrap();
    let free = model.node("nshared").unwrap();
    assert_eq!(free.position, Point3::new(1.0, 1.0, 1.0));
    assert_eq!(model.nodes().len(), 1);

    let plane = model.ground_plane("g1").unwrap();
    assert_eq!(plane.sigma, Some(1e7));
    assert_eq!(plane.nodes[0].position, Point3::new(2.0, 2.0, 0.0));
}

#[test]
fn empty_text_yields_default_model() {
    let model = parse_inp("");
    assert_eq!(model.title, "FastHenry Model");
    assert_eq!(model.units, "mm");
    assert!(model.nodes().is_empty());
    assert!(model.bounds().is_none());
}

#[test]
fn geometry_import_builds_fresh_model() {
    let json = r#"{
        "nodes": [
            {"name": "N0", "x": 0, "y": 0, "z": 0},
            {"name": "N1", "x": 10, "y": 0, "z": 0}
        ],
        "segments": [
            {"name": "E0", "node1": "N0", "node2": "N1", "w": 0.5, "h": 0}
        ],
        "info": "converted 1 face"
    }"#;
    let import = decode_geometry_import(json).unwrap();
    assert_eq!(import.info.as_deref(), Some("converted 1 face"));

    let dir = tempdir().unwrap();
    let path = dir.path().join("import.json");
    fs::write(&path, json).unwrap();
    let model = GeometryJsonFacade::new().load(&path).unwrap();
    assert_eq!(model.nodes()[0].name, "n0");
    assert_eq!(model.segments()[0].overrides.w, Some(0.5));
    assert_eq!(model.segments()[0].overrides.h, None);
}

#[test]
fn malformed_import_and_unknown_extension_are_errors() {
    assert!(matches!(
        decode_geometry_import("{\"nodes\": 3}"),
        Err(IoError::InvalidImport(_))
    ));
    assert!(matches!(
        loader_for_path(&PathBuf::from("board.step")),
        Err(IoError::UnsupportedFeature(_))
    ));
    assert!(loader_for_path(&PathBuf::from("board.INP")).is_ok());

    let missing = InpFacade::new().load(&PathBuf::from("/nonexistent/none.inp"));
    assert!(matches!(missing, Err(IoError::ReadError { .. })));
}

#[test]
fn segment_record_reads_endpoints_and_size_overrides() {
    let model = parse_inp("n1 x=0 y=0 z=0\nn2 x=5 y=0 z=0\ne1 n1 n2 w=2 h=1\n.end\n");
    let segment = model.segment("e1").unwrap();
    assert_eq!((segment.node1.as_str(), segment.node2.as_str()), ("n1", "n2"));
    assert_eq!(segment.overrides.w, Some(2.0));
    assert_eq!(segment.overrides.h, Some(1.0));
    assert_eq!(segment.overrides.sigma, None);
}

#[test]
fn ground_plane_embedded_node_becomes_model_node() {
    let text = "g1 x1=0 y1=0 z1=0 x2=10 y2=0 z2=0 x3=10 y3=10 z3=0\n+ thick=0.2 seg1=4 seg2=4\n+ n7(1,2,0)\n.end\n";
    let model = parse_inp(text);
    let node = model.node("n7").unwrap();
    assert_eq!(node.position, Point3::new(1.0, 2.0, 0.0));
    let plane = model.ground_plane("g1").unwrap();
    assert_eq!(plane.nodes[0].name, "n7");
    assert!(model.plane_node_names().contains("n7"));
    assert!(!write_inp(&model).lines().any(|line| line.starts_with("n7 ")));
}

const PLANE_WITH_TRACE: &str = "* plane with a trace
g1 x1=0 y1=0 z1=0 x2=10 y2=0 z2=0 x3=10 y3=10 z3=0
+ thick=0.2 seg1=4 seg2=4
+ n7 (1,2,0)
n1 x=4 y=4 z=1
e1 n1 n7
.external n1 n7 p1
.end
";

fn reparse(model: &Model) -> Model {
    parse_inp(&write_inp(model))
}

fn assert_round_trip(model: &Model) -> Model {
    let reparsed = reparse(model);
    assert_eq!(GoldenModel::from_model(&reparsed), GoldenModel::from_model(model));
    reparsed
}

#[test]
fn moved_plane_node_survives_round_trip() {
    let mut model = parse_inp(PLANE_WITH_TRACE);
    model
        .update_node(
            "n7",
            NodeUpdate {
                x: Some(5.0),
                ..NodeUpdate::default()
            },
        )
        .unwrap();
    let reparsed = assert_round_trip(&model);
    assert_eq!(reparsed.node("n7").unwrap().position, Point3::new(5.0, 2.0, 0.0));
}

#[test]
fn renamed_plane_node_survives_round_trip() {
    let mut model = parse_inp(PLANE_WITH_TRACE);
    model
        .update_node(
            "n7",
            NodeUpdate {
                name: Some("n8".to_string()),
                ..NodeUpdate::default()
            },
        )
        .unwrap();
    let reparsed = assert_round_trip(&model);
    let names: Vec<&str> = reparsed.nodes().iter().map(|node| node.name.as_str()).collect();
    assert_eq!(names, vec!["n8", "n1"]);
    assert_eq!(reparsed.segments()[0].node2, "n8");
}

#[test]
fn removed_plane_node_is_not_written_back() {
    let mut model = parse_inp(PLANE_WITH_TRACE);
    model.remove_node("n7").unwrap();
    let reparsed = assert_round_trip(&model);
    assert!(reparsed.node("n7").is_none());
    assert!(reparsed.segments().is_empty());
    assert!(reparsed.externals().is_empty());
}

#[test]
fn renamed_node_without_prefix_stays_a_node() {
    let mut model = parse_inp(PLANE_WITH_TRACE);
    model
        .update_node(
            "n1",
            NodeUpdate {
                name: Some("Port".to_string()),
                ..NodeUpdate::default()
            },
        )
        .unwrap();
    let reparsed = assert_round_trip(&model);
    assert!(reparsed.node("nport").is_some());
    assert_eq!(reparsed.segments()[0].node1, "nport");
    assert_eq!(reparsed.externals()[0].node1, "nport");
}

#[test]
fn plane_node_collision_survives_round_trip() {
    let model = InpFacade::new().load(&fixture("gp_collision.inp")).unwrap();
    let text = write_inp(&model);
    let line_of = |prefix: &str| {
        text.lines()
            .position(|line| line.starts_with(prefix))
            .unwrap_or_else(|| panic!("缺少 {prefix} 行:\n{text}"))
    };
    assert!(line_of("nshared ") < line_of("g1 "), "{text}");

    let reparsed = assert_round_trip(&model);
    assert_eq!(
        reparsed.node("nshared").unwrap().position,
        Point3::new(1.0, 1.0, 1.0)
    );

    let mut moved = reparsed;
    moved
        .update_node(
            "nshared",
            NodeUpdate {
                name: Some("nfree".to_string()),
                y: Some(-1.0),
                ..NodeUpdate::default()
            },
        )
        .unwrap();
    let again = assert_round_trip(&moved);
    assert_eq!(again.node("nfree").unwrap().position, Point3::new(1.0, -1.0, 1.0));
    assert_eq!(
        again.ground_plane("g1").unwrap().nodes[0].position,
        Point3::new(2.0, 2.0, 0.0)
    );
}
