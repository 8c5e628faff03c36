use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use fhed_core::document::{Model, SegmentOverrides};
use fhed_core::geometry::Point3;
use serde::{Deserialize, Serialize};

/// 模型快照：只保留实体集合与全局参数，忽略名称计数器等内部状态。
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct GoldenModel {
    title: String,
    units: String,
    nodes: Vec<GoldenNode>,
    segments: Vec<GoldenSegment>,
    ground_planes: Vec<GoldenPlane>,
    externals: Vec<GoldenExternal>,
    equivs: Vec<Vec<String>>,
    freq: [f64; 3],
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct GoldenNode {
    name: String,
    position: [f64; 3],
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct GoldenSegment {
    name: String,
    node1: String,
    node2: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    overrides: BTreeMap<String, f64>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct GoldenPlane {
    name: String,
    corners: [[f64; 3]; 3],
    thick: f64,
    seg1: u32,
    seg2: u32,
    #[serde(default)]
    nodes: Vec<GoldenNode>,
    #[serde(default)]
    holes: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct GoldenExternal {
    node1: String,
    node2: String,
    #[serde(default)]
    port_name: Option<String>,
}

fn xyz(point: Point3) -> [f64; 3] {
    [point.x(), point.y(), point.z()]
}

fn overrides_map(overrides: &SegmentOverrides) -> BTreeMap<String, f64> {
    let entries = [
        ("w", overrides.w),
        ("h", overrides.h),
        ("sigma", overrides.sigma),
        ("rho", overrides.rho),
        ("nhinc", overrides.nhinc.map(f64::from)),
        ("nwinc", overrides.nwinc.map(f64::from)),
        ("rh", overrides.rh),
        ("rw", overrides.rw),
    ];
    entries
        .into_iter()
        .filter_map(|(key, value)| value.map(|value| (key.to_string(), value)))
        .collect()
}

impl GoldenModel {
    pub fn from_model(model: &Model) -> Self {
        Self {
            title: model.title.clone(),
            units: model.units.clone(),
            nodes: model
                .nodes()
                .iter()
                .map(|node| GoldenNode {
                    name: node.name.clone(),
                    position: xyz(node.position),
                })
                .collect(),
            segments: model
                .segments()
                .iter()
                .map(|segment| GoldenSegment {
                    name: segment.name.clone(),
                    node1: segment.node1.clone(),
                    node2: segment.node2.clone(),
                    overrides: overrides_map(&segment.overrides),
                })
                .collect(),
            ground_planes: model
                .ground_planes()
                .iter()
                .map(|plane| GoldenPlane {
                    name: plane.name.clone(),
                    corners: plane.corners.map(xyz),
                    thick: plane.thick,
                    seg1: plane.seg1,
                    seg2: plane.seg2,
                    nodes: plane
                        .nodes
                        .iter()
                        .map(|node| GoldenNode {
                            name: node.name.clone(),
                            position: xyz(node.position),
                        })
                        .collect(),
                    holes: plane.holes.clone(),
                })
                .collect(),
            externals: model
                .externals()
                .iter()
                .map(|external| GoldenExternal {
                    node1: external.node1.clone(),
                    node2: external.node2.clone(),
                    port_name: external.port_name.clone(),
                })
                .collect(),
            equivs: model
                .equivs()
                .iter()
                .map(|equiv| equiv.nodes.clone())
                .collect(),
            freq: [model.freq.fmin, model.freq.fmax, model.freq.ndec],
        }
    }
}

pub fn assert_golden(name: &str, model: &Model) {
    let snapshot = GoldenModel::from_model(model);
    let base_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data/golden");
    if let Err(err) = fs::create_dir_all(&base_dir) {
        panic!("无法创建黄金数据目录 {}: {err}", base_dir.display());
    }
    let golden_path = base_dir.join(format!("{name}.json"));
    let serialized = serde_json::to_string_pretty(&snapshot).expect("序列化黄金快照失败");

    if !golden_path.exists() {
        fs::write(&golden_path, &serialized)
            .unwrap_or_else(|err| panic!("写入黄金文件 {} 失败: {err}", golden_path.display()));
        panic!(
            "黄金文件 {} 不存在，已自动生成。请确认内容后重新运行测试。",
            golden_path.display()
        );
    }

    let expected_str = fs::read_to_string(&golden_path)
        .unwrap_or_else(|err| panic!("读取黄金文件 {} 失败: {err}", golden_path.display()));
    let expected: GoldenModel = serde_json::from_str(&expected_str)
        .unwrap_or_else(|err| panic!("解析黄金文件 {} 失败: {err}", golden_path.display()));

    if expected != snapshot {
        let diff_path = base_dir.join(format!("{name}.actual.json"));
        fs::write(&diff_path, &serialized).expect("写入差异文件失败");
        panic!(
            "黄金文件 {} 与当前解析结果不一致。已生成对照输出 {}。",
            golden_path.display(),
            diff_path.display()
        );
    }
}
