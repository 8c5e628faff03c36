use std::collections::HashMap;
use std::fmt;

use fhed_core::document::Model;
use fhed_core::geometry::{Bounds3, Ray3};
use glam::{DMat4, DVec3, DVec4};
use tracing::{debug, trace};

pub const NODE_RADIUS_FACTOR: f64 = 0.015;
pub const MIN_NODE_RADIUS: f64 = 0.005;
/// 空模型时的节点半径。
pub const EMPTY_NODE_RADIUS: f64 = 0.5;
/// 节点与接地平面总数超过该值时不再生成标签。
pub const LABEL_CAP: usize = 300;
pub const FALLBACK_SEGMENT_WIDTH: f64 = 1.0;
pub const FALLBACK_SEGMENT_HEIGHT: f64 = 0.5;
const DEGENERATE_LENGTH: f64 = 1e-12;
const VERTICAL_THRESHOLD: f64 = 0.999;

/// 单位立方体的 8 个角点，经段变换后得到棱柱角点。
const UNIT_CORNERS: [[f64; 3]; 8] = [
    [-0.5, -0.5, -0.5],
    [0.5, -0.5, -0.5],
    [0.5, 0.5, -0.5],
    [-0.5, 0.5, -0.5],
    [-0.5, -0.5, 0.5],
    [0.5, -0.5, 0.5],
    [0.5, 0.5, 0.5],
    [-0.5, 0.5, 0.5],
];

pub const BOX_EDGES: [(usize, usize); 12] = [
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 0),
    (4, 5),
    (5, 6),
    (6, 7),
    (7, 4),
    (0, 4),
    (1, 5),
    (2, 6),
    (3, 7),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// 解析 `#rrggbb`（`#` 可省略）。
    pub fn from_hex(text: &str) -> Option<Self> {
        let hex = text.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
        Some(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    pub fn to_f32(self) -> [f32; 3] {
        [
            f32::from(self.r) / 255.0,
            f32::from(self.g) / 255.0,
            f32::from(self.b) / 255.0,
        ]
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

pub mod palette {
    use super::Rgb;

    pub const NODE: Rgb = Rgb::new(0x3f, 0xb9, 0x50);
    pub const SEGMENT: Rgb = Rgb::new(0x44, 0x93, 0xf8);
    pub const STAGED: Rgb = Rgb::new(0x44, 0x93, 0xf8);
    pub const SELECTED: Rgb = Rgb::new(0xff, 0xff, 0xff);
    pub const PORT: Rgb = Rgb::new(0xf8, 0x51, 0x49);
    pub const PLANE: Rgb = Rgb::new(0xd2, 0x99, 0x22);
    pub const SEGMENT_EDGE: Rgb = Rgb::new(0x58, 0xa6, 0xff);
    pub const PLANE_SELECTED_EMISSIVE: Rgb = Rgb::new(0x33, 0x33, 0x33);
    pub const NO_EMISSIVE: Rgb = Rgb::new(0, 0, 0);
    pub const LABEL: Rgb = Rgb::new(0xe6, 0xed, 0xf3);
}

/// 显示选项。尺寸类选项变化需要完全重建，其余只做外观更新。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayOptions {
    pub node_size: f64,
    pub label_size: f64,
    pub show_labels: bool,
    pub node_color: Rgb,
    pub segment_color: Rgb,
    pub segment_opacity: f32,
    pub plane_opacity: f32,
    pub show_grid: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            node_size: 1.0,
            label_size: 1.0,
            show_labels: true,
            node_color: palette::NODE,
            segment_color: palette::SEGMENT,
            segment_opacity: 0.75,
            plane_opacity: 0.3,
            show_grid: true,
        }
    }
}

impl DisplayOptions {
    fn requires_rebuild(&self, previous: &DisplayOptions) -> bool {
        self.node_size != previous.node_size || self.label_size != previous.label_size
    }
}

/// 场景中可被拾取/选中的实体。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKey {
    Node(String),
    Segment(String),
    GroundPlane(String),
}

impl EntityKey {
    pub fn name(&self) -> &str {
        match self {
            EntityKey::Node(name) | EntityKey::Segment(name) | EntityKey::GroundPlane(name) => name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EntityKey::Node(_) => "node",
            EntityKey::Segment(_) => "segment",
            EntityKey::GroundPlane(_) => "ground plane",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeInstance {
    pub name: String,
    pub center: DVec3,
    pub radius: f64,
    pub color: Rgb,
}

/// 导体段渲染实例：单位立方体经 `transform` 变换后的长方体。
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentInstance {
    pub name: String,
    pub transform: DMat4,
    pub corners: [DVec3; 8],
    pub color: Rgb,
}

impl SegmentInstance {
    pub fn edges(&self) -> impl Iterator<Item = (DVec3, DVec3)> + '_ {
        BOX_EDGES
            .iter()
            .map(|&(a, b)| (self.corners[a], self.corners[b]))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaneMesh {
    pub name: String,
    pub corners: [DVec3; 4],
    pub emissive: Rgb,
}

impl PlaneMesh {
    pub fn triangles(&self) -> [[DVec3; 3]; 2] {
        let [p1, p2, p3, p4] = self.corners;
        [[p1, p2, p3], [p1, p3, p4]]
    }

    pub fn outline(&self) -> [(DVec3, DVec3); 4] {
        let [p1, p2, p3, p4] = self.corners;
        [(p1, p2), (p2, p3), (p3, p4), (p4, p1)]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortLine {
    pub start: DVec3,
    pub end: DVec3,
    pub port_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub text: String,
    pub position: DVec3,
    pub scale: f64,
}

/// 由模型派生的可渲染数据，始终是上次重建时模型的纯函数（外观与高亮除外）。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneFrame {
    pub bounds: Option<Bounds3>,
    pub node_radius: f64,
    pub nodes: Vec<NodeInstance>,
    pub segments: Vec<SegmentInstance>,
    pub planes: Vec<PlaneMesh>,
    pub ports: Vec<PortLine>,
    pub labels: Vec<Label>,
    pub labels_visible: bool,
    pub grid_visible: bool,
    pub segment_opacity: f32,
    pub plane_opacity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayUpdate {
    Rebuilt,
    Cosmetic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickFilter {
    All,
    NodesOnly,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PickHit {
    pub key: EntityKey,
    pub distance: f64,
}

/// 场景同步器：维护派生几何、名称到渲染索引的映射以及选中/待连接高亮。
#[derive(Debug)]
pub struct SceneSync {
    frame: SceneFrame,
    options: DisplayOptions,
    built_with: Option<DisplayOptions>,
    index: HashMap<EntityKey, usize>,
    selected: Option<EntityKey>,
    staged: Option<String>,
    revision: u64,
}

impl Default for SceneSync {
    fn default() -> Self {
        Self::new(DisplayOptions::default())
    }
}

impl SceneSync {
    pub fn new(options: DisplayOptions) -> Self {
        Self {
            frame: SceneFrame::default(),
            options,
            built_with: None,
            index: HashMap::new(),
            selected: None,
            staged: None,
            revision: 0,
        }
    }

    #[inline]
    pub fn frame(&self) -> &SceneFrame {
        &self.frame
    }

    #[inline]
    pub fn options(&self) -> &DisplayOptions {
        &self.options
    }

    /// 每次完全重建递增，供渲染端判断是否需要重新生成网格。
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[inline]
    pub fn selection(&self) -> Option<&EntityKey> {
        self.selected.as_ref()
    }

    #[inline]
    pub fn staged(&self) -> Option<&str> {
        self.staged.as_deref()
    }

    /// 已渲染节点的中心位置。
    pub fn node_position(&self, name: &str) -> Option<DVec3> {
        let index = *self.index.get(&EntityKey::Node(name.to_string()))?;
        self.frame.nodes.get(index).map(|node| node.center)
    }

    #[inline]
    pub fn contains(&self, key: &EntityKey) -> bool {
        self.index.contains_key(key)
    }

    /// 丢弃全部派生几何并从模型重新生成。
    pub fn rebuild(&mut self, model: &Model) {
        let options = self.options;
        let bounds = model.bounds();
        let node_radius = compute_node_radius(model, bounds.as_ref()) * options.node_size;

        let mut frame = SceneFrame {
            bounds,
            node_radius,
            ..SceneFrame::default()
        };
        let mut index = HashMap::new();

        // 同名节点只取第一个
        let mut positions: HashMap<&str, DVec3> = HashMap::new();
        for node in model.nodes() {
            let center = node.position.as_vec3();
            if positions.contains_key(node.name.as_str()) {
                continue;
            }
            positions.insert(node.name.as_str(), center);
            index.insert(EntityKey::Node(node.name.clone()), frame.nodes.len());
            frame.nodes.push(NodeInstance {
                name: node.name.clone(),
                center,
                radius: node_radius,
                color: options.node_color,
            });
        }

        for segment in model.segments() {
            let (Some(&a), Some(&b)) = (
                positions.get(segment.node1.as_str()),
                positions.get(segment.node2.as_str()),
            ) else {
                trace!(segment = %segment.name, "端点无法解析，跳过渲染");
                continue;
            };
            let width = positive(segment.overrides.w)
                .or(positive(model.defaults.w))
                .unwrap_or(FALLBACK_SEGMENT_WIDTH);
            let height = positive(segment.overrides.h)
                .or(positive(model.defaults.h))
                .unwrap_or(FALLBACK_SEGMENT_HEIGHT);
            let Some(transform) = segment_transform(a, b, width, height) else {
                trace!(segment = %segment.name, "长度过小，跳过渲染");
                continue;
            };
            let corners = UNIT_CORNERS.map(|[x, y, z]| transform.transform_point3(DVec3::new(x, y, z)));
            index.insert(EntityKey::Segment(segment.name.clone()), frame.segments.len());
            frame.segments.push(SegmentInstance {
                name: segment.name.clone(),
                transform,
                corners,
                color: options.segment_color,
            });
        }

        for plane in model.ground_planes() {
            index.insert(EntityKey::GroundPlane(plane.name.clone()), frame.planes.len());
            frame.planes.push(PlaneMesh {
                name: plane.name.clone(),
                corners: plane.all_corners().map(|corner| corner.as_vec3()),
                emissive: palette::NO_EMISSIVE,
            });
        }

        for external in model.externals() {
            if let (Some(&start), Some(&end)) = (
                positions.get(external.node1.as_str()),
                positions.get(external.node2.as_str()),
            ) {
                frame.ports.push(PortLine {
                    start,
                    end,
                    port_name: external.port_name.clone(),
                });
            }
        }

        let label_count = model.nodes().len() + model.ground_planes().len();
        if label_count <= LABEL_CAP {
            let node_label_scale = node_radius * 2.5 * options.label_size;
            for node in &frame.nodes {
                frame.labels.push(Label {
                    text: node.name.clone(),
                    position: node.center + DVec3::Z * node_radius * 2.5,
                    scale: node_label_scale,
                });
            }
            for plane in model.ground_planes() {
                frame.labels.push(Label {
                    text: plane.name.clone(),
                    position: plane.centroid().as_vec3(),
                    scale: 2.0 * options.label_size,
                });
            }
        }

        self.frame = frame;
        self.index = index;
        self.built_with = Some(options);
        self.revision += 1;

        if self.selected.as_ref().is_some_and(|key| !self.index.contains_key(key)) {
            self.selected = None;
        }
        if let Some(staged) = &self.staged {
            if !self.index.contains_key(&EntityKey::Node(staged.clone())) {
                self.staged = None;
            }
        }
        self.apply_cosmetics(label_count);

        debug!(
            nodes = self.frame.nodes.len(),
            segments = self.frame.segments.len(),
            planes = self.frame.planes.len(),
            ports = self.frame.ports.len(),
            revision = self.revision,
            "场景已重建"
        );
    }

    /// 应用新的显示选项：首次调用或尺寸类选项变化时完全重建，否则只更新外观。
    pub fn update_display(&mut self, model: &Model, options: DisplayOptions) -> DisplayUpdate {
        self.options = options;
        let needs_rebuild = match &self.built_with {
            None => true,
            Some(previous) => options.requires_rebuild(previous),
        };
        if needs_rebuild {
            self.rebuild(model);
            DisplayUpdate::Rebuilt
        } else {
            self.apply_cosmetics(model.nodes().len() + model.ground_planes().len());
            DisplayUpdate::Cosmetic
        }
    }

    /// 设置当前选中实体。实体不在场景中时清空选中并返回 `false`。
    pub fn set_selection(&mut self, key: Option<EntityKey>) -> bool {
        let resolved = key.filter(|key| self.index.contains_key(key));
        let found = resolved.is_some();
        if let Some(EntityKey::Node(name)) = &resolved {
            if self.staged.as_deref() == Some(name.as_str()) {
                self.staged = None;
            }
        }
        self.selected = resolved;
        self.recolor();
        found
    }

    /// 设置待连接的第一个端点。与选中高亮互斥：同一节点只能处于其中一种状态。
    pub fn set_staged(&mut self, node: Option<&str>) -> bool {
        let resolved = node
            .map(str::to_string)
            .filter(|name| self.index.contains_key(&EntityKey::Node(name.clone())));
        let found = resolved.is_some();
        if let (Some(name), Some(EntityKey::Node(selected))) = (&resolved, &self.selected) {
            if name == selected {
                self.selected = None;
            }
        }
        self.staged = resolved;
        self.recolor();
        found
    }

    pub fn clear_highlights(&mut self) {
        self.selected = None;
        self.staged = None;
        self.recolor();
    }

    fn apply_cosmetics(&mut self, label_count: usize) {
        self.frame.labels_visible = self.options.show_labels && label_count <= LABEL_CAP;
        self.frame.grid_visible = self.options.show_grid;
        self.frame.segment_opacity = self.options.segment_opacity;
        self.frame.plane_opacity = self.options.plane_opacity;
        self.recolor();
    }

    /// 按当前状态重新计算全部实例颜色，保证被替换的高亮不会残留。
    fn recolor(&mut self) {
        let options = self.options;
        let staged = self.staged.as_deref();
        let selected = self.selected.as_ref();
        for node in &mut self.frame.nodes {
            node.color = if staged == Some(node.name.as_str()) {
                palette::STAGED
            } else if matches!(selected, Some(EntityKey::Node(name)) if *name == node.name) {
                palette::SELECTED
            } else {
                options.node_color
            };
        }
        for segment in &mut self.frame.segments {
            segment.color = if matches!(selected, Some(EntityKey::Segment(name)) if *name == segment.name)
            {
                palette::SELECTED
            } else {
                options.segment_color
            };
        }
        for plane in &mut self.frame.planes {
            plane.emissive =
                if matches!(selected, Some(EntityKey::GroundPlane(name)) if *name == plane.name) {
                    palette::PLANE_SELECTED_EMISSIVE
                } else {
                    palette::NO_EMISSIVE
                };
        }
    }

    /// 射线拾取，返回距离最近的实体。
    pub fn pick(&self, ray: &Ray3, filter: PickFilter) -> Option<PickHit> {
        let origin = ray.origin.as_vec3();
        let direction = ray.direction.as_vec3().try_normalize()?;
        let mut best: Option<PickHit> = None;
        let mut consider = |key: EntityKey, distance: Option<f64>| {
            if let Some(distance) = distance {
                if best.as_ref().is_none_or(|hit| distance < hit.distance) {
                    best = Some(PickHit { key, distance });
                }
            }
        };

        for node in &self.frame.nodes {
            consider(
                EntityKey::Node(node.name.clone()),
                intersect_sphere(origin, direction, node.center, node.radius),
            );
        }
        if filter == PickFilter::All {
            for segment in &self.frame.segments {
                consider(
                    EntityKey::Segment(segment.name.clone()),
                    intersect_unit_box(origin, direction, &segment.transform),
                );
            }
            for plane in &self.frame.planes {
                let distance = plane
                    .triangles()
                    .iter()
                    .filter_map(|[a, b, c]| intersect_triangle(origin, direction, *a, *b, *c))
                    .reduce(f64::min);
                consider(EntityKey::GroundPlane(plane.name.clone()), distance);
            }
        }
        best
    }
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v > 0.0)
}

/// 节点半径由包围盒对角线按比例得到，并设下限。
fn compute_node_radius(model: &Model, bounds: Option<&Bounds3>) -> f64 {
    if model.nodes().is_empty() {
        return EMPTY_NODE_RADIUS;
    }
    let diagonal = bounds.map(Bounds3::diagonal).unwrap_or(0.0).max(1.0);
    (diagonal * NODE_RADIUS_FACTOR).max(MIN_NODE_RADIUS)
}

/// 计算导体段长方体的变换矩阵：列依次为宽度轴、高度轴、长度轴（A→B）与中点。
pub fn segment_transform(a: DVec3, b: DVec3, width: f64, height: f64) -> Option<DMat4> {
    let delta = b - a;
    let length = delta.length();
    if length < DEGENERATE_LENGTH {
        return None;
    }
    let dir = delta / length;
    let w_axis = if dir.z.abs() > VERTICAL_THRESHOLD {
        DVec3::X
    } else {
        DVec3::Z.cross(dir).normalize()
    };
    let h_axis = dir.cross(w_axis);
    let center = (a + b) * 0.5;
    Some(DMat4::from_cols(
        (w_axis * width).extend(0.0),
        (h_axis * height).extend(0.0),
        delta.extend(0.0),
        DVec4::new(center.x, center.y, center.z, 1.0),
    ))
}

fn intersect_sphere(origin: DVec3, direction: DVec3, center: DVec3, radius: f64) -> Option<f64> {
    let oc = origin - center;
    let b = oc.dot(direction);
    let c = oc.length_squared() - radius * radius;
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    let sqrt = discriminant.sqrt();
    let near = -b - sqrt;
    if near >= 0.0 {
        return Some(near);
    }
    let far = -b + sqrt;
    (far >= 0.0).then_some(far)
}

/// 将射线变换到段的局部空间，与 `[-0.5, 0.5]^3` 做 slab 测试。
fn intersect_unit_box(origin: DVec3, direction: DVec3, transform: &DMat4) -> Option<f64> {
    let inverse = transform.inverse();
    if !inverse.is_finite() {
        return None;
    }
    let local_origin = inverse.transform_point3(origin);
    let local_dir = inverse.transform_vector3(direction);
    let mut t_min = f64::NEG_INFINITY;
    let mut t_max = f64::INFINITY;
    for axis in 0..3 {
        let o = local_origin[axis];
        let d = local_dir[axis];
        if d.abs() < f64::EPSILON {
            if !(-0.5..=0.5).contains(&o) {
                return None;
            }
            continue;
        }
        let t1 = (-0.5 - o) / d;
        let t2 = (0.5 - o) / d;
        t_min = t_min.max(t1.min(t2));
        t_max = t_max.min(t1.max(t2));
        if t_min > t_max {
            return None;
        }
    }
    if t_max < 0.0 {
        return None;
    }
    Some(if t_min >= 0.0 { t_min } else { t_max })
}

/// Möller–Trumbore 射线三角形求交（双面）。
fn intersect_triangle(origin: DVec3, direction: DVec3, a: DVec3, b: DVec3, c: DVec3) -> Option<f64> {
    let edge1 = b - a;
    let edge2 = c - a;
    let p = direction.cross(edge2);
    let det = edge1.dot(p);
    if det.abs() < 1e-12 {
        return None;
    }
    let inv_det = 1.0 / det;
    let s = origin - a;
    let u = s.dot(p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(edge1);
    let v = direction.dot(q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = edge2.dot(q) * inv_det;
    (t >= 0.0).then_some(t)
}

#[cfg(test)]
mod tests {
    use fhed_core::document::{GroundPlaneDraft, SegmentOverrides};
    use fhed_core::geometry::{Point3, Vector3};

    use super::*;

    fn sample_model() -> Model {
        let mut model = Model::new();
        model.add_node(Some("n1"), Point3::new(0.0, 0.0, 0.0)).unwrap();
        model.add_node(Some("n2"), Point3::new(10.0, 0.0, 0.0)).unwrap();
        model.add_node(Some("n3"), Point3::new(10.0, 10.0, 0.0)).unwrap();
        model
            .add_segment("n1", "n2", SegmentOverrides::with_size(Some(2.0), Some(1.0)))
            .unwrap();
        model
            .add_segment("n2", "n3", SegmentOverrides::default())
            .unwrap();
        model.add_ground_plane(GroundPlaneDraft {
            corners: [
                Point3::new(-5.0, -5.0, -2.0),
                Point3::new(15.0, -5.0, -2.0),
                Point3::new(15.0, 15.0, -2.0),
            ],
            thick: 0.1,
            seg1: 10.0,
            seg2: 10.0,
        });
        model.add_external("n1", "n3", Some("p1")).unwrap();
        model
    }

    fn down_ray(x: f64, y: f64) -> Ray3 {
        Ray3::new(Point3::new(x, y, 50.0), Vector3::new(0.0, 0.0, -1.0))
    }

    #[test]
    fn rebuild_skips_unresolved_and_degenerate_segments() {
        let mut model = sample_model();
        model.add_segment("n1", "n404", SegmentOverrides::default()).unwrap();
        model.add_node(Some("n4"), Point3::new(0.0, 0.0, 0.0)).unwrap();
        model.add_segment("n1", "n4", SegmentOverrides::default()).unwrap();
        model.add_external("n1", "nx", None).unwrap();

        let mut scene = SceneSync::default();
        scene.rebuild(&model);
        let frame = scene.frame();
        assert_eq!(frame.nodes.len(), 4);
        assert_eq!(frame.segments.len(), 2);
        assert_eq!(frame.planes.len(), 1);
        assert_eq!(frame.ports.len(), 1);
        assert_eq!(frame.labels.len(), 5);
        assert!(frame.labels_visible);
        assert_eq!(frame.planes[0].corners[3], DVec3::new(-5.0, 15.0, -2.0));
    }

    #[test]
    fn segment_prism_follows_axis_and_dimensions() {
        let mut scene = SceneSync::default();
        scene.rebuild(&sample_model());
        let first = &scene.frame().segments[0];
        let center = first.transform.transform_point3(DVec3::ZERO);
        assert!((center - DVec3::new(5.0, 0.0, 0.0)).length() < 1e-9);
        let length_axis = first.transform.transform_vector3(DVec3::Z);
        assert!((length_axis - DVec3::new(10.0, 0.0, 0.0)).length() < 1e-9);
        assert!((first.transform.x_axis.truncate().length() - 2.0).abs() < 1e-9);
        assert!((first.transform.y_axis.truncate().length() - 1.0).abs() < 1e-9);

        // 未覆盖时使用模型默认值 w=1 h=0.5
        let second = &scene.frame().segments[1];
        assert!((second.transform.x_axis.truncate().length() - 1.0).abs() < 1e-9);
        assert!((second.transform.y_axis.truncate().length() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn vertical_segment_uses_horizontal_seed_axis() {
        let transform =
            segment_transform(DVec3::ZERO, DVec3::new(0.0, 0.0, 3.0), 1.0, 1.0).unwrap();
        let w = transform.x_axis.truncate();
        let h = transform.y_axis.truncate();
        assert!((w - DVec3::X).length() < 1e-12);
        assert!(h.dot(DVec3::Z).abs() < 1e-12);
        assert!(w.is_finite() && h.is_finite());
        assert!(segment_transform(DVec3::ONE, DVec3::ONE, 1.0, 1.0).is_none());
    }

    #[test]
    fn labels_are_capped() {
        let mut model = Model::new();
        for i in 0..=LABEL_CAP {
            model
                .add_node(None, Point3::new(i as f64, 0.0, 0.0))
                .unwrap();
        }
        let mut scene = SceneSync::default();
        scene.rebuild(&model);
        assert!(scene.frame().labels.is_empty());
        assert!(!scene.frame().labels_visible);
    }

    #[test]
    fn cosmetic_update_keeps_geometry() {
        let model = sample_model();
        let mut scene = SceneSync::default();
        assert_eq!(
            scene.update_display(&model, DisplayOptions::default()),
            DisplayUpdate::Rebuilt
        );
        let revision = scene.revision();

        let options = DisplayOptions {
            node_color: Rgb::new(1, 2, 3),
            show_labels: false,
            segment_opacity: 0.2,
            ..DisplayOptions::default()
        };
        assert_eq!(scene.update_display(&model, options), DisplayUpdate::Cosmetic);
        assert_eq!(scene.revision(), revision);
        assert!(scene.frame().nodes.iter().all(|n| n.color == Rgb::new(1, 2, 3)));
        assert!(!scene.frame().labels_visible);
        assert!((scene.frame().segment_opacity - 0.2).abs() < f32::EPSILON);

        let bigger = DisplayOptions {
            node_size: 2.0,
            ..options
        };
        assert_eq!(scene.update_display(&model, bigger), DisplayUpdate::Rebuilt);
        assert!(scene.revision() > revision);
    }

    #[test]
    fn selection_and_staging_are_mutually_exclusive() {
        let mut scene = SceneSync::default();
        scene.rebuild(&sample_model());
        let color_of = |scene: &SceneSync, name: &str| {
            scene
                .frame()
                .nodes
                .iter()
                .find(|n| n.name == name)
                .map(|n| n.color)
        };

        assert!(scene.set_selection(Some(EntityKey::Node("n1".to_string()))));
        assert_eq!(color_of(&scene, "n1"), Some(palette::SELECTED));

        assert!(scene.set_staged(Some("n1")));
        assert_eq!(scene.selection(), None);
        assert_eq!(color_of(&scene, "n1"), Some(palette::STAGED));

        assert!(scene.set_selection(Some(EntityKey::Node("n2".to_string()))));
        assert_eq!(color_of(&scene, "n1"), Some(palette::STAGED));
        assert_eq!(color_of(&scene, "n2"), Some(palette::SELECTED));

        assert!(scene.set_selection(Some(EntityKey::Segment("e1".to_string()))));
        assert_eq!(color_of(&scene, "n2"), Some(palette::NODE));
        assert_eq!(scene.frame().segments[0].color, palette::SELECTED);

        scene.clear_highlights();
        assert!(scene.frame().nodes.iter().all(|n| n.color == palette::NODE));
        assert!(scene.frame().segments.iter().all(|s| s.color == palette::SEGMENT));
        assert!(!scene.set_selection(Some(EntityKey::Node("missing".to_string()))));
    }

    #[test]
    fn highlights_survive_rebuild_only_when_resolvable() {
        let mut model = sample_model();
        let mut scene = SceneSync::default();
        scene.rebuild(&model);
        scene.set_selection(Some(EntityKey::Segment("e2".to_string())));
        scene.set_staged(Some("n1"));

        model.add_node(Some("n9"), Point3::new(3.0, 3.0, 0.0)).unwrap();
        scene.rebuild(&model);
        assert_eq!(scene.selection(), Some(&EntityKey::Segment("e2".to_string())));
        assert_eq!(scene.staged(), Some("n1"));
        assert_eq!(scene.frame().segments[1].color, palette::SELECTED);

        model.remove_node("n1").unwrap();
        model.remove_segment("e2").unwrap();
        scene.rebuild(&model);
        assert_eq!(scene.selection(), None);
        assert_eq!(scene.staged(), None);
    }

    #[test]
    fn pick_returns_nearest_hit() {
        let mut scene = SceneSync::default();
        scene.rebuild(&sample_model());

        let hit = scene.pick(&down_ray(-0.3, 0.0), PickFilter::All).unwrap();
        assert_eq!(hit.key, EntityKey::Node("n1".to_string()));
        assert!(hit.distance < 50.0);

        let hit = scene.pick(&down_ray(5.0, 0.2), PickFilter::All).unwrap();
        assert_eq!(hit.key, EntityKey::Segment("e1".to_string()));
        assert!((hit.distance - 49.5).abs() < 1e-9);

        let hit = scene.pick(&down_ray(2.0, 8.0), PickFilter::All).unwrap();
        assert_eq!(hit.key, EntityKey::GroundPlane("g1".to_string()));
        assert!((hit.distance - 52.0).abs() < 1e-9);

        assert!(scene.pick(&down_ray(5.0, 0.2), PickFilter::NodesOnly).is_none());
        assert!(scene.pick(&down_ray(100.0, 100.0), PickFilter::All).is_none());
    }

    #[test]
    fn rgb_hex_parsing() {
        assert_eq!(Rgb::from_hex("#4493f8"), Some(palette::STAGED));
        assert_eq!(Rgb::from_hex("ffffff"), Some(palette::SELECTED));
        assert_eq!(Rgb::from_hex("#12345"), None);
        assert_eq!(Rgb::from_hex("#zzzzzz"), None);
        assert_eq!(palette::PORT.to_string(), "#f85149");
    }
}
