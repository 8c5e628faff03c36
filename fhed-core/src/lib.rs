pub mod geometry {
    use glam::DVec3;
    use serde::{Deserialize, Serialize};

    /// 三维点，内部以 `glam::DVec3` 表示，保持与文本格式一致的双精度。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point3(pub DVec3);

    impl Point3 {
        pub const ORIGIN: Point3 = Point3(DVec3::ZERO);

        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }

        #[inline]
        pub fn from_vec(vec: DVec3) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn z(self) -> f64 {
            self.0.z
        }

        #[inline]
        pub fn translate(self, offset: Vector3) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn vector_to(self, other: Point3) -> Vector3 {
            Vector3(other.0 - self.0)
        }

        #[inline]
        pub fn midpoint(self, other: Point3) -> Point3 {
            Self((self.0 + other.0) * 0.5)
        }

        #[inline]
        pub fn as_vec3(self) -> DVec3 {
            self.0
        }
    }

    impl From<DVec3> for Point3 {
        fn from(value: DVec3) -> Self {
            Self(value)
        }
    }

    /// 三维向量。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector3(pub DVec3);

    impl Vector3 {
        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }

        #[inline]
        pub fn as_vec3(self) -> DVec3 {
            self.0
        }

        #[inline]
        pub fn length(self) -> f64 {
            self.0.length()
        }

        #[inline]
        pub fn length_squared(self) -> f64 {
            self.0.length_squared()
        }

        #[inline]
        pub fn normalize(self) -> Option<Self> {
            let len = self.0.length();
            if len <= f64::EPSILON {
                None
            } else {
                Some(Self(self.0 / len))
            }
        }

        #[inline]
        pub fn dot(self, other: Vector3) -> f64 {
            self.0.dot(other.0)
        }

        #[inline]
        pub fn cross(self, other: Vector3) -> Vector3 {
            Self(self.0.cross(other.0))
        }
    }

    impl From<DVec3> for Vector3 {
        fn from(value: DVec3) -> Self {
            Self(value)
        }
    }

    /// 射线，用于拾取与投影到放置平面。`direction` 不要求归一化。
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct Ray3 {
        pub origin: Point3,
        pub direction: Vector3,
    }

    impl Ray3 {
        #[inline]
        pub fn new(origin: Point3, direction: Vector3) -> Self {
            Self { origin, direction }
        }

        #[inline]
        pub fn point_at(&self, t: f64) -> Point3 {
            Point3(self.origin.0 + self.direction.0 * t)
        }

        /// 与水平面 `Z = z` 求交；射线平行于平面或交点位于射线反方向时返回 `None`。
        pub fn intersect_plane_z(&self, z: f64) -> Option<Point3> {
            let dz = self.direction.0.z;
            if dz.abs() <= f64::EPSILON {
                return None;
            }
            let t = (z - self.origin.0.z) / dz;
            if t < 0.0 {
                return None;
            }
            Some(self.point_at(t))
        }
    }

    /// 轴对齐边界框，用于估算模型范围。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds3 {
        min: Point3,
        max: Point3,
    }

    impl Bounds3 {
        #[inline]
        pub fn new(min: Point3, max: Point3) -> Self {
            Self { min, max }
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
                max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y() || self.min.z() > self.max.z()
        }

        #[inline]
        pub fn min(&self) -> Point3 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point3 {
            self.max
        }

        pub fn include_point(&mut self, point: Point3) {
            if self.is_empty() {
                self.min = point;
                self.max = point;
                return;
            }
            self.min = Point3::from_vec(self.min.as_vec3().min(point.as_vec3()));
            self.max = Point3::from_vec(self.max.as_vec3().max(point.as_vec3()));
        }

        pub fn include_bounds(&mut self, other: &Bounds3) {
            if other.is_empty() {
                return;
            }
            self.include_point(other.min);
            self.include_point(other.max);
        }

        #[inline]
        pub fn center(&self) -> Point3 {
            debug_assert!(!self.is_empty());
            Point3::from_vec((self.min.as_vec3() + self.max.as_vec3()) * 0.5)
        }

        #[inline]
        pub fn size(&self) -> Vector3 {
            if self.is_empty() {
                return Vector3::new(0.0, 0.0, 0.0);
            }
            Vector3(self.max.as_vec3() - self.min.as_vec3())
        }

        /// 三个方向尺寸中的最大值。
        #[inline]
        pub fn max_dimension(&self) -> f64 {
            self.size().as_vec3().max_element()
        }

        #[inline]
        pub fn diagonal(&self) -> f64 {
            self.size().length()
        }
    }
}

pub mod units {
    const SI_PREFIXES: [(i32, &str); 10] = [
        (-15, "f"),
        (-12, "p"),
        (-9, "n"),
        (-6, "µ"),
        (-3, "m"),
        (0, ""),
        (3, "k"),
        (6, "M"),
        (9, "G"),
        (12, "T"),
    ];

    fn prefix_multiplier(prefix: char) -> Option<f64> {
        let value = match prefix {
            'f' => 1e-15,
            'p' => 1e-12,
            'n' => 1e-9,
            'u' | 'µ' => 1e-6,
            'm' => 1e-3,
            'k' => 1e3,
            'M' => 1e6,
            'G' => 1e9,
            'T' => 1e12,
            _ => return None,
        };
        Some(value)
    }

    /// 以工程记数法格式化数值，例如 `format_eng(1e8, "Hz") == "100.0 MHz"`。
    pub fn format_eng(value: f64, unit: &str) -> String {
        if value == 0.0 {
            return format!("0 {unit}").trim().to_string();
        }
        if !value.is_finite() {
            return format!("{value} {unit}").trim().to_string();
        }
        let abs = value.abs();
        let sign = if value < 0.0 { "-" } else { "" };
        let eng_exp = ((abs.log10() / 3.0).floor() as i32) * 3;
        let clamped = eng_exp.clamp(-15, 12);
        let prefix = SI_PREFIXES
            .iter()
            .find(|(exp, _)| *exp == clamped)
            .map(|(_, prefix)| *prefix)
            .unwrap_or("");
        let scaled = abs / 10f64.powi(clamped);
        let digits = if scaled >= 100.0 {
            1
        } else if scaled >= 10.0 {
            2
        } else {
            3
        };
        format!("{sign}{scaled:.digits$} {prefix}{unit}")
            .trim()
            .to_string()
    }

    /// 解析带 SI 前缀的数值（`10k`、`4.7u`、`1e6`），无法识别时退化为前缀数字解析。
    pub fn parse_eng_value(raw: &str) -> Option<f64> {
        let text = raw.trim();
        if let Ok(value) = text.parse::<f64>() {
            return Some(value);
        }

        let numeric_len = text
            .char_indices()
            .find(|(idx, ch)| {
                !(ch.is_ascii_digit() || *ch == '.' || (*idx == 0 && (*ch == '+' || *ch == '-')))
            })
            .map(|(idx, _)| idx)
            .unwrap_or(text.len());
        let (number, rest) = text.split_at(numeric_len);
        if let Ok(number) = number.parse::<f64>() {
            let rest = rest.trim_start();
            let mut chars = rest.chars();
            if let Some(multiplier) = chars.next().and_then(prefix_multiplier) {
                let tail = chars.as_str().trim();
                if tail.chars().all(|ch| ch.is_alphanumeric() || ch == '_') {
                    return Some(number * multiplier);
                }
            }
        }
        parse_leading_f64(text)
    }

    /// 宽松的浮点解析：读取最长的合法数字前缀，忽略其后的内容。
    pub fn parse_leading_f64(raw: &str) -> Option<f64> {
        let text = raw.trim_start();
        let bytes = text.as_bytes();
        let mut end = 0;
        if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
            end += 1;
        }
        let digits_start = end;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        let mut mantissa_digits = end - digits_start;
        if end < bytes.len() && bytes[end] == b'.' {
            let fraction_start = end + 1;
            let mut cursor = fraction_start;
            while cursor < bytes.len() && bytes[cursor].is_ascii_digit() {
                cursor += 1;
            }
            mantissa_digits += cursor - fraction_start;
            if mantissa_digits > 0 {
                end = cursor;
            }
        }
        if mantissa_digits == 0 {
            return None;
        }
        if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
            let mut cursor = end + 1;
            if cursor < bytes.len() && (bytes[cursor] == b'+' || bytes[cursor] == b'-') {
                cursor += 1;
            }
            let exp_start = cursor;
            while cursor < bytes.len() && bytes[cursor].is_ascii_digit() {
                cursor += 1;
            }
            if cursor > exp_start {
                end = cursor;
            }
        }
        text[..end].parse::<f64>().ok()
    }

    /// 宽松的整数解析：只取前导整数部分（`"2.5"` 得到 2），负数视为无效。
    pub fn parse_leading_u32(raw: &str) -> Option<u32> {
        let text = raw.trim_start();
        let text = text.strip_prefix('+').unwrap_or(text);
        let end = text
            .find(|ch: char| !ch.is_ascii_digit())
            .unwrap_or(text.len());
        text[..end].parse::<u32>().ok()
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn format_eng_uses_si_prefixes() {
            assert_eq!(format_eng(1e8, "Hz"), "100.0 MHz");
            assert_eq!(format_eng(1e4, "Hz"), "10.00 kHz");
            assert_eq!(format_eng(0.0, "Hz"), "0 Hz");
            assert_eq!(format_eng(-2.5e-3, "H"), "-2.500 mH");
            assert_eq!(format_eng(5.8e4, ""), "58.00 k");
        }

        #[test]
        fn parse_eng_value_accepts_prefixes() {
            assert_eq!(parse_eng_value("1e6"), Some(1e6));
            assert_eq!(parse_eng_value("10k"), Some(1e4));
            assert_eq!(parse_eng_value("10 kHz"), Some(1e4));
            let micro = parse_eng_value("4.7u").unwrap();
            assert!((micro - 4.7e-6).abs() < 1e-18);
            assert_eq!(parse_eng_value("abc"), None);
        }

        #[test]
        fn leading_number_parsing_is_tolerant() {
            assert_eq!(parse_leading_f64("2.5mm"), Some(2.5));
            assert_eq!(parse_leading_f64("-1e-3,"), Some(-1e-3));
            assert_eq!(parse_leading_f64(".5"), Some(0.5));
            assert_eq!(parse_leading_f64("3e"), Some(3.0));
            assert_eq!(parse_leading_f64("x1"), None);
            assert_eq!(parse_leading_f64("-"), None);
            assert_eq!(parse_leading_u32("2.5"), Some(2));
            assert_eq!(parse_leading_u32("10"), Some(10));
            assert_eq!(parse_leading_u32("-3"), None);
        }
    }
}

pub mod document {
    use std::collections::HashSet;

    use serde::{Deserialize, Serialize};
    use thiserror::Error;

    use crate::geometry::{Bounds3, Point3};

    pub const DEFAULT_TITLE: &str = "FastHenry Model";
    pub const DEFAULT_UNITS: &str = "mm";

    pub const NODE_PREFIX: &str = "n";
    pub const SEGMENT_PREFIX: &str = "e";
    pub const GROUND_PLANE_PREFIX: &str = "g";

    /// 模型编辑失败的原因。所有 CRUD 操作在返回错误时都不会修改模型。
    #[derive(Debug, Clone, PartialEq, Error)]
    pub enum ModelError {
        #[error("Node {0} already exists")]
        DuplicateNode(String),
        #[error("Node {0} not found")]
        NodeNotFound(String),
        #[error("Segment {0} already exists")]
        DuplicateSegment(String),
        #[error("Segment {0} not found")]
        SegmentNotFound(String),
        #[error("Ground plane {0} not found")]
        GroundPlaneNotFound(String),
        #[error("External index {index} out of range ({len} defined)")]
        ExternalOutOfRange { index: usize, len: usize },
        #[error("Equiv index {index} out of range ({len} defined)")]
        EquivOutOfRange { index: usize, len: usize },
        #[error("Equiv group needs at least 2 nodes (got {0})")]
        EquivTooSmall(usize),
        #[error("Name must not be empty")]
        EmptyName,
        #[error("Port name {0} must be a single token")]
        InvalidPortName(String),
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Node {
        pub name: String,
        pub position: Point3,
    }

    impl Node {
        #[inline]
        pub fn new(name: impl Into<String>, position: Point3) -> Self {
            Self {
                name: name.into(),
                position,
            }
        }
    }

    /// 导体段的可选覆盖参数。`None` 表示未覆盖，渲染/导出时回退到 [`Defaults`]。
    #[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
    pub struct SegmentOverrides {
        pub w: Option<f64>,
        pub h: Option<f64>,
        pub sigma: Option<f64>,
        pub rho: Option<f64>,
        pub nhinc: Option<u32>,
        pub nwinc: Option<u32>,
        pub rh: Option<f64>,
        pub rw: Option<f64>,
    }

    impl SegmentOverrides {
        #[inline]
        pub fn with_size(w: Option<f64>, h: Option<f64>) -> Self {
            Self {
                w,
                h,
                ..Self::default()
            }
        }

        pub fn is_empty(&self) -> bool {
            *self == Self::default()
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Segment {
        pub name: String,
        pub node1: String,
        pub node2: String,
        pub overrides: SegmentOverrides,
    }

    impl Segment {
        pub fn new(
            name: impl Into<String>,
            node1: impl Into<String>,
            node2: impl Into<String>,
            overrides: SegmentOverrides,
        ) -> Self {
            Self {
                name: name.into(),
                node1: node1.into(),
                node2: node2.into(),
                overrides,
            }
        }

        #[inline]
        pub fn references(&self, node: &str) -> bool {
            self.node1 == node || self.node2 == node
        }

        /// 生效宽度：段覆盖值优先，其次模型默认值。
        #[inline]
        pub fn effective_width(&self, defaults: &Defaults) -> Option<f64> {
            self.overrides.w.or(defaults.w)
        }

        #[inline]
        pub fn effective_height(&self, defaults: &Defaults) -> Option<f64> {
            self.overrides.h.or(defaults.h)
        }
    }

    /// 接地平面上内嵌的命名点，同时对应模型节点表中的一个节点。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct PlaneNode {
        pub name: String,
        pub position: Point3,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct GroundPlane {
        pub name: String,
        /// 平行四边形的三个角点，第四个角点由 `p1 + p3 - p2` 推出。
        pub corners: [Point3; 3],
        pub thick: f64,
        pub seg1: u32,
        pub seg2: u32,
        pub sigma: Option<f64>,
        pub rho: Option<f64>,
        pub nhinc: Option<u32>,
        pub nodes: Vec<PlaneNode>,
        /// `hole` 子记录原文，不做解释。
        pub holes: Vec<String>,
    }

    impl GroundPlane {
        #[inline]
        pub fn fourth_corner(&self) -> Point3 {
            let [p1, p2, p3] = self.corners;
            Point3::from_vec(p1.as_vec3() + p3.as_vec3() - p2.as_vec3())
        }

        #[inline]
        pub fn all_corners(&self) -> [Point3; 4] {
            let [p1, p2, p3] = self.corners;
            [p1, p2, p3, self.fourth_corner()]
        }

        #[inline]
        pub fn centroid(&self) -> Point3 {
            self.corners[0].midpoint(self.corners[2])
        }
    }

    /// 新建接地平面时的输入；离散段数按四舍五入取整且至少为 1。
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct GroundPlaneDraft {
        pub corners: [Point3; 3],
        pub thick: f64,
        pub seg1: f64,
        pub seg2: f64,
    }

    /// 端口定义，顺序决定阻抗矩阵的行号。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct External {
        pub node1: String,
        pub node2: String,
        pub port_name: Option<String>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Equiv {
        pub nodes: Vec<String>,
    }

    /// 模型级默认参数。`x/y/z` 只在解析时为缺省坐标提供值。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Defaults {
        pub w: Option<f64>,
        pub h: Option<f64>,
        pub sigma: Option<f64>,
        pub nhinc: Option<u32>,
        pub nwinc: Option<u32>,
        pub rh: Option<f64>,
        pub rw: Option<f64>,
        pub x: Option<f64>,
        pub y: Option<f64>,
        pub z: Option<f64>,
    }

    impl Defaults {
        /// 全部未设置。
        pub fn unset() -> Self {
            Self {
                w: None,
                h: None,
                sigma: None,
                nhinc: None,
                nwinc: None,
                rh: None,
                rw: None,
                x: None,
                y: None,
                z: None,
            }
        }
    }

    impl Default for Defaults {
        fn default() -> Self {
            Self {
                w: Some(1.0),
                h: Some(0.5),
                sigma: Some(5.8e4),
                nhinc: Some(1),
                nwinc: Some(1),
                rh: Some(2.0),
                rw: Some(2.0),
                ..Self::unset()
            }
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct FrequencySweep {
        pub fmin: f64,
        pub fmax: f64,
        pub ndec: f64,
    }

    impl Default for FrequencySweep {
        fn default() -> Self {
            Self {
                fmin: 1e4,
                fmax: 1e8,
                ndec: 1.0,
            }
        }
    }

    /// 节点编辑请求，`None` 字段保持原值。
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct NodeUpdate {
        pub name: Option<String>,
        pub x: Option<f64>,
        pub y: Option<f64>,
        pub z: Option<f64>,
    }

    /// 导体段编辑请求：端点 `None` 保持原值，`overrides` 整体替换（未给出的字段即清除覆盖）。
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct SegmentUpdate {
        pub node1: Option<String>,
        pub node2: Option<String>,
        pub overrides: SegmentOverrides,
    }

    /// 外部几何导入的节点记录（例如 STEP 转换结果）。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct ImportedNode {
        pub name: String,
        pub x: f64,
        pub y: f64,
        pub z: f64,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct ImportedSegment {
        pub name: String,
        pub node1: String,
        pub node2: String,
        #[serde(default)]
        pub w: Option<f64>,
        #[serde(default)]
        pub h: Option<f64>,
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct GeometryImport {
        #[serde(default)]
        pub nodes: Vec<ImportedNode>,
        #[serde(default)]
        pub segments: Vec<ImportedSegment>,
        #[serde(default)]
        pub info: Option<String>,
    }

    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
    struct NameCounters {
        node: u32,
        segment: u32,
        ground_plane: u32,
    }

    /// 文档模型：节点、导体段、接地平面、端口、等电位组与全局参数。
    ///
    /// 实体之间只通过名称互相引用，查找总是按需进行。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Model {
        pub title: String,
        pub units: String,
        pub defaults: Defaults,
        pub freq: FrequencySweep,
        nodes: Vec<Node>,
        segments: Vec<Segment>,
        ground_planes: Vec<GroundPlane>,
        externals: Vec<External>,
        equivs: Vec<Equiv>,
        counters: NameCounters,
    }

    impl Default for Model {
        fn default() -> Self {
            Self::new()
        }
    }

    fn fold_name(raw: &str) -> Result<String, ModelError> {
        let name = raw.trim().to_lowercase();
        if name.is_empty() {
            Err(ModelError::EmptyName)
        } else {
            Ok(name)
        }
    }

    /// 节点名称统一小写，且必须以 `n` 开头才能被识别为节点记录。
    fn node_name(raw: &str) -> Result<String, ModelError> {
        let folded = fold_name(raw)?;
        if folded.starts_with(NODE_PREFIX) {
            Ok(folded)
        } else {
            Ok(format!("{NODE_PREFIX}{folded}"))
        }
    }

    impl Model {
        pub fn new() -> Self {
            Self {
                title: DEFAULT_TITLE.to_string(),
                units: DEFAULT_UNITS.to_string(),
                defaults: Defaults::default(),
                freq: FrequencySweep::default(),
                nodes: Vec::new(),
                segments: Vec::new(),
                ground_planes: Vec::new(),
                externals: Vec::new(),
                equivs: Vec::new(),
                counters: NameCounters::default(),
            }
        }

        /// 由外部几何导入结果构造全新模型，名称计数器重置为导入数量。
        pub fn from_import(import: GeometryImport) -> Self {
            let mut model = Self::new();
            model.units = DEFAULT_UNITS.to_string();
            for node in import.nodes {
                model.insert_node_if_absent(Node::new(
                    node.name.to_lowercase(),
                    Point3::new(node.x, node.y, node.z),
                ));
            }
            for segment in import.segments {
                let name = segment.name.to_lowercase();
                if model.segment(&name).is_some() {
                    continue;
                }
                let nonzero = |value: Option<f64>| value.filter(|v| *v != 0.0);
                model.segments.push(Segment::new(
                    name,
                    segment.node1.to_lowercase(),
                    segment.node2.to_lowercase(),
                    SegmentOverrides::with_size(nonzero(segment.w), nonzero(segment.h)),
                ));
            }
            model.counters.node = model.nodes.len() as u32;
            model.counters.segment = model.segments.len() as u32;
            model
        }

        #[inline]
        pub fn nodes(&self) -> &[Node] {
            &self.nodes
        }

        #[inline]
        pub fn segments(&self) -> &[Segment] {
            &self.segments
        }

        #[inline]
        pub fn ground_planes(&self) -> &[GroundPlane] {
            &self.ground_planes
        }

        #[inline]
        pub fn externals(&self) -> &[External] {
            &self.externals
        }

        #[inline]
        pub fn equivs(&self) -> &[Equiv] {
            &self.equivs
        }

        /// 按名称查找节点（大小写不敏感）。
        pub fn node(&self, name: &str) -> Option<&Node> {
            let name = name.to_lowercase();
            self.nodes.iter().find(|node| node.name == name)
        }

        pub fn segment(&self, name: &str) -> Option<&Segment> {
            let name = name.to_lowercase();
            self.segments.iter().find(|segment| segment.name == name)
        }

        pub fn ground_plane(&self, name: &str) -> Option<&GroundPlane> {
            let name = name.to_lowercase();
            self.ground_planes.iter().find(|plane| plane.name == name)
        }

        #[inline]
        pub fn has_node(&self, name: &str) -> bool {
            self.node(name).is_some()
        }

        /// 所有接地平面内嵌节点的名称集合。
        pub fn plane_node_names(&self) -> HashSet<&str> {
            self.ground_planes
                .iter()
                .flat_map(|plane| plane.nodes.iter().map(|node| node.name.as_str()))
                .collect()
        }

        /// 节点与接地平面角点（含推导出的第四角点）的包围盒；模型为空时返回 `None`。
        pub fn bounds(&self) -> Option<Bounds3> {
            let mut bounds = Bounds3::empty();
            for node in &self.nodes {
                bounds.include_point(node.position);
            }
            for plane in &self.ground_planes {
                for corner in plane.all_corners() {
                    bounds.include_point(corner);
                }
            }
            if bounds.is_empty() { None } else { Some(bounds) }
        }

        pub fn next_node_name(&mut self) -> String {
            let counter = next_free(&mut self.counters.node, NODE_PREFIX, |name| {
                self.nodes.iter().any(|node| node.name == name)
            });
            format!("{NODE_PREFIX}{counter}")
        }

        pub fn next_segment_name(&mut self) -> String {
            let counter = next_free(&mut self.counters.segment, SEGMENT_PREFIX, |name| {
                self.segments.iter().any(|segment| segment.name == name)
            });
            format!("{SEGMENT_PREFIX}{counter}")
        }

        pub fn next_ground_plane_name(&mut self) -> String {
            let counter = next_free(&mut self.counters.ground_plane, GROUND_PLANE_PREFIX, |name| {
                self.ground_planes.iter().any(|plane| plane.name == name)
            });
            format!("{GROUND_PLANE_PREFIX}{counter}")
        }

        /// 新增节点并返回其名称。未给出名称时自动分配；名称统一小写并保证以 `n` 开头。
        pub fn add_node(&mut self, name: Option<&str>, position: Point3) -> Result<String, ModelError> {
            let name = match name {
                Some(raw) => node_name(raw)?,
                None => self.next_node_name(),
            };
            if self.has_node(&name) {
                return Err(ModelError::DuplicateNode(name));
            }
            self.nodes.push(Node::new(name.clone(), position));
            Ok(name)
        }

        /// 删除节点，同时删除引用它的导体段、端口与接地平面内嵌节点。
        pub fn remove_node(&mut self, name: &str) -> Result<Node, ModelError> {
            let name = name.to_lowercase();
            let index = self
                .nodes
                .iter()
                .position(|node| node.name == name)
                .ok_or_else(|| ModelError::NodeNotFound(name.clone()))?;
            let removed = self.nodes.remove(index);
            self.segments.retain(|segment| !segment.references(&name));
            self.externals
                .retain(|external| external.node1 != name && external.node2 != name);
            for plane in &mut self.ground_planes {
                plane.nodes.retain(|node| node.name != name);
            }
            Ok(removed)
        }

        /// 修改节点坐标或名称；改名会级联到导体段、端口、等电位组与接地平面内嵌节点。
        ///
        /// 内嵌节点坐标只在与节点原坐标一致时跟随移动，同名冲突的内嵌节点保持原位。
        pub fn update_node(&mut self, name: &str, update: NodeUpdate) -> Result<(), ModelError> {
            let old_name = name.to_lowercase();
            let index = self
                .nodes
                .iter()
                .position(|node| node.name == old_name)
                .ok_or_else(|| ModelError::NodeNotFound(old_name.clone()))?;

            let new_name = match update.name.as_deref() {
                Some(raw) => node_name(raw)?,
                None => old_name.clone(),
            };
            if new_name != old_name && self.has_node(&new_name) {
                return Err(ModelError::DuplicateNode(new_name));
            }

            if new_name != old_name {
                self.rename_references(&old_name, &new_name);
            }

            let old_position = self.nodes[index].position;
            let mut position = old_position.as_vec3();
            if let Some(x) = update.x {
                position.x = x;
            }
            if let Some(y) = update.y {
                position.y = y;
            }
            if let Some(z) = update.z {
                position.z = z;
            }
            let position = Point3::from_vec(position);

            for plane_node in self
                .ground_planes
                .iter_mut()
                .flat_map(|plane| plane.nodes.iter_mut())
                .filter(|plane_node| plane_node.name == old_name)
            {
                if plane_node.position == old_position {
                    plane_node.position = position;
                }
                plane_node.name = new_name.clone();
            }

            let node = &mut self.nodes[index];
            node.name = new_name;
            node.position = position;
            Ok(())
        }

        fn rename_references(&mut self, old_name: &str, new_name: &str) {
            let rename = |slot: &mut String| {
                if slot.as_str() == old_name {
                    *slot = new_name.to_string();
                }
            };
            for segment in &mut self.segments {
                rename(&mut segment.node1);
                rename(&mut segment.node2);
            }
            for external in &mut self.externals {
                rename(&mut external.node1);
                rename(&mut external.node2);
            }
            for equiv in &mut self.equivs {
                equiv.nodes.iter_mut().for_each(rename);
            }
        }

        /// 在两个节点之间新增导体段，名称自动分配。端点不要求已存在。
        pub fn add_segment(
            &mut self,
            node1: &str,
            node2: &str,
            overrides: SegmentOverrides,
        ) -> Result<String, ModelError> {
            let node1 = fold_name(node1)?;
            let node2 = fold_name(node2)?;
            let name = self.next_segment_name();
            self.segments
                .push(Segment::new(name.clone(), node1, node2, overrides));
            Ok(name)
        }

        pub fn remove_segment(&mut self, name: &str) -> Result<Segment, ModelError> {
            let name = name.to_lowercase();
            let index = self
                .segments
                .iter()
                .position(|segment| segment.name == name)
                .ok_or(ModelError::SegmentNotFound(name))?;
            Ok(self.segments.remove(index))
        }

        pub fn update_segment(&mut self, name: &str, update: SegmentUpdate) -> Result<(), ModelError> {
            let name = name.to_lowercase();
            let node1 = update.node1.as_deref().map(fold_name).transpose()?;
            let node2 = update.node2.as_deref().map(fold_name).transpose()?;
            let segment = self
                .segments
                .iter_mut()
                .find(|segment| segment.name == name)
                .ok_or(ModelError::SegmentNotFound(name))?;
            if let Some(node1) = node1 {
                segment.node1 = node1;
            }
            if let Some(node2) = node2 {
                segment.node2 = node2;
            }
            segment.overrides = update.overrides;
            Ok(())
        }

        pub fn add_ground_plane(&mut self, draft: GroundPlaneDraft) -> String {
            let name = self.next_ground_plane_name();
            let round_count = |value: f64| value.round().max(1.0) as u32;
            self.ground_planes.push(GroundPlane {
                name: name.clone(),
                corners: draft.corners,
                thick: draft.thick,
                seg1: round_count(draft.seg1),
                seg2: round_count(draft.seg2),
                sigma: None,
                rho: None,
                nhinc: None,
                nodes: Vec::new(),
                holes: Vec::new(),
            });
            name
        }

        pub fn remove_ground_plane(&mut self, name: &str) -> Result<GroundPlane, ModelError> {
            let name = name.to_lowercase();
            let index = self
                .ground_planes
                .iter()
                .position(|plane| plane.name == name)
                .ok_or(ModelError::GroundPlaneNotFound(name))?;
            Ok(self.ground_planes.remove(index))
        }

        pub fn add_external(
            &mut self,
            node1: &str,
            node2: &str,
            port_name: Option<&str>,
        ) -> Result<(), ModelError> {
            let node1 = fold_name(node1)?;
            let node2 = fold_name(node2)?;
            let port_name = port_name
                .map(str::trim)
                .filter(|port| !port.is_empty())
                .map(str::to_string);
            if let Some(port) = &port_name {
                if port.contains(char::is_whitespace) {
                    return Err(ModelError::InvalidPortName(port.clone()));
                }
            }
            self.externals.push(External {
                node1,
                node2,
                port_name,
            });
            Ok(())
        }

        pub fn remove_external(&mut self, index: usize) -> Result<External, ModelError> {
            if index >= self.externals.len() {
                return Err(ModelError::ExternalOutOfRange {
                    index,
                    len: self.externals.len(),
                });
            }
            Ok(self.externals.remove(index))
        }

        pub fn add_equiv<I, S>(&mut self, nodes: I) -> Result<(), ModelError>
        where
            I: IntoIterator<Item = S>,
            S: AsRef<str>,
        {
            let nodes = nodes
                .into_iter()
                .map(|node| fold_name(node.as_ref()))
                .collect::<Result<Vec<_>, _>>()?;
            if nodes.len() < 2 {
                return Err(ModelError::EquivTooSmall(nodes.len()));
            }
            self.equivs.push(Equiv { nodes });
            Ok(())
        }

        pub fn remove_equiv(&mut self, index: usize) -> Result<Equiv, ModelError> {
            if index >= self.equivs.len() {
                return Err(ModelError::EquivOutOfRange {
                    index,
                    len: self.equivs.len(),
                });
            }
            Ok(self.equivs.remove(index))
        }

        // 以下为加载器使用的原始插入接口：按文本原样追加，不做名称分配与去重以外的校验。

        /// 仅当同名节点不存在时插入，返回是否插入（先到者优先）。
        pub fn insert_node_if_absent(&mut self, node: Node) -> bool {
            if self.nodes.iter().any(|existing| existing.name == node.name) {
                return false;
            }
            self.nodes.push(node);
            true
        }

        pub fn push_segment(&mut self, segment: Segment) {
            self.segments.push(segment);
        }

        pub fn push_ground_plane(&mut self, plane: GroundPlane) {
            self.ground_planes.push(plane);
        }

        pub fn push_external(&mut self, external: External) {
            self.externals.push(external);
        }

        pub fn push_equiv(&mut self, equiv: Equiv) {
            self.equivs.push(equiv);
        }
    }

    /// 从计数器的下一个值开始向上扫描，跳过已被占用的名称。
    fn next_free(counter: &mut u32, prefix: &str, taken: impl Fn(&str) -> bool) -> u32 {
        *counter += 1;
        while taken(&format!("{prefix}{}", *counter)) {
            *counter += 1;
        }
        *counter
    }

}
