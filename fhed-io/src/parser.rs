use std::collections::HashMap;

use fhed_core::{
    document::{Defaults, Equiv, External, GroundPlane, Model, Node, PlaneNode, Segment, SegmentOverrides},
    geometry::Point3,
    units::{parse_leading_f64, parse_leading_u32},
};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, trace};

static KEY_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\w+)\s*=\s*([^\s,]+)").expect("key=value 正则"));

static PLANE_NODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(n\w+)\s*\(\s*([\d.eE+\-]+)\s*,\s*([\d.eE+\-]+)\s*,\s*([\d.eE+\-]+)\s*\)",
    )
    .expect("平面节点正则")
});

static PLANE_HOLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)hole\s+(\w+)\s*\(([^)]+)\)").expect("hole 正则"));

/// 预处理后的一行：注释/空行保留原样，数据行已合并 `+` 续行。
#[derive(Debug, PartialEq)]
enum JoinedLine {
    Comment(String),
    Blank,
    Data(String),
}

#[derive(Debug, PartialEq)]
enum LineKind<'a> {
    End,
    Units(&'a str),
    Default(&'a str),
    Freq(&'a str),
    External(&'a str),
    Equiv(&'a str),
    GroundPlane(&'a str),
    Node(&'a str),
    Segment(&'a str),
    Ignored,
}

/// 解析 FastHenry 文本为模型。格式错误的行被跳过，不会使整个解析失败。
pub(crate) fn parse_document(text: &str) -> Model {
    let mut model = Model::new();
    let mut title_read = false;

    for line in join_continuations(text) {
        let data = match line {
            JoinedLine::Blank => continue,
            JoinedLine::Comment(comment) => {
                if !title_read {
                    model.title = comment;
                    title_read = true;
                }
                continue;
            }
            JoinedLine::Data(data) => {
                title_read = true;
                data
            }
        };

        match classify_line(&data) {
            LineKind::End => break,
            LineKind::Units(line) => {
                model.units = line
                    .split_whitespace()
                    .nth(1)
                    .map(str::to_lowercase)
                    .unwrap_or_else(|| fhed_core::document::DEFAULT_UNITS.to_string());
            }
            LineKind::Default(line) => parse_defaults(line, &mut model.defaults),
            LineKind::Freq(line) => parse_freq(line, &mut model),
            LineKind::External(line) => parse_external(line, &mut model),
            LineKind::Equiv(line) => parse_equiv(line, &mut model),
            LineKind::GroundPlane(line) => parse_ground_plane(line, &mut model),
            LineKind::Node(line) => parse_node(line, &mut model),
            LineKind::Segment(line) => parse_segment(line, &mut model),
            LineKind::Ignored => trace!(line = %data, "忽略无法识别的行"),
        }
    }

    debug!(
        nodes = model.nodes().len(),
        segments = model.segments().len(),
        ground_planes = model.ground_planes().len(),
        "FastHenry 文本解析完成"
    );
    model
}

fn join_continuations(text: &str) -> Vec<JoinedLine> {
    let mut joined = Vec::new();
    let mut last_data: Option<usize> = None;

    for raw in text.lines() {
        let trimmed = raw.trim();
        if let Some(rest) = trimmed.strip_prefix('+') {
            match last_data.and_then(|idx| joined.get_mut(idx)) {
                Some(JoinedLine::Data(line)) => {
                    line.push(' ');
                    line.push_str(rest.trim());
                }
                _ => trace!(line = raw, "续行前没有数据行，忽略"),
            }
        } else if let Some(comment) = trimmed.strip_prefix('*') {
            joined.push(JoinedLine::Comment(comment.trim().to_string()));
        } else if trimmed.is_empty() {
            joined.push(JoinedLine::Blank);
        } else {
            joined.push(JoinedLine::Data(trimmed.to_string()));
            last_data = Some(joined.len() - 1);
        }
    }
    joined
}

fn classify_line(line: &str) -> LineKind<'_> {
    let lower = line.to_lowercase();
    if lower.starts_with('.') {
        if lower.starts_with(".end") {
            LineKind::End
        } else if lower.starts_with(".units") {
            LineKind::Units(line)
        } else if lower.starts_with(".default") {
            LineKind::Default(line)
        } else if lower.starts_with(".freq") {
            LineKind::Freq(line)
        } else if lower.starts_with(".external") || lower.starts_with(".extern ") {
            LineKind::External(line)
        } else if lower.starts_with(".equiv") {
            LineKind::Equiv(line)
        } else {
            LineKind::Ignored
        }
    } else if lower.starts_with('g') {
        LineKind::GroundPlane(line)
    } else if lower.starts_with('n') {
        LineKind::Node(line)
    } else if lower.starts_with('e') {
        LineKind::Segment(line)
    } else {
        LineKind::Ignored
    }
}

/// 扫描整行中所有 `key=value`，键名统一小写，后出现的同名键覆盖先出现的。
fn scan_key_values(line: &str) -> HashMap<String, &str> {
    KEY_VALUE
        .captures_iter(line)
        .filter_map(|caps| {
            let key = caps.get(1)?.as_str().to_lowercase();
            let value = caps.get(2)?.as_str();
            Some((key, value))
        })
        .collect()
}

struct Attributes<'a> {
    values: HashMap<String, &'a str>,
}

impl<'a> Attributes<'a> {
    fn scan(line: &'a str) -> Self {
        Self {
            values: scan_key_values(line),
        }
    }

    fn float(&self, key: &str) -> Option<f64> {
        self.values.get(key).and_then(|raw| parse_leading_f64(raw))
    }

    fn count(&self, key: &str) -> Option<u32> {
        self.values.get(key).and_then(|raw| parse_leading_u32(raw))
    }

    fn segment_overrides(&self) -> SegmentOverrides {
        SegmentOverrides {
            w: self.float("w"),
            h: self.float("h"),
            sigma: self.float("sigma"),
            rho: self.float("rho"),
            nhinc: self.count("nhinc"),
            nwinc: self.count("nwinc"),
            rh: self.float("rh"),
            rw: self.float("rw"),
        }
    }
}

fn record_name(line: &str) -> Option<String> {
    line.split_whitespace().next().map(str::to_lowercase)
}

fn parse_defaults(line: &str, defaults: &mut Defaults) {
    let attrs = Attributes::scan(line);
    let merge_float = |slot: &mut Option<f64>, key: &str| {
        if let Some(value) = attrs.float(key) {
            *slot = Some(value);
        }
    };
    merge_float(&mut defaults.w, "w");
    merge_float(&mut defaults.h, "h");
    merge_float(&mut defaults.sigma, "sigma");
    merge_float(&mut defaults.rh, "rh");
    merge_float(&mut defaults.rw, "rw");
    merge_float(&mut defaults.x, "x");
    merge_float(&mut defaults.y, "y");
    merge_float(&mut defaults.z, "z");
    if let Some(value) = attrs.count("nhinc") {
        defaults.nhinc = Some(value);
    }
    if let Some(value) = attrs.count("nwinc") {
        defaults.nwinc = Some(value);
    }
}

fn parse_freq(line: &str, model: &mut Model) {
    let attrs = Attributes::scan(line);
    if let Some(value) = attrs.float("fmin") {
        model.freq.fmin = value;
    }
    if let Some(value) = attrs.float("fmax") {
        model.freq.fmax = value;
    }
    if let Some(value) = attrs.float("ndec") {
        model.freq.ndec = value;
    }
}

fn parse_external(line: &str, model: &mut Model) {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 3 {
        debug!(line, ".external 缺少节点，跳过");
        return;
    }
    model.push_external(External {
        node1: parts[1].to_lowercase(),
        node2: parts[2].to_lowercase(),
        port_name: parts.get(3).map(|port| port.to_string()),
    });
}

fn parse_equiv(line: &str, model: &mut Model) {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 3 {
        debug!(line, ".equiv 节点不足，跳过");
        return;
    }
    model.push_equiv(Equiv {
        nodes: parts[1..].iter().map(|node| node.to_lowercase()).collect(),
    });
}

fn parse_node(line: &str, model: &mut Model) {
    let Some(name) = record_name(line) else {
        return;
    };
    let attrs = Attributes::scan(line);
    let defaults = model.defaults;
    let coordinate = |key: &str, fallback: Option<f64>| {
        attrs.float(key).or(fallback).unwrap_or(0.0)
    };
    let position = Point3::new(
        coordinate("x", defaults.x),
        coordinate("y", defaults.y),
        coordinate("z", defaults.z),
    );
    if !model.insert_node_if_absent(Node::new(name.clone(), position)) {
        debug!(node = %name, "重复的节点定义，保留首次出现");
    }
}

fn parse_segment(line: &str, model: &mut Model) {
    let mut tokens = line.split_whitespace();
    let Some(name) = tokens.next().map(str::to_lowercase) else {
        return;
    };
    let mut endpoints = tokens
        .take_while(|token| !token.contains('='))
        .map(str::to_lowercase);
    let (Some(node1), Some(node2)) = (endpoints.next(), endpoints.next()) else {
        debug!(segment = %name, "导体段缺少端点，跳过");
        return;
    };
    let overrides = Attributes::scan(line).segment_overrides();
    model.push_segment(Segment::new(name, node1, node2, overrides));
}

fn parse_ground_plane(line: &str, model: &mut Model) {
    let Some(name) = record_name(line) else {
        return;
    };
    let attrs = Attributes::scan(line);
    let corner = |index: u8| {
        let axis = |prefix: &str| attrs.float(&format!("{prefix}{index}")).unwrap_or(0.0);
        Point3::new(axis("x"), axis("y"), axis("z"))
    };

    let nodes: Vec<PlaneNode> = PLANE_NODE
        .captures_iter(line)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str().to_lowercase();
            let x = parse_leading_f64(caps.get(2)?.as_str())?;
            let y = parse_leading_f64(caps.get(3)?.as_str())?;
            let z = parse_leading_f64(caps.get(4)?.as_str())?;
            Some(PlaneNode {
                name,
                position: Point3::new(x, y, z),
            })
        })
        .collect();

    let holes: Vec<String> = PLANE_HOLE
        .find_iter(line)
        .map(|hole| hole.as_str().to_string())
        .collect();

    let plane = GroundPlane {
        name,
        corners: [corner(1), corner(2), corner(3)],
        thick: attrs.float("thick").unwrap_or(1.0),
        seg1: attrs.count("seg1").unwrap_or(10),
        seg2: attrs.count("seg2").unwrap_or(10),
        sigma: attrs.float("sigma"),
        rho: attrs.float("rho"),
        nhinc: attrs.count("nhinc"),
        nodes,
        holes,
    };

    for plane_node in &plane.nodes {
        // 同名节点已存在时保留已有坐标，平面内嵌点只记录在平面上
        if !model.insert_node_if_absent(Node::new(plane_node.name.clone(), plane_node.position)) {
            debug!(node = %plane_node.name, plane = %plane.name, "平面内嵌节点与已有节点同名");
        }
    }
    model.push_ground_plane(plane);
}
