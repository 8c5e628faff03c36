use std::collections::HashMap;
use std::fmt::Write as _;

use fhed_core::document::{Defaults, GroundPlane, Model, Node, Segment};
use fhed_core::geometry::Point3;

/// 生成 FastHenry 文本。只输出已设置的参数，保证再次解析后得到等价模型。
pub(crate) fn write_document(model: &Model) -> String {
    let mut out = String::new();
    push_line(&mut out, format!("* {}", model.title));
    out.push('\n');
    push_line(&mut out, format!(".units {}", model.units));
    out.push('\n');

    if let Some(defaults) = default_line(&model.defaults) {
        push_line(&mut out, defaults);
        out.push('\n');
    }

    let (leading, trailing) = split_free_nodes(model);
    for node in &leading {
        push_line(&mut out, node_line(node));
    }
    if !leading.is_empty() {
        out.push('\n');
    }

    for plane in model.ground_planes() {
        write_ground_plane(&mut out, plane);
        out.push('\n');
    }

    for node in &trailing {
        push_line(&mut out, node_line(node));
    }
    if !trailing.is_empty() {
        out.push('\n');
    }

    for segment in model.segments() {
        push_line(&mut out, segment_line(segment));
    }
    if !model.segments().is_empty() {
        out.push('\n');
    }

    for equiv in model.equivs() {
        push_line(&mut out, format!(".equiv {}", equiv.nodes.join(" ")));
    }
    if !model.equivs().is_empty() {
        out.push('\n');
    }

    for external in model.externals() {
        let mut line = format!(".external {} {}", external.node1, external.node2);
        if let Some(port) = &external.port_name {
            let _ = write!(line, " {port}");
        }
        push_line(&mut out, line);
    }
    if !model.externals().is_empty() {
        out.push('\n');
    }

    let freq = model.freq;
    push_line(
        &mut out,
        format!(
            ".freq fmin={} fmax={} ndec={}",
            freq.fmin, freq.fmax, freq.ndec
        ),
    );
    out.push('\n');
    push_line(&mut out, ".end".to_string());
    out
}

/// 划分需要单独输出的节点。
///
/// 与首个同名内嵌节点坐标一致的节点由平面块生成，不再输出；坐标不同的同名节点
/// 必须写在平面块之前，解析时先到者优先才能保留它；其余节点写在平面块之后。
fn split_free_nodes(model: &Model) -> (Vec<&Node>, Vec<&Node>) {
    let mut embedded: HashMap<&str, Point3> = HashMap::new();
    for plane_node in model.ground_planes().iter().flat_map(|plane| &plane.nodes) {
        embedded
            .entry(plane_node.name.as_str())
            .or_insert(plane_node.position);
    }

    let mut leading = Vec::new();
    let mut trailing = Vec::new();
    for node in model.nodes() {
        match embedded.get(node.name.as_str()) {
            Some(position) if *position == node.position => {}
            Some(_) => leading.push(node),
            None => trailing.push(node),
        }
    }
    (leading, trailing)
}

fn node_line(node: &Node) -> String {
    let p = node.position;
    format!("{} x={} y={} z={}", node.name, p.x(), p.y(), p.z())
}

fn push_line(out: &mut String, line: String) {
    out.push_str(&line);
    out.push('\n');
}

fn default_line(defaults: &Defaults) -> Option<String> {
    let mut parts = Vec::new();
    let mut float = |key: &str, value: Option<f64>| {
        if let Some(value) = value {
            parts.push(format!("{key}={value}"));
        }
    };
    float("w", defaults.w);
    float("h", defaults.h);
    float("sigma", defaults.sigma);
    if let Some(value) = defaults.nhinc {
        parts.push(format!("nhinc={value}"));
    }
    if let Some(value) = defaults.nwinc {
        parts.push(format!("nwinc={value}"));
    }
    if let Some(value) = defaults.rh {
        parts.push(format!("rh={value}"));
    }
    if let Some(value) = defaults.rw {
        parts.push(format!("rw={value}"));
    }
    if parts.is_empty() {
        None
    } else {
        Some(format!(".default {}", parts.join(" ")))
    }
}

fn segment_line(segment: &Segment) -> String {
    let mut line = format!("{} {} {}", segment.name, segment.node1, segment.node2);
    let o = &segment.overrides;
    let floats = [("w", o.w), ("h", o.h), ("sigma", o.sigma)];
    for (key, value) in floats {
        if let Some(value) = value {
            let _ = write!(line, " {key}={value}");
        }
    }
    for (key, value) in [("nhinc", o.nhinc), ("nwinc", o.nwinc)] {
        if let Some(value) = value {
            let _ = write!(line, " {key}={value}");
        }
    }
    for (key, value) in [("rh", o.rh), ("rw", o.rw), ("rho", o.rho)] {
        if let Some(value) = value {
            let _ = write!(line, " {key}={value}");
        }
    }
    line
}

fn write_ground_plane(out: &mut String, plane: &GroundPlane) {
    let [p1, p2, p3] = plane.corners;
    push_line(
        out,
        format!(
            "{} x1={} y1={} z1={} x2={} y2={} z2={}",
            plane.name,
            p1.x(),
            p1.y(),
            p1.z(),
            p2.x(),
            p2.y(),
            p2.z()
        ),
    );
    push_line(out, format!("+  x3={} y3={} z3={}", p3.x(), p3.y(), p3.z()));
    push_line(out, format!("+  thick={}", plane.thick));
    push_line(out, format!("+  seg1={} seg2={}", plane.seg1, plane.seg2));

    let mut material = Vec::new();
    if let Some(sigma) = plane.sigma {
        material.push(format!("sigma={sigma}"));
    }
    if let Some(rho) = plane.rho {
        material.push(format!("rho={rho}"));
    }
    if let Some(nhinc) = plane.nhinc {
        material.push(format!("nhinc={nhinc}"));
    }
    if !material.is_empty() {
        push_line(out, format!("+  {}", material.join(" ")));
    }

    for node in &plane.nodes {
        let p = node.position;
        push_line(
            out,
            format!("+  {}  ({},{},{})", node.name, p.x(), p.y(), p.z()),
        );
    }
    for hole in &plane.holes {
        push_line(out, format!("+  {hole}"));
    }
}
