use std::fmt::Write as _;
use std::path::Path;

use fhed_core::units::format_eng;
use fhed_engine::Editor;
use fhed_engine::command::{CommandBus, CommandContext, CommandRequest};
use fhed_io::{DocumentSaver, InpFacade};
use tracing::{info, warn};

use crate::errors::FrontendError;
use crate::loader::{DocumentSource, LoadedSession};

/// 简易 CLI：打印模型概览，可选地将模型重新写出为 `.inp`。
pub fn run(session: LoadedSession, export: Option<&Path>) -> Result<(), FrontendError> {
    let LoadedSession { mut editor, source } = session;
    let command_bus = CommandBus::new();
    let mut context = CommandContext {
        editor: &mut editor,
    };
    if let Err(err) = dispatch_cli_command(&command_bus, "fit_view", &mut context) {
        warn!("CLI 命令执行失败: {err}");
    }
    let mut commands: Vec<&str> = command_bus.available_commands().copied().collect();
    commands.sort_unstable();
    println!("支持的命令: {}", commands.join(", "));

    let model = editor.model();
    info!(
        nodes = model.nodes().len(),
        segments = model.segments().len(),
        ground_planes = model.ground_planes().len(),
        "CLI 模型统计"
    );
    print!("{}", render_summary(&editor, &source));

    if let Some(path) = export {
        InpFacade::new().save(editor.model(), path)?;
        println!("已写出模型：{}", path.display());
    }
    Ok(())
}

fn dispatch_cli_command(
    bus: &CommandBus,
    name: &str,
    context: &mut CommandContext<'_>,
) -> Result<(), String> {
    let response = bus.dispatch(&CommandRequest::new(name), context);
    if response.success {
        if let Some(message) = response.message {
            info!(command = name, %message, "CLI 命令执行成功");
        }
        Ok(())
    } else {
        Err(response.message.unwrap_or_else(|| "未知错误".to_string()))
    }
}

/// 生成模型与视图状态的文本概览。
pub fn render_summary(editor: &Editor, source: &DocumentSource) -> String {
    let model = editor.model();
    let mut out = String::new();

    let _ = writeln!(out, "FastHenry 模型编辑器 CLI");
    match source {
        DocumentSource::File(path) => {
            let _ = writeln!(out, "已从文件加载模型：{}", path.display());
        }
        DocumentSource::Demo => {
            let _ = writeln!(out, "使用内置演示模型");
        }
    }
    let _ = writeln!(out, "标题：{}", model.title);
    let _ = writeln!(out, "单位：{}", model.units);
    let _ = writeln!(
        out,
        "频率扫描：{} ~ {}，每十倍频 {} 点",
        format_eng(model.freq.fmin, "Hz"),
        format_eng(model.freq.fmax, "Hz"),
        model.freq.ndec
    );

    let _ = writeln!(out, "节点（{}）：", model.nodes().len());
    for node in model.nodes() {
        let p = node.position;
        let _ = writeln!(
            out,
            "  - {} ({:.3}, {:.3}, {:.3})",
            node.name,
            p.x(),
            p.y(),
            p.z()
        );
    }

    let _ = writeln!(out, "导体段（{}）：", model.segments().len());
    for segment in model.segments() {
        let size = |value: Option<f64>| {
            value.map_or_else(|| "-".to_string(), |value| format!("{value}"))
        };
        let _ = writeln!(
            out,
            "  - {}: {} → {}, w={}, h={}",
            segment.name,
            segment.node1,
            segment.node2,
            size(segment.effective_width(&model.defaults)),
            size(segment.effective_height(&model.defaults))
        );
    }

    let _ = writeln!(out, "接地平面（{}）：", model.ground_planes().len());
    for plane in model.ground_planes() {
        let _ = writeln!(
            out,
            "  - {}: thick={}, seg1={}, seg2={}, 内嵌节点={}, 孔={}",
            plane.name,
            plane.thick,
            plane.seg1,
            plane.seg2,
            plane.nodes.len(),
            plane.holes.len()
        );
    }

    if !model.externals().is_empty() {
        let _ = writeln!(out, "端口：");
        for (index, external) in model.externals().iter().enumerate() {
            let _ = writeln!(
                out,
                "  {}. {} → {}{}",
                index + 1,
                external.node1,
                external.node2,
                external
                    .port_name
                    .as_deref()
                    .map(|name| format!(" ({name})"))
                    .unwrap_or_default()
            );
        }
    }
    for equiv in model.equivs() {
        let _ = writeln!(out, "等电位：{}", equiv.nodes.join(" "));
    }

    let frame = editor.scene().frame();
    let _ = writeln!(
        out,
        "场景：节点半径={:.4}，导体段实例={}，端口线={}，标签{}",
        frame.node_radius,
        frame.segments.len(),
        frame.ports.len(),
        if frame.labels_visible { "显示" } else { "隐藏" }
    );
    let target = editor.view().target_pose();
    let grid = editor.view().grid();
    let _ = writeln!(
        out,
        "相机：位置=({:.2}, {:.2}, {:.2})，目标=({:.2}, {:.2}, {:.2})，网格={}×{}",
        target.position.x,
        target.position.y,
        target.position.z,
        target.target.x,
        target.target.y,
        target.target.z,
        grid.size,
        grid.divisions
    );

    let args = editor.solver_options().to_args();
    if !args.is_empty() {
        let _ = writeln!(out, "求解参数：{}", args.join(" "));
    }
    let _ = writeln!(out, "状态：{}", editor.status());
    out
}
