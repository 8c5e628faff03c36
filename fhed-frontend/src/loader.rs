use std::env;
use std::path::{Path, PathBuf};

use fhed_config::{AppConfig, DisplayConfig, SolverConfig};
use fhed_engine::Editor;
use fhed_engine::backend::SolverOptions;
use fhed_engine::scene::{DisplayOptions, Rgb};
use fhed_io::loader_for_path;
use tracing::{info, warn};

/// 未在命令行给出输入文件时读取的环境变量。
pub const INPUT_ENV: &str = "FHED_INPUT";

/// 文档来源，便于前端呈现加载信息。
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentSource {
    File(PathBuf),
    Demo,
}

/// 统一封装加载后的编辑会话与来源信息。
#[derive(Debug)]
pub struct LoadedSession {
    pub editor: Editor,
    pub source: DocumentSource,
}

/// 按显式路径或环境变量 `FHED_INPUT` 加载文档，失败时回退到内置示例。
pub fn load_session(input: Option<&Path>, config: &AppConfig) -> LoadedSession {
    let path = input
        .map(Path::to_path_buf)
        .or_else(|| env::var_os(INPUT_ENV).map(PathBuf::from));
    load_session_from(path, config)
}

fn load_session_from(path: Option<PathBuf>, config: &AppConfig) -> LoadedSession {
    let display = display_options(&config.display);
    let solver = solver_options(&config.solver);

    if let Some(path) = path {
        match loader_for_path(&path).and_then(|loader| loader.load(&path)) {
            Ok(model) => {
                info!(path = %path.display(), "加载文档成功");
                let mut editor = Editor::with_model(model, display);
                editor.set_solver_options(solver);
                return LoadedSession {
                    editor,
                    source: DocumentSource::File(path),
                };
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "加载文档失败，回退到内置示例");
            }
        }
    }

    let mut editor = Editor::new(display);
    editor.populate_demo();
    editor.set_solver_options(solver);
    LoadedSession {
        editor,
        source: DocumentSource::Demo,
    }
}

/// 将配置中的显示选项转换为场景选项；无法识别的颜色保留默认值。
pub fn display_options(config: &DisplayConfig) -> DisplayOptions {
    let defaults = DisplayOptions::default();
    let color = |field: &str, text: &str, fallback: Rgb| {
        Rgb::from_hex(text).unwrap_or_else(|| {
            warn!(field, value = text, "颜色格式无效，使用默认颜色");
            fallback
        })
    };
    DisplayOptions {
        node_size: config.node_size,
        label_size: config.label_size,
        show_labels: config.show_labels,
        node_color: color("node_color", &config.node_color, defaults.node_color),
        segment_color: color("segment_color", &config.segment_color, defaults.segment_color),
        segment_opacity: config.segment_opacity.clamp(0.0, 1.0),
        plane_opacity: config.plane_opacity.clamp(0.0, 1.0),
        show_grid: config.show_grid,
    }
}

pub fn solver_options(config: &SolverConfig) -> SolverOptions {
    SolverOptions {
        solver: config.solver.clone(),
        matvec: config.matvec.clone(),
        precond: config.precond.clone(),
        order: config.order,
        tol: config.tol,
        maxiters: config.maxiters,
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn invalid_colour_falls_back_to_default() {
        let config = DisplayConfig {
            node_color: "green".to_string(),
            segment_color: "#102030".to_string(),
            segment_opacity: 1.5,
            ..DisplayConfig::default()
        };
        let options = display_options(&config);
        assert_eq!(options.node_color, DisplayOptions::default().node_color);
        assert_eq!(options.segment_color, Rgb::new(0x10, 0x20, 0x30));
        assert_eq!(options.segment_opacity, 1.0);
    }

    #[test]
    fn file_source_is_loaded_with_solver_seed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pair.inp");
        fs::write(&path, "n1 x=0 y=0 z=0\nn2 x=3 y=0 z=0\ne1 n1 n2\n.end\n").unwrap();
        let mut config = AppConfig::default();
        config.solver.maxiters = Some(50);

        let session = load_session_from(Some(path.clone()), &config);
        assert_eq!(session.source, DocumentSource::File(path));
        assert_eq!(session.editor.model().nodes().len(), 2);
        assert_eq!(session.editor.solver_options().maxiters, Some(50));
    }

    #[test]
    fn unreadable_source_falls_back_to_demo() {
        let session = load_session_from(
            Some(PathBuf::from("/nonexistent/model.inp")),
            &AppConfig::default(),
        );
        assert_eq!(session.source, DocumentSource::Demo);
        assert!(!session.editor.model().segments().is_empty());
    }
}
