use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 指定配置文件路径的环境变量。
pub const CONFIG_ENV: &str = "FHED_CONFIG";

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub frontend: FrontendConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub solver: SolverConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 自动发现配置文件：优先读取环境变量 `FHED_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV) {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrontendMode {
    #[default]
    Cli,
    Bevy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FrontendConfig {
    #[serde(default)]
    pub default_mode: FrontendMode,
    #[serde(default = "FrontendConfig::default_window_title")]
    pub window_title: String,
}

impl FrontendConfig {
    fn default_window_title() -> String {
        "FastHenry Editor".to_string()
    }
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            default_mode: FrontendMode::default(),
            window_title: Self::default_window_title(),
        }
    }
}

/// 场景显示选项的初始值。颜色使用 `#rrggbb`。
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub node_size: f64,
    pub label_size: f64,
    pub show_labels: bool,
    pub node_color: String,
    pub segment_color: String,
    pub segment_opacity: f32,
    pub plane_opacity: f32,
    pub show_grid: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            node_size: 1.0,
            label_size: 1.0,
            show_labels: true,
            node_color: "#3fb950".to_string(),
            segment_color: "#4493f8".to_string(),
            segment_opacity: 0.75,
            plane_opacity: 0.3,
            show_grid: true,
        }
    }
}

/// 求解器选项的初始值，未设置的项不会传给求解器。
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub solver: Option<String>,
    pub matvec: Option<String>,
    pub precond: Option<String>,
    pub order: Option<u32>,
    pub tol: Option<f64>,
    pub maxiters: Option<u32>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_returned_when_file_missing() {
        let cfg = AppConfig::discover().expect("discover should succeed");
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.frontend.default_mode, FrontendMode::Cli);
        assert_eq!(cfg.display, DisplayConfig::default());
        assert_eq!(cfg.solver, SolverConfig::default());
    }

    #[test]
    fn load_from_temp_file() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r##"
            [logging]
            level = "debug"

            [frontend]
            default_mode = "bevy"
            window_title = "Custom"

            [display]
            node_size = 2.5
            node_color = "#ff8800"
            show_labels = false

            [solver]
            solver = "iterative"
            tol = 1e-3
            maxiters = 200
            "##
        )
        .unwrap();

        let cfg = AppConfig::from_file(file.path()).expect("load config");
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.frontend.default_mode, FrontendMode::Bevy);
        assert_eq!(cfg.frontend.window_title, "Custom");
        assert_eq!(cfg.display.node_size, 2.5);
        assert_eq!(cfg.display.node_color, "#ff8800");
        assert!(!cfg.display.show_labels);
        assert_eq!(cfg.display.segment_opacity, 0.75);
        assert_eq!(cfg.solver.solver.as_deref(), Some("iterative"));
        assert_eq!(cfg.solver.tol, Some(1e-3));
        assert_eq!(cfg.solver.order, None);
    }

    #[test]
    fn malformed_file_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "[display]\nnode_size = \"large\"").unwrap();
        let err = AppConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
