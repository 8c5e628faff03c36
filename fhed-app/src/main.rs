use std::path::PathBuf;

use fhed_config::{AppConfig, ConfigError, FrontendMode};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

const USAGE: &str = "用法: fhed [--cli | --bevy] [--config <文件>] [--export <文件>] [输入文件.inp|.json]";

fn main() {
    let mut args = std::env::args().skip(1);
    let mut override_mode: Option<FrontendMode> = None;
    let mut config_override: Option<PathBuf> = None;
    let mut export_path: Option<PathBuf> = None;
    let mut input: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--bevy" => override_mode = Some(FrontendMode::Bevy),
            "--cli" => override_mode = Some(FrontendMode::Cli),
            "--config" => {
                let Some(path) = args.next() else {
                    eprintln!("`--config` 需要提供配置文件路径");
                    std::process::exit(1);
                };
                config_override = Some(PathBuf::from(path));
            }
            "--export" => {
                let Some(path) = args.next() else {
                    eprintln!("`--export` 需要提供输出文件路径");
                    std::process::exit(1);
                };
                export_path = Some(PathBuf::from(path));
            }
            "-h" | "--help" => {
                println!("{USAGE}");
                return;
            }
            other if other.starts_with('-') => {
                eprintln!("未知参数：{other}");
                eprintln!("{USAGE}");
                std::process::exit(1);
            }
            other => {
                if input.is_some() {
                    eprintln!("只能指定一个输入文件：{other}");
                    std::process::exit(1);
                }
                input = Some(PathBuf::from(other));
            }
        }
    }

    let config = load_configuration(config_override);
    init_logging(&config);
    info!("启动 FastHenry 模型编辑器");

    let mode = override_mode.unwrap_or(config.frontend.default_mode);
    match mode {
        FrontendMode::Bevy => {
            info!("以 Bevy 模式启动");
            if export_path.is_some() {
                warn!("Bevy 模式忽略 `--export`");
            }
            if let Err(err) = fhed_frontend::launch_bevy(input.as_deref(), &config) {
                error!(error = %err, "无法启动 Bevy 前端");
                std::process::exit(1);
            }
        }
        FrontendMode::Cli => {
            info!("以 CLI 模式启动");
            if let Err(err) =
                fhed_frontend::run_cli(input.as_deref(), export_path.as_deref(), &config)
            {
                error!(error = %err, "执行 CLI 前端失败");
                std::process::exit(1);
            }
        }
    }
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Context { .. } => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
