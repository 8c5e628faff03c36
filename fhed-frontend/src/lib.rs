pub mod cli;
pub mod errors;
pub mod loader;

#[cfg(feature = "bevy_app")]
pub mod bevy_app;

use std::path::Path;

use errors::FrontendError;
use fhed_config::AppConfig;
use tracing::info;

/// 运行 CLI 前端：加载文档（或演示模型）并打印概览。
pub fn run_cli(
    input: Option<&Path>,
    export: Option<&Path>,
    config: &AppConfig,
) -> Result<(), FrontendError> {
    info!("启动 CLI 前端");
    let session = loader::load_session(input, config);
    cli::run(session, export)
}

/// 启动 Bevy + egui 桌面前端，若未启用 `bevy_app` 特性则返回错误。
pub fn launch_bevy(input: Option<&Path>, config: &AppConfig) -> Result<(), FrontendError> {
    #[cfg(feature = "bevy_app")]
    {
        let title = config.frontend.window_title.as_str();
        info!(title, "启动 Bevy 桌面前端");
        let session = loader::load_session(input, config);
        bevy_app::launch(title, session);
        Ok(())
    }
    #[cfg(not(feature = "bevy_app"))]
    {
        let _ = (input, config);
        Err(FrontendError::BevyFeatureDisabled)
    }
}
