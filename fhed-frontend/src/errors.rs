use fhed_io::IoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("Bevy 前端未启用，请使用 `--features bevy_app` 编译")]
    BevyFeatureDisabled,
    #[error(transparent)]
    Io(#[from] IoError),
}
