pub mod backend;
pub mod command;
pub mod editor;
pub mod interaction;
pub mod scene;
pub mod view;

pub mod errors {
    use fhed_core::document::ModelError;
    use thiserror::Error;

    #[derive(Debug, Clone, PartialEq, Error)]
    pub enum EngineError {
        #[error("{0} already in progress")]
        Busy(&'static str),
        #[error("no {0} request in flight")]
        NoRequestInFlight(&'static str),
        #[error("unknown view preset: {0}")]
        UnknownPreset(String),
        #[error("unknown interaction mode: {0}")]
        UnknownMode(String),
        #[error("Invalid {field}: {value}")]
        InvalidValue { field: &'static str, value: String },
        #[error(transparent)]
        Model(#[from] ModelError),
    }
}

pub use editor::Editor;
