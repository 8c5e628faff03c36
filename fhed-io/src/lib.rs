use std::fs;
use std::path::{Path, PathBuf};

use fhed_core::document::{GeometryImport, Model};
use thiserror::Error;
use tracing::info;

mod parser;
mod writer;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid geometry import payload: {0}")]
    InvalidImport(#[from] serde_json::Error),
}

pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<Model, IoError>;
}

pub trait DocumentSaver {
    fn save(&self, model: &Model, path: &Path) -> Result<(), IoError>;
}

/// 解析 FastHenry 文本。该操作总是成功，无法识别或格式错误的行会被跳过。
pub fn parse_inp(text: &str) -> Model {
    parser::parse_document(text)
}

/// 将模型序列化为 FastHenry 文本。
pub fn write_inp(model: &Model) -> String {
    writer::write_document(model)
}

/// 解码外部几何转换服务返回的 JSON。
pub fn decode_geometry_import(json: &str) -> Result<GeometryImport, IoError> {
    Ok(serde_json::from_str(json)?)
}

fn read_text(path: &Path) -> Result<String, IoError> {
    fs::read_to_string(path).map_err(|source| IoError::ReadError {
        path: path.to_path_buf(),
        source,
    })
}

/// `.inp` 文件读写入口。
pub struct InpFacade;

impl InpFacade {
    pub fn new() -> Self {
        Self
    }
}

impl Default for InpFacade {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentLoader for InpFacade {
    fn load(&self, path: &Path) -> Result<Model, IoError> {
        let text = read_text(path)?;
        let model = parse_inp(&text);
        info!(
            path = %path.display(),
            nodes = model.nodes().len(),
            segments = model.segments().len(),
            "已加载 FastHenry 模型"
        );
        Ok(model)
    }
}

impl DocumentSaver for InpFacade {
    fn save(&self, model: &Model, path: &Path) -> Result<(), IoError> {
        fs::write(path, write_inp(model)).map_err(|source| IoError::WriteError {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "已保存 FastHenry 模型");
        Ok(())
    }
}

/// 几何导入结果（JSON）加载器，构造全新的模型。
pub struct GeometryJsonFacade;

impl GeometryJsonFacade {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GeometryJsonFacade {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentLoader for GeometryJsonFacade {
    fn load(&self, path: &Path) -> Result<Model, IoError> {
        let text = read_text(path)?;
        let import = decode_geometry_import(&text)?;
        if let Some(info) = &import.info {
            info!(path = %path.display(), info = %info, "几何导入附带信息");
        }
        Ok(Model::from_import(import))
    }
}

/// 根据扩展名选择加载器：`.inp` 为 FastHenry 文本，`.json` 为几何导入结果。
pub fn loader_for_path(path: &Path) -> Result<Box<dyn DocumentLoader>, IoError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("inp") | Some("txt") => Ok(Box::new(InpFacade::new())),
        Some("json") => Ok(Box::new(GeometryJsonFacade::new())),
        _ => Err(IoError::UnsupportedFeature(format!(
            "无法识别的文件类型: {}",
            path.display()
        ))),
    }
}
