use std::collections::HashMap;

use crate::editor::Editor;
use crate::interaction::InteractionMode;
use crate::view::ViewPreset;

#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub name: String,
    pub args: Vec<String>,
}

impl CommandRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandResponse {
    pub success: bool,
    pub message: Option<String>,
}

impl CommandResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse;
}

pub struct CommandContext<'a> {
    pub editor: &'a mut Editor,
}

pub struct CommandBus {
    handlers: HashMap<&'static str, Box<dyn CommandHandler>>,
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBus {
    pub fn new() -> Self {
        let mut bus = Self {
            handlers: HashMap::new(),
        };
        bus.register(ViewCommand {
            name: "fit_view",
            preset: Some(ViewPreset::Fit),
        });
        bus.register(ViewCommand {
            name: "view_top",
            preset: Some(ViewPreset::Top),
        });
        bus.register(ViewCommand {
            name: "view_front",
            preset: Some(ViewPreset::Front),
        });
        bus.register(ViewCommand {
            name: "view_right",
            preset: Some(ViewPreset::Right),
        });
        bus.register(ViewCommand {
            name: "view_iso",
            preset: Some(ViewPreset::Iso),
        });
        bus.register(ViewCommand {
            name: "view",
            preset: None,
        });
        bus.register(ModeCommand {
            name: "mode_select",
            mode: Some(InteractionMode::Select),
        });
        bus.register(ModeCommand {
            name: "mode_place_node",
            mode: Some(InteractionMode::PlaceNode),
        });
        bus.register(ModeCommand {
            name: "mode_connect_segment",
            mode: Some(InteractionMode::ConnectSegment),
        });
        bus.register(ModeCommand {
            name: "mode",
            mode: None,
        });
        bus.register(ClearSelectionCommand);
        bus.register(CancelCommand);
        bus.register(DeleteSelectionCommand);
        bus
    }

    pub fn register<H: CommandHandler + 'static>(&mut self, handler: H) {
        self.handlers.insert(handler.name(), Box::new(handler));
    }

    pub fn dispatch(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        if let Some(handler) = self.handlers.get(request.name.as_str()) {
            handler.execute(request, context)
        } else {
            CommandResponse::err(format!("未知命令: {}", request.name))
        }
    }

    pub fn available_commands(&self) -> impl Iterator<Item = &&'static str> {
        self.handlers.keys()
    }
}

/// 固定预设视角；`preset` 为空时从第一个参数读取预设名。
struct ViewCommand {
    name: &'static str,
    preset: Option<ViewPreset>,
}

impl CommandHandler for ViewCommand {
    fn name(&self) -> &'static str {
        self.name
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let preset = match (self.preset, request.args.first()) {
            (Some(preset), _) => preset,
            (None, Some(label)) => match ViewPreset::from_label(label) {
                Some(preset) => preset,
                None => return CommandResponse::err(format!("未知视角: {label}")),
            },
            (None, None) => return CommandResponse::err("缺少视角参数"),
        };
        context.editor.apply_view(preset);
        CommandResponse::ok(format!("视角已切换: {}", preset.label()))
    }
}

struct ModeCommand {
    name: &'static str,
    mode: Option<InteractionMode>,
}

impl CommandHandler for ModeCommand {
    fn name(&self) -> &'static str {
        self.name
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let mode = match (self.mode, request.args.first()) {
            (Some(mode), _) => mode,
            (None, Some(label)) => match context.editor.set_mode_label(label) {
                Ok(mode) => return CommandResponse::ok(format!("交互模式: {}", mode.label())),
                Err(err) => return CommandResponse::err(err.to_string()),
            },
            (None, None) => return CommandResponse::err("缺少模式参数"),
        };
        context.editor.set_mode(mode);
        CommandResponse::ok(format!("交互模式: {}", mode.label()))
    }
}

struct ClearSelectionCommand;

impl CommandHandler for ClearSelectionCommand {
    fn name(&self) -> &'static str {
        "clear_selection"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        context.editor.clear_selection();
        CommandResponse::ok("选中已清空")
    }
}

struct CancelCommand;

impl CommandHandler for CancelCommand {
    fn name(&self) -> &'static str {
        "cancel"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        context.editor.cancel();
        CommandResponse::ok("已取消当前操作")
    }
}

struct DeleteSelectionCommand;

impl CommandHandler for DeleteSelectionCommand {
    fn name(&self) -> &'static str {
        "delete_selection"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        match context.editor.delete_selection() {
            Ok(true) => CommandResponse::ok(context.editor.status().to_string()),
            Ok(false) => CommandResponse::err("没有选中的实体"),
            Err(err) => CommandResponse::err(err.to_string()),
        }
    }
}
