use fhed_core::geometry::Ray3;
use glam::DVec3;
use tracing::debug;

use crate::scene::{EntityKey, PickFilter, SceneSync};
use crate::view::snap_to_grid;

/// 编辑模式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractionMode {
    #[default]
    Select,
    PlaceNode,
    ConnectSegment,
}

impl InteractionMode {
    pub fn label(self) -> &'static str {
        match self {
            InteractionMode::Select => "select",
            InteractionMode::PlaceNode => "place-node",
            InteractionMode::ConnectSegment => "connect-segment",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "select" => Some(InteractionMode::Select),
            "place-node" | "place_node" => Some(InteractionMode::PlaceNode),
            "connect-segment" | "connect_segment" => Some(InteractionMode::ConnectSegment),
            _ => None,
        }
    }

    pub fn hint(self) -> &'static str {
        match self {
            InteractionMode::Select => "Ready",
            InteractionMode::PlaceNode => "Click on the grid to place a node",
            InteractionMode::ConnectSegment => "Click the first node for the segment",
        }
    }
}

/// 指针与键盘输入，射线已由渲染端从屏幕坐标换算。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Click(Ray3),
    DoubleClick(Ray3),
    PointerMove(Ray3),
    Cancel,
}

/// 交互结果：高亮已直接写入场景，其余请求交由编辑器执行。
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Selected(Option<EntityKey>),
    CreateNode(DVec3),
    CreateSegment { node1: String, node2: String },
    FitView,
    ModeChanged(InteractionMode),
    Hover(Option<DVec3>),
    Status(String),
}

/// 处理输入时需要的视图信息。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementContext {
    pub reference_z: f64,
    pub snap_step: f64,
}

#[derive(Debug, Default)]
pub struct InteractionController {
    mode: InteractionMode,
}

impl InteractionController {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    /// 切换模式，总是清除待连接端点的高亮。
    pub fn set_mode(&mut self, mode: InteractionMode, scene: &mut SceneSync) -> Vec<Effect> {
        scene.set_staged(None);
        let changed = self.mode != mode;
        self.mode = mode;
        debug!(mode = mode.label(), "切换交互模式");
        let mut effects = Vec::new();
        if changed {
            effects.push(Effect::ModeChanged(mode));
        }
        effects.push(Effect::Status(mode.hint().to_string()));
        effects
    }

    pub fn handle(
        &mut self,
        event: InputEvent,
        scene: &mut SceneSync,
        placement: PlacementContext,
    ) -> Vec<Effect> {
        match event {
            InputEvent::Click(ray) => match self.mode {
                InteractionMode::Select => self.select_at(&ray, scene),
                InteractionMode::PlaceNode => place_at(&ray, placement)
                    .map(|point| vec![Effect::CreateNode(point)])
                    .unwrap_or_default(),
                InteractionMode::ConnectSegment => self.connect_at(&ray, scene),
            },
            InputEvent::DoubleClick(ray) => {
                if self.mode == InteractionMode::Select
                    && scene.pick(&ray, PickFilter::All).is_none()
                {
                    vec![Effect::FitView]
                } else {
                    Vec::new()
                }
            }
            InputEvent::PointerMove(ray) => {
                if self.mode == InteractionMode::PlaceNode {
                    vec![Effect::Hover(place_at(&ray, placement))]
                } else {
                    Vec::new()
                }
            }
            InputEvent::Cancel => self.cancel(scene),
        }
    }

    fn select_at(&mut self, ray: &Ray3, scene: &mut SceneSync) -> Vec<Effect> {
        let key = scene.pick(ray, PickFilter::All).map(|hit| hit.key);
        scene.set_selection(key.clone());
        vec![Effect::Selected(key)]
    }

    fn connect_at(&mut self, ray: &Ray3, scene: &mut SceneSync) -> Vec<Effect> {
        let Some(EntityKey::Node(name)) = scene.pick(ray, PickFilter::NodesOnly).map(|hit| hit.key)
        else {
            return Vec::new();
        };

        match scene.staged().map(str::to_string) {
            None => {
                scene.set_staged(Some(&name));
                vec![Effect::Status(format!(
                    "Segment: first node = {name}. Click second node."
                ))]
            }
            Some(first) if first == name => Vec::new(),
            Some(first) => {
                scene.set_staged(None);
                vec![Effect::CreateSegment {
                    node1: first,
                    node2: name,
                }]
            }
        }
    }

    fn cancel(&mut self, scene: &mut SceneSync) -> Vec<Effect> {
        scene.clear_highlights();
        let mut effects = vec![Effect::Selected(None)];
        if self.mode != InteractionMode::Select {
            effects.extend(self.set_mode(InteractionMode::Select, scene));
        }
        effects
    }
}

/// 将射线投射到参考平面并吸附到网格。
fn place_at(ray: &Ray3, placement: PlacementContext) -> Option<DVec3> {
    let hit = ray.intersect_plane_z(placement.reference_z)?;
    Some(snap_to_grid(hit.as_vec3(), placement.snap_step))
}
