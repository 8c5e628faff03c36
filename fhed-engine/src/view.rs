use std::time::Duration;

use fhed_core::document::Model;
use fhed_core::geometry::{Bounds3, Point3};
use glam::DVec3;
use tracing::debug;

pub const ANIMATION_DURATION: Duration = Duration::from_millis(400);
/// 空模型时使用的默认包围盒半边长。
pub const EMPTY_HALF_EXTENT: f64 = 5.0;
const MIN_GRID_DIVISIONS: u32 = 10;
const MAX_GRID_DIVISIONS: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: DVec3,
    pub target: DVec3,
}

impl CameraPose {
    fn lerp(&self, other: &CameraPose, t: f64) -> CameraPose {
        CameraPose {
            position: self.position.lerp(other.position, t),
            target: self.target.lerp(other.target, t),
        }
    }
}

impl Default for CameraPose {
    fn default() -> Self {
        Self {
            position: DVec3::new(50.0, -50.0, 40.0),
            target: DVec3::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewPreset {
    Fit,
    Top,
    Front,
    Right,
    Iso,
}

impl ViewPreset {
    pub fn label(self) -> &'static str {
        match self {
            ViewPreset::Fit => "fit",
            ViewPreset::Top => "top",
            ViewPreset::Front => "front",
            ViewPreset::Right => "right",
            ViewPreset::Iso => "iso",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "fit" => Some(ViewPreset::Fit),
            "top" => Some(ViewPreset::Top),
            "front" => Some(ViewPreset::Front),
            "right" => Some(ViewPreset::Right),
            "iso" => Some(ViewPreset::Iso),
            _ => None,
        }
    }
}

/// 网格参数：边长、分割数以及所在平面的中心（Z 固定为 0）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    pub size: f64,
    pub divisions: u32,
    pub center: DVec3,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            size: 100.0,
            divisions: 100,
            center: DVec3::ZERO,
        }
    }
}

/// 取景所需的包围盒摘要。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Framing {
    pub center: DVec3,
    pub max_dim: f64,
    pub distance: f64,
}

impl Framing {
    pub fn of(model: &Model) -> Self {
        let bounds = framing_bounds(model);
        let max_dim = bounds.max_dimension().max(1.0);
        Self {
            center: bounds.center().as_vec3(),
            max_dim,
            distance: max_dim * 2.0,
        }
    }
}

fn framing_bounds(model: &Model) -> Bounds3 {
    model.bounds().unwrap_or_else(|| {
        Bounds3::new(
            Point3::new(-EMPTY_HALF_EXTENT, -EMPTY_HALF_EXTENT, -EMPTY_HALF_EXTENT),
            Point3::new(EMPTY_HALF_EXTENT, EMPTY_HALF_EXTENT, EMPTY_HALF_EXTENT),
        )
    })
}

/// 吸附步长：取模型范围（至少 10）的十分之一对应的 10 的整数次幂。
pub fn snap_step(model: &Model) -> f64 {
    let extent = framing_bounds(model).max_dimension().max(10.0);
    let step = 10f64.powi((extent / 10.0).log10().floor() as i32);
    if step.is_finite() && step > 0.0 { step } else { 1.0 }
}

pub fn snap_to_grid(point: DVec3, step: f64) -> DVec3 {
    (point / step).round() * step
}

/// 二次缓入缓出。
pub fn ease_in_out(t: f64) -> f64 {
    if t < 0.5 {
        2.0 * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct CameraAnimation {
    from: CameraPose,
    to: CameraPose,
    elapsed: Duration,
}

/// 相机控制：预设视角、动画插值、网格与裁剪面。
#[derive(Debug, Clone)]
pub struct ViewController {
    pose: CameraPose,
    animation: Option<CameraAnimation>,
    grid: GridSpec,
    near: f64,
    far: f64,
    reference_z: f64,
}

impl Default for ViewController {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewController {
    pub fn new() -> Self {
        Self {
            pose: CameraPose::default(),
            animation: None,
            grid: GridSpec::default(),
            near: 0.1,
            far: 10_000.0,
            reference_z: 0.0,
        }
    }

    #[inline]
    pub fn pose(&self) -> CameraPose {
        self.pose
    }

    #[inline]
    pub fn grid(&self) -> GridSpec {
        self.grid
    }

    #[inline]
    pub fn clip_planes(&self) -> (f64, f64) {
        (self.near, self.far)
    }

    /// 放置节点时射线投射的参考平面高度。
    #[inline]
    pub fn reference_z(&self) -> f64 {
        self.reference_z
    }

    #[inline]
    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    /// 动画目标位姿；没有动画时为当前位姿。
    pub fn target_pose(&self) -> CameraPose {
        self.animation.map(|anim| anim.to).unwrap_or(self.pose)
    }

    /// 直接设置位姿（例如轨道控制拖拽），会取消正在进行的动画。
    pub fn set_pose(&mut self, pose: CameraPose) {
        self.animation = None;
        self.pose = pose;
    }

    /// 计算预设视角并开始动画。`Fit` 同时更新裁剪面、网格与参考平面。
    pub fn apply_preset(&mut self, model: &Model, preset: ViewPreset) -> CameraPose {
        let framing = Framing::of(model);
        let c = framing.center;
        let dist = framing.distance;
        let position = match preset {
            ViewPreset::Fit => DVec3::new(c.x + dist * 0.6, c.y - dist * 0.6, c.z + dist * 0.5),
            ViewPreset::Top => DVec3::new(c.x, c.y, c.z + dist),
            ViewPreset::Front => DVec3::new(c.x, c.y - dist, c.z),
            ViewPreset::Right => DVec3::new(c.x + dist, c.y, c.z),
            ViewPreset::Iso => {
                let d = dist / 3f64.sqrt();
                DVec3::new(c.x + d, c.y - d, c.z + d)
            }
        };
        let target = CameraPose {
            position,
            target: c,
        };

        if preset == ViewPreset::Fit {
            self.near = framing.max_dim * 1e-4;
            self.far = framing.max_dim * 100.0;
            self.update_grid(&framing);
        }
        self.animate_to(target);
        debug!(preset = preset.label(), distance = dist, "相机预设视角");
        target
    }

    /// 从当前位姿开始新的动画，替换之前未完成的动画。
    pub fn animate_to(&mut self, target: CameraPose) {
        self.animation = Some(CameraAnimation {
            from: self.pose,
            to: target,
            elapsed: Duration::ZERO,
        });
    }

    /// 推进动画，返回动画是否仍在进行。
    pub fn advance(&mut self, dt: Duration) -> bool {
        let Some(mut animation) = self.animation else {
            return false;
        };
        animation.elapsed += dt;
        let t = (animation.elapsed.as_secs_f64() / ANIMATION_DURATION.as_secs_f64()).min(1.0);
        if t >= 1.0 {
            self.pose = animation.to;
            self.animation = None;
            false
        } else {
            self.pose = animation.from.lerp(&animation.to, ease_in_out(t));
            self.animation = Some(animation);
            true
        }
    }

    fn update_grid(&mut self, framing: &Framing) {
        let size = (framing.max_dim * 3.0).ceil();
        let divisions = (size.ceil() as u32).clamp(MIN_GRID_DIVISIONS, MAX_GRID_DIVISIONS);
        self.grid = GridSpec {
            size,
            divisions,
            center: DVec3::new(framing.center.x, framing.center.y, 0.0),
        };
        self.reference_z = framing.center.z;
    }
}
