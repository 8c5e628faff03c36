use std::collections::HashMap;
use std::path::Path;

use bevy::asset::RenderAssetUsages;
use bevy::input::ButtonInput;
use bevy::input::mouse::{MouseMotion, MouseScrollUnit, MouseWheel};
use bevy::prelude::*;
use bevy::render::render_resource::PrimitiveTopology;
use bevy::window::{PresentMode, PrimaryWindow};
use bevy_egui::{EguiContexts, EguiPlugin, egui};
use fhed_core::geometry::{Point3, Vector3};
use fhed_engine::Editor;
use fhed_engine::command::{CommandBus, CommandContext, CommandRequest};
use fhed_engine::interaction::{InputEvent, InteractionMode};
use fhed_engine::scene::{DisplayOptions, Rgb, palette};
use fhed_engine::view::{CameraPose, ViewPreset};
use fhed_io::{DocumentSaver, InpFacade};
use glam::DVec3;
use tracing::{info, trace, warn};

use crate::loader::{DocumentSource, LoadedSession};

const DOUBLE_CLICK_SECS: f64 = 0.3;
const ORBIT_SPEED: f64 = 0.005;
const EXPORT_FILE: &str = "model.inp";

#[derive(Resource)]
struct EditorResource {
    editor: Editor,
    source: DocumentSource,
    last_command_feedback: Option<String>,
}

#[derive(Resource)]
struct CommandBusResource(CommandBus);

#[derive(Component)]
struct MainCamera;

/// 由场景帧生成的渲染实体，重建时整体销毁。
#[derive(Component)]
struct SceneVisual;

#[derive(Component)]
struct NodeVisual(usize);

#[derive(Component)]
struct SegmentVisual(usize);

#[derive(Component)]
struct PlaneVisual(usize);

#[derive(Resource, Clone)]
struct SharedMeshes {
    sphere: Handle<Mesh>,
    cube: Handle<Mesh>,
}

#[derive(Resource, Default)]
struct RenderedRevision(Option<u64>);

#[derive(Resource, Default)]
struct PointerState {
    over_ui: bool,
    last_click: Option<f64>,
    last_cursor: Option<Vec2>,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct MaterialKey {
    color: Rgb,
    alpha: u8,
    emissive: Rgb,
    unlit: bool,
}

/// 按颜色/透明度复用材质，同色实例共享同一材质以便批量绘制。
#[derive(Resource, Default)]
struct MaterialCache {
    entries: HashMap<MaterialKey, Handle<StandardMaterial>>,
}

impl MaterialCache {
    fn get_or_insert(
        &mut self,
        materials: &mut Assets<StandardMaterial>,
        key: MaterialKey,
    ) -> Handle<StandardMaterial> {
        self.entries
            .entry(key)
            .or_insert_with(|| materials.add(build_material(key)))
            .clone()
    }
}

fn build_material(key: MaterialKey) -> StandardMaterial {
    let [r, g, b] = key.color.to_f32();
    let alpha = f32::from(key.alpha) / 255.0;
    let [er, eg, eb] = key.emissive.to_f32();
    StandardMaterial {
        base_color: Color::srgba(r, g, b, alpha),
        emissive: LinearRgba::rgb(er, eg, eb),
        alpha_mode: if key.alpha < u8::MAX {
            AlphaMode::Blend
        } else {
            AlphaMode::Opaque
        },
        unlit: key.unlit,
        double_sided: true,
        cull_mode: None,
        ..default()
    }
}

fn alpha_byte(opacity: f32) -> u8 {
    (opacity.clamp(0.0, 1.0) * 255.0).round() as u8
}

pub fn launch(title: &str, session: LoadedSession) {
    App::new()
        .insert_resource(EditorResource {
            editor: session.editor,
            source: session.source,
            last_command_feedback: None,
        })
        .insert_resource(CommandBusResource(CommandBus::new()))
        .insert_resource(RenderedRevision::default())
        .insert_resource(PointerState::default())
        .insert_resource(MaterialCache::default())
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: title.into(),
                present_mode: PresentMode::AutoVsync,
                ..default()
            }),
            ..default()
        }))
        .add_plugins(EguiPlugin::default())
        .add_systems(Startup, setup_camera)
        .add_systems(Startup, setup_shared_meshes)
        .add_systems(Update, handle_keyboard_commands)
        .add_systems(Update, handle_pointer)
        .add_systems(Update, handle_zoom)
        .add_systems(Update, handle_orbit_and_pan)
        .add_systems(Update, advance_camera)
        .add_systems(Update, rebuild_scene_entities)
        .add_systems(Update, sync_materials.after(rebuild_scene_entities))
        .add_systems(Update, draw_grid)
        .add_systems(Update, egui_overlay)
        .run();
}

fn setup_camera(mut commands: Commands, editor_res: Res<EditorResource>) {
    let view = editor_res.editor.view();
    let (near, far) = view.clip_planes();
    commands.spawn((
        Camera3d::default(),
        MainCamera,
        Projection::Perspective(PerspectiveProjection {
            near: near as f32,
            far: far as f32,
            ..default()
        }),
        pose_transform(view.pose()),
    ));
    commands.spawn((
        DirectionalLight {
            illuminance: 8_000.0,
            ..default()
        },
        Transform::from_xyz(1.0, -1.0, 2.0).looking_at(Vec3::ZERO, Vec3::Z),
    ));
    commands.spawn((
        DirectionalLight {
            illuminance: 3_000.0,
            ..default()
        },
        Transform::from_xyz(-1.0, 1.0, -0.5).looking_at(Vec3::ZERO, Vec3::Z),
    ));
}

fn setup_shared_meshes(mut commands: Commands, mut meshes: ResMut<Assets<Mesh>>) {
    let sphere = meshes.add(Sphere::new(1.0));
    let cube = meshes.add(Cuboid::new(1.0, 1.0, 1.0));
    commands.insert_resource(SharedMeshes { sphere, cube });
}

fn pose_transform(pose: CameraPose) -> Transform {
    Transform::from_translation(pose.position.as_vec3()).looking_at(pose.target.as_vec3(), Vec3::Z)
}

/// 场景修订号变化时销毁并重新生成全部渲染实体。
fn rebuild_scene_entities(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut cache: ResMut<MaterialCache>,
    mut rendered: ResMut<RenderedRevision>,
    shared: Res<SharedMeshes>,
    editor_res: Res<EditorResource>,
    visuals: Query<Entity, With<SceneVisual>>,
) {
    let scene = editor_res.editor.scene();
    if rendered.0 == Some(scene.revision()) {
        return;
    }
    rendered.0 = Some(scene.revision());
    for entity in visuals.iter() {
        commands.entity(entity).despawn();
    }

    let frame = scene.frame();
    for (index, node) in frame.nodes.iter().enumerate() {
        let material = cache.get_or_insert(
            &mut materials,
            MaterialKey {
                color: node.color,
                alpha: u8::MAX,
                emissive: palette::NO_EMISSIVE,
                unlit: false,
            },
        );
        commands.spawn((
            SceneVisual,
            NodeVisual(index),
            Mesh3d(shared.sphere.clone()),
            MeshMaterial3d(material),
            Transform::from_translation(node.center.as_vec3()).with_scale(Vec3::splat(node.radius as f32)),
        ));
    }

    for (index, segment) in frame.segments.iter().enumerate() {
        let material = cache.get_or_insert(
            &mut materials,
            MaterialKey {
                color: segment.color,
                alpha: alpha_byte(frame.segment_opacity),
                emissive: palette::NO_EMISSIVE,
                unlit: false,
            },
        );
        commands.spawn((
            SceneVisual,
            SegmentVisual(index),
            Mesh3d(shared.cube.clone()),
            MeshMaterial3d(material),
            Transform::from_matrix(segment.transform.as_mat4()),
        ));
    }
    let edges: Vec<(DVec3, DVec3)> = frame.segments.iter().flat_map(|s| s.edges()).collect();
    spawn_lines(&mut commands, &mut meshes, &mut materials, &mut cache, &edges, palette::SEGMENT_EDGE);

    for (index, plane) in frame.planes.iter().enumerate() {
        let mut mesh = Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::RENDER_WORLD);
        let positions: Vec<[f32; 3]> = plane
            .triangles()
            .iter()
            .flatten()
            .map(|p| p.as_vec3().to_array())
            .collect();
        let normal = (plane.corners[1] - plane.corners[0])
            .cross(plane.corners[2] - plane.corners[1])
            .normalize_or_zero()
            .as_vec3()
            .to_array();
        mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, vec![normal; positions.len()]);
        mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
        let material = cache.get_or_insert(
            &mut materials,
            MaterialKey {
                color: palette::PLANE,
                alpha: alpha_byte(frame.plane_opacity),
                emissive: plane.emissive,
                unlit: false,
            },
        );
        commands.spawn((
            SceneVisual,
            PlaneVisual(index),
            Mesh3d(meshes.add(mesh)),
            MeshMaterial3d(material),
            Transform::IDENTITY,
        ));
    }
    let outlines: Vec<(DVec3, DVec3)> = frame.planes.iter().flat_map(|p| p.outline()).collect();
    spawn_lines(&mut commands, &mut meshes, &mut materials, &mut cache, &outlines, palette::PLANE);

    let ports: Vec<(DVec3, DVec3)> = frame.ports.iter().map(|p| (p.start, p.end)).collect();
    spawn_lines(&mut commands, &mut meshes, &mut materials, &mut cache, &ports, palette::PORT);

    trace!(
        revision = scene.revision(),
        nodes = frame.nodes.len(),
        segments = frame.segments.len(),
        "已重新生成渲染实体"
    );
}

fn spawn_lines(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    cache: &mut MaterialCache,
    lines: &[(DVec3, DVec3)],
    color: Rgb,
) {
    if lines.is_empty() {
        return;
    }
    let mut mesh = Mesh::new(PrimitiveTopology::LineList, RenderAssetUsages::RENDER_WORLD);
    let positions: Vec<[f32; 3]> = lines
        .iter()
        .flat_map(|(a, b)| [a.as_vec3().to_array(), b.as_vec3().to_array()])
        .collect();
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    let material = cache.get_or_insert(
        materials,
        MaterialKey {
            color,
            alpha: u8::MAX,
            emissive: palette::NO_EMISSIVE,
            unlit: true,
        },
    );
    commands.spawn((
        SceneVisual,
        Mesh3d(meshes.add(mesh)),
        MeshMaterial3d(material),
        Transform::IDENTITY,
    ));
}

/// 高亮与外观选项只改变颜色，不触发重建：逐实例替换材质句柄。
fn sync_materials(
    editor_res: Res<EditorResource>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut cache: ResMut<MaterialCache>,
    mut nodes: Query<(&NodeVisual, &mut MeshMaterial3d<StandardMaterial>), (Without<SegmentVisual>, Without<PlaneVisual>)>,
    mut segments: Query<(&SegmentVisual, &mut MeshMaterial3d<StandardMaterial>), (Without<NodeVisual>, Without<PlaneVisual>)>,
    mut planes: Query<(&PlaneVisual, &mut MeshMaterial3d<StandardMaterial>), (Without<NodeVisual>, Without<SegmentVisual>)>,
) {
    if !editor_res.is_changed() {
        return;
    }
    let frame = editor_res.editor.scene().frame();
    let mut assign = |material: &mut Mut<MeshMaterial3d<StandardMaterial>>, key: MaterialKey| {
        let handle = cache.get_or_insert(&mut materials, key);
        if material.0 != handle {
            material.0 = handle;
        }
    };

    for (visual, mut material) in nodes.iter_mut() {
        if let Some(node) = frame.nodes.get(visual.0) {
            let key = MaterialKey {
                color: node.color,
                alpha: u8::MAX,
                emissive: palette::NO_EMISSIVE,
                unlit: false,
            };
            assign(&mut material, key);
        }
    }
    for (visual, mut material) in segments.iter_mut() {
        if let Some(segment) = frame.segments.get(visual.0) {
            let key = MaterialKey {
                color: segment.color,
                alpha: alpha_byte(frame.segment_opacity),
                emissive: palette::NO_EMISSIVE,
                unlit: false,
            };
            assign(&mut material, key);
        }
    }
    for (visual, mut material) in planes.iter_mut() {
        if let Some(plane) = frame.planes.get(visual.0) {
            let key = MaterialKey {
                color: palette::PLANE,
                alpha: alpha_byte(frame.plane_opacity),
                emissive: plane.emissive,
                unlit: false,
            };
            assign(&mut material, key);
        }
    }
}

fn advance_camera(
    time: Res<Time>,
    mut editor_res: ResMut<EditorResource>,
    mut query: Query<(&mut Transform, &mut Projection), With<MainCamera>>,
) {
    if editor_res.editor.view().is_animating() {
        editor_res.editor.tick(time.delta());
    }
    let view = editor_res.editor.view();
    let (near, far) = view.clip_planes();
    if let Ok((mut transform, mut projection)) = query.single_mut() {
        let target = pose_transform(view.pose());
        if *transform != target {
            *transform = target;
        }
        let stale = matches!(
            &*projection,
            Projection::Perspective(perspective)
                if perspective.near != near as f32 || perspective.far != far as f32
        );
        if stale {
            if let Projection::Perspective(perspective) = &mut *projection {
                perspective.near = near as f32;
                perspective.far = far as f32;
            }
        }
    }
}

fn draw_grid(mut gizmos: Gizmos, editor_res: Res<EditorResource>) {
    if !editor_res.editor.scene().frame().grid_visible {
        return;
    }
    let grid = editor_res.editor.view().grid();
    let cell = (grid.size / f64::from(grid.divisions)) as f32;
    gizmos.grid(
        Isometry3d::from_translation(grid.center.as_vec3()),
        UVec2::splat(grid.divisions),
        Vec2::splat(cell),
        Color::srgba(0.4, 0.45, 0.5, 0.35),
    );
}

fn cursor_ray(
    window: &Window,
    camera: &Camera,
    camera_transform: &GlobalTransform,
) -> Option<fhed_core::geometry::Ray3> {
    let cursor = window.cursor_position()?;
    let ray = camera.viewport_to_world(camera_transform, cursor).ok()?;
    let origin = ray.origin.as_dvec3();
    let direction = ray.direction.as_vec3().as_dvec3();
    Some(fhed_core::geometry::Ray3::new(
        Point3::from_vec(origin),
        Vector3::new(direction.x, direction.y, direction.z),
    ))
}

fn handle_pointer(
    time: Res<Time>,
    buttons: Res<ButtonInput<MouseButton>>,
    windows: Query<&Window, With<PrimaryWindow>>,
    cameras: Query<(&Camera, &GlobalTransform), With<MainCamera>>,
    mut pointer: ResMut<PointerState>,
    mut editor_res: ResMut<EditorResource>,
) {
    if pointer.over_ui {
        return;
    }
    let (Ok(window), Ok((camera, camera_transform))) = (windows.single(), cameras.single()) else {
        return;
    };
    let Some(ray) = cursor_ray(window, camera, camera_transform) else {
        return;
    };

    let cursor = window.cursor_position();
    if cursor != pointer.last_cursor {
        pointer.last_cursor = cursor;
        if editor_res.editor.mode() == InteractionMode::PlaceNode {
            editor_res.editor.handle_input(InputEvent::PointerMove(ray));
        }
    }

    if buttons.just_pressed(MouseButton::Left) {
        let now = time.elapsed_secs_f64();
        editor_res.editor.handle_input(InputEvent::Click(ray));
        let is_double = pointer
            .last_click
            .is_some_and(|last| now - last <= DOUBLE_CLICK_SECS);
        if is_double {
            editor_res.editor.handle_input(InputEvent::DoubleClick(ray));
            pointer.last_click = None;
        } else {
            pointer.last_click = Some(now);
        }
    }
}

fn handle_zoom(
    mut events: MessageReader<MouseWheel>,
    pointer: Res<PointerState>,
    mut editor_res: ResMut<EditorResource>,
) {
    let mut scale_delta = 1.0f64;
    for event in events.read() {
        let scroll_amount = if event.unit == MouseScrollUnit::Line {
            f64::from(event.y) * 0.1
        } else {
            f64::from(event.y) * 0.02
        };
        scale_delta *= (1.0 - scroll_amount).clamp(0.2, 5.0);
    }
    if pointer.over_ui || (scale_delta - 1.0).abs() < f64::EPSILON {
        return;
    }

    let pose = editor_res.editor.view().pose();
    let offset = pose.position - pose.target;
    editor_res.editor.set_camera_pose(CameraPose {
        position: pose.target + offset * scale_delta,
        target: pose.target,
    });
}

/// 右键拖动绕目标旋转，中键拖动平移。
fn handle_orbit_and_pan(
    buttons: Res<ButtonInput<MouseButton>>,
    mut motion_events: MessageReader<MouseMotion>,
    pointer: Res<PointerState>,
    mut editor_res: ResMut<EditorResource>,
) {
    let mut delta = Vec2::ZERO;
    for motion in motion_events.read() {
        delta += motion.delta;
    }
    if delta == Vec2::ZERO || pointer.over_ui {
        return;
    }
    let orbit = buttons.pressed(MouseButton::Right);
    let pan = buttons.pressed(MouseButton::Middle);
    if !orbit && !pan {
        return;
    }

    let pose = editor_res.editor.view().pose();
    let offset = pose.position - pose.target;
    let next = if orbit {
        let radius = offset.length();
        let yaw = offset.y.atan2(offset.x) - f64::from(delta.x) * ORBIT_SPEED;
        let pitch = (offset.z / radius.max(f64::EPSILON)).clamp(-1.0, 1.0).asin()
            + f64::from(delta.y) * ORBIT_SPEED;
        let pitch = pitch.clamp(-1.55, 1.55);
        let offset = DVec3::new(
            radius * pitch.cos() * yaw.cos(),
            radius * pitch.cos() * yaw.sin(),
            radius * pitch.sin(),
        );
        CameraPose {
            position: pose.target + offset,
            target: pose.target,
        }
    } else {
        let forward = (-offset).normalize_or_zero();
        let right = forward.cross(DVec3::Z).normalize_or_zero();
        let up = right.cross(forward);
        let scale = offset.length() * 0.0015;
        let shift = (-right * f64::from(delta.x) + up * f64::from(delta.y)) * scale;
        CameraPose {
            position: pose.position + shift,
            target: pose.target + shift,
        }
    };
    editor_res.editor.set_camera_pose(next);
}

fn handle_keyboard_commands(
    keys: Res<ButtonInput<KeyCode>>,
    pointer: Res<PointerState>,
    mut editor_res: ResMut<EditorResource>,
    command_bus: Res<CommandBusResource>,
) {
    if pointer.over_ui {
        return;
    }
    let mut triggered = Vec::new();
    if keys.just_pressed(KeyCode::KeyF) {
        triggered.push("fit_view");
    }
    if keys.just_pressed(KeyCode::Escape) {
        triggered.push("cancel");
    }
    if keys.just_pressed(KeyCode::Delete) {
        triggered.push("delete_selection");
    }

    for name in triggered {
        dispatch_command(&command_bus.0, &mut editor_res, name);
    }
}

fn dispatch_command(command_bus: &CommandBus, editor_res: &mut EditorResource, name: &str) {
    let request = CommandRequest::new(name);
    let mut context = CommandContext {
        editor: &mut editor_res.editor,
    };
    let response = command_bus.dispatch(&request, &mut context);
    let message = response
        .message
        .unwrap_or_else(|| format!("命令 {name} 已执行"));
    if response.success {
        info!(command = name, %message, "命令执行成功");
    } else {
        warn!(command = name, %message, "命令执行失败");
    }
    editor_res.last_command_feedback = Some(message);
}

fn export_model(editor: &Editor) -> String {
    let path = Path::new(EXPORT_FILE);
    match InpFacade::new().save(editor.model(), path) {
        Ok(()) => format!("已写出 {}", path.display()),
        Err(err) => {
            warn!(error = %err, "写出模型失败");
            err.to_string()
        }
    }
}

fn egui_overlay(
    mut contexts: EguiContexts,
    mut editor_res: ResMut<EditorResource>,
    mut pointer: ResMut<PointerState>,
    command_bus: Res<CommandBusResource>,
    cameras: Query<(&Camera, &GlobalTransform), With<MainCamera>>,
) {
    let Ok(ctx) = contexts.ctx_mut() else {
        return;
    };

    let frame = editor_res.editor.scene().frame();
    if frame.labels_visible {
        if let Ok((camera, camera_transform)) = cameras.single() {
            let painter = ctx.layer_painter(egui::LayerId::background());
            let [r, g, b] = [palette::LABEL.r, palette::LABEL.g, palette::LABEL.b];
            for label in &frame.labels {
                let Ok(screen) = camera.world_to_viewport(camera_transform, label.position.as_vec3())
                else {
                    continue;
                };
                painter.text(
                    egui::pos2(screen.x, screen.y),
                    egui::Align2::CENTER_BOTTOM,
                    &label.text,
                    egui::FontId::proportional(12.0 * label.scale as f32),
                    egui::Color32::from_rgb(r, g, b),
                );
            }
        }
    }

    let source_label = match &editor_res.source {
        DocumentSource::File(path) => format!("文件: {}", path.display()),
        DocumentSource::Demo => "内置示例".to_string(),
    };
    let mut requested_mode = None;
    let mut requested_view = None;
    let mut requested_command = None;
    let mut export_requested = false;
    let mut display: DisplayOptions = *editor_res.editor.scene().options();

    egui::Window::new("FastHenry 模型编辑器").show(ctx, |ui| {
        let editor = &editor_res.editor;
        let model = editor.model();
        ui.label(format!("文档来源：{source_label}"));
        ui.label(format!(
            "节点 {} · 导体段 {} · 接地平面 {} · 端口 {}",
            model.nodes().len(),
            model.segments().len(),
            model.ground_planes().len(),
            model.externals().len()
        ));

        ui.separator();
        ui.horizontal(|ui| {
            for mode in [
                InteractionMode::Select,
                InteractionMode::PlaceNode,
                InteractionMode::ConnectSegment,
            ] {
                if ui.selectable_label(editor.mode() == mode, mode.label()).clicked() {
                    requested_mode = Some(mode);
                }
            }
        });
        ui.horizontal(|ui| {
            for preset in [
                ViewPreset::Fit,
                ViewPreset::Top,
                ViewPreset::Front,
                ViewPreset::Right,
                ViewPreset::Iso,
            ] {
                if ui.button(preset.label()).clicked() {
                    requested_view = Some(preset);
                }
            }
        });
        ui.horizontal(|ui| {
            if ui.button("删除选中").clicked() {
                requested_command = Some("delete_selection");
            }
            if ui.button("导出 .inp").clicked() {
                export_requested = true;
            }
        });

        ui.separator();
        ui.add(egui::Slider::new(&mut display.node_size, 0.2..=5.0).text("节点尺寸"));
        ui.add(egui::Slider::new(&mut display.label_size, 0.5..=3.0).text("标签尺寸"));
        ui.add(egui::Slider::new(&mut display.segment_opacity, 0.05..=1.0).text("导体段不透明度"));
        ui.add(egui::Slider::new(&mut display.plane_opacity, 0.05..=1.0).text("平面不透明度"));
        ui.checkbox(&mut display.show_labels, "显示标签");
        ui.checkbox(&mut display.show_grid, "显示网格");

        ui.separator();
        if let Some(selected) = editor.scene().selection() {
            ui.label(format!("选中：{} {}", selected.kind(), selected.name()));
        }
        if let Some(hover) = editor.hover() {
            ui.monospace(format!("({:.3}, {:.3}, {:.3})", hover.x, hover.y, hover.z));
        }
        ui.label(format!("状态：{}", editor.status()));
        if let Some(feedback) = &editor_res.last_command_feedback {
            ui.label(format!("最近命令：{feedback}"));
        }
        let commands: Vec<&str> = command_bus.0.available_commands().copied().collect();
        ui.collapsing("可用命令", |ui| {
            ui.label(commands.join(", "));
        });
    });

    pointer.over_ui = ctx.wants_pointer_input() || ctx.is_pointer_over_area();

    if let Some(mode) = requested_mode {
        editor_res.editor.set_mode(mode);
    }
    if let Some(preset) = requested_view {
        editor_res.editor.apply_view(preset);
    }
    if let Some(name) = requested_command {
        dispatch_command(&command_bus.0, &mut editor_res, name);
    }
    if export_requested {
        let message = export_model(&editor_res.editor);
        editor_res.last_command_feedback = Some(message);
    }
    if display != *editor_res.editor.scene().options() {
        editor_res.editor.update_display(display);
    }
}
