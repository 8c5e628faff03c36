use std::time::Duration;

use fhed_core::document::{
    Defaults, GeometryImport, GroundPlaneDraft, Model, ModelError, NodeUpdate, SegmentOverrides,
    SegmentUpdate,
};
use fhed_core::geometry::Point3;
use fhed_core::units::parse_eng_value;
use fhed_io::{parse_inp, write_inp};
use glam::DVec3;
use tracing::{debug, info, warn};

use crate::backend::{BusyGate, SolverOptions, SolverOutcome, SolverRequest};
use crate::errors::EngineError;
use crate::interaction::{Effect, InputEvent, InteractionController, InteractionMode, PlacementContext};
use crate::scene::{DisplayOptions, DisplayUpdate, EntityKey, SceneSync};
use crate::view::{CameraPose, ViewController, ViewPreset, snap_step};

/// 内置演示模型：接地平面上方的两条导线，远端短接，近端一个端口。
pub const DEMO_DOCUMENT: &str = "\
* Demo: two traces over a ground plane
.units mm
.default sigma=5.8e4 nhinc=1 nwinc=1 rh=2 rw=2
g1 x1=-5 y1=-5 z1=-1 x2=25 y2=-5 z2=-1 x3=25 y3=10 z3=-1
+ thick=0.1 seg1=30 seg2=15
+ ngnd (0,-5,-1)
n1 x=0 y=0 z=0
n2 x=20 y=0 z=0
n3 x=0 y=5 z=0
n4 x=20 y=5 z=0
e1 n1 n2 w=1 h=0.5
e2 n3 n4 w=0.5 h=0.5
.equiv n2 n4
.external n1 n3 port1
.freq fmin=1e4 fmax=1e8 ndec=1
.end
";

const READY: &str = "Ready";

/// 编辑会话：持有模型及其派生的场景、交互与视图状态。
///
/// 所有修改都同步执行，修改后立即重建场景；失败时模型保持不变，
/// 错误文本写入状态栏。
#[derive(Debug)]
pub struct Editor {
    model: Model,
    scene: SceneSync,
    interaction: InteractionController,
    view: ViewController,
    solver_options: SolverOptions,
    last_outcome: Option<SolverOutcome>,
    status: String,
    hover: Option<DVec3>,
    solver_gate: BusyGate,
    import_gate: BusyGate,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(DisplayOptions::default())
    }
}

impl Editor {
    pub fn new(display: DisplayOptions) -> Self {
        let model = Model::new();
        let mut scene = SceneSync::new(display);
        scene.rebuild(&model);
        Self {
            model,
            scene,
            interaction: InteractionController::new(),
            view: ViewController::new(),
            solver_options: SolverOptions::default(),
            last_outcome: None,
            status: READY.to_string(),
            hover: None,
            solver_gate: BusyGate::new("solver run"),
            import_gate: BusyGate::new("geometry import"),
        }
    }

    /// 使用现有模型创建会话并适配视图。
    pub fn with_model(model: Model, display: DisplayOptions) -> Self {
        let mut editor = Self::new(display);
        editor.replace_model(model);
        editor
    }

    #[inline]
    pub fn model(&self) -> &Model {
        &self.model
    }

    #[inline]
    pub fn scene(&self) -> &SceneSync {
        &self.scene
    }

    #[inline]
    pub fn view(&self) -> &ViewController {
        &self.view
    }

    #[inline]
    pub fn mode(&self) -> InteractionMode {
        self.interaction.mode()
    }

    #[inline]
    pub fn status(&self) -> &str {
        &self.status
    }

    /// 放置模式下指针对应的吸附坐标。
    #[inline]
    pub fn hover(&self) -> Option<DVec3> {
        self.hover
    }

    #[inline]
    pub fn solver_options(&self) -> &SolverOptions {
        &self.solver_options
    }

    pub fn set_solver_options(&mut self, options: SolverOptions) {
        self.solver_options = options;
    }

    #[inline]
    pub fn last_outcome(&self) -> Option<&SolverOutcome> {
        self.last_outcome.as_ref()
    }

    #[inline]
    pub fn is_solver_busy(&self) -> bool {
        self.solver_gate.is_busy()
    }

    #[inline]
    pub fn is_import_busy(&self) -> bool {
        self.import_gate.is_busy()
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
        info!(status = %self.status, "状态更新");
    }

    fn refresh(&mut self) {
        self.scene.rebuild(&self.model);
    }

    /// 记录失败原因后把错误交给调用方，模型保持不变。
    fn reject(&mut self, err: ModelError) -> EngineError {
        self.set_status(err.to_string());
        EngineError::Model(err)
    }

    fn replace_model(&mut self, model: Model) {
        self.model = model;
        self.scene.clear_highlights();
        self.hover = None;
        self.refresh();
        self.view.apply_preset(&self.model, ViewPreset::Fit);
    }

    pub fn add_node(&mut self, name: Option<&str>, position: Point3) -> Result<String, EngineError> {
        let name = self
            .model
            .add_node(name, position)
            .map_err(|err| self.reject(err))?;
        self.refresh();
        self.set_status(format!(
            "Added node {name} at ({}, {}, {})",
            position.x(),
            position.y(),
            position.z()
        ));
        Ok(name)
    }

    pub fn update_node(&mut self, name: &str, update: NodeUpdate) -> Result<(), EngineError> {
        let display_name = update.name.clone().unwrap_or_else(|| name.to_lowercase());
        self.model
            .update_node(name, update)
            .map_err(|err| self.reject(err))?;
        self.refresh();
        self.set_status(format!("Updated node {}", display_name.to_lowercase()));
        Ok(())
    }

    pub fn remove_node(&mut self, name: &str) -> Result<(), EngineError> {
        let removed = self.model.remove_node(name).map_err(|err| self.reject(err))?;
        self.refresh();
        self.set_status(format!("Deleted node {}", removed.name));
        Ok(())
    }

    pub fn add_segment(
        &mut self,
        node1: &str,
        node2: &str,
        overrides: SegmentOverrides,
    ) -> Result<String, EngineError> {
        let name = self
            .model
            .add_segment(node1, node2, overrides)
            .map_err(|err| self.reject(err))?;
        self.refresh();
        self.set_status(format!(
            "Added segment {name}: {} → {}",
            node1.to_lowercase(),
            node2.to_lowercase()
        ));
        Ok(name)
    }

    pub fn update_segment(&mut self, name: &str, update: SegmentUpdate) -> Result<(), EngineError> {
        self.model
            .update_segment(name, update)
            .map_err(|err| self.reject(err))?;
        self.refresh();
        self.set_status(format!("Updated segment {}", name.to_lowercase()));
        Ok(())
    }

    pub fn remove_segment(&mut self, name: &str) -> Result<(), EngineError> {
        let removed = self
            .model
            .remove_segment(name)
            .map_err(|err| self.reject(err))?;
        self.refresh();
        self.set_status(format!("Deleted segment {}", removed.name));
        Ok(())
    }

    pub fn add_ground_plane(&mut self, draft: GroundPlaneDraft) -> String {
        let name = self.model.add_ground_plane(draft);
        self.refresh();
        self.set_status(format!("Added ground plane {name}"));
        name
    }

    pub fn remove_ground_plane(&mut self, name: &str) -> Result<(), EngineError> {
        let removed = self
            .model
            .remove_ground_plane(name)
            .map_err(|err| self.reject(err))?;
        self.refresh();
        self.set_status(format!("Deleted ground plane {}", removed.name));
        Ok(())
    }

    pub fn add_external(
        &mut self,
        node1: &str,
        node2: &str,
        port_name: Option<&str>,
    ) -> Result<(), EngineError> {
        self.model
            .add_external(node1, node2, port_name)
            .map_err(|err| self.reject(err))?;
        self.refresh();
        self.set_status(format!(
            "Added external port: {} → {}",
            node1.to_lowercase(),
            node2.to_lowercase()
        ));
        Ok(())
    }

    pub fn remove_external(&mut self, index: usize) -> Result<(), EngineError> {
        let removed = self
            .model
            .remove_external(index)
            .map_err(|err| self.reject(err))?;
        self.refresh();
        self.set_status(format!(
            "Deleted external port: {} → {}",
            removed.node1, removed.node2
        ));
        Ok(())
    }

    pub fn add_equiv(&mut self, nodes: &[&str]) -> Result<(), EngineError> {
        self.model
            .add_equiv(nodes.iter().copied())
            .map_err(|err| self.reject(err))?;
        self.refresh();
        self.set_status(format!("Added equiv: {}", nodes.join(" ")));
        Ok(())
    }

    pub fn remove_equiv(&mut self, index: usize) -> Result<(), EngineError> {
        let removed = self
            .model
            .remove_equiv(index)
            .map_err(|err| self.reject(err))?;
        self.refresh();
        self.set_status(format!("Deleted equiv: {}", removed.nodes.join(" ")));
        Ok(())
    }

    /// 修改全局默认参数；默认线宽/线高会影响导体段的渲染尺寸。
    pub fn set_defaults(&mut self, defaults: Defaults) {
        self.model.defaults = defaults;
        self.refresh();
    }

    pub fn set_title(&mut self, title: &str) {
        self.model.title = title.trim().to_string();
    }

    /// 从用户输入的文本设置频率扫描，支持 `10k`、`1G` 这样的写法。
    pub fn set_frequency(&mut self, fmin: &str, fmax: &str, ndec: &str) -> Result<(), EngineError> {
        let parse = |field: &'static str, raw: &str| {
            parse_eng_value(raw).ok_or_else(|| EngineError::InvalidValue {
                field,
                value: raw.to_string(),
            })
        };
        let parsed = parse("fmin", fmin)
            .and_then(|fmin| Ok((fmin, parse("fmax", fmax)?, parse("ndec", ndec)?)));
        match parsed {
            Ok((fmin, fmax, ndec)) => {
                self.model.freq.fmin = fmin;
                self.model.freq.fmax = fmax;
                self.model.freq.ndec = ndec;
                Ok(())
            }
            Err(err) => {
                self.set_status(err.to_string());
                Err(err)
            }
        }
    }

    /// 处理一次输入事件并执行其产生的模型修改。
    pub fn handle_input(&mut self, event: InputEvent) {
        let placement = PlacementContext {
            reference_z: self.view.reference_z(),
            snap_step: snap_step(&self.model),
        };
        let effects = self.interaction.handle(event, &mut self.scene, placement);
        self.apply_effects(effects);
    }

    fn apply_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Selected(key) => {
                    debug!(selected = ?key.as_ref().map(EntityKey::name), "选中变化");
                }
                Effect::CreateNode(point) => {
                    if let Err(err) = self.add_node(None, Point3::from_vec(point)) {
                        warn!(%err, "放置节点失败");
                    }
                }
                Effect::CreateSegment { node1, node2 } => {
                    match self.add_segment(&node1, &node2, SegmentOverrides::default()) {
                        Ok(_) => self.set_status("Segment created."),
                        Err(err) => warn!(%err, "创建导体段失败"),
                    }
                }
                Effect::FitView => self.fit_view(),
                Effect::ModeChanged(mode) => {
                    self.hover = None;
                    debug!(mode = mode.label(), "模式已切换");
                }
                Effect::Hover(point) => self.hover = point,
                Effect::Status(message) => self.set_status(message),
            }
        }
    }

    pub fn set_mode(&mut self, mode: InteractionMode) {
        let effects = self.interaction.set_mode(mode, &mut self.scene);
        self.apply_effects(effects);
    }

    pub fn set_mode_label(&mut self, label: &str) -> Result<InteractionMode, EngineError> {
        let mode = InteractionMode::from_label(label)
            .ok_or_else(|| EngineError::UnknownMode(label.to_string()))?;
        self.set_mode(mode);
        Ok(mode)
    }

    /// 清除选中与待连接端点并回到选择模式。
    pub fn cancel(&mut self) {
        self.handle_input(InputEvent::Cancel);
    }

    /// 直接设置选中实体（例如从列表点击）。返回实体是否存在于场景中。
    pub fn select(&mut self, key: Option<EntityKey>) -> bool {
        self.scene.set_selection(key)
    }

    pub fn clear_selection(&mut self) {
        self.scene.set_selection(None);
    }

    /// 删除当前选中的节点、导体段或接地平面。没有选中时返回 `Ok(false)`。
    pub fn delete_selection(&mut self) -> Result<bool, EngineError> {
        let Some(key) = self.scene.selection().cloned() else {
            self.set_status("Nothing selected");
            return Ok(false);
        };
        match &key {
            EntityKey::Node(name) => self.remove_node(name)?,
            EntityKey::Segment(name) => self.remove_segment(name)?,
            EntityKey::GroundPlane(name) => self.remove_ground_plane(name)?,
        }
        Ok(true)
    }

    pub fn fit_view(&mut self) {
        self.view.apply_preset(&self.model, ViewPreset::Fit);
    }

    pub fn apply_view(&mut self, preset: ViewPreset) {
        self.view.apply_preset(&self.model, preset);
    }

    pub fn apply_view_label(&mut self, label: &str) -> Result<ViewPreset, EngineError> {
        let preset =
            ViewPreset::from_label(label).ok_or_else(|| EngineError::UnknownPreset(label.to_string()))?;
        self.apply_view(preset);
        Ok(preset)
    }

    /// 轨道控制等直接操作相机时调用，会取消进行中的动画。
    pub fn set_camera_pose(&mut self, pose: CameraPose) {
        self.view.set_pose(pose);
    }

    /// 推进相机动画，返回是否仍在动画中。
    pub fn tick(&mut self, dt: Duration) -> bool {
        self.view.advance(dt)
    }

    pub fn update_display(&mut self, options: DisplayOptions) -> DisplayUpdate {
        self.scene.update_display(&self.model, options)
    }

    /// 解析文本文档并整体替换当前模型。
    pub fn import_text(&mut self, text: &str) {
        let model = parse_inp(text);
        let summary = format!(
            "Imported: {} nodes, {} segments, {} ground planes",
            model.nodes().len(),
            model.segments().len(),
            model.ground_planes().len()
        );
        self.replace_model(model);
        self.set_status(summary);
    }

    pub fn export_text(&mut self) -> String {
        let text = write_inp(&self.model);
        self.set_status("Exported model.inp");
        text
    }

    /// 载入内置演示模型。
    pub fn populate_demo(&mut self) {
        self.replace_model(parse_inp(DEMO_DOCUMENT));
        self.set_status("Demo model loaded");
    }

    /// 标记几何导入开始；上一次导入未返回时拒绝。
    pub fn begin_geometry_import(&mut self) -> Result<(), EngineError> {
        self.import_gate.try_begin()?;
        self.set_status("Importing geometry...");
        Ok(())
    }

    pub fn finish_geometry_import(
        &mut self,
        result: Result<GeometryImport, String>,
    ) -> Result<(), EngineError> {
        self.import_gate.finish()?;
        match result {
            Ok(import) => {
                let info = import.info.clone().filter(|info| !info.trim().is_empty());
                let model = Model::from_import(import);
                let summary = info.unwrap_or_else(|| {
                    format!(
                        "{} nodes, {} segments",
                        model.nodes().len(),
                        model.segments().len()
                    )
                });
                self.replace_model(model);
                self.set_status(format!("STEP imported: {summary}"));
            }
            Err(message) => {
                warn!(%message, "几何导入失败");
                self.set_status(format!("STEP import failed: {message}"));
            }
        }
        Ok(())
    }

    /// 生成求解请求并设置忙碌标记。
    pub fn begin_solver_run(&mut self) -> Result<SolverRequest, EngineError> {
        self.solver_gate.try_begin()?;
        self.set_status("Running FastHenry...");
        Ok(SolverRequest {
            document: write_inp(&self.model),
            options: self.solver_options.clone(),
        })
    }

    pub fn finish_solver_run(
        &mut self,
        result: Result<SolverOutcome, String>,
    ) -> Result<(), EngineError> {
        self.solver_gate.finish()?;
        match result {
            Ok(outcome) => {
                if outcome.succeeded() {
                    self.set_status("FastHenry completed successfully");
                } else {
                    self.set_status(format!("FastHenry exited with code {}", outcome.exit_code));
                }
                self.last_outcome = Some(outcome);
            }
            Err(message) => {
                warn!(%message, "求解请求失败");
                self.set_status(format!("Error: {message}"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use fhed_core::document::ImportedNode;
    use fhed_core::geometry::{Ray3, Vector3};

    use super::*;

    fn click_at(x: f64, y: f64) -> InputEvent {
        InputEvent::Click(Ray3::new(
            Point3::new(x, y, 20.0),
            Vector3::new(0.0, 0.0, -1.0),
        ))
    }

    fn demo_editor() -> Editor {
        let mut editor = Editor::default();
        editor.populate_demo();
        editor
    }

    #[test]
    fn demo_model_has_two_conductors_plane_and_port() {
        let editor = demo_editor();
        let model = editor.model();
        assert_eq!(model.segments().len(), 2);
        assert_eq!(model.ground_planes().len(), 1);
        assert_eq!(model.externals().len(), 1);
        assert!(model.node("ngnd").is_some());
        assert_eq!(editor.scene().frame().nodes.len(), 5);
        assert!(editor.view().is_animating());
    }

    #[test]
    fn placing_a_node_snaps_and_reports() {
        let mut editor = Editor::default();
        editor.set_mode(InteractionMode::PlaceNode);
        assert_eq!(editor.status(), "Click on the grid to place a node");

        editor.handle_input(InputEvent::PointerMove(Ray3::new(
            Point3::new(3.2, 4.7, 20.0),
            Vector3::new(0.0, 0.0, -1.0),
        )));
        assert_eq!(editor.hover(), Some(DVec3::new(3.0, 5.0, 0.0)));

        editor.handle_input(click_at(3.2, 4.7));
        assert_eq!(editor.model().nodes().len(), 1);
        assert_eq!(editor.status(), "Added node n1 at (3, 5, 0)");
        assert_eq!(editor.scene().frame().nodes.len(), 1);
    }

    #[test]
    fn connecting_two_nodes_creates_segment() {
        let mut editor = demo_editor();
        editor.set_mode(InteractionMode::ConnectSegment);
        editor.handle_input(click_at(0.0, 0.0));
        assert_eq!(editor.status(), "Segment: first node = n1. Click second node.");
        editor.handle_input(click_at(0.0, 5.0));

        let model = editor.model();
        assert_eq!(model.segments().len(), 3);
        let created = model.segments().last().unwrap();
        assert_eq!((created.node1.as_str(), created.node2.as_str()), ("n1", "n3"));
        assert_eq!(editor.status(), "Segment created.");
        assert_eq!(editor.scene().staged(), None);
    }

    #[test]
    fn failed_edit_reports_and_keeps_model() {
        let mut editor = demo_editor();
        let before = editor.model().clone();
        let err = editor.add_node(Some("n1"), Point3::ORIGIN).unwrap_err();
        assert!(matches!(err, EngineError::Model(ModelError::DuplicateNode(_))));
        assert_eq!(editor.status(), "Node n1 already exists");
        assert_eq!(editor.model(), &before);
    }

    #[test]
    fn port_and_equiv_edits_report_status() {
        let mut editor = demo_editor();
        editor.remove_external(0).unwrap();
        assert_eq!(editor.status(), "Deleted external port: n1 → n3");
        assert!(editor.model().externals().is_empty());

        editor.remove_equiv(0).unwrap();
        assert_eq!(editor.status(), "Deleted equiv: n2 n4");

        editor.add_equiv(&["n1", "n3"]).unwrap();
        assert_eq!(editor.status(), "Added equiv: n1 n3");

        let err = editor.add_external("n1", "n3", Some("my port")).unwrap_err();
        assert!(matches!(err, EngineError::Model(ModelError::InvalidPortName(_))));
        assert_eq!(editor.status(), "Port name my port must be a single token");
        assert!(editor.model().externals().is_empty());

        assert!(editor.remove_equiv(5).is_err());
        assert_eq!(editor.status(), "Equiv index 5 out of range (1 defined)");
    }

    #[test]
    fn deleting_selected_node_cascades() {
        let mut editor = demo_editor();
        assert!(!editor.delete_selection().unwrap());
        assert!(editor.select(Some(EntityKey::Node("n1".to_string()))));
        assert!(editor.delete_selection().unwrap());

        let model = editor.model();
        assert!(model.node("n1").is_none());
        assert_eq!(model.segments().len(), 1);
        assert!(model.externals().is_empty());
        assert_eq!(editor.scene().selection(), None);
    }

    #[test]
    fn import_replaces_model_and_summarises() {
        let mut editor = demo_editor();
        editor.import_text("n1 x=0 y=0 z=0\nn2 x=1 y=0 z=0\ne1 n1 n2\n.end\n");
        assert_eq!(editor.status(), "Imported: 2 nodes, 1 segments, 0 ground planes");
        assert!(editor.model().ground_planes().is_empty());

        let exported = editor.export_text();
        assert!(exported.contains("e1 n1 n2"));
        assert_eq!(editor.status(), "Exported model.inp");
    }

    #[test]
    fn solver_run_is_gated_until_response() {
        let mut editor = demo_editor();
        editor.set_solver_options(SolverOptions {
            tol: Some(1e-4),
            ..SolverOptions::default()
        });
        let request = editor.begin_solver_run().unwrap();
        assert!(request.document.contains(".external n1 n3 port1"));
        assert_eq!(request.args(), ["-t", "0.0001"]);
        assert_eq!(editor.status(), "Running FastHenry...");
        assert!(matches!(editor.begin_solver_run(), Err(EngineError::Busy(_))));

        editor
            .finish_solver_run(Ok(SolverOutcome {
                exit_code: 2,
                stdout: String::new(),
                stderr: "bad input".to_string(),
                zc_mat: None,
            }))
            .unwrap();
        assert_eq!(editor.status(), "FastHenry exited with code 2");
        assert!(!editor.is_solver_busy());

        editor.begin_solver_run().unwrap();
        editor.finish_solver_run(Err("connection refused".to_string())).unwrap();
        assert_eq!(editor.status(), "Error: connection refused");
        assert!(matches!(
            editor.finish_solver_run(Err(String::new())),
            Err(EngineError::NoRequestInFlight(_))
        ));
    }

    #[test]
    fn geometry_import_replaces_model() {
        let mut editor = demo_editor();
        editor.begin_geometry_import().unwrap();
        assert!(editor.begin_geometry_import().is_err());

        let import = GeometryImport {
            nodes: vec![
                ImportedNode { name: "N0".to_string(), x: 0.0, y: 0.0, z: 0.0 },
                ImportedNode { name: "N1".to_string(), x: 4.0, y: 0.0, z: 0.0 },
            ],
            segments: Vec::new(),
            info: None,
        };
        editor.finish_geometry_import(Ok(import)).unwrap();
        assert_eq!(editor.status(), "STEP imported: 2 nodes, 0 segments");
        assert_eq!(editor.model().nodes().len(), 2);

        editor.begin_geometry_import().unwrap();
        editor.finish_geometry_import(Err("unreadable file".to_string())).unwrap();
        assert_eq!(editor.status(), "STEP import failed: unreadable file");
        assert_eq!(editor.model().nodes().len(), 2);
    }

    #[test]
    fn frequency_fields_accept_engineering_notation() {
        let mut editor = Editor::default();
        editor.set_frequency("10k", "1G", "3").unwrap();
        assert_eq!(editor.model().freq.fmin, 1e4);
        assert_eq!(editor.model().freq.fmax, 1e9);
        assert_eq!(editor.model().freq.ndec, 3.0);

        let err = editor.set_frequency("abc", "1G", "3").unwrap_err();
        assert!(matches!(err, EngineError::InvalidValue { field: "fmin", .. }));
        assert_eq!(editor.model().freq.fmin, 1e4);
    }
}
