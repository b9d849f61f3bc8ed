//! The scene driver: owns the device, the frame targets, the camera and the actors.
//!
//! One frame is `handle_input`* then [`Scene::update`] then [`Scene::render`].
//! Everything resize-sensitive (swap chain, depth target, viewport and
//! projection) lives here and is rebuilt as a unit by [`Scene::resize`].

use cgmath::Vector3;
use winit::keyboard::KeyCode;

use crate::{
    camera::{Camera, CameraController, Projection, ProjectionUniform, ViewUniform},
    config::{ModelSource, SceneConfig},
    data_structures::{
        actor::Actor,
        component::{Material, Spin},
        entity::Entity,
        mesh::MeshComponent,
        transform::Transform,
    },
    gpu::{DrawContext, GfxError, GraphicsDevice, ShaderStages, Viewport},
    input::InputEvent,
    overlay::Overlay,
    resources::{self, LoadedModel},
};

pub const VIEW_SLOT: u32 = 0;
pub const PROJECTION_SLOT: u32 = 1;

/// Angular velocity of the built-in cube.
const DEFAULT_SPIN: Vector3<f32> = Vector3::new(0.0, 0.8, 0.0);

/// Render targets that are replaced together on resize.
pub struct FrameTargets<D: GraphicsDevice> {
    pub depth: D::DepthTarget,
    pub viewport: Viewport,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub draws: usize,
    /// False when the frame was dropped to recover the swap chain.
    pub presented: bool,
}

/// Per-direction amounts of the held nudge keys.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct NudgeKeys {
    right: f32,
    left: f32,
    up: f32,
    down: f32,
    forward: f32,
    backward: f32,
}

impl NudgeKeys {
    /// Returns false for keys that do not nudge.
    fn set(&mut self, key: KeyCode, amount: f32) -> bool {
        match key {
            KeyCode::ArrowRight => self.right = amount,
            KeyCode::ArrowLeft => self.left = amount,
            KeyCode::PageUp => self.up = amount,
            KeyCode::PageDown => self.down = amount,
            KeyCode::ArrowUp => self.forward = amount,
            KeyCode::ArrowDown => self.backward = amount,
            _ => return false,
        }
        true
    }

    fn direction(&self) -> Vector3<f32> {
        Vector3::new(
            self.right - self.left,
            self.up - self.down,
            self.forward - self.backward,
        )
    }
}

// Fields drop in declaration order: actors first, then the scene's own
// resources in reverse of their creation order, the device last.
pub struct Scene<D: GraphicsDevice> {
    actors: Vec<Actor<D>>,
    overlay: Option<Box<dyn Overlay<D>>>,
    projection_buffer: D::Buffer,
    view_buffer: D::Buffer,
    targets: FrameTargets<D>,
    camera: Camera,
    controller: CameraController,
    projection: Projection,
    selected: Option<usize>,
    nudge: NudgeKeys,
    config: SceneConfig,
    device: D,
}

impl<D: GraphicsDevice> Scene<D> {
    /// Creates the frame targets and the camera constant buffers for a
    /// `width` x `height` swap chain.
    pub fn new(device: D, width: u32, height: u32, config: SceneConfig) -> Result<Self, GfxError> {
        let viewport = Viewport::new(width, height)?;
        let depth = device
            .create_depth_target(width, height)
            .inspect_err(|e| log::error!("Scene: depth target: {e}"))?;
        let view_buffer = device
            .create_constant_buffer("view", std::mem::size_of::<ViewUniform>() as u64)
            .inspect_err(|e| log::error!("Scene: view constant buffer: {e}"))?;
        let projection_buffer = device
            .create_constant_buffer(
                "projection",
                std::mem::size_of::<ProjectionUniform>() as u64,
            )
            .inspect_err(|e| log::error!("Scene: projection constant buffer: {e}"))?;

        let camera = Camera::new(config.camera_position, config.camera_yaw, config.camera_pitch);
        let controller = CameraController::new(config.camera_speed, config.mouse_sensitivity);
        let projection = Projection::new(width, height, config.fovy, config.znear, config.zfar);

        let scene = Self {
            actors: Vec::new(),
            overlay: None,
            projection_buffer,
            view_buffer,
            targets: FrameTargets { depth, viewport },
            camera,
            controller,
            projection,
            selected: None,
            nudge: NudgeKeys::default(),
            config,
            device,
        };
        scene.upload_view()?;
        scene.upload_projection()?;
        log::info!("Scene created at {width}x{height}");
        Ok(scene)
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn actors(&self) -> &[Actor<D>] {
        &self.actors
    }

    pub fn actor_mut(&mut self, index: usize) -> Option<&mut Actor<D>> {
        self.actors.get_mut(index)
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn select(&mut self, index: Option<usize>) {
        self.selected = index.filter(|&i| i < self.actors.len());
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn viewport(&self) -> Viewport {
        self.targets.viewport
    }

    pub fn targets(&self) -> &FrameTargets<D> {
        &self.targets
    }

    pub fn view_buffer(&self) -> &D::Buffer {
        &self.view_buffer
    }

    pub fn projection_buffer(&self) -> &D::Buffer {
        &self.projection_buffer
    }

    pub fn set_overlay(&mut self, overlay: Box<dyn Overlay<D>>) {
        self.overlay = Some(overlay);
    }

    /// Adds an actor drawing `meshes` with `textures`. The first actor becomes the selection.
    pub fn spawn_actor(
        &mut self,
        name: &str,
        meshes: Vec<MeshComponent>,
        textures: Vec<D::Texture>,
    ) -> Result<usize, GfxError> {
        let mut actor = Actor::new(&self.device, name)?;
        actor.set_mesh(&self.device, meshes)?;
        actor.set_textures(textures);
        actor.add_component(Material {
            tint: self.config.tint,
        });
        self.actors.push(actor);
        let index = self.actors.len() - 1;
        if self.selected.is_none() {
            self.selected = Some(index);
        }
        log::info!("Spawned actor '{name}' as #{index}");
        Ok(index)
    }

    /// Places a spawned actor as `source` describes.
    fn place(&mut self, index: usize, source: &ModelSource) {
        let Some(actor) = self.actors.get_mut(index) else {
            return;
        };
        if let Some(transform) = actor.get_component_mut::<Transform>() {
            transform.set_transform(source.position, source.rotation, source.scale);
        }
        if let Some(velocity) = source.spin {
            actor.add_component(Spin::new(velocity));
        }
    }

    /// The built-in spinning cube.
    pub fn spawn_default_cube(&mut self) -> Result<usize, GfxError> {
        let index = self.spawn_actor("cube", vec![MeshComponent::cube()], Vec::new())?;
        if let Some(actor) = self.actors.get_mut(index) {
            actor.add_component(Spin::new(DEFAULT_SPIN));
        }
        Ok(index)
    }

    /// Uploads a loaded model and places it. `textures` overrides the model's own list.
    pub async fn spawn_model(
        &mut self,
        source: &ModelSource,
        model: LoadedModel,
    ) -> anyhow::Result<usize> {
        let sources = match &source.textures {
            Some(names) => names
                .iter()
                .map(|n| Some(resources::TextureSource::File(n.clone())))
                .collect(),
            None => model.textures,
        };
        let textures =
            resources::load_textures(&self.device, &self.config.assets, &source.path, &sources).await?;
        let index = self.spawn_actor(&source.path, model.meshes, textures)?;
        self.place(index, source);
        Ok(index)
    }

    /// Loads every configured model, or the default cube when none is configured.
    /// A model that fails to load is logged and skipped. Returns the number of actors spawned.
    pub async fn populate(&mut self) -> Result<usize, GfxError> {
        if self.config.models.is_empty() {
            self.spawn_default_cube()?;
            return Ok(1);
        }
        let mut spawned = 0;
        for source in self.config.models.clone() {
            let loaded = match resources::load_model(&self.config.assets, &source.path).await {
                Ok(model) => self.spawn_model(&source, model).await,
                Err(e) => Err(e),
            };
            match loaded {
                Ok(_) => spawned += 1,
                Err(e) => log::error!("Skipping model {}: {e:#}", source.path),
            }
        }
        Ok(spawned)
    }

    pub fn handle_input(&mut self, event: InputEvent) -> Result<(), GfxError> {
        if self.controller.process_event(&event) {
            return Ok(());
        }
        match event {
            InputEvent::Resized { width, height } => return self.resize(width, height),
            InputEvent::KeyDown(KeyCode::Tab) => self.select_next(),
            InputEvent::KeyDown(key) => {
                self.nudge.set(key, 1.0);
            }
            InputEvent::KeyUp(key) => {
                self.nudge.set(key, 0.0);
            }
            _ => {}
        }
        Ok(())
    }

    pub fn select_next(&mut self) {
        self.selected = match (self.selected, self.actors.len()) {
            (_, 0) => None,
            (Some(i), n) => Some((i + 1) % n),
            (None, _) => Some(0),
        };
        log::debug!("Selected actor {:?}", self.selected);
    }

    pub fn update(&mut self, dt: f32) {
        self.controller.update_camera(&mut self.camera, dt);

        if let Some(actor) = self.selected.and_then(|i| self.actors.get_mut(i)) {
            if let Some(transform) = actor.get_component_mut::<Transform>() {
                transform.position += self.nudge.direction() * self.config.nudge_speed * dt;
            }
        }
        for actor in self.actors.iter_mut() {
            actor.update(dt, &self.device);
        }
        if let Some(overlay) = self.overlay.as_mut() {
            overlay.frame(&mut self.actors, self.selected);
        }
        if let Err(e) = self.upload_view() {
            log::warn!("Scene: view upload failed: {e}");
        }
    }

    /// Draws every actor and presents. A lost swap chain is reconfigured and
    /// the frame is dropped.
    pub fn render(&mut self) -> Result<FrameStats, GfxError> {
        match self.draw_frame() {
            Err(GfxError::SurfaceLost) => {
                let viewport = self.targets.viewport;
                log::warn!("Swap chain lost, reconfiguring and skipping this frame");
                self.device
                    .resize_swap_chain(viewport.width as u32, viewport.height as u32)?;
                Ok(FrameStats::default())
            }
            other => other,
        }
    }

    fn draw_frame(&self) -> Result<FrameStats, GfxError> {
        let mut frame = self.device.begin_frame(
            &self.targets.depth,
            self.targets.viewport,
            self.config.clear_colour,
        )?;
        frame.set_constant_buffer(VIEW_SLOT, &self.view_buffer, ShaderStages::VERTEX);
        frame.set_constant_buffer(PROJECTION_SLOT, &self.projection_buffer, ShaderStages::VERTEX);
        let draws = self
            .actors
            .iter()
            .map(|actor| actor.render(&mut frame))
            .sum();
        frame.present()?;
        Ok(FrameStats {
            draws,
            presented: true,
        })
    }

    /// Rebuilds swap chain, depth target, viewport and projection for the new size.
    /// On failure nothing changes.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), GfxError> {
        let viewport = Viewport::new(width, height)?;
        let depth = self
            .device
            .create_depth_target(width, height)
            .inspect_err(|e| log::error!("Scene::resize: depth target: {e}"))?;
        let mut projection = self.projection.clone();
        projection.resize(width, height);
        self.write_projection(&projection)
            .inspect_err(|e| log::error!("Scene::resize: projection upload: {e}"))?;
        if let Err(e) = self.device.resize_swap_chain(width, height) {
            log::error!("Scene::resize: swap chain: {e}");
            if let Err(restore) = self.upload_projection() {
                log::error!("Scene::resize: restoring projection: {restore}");
            }
            return Err(e);
        }

        self.targets = FrameTargets { depth, viewport };
        self.projection = projection;
        log::debug!("Scene resized to {width}x{height}");
        Ok(())
    }

    /// Releases every actor. The scene's own targets go when it is dropped.
    pub fn destroy(&mut self) {
        for actor in self.actors.iter_mut() {
            actor.destroy();
        }
        self.actors.clear();
        self.selected = None;
        log::info!("Scene destroyed");
    }

    fn upload_view(&self) -> Result<(), GfxError> {
        let uniform = ViewUniform::new(&self.camera);
        self.device
            .write_buffer(&self.view_buffer, bytemuck::cast_slice(&[uniform]))
    }

    fn upload_projection(&self) -> Result<(), GfxError> {
        self.write_projection(&self.projection)
    }

    fn write_projection(&self, projection: &Projection) -> Result<(), GfxError> {
        let uniform = ProjectionUniform::new(projection);
        self.device
            .write_buffer(&self.projection_buffer, bytemuck::cast_slice(&[uniform]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::headless::{Command, HeadlessDevice, ResourceKind};

    fn scene() -> Scene<HeadlessDevice> {
        Scene::new(HeadlessDevice::new(800, 600), 800, 600, SceneConfig::default()).unwrap()
    }

    #[test]
    fn new_rejects_zero_size() {
        let result = Scene::new(HeadlessDevice::new(0, 0), 0, 600, SceneConfig::default());
        assert!(matches!(result, Err(GfxError::InvalidArgument(_))));
    }

    #[test]
    fn render_binds_camera_then_draws_every_actor() {
        let mut scene = scene();
        scene.spawn_default_cube().unwrap();
        scene.device().clear_commands();

        let stats = scene.render().unwrap();
        assert_eq!(stats, FrameStats { draws: 1, presented: true });
        assert_eq!(scene.device().draws(), vec![36]);

        let commands = scene.device().commands();
        assert!(matches!(commands[0], Command::BeginFrame { .. }));
        assert!(matches!(
            commands[1],
            Command::SetConstantBuffer { slot: VIEW_SLOT, .. }
        ));
        assert!(matches!(
            commands[2],
            Command::SetConstantBuffer { slot: PROJECTION_SLOT, .. }
        ));
        assert_eq!(commands.last(), Some(&Command::Present));
    }

    #[test]
    fn lost_surface_skips_one_frame() {
        let mut scene = scene();
        scene.spawn_default_cube().unwrap();
        scene.device().lose_surface();
        scene.device().clear_commands();

        assert_eq!(scene.render().unwrap(), FrameStats::default());
        assert_eq!(
            scene.device().commands(),
            vec![Command::ResizeSwapChain { width: 800, height: 600 }]
        );
        assert!(scene.render().unwrap().presented);
    }

    #[test]
    fn resize_updates_viewport_and_projection() {
        let mut scene = scene();
        scene.resize(1024, 256).unwrap();
        assert_eq!(scene.viewport().width, 1024.0);
        assert_eq!(scene.viewport().height, 256.0);
        assert_eq!(scene.projection().aspect(), 4.0);
        assert_eq!(scene.device().swap_chain_size(), (1024, 256));
    }

    #[test]
    fn failed_resize_changes_nothing() {
        let mut scene = scene();
        let depth_targets = scene.device().created(ResourceKind::DepthTarget);

        assert!(scene.resize(0, 300).is_err());
        scene.device().fail_resize(true);
        assert!(scene.resize(640, 480).is_err());
        scene.device().stop_failing();
        scene.device().fail_creation_after(0);
        assert!(scene.resize(640, 480).is_err());

        assert_eq!(scene.viewport(), Viewport::new(800, 600).unwrap());
        assert_eq!(scene.projection().aspect(), 800.0 / 600.0);
        assert_eq!(scene.device().swap_chain_size(), (800, 600));
        // The depth target built before the rejected swap chain resize is gone again.
        assert_eq!(scene.device().live(), 3);
        assert!(scene.device().created(ResourceKind::DepthTarget) > depth_targets);
    }

    #[test]
    fn failed_projection_upload_leaves_resize_undone() {
        let mut scene = scene();
        let before = scene.device().buffer_contents(scene.projection_buffer());
        scene.device().fail_writes(true);

        assert!(scene.resize(640, 480).is_err());
        scene.device().stop_failing();

        assert_eq!(scene.viewport(), Viewport::new(800, 600).unwrap());
        assert_eq!(scene.projection().aspect(), 800.0 / 600.0);
        assert_eq!(scene.device().swap_chain_size(), (800, 600));
        assert_eq!(scene.device().buffer_contents(scene.projection_buffer()), before);
        assert_eq!(scene.device().live(), 3);
    }

    #[test]
    fn rejected_swap_chain_keeps_old_projection_uploaded() {
        let mut scene = scene();
        let before = scene.device().buffer_contents(scene.projection_buffer());
        scene.device().fail_resize(true);

        assert!(scene.resize(400, 400).is_err());
        assert_eq!(scene.device().buffer_contents(scene.projection_buffer()), before);
        assert_eq!(scene.projection().aspect(), 800.0 / 600.0);
    }

    #[test]
    fn dropping_scene_releases_targets_in_reverse_creation_order() {
        let scene = scene();
        let log = scene.device().release_log();
        drop(scene);

        let released: Vec<_> = log
            .released()
            .into_iter()
            .map(|(id, kind)| (log.label(id).unwrap(), kind))
            .collect();
        assert_eq!(
            released,
            vec![
                ("projection".to_string(), ResourceKind::ConstantBuffer),
                ("view".to_string(), ResourceKind::ConstantBuffer),
                ("depth_texture".to_string(), ResourceKind::DepthTarget),
            ]
        );
    }

    #[test]
    fn resize_event_goes_through_handle_input() {
        let mut scene = scene();
        scene
            .handle_input(InputEvent::Resized { width: 400, height: 400 })
            .unwrap();
        assert_eq!(scene.projection().aspect(), 1.0);
    }

    #[test]
    fn tab_cycles_selection() {
        let mut scene = scene();
        scene.handle_input(InputEvent::KeyDown(KeyCode::Tab)).unwrap();
        assert_eq!(scene.selected(), None);

        scene.spawn_default_cube().unwrap();
        scene.spawn_default_cube().unwrap();
        assert_eq!(scene.selected(), Some(0));
        scene.handle_input(InputEvent::KeyDown(KeyCode::Tab)).unwrap();
        assert_eq!(scene.selected(), Some(1));
        scene.handle_input(InputEvent::KeyDown(KeyCode::Tab)).unwrap();
        assert_eq!(scene.selected(), Some(0));
    }

    #[test]
    fn held_arrow_moves_selected_actor() {
        let mut scene = scene();
        scene.spawn_actor("a", vec![MeshComponent::cube()], Vec::new()).unwrap();
        scene.spawn_actor("b", vec![MeshComponent::cube()], Vec::new()).unwrap();

        scene.handle_input(InputEvent::KeyDown(KeyCode::ArrowRight)).unwrap();
        scene.update(0.5);
        scene.handle_input(InputEvent::KeyUp(KeyCode::ArrowRight)).unwrap();
        scene.update(0.5);

        let moved = scene.actors()[0].transform().unwrap().position;
        assert_eq!(moved, Vector3::new(1.0, 0.0, 0.0));
        let still = scene.actors()[1].transform().unwrap().position;
        assert_eq!(still, Vector3::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn releasing_one_of_two_opposite_keys_keeps_the_other() {
        let mut scene = scene();
        scene.spawn_default_cube().unwrap();

        scene.handle_input(InputEvent::KeyDown(KeyCode::ArrowRight)).unwrap();
        scene.handle_input(InputEvent::KeyDown(KeyCode::ArrowLeft)).unwrap();
        scene.handle_input(InputEvent::KeyUp(KeyCode::ArrowLeft)).unwrap();
        scene.update(1.0);

        let position = scene.actors()[0].transform().unwrap().position;
        assert_eq!(position, Vector3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn opposite_keys_held_together_cancel() {
        let mut scene = scene();
        scene.spawn_default_cube().unwrap();

        scene.handle_input(InputEvent::KeyDown(KeyCode::PageUp)).unwrap();
        scene.handle_input(InputEvent::KeyDown(KeyCode::PageDown)).unwrap();
        scene.update(1.0);

        let position = scene.actors()[0].transform().unwrap().position;
        assert_eq!(position, Vector3::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn populate_without_models_spawns_spinning_cube() {
        let mut scene = scene();
        assert_eq!(futures::executor::block_on(scene.populate()).unwrap(), 1);
        assert_eq!(scene.actors().len(), 1);
        assert!(scene.actors()[0].get_component::<Spin>().is_some());

        scene.update(1.0);
        let rotation = scene.actors()[0].transform().unwrap().rotation;
        assert!((rotation.y - DEFAULT_SPIN.y).abs() < 1e-6);
    }

    #[test]
    fn unloadable_models_are_skipped() {
        let config = SceneConfig {
            models: vec![ModelSource::new("model.fbx")],
            ..SceneConfig::default()
        };
        let mut scene = Scene::new(HeadlessDevice::new(8, 8), 8, 8, config).unwrap();
        let rt = tokio::runtime::Runtime::new().unwrap();
        assert_eq!(rt.block_on(scene.populate()).unwrap(), 0);
        assert!(scene.actors().is_empty());
    }

    #[test]
    fn configured_tint_reaches_actors() {
        let config = SceneConfig {
            tint: [1.0, 0.0, 0.0, 1.0],
            ..SceneConfig::default()
        };
        let mut scene = Scene::new(HeadlessDevice::new(8, 8), 8, 8, config).unwrap();
        scene.spawn_default_cube().unwrap();
        let material = scene.actors()[0].get_component::<Material>().unwrap();
        assert_eq!(material.tint, [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn destroy_releases_actor_resources() {
        let mut scene = scene();
        scene.spawn_default_cube().unwrap();
        scene.destroy();
        assert!(scene.actors().is_empty());
        assert_eq!(scene.selected(), None);
        // Depth target plus the two camera buffers.
        assert_eq!(scene.device().live(), 3);
        assert!(scene.device().no_double_release());
        assert_eq!(scene.render().unwrap().draws, 0);
    }
}
