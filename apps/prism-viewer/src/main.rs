//! Prism demo viewer.
//!
//! Renders a spinning lit cube with the configured render path.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p prism-viewer -- [CONFIG.json]
//! ```
//!
//! The optional argument is a renderer config file; without it (or when
//! the file does not exist) built-in defaults apply: forward path,
//! vsync on, shaders loaded from `shaders/`.
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, prism_render=trace)

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use glam::{Quat, Vec2, Vec3, Vec4};
use prism_render::{Renderer, RendererConfig};
use prism_scene::{Camera, Light, Material, Node, NodeId, Scene, SubMesh, Transform, World};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = RendererConfig::load_or_default(config_path.as_deref());

    info!("Prism viewer starting...");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut viewer = Viewer {
        config,
        state: None,
    };
    event_loop.run_app(&mut viewer)?;
    Ok(())
}

/// Wall-clock frame timer.
struct Clock {
    last: Instant,
}

impl Clock {
    fn new() -> Self {
        Self {
            last: Instant::now(),
        }
    }

    /// Seconds since the previous tick.
    fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let dt = now.duration_since(self.last).as_secs_f32();
        self.last = now;
        dt
    }
}

struct Viewer {
    config: RendererConfig,
    state: Option<State>,
}

struct State {
    window: Arc<Window>,
    renderer: Renderer,
    world: World,
    clock: Clock,
    cube: NodeId,
    angle: f32,
}

impl ApplicationHandler for Viewer {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        match self.create_state(event_loop) {
            Ok(state) => {
                info!("Viewer ready");
                self.state = Some(state);
            }
            Err(e) => {
                error!("Failed to start viewer: {e}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                // Renderer::drop waits for the GPU before teardown.
                self.state = None;
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(state) = &mut self.state {
                    if let Err(e) = state.handle_resize(size.width, size.height) {
                        error!("Resize failed: {e}");
                        event_loop.exit();
                    }
                }
            }
            WindowEvent::RedrawRequested => {
                if let Some(state) = &mut self.state {
                    if let Err(e) = state.render_frame() {
                        error!("Render failed: {e}");
                        event_loop.exit();
                        return;
                    }
                    state.window.request_redraw();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.window.request_redraw();
        }
    }
}

impl Viewer {
    fn create_state(&self, event_loop: &ActiveEventLoop) -> Result<State> {
        let attrs = Window::default_attributes()
            .with_title("Prism Viewer")
            .with_inner_size(PhysicalSize::new(WIDTH, HEIGHT));
        let window = Arc::new(event_loop.create_window(attrs)?);

        let size = window.inner_size();
        let mut renderer = Renderer::new(
            window.as_ref(),
            size.width,
            size.height,
            self.config.clone(),
        )?;

        let (world, cube) = demo_world(size.width as f32 / size.height as f32);
        renderer.set_world(&world)?;

        Ok(State {
            window,
            renderer,
            world,
            clock: Clock::new(),
            cube,
            angle: 0.0,
        })
    }
}

impl State {
    fn render_frame(&mut self) -> Result<()> {
        let dt = self.clock.tick();
        self.spin(dt);
        self.renderer.tick(&self.world, dt)?;
        Ok(())
    }

    fn handle_resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.renderer.resize(width, height)?;
        if height > 0 {
            set_camera_aspect(&mut self.world, width as f32 / height as f32);
        }
        Ok(())
    }

    fn spin(&mut self, dt: f32) {
        self.angle = (self.angle + dt * 0.6) % std::f32::consts::TAU;
        if let Some(node) = self
            .world
            .active_scene_mut()
            .and_then(|scene| scene.node_mut(self.cube))
        {
            node.transform.rotation = Quat::from_rotation_y(self.angle);
        }
    }
}

fn set_camera_aspect(world: &mut World, aspect: f32) {
    let Some(camera_node) = world.active_camera() else {
        return;
    };
    if let Some(camera) = world
        .active_scene_mut()
        .and_then(|scene| scene.node_mut(camera_node))
        .and_then(|node| node.camera.as_mut())
    {
        camera.set_aspect(aspect);
    }
}

/// One cube, a rough reddish material, two lights, and a camera.
fn demo_world(aspect: f32) -> (World, NodeId) {
    let mut scene = Scene::new("demo");

    let material = scene.add_material(Material {
        base_color: Vec4::new(0.8, 0.3, 0.2, 1.0),
        metallic: 0.1,
        roughness: 0.6,
        ..Material::default()
    });
    let mut cube_mesh = cube_submesh();
    cube_mesh.material = Some(material);
    let submesh = scene.add_submesh(cube_mesh);

    let cube = scene.add_node(Node::new("cube").with_mesh(vec![submesh]));

    scene.add_node(
        Node::new("sun")
            .with_transform(Transform {
                rotation: Quat::from_rotation_x(-0.8),
                ..Transform::default()
            })
            .with_light(Light::directional(Vec3::new(1.0, 0.95, 0.9), 2.0)),
    );
    scene.add_node(
        Node::new("fill")
            .with_transform(Transform::from_translation(Vec3::new(2.0, 2.0, 2.0)))
            .with_light(Light::point(Vec3::new(0.3, 0.4, 1.0), 5.0)),
    );

    let camera = scene.add_node(
        Node::new("camera")
            .with_transform(Transform::from_translation(Vec3::new(0.0, 1.0, 4.0)))
            .with_camera(Camera::perspective(aspect)),
    );

    let mut world = World::new();
    world.add_scene(scene);
    world.set_active_camera(camera);
    (world, cube)
}

/// Unit cube with per-face normals and uvs, indexed as 6 quads.
fn cube_submesh() -> SubMesh {
    // (normal, u axis, v axis) per face
    let faces: [(Vec3, Vec3, Vec3); 6] = [
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
    ];

    let mut positions = Vec::with_capacity(24);
    let mut normals = Vec::with_capacity(24);
    let mut uvs = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for (normal, u, v) in faces {
        let base = positions.len() as u32;
        for (du, dv) in [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)] {
            positions.push(normal * 0.5 + u * du + v * dv);
            normals.push(normal);
            uvs.push(Vec2::new(du + 0.5, dv + 0.5));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    let mut submesh = SubMesh::new(positions, indices);
    submesh.normals = normals;
    submesh.uvs = uvs;
    submesh
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_has_one_quad_per_face() {
        let cube = cube_submesh();
        assert_eq!(cube.vertex_count(), 24);
        assert_eq!(cube.index_count(), 36);
        assert_eq!(cube.normals.len(), cube.positions.len());
        assert_eq!(cube.uvs.len(), cube.positions.len());
        assert!(cube.indices.iter().all(|&i| (i as usize) < 24));
    }

    #[test]
    fn demo_world_has_an_active_camera() {
        let (world, _) = demo_world(16.0 / 9.0);
        let scene = world.active_scene().unwrap();
        assert_eq!(scene.submesh_count(), 1);
        assert_eq!(scene.material_count(), 1);
        assert!(world.active_camera().is_some());
    }
}
