//! GPU mirror of the active scene.
//!
//! Owns the scene/material/object descriptor tiers, the GPU copies of
//! every texture, material, and visible submesh, and the per-frame scene
//! uniform. The mirror is rebuilt wholesale when resource counts change
//! and refreshed in place every frame otherwise.

use std::collections::{BTreeMap, HashMap};

use ash::vk;
use glam::{Mat4, Vec4};
use prism_gpu::{
    DescriptorPool, DescriptorSet, DescriptorSetLayout, DescriptorSetLayoutBuilder, DeviceContext,
    GpuBuffer, Sampler,
};
use prism_scene::{Light, MaterialId, Scene, SubMeshId, TextureId, World};
use tracing::{debug, warn};

use crate::error::Result;
use crate::gpu_data::{GpuLightData, GpuSceneData, MAX_LIGHTS};
use crate::gpu_material::{GpuMaterial, MaterialImages};
use crate::gpu_mesh::GpuMesh;
use crate::gpu_texture::GpuTexture;

const MAX_SCENE_SETS: u32 = 1;
const MAX_MATERIAL_SETS: u32 = 10;
const MAX_OBJECT_SETS: u32 = 100;

pub struct RenderScene {
    scene_layout: DescriptorSetLayout,
    material_layout: DescriptorSetLayout,
    object_layout: DescriptorSetLayout,

    scene_pool: DescriptorPool,
    material_pool: DescriptorPool,
    object_pool: DescriptorPool,

    scene_data: GpuSceneData,
    scene_uniform: GpuBuffer,
    scene_set: DescriptorSet,

    default_sampler: Sampler,
    fallback: GpuTexture,

    textures: Vec<GpuTexture>,
    texture_index: HashMap<TextureId, usize>,
    materials: Vec<GpuMaterial>,
    meshes: Vec<GpuMesh>,
    mesh_index: HashMap<SubMeshId, usize>,
    groups: BTreeMap<MaterialId, Vec<usize>>,

    last_submesh_count: usize,
    last_material_count: usize,
}

impl RenderScene {
    /// Create the descriptor tiers and mirror the world's active scene.
    pub fn new(ctx: &DeviceContext, world: &World) -> Result<Self> {
        let device = ctx.device();

        let scene_layout = unsafe {
            DescriptorSetLayoutBuilder::new()
                .uniform_buffer(
                    0,
                    vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                )
                .build(device)?
        };
        let material_layout = unsafe {
            DescriptorSetLayoutBuilder::new()
                .uniform_buffer(0, vk::ShaderStageFlags::FRAGMENT)
                .sampled_image(1, vk::ShaderStageFlags::FRAGMENT)
                .sampled_image(2, vk::ShaderStageFlags::FRAGMENT)
                .sampled_image(3, vk::ShaderStageFlags::FRAGMENT)
                .build(device)?
        };
        let object_layout = unsafe {
            DescriptorSetLayoutBuilder::new()
                .uniform_buffer(0, vk::ShaderStageFlags::VERTEX)
                .build(device)?
        };

        let scene_sizes = [vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: MAX_SCENE_SETS,
        }];
        let mut scene_pool = unsafe { DescriptorPool::new(device, MAX_SCENE_SETS, &scene_sizes)? };
        let material_pool = unsafe {
            DescriptorPool::new(
                device,
                MAX_MATERIAL_SETS,
                &material_pool_sizes(MAX_MATERIAL_SETS),
            )?
        };
        let object_pool = unsafe {
            DescriptorPool::new(device, MAX_OBJECT_SETS, &object_pool_sizes(MAX_OBJECT_SETS))?
        };

        let scene_data = GpuSceneData::default();
        let scene_uniform = GpuBuffer::new_dynamic(
            ctx,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            bytemuck::bytes_of(&scene_data),
            "scene uniform",
        )?;
        let scene_set = unsafe { scene_pool.allocate(device, &scene_layout)? };
        unsafe {
            scene_set.update_buffer(
                device,
                0,
                vk::DescriptorType::UNIFORM_BUFFER,
                scene_uniform.buffer,
            );
        }

        let default_sampler = unsafe { Sampler::new(device)? };
        let fallback = GpuTexture::white(ctx)?;

        let mut render_scene = Self {
            scene_layout,
            material_layout,
            object_layout,
            scene_pool,
            material_pool,
            object_pool,
            scene_data,
            scene_uniform,
            scene_set,
            default_sampler,
            fallback,
            textures: Vec::new(),
            texture_index: HashMap::new(),
            materials: Vec::new(),
            meshes: Vec::new(),
            mesh_index: HashMap::new(),
            groups: BTreeMap::new(),
            last_submesh_count: 0,
            last_material_count: 0,
        };
        render_scene.rebuild(ctx, world)?;
        Ok(render_scene)
    }

    /// True when the active scene's resource counts have drifted from
    /// those recorded at the last rebuild.
    pub fn needs_rebuild(&self, world: &World) -> bool {
        rebuild_needed(self.last_submesh_count, self.last_material_count, world)
    }

    /// Per-frame refresh: rebuild if needed, then upload the scene
    /// uniform and every mesh's model matrix.
    pub fn update(&mut self, ctx: &DeviceContext, world: &World, _dt: f32) -> Result<()> {
        if world.active_scene().is_none() {
            return Ok(());
        }

        if self.needs_rebuild(world) {
            self.rebuild(ctx, world)?;
        }

        self.update_scene_uniform(world)?;
        self.update_meshes(world)
    }

    /// Recreate the full GPU mirror from the world.
    ///
    /// Waits for the device to idle, drops all previous resources, grows
    /// the descriptor pools if the scene outgrew them, then reloads
    /// textures, materials, and visible meshes.
    pub fn rebuild(&mut self, ctx: &DeviceContext, world: &World) -> Result<()> {
        ctx.wait_idle()?;
        self.clear(ctx)?;

        let Some(scene) = world.active_scene() else {
            self.last_submesh_count = 0;
            self.last_material_count = 0;
            return Ok(());
        };

        self.grow_pools(ctx, scene)?;
        self.load_textures(ctx, scene)?;
        self.load_materials(ctx, scene)?;
        self.load_meshes(ctx, scene)?;

        self.groups = group_by_material(
            self.meshes
                .iter()
                .enumerate()
                .map(|(index, mesh)| (index, mesh.material())),
            self.materials.first().map(|material| material.source()),
        );

        self.last_submesh_count = scene.submesh_count();
        self.last_material_count = scene.material_count();
        debug!(
            "Rebuilt render scene: {} textures, {} materials, {} meshes",
            self.textures.len(),
            self.materials.len(),
            self.meshes.len()
        );
        Ok(())
    }

    /// Record all draws: scene set once, then meshes batched per
    /// material in stable id order.
    ///
    /// # Safety
    /// Must be called inside an active render pass whose pipeline layout
    /// leads with the scene/material/object set layouts.
    pub unsafe fn draw(
        &self,
        device: &ash::Device,
        cmd: vk::CommandBuffer,
        pipeline_layout: vk::PipelineLayout,
    ) {
        device.cmd_bind_descriptor_sets(
            cmd,
            vk::PipelineBindPoint::GRAPHICS,
            pipeline_layout,
            0,
            &[self.scene_set.handle()],
            &[],
        );

        for (material_id, mesh_indices) in &self.groups {
            let Some(material) = self
                .materials
                .iter()
                .find(|material| material.source() == *material_id)
            else {
                continue;
            };
            material.bind(device, cmd, pipeline_layout);

            for &index in mesh_indices {
                let mesh = &self.meshes[index];
                mesh.bind(device, cmd, pipeline_layout);
                mesh.draw(device, cmd);
            }
        }
    }

    /// Scene, material, and object set layouts, in set-index order.
    pub fn descriptor_set_layouts(&self) -> [vk::DescriptorSetLayout; 3] {
        [
            self.scene_layout.handle(),
            self.material_layout.handle(),
            self.object_layout.handle(),
        ]
    }

    pub fn scene_set(&self) -> DescriptorSet {
        self.scene_set
    }

    /// Destroy every GPU resource the mirror owns.
    ///
    /// # Safety
    /// The device must be idle.
    pub unsafe fn destroy(&mut self, ctx: &DeviceContext) -> Result<()> {
        let device = ctx.device();
        self.clear(ctx)?;
        self.fallback.destroy(ctx)?;
        self.default_sampler.destroy(device);
        ctx.allocator().lock().free_buffer(&mut self.scene_uniform)?;
        self.scene_pool.destroy(device);
        self.material_pool.destroy(device);
        self.object_pool.destroy(device);
        self.scene_layout.destroy(device);
        self.material_layout.destroy(device);
        self.object_layout.destroy(device);
        Ok(())
    }

    fn update_scene_uniform(&mut self, world: &World) -> Result<()> {
        if let Some((view, projection)) = camera_matrices(world) {
            self.scene_data.view = view;
            self.scene_data.projection = projection;

            let inv_view = view.inverse();
            self.scene_data.camera_position =
                Vec4::new(inv_view.w_axis.x, inv_view.w_axis.y, inv_view.w_axis.z, 1.0);
        }

        if let Some(scene) = world.active_scene() {
            let (light_count, lights) = pack_lights(scene);
            self.scene_data.light_count = light_count;
            self.scene_data.lights = lights;
        }

        self.scene_uniform
            .upload(bytemuck::bytes_of(&self.scene_data), 0)?;
        Ok(())
    }

    fn update_meshes(&mut self, world: &World) -> Result<()> {
        let Some(scene) = world.active_scene() else {
            return Ok(());
        };

        let mut updates: Vec<(usize, Mat4)> = Vec::new();
        scene.visit(&mut |_, node, world_matrix| {
            let Some(submeshes) = node.mesh.as_ref() else {
                return;
            };
            for id in submeshes {
                if let Some(&index) = self.mesh_index.get(id) {
                    updates.push((index, world_matrix));
                }
            }
        });

        for (index, matrix) in updates {
            let mesh = &mut self.meshes[index];
            mesh.set_model_matrix(matrix);
            mesh.update_uniforms()?;
        }
        Ok(())
    }

    fn clear(&mut self, ctx: &DeviceContext) -> Result<()> {
        let device = ctx.device();

        self.groups.clear();
        self.mesh_index.clear();
        self.texture_index.clear();
        for mut mesh in self.meshes.drain(..) {
            unsafe { mesh.destroy(ctx)? };
        }
        for mut material in self.materials.drain(..) {
            unsafe { material.destroy(ctx)? };
        }
        for mut texture in self.textures.drain(..) {
            unsafe { texture.destroy(ctx)? };
        }

        unsafe {
            self.material_pool.reset(device)?;
            self.object_pool.reset(device)?;
        }
        Ok(())
    }

    fn grow_pools(&mut self, ctx: &DeviceContext, scene: &Scene) -> Result<()> {
        let device = ctx.device();

        let material_count = scene.material_count() as u32;
        if material_count > self.material_pool.capacity().max_sets() {
            unsafe { self.material_pool.destroy(device) };
            self.material_pool = unsafe {
                DescriptorPool::new(device, material_count, &material_pool_sizes(material_count))?
            };
            debug!("Grew material pool to {material_count} sets");
        }

        let submesh_count = scene.submesh_count() as u32;
        if submesh_count > self.object_pool.capacity().max_sets() {
            let object_count = submesh_count * 2;
            unsafe { self.object_pool.destroy(device) };
            self.object_pool = unsafe {
                DescriptorPool::new(device, object_count, &object_pool_sizes(object_count))?
            };
            debug!("Grew object pool to {object_count} sets");
        }
        Ok(())
    }

    fn load_textures(&mut self, ctx: &DeviceContext, scene: &Scene) -> Result<()> {
        for (id, texture) in scene.textures() {
            if !texture.valid() {
                warn!("Skipping texture {} with inconsistent pixel data", id.index());
                continue;
            }

            let gpu_texture = GpuTexture::from_texture(ctx, id, texture)?;
            self.texture_index.insert(id, self.textures.len());
            self.textures.push(gpu_texture);
        }
        Ok(())
    }

    fn load_materials(&mut self, ctx: &DeviceContext, scene: &Scene) -> Result<()> {
        for (id, material) in scene.materials() {
            let images = MaterialImages {
                base_color: self.resolve_view(material.base_color_texture),
                metallic_roughness: self.resolve_view(material.metallic_roughness_texture),
                fallback: self.fallback.view(),
            };

            let gpu_material = GpuMaterial::new(
                ctx,
                id,
                material,
                &self.material_layout,
                &mut self.material_pool,
                images,
                self.default_sampler.handle(),
            )?;
            self.materials.push(gpu_material);
        }
        Ok(())
    }

    fn load_meshes(&mut self, ctx: &DeviceContext, scene: &Scene) -> Result<()> {
        for (id, submesh) in scene.submeshes() {
            if !submesh.visible || submesh.vertex_count() == 0 || submesh.index_count() == 0 {
                continue;
            }

            let gpu_mesh = GpuMesh::new(ctx, id, submesh, &self.object_layout, &mut self.object_pool)?;
            self.mesh_index.insert(id, self.meshes.len());
            self.meshes.push(gpu_mesh);
        }
        Ok(())
    }

    /// Resolve a texture reference to a view, falling back to white.
    fn resolve_view(&self, id: Option<TextureId>) -> vk::ImageView {
        id.and_then(|id| self.texture_index.get(&id))
            .map(|&index| self.textures[index].view())
            .unwrap_or_else(|| self.fallback.view())
    }
}

fn material_pool_sizes(count: u32) -> [vk::DescriptorPoolSize; 2] {
    [
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: count,
        },
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            descriptor_count: count * 5,
        },
    ]
}

fn object_pool_sizes(count: u32) -> [vk::DescriptorPoolSize; 1] {
    [vk::DescriptorPoolSize {
        ty: vk::DescriptorType::UNIFORM_BUFFER,
        descriptor_count: count,
    }]
}

/// True when the active scene's resource counts differ from the counts
/// recorded at the last rebuild. Content edits alone never trigger.
fn rebuild_needed(last_submeshes: usize, last_materials: usize, world: &World) -> bool {
    let Some(scene) = world.active_scene() else {
        return false;
    };
    scene.submesh_count() != last_submeshes || scene.material_count() != last_materials
}

/// View and projection of the active camera node, if one is set.
fn camera_matrices(world: &World) -> Option<(Mat4, Mat4)> {
    let scene = world.active_scene()?;
    let camera_node = world.active_camera()?;
    let node = scene.node(camera_node)?;
    let camera = node.camera?;

    let view = scene.world_matrix(camera_node).inverse();
    Some((view, camera.projection()))
}

/// Pack the scene's lights into the uniform array, capped at
/// [`MAX_LIGHTS`].
fn pack_lights(scene: &Scene) -> (u32, [GpuLightData; MAX_LIGHTS]) {
    let mut lights = [GpuLightData::default(); MAX_LIGHTS];
    let mut count = 0usize;
    let mut dropped = 0usize;

    scene.visit(&mut |_, node, world_matrix| {
        let Some(light) = node.light.as_ref() else {
            return;
        };
        if count < MAX_LIGHTS {
            lights[count] = encode_light(light, world_matrix);
            count += 1;
        } else {
            dropped += 1;
        }
    });

    if dropped > 0 {
        warn!("Dropped {dropped} lights over the {MAX_LIGHTS} light limit");
    }

    (count as u32, lights)
}

/// Encode one light at its node's world matrix.
///
/// `params.w` tags the kind: 0 directional, 1 point, 2 spot.
/// Directional and spot lights shine along the node's world -Y axis.
fn encode_light(light: &Light, world: Mat4) -> GpuLightData {
    let position = world.w_axis.truncate();
    let direction = (world * Vec4::new(0.0, -1.0, 0.0, 0.0))
        .truncate()
        .normalize_or_zero();

    match *light {
        Light::Directional { color, intensity } => GpuLightData {
            position: direction.extend(0.0),
            direction: direction.extend(0.0),
            color: color.extend(intensity),
            params: Vec4::ZERO,
        },
        Light::Point {
            color,
            intensity,
            range,
        } => GpuLightData {
            position: position.extend(1.0),
            direction: Vec4::ZERO,
            color: color.extend(intensity),
            params: Vec4::new(range, 0.0, 0.0, 1.0),
        },
        Light::Spot {
            color,
            intensity,
            range,
            inner_angle,
            outer_angle,
        } => GpuLightData {
            position: position.extend(1.0),
            direction: direction.extend(0.0),
            color: color.extend(intensity),
            params: Vec4::new(range, inner_angle, outer_angle, 2.0),
        },
    }
}

/// Group mesh indices by material id in stable ascending id order.
///
/// Meshes without a material fall back to `fallback` (the first
/// material, when one exists) and are dropped otherwise.
fn group_by_material<I>(meshes: I, fallback: Option<MaterialId>) -> BTreeMap<MaterialId, Vec<usize>>
where
    I: IntoIterator<Item = (usize, Option<MaterialId>)>,
{
    let mut groups: BTreeMap<MaterialId, Vec<usize>> = BTreeMap::new();
    for (index, material) in meshes {
        let Some(material) = material.or(fallback) else {
            continue;
        };
        groups.entry(material).or_default().push(index);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::{Quat, Vec3};
    use prism_scene::{Camera, Material, Node, SubMesh, Transform};

    fn world_with_counts(submeshes: usize, materials: usize) -> World {
        let mut scene = Scene::new("test");
        for _ in 0..submeshes {
            scene.add_submesh(SubMesh::new(vec![Vec3::ZERO], vec![0]));
        }
        for _ in 0..materials {
            scene.add_material(Material::default());
        }

        let mut world = World::new();
        world.add_scene(scene);
        world
    }

    #[test]
    fn rebuild_triggers_only_on_count_change() {
        let mut world = world_with_counts(2, 1);
        assert!(!rebuild_needed(2, 1, &world));

        world
            .active_scene_mut()
            .unwrap()
            .add_submesh(SubMesh::new(vec![Vec3::ZERO], vec![0]));
        assert!(rebuild_needed(2, 1, &world));

        assert!(rebuild_needed(2, 2, &world_with_counts(2, 1)));
        assert!(!rebuild_needed(0, 0, &World::new()));
    }

    #[test]
    fn meshes_group_per_material_in_stable_order() {
        let mut scene = Scene::new("test");
        let a = scene.add_material(Material::default());
        let b = scene.add_material(Material::default());

        let groups = group_by_material([(0, Some(a)), (1, Some(a)), (2, Some(b))], Some(a));

        let ordered: Vec<_> = groups.iter().collect();
        assert_eq!(ordered.len(), 2);
        assert_eq!(*ordered[0].0, a);
        assert_eq!(ordered[0].1, &vec![0, 1]);
        assert_eq!(*ordered[1].0, b);
        assert_eq!(ordered[1].1, &vec![2]);
    }

    #[test]
    fn unassigned_meshes_fall_back_to_the_first_material() {
        let mut scene = Scene::new("test");
        let first = scene.add_material(Material::default());

        let groups = group_by_material([(0, None), (1, Some(first))], Some(first));
        assert_eq!(groups[&first], vec![0, 1]);

        let none = group_by_material([(0, None)], None);
        assert!(none.is_empty());
    }

    #[test]
    fn light_packing_caps_at_the_uniform_limit() {
        let mut scene = Scene::new("test");
        for _ in 0..MAX_LIGHTS + 4 {
            scene.add_node(Node::new("light").with_light(Light::point(Vec3::ONE, 1.0)));
        }

        let (count, lights) = pack_lights(&scene);
        assert_eq!(count, MAX_LIGHTS as u32);
        assert_eq!(lights.len(), MAX_LIGHTS);
        assert!(lights.iter().all(|light| light.params.w == 1.0));
    }

    #[test]
    fn directional_light_encodes_direction_in_both_slots() {
        let light = Light::directional(Vec3::new(1.0, 0.9, 0.8), 2.0);
        let data = encode_light(&light, Mat4::IDENTITY);

        assert_relative_eq!(data.direction.y, -1.0);
        assert_eq!(data.position, data.direction);
        assert_eq!(data.position.w, 0.0);
        assert_eq!(data.color.w, 2.0);
        assert_eq!(data.params, Vec4::ZERO);
    }

    #[test]
    fn point_light_takes_the_node_translation() {
        let world = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let data = encode_light(&Light::point(Vec3::ONE, 1.0), world);

        assert_eq!(data.position, Vec4::new(1.0, 2.0, 3.0, 1.0));
        assert_eq!(data.direction, Vec4::ZERO);
        assert_eq!(data.params, Vec4::new(10.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn spot_light_rotates_with_its_node() {
        let world = Mat4::from_quat(Quat::from_rotation_x(std::f32::consts::FRAC_PI_2));
        let data = encode_light(&Light::spot(Vec3::ONE, 1.0, 0.3, 0.5), world);

        assert_relative_eq!(data.direction.z, -1.0, epsilon = 1e-6);
        assert_relative_eq!(data.direction.y, 0.0, epsilon = 1e-6);
        assert_eq!(data.params.w, 2.0);
        assert_eq!(data.params.y, 0.3);
    }

    #[test]
    fn camera_matrices_come_from_the_active_node() {
        let mut scene = Scene::new("test");
        let camera = scene.add_node(
            Node::new("camera")
                .with_transform(Transform::from_translation(Vec3::new(0.0, 0.0, 5.0)))
                .with_camera(Camera::perspective(16.0 / 9.0)),
        );

        let mut world = World::new();
        world.add_scene(scene);
        assert!(camera_matrices(&world).is_none());

        world.set_active_camera(camera);
        let (view, projection) = camera_matrices(&world).unwrap();
        assert_relative_eq!(view.w_axis.z, -5.0);
        assert!(projection != Mat4::IDENTITY);

        let inv_view = view.inverse();
        assert_relative_eq!(inv_view.w_axis.z, 5.0);
    }
}
