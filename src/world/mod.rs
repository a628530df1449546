//! Renderable world for one level
//!
//! `WorldBuilder::build` allocates every mesh and texture a level needs and
//! hands back a `WorldHandle` that owns them. `WorldHandle::dispose` is the
//! only teardown path. A build that fails part way releases what it already
//! allocated, so the caller's current world is never disturbed.

pub mod gpu;
pub mod mesh;
pub mod texture;

pub use gpu::{GpuResources, HeadlessGpu, InstanceData, ResourceId};

use glam::{EulerRot, Mat4, Vec3};
use image::RgbaImage;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::error::GameError;
use crate::sim::collision::Aabb;
use crate::sim::level::LevelDescriptor;
use crate::sim::state::Avatar;
use crate::sim::tick::Course;
use mesh::MeshData;

const TRUNK_COLOR: u32 = 0x8b4513;
const FOLIAGE_COLOR: u32 = 0x228b22;
const FINISH_COLOR: u32 = 0xffd700;
const GROUND_TINT: u32 = 0xffffff;

/// Ground plane size (lateral, forward)
const GROUND_SIZE: (f32, f32) = (20.0, 100.0);
/// Finish plane size (lateral, forward)
const FINISH_SIZE: (f32, f32) = (10.0, 1.0);
/// Lift for coplanar ground decals
const DECAL_LIFT: f32 = 0.01;

const TRUNK_OFFSET: Vec3 = Vec3::new(0.0, 0.5, 0.0);
const FOLIAGE_OFFSET: Vec3 = Vec3::new(0.0, 2.0, 0.0);

/// Avatar mesh choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectShape {
    #[default]
    Cube,
    Sphere,
    Torus,
    Pyramid,
    Cylinder,
}

impl ObjectShape {
    pub const ALL: [ObjectShape; 5] = [
        ObjectShape::Cube,
        ObjectShape::Sphere,
        ObjectShape::Torus,
        ObjectShape::Pyramid,
        ObjectShape::Cylinder,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectShape::Cube => "cube",
            ObjectShape::Sphere => "sphere",
            ObjectShape::Torus => "torus",
            ObjectShape::Pyramid => "pyramid",
            ObjectShape::Cylinder => "cylinder",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|shape| shape.as_str() == s)
    }

    /// Mesh sized to fit the 0.8 avatar box
    pub fn mesh(&self) -> MeshData {
        match self {
            ObjectShape::Cube => mesh::cuboid(0.8, 0.8, 0.8),
            ObjectShape::Sphere => mesh::sphere(0.4, 24, 16),
            ObjectShape::Torus => mesh::torus(0.3, 0.1, 12, 32),
            ObjectShape::Pyramid => mesh::pyramid(0.5, 0.8),
            ObjectShape::Cylinder => mesh::cylinder(0.4, 0.4, 0.8, 24),
        }
    }
}

/// Avatar surface choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextureKind {
    #[default]
    None,
    Wood,
    Metal,
    Brick,
    Custom,
}

impl TextureKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(TextureKind::None),
            "wood" => Some(TextureKind::Wood),
            "metal" => Some(TextureKind::Metal),
            "brick" => Some(TextureKind::Brick),
            "custom" => Some(TextureKind::Custom),
            _ => None,
        }
    }
}

/// Cosmetic configuration applied on every build
#[derive(Debug, Clone, PartialEq)]
pub struct Cosmetics {
    pub shape: ObjectShape,
    pub texture: TextureKind,
    /// Only meaningful with `TextureKind::Custom`
    pub custom_url: Option<String>,
    /// 0xRRGGBB
    pub color: u32,
}

impl Default for Cosmetics {
    fn default() -> Self {
        Self {
            shape: ObjectShape::Cube,
            texture: TextureKind::None,
            custom_url: None,
            color: 0xffff00,
        }
    }
}

/// 0xRRGGBB to linear-ish RGBA floats
pub fn color_from_hex(hex: u32) -> [f32; 4] {
    let channel = |shift: u32| ((hex >> shift) & 0xff) as f32 / 255.0;
    [channel(16), channel(8), channel(0), 1.0]
}

/// An asynchronous texture load the host should perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureRequest {
    /// Build generation the result belongs to
    pub generation: u64,
    pub url: String,
}

/// One drawable: mesh, optional texture, transform and tint
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneObject {
    pub mesh: ResourceId,
    pub texture: Option<ResourceId>,
    pub transform: Mat4,
    pub color: [f32; 4],
}

impl SceneObject {
    pub fn instance(&self) -> InstanceData {
        InstanceData::new(self.transform, self.color)
    }
}

/// A tree: trunk + foliage with a world-space box
#[derive(Debug, Clone, PartialEq)]
pub struct Obstacle {
    pub position: Vec3,
    pub trunk: SceneObject,
    pub foliage: SceneObject,
    pub bounds: Aabb,
}

/// Everything the renderer draws for one level
#[derive(Debug)]
pub struct WorldHandle {
    pub generation: u64,
    pub level: u32,
    pub avatar: SceneObject,
    pub ground: SceneObject,
    pub finish: SceneObject,
    pub finish_line: Vec3,
    pub obstacles: Vec<Obstacle>,
    /// Custom texture still to be fetched for the avatar
    pub pending_texture: Option<TextureRequest>,
    owned: Vec<ResourceId>,
}

impl WorldHandle {
    /// Release every resource this handle owns. Safe to call twice.
    pub fn dispose(&mut self, gpu: &mut dyn GpuResources) {
        if self.owned.is_empty() {
            return;
        }
        log::debug!(
            "Disposing world for level {} ({} resources)",
            self.level,
            self.owned.len()
        );
        for id in self.owned.drain(..).rev() {
            gpu.release(id);
        }
        self.pending_texture = None;
    }

    pub fn is_disposed(&self) -> bool {
        self.owned.is_empty()
    }

    pub fn resource_count(&self) -> usize {
        self.owned.len()
    }

    pub fn obstacle_bounds(&self) -> Vec<Aabb> {
        self.obstacles.iter().map(|o| o.bounds).collect()
    }

    pub fn course<'a>(&self, bounds: &'a [Aabb], is_final: bool) -> Course<'a> {
        Course {
            finish_line: self.finish_line,
            obstacles: bounds,
            is_final,
        }
    }

    /// Follow the simulated avatar pose
    pub fn sync_avatar(&mut self, avatar: &Avatar) {
        let r = avatar.rotation;
        self.avatar.transform = Mat4::from_translation(avatar.position)
            * Mat4::from_euler(EulerRot::XYZ, r.x, r.y, r.z);
    }

    pub fn set_avatar_color(&mut self, color: u32) {
        self.avatar.color = color_from_hex(color);
    }

    /// Swap in a loaded avatar texture; a result for another generation is dropped
    pub fn apply_avatar_texture(
        &mut self,
        generation: u64,
        image: &RgbaImage,
        gpu: &mut dyn GpuResources,
    ) -> Result<bool, GameError> {
        if generation != self.generation || self.is_disposed() {
            return Ok(false);
        }
        let texture = gpu.create_texture("avatar_texture", image)?;
        if let Some(previous) = self.avatar.texture.replace(texture) {
            self.owned.retain(|id| *id != previous);
            gpu.release(previous);
        }
        self.owned.push(texture);
        self.pending_texture = None;
        Ok(true)
    }

    /// Hand the pending custom texture request to the host, at most once
    pub fn take_texture_request(&mut self) -> Option<TextureRequest> {
        self.pending_texture.take()
    }

    /// Draw list in submission order
    pub fn draw_list(&self) -> Vec<SceneObject> {
        let mut items = Vec::with_capacity(3 + self.obstacles.len() * 2);
        items.push(self.ground);
        items.push(self.finish);
        for obstacle in &self.obstacles {
            items.push(obstacle.trunk);
            items.push(obstacle.foliage);
        }
        items.push(self.avatar);
        items
    }
}

/// Builds `WorldHandle`s; owns the build generation counter
#[derive(Debug)]
pub struct WorldBuilder {
    seed: u64,
    generation: u64,
}

impl Default for WorldBuilder {
    fn default() -> Self {
        Self::new(0x5eed)
    }
}

impl WorldBuilder {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            generation: 0,
        }
    }

    /// Generation of the most recent successful build
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Construct the world for `level`.
    ///
    /// A missing avatar is an `Initialization` error; any other failure is a
    /// `SceneBuild` error. Either way nothing stays allocated.
    pub fn build(
        &mut self,
        level: &LevelDescriptor,
        cosmetics: &Cosmetics,
        gpu: &mut dyn GpuResources,
    ) -> Result<WorldHandle, GameError> {
        let mut owned = Vec::new();
        let generation = self.generation + 1;
        match self.build_into(level, cosmetics, gpu, generation, &mut owned) {
            Ok(handle) => {
                self.generation = generation;
                log::info!(
                    "Built level {} ({} obstacles, {} resources, generation {})",
                    level.id,
                    handle.obstacles.len(),
                    handle.owned.len(),
                    generation
                );
                Ok(handle)
            }
            Err(e) => {
                log::warn!(
                    "Level {} build failed, releasing {} partial resources: {}",
                    level.id,
                    owned.len(),
                    e
                );
                for id in owned.into_iter().rev() {
                    gpu.release(id);
                }
                Err(e)
            }
        }
    }

    fn build_into(
        &self,
        level: &LevelDescriptor,
        cosmetics: &Cosmetics,
        gpu: &mut dyn GpuResources,
        generation: u64,
        owned: &mut Vec<ResourceId>,
    ) -> Result<WorldHandle, GameError> {
        let mut rng = Pcg32::seed_from_u64(self.seed);
        let scene_err = |e: GameError| match e {
            GameError::SceneBuild(_) => e,
            other => GameError::SceneBuild(other.to_string()),
        };

        // Avatar
        let avatar_mesh = gpu
            .create_mesh("avatar", &cosmetics.shape.mesh())
            .map_err(|e| GameError::Initialization(format!("avatar mesh: {}", e)))?;
        owned.push(avatar_mesh);

        let mut pending_texture = None;
        let avatar_texture = match cosmetics.texture {
            TextureKind::None => None,
            TextureKind::Custom => {
                match &cosmetics.custom_url {
                    Some(url) => {
                        pending_texture = Some(TextureRequest {
                            generation,
                            url: url.clone(),
                        })
                    }
                    None => log::warn!("Custom texture selected without a URL"),
                }
                None
            }
            kind => match texture::procedural(kind, &mut rng) {
                Some(image) => {
                    let id = gpu
                        .create_texture("avatar_texture", &image)
                        .map_err(scene_err)?;
                    owned.push(id);
                    Some(id)
                }
                None => None,
            },
        };

        let avatar = SceneObject {
            mesh: avatar_mesh,
            texture: avatar_texture,
            transform: Mat4::IDENTITY,
            color: color_from_hex(cosmetics.color),
        };

        // Ground
        let ground_mesh = gpu
            .create_mesh("ground", &mesh::plane(GROUND_SIZE.0, GROUND_SIZE.1))
            .map_err(scene_err)?;
        owned.push(ground_mesh);
        let ground_texture = match texture::procedural(TextureKind::Wood, &mut rng) {
            Some(image) => {
                let id = gpu
                    .create_texture("ground_texture", &image)
                    .map_err(scene_err)?;
                owned.push(id);
                Some(id)
            }
            None => None,
        };
        let ground = SceneObject {
            mesh: ground_mesh,
            texture: ground_texture,
            transform: Mat4::IDENTITY,
            color: color_from_hex(GROUND_TINT),
        };

        // Trees share one trunk and one foliage mesh
        let trunk_data = mesh::cylinder(0.2, 0.2, 1.0, 16);
        let foliage_data = mesh::cone(0.8, 2.0, 16);
        let tree_bounds = tree_local_bounds(&trunk_data, &foliage_data)?;
        let trunk_mesh = gpu.create_mesh("trunk", &trunk_data).map_err(scene_err)?;
        owned.push(trunk_mesh);
        let foliage_mesh = gpu
            .create_mesh("foliage", &foliage_data)
            .map_err(scene_err)?;
        owned.push(foliage_mesh);

        let obstacles = level
            .obstacles
            .iter()
            .map(|&position| Obstacle {
                position,
                trunk: SceneObject {
                    mesh: trunk_mesh,
                    texture: None,
                    transform: Mat4::from_translation(position + TRUNK_OFFSET),
                    color: color_from_hex(TRUNK_COLOR),
                },
                foliage: SceneObject {
                    mesh: foliage_mesh,
                    texture: None,
                    transform: Mat4::from_translation(position + FOLIAGE_OFFSET),
                    color: color_from_hex(FOLIAGE_COLOR),
                },
                bounds: tree_bounds.translated(position),
            })
            .collect::<Vec<_>>();

        for (i, obstacle) in obstacles.iter().enumerate() {
            log::debug!(
                "Level {} tree {} at ({:.1}, {:.1}) bounds {:?}..{:?}",
                level.id,
                i,
                obstacle.position.x,
                obstacle.position.z,
                obstacle.bounds.min,
                obstacle.bounds.max
            );
        }

        // Finish line
        let finish_mesh = gpu
            .create_mesh("finish", &mesh::plane(FINISH_SIZE.0, FINISH_SIZE.1))
            .map_err(scene_err)?;
        owned.push(finish_mesh);
        let finish = SceneObject {
            mesh: finish_mesh,
            texture: None,
            transform: Mat4::from_translation(level.finish_line + Vec3::Y * DECAL_LIFT),
            color: color_from_hex(FINISH_COLOR),
        };

        Ok(WorldHandle {
            generation,
            level: level.id,
            avatar,
            ground,
            finish,
            finish_line: level.finish_line,
            obstacles,
            pending_texture,
            owned: std::mem::take(owned),
        })
    }
}

/// Tree box relative to the tree origin, from the actual mesh vertices
fn tree_local_bounds(trunk: &MeshData, foliage: &MeshData) -> Result<Aabb, GameError> {
    let trunk = trunk
        .local_bounds()
        .ok_or_else(|| GameError::SceneBuild("empty trunk mesh".into()))?;
    let foliage = foliage
        .local_bounds()
        .ok_or_else(|| GameError::SceneBuild("empty foliage mesh".into()))?;
    Ok(trunk
        .translated(TRUNK_OFFSET)
        .union(&foliage.translated(FOLIAGE_OFFSET)))
}
