//! GPU resource seam
//!
//! The world builder and particle effect allocate through `GpuResources` and
//! keep only `ResourceId`s. The wgpu renderer implements it for real; the
//! headless implementation tracks live ids so teardown can be checked
//! without a device.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use image::RgbaImage;
use std::collections::BTreeMap;

use super::mesh::MeshData;
use crate::error::GameError;

/// Opaque handle to a GPU allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u64);

/// Per-instance data: model matrix columns + tint
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct InstanceData {
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
}

impl InstanceData {
    pub fn new(model: Mat4, color: [f32; 4]) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            color,
        }
    }
}

/// Allocation interface for meshes, textures and instance buffers
pub trait GpuResources {
    fn create_mesh(&mut self, label: &str, mesh: &MeshData) -> Result<ResourceId, GameError>;

    fn create_texture(&mut self, label: &str, image: &RgbaImage) -> Result<ResourceId, GameError>;

    fn create_instance_buffer(
        &mut self,
        label: &str,
        capacity: usize,
    ) -> Result<ResourceId, GameError>;

    /// Overwrite the start of an instance buffer
    fn write_instances(
        &mut self,
        id: ResourceId,
        instances: &[InstanceData],
    ) -> Result<(), GameError>;

    /// Free an allocation; unknown ids are ignored
    fn release(&mut self, id: ResourceId);
}

/// Kind of a tracked allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Mesh,
    Texture,
    InstanceBuffer { capacity: usize },
}

/// Device-free `GpuResources` used by tests and the native runner
#[derive(Debug, Default)]
pub struct HeadlessGpu {
    next_id: u64,
    live: BTreeMap<ResourceId, ResourceKind>,
    fail_countdown: Option<usize>,
    allocations: usize,
}

impl HeadlessGpu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let `successes` more allocations through, then fail the next one
    pub fn fail_after(&mut self, successes: usize) {
        self.fail_countdown = Some(successes);
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn is_live(&self, id: ResourceId) -> bool {
        self.live.contains_key(&id)
    }

    pub fn kind(&self, id: ResourceId) -> Option<ResourceKind> {
        self.live.get(&id).copied()
    }

    /// Total successful allocations since creation
    pub fn allocations(&self) -> usize {
        self.allocations
    }

    fn allocate(&mut self, label: &str, kind: ResourceKind) -> Result<ResourceId, GameError> {
        match self.fail_countdown {
            Some(0) => {
                self.fail_countdown = None;
                return Err(GameError::SceneBuild(format!(
                    "allocation of '{}' failed",
                    label
                )));
            }
            Some(n) => self.fail_countdown = Some(n - 1),
            None => {}
        }
        self.next_id += 1;
        let id = ResourceId(self.next_id);
        self.live.insert(id, kind);
        self.allocations += 1;
        Ok(id)
    }
}

impl GpuResources for HeadlessGpu {
    fn create_mesh(&mut self, label: &str, mesh: &MeshData) -> Result<ResourceId, GameError> {
        if mesh.indices.is_empty() {
            return Err(GameError::SceneBuild(format!("mesh '{}' is empty", label)));
        }
        self.allocate(label, ResourceKind::Mesh)
    }

    fn create_texture(&mut self, label: &str, image: &RgbaImage) -> Result<ResourceId, GameError> {
        if image.width() == 0 || image.height() == 0 {
            let message = format!("texture '{}' is empty", label);
            return Err(GameError::TextureLoad(message));
        }
        self.allocate(label, ResourceKind::Texture)
    }

    fn create_instance_buffer(
        &mut self,
        label: &str,
        capacity: usize,
    ) -> Result<ResourceId, GameError> {
        self.allocate(label, ResourceKind::InstanceBuffer { capacity })
    }

    fn write_instances(
        &mut self,
        id: ResourceId,
        instances: &[InstanceData],
    ) -> Result<(), GameError> {
        match self.live.get(&id) {
            Some(ResourceKind::InstanceBuffer { capacity }) if instances.len() <= *capacity => {
                Ok(())
            }
            Some(ResourceKind::InstanceBuffer { capacity }) => Err(GameError::TransientRender(
                format!("{} instances exceed capacity {}", instances.len(), capacity),
            )),
            _ => Err(GameError::TransientRender(format!(
                "instance buffer {:?} is not live",
                id
            ))),
        }
    }

    fn release(&mut self, id: ResourceId) {
        self.live.remove(&id);
    }
}
