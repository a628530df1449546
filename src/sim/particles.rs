//! Victory particle fountain
//!
//! The pool is fixed at spawn time. Particles that fall below the ground are
//! recycled at the avatar instead of being freed, so the fountain keeps
//! running until the burst is disposed.

use glam::{Mat4, Vec3};
use rand::Rng;
use rand_pcg::Pcg32;

use crate::error::GameError;
use crate::world::mesh;
use crate::world::{GpuResources, InstanceData, ResourceId};

/// Per-frame downward velocity change
const GRAVITY_STEP: f32 = 0.001;
/// Per-frame multiplier on the green channel
const GREEN_FADE: f32 = 0.995;
/// Edge length of the cube drawn for each particle
pub const PARTICLE_SIZE: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub position: Vec3,
    /// Displacement per frame
    pub velocity: Vec3,
    pub color: [f32; 3],
}

fn fresh_green(rng: &mut Pcg32) -> f32 {
    0.8 + rng.random::<f32>() * 0.2
}

fn fresh_upward(rng: &mut Pcg32) -> f32 {
    rng.random::<f32>() * 0.2
}

/// Particle pool plus the GPU instance buffer it draws from
#[derive(Debug)]
pub struct ParticleBurst {
    particles: Vec<Particle>,
    rng: Pcg32,
    elapsed: f32,
    lifetime: f32,
    mesh: Option<ResourceId>,
    instances: Option<ResourceId>,
}

impl ParticleBurst {
    /// Spawn `count` particles around `origin` and allocate their GPU buffers
    pub fn spawn(
        origin: Vec3,
        count: usize,
        lifetime: f32,
        mut rng: Pcg32,
        gpu: &mut dyn GpuResources,
    ) -> Result<Self, GameError> {
        let particles = (0..count)
            .map(|_| {
                let jitter = Vec3::new(
                    rng.random::<f32>() - 0.5,
                    rng.random::<f32>() - 0.5,
                    rng.random::<f32>() - 0.5,
                ) * 2.0;
                let velocity = Vec3::new(
                    (rng.random::<f32>() - 0.5) * 0.2,
                    fresh_upward(&mut rng),
                    (rng.random::<f32>() - 0.5) * 0.2,
                );
                Particle {
                    position: origin + jitter,
                    velocity,
                    color: [1.0, fresh_green(&mut rng), 0.0],
                }
            })
            .collect();

        let mesh = gpu.create_mesh(
            "particle",
            &mesh::cuboid(PARTICLE_SIZE, PARTICLE_SIZE, PARTICLE_SIZE),
        )?;
        let instances = match gpu.create_instance_buffer("particle_instances", count.max(1)) {
            Ok(id) => id,
            Err(e) => {
                gpu.release(mesh);
                return Err(e);
            }
        };

        log::info!("Spawned {} victory particles", count);
        Ok(Self {
            particles,
            rng,
            elapsed: 0.0,
            lifetime,
            mesh: Some(mesh),
            instances: Some(instances),
        })
    }

    /// Advance one frame; `dt` only feeds the lifetime clock
    pub fn update(&mut self, avatar_height: f32, dt: f32) {
        self.elapsed += dt;
        for p in &mut self.particles {
            p.position += p.velocity;
            p.velocity.y -= GRAVITY_STEP;
            p.color[1] *= GREEN_FADE;

            if p.position.y < 0.0 {
                p.position.y = avatar_height;
                p.velocity.y = fresh_upward(&mut self.rng);
                p.color[1] = fresh_green(&mut self.rng);
            }
        }
    }

    /// Lifetime ran out
    pub fn expired(&self) -> bool {
        self.elapsed >= self.lifetime
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn mesh(&self) -> Option<ResourceId> {
        self.mesh
    }

    pub fn instance_buffer(&self) -> Option<ResourceId> {
        self.instances
    }

    pub fn instance_data(&self) -> Vec<InstanceData> {
        self.particles
            .iter()
            .map(|p| {
                InstanceData::new(
                    Mat4::from_translation(p.position),
                    [p.color[0], p.color[1], p.color[2], 1.0],
                )
            })
            .collect()
    }

    /// Push the current particle state to the instance buffer
    pub fn upload(&self, gpu: &mut dyn GpuResources) -> Result<(), GameError> {
        match self.instances {
            Some(id) => gpu.write_instances(id, &self.instance_data()),
            None => Ok(()),
        }
    }

    /// Release the GPU buffers. Safe to call twice.
    pub fn dispose(&mut self, gpu: &mut dyn GpuResources) {
        if let Some(id) = self.instances.take() {
            gpu.release(id);
        }
        if let Some(id) = self.mesh.take() {
            gpu.release(id);
        }
        self.particles.clear();
    }

    pub fn is_disposed(&self) -> bool {
        self.instances.is_none() && self.mesh.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::HeadlessGpu;
    use rand::SeedableRng;

    fn burst(gpu: &mut HeadlessGpu) -> ParticleBurst {
        ParticleBurst::spawn(
            Vec3::new(0.0, 1.0, -70.0),
            100,
            5.0,
            Pcg32::seed_from_u64(42),
            gpu,
        )
        .unwrap()
    }

    #[test]
    fn test_spawn_ranges() {
        let mut gpu = HeadlessGpu::new();
        let burst = burst(&mut gpu);
        assert_eq!(burst.particles().len(), 100);
        for p in burst.particles() {
            assert!((p.position.x).abs() <= 1.0);
            assert!((p.position.y - 1.0).abs() <= 1.0);
            assert!((p.position.z + 70.0).abs() <= 1.0);
            assert!(p.velocity.x.abs() <= 0.1 && p.velocity.z.abs() <= 0.1);
            assert!((0.0..0.2).contains(&p.velocity.y));
            assert_eq!(p.color[0], 1.0);
            assert!((0.8..=1.0).contains(&p.color[1]));
            assert_eq!(p.color[2], 0.0);
        }
        assert_eq!(gpu.live_count(), 2);
    }

    #[test]
    fn test_particles_recycle_above_ground() {
        let mut gpu = HeadlessGpu::new();
        let mut burst = burst(&mut gpu);
        for _ in 0..1000 {
            burst.update(1.0, 1.0 / 60.0);
            for p in burst.particles() {
                assert!(p.position.y >= 0.0);
            }
        }
        assert!(burst.upload(&mut gpu).is_ok());
    }

    #[test]
    fn test_per_frame_integration() {
        let mut gpu = HeadlessGpu::new();
        let mut burst = burst(&mut gpu);
        let before = burst.particles().to_vec();
        burst.update(1.0, 0.0);
        for (b, a) in before.iter().zip(burst.particles()) {
            // Spawned at or above ground with upward velocity, so nothing recycles yet
            assert!((a.position - (b.position + b.velocity)).length() < 1e-6);
            assert!((a.velocity.y - (b.velocity.y - GRAVITY_STEP)).abs() < 1e-6);
            assert!((a.color[1] - b.color[1] * GREEN_FADE).abs() < 1e-6);
        }
    }

    #[test]
    fn test_expiry_and_dispose() {
        let mut gpu = HeadlessGpu::new();
        let mut burst = burst(&mut gpu);
        for _ in 0..299 {
            burst.update(1.0, 1.0 / 60.0);
        }
        assert!(!burst.expired());
        burst.update(1.0, 0.1);
        assert!(burst.expired());

        burst.dispose(&mut gpu);
        burst.dispose(&mut gpu);
        assert!(burst.is_disposed());
        assert_eq!(gpu.live_count(), 0);
    }

    #[test]
    fn test_failed_spawn_releases_mesh() {
        let mut gpu = HeadlessGpu::new();
        gpu.fail_after(1);
        let result = ParticleBurst::spawn(Vec3::ONE, 10, 5.0, Pcg32::seed_from_u64(1), &mut gpu);
        assert!(result.is_err());
        assert_eq!(gpu.live_count(), 0);
    }
}
