//! Mesh generation for the scene primitives
//!
//! Every generator returns indexed triangle lists with per-vertex normals and
//! texture coordinates, centered on the local origin. Planes lie in XZ facing +Y.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use std::f32::consts::{PI, TAU};

use crate::sim::collision::Aabb;

/// Lit, textured vertex
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl MeshVertex {
    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.normalize_or_zero().to_array(),
            uv: uv.to_array(),
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }
}

/// CPU-side mesh ready for upload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u16>,
}

impl MeshData {
    /// Bounds of the vertex positions in local space
    pub fn local_bounds(&self) -> Option<Aabb> {
        Aabb::from_points(self.vertices.iter().map(MeshVertex::position))
    }

    /// Shift every vertex by `offset`
    pub fn translate(mut self, offset: Vec3) -> Self {
        for v in &mut self.vertices {
            v.position = (v.position() + offset).to_array();
        }
        self
    }

    /// Append another mesh, re-basing its indices
    pub fn merge(&mut self, other: &MeshData) {
        let base = self.vertices.len() as u16;
        self.vertices.extend_from_slice(&other.vertices);
        self.indices.extend(other.indices.iter().map(|i| i + base));
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    fn push_quad(&mut self, corners: [Vec3; 4], normal: Vec3) {
        let base = self.vertices.len() as u16;
        let uvs = [
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 0.0),
        ];
        for (corner, uv) in corners.into_iter().zip(uvs) {
            self.vertices.push(MeshVertex::new(corner, normal, uv));
        }
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }
}

/// Axis-aligned box
pub fn cuboid(width: f32, height: f32, depth: f32) -> MeshData {
    let (x, y, z) = (width * 0.5, height * 0.5, depth * 0.5);
    let mut mesh = MeshData::default();
    #[rustfmt::skip]
    let faces = [
        ([Vec3::new(-x, -y,  z), Vec3::new( x, -y,  z), Vec3::new( x,  y,  z), Vec3::new(-x,  y,  z)], Vec3::Z),
        ([Vec3::new( x, -y, -z), Vec3::new(-x, -y, -z), Vec3::new(-x,  y, -z), Vec3::new( x,  y, -z)], Vec3::NEG_Z),
        ([Vec3::new( x, -y,  z), Vec3::new( x, -y, -z), Vec3::new( x,  y, -z), Vec3::new( x,  y,  z)], Vec3::X),
        ([Vec3::new(-x, -y, -z), Vec3::new(-x, -y,  z), Vec3::new(-x,  y,  z), Vec3::new(-x,  y, -z)], Vec3::NEG_X),
        ([Vec3::new(-x,  y,  z), Vec3::new( x,  y,  z), Vec3::new( x,  y, -z), Vec3::new(-x,  y, -z)], Vec3::Y),
        ([Vec3::new(-x, -y, -z), Vec3::new( x, -y, -z), Vec3::new( x, -y,  z), Vec3::new(-x, -y,  z)], Vec3::NEG_Y),
    ];
    for (corners, normal) in faces {
        mesh.push_quad(corners, normal);
    }
    mesh
}

/// Horizontal plane facing +Y; `depth` runs along Z
pub fn plane(width: f32, depth: f32) -> MeshData {
    let (x, z) = (width * 0.5, depth * 0.5);
    let mut mesh = MeshData::default();
    mesh.push_quad(
        [
            Vec3::new(-x, 0.0, z),
            Vec3::new(x, 0.0, z),
            Vec3::new(x, 0.0, -z),
            Vec3::new(-x, 0.0, -z),
        ],
        Vec3::Y,
    );
    mesh
}

/// UV sphere
pub fn sphere(radius: f32, segments: u32, rings: u32) -> MeshData {
    let segments = segments.max(3);
    let rings = rings.max(2);
    let mut mesh = MeshData::default();

    for r in 0..=rings {
        let v = r as f32 / rings as f32;
        let phi = v * PI;
        for s in 0..=segments {
            let u = s as f32 / segments as f32;
            let theta = u * TAU;
            let normal = Vec3::new(phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin());
            mesh.vertices
                .push(MeshVertex::new(normal * radius, normal, Vec2::new(u, v)));
        }
    }

    let stride = (segments + 1) as u16;
    for r in 0..rings as u16 {
        for s in 0..segments as u16 {
            let a = r * stride + s;
            let b = a + stride;
            mesh.indices.extend_from_slice(&[a, a + 1, b, b, a + 1, b + 1]);
        }
    }
    mesh
}

/// Ring torus lying in XZ
pub fn torus(radius: f32, tube: f32, radial: u32, tubular: u32) -> MeshData {
    let radial = radial.max(3);
    let tubular = tubular.max(3);
    let mut mesh = MeshData::default();

    for j in 0..=radial {
        let v = j as f32 / radial as f32;
        let phi = v * TAU;
        for i in 0..=tubular {
            let u = i as f32 / tubular as f32;
            let theta = u * TAU;
            let ring_center = Vec3::new(theta.cos() * radius, 0.0, theta.sin() * radius);
            let normal = Vec3::new(
                theta.cos() * phi.cos(),
                phi.sin(),
                theta.sin() * phi.cos(),
            );
            mesh.vertices.push(MeshVertex::new(
                ring_center + normal * tube,
                normal,
                Vec2::new(u, v),
            ));
        }
    }

    let stride = (tubular + 1) as u16;
    for j in 0..radial as u16 {
        for i in 0..tubular as u16 {
            let a = j * stride + i;
            let b = a + stride;
            mesh.indices.extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
        }
    }
    mesh
}

/// Capped cylinder (or frustum) along Y, centered on the origin
pub fn cylinder(radius_top: f32, radius_bottom: f32, height: f32, segments: u32) -> MeshData {
    let segments = segments.max(3);
    let half = height * 0.5;
    let slope = (radius_bottom - radius_top) / height.max(f32::EPSILON);
    let mut mesh = MeshData::default();

    // Side
    for s in 0..=segments {
        let u = s as f32 / segments as f32;
        let theta = u * TAU;
        let (sin, cos) = theta.sin_cos();
        let normal = Vec3::new(cos, slope, sin);
        mesh.vertices.push(MeshVertex::new(
            Vec3::new(cos * radius_top, half, sin * radius_top),
            normal,
            Vec2::new(u, 0.0),
        ));
        mesh.vertices.push(MeshVertex::new(
            Vec3::new(cos * radius_bottom, -half, sin * radius_bottom),
            normal,
            Vec2::new(u, 1.0),
        ));
    }
    for s in 0..segments as u16 {
        let top = s * 2;
        let bottom = top + 1;
        mesh.indices
            .extend_from_slice(&[top, top + 2, bottom, bottom, top + 2, bottom + 2]);
    }

    // Caps (a zero radius cap degenerates to the apex and is skipped)
    for (radius, y, normal) in [(radius_top, half, Vec3::Y), (radius_bottom, -half, Vec3::NEG_Y)] {
        if radius <= 0.0 {
            continue;
        }
        let center = mesh.vertices.len() as u16;
        let hub = MeshVertex::new(Vec3::new(0.0, y, 0.0), normal, Vec2::splat(0.5));
        mesh.vertices.push(hub);
        for s in 0..=segments {
            let theta = s as f32 / segments as f32 * TAU;
            let (sin, cos) = theta.sin_cos();
            mesh.vertices.push(MeshVertex::new(
                Vec3::new(cos * radius, y, sin * radius),
                normal,
                Vec2::new(0.5 + cos * 0.5, 0.5 + sin * 0.5),
            ));
        }
        for s in 0..segments as u16 {
            let a = center + 1 + s;
            if normal.y > 0.0 {
                mesh.indices.extend_from_slice(&[center, a + 1, a]);
            } else {
                mesh.indices.extend_from_slice(&[center, a, a + 1]);
            }
        }
    }
    mesh
}

/// Cone along Y with its apex up
pub fn cone(radius: f32, height: f32, segments: u32) -> MeshData {
    cylinder(0.0, radius, height, segments)
}

/// Square pyramid: a four-sided cone
pub fn pyramid(radius: f32, height: f32) -> MeshData {
    cone(radius, height, 4)
}
