//! Collision detection against axis-aligned bounding boxes
//!
//! Obstacles are never rotated, so their local mesh bounds translate directly
//! into world space. Touching faces count as an intersection.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    /// Cube-shaped box around a center point
    pub fn from_center_half_extent(center: Vec3, half_extent: f32) -> Self {
        let h = Vec3::splat(half_extent);
        Self {
            min: center - h,
            max: center + h,
        }
    }

    /// Tightest box containing every point, `None` for an empty set
    pub fn from_points<I: IntoIterator<Item = Vec3>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));
        Some(Self { min, max })
    }

    /// Smallest box containing both
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn translated(&self, offset: Vec3) -> Aabb {
        Aabb {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }
}

/// Finish line reach test: forward coordinate passed AND within lateral half width
pub fn reaches_finish(avatar_pos: Vec3, finish_line: Vec3, half_width: f32) -> bool {
    avatar_pos.z <= finish_line.z && (avatar_pos.x - finish_line.x).abs() <= half_width
}

/// Index of the first obstacle box hit by the avatar box, if any
pub fn first_obstacle_hit(avatar: &Aabb, obstacles: &[Aabb]) -> Option<usize> {
    obstacles.iter().position(|b| avatar.intersects(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intersects_overlap_and_touch() {
        let a = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let b = Aabb::new(Vec3::splat(0.5), Vec3::splat(2.0));
        let touching = Aabb::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 1.0, 1.0));
        let apart = Aabb::new(Vec3::splat(1.1), Vec3::splat(2.0));
        assert!(a.intersects(&b));
        assert!(a.intersects(&touching));
        assert!(!a.intersects(&apart));
    }

    #[test]
    fn test_from_points() {
        let aabb = Aabb::from_points([
            Vec3::new(-1.0, 2.0, 0.0),
            Vec3::new(3.0, -1.0, 0.5),
            Vec3::new(0.0, 0.0, -2.0),
        ])
        .unwrap();
        assert_eq!(aabb.min, Vec3::new(-1.0, -1.0, -2.0));
        assert_eq!(aabb.max, Vec3::new(3.0, 2.0, 0.5));
        assert!(Aabb::from_points(std::iter::empty()).is_none());
    }

    #[test]
    fn test_new_orders_corners() {
        let aabb = Aabb::new(Vec3::ONE, Vec3::ZERO);
        assert_eq!(aabb.min, Vec3::ZERO);
        assert_eq!(aabb.center(), Vec3::splat(0.5));
    }

    #[test]
    fn test_finish_requires_both_conditions() {
        let finish = Vec3::new(0.0, 0.0, -40.0);
        assert!(reaches_finish(Vec3::new(0.0, 1.0, -40.0), finish, 5.0));
        assert!(reaches_finish(Vec3::new(-5.0, 1.0, -40.1), finish, 5.0));
        assert!(!reaches_finish(Vec3::new(0.0, 1.0, -39.9), finish, 5.0));
        assert!(!reaches_finish(Vec3::new(5.5, 1.0, -41.0), finish, 5.0));
    }

    #[test]
    fn test_first_obstacle_hit() {
        let avatar = Aabb::from_center_half_extent(Vec3::new(0.0, 1.0, -5.0), 0.4);
        let far = Aabb::from_center_half_extent(Vec3::new(3.0, 1.0, -5.0), 0.8);
        let near = Aabb::from_center_half_extent(Vec3::new(0.5, 1.0, -5.0), 0.8);
        assert_eq!(first_obstacle_hit(&avatar, &[far, near]), Some(1));
        assert_eq!(first_obstacle_hit(&avatar, &[far]), None);
    }
}
