//! Level catalog: obstacle layout and finish line per level
//!
//! The forward axis is -Z. The player spawns at z = 0 and every obstacle and
//! finish line must lie strictly ahead of it.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::GameError;

/// Static description of one course
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelDescriptor {
    pub id: u32,
    /// Tree positions, in authoring order
    pub obstacles: Vec<Vec3>,
    pub finish_line: Vec3,
}

/// Immutable set of levels indexed 1..=N
#[derive(Debug, Clone, PartialEq)]
pub struct LevelCatalog {
    levels: Vec<LevelDescriptor>,
}

fn tree(x: f32, z: f32) -> Vec3 {
    Vec3::new(x, 0.0, z)
}

impl LevelCatalog {
    /// Build a catalog from custom levels, checking the course invariants.
    /// Level ids are reassigned to 1..=N in the given order.
    pub fn new(levels: Vec<LevelDescriptor>) -> Result<Self, GameError> {
        if levels.is_empty() {
            return Err(GameError::InvalidCatalog("no levels".into()));
        }
        let mut levels = levels;
        for (i, level) in levels.iter_mut().enumerate() {
            level.id = i as u32 + 1;
            if level.finish_line.z >= 0.0 {
                return Err(GameError::InvalidCatalog(format!(
                    "level {}: finish line behind spawn",
                    level.id
                )));
            }
            for obstacle in &level.obstacles {
                if obstacle.z >= 0.0 || obstacle.z <= level.finish_line.z {
                    return Err(GameError::InvalidCatalog(format!(
                        "level {}: obstacle at z={} outside course",
                        level.id, obstacle.z
                    )));
                }
            }
        }
        Ok(Self { levels })
    }

    /// The three reference courses
    pub fn standard() -> Self {
        let levels = vec![
            LevelDescriptor {
                id: 1,
                obstacles: vec![
                    tree(-2.0, -5.0),
                    tree(2.0, -5.0),
                    tree(-1.0, -10.0),
                    tree(1.0, -10.0),
                    tree(-4.0, -20.0),
                    tree(4.0, -20.0),
                    tree(-2.0, -25.0),
                    tree(2.0, -25.0),
                    tree(0.0, -30.0),
                ],
                finish_line: Vec3::new(0.0, 0.0, -40.0),
            },
            LevelDescriptor {
                id: 2,
                obstacles: vec![
                    tree(-3.0, -5.0),
                    tree(3.0, -5.0),
                    tree(0.0, -10.0),
                    tree(-2.0, -15.0),
                    tree(2.0, -15.0),
                    tree(-4.0, -20.0),
                    tree(4.0, -20.0),
                    tree(-3.0, -25.0),
                    tree(3.0, -25.0),
                    tree(-2.0, -30.0),
                    tree(2.0, -30.0),
                    tree(0.0, -35.0),
                ],
                finish_line: Vec3::new(0.0, 0.0, -50.0),
            },
            LevelDescriptor {
                id: 3,
                obstacles: vec![
                    // zigzag
                    tree(-3.0, -5.0),
                    tree(3.0, -10.0),
                    tree(-3.0, -15.0),
                    tree(3.0, -20.0),
                    // tunnel
                    tree(-2.0, -25.0),
                    tree(-2.0, -30.0),
                    tree(2.0, -25.0),
                    tree(2.0, -30.0),
                    // slalom
                    tree(0.0, -35.0),
                    tree(-3.0, -40.0),
                    tree(3.0, -45.0),
                    tree(-3.0, -50.0),
                    tree(3.0, -55.0),
                    tree(0.0, -60.0),
                ],
                finish_line: Vec3::new(0.0, 0.0, -70.0),
            },
        ];
        Self { levels }
    }

    /// Look up a level by id (1-based)
    pub fn get(&self, id: u32) -> Result<&LevelDescriptor, GameError> {
        if id == 0 {
            return Err(GameError::InvalidLevel(id));
        }
        self.levels
            .get(id as usize - 1)
            .ok_or(GameError::InvalidLevel(id))
    }

    /// Number of configured levels (the id of the final level)
    pub fn len(&self) -> u32 {
        self.levels.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn is_final(&self, id: u32) -> bool {
        id >= self.len()
    }
}

impl Default for LevelCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_catalog_levels() {
        let catalog = LevelCatalog::standard();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.get(1).unwrap().obstacles.len(), 9);
        assert_eq!(catalog.get(2).unwrap().obstacles.len(), 12);
        assert_eq!(catalog.get(3).unwrap().obstacles.len(), 14);
        assert_eq!(catalog.get(3).unwrap().finish_line.z, -70.0);
    }

    #[test]
    fn test_invalid_level_ids() {
        let catalog = LevelCatalog::standard();
        assert_eq!(catalog.get(0), Err(GameError::InvalidLevel(0)));
        assert_eq!(catalog.get(4), Err(GameError::InvalidLevel(4)));
    }

    #[test]
    fn test_lookup_is_stable() {
        let catalog = LevelCatalog::standard();
        assert_eq!(catalog.get(2).unwrap(), catalog.get(2).unwrap());
        assert_eq!(LevelCatalog::standard().get(2), catalog.get(2));
    }

    #[test]
    fn test_standard_catalog_satisfies_invariants() {
        let standard = LevelCatalog::standard();
        let rebuilt = LevelCatalog::new(standard.levels.clone()).unwrap();
        assert_eq!(rebuilt, standard);
    }

    #[test]
    fn test_rejects_obstacle_beyond_finish() {
        let level = LevelDescriptor {
            id: 7,
            obstacles: vec![tree(0.0, -60.0)],
            finish_line: Vec3::new(0.0, 0.0, -40.0),
        };
        assert!(matches!(
            LevelCatalog::new(vec![level]),
            Err(GameError::InvalidCatalog(_))
        ));
        assert!(LevelCatalog::new(Vec::new()).is_err());
    }

    #[test]
    fn test_custom_catalog_renumbers() {
        let level = LevelDescriptor {
            id: 42,
            obstacles: vec![],
            finish_line: Vec3::new(0.0, 0.0, -10.0),
        };
        let catalog = LevelCatalog::new(vec![level]).unwrap();
        assert_eq!(catalog.get(1).unwrap().id, 1);
        assert!(catalog.is_final(1));
    }
}
