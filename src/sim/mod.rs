//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must stay deterministic:
//! - Time only enters through `TickInput`
//! - Seeded RNG only
//! - Stable iteration order (catalog order for obstacles)
//! - GPU work only through the `GpuResources` seam

pub mod camera;
pub mod collision;
pub mod input;
pub mod level;
pub mod particles;
pub mod state;
pub mod tick;

pub use camera::{Camera, CameraDirective, OrbitCamera, direct};
pub use collision::{Aabb, first_obstacle_hit, reaches_finish};
pub use input::{InputTracker, Lateral, lateral_for_key};
pub use level::{LevelCatalog, LevelDescriptor};
pub use particles::ParticleBurst;
pub use state::{
    Avatar, GameEvent, GameSnapshot, MovementIntent, PlayState, RunOutcome, SPAWN_POSITION, Session,
};
pub use tick::{Course, TickInput, advance_victory, begin_run, end_run, reset_session, tick};
