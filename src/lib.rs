//! Cube Runner - A 3D obstacle-course runner
//!
//! Core modules:
//! - `sim`: Deterministic simulation (session state, movement, collisions, camera)
//! - `world`: Scene construction and GPU resource ownership
//! - `game`: Controller tying commands, simulation and world together
//! - `driver`: Frame timing and error aggregation
//! - `renderer`: WebGPU rendering pipeline
//! - `settings` / `tuning`: Persisted cosmetics and data-driven balance

#[cfg(target_arch = "wasm32")]
pub mod audio;
pub mod driver;
pub mod error;
pub mod game;
pub mod renderer;
pub mod settings;
pub mod sim;
pub mod tuning;
pub mod world;

pub use error::GameError;
pub use game::{Command, Game};
pub use settings::Settings;
pub use tuning::Tuning;
