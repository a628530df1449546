//! Data-driven game balance
//!
//! The reference values live in `Default`; a JSON override can be supplied
//! at startup to experiment with pacing without recompiling.

use serde::{Deserialize, Serialize};

use crate::error::GameError;

/// Gameplay constants that are not tied to a particular level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Forward and lateral speed (units/second)
    pub speed: f32,
    /// Lateral position is clamped to [-lateral_limit, lateral_limit]
    pub lateral_limit: f32,
    /// Wall-clock interval between score increments (milliseconds)
    pub score_tick_ms: f64,
    /// Half width of the finish line on the lateral axis
    pub finish_half_width: f32,
    /// Length of the victory celebration (seconds)
    pub victory_duration: f32,
    /// Number of particles in the victory fountain
    pub particle_count: usize,
    /// Half extent of the avatar bounding box
    pub avatar_half_extent: f32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            speed: 5.0,
            lateral_limit: 5.0,
            score_tick_ms: 100.0,
            finish_half_width: 5.0,
            victory_duration: 5.0,
            particle_count: 100,
            avatar_half_extent: 0.4,
        }
    }
}

impl Tuning {
    /// Parse a tuning override; missing fields keep their reference value
    pub fn from_json(json: &str) -> Result<Self, GameError> {
        let tuning: Tuning = serde_json::from_str(json)
            .map_err(|e| GameError::Initialization(format!("bad tuning: {e}")))?;
        if tuning.score_tick_ms <= 0.0 || tuning.speed < 0.0 {
            return Err(GameError::Initialization(
                "tuning values must be positive".into(),
            ));
        }
        Ok(tuning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_override_keeps_defaults() {
        let tuning = Tuning::from_json(r#"{ "speed": 8.0 }"#).unwrap();
        assert_eq!(tuning.speed, 8.0);
        assert_eq!(tuning.score_tick_ms, 100.0);
        assert_eq!(tuning.particle_count, 100);
    }

    #[test]
    fn test_rejects_zero_tick() {
        assert!(Tuning::from_json(r#"{ "score_tick_ms": 0.0 }"#).is_err());
        assert!(Tuning::from_json("not json").is_err());
    }
}
