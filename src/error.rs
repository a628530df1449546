//! Error taxonomy for the game
//!
//! Every stage of a frame returns `Result<_, GameError>`; the frame driver
//! decides which variants halt the loop and which are only logged.

/// Errors produced while building, running or drawing the game
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GameError {
    /// Drawing context or essential scene objects unavailable (fatal)
    #[error("initialization failed: {0}")]
    Initialization(String),
    /// World construction failed; the previous world stays in place
    #[error("scene build failed: {0}")]
    SceneBuild(String),
    /// Texture could not be loaded or decoded; rendering continues untextured
    #[error("texture load failed: {0}")]
    TextureLoad(String),
    /// A frame failed to render; the loop halts and the user is notified
    #[error("render error: {0}")]
    TransientRender(String),
    /// Requested level id is outside the configured catalog
    #[error("invalid level {0}")]
    InvalidLevel(u32),
    /// A level catalog violates the forward-ordering invariant
    #[error("invalid level catalog: {0}")]
    InvalidCatalog(String),
}

impl GameError {
    /// Whether this error stops the frame loop
    pub fn halts_loop(&self) -> bool {
        matches!(
            self,
            GameError::Initialization(_) | GameError::TransientRender(_)
        )
    }

    /// Whether the user needs a reload affordance to recover
    pub fn is_fatal(&self) -> bool {
        matches!(self, GameError::Initialization(_))
    }
}

impl From<image::ImageError> for GameError {
    fn from(err: image::ImageError) -> Self {
        GameError::TextureLoad(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_halting_classification() {
        assert!(GameError::Initialization("no gpu".into()).halts_loop());
        assert!(GameError::TransientRender("lost".into()).halts_loop());
        assert!(!GameError::SceneBuild("oom".into()).halts_loop());
        assert!(!GameError::TextureLoad("404".into()).halts_loop());
    }

    #[test]
    fn test_only_initialization_is_fatal() {
        assert!(GameError::Initialization("x".into()).is_fatal());
        assert!(!GameError::TransientRender("x".into()).is_fatal());
        assert_eq!(GameError::InvalidLevel(9).to_string(), "invalid level 9");
    }
}
