//! Game session state and core simulation types
//!
//! One `Session` is passed by `&mut` through every stage of a frame; nothing
//! else holds gameplay state between ticks.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::collision::Aabb;

/// Top-level game mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlayState {
    /// Waiting for the start command (free orbit camera)
    #[default]
    Idle,
    /// Avatar advancing through the course
    Playing,
    /// Final level cleared, awaiting restart
    Won,
    /// Hit an obstacle, awaiting restart
    Lost,
}

impl PlayState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayState::Idle => "idle",
            PlayState::Playing => "playing",
            PlayState::Won => "won",
            PlayState::Lost => "lost",
        }
    }

    /// Terminal states only leave through `restart`
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlayState::Won | PlayState::Lost)
    }
}

/// Outcome passed to the end-of-run transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Won,
    Lost,
}

/// Held lateral movement keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MovementIntent {
    pub left: bool,
    pub right: bool,
}

impl MovementIntent {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Fixed spawn position of the avatar
pub const SPAWN_POSITION: Vec3 = Vec3::new(0.0, 1.0, 0.0);

/// The player's cube
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Avatar {
    pub position: Vec3,
    /// Euler angles (radians), only animated during the victory spin
    pub rotation: Vec3,
    pub half_extent: f32,
}

impl Avatar {
    pub fn new(half_extent: f32) -> Self {
        Self {
            position: SPAWN_POSITION,
            rotation: Vec3::ZERO,
            half_extent,
        }
    }

    /// Back to the spawn pose with zero rotation
    pub fn reset(&mut self) {
        self.position = SPAWN_POSITION;
        self.rotation = Vec3::ZERO;
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_center_half_extent(self.position, self.half_extent)
    }
}

/// Events published by the state machine during a command or tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GameEvent {
    /// Entered a new play state
    StateChanged(PlayState),
    /// Score changed (every tick increment and every final publish)
    ScoreChanged(u32),
    /// High score exceeded
    HighScore(u32),
    /// Non-final level cleared; the world must be rebuilt for this level
    LevelAdvanced(u32),
    /// Final level cleared
    Victory,
    /// Avatar hit the obstacle with this index
    Collision(usize),
}

/// Observable state for UI collaborators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub play_state: PlayState,
    pub level: u32,
    pub score: u32,
    pub high_score: u32,
}

impl GameSnapshot {
    /// Level the start button should announce (`None` = plain "start")
    pub fn start_label_level(&self) -> Option<u32> {
        (self.level > 1).then_some(self.level)
    }
}

/// Complete mutable session state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub play_state: PlayState,
    /// Current level id (1-based)
    pub level: u32,
    pub score: u32,
    pub high_score: u32,
    pub intent: MovementIntent,
    /// True iff `play_state` is Won or Lost
    pub movement_stopped: bool,
    pub avatar: Avatar,
    /// Wall-clock time (ms) of the last score increment
    pub last_score_tick_ms: f64,
    /// Wall-clock time (ms) of the last played frame
    pub last_frame_ms: f64,
    /// Seconds since the final-level win, `None` outside the victory window
    pub victory_elapsed: Option<f32>,
}

impl Session {
    pub fn new(high_score: u32, avatar_half_extent: f32) -> Self {
        Self {
            play_state: PlayState::Idle,
            level: 1,
            score: 0,
            high_score,
            intent: MovementIntent::default(),
            movement_stopped: false,
            avatar: Avatar::new(avatar_half_extent),
            last_score_tick_ms: 0.0,
            last_frame_ms: 0.0,
            victory_elapsed: None,
        }
    }

    /// Record a score; raises the high score when exceeded
    pub fn set_score(&mut self, score: u32, events: &mut Vec<GameEvent>) {
        self.score = score;
        events.push(GameEvent::ScoreChanged(score));
        if score > self.high_score {
            self.high_score = score;
            events.push(GameEvent::HighScore(score));
        }
    }

    /// Enter a play state, keeping the stopped/intent invariants
    pub fn enter(&mut self, state: PlayState, events: &mut Vec<GameEvent>) {
        if state != PlayState::Playing {
            self.intent.clear();
        }
        self.movement_stopped = state.is_terminal();
        if state != PlayState::Won {
            self.victory_elapsed = None;
        }
        self.play_state = state;
        events.push(GameEvent::StateChanged(state));
    }

    /// Whether the victory celebration (spin, orbit camera, particles) is running
    pub fn victory_active(&self) -> bool {
        self.play_state == PlayState::Won && self.victory_elapsed.is_some()
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            play_state: self.play_state,
            level: self.level,
            score: self.score,
            high_score: self.high_score,
        }
    }
}
