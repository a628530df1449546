//! Frame driver
//!
//! Sits between the host's animation-frame callback and the game: derives
//! `dt`, runs `Game::frame`, issues the draw and folds every failure of the
//! tick into one `FrameOutcome`. A halting error stops the loop and raises a
//! notification, which keeps its own clock from frame timestamps.

use crate::error::GameError;
use crate::game::{FrameStatus, Game};
use crate::world::{GpuResources, HeadlessGpu};

/// Upper bound on a single frame step (seconds)
pub const MAX_DT: f32 = 0.1;
/// Notification stays up this long before closing on its own (ms)
pub const NOTIFICATION_TIMEOUT_MS: f64 = 5000.0;
/// Length of the closing phase (ms)
pub const NOTIFICATION_CLOSE_MS: f64 = 500.0;

/// Something the game can be drawn into
pub trait FrameTarget: GpuResources {
    fn draw(&mut self, game: &Game) -> Result<(), GameError>;
}

/// Headless draw: checks that everything the frame references is still live
impl FrameTarget for HeadlessGpu {
    fn draw(&mut self, game: &Game) -> Result<(), GameError> {
        let Some(world) = game.world() else {
            return Ok(());
        };
        let dangling = world
            .draw_list()
            .iter()
            .flat_map(|item| std::iter::once(item.mesh).chain(item.texture))
            .chain(game.particles().and_then(|p| p.instance_buffer()))
            .find(|id| !self.is_live(*id));
        match dangling {
            Some(id) => Err(GameError::TransientRender(format!(
                "draw references released resource {:?}",
                id
            ))),
            None => Ok(()),
        }
    }
}

/// Result of one driver step
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    Rendered,
    /// World was rebuilt; nothing drawn
    Skipped,
    /// Drawn, but with recoverable failures along the way
    Degraded(Vec<GameError>),
    /// Loop is stopped; no logic or drawing until reset
    Halted(GameError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationPhase {
    Visible,
    Closing,
    Gone,
}

/// User-facing error banner
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub message: String,
    /// Fatal errors offer a reload instead of closing on their own
    pub fatal: bool,
    shown_at_ms: f64,
    closing_since_ms: Option<f64>,
}

impl Notification {
    pub fn new(error: &GameError, now_ms: f64) -> Self {
        Self {
            message: error.to_string(),
            fatal: error.is_fatal(),
            shown_at_ms: now_ms,
            closing_since_ms: None,
        }
    }

    /// Start closing now (close button)
    pub fn dismiss(&mut self, now_ms: f64) {
        if self.closing_since_ms.is_none() {
            self.closing_since_ms = Some(now_ms);
        }
    }

    pub fn phase(&self, now_ms: f64) -> NotificationPhase {
        let closing_since = match self.closing_since_ms {
            Some(t) => Some(t),
            None if !self.fatal => Some(self.shown_at_ms + NOTIFICATION_TIMEOUT_MS),
            None => None,
        };
        match closing_since {
            Some(t) if now_ms >= t + NOTIFICATION_CLOSE_MS => NotificationPhase::Gone,
            Some(t) if now_ms >= t => NotificationPhase::Closing,
            _ => NotificationPhase::Visible,
        }
    }
}

#[derive(Debug, Default)]
pub struct FrameDriver {
    last_timestamp: Option<f64>,
    halted: Option<GameError>,
    notification: Option<Notification>,
}

impl FrameDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one frame at host timestamp `now_ms`
    pub fn frame<T: FrameTarget>(
        &mut self,
        now_ms: f64,
        game: &mut Game,
        target: &mut T,
    ) -> FrameOutcome {
        self.expire_notification(now_ms);
        if let Some(error) = &self.halted {
            return FrameOutcome::Halted(error.clone());
        }

        let dt = self.step_dt(now_ms);
        let mut errors = Vec::new();
        match game.frame(dt, now_ms, target) {
            Ok(FrameStatus::Skipped) => return FrameOutcome::Skipped,
            Ok(FrameStatus::Advanced) => {}
            Err(e) => errors.push(e),
        }
        if let Err(e) = target.draw(game) {
            errors.push(e);
        }

        if let Some(error) = errors.iter().find(|e| e.halts_loop()).cloned() {
            self.halt(error.clone(), now_ms);
            return FrameOutcome::Halted(error);
        }
        if errors.is_empty() {
            FrameOutcome::Rendered
        } else {
            for e in &errors {
                log::warn!("Frame degraded: {}", e);
            }
            FrameOutcome::Degraded(errors)
        }
    }

    /// Seconds since the previous frame, clamped to `[0, MAX_DT]`
    fn step_dt(&mut self, now_ms: f64) -> f32 {
        let dt = match self.last_timestamp {
            Some(previous) => ((now_ms - previous) / 1000.0) as f32,
            None => 0.0,
        };
        self.last_timestamp = Some(now_ms);
        dt.clamp(0.0, MAX_DT)
    }

    /// Report an error raised outside the frame (commands, startup).
    /// Texture failures fall back silently; everything else is shown.
    pub fn report(&mut self, error: &GameError, now_ms: f64) {
        if error.halts_loop() {
            self.halt(error.clone(), now_ms);
            return;
        }
        match error {
            GameError::TextureLoad(_) => log::warn!("{}", error),
            _ => {
                log::warn!("{}", error);
                self.notification = Some(Notification::new(error, now_ms));
            }
        }
    }

    fn halt(&mut self, error: GameError, now_ms: f64) {
        if error.is_fatal() {
            log::error!("Fatal error, frame loop stopped: {}", error);
        } else {
            log::error!("Frame loop halted: {}", error);
        }
        self.notification = Some(Notification::new(&error, now_ms));
        self.halted = Some(error);
    }

    fn expire_notification(&mut self, now_ms: f64) {
        if self
            .notification
            .as_ref()
            .is_some_and(|n| n.phase(now_ms) == NotificationPhase::Gone)
        {
            self.notification = None;
        }
    }

    /// Forget the previous timestamp (tab hidden), so the next frame starts at dt 0
    /// and the hidden time is not played or scored
    pub fn suspend(&mut self) {
        self.last_timestamp = None;
    }

    pub fn dismiss_notification(&mut self, now_ms: f64) {
        if let Some(notification) = self.notification.as_mut() {
            notification.dismiss(now_ms);
        }
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }

    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::SilentAudio;
    use crate::settings::Settings;
    use crate::sim::level::LevelCatalog;
    use crate::sim::state::PlayState;
    use crate::tuning::Tuning;
    use crate::world::ResourceId;

    fn setup() -> (Game, HeadlessGpu, FrameDriver) {
        let mut gpu = HeadlessGpu::new();
        let mut game = Game::new(
            Tuning::default(),
            LevelCatalog::standard(),
            Settings::default(),
            3,
            Box::new(SilentAudio),
        );
        game.init(&mut gpu).unwrap();
        (game, gpu, FrameDriver::new())
    }

    #[test]
    fn test_first_frame_has_zero_dt_and_long_gaps_clamp() {
        let (mut game, mut gpu, mut driver) = setup();
        game.start(0.0, &mut gpu).unwrap();

        let outcome = driver.frame(500.0, &mut game, &mut gpu);
        assert_eq!(outcome, FrameOutcome::Rendered);
        assert_eq!(game.avatar_position().z, 0.0);

        // A 2 s stall moves the avatar at most one clamped step
        driver.frame(2500.0, &mut game, &mut gpu);
        let z = game.avatar_position().z;
        assert!((z + 5.0 * MAX_DT).abs() < 1e-5, "z = {}", z);
    }

    #[test]
    fn test_suspend_resets_dt() {
        let (mut game, mut gpu, mut driver) = setup();
        game.start(0.0, &mut gpu).unwrap();
        driver.frame(0.0, &mut game, &mut gpu);
        driver.suspend();
        driver.frame(60_000.0, &mut game, &mut gpu);
        assert_eq!(game.avatar_position().z, 0.0);
    }

    #[test]
    fn test_hidden_time_and_stalls_do_not_score() {
        let (mut game, mut gpu, mut driver) = setup();
        game.start(0.0, &mut gpu).unwrap();
        driver.frame(0.0, &mut game, &mut gpu);
        driver.frame(16.0, &mut game, &mut gpu);
        assert_eq!(game.snapshot().score, 0);

        driver.suspend();
        driver.frame(60_000.0, &mut game, &mut gpu);
        let snapshot = game.snapshot();
        assert_eq!(snapshot.score, 0);
        assert_eq!(snapshot.high_score, 0);

        // A 2 s hitch is worth one clamped step of score
        driver.frame(62_000.0, &mut game, &mut gpu);
        assert_eq!(game.snapshot().score, 1);
    }

    #[test]
    fn test_dangling_draw_halts_with_notification() {
        let (mut game, mut gpu, mut driver) = setup();
        let avatar_mesh = game.world().unwrap().avatar.mesh;
        gpu.release(avatar_mesh);

        let outcome = driver.frame(16.0, &mut game, &mut gpu);
        assert!(matches!(
            outcome,
            FrameOutcome::Halted(GameError::TransientRender(_))
        ));
        assert!(driver.is_halted());
        let notification = driver.notification().unwrap();
        assert!(!notification.fatal);

        // Halted frames do no work and the banner closes on its own
        let before = game.snapshot();
        assert!(matches!(
            driver.frame(1000.0, &mut game, &mut gpu),
            FrameOutcome::Halted(_)
        ));
        assert_eq!(game.snapshot(), before);
        assert!(driver.notification().is_some());
        let closed_at = 16.0 + NOTIFICATION_TIMEOUT_MS + NOTIFICATION_CLOSE_MS;
        driver.frame(closed_at, &mut game, &mut gpu);
        assert!(driver.notification().is_none());
    }

    #[test]
    fn test_notification_phases() {
        let error = GameError::TransientRender("lost".into());
        let mut n = Notification::new(&error, 1000.0);
        assert_eq!(n.phase(1000.0), NotificationPhase::Visible);
        assert_eq!(n.phase(5999.0), NotificationPhase::Visible);
        assert_eq!(n.phase(6000.0), NotificationPhase::Closing);
        assert_eq!(n.phase(6500.0), NotificationPhase::Gone);

        n.dismiss(2000.0);
        assert_eq!(n.phase(2100.0), NotificationPhase::Closing);
        assert_eq!(n.phase(2500.0), NotificationPhase::Gone);
    }

    #[test]
    fn test_fatal_notification_stays_until_dismissed() {
        let error = GameError::Initialization("no adapter".into());
        let mut n = Notification::new(&error, 0.0);
        assert!(n.fatal);
        assert_eq!(n.phase(60_000.0), NotificationPhase::Visible);
        n.dismiss(60_000.0);
        assert_eq!(n.phase(60_500.0), NotificationPhase::Gone);
    }

    #[test]
    fn test_report_classifies_errors() {
        let mut driver = FrameDriver::new();
        driver.report(&GameError::TextureLoad("404".into()), 0.0);
        assert!(driver.notification().is_none());
        assert!(!driver.is_halted());

        driver.report(&GameError::SceneBuild("oom".into()), 0.0);
        assert!(driver.notification().is_some());
        assert!(!driver.is_halted());

        driver.report(&GameError::Initialization("no canvas".into()), 0.0);
        assert!(driver.is_halted());
        assert!(driver.notification().unwrap().fatal);
    }

    #[test]
    fn test_missing_world_frame_is_skipped() {
        let mut gpu = HeadlessGpu::new();
        let mut game = Game::new(
            Tuning::default(),
            LevelCatalog::standard(),
            Settings::default(),
            3,
            Box::new(SilentAudio),
        );
        let mut driver = FrameDriver::new();
        let outcome = driver.frame(0.0, &mut game, &mut gpu);
        assert_eq!(outcome, FrameOutcome::Skipped);
        assert!(game.world().is_some());
        let outcome = driver.frame(16.0, &mut game, &mut gpu);
        assert_eq!(outcome, FrameOutcome::Rendered);
        assert_eq!(game.snapshot().play_state, PlayState::Idle);
    }

    #[test]
    fn test_headless_draw_checks_particles() {
        let (mut game, mut gpu, _) = setup();
        assert!(gpu.draw(&game).is_ok());
        gpu.release(ResourceId(u64::MAX));
        assert!(gpu.draw(&game).is_ok());
        game.dispose(&mut gpu);
        assert!(gpu.draw(&game).is_ok());
    }
}
