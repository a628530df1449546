//! Game controller
//!
//! Owns the session, the current world and the particle burst, and is the
//! only thing that mutates them. Commands come from the UI, key events from
//! the host, and `frame` runs one step of the loop: tick, transitions,
//! victory clock, camera, particles.

use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use crate::error::GameError;
use crate::settings::Settings;
use crate::sim::camera::{self, Camera, CameraDirective, OrbitCamera};
use crate::sim::input::InputTracker;
use crate::sim::level::LevelCatalog;
use crate::sim::particles::ParticleBurst;
use crate::sim::state::{GameEvent, GameSnapshot, PlayState, Session};
use crate::sim::tick::{self, TickInput};
use crate::tuning::Tuning;
use crate::world::{
    Cosmetics, GpuResources, ObjectShape, TextureKind, TextureRequest, WorldBuilder, WorldHandle,
    texture,
};

/// UI intents
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    StartGame,
    RestartGame,
    SetShape(ObjectShape),
    /// Texture kind plus the image URL for `TextureKind::Custom`
    SetTexture(TextureKind, Option<String>),
    RandomizeColor,
}

/// Audio cues fired on run end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundCue {
    Win,
    Lose,
}

/// Fire-and-forget audio output
pub trait AudioSink {
    fn play(&mut self, cue: SoundCue);
}

/// Discards every cue
#[derive(Debug, Default)]
pub struct SilentAudio;

impl AudioSink for SilentAudio {
    fn play(&mut self, cue: SoundCue) {
        log::debug!("Audio cue {:?} (silent)", cue);
    }
}

/// Result of a successful `Game::frame`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// Logic advanced; draw the frame
    Advanced,
    /// The world was missing and has been rebuilt; nothing to draw this frame
    Skipped,
}

pub struct Game {
    tuning: Tuning,
    catalog: LevelCatalog,
    session: Session,
    input: InputTracker,
    builder: WorldBuilder,
    world: Option<WorldHandle>,
    particles: Option<ParticleBurst>,
    cosmetics: Cosmetics,
    settings: Settings,
    camera: Camera,
    orbit: OrbitCamera,
    rng: Pcg32,
    audio: Box<dyn AudioSink>,
    events: Vec<GameEvent>,
}

impl Game {
    pub fn new(
        tuning: Tuning,
        catalog: LevelCatalog,
        settings: Settings,
        seed: u64,
        audio: Box<dyn AudioSink>,
    ) -> Self {
        let session = Session::new(settings.high_score, tuning.avatar_half_extent);
        let cosmetics = Cosmetics {
            shape: settings.object_type,
            color: settings.cube_color,
            ..Cosmetics::default()
        };
        Self {
            tuning,
            catalog,
            session,
            input: InputTracker,
            builder: WorldBuilder::new(seed),
            world: None,
            particles: None,
            cosmetics,
            settings,
            camera: Camera::default(),
            orbit: OrbitCamera::default(),
            rng: Pcg32::seed_from_u64(seed),
            audio,
            events: Vec::new(),
        }
    }

    /// Build the initial scene. Failure here is fatal for the page.
    pub fn init(&mut self, gpu: &mut dyn GpuResources) -> Result<(), GameError> {
        self.rebuild_world(gpu).map_err(|e| match e {
            GameError::Initialization(_) => e,
            other => GameError::Initialization(other.to_string()),
        })?;
        log::info!(
            "Game ready: level {} of {}, high score {}",
            self.session.level,
            self.catalog.len(),
            self.session.high_score
        );
        Ok(())
    }

    pub fn handle(
        &mut self,
        command: Command,
        now_ms: f64,
        gpu: &mut dyn GpuResources,
    ) -> Result<(), GameError> {
        log::debug!("Command {:?}", command);
        match command {
            Command::StartGame => self.start(now_ms, gpu),
            Command::RestartGame => self.restart(now_ms, gpu),
            Command::SetShape(shape) => self.set_shape(shape, gpu),
            Command::SetTexture(kind, url) => self.set_texture(kind, url, gpu),
            Command::RandomizeColor => {
                self.randomize_color();
                Ok(())
            }
        }
    }

    /// Begin a run on the current level; ignored unless idle
    pub fn start(&mut self, now_ms: f64, gpu: &mut dyn GpuResources) -> Result<(), GameError> {
        if self.session.play_state != PlayState::Idle {
            log::debug!("Start ignored in {}", self.session.play_state.as_str());
            return Ok(());
        }
        if let Err(e) = self.rebuild_world(gpu) {
            log::warn!("Start aborted, staying idle: {}", e);
            return Err(e);
        }
        tick::begin_run(&mut self.session, now_ms, &mut self.events);
        self.orbit.enabled = false;
        self.orbit.reset();
        self.camera.look_at(camera::START_EYE, camera::START_TARGET);
        self.sync_world();
        log::info!("Run started on level {}", self.session.level);
        Ok(())
    }

    /// Back to level 1 after a win or loss; ignored otherwise
    pub fn restart(&mut self, now_ms: f64, gpu: &mut dyn GpuResources) -> Result<(), GameError> {
        if !self.session.play_state.is_terminal() {
            log::debug!("Restart ignored in {}", self.session.play_state.as_str());
            return Ok(());
        }
        let handle = match self.build_world(1, gpu) {
            Ok(handle) => handle,
            Err(e) => {
                log::warn!("Restart aborted, keeping the finished run: {}", e);
                return Err(e);
            }
        };
        self.dispose_particles(gpu);
        tick::reset_session(&mut self.session, now_ms, &mut self.events);
        self.install_world(handle, gpu);
        self.orbit.reset();
        self.camera.look_at(camera::START_EYE, camera::START_TARGET);
        log::info!("Game restarted");
        Ok(())
    }

    pub fn set_shape(
        &mut self,
        shape: ObjectShape,
        gpu: &mut dyn GpuResources,
    ) -> Result<(), GameError> {
        self.cosmetics.shape = shape;
        self.settings.object_type = shape;
        self.settings.save();
        self.rebuild_world(gpu)
    }

    pub fn set_texture(
        &mut self,
        kind: TextureKind,
        url: Option<String>,
        gpu: &mut dyn GpuResources,
    ) -> Result<(), GameError> {
        self.cosmetics.texture = kind;
        self.cosmetics.custom_url = match kind {
            TextureKind::Custom => url,
            _ => None,
        };
        self.rebuild_world(gpu)
    }

    pub fn randomize_color(&mut self) {
        let color = self.rng.random_range(0..0x0100_0000u32);
        self.cosmetics.color = color;
        self.settings.cube_color = color;
        self.settings.save();
        if let Some(world) = self.world.as_mut() {
            world.set_avatar_color(color);
        }
        log::info!("Avatar color set to #{:06x}", color);
    }

    /// Custom texture request the host still has to fetch
    pub fn take_texture_request(&mut self) -> Option<TextureRequest> {
        let world = self.world.as_mut()?;
        world.take_texture_request()
    }

    /// Deliver the bytes of a custom texture fetch.
    ///
    /// Results for an older build are dropped. A failed load leaves the
    /// avatar untextured and is reported as `TextureLoad`; play continues.
    pub fn apply_custom_texture(
        &mut self,
        generation: u64,
        bytes: Result<Vec<u8>, GameError>,
        gpu: &mut dyn GpuResources,
    ) -> Result<bool, GameError> {
        let Some(world) = self.world.as_mut() else {
            return Ok(false);
        };
        if world.generation != generation {
            log::debug!(
                "Dropping texture for generation {} (current {})",
                generation,
                world.generation
            );
            return Ok(false);
        }
        let image = match bytes.and_then(|b| texture::decode(&b)) {
            Ok(image) => image,
            Err(e) => {
                let e = match e {
                    GameError::TextureLoad(_) => e,
                    other => GameError::TextureLoad(other.to_string()),
                };
                log::warn!("Custom texture unavailable, continuing untextured: {}", e);
                return Err(e);
            }
        };
        world.apply_avatar_texture(generation, &image, gpu)
    }

    pub fn on_key_down(&mut self, key: &str) -> bool {
        self.input.on_key_down(key, &mut self.session)
    }

    pub fn on_key_up(&mut self, key: &str) -> bool {
        self.input.on_key_up(key, &mut self.session)
    }

    pub fn pointer_drag(&mut self, dx: f32, dy: f32) {
        self.orbit.drag(dx, dy);
    }

    pub fn wheel(&mut self, delta: f32) {
        self.orbit.zoom(delta);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.camera.set_aspect(width, height);
    }

    /// One step of the loop
    pub fn frame(
        &mut self,
        dt: f32,
        now_ms: f64,
        gpu: &mut dyn GpuResources,
    ) -> Result<FrameStatus, GameError> {
        if self.world.is_none() {
            log::warn!("World missing, rebuilding level {}", self.session.level);
            self.rebuild_world(gpu)?;
            return Ok(FrameStatus::Skipped);
        }

        let events = self.step(dt, now_ms);
        let transition = self.apply_events(&events, gpu);
        self.events.extend(events);

        if tick::advance_victory(&mut self.session, &self.tuning, dt) {
            log::info!("Victory celebration finished");
        }

        self.direct_camera();
        let particles = self.update_particles(dt, gpu);
        self.sync_world();

        transition.and(particles).map(|_| FrameStatus::Advanced)
    }

    fn step(&mut self, dt: f32, now_ms: f64) -> Vec<GameEvent> {
        let Some(world) = self.world.as_ref() else {
            return Vec::new();
        };
        let bounds = world.obstacle_bounds();
        let course = world.course(&bounds, self.catalog.is_final(self.session.level));
        tick::tick(
            &mut self.session,
            &course,
            &self.tuning,
            &TickInput { dt, now_ms },
        )
    }

    /// Side effects of simulation events: audio, particles, persistence, rebuilds
    fn apply_events(
        &mut self,
        events: &[GameEvent],
        gpu: &mut dyn GpuResources,
    ) -> Result<(), GameError> {
        let mut result = Ok(());
        for event in events {
            match *event {
                GameEvent::HighScore(score) => {
                    self.settings.high_score = score;
                    self.settings.save();
                }
                GameEvent::StateChanged(PlayState::Lost) => {
                    log::info!("Run lost at score {}", self.session.score);
                    self.audio.play(SoundCue::Lose);
                }
                GameEvent::Victory => {
                    log::info!("All levels cleared, score {}", self.session.score);
                    self.audio.play(SoundCue::Win);
                    if let Err(e) = self.spawn_particles(gpu) {
                        log::warn!("Victory particles unavailable: {}", e);
                    }
                }
                GameEvent::LevelAdvanced(level) => {
                    log::info!("Level cleared, advancing to level {}", level);
                    self.audio.play(SoundCue::Win);
                    if let Err(e) = self.rebuild_world(gpu) {
                        log::warn!("Level {} build failed: {}", level, e);
                        result = Err(e);
                    }
                }
                _ => {}
            }
        }
        result
    }

    fn direct_camera(&mut self) {
        let directive = camera::direct(
            self.session.play_state,
            &self.session.avatar,
            self.session.victory_elapsed,
        );
        if directive == CameraDirective::OrbitControl {
            self.orbit.target = self.session.avatar.position;
        } else {
            self.orbit.enabled = false;
        }
        self.camera.apply(directive, &mut self.orbit);
    }

    fn spawn_particles(&mut self, gpu: &mut dyn GpuResources) -> Result<(), GameError> {
        self.dispose_particles(gpu);
        let rng = Pcg32::seed_from_u64(self.rng.random());
        let burst = ParticleBurst::spawn(
            self.session.avatar.position,
            self.tuning.particle_count,
            self.tuning.victory_duration,
            rng,
            gpu,
        )?;
        self.particles = Some(burst);
        Ok(())
    }

    fn update_particles(&mut self, dt: f32, gpu: &mut dyn GpuResources) -> Result<(), GameError> {
        let Some(burst) = self.particles.as_mut() else {
            return Ok(());
        };
        if self.session.play_state != PlayState::Won || burst.expired() {
            self.dispose_particles(gpu);
            return Ok(());
        }
        let height = self.session.avatar.position.y;
        burst.update(if height > 0.0 { height } else { 1.0 }, dt);
        burst.upload(gpu)
    }

    fn dispose_particles(&mut self, gpu: &mut dyn GpuResources) {
        if let Some(mut burst) = self.particles.take() {
            burst.dispose(gpu);
            log::debug!("Victory particles released");
        }
    }

    /// Build the world for the current level and cosmetics, then swap it in.
    /// On failure the current world is kept as is.
    fn rebuild_world(&mut self, gpu: &mut dyn GpuResources) -> Result<(), GameError> {
        let handle = self.build_world(self.session.level, gpu)?;
        self.install_world(handle, gpu);
        Ok(())
    }

    fn build_world(
        &mut self,
        level: u32,
        gpu: &mut dyn GpuResources,
    ) -> Result<WorldHandle, GameError> {
        let level = self.catalog.get(level)?;
        self.builder.build(level, &self.cosmetics, gpu)
    }

    /// Swap in a freshly built world, releasing the previous one
    fn install_world(&mut self, mut handle: WorldHandle, gpu: &mut dyn GpuResources) {
        handle.sync_avatar(&self.session.avatar);
        if let Some(mut previous) = self.world.replace(handle) {
            previous.dispose(gpu);
        }
    }

    fn sync_world(&mut self) {
        if let Some(world) = self.world.as_mut() {
            world.sync_avatar(&self.session.avatar);
        }
    }

    /// Release every GPU resource the game owns
    pub fn dispose(&mut self, gpu: &mut dyn GpuResources) {
        self.dispose_particles(gpu);
        if let Some(mut world) = self.world.take() {
            world.dispose(gpu);
        }
        log::info!("Game resources released");
    }

    /// Events published since the last drain
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn snapshot(&self) -> GameSnapshot {
        self.session.snapshot()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn world(&self) -> Option<&WorldHandle> {
        self.world.as_ref()
    }

    pub fn particles(&self) -> Option<&ParticleBurst> {
        self.particles.as_ref()
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn cosmetics(&self) -> &Cosmetics {
        &self.cosmetics
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn avatar_position(&self) -> Vec3 {
        self.session.avatar.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::level::LevelDescriptor;
    use crate::world::HeadlessGpu;
    use std::cell::RefCell;
    use std::rc::Rc;

    const FRAME_MS: f64 = 1000.0 / 60.0;

    #[derive(Default, Clone)]
    struct RecordingAudio(Rc<RefCell<Vec<SoundCue>>>);

    impl AudioSink for RecordingAudio {
        fn play(&mut self, cue: SoundCue) {
            self.0.borrow_mut().push(cue);
        }
    }

    fn game_with(catalog: LevelCatalog) -> (Game, HeadlessGpu, RecordingAudio) {
        let audio = RecordingAudio::default();
        let mut gpu = HeadlessGpu::new();
        let mut game = Game::new(
            Tuning::default(),
            catalog,
            Settings::default(),
            11,
            Box::new(audio.clone()),
        );
        game.init(&mut gpu).unwrap();
        (game, gpu, audio)
    }

    /// Two short courses with nothing on the straight path
    fn clear_catalog() -> LevelCatalog {
        LevelCatalog::new(vec![
            LevelDescriptor {
                id: 1,
                obstacles: vec![Vec3::new(-4.0, 0.0, -5.0), Vec3::new(4.0, 0.0, -8.0)],
                finish_line: Vec3::new(0.0, 0.0, -10.0),
            },
            LevelDescriptor {
                id: 2,
                obstacles: vec![Vec3::new(4.0, 0.0, -5.0)],
                finish_line: Vec3::new(0.0, 0.0, -10.0),
            },
        ])
        .unwrap()
    }

    /// Run frames until the state leaves Playing or the frame budget runs out
    fn run(game: &mut Game, gpu: &mut HeadlessGpu, now: &mut f64, frames: usize) {
        for _ in 0..frames {
            *now += FRAME_MS;
            game.frame((FRAME_MS / 1000.0) as f32, *now, gpu).unwrap();
            if game.snapshot().play_state != PlayState::Playing {
                break;
            }
        }
    }

    #[test]
    fn test_clear_path_advances_to_level_two() {
        let (mut game, mut gpu, audio) = game_with(clear_catalog());
        let mut now = 1000.0;
        game.start(now, &mut gpu).unwrap();
        run(&mut game, &mut gpu, &mut now, 600);

        let snapshot = game.snapshot();
        assert_eq!(snapshot.play_state, PlayState::Idle);
        assert_eq!(snapshot.level, 2);
        // 10 units at 5 u/s is 2 s of wall-clock time, one point per 100 ms
        let score = snapshot.score;
        assert!((19..=20).contains(&score), "score {}", score);
        assert_eq!(snapshot.start_label_level(), Some(2));
        assert_eq!(audio.0.borrow().as_slice(), &[SoundCue::Win]);

        let world = game.world().unwrap();
        assert_eq!(world.level, 2);
        assert_eq!(world.obstacles.len(), 1);
        assert!(!game.session().movement_stopped);
    }

    #[test]
    fn test_lateral_move_into_tree_loses() {
        let (mut game, mut gpu, audio) = game_with(LevelCatalog::standard());
        let mut now = 0.0;
        game.start(now, &mut gpu).unwrap();
        assert!(game.on_key_down("a"));
        run(&mut game, &mut gpu, &mut now, 600);

        let frozen = game.snapshot();
        assert_eq!(frozen.play_state, PlayState::Lost);
        assert!(game.session().movement_stopped);
        assert_eq!(audio.0.borrow().as_slice(), &[SoundCue::Lose]);

        // Score stays frozen while lost
        let position = game.avatar_position();
        run(&mut game, &mut gpu, &mut now, 30);
        assert_eq!(game.snapshot().score, frozen.score);
        assert_eq!(game.avatar_position(), position);
        assert!(!game.on_key_down("d"));
    }

    #[test]
    fn test_failing_custom_texture_keeps_playing() {
        let (mut game, mut gpu, _) = game_with(LevelCatalog::standard());
        let url = Some("missing.png".into());
        let command = Command::SetTexture(TextureKind::Custom, url);
        game.handle(command, 0.0, &mut gpu).unwrap();
        game.start(0.0, &mut gpu).unwrap();
        let request = game.take_texture_request().unwrap();

        let result = game.apply_custom_texture(
            request.generation,
            Err(GameError::TextureLoad("404".into())),
            &mut gpu,
        );
        assert!(matches!(result, Err(GameError::TextureLoad(_))));
        assert!(game.world().unwrap().avatar.texture.is_none());

        let mut now = 0.0;
        run(&mut game, &mut gpu, &mut now, 10);
        assert_eq!(game.snapshot().play_state, PlayState::Playing);
        assert!(game.avatar_position().z < 0.0);
    }

    #[test]
    fn test_custom_texture_from_stale_build_is_dropped() {
        let (mut game, mut gpu, _) = game_with(LevelCatalog::standard());
        let url = Some("a.png".into());
        game.set_texture(TextureKind::Custom, url, &mut gpu).unwrap();
        let request = game.take_texture_request().unwrap();
        game.set_shape(ObjectShape::Sphere, &mut gpu).unwrap();
        let bytes = Ok(vec![1, 2, 3]);
        let applied = game.apply_custom_texture(request.generation, bytes, &mut gpu);
        assert!(!applied.unwrap());
    }

    #[test]
    fn test_final_win_spawns_particles_and_restart_cleans_up() {
        let catalog = LevelCatalog::new(vec![LevelDescriptor {
            id: 1,
            obstacles: vec![Vec3::new(4.0, 0.0, -2.0)],
            finish_line: Vec3::new(0.0, 0.0, -3.0),
        }])
        .unwrap();
        let (mut game, mut gpu, audio) = game_with(catalog);
        let mut now = 0.0;
        game.start(now, &mut gpu).unwrap();
        run(&mut game, &mut gpu, &mut now, 120);

        assert_eq!(game.snapshot().play_state, PlayState::Won);
        assert!(game.particles().is_some());
        assert!(game.session().victory_active());
        assert_eq!(audio.0.borrow().as_slice(), &[SoundCue::Win]);

        game.handle(Command::RestartGame, now, &mut gpu).unwrap();
        let snapshot = game.snapshot();
        assert_eq!(snapshot.play_state, PlayState::Idle);
        assert_eq!(snapshot.level, 1);
        assert_eq!(snapshot.score, 0);
        assert!(!game.session().movement_stopped);
        assert!(game.particles().is_none());
        assert_eq!(gpu.live_count(), game.world().unwrap().resource_count());
    }

    #[test]
    fn test_failed_restart_keeps_finished_run() {
        let (mut game, mut gpu, _) = game_with(clear_catalog());
        let mut now = 0.0;
        game.start(now, &mut gpu).unwrap();
        run(&mut game, &mut gpu, &mut now, 600);
        assert_eq!(game.snapshot().level, 2);

        // Straight into the level 2 tree
        game.start(now, &mut gpu).unwrap();
        game.session.avatar.position.x = 4.0;
        run(&mut game, &mut gpu, &mut now, 600);
        assert_eq!(game.snapshot().play_state, PlayState::Lost);
        let score = game.snapshot().score;
        let generation = game.world().unwrap().generation;

        gpu.fail_after(2);
        let result = game.handle(Command::RestartGame, now, &mut gpu);
        assert!(matches!(result, Err(GameError::SceneBuild(_))));
        let snapshot = game.snapshot();
        assert_eq!(snapshot.play_state, PlayState::Lost);
        assert_eq!(snapshot.level, 2);
        assert_eq!(snapshot.score, score);
        assert_eq!(game.world().unwrap().generation, generation);
        assert_eq!(gpu.live_count(), game.world().unwrap().resource_count());

        game.handle(Command::RestartGame, now, &mut gpu).unwrap();
        assert_eq!(game.snapshot().level, 1);
        assert_eq!(game.world().unwrap().level, 1);
    }

    #[test]
    fn test_victory_particles_expire() {
        let catalog = LevelCatalog::new(vec![LevelDescriptor {
            id: 1,
            obstacles: Vec::new(),
            finish_line: Vec3::new(0.0, 0.0, -1.0),
        }])
        .unwrap();
        let (mut game, mut gpu, _) = game_with(catalog);
        let mut now = 0.0;
        game.start(now, &mut gpu).unwrap();
        run(&mut game, &mut gpu, &mut now, 60);
        assert!(game.particles().is_some());

        for _ in 0..(6 * 60) {
            now += FRAME_MS;
            game.frame((FRAME_MS / 1000.0) as f32, now, &mut gpu).unwrap();
        }
        assert!(game.particles().is_none());
        assert!(!game.session().victory_active());
        assert_eq!(game.snapshot().play_state, PlayState::Won);
    }

    #[test]
    fn test_failed_start_stays_idle_with_previous_world() {
        let (mut game, mut gpu, _) = game_with(LevelCatalog::standard());
        let generation = game.world().unwrap().generation;
        gpu.fail_after(2);
        let result = game.start(0.0, &mut gpu);
        assert!(matches!(result, Err(GameError::SceneBuild(_))));
        assert_eq!(game.snapshot().play_state, PlayState::Idle);
        assert_eq!(game.world().unwrap().generation, generation);
        assert_eq!(gpu.live_count(), game.world().unwrap().resource_count());
    }

    #[test]
    fn test_repeated_rebuilds_do_not_leak() {
        let (mut game, mut gpu, _) = game_with(LevelCatalog::standard());
        for shape in ObjectShape::ALL {
            game.handle(Command::SetShape(shape), 0.0, &mut gpu).unwrap();
            for kind in [TextureKind::Wood, TextureKind::None] {
                let command = Command::SetTexture(kind, None);
                game.handle(command, 0.0, &mut gpu).unwrap();
            }
        }
        assert_eq!(gpu.live_count(), game.world().unwrap().resource_count());
        game.dispose(&mut gpu);
        assert_eq!(gpu.live_count(), 0);
    }

    #[test]
    fn test_missing_world_is_rebuilt_and_frame_skipped() {
        let (mut game, mut gpu, _) = game_with(LevelCatalog::standard());
        game.start(0.0, &mut gpu).unwrap();
        if let Some(mut world) = game.world.take() {
            world.dispose(&mut gpu);
        }
        assert_eq!(
            game.frame(0.016, 16.0, &mut gpu).unwrap(),
            FrameStatus::Skipped
        );
        assert!(game.world().is_some());
        assert_eq!(
            game.frame(0.016, 32.0, &mut gpu).unwrap(),
            FrameStatus::Advanced
        );
    }

    #[test]
    fn test_commands_ignored_in_wrong_state() {
        let (mut game, mut gpu, _) = game_with(LevelCatalog::standard());
        game.handle(Command::RestartGame, 0.0, &mut gpu).unwrap();
        assert_eq!(game.snapshot().play_state, PlayState::Idle);
        game.handle(Command::StartGame, 0.0, &mut gpu).unwrap();
        game.handle(Command::StartGame, 10.0, &mut gpu).unwrap();
        assert_eq!(game.snapshot().play_state, PlayState::Playing);
    }

    #[test]
    fn test_settings_track_cosmetics_and_high_score() {
        let (mut game, mut gpu, _) = game_with(clear_catalog());
        game.handle(Command::RandomizeColor, 0.0, &mut gpu).unwrap();
        let command = Command::SetShape(ObjectShape::Torus);
        game.handle(command, 0.0, &mut gpu).unwrap();
        let color = game.cosmetics().color;
        assert!(color <= 0xffffff);
        assert_eq!(game.settings().cube_color, color);
        assert_eq!(game.settings().object_type, ObjectShape::Torus);

        let mut now = 0.0;
        game.start(now, &mut gpu).unwrap();
        run(&mut game, &mut gpu, &mut now, 600);
        assert!(game.settings().high_score > 0);
        assert_eq!(game.settings().high_score, game.snapshot().high_score);
        assert_eq!(Settings::load(), *game.settings());
    }

    #[test]
    fn test_camera_follows_while_playing() {
        let (mut game, mut gpu, _) = game_with(LevelCatalog::standard());
        game.start(0.0, &mut gpu).unwrap();
        assert_eq!(game.camera().eye, camera::START_EYE);
        game.frame(0.1, 100.0, &mut gpu).unwrap();
        let z = game.avatar_position().z;
        assert!((game.camera().eye.z - (z + 8.0)).abs() < 1e-5);
        assert_eq!(game.camera().eye.y, 6.0);
    }
}
