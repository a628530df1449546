//! Per-frame simulation step and session transitions
//!
//! Order inside a tick: movement, finish test, obstacle test, score. A tick
//! that ends the run never scores, so the score freezes at its pre-collision
//! value.

use glam::Vec3;

use super::collision::{Aabb, first_obstacle_hit, reaches_finish};
use super::state::{GameEvent, PlayState, RunOutcome, Session};
use crate::tuning::Tuning;

/// Timing for a single frame
#[derive(Debug, Clone, Copy, Default)]
pub struct TickInput {
    /// Seconds since the previous frame
    pub dt: f32,
    /// Wall-clock timestamp (ms) used for the score cadence
    pub now_ms: f64,
}

/// Collision view of the current level
#[derive(Debug, Clone, Copy)]
pub struct Course<'a> {
    pub finish_line: Vec3,
    pub obstacles: &'a [Aabb],
    /// Whether clearing this course ends the game
    pub is_final: bool,
}

/// Session part of `start`: fresh score, spawn pose, `Playing`
pub fn begin_run(session: &mut Session, now_ms: f64, events: &mut Vec<GameEvent>) -> bool {
    if session.play_state != PlayState::Idle {
        return false;
    }
    session.score = 0;
    events.push(GameEvent::ScoreChanged(0));
    session.last_score_tick_ms = now_ms;
    session.last_frame_ms = now_ms;
    session.avatar.reset();
    session.enter(PlayState::Playing, events);
    true
}

/// End-of-run transition.
///
/// A non-final win advances the level and returns straight to `Idle`; the
/// caller is responsible for rebuilding the world on `LevelAdvanced`.
pub fn end_run(
    session: &mut Session,
    outcome: RunOutcome,
    is_final: bool,
    events: &mut Vec<GameEvent>,
) {
    session.movement_stopped = true;
    session.intent.clear();
    let final_score = session.score;
    session.set_score(final_score, events);

    match outcome {
        RunOutcome::Won if is_final => {
            session.enter(PlayState::Won, events);
            session.victory_elapsed = Some(0.0);
            events.push(GameEvent::Victory);
        }
        RunOutcome::Won => {
            session.level += 1;
            session.avatar.reset();
            session.enter(PlayState::Idle, events);
            events.push(GameEvent::LevelAdvanced(session.level));
        }
        RunOutcome::Lost => {
            session.enter(PlayState::Lost, events);
        }
    }
}

/// Session part of `restart`: level 1, score 0, spawn pose, `Idle`
pub fn reset_session(session: &mut Session, now_ms: f64, events: &mut Vec<GameEvent>) -> bool {
    if !session.play_state.is_terminal() {
        return false;
    }
    session.score = 0;
    events.push(GameEvent::ScoreChanged(0));
    session.level = 1;
    session.last_score_tick_ms = now_ms;
    session.last_frame_ms = now_ms;
    session.avatar.reset();
    session.enter(PlayState::Idle, events);
    true
}

/// Advance one frame of play. No-op unless `Playing` and not stopped.
pub fn tick(
    session: &mut Session,
    course: &Course<'_>,
    tuning: &Tuning,
    input: &TickInput,
) -> Vec<GameEvent> {
    let mut events = Vec::new();
    if session.play_state != PlayState::Playing || session.movement_stopped {
        return events;
    }
    skip_unplayed_time(session, input);

    // Movement
    let step = tuning.speed * input.dt;
    let avatar = &mut session.avatar;
    avatar.position.z -= step;
    if session.intent.left {
        avatar.position.x = (avatar.position.x - step).max(-tuning.lateral_limit);
    }
    if session.intent.right {
        avatar.position.x = (avatar.position.x + step).min(tuning.lateral_limit);
    }

    // Finish line takes priority over a simultaneous collision
    if reaches_finish(
        session.avatar.position,
        course.finish_line,
        tuning.finish_half_width,
    ) {
        log::info!(
            "Finish reached at z={:.2}, x={:.2} (level {})",
            session.avatar.position.z,
            session.avatar.position.x,
            session.level
        );
        end_run(session, RunOutcome::Won, course.is_final, &mut events);
        return events;
    }

    if let Some(index) = first_obstacle_hit(&session.avatar.bounds(), course.obstacles) {
        log::info!(
            "Collision with obstacle {} (level {})",
            index,
            session.level
        );
        events.push(GameEvent::Collision(index));
        end_run(session, RunOutcome::Lost, course.is_final, &mut events);
        return events;
    }

    // Score: one point per elapsed tick interval, catching up within the played window
    let mut score = session.score;
    while input.now_ms - session.last_score_tick_ms >= tuning.score_tick_ms {
        score += 1;
        session.last_score_tick_ms += tuning.score_tick_ms;
    }
    if score != session.score {
        session.set_score(score, &mut events);
    }

    events
}

/// Wall-clock gap (ms) a frame may exceed its `dt` by before the score clock skips it
const FRAME_JITTER_MS: f64 = 1.0;

/// Move the score clock past wall-clock time the frame did not simulate.
///
/// `dt` is clamped by the driver and is zero on the first frame after the tab
/// was hidden, so stalls and hidden time never turn into score.
fn skip_unplayed_time(session: &mut Session, input: &TickInput) {
    let played_ms = f64::from(input.dt) * 1000.0;
    let unplayed_ms = input.now_ms - session.last_frame_ms - played_ms;
    if unplayed_ms > FRAME_JITTER_MS {
        session.last_score_tick_ms += unplayed_ms;
    }
    session.last_frame_ms = input.now_ms;
}

/// Advance the victory celebration; returns true when the window just closed
pub fn advance_victory(session: &mut Session, tuning: &Tuning, dt: f32) -> bool {
    let Some(elapsed) = session.victory_elapsed else {
        return false;
    };
    if session.play_state != PlayState::Won {
        session.victory_elapsed = None;
        return false;
    }

    session.avatar.rotation += Vec3::new(1.5, 2.0, 1.5) * dt;

    let elapsed = elapsed + dt;
    if elapsed >= tuning.victory_duration {
        session.victory_elapsed = None;
        true
    } else {
        session.victory_elapsed = Some(elapsed);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::{MovementIntent, SPAWN_POSITION};
    use proptest::prelude::*;

    const FRAME: f32 = 1.0 / 60.0;

    fn course_to(finish_z: f32, obstacles: &[Aabb], is_final: bool) -> Course<'_> {
        Course {
            finish_line: Vec3::new(0.0, 0.0, finish_z),
            obstacles,
            is_final,
        }
    }

    fn started(now_ms: f64) -> Session {
        let mut session = Session::new(0, 0.4);
        assert!(begin_run(&mut session, now_ms, &mut Vec::new()));
        session
    }

    /// One tick with default tuning
    fn step(session: &mut Session, course: &Course<'_>, dt: f32, now_ms: f64) -> Vec<GameEvent> {
        let input = TickInput { dt, now_ms };
        tick(session, course, &Tuning::default(), &input)
    }

    #[test]
    fn test_begin_run_resets_score_and_pose() {
        let mut session = Session::new(50, 0.4);
        session.score = 33;
        session.avatar.position = Vec3::new(3.0, 1.0, -20.0);
        session.avatar.rotation = Vec3::ONE;
        let mut events = Vec::new();
        assert!(begin_run(&mut session, 1000.0, &mut events));
        assert_eq!(session.score, 0);
        assert_eq!(session.avatar.position, SPAWN_POSITION);
        assert_eq!(session.avatar.rotation, Vec3::ZERO);
        assert_eq!(session.play_state, PlayState::Playing);
        assert_eq!(session.high_score, 50);

        // Only valid from Idle
        assert!(!begin_run(&mut session, 2000.0, &mut events));
    }

    #[test]
    fn test_tick_moves_forward() {
        let course = course_to(-40.0, &[], false);
        let mut session = started(0.0);
        step(&mut session, &course, 0.5, 0.0);
        assert!((session.avatar.position.z + 2.5).abs() < 1e-5);
        assert_eq!(session.avatar.position.x, 0.0);
    }

    #[test]
    fn test_score_cadence_is_wall_clock() {
        let course = course_to(-400.0, &[], false);
        let mut session = started(1000.0);

        let mut now = 1000.0;
        for _ in 0..60 {
            now += 16.0;
            step(&mut session, &course, 0.016, now);
        }
        // 960ms elapsed
        assert_eq!(session.score, 9);

        // A long frame catches up on its own (clamped) share of time only
        step(&mut session, &course, 0.1, now + 540.0);
        assert_eq!(session.score, 10);
    }

    #[test]
    fn test_unplayed_gap_never_scores() {
        let course = course_to(-400.0, &[], false);
        let mut session = started(0.0);
        step(&mut session, &course, 0.05, 50.0);
        assert_eq!(session.score, 0);

        // First frame back from a hidden tab: a minute of wall clock, dt 0
        step(&mut session, &course, 0.0, 60_050.0);
        assert_eq!(session.score, 0);

        // Cadence resumes from the 50 ms already played
        step(&mut session, &course, 0.05, 60_100.0);
        assert_eq!(session.score, 1);
    }

    #[test]
    fn test_no_score_outside_playing() {
        let course = course_to(-40.0, &[], false);
        let mut session = Session::new(0, 0.4);
        let events = step(&mut session, &course, 0.1, 10_000.0);
        assert!(events.is_empty());
        assert_eq!(session.score, 0);
        assert_eq!(session.avatar.position, SPAWN_POSITION);
    }

    #[test]
    fn test_finish_beats_collision() {
        let obstacles = [Aabb::from_center_half_extent(Vec3::new(0.0, 1.0, -10.0), 0.8)];
        let course = course_to(-10.0, &obstacles, true);
        let mut session = started(0.0);
        session.avatar.position.z = -9.99;
        let events = step(&mut session, &course, FRAME, 16.0);
        assert_eq!(session.play_state, PlayState::Won);
        assert!(events.contains(&GameEvent::Victory));
        let collided = events.iter().any(|e| matches!(e, GameEvent::Collision(_)));
        assert!(!collided);
    }

    #[test]
    fn test_collision_loses_and_freezes_score() {
        let obstacles = [Aabb::from_center_half_extent(Vec3::new(0.0, 1.0, -1.5), 0.8)];
        let course = course_to(-40.0, &obstacles, false);
        let mut session = started(0.0);
        session.score = 7;
        session.last_score_tick_ms = 0.0;
        // Plenty of wall-clock time has passed, but the collision frame never scores
        let events = step(&mut session, &course, 0.15, 900.0);
        assert_eq!(session.play_state, PlayState::Lost);
        assert_eq!(session.score, 7);
        assert!(session.movement_stopped);
        assert!(events.contains(&GameEvent::Collision(0)));
    }

    #[test]
    fn test_non_final_win_auto_advances() {
        let mut session = started(0.0);
        session.score = 12;
        session.intent = MovementIntent {
            left: true,
            right: false,
        };
        session.avatar.position = Vec3::new(1.0, 1.0, -40.0);
        let mut events = Vec::new();
        end_run(&mut session, RunOutcome::Won, false, &mut events);
        assert_eq!(session.play_state, PlayState::Idle);
        assert_eq!(session.level, 2);
        assert_eq!(session.score, 12);
        assert_eq!(session.avatar.position, SPAWN_POSITION);
        assert!(!session.movement_stopped);
        assert_eq!(session.intent, MovementIntent::default());
        assert!(events.contains(&GameEvent::LevelAdvanced(2)));
    }

    #[test]
    fn test_reset_session_from_terminal_only() {
        let mut session = started(0.0);
        let mut events = Vec::new();
        assert!(!reset_session(&mut session, 0.0, &mut events));

        session.level = 3;
        session.score = 40;
        end_run(&mut session, RunOutcome::Won, true, &mut events);
        assert!(reset_session(&mut session, 5.0, &mut events));
        assert_eq!(session.level, 1);
        assert_eq!(session.score, 0);
        assert_eq!(session.high_score, 40);
        assert!(!session.movement_stopped);
        assert_eq!(session.victory_elapsed, None);
    }

    #[test]
    fn test_victory_window_closes() {
        let tuning = Tuning::default();
        let mut session = started(0.0);
        end_run(&mut session, RunOutcome::Won, true, &mut Vec::new());
        assert!(session.victory_active());
        let mut closed = false;
        for _ in 0..301 {
            closed |= advance_victory(&mut session, &tuning, FRAME);
        }
        assert!(closed);
        assert!(!session.victory_active());
        assert_eq!(session.play_state, PlayState::Won);
        assert!(session.avatar.rotation.y > 0.0);
    }

    proptest! {
        #[test]
        fn lateral_position_stays_clamped(
            moves in proptest::collection::vec((any::<bool>(), any::<bool>(), 0.0f32..0.5), 1..80)
        ) {
            let limit = Tuning::default().lateral_limit;
            let course = course_to(-1.0e6, &[], false);
            let mut session = started(0.0);
            for (left, right, dt) in moves {
                session.intent = MovementIntent { left, right };
                step(&mut session, &course, dt, 0.0);
                prop_assert!(session.avatar.position.x.abs() <= limit);
            }
        }

        #[test]
        fn score_matches_elapsed_ticks(frames in proptest::collection::vec(1u32..=100, 1..60)) {
            let tick_ms = Tuning::default().score_tick_ms;
            let course = course_to(-1.0e6, &[], false);
            let mut session = started(0.0);
            let mut now = 0.0;
            for frame in frames {
                now += f64::from(frame);
                step(&mut session, &course, frame as f32 / 1000.0, now);
            }
            prop_assert_eq!(session.score, (now / tick_ms).floor() as u32);
        }
    }
}
