//! Keyboard → lateral movement intent

use super::state::{PlayState, Session};

/// Lateral direction bound to a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lateral {
    Left,
    Right,
}

/// Map a DOM `KeyboardEvent.key` value to a direction
pub fn lateral_for_key(key: &str) -> Option<Lateral> {
    match key {
        "ArrowLeft" => Some(Lateral::Left),
        "ArrowRight" => Some(Lateral::Right),
        k if k.eq_ignore_ascii_case("a") => Some(Lateral::Left),
        k if k.eq_ignore_ascii_case("d") => Some(Lateral::Right),
        _ => None,
    }
}

/// Turns key presses into the session's movement intent.
///
/// Press only registers while playing; release always clears, so a press
/// swallowed while stopped can never leave a stuck flag behind.
#[derive(Debug, Default)]
pub struct InputTracker;

impl InputTracker {
    pub fn on_key_down(&self, key: &str, session: &mut Session) -> bool {
        if session.play_state != PlayState::Playing || session.movement_stopped {
            return false;
        }
        match lateral_for_key(key) {
            Some(Lateral::Left) => session.intent.left = true,
            Some(Lateral::Right) => session.intent.right = true,
            None => return false,
        }
        true
    }

    pub fn on_key_up(&self, key: &str, session: &mut Session) -> bool {
        match lateral_for_key(key) {
            Some(Lateral::Left) => session.intent.left = false,
            Some(Lateral::Right) => session.intent.right = false,
            None => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playing() -> Session {
        let mut session = Session::new(0, 0.4);
        session.enter(PlayState::Playing, &mut Vec::new());
        session
    }

    #[test]
    fn test_key_mapping() {
        assert_eq!(lateral_for_key("a"), Some(Lateral::Left));
        assert_eq!(lateral_for_key("A"), Some(Lateral::Left));
        assert_eq!(lateral_for_key("ArrowLeft"), Some(Lateral::Left));
        assert_eq!(lateral_for_key("D"), Some(Lateral::Right));
        assert_eq!(lateral_for_key("ArrowRight"), Some(Lateral::Right));
        assert_eq!(lateral_for_key("w"), None);
        assert_eq!(lateral_for_key("arrowleft"), None);
    }

    #[test]
    fn test_press_ignored_unless_playing() {
        let tracker = InputTracker;
        let mut session = Session::new(0, 0.4);
        assert!(!tracker.on_key_down("a", &mut session));
        assert!(!session.intent.left);

        let mut session = playing();
        assert!(tracker.on_key_down("a", &mut session));
        assert!(tracker.on_key_down("ArrowRight", &mut session));
        assert!(session.intent.left && session.intent.right);
    }

    #[test]
    fn test_release_always_clears() {
        let tracker = InputTracker;
        let mut session = playing();
        tracker.on_key_down("d", &mut session);
        session.play_state = PlayState::Lost;
        session.movement_stopped = true;
        session.intent.right = true;
        tracker.on_key_up("D", &mut session);
        assert!(!session.intent.right);
    }

    #[test]
    fn test_press_ignored_when_stopped() {
        let tracker = InputTracker;
        let mut session = playing();
        session.movement_stopped = true;
        assert!(!tracker.on_key_down("a", &mut session));
    }
}
