//! Camera director and camera rigs
//!
//! `direct` is a pure function of play state, avatar pose and the victory
//! clock. Idle hands the camera to `OrbitCamera`, which the pointer drives.

use glam::{Mat4, Vec3};

use super::state::{Avatar, PlayState};

/// Camera pose at game start
pub const START_EYE: Vec3 = Vec3::new(0.0, 5.0, 5.0);
pub const START_TARGET: Vec3 = Vec3::new(0.0, 1.0, 0.0);

/// Chase camera offsets while playing
const CHASE_HEIGHT: f32 = 6.0;
const CHASE_BACK: f32 = 8.0;
const CHASE_LOOK_HEIGHT: f32 = 1.0;
const CHASE_LOOK_AHEAD: f32 = 2.0;

/// Victory orbit
const ORBIT_RADIUS: f32 = 8.0;
const ORBIT_RATE: f32 = 0.5;
const ORBIT_HEIGHT: f32 = 5.0;
const ORBIT_BOB: f32 = 0.5;

/// What the camera should do this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraDirective {
    /// Place the camera at `eye` looking at `target`
    Pose { eye: Vec3, target: Vec3 },
    /// Free orbit under pointer control
    OrbitControl,
    /// Keep the previous pose
    Hold,
}

/// Pick the camera behavior for this frame.
///
/// `victory_elapsed` is the time since the final win while the celebration
/// is running, `None` otherwise.
pub fn direct(
    play_state: PlayState,
    avatar: &Avatar,
    victory_elapsed: Option<f32>,
) -> CameraDirective {
    let p = avatar.position;
    match play_state {
        PlayState::Playing => CameraDirective::Pose {
            eye: Vec3::new(p.x, CHASE_HEIGHT, p.z + CHASE_BACK),
            target: Vec3::new(p.x, CHASE_LOOK_HEIGHT, p.z - CHASE_LOOK_AHEAD),
        },
        PlayState::Won => match victory_elapsed {
            Some(t) => {
                let angle = t * ORBIT_RATE;
                CameraDirective::Pose {
                    eye: Vec3::new(
                        p.x + angle.cos() * ORBIT_RADIUS,
                        ORBIT_HEIGHT + t.sin() * ORBIT_BOB,
                        p.z + angle.sin() * ORBIT_RADIUS,
                    ),
                    target: p,
                }
            }
            None => CameraDirective::Hold,
        },
        PlayState::Idle => CameraDirective::OrbitControl,
        PlayState::Lost => CameraDirective::Hold,
    }
}

/// Perspective camera
#[derive(Debug, Clone)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: START_EYE,
            target: START_TARGET,
            fov: 75.0_f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Camera {
    pub fn look_at(&mut self, eye: Vec3, target: Vec3) {
        self.eye = eye;
        self.target = target;
    }

    pub fn set_aspect(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Apply a directive; returns false when the camera was left alone
    pub fn apply(&mut self, directive: CameraDirective, orbit: &mut OrbitCamera) -> bool {
        match directive {
            CameraDirective::Pose { eye, target } => {
                self.look_at(eye, target);
                true
            }
            CameraDirective::OrbitControl => {
                orbit.enabled = true;
                orbit.update();
                self.look_at(orbit.eye(), orbit.target);
                true
            }
            CameraDirective::Hold => false,
        }
    }
}

/// Damped orbit camera used while idle
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    pub target: Vec3,
    pub enabled: bool,
    yaw: f32,
    pitch: f32,
    distance: f32,
    yaw_velocity: f32,
    pitch_velocity: f32,
    pub damping: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub rotate_speed: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        let mut orbit = Self {
            target: START_TARGET,
            enabled: false,
            yaw: 0.0,
            pitch: 0.0,
            distance: 1.0,
            yaw_velocity: 0.0,
            pitch_velocity: 0.0,
            damping: 0.05,
            min_distance: 2.0,
            max_distance: 20.0,
            rotate_speed: 0.005,
        };
        orbit.reset();
        orbit
    }
}

impl OrbitCamera {
    /// Back to the start pose, motion cancelled
    pub fn reset(&mut self) {
        let offset = START_EYE - START_TARGET;
        self.target = START_TARGET;
        self.distance = offset.length();
        self.yaw = offset.x.atan2(offset.z);
        self.pitch = (offset.y / self.distance).asin();
        self.yaw_velocity = 0.0;
        self.pitch_velocity = 0.0;
    }

    /// Pointer drag in pixels
    pub fn drag(&mut self, dx: f32, dy: f32) {
        if !self.enabled {
            return;
        }
        self.yaw_velocity -= dx * self.rotate_speed;
        self.pitch_velocity += dy * self.rotate_speed;
    }

    /// Wheel zoom; positive delta moves away
    pub fn zoom(&mut self, delta: f32) {
        if !self.enabled {
            return;
        }
        let scale = if delta > 0.0 { 1.05 } else { 0.95 };
        self.distance = (self.distance * scale).clamp(self.min_distance, self.max_distance);
    }

    /// Integrate damped motion; call once per frame
    pub fn update(&mut self) {
        let limit = 89.0_f32.to_radians();
        self.yaw += self.yaw_velocity;
        self.pitch = (self.pitch + self.pitch_velocity).clamp(-limit, limit);
        self.yaw_velocity *= 1.0 - self.damping;
        self.pitch_velocity *= 1.0 - self.damping;
    }

    pub fn eye(&self) -> Vec3 {
        let horizontal = self.distance * self.pitch.cos();
        self.target
            + Vec3::new(
                horizontal * self.yaw.sin(),
                self.distance * self.pitch.sin(),
                horizontal * self.yaw.cos(),
            )
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn avatar_at(p: Vec3) -> Avatar {
        let mut avatar = Avatar::new(0.4);
        avatar.position = p;
        avatar
    }

    #[test]
    fn test_chase_camera_offsets() {
        let avatar = avatar_at(Vec3::new(2.0, 1.0, -10.0));
        let directive = direct(PlayState::Playing, &avatar, None);
        assert_eq!(
            directive,
            CameraDirective::Pose {
                eye: Vec3::new(2.0, 6.0, -2.0),
                target: Vec3::new(2.0, 1.0, -12.0),
            }
        );
    }

    #[test]
    fn test_victory_orbit_radius_and_target() {
        let avatar = avatar_at(Vec3::new(0.0, 1.0, -70.0));
        for t in [0.0, 1.3, 4.9] {
            let CameraDirective::Pose { eye, target } = direct(PlayState::Won, &avatar, Some(t))
            else {
                panic!("expected a pose");
            };
            assert_eq!(target, avatar.position);
            let horizontal = Vec3::new(eye.x - target.x, 0.0, eye.z - target.z).length();
            assert!((horizontal - 8.0).abs() < 1e-4);
            assert!((eye.y - 5.0).abs() <= 0.5 + 1e-6);
        }
    }

    #[test]
    fn test_hold_and_orbit_states() {
        let avatar = Avatar::new(0.4);
        let hold = CameraDirective::Hold;
        assert_eq!(direct(PlayState::Lost, &avatar, None), hold);
        assert_eq!(direct(PlayState::Won, &avatar, None), hold);
        assert_eq!(
            direct(PlayState::Idle, &avatar, None),
            CameraDirective::OrbitControl
        );
    }

    #[test]
    fn test_orbit_reset_matches_start_pose() {
        let orbit = OrbitCamera::default();
        assert!((orbit.eye() - START_EYE).length() < 1e-4);
    }

    #[test]
    fn test_orbit_zoom_limits_and_disabled_input() {
        let mut orbit = OrbitCamera::default();
        orbit.zoom(1.0);
        let start = orbit.distance();
        assert_eq!(orbit.distance(), start);

        orbit.enabled = true;
        for _ in 0..200 {
            orbit.zoom(1.0);
        }
        assert_eq!(orbit.distance(), 20.0);
        for _ in 0..200 {
            orbit.zoom(-1.0);
        }
        assert_eq!(orbit.distance(), 2.0);
    }

    #[test]
    fn test_orbit_drag_is_damped() {
        let mut orbit = OrbitCamera::default();
        orbit.enabled = true;
        orbit.drag(100.0, 0.0);
        let before = orbit.eye();
        orbit.update();
        let first = orbit.eye();
        for _ in 0..500 {
            orbit.update();
        }
        let settled = orbit.eye();
        orbit.update();
        assert!((first - before).length() > 0.0);
        assert!((orbit.eye() - settled).length() < 1e-4);
    }

    #[test]
    fn test_camera_matrix_is_finite() {
        let mut camera = Camera::default();
        camera.set_aspect(800, 600);
        let vp = camera.view_projection();
        assert!(vp.is_finite());
        camera.set_aspect(0, 600);
        assert!((camera.aspect - 800.0 / 600.0).abs() < 1e-6);
    }
}
