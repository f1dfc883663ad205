use crate::config::{CameraConfig, SceneConfig};
use crate::sim::{ResetEvent, SimState};
use crate::ui::OverlaySettings;
use crate::MainCamera;
use bevy::input::mouse::{MouseMotion, MouseScrollUnit, MouseWheel};
use bevy::prelude::*;
use bevy_egui::EguiContexts;

/// Keeps the camera just shy of straight up/down so `looking_at` stays stable.
const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

#[derive(Resource)]
pub struct Keybinds {
    pub pause: KeyCode,
    pub reset: KeyCode,
    pub help: KeyCode,
    pub diagnostics: KeyCode,
}

impl Default for Keybinds {
    fn default() -> Self {
        Self {
            pause: KeyCode::Space,
            reset: KeyCode::KeyR,
            help: KeyCode::KeyH,
            diagnostics: KeyCode::F3,
        }
    }
}

/// Orbit camera with inertia. Input accumulates into pending deltas and
/// `advance` applies a `damping` fraction of what is pending each tick, so a
/// drag keeps easing out after the mouse stops.
#[derive(Component, Debug, Clone)]
pub struct OrbitControls {
    pub target: Vec3,
    pub radius: f32,
    pub yaw: f32,
    pub pitch: f32,
    pub damping: f32,
    pub min_radius: f32,
    pub max_radius: f32,
    pending_yaw: f32,
    pending_pitch: f32,
    /// Log-scale zoom, so zooming in and out by the same amount cancels.
    pending_zoom: f32,
    pending_pan: Vec3,
}

impl OrbitControls {
    pub fn new(eye: Vec3, target: Vec3, config: &CameraConfig) -> Self {
        let offset = eye - target;
        let radius = offset.length().max(f32::EPSILON);
        Self {
            target,
            radius,
            yaw: offset.x.atan2(offset.z),
            pitch: (offset.y / radius).clamp(-1.0, 1.0).asin(),
            damping: config.damping_factor,
            min_radius: config.min_distance,
            max_radius: config.max_distance,
            pending_yaw: 0.0,
            pending_pitch: 0.0,
            pending_zoom: 0.0,
            pending_pan: Vec3::ZERO,
        }
    }

    pub fn rotate(&mut self, yaw: f32, pitch: f32) {
        self.pending_yaw += yaw;
        self.pending_pitch += pitch;
    }

    /// Positive zooms out.
    pub fn zoom(&mut self, amount: f32) {
        self.pending_zoom += amount;
    }

    pub fn pan(&mut self, offset: Vec3) {
        self.pending_pan += offset;
    }

    pub fn advance(&mut self) {
        let d = self.damping;

        self.yaw += self.pending_yaw * d;
        self.pitch = (self.pitch + self.pending_pitch * d).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.radius = (self.radius * (self.pending_zoom * d).exp())
            .clamp(self.min_radius, self.max_radius);
        self.target += self.pending_pan * d;

        let keep = 1.0 - d;
        self.pending_yaw *= keep;
        self.pending_pitch *= keep;
        self.pending_zoom *= keep;
        self.pending_pan *= keep;
    }

    pub fn eye(&self) -> Vec3 {
        let (sy, cy) = self.yaw.sin_cos();
        let (sp, cp) = self.pitch.sin_cos();
        self.target + Vec3::new(cp * sy, sp, cp * cy) * self.radius
    }

    pub fn transform(&self) -> Transform {
        Transform::from_translation(self.eye()).looking_at(self.target, Vec3::Y)
    }

    pub fn is_settled(&self) -> bool {
        self.pending_yaw.abs() < 1e-5
            && self.pending_pitch.abs() < 1e-5
            && self.pending_zoom.abs() < 1e-5
            && self.pending_pan.length_squared() < 1e-10
    }
}

pub struct InputPlugin;
impl Plugin for InputPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<Keybinds>().add_systems(
            Update,
            (
                camera_controls,
                pause_toggle,
                reset_trigger,
                help_toggle,
                diagnostics_toggle,
            ),
        );
    }
}

fn camera_controls(
    mut contexts: EguiContexts,
    mut scroll_evr: EventReader<MouseWheel>,
    mut motion: EventReader<MouseMotion>,
    buttons: Res<ButtonInput<MouseButton>>,
    mut q_cam: Query<(&mut Transform, &mut OrbitControls), With<MainCamera>>,
    config: Res<SceneConfig>,
) {
    let Ok((mut t, mut orbit)) = q_cam.get_single_mut() else {
        return;
    };

    // Pointer over the overlay: swallow input, keep easing.
    if contexts.ctx_mut().wants_pointer_input() {
        scroll_evr.clear();
        motion.clear();
    } else {
        let cam = &config.camera;

        for ev in scroll_evr.read() {
            let lines = match ev.unit {
                MouseScrollUnit::Line => ev.y,
                MouseScrollUnit::Pixel => ev.y * 0.01,
            };
            orbit.zoom(-lines * cam.zoom_speed);
        }

        let delta: Vec2 = motion.read().map(|m| m.delta).sum();
        if buttons.pressed(MouseButton::Left) {
            orbit.rotate(-delta.x * cam.rotate_speed, delta.y * cam.rotate_speed);
        } else if buttons.pressed(MouseButton::Right) {
            // pan in the camera plane, scaled so the scene tracks the cursor
            let scale = orbit.radius * cam.rotate_speed * 0.2;
            let offset = (-t.right() * delta.x + t.up() * delta.y) * scale;
            orbit.pan(offset);
        }
    }

    if orbit.is_settled() {
        return;
    }
    orbit.advance();
    *t = orbit.transform();
}

fn pause_toggle(
    keys: Res<ButtonInput<KeyCode>>,
    keybinds: Res<Keybinds>,
    state: Res<State<SimState>>,
    mut next_state: ResMut<NextState<SimState>>,
) {
    if keys.just_pressed(keybinds.pause) {
        match state.get() {
            SimState::Running => next_state.set(SimState::Paused),
            SimState::Paused => next_state.set(SimState::Running),
        }
    }
}

fn reset_trigger(
    mut ev_reset: EventWriter<ResetEvent>,
    keys: Res<ButtonInput<KeyCode>>,
    keybinds: Res<Keybinds>,
) {
    if keys.just_pressed(keybinds.reset) {
        ev_reset.send(ResetEvent);
    }
}

fn help_toggle(
    mut overlay: ResMut<OverlaySettings>,
    keys: Res<ButtonInput<KeyCode>>,
    keybinds: Res<Keybinds>,
) {
    if keys.just_pressed(keybinds.help) {
        overlay.show_help = !overlay.show_help;
    }
}

fn diagnostics_toggle(
    mut overlay: ResMut<OverlaySettings>,
    keys: Res<ButtonInput<KeyCode>>,
    keybinds: Res<Keybinds>,
) {
    if keys.just_pressed(keybinds.diagnostics) {
        overlay.show_diagnostics = !overlay.show_diagnostics;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn controls() -> OrbitControls {
        OrbitControls::new(
            Vec3::new(0.0, 5.0, 20.0),
            Vec3::ZERO,
            &CameraConfig::default(),
        )
    }

    #[test]
    fn recovers_starting_eye() {
        let c = controls();
        let eye = c.eye();
        assert_relative_eq!(eye.x, 0.0, epsilon = 1e-4);
        assert_relative_eq!(eye.y, 5.0, epsilon = 1e-4);
        assert_relative_eq!(eye.z, 20.0, epsilon = 1e-4);
    }

    #[test]
    fn idle_advance_does_not_move() {
        let mut c = controls();
        let before = c.eye();
        for _ in 0..10 {
            c.advance();
        }
        assert_eq!(c.eye(), before);
        assert!(c.is_settled());
    }

    #[test]
    fn rotation_eases_in_by_damping_fraction() {
        let mut c = controls();
        c.rotate(1.0, 0.0);
        c.advance();
        assert_relative_eq!(c.yaw, 0.05, epsilon = 1e-6);
        c.advance();
        assert_relative_eq!(c.yaw, 0.05 + 0.95 * 0.05, epsilon = 1e-6);
        assert!(!c.is_settled());
    }

    #[test]
    fn rotation_converges_to_full_delta() {
        let mut c = controls();
        c.rotate(0.5, 0.0);
        for _ in 0..1_000 {
            c.advance();
        }
        assert_relative_eq!(c.yaw, 0.5, epsilon = 1e-4);
        assert!(c.is_settled());
    }

    #[test]
    fn pitch_is_clamped() {
        let mut c = controls();
        c.rotate(0.0, 100.0);
        for _ in 0..500 {
            c.advance();
        }
        assert!(c.pitch <= PITCH_LIMIT);
    }

    #[test]
    fn zoom_respects_limits() {
        let mut c = controls();
        c.zoom(50.0);
        for _ in 0..500 {
            c.advance();
        }
        assert_relative_eq!(c.radius, 500.0);

        c.zoom(-100.0);
        for _ in 0..500 {
            c.advance();
        }
        assert_relative_eq!(c.radius, 1.0);
    }

    #[test]
    fn pan_moves_target_and_eye_together() {
        let mut c = controls();
        let offset = c.eye() - c.target;
        c.pan(Vec3::new(3.0, 0.0, 0.0));
        for _ in 0..1_000 {
            c.advance();
        }
        assert_relative_eq!(c.target.x, 3.0, epsilon = 1e-3);
        let after = c.eye() - c.target;
        assert_relative_eq!(after.distance(offset), 0.0, epsilon = 1e-4);
    }
}
