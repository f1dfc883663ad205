use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::SceneConfig;
use crate::field::ParticleField;

#[derive(States, Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum SimState {
    #[default]
    Running,
    Paused,
}

#[derive(Resource)]
pub struct SceneRng(pub StdRng);

impl FromWorld for SceneRng {
    fn from_world(world: &mut World) -> Self {
        let seed = world
            .get_resource::<SceneConfig>()
            .and_then(|c| c.particles.seed);
        match seed {
            Some(seed) => SceneRng(StdRng::seed_from_u64(seed)),
            None => SceneRng(StdRng::from_entropy()),
        }
    }
}

#[derive(Event, Default)]
pub struct ResetEvent;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Heading {
    /// Towards the background (decreasing Z).
    #[default]
    Forward,
    Backward,
}

/// Position, Euler rotation (radians) and scale of a loaded model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModelPose {
    pub translation: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl ModelPose {
    pub fn new(translation: Vec3, scale: f32) -> Self {
        Self {
            translation,
            rotation: Vec3::ZERO,
            scale: Vec3::splat(scale),
        }
    }

    pub fn transform(&self) -> Transform {
        let r = self.rotation;
        Transform {
            translation: self.translation,
            rotation: Quat::from_euler(EulerRot::XYZ, r.x, r.y, r.z),
            scale: self.scale,
        }
    }
}

/// Per-tick increments. Editable at runtime from the overlay.
#[derive(Clone, Debug, PartialEq)]
pub struct Tuning {
    pub ship_spin_y: f32,
    pub ship_spin_x: f32,
    pub travel_step: f32,
    pub dock_margin: f32,
    pub background_spin_y: f32,
    pub background_spin_x: f32,
    pub drift_frequency: f32,
    pub drift_amplitude: f32,
}

impl From<&SceneConfig> for Tuning {
    fn from(config: &SceneConfig) -> Self {
        Self {
            ship_spin_y: config.ship.spin_y,
            ship_spin_x: config.ship.spin_x,
            travel_step: config.ship.travel_step,
            dock_margin: config.ship.dock_margin,
            background_spin_y: config.background.spin_y,
            background_spin_x: config.background.spin_x,
            drift_frequency: config.background.drift_frequency,
            drift_amplitude: config.background.drift_amplitude,
        }
    }
}

/// Everything the frame update reads and writes. The model slots stay `None`
/// until their asset finishes loading, and forever if it fails.
#[derive(Resource)]
pub struct SceneState {
    pub ship: Option<ModelPose>,
    pub background: Option<ModelPose>,
    pub heading: Heading,
    pub field: ParticleField,
    pub tuning: Tuning,
    /// Background Z used as the turn-around reference before it has loaded.
    pub background_rest_z: f32,
    /// Z the ship starts from and heads back in at.
    pub home_z: f32,
    pub ticks: u64,
}

impl FromWorld for SceneState {
    fn from_world(world: &mut World) -> Self {
        world.init_resource::<SceneConfig>();
        world.init_resource::<SceneRng>();
        world.resource_scope(|world, mut rng: Mut<SceneRng>| {
            SceneState::new(world.resource::<SceneConfig>(), &mut rng.0)
        })
    }
}

impl SceneState {
    pub fn new<R: Rng + ?Sized>(config: &SceneConfig, rng: &mut R) -> Self {
        Self {
            ship: None,
            background: None,
            heading: Heading::Forward,
            field: ParticleField::new(&config.particles, rng),
            tuning: Tuning::from(config),
            background_rest_z: config.background.position[2],
            home_z: config.ship.position[2],
            ticks: 0,
        }
    }

    /// One frame of simulation. `elapsed` is seconds since start-up; only the
    /// background drift depends on it; everything else advances per call.
    pub fn advance<R: Rng + ?Sized>(&mut self, elapsed: f64, rng: &mut R) {
        self.spin_ship();
        self.travel_ship();
        self.drift_background(elapsed);
        self.field.step(rng);
        self.ticks += 1;
    }

    fn spin_ship(&mut self) {
        if let Some(ship) = self.ship.as_mut() {
            ship.rotation.y += self.tuning.ship_spin_y;
            ship.rotation.x += self.tuning.ship_spin_x;
        }
    }

    /// Z at which an inbound ship turns around.
    pub fn dock_z(&self) -> f32 {
        let background_z = self
            .background
            .map_or(self.background_rest_z, |b| b.translation.z);
        background_z + self.tuning.dock_margin
    }

    /// Largest dock margin that still leaves two travel steps between the turn
    /// points, so every leg lasts at least two ticks.
    pub fn max_dock_margin(&self) -> f32 {
        (self.home_z - self.background_rest_z - 2.0 * self.tuning.travel_step).max(0.0)
    }

    fn travel_ship(&mut self) {
        let dock_z = self.dock_z();
        let step = self.tuning.travel_step;
        let Some(ship) = self.ship.as_mut() else {
            return;
        };

        match self.heading {
            Heading::Forward => {
                ship.translation.z -= step;
                if ship.translation.z <= dock_z {
                    self.heading = Heading::Backward;
                    debug!("ship turning back at z = {:.2}", ship.translation.z);
                }
            }
            Heading::Backward => {
                ship.translation.z += step;
                if ship.translation.z >= self.home_z {
                    self.heading = Heading::Forward;
                    debug!("ship heading in at z = {:.2}", ship.translation.z);
                }
            }
        }
    }

    fn drift_background(&mut self, elapsed: f64) {
        let tuning = &self.tuning;
        let Some(bg) = self.background.as_mut() else {
            return;
        };
        let drift = drift_offset(elapsed, tuning);
        bg.rotation.y += tuning.background_spin_y;
        bg.translation.x = drift.x;
        bg.translation.y = drift.y;
        bg.rotation.x += tuning.background_spin_x;
    }

    pub fn reset<R: Rng + ?Sized>(&mut self, config: &SceneConfig, rng: &mut R) {
        self.field.reseed(rng);
        self.heading = Heading::Forward;
        if let Some(ship) = self.ship.as_mut() {
            *ship = ModelPose::new(Vec3::from(config.ship.position), config.ship.scale);
        }
        self.ticks = 0;
    }
}

/// X/Y of the background's elliptical drift at `elapsed` seconds.
pub fn drift_offset(elapsed: f64, tuning: &Tuning) -> Vec2 {
    let phase = elapsed * tuning.drift_frequency as f64;
    Vec2::new(phase.sin() as f32, phase.cos() as f32) * tuning.drift_amplitude
}

pub struct SimPlugin;
impl Plugin for SimPlugin {
    fn build(&self, app: &mut App) {
        app.init_state::<SimState>()
            .init_resource::<SceneRng>()
            .init_resource::<SceneState>()
            .add_event::<ResetEvent>()
            .add_systems(
                Update,
                (
                    handle_reset,
                    advance_scene.run_if(in_state(SimState::Running)),
                )
                    .chain()
                    .in_set(SimSet::Advance),
            );
    }
}

/// Ordering anchor for systems that read the state after this frame's update.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum SimSet {
    Advance,
}

fn advance_scene(time: Res<Time>, mut state: ResMut<SceneState>, mut rng: ResMut<SceneRng>) {
    state.advance(time.elapsed_seconds_f64(), &mut rng.0);
}

fn handle_reset(
    mut ev_reset: EventReader<ResetEvent>,
    mut state: ResMut<SceneState>,
    mut rng: ResMut<SceneRng>,
    config: Res<SceneConfig>,
) {
    if ev_reset.is_empty() {
        return;
    }
    ev_reset.clear();

    state.reset(&config, &mut rng.0);
    info!("scene reset: {} particles reseeded", state.field.particles.len());
}
