//! Scene configuration
//!
//! Sources, lowest to highest priority:
//! 1. built-in defaults
//! 2. `config/default.toml`
//! 3. `config/user.toml` (optional overrides)
//! 4. environment variables (`ENDURANCE_SECTION__KEY`)

use bevy::prelude::Resource;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] figment::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Resource, Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneConfig {
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub lighting: LightingConfig,
    #[serde(default)]
    pub ship: ShipConfig,
    #[serde(default)]
    pub background: BackgroundConfig,
    #[serde(default)]
    pub particles: ParticleConfig,
}

impl SceneConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();
        let mut figment = Figment::from(Serialized::defaults(SceneConfig::default()));

        let default_path = config_dir.join("default.toml");
        if default_path.exists() {
            figment = figment.merge(Toml::file(&default_path));
        }
        let user_path = config_dir.join("user.toml");
        if user_path.exists() {
            figment = figment.merge(Toml::file(&user_path));
        }

        // ENDURANCE_PARTICLES__COUNT=500 -> particles.count = 500
        figment = figment.merge(Env::prefixed("ENDURANCE_").split("__"));

        Self::from_figment(figment)
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: SceneConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.particles;
        if p.count == 0 {
            return Err(ConfigError::Invalid("particles.count must be > 0".into()));
        }
        // the resample range spans 2 * bound and has to stay finite
        if !p.bound.is_finite() || p.bound <= 0.0 || p.bound > MAX_BOUND {
            return Err(ConfigError::Invalid(format!(
                "particles.bound must be in (0, {MAX_BOUND:e}], got {}",
                p.bound
            )));
        }
        non_negative("particles.velocity_spread", p.velocity_spread)?;
        non_negative("particles.acceleration_spread", p.acceleration_spread)?;
        if !(0.0..=1.0).contains(&p.opacity) {
            return Err(ConfigError::Invalid(format!(
                "particles.opacity must be in [0, 1], got {}",
                p.opacity
            )));
        }

        let ship = &self.ship;
        if !ship.travel_step.is_finite() || ship.travel_step <= 0.0 {
            return Err(ConfigError::Invalid("ship.travel_step must be > 0".into()));
        }
        non_negative("ship.dock_margin", ship.dock_margin)?;
        // one full step between the two turn points, or the heading flips every tick
        let dock_z = self.background.position[2] + ship.dock_margin;
        let home_z = ship.position[2];
        if !dock_z.is_finite() || !home_z.is_finite() || home_z - dock_z <= ship.travel_step {
            return Err(ConfigError::Invalid(format!(
                "ship turns back at z = {dock_z}, which must be more than one \
                 travel_step below its start z = {home_z}"
            )));
        }

        let c = &self.camera;
        if !(c.damping_factor > 0.0 && c.damping_factor <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "camera.damping_factor must be in (0, 1], got {}",
                c.damping_factor
            )));
        }
        if c.min_distance > c.max_distance {
            return Err(ConfigError::Invalid(
                "camera.min_distance exceeds camera.max_distance".into(),
            ));
        }
        Ok(())
    }
}

/// Largest accepted `particles.bound`.
pub const MAX_BOUND: f32 = f32::MAX / 4.0;

fn non_negative(field: &str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{field} must be finite and >= 0, got {value}"
        )))
    }
}

/// Outcome of the start-up config load, kept around so it can be logged once
/// the app is running.
#[derive(Resource, Debug, Default)]
pub struct ConfigStatus(pub Option<ConfigError>);

impl ConfigStatus {
    /// Falls back to the built-in defaults when loading failed.
    pub fn resolve(result: Result<SceneConfig, ConfigError>) -> (SceneConfig, ConfigStatus) {
        match result {
            Ok(config) => (config, ConfigStatus(None)),
            Err(e) => (SceneConfig::default(), ConfigStatus(Some(e))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    pub title: String,
    pub width: f32,
    pub height: f32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Endurance Drift".to_string(),
            width: 1400.0,
            height: 900.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    pub position: [f32; 3],
    pub target: [f32; 3],
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    /// Fraction of pending orbit motion applied (and removed) per tick.
    pub damping_factor: f32,
    /// Radians per pixel of mouse drag.
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: [0.0, 5.0, 20.0],
            target: [0.0, 0.0, 0.0],
            fov_degrees: 75.0,
            near: 0.1,
            far: 1000.0,
            damping_factor: 0.05,
            rotate_speed: 0.005,
            zoom_speed: 0.1,
            min_distance: 1.0,
            max_distance: 500.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightingConfig {
    pub clear_color: [f32; 3],
    pub ambient_brightness: f32,
    pub directional_illuminance: f32,
    pub directional_position: [f32; 3],
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.0],
            ambient_brightness: 400.0,
            directional_illuminance: 8_000.0,
            directional_position: [5.0, 10.0, 7.5],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipConfig {
    pub asset: String,
    pub position: [f32; 3],
    pub scale: f32,
    /// Per-tick rotation increment around Y.
    pub spin_y: f32,
    /// Per-tick rotation increment around X.
    pub spin_x: f32,
    pub travel_step: f32,
    /// The ship turns back once it is this close (in Z) to the background.
    pub dock_margin: f32,
}

impl Default for ShipConfig {
    fn default() -> Self {
        Self {
            asset: "interstellar__endurance_high_fidelity.glb".to_string(),
            position: [0.0, 0.0, 0.0],
            scale: 0.1,
            spin_y: 0.01,
            spin_x: 0.005,
            travel_step: 0.1,
            dock_margin: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundConfig {
    pub asset: String,
    pub position: [f32; 3],
    pub scale: f32,
    pub spin_y: f32,
    pub spin_x: f32,
    /// Angular frequency of the X/Y drift, radians per second.
    pub drift_frequency: f32,
    pub drift_amplitude: f32,
    pub rim_name: String,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            asset: "blackhole.glb".to_string(),
            position: [0.0, 0.0, -100.0],
            scale: 50.0,
            spin_y: 0.095,
            spin_x: 0.001,
            drift_frequency: 1.0,
            drift_amplitude: 2.0,
            rim_name: "Rim".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticleConfig {
    pub count: usize,
    /// Half-extent of the cube the particles live in.
    pub bound: f32,
    /// Width of the range velocities are sampled from, centred on zero.
    pub velocity_spread: f32,
    pub acceleration_spread: f32,
    pub color: [f32; 3],
    pub opacity: f32,
    pub seed: Option<u64>,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            count: 1000,
            bound: 250.0,
            velocity_spread: 0.1,
            acceleration_spread: 0.01,
            color: [1.0, 1.0, 1.0],
            opacity: 0.8,
            seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(toml: &str) -> Result<SceneConfig, ConfigError> {
        SceneConfig::from_figment(
            Figment::from(Serialized::defaults(SceneConfig::default())).merge(Toml::string(toml)),
        )
    }

    #[test]
    fn defaults_are_valid() {
        let config = SceneConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.particles.count, 1000);
        assert_eq!(config.particles.bound, 250.0);
        assert_eq!(config.background.position[2], -100.0);
        assert_eq!(config.camera.damping_factor, 0.05);
    }

    #[test]
    fn toml_overrides_single_field() {
        let config = from_toml(
            r#"
            [particles]
            count = 64
            seed = 7
            "#,
        )
        .unwrap();
        assert_eq!(config.particles.count, 64);
        assert_eq!(config.particles.seed, Some(7));
        // untouched fields keep their defaults
        assert_eq!(config.particles.bound, 250.0);
        assert_eq!(config.ship.travel_step, 0.1);
    }

    #[test]
    fn rejects_empty_field() {
        let err = from_toml("[particles]\ncount = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_bad_damping() {
        let err = from_toml("[camera]\ndamping_factor = 1.5\n").unwrap_err();
        assert!(err.to_string().contains("damping_factor"));
    }

    #[test]
    fn rejects_wrong_type() {
        let err = from_toml("[ship]\ntravel_step = \"fast\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }

    #[test]
    fn rejects_bounds_too_large_to_sample() {
        let mut config = SceneConfig::default();
        for bound in [f32::MAX, f32::INFINITY, f32::NAN, 0.0] {
            config.particles.bound = bound;
            assert!(config.validate().is_err(), "bound = {bound}");
        }
        config.particles.bound = MAX_BOUND;
        assert!(config.validate().is_ok());

        let err = from_toml("[particles]\nbound = inf\n").unwrap_err();
        assert!(err.to_string().contains("particles.bound"));
    }

    #[test]
    fn rejects_non_finite_rates() {
        let cases: [fn(&mut SceneConfig); 6] = [
            |c| c.particles.velocity_spread = f32::NAN,
            |c| c.particles.acceleration_spread = f32::NAN,
            |c| c.particles.velocity_spread = -0.1,
            |c| c.particles.opacity = f32::NAN,
            |c| c.ship.travel_step = f32::INFINITY,
            |c| c.ship.dock_margin = f32::NAN,
        ];
        for (i, tweak) in cases.iter().enumerate() {
            let mut config = SceneConfig::default();
            tweak(&mut config);
            assert!(
                matches!(config.validate(), Err(ConfigError::Invalid(_))),
                "case {i}"
            );
        }
    }

    #[test]
    fn rejects_dock_at_or_past_start() {
        // background at z = -5 puts the dock in front of the ship's start
        let err = from_toml("[background]\nposition = [0.0, 0.0, -5.0]\n").unwrap_err();
        assert!(err.to_string().contains("turns back"));

        let err = from_toml("[ship]\ndock_margin = 99.95\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let config = from_toml("[ship]\ndock_margin = 99.0\n").unwrap();
        assert_eq!(config.ship.dock_margin, 99.0);
    }

    #[test]
    fn failed_load_resolves_to_defaults() {
        let (config, status) = ConfigStatus::resolve(from_toml("[particles]\ncount = 0\n"));
        assert_eq!(config.particles.count, 1000);
        assert!(matches!(status.0, Some(ConfigError::Invalid(_))));

        let (config, status) = ConfigStatus::resolve(from_toml("[particles]\ncount = 5\n"));
        assert_eq!(config.particles.count, 5);
        assert!(status.0.is_none());
    }

    #[test]
    fn shipped_defaults_file_loads() {
        let config = SceneConfig::load_from("config").unwrap();
        assert_eq!(config.particles.count, 1000);
        assert_eq!(config.background.asset, "blackhole.glb");
        assert_eq!(config.camera.position, [0.0, 5.0, 20.0]);
    }

    #[test]
    fn missing_directory_yields_defaults() {
        let config = SceneConfig::load_from("does/not/exist").unwrap();
        assert_eq!(config.background.rim_name, "Rim");
    }
}
