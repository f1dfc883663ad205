mod config;
mod field;
mod input;
mod scene;
mod sim;
mod ui;

use bevy::core_pipeline::tonemapping::Tonemapping;
use bevy::diagnostic::{EntityCountDiagnosticsPlugin, FrameTimeDiagnosticsPlugin};
use bevy::prelude::*;
use config::{ConfigStatus, SceneConfig};
use input::{InputPlugin, OrbitControls};
use scene::ScenePlugin;
use sim::SimPlugin;
use ui::UiPlugin;

fn main() {
    let (config, config_status) = ConfigStatus::resolve(SceneConfig::load());
    let window = config.window.clone();

    App::new()
        .insert_resource(Msaa::Sample4)
        .insert_resource(config)
        .insert_resource(config_status)
        .add_plugins(FrameTimeDiagnosticsPlugin)
        .add_plugins(EntityCountDiagnosticsPlugin)
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: window.title,
                resolution: (window.width, window.height).into(),
                ..default()
            }),
            ..default()
        }))
        .add_plugins((SimPlugin, ScenePlugin, UiPlugin, InputPlugin))
        .add_systems(Startup, (setup_camera, log_config_status))
        .run();
}

fn setup_camera(mut commands: Commands, config: Res<SceneConfig>) {
    let cam = &config.camera;
    let orbit = OrbitControls::new(Vec3::from(cam.position), Vec3::from(cam.target), cam);
    commands.spawn((
        Camera3dBundle {
            projection: PerspectiveProjection {
                fov: cam.fov_degrees.to_radians(),
                near: cam.near,
                far: cam.far,
                ..default()
            }
            .into(),
            tonemapping: Tonemapping::TonyMcMapface,
            transform: orbit.transform(),
            ..default()
        },
        orbit,
        MainCamera,
    ));
}

fn log_config_status(status: Res<ConfigStatus>) {
    match &status.0 {
        Some(err) => warn!("{err}; using built-in defaults"),
        None => info!("configuration loaded"),
    }
}

#[derive(Component)]
pub struct MainCamera;
