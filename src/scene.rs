//! Scene graph setup and the glue between `SceneState` and the renderer:
//! lights, the particle point cloud, the two glTF models, and the load
//! handoff that fills the model slots once their assets arrive.

use std::f32::consts::FRAC_PI_2;

use bevy::asset::LoadState;
use bevy::color::LinearRgba;
use bevy::gltf::{Gltf, GltfAssetLabel};
use bevy::hierarchy::HierarchyQueryExt;
use bevy::prelude::*;
use bevy::render::mesh::PrimitiveTopology;
use bevy::render::render_asset::RenderAssetUsages;
use bevy::render::view::NoFrustumCulling;

use crate::config::SceneConfig;
use crate::sim::{ModelPose, SceneState, SimSet};

#[derive(Component)]
pub struct ShipModel;

#[derive(Component)]
pub struct BackgroundModel;

#[derive(Component)]
pub struct ParticleCloud;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LoadStatus {
    Loading,
    Ready,
    Failed,
}

pub struct ModelSlot {
    pub path: String,
    /// The whole file. Its load state decides the slot's status, since a
    /// missing or broken file is reported against it.
    pub root: Handle<Gltf>,
    pub handle: Handle<Scene>,
    pub status: LoadStatus,
}

impl ModelSlot {
    fn new(asset_server: &AssetServer, path: &str) -> Self {
        Self {
            path: path.to_string(),
            root: asset_server.load(path.to_string()),
            handle: asset_server.load(GltfAssetLabel::Scene(0).from_asset(path.to_string())),
            status: LoadStatus::Loading,
        }
    }

    /// Moves a still-loading slot on according to `state`. True only on the
    /// call that first sees the asset loaded; a failure is logged here once.
    fn observe(&mut self, state: LoadState, what: &str) -> bool {
        if self.status != LoadStatus::Loading {
            return false;
        }
        match state {
            LoadState::Loaded => {
                self.status = LoadStatus::Ready;
                info!("{what} model loaded from {}", self.path);
                true
            }
            LoadState::Failed(err) => {
                self.status = LoadStatus::Failed;
                error!("failed to load {what} model from {}: {err}", self.path);
                false
            }
            _ => false,
        }
    }
}

#[derive(Resource)]
pub struct ModelHandles {
    pub ship: ModelSlot,
    pub background: ModelSlot,
}

pub struct ScenePlugin;
impl Plugin for ScenePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, (setup_lighting, spawn_particles, spawn_models))
            .add_systems(Update, poll_model_loads.before(SimSet::Advance))
            .add_systems(
                Update,
                (sync_models, upload_particles, orient_rim).after(SimSet::Advance),
            );
    }
}

fn setup_lighting(mut commands: Commands, config: Res<SceneConfig>) {
    let l = &config.lighting;
    let [r, g, b] = l.clear_color;
    commands.insert_resource(ClearColor(Color::srgb(r, g, b)));
    commands.insert_resource(AmbientLight {
        color: Color::WHITE,
        brightness: l.ambient_brightness,
    });
    commands.spawn(DirectionalLightBundle {
        directional_light: DirectionalLight {
            illuminance: l.directional_illuminance,
            ..default()
        },
        transform: Transform::from_translation(Vec3::from(l.directional_position))
            .looking_at(Vec3::ZERO, Vec3::Y),
        ..default()
    });
}

// Material and point cloud are created exactly once; per-frame work only
// rewrites the position attribute.
fn spawn_particles(
    mut commands: Commands,
    state: Res<SceneState>,
    config: Res<SceneConfig>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let p = &config.particles;
    let [r, g, b] = p.color;
    let mesh = Mesh::new(PrimitiveTopology::PointList, RenderAssetUsages::default())
        .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, state.field.positions());
    let material = StandardMaterial {
        base_color: Color::srgba(r, g, b, p.opacity),
        emissive: LinearRgba::rgb(r * 0.5, g * 0.5, b * 0.5),
        unlit: true,
        alpha_mode: AlphaMode::Blend,
        ..default()
    };

    commands.spawn((
        PbrBundle {
            mesh: meshes.add(mesh),
            material: materials.add(material),
            ..default()
        },
        // the cloud's bounds move every frame
        NoFrustumCulling,
        ParticleCloud,
    ));
}

fn spawn_models(mut commands: Commands, asset_server: Res<AssetServer>, config: Res<SceneConfig>) {
    let handles = ModelHandles {
        ship: ModelSlot::new(&asset_server, &config.ship.asset),
        background: ModelSlot::new(&asset_server, &config.background.asset),
    };

    let ship_pose = ModelPose::new(Vec3::from(config.ship.position), config.ship.scale);
    commands.spawn((
        SceneBundle {
            scene: handles.ship.handle.clone(),
            transform: ship_pose.transform(),
            ..default()
        },
        Name::new("Ship"),
        ShipModel,
    ));

    let bg = &config.background;
    let bg_pose = ModelPose::new(Vec3::from(bg.position), bg.scale);
    commands.spawn((
        SceneBundle {
            scene: handles.background.handle.clone(),
            transform: bg_pose.transform(),
            ..default()
        },
        Name::new("Background"),
        BackgroundModel,
    ));

    commands.insert_resource(handles);
}

/// Publishes a model into its `SceneState` slot the first frame its asset
/// reports loaded. Failures are logged once and the slot stays empty.
fn poll_model_loads(
    asset_server: Res<AssetServer>,
    handles: Option<ResMut<ModelHandles>>,
    mut state: ResMut<SceneState>,
    config: Res<SceneConfig>,
) {
    let Some(mut handles) = handles else {
        return;
    };

    if became_ready(&asset_server, &mut handles.ship, "ship") {
        state.ship = Some(ModelPose::new(
            Vec3::from(config.ship.position),
            config.ship.scale,
        ));
    }

    if became_ready(&asset_server, &mut handles.background, "background") {
        let bg = &config.background;
        state.background = Some(ModelPose::new(Vec3::from(bg.position), bg.scale));
    }
}

/// True only on the frame a still-loading slot's asset finishes loading.
fn became_ready(asset_server: &AssetServer, slot: &mut ModelSlot, what: &str) -> bool {
    if slot.status != LoadStatus::Loading {
        return false;
    }
    slot.observe(asset_server.load_state(&slot.root), what)
}

fn sync_models(
    state: Res<SceneState>,
    mut ship_q: Query<&mut Transform, With<ShipModel>>,
    mut bg_q: Query<&mut Transform, (With<BackgroundModel>, Without<ShipModel>)>,
) {
    if let Some(pose) = state.ship {
        for mut t in &mut ship_q {
            *t = pose.transform();
        }
    }
    if let Some(pose) = state.background {
        for mut t in &mut bg_q {
            *t = pose.transform();
        }
    }
}

fn upload_particles(
    mut state: ResMut<SceneState>,
    cloud_q: Query<&Handle<Mesh>, With<ParticleCloud>>,
    mut meshes: ResMut<Assets<Mesh>>,
) {
    if !state.field.dirty {
        return;
    }
    let Ok(handle) = cloud_q.get_single() else {
        return;
    };
    let Some(mesh) = meshes.get_mut(handle) else {
        return;
    };
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, state.field.positions());
    state.field.dirty = false;
}

/// Turns the background's rim node on its side once the scene spawns it.
fn orient_rim(
    config: Res<SceneConfig>,
    mut named: Query<(Entity, &Name, &mut Transform), Added<Name>>,
    parents: Query<&Parent>,
    backgrounds: Query<(), With<BackgroundModel>>,
) {
    for (entity, name, mut t) in &mut named {
        if name.as_str() != config.background.rim_name {
            continue;
        }
        if !parents.iter_ancestors(entity).any(|a| backgrounds.contains(a)) {
            continue;
        }
        let (x, y, _) = t.rotation.to_euler(EulerRot::XYZ);
        t.rotation = Quat::from_euler(EulerRot::XYZ, x, y, FRAC_PI_2);
        info!("oriented background rim '{}'", name.as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::time::Duration;

    fn app_with_state() -> App {
        let mut rng = StdRng::seed_from_u64(11);
        let config = SceneConfig::default();
        let state = SceneState::new(&config, &mut rng);
        let mut app = App::new();
        app.insert_resource(config)
            .insert_resource(state)
            .init_resource::<Assets<Mesh>>();
        app
    }

    #[test]
    fn sync_copies_loaded_poses_only() {
        let mut app = app_with_state();
        app.add_systems(Update, sync_models);
        let ship = app
            .world_mut()
            .spawn((Transform::from_xyz(1.0, 1.0, 1.0), ShipModel))
            .id();
        let bg = app
            .world_mut()
            .spawn((Transform::from_xyz(2.0, 2.0, 2.0), BackgroundModel))
            .id();

        let mut pose = ModelPose::new(Vec3::new(0.0, 0.0, -3.0), 0.1);
        pose.rotation.y = 0.5;
        app.world_mut().resource_mut::<SceneState>().ship = Some(pose);
        app.update();

        let world = app.world();
        assert_eq!(*world.get::<Transform>(ship).unwrap(), pose.transform());
        // background not loaded: left untouched
        assert_eq!(
            world.get::<Transform>(bg).unwrap().translation,
            Vec3::splat(2.0)
        );
    }

    #[test]
    fn upload_rewrites_positions_and_clears_flag() {
        let mut app = app_with_state();
        app.add_systems(Update, upload_particles);

        let mesh = Mesh::new(PrimitiveTopology::PointList, RenderAssetUsages::default())
            .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, vec![[0.0f32; 3]; 1000]);
        let handle = app.world_mut().resource_mut::<Assets<Mesh>>().add(mesh);
        app.world_mut().spawn((handle.clone(), ParticleCloud));
        app.update();

        let expected = app.world().resource::<SceneState>().field.positions();
        assert!(!app.world().resource::<SceneState>().field.dirty);
        let meshes = app.world().resource::<Assets<Mesh>>();
        let uploaded = meshes
            .get(&handle)
            .and_then(|m| m.attribute(Mesh::ATTRIBUTE_POSITION))
            .and_then(|a| a.as_float3())
            .unwrap();
        assert_eq!(uploaded, expected.as_slice());
    }

    #[test]
    fn rim_is_turned_only_under_background() {
        let mut app = app_with_state();
        app.add_systems(Update, orient_rim);

        let bg = app
            .world_mut()
            .spawn((TransformBundle::default(), BackgroundModel))
            .id();
        let rim = app
            .world_mut()
            .spawn((TransformBundle::default(), Name::new("Rim")))
            .set_parent(bg)
            .id();
        let stray = app
            .world_mut()
            .spawn((TransformBundle::default(), Name::new("Rim")))
            .id();
        app.update();

        let world = app.world();
        let turned = world.get::<Transform>(rim).unwrap().rotation;
        assert!(turned.abs_diff_eq(Quat::from_rotation_z(FRAC_PI_2), 1e-6));
        assert_eq!(world.get::<Transform>(stray).unwrap().rotation, Quat::IDENTITY);
    }

    #[test]
    fn slot_reports_ready_exactly_once() {
        let mut slot = ModelSlot {
            path: "ship.glb".into(),
            root: Handle::default(),
            handle: Handle::default(),
            status: LoadStatus::Loading,
        };
        assert!(!slot.observe(LoadState::Loading, "ship"));
        assert_eq!(slot.status, LoadStatus::Loading);

        assert!(slot.observe(LoadState::Loaded, "ship"));
        assert_eq!(slot.status, LoadStatus::Ready);

        assert!(!slot.observe(LoadState::Loaded, "ship"));
        assert!(!slot.observe(LoadState::NotLoaded, "ship"));
        assert_eq!(slot.status, LoadStatus::Ready);
    }

    #[test]
    fn loaded_pose_is_published_once() {
        let mut app = app_with_state();
        app.add_plugins((MinimalPlugins, AssetPlugin::default()))
            .init_asset::<Scene>()
            .init_asset::<Gltf>()
            .add_systems(Update, poll_model_loads);
        app.update();

        let handles = ModelHandles {
            ship: ModelSlot {
                path: "ship.glb".into(),
                root: Handle::default(),
                handle: Handle::default(),
                status: LoadStatus::Ready,
            },
            background: ModelSlot {
                path: "blackhole.glb".into(),
                root: Handle::default(),
                handle: Handle::default(),
                status: LoadStatus::Ready,
            },
        };
        app.insert_resource(handles);

        // already-ready slots never republish, so live poses survive
        let mut pose = ModelPose::new(Vec3::new(0.0, 0.0, -42.0), 0.1);
        pose.rotation.y = 1.0;
        app.world_mut().resource_mut::<SceneState>().ship = Some(pose);
        app.update();
        app.update();
        assert_eq!(app.world().resource::<SceneState>().ship, Some(pose));
    }

    #[test]
    fn missing_model_fails_and_slot_stays_empty() {
        let mut app = app_with_state();
        {
            let mut config = app.world_mut().resource_mut::<SceneConfig>();
            config.ship.asset = "models/no_such_ship.glb".into();
            config.background.asset = "models/no_such_blackhole.glb".into();
        }
        app.add_plugins((MinimalPlugins, AssetPlugin::default()))
            .init_asset::<Scene>()
            .init_asset::<Gltf>()
            .add_systems(Startup, spawn_models)
            .add_systems(Update, poll_model_loads);

        for _ in 0..1_000 {
            app.update();
            let handles = app.world().resource::<ModelHandles>();
            if handles.ship.status != LoadStatus::Loading
                && handles.background.status != LoadStatus::Loading
            {
                break;
            }
            std::thread::sleep(Duration::from_millis(2));
        }

        for _ in 0..5 {
            app.update();
            let handles = app.world().resource::<ModelHandles>();
            assert_eq!(handles.ship.status, LoadStatus::Failed);
            assert_eq!(handles.background.status, LoadStatus::Failed);
            let state = app.world().resource::<SceneState>();
            assert!(state.ship.is_none());
            assert!(state.background.is_none());
        }
    }
}
