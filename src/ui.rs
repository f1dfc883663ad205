use bevy::diagnostic::{DiagnosticsStore, EntityCountDiagnosticsPlugin, FrameTimeDiagnosticsPlugin};
use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPlugin};

use crate::scene::{LoadStatus, ModelHandles};
use crate::sim::{Heading, ResetEvent, SceneState, SimState};

#[derive(Resource)]
pub struct OverlaySettings {
    pub show_help: bool,
    pub show_diagnostics: bool,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            show_help: true,
            show_diagnostics: false,
        }
    }
}

pub struct UiPlugin;
impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(EguiPlugin)
            .init_resource::<OverlaySettings>()
            .add_systems(Update, ui_system);
    }
}

fn status_text(status: Option<LoadStatus>) -> &'static str {
    match status {
        Some(LoadStatus::Ready) => "ready",
        Some(LoadStatus::Failed) => "failed",
        Some(LoadStatus::Loading) | None => "loading…",
    }
}

#[allow(clippy::too_many_arguments)]
fn ui_system(
    mut contexts: EguiContexts,
    mut state: ResMut<SceneState>,
    overlay: Res<OverlaySettings>,
    diagnostics: Res<DiagnosticsStore>,
    handles: Option<Res<ModelHandles>>,
    sim_state: Res<State<SimState>>,
    mut next_state: ResMut<NextState<SimState>>,
    mut ev_reset: EventWriter<ResetEvent>,
) {
    let ctx = contexts.ctx_mut();

    egui::Window::new("Scene").show(ctx, |ui| {
        if let Some(fps) = diagnostics.get(&FrameTimeDiagnosticsPlugin::FPS) {
            if let Some(value) = fps.smoothed() {
                ui.label(format!("FPS: {:.1}", value));
            }
        }
        ui.label(format!("Particles: {}", state.field.particles.len()));

        let ship_status = handles.as_ref().map(|h| h.ship.status);
        let bg_status = handles.as_ref().map(|h| h.background.status);
        match state.ship {
            Some(ship) => {
                let heading = match state.heading {
                    Heading::Forward => "inbound",
                    Heading::Backward => "outbound",
                };
                ui.label(format!(
                    "Ship: z {:.1} ({heading}), turns at {:.1}",
                    ship.translation.z,
                    state.dock_z()
                ));
            }
            None => {
                ui.label(format!("Ship: {}", status_text(ship_status)));
            }
        }
        match state.background {
            Some(bg) => {
                ui.label(format!(
                    "Background: ({:.2}, {:.2}, {:.1})",
                    bg.translation.x, bg.translation.y, bg.translation.z
                ));
            }
            None => {
                ui.label(format!("Background: {}", status_text(bg_status)));
            }
        }

        ui.separator();

        let mut running = *sim_state.get() == SimState::Running;
        if ui.checkbox(&mut running, "Running").changed() {
            next_state.set(if running {
                SimState::Running
            } else {
                SimState::Paused
            });
        }
        if ui.button("Reset").clicked() {
            ev_reset.send(ResetEvent);
        }

        ui.separator();

        ui.add(egui::Slider::new(&mut state.tuning.travel_step, 0.01..=1.0).text("Travel step"));
        // keep the dock behind the ship's start whatever the step
        let max_margin = state.max_dock_margin();
        let tuning = &mut state.tuning;
        ui.add(egui::Slider::new(&mut tuning.ship_spin_y, 0.0..=0.1).text("Ship spin Y"));
        ui.add(egui::Slider::new(&mut tuning.ship_spin_x, 0.0..=0.1).text("Ship spin X"));
        ui.add(egui::Slider::new(&mut tuning.dock_margin, 0.0..=max_margin).text("Dock margin"));

        ui.separator();

        ui.add(
            egui::Slider::new(&mut tuning.background_spin_y, 0.0..=0.2).text("Background spin Y"),
        );
        ui.add(
            egui::Slider::new(&mut tuning.background_spin_x, 0.0..=0.01)
                .text("Background spin X"),
        );
        ui.add(egui::Slider::new(&mut tuning.drift_frequency, 0.0..=5.0).text("Drift frequency"));
        ui.add(egui::Slider::new(&mut tuning.drift_amplitude, 0.0..=10.0).text("Drift amplitude"));
    });

    if overlay.show_help {
        egui::Window::new("Help").show(ctx, |ui| {
            ui.label("Left Mouse: Orbit (drag)");
            ui.label("Right Mouse: Pan (drag)");
            ui.label("Mouse Wheel: Zoom");
            ui.label("Space: Pause Simulation");
            ui.label("R: Reset Scene");
            ui.label("H: Toggle Help");
            ui.label("F3: Toggle Diagnostics");
        });
    }

    if overlay.show_diagnostics {
        egui::Window::new("Diagnostics").show(ctx, |ui| {
            if let Some(fps) = diagnostics.get(&FrameTimeDiagnosticsPlugin::FPS) {
                if let Some(value) = fps.smoothed() {
                    ui.label(format!("FPS: {:.1}", value));
                }
            }
            if let Some(entity_count) = diagnostics.get(&EntityCountDiagnosticsPlugin::ENTITY_COUNT)
            {
                if let Some(value) = entity_count.value() {
                    ui.label(format!("Entities: {}", value));
                }
            }
            ui.label(format!("Ticks: {}", state.ticks));
        });
    }
}
