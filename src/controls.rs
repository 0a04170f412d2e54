//! Control surface — the bottom bar of capture/facing/mirror/size/opacity
//! controls.  Sliders and the mirror checkbox mutate state directly;
//! everything that needs an app service (camera, dialogs, background save)
//! is reported back as a [`ControlAction`].

use egui::{RichText, Slider, Ui};

use crate::camera::FacingMode;
use crate::overlay::{OPACITY_MAX, OverlayState, SIZE_MAX, SIZE_MIN, SIZE_STEP};

/// A button press the app has to service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlAction {
    Capture,
    ToggleFacing,
    Center,
    Upload,
    Download,
}

#[derive(Default)]
pub struct ControlsPanel;

impl ControlsPanel {
    /// Render the control bar.  Returns at most one action per frame.
    #[allow(clippy::too_many_arguments)]
    pub fn ui(
        &mut self,
        ui: &mut Ui,
        overlay: &mut OverlayState,
        mirrored: &mut bool,
        facing: FacingMode,
        camera_connected: bool,
        capture_busy: bool,
        download_busy: bool,
    ) -> Option<ControlAction> {
        let mut action = None;

        // --- Overlay adjustment row ---
        ui.horizontal(|ui| {
            ui.label("Size");
            if ui.small_button("−").clicked() {
                overlay.step_size(-(SIZE_STEP as i32));
            }
            let mut size = overlay.size();
            if ui
                .add(Slider::new(&mut size, SIZE_MIN..=SIZE_MAX))
                .changed()
            {
                overlay.set_size(size);
            }
            if ui.small_button("+").clicked() {
                overlay.step_size(SIZE_STEP as i32);
            }

            ui.separator();

            ui.label("Opacity");
            let mut opacity = overlay.opacity();
            if ui.add(Slider::new(&mut opacity, 0..=OPACITY_MAX)).changed() {
                overlay.set_opacity(opacity);
            }

            ui.separator();

            ui.checkbox(mirrored, "Mirror");
        });

        // --- Action row ---
        ui.horizontal(|ui| {
            if ui.button("Upload…").clicked() {
                action = Some(ControlAction::Upload);
            }

            // Shutter: disabled while a capture is pending or no feed yet.
            let shutter = ui.add_enabled(
                !capture_busy && camera_connected,
                egui::Button::new(RichText::new("⏺ Capture").strong()),
            );
            if capture_busy {
                ui.spinner();
            }
            if shutter.clicked() {
                action = Some(ControlAction::Capture);
            }

            if ui
                .button(format!("Camera: {}", facing.label()))
                .on_hover_text("Switch front/back camera")
                .clicked()
            {
                action = Some(ControlAction::ToggleFacing);
            }

            ui.separator();

            if ui
                .button("Center")
                .on_hover_text("Snap the overlay to the feed")
                .clicked()
            {
                action = Some(ControlAction::Center);
            }

            let download = ui.add_enabled(
                !download_busy && overlay.has_image(),
                egui::Button::new("Download…"),
            );
            if download_busy {
                ui.spinner();
            }
            if download.clicked() {
                action = Some(ControlAction::Download);
            }
        });

        action
    }
}
