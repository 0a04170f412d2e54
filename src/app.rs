use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};

use eframe::egui;
use egui::{Align2, Color32, ColorImage, FontId, Pos2, Rect, Sense, TextureHandle, TextureOptions, Vec2};
use image::RgbaImage;

use crate::camera::{CameraFeed, FacingMode};
use crate::controls::{ControlAction, ControlsPanel};
use crate::io::{self, FileHandler, SNAPSHOT_NAME};
use crate::overlay::OverlayState;

// ============================================================================
// ASYNC IO PIPELINE — background snapshot export
// ============================================================================

/// Result delivered from a background save thread.
pub enum IoResult {
    SaveComplete { path: PathBuf },
    SaveFailed { error: String },
}

// ============================================================================
// CAPTURE GATE — busy protocol around the still-frame grab
// ============================================================================

/// Gate that defers the still-frame grab until the busy affordance has
/// actually been painted, and rejects re-triggers while a capture is in
/// flight.
///
/// Lifecycle per capture: `request()` arms the gate; the next `tick()`
/// moves it to Busy (that frame renders the spinner); the `tick()` after
/// that reports the grab should run and resets to Idle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CaptureState {
    Idle,
    Requested,
    Busy,
}

struct CaptureGate {
    state: CaptureState,
}

impl CaptureGate {
    fn new() -> Self {
        Self {
            state: CaptureState::Idle,
        }
    }

    /// Arm the gate.  Returns false (trigger ignored) while a capture is
    /// already in flight.
    fn request(&mut self) -> bool {
        if self.state != CaptureState::Idle {
            return false;
        }
        self.state = CaptureState::Requested;
        true
    }

    /// Advance one frame.  Returns true exactly once per armed request,
    /// on the tick after the busy state has been rendered.
    fn tick(&mut self) -> bool {
        match self.state {
            CaptureState::Idle => false,
            CaptureState::Requested => {
                self.state = CaptureState::Busy;
                false
            }
            CaptureState::Busy => {
                self.state = CaptureState::Idle;
                true
            }
        }
    }

    fn is_busy(&self) -> bool {
        self.state != CaptureState::Idle
    }
}

// ============================================================================
// APP
// ============================================================================

pub struct CamFEApp {
    // Capture source
    camera: CameraFeed,
    mirrored: bool,

    // Overlay state + drag controller
    overlay: OverlayState,

    // UI components
    controls: ControlsPanel,

    // File dialogs
    file_handler: FileHandler,

    // Live feed texture, re-uploaded when the worker publishes a new frame
    feed_texture: Option<TextureHandle>,
    feed_generation: u64,
    feed_size: Vec2,

    // Busy protocols
    capture: CaptureGate,
    download_busy: bool,

    // Background IO completion channel
    io_tx: Sender<IoResult>,
    io_rx: Receiver<IoResult>,
}

impl CamFEApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let (io_tx, io_rx) = mpsc::channel();
        Self {
            // Matches the tool's original defaults: rear camera, mirrored feed.
            camera: CameraFeed::start(FacingMode::Back),
            mirrored: true,
            overlay: OverlayState::new(),
            controls: ControlsPanel,
            file_handler: FileHandler::new(),
            feed_texture: None,
            feed_generation: 0,
            feed_size: Vec2::new(4.0, 3.0),
            capture: CaptureGate::new(),
            download_busy: false,
            io_tx,
            io_rx,
        }
    }

    /// Pull the newest worker frame into the feed texture.
    fn refresh_feed_texture(&mut self, ctx: &egui::Context) {
        if let Some((frame, generation)) = self.camera.latest_frame(self.feed_generation) {
            self.feed_size = Vec2::new(frame.width() as f32, frame.height() as f32);
            let color_image = ColorImage::from_rgba_unmultiplied(
                [frame.width() as usize, frame.height() as usize],
                frame.as_raw(),
            );
            match &mut self.feed_texture {
                Some(tex) => tex.set(color_image, TextureOptions::LINEAR),
                None => {
                    self.feed_texture =
                        Some(ctx.load_texture("camera_feed", color_image, TextureOptions::LINEAR));
                }
            }
            self.feed_generation = generation;
        }
    }

    /// Service a deferred capture: replace the overlay image with a feed
    /// snapshot.  No camera frame available is a quiet no-op.
    fn perform_capture(&mut self) {
        match self.camera.still_frame() {
            Some(frame) => {
                crate::log_info!("captured {}x{} still frame", frame.width(), frame.height());
                self.overlay.set_image(frame);
            }
            None => {
                crate::log_warn!("capture skipped: no camera frame available");
            }
        }
    }

    /// Save dialog on the UI thread, encode + write on a background thread.
    fn start_download(&mut self) {
        let Some(img) = self.overlay.image().cloned() else {
            return;
        };
        let Some(path) = self.file_handler.save_snapshot_dialog(SNAPSHOT_NAME) else {
            return; // cancelled
        };

        self.download_busy = true;
        let format = self.file_handler.last_format;
        let quality = self.file_handler.jpeg_quality;
        let tx = self.io_tx.clone();
        std::thread::spawn(move || {
            let result = match io::save_image(&img, &path, format, quality) {
                Ok(()) => IoResult::SaveComplete { path },
                Err(e) => IoResult::SaveFailed {
                    error: e.to_string(),
                },
            };
            let _ = tx.send(result);
        });
    }

    fn dispatch(&mut self, action: ControlAction, feed_rect: Rect, viewport: Rect) {
        match action {
            ControlAction::Capture => {
                self.capture.request();
            }
            ControlAction::ToggleFacing => {
                self.camera.toggle_facing();
            }
            ControlAction::Center => {
                self.overlay.center_against(feed_rect, viewport);
            }
            ControlAction::Upload => {
                apply_upload(
                    &mut self.overlay,
                    self.file_handler.pick_overlay_image().map(|(img, _)| img),
                );
            }
            ControlAction::Download => {
                self.start_download();
            }
        }
    }
}

/// Commit a picked upload to the overlay.  A cancelled picker (`None`)
/// leaves every piece of state untouched.
fn apply_upload(overlay: &mut OverlayState, picked: Option<RgbaImage>) {
    if let Some(img) = picked {
        overlay.set_image(img);
    }
}

/// Where the feed renders inside the viewport: scaled to the viewport
/// width, height following the frame's aspect ratio, vertically centered.
fn feed_rect_in(viewport: Rect, feed_size: Vec2) -> Rect {
    let scale = viewport.width() / feed_size.x;
    let height = feed_size.y * scale;
    Rect::from_min_size(
        Pos2::new(
            viewport.min.x,
            viewport.min.y + (viewport.height() - height) / 2.0,
        ),
        Vec2::new(viewport.width(), height),
    )
}

impl eframe::App for CamFEApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // --- Background completions ---
        while let Ok(result) = self.io_rx.try_recv() {
            self.download_busy = false;
            match result {
                IoResult::SaveComplete { path } => {
                    crate::log_info!("snapshot saved to {}", path.display());
                }
                IoResult::SaveFailed { error } => {
                    crate::log_err!("snapshot save failed: {}", error);
                }
            }
        }

        // Deferred capture: runs only after the busy state has painted.
        if self.capture.tick() {
            self.perform_capture();
        }

        self.refresh_feed_texture(ctx);

        // --- Control bar ---
        let mut action = None;
        egui::TopBottomPanel::bottom("controls").show(ctx, |ui| {
            ui.add_space(4.0);
            action = self.controls.ui(
                ui,
                &mut self.overlay,
                &mut self.mirrored,
                self.camera.facing(),
                self.camera.is_connected(),
                self.capture.is_busy(),
                self.download_busy,
            );
            ui.add_space(4.0);
        });

        // --- Composition: live feed under the overlay image ---
        let mut feed_rect = Rect::NOTHING;
        let mut viewport = Rect::NOTHING;
        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(Color32::from_gray(30)))
            .show(ctx, |ui| {
                viewport = ui.max_rect();

                if let Some(tex) = &self.feed_texture {
                    feed_rect = feed_rect_in(viewport, self.feed_size);
                    // Mirroring flips the feed only, never the overlay.
                    let uv = if self.mirrored {
                        Rect::from_min_max(Pos2::new(1.0, 0.0), Pos2::new(0.0, 1.0))
                    } else {
                        Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0))
                    };
                    ui.painter().image(tex.id(), feed_rect, uv, Color32::WHITE);
                } else {
                    feed_rect = viewport;
                    ui.painter().text(
                        viewport.center(),
                        Align2::CENTER_CENTER,
                        "Waiting for camera…",
                        FontId::proportional(18.0),
                        Color32::GRAY,
                    );
                }

                // Overlay image at (position, size, size, opacity/100).
                let overlay_rect = self.overlay.rect();
                let alpha = (self.overlay.alpha() * 255.0).round() as u8;
                let overlay_tex = self.overlay.texture(ctx).map(|tex| tex.id());
                if let Some(tex_id) = overlay_tex {
                    ui.painter().image(
                        tex_id,
                        overlay_rect,
                        Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
                        Color32::from_rgba_unmultiplied(255, 255, 255, alpha),
                    );

                    // Drag controller: offset captured at press, position
                    // tracks the primary pointer until release.
                    let response =
                        ui.interact(overlay_rect, ui.id().with("overlay_drag"), Sense::drag());
                    if response.drag_started()
                        && let Some(pointer) = response.interact_pointer_pos()
                    {
                        self.overlay.begin_drag(pointer);
                    }
                    if response.dragged()
                        && let Some(pointer) = response.interact_pointer_pos()
                    {
                        self.overlay.drag_to(pointer);
                    }
                    if response.drag_released() {
                        self.overlay.end_drag();
                    }
                }
            });

        if let Some(action) = action {
            self.dispatch(action, feed_rect, viewport);
        }

        // Live feed: keep repainting.
        ctx.request_repaint();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_capture_while_busy_is_ignored() {
        let mut gate = CaptureGate::new();
        let mut replacements = 0;

        assert!(gate.request());
        // Re-trigger before completion: rejected at every stage.
        assert!(!gate.request());
        for _ in 0..4 {
            if gate.tick() {
                replacements += 1;
            }
            if gate.is_busy() {
                assert!(!gate.request());
            }
        }
        assert_eq!(replacements, 1);
    }

    #[test]
    fn capture_grab_runs_after_busy_frame_rendered() {
        let mut gate = CaptureGate::new();
        assert!(gate.request());
        // First tick renders the busy affordance, no grab yet.
        assert!(!gate.tick());
        assert!(gate.is_busy());
        // Second tick performs the grab and frees the gate.
        assert!(gate.tick());
        assert!(!gate.is_busy());
        // And the next capture can be requested again.
        assert!(gate.request());
    }

    #[test]
    fn cancelled_upload_leaves_state_unchanged() {
        let mut overlay = OverlayState::new();
        overlay.set_image(RgbaImage::new(3, 3));
        overlay.set_size(321);
        overlay.set_opacity(55);
        overlay.set_position(Pos2::new(12.0, 34.0));

        apply_upload(&mut overlay, None);

        assert_eq!(overlay.image().unwrap().width(), 3);
        assert_eq!(overlay.size(), 321);
        assert_eq!(overlay.opacity(), 55);
        assert_eq!(overlay.position(), Pos2::new(12.0, 34.0));
    }

    #[test]
    fn chosen_upload_replaces_image_only() {
        let mut overlay = OverlayState::new();
        overlay.set_size(321);
        apply_upload(&mut overlay, Some(RgbaImage::new(7, 7)));
        assert_eq!(overlay.image().unwrap().width(), 7);
        assert_eq!(overlay.size(), 321);
    }

    #[test]
    fn feed_fills_viewport_width_and_centers_vertically() {
        // Native 250x400 frame in a 500x1000 viewport renders 500x800 with
        // a 100pt band above and below.
        let viewport = Rect::from_min_size(Pos2::ZERO, Vec2::new(500.0, 1000.0));
        let rect = feed_rect_in(viewport, Vec2::new(250.0, 400.0));
        assert_eq!(rect.min, Pos2::new(0.0, 100.0));
        assert_eq!(rect.size(), Vec2::new(500.0, 800.0));

        // Centering the overlay against that feed lands at (0, 100) / 500.
        let mut overlay = OverlayState::new();
        overlay.center_against(rect, viewport);
        assert_eq!(overlay.position(), Pos2::new(0.0, 100.0));
        assert_eq!(overlay.size(), 500);
    }
}
