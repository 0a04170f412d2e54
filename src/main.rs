// GUI-subsystem binary: no console window is ever allocated by Windows.
#![windows_subsystem = "windows"]
#![allow(dead_code)] // small API surface kept for future controls

mod app;
mod camera;
mod controls;
mod io;
pub mod logger;
mod overlay;

use app::CamFEApp;
use eframe::egui;

fn main() -> Result<(), eframe::Error> {
    // Initialize session log (overwrites previous session log)
    logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([540.0, 860.0])
            .with_min_inner_size([360.0, 480.0])
            .with_title("CamFE"),
        ..Default::default()
    };

    eframe::run_native("CamFE", options, Box::new(|cc| Box::new(CamFEApp::new(cc))))
}
