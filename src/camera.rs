//! Camera capture — a worker thread streams frames from the selected
//! device via `nokhwa` and publishes the latest decoded frame into a
//! shared slot the UI thread reads each repaint.
//!
//! Facing-mode switches and shutdown are delivered to the worker over a
//! channel; reopening the device on a switch may briefly interrupt the
//! feed, which is expected and not an error.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use image::RgbaImage;
use nokhwa::Camera;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType};

/// How long the worker waits before retrying when no camera can be opened.
const REOPEN_INTERVAL: Duration = Duration::from_millis(500);

/// Which physical camera supplies the live feed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FacingMode {
    Front,
    Back,
}

impl FacingMode {
    pub fn toggled(self) -> Self {
        match self {
            FacingMode::Front => FacingMode::Back,
            FacingMode::Back => FacingMode::Front,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FacingMode::Front => "Front",
            FacingMode::Back => "Back",
        }
    }

    /// Constraint-style name, used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            FacingMode::Front => "user",
            FacingMode::Back => "environment",
        }
    }
}

/// Desktop cameras carry no facing metadata, so the mapping is positional:
/// front is the first enumerated device, back the second when present.
fn device_index_for(facing: FacingMode, device_count: usize) -> u32 {
    match facing {
        FacingMode::Front => 0,
        FacingMode::Back => {
            if device_count > 1 {
                1
            } else {
                0
            }
        }
    }
}

enum CameraCommand {
    SwitchFacing(FacingMode),
    Shutdown,
}

/// Latest decoded frame plus a generation counter so the UI only clones
/// and re-uploads when the frame actually changed.
struct FrameSlot {
    frame: Option<RgbaImage>,
    generation: u64,
    connected: bool,
}

/// Handle to the capture worker.  Owned by the app; dropping it shuts the
/// worker down.
pub struct CameraFeed {
    cmd_tx: Sender<CameraCommand>,
    slot: Arc<Mutex<FrameSlot>>,
    facing: FacingMode,
}

impl CameraFeed {
    /// Spawn the capture worker targeting the given facing mode.
    pub fn start(facing: FacingMode) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let slot = Arc::new(Mutex::new(FrameSlot {
            frame: None,
            generation: 0,
            connected: false,
        }));

        let worker_slot = Arc::clone(&slot);
        std::thread::spawn(move || worker_loop(facing, cmd_rx, worker_slot));

        Self {
            cmd_tx,
            slot,
            facing,
        }
    }

    pub fn facing(&self) -> FacingMode {
        self.facing
    }

    /// Flip front/back and ask the worker to reopen the device.
    pub fn toggle_facing(&mut self) {
        self.facing = self.facing.toggled();
        crate::log_info!("switching camera facing to {}", self.facing.as_str());
        let _ = self.cmd_tx.send(CameraCommand::SwitchFacing(self.facing));
    }

    pub fn is_connected(&self) -> bool {
        self.slot.lock().map(|s| s.connected).unwrap_or(false)
    }

    /// The newest frame, if it is newer than `seen`.  Returns the frame
    /// clone and its generation.
    pub fn latest_frame(&self, seen: u64) -> Option<(RgbaImage, u64)> {
        let slot = self.slot.lock().ok()?;
        if slot.generation <= seen {
            return None;
        }
        slot.frame.clone().map(|f| (f, slot.generation))
    }

    /// Immediately-available snapshot of the feed, or `None` when no
    /// camera is connected.  This is the capture primitive.
    pub fn still_frame(&self) -> Option<RgbaImage> {
        self.slot.lock().ok()?.frame.clone()
    }
}

impl Drop for CameraFeed {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(CameraCommand::Shutdown);
    }
}

// ---------------------------------------------------------------------------
//  Worker
// ---------------------------------------------------------------------------

fn open_for(facing: FacingMode) -> Result<Camera, String> {
    let devices =
        nokhwa::query(ApiBackend::Auto).map_err(|e| format!("camera query failed: {}", e))?;
    if devices.is_empty() {
        return Err("no cameras available".to_string());
    }
    let index = device_index_for(facing, devices.len());

    let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
    let mut camera = Camera::new(CameraIndex::Index(index), requested)
        .map_err(|e| format!("failed to open camera {}: {}", index, e))?;
    camera
        .open_stream()
        .map_err(|e| format!("failed to start stream on camera {}: {}", index, e))?;
    Ok(camera)
}

fn set_connected(slot: &Arc<Mutex<FrameSlot>>, connected: bool) {
    if let Ok(mut s) = slot.lock() {
        s.connected = connected;
    }
}

fn publish_frame(slot: &Arc<Mutex<FrameSlot>>, frame: RgbaImage) {
    if let Ok(mut s) = slot.lock() {
        s.frame = Some(frame);
        s.generation += 1;
        s.connected = true;
    }
}

fn worker_loop(mut facing: FacingMode, cmd_rx: Receiver<CameraCommand>, slot: Arc<Mutex<FrameSlot>>) {
    loop {
        let mut camera = match open_for(facing) {
            Ok(cam) => {
                crate::log_info!(
                    "camera opened ({}, {})",
                    facing.as_str(),
                    cam.camera_format()
                );
                cam
            }
            Err(e) => {
                // Missing/busy camera is a quiet degraded state: keep the
                // UI alive and retry until a device shows up.
                crate::log_warn!("{}", e);
                set_connected(&slot, false);
                match cmd_rx.recv_timeout(REOPEN_INTERVAL) {
                    Ok(CameraCommand::SwitchFacing(f)) => {
                        facing = f;
                        continue;
                    }
                    Ok(CameraCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => return,
                    Err(RecvTimeoutError::Timeout) => continue,
                }
            }
        };

        // Streaming loop: poll commands between frames.
        loop {
            match cmd_rx.try_recv() {
                Ok(CameraCommand::SwitchFacing(f)) => {
                    facing = f;
                    set_connected(&slot, false);
                    break; // drop the camera, reopen for the new facing
                }
                Ok(CameraCommand::Shutdown) | Err(TryRecvError::Disconnected) => return,
                Err(TryRecvError::Empty) => {}
            }

            match camera.frame() {
                Ok(buffer) => match buffer.decode_image::<RgbFormat>() {
                    Ok(rgb) => {
                        publish_frame(&slot, image::DynamicImage::ImageRgb8(rgb).into_rgba8());
                    }
                    Err(e) => {
                        crate::log_warn!("frame decode failed: {}", e);
                    }
                },
                Err(e) => {
                    // Stream died (device unplugged, etc.) — reopen.
                    crate::log_warn!("frame grab failed: {}", e);
                    set_connected(&slot, false);
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facing_toggles_between_two_values() {
        assert_eq!(FacingMode::Front.toggled(), FacingMode::Back);
        assert_eq!(FacingMode::Back.toggled(), FacingMode::Front);
        assert_eq!(FacingMode::Front.toggled().toggled(), FacingMode::Front);
    }

    #[test]
    fn facing_maps_to_positional_device_index() {
        assert_eq!(device_index_for(FacingMode::Front, 1), 0);
        assert_eq!(device_index_for(FacingMode::Front, 2), 0);
        // Single device: "back" falls back to the same camera.
        assert_eq!(device_index_for(FacingMode::Back, 1), 0);
        assert_eq!(device_index_for(FacingMode::Back, 2), 1);
    }
}
