//! Overlay state — the captured/uploaded still image floating above the
//! live feed, with its display size, opacity, position, and the drag
//! interaction that repositions it.

use egui::{ColorImage, Pos2, Rect, TextureHandle, TextureOptions, Vec2};
use image::RgbaImage;

/// Smallest rendered overlay edge, in pixels.
pub const SIZE_MIN: u32 = 40;
/// Largest rendered overlay edge, in pixels.
pub const SIZE_MAX: u32 = 1000;
/// Fixed delta applied by the +/- stepper buttons.
pub const SIZE_STEP: u32 = 40;
/// Opacity is an integer percentage.
pub const OPACITY_MAX: u8 = 100;

const DEFAULT_SIZE: u32 = 200;

/// Ephemeral per-gesture state: the pointer-to-position offset captured at
/// drag start.  Exists only while a drag is active.
struct DragSession {
    offset: Vec2,
}

/// The floating overlay image and every per-instance knob that drives how
/// it renders: bounding size (width and height share one value), opacity
/// percentage, and absolute top-left position.
pub struct OverlayState {
    /// Current still image, replaced wholesale by each capture or upload.
    image: Option<RgbaImage>,
    /// Rendered width and height bound, `SIZE_MIN..=SIZE_MAX`.
    size: u32,
    /// Opacity percentage, `0..=100`.
    opacity: u8,
    /// Top-left of the rendered overlay in screen points.
    position: Pos2,
    /// Active drag gesture, if any.
    drag: Option<DragSession>,

    // --- GPU texture cache ---
    /// Cached GPU texture of the overlay image.  Re-uploaded only when the
    /// image changes.
    texture: Option<TextureHandle>,
    texture_dirty: bool,
}

impl Default for OverlayState {
    fn default() -> Self {
        Self::new()
    }
}

impl OverlayState {
    pub fn new() -> Self {
        Self {
            image: None,
            size: DEFAULT_SIZE,
            opacity: OPACITY_MAX,
            position: Pos2::ZERO,
            drag: None,
            texture: None,
            texture_dirty: false,
        }
    }

    // -----------------------------------------------------------------------
    //  Image
    // -----------------------------------------------------------------------

    pub fn image(&self) -> Option<&RgbaImage> {
        self.image.as_ref()
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }

    /// Replace the overlay image wholesale (capture or upload).
    pub fn set_image(&mut self, img: RgbaImage) {
        self.image = Some(img);
        self.texture_dirty = true;
    }

    // -----------------------------------------------------------------------
    //  Size / opacity / position
    // -----------------------------------------------------------------------

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Set the display size, clamped to `[SIZE_MIN, SIZE_MAX]`.
    pub fn set_size(&mut self, size: u32) {
        self.size = size.clamp(SIZE_MIN, SIZE_MAX);
    }

    /// Apply a signed step to the display size.  A step that would leave
    /// the valid range is a no-op, not a clamp.  Returns whether the step
    /// was applied.
    pub fn step_size(&mut self, delta: i32) -> bool {
        let stepped = self.size as i64 + delta as i64;
        if stepped < SIZE_MIN as i64 || stepped > SIZE_MAX as i64 {
            return false;
        }
        self.size = stepped as u32;
        true
    }

    pub fn opacity(&self) -> u8 {
        self.opacity
    }

    pub fn set_opacity(&mut self, opacity: u8) {
        self.opacity = opacity.min(OPACITY_MAX);
    }

    /// Rendered alpha: exactly `opacity / 100`.
    pub fn alpha(&self) -> f32 {
        self.opacity as f32 / OPACITY_MAX as f32
    }

    pub fn position(&self) -> Pos2 {
        self.position
    }

    pub fn set_position(&mut self, position: Pos2) {
        self.position = position;
    }

    /// Screen rect the overlay currently occupies.
    pub fn rect(&self) -> Rect {
        Rect::from_min_size(self.position, Vec2::splat(self.size as f32))
    }

    // -----------------------------------------------------------------------
    //  Drag controller (Idle <-> Dragging)
    // -----------------------------------------------------------------------

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Idle -> Dragging.  Captures the pointer-to-position offset once; it
    /// is never recomputed during the gesture.
    pub fn begin_drag(&mut self, pointer: Pos2) {
        self.drag = Some(DragSession {
            offset: pointer - self.position,
        });
    }

    /// Dragging self-transition: position tracks the pointer exactly, no
    /// smoothing or debouncing.  Ignored while idle.
    pub fn drag_to(&mut self, pointer: Pos2) {
        if let Some(session) = &self.drag {
            self.position = pointer - session.offset;
        }
    }

    /// Dragging -> Idle.  The position is left wherever the last move event
    /// put it.
    pub fn end_drag(&mut self) {
        self.drag = None;
    }

    // -----------------------------------------------------------------------
    //  Centering
    // -----------------------------------------------------------------------

    /// One-shot recompute: snap the overlay to the feed — x pinned to the
    /// viewport's left edge, y centered against the feed's rendered height,
    /// size set to the feed's rendered width.  Subsequent drags and resizes
    /// are unconstrained.
    pub fn center_against(&mut self, feed: Rect, viewport: Rect) {
        self.position = Pos2::new(
            viewport.min.x,
            viewport.min.y + (viewport.height() - feed.height()) / 2.0,
        );
        self.set_size(feed.width() as u32);
    }

    // -----------------------------------------------------------------------
    //  Texture cache
    // -----------------------------------------------------------------------

    /// Texture for the current image, uploading it if the image changed
    /// since the last call.  `None` when there is no image yet.
    pub fn texture(&mut self, ctx: &egui::Context) -> Option<&TextureHandle> {
        if self.texture_dirty
            && let Some(img) = &self.image
        {
            let color_image = ColorImage::from_rgba_unmultiplied(
                [img.width() as usize, img.height() as usize],
                img.as_raw(),
            );
            match &mut self.texture {
                Some(tex) => tex.set(color_image, TextureOptions::LINEAR),
                None => {
                    self.texture =
                        Some(ctx.load_texture("overlay_image", color_image, TextureOptions::LINEAR));
                }
            }
            self.texture_dirty = false;
        }
        self.texture.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_size_is_exact_within_bounds() {
        let mut ov = OverlayState::new();
        for size in [SIZE_MIN, 41, 200, 999, SIZE_MAX] {
            ov.set_size(size);
            assert_eq!(ov.size(), size);
        }
    }

    #[test]
    fn set_size_clamps_out_of_range() {
        let mut ov = OverlayState::new();
        ov.set_size(0);
        assert_eq!(ov.size(), SIZE_MIN);
        ov.set_size(5000);
        assert_eq!(ov.size(), SIZE_MAX);
    }

    #[test]
    fn step_beyond_max_is_a_no_op() {
        let mut ov = OverlayState::new();
        ov.set_size(SIZE_MAX - 1);
        assert!(!ov.step_size(SIZE_STEP as i32));
        assert_eq!(ov.size(), SIZE_MAX - 1);
    }

    #[test]
    fn step_below_min_is_a_no_op() {
        let mut ov = OverlayState::new();
        ov.set_size(SIZE_MIN + 1);
        assert!(!ov.step_size(-(SIZE_STEP as i32)));
        assert_eq!(ov.size(), SIZE_MIN + 1);
    }

    #[test]
    fn step_within_bounds_applies() {
        let mut ov = OverlayState::new();
        ov.set_size(200);
        assert!(ov.step_size(SIZE_STEP as i32));
        assert_eq!(ov.size(), 200 + SIZE_STEP);
        assert!(ov.step_size(-(SIZE_STEP as i32)));
        assert_eq!(ov.size(), 200);
    }

    #[test]
    fn alpha_is_exactly_opacity_over_100() {
        let mut ov = OverlayState::new();
        for pct in [0u8, 25, 50, 100] {
            ov.set_opacity(pct);
            assert_eq!(ov.alpha(), pct as f32 / 100.0);
        }
        ov.set_opacity(250);
        assert_eq!(ov.opacity(), 100);
    }

    #[test]
    fn drag_moves_by_exact_pointer_delta() {
        let mut ov = OverlayState::new();
        ov.set_position(Pos2::new(30.0, 70.0));
        ov.begin_drag(Pos2::new(100.0, 100.0));
        // Intermediate moves; only the latest pointer position matters.
        ov.drag_to(Pos2::new(110.0, 90.0));
        ov.drag_to(Pos2::new(160.0, 25.0));
        ov.end_drag();
        assert_eq!(ov.position(), Pos2::new(30.0 + 60.0, 70.0 - 75.0));
    }

    #[test]
    fn restarted_drag_does_not_jump() {
        let mut ov = OverlayState::new();
        ov.set_position(Pos2::new(10.0, 10.0));
        ov.begin_drag(Pos2::new(50.0, 50.0));
        ov.drag_to(Pos2::new(60.0, 60.0));
        ov.end_drag();
        let settled = ov.position();

        // New drag from a completely different pointer location: the first
        // move at the start point must be a zero delta.
        ov.begin_drag(Pos2::new(300.0, 5.0));
        ov.drag_to(Pos2::new(300.0, 5.0));
        assert_eq!(ov.position(), settled);
    }

    #[test]
    fn moves_while_idle_are_ignored() {
        let mut ov = OverlayState::new();
        ov.set_position(Pos2::new(1.0, 2.0));
        ov.drag_to(Pos2::new(500.0, 500.0));
        assert_eq!(ov.position(), Pos2::new(1.0, 2.0));
    }

    #[test]
    fn center_against_feed() {
        let mut ov = OverlayState::new();
        ov.set_position(Pos2::new(333.0, 444.0));
        let viewport = Rect::from_min_size(Pos2::ZERO, Vec2::new(500.0, 1000.0));
        let feed = Rect::from_min_size(Pos2::new(0.0, 100.0), Vec2::new(500.0, 800.0));
        ov.center_against(feed, viewport);
        assert_eq!(ov.position(), Pos2::new(0.0, 100.0));
        assert_eq!(ov.size(), 500);
    }

    #[test]
    fn set_image_replaces_wholesale() {
        let mut ov = OverlayState::new();
        assert!(!ov.has_image());
        ov.set_image(RgbaImage::new(4, 4));
        assert_eq!(ov.image().unwrap().width(), 4);
        ov.set_image(RgbaImage::new(8, 2));
        assert_eq!(ov.image().unwrap().width(), 8);
    }
}
