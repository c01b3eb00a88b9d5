// ============================================================================
// Edit operations: freehand strokes and flat fill inside the selection
// ============================================================================

use image::Rgba;

use crate::canvas::{PixelBuffer, PixelRect};
use crate::components::selection::{Region, Selection};

// -- Stroke style -----------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum StrokeMode {
    #[default]
    Paint,
    /// Overwrites with the opaque background color. Never clears alpha.
    Erase,
}

impl StrokeMode {
    pub fn label(&self) -> &'static str {
        match self {
            StrokeMode::Paint => "Brush Stroke",
            StrokeMode::Erase => "Eraser Stroke",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrokeStyle {
    /// Stroke diameter in pixels.
    pub width: f32,
    pub color: Rgba<u8>,
    pub mode: StrokeMode,
}

impl StrokeStyle {
    pub fn paint(width: f32, color: Rgba<u8>) -> Self {
        Self { width, color, mode: StrokeMode::Paint }
    }

    pub fn erase(width: f32) -> Self {
        Self { width, color: Rgba([255, 255, 255, 255]), mode: StrokeMode::Erase }
    }
}

// -- Stroke tracker ---------------------------------------------------------

/// Tracks one in-progress stroke between pointer-down and pointer-up.
#[derive(Clone, Debug)]
pub struct StrokeTracker {
    /// Whether a stroke is currently in progress
    is_active: bool,
    style: Option<StrokeStyle>,
    /// Resolved color actually written (background color when erasing).
    ink: Rgba<u8>,
    last_point: Option<(f32, f32)>,
    /// Accumulated bounding rect of all modifications in this stroke
    bounds: Option<PixelRect>,
    /// Buffer as it was at pointer-down, for cancel.
    before: Option<PixelBuffer>,
}

impl Default for StrokeTracker {
    fn default() -> Self {
        Self {
            is_active: false,
            style: None,
            ink: Rgba([0, 0, 0, 0]),
            last_point: None,
            bounds: None,
            before: None,
        }
    }
}

impl StrokeTracker {
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn style(&self) -> Option<StrokeStyle> {
        self.style
    }

    /// Bounds touched so far by the stroke in progress.
    pub fn bounds(&self) -> Option<PixelRect> {
        self.bounds
    }

    /// Start a stroke and stamp the first sample.
    pub fn begin(
        &mut self,
        buffer: &mut PixelBuffer,
        point: (f32, f32),
        style: StrokeStyle,
        background: Rgba<u8>,
    ) {
        self.is_active = true;
        self.style = Some(style);
        self.ink = match style.mode {
            StrokeMode::Paint => style.color,
            StrokeMode::Erase => Rgba([background[0], background[1], background[2], 255]),
        };
        self.bounds = None;
        self.before = Some(buffer.clone());
        self.last_point = Some(point);
        self.stamp_segment(buffer, point, point);
    }

    /// Draw the segment from the previous sample to `point`.
    pub fn extend(&mut self, buffer: &mut PixelBuffer, point: (f32, f32)) {
        if !self.is_active {
            return;
        }
        let from = self.last_point.unwrap_or(point);
        self.stamp_segment(buffer, from, point);
        self.last_point = Some(point);
    }

    /// End the stroke. Returns the description and touched bounds when any
    /// pixel was drawn.
    pub fn finish(&mut self) -> Option<(String, PixelRect)> {
        if !self.is_active {
            return None;
        }
        let result = match (self.style, self.bounds) {
            (Some(style), Some(bounds)) => Some((style.mode.label().to_string(), bounds)),
            _ => None,
        };
        self.reset();
        result
    }

    /// Abort the stroke and put the pre-stroke pixels back.
    pub fn cancel(&mut self, buffer: &mut PixelBuffer) {
        if let Some(before) = self.before.take() {
            *buffer = before;
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.is_active = false;
        self.style = None;
        self.last_point = None;
        self.bounds = None;
        self.before = None;
    }

    fn stamp_segment(&mut self, buffer: &mut PixelBuffer, a: (f32, f32), b: (f32, f32)) {
        let Some(style) = self.style else { return };
        if let Some(rect) = draw_capsule(buffer, a, b, style.width * 0.5, self.ink) {
            self.bounds = Some(match self.bounds {
                Some(existing) => existing.union(&rect),
                None => rect,
            });
        }
    }
}

/// Source-over composite of `top` onto `base`, straight alpha.
fn blend_over(base: Rgba<u8>, top: Rgba<u8>) -> Rgba<u8> {
    match top[3] {
        255 => top,
        0 => base,
        ta => {
            let ta = ta as f32 / 255.0;
            let ba = base[3] as f32 / 255.0;
            let out_a = ta + ba * (1.0 - ta);
            let mix = |t: u8, b: u8| -> u8 {
                ((t as f32 * ta + b as f32 * ba * (1.0 - ta)) / out_a).round() as u8
            };
            Rgba([
                mix(top[0], base[0]),
                mix(top[1], base[1]),
                mix(top[2], base[2]),
                (out_a * 255.0).round() as u8,
            ])
        }
    }
}

/// Fill every pixel whose center lies within `radius` of segment `a`–`b`.
/// A capsule gives round caps, and consecutive capsules sharing an endpoint
/// give round joins. Returns the touched bounds.
pub fn draw_capsule(
    buffer: &mut PixelBuffer,
    a: (f32, f32),
    b: (f32, f32),
    radius: f32,
    color: Rgba<u8>,
) -> Option<PixelRect> {
    let (w, h) = buffer.dimensions();
    if w == 0 || h == 0 {
        return None;
    }
    let r = radius.max(0.5);
    let min_x = (a.0.min(b.0) - r).floor().max(0.0) as u32;
    let min_y = (a.1.min(b.1) - r).floor().max(0.0) as u32;
    let max_x = ((a.0.max(b.0) + r).ceil().max(0.0) as u32).min(w - 1);
    let max_y = ((a.1.max(b.1) + r).ceil().max(0.0) as u32).min(h - 1);
    if min_x > max_x || min_y > max_y {
        return None;
    }

    let dx = b.0 - a.0;
    let dy = b.1 - a.1;
    let len_sq = dx * dx + dy * dy;
    let r_sq = r * r;
    let mut touched: Option<PixelRect> = None;

    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let px = x as f32 + 0.5;
            let py = y as f32 + 0.5;
            // Closest point on the segment.
            let t = if len_sq > 0.0 {
                (((px - a.0) * dx + (py - a.1) * dy) / len_sq).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let cx = a.0 + dx * t;
            let cy = a.1 + dy * t;
            let ddx = px - cx;
            let ddy = py - cy;
            if ddx * ddx + ddy * ddy > r_sq {
                continue;
            }
            if let Some(p) = buffer.pixel_mut(x, y) {
                *p = blend_over(*p, color);
            }
            let px_rect = PixelRect::new(x, y, 1, 1);
            touched = Some(match touched {
                Some(t) => t.union(&px_rect),
                None => px_rect,
            });
        }
    }
    touched
}

// -- Fill within selection --------------------------------------------------

/// Recolor every selected pixel whose alpha is above `alpha_threshold`.
/// Only R, G and B change. Returns the number of pixels written.
///
/// Each region is evaluated on its own: pixel-set regions touch exactly
/// their pixels, rectangle regions scan the whole rectangle.
pub fn fill_selection(
    buffer: &mut PixelBuffer,
    selection: &Selection,
    color: Rgba<u8>,
    alpha_threshold: u8,
) -> usize {
    let mut written = 0;
    let mut recolor = |buffer: &mut PixelBuffer, x: u32, y: u32| {
        if let Some(p) = buffer.pixel_mut(x, y)
            && p[3] > alpha_threshold
        {
            p[0] = color[0];
            p[1] = color[1];
            p[2] = color[2];
            written += 1;
        }
    };

    for region in selection.regions() {
        match region {
            Region::Pixels(pixels) => {
                for &(x, y) in pixels.pixels() {
                    recolor(buffer, x, y);
                }
            }
            Region::Rect(rect) => {
                let rect = rect.clamp_to(buffer.width(), buffer.height());
                for y in rect.y..rect.bottom() {
                    for x in rect.x..rect.right() {
                        recolor(buffer, x, y);
                    }
                }
            }
        }
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::selection::PixelRegion;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    #[test]
    fn dot_is_round() {
        let mut buf = PixelBuffer::new_filled(21, 21, WHITE);
        draw_capsule(&mut buf, (10.5, 10.5), (10.5, 10.5), 4.0, BLACK).unwrap();
        assert_eq!(buf.get_pixel(10, 10), Some(BLACK));
        assert_eq!(buf.get_pixel(13, 10), Some(BLACK));
        // Corner of the bounding square stays untouched.
        assert_eq!(buf.get_pixel(14, 14), Some(WHITE));
    }

    #[test]
    fn segment_covers_path_and_caps() {
        let mut buf = PixelBuffer::new_filled(40, 20, WHITE);
        let bounds = draw_capsule(&mut buf, (5.5, 10.5), (30.5, 10.5), 2.0, BLACK).unwrap();
        for x in 5..=30 {
            assert_eq!(buf.get_pixel(x, 10), Some(BLACK), "x = {x}");
        }
        // Round cap extends past the endpoint.
        assert_eq!(buf.get_pixel(32, 10), Some(BLACK));
        assert_eq!(buf.get_pixel(33, 10), Some(WHITE));
        assert_eq!(bounds, PixelRect::new(3, 8, 30, 5));
    }

    #[test]
    fn translucent_paint_composites() {
        let mut buf = PixelBuffer::new_filled(3, 3, WHITE);
        draw_capsule(&mut buf, (1.5, 1.5), (1.5, 1.5), 0.5, Rgba([0, 0, 0, 128])).unwrap();
        let p = buf.get_pixel(1, 1).unwrap();
        assert_eq!(p[3], 255);
        assert!(p[0] > 120 && p[0] < 135, "got {:?}", p);
    }

    #[test]
    fn eraser_writes_opaque_background() {
        let mut buf = PixelBuffer::new_filled(10, 10, Rgba([10, 20, 30, 40]));
        let mut tracker = StrokeTracker::default();
        tracker.begin(&mut buf, (5.0, 5.0), StrokeStyle::erase(4.0), Rgba([200, 200, 200, 0]));
        tracker.extend(&mut buf, (8.0, 5.0));
        let (desc, _) = tracker.finish().unwrap();
        assert_eq!(desc, "Eraser Stroke");
        assert_eq!(buf.get_pixel(6, 5), Some(Rgba([200, 200, 200, 255])));
    }

    #[test]
    fn default_tracker_is_idle() {
        let mut buf = PixelBuffer::new_filled(4, 4, WHITE);
        let mut tracker = StrokeTracker::default();
        assert!(!tracker.is_active());
        assert_eq!(tracker.style(), None);
        assert_eq!(tracker.bounds(), None);
        tracker.extend(&mut buf, (1.0, 1.0));
        assert_eq!(buf, PixelBuffer::new_filled(4, 4, WHITE));
        assert!(tracker.finish().is_none());
    }

    #[test]
    fn accessors_follow_the_stroke() {
        let mut buf = PixelBuffer::new_filled(10, 10, WHITE);
        let mut tracker = StrokeTracker::default();
        tracker.begin(&mut buf, (2.5, 2.5), StrokeStyle::paint(2.0, BLACK), WHITE);
        assert!(tracker.is_active());
        assert_eq!(tracker.style(), Some(StrokeStyle::paint(2.0, BLACK)));
        assert!(tracker.bounds().is_some_and(|b| b.contains(2, 2)));
        tracker.finish();
        assert!(!tracker.is_active());
    }

    #[test]
    fn cancel_restores_pre_stroke_pixels() {
        let mut buf = PixelBuffer::new_filled(10, 10, WHITE);
        let before = buf.clone();
        let mut tracker = StrokeTracker::default();
        tracker.begin(&mut buf, (2.0, 2.0), StrokeStyle::paint(3.0, BLACK), WHITE);
        tracker.extend(&mut buf, (7.0, 7.0));
        assert_ne!(buf, before);
        tracker.cancel(&mut buf);
        assert_eq!(buf, before);
        assert!(tracker.finish().is_none());
    }

    #[test]
    fn fill_respects_alpha_guard_and_keeps_alpha() {
        let mut buf = PixelBuffer::new(4, 1);
        buf.put_pixel(0, 0, Rgba([1, 1, 1, 255]));
        buf.put_pixel(1, 0, Rgba([1, 1, 1, 101]));
        buf.put_pixel(2, 0, Rgba([1, 1, 1, 100]));
        buf.put_pixel(3, 0, Rgba([1, 1, 1, 255]));

        let mut sel = Selection::new();
        sel.apply(Region::Rect(PixelRect::new(0, 0, 3, 1)), false);
        let n = fill_selection(&mut buf, &sel, Rgba([0, 255, 0, 255]), 100);

        assert_eq!(n, 2);
        assert_eq!(buf.get_pixel(0, 0), Some(Rgba([0, 255, 0, 255])));
        assert_eq!(buf.get_pixel(1, 0), Some(Rgba([0, 255, 0, 101])));
        assert_eq!(buf.get_pixel(2, 0), Some(Rgba([1, 1, 1, 100])));
        // Outside the selection.
        assert_eq!(buf.get_pixel(3, 0), Some(Rgba([1, 1, 1, 255])));
    }

    #[test]
    fn fill_pixel_region_touches_only_its_pixels() {
        let mut buf = PixelBuffer::new_filled(5, 5, BLACK);
        let region = PixelRegion::new(vec![(0, 0), (2, 2), (4, 4)]).unwrap();
        let mut sel = Selection::new();
        sel.apply(Region::Pixels(region), false);
        assert_eq!(fill_selection(&mut buf, &sel, WHITE, 100), 3);
        assert_eq!(buf.get_pixel(1, 1), Some(BLACK));
        assert_eq!(buf.get_pixel(2, 2), Some(WHITE));
    }
}
