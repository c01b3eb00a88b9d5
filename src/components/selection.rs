use std::collections::VecDeque;

use image::Rgba;

use crate::canvas::{PixelBuffer, PixelRect};
use crate::error::SelectionRejected;

// ============================================================================
// TOLERANCE
// ============================================================================

/// Flood-fill color-similarity threshold, a Euclidean RGBA distance in
/// `0..=128`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Tolerance(u8);

impl Tolerance {
    pub const MAX: u8 = 128;

    /// Values above [`Tolerance::MAX`] are clamped.
    pub fn new(value: u32) -> Self {
        Self(value.min(Self::MAX as u32) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self(32)
    }
}

// ============================================================================
// WAND SETTINGS
// ============================================================================

/// Knobs for the magic wand and the rectangle tool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WandSettings {
    pub tolerance: Tolerance,
    /// Seeds below this alpha are rejected outright.
    pub seed_min_alpha: u8,
    /// Neighbors below this alpha never join the region.
    pub neighbor_min_alpha: u8,
    /// Abort once this many entries are pending in the BFS queue.
    pub max_frontier: usize,
    /// Minimum bounding box side of a flood-fill region.
    pub min_region_size: u32,
    /// Minimum side of a dragged rectangle.
    pub min_rect_size: u32,
}

impl Default for WandSettings {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::default(),
            seed_min_alpha: 10,
            neighbor_min_alpha: 30,
            max_frontier: 100_000,
            min_region_size: 5,
            min_rect_size: 10,
        }
    }
}

// ============================================================================
// REGIONS
// ============================================================================

/// Exact pixel set produced by the magic wand. Pixels are kept in row-major
/// order so two equal sets always compare equal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelRegion {
    pixels: Vec<(u32, u32)>,
    bounds: PixelRect,
}

impl PixelRegion {
    /// Returns `None` for an empty set.
    pub fn new(mut pixels: Vec<(u32, u32)>) -> Option<Self> {
        pixels.sort_unstable_by_key(|&(x, y)| (y, x));
        pixels.dedup();
        let bounds = PixelRect::bounding(&pixels)?;
        Some(Self { pixels, bounds })
    }

    pub fn pixels(&self) -> &[(u32, u32)] {
        &self.pixels
    }

    pub fn bounds(&self) -> PixelRect {
        self.bounds
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        self.bounds.contains(x, y) && self.pixels.binary_search_by_key(&(y, x), |&(px, py)| (py, px)).is_ok()
    }
}

/// One additive piece of a [`Selection`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Region {
    Pixels(PixelRegion),
    Rect(PixelRect),
}

impl Region {
    pub fn bounds(&self) -> PixelRect {
        match self {
            Region::Pixels(p) => p.bounds(),
            Region::Rect(r) => *r,
        }
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        match self {
            Region::Pixels(p) => p.contains(x, y),
            Region::Rect(r) => r.contains(x, y),
        }
    }
}

// ============================================================================
// SELECTION
// ============================================================================

/// Union of regions. Regions are only ever appended; there is no subtract or
/// intersect.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    regions: Vec<Region>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `region` to the selection, or replace the selection with it when
    /// `additive` is false.
    pub fn apply(&mut self, region: Region, additive: bool) {
        if !additive {
            self.regions.clear();
        }
        self.regions.push(region);
    }

    pub fn clear(&mut self) {
        self.regions.clear();
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        self.regions.iter().any(|r| r.contains(x, y))
    }

    pub fn bounds(&self) -> Option<PixelRect> {
        self.regions
            .iter()
            .map(Region::bounds)
            .reduce(|a, b| a.union(&b))
    }
}

// ============================================================================
// MAGIC WAND – 4-connected BFS from a seed
// ============================================================================

/// Squared Euclidean distance over all four channels.
#[inline]
fn color_distance_sq(a: &Rgba<u8>, b: &Rgba<u8>) -> u32 {
    a.0.iter()
        .zip(b.0.iter())
        .map(|(&p, &q)| {
            let d = p as i32 - q as i32;
            (d * d) as u32
        })
        .sum()
}

/// Raw result of the wand's BFS, before the size check.
#[derive(Debug)]
pub struct FloodFillResult {
    pub pixels: Vec<(u32, u32)>,
    /// True when the frontier cap stopped the search early.
    pub truncated: bool,
    /// Number of distinct pixels tested against the predicate.
    pub tested: usize,
}

/// Breadth-first region growing from `seed`.
///
/// A neighbor joins when its alpha is at least `neighbor_min_alpha` and its
/// RGBA distance to the seed color is within the tolerance. Each pixel is
/// marked visited the first time it is tested, so nothing is tested,
/// matched or enqueued twice. The seed always joins.
///
/// The caller has already validated the seed.
pub fn flood_fill(buffer: &PixelBuffer, seed: (u32, u32), settings: &WandSettings) -> FloodFillResult {
    let (width, height) = buffer.dimensions();
    let w = width as usize;
    let Some(target) = buffer.get_pixel(seed.0, seed.1) else {
        return FloodFillResult { pixels: Vec::new(), truncated: false, tested: 0 };
    };
    let tol = settings.tolerance.value() as u32;
    let tol_sq = tol * tol;
    let raw = buffer.as_raw();

    let mut visited = vec![false; w * height as usize];
    let mut queue = VecDeque::new();
    let mut result = Vec::new();
    let mut tested = 1usize;
    let mut truncated = false;

    visited[seed.1 as usize * w + seed.0 as usize] = true;
    queue.push_back(seed);
    result.push(seed);

    'search: while let Some((x, y)) = queue.pop_front() {
        let neighbors = [
            (x.wrapping_sub(1), y),
            (x + 1, y),
            (x, y.wrapping_sub(1)),
            (x, y + 1),
        ];

        for (nx, ny) in neighbors {
            if nx >= width || ny >= height {
                continue;
            }
            let vi = ny as usize * w + nx as usize;
            if visited[vi] {
                continue;
            }
            visited[vi] = true;
            tested += 1;

            let off = vi * 4;
            let px = Rgba([raw[off], raw[off + 1], raw[off + 2], raw[off + 3]]);
            if px.0[3] < settings.neighbor_min_alpha || color_distance_sq(&target, &px) > tol_sq {
                continue;
            }

            result.push((nx, ny));
            queue.push_back((nx, ny));
            if queue.len() > settings.max_frontier {
                truncated = true;
                break 'search;
            }
        }
    }

    if truncated {
        log::warn!(
            "Magic wand frontier exceeded {} entries, keeping {} matched pixels",
            settings.max_frontier,
            result.len()
        );
    }

    FloodFillResult { pixels: result, truncated, tested }
}

/// Magic wand selection at `seed`. Produces a pixel-exact region or the
/// reason it was rejected.
pub fn magic_wand(
    buffer: &PixelBuffer,
    seed: (u32, u32),
    settings: &WandSettings,
) -> Result<Region, SelectionRejected> {
    let (width, height) = buffer.dimensions();
    let Some(seed_color) = buffer.get_pixel(seed.0, seed.1) else {
        return Err(SelectionRejected::SeedOutOfBounds { x: seed.0, y: seed.1, width, height });
    };
    if seed_color.0[3] < settings.seed_min_alpha {
        return Err(SelectionRejected::TransparentSeed {
            alpha: seed_color.0[3],
            min: settings.seed_min_alpha,
        });
    }

    let fill = flood_fill(buffer, seed, settings);
    let Some(region) = PixelRegion::new(fill.pixels) else {
        // Unreachable for a valid seed: the seed always joins.
        return Err(SelectionRejected::RegionTooSmall { width: 0, height: 0, min: settings.min_region_size });
    };

    let b = region.bounds();
    if b.width < settings.min_region_size || b.height < settings.min_region_size {
        return Err(SelectionRejected::RegionTooSmall {
            width: b.width,
            height: b.height,
            min: settings.min_region_size,
        });
    }
    Ok(Region::Pixels(region))
}

// ============================================================================
// RECTANGLE
// ============================================================================

/// Rectangle from a drag between `start` and `end`, in either direction.
/// The rectangle is clipped to the buffer before the size check.
pub fn rectangle(
    start: (i32, i32),
    end: (i32, i32),
    buffer_size: (u32, u32),
    min_size: u32,
) -> Result<Region, SelectionRejected> {
    let x0 = start.0.min(end.0).max(0) as i64;
    let y0 = start.1.min(end.1).max(0) as i64;
    let x1 = (start.0.max(end.0) as i64).min(buffer_size.0 as i64);
    let y1 = (start.1.max(end.1) as i64).min(buffer_size.1 as i64);
    let width = (x1 - x0).max(0) as u32;
    let height = (y1 - y0).max(0) as u32;

    if width < min_size || height < min_size {
        return Err(SelectionRejected::RectangleTooSmall { width, height, min: min_size });
    }
    Ok(Region::Rect(PixelRect::new(x0 as u32, y0 as u32, width, height)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    fn blob_buffer() -> PixelBuffer {
        // 200×100 blue texture with a 20×20 red blob at (40..60, 40..60).
        let mut buf = PixelBuffer::new_filled(200, 100, BLUE);
        for y in 40..60 {
            for x in 40..60 {
                buf.put_pixel(x, y, RED);
            }
        }
        buf
    }

    fn settings(tolerance: u32) -> WandSettings {
        WandSettings { tolerance: Tolerance::new(tolerance), ..WandSettings::default() }
    }

    #[test]
    fn tolerance_clamps() {
        assert_eq!(Tolerance::new(500).value(), 128);
        assert_eq!(Tolerance::new(12).value(), 12);
    }

    #[test]
    fn wand_selects_exact_blob() {
        let buf = blob_buffer();
        let region = magic_wand(&buf, (50, 50), &settings(32)).unwrap();
        let Region::Pixels(p) = region else { panic!("expected pixel region") };
        assert_eq!(p.len(), 400);
        assert_eq!(p.bounds(), PixelRect::new(40, 40, 20, 20));
        assert!(p.contains(40, 40));
        assert!(!p.contains(39, 40));
    }

    #[test]
    fn wand_includes_near_colors_within_distance() {
        let mut buf = blob_buffer();
        // Distance sqrt(20² + 20²) ≈ 28.3 joins; sqrt(30² + 30²) ≈ 42.4 does not.
        buf.put_pixel(60, 45, Rgba([235, 20, 0, 255]));
        buf.put_pixel(61, 45, Rgba([255, 0, 0, 255]));
        buf.put_pixel(40, 60, Rgba([225, 30, 0, 255]));
        let Region::Pixels(p) = magic_wand(&buf, (50, 50), &settings(32)).unwrap() else {
            panic!("expected pixel region")
        };
        assert!(p.contains(60, 45));
        assert!(p.contains(61, 45));
        assert!(!p.contains(40, 60));
        assert_eq!(p.len(), 402);
    }

    #[test]
    fn wand_is_independent_of_seed_inside_the_region() {
        let buf = blob_buffer();
        let a = magic_wand(&buf, (50, 50), &settings(32)).unwrap();
        let b = magic_wand(&buf, (41, 58), &settings(32)).unwrap();
        let c = magic_wand(&buf, (50, 50), &settings(32)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn each_pixel_tested_once() {
        // A fully uniform buffer: every pixel matches, so every pixel is
        // tested exactly once and matched exactly once.
        let buf = PixelBuffer::new_filled(37, 23, RED);
        let fill = flood_fill(&buf, (5, 5), &settings(0));
        assert_eq!(fill.tested, 37 * 23);
        assert_eq!(fill.pixels.len(), 37 * 23);
        let mut sorted = fill.pixels.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), fill.pixels.len());
    }

    #[test]
    fn transparent_seed_rejected() {
        let mut buf = blob_buffer();
        buf.put_pixel(0, 0, Rgba([255, 0, 0, 9]));
        assert_eq!(
            magic_wand(&buf, (0, 0), &settings(32)),
            Err(SelectionRejected::TransparentSeed { alpha: 9, min: 10 })
        );
    }

    #[test]
    fn neighbors_below_alpha_threshold_never_join() {
        // Seed alpha 20 passes the seed gate; identical neighbors at alpha 20
        // fail the neighbor gate, so only the seed joins and the region is
        // too small.
        let buf = PixelBuffer::new_filled(20, 20, Rgba([10, 10, 10, 20]));
        assert_eq!(
            magic_wand(&buf, (5, 5), &settings(128)),
            Err(SelectionRejected::RegionTooSmall { width: 1, height: 1, min: 5 })
        );
    }

    #[test]
    fn thin_region_rejected() {
        let mut buf = PixelBuffer::new_filled(30, 30, BLUE);
        for x in 0..30 {
            for y in 10..14 {
                buf.put_pixel(x, y, RED);
            }
        }
        assert_eq!(
            magic_wand(&buf, (3, 11), &settings(0)),
            Err(SelectionRejected::RegionTooSmall { width: 30, height: 4, min: 5 })
        );
    }

    #[test]
    fn frontier_cap_keeps_partial_result() {
        let buf = PixelBuffer::new_filled(64, 64, RED);
        let mut s = settings(0);
        s.max_frontier = 8;
        let fill = flood_fill(&buf, (32, 32), &s);
        assert!(fill.truncated);
        assert!(fill.pixels.len() < 64 * 64);
        assert!(fill.pixels.contains(&(32, 32)));
    }

    #[test]
    fn seed_out_of_bounds_rejected() {
        let buf = blob_buffer();
        assert!(matches!(
            magic_wand(&buf, (200, 0), &settings(32)),
            Err(SelectionRejected::SeedOutOfBounds { .. })
        ));
    }

    #[test]
    fn rectangle_normalizes_and_clips() {
        let r = rectangle((30, 40), (10, 5), (100, 100), 10).unwrap();
        assert_eq!(r, Region::Rect(PixelRect::new(10, 5, 20, 35)));

        let clipped = rectangle((-20, -20), (15, 15), (100, 100), 10).unwrap();
        assert_eq!(clipped, Region::Rect(PixelRect::new(0, 0, 15, 15)));

        assert_eq!(
            rectangle((0, 0), (9, 40), (100, 100), 10),
            Err(SelectionRejected::RectangleTooSmall { width: 9, height: 40, min: 10 })
        );
    }

    #[test]
    fn selection_is_additive_or_replacing() {
        let mut sel = Selection::new();
        sel.apply(Region::Rect(PixelRect::new(0, 0, 10, 10)), false);
        sel.apply(Region::Rect(PixelRect::new(20, 20, 10, 10)), true);
        assert_eq!(sel.len(), 2);
        assert!(sel.contains(25, 25));
        assert_eq!(sel.bounds(), Some(PixelRect::new(0, 0, 30, 30)));

        sel.apply(Region::Rect(PixelRect::new(50, 50, 10, 10)), false);
        assert_eq!(sel.len(), 1);
        assert!(!sel.contains(5, 5));
    }
}
