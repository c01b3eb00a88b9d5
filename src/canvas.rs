use image::{Rgba, RgbaImage};

// ============================================================================
// PIXEL RECT
// ============================================================================

/// Axis-aligned pixel rectangle. `x`/`y` is the top-left corner; the
/// rectangle covers `x..x + width` × `y..y + height`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Inclusive min / exclusive max bounds of a set of points.
    pub fn bounding(points: &[(u32, u32)]) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.0, first.1, first.0, first.1);
        for &(x, y) in &points[1..] {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        Some(Self::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
    }

    #[inline]
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    #[inline]
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// Clip to a `width`×`height` buffer. Returns an empty rect when nothing
    /// overlaps.
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        let x0 = self.x.min(width);
        let y0 = self.y.min(height);
        let x1 = self.right().min(width);
        let y1 = self.bottom().min(height);
        Self::new(x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
    }

    pub fn union(&self, other: &Self) -> Self {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = self.right().max(other.right());
        let y1 = self.bottom().max(other.bottom());
        Self::new(x0, y0, x1 - x0, y1 - y0)
    }
}

// ============================================================================
// PIXEL BUFFER – flat row-major RGBA storage
// ============================================================================

/// The editable texture: `width × height` RGBA pixels, row-major,
/// `width * height * 4` bytes long.
///
/// Backed by an [`RgbaImage`], which already guarantees the length
/// invariant for every value that can be constructed.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    image: RgbaImage,
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish_non_exhaustive()
    }
}

impl PixelBuffer {
    /// Fully transparent buffer.
    pub fn new(width: u32, height: u32) -> Self {
        Self { image: RgbaImage::new(width, height) }
    }

    pub fn new_filled(width: u32, height: u32, color: Rgba<u8>) -> Self {
        Self { image: RgbaImage::from_pixel(width, height, color) }
    }

    /// Wrap raw RGBA bytes. Returns `None` when `data.len()` does not match
    /// `width * height * 4`.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        RgbaImage::from_raw(width, height, data).map(|image| Self { image })
    }

    pub fn from_rgba_image(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    pub fn bounds(&self) -> PixelRect {
        PixelRect::new(0, 0, self.width(), self.height())
    }

    #[inline]
    pub fn in_bounds(&self, x: u32, y: u32) -> bool {
        x < self.width() && y < self.height()
    }

    #[inline]
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        self.image.get_pixel_checked(x, y).copied()
    }

    #[inline]
    pub fn put_pixel(&mut self, x: u32, y: u32, pixel: Rgba<u8>) {
        if let Some(p) = self.image.get_pixel_mut_checked(x, y) {
            *p = pixel;
        }
    }

    #[inline]
    pub fn pixel_mut(&mut self, x: u32, y: u32) -> Option<&mut Rgba<u8>> {
        self.image.get_pixel_mut_checked(x, y)
    }

    pub fn fill(&mut self, color: Rgba<u8>) {
        for p in self.image.pixels_mut() {
            *p = color;
        }
    }

    /// Copy `src_rect` of `src` into this buffer with its top-left corner at
    /// `(dst_x, dst_y)`. Both sides are clipped; pixels that fall outside
    /// either buffer are skipped.
    pub fn blit(&mut self, src: &PixelBuffer, src_rect: PixelRect, dst_x: i32, dst_y: i32) {
        let src_rect = src_rect.clamp_to(src.width(), src.height());
        if src_rect.is_empty() {
            return;
        }
        let dst_w = self.width() as i64;
        let dst_h = self.height() as i64;

        // Destination span on x, shared by every row.
        let gx0 = (dst_x as i64).max(0);
        let gx1 = (dst_x as i64 + src_rect.width as i64).min(dst_w);
        if gx0 >= gx1 {
            return;
        }
        let run = (gx1 - gx0) as usize * 4;
        let sx = (src_rect.x as i64 + (gx0 - dst_x as i64)) as usize;

        let src_stride = src.width() as usize * 4;
        let dst_stride = self.width() as usize * 4;
        let src_raw = src.image.as_raw();
        let dst_raw: &mut [u8] = &mut self.image;

        for row in 0..src_rect.height as i64 {
            let gy = dst_y as i64 + row;
            if gy < 0 || gy >= dst_h {
                continue;
            }
            let sy = src_rect.y as usize + row as usize;
            let s_off = sy * src_stride + sx * 4;
            let d_off = gy as usize * dst_stride + gx0 as usize * 4;
            dst_raw[d_off..d_off + run].copy_from_slice(&src_raw[s_off..s_off + run]);
        }
    }
}

// ============================================================================
// PIXEL SURFACE – owner of the live buffer
// ============================================================================

/// Owns the live texture. All mutation happens synchronously on the thread
/// that owns the surface.
#[derive(Clone, Debug)]
pub struct PixelSurface {
    buffer: PixelBuffer,
}

impl Default for PixelSurface {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl PixelSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self { buffer: PixelBuffer::new(width, height) }
    }

    pub fn from_buffer(buffer: PixelBuffer) -> Self {
        Self { buffer }
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    /// Borrow the live buffer.
    pub fn read(&self) -> &PixelBuffer {
        &self.buffer
    }

    /// Mutable access for edit operations.
    pub fn buffer_mut(&mut self) -> &mut PixelBuffer {
        &mut self.buffer
    }

    /// Replace the whole buffer. Dimensions follow the new buffer.
    pub fn write(&mut self, buffer: PixelBuffer) {
        self.buffer = buffer;
    }

    /// Load a new source image. Callers must reset history and selection;
    /// [`crate::project::Project::load_image`] does both.
    pub fn load(&mut self, buffer: PixelBuffer) {
        log::info!("Surface loaded {}×{} texture", buffer.width(), buffer.height());
        self.buffer = buffer;
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        self.buffer.get_pixel(x, y)
    }

    pub fn blit(&mut self, src: &PixelBuffer, src_rect: PixelRect, dst: (i32, i32)) {
        self.buffer.blit(src, src_rect, dst.0, dst.1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(w: u32, h: u32) -> PixelBuffer {
        let mut buf = PixelBuffer::new(w, h);
        for y in 0..h {
            for x in 0..w {
                buf.put_pixel(x, y, Rgba([x as u8, y as u8, (x + y) as u8, 255]));
            }
        }
        buf
    }

    #[test]
    fn from_raw_enforces_length() {
        assert!(PixelBuffer::from_raw(2, 2, vec![0; 16]).is_some());
        assert!(PixelBuffer::from_raw(2, 2, vec![0; 15]).is_none());
    }

    #[test]
    fn get_pixel_out_of_bounds_is_none() {
        let buf = PixelBuffer::new(3, 3);
        assert_eq!(buf.get_pixel(3, 0), None);
        assert_eq!(buf.get_pixel(0, 0), Some(Rgba([0, 0, 0, 0])));
    }

    #[test]
    fn blit_copies_sub_rect() {
        let src = gradient(8, 8);
        let mut dst = PixelBuffer::new(8, 8);
        dst.blit(&src, PixelRect::new(2, 3, 3, 2), 0, 0);
        assert_eq!(dst.get_pixel(0, 0), src.get_pixel(2, 3));
        assert_eq!(dst.get_pixel(2, 1), src.get_pixel(4, 4));
        assert_eq!(dst.get_pixel(3, 0), Some(Rgba([0, 0, 0, 0])));
    }

    #[test]
    fn blit_clips_negative_and_overflowing_destination() {
        let src = gradient(4, 4);
        let mut dst = PixelBuffer::new(4, 4);
        dst.blit(&src, src.bounds(), -2, 3);
        // Only src columns 2..4, row 0 land inside.
        assert_eq!(dst.get_pixel(0, 3), src.get_pixel(2, 0));
        assert_eq!(dst.get_pixel(1, 3), src.get_pixel(3, 0));
        assert_eq!(dst.get_pixel(2, 3), Some(Rgba([0, 0, 0, 0])));
        assert_eq!(dst.get_pixel(0, 2), Some(Rgba([0, 0, 0, 0])));
    }

    #[test]
    fn rect_helpers() {
        let r = PixelRect::bounding(&[(3, 4), (7, 2), (5, 9)]).unwrap();
        assert_eq!(r, PixelRect::new(3, 2, 5, 8));
        assert_eq!(PixelRect::new(8, 8, 10, 10).clamp_to(10, 10), PixelRect::new(8, 8, 2, 2));
        assert!(PixelRect::new(12, 0, 3, 3).clamp_to(10, 10).is_empty());
        assert_eq!(
            PixelRect::new(0, 0, 2, 2).union(&PixelRect::new(5, 5, 1, 1)),
            PixelRect::new(0, 0, 6, 6)
        );
    }
}
