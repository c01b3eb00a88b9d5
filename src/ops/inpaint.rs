// ============================================================================
// Inpainting bridge: canonical square, mask synthesis and merge-back
// ============================================================================

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::canvas::{PixelBuffer, PixelRect};
use crate::components::selection::{Region, Selection};
use crate::error::InpaintError;

const PADDING: Rgba<u8> = Rgba([255, 255, 255, 255]);
const MASK_KEEP: Rgba<u8> = Rgba([0, 0, 0, 255]);
const MASK_REGENERATE: Rgba<u8> = Rgba([0, 0, 0, 0]);

// -- Transform --------------------------------------------------------------

/// Forward mapping from texture coordinates onto the centered canonical
/// square. Scale is `size / longest`; every mapping is done in exact integer
/// arithmetic on that ratio so spans never drift by a rounding error.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CanonicalTransform {
    /// Side of the canonical square.
    pub size: u32,
    pub scale: f64,
    pub offset_x: u32,
    pub offset_y: u32,
    pub scaled_width: u32,
    pub scaled_height: u32,
    /// Longest texture side.
    longest: u32,
}

impl CanonicalTransform {
    pub fn new(width: u32, height: u32, size: u32) -> Self {
        let size = size.max(1);
        let longest = width.max(height).max(1);
        let round_scaled = |v: u32| -> u32 {
            let v = (2 * v as u64 * size as u64 + longest as u64) / (2 * longest as u64);
            (v as u32).clamp(1, size)
        };
        let scaled_width = round_scaled(width);
        let scaled_height = round_scaled(height);
        Self {
            size,
            scale: size as f64 / longest as f64,
            offset_x: (size - scaled_width) / 2,
            offset_y: (size - scaled_height) / 2,
            scaled_width,
            scaled_height,
            longest,
        }
    }

    /// Sub-rectangle of the square holding the texture.
    pub fn content_rect(&self) -> PixelRect {
        PixelRect::new(self.offset_x, self.offset_y, self.scaled_width, self.scaled_height)
    }

    /// True when the texture is enlarged (or kept 1:1) on its way into the
    /// square. Those cases use pixel-center nearest mapping, which makes a
    /// no-op response merge back exactly.
    pub fn is_upscale(&self) -> bool {
        self.size >= self.longest
    }

    /// Side of the block one texel covers in the square, `ceil(scale)`.
    pub fn block_size(&self) -> u32 {
        self.size.div_ceil(self.longest).max(1)
    }

    /// Scaled position of texel edge `v`, rounded down.
    #[inline]
    fn scale_floor(&self, v: u32) -> u32 {
        (v as u64 * self.size as u64 / self.longest as u64) as u32
    }

    /// Scaled position of texel edge `v`, rounded up.
    #[inline]
    fn scale_ceil(&self, v: u32) -> u32 {
        (v as u64 * self.size as u64).div_ceil(self.longest as u64) as u32
    }

    /// Source texel whose area contains the center of scaled pixel `p`,
    /// along an axis of length `len`.
    #[inline]
    fn to_source(&self, p: u32, len: u32) -> u32 {
        let s = (2 * p as u64 + 1) * self.longest as u64 / (2 * self.size as u64);
        (s as u32).min(len.saturating_sub(1))
    }

    /// Scaled pixel containing the center of source texel `s`, along an
    /// axis whose scaled length is `scaled_len`.
    #[inline]
    fn to_scaled(&self, s: u32, scaled_len: u32) -> u32 {
        let p = (2 * s as u64 + 1) * self.size as u64 / (2 * self.longest as u64);
        (p as u32).min(scaled_len.saturating_sub(1))
    }

    /// Top-left corner of texel `(x, y)` in the square.
    pub fn map_point(&self, x: u32, y: u32) -> (u32, u32) {
        (self.offset_x + self.scale_floor(x), self.offset_y + self.scale_floor(y))
    }

    /// Square-space rectangle covering texture rectangle `r`.
    pub fn map_rect(&self, r: &PixelRect) -> PixelRect {
        let x0 = self.scale_floor(r.x).min(self.scaled_width);
        let y0 = self.scale_floor(r.y).min(self.scaled_height);
        let x1 = self.scale_ceil(r.right()).min(self.scaled_width);
        let y1 = self.scale_ceil(r.bottom()).min(self.scaled_height);
        PixelRect::new(
            self.offset_x + x0,
            self.offset_y + y0,
            x1.saturating_sub(x0),
            y1.saturating_sub(y0),
        )
    }
}

// -- Request ----------------------------------------------------------------

/// Everything the service needs, plus the transform used to build it.
#[derive(Clone, Debug)]
pub struct InpaintRequest {
    pub full_image: RgbaImage,
    pub mask: RgbaImage,
    pub prompt: String,
    pub style: String,
    pub transform: CanonicalTransform,
    /// Texture size at request time; a merge into a different size is refused.
    pub source_size: (u32, u32),
}

impl InpaintRequest {
    /// Render the full image and mask for `buffer` + `selection`.
    pub fn build(
        buffer: &PixelBuffer,
        selection: &Selection,
        prompt: &str,
        style: &str,
        canonical_size: u32,
    ) -> Result<Self, InpaintError> {
        if selection.is_empty() {
            return Err(InpaintError::EmptySelection);
        }
        let transform = CanonicalTransform::new(buffer.width(), buffer.height(), canonical_size);
        Ok(Self {
            full_image: render_full_image(buffer, &transform),
            mask: build_mask(selection, &transform),
            prompt: prompt.to_string(),
            style: style.to_string(),
            transform,
            source_size: buffer.dimensions(),
        })
    }
}

// -- Full image -------------------------------------------------------------

/// The texture scaled onto a white square, centered.
pub fn render_full_image(buffer: &PixelBuffer, t: &CanonicalTransform) -> RgbaImage {
    let mut square = RgbaImage::from_pixel(t.size, t.size, PADDING);
    let (w, h) = buffer.dimensions();
    if w == 0 || h == 0 {
        return square;
    }

    let scaled = if t.is_upscale() {
        let src = buffer.as_raw();
        let src_stride = w as usize * 4;
        let mut out = RgbaImage::new(t.scaled_width, t.scaled_height);
        let row_len = t.scaled_width as usize * 4;
        let columns: Vec<usize> = (0..t.scaled_width).map(|x| t.to_source(x, w) as usize * 4).collect();
        let out_raw: &mut [u8] = &mut out;
        out_raw.par_chunks_mut(row_len).enumerate().for_each(|(y, row)| {
            let sy = t.to_source(y as u32, h) as usize;
            let src_row = &src[sy * src_stride..(sy + 1) * src_stride];
            for (dst, &sx) in row.chunks_exact_mut(4).zip(columns.iter()) {
                dst.copy_from_slice(&src_row[sx..sx + 4]);
            }
        });
        out
    } else {
        imageops::resize(buffer.as_image(), t.scaled_width, t.scaled_height, FilterType::Triangle)
    };

    imageops::replace(&mut square, &scaled, t.offset_x as i64, t.offset_y as i64);
    square
}

// -- Mask -------------------------------------------------------------------

/// Opaque square with every selected texel's footprint made transparent.
///
/// Pixel-set regions stamp a `ceil(scale)`-sided block per texel so adjacent
/// texels leave no gaps when enlarged; rectangles clear their mapped span.
pub fn build_mask(selection: &Selection, t: &CanonicalTransform) -> RgbaImage {
    let size = t.size as usize;
    let block = t.block_size();

    // Collect transparent spans per row, then paint rows in parallel.
    let mut rows: Vec<Vec<(u32, u32)>> = vec![Vec::new(); size];
    let mut mark = |x0: u32, y0: u32, x1: u32, y1: u32| {
        let x1 = x1.min(t.size);
        let y1 = y1.min(t.size);
        if x0 >= x1 {
            return;
        }
        for y in y0..y1 {
            rows[y as usize].push((x0, x1));
        }
    };

    for region in selection.regions() {
        match region {
            Region::Pixels(pixels) => {
                for &(x, y) in pixels.pixels() {
                    let (mx, my) = t.map_point(x, y);
                    mark(mx, my, mx + block, my + block);
                }
            }
            Region::Rect(rect) => {
                let m = t.map_rect(rect);
                mark(m.x, m.y, m.right(), m.bottom());
            }
        }
    }

    let mut mask = RgbaImage::from_pixel(t.size, t.size, MASK_KEEP);
    let mask_raw: &mut [u8] = &mut mask;
    mask_raw
        .par_chunks_mut(size * 4)
        .zip(rows.par_iter())
        .for_each(|(row, spans)| {
            for &(x0, x1) in spans {
                for px in row[x0 as usize * 4..x1 as usize * 4].chunks_exact_mut(4) {
                    px.copy_from_slice(&MASK_REGENERATE.0);
                }
            }
        });
    mask
}

// -- Merge ------------------------------------------------------------------

/// Map the service's square back to a texture-sized fragment.
///
/// Only the content rectangle is read, so the white padding never comes
/// back. Squares of another size are resized to the canonical size first;
/// anything non-square is refused.
pub fn extract_fragment(
    response: &RgbaImage,
    t: &CanonicalTransform,
    source_size: (u32, u32),
) -> Result<PixelBuffer, InpaintError> {
    let (rw, rh) = response.dimensions();
    if rw != rh || rw == 0 {
        return Err(InpaintError::Decode(format!(
            "expected a square image, got {rw}×{rh}"
        )));
    }
    let resized;
    let square = if rw == t.size {
        response
    } else {
        log::debug!("Resizing {rw}² inpaint response to {}²", t.size);
        resized = imageops::resize(response, t.size, t.size, FilterType::Triangle);
        &resized
    };

    let (w, h) = source_size;
    let content = imageops::crop_imm(square, t.offset_x, t.offset_y, t.scaled_width, t.scaled_height).to_image();

    let fragment = if t.is_upscale() {
        let stride = t.scaled_width as usize * 4;
        let src = content.as_raw();
        let columns: Vec<usize> = (0..w).map(|x| t.to_scaled(x, t.scaled_width) as usize * 4).collect();
        let mut out = RgbaImage::new(w, h);
        let out_raw: &mut [u8] = &mut out;
        out_raw.par_chunks_mut(w as usize * 4).enumerate().for_each(|(y, row)| {
            let cy = t.to_scaled(y as u32, t.scaled_height) as usize;
            let src_row = &src[cy * stride..(cy + 1) * stride];
            for (dst, &cx) in row.chunks_exact_mut(4).zip(columns.iter()) {
                dst.copy_from_slice(&src_row[cx..cx + 4]);
            }
        });
        out
    } else {
        imageops::resize(&content, w, h, FilterType::Triangle)
    };

    Ok(PixelBuffer::from_rgba_image(fragment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::selection::PixelRegion;

    fn pattern(w: u32, h: u32) -> PixelBuffer {
        let mut buf = PixelBuffer::new(w, h);
        for y in 0..h {
            for x in 0..w {
                buf.put_pixel(x, y, Rgba([(x * 7) as u8, (y * 13) as u8, (x ^ y) as u8, 255 - (x % 50) as u8]));
            }
        }
        buf
    }

    fn rect_selection(r: PixelRect) -> Selection {
        let mut s = Selection::new();
        s.apply(Region::Rect(r), false);
        s
    }

    #[test]
    fn transform_centers_landscape_texture() {
        let t = CanonicalTransform::new(200, 100, 1024);
        assert_eq!(t.scaled_width, 1024);
        assert_eq!(t.scaled_height, 512);
        assert_eq!(t.offset_x, 0);
        assert_eq!(t.offset_y, 256);
        assert!(t.is_upscale());
    }

    #[test]
    fn full_image_is_padded_white() {
        let buf = PixelBuffer::new_filled(200, 100, Rgba([10, 20, 30, 255]));
        let t = CanonicalTransform::new(200, 100, 1024);
        let img = render_full_image(&buf, &t);
        assert_eq!(img.dimensions(), (1024, 1024));
        assert_eq!(*img.get_pixel(500, 100), PADDING);
        assert_eq!(*img.get_pixel(500, 300), Rgba([10, 20, 30, 255]));
        assert_eq!(*img.get_pixel(500, 900), PADDING);
    }

    #[test]
    fn noop_round_trip_is_exact_when_upscaling() {
        for (w, h) in [(200, 100), (64, 64), (37, 91), (1024, 3), (1000, 999)] {
            let buf = pattern(w, h);
            let t = CanonicalTransform::new(w, h, 1024);
            let full = render_full_image(&buf, &t);
            let back = extract_fragment(&full, &t, (w, h)).unwrap();
            assert!(back == buf, "round trip differs for {w}×{h}");
        }
    }

    #[test]
    fn downscaled_round_trip_keeps_dimensions() {
        let buf = PixelBuffer::new_filled(1500, 700, Rgba([9, 9, 9, 255]));
        let t = CanonicalTransform::new(1500, 700, 1024);
        assert!(!t.is_upscale());
        let full = render_full_image(&buf, &t);
        let back = extract_fragment(&full, &t, (1500, 700)).unwrap();
        assert_eq!(back.dimensions(), (1500, 700));
        assert_eq!(back.get_pixel(750, 350), Some(Rgba([9, 9, 9, 255])));
    }

    #[test]
    fn mask_marks_pixel_blocks_without_gaps() {
        // 200×100 → scale 5.12, so each texel covers a 6-wide block.
        let t = CanonicalTransform::new(200, 100, 1024);
        let region = PixelRegion::new(vec![(10, 10), (11, 10)]).unwrap();
        let mut sel = Selection::new();
        sel.apply(Region::Pixels(region), false);
        let mask = build_mask(&sel, &t);

        assert_eq!(t.block_size(), 6);
        let y = t.offset_y + 51;
        let x_start = 51;
        let x_end = 56 + 6;
        for x in x_start..x_end {
            assert_eq!(mask.get_pixel(x, y)[3], 0, "gap at x = {x}");
        }
        assert_eq!(mask.get_pixel(x_end, y)[3], 255);
        assert_eq!(mask.get_pixel(0, 0)[3], 255);
    }

    #[test]
    fn mask_clears_mapped_rectangle() {
        let t = CanonicalTransform::new(200, 100, 1024);
        let mask = build_mask(&rect_selection(PixelRect::new(0, 0, 100, 50)), &t);
        assert_eq!(mask.get_pixel(0, t.offset_y)[3], 0);
        assert_eq!(mask.get_pixel(511, t.offset_y + 255)[3], 0);
        assert_eq!(mask.get_pixel(512, t.offset_y)[3], 255);
        assert_eq!(mask.get_pixel(0, t.offset_y + 256)[3], 255);
        assert_eq!(mask.get_pixel(0, t.offset_y - 1)[3], 255);
    }

    #[test]
    fn request_requires_selection() {
        let buf = pattern(20, 20);
        assert!(matches!(
            InpaintRequest::build(&buf, &Selection::new(), "p", "s", 1024),
            Err(InpaintError::EmptySelection)
        ));
        let req = InpaintRequest::build(&buf, &rect_selection(PixelRect::new(0, 0, 10, 10)), "hat", "anime", 256).unwrap();
        assert_eq!(req.full_image.dimensions(), (256, 256));
        assert_eq!(req.mask.dimensions(), (256, 256));
        assert_eq!(req.source_size, (20, 20));
    }

    #[test]
    fn fragment_rejects_non_square() {
        let t = CanonicalTransform::new(20, 20, 64);
        assert!(matches!(
            extract_fragment(&RgbaImage::new(64, 32), &t, (20, 20)),
            Err(InpaintError::Decode(_))
        ));
        // Other square sizes are resized rather than refused.
        assert!(extract_fragment(&RgbaImage::new(32, 32), &t, (20, 20)).is_ok());
    }
}
