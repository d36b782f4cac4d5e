//! Mosaic page compositor.
//!
//! Renders one page of a placement table: a fixed-extent grayscale canvas
//! filled with the background tone, with each placed ROI resized into its
//! box. Rendering is synchronous and read-only given a placement table,
//! so distinct samples can render in parallel freely.

use image::{GrayImage, Luma};
use tracing::warn;

use crate::error::MosaicError;
use crate::source::RawBin;

use super::layout::{PageShape, Placement};

/// Default background gray for mosaic pages.
pub const DEFAULT_BG_COLOR: u8 = 200;

/// Composite the placements of `page` onto a fresh canvas.
///
/// Placements on other pages are ignored. An ROI that can no longer be
/// read is skipped with a warning rather than failing the page; the rest
/// of the mosaic is still useful.
pub fn render_page(
    bin: &dyn RawBin,
    placements: &[Placement],
    page: u32,
    shape: PageShape,
    bg_color: u8,
) -> Result<GrayImage, MosaicError> {
    let mut canvas = GrayImage::from_pixel(shape.width, shape.height, Luma([bg_color]));
    for placement in placements.iter().filter(|p| p.page == page) {
        let source = match bin.image(placement.roi) {
            Ok(img) => img,
            Err(e) => {
                warn!(pid = %bin.pid().lid, roi = placement.roi, error = %e, "skipping unreadable ROI");
                continue;
            }
        };
        let scaled = resize_reflect(&source, placement.w, placement.h);
        blit(&mut canvas, &scaled, placement.x, placement.y);
    }
    Ok(canvas)
}

/// Bilinear resize with reflected borders.
///
/// Out-of-range taps mirror back into the image instead of clamping, so
/// thumbnail edges keep local contrast instead of smearing the border
/// row.
pub fn resize_reflect(src: &GrayImage, width: u32, height: u32) -> GrayImage {
    if width == 0 || height == 0 || src.width() == 0 || src.height() == 0 {
        return GrayImage::new(width, height);
    }
    let sx = src.width() as f64 / width as f64;
    let sy = src.height() as f64 / height as f64;
    GrayImage::from_fn(width, height, |ox, oy| {
        let cx = (ox as f64 + 0.5) * sx - 0.5;
        let cy = (oy as f64 + 0.5) * sy - 0.5;
        let x0 = cx.floor();
        let y0 = cy.floor();
        let fx = cx - x0;
        let fy = cy - y0;

        let sample = |ix: i64, iy: i64| -> f64 {
            let x = reflect(ix, src.width());
            let y = reflect(iy, src.height());
            src.get_pixel(x, y).0[0] as f64
        };

        let x0 = x0 as i64;
        let y0 = y0 as i64;
        let top = sample(x0, y0) * (1.0 - fx) + sample(x0 + 1, y0) * fx;
        let bottom = sample(x0, y0 + 1) * (1.0 - fx) + sample(x0 + 1, y0 + 1) * fx;
        let value = top * (1.0 - fy) + bottom * fy;
        Luma([value.round().clamp(0.0, 255.0) as u8])
    })
}

/// Mirror an index into `[0, len)` without repeating the edge sample.
fn reflect(mut i: i64, len: u32) -> u32 {
    let len = len as i64;
    if len == 1 {
        return 0;
    }
    let period = 2 * (len - 1);
    i = i.rem_euclid(period);
    if i >= len {
        i = period - i;
    }
    i as u32
}

/// Copy `src` onto `canvas` at `(x, y)`, clipped to the canvas.
fn blit(canvas: &mut GrayImage, src: &GrayImage, x: u32, y: u32) {
    for sy in 0..src.height() {
        let cy = y + sy;
        if cy >= canvas.height() {
            break;
        }
        for sx in 0..src.width() {
            let cx = x + sx;
            if cx >= canvas.width() {
                break;
            }
            canvas.put_pixel(cx, cy, *src.get_pixel(sx, sy));
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
