//! Mosaic layout driver.
//!
//! Turns a sample's ROI index into a placement table: every image gets a
//! page number and a position, large images first so small ones fill the
//! gaps. One [`Packer`] instance is reset per page; a rectangle the
//! current page cannot hold simply waits for the next pass.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::source::RoiIndex;

use super::packer::Packer;

/// Default composite page extent.
pub const DEFAULT_PAGE_SHAPE: PageShape = PageShape {
    width: 800,
    height: 600,
};

/// Default thumbnail scale applied to ROI extents.
pub const DEFAULT_SCALE: f64 = 0.33;

/// Default cap on overflow pages per layout.
pub const DEFAULT_MAX_PAGES: u32 = 20;

/// Extent of one composite page, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageShape {
    pub width: u32,
    pub height: u32,
}

impl PageShape {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for PageShape {
    fn default() -> Self {
        DEFAULT_PAGE_SHAPE
    }
}

impl std::fmt::Display for PageShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One placed thumbnail: which page, where, how big, and which ROI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub page: u32,
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    pub roi: u32,
}

/// The scaled extent of one ROI, the packer's input unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaledShape {
    pub roi: u32,
    pub w: u32,
    pub h: u32,
}

/// Scaled extents for every image in the index: `floor(dim * scale)`.
pub fn scaled_shapes(index: &RoiIndex, scale: f64) -> Vec<ScaledShape> {
    index
        .images()
        .map(|r| ScaledShape {
            roi: r.roi,
            w: (r.width as f64 * scale).floor() as u32,
            h: (r.height as f64 * scale).floor() as u32,
        })
        .collect()
}

/// Assign a page and position to every shape.
///
/// Shapes are placed in order of descending area (ties by input order) so
/// the layout is deterministic. Shapes still unplaced when `max_pages` is
/// reached are dropped from the table; the placements come back in input
/// order.
pub fn pack(shapes: &[ScaledShape], page: PageShape, max_pages: u32) -> Vec<Placement> {
    let mut order: Vec<usize> = (0..shapes.len()).collect();
    order.sort_by(|&a, &b| {
        let area = |i: usize| shapes[i].w as u64 * shapes[i].h as u64;
        area(b).cmp(&area(a)).then(a.cmp(&b))
    });

    let mut placements: Vec<Option<Placement>> = vec![None; shapes.len()];
    let mut packer = Packer::new(page.width, page.height, shapes.len().max(128));
    let mut remaining = shapes.len();
    let mut page_no = 0u32;

    while remaining > 0 && page_no < max_pages {
        packer.reset();
        let mut placed_this_page = false;
        for &i in &order {
            if placements[i].is_some() {
                continue;
            }
            let shape = &shapes[i];
            if let Some((x, y)) = packer.add_rect(shape.w, shape.h) {
                placements[i] = Some(Placement {
                    page: page_no,
                    x,
                    y,
                    w: shape.w,
                    h: shape.h,
                    roi: shape.roi,
                });
                remaining -= 1;
                placed_this_page = true;
            }
        }
        if !placed_this_page {
            // everything left is larger than an empty page
            break;
        }
        page_no += 1;
    }

    if remaining > 0 {
        warn!(
            unplaced = remaining,
            pages = page_no,
            "layout truncated at page cap"
        );
    }
    placements.into_iter().flatten().collect()
}

// =============================================================================
// Tests
// =============================================================================
