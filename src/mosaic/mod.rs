//! Mosaic layout engine.
//!
//! Tiles a sample's extracted images onto fixed-extent composite pages for
//! rapid visual browsing:
//!
//! - [`packer`] - deterministic best-area-fit guillotine packing of one page
//! - [`layout`] - multi-page driver producing the placement table
//! - [`render`] - compositor turning placements into pixels
//! - [`cache`] - memoization of placement tables with background workers

pub mod cache;
pub mod layout;
pub mod packer;
pub mod render;

pub use cache::{CoordinateCache, CoordinateKey, DEFAULT_COORDINATE_WORKERS};
pub use layout::{
    pack, scaled_shapes, PageShape, Placement, ScaledShape, DEFAULT_MAX_PAGES, DEFAULT_PAGE_SHAPE,
    DEFAULT_SCALE,
};
pub use packer::{Packer, Rect};
pub use render::{render_page, resize_reflect, DEFAULT_BG_COLOR};
