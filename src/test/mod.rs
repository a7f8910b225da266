//! Shared test fixtures.

mod image;
mod snapshots;

pub use image::{minimal_metadata, MetadataImage, PeImageBuilder};
pub use snapshots::*;
