//! # Pagemask core
//!
//! Synchronous building blocks of the two-layer masked compositor: pixel and mask buffers, the
//! pointer-to-buffer mapping, both blend policies, and resolution tier math. Nothing in here suspends
//! or performs I/O, that is left to the `pagemask` crate.

pub mod compositor;
pub mod id;
pub mod mapper;
pub mod mask;
pub mod raster;
pub mod tier;
pub mod units;

pub use compositor::{compose_final, compose_preview, CompositeError, OpacityPercent};
pub use id::LocalID;
pub use mask::MaskBuffer;
pub use raster::{DimensionError, Dimensions, RasterImage, Rgba8};
pub use tier::{Tier, TierBounds, TierPair};
