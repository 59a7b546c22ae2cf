//! # Pagemask
//!
//! Overlays one page onto another through a paintable mask, and exports the hard-cut composite as a
//! single page document. The pure pixel work lives in `pagemask_core`, this crate adds sources,
//! assembly, settings, and the [`session::OverlaySession`] driving them.

pub mod assembly;
pub mod cli;
pub mod pipeline;
pub mod session;
pub mod settings;
pub mod sources;
