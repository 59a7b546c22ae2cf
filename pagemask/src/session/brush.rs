use std::num::NonZeroU32;

use pagemask_core::mask::{REVEAL_BOTTOM, REVEAL_TOP};

/// Which layer a stroke uncovers.
#[derive(
    serde::Serialize,
    serde::Deserialize,
    strum::AsRefStr,
    strum::EnumString,
    strum::EnumIter,
    PartialEq,
    Eq,
    Copy,
    Clone,
    Hash,
    Debug,
    Default,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum BrushMode {
    #[default]
    RevealBottom,
    RevealTop,
}
impl BrushMode {
    /// Value stamped into the mask.
    #[must_use]
    pub fn mask_value(self) -> u8 {
        match self {
            Self::RevealBottom => REVEAL_BOTTOM,
            Self::RevealTop => REVEAL_TOP,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct BrushState {
    pub mode: BrushMode,
    /// In display pixels, scaled into buffer space per event.
    pub radius: NonZeroU32,
}
impl BrushState {
    pub const DEFAULT_RADIUS: NonZeroU32 = match NonZeroU32::new(30) {
        Some(radius) => radius,
        None => NonZeroU32::MIN,
    };
}
impl Default for BrushState {
    fn default() -> Self {
        Self {
            mode: BrushMode::default(),
            radius: Self::DEFAULT_RADIUS,
        }
    }
}
