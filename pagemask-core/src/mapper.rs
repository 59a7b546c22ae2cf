//! # Pointer mapping
//!
//! Pointer events arrive in the displayed element's local space, which is usually scaled relative to
//! the buffer behind it. This converts an event into buffer pixel space, along with a brush radius
//! scaled so the footprint in the buffer is never smaller than what the user sees on screen.

use crate::raster::Dimensions;

/// A pointer position relative to the top-left of the displayed element, in display pixels.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PointerEvent {
    pub local_x: f32,
    pub local_y: f32,
}

/// On-screen size of the displayed element, in display pixels.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DisplaySize {
    pub width: f32,
    pub height: f32,
}
impl DisplaySize {
    /// A display showing the buffer 1:1.
    #[must_use]
    pub fn unscaled(buffer: Dimensions) -> Self {
        Self {
            width: buffer.width() as f32,
            height: buffer.height() as f32,
        }
    }
    fn is_degenerate(self) -> bool {
        !(self.width.is_finite() && self.height.is_finite())
            || self.width <= 0.0
            || self.height <= 0.0
    }
}

/// A stamp location and radius in buffer pixel space.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MappedStamp {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum MapError {
    #[error("display size {width}x{height} cannot be mapped")]
    DegenerateDisplay { width: f32, height: f32 },
}

/// Map a display-space pointer event onto a buffer of size `buffer`.
///
/// The radius scales by the *larger* of the two axis scales, so a stretched or letterboxed
/// display never paints a smaller footprint than the cursor suggests.
/// # Errors
/// [`MapError::DegenerateDisplay`] if the display has a zero, negative, or non-finite side.
pub fn map_pointer_event(
    event: PointerEvent,
    display: DisplaySize,
    buffer: Dimensions,
    display_radius: f32,
) -> Result<MappedStamp, MapError> {
    if display.is_degenerate() {
        return Err(MapError::DegenerateDisplay {
            width: display.width,
            height: display.height,
        });
    }
    let scale_x = buffer.width() as f32 / display.width;
    let scale_y = buffer.height() as f32 / display.height;

    Ok(MappedStamp {
        x: event.local_x * scale_x,
        y: event.local_y * scale_y,
        radius: display_radius * scale_x.max(scale_y),
    })
}
