//! # Physical units
//!
//! Page sizes are expressed in typographic points. Raster sources carry pixels, so a [`Resolution`]
//! decides how many of them make up a point.

pub const CM_PER_IN: f32 = 2.54;
pub const IN_PER_CM: f32 = 1.0 / CM_PER_IN;
/// Constant varies by who you ask - but this is the one defined by W3C, and by PDF.
pub const PT_PER_IN: f32 = 72.0;
pub const IN_PER_PT: f32 = 1.0 / PT_PER_IN;

/// Defines the relationship between pixels and physical units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Resolution {
    /// Dots (pixels) per inch
    Dpi(f32),
    /// Dots (pixels) per centimeter
    Dpcm(f32),
}
impl Resolution {
    /// One pixel per point.
    pub const POINTS: Self = Self::Dpi(PT_PER_IN);
    #[must_use]
    pub fn value(self) -> f32 {
        match self {
            Self::Dpi(x) | Self::Dpcm(x) => x,
        }
    }
    #[must_use]
    pub fn unit(self) -> &'static str {
        match self {
            Self::Dpi(_) => "dpi",
            Self::Dpcm(_) => "dpcm",
        }
    }
    #[must_use]
    pub fn into_dpi(self) -> f32 {
        match self {
            Self::Dpi(i) => i,
            Self::Dpcm(cm) => cm * CM_PER_IN,
        }
    }
    #[must_use]
    pub fn into_dpcm(self) -> f32 {
        match self {
            Self::Dpi(i) => i * IN_PER_CM,
            Self::Dpcm(cm) => cm,
        }
    }
    /// Convert a pixel count into points.
    #[must_use]
    pub fn pixels_to_points(self, pixels: f32) -> f32 {
        pixels / self.into_dpi() * PT_PER_IN
    }
    /// Usable for conversion: finite and positive.
    #[must_use]
    pub fn is_valid(self) -> bool {
        self.value().is_finite() && self.value() > 0.0
    }
}
impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.value(), self.unit())
    }
}

/// Native size of a source page, in points. Both sides finite and positive.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageSize {
    width_pts: f32,
    height_pts: f32,
}
impl PageSize {
    /// None unless both sides are finite and positive.
    #[must_use]
    pub fn new(width_pts: f32, height_pts: f32) -> Option<Self> {
        let valid = |side: f32| side.is_finite() && side > 0.0;
        (valid(width_pts) && valid(height_pts)).then_some(Self {
            width_pts,
            height_pts,
        })
    }
    /// Size of a raster page of `width` x `height` pixels at `resolution`.
    #[must_use]
    pub fn from_pixels(width: u32, height: u32, resolution: Resolution) -> Option<Self> {
        Self::new(
            resolution.pixels_to_points(width as f32),
            resolution.pixels_to_points(height as f32),
        )
    }
    #[must_use]
    pub fn width_pts(self) -> f32 {
        self.width_pts
    }
    #[must_use]
    pub fn height_pts(self) -> f32 {
        self.height_pts
    }
    #[must_use]
    pub fn longest_side(self) -> f32 {
        self.width_pts.max(self.height_pts)
    }
}
impl std::fmt::Display for PageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}pt", self.width_pts, self.height_pts)
    }
}

#[cfg(test)]
mod test {
    use super::{PageSize, Resolution};

    #[test]
    fn pixels_to_points() {
        assert_eq!(Resolution::POINTS.pixels_to_points(612.0), 612.0);
        assert_eq!(Resolution::Dpi(144.0).pixels_to_points(144.0), 72.0);
        let dpcm = Resolution::Dpcm(100.0);
        assert!((dpcm.into_dpi() - 254.0).abs() < 1e-3);
    }
    #[test]
    fn page_size_validates() {
        assert!(PageSize::new(0.0, 10.0).is_none());
        assert!(PageSize::new(f32::INFINITY, 10.0).is_none());
        let letter = PageSize::from_pixels(1275, 1650, Resolution::Dpi(150.0)).unwrap();
        assert_eq!(letter.width_pts(), 612.0);
        assert_eq!(letter.height_pts(), 792.0);
        assert_eq!(letter.longest_side(), 792.0);
    }
}
