use std::num::NonZeroU32;

use pagemask_core::{units::Resolution, OpacityPercent, TierBounds};

use crate::session::{BrushMode, BrushState, SessionConfig};

const DOCUMENTATION: &str = r#"# Pagemask settings. You may edit this file, but be aware that formatting and comments will not
# be preserved.

# edit_max_dimension:   longest side, in pixels, of layers while painting.
# output_max_dimension: longest side, in pixels, of exported composites. At least 4x edit_max_dimension.
# min_page_points:      pages smaller than this (in points) are upscaled no further than a page of this size.
# brush_radius:         in on-screen pixels.
# brush_mode:           "reveal-bottom" or "reveal-top".
# preview_opacity:      0 to 100. Higher favors the top layer in the painting preview.
# source_dpi:           pixels per inch of raster source pages, which decides exported page size.

"#;

#[must_use]
pub fn preferences_dir() -> Option<std::path::PathBuf> {
    let mut base_dir = dirs::preference_dir()?;
    base_dir.push(env!("CARGO_PKG_NAME"));
    Some(base_dir)
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SettingsError {
    #[error(transparent)]
    Tiers(#[from] pagemask_core::tier::TierBoundsError),
    #[error("brush radius must be nonzero")]
    BrushRadius,
    #[error("preview opacity {0} is not in 0..=100")]
    PreviewOpacity(u8),
    #[error("source dpi {0} must be finite and positive")]
    SourceDpi(f32),
}

#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub edit_max_dimension: u32,
    pub output_max_dimension: u32,
    pub min_page_points: f32,
    pub brush_radius: u32,
    pub brush_mode: BrushMode,
    pub preview_opacity: u8,
    pub source_dpi: f32,
    pub output_file_name: String,
    #[serde(skip)]
    failed_to_load: bool,
}
impl Default for Settings {
    fn default() -> Self {
        Self {
            edit_max_dimension: TierBounds::DEFAULT_EDIT,
            output_max_dimension: TierBounds::DEFAULT_OUTPUT,
            min_page_points: TierBounds::DEFAULT_MIN_PAGE_POINTS,
            brush_radius: BrushState::DEFAULT_RADIUS.get(),
            brush_mode: BrushMode::default(),
            preview_opacity: OpacityPercent::HALF.get(),
            source_dpi: 72.0,
            output_file_name: "overlay-result.pdf".to_owned(),
            failed_to_load: false,
        }
    }
}
impl Settings {
    const FILENAME: &'static str = "settings.toml";
    /// Load from user preferences, or defaults if unavailable for some reason.
    #[must_use]
    pub fn load() -> Self {
        let mut dir = preferences_dir();
        match dir.as_mut() {
            None => Self::no_path(),
            Some(dir) => {
                dir.push(Self::FILENAME);
                Self::load_or_default(dir)
            }
        }
    }
    #[must_use]
    pub fn no_path() -> Self {
        log::warn!("Settings weren't available, defaulting.");
        Self {
            failed_to_load: true,
            ..Default::default()
        }
    }
    #[must_use]
    fn load_or_default(path: &std::path::Path) -> Self {
        let settings: anyhow::Result<Self> = try_block::try_block! {
            let string = std::fs::read_to_string(path)?;
            let settings = Self::parse(&string)?;
            Ok(settings)
        };

        match settings {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Failed to read {}: {e:#}", path.display());
                Self::no_path()
            }
        }
    }
    /// Parse and validate a settings document. Missing keys take their defaults.
    /// # Errors
    /// Malformed TOML, or any value rejected by [`Self::session_config`].
    pub fn parse(toml_source: &str) -> anyhow::Result<Self> {
        let settings: Self = toml::from_str(toml_source)?;
        settings.session_config()?;
        settings.source_resolution()?;
        Ok(settings)
    }
    /// Return true if loading the user's settings failed. This can be useful for
    /// displaying a warning.
    #[must_use]
    pub fn did_fail_to_load(&self) -> bool {
        self.failed_to_load
    }
    /// # Errors
    /// If any of tier bounds, brush radius, or opacity are out of range.
    pub fn session_config(&self) -> Result<SessionConfig, SettingsError> {
        let bounds = TierBounds::new(
            self.edit_max_dimension,
            self.output_max_dimension,
            self.min_page_points,
        )?;
        let radius = NonZeroU32::new(self.brush_radius).ok_or(SettingsError::BrushRadius)?;
        let preview_opacity = OpacityPercent::new(self.preview_opacity)
            .ok_or(SettingsError::PreviewOpacity(self.preview_opacity))?;
        Ok(SessionConfig {
            bounds,
            brush: BrushState {
                mode: self.brush_mode,
                radius,
            },
            preview_opacity,
        })
    }
    /// # Errors
    /// [`SettingsError::SourceDpi`] if the dpi is unusable.
    pub fn source_resolution(&self) -> Result<Resolution, SettingsError> {
        let resolution = Resolution::Dpi(self.source_dpi);
        if resolution.is_valid() {
            Ok(resolution)
        } else {
            Err(SettingsError::SourceDpi(self.source_dpi))
        }
    }
    pub fn save(&self) -> anyhow::Result<()> {
        let mut preferences =
            preferences_dir().ok_or_else(|| anyhow::anyhow!("No preferences dir found"))?;
        // Explicity do *not* create recursively. If not found, the user probably has a good reason.
        // Ignore errors (could already exist). Any real errors will be emitted by file access below.
        let _ = std::fs::DirBuilder::new().create(&preferences);

        preferences.push(Self::FILENAME);
        let string = DOCUMENTATION.to_owned() + &toml::ser::to_string_pretty(self)?;
        std::fs::write(preferences, string)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{Settings, SettingsError};
    use crate::session::BrushMode;

    #[test]
    fn defaults() {
        let settings = Settings::parse("").unwrap();
        assert_eq!(settings, Settings::default());
        let config = settings.session_config().unwrap();
        assert_eq!(config.bounds, pagemask_core::TierBounds::default());
        assert_eq!(config.brush.radius.get(), 30);
        assert_eq!(config.brush.mode, BrushMode::RevealBottom);
        assert_eq!(config.preview_opacity.get(), 50);
        assert!(!settings.did_fail_to_load());
    }
    #[test]
    fn partial_override() {
        let settings = Settings::parse(
            r#"
            edit_max_dimension = 600
            brush_mode = "reveal-top"
            preview_opacity = 80
            output_file_name = "merged.pdf"
            "#,
        )
        .unwrap();
        assert_eq!(settings.edit_max_dimension, 600);
        assert_eq!(settings.output_max_dimension, 4800);
        assert_eq!(settings.brush_mode, BrushMode::RevealTop);
        assert_eq!(settings.output_file_name, "merged.pdf");
    }
    #[test]
    fn rejects_invalid() {
        assert!(Settings::parse("edit_max_dimension = 2000").is_err());
        assert!(Settings::parse("brush_radius = 0").is_err());
        assert!(Settings::parse("preview_opacity = 101").is_err());
        assert!(Settings::parse("source_dpi = -3.0").is_err());
        assert!(Settings::parse("brush_mode = \"smudge\"").is_err());
        assert!(Settings::parse("edit_max_dimension = \"big\"").is_err());

        let settings = Settings {
            brush_radius: 0,
            ..Default::default()
        };
        assert_eq!(settings.session_config(), Err(SettingsError::BrushRadius));
    }
    #[test]
    fn serializes_back() {
        let settings = Settings {
            brush_radius: 12,
            ..Default::default()
        };
        let string = toml::ser::to_string_pretty(&settings).unwrap();
        assert!(string.contains("brush_mode = \"reveal-bottom\""));
        assert_eq!(Settings::parse(&string).unwrap(), settings);
    }
}
