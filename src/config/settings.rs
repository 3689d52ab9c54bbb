use crate::cli::Args;
use crate::error::ConfigError;

use super::defaults::*;

/// Raw sweep settings, freely editable before validation
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Document rasterization resolutions, highest first
    pub dpi_levels: Vec<u32>,
    /// JPEG qualities for rasterized document pages, highest first
    pub document_qualities: Vec<u8>,
    /// JPEG qualities for photos, highest first
    pub image_qualities: Vec<u8>,
    /// Image resize factors, largest first, none above 1.0
    pub resize_factors: Vec<f32>,
    /// No lossy quality below this is ever attempted
    pub quality_floor: u8,
    /// Longest image side in pixels
    pub max_dimension: u32,
    /// Multiplier on the per-page budget for the one-page sample
    pub sample_slack: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dpi_levels: DEFAULT_DPI_LEVELS.to_vec(),
            document_qualities: DEFAULT_DOCUMENT_QUALITIES.to_vec(),
            image_qualities: DEFAULT_IMAGE_QUALITIES.to_vec(),
            resize_factors: DEFAULT_RESIZE_FACTORS.to_vec(),
            quality_floor: DEFAULT_QUALITY_FLOOR,
            max_dimension: DEFAULT_MAX_DIMENSION,
            sample_slack: DEFAULT_SAMPLE_SLACK,
        }
    }
}

impl Settings {
    /// Create settings from CLI arguments, keeping defaults for anything not given
    pub fn from_args(args: &Args) -> Self {
        let mut settings = Self::default();

        if let Some(ref dpi) = args.dpi {
            settings.dpi_levels = dpi.clone();
        }
        if let Some(floor) = args.quality_floor {
            settings.quality_floor = floor;
            // Drop table entries the new floor forbids rather than failing on defaults
            settings.document_qualities.retain(|&q| q >= floor);
            settings.image_qualities.retain(|&q| q >= floor);
        }
        if let Some(max_dimension) = args.max_dimension {
            settings.max_dimension = max_dimension;
        }
        if let Some(slack) = args.sample_slack {
            settings.sample_slack = slack;
        }

        settings
    }

    /// Check every table and bound, producing a config the pipelines can trust
    pub fn validate(self) -> Result<CompressionConfig, ConfigError> {
        if self.quality_floor == 0 || self.quality_floor > 100 {
            return Err(ConfigError::InvalidValue {
                name: "quality_floor",
                message: format!("{} is outside 1..=100", self.quality_floor),
            });
        }

        check_descending("dpi_levels", &self.dpi_levels)?;
        if let Some(&dpi) = self.dpi_levels.iter().find(|&&d| d == 0) {
            return Err(ConfigError::InvalidValue {
                name: "dpi_levels",
                message: format!("resolution {} must be positive", dpi),
            });
        }

        check_descending("document_qualities", &self.document_qualities)?;
        check_qualities(&self.document_qualities, self.quality_floor)?;

        check_descending("image_qualities", &self.image_qualities)?;
        check_qualities(&self.image_qualities, self.quality_floor)?;

        check_descending("resize_factors", &self.resize_factors)?;
        for &factor in &self.resize_factors {
            if !(factor > 0.0 && factor <= 1.0) {
                return Err(ConfigError::InvalidResizeFactor(factor));
            }
        }

        if self.max_dimension == 0 {
            return Err(ConfigError::InvalidValue {
                name: "max_dimension",
                message: "must be positive".to_string(),
            });
        }
        if !self.sample_slack.is_finite() || self.sample_slack <= 0.0 {
            return Err(ConfigError::InvalidValue {
                name: "sample_slack",
                message: format!("{} must be a positive number", self.sample_slack),
            });
        }

        Ok(CompressionConfig { settings: self })
    }
}

fn check_descending<T: PartialOrd>(name: &'static str, values: &[T]) -> Result<(), ConfigError> {
    if values.is_empty() {
        return Err(ConfigError::EmptyTable(name));
    }
    if values.windows(2).any(|pair| pair[0] <= pair[1]) {
        return Err(ConfigError::NotDescending(name));
    }
    Ok(())
}

fn check_qualities(qualities: &[u8], floor: u8) -> Result<(), ConfigError> {
    match qualities.iter().find(|&&q| q < floor || q > 100) {
        Some(&quality) => Err(ConfigError::QualityOutOfRange { quality, floor }),
        None => Ok(()),
    }
}

/// Validated, immutable sweep configuration.
///
/// Built once and shared by reference; every pipeline call reads the same
/// tables without coordination.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionConfig {
    settings: Settings,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        // Checked by test_defaults_validate
        Self {
            settings: Settings::default(),
        }
    }
}

impl CompressionConfig {
    pub fn dpi_levels(&self) -> &[u32] {
        &self.settings.dpi_levels
    }

    pub fn document_qualities(&self) -> &[u8] {
        &self.settings.document_qualities
    }

    pub fn image_qualities(&self) -> &[u8] {
        &self.settings.image_qualities
    }

    pub fn resize_factors(&self) -> &[f32] {
        &self.settings.resize_factors
    }

    pub fn quality_floor(&self) -> u8 {
        self.settings.quality_floor
    }

    pub fn max_dimension(&self) -> u32 {
        self.settings.max_dimension
    }

    pub fn sample_slack(&self) -> f32 {
        self.settings.sample_slack
    }

    /// Document sweep in priority order: resolution outer, quality inner
    pub fn document_sweep(&self) -> impl Iterator<Item = (u32, u8)> + '_ {
        self.dpi_levels().iter().flat_map(move |&dpi| {
            self.document_qualities()
                .iter()
                .map(move |&quality| (dpi, quality))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = Settings::default().validate().unwrap();
        assert_eq!(config, CompressionConfig::default());
    }

    #[test]
    fn test_document_sweep_order() {
        let config = CompressionConfig::default();
        let sweep: Vec<_> = config.document_sweep().take(4).collect();
        assert_eq!(sweep, vec![(150, 75), (150, 60), (150, 45), (100, 75)]);
        assert_eq!(config.document_sweep().count(), 15);
    }

    #[test]
    fn test_quality_below_floor_rejected() {
        let settings = Settings {
            image_qualities: vec![85, 30],
            ..Settings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::QualityOutOfRange {
                quality: 30,
                floor: 40
            })
        ));
    }

    #[test]
    fn test_upscaling_factor_rejected() {
        let settings = Settings {
            resize_factors: vec![1.25, 1.0],
            ..Settings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidResizeFactor(_))
        ));
    }

    #[test]
    fn test_tables_must_descend() {
        let settings = Settings {
            dpi_levels: vec![72, 150],
            ..Settings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::NotDescending("dpi_levels"))
        ));

        let settings = Settings {
            document_qualities: vec![],
            ..Settings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::EmptyTable("document_qualities"))
        ));
    }

    #[test]
    fn test_invalid_slack_rejected() {
        let settings = Settings {
            sample_slack: f32::NAN,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }
}
