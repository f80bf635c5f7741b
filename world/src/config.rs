//! Engine configuration loaded from TOML.

use std::time::{SystemTime, UNIX_EPOCH};

use monument_core::{default_era_table, EraVisual};
use monument_system_placement::PlacementConfig;
use monument_system_pyramid::PyramidLayout;
use serde::Deserialize;
use thiserror::Error;

/// Errors produced while parsing or validating an [`EngineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The TOML document could not be parsed.
    #[error("could not parse engine configuration: {0}")]
    Parse(#[from] toml::de::Error),
    /// The pyramid has no blocks.
    #[error("pyramid base size must be at least one block")]
    EmptyPyramid,
    /// Blocks have no extent.
    #[error("block size must be positive and finite, got {0}")]
    BlockSize(f32),
    /// The era table has no rows.
    #[error("the era table must contain at least one era")]
    NoEras,
    /// No block would ever start falling.
    #[error("placement concurrency cap must be at least one")]
    ZeroConcurrency,
    /// Blocks would never land.
    #[error("fall speed must be positive and finite, got {0}")]
    FallSpeed(f32),
    /// Blocks would start below their resting height.
    #[error("drop height must be non-negative and finite, got {0}")]
    DropHeight(f32),
}

/// Complete engine configuration. Every field falls back to its default.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Seed of the engine's random source; `None` seeds from the wall clock.
    pub seed: Option<u64>,
    /// Pyramid dimensions and pacing.
    pub pyramid: PyramidSection,
    /// Drop animation tuning.
    pub placement: PlacementSection,
    /// Visual table, one row per era.
    pub eras: Vec<EraVisual>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: None,
            pyramid: PyramidSection::default(),
            placement: PlacementSection::default(),
            eras: default_era_table(),
        }
    }
}

impl EngineConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations the engine cannot run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pyramid.base_size == 0 {
            return Err(ConfigError::EmptyPyramid);
        }
        let block_size = self.pyramid.block_size;
        if !(block_size.is_finite() && block_size > 0.0) {
            return Err(ConfigError::BlockSize(block_size));
        }
        if self.eras.is_empty() {
            return Err(ConfigError::NoEras);
        }
        if self.placement.max_concurrent == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        let fall_speed = self.placement.fall_speed;
        if !(fall_speed.is_finite() && fall_speed > 0.0) {
            return Err(ConfigError::FallSpeed(fall_speed));
        }
        let drop_height = self.placement.drop_height;
        if !(drop_height.is_finite() && drop_height >= 0.0) {
            return Err(ConfigError::DropHeight(drop_height));
        }
        Ok(())
    }

    /// Seed for the engine's random source.
    #[must_use]
    pub fn resolved_seed(&self) -> u64 {
        self.seed.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|elapsed| elapsed.as_nanos() as u64)
                .unwrap_or_default()
        })
    }
}

/// `[pyramid]` table.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PyramidSection {
    /// Side length of the bottom layer in blocks.
    pub base_size: u32,
    /// Blocks removed from the side length per layer.
    pub step: u32,
    /// Edge length of one block in world units.
    pub block_size: f32,
    /// Turns granted to the bottom layer per interleave round.
    pub round_budget: u32,
}

impl Default for PyramidSection {
    fn default() -> Self {
        let layout = PyramidLayout::default();
        Self {
            base_size: layout.base_size,
            step: layout.step,
            block_size: layout.block_size,
            round_budget: layout.round_budget,
        }
    }
}

impl From<PyramidSection> for PyramidLayout {
    fn from(section: PyramidSection) -> Self {
        Self {
            base_size: section.base_size,
            step: section.step,
            block_size: section.block_size,
            round_budget: section.round_budget,
        }
    }
}

/// `[placement]` table.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlacementSection {
    /// Maximum number of blocks falling at once.
    pub max_concurrent: usize,
    /// Height above rest at which blocks appear.
    pub drop_height: f32,
    /// Flight progress gained per second.
    pub fall_speed: f32,
    /// Peak height of the settling bounce.
    pub bounce_amplitude: f32,
    /// Half-oscillations performed while settling.
    pub bounce_cycles: f32,
}

impl Default for PlacementSection {
    fn default() -> Self {
        let config = PlacementConfig::default();
        Self {
            max_concurrent: config.max_concurrent,
            drop_height: config.drop_height,
            fall_speed: config.fall_speed,
            bounce_amplitude: config.bounce_amplitude,
            bounce_cycles: config.bounce_cycles,
        }
    }
}

impl From<PlacementSection> for PlacementConfig {
    fn from(section: PlacementSection) -> Self {
        Self {
            max_concurrent: section.max_concurrent,
            drop_height: section.drop_height,
            fall_speed: section.fall_speed,
            bounce_amplitude: section.bounce_amplitude,
            bounce_cycles: section.bounce_cycles,
        }
    }
}
