//! Engine configuration
//!
//! Loaded from JSON; every field has a default so partial documents work.

use fe_core::{FeError, FeResult};
use serde::{Deserialize, Serialize};

/// Settings shared by the filter bank, EQ and analyser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Parameter ramp length in milliseconds
    pub smoothing_time_ms: f64,
    /// EQ sub-block length in samples
    pub sub_block_size: usize,
    /// Analyser ring buffer size (power of two, 0 = inactive)
    pub analyser_buffer_size: usize,
    pub analyser_channels: usize,
    /// Display refresh rate in Hz
    pub spectrum_refresh_hz: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            smoothing_time_ms: 30.0,
            sub_block_size: 64,
            analyser_buffer_size: 8192,
            analyser_channels: 2,
            spectrum_refresh_hz: 30.0,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> FeResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| FeError::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> FeResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| FeError::Serialization(e.to_string()))
    }

    pub fn validate(&self) -> FeResult<()> {
        if !(self.smoothing_time_ms.is_finite() && self.smoothing_time_ms >= 0.0) {
            return Err(FeError::InvalidParam(format!(
                "smoothing_time_ms must be non-negative, got {}",
                self.smoothing_time_ms
            )));
        }

        if self.sub_block_size == 0 {
            return Err(FeError::InvalidParam("sub_block_size must be positive".into()));
        }

        if self.analyser_buffer_size != 0 && !self.analyser_buffer_size.is_power_of_two() {
            return Err(FeError::InvalidBufferSize(self.analyser_buffer_size));
        }

        if self.analyser_channels == 0 {
            return Err(FeError::InvalidParam("analyser_channels must be positive".into()));
        }

        if !(self.spectrum_refresh_hz.is_finite() && self.spectrum_refresh_hz > 0.0) {
            return Err(FeError::InvalidParam(format!(
                "spectrum_refresh_hz must be positive, got {}",
                self.spectrum_refresh_hz
            )));
        }

        Ok(())
    }

    /// Ramp length in seconds
    pub fn smoothing_time(&self) -> f64 {
        self.smoothing_time_ms / 1000.0
    }
}
