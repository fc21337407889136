// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Tunables for sensors, stealth rigs and light samplers.
//!
//! Every struct deserializes with per-field defaults, so a JSON file only
//! needs to mention what it changes. Values are range-checked by `validate`,
//! which the component constructors call as well.

use crate::error::{PerceptionError, PerceptionResult};
use crate::falloff::FalloffCurve;
use gloam_core::LayerMask;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration of a field-of-view [`crate::Sensor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Full viewing angle in degrees; a target is seen up to half of it off-forward.
    pub field_of_view: f32,
    /// Minimum `visibility × falloff` score, in `[0, 1]`, for a target to be seen.
    pub min_visibility: f32,
    /// Distance → multiplier curve. Its last key is the maximum sensory range.
    pub falloff: FalloffCurve,
    /// Which layers can block line of sight (and host targets).
    pub occlusion_mask: LayerMask,
    /// Targets carrying one of these tags are never seen.
    pub invisible_tags: Vec<String>,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            field_of_view: 110.0,
            min_visibility: 0.5,
            falloff: FalloffCurve::default(),
            occlusion_mask: LayerMask::ALL,
            invisible_tags: Vec::new(),
        }
    }
}

impl SensorConfig {
    /// Checks every value is within its allowed range.
    pub fn validate(&self) -> PerceptionResult<()> {
        if !(self.field_of_view > 0.0 && self.field_of_view <= 360.0) {
            return Err(PerceptionError::InvalidConfig(format!(
                "field_of_view must be in (0, 360], got {}",
                self.field_of_view
            )));
        }
        if !(0.0..=1.0).contains(&self.min_visibility) {
            return Err(PerceptionError::InvalidConfig(format!(
                "min_visibility must be in [0, 1], got {}",
                self.min_visibility
            )));
        }
        Ok(())
    }
}

/// Normalization applied by a [`crate::StealthRig`] to its samplers' average intensity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StealthConfig {
    /// Scales the normalized light level. `0.5` suits most lighting;
    /// raise it for dark levels, lower it for bright ones.
    pub stealth_multiplier: f32,
    /// Average intensity at or below which the character is fully hidden.
    pub min_intensity: f32,
    /// Average intensity mapped to a normalized level of `1.0`.
    pub max_intensity: f32,
}

impl Default for StealthConfig {
    fn default() -> Self {
        Self {
            stealth_multiplier: 0.5,
            min_intensity: 0.0,
            max_intensity: 1.0,
        }
    }
}

impl StealthConfig {
    /// Checks every value is within its allowed range.
    pub fn validate(&self) -> PerceptionResult<()> {
        if !(self.stealth_multiplier >= 0.0 && self.stealth_multiplier.is_finite()) {
            return Err(PerceptionError::InvalidConfig(format!(
                "stealth_multiplier must be a non-negative number, got {}",
                self.stealth_multiplier
            )));
        }
        if !(self.max_intensity > self.min_intensity) {
            return Err(PerceptionError::InvalidConfig(format!(
                "max_intensity ({}) must exceed min_intensity ({})",
                self.max_intensity, self.min_intensity
            )));
        }
        Ok(())
    }

    /// Maps an average sampler intensity to a visibility in `[0, 1]`.
    ///
    /// Anything at or below `min_intensity`, or not a number, is exactly `0.0`.
    pub fn normalize(&self, average_intensity: f32) -> f32 {
        if !(average_intensity > self.min_intensity) {
            return 0.0;
        }
        let range = self.max_intensity - self.min_intensity;
        ((average_intensity - self.min_intensity) / range * self.stealth_multiplier).clamp(0.0, 1.0)
    }
}

/// Configuration of a [`crate::LightSampler`] worker pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightSamplerConfig {
    /// Number of worker threads scanning the capture. More threads finish a
    /// pass sooner but compete with the rest of the game.
    pub threads: usize,
    /// Longest a paused worker sleeps before rechecking the release gate, in milliseconds.
    pub poll_interval_ms: u64,
}

impl LightSamplerConfig {
    /// Allowed worker counts.
    pub const THREAD_RANGE: std::ops::RangeInclusive<usize> = 1..=15;
    /// Allowed poll intervals, in milliseconds.
    pub const POLL_INTERVAL_RANGE: std::ops::RangeInclusive<u64> = 1..=1000;

    /// Checks every value is within its allowed range.
    pub fn validate(&self) -> PerceptionResult<()> {
        if !Self::THREAD_RANGE.contains(&self.threads) {
            return Err(PerceptionError::InvalidConfig(format!(
                "threads must be in {:?}, got {}",
                Self::THREAD_RANGE,
                self.threads
            )));
        }
        if !Self::POLL_INTERVAL_RANGE.contains(&self.poll_interval_ms) {
            return Err(PerceptionError::InvalidConfig(format!(
                "poll_interval_ms must be in {:?}, got {}",
                Self::POLL_INTERVAL_RANGE,
                self.poll_interval_ms
            )));
        }
        Ok(())
    }

    /// The poll interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for LightSamplerConfig {
    fn default() -> Self {
        Self {
            threads: 2,
            poll_interval_ms: 1000 / 60,
        }
    }
}

/// All perception tunables in one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptionConfig {
    /// Guard sensor settings.
    pub sensor: SensorConfig,
    /// Stealth rig normalization.
    pub stealth: StealthConfig,
    /// Light sampler worker pools.
    pub light_sampler: LightSamplerConfig,
}

impl PerceptionConfig {
    /// Parses and validates a configuration from a JSON string.
    pub fn from_json(json: &str) -> PerceptionResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> PerceptionResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Saves the configuration as pretty-printed JSON.
    pub fn to_file(&self, path: impl AsRef<Path>) -> PerceptionResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Validates every section.
    pub fn validate(&self) -> PerceptionResult<()> {
        self.sensor.validate()?;
        self.stealth.validate()?;
        self.light_sampler.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults_are_valid() {
        PerceptionConfig::default().validate().unwrap();
        assert_eq!(LightSamplerConfig::default().poll_interval_ms, 16);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = PerceptionConfig::from_json(
            r#"{
                "sensor": {
                    "field_of_view": 90.0,
                    "falloff": [
                        {"distance": 0.0, "multiplier": 1.0},
                        {"distance": 15.0, "multiplier": 0.0}
                    ],
                    "invisible_tags": ["Ghost"]
                },
                "light_sampler": { "threads": 4 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.sensor.field_of_view, 90.0);
        assert_eq!(config.sensor.min_visibility, 0.5);
        assert_eq!(config.sensor.falloff.max_distance(), 15.0);
        assert_eq!(config.sensor.invisible_tags, vec!["Ghost".to_string()]);
        assert_eq!(config.light_sampler.threads, 4);
        assert_eq!(config.stealth, StealthConfig::default());
    }

    #[test]
    fn test_empty_falloff_fails_to_load() {
        let result = PerceptionConfig::from_json(r#"{ "sensor": { "falloff": [] } }"#);
        assert!(matches!(result, Err(PerceptionError::Json(_))));
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        let result = PerceptionConfig::from_json(r#"{ "light_sampler": { "threads": 16 } }"#);
        assert!(matches!(result, Err(PerceptionError::InvalidConfig(_))));

        let result = PerceptionConfig::from_json(r#"{ "sensor": { "min_visibility": 1.5 } }"#);
        assert!(matches!(result, Err(PerceptionError::InvalidConfig(_))));

        let stealth = StealthConfig {
            min_intensity: 0.6,
            max_intensity: 0.6,
            ..Default::default()
        };
        assert!(stealth.validate().is_err());
    }

    #[test]
    fn test_normalize() {
        let stealth = StealthConfig {
            stealth_multiplier: 1.0,
            min_intensity: 0.2,
            max_intensity: 0.6,
        };
        assert_eq!(stealth.normalize(0.1), 0.0);
        assert_eq!(stealth.normalize(0.2), 0.0);
        assert_relative_eq!(stealth.normalize(0.4), 0.5, epsilon = 1e-5);
        assert_eq!(stealth.normalize(0.9), 1.0);
        assert_eq!(stealth.normalize(f32::NAN), 0.0);
        assert_eq!(stealth.normalize(f32::INFINITY), 1.0);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("perception.json");
        let mut config = PerceptionConfig::default();
        config.sensor.invisible_tags.push("Decoy".to_string());
        config.to_file(&path).unwrap();
        assert_eq!(PerceptionConfig::from_file(&path).unwrap(), config);
    }
}
