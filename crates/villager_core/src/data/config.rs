//! Engine tuning constants.

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::math::{decimal_serde, Fixed};

/// Timing and scheduling constants shared by every subsystem.
///
/// # Example RON
///
/// ```ron
/// EngineConfig(
///     max_time_slice: 1.0,
///     attack_tolerance: 0.25,
///     attack_interval: 1.0,
///     arrival_epsilon: 0.1,
///     build_time_k: 3.0,
///     build_time_c: 2.0,
///     max_builders_per_site: 8,
///     max_population: 200,
///     training_queue_limit: 5,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Largest time delta a single movement step may consume.
    #[serde(with = "decimal_serde")]
    pub max_time_slice: Fixed,
    /// Slack added to attack range.
    #[serde(with = "decimal_serde")]
    pub attack_tolerance: Fixed,
    /// Minimum time between two hits by the same attacker.
    #[serde(with = "decimal_serde")]
    pub attack_interval: Fixed,
    /// Distance within which a unit counts as standing on a tile.
    #[serde(with = "decimal_serde")]
    pub arrival_epsilon: Fixed,
    /// Numerator scale of the construction discount.
    #[serde(with = "decimal_serde")]
    pub build_time_k: Fixed,
    /// Denominator offset of the construction discount.
    #[serde(with = "decimal_serde")]
    pub build_time_c: Fixed,
    /// Workers beyond this count add no speed.
    pub max_builders_per_site: u32,
    /// Population ceiling per player.
    pub max_population: u32,
    /// Queue slots per producing building.
    pub training_queue_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_time_slice: Fixed::ONE,
            attack_tolerance: Fixed::from_num(0.25),
            attack_interval: Fixed::ONE,
            arrival_epsilon: Fixed::from_num(0.1),
            build_time_k: Fixed::from_num(3),
            build_time_c: Fixed::from_num(2),
            max_builders_per_site: 8,
            max_population: 200,
            training_queue_limit: 5,
        }
    }
}

impl EngineConfig {
    /// Parse from RON text. Missing fields take their defaults.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        let config: Self = ron::from_str(source).map_err(|e| GameError::DataParseError {
            source_name: "engine config".into(),
            message: e.to_string(),
        })?;
        if config.build_time_c <= Fixed::ZERO || config.build_time_k <= Fixed::ZERO {
            return Err(GameError::DataParseError {
                source_name: "engine config".into(),
                message: "construction constants must be positive".into(),
            });
        }
        if config.max_builders_per_site == 0 {
            return Err(GameError::DataParseError {
                source_name: "engine config".into(),
                message: "max_builders_per_site must be at least 1".into(),
            });
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = EngineConfig::from_ron_str("(max_time_slice: 0.2)").unwrap();
        assert_eq!(config.max_time_slice, Fixed::from_num(0.2));
        assert_eq!(config.attack_interval, Fixed::ONE);
        assert_eq!(config.max_builders_per_site, 8);
    }

    #[test]
    fn test_rejects_non_positive_constants() {
        assert!(EngineConfig::from_ron_str("(build_time_c: 0.0)").is_err());
        assert!(EngineConfig::from_ron_str("(max_builders_per_site: 0)").is_err());
    }
}
