use std::path::PathBuf;

use crate::errors::KeySetError;

/// Sizing of the optional Bloom pre-filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrefilterConfig {
    pub expected_items: usize,
    pub false_positive_rate: f64,
}

impl Default for PrefilterConfig {
    fn default() -> Self {
        Self {
            expected_items: 10_000_000,
            false_positive_rate: 0.01,
        }
    }
}

/// Configuration of a `MemoryBoundedKeySet`.
#[derive(Debug, Clone, PartialEq)]
pub struct KeySetConfig {
    /// Keys held in memory before new keys go to disk
    pub memory_limit: usize,
    pub prefilter: Option<PrefilterConfig>,
    /// Directory for the spill file, system temp directory when `None`
    pub spill_dir: Option<PathBuf>,
}

impl Default for KeySetConfig {
    fn default() -> Self {
        Self {
            memory_limit: 1_000_000,
            prefilter: None,
            spill_dir: None,
        }
    }
}

impl KeySetConfig {
    pub fn validate(&self) -> Result<(), KeySetError> {
        if let Some(prefilter) = &self.prefilter {
            let p = prefilter.false_positive_rate;
            if !(p > 0.0 && p < 1.0) {
                return Err(KeySetError::InvalidConfig(format!(
                    "prefilter false positive rate must be in (0, 1), got {p}"
                )));
            }
            if prefilter.expected_items == 0 {
                return Err(KeySetError::InvalidConfig(
                    "prefilter expected items must be greater than zero".to_string(),
                ));
            }
        }
        Ok(())
    }
}

pub struct KeySetConfigBuilder {
    memory_limit: usize,
    prefilter: Option<PrefilterConfig>,
    spill_dir: Option<PathBuf>,
}

impl Default for KeySetConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl KeySetConfigBuilder {
    /// Create a new [`KeySetConfigBuilder`]
    pub fn new() -> Self {
        let config = KeySetConfig::default();
        Self {
            memory_limit: config.memory_limit,
            prefilter: config.prefilter,
            spill_dir: config.spill_dir,
        }
    }

    /// Build a [`KeySetConfig`]
    pub fn build(self) -> KeySetConfig {
        KeySetConfig {
            memory_limit: self.memory_limit,
            prefilter: self.prefilter,
            spill_dir: self.spill_dir,
        }
    }

    pub fn with_memory_limit(self, memory_limit: usize) -> Self {
        Self {
            memory_limit,
            ..self
        }
    }

    pub fn with_prefilter(self, expected_items: usize, false_positive_rate: f64) -> Self {
        Self {
            prefilter: Some(PrefilterConfig {
                expected_items,
                false_positive_rate,
            }),
            ..self
        }
    }

    pub fn without_prefilter(self) -> Self {
        Self {
            prefilter: None,
            ..self
        }
    }

    pub fn with_spill_dir(self, dir: impl Into<PathBuf>) -> Self {
        Self {
            spill_dir: Some(dir.into()),
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = KeySetConfig::default();
        assert_eq!(config.memory_limit, 1_000_000);
        assert!(config.prefilter.is_none());
        assert!(config.spill_dir.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = KeySetConfigBuilder::new()
            .with_memory_limit(10)
            .with_prefilter(1_000, 0.05)
            .with_spill_dir("/tmp")
            .build();
        assert_eq!(config.memory_limit, 10);
        assert_eq!(
            config.prefilter,
            Some(PrefilterConfig {
                expected_items: 1_000,
                false_positive_rate: 0.05
            })
        );
        assert_eq!(config.spill_dir, Some(PathBuf::from("/tmp")));
    }

    #[test]
    fn test_invalid_rate() {
        for rate in [0.0, 1.0, -0.5, f64::NAN] {
            let config = KeySetConfigBuilder::new().with_prefilter(10, rate).build();
            assert!(config.validate().is_err(), "rate {rate} accepted");
        }
    }
}
