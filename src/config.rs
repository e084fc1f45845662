//! Configuration for query evaluation.

use serde::{Deserialize, Serialize};

use crate::error::{PhalanxError, Result};

/// Largest accepted `phrase_chunk_size`. Each phrase scorer allocates two
/// `u32` arrays of the chunk size.
pub const MAX_PHRASE_CHUNK_SIZE: usize = 1 << 20;

/// Tunables shared by the scorers built for one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of buckets in the windowed boolean scorer's hash table.
    /// Also the width of one scoring window. Must be a power of two.
    pub bucket_table_size: usize,

    /// Width of the position chunks used by exact phrase matching.
    pub phrase_chunk_size: usize,

    /// A phrase term whose document frequency exceeds this multiple of the
    /// rarest term's is intersected with `advance` instead of `next`.
    pub phrase_advance_ratio: u64,

    /// Number of `next` calls tried before falling back to `advance`
    /// when intersecting a non-advancing phrase term.
    pub phrase_max_next_calls: usize,

    /// Disables the coordination factor entirely (every factor is 1.0).
    pub coord_disabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bucket_table_size: 1 << 11,
            phrase_chunk_size: 4096,
            phrase_advance_ratio: 5,
            phrase_max_next_calls: 50,
            coord_disabled: false,
        }
    }
}

impl EngineConfig {
    /// Check that every setting is usable.
    pub fn validate(&self) -> Result<()> {
        if self.bucket_table_size < 2 || !self.bucket_table_size.is_power_of_two() {
            return Err(PhalanxError::invalid_configuration(format!(
                "bucket_table_size must be a power of two >= 2, got {}",
                self.bucket_table_size
            )));
        }
        if self.bucket_table_size > i32::MAX as usize {
            return Err(PhalanxError::invalid_configuration(format!(
                "bucket_table_size {} exceeds the document id space",
                self.bucket_table_size
            )));
        }
        if self.phrase_chunk_size == 0 || self.phrase_chunk_size > MAX_PHRASE_CHUNK_SIZE {
            return Err(PhalanxError::invalid_configuration(format!(
                "phrase_chunk_size must be in 1..={}, got {}",
                MAX_PHRASE_CHUNK_SIZE, self.phrase_chunk_size
            )));
        }
        if self.phrase_max_next_calls == 0 {
            return Err(PhalanxError::invalid_configuration(
                "phrase_max_next_calls must be at least 1",
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize this configuration as JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert_eq!(config.bucket_table_size, 2048);
        assert_eq!(config.phrase_chunk_size, 4096);
        assert_eq!(config.phrase_advance_ratio, 5);
        assert_eq!(config.phrase_max_next_calls, 50);
        assert!(!config.coord_disabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bucket_table_size_must_be_power_of_two() {
        let config = EngineConfig {
            bucket_table_size: 1000,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, PhalanxError::InvalidConfiguration(_)));

        let config = EngineConfig {
            bucket_table_size: 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let config = EngineConfig {
            phrase_chunk_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_oversized_chunk_size_rejected() {
        let at_limit = EngineConfig {
            phrase_chunk_size: MAX_PHRASE_CHUNK_SIZE,
            ..Default::default()
        };
        assert!(at_limit.validate().is_ok());

        let config = EngineConfig {
            phrase_chunk_size: MAX_PHRASE_CHUNK_SIZE + 1,
            ..Default::default()
        };
        assert!(matches!(
            config.validate().unwrap_err(),
            PhalanxError::InvalidConfiguration(_)
        ));

        let config = EngineConfig {
            phrase_chunk_size: i32::MAX as usize,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json(r#"{"bucket_table_size": 64}"#).unwrap();
        assert_eq!(config.bucket_table_size, 64);
        assert_eq!(config.phrase_chunk_size, 4096);

        let json = config.to_json().unwrap();
        assert_eq!(EngineConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_invalid_json_config_rejected() {
        assert!(EngineConfig::from_json(r#"{"bucket_table_size": 3}"#).is_err());
        assert!(matches!(
            EngineConfig::from_json("{").unwrap_err(),
            PhalanxError::Json(_)
        ));
    }
}
