//! Chunking and compression settings for the capacity-factor store.

use serde::{Deserialize, Serialize};

/// Default chunk length along time: one week of hours.
pub const DEFAULT_TIME_CHUNK: usize = 168;

/// Default chunk size along latitude and longitude.
pub const DEFAULT_SPATIAL_CHUNK: usize = 180;

/// Configuration for the output store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Chunk length along time.
    pub time_chunk: usize,

    /// Chunk length along latitude. Tiles are multiples of this.
    pub lat_chunk: usize,

    /// Chunk length along longitude.
    pub lon_chunk: usize,

    /// Compression codec for the capacity-factor array.
    pub compression: ZarrCompression,

    /// Compression level (1-9).
    pub compression_level: u8,

    /// Enable byte shuffle filter for better compression.
    pub shuffle: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            time_chunk: DEFAULT_TIME_CHUNK,
            lat_chunk: DEFAULT_SPATIAL_CHUNK,
            lon_chunk: DEFAULT_SPATIAL_CHUNK,
            compression: ZarrCompression::BloscZstd,
            compression_level: 1,
            shuffle: true,
        }
    }
}

impl StoreConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("CF_TIME_CHUNK") {
            if let Ok(size) = val.parse() {
                config.time_chunk = size;
            }
        }

        if let Ok(val) = std::env::var("CF_LAT_CHUNK") {
            if let Ok(size) = val.parse() {
                config.lat_chunk = size;
            }
        }

        if let Ok(val) = std::env::var("CF_LON_CHUNK") {
            if let Ok(size) = val.parse() {
                config.lon_chunk = size;
            }
        }

        if let Ok(val) = std::env::var("ZARR_COMPRESSION") {
            config.compression = ZarrCompression::from_str(&val);
        }

        if let Ok(val) = std::env::var("ZARR_COMPRESSION_LEVEL") {
            if let Ok(level) = val.parse() {
                config.compression_level = level;
            }
        }

        if let Ok(val) = std::env::var("ZARR_SHUFFLE") {
            config.shuffle = val.to_lowercase() == "true" || val == "1";
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.time_chunk == 0 {
            return Err("time_chunk must be > 0".to_string());
        }

        if self.lat_chunk == 0 {
            return Err("lat_chunk must be > 0".to_string());
        }

        if self.lon_chunk == 0 {
            return Err("lon_chunk must be > 0".to_string());
        }

        if self.compression != ZarrCompression::None
            && (self.compression_level == 0 || self.compression_level > 9)
        {
            return Err("compression_level must be 1-9".to_string());
        }

        Ok(())
    }
}

/// Compression codec for the capacity-factor array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ZarrCompression {
    /// No compression.
    None,
    /// Blosc with LZ4.
    BloscLz4,
    /// Blosc with Zstd (recommended).
    #[default]
    BloscZstd,
}

impl ZarrCompression {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "none" => Self::None,
            "lz4" | "blosc_lz4" => Self::BloscLz4,
            _ => Self::BloscZstd,
        }
    }

    /// Get the codec name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::BloscLz4 => "blosc_lz4",
            Self::BloscZstd => "blosc_zstd",
        }
    }
}

impl std::fmt::Display for ZarrCompression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.time_chunk, 168);
        assert_eq!(config.lat_chunk, 180);
        assert_eq!(config.lon_chunk, 180);
        assert_eq!(config.compression, ZarrCompression::BloscZstd);
        assert_eq!(config.compression_level, 1);
        assert!(config.shuffle);
    }

    #[test]
    fn test_config_validation() {
        let mut config = StoreConfig::default();
        assert!(config.validate().is_ok());

        config.lat_chunk = 0;
        assert!(config.validate().is_err());

        config = StoreConfig::default();
        config.time_chunk = 0;
        assert!(config.validate().is_err());

        config = StoreConfig::default();
        config.compression_level = 10;
        assert!(config.validate().is_err());

        config.compression = ZarrCompression::None;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zarr_compression_from_str() {
        assert_eq!(ZarrCompression::from_str("none"), ZarrCompression::None);
        assert_eq!(ZarrCompression::from_str("lz4"), ZarrCompression::BloscLz4);
        assert_eq!(
            ZarrCompression::from_str("BLOSC_ZSTD"),
            ZarrCompression::BloscZstd
        );
        assert_eq!(
            ZarrCompression::from_str("invalid"),
            ZarrCompression::BloscZstd
        );
    }

    #[test]
    fn test_deserialize_partial_yaml() {
        let config: StoreConfig =
            serde_json::from_str(r#"{"lat_chunk": 4, "compression": "none"}"#).expect("parse");
        assert_eq!(config.lat_chunk, 4);
        assert_eq!(config.time_chunk, 168);
        assert_eq!(config.compression, ZarrCompression::None);
    }
}
