//! Run configuration
//!
//! Configuration is read from TOML. Every table and field has a default, so a file only
//! needs to name what differs:
//!
//! ```toml
//! [coefficients]
//! path = "DATA/transport.bin"
//! byte_order = "little"
//!
//! [kernel]
//! form = "weights"
//! parallel = true
//! ```

use crate::coefficient_file::{BinaryFileSource, ByteOrder};
use crate::errors::{RSCTMError, RSCTMResult};
use crate::kernel::KernelOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Location and encoding of the monthly coefficient file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoefficientFileConfig {
    /// Flat binary file with twelve monthly blocks
    /// default: none
    pub path: Option<PathBuf>,

    /// Byte order of the stored values
    /// default: little
    pub byte_order: ByteOrder,
}

impl CoefficientFileConfig {
    /// File source described by this configuration
    pub fn source(&self) -> RSCTMResult<BinaryFileSource> {
        let path = self.path.as_ref().ok_or_else(|| {
            RSCTMError::InvalidConfig("coefficients.path is not set".to_string())
        })?;
        Ok(BinaryFileSource::new(path.clone()).with_byte_order(self.byte_order))
    }
}

/// Complete transport configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub coefficients: CoefficientFileConfig,
    pub kernel: KernelOptions,
}

impl TransportConfig {
    pub fn from_toml_str(content: &str) -> RSCTMResult<Self> {
        toml::from_str(content).map_err(|e| RSCTMError::InvalidConfig(e.to_string()))
    }

    /// Read a TOML file
    ///
    /// A relative coefficient path is resolved against the directory of the file.
    pub fn from_file(path: &Path) -> RSCTMResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        if let (Some(coefficients), Some(parent)) =
            (config.coefficients.path.as_mut(), path.parent())
        {
            if coefficients.is_relative() {
                *coefficients = parent.join(&*coefficients);
            }
        }
        Ok(config)
    }

    pub fn to_toml_string(&self) -> RSCTMResult<String> {
        toml::to_string(self).map_err(|e| RSCTMError::InvalidConfig(e.to_string()))
    }
}
