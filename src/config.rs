// src/config.rs
//! Node builder settings, readable from JSON.

use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::bsp::BuildError;

pub const DEFAULT_SPLIT_COST_FACTOR: u32 = 7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BspConfig {
    /// Scales the split and near-miss penalties of the partition cost.
    /// Higher values favour fewer splits over balance.
    pub split_cost_factor: u32,
}

impl Default for BspConfig {
    fn default() -> Self {
        BspConfig { split_cost_factor: DEFAULT_SPLIT_COST_FACTOR }
    }
}

impl BspConfig {
    pub fn with_split_cost_factor(split_cost_factor: u32) -> Self {
        BspConfig { split_cost_factor }
    }

    pub fn from_json(text: &str) -> Result<Self, BuildError> {
        let config: BspConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, BuildError> {
        let text = fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&text)?;
        info!("Loaded build configuration from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), BuildError> {
        if self.split_cost_factor == 0 {
            return Err(BuildError::InvalidConfig("split_cost_factor must be at least 1".into()));
        }
        Ok(())
    }
}
