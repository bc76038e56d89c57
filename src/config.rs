use serde::Deserialize;

use crate::error::ConfigError;

/// Score at or below which a site is shown.
pub const DEFAULT_VISIBILITY_CUTOFF: f64 = 3.0;

/// Tunables passed by the host app. Missing keys fall back to defaults.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RankingConfig {
    pub visibility_cutoff: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            visibility_cutoff: DEFAULT_VISIBILITY_CUTOFF,
        }
    }
}

impl RankingConfig {
    /// Parse a JSON object; `null` and `{}` both yield the defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Option<RankingConfig> = serde_json::from_str(json)?;
        let config = config.unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.visibility_cutoff.is_finite() || self.visibility_cutoff <= 0.0 {
            return Err(ConfigError::InvalidCutoff(self.visibility_cutoff));
        }
        Ok(())
    }
}
