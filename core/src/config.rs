use crate::MendError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default number of bytes read per MFT record while analyzing.
pub const DEFAULT_MAX_RECORD_PROBE: u32 = 64 * 1024;

/// Knobs for a repair engine. Every field has a default, so a partial JSON
/// document is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Read written ranges back and compare before counting a repair as fixed.
    pub verify_writes: bool,
    /// Dismount the volume right after locking it for repair.
    pub dismount_before_repair: bool,
    /// Upper bound on bytes read per MFT record during analysis. A corrupt
    /// record-size code can otherwise request gigabytes.
    pub max_record_probe: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            verify_writes: true,
            dismount_before_repair: false,
            max_record_probe: DEFAULT_MAX_RECORD_PROBE,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, MendError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, MendError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            MendError::Configuration(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), MendError> {
        // Must at least cover a record header.
        if self.max_record_probe < 48 {
            return Err(MendError::Configuration(format!(
                "max_record_probe must be at least 48 bytes, got {}",
                self.max_record_probe
            )));
        }
        Ok(())
    }
}
