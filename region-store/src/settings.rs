/*!
Tuning knobs for a deletion scan
*/

use serde::{Deserialize, Serialize};

use crate::{error::SettingsError, region::CHUNKS_PER_REGION};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Maximum chunk checks per poll
    pub chunks_per_check: usize,
    /// Also delete chunks that were generated but never visited
    pub generate_only_enabled: bool,
    /// Cooldown between the end of one cycle and the start of the next
    pub cycle_delay_ms: i64,
}

impl ScanSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.chunks_per_check == 0 {
            return Err(SettingsError::InvalidChunksPerCheck(self.chunks_per_check));
        }
        if self.cycle_delay_ms < 0 {
            return Err(SettingsError::NegativeCycleDelay(self.cycle_delay_ms));
        }
        Ok(())
    }

    /// At or below one region per poll, region completion gets a poll to
    /// itself and never shares it with chunk checks.
    pub fn isolates_region_completion(&self) -> bool {
        self.chunks_per_check <= CHUNKS_PER_REGION
    }
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            chunks_per_check: 256,
            generate_only_enabled: false,
            cycle_delay_ms: 6 * 60 * 60 * 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert_eq!(ScanSettings::default().validate(), Ok(()));
    }

    #[test]
    fn test_rejects_zero_budget() {
        let settings = ScanSettings {
            chunks_per_check: 0,
            ..ScanSettings::default()
        };
        assert_eq!(
            settings.validate(),
            Err(SettingsError::InvalidChunksPerCheck(0))
        );
    }

    #[test]
    fn test_isolation_threshold() {
        let mut settings = ScanSettings {
            chunks_per_check: 1024,
            ..ScanSettings::default()
        };
        assert!(settings.isolates_region_completion());
        settings.chunks_per_check = 1025;
        assert!(!settings.isolates_region_completion());
    }
}
