//! Shield adapter for targets without an OS shielding API

use async_trait::async_trait;
use timeguard_core::ShieldControl;
use timeguard_domain::{BlockDirective, Result, TimeguardError};

/// Reports `CapabilityUnavailable` for every shield update.
///
/// Selected for the `shield` profile on targets whose OS has no declarative
/// blocking API, so the coordinator degrades to tracking only.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedShieldControl;

#[async_trait]
impl ShieldControl for UnsupportedShieldControl {
    async fn replace_shield(&self, directives: &[BlockDirective]) -> Result<()> {
        Err(TimeguardError::CapabilityUnavailable(format!(
            "no shield API on {} ({} directives not applied)",
            std::env::consts::OS,
            directives.len()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_update_is_unavailable() {
        let err = UnsupportedShieldControl.replace_shield(&[]).await.unwrap_err();
        assert!(matches!(err, TimeguardError::CapabilityUnavailable(_)));
    }
}
