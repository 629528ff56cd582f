//! Physical Layer (PHY) Control
//!
//! Cell acquisition and frame timing for an LTE eMBMS receiver
//! (3GPP TS 36.211 / 36.331). Sample processing itself is delegated to an
//! external [`interfaces::toolkit::PhyToolkit`].

pub mod acquisition;
pub mod mib;
pub mod subframe;

// Re-export commonly used types
pub use acquisition::{AcquisitionState, CellAcquisition, TtiDecision};
pub use mib::{decode_sfn, derive_sfn, unpack_mib, MibFields, MibInfo};
pub use subframe::{classify, is_cas_subframe, is_mbsfn_subframe, SubframeKind};

use interfaces::toolkit::SearchParams;
use serde::{Deserialize, Serialize};

/// Cell acquisition configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Bandwidth assumed during cell search, in resource blocks
    pub search_nof_prb: u8,
    /// Replaces the bandwidth decoded from MIB-MBMS on a dedicated carrier
    pub override_nof_prb: Option<u8>,
    /// Number of receive channels
    pub rx_channels: u8,
    /// Also search for extended cyclic prefix cells
    pub search_extended_cp: bool,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            search_nof_prb: 25,
            override_nof_prb: None,
            rx_channels: 1,
            search_extended_cp: true,
        }
    }
}

impl AcquisitionConfig {
    /// Parameters handed to the toolkit for a search attempt
    pub fn search_params(&self) -> SearchParams {
        SearchParams {
            nof_prb: self.search_nof_prb,
            rx_channels: self.rx_channels,
            extended_cp: self.search_extended_cp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AcquisitionConfig::default();
        assert_eq!(config.search_nof_prb, 25);
        assert_eq!(config.override_nof_prb, None);

        let params = config.search_params();
        assert_eq!(params.rx_channels, 1);
        assert!(params.extended_cp);
    }

    #[test]
    fn test_partial_config() {
        let config: AcquisitionConfig = serde_json::from_str(r#"{"override_nof_prb": 50}"#).unwrap();
        assert_eq!(config.override_nof_prb, Some(50));
        assert_eq!(config.search_nof_prb, 25);
    }
}
