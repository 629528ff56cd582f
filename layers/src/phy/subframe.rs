//! Subframe Classification
//!
//! Maps an absolute subframe index to its role on the carrier: CAS
//! (cell acquisition subframe carrying unicast control), MBSFN, or
//! reserved for unicast. Pure function of the TTI and the carrier mode.

use common::types::CarrierMode;
use serde::Serialize;

/// Role of a subframe on the carrier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubframeKind {
    /// Cell acquisition subframe (PSS/SSS/PBCH/PDCCH/PDSCH)
    Cas,
    /// Eligible to carry PMCH
    Mbsfn,
    /// Neither, left to unicast traffic
    Unicast,
}

/// Whether `tti` is a CAS subframe
pub fn is_cas_subframe(tti: u32, mode: CarrierMode) -> bool {
    match mode {
        // Subframe 0 in a radio frame divisible by 4
        CarrierMode::Dedicated => tti % 40 == 0,
        CarrierMode::Mixed => matches!(tti % 10, 0 | 4 | 5 | 9),
    }
}

/// Whether `tti` may carry PMCH
pub fn is_mbsfn_subframe(tti: u32, mode: CarrierMode) -> bool {
    match mode {
        CarrierMode::Dedicated => !is_cas_subframe(tti, mode),
        CarrierMode::Mixed => {
            !is_cas_subframe(tti, mode) && matches!(tti % 10, 1 | 2 | 3 | 6 | 7 | 8)
        }
    }
}

/// Classify a subframe
pub fn classify(tti: u32, mode: CarrierMode) -> SubframeKind {
    if is_cas_subframe(tti, mode) {
        SubframeKind::Cas
    } else if is_mbsfn_subframe(tti, mode) {
        SubframeKind::Mbsfn
    } else {
        SubframeKind::Unicast
    }
}
