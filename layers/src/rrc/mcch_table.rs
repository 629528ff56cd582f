//! MCCH Subframe Allocation Table
//!
//! Expands the sf-AllocInfo bit string of an MCCH configuration into the
//! per-subframe eligibility table of a radio frame (3GPP TS 36.331 6.3.7).

use common::mbsfn::McchAllocation;
use common::utils::time::SUBFRAMES_PER_FRAME;
use std::fmt;

/// Subframes addressed by the 6 bit legacy allocation, MSB first
const LEGACY_SUBFRAMES: [usize; 6] = [1, 2, 3, 6, 7, 8];

/// Which subframes of a radio frame may carry MCCH
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct McchTable([bool; SUBFRAMES_PER_FRAME as usize]);

impl McchTable {
    /// Expand an allocation bit string
    pub fn from_allocation(allocation: McchAllocation) -> Self {
        match allocation {
            McchAllocation::Legacy(bits) => Self::from_legacy(bits),
            McchAllocation::Extended(bits) => Self::from_extended(bits),
        }
    }

    /// 6 bit sf-AllocInfo: bit 5 is subframe 1, then 2, 3, 6, 7 and 8
    pub fn from_legacy(bits: u8) -> Self {
        let mut table = [false; SUBFRAMES_PER_FRAME as usize];
        for (i, &sf) in LEGACY_SUBFRAMES.iter().enumerate() {
            table[sf] = bits & (1 << (5 - i)) != 0;
        }
        Self(table)
    }

    /// 10 bit subframeAllocationInfo-r16: bit 9 is subframe 1 up to bit 1 for
    /// subframe 9, bit 0 is not used
    pub fn from_extended(bits: u16) -> Self {
        let mut table = [false; SUBFRAMES_PER_FRAME as usize];
        for (sf, entry) in table.iter_mut().enumerate().skip(1) {
            *entry = bits & (1 << (10 - sf)) != 0;
        }
        Self(table)
    }

    /// Table from explicit entries
    pub fn from_entries(entries: [bool; SUBFRAMES_PER_FRAME as usize]) -> Self {
        Self(entries)
    }

    /// Whether subframe `sf` (0-9) is marked
    pub fn contains(&self, sf: u32) -> bool {
        self.0.get(sf as usize).copied().unwrap_or(false)
    }

    /// The raw table
    pub fn entries(&self) -> &[bool; SUBFRAMES_PER_FRAME as usize] {
        &self.0
    }
}

impl fmt::Display for McchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "|")?;
        for entry in self.0 {
            write!(f, "{}|", u8::from(entry))?;
        }
        Ok(())
    }
}
