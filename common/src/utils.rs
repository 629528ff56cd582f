//! Common Utilities
//!
//! Provides hex rendering and radio frame timing helpers

use std::fmt::Write;

/// Convert a byte slice to hex string for debugging
pub fn bytes_to_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render a byte slice as a contiguous lowercase hex string
pub fn to_hex_string(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for b in data {
        // Writing into a String cannot fail
        let _ = write!(out, "{:02x}", b);
    }
    out
}

/// Time utilities for subframe/frame calculations
pub mod time {
    /// Subframes (TTIs) per 10 ms radio frame
    pub const SUBFRAMES_PER_FRAME: u32 = 10;

    /// System frame numbers wrap at this value
    pub const MAX_SFN: u32 = 1024;

    /// TTI counter wraps at this value
    pub const MAX_TTI: u32 = MAX_SFN * SUBFRAMES_PER_FRAME;

    /// Absolute subframe index of subframe `sf` in frame `sfn`
    pub fn tti(sfn: u32, sf: u32) -> u32 {
        ((sfn % MAX_SFN) * SUBFRAMES_PER_FRAME + sf % SUBFRAMES_PER_FRAME) % MAX_TTI
    }

    /// Split a TTI into (system frame number, subframe in frame)
    pub fn split_tti(tti: u32) -> (u32, u32) {
        let tti = tti % MAX_TTI;
        (tti / SUBFRAMES_PER_FRAME, tti % SUBFRAMES_PER_FRAME)
    }

    /// The TTI following `tti`, wrapping with the SFN
    pub fn next_tti(tti: u32) -> u32 {
        (tti + 1) % MAX_TTI
    }
}
