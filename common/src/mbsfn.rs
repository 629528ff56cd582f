//! Decoded MBSFN Control Messages
//!
//! Already-decoded forms of SystemInformationBlockType13 and the
//! MBSFNAreaConfiguration carried on MCCH (3GPP TS 36.331). Enumerated
//! fields keep their ASN.1 names and expose their numeric meaning.

use serde::{Deserialize, Serialize};

use crate::types::Tmgi;

/// mcch-RepetitionPeriod (rf1..rf16 from Rel-16)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum McchRepetitionPeriod {
    Rf1,
    Rf2,
    Rf4,
    Rf8,
    Rf16,
    Rf32,
    Rf64,
    Rf128,
    Rf256,
}

impl McchRepetitionPeriod {
    /// Period in radio frames
    pub fn frames(&self) -> u32 {
        match self {
            McchRepetitionPeriod::Rf1 => 1,
            McchRepetitionPeriod::Rf2 => 2,
            McchRepetitionPeriod::Rf4 => 4,
            McchRepetitionPeriod::Rf8 => 8,
            McchRepetitionPeriod::Rf16 => 16,
            McchRepetitionPeriod::Rf32 => 32,
            McchRepetitionPeriod::Rf64 => 64,
            McchRepetitionPeriod::Rf128 => 128,
            McchRepetitionPeriod::Rf256 => 256,
        }
    }
}

/// signallingMCS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignallingMcs {
    N2,
    N7,
    N13,
    N19,
}

impl SignallingMcs {
    /// MCS index
    pub fn value(&self) -> u8 {
        match self {
            SignallingMcs::N2 => 2,
            SignallingMcs::N7 => 7,
            SignallingMcs::N13 => 13,
            SignallingMcs::N19 => 19,
        }
    }
}

/// non-MBSFNregionLength
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NonMbsfnRegionLength {
    S1,
    S2,
}

impl NonMbsfnRegionLength {
    /// Length in OFDM symbols
    pub fn symbols(&self) -> u8 {
        match self {
            NonMbsfnRegionLength::S1 => 1,
            NonMbsfnRegionLength::S2 => 2,
        }
    }
}

/// subcarrierSpacingMBMS (r14/r16)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MbsfnSubcarrierSpacing {
    Khz7dot5,
    Khz2dot5,
    Khz1dot25,
    Khz0dot37,
}

impl MbsfnSubcarrierSpacing {
    /// Subcarrier spacing in kHz
    pub fn khz(&self) -> f32 {
        match self {
            MbsfnSubcarrierSpacing::Khz7dot5 => 7.5,
            MbsfnSubcarrierSpacing::Khz2dot5 => 2.5,
            MbsfnSubcarrierSpacing::Khz1dot25 => 1.25,
            MbsfnSubcarrierSpacing::Khz0dot37 => 0.37,
        }
    }
}

/// sf-AllocInfo of the MCCH configuration.
///
/// The variant is the format flag: `Legacy` is the 6 bit string of the
/// Rel-9 MCCH-Config, `Extended` the 10 bit subframeAllocationInfo-r16.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format", content = "bits", rename_all = "lowercase")]
pub enum McchAllocation {
    Legacy(u8),
    Extended(u16),
}

/// mcch-Config of an MBSFN area
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McchConfig {
    /// mcch-RepetitionPeriod
    pub repetition_period: McchRepetitionPeriod,
    /// mcch-Offset in radio frames
    pub offset: u8,
    /// sf-AllocInfo
    pub allocation: McchAllocation,
    /// signallingMCS
    pub signalling_mcs: SignallingMcs,
}

/// MBSFN-AreaInfo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MbsfnAreaInfo {
    /// mbsfn-AreaId
    pub area_id: u8,
    /// non-MBSFNregionLength
    pub non_mbsfn_region_length: NonMbsfnRegionLength,
    /// notificationIndicator
    #[serde(default)]
    pub notification_indicator: u8,
    /// mcch-Config
    pub mcch: McchConfig,
    /// PMCH bandwidth in resource blocks, if signalled
    #[serde(default)]
    pub pmch_bandwidth: Option<u8>,
    /// MBSFN subcarrier spacing, absent means 15 kHz
    #[serde(default)]
    pub subcarrier_spacing: Option<MbsfnSubcarrierSpacing>,
}

/// SystemInformationBlockType13
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sib13 {
    /// mbsfn-AreaInfoList
    pub area_info_list: Vec<MbsfnAreaInfo>,
}

/// mch-SchedulingPeriod (rf1..rf4 from Rel-16)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MchSchedulingPeriod {
    Rf1,
    Rf2,
    Rf4,
    Rf8,
    Rf16,
    Rf32,
    Rf64,
    Rf128,
    Rf256,
    Rf512,
    Rf1024,
}

impl MchSchedulingPeriod {
    /// Period in radio frames
    pub fn frames(&self) -> u32 {
        match self {
            MchSchedulingPeriod::Rf1 => 1,
            MchSchedulingPeriod::Rf2 => 2,
            MchSchedulingPeriod::Rf4 => 4,
            MchSchedulingPeriod::Rf8 => 8,
            MchSchedulingPeriod::Rf16 => 16,
            MchSchedulingPeriod::Rf32 => 32,
            MchSchedulingPeriod::Rf64 => 64,
            MchSchedulingPeriod::Rf128 => 128,
            MchSchedulingPeriod::Rf256 => 256,
            MchSchedulingPeriod::Rf512 => 512,
            MchSchedulingPeriod::Rf1024 => 1024,
        }
    }
}

/// MBMS-SessionInfo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MbmsSessionInfo {
    /// tmgi
    pub tmgi: Tmgi,
    /// sessionId
    #[serde(default)]
    pub session_id: Option<u8>,
    /// logicalChannelIdentity
    pub lcid: u8,
}

/// PMCH-Info
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PmchInfo {
    /// sf-AllocEnd: last MBSFN subframe of the scheduling period used by this MCH
    pub sf_alloc_end: u16,
    /// dataMCS
    pub data_mcs: u8,
    /// mch-SchedulingPeriod
    pub scheduling_period: MchSchedulingPeriod,
    /// mbms-SessionInfoList
    #[serde(default)]
    pub sessions: Vec<MbmsSessionInfo>,
}

/// MBSFNAreaConfiguration received on MCCH
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McchMessage {
    /// pmch-InfoList, in declaration order
    pub pmch_info_list: Vec<PmchInfo>,
}
