//! Common Types for the eMBMS receiver
//!
//! Defines the cell and service identity types used throughout the stack

use serde::{Deserialize, Serialize};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use thiserror::Error;

use crate::utils::to_hex_string;

/// Minimum number of resource blocks of an LTE carrier
pub const MIN_PRB: u8 = 6;

/// Maximum number of resource blocks of an LTE carrier
pub const MAX_PRB: u8 = 100;

/// Physical Cell Identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pci(pub u16);

impl Pci {
    /// Maximum valid LTE PCI value (0-503)
    pub const MAX: u16 = 503;

    /// Create a new PCI with validation
    pub fn new(value: u16) -> Option<Self> {
        if value <= Self::MAX {
            Some(Self(value))
        } else {
            None
        }
    }
}

/// Kind of carrier the receiver is camping on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CarrierMode {
    /// MBMS-dedicated carrier (FeMBMS, MIB-MBMS on CAS subframes only)
    Dedicated,
    /// Mixed MBMS/unicast carrier with a regular MIB
    Mixed,
}

impl CarrierMode {
    /// Number of radio frames represented by one unit of the PBCH frame offset
    pub fn frame_offset_scale(&self) -> i32 {
        match self {
            CarrierMode::Dedicated => 4,
            CarrierMode::Mixed => 1,
        }
    }

    /// Human readable name, as used in logs
    pub fn describe(&self) -> &'static str {
        match self {
            CarrierMode::Dedicated => "MBMS dedicated",
            CarrierMode::Mixed => "MBMS/Unicast mixed",
        }
    }
}

/// Cyclic prefix length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CyclicPrefix {
    Normal,
    Extended,
}

/// Duplex mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplexMode {
    /// Frequency Division Duplex
    Fdd,
    /// Time Division Duplex
    Tdd,
}

/// Downlink bandwidth as signalled in the MIB (3 bit index)
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, Serialize, Deserialize)]
pub enum DlBandwidth {
    N6 = 0,
    N15 = 1,
    N25 = 2,
    N50 = 3,
    N75 = 4,
    N100 = 5,
}

impl DlBandwidth {
    /// Decode the MIB bandwidth index; indices 6 and 7 are undefined
    pub fn from_index(index: u8) -> Option<Self> {
        Self::from_u8(index)
    }

    /// Number of resource blocks
    pub fn nof_prb(&self) -> u8 {
        match self {
            DlBandwidth::N6 => 6,
            DlBandwidth::N15 => 15,
            DlBandwidth::N25 => 25,
            DlBandwidth::N50 => 50,
            DlBandwidth::N75 => 75,
            DlBandwidth::N100 => 100,
        }
    }
}

/// Structural problems detected in a decoded cell
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CellValidationError {
    #[error("Invalid PCI: {0}")]
    InvalidPci(u16),

    #[error("Invalid number of ports: {0}")]
    InvalidPortCount(u8),

    #[error("Invalid number of PRB: {0}")]
    InvalidPrbCount(u8),

    #[error("Invalid number of MBSFN PRB: {0}")]
    InvalidMbsfnPrbCount(u8),
}

/// Physical layer description of the cell the receiver is camping on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellDescriptor {
    /// Physical cell ID
    pub pci: Pci,
    /// FDD or TDD
    pub duplex_mode: DuplexMode,
    /// Cyclic prefix length
    pub cyclic_prefix: CyclicPrefix,
    /// Unicast bandwidth in resource blocks
    pub nof_prb: u8,
    /// Number of cell specific antenna ports
    pub nof_ports: u8,
    /// Dedicated or mixed carrier
    pub carrier_mode: CarrierMode,
    /// Bandwidth of the PMCH in resource blocks
    pub mbsfn_prb: u8,
}

impl CellDescriptor {
    /// Check the decoded parameters for consistency
    pub fn validate(&self) -> Result<(), CellValidationError> {
        if Pci::new(self.pci.0).is_none() {
            return Err(CellValidationError::InvalidPci(self.pci.0));
        }
        if !matches!(self.nof_ports, 1 | 2 | 4) {
            return Err(CellValidationError::InvalidPortCount(self.nof_ports));
        }
        if !(MIN_PRB..=MAX_PRB).contains(&self.nof_prb) {
            return Err(CellValidationError::InvalidPrbCount(self.nof_prb));
        }
        if !(MIN_PRB..=MAX_PRB).contains(&self.mbsfn_prb) {
            return Err(CellValidationError::InvalidMbsfnPrbCount(self.mbsfn_prb));
        }
        Ok(())
    }

    /// Copy of this descriptor with a different PMCH bandwidth
    pub fn with_mbsfn_prb(&self, mbsfn_prb: u8) -> Self {
        Self {
            mbsfn_prb,
            ..self.clone()
        }
    }

    /// Bandwidth reported to consumers: the PMCH bandwidth if it differs
    /// from the unicast one
    pub fn reported_nof_prb(&self) -> u8 {
        if self.nof_prb == self.mbsfn_prb {
            self.nof_prb
        } else {
            self.mbsfn_prb
        }
    }
}

/// PLMN Identity (MCC + MNC)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPlmnId")]
pub struct PlmnId {
    /// Mobile Country Code
    pub mcc: [u8; 3],
    /// Mobile Network Code (2 or 3 digits)
    pub mnc: [u8; 3],
    /// MNC length (2 or 3)
    pub mnc_len: u8,
}

impl PlmnId {
    /// Create a new PLMN ID
    pub fn new(mcc: [u8; 3], mnc: [u8; 3], mnc_len: u8) -> Option<Self> {
        let digits_ok = mcc.iter().chain(mnc.iter()).all(|d| *d <= 9);
        if digits_ok && (mnc_len == 2 || mnc_len == 3) {
            Some(Self { mcc, mnc, mnc_len })
        } else {
            None
        }
    }

    /// Encode to the 3-byte format of TS 24.008 10.5.6.13
    pub fn encode(&self) -> [u8; 3] {
        let mut encoded = [0u8; 3];
        encoded[0] = (self.mcc[1] << 4) | self.mcc[0];
        encoded[1] = if self.mnc_len == 2 {
            0xF0 | self.mcc[2]
        } else {
            (self.mnc[2] << 4) | self.mcc[2]
        };
        encoded[2] = (self.mnc[1] << 4) | self.mnc[0];
        encoded
    }
}

/// Unchecked wire form of [`PlmnId`]
#[derive(Deserialize)]
struct RawPlmnId {
    mcc: [u8; 3],
    mnc: [u8; 3],
    mnc_len: u8,
}

impl TryFrom<RawPlmnId> for PlmnId {
    type Error = String;

    fn try_from(raw: RawPlmnId) -> Result<Self, Self::Error> {
        PlmnId::new(raw.mcc, raw.mnc, raw.mnc_len).ok_or_else(|| {
            format!("invalid PLMN identity: MCC {:?}, MNC {:?}, MNC length {}", raw.mcc, raw.mnc, raw.mnc_len)
        })
    }
}

/// Temporary Mobile Group Identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tmgi {
    /// MBMS service ID, most significant byte first
    pub service_id: [u8; 3],
    /// PLMN the service belongs to
    pub plmn: PlmnId,
}

impl Tmgi {
    /// Service ID followed by the encoded PLMN
    pub fn encode(&self) -> [u8; 6] {
        let plmn = self.plmn.encode();
        [
            self.service_id[0],
            self.service_id[1],
            self.service_id[2],
            plmn[0],
            plmn[1],
            plmn[2],
        ]
    }

    /// 12 character lowercase hex rendering
    pub fn to_hex(&self) -> String {
        to_hex_string(&self.encode())
    }
}
