//! External PHY Toolkit Contract
//!
//! The receiver core never touches samples itself: cell search, PSS/SSS
//! synchronisation, sample acquisition and PBCH decoding are delegated to a
//! toolkit implementing [`PhyToolkit`].

use crate::InterfaceError;
use common::types::{CarrierMode, CellDescriptor, CyclicPrefix, DuplexMode};
use num_complex::Complex32;
use serde::{Deserialize, Serialize};

/// Length of the BCH transport block payload in bytes (24 bits)
pub const BCH_PAYLOAD_LEN: usize = 3;

/// Parameters for a cell search attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    /// Bandwidth assumed while searching, in resource blocks
    pub nof_prb: u8,
    /// Number of receive channels
    pub rx_channels: u8,
    /// Also look for extended cyclic prefix cells
    pub extended_cp: bool,
}

/// Result of a successful PBCH decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MibDecode {
    /// Raw 24 bit BCH payload, MSB first
    pub payload: [u8; BCH_PAYLOAD_LEN],
    /// Position of the decoded block within the PBCH repetition window
    pub frame_offset: i32,
}

/// A cell found by PSS/SSS correlation whose MIB could be decoded
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellSearchHit {
    /// Physical cell ID from PSS/SSS
    pub pci: u16,
    /// Detected cyclic prefix
    pub cyclic_prefix: CyclicPrefix,
    /// Detected frame type
    pub duplex_mode: DuplexMode,
    /// Number of antenna ports found from the PBCH CRC mask
    pub nof_ports: u8,
    /// Carrier frequency offset in Hz
    pub frequency_offset_hz: f32,
    /// Decoded BCH
    pub mib: MibDecode,
}

/// Complex baseband samples of one subframe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleBuffer {
    /// One sample vector per receive channel
    pub channels: Vec<Vec<Complex32>>,
    /// Timestamp of the first sample, in samples
    pub timestamp: u64,
}

impl SampleBuffer {
    /// Create a zeroed buffer
    pub fn new(num_channels: usize, size: usize) -> Self {
        Self {
            channels: vec![vec![Complex32::new(0.0, 0.0); size]; num_channels],
            timestamp: 0,
        }
    }

    /// Number of samples per channel
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, |c| c.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A synchronised subframe delivered by the toolkit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubframeSamples {
    /// Subframe index within the radio frame, as located by the synchroniser
    pub subframe_index: u8,
    /// Samples of the subframe
    pub buffer: SampleBuffer,
}

/// Operations the receiver core requires from the PHY/DSP toolkit
pub trait PhyToolkit: Send {
    /// Run PSS/SSS detection and decode the MIB variant of `mode`
    fn search_cell(
        &mut self,
        mode: CarrierMode,
        params: &SearchParams,
    ) -> Result<Option<CellSearchHit>, InterfaceError>;

    /// Drop any partial search state before another attempt
    fn reset_search(&mut self) -> Result<(), InterfaceError>;

    /// Apply a cell to the synchroniser and the MIB decoder
    fn configure(&mut self, cell: &CellDescriptor) -> Result<(), InterfaceError>;

    /// Receive the next subframe; `None` while the synchroniser has no lock
    fn pull_subframe(&mut self) -> Result<Option<SubframeSamples>, InterfaceError>;

    /// Decode the PBCH in a subframe 0
    fn decode_mib(&mut self, buffer: &SampleBuffer, mode: CarrierMode) -> Option<MibDecode>;
}

impl<T: PhyToolkit + ?Sized> PhyToolkit for Box<T> {
    fn search_cell(
        &mut self,
        mode: CarrierMode,
        params: &SearchParams,
    ) -> Result<Option<CellSearchHit>, InterfaceError> {
        (**self).search_cell(mode, params)
    }

    fn reset_search(&mut self) -> Result<(), InterfaceError> {
        (**self).reset_search()
    }

    fn configure(&mut self, cell: &CellDescriptor) -> Result<(), InterfaceError> {
        (**self).configure(cell)
    }

    fn pull_subframe(&mut self) -> Result<Option<SubframeSamples>, InterfaceError> {
        (**self).pull_subframe()
    }

    fn decode_mib(&mut self, buffer: &SampleBuffer, mode: CarrierMode) -> Option<MibDecode> {
        (**self).decode_mib(buffer, mode)
    }
}
