//! Message Types for Toolkit and Control Plane Communication
//!
//! Defines the message formats used on the ZMQ sockets: a bincode
//! request/reply protocol with the PHY toolkit process, and JSON messages on
//! the control feed.

use crate::toolkit::{CellSearchHit, MibDecode, SampleBuffer, SearchParams, SubframeSamples};
use crate::InterfaceError;
use common::mbsfn::{McchMessage, Sib13};
use common::types::{CarrierMode, CellDescriptor};
use serde::{Deserialize, Serialize};

/// Topics used on the event publisher socket
pub mod topics {
    /// Per-TTI subframe directive
    pub const SUBFRAME: &str = "subframe";
    /// Periodic receiver status
    pub const STATUS: &str = "status";
    /// Channel and service metadata
    pub const MCH_INFO: &str = "mch_info";
}

/// Request sent to the PHY toolkit process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ToolkitRequest {
    /// Cell search with MIB decode for one carrier mode
    SearchCell { mode: CarrierMode, params: SearchParams },
    /// Discard partial search state
    ResetSearch,
    /// Apply a cell configuration
    Configure(CellDescriptor),
    /// Fetch the next synchronised subframe
    PullSubframe,
    /// Decode the PBCH of the subframe with the given timestamp
    DecodeMib { timestamp: u64, mode: CarrierMode },
}

/// Reply from the PHY toolkit process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ToolkitResponse {
    /// Result of a cell search
    CellSearch(Option<CellSearchHit>),
    /// Generic acknowledgement
    Ack,
    /// Next subframe, `None` if not locked
    Subframe(Option<SubframeSamples>),
    /// Result of a MIB decode
    Mib(Option<MibDecode>),
    /// The toolkit rejected the request
    Error(String),
}

impl ToolkitRequest {
    /// Build the MIB decode request for a pulled buffer
    pub fn decode_mib(buffer: &SampleBuffer, mode: CarrierMode) -> Self {
        ToolkitRequest::DecodeMib { timestamp: buffer.timestamp, mode }
    }

    /// Encode for the wire
    pub fn to_bytes(&self) -> Result<Vec<u8>, InterfaceError> {
        Ok(bincode::serialize(self)?)
    }
}

impl ToolkitResponse {
    /// Decode from the wire
    pub fn from_bytes(data: &[u8]) -> Result<Self, InterfaceError> {
        Ok(bincode::deserialize(data)?)
    }

    /// Encode for the wire
    pub fn to_bytes(&self) -> Result<Vec<u8>, InterfaceError> {
        Ok(bincode::serialize(self)?)
    }
}

/// Decoded higher-layer messages and commands arriving on the control feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "snake_case")]
pub enum ControlMessage {
    /// SIB13 decoded from a CAS subframe
    Sib13(Sib13),
    /// MBSFNAreaConfiguration decoded from MCCH
    Mcch(McchMessage),
    /// Destination label for the MTCH on (mch_index, lcid)
    Destination { mch_index: usize, lcid: u8, dest: String },
}

impl ControlMessage {
    /// Parse a JSON control message
    pub fn from_json(data: &[u8]) -> Result<Self, InterfaceError> {
        Ok(serde_json::from_slice(data)?)
    }
}
