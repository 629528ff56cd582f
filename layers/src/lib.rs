//! eMBMS Receiver Control Plane Library
//! 
//! This crate implements cell acquisition, MBSFN configuration ingestion and
//! per-subframe scheduling decisions for an LTE eMBMS receiver
//! (3GPP TS 36.211 / 36.331).

pub mod phy;
pub mod mac;
pub mod rrc;
pub mod status;

use interfaces::InterfaceError;
use thiserror::Error;

/// Errors reported by the receiver control plane
#[derive(Error, Debug)]
pub enum LayerError {
    #[error("Cell acquisition failed: {0}")]
    AcquisitionFailure(String),
    
    #[error("Toolkit rejected configuration: {0}")]
    ToolkitConfigFailure(String),
    
    #[error("Decode failed: {0}")]
    DecodeFailure(String),
    
    #[error("Inconsistent configuration: {0}")]
    ConfigInconsistency(String),
    
    #[error("{what} index {index} out of range (have {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },
    
    #[error("Invalid state: {0}")]
    InvalidState(String),
    
    #[error("Sample source error: {0}")]
    SampleSource(#[from] InterfaceError),
}

impl LayerError {
    /// Whether the error is expected during normal operation and simply
    /// means "try again at the next opportunity"
    pub fn is_recoverable(&self) -> bool {
        matches!(self, LayerError::DecodeFailure(_) | LayerError::ConfigInconsistency(_))
    }
}
