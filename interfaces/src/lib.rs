//! PHY Toolkit and ZMQ Communication Interfaces Library
//! 
//! This crate defines the contract with the external PHY/DSP toolkit and
//! provides ZeroMQ-based adapters for the toolkit, the control message feed
//! and the event publisher.

pub mod message_types;
pub mod toolkit;
pub mod zmq_handler;
pub mod zmq_toolkit;

pub use toolkit::{CellSearchHit, MibDecode, PhyToolkit, SampleBuffer, SearchParams, SubframeSamples};

use thiserror::Error;

/// Interface errors
#[derive(Error, Debug)]
pub enum InterfaceError {
    #[error("ZMQ error: {0}")]
    ZmqError(#[from] zmq::Error),
    
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Binary encoding error: {0}")]
    EncodingError(#[from] bincode::Error),
    
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Toolkit error: {0}")]
    ToolkitError(String),
    
    #[error("Interface not initialized")]
    NotInitialized,
    
    #[error("Timed out waiting for peer")]
    Timeout,
}
