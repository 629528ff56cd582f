//! ZMQ PHY Toolkit Client
//!
//! Drives a PHY/DSP toolkit running in a separate process over a ZMQ
//! REQ/REP socket. Requests and replies are bincode encoded because they
//! carry IQ samples.

use crate::message_types::{ToolkitRequest, ToolkitResponse};
use crate::toolkit::{CellSearchHit, MibDecode, PhyToolkit, SampleBuffer, SearchParams, SubframeSamples};
use crate::InterfaceError;
use common::types::{CarrierMode, CellDescriptor};
use tracing::{debug, info, warn};
use zmq::{Context, Socket};

/// Default toolkit endpoint
pub const DEFAULT_TOOLKIT_ADDRESS: &str = "tcp://localhost:5600";

/// ZMQ toolkit client configuration
#[derive(Debug, Clone)]
pub struct ZmqToolkitConfig {
    /// REP endpoint of the toolkit process
    pub address: String,
    /// Time to wait for a reply in milliseconds
    pub timeout_ms: i32,
}

impl Default for ZmqToolkitConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_TOOLKIT_ADDRESS.to_string(),
            timeout_ms: 1000,
        }
    }
}

/// PHY toolkit reached over ZMQ
pub struct ZmqToolkit {
    config: ZmqToolkitConfig,
    context: Context,
    socket: Option<Socket>,
}

impl ZmqToolkit {
    /// Create a new, unconnected client
    pub fn new(config: ZmqToolkitConfig) -> Self {
        Self::with_context(config, Context::new())
    }

    /// Create a client on an existing context, needed for `inproc://`
    /// endpoints
    pub fn with_context(config: ZmqToolkitConfig, context: Context) -> Self {
        Self {
            config,
            context,
            socket: None,
        }
    }

    /// Connect the REQ socket
    pub fn connect(&mut self) -> Result<(), InterfaceError> {
        info!("Connecting to PHY toolkit at {}", self.config.address);

        let socket = self.context.socket(zmq::REQ)?;
        socket.set_rcvtimeo(self.config.timeout_ms)?;
        socket.set_sndtimeo(self.config.timeout_ms)?;
        // Allow a new request after a reply timed out
        socket.set_req_relaxed(true)?;
        socket.set_req_correlate(true)?;
        socket.connect(&self.config.address)?;

        self.socket = Some(socket);
        info!("PHY toolkit client connected");
        Ok(())
    }

    fn request(&self, request: &ToolkitRequest) -> Result<ToolkitResponse, InterfaceError> {
        let socket = self.socket.as_ref().ok_or(InterfaceError::NotInitialized)?;

        socket.send(request.to_bytes()?, 0).map_err(timeout_or)?;
        let reply = socket.recv_bytes(0).map_err(timeout_or)?;
        debug!("Toolkit reply: {} bytes", reply.len());

        match ToolkitResponse::from_bytes(&reply)? {
            ToolkitResponse::Error(e) => Err(InterfaceError::ToolkitError(e)),
            response => Ok(response),
        }
    }
}

fn timeout_or(e: zmq::Error) -> InterfaceError {
    match e {
        zmq::Error::EAGAIN => InterfaceError::Timeout,
        e => InterfaceError::ZmqError(e),
    }
}

fn unexpected(response: ToolkitResponse) -> InterfaceError {
    InterfaceError::UnexpectedResponse(format!("{:?}", response))
}

impl PhyToolkit for ZmqToolkit {
    fn search_cell(
        &mut self,
        mode: CarrierMode,
        params: &SearchParams,
    ) -> Result<Option<CellSearchHit>, InterfaceError> {
        match self.request(&ToolkitRequest::SearchCell { mode, params: *params })? {
            ToolkitResponse::CellSearch(hit) => Ok(hit),
            other => Err(unexpected(other)),
        }
    }

    fn reset_search(&mut self) -> Result<(), InterfaceError> {
        match self.request(&ToolkitRequest::ResetSearch)? {
            ToolkitResponse::Ack => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    fn configure(&mut self, cell: &CellDescriptor) -> Result<(), InterfaceError> {
        match self.request(&ToolkitRequest::Configure(cell.clone()))? {
            ToolkitResponse::Ack => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    fn pull_subframe(&mut self) -> Result<Option<SubframeSamples>, InterfaceError> {
        match self.request(&ToolkitRequest::PullSubframe)? {
            ToolkitResponse::Subframe(samples) => Ok(samples),
            other => Err(unexpected(other)),
        }
    }

    fn decode_mib(&mut self, buffer: &SampleBuffer, mode: CarrierMode) -> Option<MibDecode> {
        match self.request(&ToolkitRequest::decode_mib(buffer, mode)) {
            Ok(ToolkitResponse::Mib(mib)) => mib,
            Ok(other) => {
                warn!("Unexpected reply to MIB decode: {:?}", other);
                None
            }
            Err(e) => {
                warn!("MIB decode request failed: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolkit::BCH_PAYLOAD_LEN;
    use std::thread;

    #[test]
    fn test_requests_before_connect() {
        let mut toolkit = ZmqToolkit::new(ZmqToolkitConfig::default());
        assert!(matches!(toolkit.reset_search(), Err(InterfaceError::NotInitialized)));
        assert!(toolkit.decode_mib(&SampleBuffer::new(1, 1), CarrierMode::Mixed).is_none());
    }

    #[test]
    fn test_request_reply_with_toolkit_process() {
        let address = "inproc://toolkit-test";
        let context = Context::new();
        let rep = context.socket(zmq::REP).unwrap();
        rep.bind(address).unwrap();

        let server = thread::spawn(move || {
            for _ in 0..3 {
                let request: ToolkitRequest = bincode::deserialize(&rep.recv_bytes(0).unwrap()).unwrap();
                let response = match request {
                    ToolkitRequest::ResetSearch => ToolkitResponse::Ack,
                    ToolkitRequest::DecodeMib { .. } => ToolkitResponse::Mib(Some(MibDecode {
                        payload: [0x12; BCH_PAYLOAD_LEN],
                        frame_offset: 1,
                    })),
                    _ => ToolkitResponse::Error("unsupported".to_string()),
                };
                rep.send(response.to_bytes().unwrap(), 0).unwrap();
            }
        });

        let mut toolkit = ZmqToolkit::with_context(
            ZmqToolkitConfig {
                address: address.to_string(),
                timeout_ms: 2000,
            },
            context.clone(),
        );
        toolkit.connect().unwrap();

        toolkit.reset_search().unwrap();
        let mib = toolkit.decode_mib(&SampleBuffer::new(1, 1), CarrierMode::Dedicated).unwrap();
        assert_eq!(mib.frame_offset, 1);
        assert!(matches!(toolkit.pull_subframe(), Err(InterfaceError::ToolkitError(_))));

        server.join().unwrap();
    }
}
