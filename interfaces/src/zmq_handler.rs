//! ZeroMQ Handler Implementation
//!
//! Manages the ZeroMQ sockets of the control plane: a subscriber for decoded
//! control messages and a publisher for per-TTI directives and status.

use crate::{InterfaceError, message_types::ControlMessage};
use common::utils::bytes_to_hex;
use serde::Serialize;
use tracing::{debug, info, warn};
use zmq::Context;

/// ZMQ socket types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketType {
    /// Subscriber, connects to the control message source
    Sub,
    /// Publisher, binds for downstream consumers
    Pub,
}

/// ZMQ handler configuration
#[derive(Debug, Clone)]
pub struct ZmqConfig {
    /// Socket type
    pub socket_type: SocketType,
    /// Address to connect (Sub) or bind (Pub)
    pub address: String,
    /// High water mark for queued messages
    pub hwm: i32,
    /// Receive timeout in milliseconds, -1 blocks forever
    pub recv_timeout_ms: i32,
}

/// ZMQ handler for control plane communication
pub struct ZmqHandler {
    config: ZmqConfig,
    context: Context,
    socket: Option<zmq::Socket>,
}

impl ZmqHandler {
    /// Create a new ZMQ handler
    pub fn new(config: ZmqConfig) -> Self {
        Self {
            config,
            context: Context::new(),
            socket: None,
        }
    }

    /// Create and connect or bind the socket
    pub fn initialize(&mut self) -> Result<(), InterfaceError> {
        info!("Initializing ZMQ handler");

        let socket = match self.config.socket_type {
            SocketType::Sub => {
                let sock = self.context.socket(zmq::SUB)?;
                sock.set_rcvhwm(self.config.hwm)?;
                sock.set_rcvtimeo(self.config.recv_timeout_ms)?;
                sock.connect(&self.config.address)?;
                sock.set_subscribe(b"")?;
                info!("ZMQ SUB socket connected to {}", self.config.address);
                sock
            }
            SocketType::Pub => {
                let sock = self.context.socket(zmq::PUB)?;
                sock.set_sndhwm(self.config.hwm)?;
                sock.bind(&self.config.address)?;
                info!("ZMQ PUB socket bound to {}", self.config.address);
                sock
            }
        };

        self.socket = Some(socket);
        info!("ZMQ handler initialized successfully");
        Ok(())
    }

    fn socket(&self, expected: SocketType) -> Result<&zmq::Socket, InterfaceError> {
        if self.config.socket_type != expected {
            return Err(InterfaceError::UnexpectedResponse(format!(
                "operation needs a {:?} socket, handler is {:?}",
                expected, self.config.socket_type
            )));
        }
        self.socket.as_ref().ok_or(InterfaceError::NotInitialized)
    }

    /// Receive the next control message.
    ///
    /// Returns `Ok(None)` when the receive timeout expires. Messages that do
    /// not parse are logged and skipped.
    pub fn receive_control(&self) -> Result<Option<ControlMessage>, InterfaceError> {
        let socket = self.socket(SocketType::Sub)?;

        let msg = match socket.recv_bytes(0) {
            Ok(msg) => msg,
            Err(zmq::Error::EAGAIN) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        debug!("Received {} bytes on control feed", msg.len());

        match ControlMessage::from_json(&msg) {
            Ok(control) => Ok(Some(control)),
            Err(e) => {
                warn!(
                    "Dropping malformed control message: {} (starts {})",
                    e,
                    bytes_to_hex(&msg[..msg.len().min(16)])
                );
                Ok(None)
            }
        }
    }

    /// Publish a JSON payload under a topic
    pub fn publish<T: Serialize>(&self, topic: &str, payload: &T) -> Result<(), InterfaceError> {
        let socket = self.socket(SocketType::Pub)?;

        let data = serde_json::to_vec(payload)?;
        socket.send_multipart([topic.as_bytes(), data.as_slice()], 0)?;
        debug!("Published {} bytes on topic {}", data.len(), topic);

        Ok(())
    }

    /// Shutdown the handler
    pub fn shutdown(&mut self) {
        info!("Shutting down ZMQ handler");
        self.socket = None;
    }
}
