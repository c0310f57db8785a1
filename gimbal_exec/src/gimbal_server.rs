//! # Gimbal Server Module
//!
//! This module abstracts over the networking side of the gimbal executable. The server accepts
//! connections from the operator client, allowing gimbal commands to be recieved and command
//! responses to be sent back.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
    tc::{GimbalCmd, GimbalResponse},
};
use log::warn;

use crate::params::GimbalExecParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// An abstraction over the networking part of the gimbal executable.
///
/// The server accepts connections from the operator client, allowing commands to be recieved and
/// responses to be sent back.
pub struct GimbalServer {
    /// REP socket which accepts commands from the client
    cmd_socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors which can occur in the [`GimbalServer`]
#[derive(thiserror::Error, Debug)]
pub enum GimbalServerError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not send data to the client: {0}")]
    SendError(zmq::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl GimbalServer {
    /// Create a new instance of the gimbal server.
    ///
    /// This function will not wait for a connection from the client before returning.
    pub fn new(params: &GimbalExecParams) -> Result<Self, GimbalServerError> {
        // Create the zmq context
        let ctx = zmq::Context::new();

        // Create the socket options. The recv timeout is short so that polling for commands
        // doesn't stall the control cycle.
        let cmd_socket_options = SocketOptions {
            bind: true,
            block_on_first_connect: false,
            recv_timeout: 10,
            send_timeout: 10,
            ..Default::default()
        };

        // Create the socket
        let cmd_socket = MonitoredSocket::new(&ctx, zmq::REP, cmd_socket_options, &params.tc_endpoint)?;

        Ok(Self { cmd_socket })
    }

    /// Retrieve a command from the client.
    ///
    /// If `Some` is returned the user MUST call [`GimbalServer::send_response`] before the next
    /// call to this function, since the underlying socket only accepts a new request once the
    /// previous one has been replied to.
    ///
    /// `None` is returned if no command arrived within the timeout. Messages which cannot be
    /// deserialized are rejected here, with the rejection sent back to the client, so that the
    /// socket never gets stuck awaiting a reply.
    pub fn get_command(&mut self) -> Option<GimbalCmd> {
        // Read from the socket
        let msg = match self.cmd_socket.recv_msg(0) {
            Ok(m) => m,
            Err(_) => return None,
        };

        match serde_json::from_str(msg.as_str().unwrap_or("")) {
            Ok(cmd) => Some(cmd),
            Err(e) => {
                warn!("Could not deserialize command: {}", e);

                // Reply so the socket is free for the next request
                let rejection = GimbalResponse::Rejected {
                    reason: format!("Could not deserialize command: {}", e),
                };
                if let Err(e) = self.send_response(&rejection) {
                    warn!("Could not send rejection to the client: {}", e);
                }

                None
            }
        }
    }

    /// Send a response to the client based on the recieved command.
    pub fn send_response(&mut self, response: &GimbalResponse) -> Result<(), GimbalServerError> {
        // Serialize response
        let resp_str = serde_json::to_string(response)
            .expect("Response serialization failed. This should not happen");

        // Send response
        match self.cmd_socket.send(&resp_str, 0) {
            Ok(_) => Ok(()),
            Err(e) => Err(GimbalServerError::SendError(e)),
        }
    }
}

impl From<MonitoredSocketError> for GimbalServerError {
    fn from(e: MonitoredSocketError) -> Self {
        GimbalServerError::SocketError(e)
    }
}
