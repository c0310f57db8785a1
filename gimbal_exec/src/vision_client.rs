//! # Vision Client
//!
//! The vision client subscribes to object detections published by the vision pipeline. The
//! pipeline publishes one [`Detection`] per processed camera frame, whether or not an object was
//! found in that frame.
//!
//! The client is polled once per control cycle. If the pipeline outpaces the control cycle only
//! the most recent detection is kept, so the controller always acts on the freshest data.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    eqpt::vision::Detection,
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
};
use log::warn;

use crate::params::GimbalExecParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Client for the vision pipeline's detection stream.
pub struct VisionClient {
    /// SUB socket which recieves detections from the pipeline
    detection_socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors which can occur in the [`VisionClient`]
#[derive(thiserror::Error, Debug)]
pub enum VisionClientError {
    #[error("Socket error: {0}")]
    SocketError(#[from] MonitoredSocketError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl VisionClient {
    /// Create a new instance of the vision client.
    ///
    /// This function will not wait for the pipeline to connect before returning.
    pub fn new(ctx: &zmq::Context, params: &GimbalExecParams) -> Result<Self, VisionClientError> {
        // Create the socket options. The recv timeout is zero so draining the socket never
        // blocks the control cycle.
        let socket_options = SocketOptions {
            block_on_first_connect: false,
            subscribe: Some(vec![]),
            recv_timeout: 0,
            ..Default::default()
        };

        // Connect the socket
        let detection_socket = MonitoredSocket::new(
            ctx,
            zmq::SUB,
            socket_options,
            &params.detection_endpoint,
        )?;

        Ok(Self { detection_socket })
    }

    /// Get the most recent detection published since the last call.
    ///
    /// `None` is returned if the pipeline hasn't published anything new, which is distinct from a
    /// detection in which no object was found.
    pub fn get_latest_detection(&mut self) -> Option<Detection> {
        let mut latest = None;

        // Drain everything queued on the socket, keeping the last valid detection
        loop {
            let msg = match self.detection_socket.recv_string(0) {
                Ok(Ok(s)) => s,
                Ok(Err(_)) => {
                    warn!("Non UTF-8 message from the vision pipeline");
                    continue;
                }
                Err(zmq::Error::EAGAIN) => break,
                Err(e) => {
                    warn!("Error recieving from the vision pipeline: {:?}", e);
                    break;
                }
            };

            match serde_json::from_str(&msg) {
                Ok(d) => latest = Some(d),
                Err(e) => warn!("Could not deserialize detection: {}", e),
            }
        }

        latest
    }
}
