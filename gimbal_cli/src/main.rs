//! # Gimbal Command Line Client
//!
//! Interactive client which issues commands directly to the gimbal exec over
//! its telecommand socket. Commands are entered one per line, for example:
//!
//! ```text
//! gimbal $ status
//! gimbal $ start
//! gimbal $ track 500 150
//! gimbal $ set pan 120
//! gimbal $ stop
//! ```

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use color_eyre::{eyre::WrapErr, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use structopt::StructOpt;

use comms_if::{
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
    tc::{GimbalCmd, GimbalResponse},
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

const PROMPT: &str = "gimbal $ ";
const HISTORY_PATH: &str = "gimbal_cli_history.txt";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Command line client for the gimbal exec
#[derive(StructOpt)]
#[structopt(name = "gimbal_cli")]
struct Args {
    /// Endpoint of the gimbal exec's telecommand socket
    #[structopt(short, long, default_value = "tcp://localhost:5030")]
    endpoint: String,
}

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    let args = Args::from_args();

    let ctx = zmq::Context::new();
    let mut socket = connect(&ctx, &args.endpoint).wrap_err("Could not create the socket")?;

    println!("Connecting to the gimbal exec at {}", args.endpoint);
    println!("Enter a command, \"help\" for the list, Ctrl-D to exit");

    let mut rl = DefaultEditor::new()?;
    let _ = rl.load_history(HISTORY_PATH);

    loop {
        match rl.readline(PROMPT) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                // Parse the line as a gimbal command
                let cmd = match GimbalCmd::from_iter_safe(
                    std::iter::once("gimbal").chain(line.split_whitespace()),
                ) {
                    Ok(cmd) => cmd,
                    Err(e) => {
                        // Also covers "help", which clap handles itself
                        println!("{}", e.message);
                        continue;
                    }
                };

                // Send it and print the response. A failed exchange leaves
                // the REQ socket in an unusable state, so rebuild it.
                match exchange(&socket, &cmd) {
                    Ok(response) => print_response(&response),
                    Err(e) => {
                        println!("Exchange failed: {}", e);
                        socket = connect(&ctx, &args.endpoint)
                            .wrap_err("Could not recreate the socket")?;
                    }
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                println!("Unhandled error: {:?}", e);
                break;
            }
        }
    }

    let _ = rl.save_history(HISTORY_PATH);

    Ok(())
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Connect a REQ socket to the gimbal exec.
fn connect(ctx: &zmq::Context, endpoint: &str) -> Result<MonitoredSocket, MonitoredSocketError> {
    let socket_options = SocketOptions {
        block_on_first_connect: false,
        connect_timeout: 1000,
        recv_timeout: 2000,
        send_timeout: 1000,
        linger: 1,
        ..Default::default()
    };

    MonitoredSocket::new(ctx, zmq::REQ, socket_options, endpoint)
}

/// Send a command and wait for the exec's response.
fn exchange(socket: &MonitoredSocket, cmd: &GimbalCmd) -> Result<GimbalResponse> {
    let cmd_str = serde_json::to_string(cmd).wrap_err("Could not serialize the command")?;

    socket
        .send(&cmd_str, 0)
        .map_err(|e| color_eyre::eyre::eyre!("Could not send the command: {}", e))?;

    let msg = socket
        .recv_string(0)
        .map_err(|e| color_eyre::eyre::eyre!("No response from the exec: {}", e))?
        .map_err(|_| color_eyre::eyre::eyre!("Non UTF-8 response from the exec"))?;

    serde_json::from_str(&msg).wrap_err("Could not deserialize the response")
}

fn print_response(response: &GimbalResponse) {
    match response {
        GimbalResponse::Angles { pan_deg, tilt_deg } => {
            println!("OK: pan {:.2} deg, tilt {:.2} deg", pan_deg, tilt_deg);
        }
        GimbalResponse::Status(status) => {
            println!(
                "Status: pan {:.2} deg, tilt {:.2} deg, tracking {:?}",
                status.pan_deg, status.tilt_deg, status.tracking_state
            );
        }
        GimbalResponse::Degraded {
            pan_deg,
            tilt_deg,
            error,
        } => {
            println!(
                "DEGRADED: pan {:.2} deg, tilt {:.2} deg (servo write failed: {})",
                pan_deg, tilt_deg, error
            );
        }
        GimbalResponse::Rejected { reason } => {
            println!("REJECTED: {}", reason);
        }
    }
}
