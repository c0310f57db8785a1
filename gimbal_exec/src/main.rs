//! # Gimbal Control Executable
//!
//! This executable is responsible for pointing the camera gimbal of the rover:
//! - Closed-loop tracking of object detections published by the vision exec
//! - Manual pan/tilt angle demands from the operator
//! - Driving the pan and tilt servos through the PCA9685 board

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Conversion of pixel positions into normalised tracking errors.
mod error_calc;

/// The gimbal angle controller.
mod gimbal_ctrl;

/// Gimbal server abstraction.
mod gimbal_server;

/// Parameters for the gimbal executable.
mod params;

/// Driver used to control servos.
mod servo_ctrl;

/// The tracking session state machine.
mod track_session;

/// Client for the vision exec's detection stream.
mod vision_client;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Result,
};
use comms_if::{
    net::zmq,
    tc::{GimbalCmd, GimbalResponse, GimbalStatus},
};
use log::{info, trace, warn};
use std::thread;
use std::time::{Duration, Instant};

// Internal
use error_calc::normalised_error;
use gimbal_ctrl::{GimbalCtrl, GimbalCtrlCmd};
use gimbal_server::GimbalServer;
use params::GimbalExecParams;
use servo_ctrl::{sim::SimServo, ServoCtrl, ServoDriver};
use track_session::{DetectionOutcome, TrackSession};
use util::{
    archive::Archived,
    logger::{logger_init, LevelFilter},
    module::State,
    session::Session,
};

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("gimbal_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Trace, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Gimbal Control Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    info!("Initialising...");

    // ---- LOAD PARAMETERS ----

    let params: GimbalExecParams = util::params::load("gimbal_exec.toml")?;

    info!("Parameters loaded");

    // ---- MODULE INITIALISATION ----

    let mut servo_ctrl = init_servo_ctrl(&params)?;

    let mut gimbal_ctrl = GimbalCtrl::default();
    gimbal_ctrl
        .init("gimbal_ctrl.toml", &session)
        .wrap_err("Failed to initialise GimbalCtrl")?;

    let mut track_session = TrackSession::default();
    track_session
        .init("track_session.toml", &session)
        .wrap_err("Failed to initialise TrackSession")?;

    info!("Modules initialised");

    // ---- NETWORK INITIALISATION ----

    let zmq_ctx = zmq::Context::new();

    let mut server = GimbalServer::new(&params).wrap_err("Failed to initialise the server")?;

    let mut vision = vision_client::VisionClient::new(&zmq_ctx, &params)
        .wrap_err("Failed to initialise the vision client")?;

    info!("Network initialised");

    // ---- HOME THE GIMBAL ----

    // The controller state starts at the home angles, but the physical servos
    // are at whatever angle they were left at, so an explicit write is needed
    // to bring them into agreement.
    let home = gimbal_ctrl.current();
    servo_ctrl
        .set_axis_angle(comms_if::eqpt::gimbal::GimbalAxis::Pan, home.pan_deg)
        .wrap_err("Failed to home the pan servo")?;
    servo_ctrl
        .set_axis_angle(comms_if::eqpt::gimbal::GimbalAxis::Tilt, home.tilt_deg)
        .wrap_err("Failed to home the tilt servo")?;

    info!(
        "Gimbal homed to pan {:.1} deg, tilt {:.1} deg",
        home.pan_deg, home.tilt_deg
    );

    // ---- MAIN LOOP ----

    info!("Initialisation complete, entering main loop");

    loop {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // ---- TELECOMMAND PROCESSING ----
        //
        // Telecommands are processed before the detection update, so a stop
        // command received on this cycle takes effect before any detection
        // arriving on the same cycle can move the gimbal.

        let mut tc_cmd: Option<GimbalCtrlCmd> = None;
        let mut reply_after_actuation = false;

        if let Some(cmd) = server.get_command() {
            trace!("Recieved command: {:?}", cmd);

            match cmd {
                GimbalCmd::Track { x_px, y_px } => {
                    match normalised_error(&params.camera_frame, [x_px, y_px]) {
                        Ok(error) => {
                            tc_cmd = Some(GimbalCtrlCmd::Track { error });
                            reply_after_actuation = true;
                        }
                        Err(e) => {
                            send_response(
                                &mut server,
                                &GimbalResponse::Rejected {
                                    reason: e.to_string(),
                                },
                            );
                        }
                    }
                }
                GimbalCmd::SetAngle { axis, angle_deg } => {
                    if angle_deg.is_finite() {
                        tc_cmd = Some(GimbalCtrlCmd::SetAngle { axis, angle_deg });
                        reply_after_actuation = true;
                    } else {
                        send_response(
                            &mut server,
                            &GimbalResponse::Rejected {
                                reason: format!("Demanded angle {} is not finite", angle_deg),
                            },
                        );
                    }
                }
                GimbalCmd::StartTracking => {
                    track_session.start();
                    let state = gimbal_ctrl.current();
                    send_response(
                        &mut server,
                        &GimbalResponse::Angles {
                            pan_deg: state.pan_deg,
                            tilt_deg: state.tilt_deg,
                        },
                    );
                }
                GimbalCmd::StopTracking => {
                    // A stop homes the gimbal, so the response waits for the
                    // actuation like any other motion command
                    tc_cmd = Some(track_session.stop());
                    reply_after_actuation = true;
                }
                GimbalCmd::Status => {
                    let state = gimbal_ctrl.current();
                    send_response(
                        &mut server,
                        &GimbalResponse::Status(GimbalStatus {
                            pan_deg: state.pan_deg,
                            tilt_deg: state.tilt_deg,
                            tracking_state: track_session.tracking_state(),
                        }),
                    );
                }
            }
        }

        // ---- DETECTION PROCESSING ----

        let detection = vision.get_latest_detection().map(|det| match det.pos_px {
            Some(pos) => match normalised_error(&det.frame, pos) {
                Ok(error) => DetectionOutcome::Object(error),
                Err(e) => {
                    // A malformed detection must not freeze the session, so
                    // it counts the same as a frame with no object
                    warn!("Discarding invalid detection: {}", e);
                    DetectionOutcome::NoObject
                }
            },
            None => DetectionOutcome::NoObject,
        });

        let (session_cmd, session_report) = track_session
            .proc(&track_session::InputData { detection })
            .wrap_err("TrackSession processing failed")?;

        trace!("TrackSession report: {:?}", session_report);

        // ---- GIMBAL CONTROL ----

        // A telecommand takes precedence over the session's detection-driven
        // command for this cycle
        let cmd = tc_cmd.or(session_cmd);

        let (output, report) = gimbal_ctrl
            .proc(&gimbal_ctrl::InputData { cmd })
            .wrap_err("GimbalCtrl processing failed")?;

        trace!("GimbalCtrl report: {:?}", report);

        // ---- ACTUATION ----
        //
        // The controller state is already updated at this point. A failed
        // servo write leaves the physical gimbal lagging the state, which is
        // reported to the client as a degraded response, and the exec carries
        // on so tracking recovers as soon as the hardware does.

        let mut hw_error = None;
        if !output.dems.pos_deg.is_empty() {
            if let Err(e) = servo_ctrl.actuate(&output.dems) {
                warn!("Servo actuation failed: {}", e);
                hw_error = Some(e.to_string());
            }
        }

        if reply_after_actuation {
            let response = match hw_error {
                None => GimbalResponse::Angles {
                    pan_deg: output.pan_deg,
                    tilt_deg: output.tilt_deg,
                },
                Some(error) => GimbalResponse::Degraded {
                    pan_deg: output.pan_deg,
                    tilt_deg: output.tilt_deg,
                    error,
                },
            };
            send_response(&mut server, &response);
        }

        // ---- ARCHIVING ----

        if let Err(e) = gimbal_ctrl.write() {
            warn!("Could not write GimbalCtrl archives: {}", e);
        }
        if let Err(e) = track_session.write() {
            warn!("Could not write TrackSession archives: {}", e);
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        match Duration::from_secs_f64(params.cycle_period_s).checked_sub(cycle_dur) {
            Some(d) => thread::sleep(d),
            None => warn!(
                "Cycle overran by {:.6} s",
                cycle_dur.as_secs_f64() - params.cycle_period_s
            ),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Send a response to the client, logging rather than propagating failures.
///
/// A send can only fail if the client has gone away, in which case the next
/// request will re-establish the exchange.
fn send_response(server: &mut GimbalServer, response: &GimbalResponse) {
    if let Err(e) = server.send_response(response) {
        warn!("Could not send response to the client: {}", e);
    }
}

/// Build the servo controller from the parameters.
fn init_servo_ctrl(params: &GimbalExecParams) -> Result<ServoCtrl> {
    let driver: Box<dyn ServoDriver> = match params.servo.driver.as_str() {
        "sim" => {
            info!("Using the sim servo driver");
            Box::new(SimServo::new())
        }
        "pca9685" => new_pca9685(&params.servo)?,
        other => return Err(eyre!("Unknown servo driver {:?}", other)),
    };

    ServoCtrl::new(driver, params.servo.config.clone())
        .wrap_err("Failed to initialise the servo controller")
}

/// Construct the PCA9685 driver over the host's I2C bus.
///
/// The cfg gate matches the rppal dependency condition in Cargo.toml exactly,
/// so this path only compiles where the crate is available.
#[cfg(all(target_arch = "arm", target_os = "linux", target_env = "gnu"))]
fn new_pca9685(params: &params::ServoParams) -> Result<Box<dyn ServoDriver>> {
    use pwm_pca9685::Pca9685;

    // Prescale dividing the 25 MHz internal oscillator down to the 50 Hz
    // servo update rate: 25 MHz / (4096 * 50 Hz) - 1
    const PWM_PRESCALE_50HZ: u8 = 121;

    let i2c = rppal::i2c::I2c::new().wrap_err("Failed to open the I2C bus")?;

    let mut pca = Pca9685::new(i2c, params.pca9685_address)
        .map_err(|e| eyre!("Failed to initialise the PCA9685: {:?}", e))?;
    pca.set_prescale(PWM_PRESCALE_50HZ)
        .map_err(|e| eyre!("Failed to set the PCA9685 prescale: {:?}", e))?;
    pca.enable()
        .map_err(|e| eyre!("Failed to enable the PCA9685: {:?}", e))?;

    info!(
        "Using the PCA9685 servo driver at I2C address 0x{:02x}",
        params.pca9685_address
    );

    Ok(Box::new(pca))
}

/// On hosts without an I2C bus the sim driver stands in for the PCA9685.
#[cfg(not(all(target_arch = "arm", target_os = "linux", target_env = "gnu")))]
fn new_pca9685(_params: &params::ServoParams) -> Result<Box<dyn ServoDriver>> {
    warn!("This build has no I2C support, using the sim servo driver instead of the PCA9685");
    Ok(Box::new(SimServo::new()))
}
