//! # Tracking session module
//!
//! TrackSession drives GimbalCtrl from the stream of detections published by
//! the vision exec. It owns the session state machine:
//!
//! - `Stopped` - the session is not running, detections are ignored. Initial
//!   state, re-entered by `stop()`, which also homes the gimbal.
//! - `Active` - detections produce tracking corrections. Consecutive frames
//!   without an object are counted.
//! - `Idle` - too many consecutive frames without an object. No corrections
//!   are produced; the configured idle policy decides whether the gimbal is
//!   re-centred or held where it is. The next detection returns to `Active`.
//!
//! Telecommands are processed before the cyclic tracking update in the exec
//! loop, so a `stop()` always takes effect before the next correction.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, warn};
use nalgebra::Vector2;
use serde::Serialize;

// Internal
pub use params::*;

use crate::gimbal_ctrl::GimbalCtrlCmd;
use comms_if::tc::TrackingState;
use util::{
    archive::{Archived, Archiver},
    module::State,
    session::{self, Session},
};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during TrackSession operation.
#[derive(Debug, thiserror::Error)]
pub enum TrackSessionError {
    #[error("Failed to load TrackSession parameters: {0}")]
    ParamLoadError(#[from] util::params::LoadError),

    #[error("max_missed_detections must be at least 1, got {0}")]
    InvalidMissedLimit(u32),
}

/// The outcome of processing one frame of vision data.
#[derive(Debug, Clone, Copy)]
pub enum DetectionOutcome {
    /// An object was detected, with the given normalised pixel error.
    Object(Vector2<f64>),

    /// The frame was processed but no object was found in it. Malformed
    /// positions rejected by the error calculator also land here.
    NoObject,
}

/// Internal session state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
enum SessionState {
    Stopped,
    Active { missed: u32 },
    Idle,
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Tracking session module state
pub struct TrackSession {
    params: Params,

    state: SessionState,

    report: StatusReport,
    arch_report: Archiver,
}

/// Input data to the tracking session.
#[derive(Default)]
pub struct InputData {
    /// The outcome of this cycle's vision frame, or `None` if no frame
    /// arrived this cycle (the missed counter is only advanced by processed
    /// frames, not by gaps in the stream).
    pub detection: Option<DetectionOutcome>,
}

/// Flat CSV record of the status report. Unit enum variants serialise as
/// their name, so the session state is a plain column.
#[derive(Serialize)]
struct ReportRecord {
    time_s: f64,
    state: TrackingState,
    missed_detections: u32,
}

/// Status report for TrackSession processing.
#[derive(Clone, Copy, Serialize, Debug)]
pub struct StatusReport {
    /// The session state after this cycle
    pub state: TrackingState,

    /// Number of consecutive frames without a detection
    pub missed_detections: u32,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for TrackSession {
    fn default() -> Self {
        Self {
            params: Params::default(),
            state: SessionState::Stopped,
            report: StatusReport {
                state: TrackingState::Stopped,
                missed_detections: 0,
            },
            arch_report: Archiver::default(),
        }
    }
}

impl State for TrackSession {
    type InitData = &'static str;
    type InitError = TrackSessionError;

    type InputData = InputData;
    type OutputData = Option<GimbalCtrlCmd>;
    type StatusReport = StatusReport;
    type ProcError = TrackSessionError;

    /// Initialise the TrackSession module.
    ///
    /// Expected init data is the path to the parameter file
    fn init(&mut self, init_data: Self::InitData, session: &Session)
        -> Result<(), Self::InitError>
    {
        let params: Params = util::params::load(init_data)?;

        if params.max_missed_detections == 0 {
            return Err(TrackSessionError::InvalidMissedLimit(
                params.max_missed_detections,
            ));
        }

        self.params = params;

        // Create the arch folder for track_session
        let mut arch_path = session.arch_root.clone();
        arch_path.push("track_session");
        std::fs::create_dir_all(arch_path).unwrap();

        self.arch_report = Archiver::from_path(
            session, "track_session/status_report.csv"
        ).unwrap();

        Ok(())
    }

    /// Perform cyclic processing of the tracking session.
    ///
    /// Returns the gimbal command to execute this cycle, if any.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        let output = match (self.state, input_data.detection) {
            // A stopped session ignores all detections
            (SessionState::Stopped, _) => None,

            // Object seen while active: reset the missed counter and correct
            (SessionState::Active { .. }, Some(DetectionOutcome::Object(error))) => {
                self.state = SessionState::Active { missed: 0 };
                Some(GimbalCtrlCmd::Track { error })
            }

            // Frame without an object while active: count it, and go idle
            // once the limit is reached
            (SessionState::Active { missed }, Some(DetectionOutcome::NoObject)) => {
                let missed = missed + 1;

                if missed >= self.params.max_missed_detections {
                    info!(
                        "No object for {} consecutive frames, session going idle",
                        missed
                    );
                    self.state = SessionState::Idle;

                    match self.params.idle_policy {
                        IdlePolicy::ReturnHome => Some(GimbalCtrlCmd::Home),
                        IdlePolicy::HoldPosition => None,
                    }
                } else {
                    self.state = SessionState::Active { missed };
                    None
                }
            }

            // Object reacquired while idle
            (SessionState::Idle, Some(DetectionOutcome::Object(error))) => {
                info!("Object reacquired, session active");
                self.state = SessionState::Active { missed: 0 };
                Some(GimbalCtrlCmd::Track { error })
            }

            // Idle frames without an object, or cycles with no frame at all,
            // change nothing
            (SessionState::Idle, _) | (SessionState::Active { .. }, None) => None,
        };

        self.report = StatusReport {
            state: self.tracking_state(),
            missed_detections: match self.state {
                SessionState::Active { missed } => missed,
                _ => 0,
            },
        };

        Ok((output, self.report))
    }
}

impl Archived for TrackSession {
    fn write(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.arch_report.serialise(ReportRecord {
            time_s: session::get_elapsed_seconds(),
            state: self.report.state,
            missed_detections: self.report.missed_detections,
        })?;

        Ok(())
    }
}

impl TrackSession {
    /// Start the tracking session.
    ///
    /// Returns false if the session was already running.
    pub fn start(&mut self) -> bool {
        match self.state {
            SessionState::Stopped => {
                info!("Tracking session started");
                self.state = SessionState::Active { missed: 0 };
                true
            }
            _ => {
                warn!("Tracking session already running");
                false
            }
        }
    }

    /// Stop the tracking session from any state.
    ///
    /// Returns the command which re-homes the gimbal. The stop resets the
    /// gimbal even if the session was never started, so a stop after a
    /// manual angle demand still re-centres the camera. The returned command
    /// must be executed before the next cyclic update so no stale correction
    /// is applied.
    pub fn stop(&mut self) -> GimbalCtrlCmd {
        if self.state != SessionState::Stopped {
            info!("Tracking session stopped, homing gimbal");
        }
        self.state = SessionState::Stopped;

        GimbalCtrlCmd::Home
    }

    /// The session state as reported to the API layer.
    pub fn tracking_state(&self) -> TrackingState {
        match self.state {
            SessionState::Stopped => TrackingState::Stopped,
            SessionState::Active { .. } => TrackingState::Active,
            SessionState::Idle => TrackingState::Idle,
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn session() -> TrackSession {
        let mut s = TrackSession::default();
        s.start();
        s
    }

    fn object(ex: f64, ey: f64) -> InputData {
        InputData {
            detection: Some(DetectionOutcome::Object(Vector2::new(ex, ey))),
        }
    }

    fn no_object() -> InputData {
        InputData {
            detection: Some(DetectionOutcome::NoObject),
        }
    }

    #[test]
    fn test_stopped_ignores_detections() {
        let mut s = TrackSession::default();

        let (output, report) = s.proc(&object(0.5, 0.0)).unwrap();
        assert!(output.is_none());
        assert_eq!(report.state, TrackingState::Stopped);
    }

    #[test]
    fn test_detection_produces_track_cmd() {
        let mut s = session();

        let (output, report) = s.proc(&object(0.5, -0.2)).unwrap();
        match output {
            Some(GimbalCtrlCmd::Track { error }) => {
                assert_eq!(error.x, 0.5);
                assert_eq!(error.y, -0.2);
            }
            other => panic!("Expected a track command, got {:?}", other),
        }
        assert_eq!(report.state, TrackingState::Active);
    }

    #[test]
    fn test_goes_idle_after_missed_limit() {
        // Default limit is 5: the first 4 empty frames produce nothing, the
        // 5th sends the session idle and (default policy) homes the gimbal
        let mut s = session();

        for i in 0..4 {
            let (output, report) = s.proc(&no_object()).unwrap();
            assert!(output.is_none());
            assert_eq!(report.state, TrackingState::Active);
            assert_eq!(report.missed_detections, i + 1);
        }

        let (output, report) = s.proc(&no_object()).unwrap();
        assert!(matches!(output, Some(GimbalCtrlCmd::Home)));
        assert_eq!(report.state, TrackingState::Idle);
    }

    #[test]
    fn test_hold_position_policy() {
        let mut s = TrackSession::default();
        s.params.idle_policy = IdlePolicy::HoldPosition;
        s.start();

        for _ in 0..5 {
            let (output, _) = s.proc(&no_object()).unwrap();
            assert!(output.is_none());
        }
        assert_eq!(s.tracking_state(), TrackingState::Idle);
    }

    #[test]
    fn test_detection_resets_missed_counter() {
        let mut s = session();

        for _ in 0..4 {
            s.proc(&no_object()).unwrap();
        }
        s.proc(&object(0.0, 0.0)).unwrap();

        let (_, report) = s.proc(&no_object()).unwrap();
        assert_eq!(report.missed_detections, 1);
        assert_eq!(report.state, TrackingState::Active);
    }

    #[test]
    fn test_reacquisition_from_idle() {
        let mut s = session();

        for _ in 0..5 {
            s.proc(&no_object()).unwrap();
        }
        assert_eq!(s.tracking_state(), TrackingState::Idle);

        let (output, report) = s.proc(&object(0.1, 0.1)).unwrap();
        assert!(matches!(output, Some(GimbalCtrlCmd::Track { .. })));
        assert_eq!(report.state, TrackingState::Active);
    }

    #[test]
    fn test_empty_cycle_does_not_advance_counter() {
        let mut s = session();

        for _ in 0..10 {
            let (output, report) = s.proc(&InputData { detection: None }).unwrap();
            assert!(output.is_none());
            assert_eq!(report.state, TrackingState::Active);
            assert_eq!(report.missed_detections, 0);
        }
    }

    #[test]
    fn test_stop_homes_and_blocks_further_updates() {
        let mut s = session();
        s.proc(&object(0.5, 0.5)).unwrap();

        assert!(matches!(s.stop(), GimbalCtrlCmd::Home));
        assert_eq!(s.tracking_state(), TrackingState::Stopped);

        // Queued detections after the stop must produce no commands
        let (output, _) = s.proc(&object(1.0, 1.0)).unwrap();
        assert!(output.is_none());

        // Stopping again still homes
        assert!(matches!(s.stop(), GimbalCtrlCmd::Home));
    }

    #[test]
    fn test_stop_without_start_homes() {
        // A stop must re-home the gimbal even if the session was never
        // started, e.g. after a manual angle demand
        let mut s = TrackSession::default();

        assert!(matches!(s.stop(), GimbalCtrlCmd::Home));
        assert_eq!(s.tracking_state(), TrackingState::Stopped);
    }

    #[test]
    fn test_report_record_serialises() {
        let root = std::env::temp_dir().join(format!("track_session_arch_{}", std::process::id()));
        std::fs::create_dir_all(&root).unwrap();
        let session = Session {
            session_root: root.clone(),
            arch_root: root.clone(),
            log_file_path: root.join("test.log"),
        };

        let mut arch = Archiver::from_path(&session, "status_report.csv").unwrap();
        arch.serialise(ReportRecord {
            time_s: 0.05,
            state: TrackingState::Active,
            missed_detections: 2,
        })
        .unwrap();

        let csv = std::fs::read_to_string(root.join("status_report.csv")).unwrap();
        assert!(csv.starts_with("time_s,state,missed_detections"));
        assert!(csv.contains("Active,2"));

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_stop_from_idle() {
        let mut s = session();

        for _ in 0..5 {
            s.proc(&no_object()).unwrap();
        }
        assert_eq!(s.tracking_state(), TrackingState::Idle);

        assert!(matches!(s.stop(), GimbalCtrlCmd::Home));
        assert_eq!(s.tracking_state(), TrackingState::Stopped);
    }

    #[test]
    fn test_restart_after_stop() {
        let mut s = session();
        s.stop();
        assert!(s.start());

        let (output, _) = s.proc(&object(0.2, 0.0)).unwrap();
        assert!(matches!(output, Some(GimbalCtrlCmd::Track { .. })));
    }
}
