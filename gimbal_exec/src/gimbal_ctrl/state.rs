//! Implementations for the GimbalCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use nalgebra::Vector2;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};

// Internal
use super::{GimbalCtrlError, Params, NUM_AXES};
use comms_if::eqpt::gimbal::{GimbalAxis, GimbalDems};
use util::{
    archive::{Archived, Archiver},
    maths::{clamp, clamp_abs},
    module::State,
    session::{self, Session},
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Index of the pan axis in per-axis report arrays.
pub const PAN_IDX: usize = 0;

/// Index of the tilt axis in per-axis report arrays.
pub const TILT_IDX: usize = 1;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Gimbal control module state
#[derive(Default)]
pub struct GimbalCtrl {
    pub(crate) params: Params,

    /// Current gimbal angles.
    ///
    /// All mutation goes through `proc` while holding this lock, so readers
    /// (status queries, telemetry) never observe a half-updated angle pair or
    /// an angle outside its axis bounds.
    state: Arc<Mutex<GimbalState>>,

    pub(crate) report: StatusReport,
    arch_state: Archiver,
    arch_report: Archiver,
}

/// The current angles of both gimbal axes.
#[derive(Clone, Copy, Default, Serialize, Debug, PartialEq)]
pub struct GimbalState {
    /// Current pan angle in degrees
    pub pan_deg: f64,

    /// Current tilt angle in degrees
    pub tilt_deg: f64,
}

/// Input data to Gimbal Control.
#[derive(Default)]
pub struct InputData {
    /// The command to be executed, or `None` if there is no new command on
    /// this cycle.
    pub cmd: Option<GimbalCtrlCmd>,
}

/// A command that GimbalCtrl can execute in one cycle.
#[derive(Clone, Copy, Debug, Serialize)]
pub enum GimbalCtrlCmd {
    /// A closed-loop tracking correction from a normalised pixel error.
    Track { error: Vector2<f64> },

    /// A manual absolute angle demand for one axis. Bypasses the error
    /// correction but goes through the same clamped write path.
    SetAngle { axis: GimbalAxis, angle_deg: f64 },

    /// Return both axes to their home angles.
    Home,
}

/// Output from GimbalCtrl that the servo controller must execute.
#[derive(Clone, Serialize, Debug)]
pub struct OutputData {
    /// The new pan angle in degrees
    pub pan_deg: f64,

    /// The new tilt angle in degrees
    pub tilt_deg: f64,

    /// Servo demands for the axes which moved by more than the demand
    /// epsilon. Axes which did not move are absent so no redundant hardware
    /// write is issued.
    pub dems: GimbalDems,
}

/// Flat CSV record of the gimbal state. The archiver cannot write headers
/// for nested fields, so archived records carry scalar columns only.
#[derive(Serialize)]
struct StateRecord {
    time_s: f64,
    pan_deg: f64,
    tilt_deg: f64,
}

/// Flat CSV record of the status report.
#[derive(Serialize)]
struct ReportRecord {
    time_s: f64,
    pan_step_limited: bool,
    tilt_step_limited: bool,
    pan_bound_limited: bool,
    tilt_bound_limited: bool,
    pan_in_dead_zone: bool,
    tilt_in_dead_zone: bool,
}

/// Status report for GimbalCtrl processing.
#[derive(Clone, Copy, Default, Serialize, Debug)]
pub struct StatusReport {
    /// True if the tracking correction on an axis was limited to the maximum
    /// step.
    pub step_limited: [bool; NUM_AXES],

    /// True if the demanded angle on an axis was clamped to the axis bounds.
    pub bound_limited: [bool; NUM_AXES],

    /// True if the error on an axis was inside the dead zone and therefore
    /// zeroed.
    pub in_dead_zone: [bool; NUM_AXES],
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for GimbalCtrl {
    type InitData = &'static str;
    type InitError = GimbalCtrlError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = GimbalCtrlError;

    /// Initialise the GimbalCtrl module.
    ///
    /// Expected init data is the path to the parameter file
    fn init(&mut self, init_data: Self::InitData, session: &Session)
        -> Result<(), Self::InitError>
    {
        // Load and validate the parameters, and move the state to home
        let params = util::params::load(init_data)?;
        self.apply_params(params)?;

        // Create the arch folder for gimbal_ctrl
        let mut arch_path = session.arch_root.clone();
        arch_path.push("gimbal_ctrl");
        std::fs::create_dir_all(arch_path).unwrap();

        // Initialise the archivers
        self.arch_state = Archiver::from_path(
            session, "gimbal_ctrl/state.csv"
        ).unwrap();
        self.arch_report = Archiver::from_path(
            session, "gimbal_ctrl/status_report.csv"
        ).unwrap();

        Ok(())
    }

    /// Perform cyclic processing of Gimbal Control.
    ///
    /// The state mutation happens under the state lock, but the returned servo
    /// demands are actuated by the caller after this function returns, so the
    /// lock is never held across a hardware write.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        // Clear the status report
        self.report = StatusReport::default();

        // Take the state lock for the read-modify-write. The new angle pair is
        // computed into locals first and written back in one assignment, so no
        // out-of-bounds or partial state is ever observable.
        let state_lock = self.state.clone();
        let mut state = lock_state(&state_lock);

        let prev = *state;

        let new = match input_data.cmd {
            Some(GimbalCtrlCmd::Track { error }) => {
                Self::calc_track(&self.params, &mut self.report, &prev, error)
            }
            Some(GimbalCtrlCmd::SetAngle { axis, angle_deg }) => {
                Self::calc_set_angle(&self.params, &mut self.report, &prev, axis, angle_deg)
            }
            Some(GimbalCtrlCmd::Home) => GimbalState {
                pan_deg: self.params.pan_home_deg,
                tilt_deg: self.params.tilt_home_deg,
            },
            None => prev,
        };

        *state = new;
        drop(state);

        // Build the servo demands, skipping axes which haven't meaningfully
        // moved
        let mut dems = GimbalDems::default();
        if (new.pan_deg - prev.pan_deg).abs() > self.params.demand_epsilon_deg {
            dems.pos_deg.insert(GimbalAxis::Pan, new.pan_deg);
        }
        if (new.tilt_deg - prev.tilt_deg).abs() > self.params.demand_epsilon_deg {
            dems.pos_deg.insert(GimbalAxis::Tilt, new.tilt_deg);
        }

        trace!(
            "GimbalCtrl output: pan {:.2} deg, tilt {:.2} deg ({} demand(s))",
            new.pan_deg,
            new.tilt_deg,
            dems.pos_deg.len()
        );

        let output = OutputData {
            pan_deg: new.pan_deg,
            tilt_deg: new.tilt_deg,
            dems,
        };

        Ok((output, self.report))
    }
}

impl Archived for GimbalCtrl {
    fn write(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let time_s = session::get_elapsed_seconds();

        let state = self.current();
        self.arch_state.serialise(StateRecord {
            time_s,
            pan_deg: state.pan_deg,
            tilt_deg: state.tilt_deg,
        })?;
        self.arch_report
            .serialise(ReportRecord::new(time_s, &self.report))?;

        Ok(())
    }
}

impl ReportRecord {
    fn new(time_s: f64, report: &StatusReport) -> Self {
        Self {
            time_s,
            pan_step_limited: report.step_limited[PAN_IDX],
            tilt_step_limited: report.step_limited[TILT_IDX],
            pan_bound_limited: report.bound_limited[PAN_IDX],
            tilt_bound_limited: report.bound_limited[TILT_IDX],
            pan_in_dead_zone: report.in_dead_zone[PAN_IDX],
            tilt_in_dead_zone: report.in_dead_zone[TILT_IDX],
        }
    }
}

impl GimbalCtrl {
    /// Build a controller directly from a parameter set.
    ///
    /// The parameters are validated and the state is placed at the home
    /// angles. Used by `init` and by unit tests which have no session.
    pub fn with_params(params: Params) -> Result<Self, GimbalCtrlError> {
        let mut ctrl = Self::default();
        ctrl.apply_params(params)?;
        Ok(ctrl)
    }

    /// Get a handle on the gimbal state for external readers.
    ///
    /// Readers must not mutate the state, all writes go through `proc`.
    pub fn state_handle(&self) -> Arc<Mutex<GimbalState>> {
        self.state.clone()
    }

    /// Get a copy of the current gimbal state.
    pub fn current(&self) -> GimbalState {
        *lock_state(&self.state)
    }

    /// Validate and apply a parameter set, moving the state to the home
    /// angles.
    fn apply_params(&mut self, params: Params) -> Result<(), GimbalCtrlError> {
        for &(axis, min, max, home) in &[
            (
                GimbalAxis::Pan,
                params.pan_min_deg,
                params.pan_max_deg,
                params.pan_home_deg,
            ),
            (
                GimbalAxis::Tilt,
                params.tilt_min_deg,
                params.tilt_max_deg,
                params.tilt_home_deg,
            ),
        ] {
            if !min.is_finite() || !max.is_finite() || min >= max {
                return Err(GimbalCtrlError::InvalidBounds {
                    axis,
                    min_deg: min,
                    max_deg: max,
                });
            }
            if !home.is_finite() || home < min || home > max {
                return Err(GimbalCtrlError::InvalidHome {
                    axis,
                    home_deg: home,
                    min_deg: min,
                    max_deg: max,
                });
            }
        }

        for &(name, value) in &[
            ("gain_pan", params.gain_pan),
            ("gain_tilt", params.gain_tilt),
            ("max_step_deg", params.max_step_deg),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(GimbalCtrlError::InvalidPositiveParam { name, value });
            }
        }

        if !params.dead_zone.is_finite() || params.dead_zone < 0.0 || params.dead_zone >= 1.0 {
            return Err(GimbalCtrlError::InvalidDeadZone(params.dead_zone));
        }

        *lock_state(&self.state) = GimbalState {
            pan_deg: params.pan_home_deg,
            tilt_deg: params.tilt_home_deg,
        };

        self.params = params;

        Ok(())
    }

    /// Calculate the new gimbal state for a tracking correction.
    fn calc_track(
        params: &Params,
        report: &mut StatusReport,
        prev: &GimbalState,
        error: Vector2<f64>,
    ) -> GimbalState {
        // Zero each error component inside the dead zone
        let mut ex = error.x;
        if ex.abs() < params.dead_zone {
            ex = 0.0;
            report.in_dead_zone[PAN_IDX] = true;
        }
        let mut ey = error.y;
        if ey.abs() < params.dead_zone {
            ey = 0.0;
            report.in_dead_zone[TILT_IDX] = true;
        }

        let pan_span = params.pan_max_deg - params.pan_min_deg;
        let tilt_span = params.tilt_max_deg - params.tilt_min_deg;

        // Proportional correction. The tilt sign is inverted: pixel y grows
        // downwards in the image, and on the reference mounting an object
        // below the frame centre needs a lower tilt angle. This convention is
        // fixed here, never inferred per call.
        let mut d_pan = params.gain_pan * ex * pan_span;
        let mut d_tilt = -params.gain_tilt * ey * tilt_span;

        // Limit the correction to the maximum step, so an object jumping
        // across the frame on re-detection can't demand a violent servo motion
        let d_pan_limited = clamp_abs(&d_pan, &params.max_step_deg);
        if d_pan_limited != d_pan {
            report.step_limited[PAN_IDX] = true;
        }
        d_pan = d_pan_limited;

        let d_tilt_limited = clamp_abs(&d_tilt, &params.max_step_deg);
        if d_tilt_limited != d_tilt {
            report.step_limited[TILT_IDX] = true;
        }
        d_tilt = d_tilt_limited;

        // Clamp the summed angles to the axis bounds
        let pan_raw = prev.pan_deg + d_pan;
        let pan_deg = clamp(&pan_raw, &params.pan_min_deg, &params.pan_max_deg);
        if pan_deg != pan_raw {
            report.bound_limited[PAN_IDX] = true;
        }

        let tilt_raw = prev.tilt_deg + d_tilt;
        let tilt_deg = clamp(&tilt_raw, &params.tilt_min_deg, &params.tilt_max_deg);
        if tilt_deg != tilt_raw {
            report.bound_limited[TILT_IDX] = true;
        }

        GimbalState { pan_deg, tilt_deg }
    }

    /// Calculate the new gimbal state for a manual angle demand.
    ///
    /// Out-of-range demands are clamped to the axis bounds, not rejected.
    fn calc_set_angle(
        params: &Params,
        report: &mut StatusReport,
        prev: &GimbalState,
        axis: GimbalAxis,
        angle_deg: f64,
    ) -> GimbalState {
        let mut new = *prev;

        match axis {
            GimbalAxis::Pan => {
                new.pan_deg = clamp(&angle_deg, &params.pan_min_deg, &params.pan_max_deg);
                if new.pan_deg != angle_deg {
                    report.bound_limited[PAN_IDX] = true;
                }
            }
            GimbalAxis::Tilt => {
                new.tilt_deg = clamp(&angle_deg, &params.tilt_min_deg, &params.tilt_max_deg);
                if new.tilt_deg != angle_deg {
                    report.bound_limited[TILT_IDX] = true;
                }
            }
        }

        new
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Acquire the state lock.
///
/// A poisoned lock only means a previous panic happened mid-cycle; the state
/// itself is always a valid, bound-clamped angle pair, so recover it.
fn lock_state(state: &Arc<Mutex<GimbalState>>) -> MutexGuard<GimbalState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn ctrl() -> GimbalCtrl {
        GimbalCtrl::with_params(Params::default()).unwrap()
    }

    fn track(ctrl: &mut GimbalCtrl, ex: f64, ey: f64) -> (OutputData, StatusReport) {
        ctrl.proc(&InputData {
            cmd: Some(GimbalCtrlCmd::Track {
                error: Vector2::new(ex, ey),
            }),
        })
        .unwrap()
    }

    fn set_angle(ctrl: &mut GimbalCtrl, axis: GimbalAxis, angle_deg: f64) -> OutputData {
        ctrl.proc(&InputData {
            cmd: Some(GimbalCtrlCmd::SetAngle { axis, angle_deg }),
        })
        .unwrap()
        .0
    }

    #[test]
    fn test_init_state_is_home() {
        let ctrl = ctrl();
        let state = ctrl.current();
        assert_eq!(state.pan_deg, 90.0);
        assert_eq!(state.tilt_deg, -5.0);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let mut params = Params::default();
        params.pan_min_deg = 180.0;
        params.pan_max_deg = 0.0;
        assert!(GimbalCtrl::with_params(params).is_err());

        let mut params = Params::default();
        params.tilt_home_deg = 40.0;
        assert!(GimbalCtrl::with_params(params).is_err());

        let mut params = Params::default();
        params.gain_pan = -1.0;
        assert!(GimbalCtrl::with_params(params).is_err());

        let mut params = Params::default();
        params.dead_zone = 1.5;
        assert!(GimbalCtrl::with_params(params).is_err());
    }

    #[test]
    fn test_centred_object_no_change() {
        // Frame 640x480, object at (320, 240): zero error, no angle change
        let mut ctrl = ctrl();
        let (output, _) = track(&mut ctrl, 0.0, 0.0);

        assert_eq!(output.pan_deg, 90.0);
        assert_eq!(output.tilt_deg, -5.0);
        assert!(output.dems.pos_deg.is_empty());
    }

    #[test]
    fn test_dead_zone_suppresses_correction() {
        let mut ctrl = ctrl();
        let (output, report) = track(&mut ctrl, 0.04, -0.04);

        assert_eq!(output.pan_deg, 90.0);
        assert_eq!(output.tilt_deg, -5.0);
        assert!(output.dems.pos_deg.is_empty());
        assert!(report.in_dead_zone[PAN_IDX]);
        assert!(report.in_dead_zone[TILT_IDX]);
    }

    #[test]
    fn test_repeated_centre_updates_hold_position() {
        let mut ctrl = ctrl();
        for _ in 0..10 {
            let (output, _) = track(&mut ctrl, 0.01, 0.01);
            assert_eq!(output.pan_deg, 90.0);
            assert_eq!(output.tilt_deg, -5.0);
        }
    }

    #[test]
    fn test_far_right_edge_step_limited() {
        // ex = 1.0: raw delta = 0.05 * 1.0 * 180 = 9 deg, step-clamped to 5
        let mut ctrl = ctrl();
        let (output, report) = track(&mut ctrl, 1.0, 0.0);

        assert_eq!(output.pan_deg, 95.0);
        assert!(report.step_limited[PAN_IDX]);
        assert!(output.pan_deg <= 180.0);
        assert_eq!(output.dems.pos_deg.get(&GimbalAxis::Pan), Some(&95.0));
    }

    #[test]
    fn test_step_then_bound_clamp_near_limit() {
        // Pan at 178 with a large rightward error: step clamp gives +5 so a
        // raw 183, bound clamp brings it back to 180
        let mut ctrl = ctrl();
        set_angle(&mut ctrl, GimbalAxis::Pan, 178.0);

        let (output, report) = track(&mut ctrl, 1.0, 0.0);

        assert_eq!(output.pan_deg, 180.0);
        assert!(report.step_limited[PAN_IDX]);
        assert!(report.bound_limited[PAN_IDX]);
    }

    #[test]
    fn test_tilt_sign_convention() {
        // Object below the frame centre (positive ey) must lower the tilt
        let mut ctrl = ctrl();
        set_angle(&mut ctrl, GimbalAxis::Tilt, 20.0);

        let (output, _) = track(&mut ctrl, 0.0, 1.0);
        assert!(output.tilt_deg < 20.0);

        // And an object above the centre must raise it
        let before = ctrl.current().tilt_deg;
        let (output, _) = track(&mut ctrl, 0.0, -1.0);
        assert!(output.tilt_deg > before);
    }

    #[test]
    fn test_single_update_never_exceeds_max_step() {
        let mut ctrl = ctrl();
        let errors = [-1.0, -0.5, -0.1, 0.0, 0.1, 0.5, 1.0];

        for &ex in &errors {
            for &ey in &errors {
                let prev = ctrl.current();
                let (output, _) = track(&mut ctrl, ex, ey);
                assert!((output.pan_deg - prev.pan_deg).abs() <= 5.0 + 1e-9);
                assert!((output.tilt_deg - prev.tilt_deg).abs() <= 5.0 + 1e-9);
            }
        }
    }

    #[test]
    fn test_bounds_never_exceeded() {
        let mut ctrl = ctrl();
        let errors = [-1.0, -0.7, 0.3, 1.0];

        for _ in 0..100 {
            for &ex in &errors {
                for &ey in &errors {
                    let (output, _) = track(&mut ctrl, ex, ey);
                    assert!(output.pan_deg >= 0.0 && output.pan_deg <= 180.0);
                    assert!(output.tilt_deg >= -5.0 && output.tilt_deg <= 30.0);
                }
            }
        }
    }

    #[test]
    fn test_manual_set_angle_clamped() {
        let mut ctrl = ctrl();

        let output = set_angle(&mut ctrl, GimbalAxis::Pan, 200.0);
        assert_eq!(output.pan_deg, 180.0);
        assert!(ctrl.report.bound_limited[PAN_IDX]);

        let output = set_angle(&mut ctrl, GimbalAxis::Tilt, -30.0);
        assert_eq!(output.tilt_deg, -5.0);
        assert!(ctrl.report.bound_limited[TILT_IDX]);
    }

    #[test]
    fn test_home_command() {
        let mut ctrl = ctrl();
        set_angle(&mut ctrl, GimbalAxis::Pan, 150.0);
        set_angle(&mut ctrl, GimbalAxis::Tilt, 25.0);

        let (output, _) = ctrl
            .proc(&InputData {
                cmd: Some(GimbalCtrlCmd::Home),
            })
            .unwrap();

        assert_eq!(output.pan_deg, 90.0);
        assert_eq!(output.tilt_deg, -5.0);
        assert_eq!(output.dems.pos_deg.len(), 2);
    }

    #[test]
    fn test_no_demand_for_unmoved_axis() {
        let mut ctrl = ctrl();

        // Setting the pan to its current angle must not emit a demand
        let output = set_angle(&mut ctrl, GimbalAxis::Pan, 90.0);
        assert!(output.dems.pos_deg.is_empty());

        // A pan-only correction must not emit a tilt demand
        let (output, _) = track(&mut ctrl, 1.0, 0.0);
        assert!(output.dems.pos_deg.contains_key(&GimbalAxis::Pan));
        assert!(!output.dems.pos_deg.contains_key(&GimbalAxis::Tilt));
    }

    #[test]
    fn test_archive_records_serialise() {
        // The CSV writer rejects nested fields when writing headers, so the
        // archived records must stay flat
        let root = std::env::temp_dir().join(format!("gimbal_ctrl_arch_{}", std::process::id()));
        std::fs::create_dir_all(&root).unwrap();
        let session = Session {
            session_root: root.clone(),
            arch_root: root.clone(),
            log_file_path: root.join("test.log"),
        };

        let mut report = StatusReport::default();
        report.step_limited[PAN_IDX] = true;

        let mut arch = Archiver::from_path(&session, "state.csv").unwrap();
        arch.serialise(StateRecord {
            time_s: 0.05,
            pan_deg: 90.0,
            tilt_deg: -5.0,
        })
        .unwrap();

        let mut arch = Archiver::from_path(&session, "status_report.csv").unwrap();
        arch.serialise(ReportRecord::new(0.05, &report)).unwrap();

        let state_csv = std::fs::read_to_string(root.join("state.csv")).unwrap();
        assert_eq!(state_csv.lines().count(), 2);
        assert!(state_csv.starts_with("time_s,pan_deg,tilt_deg"));

        let report_csv = std::fs::read_to_string(root.join("status_report.csv")).unwrap();
        assert_eq!(report_csv.lines().count(), 2);
        assert!(report_csv.lines().nth(1).unwrap().contains("true"));

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_no_cmd_is_noop() {
        let mut ctrl = ctrl();
        let (output, _) = ctrl.proc(&InputData { cmd: None }).unwrap();

        assert_eq!(output.pan_deg, 90.0);
        assert_eq!(output.tilt_deg, -5.0);
        assert!(output.dems.pos_deg.is_empty());
    }
}
