//! Implementations for the MotionCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, trace, warn};
use serde::Serialize;
use std::time::{Duration, Instant};

// Internal
use super::{secs_to_duration, MotionCtrlError, Params};
use crate::{delay::Delay, layout::Position, transport::Transport};
use comms_if::eqpt::pip::{is_in_progress, PipCmd};
use util::{archive::Archiver, session};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Motion control module state.
///
/// The controller does not own the transport, it is handed the link for each
/// operation by whoever owns the session.
pub struct MotionCtrl {
    pub(crate) params: Params,

    current: Position,

    state: MotionState,

    arch_moves: Option<Archiver>,
}

/// A single completed move, as archived.
#[derive(Debug, Clone, Copy, Serialize)]
struct MoveRecord {
    time_s: f64,
    x_mm: f64,
    y_mm: f64,
    z_mm: f64,
    est_s: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionState {
    Unhomed,
    Homed,
    Moving,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl MotionCtrl {
    pub fn new(params: Params) -> Self {
        Self {
            params,
            current: Position::default(),
            state: MotionState::Unhomed,
            arch_moves: None,
        }
    }

    /// Archive every completed move with the given archiver.
    pub fn set_archiver(&mut self, archiver: Archiver) {
        self.arch_moves = Some(archiver);
    }

    /// Where the head was last commanded to go.
    pub fn current(&self) -> Position {
        self.current
    }

    pub fn state(&self) -> MotionState {
        self.state
    }

    pub fn is_homed(&self) -> bool {
        self.state != MotionState::Unhomed
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Home all axes.
    ///
    /// Stale responses are discarded first, then the controller's responses
    /// are consumed until one no longer reports homing in progress.
    pub fn home(&mut self, transport: &mut Transport) -> Result<(), MotionCtrlError> {
        let stale = transport.drain()?;
        if !stale.is_empty() {
            debug!("Discarded {} stale responses before homing", stale.len());
        }

        debug!("Homing");
        transport.send(&PipCmd::Home)?;

        let deadline = self
            .params
            .home_timeout_s
            .map(|t| Instant::now() + secs_to_duration(t));

        loop {
            let line = match deadline {
                Some(d) => {
                    let remaining = d.saturating_duration_since(Instant::now());
                    match transport.next_line_timeout(remaining)? {
                        Some(l) => l,
                        None => {
                            return Err(MotionCtrlError::ProtocolViolation(format!(
                                "homing did not complete within {} s",
                                self.params.home_timeout_s.unwrap_or_default()
                            )))
                        }
                    }
                }
                None => transport.next_line()?,
            };

            if !is_in_progress(&line) {
                trace!("Homing complete: {}", line);
                break;
            }
        }

        self.current = Position::default();
        self.state = MotionState::Homed;
        debug!("Homed");

        Ok(())
    }

    /// Send the commands to move to `target` without waiting for the move to
    /// finish. The current position is updated immediately.
    pub fn go_to(
        &mut self,
        transport: &mut Transport,
        target: Position,
    ) -> Result<(), MotionCtrlError> {
        if !self.is_homed() {
            return Err(MotionCtrlError::NotHomed);
        }

        let feed_rate = self.params.feed_rate;

        transport.send(&PipCmd::MoveXy {
            feed_rate,
            x_mm: target.x,
            y_mm: target.y,
        })?;
        transport.send(&PipCmd::MoveZ {
            feed_rate,
            z_mm: target.z,
        })?;

        self.current = target;

        Ok(())
    }

    /// Move to `target` and wait for the estimated duration of the move.
    pub fn do_move<D: Delay>(
        &mut self,
        transport: &mut Transport,
        delay: &mut D,
        target: Position,
    ) -> Result<(), MotionCtrlError> {
        let start = self.current;

        self.go_to(transport, target)?;
        debug!(
            "Moving from ({}, {}, {}) to ({}, {}, {})",
            start.x, start.y, start.z, target.x, target.y, target.z
        );

        self.state = MotionState::Moving;
        let (xy_time, z_time) = self.move_time(start, target);
        if xy_time > Duration::from_secs(0) {
            delay.delay(xy_time);
        }
        if z_time > Duration::from_secs(0) {
            delay.delay(z_time);
        }
        self.state = MotionState::Homed;

        for line in transport.drain()? {
            trace!("During move: {}", line);
        }

        self.archive_move((xy_time + z_time).as_secs_f64());

        Ok(())
    }

    /// Move vertically to the given height.
    pub fn raise_to<D: Delay>(
        &mut self,
        transport: &mut Transport,
        delay: &mut D,
        z_mm: f64,
    ) -> Result<(), MotionCtrlError> {
        let target = self.current.with_z(z_mm);
        self.do_move(transport, delay, target)
    }

    /// Park the head at the safe travel position.
    pub fn clear<D: Delay>(
        &mut self,
        transport: &mut Transport,
        delay: &mut D,
    ) -> Result<(), MotionCtrlError> {
        let clear_pos = self.params.clear_pos;
        self.do_move(transport, delay, clear_pos)
    }

    /// Strip the mounted tip: raise into the stripper, then drop back down.
    pub fn eject<D: Delay>(
        &mut self,
        transport: &mut Transport,
        delay: &mut D,
    ) -> Result<(), MotionCtrlError> {
        debug!("Ejecting tip");

        let raise = Position::new(
            self.params.eject_x_mm,
            self.current.y,
            self.params.eject_raise_z_mm,
        );
        self.do_move(transport, delay, raise)?;
        self.raise_to(transport, delay, self.params.eject_strip_z_mm)
    }

    /// Estimated durations of the horizontal and vertical parts of a move.
    pub fn move_time(&self, start: Position, end: Position) -> (Duration, Duration) {
        let xy = (end.x - start.x).hypot(end.y - start.y);
        let z = (end.z - start.z).abs();

        (
            secs_to_duration(xy / self.params.feed_rate),
            secs_to_duration(z / self.params.vertical_rate),
        )
    }

    fn archive_move(&mut self, est_s: f64) {
        if let Some(arch) = self.arch_moves.as_mut() {
            let record = MoveRecord {
                time_s: session::get_elapsed_seconds(),
                x_mm: self.current.x,
                y_mm: self.current.y,
                z_mm: self.current.z,
                est_s,
            };

            if let Err(e) = arch.serialise(record) {
                warn!("Could not archive move: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{delay::mock::RecordingDelay, transport::mock};

    fn homed() -> (MotionCtrl, Transport, mock::MockDevice) {
        let (mut transport, device) = mock::new();
        let mut motion = MotionCtrl::new(Params::default());
        motion.home(&mut transport).unwrap();
        device.clear();

        (motion, transport, device)
    }

    #[test]
    fn test_home() {
        let (mut transport, device) = mock::new();
        let mut motion = MotionCtrl::new(Params::default());
        assert_eq!(motion.state(), MotionState::Unhomed);

        motion.home(&mut transport).unwrap();

        assert_eq!(device.commands(), vec![PipCmd::Home]);
        assert_eq!(motion.current(), Position::new(0.0, 0.0, 0.0));
        assert_eq!(motion.state(), MotionState::Homed);

        // Every reply to the home has been consumed
        assert_eq!(
            transport.next_line_timeout(Duration::from_millis(20)).unwrap(),
            None
        );
    }

    #[test]
    fn test_home_timeout() {
        let (mut transport, device) = mock::new();
        device.set_responder(|_| vec!["echo:busy: processing".to_string()]);

        let mut motion = MotionCtrl::new(Params {
            home_timeout_s: Some(0.05),
            ..Default::default()
        });

        assert!(matches!(
            motion.home(&mut transport),
            Err(MotionCtrlError::ProtocolViolation(_))
        ));
        assert!(!motion.is_homed());
    }

    #[test]
    fn test_home_hang_up() {
        let (mut transport, device) = mock::new();
        device.set_responder(|_| vec![]);
        let mut motion = MotionCtrl::new(Params::default());

        device.hang_up();

        assert!(matches!(
            motion.home(&mut transport),
            Err(MotionCtrlError::Transport(_))
        ));
    }

    #[test]
    fn test_not_homed() {
        let (mut transport, device) = mock::new();
        let mut motion = MotionCtrl::new(Params::default());

        assert!(matches!(
            motion.go_to(&mut transport, Position::new(10.0, 0.0, 0.0)),
            Err(MotionCtrlError::NotHomed)
        ));
        assert!(device.written_lines().is_empty());
    }

    #[test]
    fn test_go_to_is_optimistic() {
        let (mut motion, mut transport, device) = homed();
        device.set_responder(|_| vec![]);

        motion
            .go_to(&mut transport, Position::new(10.0, 0.0, 0.0))
            .unwrap();

        // No reply has been received but the position has been updated
        assert_eq!(motion.current(), Position::new(10.0, 0.0, 0.0));
        assert_eq!(device.written_lines(), vec!["G0 F500 X10 Y0", "G0 F500 Z0"]);
    }

    #[test]
    fn test_do_move_delays() {
        let (mut motion, mut transport, device) = homed();
        let mut delay = RecordingDelay::default();

        // Vertical only
        motion
            .do_move(&mut transport, &mut delay, Position::new(0.0, 0.0, 85.0))
            .unwrap();
        assert_eq!(delay.delays(), vec![Duration::from_secs_f64(8.5)]);

        // Horizontal only
        delay.clear();
        motion
            .do_move(&mut transport, &mut delay, Position::new(30.0, 40.0, 85.0))
            .unwrap();
        assert_eq!(delay.delays(), vec![Duration::from_millis(100)]);

        // Both, horizontal first
        delay.clear();
        motion
            .do_move(&mut transport, &mut delay, Position::new(0.0, 0.0, 80.0))
            .unwrap();
        assert_eq!(
            delay.delays(),
            vec![Duration::from_millis(100), Duration::from_millis(500)]
        );

        // Nowhere
        delay.clear();
        motion
            .do_move(&mut transport, &mut delay, Position::new(0.0, 0.0, 80.0))
            .unwrap();
        assert!(delay.delays().is_empty());

        assert_eq!(device.written_lines().len(), 8);
        assert_eq!(motion.state(), MotionState::Homed);
    }

    #[test]
    fn test_clear_and_eject() {
        let (mut motion, mut transport, device) = homed();
        let mut delay = RecordingDelay::default();

        motion
            .do_move(&mut transport, &mut delay, Position::new(69.5, 44.0, 80.0))
            .unwrap();
        device.clear();

        motion.eject(&mut transport, &mut delay).unwrap();
        assert_eq!(
            device.written_lines(),
            vec![
                "G0 F500 X10 Y44",
                "G0 F500 Z156",
                "G0 F500 X10 Y44",
                "G0 F500 Z85"
            ]
        );
        assert_eq!(motion.current(), Position::new(10.0, 44.0, 85.0));

        device.clear();
        motion.clear(&mut transport, &mut delay).unwrap();
        assert_eq!(device.written_lines(), vec!["G0 F500 X0 Y0", "G0 F500 Z85"]);
        assert_eq!(motion.current(), Params::default().clear_pos);
    }

    #[test]
    fn test_move_archive() {
        let (mut motion, mut transport, _device) = homed();
        let mut delay = RecordingDelay::default();

        let path = std::env::temp_dir()
            .join(format!("pipbot_motion_archive_{}.csv", std::process::id()));
        motion.set_archiver(Archiver::from_file_path(&path).unwrap());

        motion
            .do_move(&mut transport, &mut delay, Position::new(30.0, 40.0, 0.0))
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "time_s,x_mm,y_mm,z_mm,est_s");
        assert!(lines[1].ends_with(",30.0,40.0,0.0,0.1"));
    }
}
