//! Implementations for the Bot session structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, error, info, warn};
use std::collections::BTreeMap;

// Internal
use super::{BotError, Params, RunReport};
use crate::{
    delay::Delay,
    layout::{Cell, CellKind, Layout, Mixture, Position},
    liquid_ctrl::LiquidCtrl,
    motion_ctrl::{secs_to_duration, MotionCtrl},
    params::PipExecParams,
    tip_feed::TipFeed,
    transport::Transport,
};
use comms_if::tc::transfer::{CellAddr, TransferRequest, TransferResponse};
use util::archive::Archiver;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A session with the robot.
///
/// The bot owns the link to the controller for its whole life, and is the only
/// thing which moves the machine.
pub struct Bot<D: Delay> {
    pub(crate) params: Params,

    layout: Layout,

    transport: Transport,

    delay: D,

    motion: MotionCtrl,

    liquid: LiquidCtrl,

    /// Index of the tip rack in the layout and the feed over it, set by init
    tip_rack: Option<(usize, TipFeed)>,

    /// True while a tip is on the head
    tip_mounted: bool,

    /// Liquid deposited by this session
    contents: BTreeMap<CellAddr, Mixture>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<D: Delay> Bot<D> {
    /// Create a new session over an open transport. Nothing is sent until
    /// [`Bot::init`] is called.
    pub fn new(transport: Transport, layout: Layout, params: &PipExecParams, delay: D) -> Self {
        Self {
            params: params.transfer.clone(),
            layout,
            transport,
            delay,
            motion: MotionCtrl::new(params.motion.clone()),
            liquid: LiquidCtrl::new(params.liquid.clone()),
            tip_rack: None,
            tip_mounted: false,
            contents: BTreeMap::new(),
        }
    }

    /// Archive the gantry's moves with the given archiver.
    pub fn set_motion_archiver(&mut self, archiver: Archiver) {
        self.motion.set_archiver(archiver);
    }

    /// Prepare the robot for transfers.
    ///
    /// Binds the tip feed to the tip rack with the first `tip_start` tips
    /// already used, homes, sets up the dispenser, raises to the tip-off
    /// clearance and primes the actuator.
    pub fn init(&mut self, tip_start: usize) -> Result<(), BotError> {
        let index = self.tip_rack_index()?;
        let rack = self.layout.matrix(index)?;
        if rack.kind() != CellKind::Tip {
            warn!("Using matrix {} ({:?}) as the tip rack, but it does not hold tips", index, rack.name());
        }
        self.tip_rack = Some((index, TipFeed::new(rack, tip_start)));

        info!("Initialising bot");
        self.motion.home(&mut self.transport)?;
        self.liquid.setup_dispenser(&mut self.transport)?;
        self.motion.raise_to(
            &mut self.transport,
            &mut self.delay,
            self.params.tip_off_clear_z_mm,
        )?;

        let prime_volume = self.params.prime_volume;
        if prime_volume > 0.0 {
            debug!("Priming actuator with {}", prime_volume);
            self.liquid.pickup(&mut self.transport, &mut self.delay, prime_volume)?;
            self.liquid.dispense(&mut self.transport, &mut self.delay, prime_volume)?;
            self.liquid.reset_cush(&mut self.transport, &mut self.delay)?;
        }

        info!("Bot ready, {} tips available", self.tips_remaining());

        Ok(())
    }

    /// Home, park, then visit the tip rack and strip whatever is on the head.
    ///
    /// Leaves the actuator untouched, so can be run without initialising.
    pub fn home_and_park(&mut self) -> Result<(), BotError> {
        let rack_home = self.layout.matrix(self.tip_rack_index()?)?.home();

        self.motion.home(&mut self.transport)?;
        self.motion.clear(&mut self.transport, &mut self.delay)?;
        self.motion.do_move(&mut self.transport, &mut self.delay, rack_home)?;
        self.motion.raise_to(
            &mut self.transport,
            &mut self.delay,
            self.params.tip_on_clear_z_mm,
        )?;
        self.motion.eject(&mut self.transport, &mut self.delay)?;
        self.tip_mounted = false;

        Ok(())
    }

    /// Perform a single transfer.
    ///
    /// The request is checked against the layout and the tip supply before
    /// anything moves, so a rejected request leaves the machine untouched.
    pub fn transfer(&mut self, req: &TransferRequest) -> Result<(), BotError> {
        let (source, dest) = self.check_request(req)?;
        info!("Transfer {}", req);

        // Never take a used tip back to the rack
        if self.tip_mounted {
            debug!("Ejecting tip left over from the previous transfer");
            self.motion.eject(&mut self.transport, &mut self.delay)?;
            self.tip_mounted = false;
        }

        let clear_z = self.params.tip_on_clear_z_mm;

        // Fetch a tip
        let tip = match self.tip_rack.as_mut() {
            Some((_, feed)) => feed.get_tip()?,
            None => return Err(BotError::NotInitialised),
        };
        self.motion.do_move(&mut self.transport, &mut self.delay, tip)?;
        self.tip_mounted = true;
        self.motion.raise_to(&mut self.transport, &mut self.delay, clear_z)?;

        // Aspirate
        self.motion.do_move(&mut self.transport, &mut self.delay, source)?;
        self.liquid.pickup(&mut self.transport, &mut self.delay, req.volume)?;
        self.motion.raise_to(&mut self.transport, &mut self.delay, clear_z)?;

        // Dispense
        self.motion.do_move(&mut self.transport, &mut self.delay, dest)?;
        self.liquid.dispense(&mut self.transport, &mut self.delay, req.volume)?;
        self.delay.delay(secs_to_duration(self.params.dispense_settle_s));
        self.motion.raise_to(&mut self.transport, &mut self.delay, clear_z)?;
        self.liquid.reset_cush(&mut self.transport, &mut self.delay)?;

        if req.eject {
            self.motion.eject(&mut self.transport, &mut self.delay)?;
            self.tip_mounted = false;
        }

        self.record_transfer(req.source, req.dest, req.volume);
        info!("Transfer {} complete", req);

        Ok(())
    }

    /// Perform a list of transfers in order.
    ///
    /// Rejected requests are reported and skipped, the run stops at the first
    /// fatal error.
    pub fn run(&mut self, requests: &[TransferRequest]) -> RunReport {
        let mut report = RunReport::default();

        for (i, req) in requests.iter().enumerate() {
            match self.transfer(req) {
                Ok(()) => report.responses.push(TransferResponse::Done),
                Err(e) if !e.is_fatal() => {
                    warn!("Transfer {} ({}) rejected: {}", i, req, e);
                    report.responses.push(TransferResponse::Rejected {
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    error!("Transfer {} ({}) failed: {}", i, req, e);
                    report.fatal_error = Some(e.to_string());
                    break;
                }
            }
        }

        report.tip_cursor = self.tip_cursor();
        report
    }

    /// Describe a cell of the layout, including what this session has put in
    /// it.
    pub fn cell(&self, addr: &CellAddr) -> Result<Cell, BotError> {
        let kind = self.layout.matrix(addr.matrix)?.kind();
        let position = self.layout.position(addr)?;

        let cell = match kind {
            CellKind::Tip => {
                let used = match &self.tip_rack {
                    Some((index, feed)) if *index == addr.matrix => {
                        feed.is_consumed(addr.row, addr.col)
                    }
                    _ => false,
                };

                Cell {
                    kind,
                    empty: used,
                    position,
                    content: None,
                }
            }
            _ => {
                let content = self.contents.get(addr).filter(|m| !m.is_empty()).cloned();

                Cell {
                    kind,
                    // Stocks are filled outside of the session
                    empty: content.is_none() && kind != CellKind::Stock,
                    position,
                    content,
                }
            }
        };

        Ok(cell)
    }

    /// Close the session, releasing the device.
    pub fn close(self) {
        info!("Closing bot session");
        self.transport.close();
    }

    /// Where the head was last commanded to go.
    pub fn current(&self) -> Position {
        self.motion.current()
    }

    /// Number of tips used or skipped so far.
    pub fn tip_cursor(&self) -> usize {
        self.tip_rack.as_ref().map(|(_, f)| f.cursor()).unwrap_or(0)
    }

    pub fn tips_remaining(&self) -> usize {
        self.tip_rack.as_ref().map(|(_, f)| f.remaining()).unwrap_or(0)
    }

    pub fn is_tip_mounted(&self) -> bool {
        self.tip_mounted
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Liquid deposited by this session, by destination cell.
    pub fn contents(&self) -> &BTreeMap<CellAddr, Mixture> {
        &self.contents
    }

    fn tip_rack_index(&self) -> Result<usize, BotError> {
        match self.params.tip_rack {
            Some(i) => Ok(i),
            None if self.layout.is_empty() => Err(BotError::InvalidLayoutReference(
                "the layout has no tip rack".to_string(),
            )),
            None => Ok(self.layout.len() - 1),
        }
    }

    /// Check that a request can be carried out, returning the source and
    /// destination positions.
    fn check_request(&self, req: &TransferRequest) -> Result<(Position, Position), BotError> {
        let feed = match &self.tip_rack {
            Some((_, feed)) => feed,
            None => return Err(BotError::NotInitialised),
        };
        if !self.motion.is_homed() {
            return Err(BotError::NotHomed);
        }

        let source = self.liquid_position(&req.source, "source")?;
        let dest = self.liquid_position(&req.dest, "destination")?;

        if !(req.volume.is_finite() && req.volume >= 0.0) {
            return Err(BotError::InvalidVolume(req.volume));
        }

        feed.next_tip()?;

        Ok((source, dest))
    }

    /// Resolve a cell which liquid can be taken from or put into.
    fn liquid_position(&self, addr: &CellAddr, role: &str) -> Result<Position, BotError> {
        let matrix = self.layout.matrix(addr.matrix)?;

        if matrix.kind() == CellKind::Tip {
            return Err(BotError::InvalidLayoutReference(format!(
                "{} {} is in tip rack {:?}",
                role,
                addr,
                matrix.name()
            )));
        }

        Ok(self.layout.position(addr)?)
    }

    /// Update the tracked contents after moving `volume` from `source` to
    /// `dest`.
    fn record_transfer(&mut self, source: CellAddr, dest: CellAddr, volume: f64) {
        let moved = match self.contents.get(&source) {
            Some(m) if !m.is_empty() => {
                let total = m.total();
                let moved = m.scaled(volume);
                let left = m.scaled((total - volume).max(0.0));

                match left.is_empty() {
                    true => self.contents.remove(&source),
                    false => self.contents.insert(source, left),
                };

                moved
            }
            _ => {
                let mut m = Mixture::new();
                m.add(source, volume);
                m
            }
        };

        self.contents.entry(dest).or_default().merge(&moved);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        delay::mock::RecordingDelay,
        layout::{LayoutParams, Matrix},
        transport::mock,
    };
    use comms_if::eqpt::pip::PipCmd;
    use std::time::Duration;

    fn params(cushion: f64) -> PipExecParams {
        let mut params = PipExecParams::default();
        params.liquid.cushion = cushion;
        params
    }

    fn request(source: &str, dest: &str, volume: f64, eject: bool) -> TransferRequest {
        TransferRequest {
            source: source.parse().unwrap(),
            dest: dest.parse().unwrap(),
            volume,
            eject,
        }
    }

    fn bot_with(
        layout: Layout,
        params: &PipExecParams,
        tip_start: usize,
    ) -> (Bot<RecordingDelay>, mock::MockDevice, RecordingDelay) {
        let (transport, device) = mock::new();
        let delay = RecordingDelay::default();
        let mut bot = Bot::new(transport, layout, params, delay.clone());

        bot.init(tip_start).unwrap();
        device.clear();
        delay.clear();

        (bot, device, delay)
    }

    fn bot(cushion: f64) -> (Bot<RecordingDelay>, mock::MockDevice, RecordingDelay) {
        bot_with(LayoutParams::default().build(), &params(cushion), 0)
    }

    #[test]
    fn test_init() {
        let (transport, device) = mock::new();
        let mut bot = Bot::new(
            transport,
            LayoutParams::default().build(),
            &params(25.0),
            RecordingDelay::default(),
        );

        bot.init(5).unwrap();

        assert_eq!(
            device.written_lines(),
            vec![
                "G28",
                "M302 S1",
                "M82",
                "G92 E0",
                "G0 F500 X0 Y0",
                "G0 F500 Z85",
                "G1 F500 E-30",
                "G1 F500 E2.5",
                "G1 F500 E0",
            ]
        );
        assert_eq!(bot.current(), Position::new(0.0, 0.0, 85.0));
        assert_eq!(bot.tip_cursor(), 5);
        assert_eq!(bot.tips_remaining(), 75);
    }

    #[test]
    fn test_transfer_sequence() {
        let (mut bot, device, delay) = bot(50.0);

        bot.transfer(&request("0:0:1", "1:2:3", 200.0, true)).unwrap();

        assert_eq!(
            device.written_lines(),
            vec![
                // Tip
                "G0 F500 X29 Y17",
                "G0 F500 Z80",
                "G0 F500 X29 Y17",
                "G0 F500 Z142",
                // Source
                "G0 F500 X42.5 Y17",
                "G0 F500 Z80",
                "G1 F500 E-20",
                "G0 F500 X42.5 Y17",
                "G0 F500 Z142",
                // Destination
                "G0 F500 X69.5 Y44",
                "G0 F500 Z80",
                "G1 F500 E5",
                "G0 F500 X69.5 Y44",
                "G0 F500 Z142",
                "G1 F500 E0",
                // Eject
                "G0 F500 X10 Y44",
                "G0 F500 Z156",
                "G0 F500 X10 Y44",
                "G0 F500 Z85",
            ]
        );

        assert!(delay.delays().contains(&Duration::from_secs(1)));
        assert!(!bot.is_tip_mounted());
        assert_eq!(bot.tip_cursor(), 1);
        assert_eq!(bot.current(), Position::new(10.0, 44.0, 85.0));
    }

    #[test]
    fn test_mounted_tip_ejected_first() {
        let (mut bot, device, _delay) = bot(25.0);

        bot.transfer(&request("0:0:0", "1:0:0", 100.0, false)).unwrap();
        assert!(bot.is_tip_mounted());
        device.clear();

        bot.transfer(&request("0:0:0", "1:0:1", 100.0, true)).unwrap();

        let lines = device.written_lines();
        assert_eq!(
            lines[..4],
            ["G0 F500 X10 Y17", "G0 F500 Z156", "G0 F500 X10 Y17", "G0 F500 Z85"]
        );
        // Second tip of the rack
        assert_eq!(lines[4], "G0 F500 X42.5 Y17");
        assert_eq!(bot.tip_cursor(), 2);
    }

    #[test]
    fn test_rejected_requests_do_not_move() {
        let (mut bot, device, _delay) = bot(25.0);

        let rejected = vec![
            request("9:0:0", "1:0:0", 100.0, true),
            request("0:0:0", "1:5:0", 100.0, true),
            request("3:0:0", "1:0:0", 100.0, true),
            request("0:0:0", "3:0:0", 100.0, true),
            request("0:0:0", "1:0:0", -5.0, true),
        ];

        for req in &rejected {
            let e = bot.transfer(req).unwrap_err();
            assert!(!e.is_fatal(), "{} should not be fatal", e);
        }

        assert!(matches!(
            bot.transfer(&rejected[2]),
            Err(BotError::InvalidLayoutReference(_))
        ));
        assert!(device.written_lines().is_empty());
        assert_eq!(bot.tip_cursor(), 0);
    }

    #[test]
    fn test_zero_volume_transfer() {
        let (mut bot, device, _delay) = bot(25.0);

        bot.transfer(&request("0:0:0", "1:0:0", 0.0, true)).unwrap();

        let actuator: Vec<String> = device
            .written_lines()
            .into_iter()
            .filter(|l| l.starts_with("G1"))
            .collect();
        assert_eq!(actuator, vec!["G1 F500 E0", "G1 F500 E2.5", "G1 F500 E0"]);
        assert_eq!(bot.tip_cursor(), 1);
    }

    #[test]
    fn test_exhausted_tip_feed() {
        let mut layout = LayoutParams::default();
        layout.matrices[3].rows = 1;
        layout.matrices[3].cols = 1;
        let (mut bot, device, _delay) = bot_with(layout.build(), &params(25.0), 0);

        bot.transfer(&request("0:0:0", "1:0:0", 100.0, true)).unwrap();
        device.clear();

        assert!(matches!(
            bot.transfer(&request("0:0:0", "1:0:1", 100.0, true)),
            Err(BotError::ExhaustedTipFeed(_))
        ));
        assert!(device.written_lines().is_empty());
    }

    #[test]
    fn test_tip_start_skips_tips() {
        let (mut bot, device, _delay) = bot_with(LayoutParams::default().build(), &params(25.0), 18);

        bot.transfer(&request("0:0:0", "1:0:0", 100.0, true)).unwrap();

        // Tip 18 of a 16 column rack is row 1, column 2
        assert_eq!(device.written_lines()[0], "G0 F500 X56 Y30.5");
        assert!(bot.cell(&CellAddr::new(3, 1, 2)).unwrap().empty);
        assert!(bot.cell(&CellAddr::new(3, 0, 0)).unwrap().empty);
        assert!(!bot.cell(&CellAddr::new(3, 1, 3)).unwrap().empty);
    }

    #[test]
    fn test_contents_tracking() {
        let (mut bot, _device, _delay) = bot(25.0);
        let stock_a = CellAddr::new(0, 0, 1);
        let stock_b = CellAddr::new(0, 0, 2);
        let mix = CellAddr::new(1, 2, 3);
        let out = CellAddr::new(2, 0, 0);

        bot.transfer(&request("0:0:1", "1:2:3", 150.0, true)).unwrap();
        bot.transfer(&request("0:0:2", "1:2:3", 50.0, true)).unwrap();

        let cell = bot.cell(&mix).unwrap();
        assert!(!cell.empty);
        assert_eq!(cell.kind, CellKind::Standard);
        assert_eq!(cell.position, Position::new(69.5, 44.0, 80.0));
        let content = cell.content.unwrap();
        assert_eq!(content.total(), 200.0);
        assert_eq!(content.fraction(&stock_a), 0.75);

        // Moving part of a mixture moves its components in proportion
        bot.transfer(&request("1:2:3", "2:0:0", 100.0, true)).unwrap();
        let content = bot.cell(&out).unwrap().content.unwrap();
        assert_eq!(content.components().collect::<Vec<_>>(), vec![(stock_a, 75.0), (stock_b, 25.0)]);
        assert_eq!(bot.cell(&mix).unwrap().content.unwrap().total(), 100.0);

        // Stocks are never empty, untouched wells are
        assert!(!bot.cell(&stock_a).unwrap().empty);
        assert!(bot.cell(&CellAddr::new(2, 4, 15)).unwrap().empty);
        assert!(bot.cell(&CellAddr::new(2, 5, 0)).is_err());
    }

    #[test]
    fn test_run() {
        let (mut bot, _device, _delay) = bot(25.0);

        let report = bot.run(&[
            request("0:0:0", "1:0:0", 100.0, true),
            request("0:0:0", "7:0:0", 100.0, true),
            request("0:0:0", "1:0:1", 100.0, true),
        ]);

        assert_eq!(report.responses.len(), 3);
        assert_eq!(report.responses[0], TransferResponse::Done);
        assert!(matches!(report.responses[1], TransferResponse::Rejected { .. }));
        assert_eq!(report.responses[2], TransferResponse::Done);
        assert_eq!(report.num_done(), 2);
        assert_eq!(report.num_rejected(), 1);
        assert!(report.fatal_error.is_none());
        assert_eq!(report.tip_cursor, 2);
    }

    #[test]
    fn test_run_stops_on_fatal_error() {
        let (mut bot, device, _delay) = bot(25.0);
        device.fail_writes();

        let report = bot.run(&[
            request("0:0:0", "1:0:0", 100.0, true),
            request("0:0:0", "1:0:1", 100.0, true),
        ]);

        assert!(report.responses.is_empty());
        assert!(report.fatal_error.is_some());
    }

    #[test]
    fn test_not_initialised() {
        let (transport, device) = mock::new();
        let mut bot = Bot::new(
            transport,
            LayoutParams::default().build(),
            &params(25.0),
            RecordingDelay::default(),
        );

        let e = bot.transfer(&request("0:0:0", "1:0:0", 100.0, true)).unwrap_err();
        assert!(matches!(e, BotError::NotInitialised));
        assert!(e.is_fatal());
        assert!(device.written_lines().is_empty());
    }

    #[test]
    fn test_home_and_park() {
        let (transport, device) = mock::new();
        let layout = Layout::new(vec![Matrix::new(
            CellKind::Tip,
            "tips",
            Position::new(165.0, 103.5, 73.5),
            9.0,
            9.0,
            8,
            12,
        )]);
        let mut bot = Bot::new(transport, layout, &params(25.0), RecordingDelay::default());

        bot.home_and_park().unwrap();

        let commands = device.commands();
        assert_eq!(commands[0], PipCmd::Home);
        assert_eq!(
            &device.written_lines()[1..],
            &[
                "G0 F500 X0 Y0",
                "G0 F500 Z85",
                "G0 F500 X165 Y103.5",
                "G0 F500 Z73.5",
                "G0 F500 X165 Y103.5",
                "G0 F500 Z142",
                "G0 F500 X10 Y103.5",
                "G0 F500 Z156",
                "G0 F500 X10 Y103.5",
                "G0 F500 Z85",
            ]
        );
        bot.close();
    }
}
