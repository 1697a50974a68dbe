//! Implementations for the LiquidCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;
use std::time::Duration;

// Internal
use super::{LiquidCtrlError, Params};
use crate::{delay::Delay, transport::Transport};
use comms_if::eqpt::pip::PipCmd;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Liquid control module state.
pub struct LiquidCtrl {
    pub(crate) params: Params,

    /// Logical actuator position, in actuator units.
    position: f64,

    state: LiquidState,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Where the actuator is in the transfer cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LiquidState {
    /// The dispenser has not been set up this session.
    NotSetUp,

    /// Ready to aspirate.
    Idle,

    /// Holding `volume`, drawn in from the idle position `base`.
    Aspirated { volume: f64, base: f64 },

    /// Dispensed, with the cushion still pushed out past `base`.
    Cushioned { base: f64 },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LiquidCtrl {
    pub fn new(params: Params) -> Self {
        Self {
            params,
            position: 0.0,
            state: LiquidState::NotSetUp,
        }
    }

    pub fn state(&self) -> LiquidState {
        self.state
    }

    /// Logical position of the actuator.
    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Put the controller into the actuator mode used by this module and zero
    /// the actuator position. Must be called once per session before any
    /// other operation.
    pub fn setup_dispenser(&mut self, transport: &mut Transport) -> Result<(), LiquidCtrlError> {
        debug!("Setting up dispenser");

        transport.send(&PipCmd::AllowColdExtrusion)?;
        transport.send(&PipCmd::AbsoluteExtrusion)?;
        transport.send(&PipCmd::SetActuatorPosition { e: 0.0 })?;

        self.position = 0.0;
        self.state = LiquidState::Idle;

        Ok(())
    }

    /// Draw `volume` into the tip.
    pub fn pickup<D: Delay>(
        &mut self,
        transport: &mut Transport,
        delay: &mut D,
        volume: f64,
    ) -> Result<(), LiquidCtrlError> {
        self.expect_state("pick up", |s| s == LiquidState::Idle)?;

        if !(volume.is_finite() && volume >= 0.0) {
            return Err(LiquidCtrlError::InvalidVolume(volume));
        }

        let base = self.position;

        debug!("Picking up {}", volume);
        self.move_to(transport, delay, base - volume / self.params.volume_per_unit)?;
        self.state = LiquidState::Aspirated { volume, base };

        Ok(())
    }

    /// Push `volume` out of the tip, followed by the cushion. `volume` must be
    /// the volume that was picked up.
    pub fn dispense<D: Delay>(
        &mut self,
        transport: &mut Transport,
        delay: &mut D,
        volume: f64,
    ) -> Result<(), LiquidCtrlError> {
        let (aspirated, base) = match self.state {
            LiquidState::Aspirated { volume, base } => (volume, base),
            state => {
                return Err(LiquidCtrlError::OutOfSequence {
                    action: "dispense",
                    state,
                })
            }
        };

        if volume != aspirated {
            return Err(LiquidCtrlError::VolumeMismatch {
                aspirated,
                requested: volume,
            });
        }

        // Targets are taken from the idle position so that rounding never
        // accumulates over cycles
        debug!("Dispensing {} with a cushion of {}", volume, self.params.cushion);
        self.move_to(
            transport,
            delay,
            base + self.params.cushion / self.params.volume_per_unit,
        )?;
        self.state = LiquidState::Cushioned { base };

        Ok(())
    }

    /// Draw the cushion back in, ready for the next pickup.
    pub fn reset_cush<D: Delay>(
        &mut self,
        transport: &mut Transport,
        delay: &mut D,
    ) -> Result<(), LiquidCtrlError> {
        let base = match self.state {
            LiquidState::Cushioned { base } => base,
            state => {
                return Err(LiquidCtrlError::OutOfSequence {
                    action: "reset the cushion",
                    state,
                })
            }
        };

        debug!("Resetting cushion");
        self.move_to(transport, delay, base)?;
        self.state = LiquidState::Idle;

        Ok(())
    }

    fn expect_state<F>(&self, action: &'static str, allowed: F) -> Result<(), LiquidCtrlError>
    where
        F: Fn(LiquidState) -> bool,
    {
        match allowed(self.state) {
            true => Ok(()),
            false => Err(LiquidCtrlError::OutOfSequence {
                action,
                state: self.state,
            }),
        }
    }

    /// Move the actuator to the absolute position `target` and let it settle.
    fn move_to<D: Delay>(
        &mut self,
        transport: &mut Transport,
        delay: &mut D,
        target: f64,
    ) -> Result<(), LiquidCtrlError> {
        transport.send(&PipCmd::MoveActuator {
            feed_rate: self.params.actuator_feed_rate,
            e: target,
        })?;
        self.position = target;

        delay.delay(Duration::from_millis(self.params.settle_ms));

        Ok(())
    }
}
