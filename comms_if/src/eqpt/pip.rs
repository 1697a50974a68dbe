//! # Pipetting Robot Equipment Commands
//!
//! The robot's controller speaks a small subset of G-code over the serial link. Every command is
//! a single ASCII line terminated by `\n`, and the controller answers each command with one or
//! more lines. While a long running command (homing) is executing the controller repeatedly sends
//! a line containing [`IN_PROGRESS_MARKER`].

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::fmt;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Substring of a response line which indicates the controller is still busy.
pub const IN_PROGRESS_MARKER: &str = "processing";

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A command which can be sent to the pipetting robot.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum PipCmd {
    /// `G28`: Home all axes
    Home,

    /// `G0 F<rate> X<x> Y<y>`: Horizontal move, Z is left unchanged
    MoveXy {
        feed_rate: f64,
        x_mm: f64,
        y_mm: f64,
    },

    /// `G0 F<rate> Z<z>`: Vertical move, X and Y are left unchanged
    MoveZ {
        feed_rate: f64,
        z_mm: f64,
    },

    /// `M302 S1`: Allow the actuator (an extruder as far as the firmware knows) to move cold
    AllowColdExtrusion,

    /// `M82`: Interpret actuator targets as absolute positions
    AbsoluteExtrusion,

    /// `G92 E<e>`: Redefine the actuator's current logical position
    SetActuatorPosition {
        e: f64,
    },

    /// `G1 F<rate> E<e>`: Move the actuator to the given position
    MoveActuator {
        feed_rate: f64,
        e: f64,
    },
}

/// Errors which can occur when parsing a command line.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum PipCmdParseError {
    #[error("The command line is empty")]
    Empty,

    #[error("Unrecognised command {0:?}")]
    UnknownCommand(String),

    #[error("Word {0:?} of command {1:?} is not a valid letter/number pair")]
    InvalidWord(String, String),

    #[error("Command {0:?} is missing the {1} word")]
    MissingWord(String, char),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl PipCmd {
    /// Get the line to write to the serial link, including the `\n` terminator.
    pub fn to_line(&self) -> String {
        format!("{}\n", self)
    }

    /// Parse a command from a line in the format produced by [`PipCmd::to_line`].
    ///
    /// Only the command set above is recognised. The line terminator is optional.
    pub fn from_line(line: &str) -> Result<Self, PipCmdParseError> {
        let line = line.trim();
        let mut words = line.split_whitespace();

        let code = words.next().ok_or(PipCmdParseError::Empty)?;

        // Collect the parameter words as letter/value pairs
        let mut params: Vec<(char, f64)> = Vec::new();
        for word in words {
            let mut chars = word.chars();
            let letter = chars.next().ok_or_else(|| invalid(word, line))?;
            let value: f64 = chars.as_str().parse().map_err(|_| invalid(word, line))?;
            params.push((letter.to_ascii_uppercase(), value));
        }
        let get = |letter: char| {
            params
                .iter()
                .find(|(l, _)| *l == letter)
                .map(|(_, v)| *v)
                .ok_or_else(|| PipCmdParseError::MissingWord(line.to_string(), letter))
        };
        let has = |letter: char| params.iter().any(|(l, _)| *l == letter);

        match code {
            "G28" => Ok(PipCmd::Home),
            "G0" | "G1" if has('E') => Ok(PipCmd::MoveActuator {
                feed_rate: get('F')?,
                e: get('E')?,
            }),
            "G0" | "G1" if has('Z') => Ok(PipCmd::MoveZ {
                feed_rate: get('F')?,
                z_mm: get('Z')?,
            }),
            "G0" | "G1" => Ok(PipCmd::MoveXy {
                feed_rate: get('F')?,
                x_mm: get('X')?,
                y_mm: get('Y')?,
            }),
            "M302" => Ok(PipCmd::AllowColdExtrusion),
            "M82" => Ok(PipCmd::AbsoluteExtrusion),
            "G92" => Ok(PipCmd::SetActuatorPosition { e: get('E')? }),
            _ => Err(PipCmdParseError::UnknownCommand(line.to_string())),
        }
    }
}

impl fmt::Display for PipCmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipCmd::Home => write!(f, "G28"),
            PipCmd::MoveXy { feed_rate, x_mm, y_mm } => {
                write!(f, "G0 F{} X{} Y{}", feed_rate, x_mm, y_mm)
            }
            PipCmd::MoveZ { feed_rate, z_mm } => write!(f, "G0 F{} Z{}", feed_rate, z_mm),
            PipCmd::AllowColdExtrusion => write!(f, "M302 S1"),
            PipCmd::AbsoluteExtrusion => write!(f, "M82"),
            PipCmd::SetActuatorPosition { e } => write!(f, "G92 E{}", e),
            PipCmd::MoveActuator { feed_rate, e } => write!(f, "G1 F{} E{}", feed_rate, e),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Returns true if the response line indicates the controller is still executing a command.
pub fn is_in_progress(line: &str) -> bool {
    line.contains(IN_PROGRESS_MARKER)
}

fn invalid(word: &str, line: &str) -> PipCmdParseError {
    PipCmdParseError::InvalidWord(word.to_string(), line.to_string())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_wire_format() {
        assert_eq!(PipCmd::Home.to_line(), "G28\n");
        assert_eq!(
            PipCmd::MoveXy { feed_rate: 500.0, x_mm: 69.5, y_mm: 44.0 }.to_line(),
            "G0 F500 X69.5 Y44\n"
        );
        assert_eq!(PipCmd::MoveZ { feed_rate: 500.0, z_mm: 142.0 }.to_line(), "G0 F500 Z142\n");
        assert_eq!(PipCmd::AllowColdExtrusion.to_line(), "M302 S1\n");
        assert_eq!(PipCmd::AbsoluteExtrusion.to_line(), "M82\n");
        assert_eq!(PipCmd::SetActuatorPosition { e: 0.0 }.to_line(), "G92 E0\n");
        assert_eq!(
            PipCmd::MoveActuator { feed_rate: 500.0, e: -20.0 }.to_line(),
            "G1 F500 E-20\n"
        );
    }

    #[test]
    fn test_parse() {
        assert_eq!(PipCmd::from_line("G28\n"), Ok(PipCmd::Home));
        assert_eq!(
            PipCmd::from_line("G0 F500 X69.5 Y44"),
            Ok(PipCmd::MoveXy { feed_rate: 500.0, x_mm: 69.5, y_mm: 44.0 })
        );
        assert_eq!(
            PipCmd::from_line("G0 F500 Z80\n"),
            Ok(PipCmd::MoveZ { feed_rate: 500.0, z_mm: 80.0 })
        );
        assert_eq!(
            PipCmd::from_line("G1 F500 E2.5"),
            Ok(PipCmd::MoveActuator { feed_rate: 500.0, e: 2.5 })
        );
        assert_eq!(PipCmd::from_line("M302 S1"), Ok(PipCmd::AllowColdExtrusion));
        assert_eq!(
            PipCmd::from_line("G92 E-30"),
            Ok(PipCmd::SetActuatorPosition { e: -30.0 })
        );

        assert_eq!(PipCmd::from_line("   "), Err(PipCmdParseError::Empty));
        assert_eq!(
            PipCmd::from_line("M104 S200"),
            Err(PipCmdParseError::UnknownCommand("M104 S200".into()))
        );
        assert_eq!(
            PipCmd::from_line("G0 F500 X1"),
            Err(PipCmdParseError::MissingWord("G0 F500 X1".into(), 'Y'))
        );
        assert!(matches!(
            PipCmd::from_line("G0 Fast X1 Y2"),
            Err(PipCmdParseError::InvalidWord(_, _))
        ));
    }

    #[test]
    fn test_in_progress() {
        assert!(is_in_progress("echo:busy: processing"));
        assert!(!is_in_progress("ok"));
        assert!(!is_in_progress("X:0.00 Y:0.00 Z:0.00 E:0.00 Count X:0 Y:0 Z:0"));
    }
}
