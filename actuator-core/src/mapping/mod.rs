//! Static wiring table shared by the relay bank, switch scanner, and reporter.
//!
//! Every physical actuator is driven through two relay channels (an extend
//! row and a retract row) that share the same actuator name but distinct
//! pins. Two trailing rows describe the global extend-all/retract-all
//! switches; they carry no relay channel of their own.

use core::fmt;

/// Commanded direction for a relay channel or actuator.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Mode {
    None,
    Extending,
    Retracting,
    Paused,
}

impl Mode {
    /// Returns `true` for the extending direction.
    #[must_use]
    pub const fn is_extending(self) -> bool {
        matches!(self, Mode::Extending)
    }

    /// Returns `true` for the retracting direction.
    #[must_use]
    pub const fn is_retracting(self) -> bool {
        matches!(self, Mode::Retracting)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::None => f.write_str("NONE"),
            Mode::Extending => f.write_str("EXTENDING"),
            Mode::Retracting => f.write_str("RETRACTING"),
            Mode::Paused => f.write_str("PAUSED"),
        }
    }
}

/// Metadata describing how one input row is wired on the controller board.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct InputMapping {
    /// Human-readable actuator title; shared by the paired extend/retract rows.
    pub name: &'static str,
    /// Physical switch input pin.
    pub input_pin: u8,
    /// Relay output pin; unused (zero) for global control rows.
    pub relay_pin: u8,
    /// Direction this row drives when energized.
    pub mode: Mode,
    /// `true` when the row represents a group extend/retract switch.
    pub is_global: bool,
}

impl InputMapping {
    #[must_use]
    pub const fn new(
        name: &'static str,
        input_pin: u8,
        relay_pin: u8,
        mode: Mode,
        is_global: bool,
    ) -> Self {
        Self {
            name,
            input_pin,
            relay_pin,
            mode,
            is_global,
        }
    }
}

/// Number of relay channels (two per actuator).
pub const RELAY_ROW_COUNT: usize = 8;

/// Number of physical actuators.
pub const ACTUATOR_COUNT: usize = RELAY_ROW_COUNT / 2;

/// Total input rows including the two global control switches.
pub const INPUT_ROW_COUNT: usize = RELAY_ROW_COUNT + 2;

/// Index of the extend-all switch row.
pub const EXTEND_ALL_INDEX: usize = INPUT_ROW_COUNT - 2;

/// Index of the retract-all switch row.
pub const RETRACT_ALL_INDEX: usize = INPUT_ROW_COUNT - 1;

/// Compile-time catalog of every input row. Extend rows occupy the first
/// half of the relay range, retract rows the second half.
pub const INPUT_MAPPINGS: [InputMapping; INPUT_ROW_COUNT] = [
    InputMapping::new("Actuator 1", 8, 51, Mode::Extending, false),
    InputMapping::new("Actuator 2", 7, 49, Mode::Extending, false),
    InputMapping::new("Actuator 3", 5, 47, Mode::Extending, false),
    InputMapping::new("Actuator 4", 3, 45, Mode::Extending, false),
    InputMapping::new("Actuator 1", 9, 43, Mode::Retracting, false),
    InputMapping::new("Actuator 2", 6, 41, Mode::Retracting, false),
    InputMapping::new("Actuator 3", 4, 39, Mode::Retracting, false),
    InputMapping::new("Actuator 4", 2, 37, Mode::Retracting, false),
    InputMapping::new("All Actuators", 12, 0, Mode::Extending, true),
    InputMapping::new("All Actuators", 13, 0, Mode::Retracting, true),
];

/// Iterates every relay row sharing an actuator name with `row`, including
/// `row` itself. The extend and retract channels of one actuator must stay
/// mirror-synchronized, so state transitions fan out over this set.
#[must_use]
pub fn paired_rows(row: usize) -> impl Iterator<Item = usize> {
    let name = INPUT_MAPPINGS[row].name;
    (0..RELAY_ROW_COUNT).filter(move |&candidate| INPUT_MAPPINGS[candidate].name == name)
}

/// Returns the relay row driving `pair` (1-based actuator id) in the given
/// direction, or `None` when the id is out of range.
#[must_use]
pub fn row_for_actuator(pair: u8, is_extend: bool) -> Option<usize> {
    let pair = usize::from(pair);
    if pair == 0 || pair > ACTUATOR_COUNT {
        return None;
    }
    let base = pair - 1;
    Some(if is_extend { base } else { base + ACTUATOR_COUNT })
}
