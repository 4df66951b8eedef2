//! Serial command grammar and dispatch.
//!
//! The host drives the controller with single-line commands of the form
//! `<ACTION> <TARGET>`: an action verb (`EXTEND`/`RETRACT`, with the longer
//! `EXTENDING`/`RETRACTING` spellings accepted), then either `ALL` or a
//! 1-based actuator number. Matching is case-insensitive and surrounding
//! whitespace is ignored.

use core::fmt;

use winnow::ModalResult;
use winnow::Parser;
use winnow::ascii::{Caseless, digit1, space1};
use winnow::combinator::alt;
use winnow::token::literal;

use crate::mapping::{self, ACTUATOR_COUNT};
use crate::relay::{RelayBank, RelayDriver, TickInstant};

/// Direction verb of a command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Action {
    Extend,
    Retract,
}

impl Action {
    /// Returns `true` for the extending direction.
    #[must_use]
    pub const fn is_extend(self) -> bool {
        matches!(self, Action::Extend)
    }
}

/// Which actuators a command addresses.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CommandTarget {
    /// Every actuator at once.
    All,
    /// One actuator, by 1-based number.
    Actuator(u8),
}

/// A fully parsed command line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ActuatorCommand {
    pub action: Action,
    pub target: CommandTarget,
}

/// Failure to parse a command line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CommandError {
    /// The line did not match the grammar; `offset` is the byte position
    /// where matching failed within the trimmed line.
    Syntax { offset: usize },
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Syntax { offset } => {
                write!(f, "unrecognized command at byte {offset}")
            }
        }
    }
}

impl core::error::Error for CommandError {}

fn action(input: &mut &str) -> ModalResult<Action> {
    // Longest spellings first so EXTEND does not clip EXTENDING.
    alt((
        literal(Caseless("EXTENDING")).value(Action::Extend),
        literal(Caseless("EXTEND")).value(Action::Extend),
        literal(Caseless("RETRACTING")).value(Action::Retract),
        literal(Caseless("RETRACT")).value(Action::Retract),
    ))
    .parse_next(input)
}

fn target(input: &mut &str) -> ModalResult<CommandTarget> {
    alt((
        literal(Caseless("ALL")).value(CommandTarget::All),
        digit1
            .try_map(str::parse::<u8>)
            .verify(|&n| n >= 1 && usize::from(n) <= ACTUATOR_COUNT)
            .map(CommandTarget::Actuator),
    ))
    .parse_next(input)
}

fn command(input: &mut &str) -> ModalResult<ActuatorCommand> {
    (action, space1, target)
        .map(|(action, _, target)| ActuatorCommand { action, target })
        .parse_next(input)
}

/// Parses one command line.
///
/// # Errors
///
/// Returns [`CommandError::Syntax`] when the line does not match the
/// grammar, including out-of-range actuator numbers.
pub fn parse(line: &str) -> Result<ActuatorCommand, CommandError> {
    command
        .parse(line.trim_ascii())
        .map_err(|err| CommandError::Syntax {
            offset: err.offset(),
        })
}

/// Applies a parsed command to the relay bank.
pub fn dispatch<D, TInstant>(
    bank: &mut RelayBank<D, TInstant>,
    command: &ActuatorCommand,
    now: TInstant,
) where
    D: RelayDriver,
    TInstant: TickInstant,
{
    match command.target {
        CommandTarget::All => bank.control_relays(command.action.is_extend(), now),
        CommandTarget::Actuator(pair) => {
            match mapping::row_for_actuator(pair, command.action.is_extend()) {
                Some(row) => bank.control_single(row, now),
                None => log::warn!("ignoring command for unknown actuator {pair}"),
            }
        }
    }
}
