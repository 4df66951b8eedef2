//! Panel switch scanning.
//!
//! Every row in the wiring table has a momentary switch. The scanner polls
//! them each tick and acts on rising edges only: a press on an actuator row
//! toggles that channel, a press on one of the two global rows issues a
//! group command. Debouncing lives behind [`DebouncedInput`] so the scanner
//! itself stays free of timing concerns.

use crate::mapping::{INPUT_MAPPINGS, INPUT_ROW_COUNT};
use crate::relay::{RelayBank, RelayDriver, TickInstant};

/// A debounced digital input line.
pub trait DebouncedInput {
    /// Current stable level; `true` means pressed.
    fn read(&self) -> bool;

    /// Returns `true` once per stable level change.
    fn changed(&mut self) -> bool;
}

/// Scans the full switch panel and routes presses to the relay bank.
pub struct SwitchBank<I> {
    inputs: [I; INPUT_ROW_COUNT],
}

impl<I> SwitchBank<I>
where
    I: DebouncedInput,
{
    /// Creates a scanner over one input per wiring-table row.
    #[must_use]
    pub const fn new(inputs: [I; INPUT_ROW_COUNT]) -> Self {
        Self { inputs }
    }

    /// Polls every switch once and applies any rising edges.
    pub fn poll<D, TInstant>(&mut self, bank: &mut RelayBank<D, TInstant>, now: TInstant)
    where
        D: RelayDriver,
        TInstant: TickInstant,
    {
        for row in 0..INPUT_ROW_COUNT {
            let input = &mut self.inputs[row];
            if !(input.changed() && input.read()) {
                continue;
            }

            let mapping = &INPUT_MAPPINGS[row];
            log::debug!("switch press on row {row} ({})", mapping.name);
            if mapping.is_global {
                bank.control_relays(mapping.mode.is_extending(), now);
            } else {
                bank.control_single(row, now);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{EXTEND_ALL_INDEX, Mode, RELAY_ROW_COUNT};
    use crate::relay::NoopRelayDriver;
    use crate::relay::tests::MsInstant;

    /// Scripted input that reports one press-and-hold edge when armed.
    #[derive(Default)]
    struct FakeInput {
        level: bool,
        edge: bool,
    }

    impl FakeInput {
        fn press(&mut self) {
            self.level = true;
            self.edge = true;
        }

        fn release(&mut self) {
            self.level = false;
            self.edge = true;
        }
    }

    impl DebouncedInput for FakeInput {
        fn read(&self) -> bool {
            self.level
        }

        fn changed(&mut self) -> bool {
            core::mem::take(&mut self.edge)
        }
    }

    fn switches() -> SwitchBank<FakeInput> {
        SwitchBank::new(core::array::from_fn(|_| FakeInput::default()))
    }

    #[test]
    fn rising_edge_toggles_a_single_channel() {
        let mut switches = switches();
        let mut bank = RelayBank::new(NoopRelayDriver::new());

        switches.inputs[2].press();
        switches.poll(&mut bank, MsInstant(0));
        assert!(bank.state(2).is_active);

        // Holding the switch produces no further edges.
        switches.poll(&mut bank, MsInstant(100));
        assert!(bank.state(2).is_active);

        switches.inputs[2].release();
        switches.poll(&mut bank, MsInstant(200));
        assert!(bank.state(2).is_active, "release edges are ignored");

        switches.inputs[2].press();
        switches.poll(&mut bank, MsInstant(300));
        assert!(!bank.state(2).is_active, "second press pauses the channel");
    }

    #[test]
    fn global_switch_issues_a_group_command() {
        let mut switches = switches();
        let mut bank = RelayBank::new(NoopRelayDriver::new());

        switches.inputs[EXTEND_ALL_INDEX].press();
        switches.poll(&mut bank, MsInstant(0));
        for row in 0..RELAY_ROW_COUNT {
            if INPUT_MAPPINGS[row].mode == Mode::Extending {
                assert!(bank.state(row).is_active);
            }
        }
    }
}
