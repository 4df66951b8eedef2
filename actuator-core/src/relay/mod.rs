//! Position-tracking relay bank.
//!
//! The bank owns the ground truth for every relay channel: whether it is
//! energized, which direction it last drove, and an elapsed-time estimate of
//! how far the actuator has extended. All transitions funnel through here so
//! the paired extend/retract rows of one actuator stay mirror-synchronized
//! and position accounting survives rapid pause/resume cycling.
//!
//! Timing is injected through [`TickInstant`], so the same state machine runs
//! against an MCU tick counter or a simulated clock on the host.

use core::time::Duration;

use crate::mapping::{INPUT_MAPPINGS, Mode, RELAY_ROW_COUNT, paired_rows};

pub mod forced;

pub use forced::{FORCED_DURATION, ForcedOverride};

/// Travel limit before the bank auto-pauses an extending channel.
pub const MAX_TRAVEL: Duration = Duration::from_millis(8_000);

/// Monotonic timestamp used to measure elapsed travel time.
pub trait TickInstant: Copy {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

/// Logical drive level for a relay output.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RelayLevel {
    Energized,
    Released,
}

/// Abstraction over the physical relay outputs.
pub trait RelayDriver {
    /// Applies the requested level to the relay output pin.
    fn write(&mut self, pin: u8, level: RelayLevel);

    /// Releases every relay output to its de-energized state.
    fn release_all(&mut self);
}

/// Relay driver that performs no hardware interaction.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopRelayDriver;

impl NoopRelayDriver {
    /// Creates a new no-op relay driver.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl RelayDriver for NoopRelayDriver {
    fn write(&mut self, _: u8, _: RelayLevel) {}

    fn release_all(&mut self) {}
}

/// Per-channel state tracked by the bank.
#[derive(Copy, Clone, Debug)]
pub struct RelayState<TInstant> {
    /// Relay energized right now.
    pub is_active: bool,
    /// Last commanded direction; `Paused` when idle.
    pub mode: Mode,
    /// When the current activation began.
    pub started_at: Option<TInstant>,
    /// Accumulated extended-travel estimate, clamped to `[0, max_duration]`.
    pub position: Duration,
    /// Travel limit for this channel.
    pub max_duration: Duration,
    dirty: bool,
}

impl<TInstant> RelayState<TInstant> {
    const fn new() -> Self {
        Self {
            is_active: false,
            mode: Mode::Paused,
            started_at: None,
            position: Duration::ZERO,
            max_duration: MAX_TRAVEL,
            // Start dirty so the first report covers the initial state.
            dirty: true,
        }
    }
}

/// Position accounting shared by pause and the auto-stop check: travel adds
/// while extending and subtracts (floored at zero) while retracting.
fn travel_after(position: Duration, mode: Mode, elapsed: Duration, limit: Duration) -> Duration {
    match mode {
        Mode::Retracting => position.saturating_sub(elapsed),
        Mode::Extending => {
            let candidate = position.saturating_add(elapsed);
            if candidate > limit { limit } else { candidate }
        }
        Mode::None | Mode::Paused => position,
    }
}

/// Owns every relay channel and mediates all transitions.
pub struct RelayBank<D, TInstant>
where
    D: RelayDriver,
    TInstant: TickInstant,
{
    states: [RelayState<TInstant>; RELAY_ROW_COUNT],
    driver: D,
    forced: ForcedOverride<TInstant>,
    changed: bool,
}

impl<D, TInstant> RelayBank<D, TInstant>
where
    D: RelayDriver,
    TInstant: TickInstant,
{
    /// Creates a bank with all channels released and paused.
    #[must_use]
    pub fn new(mut driver: D) -> Self {
        driver.release_all();
        Self {
            states: [RelayState::new(); RELAY_ROW_COUNT],
            driver,
            forced: ForcedOverride::new(),
            changed: true,
        }
    }

    /// Read-only view of every channel.
    #[must_use]
    pub fn states(&self) -> &[RelayState<TInstant>; RELAY_ROW_COUNT] {
        &self.states
    }

    /// Read-only view of one channel.
    #[must_use]
    pub fn state(&self, row: usize) -> &RelayState<TInstant> {
        &self.states[row]
    }

    /// Returns `true` when any channel is energized.
    #[must_use]
    pub fn any_active(&self) -> bool {
        self.states.iter().any(|state| state.is_active)
    }

    /// Returns `true` while a forced operation is running.
    #[must_use]
    pub fn is_forced(&self) -> bool {
        self.forced.is_active()
    }

    /// Energizes `row` and mirrors direction, position, and start time onto
    /// the paired channel. No-op when the row is already active, so repeated
    /// activations never reset the running elapsed-time measurement.
    pub fn activate(&mut self, row: usize, now: TInstant) {
        if self.states[row].is_active {
            return;
        }

        let mapping = &INPUT_MAPPINGS[row];
        self.driver.write(mapping.relay_pin, RelayLevel::Energized);

        let position = self.states[row].position;
        for partner in paired_rows(row) {
            self.states[partner].is_active = true;
            self.states[partner].mode = mapping.mode;
            self.states[partner].position = position;
            self.states[partner].started_at = Some(now);
            self.mark_dirty(partner);
        }

        log::debug!(
            "activating {} row {row} ({}) at position {}ms",
            mapping.name,
            mapping.mode,
            position.as_millis()
        );
    }

    /// De-energizes `row`, folds the elapsed travel into its position, and
    /// mirrors the idle state onto the paired channel. No-op when inactive.
    pub fn pause_single(&mut self, row: usize, now: TInstant) {
        if !self.states[row].is_active {
            return;
        }

        let state = &self.states[row];
        let elapsed = state
            .started_at
            .map_or(Duration::ZERO, |started| now.saturating_duration_since(started));
        let position = travel_after(state.position, state.mode, elapsed, state.max_duration);

        // A pause can arrive through either channel of the pair, so every
        // paired relay pin is released, not just the commanded row's.
        for partner in paired_rows(row) {
            self.driver
                .write(INPUT_MAPPINGS[partner].relay_pin, RelayLevel::Released);
            self.states[partner].is_active = false;
            self.states[partner].mode = Mode::Paused;
            self.states[partner].position = position;
            self.mark_dirty(partner);
        }

        log::debug!(
            "pausing {} row {row} at position {}ms",
            INPUT_MAPPINGS[row].name,
            position.as_millis()
        );
    }

    /// Pauses every channel; used before reversing the overall direction.
    pub fn pause_all(&mut self, now: TInstant) {
        for row in 0..RELAY_ROW_COUNT {
            self.pause_single(row, now);
        }
    }

    /// Switch-driven toggle: an active channel pauses (unless forced), an
    /// idle one activates.
    pub fn control_single(&mut self, row: usize, now: TInstant) {
        if self.states[row].is_active && !self.forced.is_active() {
            self.pause_single(row, now);
        } else {
            self.activate(row, now);
        }
    }

    /// Group command over every channel matching the requested direction.
    /// A direction command while anything is moving always stops everything
    /// first (global stop), unless a forced operation is running.
    pub fn control_relays(&mut self, is_extend: bool, now: TInstant) {
        if self.any_active() && !self.forced.is_active() {
            self.pause_all(now);
            return;
        }

        for row in 0..RELAY_ROW_COUNT {
            if INPUT_MAPPINGS[row].mode.is_extending() == is_extend {
                self.activate(row, now);
            }
        }
    }

    /// Forces one channel to run, arming the override with the channel's
    /// table direction.
    pub fn force_single(&mut self, row: usize, now: TInstant) {
        self.forced
            .engage(INPUT_MAPPINGS[row].mode.is_extending(), now);
        if !self.states[row].is_active {
            self.activate(row, now);
        }
    }

    /// Forces every idle channel matching the requested direction to run.
    pub fn force_all(&mut self, is_extend: bool, now: TInstant) {
        self.forced.engage(is_extend, now);
        for row in 0..RELAY_ROW_COUNT {
            if INPUT_MAPPINGS[row].mode.is_extending() == is_extend
                && !self.states[row].is_active
            {
                self.activate(row, now);
            }
        }
    }

    /// Per-tick housekeeping: expires the forced override first, then
    /// auto-pauses any channel that has reached its travel limit. The
    /// travel-limit check is bypassed while the override runs; a retracting
    /// channel stops when its computed position reaches zero, an extending
    /// one when it would exceed `max_duration`.
    pub fn update(&mut self, now: TInstant) {
        if self.forced.is_active() && self.forced.is_expired(now) {
            log::info!("forced operation expired; pausing all actuators");
            self.forced.clear();
            self.pause_all(now);
        }

        if self.forced.is_active() {
            return;
        }

        for row in 0..RELAY_ROW_COUNT {
            let state = &self.states[row];
            if !state.is_active {
                continue;
            }

            let elapsed = state
                .started_at
                .map_or(Duration::ZERO, |started| now.saturating_duration_since(started));
            let should_stop = match state.mode {
                Mode::Retracting => state.position.saturating_sub(elapsed) == Duration::ZERO,
                Mode::Extending => state.position.saturating_add(elapsed) > state.max_duration,
                Mode::None | Mode::Paused => false,
            };

            if should_stop {
                self.pause_single(row, now);
            }
        }
    }

    /// Bank-level dirty flag: query and clear in one step.
    pub fn take_changed(&mut self) -> bool {
        let changed = self.changed;
        self.changed = false;
        changed
    }

    /// Returns `true` when `row` changed since its last report.
    #[must_use]
    pub fn row_changed(&self, row: usize) -> bool {
        self.states[row].dirty
    }

    /// Clears the per-row dirty flag once a report has covered `row`.
    pub fn clear_row_changed(&mut self, row: usize) {
        self.states[row].dirty = false;
    }

    fn mark_dirty(&mut self, row: usize) {
        self.states[row].dirty = true;
        self.changed = true;
    }
}
