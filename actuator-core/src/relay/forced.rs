//! Time-bounded forced-override mode.
//!
//! While engaged, the relay bank drives actuators without the normal
//! travel-limit auto-stop. The mode is not a toggle: it expires on its own
//! after [`FORCED_DURATION`], at which point the bank pauses everything, so
//! a stuck force command can never run a motor past its mechanical limit
//! indefinitely.

use core::time::Duration;

use super::TickInstant;

/// How long a forced operation may run before the bank reverts it.
pub const FORCED_DURATION: Duration = Duration::from_millis(5_000);

/// Bookkeeping for an in-flight forced operation.
#[derive(Copy, Clone, Debug)]
pub struct ForcedOverride<TInstant> {
    active: bool,
    started_at: Option<TInstant>,
    is_extend: bool,
}

impl<TInstant> ForcedOverride<TInstant>
where
    TInstant: TickInstant,
{
    /// Creates an inactive override.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            active: false,
            started_at: None,
            is_extend: false,
        }
    }

    /// Arms (or re-arms) the override. Re-arming restarts the expiry clock.
    pub fn engage(&mut self, is_extend: bool, now: TInstant) {
        self.active = true;
        self.is_extend = is_extend;
        self.started_at = Some(now);
    }

    /// Drops the override without touching actuator state.
    pub fn clear(&mut self) {
        self.active = false;
        self.started_at = None;
    }

    /// Returns `true` while a forced operation is running.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Direction the override was engaged with.
    #[must_use]
    pub const fn is_extend(&self) -> bool {
        self.is_extend
    }

    /// Returns `true` once the override has run for [`FORCED_DURATION`].
    /// Fires exactly at the threshold; there is no grace period.
    #[must_use]
    pub fn is_expired(&self, now: TInstant) -> bool {
        match (self.active, self.started_at) {
            (true, Some(started)) => now.saturating_duration_since(started) >= FORCED_DURATION,
            _ => false,
        }
    }
}

impl<TInstant> Default for ForcedOverride<TInstant>
where
    TInstant: TickInstant,
{
    fn default() -> Self {
        Self::new()
    }
}
