use core::time::Duration;

use actuator_core::command;
use actuator_core::decode::StatusMonitor;
use actuator_core::mapping::{INPUT_MAPPINGS, INPUT_ROW_COUNT, RELAY_ROW_COUNT};
use actuator_core::relay::{NoopRelayDriver, RelayBank, TickInstant};
use actuator_core::report;

pub const HELP_TOPICS: &[(&str, &str)] = &[
    (
        "extend",
        "extend <1-4|all>     - toggle extension for one actuator or the group",
    ),
    (
        "retract",
        "retract <1-4|all>    - toggle retraction for one actuator or the group",
    ),
    (
        "force",
        "force extend|retract - run the group past limits for a bounded time",
    ),
    (
        "switch",
        "switch <row>         - simulate a panel switch press (rows 0-9)",
    ),
    (
        "tick",
        "tick [ms]            - advance the simulated clock (default 100ms)",
    ),
    (
        "noise",
        "noise                - inject garbage bytes into the status link",
    ),
    (
        "status",
        "status               - show the receiver's view of every channel",
    ),
    ("help", "help [topic]         - show help for a command"),
];

/// Simulated millisecond clock driven by `tick`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SimInstant(u64);

impl TickInstant for SimInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

/// Both ends of the rig in one process: the controller (relay bank and
/// reporter) and the receiver (status monitor), joined by an in-memory
/// byte link that `tick` pumps.
pub struct Session {
    bank: RelayBank<NoopRelayDriver, SimInstant>,
    monitor: StatusMonitor,
    clock_ms: u64,
    link: Vec<u8>,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self {
            bank: RelayBank::new(NoopRelayDriver::new()),
            monitor: StatusMonitor::new(),
            clock_ms: 0,
            link: Vec::new(),
        }
    }

    pub fn handle_command(&mut self, line: &str) -> Vec<String> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }

        if trimmed.eq_ignore_ascii_case("help") {
            return Self::handle_help(None);
        }
        if let Some(rest) = trimmed.strip_prefix("help ") {
            return Self::handle_help(Some(rest.trim()));
        }
        if trimmed.eq_ignore_ascii_case("status") {
            return self.handle_status();
        }
        if trimmed.eq_ignore_ascii_case("noise") {
            return self.handle_noise();
        }
        if trimmed.eq_ignore_ascii_case("tick") {
            return self.handle_tick(100);
        }
        if let Some(rest) = strip_verb(trimmed, "tick") {
            return match rest.parse::<u64>() {
                Ok(ms) => self.handle_tick(ms),
                Err(_) => vec![format!("ERR tick expects a millisecond count, got `{rest}`")],
            };
        }
        if let Some(rest) = strip_verb(trimmed, "force") {
            return self.handle_force(rest);
        }
        if let Some(rest) = strip_verb(trimmed, "switch") {
            return self.handle_switch(rest);
        }

        // Everything else is the controller's own serial grammar.
        match command::parse(trimmed) {
            Ok(parsed) => {
                let now = self.now();
                command::dispatch(&mut self.bank, &parsed, now);
                self.pump_reports();
                vec![format!(
                    "OK {:?} {:?} at=+{}ms",
                    parsed.action, parsed.target, self.clock_ms
                )]
            }
            Err(err) => vec![
                format!("ERR {err}"),
                "Type `help` for the available commands.".to_string(),
            ],
        }
    }

    fn handle_help(topic: Option<&str>) -> Vec<String> {
        let mut lines = Vec::new();
        match topic {
            Some(target) if !target.is_empty() => {
                if let Some((_, detail)) = HELP_TOPICS
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(target))
                {
                    lines.push((*detail).to_string());
                } else {
                    lines.push(format!("No help available for `{target}`."));
                }
            }
            _ => {
                lines.push("Available commands:".to_string());
                for (_, detail) in HELP_TOPICS {
                    lines.push(format!("  {detail}"));
                }
                lines.push("Type `help <topic>` for a specific command.".to_string());
            }
        }
        lines
    }

    fn handle_tick(&mut self, ms: u64) -> Vec<String> {
        self.clock_ms = self.clock_ms.saturating_add(ms);
        self.bank.update(self.now());
        let merged = self.pump_reports();
        vec![format!(
            "clock=+{}ms active={} forced={} reports-merged={merged}",
            self.clock_ms,
            self.bank.any_active(),
            self.bank.is_forced(),
        )]
    }

    fn handle_force(&mut self, direction: &str) -> Vec<String> {
        let is_extend = if direction.eq_ignore_ascii_case("extend") {
            true
        } else if direction.eq_ignore_ascii_case("retract") {
            false
        } else {
            return vec![format!("ERR force expects extend or retract, got `{direction}`")];
        };

        self.bank.force_all(is_extend, self.now());
        self.pump_reports();
        vec![format!(
            "OK forced {} at=+{}ms",
            if is_extend { "extend" } else { "retract" },
            self.clock_ms
        )]
    }

    fn handle_switch(&mut self, row: &str) -> Vec<String> {
        let Ok(row) = row.parse::<usize>() else {
            return vec![format!("ERR switch expects a row number, got `{row}`")];
        };
        if row >= INPUT_ROW_COUNT {
            return vec![format!("ERR no switch row {row} (rows are 0-{})", INPUT_ROW_COUNT - 1)];
        }

        let mapping = &INPUT_MAPPINGS[row];
        if mapping.is_global {
            self.bank
                .control_relays(mapping.mode.is_extending(), self.now());
        } else {
            self.bank.control_single(row, self.now());
        }
        self.pump_reports();
        vec![format!("OK switch row {row} ({})", mapping.name)]
    }

    fn handle_noise(&mut self) -> Vec<String> {
        self.link
            .extend_from_slice(b"\x00\xff\x7f#### line noise {\"actu ####");
        vec!["injected garbage into the status link".to_string()]
    }

    fn handle_status(&mut self) -> Vec<String> {
        let store = self.monitor.store();
        let mut lines = Vec::with_capacity(RELAY_ROW_COUNT + 2);
        lines.push(format!(
            "receiver state (last report +{}ms, force={})",
            store.last_timestamp(),
            store.force_mode()
        ));
        lines.push("row  name           mode        position  active".to_string());
        for row in 0..RELAY_ROW_COUNT {
            let entry = store.actuator(row);
            if entry.seen {
                lines.push(format!(
                    "{row:>3}  {:<13}  {:<10}  {:>6}ms  {}",
                    entry.name, entry.mode, entry.position, entry.active
                ));
            } else {
                lines.push(format!("{row:>3}  (no report yet)"));
            }
        }
        lines
    }

    fn now(&self) -> SimInstant {
        SimInstant(self.clock_ms)
    }

    /// Drains pending change reports from the controller side through the
    /// in-memory link into the receiver, returning merged document count.
    fn pump_reports(&mut self) -> usize {
        match report::encode_changed(&mut self.bank, self.clock_ms) {
            Ok(Some(frame)) => self.link.extend_from_slice(frame.as_bytes()),
            Ok(None) => {}
            Err(err) => log::error!("status encoding failed: {err}"),
        }

        let mut merged = 0;
        // Feed in small chunks so the reassembly path is exercised.
        for chunk in self.link.chunks(16) {
            merged += self.monitor.ingest(chunk);
        }
        self.link.clear();
        merged
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

fn strip_verb<'a>(line: &'a str, verb: &str) -> Option<&'a str> {
    let head = line.get(..verb.len())?;
    if !head.eq_ignore_ascii_case(verb) {
        return None;
    }
    let rest = &line[verb.len()..];
    if !rest.is_empty() && !rest.starts_with(' ') {
        return None;
    }
    Some(rest.trim())
}
