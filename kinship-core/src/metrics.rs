//! Runtime counters.
//!
//! Lock-free `AtomicU64` counters bumped by the engine after each command,
//! readable as a [`CounterSnapshot`] or Prometheus exposition text.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters for engine events.
#[derive(Debug)]
pub struct KinshipCounters {
    /// Proposals made.
    pub proposals: AtomicU64,
    /// Marriages formed.
    pub marriages: AtomicU64,
    /// Divorces confirmed.
    pub divorces: AtomicU64,
    /// Kidnap attempts that passed every guard.
    pub kidnap_attempts: AtomicU64,
    /// Successful kidnappings.
    pub kidnap_successes: AtomicU64,
    /// Escape attempts.
    pub escape_attempts: AtomicU64,
    /// Successful escapes.
    pub escape_successes: AtomicU64,
    /// Conception attempts that passed every guard.
    pub conception_attempts: AtomicU64,
    /// Children born.
    pub births: AtomicU64,
    /// Commands refused by a game rule.
    pub refusals: AtomicU64,
}

impl KinshipCounters {
    /// Create a new set of zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            proposals: AtomicU64::new(0),
            marriages: AtomicU64::new(0),
            divorces: AtomicU64::new(0),
            kidnap_attempts: AtomicU64::new(0),
            kidnap_successes: AtomicU64::new(0),
            escape_attempts: AtomicU64::new(0),
            escape_successes: AtomicU64::new(0),
            conception_attempts: AtomicU64::new(0),
            births: AtomicU64::new(0),
            refusals: AtomicU64::new(0),
        }
    }

    /// Add one to `counter`.
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot all counters for export.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            proposals: self.proposals.load(Ordering::Relaxed),
            marriages: self.marriages.load(Ordering::Relaxed),
            divorces: self.divorces.load(Ordering::Relaxed),
            kidnap_attempts: self.kidnap_attempts.load(Ordering::Relaxed),
            kidnap_successes: self.kidnap_successes.load(Ordering::Relaxed),
            escape_attempts: self.escape_attempts.load(Ordering::Relaxed),
            escape_successes: self.escape_successes.load(Ordering::Relaxed),
            conception_attempts: self.conception_attempts.load(Ordering::Relaxed),
            births: self.births.load(Ordering::Relaxed),
            refusals: self.refusals.load(Ordering::Relaxed),
        }
    }
}

impl Default for KinshipCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Counter values at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Proposals made.
    pub proposals: u64,
    /// Marriages formed.
    pub marriages: u64,
    /// Divorces confirmed.
    pub divorces: u64,
    /// Kidnap attempts.
    pub kidnap_attempts: u64,
    /// Successful kidnappings.
    pub kidnap_successes: u64,
    /// Escape attempts.
    pub escape_attempts: u64,
    /// Successful escapes.
    pub escape_successes: u64,
    /// Conception attempts.
    pub conception_attempts: u64,
    /// Children born.
    pub births: u64,
    /// Refused commands.
    pub refusals: u64,
}

impl CounterSnapshot {
    /// Format as Prometheus-compatible text.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        let rows = [
            ("proposals", "Proposals made", self.proposals),
            ("marriages", "Marriages formed", self.marriages),
            ("divorces", "Divorces confirmed", self.divorces),
            ("kidnap_attempts", "Kidnap attempts past all guards", self.kidnap_attempts),
            ("kidnap_successes", "Successful kidnappings", self.kidnap_successes),
            ("escape_attempts", "Escape attempts", self.escape_attempts),
            ("escape_successes", "Successful escapes", self.escape_successes),
            (
                "conception_attempts",
                "Conception attempts past all guards",
                self.conception_attempts,
            ),
            ("births", "Children born", self.births),
            ("refusals", "Commands refused by a game rule", self.refusals),
        ];

        let mut out = String::new();
        for (name, help, value) in rows {
            let _ = write!(
                out,
                "# HELP kinship_{name}_total {help}\n\
                 # TYPE kinship_{name}_total counter\n\
                 kinship_{name}_total {value}\n"
            );
        }
        out
    }
}
