//! Core type definitions shared by every subsystem.
//!
//! Identity newtypes, the [`Person`] handle the adapter passes in, the
//! two-way [`Choice`] used to resolve prompts, 1-based [`Position`]s and the
//! [`Remaining`] time split.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{KinshipError, Result};

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

row_id!(
    /// Chat-platform user id, assigned by the adapter.
    UserId
);
row_id!(
    /// Row id of a marriage (active or historical).
    MarriageId
);
row_id!(
    /// Row id of an outstanding proposal.
    ProposalId
);
row_id!(
    /// Row id of an argument.
    ArgumentId
);
row_id!(
    /// Row id of a kidnapping.
    KidnapId
);
row_id!(
    /// Stable row id of a child. Never reused, unlike display positions.
    ChildId
);

/// A user as the adapter sees them: id plus current display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Person {
    /// Platform user id.
    pub id: UserId,
    /// Display name at the time of the command.
    pub name: String,
}

impl Person {
    /// Build a person handle.
    #[must_use]
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

/// Answer to a two-choice prompt (proposal, divorce confirmation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Choice {
    /// "Yes".
    Accept,
    /// "No".
    Decline,
}

impl Choice {
    /// Parse the adapter's button payload (`yes` / `no`).
    ///
    /// # Errors
    /// Returns [`KinshipError::InvalidArgument`] for anything else.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "yes" | "y" | "accept" => Ok(Self::Accept),
            "no" | "n" | "decline" => Ok(Self::Decline),
            other => Err(KinshipError::InvalidArgument(format!(
                "expected yes or no, got {other:?}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Positions
// ---------------------------------------------------------------------------

/// 1-based position in a request-time listing (e.g. "child number 2").
///
/// Positions are a view, not an identity: removing an earlier entry shifts
/// every later position down by one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position(pub usize);

impl Position {
    /// Parse a positional argument typed by a user.
    ///
    /// # Errors
    /// Returns [`KinshipError::InvalidArgument`] if `raw` is not an integer.
    /// Zero and negative numbers parse and are rejected later as
    /// [`KinshipError::InvalidIndex`], matching out-of-range handling.
    pub fn parse(raw: &str) -> Result<Self> {
        let value: i64 = raw
            .trim()
            .parse()
            .map_err(|_| KinshipError::InvalidArgument(format!("not a number: {raw:?}")))?;
        Ok(Self(usize::try_from(value).unwrap_or(0)))
    }

    /// Resolve against a list of `len` items, returning the 0-based index.
    ///
    /// # Errors
    /// Returns [`KinshipError::InvalidIndex`] outside `[1, len]`.
    pub fn index_in(self, len: usize) -> Result<usize> {
        if self.0 == 0 || self.0 > len {
            return Err(KinshipError::InvalidIndex {
                position: self.0,
                len,
            });
        }
        Ok(self.0 - 1)
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// Time left in a window, split the way it is shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remaining {
    /// Whole hours.
    pub hours: i64,
    /// Whole minutes after the hours.
    pub minutes: i64,
}

impl Remaining {
    /// Split `until - now` into hours and minutes, flooring seconds.
    /// Past deadlines yield zero.
    #[must_use]
    pub fn between(now: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        let secs = (until - now).num_seconds().max(0);
        Self {
            hours: secs / 3600,
            minutes: (secs % 3600) / 60,
        }
    }
}

/// `true` while `now` lies inside `[start, start + hours)`.
#[must_use]
pub fn within_window(start: DateTime<Utc>, hours: i64, now: DateTime<Utc>) -> bool {
    now < start + Duration::hours(hours)
}

/// Whole days elapsed since `since` (floor; never negative).
#[must_use]
pub fn whole_days(since: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - since).num_days().max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("valid date")
    }

    #[test]
    fn position_parsing() {
        assert_eq!(Position::parse(" 2 ").expect("parse"), Position(2));
        assert_eq!(Position::parse("-1").expect("parse"), Position(0));
        assert!(matches!(
            Position::parse("two"),
            Err(KinshipError::InvalidArgument(_))
        ));
    }

    #[test]
    fn position_bounds() {
        assert_eq!(Position(1).index_in(3).expect("in range"), 0);
        assert_eq!(Position(3).index_in(3).expect("in range"), 2);
        assert!(matches!(
            Position(0).index_in(3),
            Err(KinshipError::InvalidIndex { position: 0, len: 3 })
        ));
        assert!(matches!(
            Position(4).index_in(3),
            Err(KinshipError::InvalidIndex { position: 4, len: 3 })
        ));
    }

    #[test]
    fn choice_parsing() {
        assert_eq!(Choice::parse("yes").expect("yes"), Choice::Accept);
        assert_eq!(Choice::parse("NO").expect("no"), Choice::Decline);
        assert!(Choice::parse("maybe").is_err());
    }

    #[test]
    fn remaining_floors_to_minutes() {
        let end = t0() + Duration::hours(6);
        let now = t0() + Duration::minutes(1) + Duration::seconds(30);
        assert_eq!(
            Remaining::between(now, end),
            Remaining { hours: 5, minutes: 58 }
        );
        assert_eq!(
            Remaining::between(end + Duration::hours(1), end),
            Remaining { hours: 0, minutes: 0 }
        );
    }

    #[test]
    fn window_is_half_open() {
        assert!(within_window(t0(), 6, t0() + Duration::minutes(359)));
        assert!(!within_window(t0(), 6, t0() + Duration::hours(6)));
    }

    #[test]
    fn days_are_floored() {
        assert_eq!(whole_days(t0(), t0() + Duration::hours(23)), 0);
        assert_eq!(whole_days(t0(), t0() + Duration::hours(24)), 1);
        assert_eq!(whole_days(t0(), t0() + Duration::hours(71)), 2);
    }
}
