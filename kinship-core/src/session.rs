//! Pending input modes.
//!
//! Plain chat text is only meaningful to the engine while a user is in a
//! pending mode. Everything else is ignored, so ordinary conversation never
//! gets mistaken for a command argument.

use serde::{Deserialize, Serialize};

use crate::children::{self, Child};
use crate::error::Result;
use crate::store::Tx;
use crate::types::{ChildId, UserId};

/// What the engine is waiting for from a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PendingMode {
    /// The next plain-text message names this child.
    AwaitingChildName {
        /// The child being named.
        child: ChildId,
    },
}

/// What a plain-text message did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum TextEffect {
    /// No mode was pending; the text was left alone.
    Ignored,
    /// The text named a child.
    ChildNamed {
        /// The child with its new name.
        child: Child,
    },
}

/// The user's pending mode, if any.
///
/// # Errors
/// Database errors only.
pub fn pending_mode(tx: &Tx<'_>, user: UserId) -> Result<Option<PendingMode>> {
    Ok(tx
        .naming_session(user)?
        .map(|s| PendingMode::AwaitingChildName { child: s.child }))
}

/// Route a plain-text message according to the user's pending mode.
///
/// # Errors
/// Whatever the pending mode's handler refuses with.
pub fn consume_text(
    tx: &Tx<'_>,
    user: UserId,
    text: &str,
    max_name_chars: usize,
) -> Result<TextEffect> {
    match pending_mode(tx, user)? {
        None => Ok(TextEffect::Ignored),
        Some(PendingMode::AwaitingChildName { .. }) => {
            Ok(children::consume_name_input(tx, user, text, max_name_chars)?
                .map_or(TextEffect::Ignored, |child| TextEffect::ChildNamed { child }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PersistenceConfig;
    use crate::store::Store;
    use crate::types::Person;
    use chrono::{TimeZone, Utc};

    #[test]
    fn text_is_ignored_without_a_mode() {
        let store = Store::open_in_memory(&PersistenceConfig::default()).expect("open");
        let effect = store
            .transaction("t", |tx| consume_text(tx, UserId(1), "hello there", 64))
            .expect("consume");
        assert_eq!(effect, TextEffect::Ignored);
    }

    #[test]
    fn naming_session_shows_as_pending_mode() {
        let store = Store::open_in_memory(&PersistenceConfig::default()).expect("open");
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("valid date");
        let child = store
            .transaction("seed", |tx| {
                let m = tx.insert_marriage(
                    &Person::new(UserId(1), "Alice"),
                    &Person::new(UserId(2), "Bob"),
                    now,
                )?;
                let child = tx.insert_child(&m, now)?;
                tx.open_naming(UserId(1), child.id)?;
                Ok(child)
            })
            .expect("seed");

        let mode = store.transaction("t", |tx| pending_mode(tx, UserId(1))).expect("mode");
        assert_eq!(mode, Some(PendingMode::AwaitingChildName { child: child.id }));
        let mode = store.transaction("t", |tx| pending_mode(tx, UserId(2))).expect("mode");
        assert_eq!(mode, None);

        let effect = store
            .transaction("t", |tx| consume_text(tx, UserId(1), "Max", 64))
            .expect("consume");
        assert!(matches!(
            effect,
            TextEffect::ChildNamed { child } if child.name.as_deref() == Some("Max")
        ));
        let mode = store.transaction("t", |tx| pending_mode(tx, UserId(1))).expect("mode");
        assert_eq!(mode, None);
    }
}
