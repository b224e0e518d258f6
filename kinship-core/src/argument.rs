//! Argument window: a time-boxed quarrel between spouses.
//!
//! An argument is active while `now < start_time + duration_hours`. Expired
//! rows are simply ignored; only [`make_peace`] deletes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{KinshipError, Result};
use crate::marriage::require_marriage;
use crate::store::Tx;
use crate::types::{within_window, ArgumentId, Person, UserId};

/// An argument row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argument {
    /// Row id.
    pub id: ArgumentId,
    /// Who started it.
    pub user1: UserId,
    /// Their spouse.
    pub user2: UserId,
    /// When it started.
    pub start_time: DateTime<Utc>,
    /// Length of the window.
    pub duration_hours: i64,
}

impl Argument {
    /// Whether the window is still open at `now`.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        within_window(self.start_time, self.duration_hours, now)
    }
}

/// Result of starting an argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quarrel {
    /// The new argument.
    pub argument: Argument,
    /// The spouse on the other side.
    pub with: Person,
}

/// The user's active argument, if any.
pub(crate) fn active_argument(
    tx: &Tx<'_>,
    user: UserId,
    now: DateTime<Utc>,
) -> Result<Option<Argument>> {
    Ok(tx
        .arguments_involving(user)?
        .into_iter()
        .find(|a| a.is_active(now)))
}

/// Start an argument with the actor's spouse.
///
/// # Errors
/// [`KinshipError::NotMarried`], [`KinshipError::AlreadyArguing`].
pub fn argue(
    tx: &Tx<'_>,
    actor: UserId,
    duration_hours: i64,
    now: DateTime<Utc>,
) -> Result<Quarrel> {
    let marriage = require_marriage(tx, actor)?;
    if active_argument(tx, actor, now)?.is_some() {
        return Err(KinshipError::AlreadyArguing { user: actor });
    }

    let with = marriage.partner_of(actor).clone();
    let argument = tx.insert_argument(actor, with.id, now, duration_hours)?;
    info!(argument = %argument.id, user1 = %actor, user2 = %with.id, "Argument started");
    Ok(Quarrel { argument, with })
}

/// End the actor's active argument.
///
/// # Errors
/// [`KinshipError::NotArguing`].
pub fn make_peace(tx: &Tx<'_>, actor: UserId, now: DateTime<Utc>) -> Result<Argument> {
    let argument =
        active_argument(tx, actor, now)?.ok_or(KinshipError::NotArguing { user: actor })?;
    tx.delete_argument(argument.id)?;
    info!(argument = %argument.id, by = %actor, "Peace made");
    Ok(argument)
}
