//! Kidnap subsystem.
//!
//! A kidnapping is open while `now < kidnap_time + duration_hours`. Nothing
//! sweeps expired rows: every read that comes across one deletes it, so the
//! table only ever holds rows nobody has looked at since they lapsed.
//!
//! Kidnap attempts are rate limited through [`crate::cooldown`]; escapes are
//! not.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::chance::Chance;
use crate::config::KinshipConfig;
use crate::cooldown;
use crate::error::{KinshipError, Result};
use crate::store::Tx;
use crate::types::{within_window, KidnapId, Person, Remaining, UserId};

/// A kidnapping row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kidnapping {
    /// Row id.
    pub id: KidnapId,
    /// Who holds the captive.
    pub kidnapper: Person,
    /// The captive.
    pub victim: Person,
    /// When the abduction succeeded.
    pub kidnap_time: DateTime<Utc>,
    /// How long the captive is held.
    pub duration_hours: i64,
}

impl Kidnapping {
    /// Whether the captive is still held at `now`.
    #[must_use]
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        within_window(self.kidnap_time, self.duration_hours, now)
    }

    /// When the captive goes free.
    #[must_use]
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.kidnap_time + Duration::hours(self.duration_hours)
    }

    /// Time left at `now`.
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Remaining {
        Remaining::between(now, self.ends_at())
    }
}

/// A kidnapper's place on the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KidnapStanding {
    /// The kidnapper, with the name seen at their latest success.
    pub user: Person,
    /// Successful abductions.
    pub kidnap_count: i64,
}

/// Outcome of a kidnap attempt that passed every guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum KidnapAttempt {
    /// The victim is now held.
    Captured {
        /// The new kidnapping.
        kidnapping: Kidnapping,
        /// The kidnapper's updated tally.
        kidnap_count: i64,
    },
    /// The roll failed. The cooldown was still spent.
    Missed,
}

/// Outcome of an escape attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EscapeAttempt {
    /// The captive is free.
    Escaped {
        /// The ended kidnapping.
        kidnapping: Kidnapping,
    },
    /// Still held.
    Failed {
        /// The kidnapping that continues.
        kidnapping: Kidnapping,
    },
}

/// What a kidnapper is holding right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    /// The open kidnapping.
    pub kidnapping: Kidnapping,
    /// Time until the captive goes free.
    pub remaining: Remaining,
}

/// Keep the first open row, delete every expired one.
fn first_open(
    tx: &Tx<'_>,
    rows: Vec<Kidnapping>,
    now: DateTime<Utc>,
) -> Result<Option<Kidnapping>> {
    let mut open = None;
    for row in rows {
        if row.is_open(now) {
            open.get_or_insert(row);
        } else {
            tx.delete_kidnapping(row.id)?;
            debug!(
                kidnapping = %row.id,
                victim = %row.victim.id,
                "Expired kidnapping collected"
            );
        }
    }
    Ok(open)
}

/// The open kidnapping held by `kidnapper`, collecting expired ones.
pub(crate) fn held_by(
    tx: &Tx<'_>,
    kidnapper: UserId,
    now: DateTime<Utc>,
) -> Result<Option<Kidnapping>> {
    let rows = tx.kidnappings_by_kidnapper(kidnapper)?;
    first_open(tx, rows, now)
}

/// The open kidnapping naming `victim`, collecting expired ones.
pub(crate) fn holding(
    tx: &Tx<'_>,
    victim: UserId,
    now: DateTime<Utc>,
) -> Result<Option<Kidnapping>> {
    let rows = tx.kidnappings_of_victim(victim)?;
    first_open(tx, rows, now)
}

/// Try to abduct `victim`.
///
/// Guards run in this order and the first failure wins:
/// self, spouse, cooldown, already holding, victim unmarried. Once they
/// pass, the cooldown is spent whatever the roll says.
///
/// # Errors
/// [`KinshipError::SelfTarget`], [`KinshipError::SpouseProtected`],
/// [`KinshipError::OnCooldown`], [`KinshipError::AlreadyHolding`],
/// [`KinshipError::VictimNotMarried`].
pub fn kidnap(
    tx: &Tx<'_>,
    kidnapper: &Person,
    victim: &Person,
    config: &KinshipConfig,
    chance: &mut dyn Chance,
    now: DateTime<Utc>,
) -> Result<KidnapAttempt> {
    if kidnapper.id == victim.id {
        return Err(KinshipError::SelfTarget);
    }

    let own_marriage = tx.active_marriage(kidnapper.id)?;
    if own_marriage.is_some_and(|m| m.partner_of(kidnapper.id).id == victim.id) {
        return Err(KinshipError::SpouseProtected);
    }

    let check = cooldown::can_act(tx, kidnapper.id, cooldown::KIDNAP, &config.cooldown, now)?;
    if !check.allowed {
        return Err(KinshipError::OnCooldown {
            remaining_minutes: check.remaining_minutes,
        });
    }

    if let Some(current) = held_by(tx, kidnapper.id, now)? {
        let Remaining { hours, minutes } = current.remaining(now);
        return Err(KinshipError::AlreadyHolding {
            victim: current.victim,
            hours,
            minutes,
        });
    }

    if tx.active_marriage(victim.id)?.is_none() {
        return Err(KinshipError::VictimNotMarried {
            victim: victim.clone(),
        });
    }

    cooldown::touch(tx, kidnapper.id, cooldown::KIDNAP, &config.cooldown, now)?;

    if !chance.roll(config.kidnap.success_probability) {
        debug!(kidnapper = %kidnapper.id, victim = %victim.id, "Kidnap attempt missed");
        return Ok(KidnapAttempt::Missed);
    }

    let kidnapping = tx.insert_kidnapping(kidnapper, victim, now, config.kidnap.duration_hours)?;
    let kidnap_count = tx.increment_kidnap_count(kidnapper)?;
    info!(
        kidnapping = %kidnapping.id,
        kidnapper = %kidnapper.id,
        victim = %victim.id,
        kidnap_count,
        "Victim captured"
    );
    Ok(KidnapAttempt::Captured {
        kidnapping,
        kidnap_count,
    })
}

/// Try to break free. No cooldown; repeat as often as you like.
///
/// # Errors
/// [`KinshipError::NotCaptive`].
pub fn escape(
    tx: &Tx<'_>,
    victim: UserId,
    probability: f64,
    chance: &mut dyn Chance,
    now: DateTime<Utc>,
) -> Result<EscapeAttempt> {
    let kidnapping = holding(tx, victim, now)?.ok_or(KinshipError::NotCaptive { user: victim })?;

    if !chance.roll(probability) {
        debug!(kidnapping = %kidnapping.id, "Escape attempt failed");
        return Ok(EscapeAttempt::Failed { kidnapping });
    }

    tx.delete_kidnapping(kidnapping.id)?;
    info!(kidnapping = %kidnapping.id, victim = %victim, "Captive escaped");
    Ok(EscapeAttempt::Escaped { kidnapping })
}

/// Let the captive go.
///
/// # Errors
/// [`KinshipError::NotHolding`].
pub fn release(tx: &Tx<'_>, kidnapper: UserId, now: DateTime<Utc>) -> Result<Kidnapping> {
    let kidnapping =
        held_by(tx, kidnapper, now)?.ok_or(KinshipError::NotHolding { user: kidnapper })?;
    tx.delete_kidnapping(kidnapping.id)?;
    info!(kidnapping = %kidnapping.id, kidnapper = %kidnapper, "Captive released");
    Ok(kidnapping)
}

/// Who `user` is holding and for how much longer.
///
/// # Errors
/// Database errors only.
pub fn kidnap_info(tx: &Tx<'_>, user: UserId, now: DateTime<Utc>) -> Result<Option<Holding>> {
    Ok(held_by(tx, user, now)?.map(|kidnapping| {
        let remaining = kidnapping.remaining(now);
        Holding {
            kidnapping,
            remaining,
        }
    }))
}

/// Most prolific kidnappers.
///
/// # Errors
/// Database errors only.
pub fn top_kidnappers(tx: &Tx<'_>, limit: usize) -> Result<Vec<KidnapStanding>> {
    tx.top_kidnap_counts(limit)
}
