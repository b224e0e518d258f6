//! Per-user rate limiting.
//!
//! Under [`CooldownPolicy::SharedPerUser`] a user has a single record, and
//! touching any command replaces it: a second rate-limited command would
//! clobber the first one's timestamp. Only `kidnap` is rate limited today,
//! so the overlap is latent. [`CooldownPolicy::PerCommand`] keys records by
//! `(user, command)` instead.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{CooldownConfig, CooldownPolicy};
use crate::error::Result;
use crate::store::Tx;
use crate::types::UserId;

/// Command name used for kidnap attempts.
pub const KIDNAP: &str = "kidnap";

const SHARED_SCOPE: &str = "*";

/// A stored cooldown marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownRecord {
    /// Owner.
    pub user: UserId,
    /// The command that last touched this record.
    pub command: String,
    /// When it was touched.
    pub last_used: DateTime<Utc>,
}

/// Answer to "may this user run the command now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownCheck {
    /// `true` when the window has passed (or was never opened).
    pub allowed: bool,
    /// Whole minutes left, floored; 0 when allowed.
    pub remaining_minutes: i64,
}

impl CooldownCheck {
    const ALLOWED: Self = Self {
        allowed: true,
        remaining_minutes: 0,
    };
}

fn scope(policy: CooldownPolicy, command: &str) -> &str {
    match policy {
        CooldownPolicy::SharedPerUser => SHARED_SCOPE,
        CooldownPolicy::PerCommand => command,
    }
}

/// The record `command` would be checked against.
///
/// # Errors
/// Database errors only.
pub fn record(
    tx: &Tx<'_>,
    user: UserId,
    command: &str,
    config: &CooldownConfig,
) -> Result<Option<CooldownRecord>> {
    tx.cooldown(user, scope(config.policy, command))
}

/// Check whether `user` may run `command` at `now`.
///
/// # Errors
/// Database errors only.
pub fn can_act(
    tx: &Tx<'_>,
    user: UserId,
    command: &str,
    config: &CooldownConfig,
    now: DateTime<Utc>,
) -> Result<CooldownCheck> {
    let Some(record) = record(tx, user, command, config)? else {
        return Ok(CooldownCheck::ALLOWED);
    };

    let window = Duration::minutes(config.window_minutes);
    let elapsed = now - record.last_used;
    if elapsed >= window {
        return Ok(CooldownCheck::ALLOWED);
    }

    let remaining_minutes = (window - elapsed).num_minutes();
    debug!(
        user = %user,
        command,
        last_command = %record.command,
        remaining_minutes,
        "Cooldown active"
    );
    Ok(CooldownCheck {
        allowed: false,
        remaining_minutes,
    })
}

/// Stamp `user`'s use of `command` at `now`.
///
/// # Errors
/// Database errors only.
pub fn touch(
    tx: &Tx<'_>,
    user: UserId,
    command: &str,
    config: &CooldownConfig,
    now: DateTime<Utc>,
) -> Result<()> {
    tx.upsert_cooldown(user, scope(config.policy, command), command, now)
}
