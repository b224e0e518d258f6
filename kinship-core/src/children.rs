//! Child registry: conception, naming, aging and disposal.
//!
//! Children are addressed two ways. Internally every child has a stable
//! [`ChildId`]. Users refer to them by 1-based [`Position`] in the
//! creation-ordered listing, recomputed on each request, so positions shift
//! when an earlier child is sheltered.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::argument::active_argument;
use crate::chance::Chance;
use crate::error::{KinshipError, Result};
use crate::kidnap::holding;
use crate::marriage::{require_marriage, Marriage};
use crate::store::Tx;
use crate::types::{ChildId, MarriageId, Position, UserId};

/// A child row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Child {
    /// Stable id.
    pub id: ChildId,
    /// The marriage that conceived it.
    pub marriage_id: MarriageId,
    /// First parent.
    pub parent1: UserId,
    /// Second parent.
    pub parent2: UserId,
    /// `None` until named.
    pub name: Option<String>,
    /// Years; only [`high_child`] and [`high_all_children`] change it.
    pub age: i64,
    /// Conception instant; defines display order.
    pub created_date: DateTime<Utc>,
}

impl Child {
    /// Whether `user` is one of the parents.
    #[must_use]
    pub fn has_parent(&self, user: UserId) -> bool {
        self.parent1 == user || self.parent2 == user
    }
}

/// A child together with its position in the current listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildView {
    /// 1-based position at the time of the request.
    pub position: Position,
    /// The child.
    pub child: Child,
}

/// A pending "type the child's name" session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingSession {
    /// The parent who will type the name.
    pub user: UserId,
    /// The child to name.
    pub child: ChildId,
    /// Scratch text; unused by the handshake itself.
    pub temp_name: String,
}

/// Outcome of [`make_love`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Conception {
    /// A child was born; prompt the parent to name it.
    Born {
        /// The couple.
        marriage: Marriage,
        /// The newborn, unnamed.
        child: Child,
    },
    /// Not this time.
    NotConceived,
}

/// Outcome of [`name_child`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NamingStep {
    /// Named on the spot.
    Named {
        /// The renamed child.
        child: Child,
    },
    /// The next plain-text message from the parent will be the name.
    AwaitingName {
        /// The child being named.
        child: ChildId,
    },
}

/// Try for a baby.
///
/// # Errors
/// [`KinshipError::NotMarried`], [`KinshipError::CoupleArguing`] if either
/// spouse is in an active argument, [`KinshipError::PartnerCaptive`] if
/// either is held captive.
pub fn make_love(
    tx: &Tx<'_>,
    actor: UserId,
    probability: f64,
    chance: &mut dyn Chance,
    now: DateTime<Utc>,
) -> Result<Conception> {
    let marriage = require_marriage(tx, actor)?;
    let partner = marriage.partner_of(actor).id;

    for spouse in [actor, partner] {
        if active_argument(tx, spouse, now)?.is_some() {
            return Err(KinshipError::CoupleArguing);
        }
    }
    for spouse in [actor, partner] {
        if holding(tx, spouse, now)?.is_some() {
            return Err(KinshipError::PartnerCaptive { captive: spouse });
        }
    }

    if !chance.roll(probability) {
        debug!(marriage = %marriage.id, "No conception");
        return Ok(Conception::NotConceived);
    }

    let child = tx.insert_child(&marriage, now)?;
    info!(child = %child.id, marriage = %marriage.id, "Child born");
    Ok(Conception::Born { marriage, child })
}

/// Name a child now, or open a session so the next message names it.
///
/// `inline` of `None` or blank text opens the session, replacing any
/// session the actor already had.
///
/// # Errors
/// [`KinshipError::ChildNotFound`] unless the actor is a parent;
/// [`KinshipError::InvalidArgument`] for an over-long inline name.
pub fn name_child(
    tx: &Tx<'_>,
    actor: UserId,
    child: ChildId,
    inline: Option<&str>,
    max_name_chars: usize,
) -> Result<NamingStep> {
    let found = owned_child(tx, actor, child)?;

    match inline.map(str::trim).filter(|s| !s.is_empty()) {
        Some(name) => {
            let child = apply_name(tx, found, name, max_name_chars)?;
            Ok(NamingStep::Named { child })
        }
        None => {
            tx.open_naming(actor, child)?;
            debug!(user = %actor, child = %child, "Naming session opened");
            Ok(NamingStep::AwaitingName { child })
        }
    }
}

/// Feed `text` to the actor's naming session.
///
/// Returns `None` when no session is pending.
///
/// # Errors
/// [`KinshipError::InvalidArgument`] for blank or over-long text (the
/// session stays open). [`KinshipError::ChildNotFound`] if the child is gone
/// (the session is discarded).
pub fn consume_name_input(
    tx: &Tx<'_>,
    actor: UserId,
    text: &str,
    max_name_chars: usize,
) -> Result<Option<Child>> {
    let Some(session) = tx.naming_session(actor)? else {
        return Ok(None);
    };

    let Some(child) = tx.child(session.child)?.filter(|c| c.has_parent(actor)) else {
        tx.close_naming(actor)?;
        return Err(KinshipError::ChildNotFound(session.child));
    };

    let child = apply_name(tx, child, text.trim(), max_name_chars)?;
    tx.close_naming(actor)?;
    Ok(Some(child))
}

/// Every child of the actor, with current positions.
///
/// # Errors
/// Database errors only.
pub fn list_children(tx: &Tx<'_>, actor: UserId) -> Result<Vec<ChildView>> {
    Ok(tx
        .children_of(actor)?
        .into_iter()
        .enumerate()
        .map(|(i, child)| ChildView {
            position: Position(i + 1),
            child,
        })
        .collect())
}

/// Age the child at `position` by a year.
///
/// # Errors
/// [`KinshipError::InvalidIndex`].
pub fn high_child(tx: &Tx<'_>, actor: UserId, position: Position) -> Result<ChildView> {
    let mut view = at_position(tx, actor, position)?;
    tx.age_child(view.child.id)?;
    view.child.age += 1;
    debug!(child = %view.child.id, age = view.child.age, "Child aged");
    Ok(view)
}

/// Age every child of the actor by a year. An empty family is not an error.
///
/// # Errors
/// Database errors only.
pub fn high_all_children(tx: &Tx<'_>, actor: UserId) -> Result<Vec<ChildView>> {
    let aged = tx.age_children_of(actor)?;
    debug!(user = %actor, aged, "Children aged");
    list_children(tx, actor)
}

/// Feed the child at `position`. Nothing is stored.
///
/// # Errors
/// [`KinshipError::InvalidIndex`].
pub fn feed_child(tx: &Tx<'_>, actor: UserId, position: Position) -> Result<ChildView> {
    at_position(tx, actor, position)
}

/// Feed every child. Nothing is stored.
///
/// # Errors
/// Database errors only.
pub fn feed_all_children(tx: &Tx<'_>, actor: UserId) -> Result<Vec<ChildView>> {
    list_children(tx, actor)
}

/// Give up the child at `position` for good. Later positions shift down.
///
/// # Errors
/// [`KinshipError::InvalidIndex`].
pub fn shelter(tx: &Tx<'_>, actor: UserId, position: Position) -> Result<ChildView> {
    let view = at_position(tx, actor, position)?;
    tx.delete_child(view.child.id)?;
    info!(child = %view.child.id, by = %actor, "Child sheltered");
    Ok(view)
}

fn at_position(tx: &Tx<'_>, actor: UserId, position: Position) -> Result<ChildView> {
    let mut children = tx.children_of(actor)?;
    let idx = position.index_in(children.len())?;
    Ok(ChildView {
        position,
        child: children.swap_remove(idx),
    })
}

fn owned_child(tx: &Tx<'_>, actor: UserId, id: ChildId) -> Result<Child> {
    tx.child(id)?
        .filter(|c| c.has_parent(actor))
        .ok_or(KinshipError::ChildNotFound(id))
}

fn apply_name(tx: &Tx<'_>, mut child: Child, name: &str, max_name_chars: usize) -> Result<Child> {
    if name.is_empty() {
        return Err(KinshipError::InvalidArgument("name is empty".into()));
    }
    let len = name.chars().count();
    if len > max_name_chars {
        return Err(KinshipError::InvalidArgument(format!(
            "name is {len} characters, the limit is {max_name_chars}"
        )));
    }

    tx.rename_child(child.id, name)?;
    child.name = Some(name.to_owned());
    info!(child = %child.id, child_name = name, "Child named");
    Ok(child)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chance::FixedChance;
    use crate::config::PersistenceConfig;
    use crate::store::Store;
    use crate::types::Person;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("valid date")
    }

    fn family() -> Store {
        let store = Store::open_in_memory(&PersistenceConfig::default()).expect("open");
        store
            .transaction("seed", |tx| {
                tx.insert_marriage(
                    &Person::new(UserId(1), "Alice"),
                    &Person::new(UserId(2), "Bob"),
                    t0(),
                )
            })
            .expect("seed");
        store
    }

    fn conceive(store: &Store, at: DateTime<Utc>) -> Child {
        let outcome = store
            .transaction("t", |tx| make_love(tx, UserId(1), 0.1, &mut FixedChance::ALWAYS, at))
            .expect("make love");
        match outcome {
            Conception::Born { child, .. } => child,
            Conception::NotConceived => panic!("fixed chance"),
        }
    }

    #[test]
    fn conception_requires_marriage_and_peace() {
        let store = family();
        let err = store
            .transaction("t", |tx| make_love(tx, UserId(9), 0.1, &mut FixedChance::ALWAYS, t0()))
            .expect_err("single");
        assert!(matches!(err, KinshipError::NotMarried { .. }));

        store
            .transaction("t", |tx| tx.insert_argument(UserId(2), UserId(1), t0(), 24))
            .expect("argue");
        let err = store
            .transaction("t", |tx| make_love(tx, UserId(1), 0.1, &mut FixedChance::ALWAYS, t0()))
            .expect_err("arguing");
        assert!(matches!(err, KinshipError::CoupleArguing));

        let child = conceive(&store, t0() + Duration::hours(25));
        assert_eq!(child.age, 0);
        assert!(child.name.is_none());
        assert!(child.has_parent(UserId(2)));
    }

    #[test]
    fn captive_partner_blocks_conception() {
        let store = family();
        store
            .transaction("t", |tx| {
                tx.insert_kidnapping(
                    &Person::new(UserId(7), "Mallory"),
                    &Person::new(UserId(2), "Bob"),
                    t0(),
                    6,
                )
            })
            .expect("capture");

        let err = store
            .transaction("t", |tx| make_love(tx, UserId(1), 0.1, &mut FixedChance::ALWAYS, t0()))
            .expect_err("captive");
        assert!(matches!(err, KinshipError::PartnerCaptive { captive } if captive == UserId(2)));

        conceive(&store, t0() + Duration::hours(6));
    }

    #[test]
    fn failed_roll_creates_nothing() {
        let store = family();
        let outcome = store
            .transaction("t", |tx| make_love(tx, UserId(1), 0.1, &mut FixedChance::NEVER, t0()))
            .expect("attempt");
        assert_eq!(outcome, Conception::NotConceived);
        let kids = store
            .transaction("t", |tx| list_children(tx, UserId(1)))
            .expect("list");
        assert!(kids.is_empty());
    }

    #[test]
    fn inline_and_session_naming() {
        let store = family();
        let first = conceive(&store, t0());
        let second = conceive(&store, t0() + Duration::seconds(1));

        let step = store
            .transaction("t", |tx| name_child(tx, UserId(2), first.id, Some(" Max "), 64))
            .expect("inline");
        assert!(matches!(
            step,
            NamingStep::Named { child } if child.name.as_deref() == Some("Max")
        ));

        let step = store
            .transaction("t", |tx| name_child(tx, UserId(1), second.id, None, 64))
            .expect("session");
        assert_eq!(step, NamingStep::AwaitingName { child: second.id });

        let err = store
            .transaction("t", |tx| consume_name_input(tx, UserId(1), "   ", 64))
            .expect_err("blank");
        assert!(matches!(err, KinshipError::InvalidArgument(_)));

        let named = store
            .transaction("t", |tx| consume_name_input(tx, UserId(1), "Lena", 64))
            .expect("consume")
            .expect("session was pending");
        assert_eq!(named.name.as_deref(), Some("Lena"));

        let again = store
            .transaction("t", |tx| consume_name_input(tx, UserId(1), "chatter", 64))
            .expect("no session");
        assert!(again.is_none());
    }

    #[test]
    fn strangers_cannot_name_and_long_names_are_refused() {
        let store = family();
        let child = conceive(&store, t0());

        let err = store
            .transaction("t", |tx| name_child(tx, UserId(3), child.id, Some("Rex"), 64))
            .expect_err("stranger");
        assert!(matches!(err, KinshipError::ChildNotFound(id) if id == child.id));

        let err = store
            .transaction("t", |tx| name_child(tx, UserId(1), child.id, Some("Maximilian"), 4))
            .expect_err("too long");
        assert!(matches!(err, KinshipError::InvalidArgument(_)));
    }

    #[test]
    fn sheltering_the_named_child_discards_the_session() {
        let store = family();
        conceive(&store, t0());
        let child = conceive(&store, t0() + Duration::seconds(1));
        store
            .transaction("t", |tx| name_child(tx, UserId(1), child.id, None, 64))
            .expect("session");

        let gone = store
            .transaction("t", |tx| shelter(tx, UserId(1), Position(2)))
            .expect("shelter");
        assert_eq!(gone.child.id, child.id);

        let pending = store.transaction("t", |tx| tx.naming_session(UserId(1))).expect("read");
        assert!(pending.is_none());
    }

    #[test]
    fn positions_shift_after_shelter() {
        let store = family();
        let x = conceive(&store, t0());
        let y = conceive(&store, t0() + Duration::seconds(1));
        let z = conceive(&store, t0() + Duration::seconds(2));

        let listed = store.transaction("t", |tx| list_children(tx, UserId(2))).expect("list");
        let ids: Vec<ChildId> = listed.iter().map(|v| v.child.id).collect();
        assert_eq!(ids, vec![x.id, y.id, z.id]);

        let removed = store
            .transaction("t", |tx| shelter(tx, UserId(1), Position(2)))
            .expect("shelter");
        assert_eq!(removed.child.id, y.id);

        let aged = store
            .transaction("t", |tx| high_child(tx, UserId(1), Position(2)))
            .expect("high");
        assert_eq!(aged.child.id, z.id);
        assert_eq!(aged.child.age, 1);

        let err = store
            .transaction("t", |tx| feed_child(tx, UserId(1), Position(3)))
            .expect_err("out of range");
        assert!(matches!(err, KinshipError::InvalidIndex { position: 3, len: 2 }));
    }

    #[test]
    fn high_all_ages_everyone() {
        let store = family();
        conceive(&store, t0());
        conceive(&store, t0() + Duration::seconds(1));

        let all = store.transaction("t", |tx| high_all_children(tx, UserId(2))).expect("high all");
        assert!(all.iter().all(|v| v.child.age == 1));

        let fed = store.transaction("t", |tx| feed_all_children(tx, UserId(9))).expect("feed");
        assert!(fed.is_empty());
    }
}
