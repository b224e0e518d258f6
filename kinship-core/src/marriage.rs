//! Marriage engine: proposal handshake, marriage and divorce.
//!
//! ```text
//! Single ──propose──▶ ProposalPending ──accept──▶ Married ──confirm──▶ Divorced
//!                          │ decline                  ▲ divorce prompt
//!                          ▼                          │ (cancel keeps it)
//!                        Single ◀─────────────────────┘
//! ```
//!
//! Divorced rows stay in the table as history; both users are single again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{KinshipError, Result};
use crate::store::Tx;
use crate::types::{whole_days, Choice, MarriageId, Person, ProposalId, UserId};

/// A marriage row, active or historical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marriage {
    /// Row id.
    pub id: MarriageId,
    /// The proposer.
    pub user1: Person,
    /// The one who accepted.
    pub user2: Person,
    /// When the proposal was accepted.
    pub marriage_date: DateTime<Utc>,
    /// When the divorce was confirmed, for inactive rows.
    pub divorce_date: Option<DateTime<Utc>>,
    /// `false` once divorced.
    pub active: bool,
}

impl Marriage {
    /// Whether `user` is one of the spouses.
    #[must_use]
    pub fn involves(&self, user: UserId) -> bool {
        self.user1.id == user || self.user2.id == user
    }

    /// The other spouse, seen from `user`.
    #[must_use]
    pub fn partner_of(&self, user: UserId) -> &Person {
        if self.user1.id == user {
            &self.user2
        } else {
            &self.user1
        }
    }

    /// Whole days married as of `now`.
    #[must_use]
    pub fn days_at(&self, now: DateTime<Utc>) -> i64 {
        whole_days(self.marriage_date, self.divorce_date.unwrap_or(now))
    }
}

/// An outstanding proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    /// Row id; the adapter embeds it in the prompt's buttons.
    pub id: ProposalId,
    /// Who proposed.
    pub from: Person,
    /// Who is asked.
    pub to: Person,
    /// Adapter message carrying the prompt, once bound.
    pub message_id: Option<i64>,
    /// When the proposal was made.
    pub created_at: DateTime<Utc>,
}

/// What happened to an answered proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProposalOutcome {
    /// Accepted; the couple is married.
    Married {
        /// The new marriage.
        marriage: Marriage,
    },
    /// Declined; nothing changed.
    Declined {
        /// The consumed proposal.
        proposal: Proposal,
    },
}

/// Confirmation prompt returned by [`divorce`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DivorcePrompt {
    /// Marriage to end; pass back to [`confirm_divorce`].
    pub marriage_id: MarriageId,
    /// The spouse being left.
    pub partner: Person,
}

/// What happened to a divorce prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DivorceOutcome {
    /// The marriage ended.
    Divorced {
        /// The now-inactive marriage.
        marriage: Marriage,
        /// Whole days it lasted.
        days: i64,
    },
    /// The actor changed their mind.
    Cancelled,
}

/// Answer to "who am I married to".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarriageInfo {
    /// The marriage.
    pub marriage_id: MarriageId,
    /// The other spouse.
    pub partner: Person,
    /// Wedding instant.
    pub since: DateTime<Utc>,
    /// Whole days married.
    pub days: i64,
}

/// One row of the longest-marriages board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarriageStanding {
    /// The marriage.
    pub marriage: Marriage,
    /// Whole days married.
    pub days: i64,
}

/// Make a proposal from `actor` to `target`.
///
/// Any older proposal by `actor` is withdrawn first, so a proposer has at
/// most one outstanding prompt.
///
/// # Errors
/// [`KinshipError::SelfTarget`], or [`KinshipError::AlreadyMarried`] naming
/// whichever party is married.
pub fn propose(
    tx: &Tx<'_>,
    actor: &Person,
    target: &Person,
    now: DateTime<Utc>,
) -> Result<Proposal> {
    if actor.id == target.id {
        return Err(KinshipError::SelfTarget);
    }
    ensure_single(tx, actor.id)?;
    ensure_single(tx, target.id)?;

    let superseded = tx.delete_proposals_from(actor.id)?;
    let proposal = tx.insert_proposal(actor, target, now)?;
    debug!(
        proposal = %proposal.id,
        from = %actor.id,
        to = %target.id,
        superseded,
        "Proposal made"
    );
    Ok(proposal)
}

/// Record which adapter message carries a proposal's prompt.
///
/// # Errors
/// [`KinshipError::ProposalNotFound`] if the proposal is gone.
pub fn bind_prompt(tx: &Tx<'_>, proposal: ProposalId, message_id: i64) -> Result<()> {
    if tx.bind_proposal_message(proposal, message_id)? {
        Ok(())
    } else {
        Err(KinshipError::ProposalNotFound(proposal))
    }
}

/// Find the proposal whose prompt is the given adapter message.
///
/// # Errors
/// Database errors only.
pub fn proposal_for_prompt(tx: &Tx<'_>, message_id: i64) -> Result<Option<Proposal>> {
    tx.proposal_by_message(message_id)
}

/// Resolve a proposal. Only its addressee may answer.
///
/// # Errors
/// - [`KinshipError::ProposalNotFound`] if already answered or superseded.
/// - [`KinshipError::NotAddressee`] if `responder` is not the target; the
///   proposal stays outstanding.
/// - [`KinshipError::AlreadyMarried`] if either party married someone else
///   in the meantime; the proposal is consumed.
pub fn respond_proposal(
    tx: &Tx<'_>,
    id: ProposalId,
    responder: UserId,
    choice: Choice,
    now: DateTime<Utc>,
) -> Result<ProposalOutcome> {
    let proposal = tx.proposal(id)?.ok_or(KinshipError::ProposalNotFound(id))?;
    if proposal.to.id != responder {
        return Err(KinshipError::NotAddressee {
            proposal: id,
            addressee: proposal.to.id,
            responder,
        });
    }

    tx.delete_proposal(id)?;

    match choice {
        Choice::Decline => {
            debug!(proposal = %id, "Proposal declined");
            Ok(ProposalOutcome::Declined { proposal })
        }
        Choice::Accept => {
            ensure_single(tx, proposal.from.id)?;
            ensure_single(tx, proposal.to.id)?;
            let marriage = tx.insert_marriage(&proposal.from, &proposal.to, now)?;
            info!(
                marriage = %marriage.id,
                user1 = %marriage.user1.id,
                user2 = %marriage.user2.id,
                "Marriage formed"
            );
            Ok(ProposalOutcome::Married { marriage })
        }
    }
}

/// Start a divorce: returns the confirmation prompt.
///
/// # Errors
/// [`KinshipError::NotMarried`].
pub fn divorce(tx: &Tx<'_>, actor: UserId) -> Result<DivorcePrompt> {
    let marriage = require_marriage(tx, actor)?;
    Ok(DivorcePrompt {
        marriage_id: marriage.id,
        partner: marriage.partner_of(actor).clone(),
    })
}

/// Resolve a divorce prompt.
///
/// # Errors
/// [`KinshipError::NotMarried`] if `marriage_id` is no longer the actor's
/// active marriage (already divorced, or a stale prompt).
pub fn confirm_divorce(
    tx: &Tx<'_>,
    actor: UserId,
    marriage_id: MarriageId,
    choice: Choice,
    now: DateTime<Utc>,
) -> Result<DivorceOutcome> {
    let marriage = require_marriage(tx, actor)?;
    if marriage.id != marriage_id {
        return Err(KinshipError::NotMarried { user: actor });
    }
    if choice == Choice::Decline {
        return Ok(DivorceOutcome::Cancelled);
    }

    tx.end_marriage(marriage.id, now)?;
    let ended = Marriage {
        divorce_date: Some(now),
        active: false,
        ..marriage
    };
    let days = ended.days_at(now);
    info!(marriage = %ended.id, by = %actor, days, "Marriage ended");
    Ok(DivorceOutcome::Divorced {
        marriage: ended,
        days,
    })
}

/// The actor's spouse and how long they have been married.
///
/// # Errors
/// [`KinshipError::NotMarried`].
pub fn marriage_info(tx: &Tx<'_>, actor: UserId, now: DateTime<Utc>) -> Result<MarriageInfo> {
    let marriage = require_marriage(tx, actor)?;
    Ok(MarriageInfo {
        marriage_id: marriage.id,
        partner: marriage.partner_of(actor).clone(),
        since: marriage.marriage_date,
        days: marriage.days_at(now),
    })
}

/// Longest-running active marriages.
///
/// # Errors
/// Database errors only.
pub fn top_marriages(
    tx: &Tx<'_>,
    limit: usize,
    now: DateTime<Utc>,
) -> Result<Vec<MarriageStanding>> {
    Ok(tx
        .oldest_marriages(limit)?
        .into_iter()
        .map(|marriage| {
            let days = marriage.days_at(now);
            MarriageStanding { marriage, days }
        })
        .collect())
}

/// The user's active marriage, or [`KinshipError::NotMarried`].
pub(crate) fn require_marriage(tx: &Tx<'_>, user: UserId) -> Result<Marriage> {
    tx.active_marriage(user)?
        .ok_or(KinshipError::NotMarried { user })
}

fn ensure_single(tx: &Tx<'_>, user: UserId) -> Result<()> {
    match tx.active_marriage(user)? {
        Some(_) => Err(KinshipError::AlreadyMarried { user }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PersistenceConfig;
    use crate::store::Store;
    use chrono::{Duration, TimeZone};

    fn store() -> Store {
        Store::open_in_memory(&PersistenceConfig::default()).expect("open")
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("valid date")
    }

    fn alice() -> Person {
        Person::new(UserId(1), "Alice")
    }

    fn bob() -> Person {
        Person::new(UserId(2), "Bob")
    }

    fn carol() -> Person {
        Person::new(UserId(3), "Carol")
    }

    fn wed(store: &Store, a: &Person, b: &Person) -> Marriage {
        store
            .transaction("wed", |tx| {
                let p = propose(tx, a, b, t0())?;
                match respond_proposal(tx, p.id, b.id, Choice::Accept, t0())? {
                    ProposalOutcome::Married { marriage } => Ok(marriage),
                    ProposalOutcome::Declined { .. } => unreachable!("accepted"),
                }
            })
            .expect("wed")
    }

    #[test]
    fn cannot_propose_to_self() {
        let store = store();
        let err = store
            .transaction("t", |tx| propose(tx, &alice(), &alice(), t0()))
            .expect_err("self");
        assert!(matches!(err, KinshipError::SelfTarget));
    }

    #[test]
    fn married_parties_cannot_propose_or_be_proposed_to() {
        let store = store();
        wed(&store, &alice(), &bob());

        let err = store
            .transaction("t", |tx| propose(tx, &alice(), &carol(), t0()))
            .expect_err("actor married");
        assert!(matches!(err, KinshipError::AlreadyMarried { user } if user == UserId(1)));

        let err = store
            .transaction("t", |tx| propose(tx, &carol(), &bob(), t0()))
            .expect_err("target married");
        assert!(matches!(err, KinshipError::AlreadyMarried { user } if user == UserId(2)));
    }

    #[test]
    fn only_the_addressee_may_answer() {
        let store = store();
        let p = store
            .transaction("t", |tx| propose(tx, &alice(), &bob(), t0()))
            .expect("propose");

        let err = store
            .transaction("t", |tx| respond_proposal(tx, p.id, UserId(3), Choice::Accept, t0()))
            .expect_err("stranger");
        assert!(matches!(err, KinshipError::NotAddressee { .. }));

        let outcome = store
            .transaction("t", |tx| respond_proposal(tx, p.id, UserId(2), Choice::Decline, t0()))
            .expect("decline");
        assert!(matches!(outcome, ProposalOutcome::Declined { .. }));
    }

    #[test]
    fn answered_proposal_cannot_be_answered_again() {
        let store = store();
        let p = store
            .transaction("t", |tx| propose(tx, &alice(), &bob(), t0()))
            .expect("propose");
        store
            .transaction("t", |tx| respond_proposal(tx, p.id, UserId(2), Choice::Accept, t0()))
            .expect("accept");

        let err = store
            .transaction("t", |tx| respond_proposal(tx, p.id, UserId(2), Choice::Accept, t0()))
            .expect_err("consumed");
        assert!(matches!(err, KinshipError::ProposalNotFound(id) if id == p.id));
    }

    #[test]
    fn newer_proposal_supersedes_older() {
        let store = store();
        let first = store
            .transaction("t", |tx| propose(tx, &alice(), &bob(), t0()))
            .expect("first");
        let second = store
            .transaction("t", |tx| propose(tx, &alice(), &carol(), t0()))
            .expect("second");

        let err = store
            .transaction("t", |tx| respond_proposal(tx, first.id, UserId(2), Choice::Accept, t0()))
            .expect_err("superseded");
        assert!(matches!(err, KinshipError::ProposalNotFound(_)));

        let outcome = store
            .transaction("t", |tx| respond_proposal(tx, second.id, UserId(3), Choice::Accept, t0()))
            .expect("accept");
        assert!(matches!(outcome, ProposalOutcome::Married { .. }));
    }

    #[test]
    fn accepting_after_a_rival_wedding_is_refused() {
        let store = store();
        let to_bob = store
            .transaction("t", |tx| propose(tx, &carol(), &bob(), t0()))
            .expect("carol -> bob");
        wed(&store, &alice(), &bob());

        let err = store
            .transaction("t", |tx| respond_proposal(tx, to_bob.id, UserId(2), Choice::Accept, t0()))
            .expect_err("bob already wed");
        assert!(matches!(err, KinshipError::AlreadyMarried { .. }));

        let err = store
            .transaction("t", |tx| respond_proposal(tx, to_bob.id, UserId(2), Choice::Accept, t0()))
            .expect_err("consumed");
        assert!(matches!(err, KinshipError::ProposalNotFound(_)));
    }

    #[test]
    fn prompt_binding_round_trips() {
        let store = store();
        let p = store
            .transaction("t", |tx| propose(tx, &alice(), &bob(), t0()))
            .expect("propose");
        store
            .transaction("t", |tx| bind_prompt(tx, p.id, 9001))
            .expect("bind");
        let found = store
            .transaction("t", |tx| proposal_for_prompt(tx, 9001))
            .expect("lookup")
            .expect("bound");
        assert_eq!(found.id, p.id);
        assert_eq!(found.message_id, Some(9001));

        let err = store
            .transaction("t", |tx| bind_prompt(tx, ProposalId(999), 1))
            .expect_err("missing");
        assert!(matches!(err, KinshipError::ProposalNotFound(_)));
    }

    #[test]
    fn divorce_cancel_keeps_marriage() {
        let store = store();
        let m = wed(&store, &alice(), &bob());
        let prompt = store.transaction("t", |tx| divorce(tx, UserId(2))).expect("prompt");
        assert_eq!(prompt.marriage_id, m.id);
        assert_eq!(prompt.partner, alice());

        let outcome = store
            .transaction("t", |tx| confirm_divorce(tx, UserId(2), m.id, Choice::Decline, t0()))
            .expect("cancel");
        assert_eq!(outcome, DivorceOutcome::Cancelled);
        assert!(store.transaction("t", |tx| marriage_info(tx, UserId(1), t0())).is_ok());
    }

    #[test]
    fn divorce_reports_days_and_frees_both() {
        let store = store();
        let m = wed(&store, &alice(), &bob());
        let later = t0() + Duration::hours(50);

        let outcome = store
            .transaction("t", |tx| confirm_divorce(tx, UserId(1), m.id, Choice::Accept, later))
            .expect("divorce");
        match outcome {
            DivorceOutcome::Divorced { marriage, days } => {
                assert_eq!(days, 2);
                assert!(!marriage.active);
                assert_eq!(marriage.divorce_date, Some(later));
            }
            DivorceOutcome::Cancelled => panic!("expected divorce"),
        }

        let err = store
            .transaction("t", |tx| confirm_divorce(tx, UserId(1), m.id, Choice::Accept, later))
            .expect_err("stale prompt");
        assert!(matches!(err, KinshipError::NotMarried { .. }));

        // Both are free to marry again.
        wed(&store, &bob(), &carol());
    }

    #[test]
    fn top_marriages_oldest_first() {
        let store = store();
        let d = Person::new(UserId(4), "Dave");
        store
            .transaction("t", |tx| {
                tx.insert_marriage(&carol(), &d, t0() + Duration::days(1))?;
                tx.insert_marriage(&alice(), &bob(), t0())
            })
            .expect("seed");

        let board = store
            .transaction("t", |tx| top_marriages(tx, 10, t0() + Duration::days(3)))
            .expect("board");
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].marriage.user1, alice());
        assert_eq!(board[0].days, 3);
        assert_eq!(board[1].days, 2);

        let board = store
            .transaction("t", |tx| top_marriages(tx, 1, t0()))
            .expect("board");
        assert_eq!(board.len(), 1);
    }
}
