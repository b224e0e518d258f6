//! Error types for the Kinship engine.
//!
//! Two families share one enum:
//!
//! - **Refusals**: a rule of the game rejected the command (`SelfTarget`,
//!   `OnCooldown`, ...). They are expected, carry everything an adapter
//!   needs to phrase a reply, and never indicate a fault.
//! - **Faults**: storage, configuration or I/O failures.
//!
//! [`KinshipError::is_refusal`] tells them apart.

use thiserror::Error;

use crate::types::{ChildId, Person, ProposalId, UserId};

/// Top-level error type for all Kinship operations.
#[derive(Error, Debug)]
pub enum KinshipError {
    /// The actor targeted themselves.
    #[error("You cannot do that to yourself")]
    SelfTarget,

    /// The actor or the target is already married.
    #[error("{user} is already married")]
    AlreadyMarried {
        /// Who is already married.
        user: UserId,
    },

    /// The actor has no active marriage.
    #[error("{user} is not married")]
    NotMarried {
        /// Who is not married.
        user: UserId,
    },

    /// The proposal was already answered, superseded, or never existed.
    #[error("Proposal not found or expired: {0}")]
    ProposalNotFound(ProposalId),

    /// Someone other than the addressee tried to answer a proposal.
    #[error("Proposal {proposal} is addressed to {addressee}, not {responder}")]
    NotAddressee {
        /// The proposal in question.
        proposal: ProposalId,
        /// Who the proposal was made to.
        addressee: UserId,
        /// Who tried to answer it.
        responder: UserId,
    },

    /// A kidnapper tried to abduct their own spouse.
    #[error("You cannot kidnap your own spouse")]
    SpouseProtected,

    /// The rate-limited command is still cooling down.
    #[error("On cooldown for another {remaining_minutes} min")]
    OnCooldown {
        /// Whole minutes left (floor).
        remaining_minutes: i64,
    },

    /// The kidnapper already holds someone.
    #[error("Already holding {} for {hours} h {minutes} min", .victim.name)]
    AlreadyHolding {
        /// The current captive.
        victim: Person,
        /// Whole hours left.
        hours: i64,
        /// Minutes left after the whole hours.
        minutes: i64,
    },

    /// Unmarried users cannot be kidnapped.
    #[error("{} is not married and cannot be kidnapped", .victim.name)]
    VictimNotMarried {
        /// The would-be victim.
        victim: Person,
    },

    /// The user is not anyone's captive.
    #[error("{user} has not been kidnapped")]
    NotCaptive {
        /// Who tried to escape.
        user: UserId,
    },

    /// The user holds no captive.
    #[error("{user} is not holding anyone")]
    NotHolding {
        /// Who tried to release.
        user: UserId,
    },

    /// The actor is already in an active argument.
    #[error("{user} is already arguing")]
    AlreadyArguing {
        /// Who is arguing.
        user: UserId,
    },

    /// The actor is not in an active argument.
    #[error("{user} is not arguing")]
    NotArguing {
        /// Who tried to make peace.
        user: UserId,
    },

    /// One of the spouses is in an active argument.
    #[error("The couple is arguing")]
    CoupleArguing,

    /// One of the spouses is currently held captive.
    #[error("One of the partners has been kidnapped")]
    PartnerCaptive {
        /// The captive spouse.
        captive: UserId,
    },

    /// The child does not exist or does not belong to the actor.
    #[error("Child not found or not yours: {0}")]
    ChildNotFound(ChildId),

    /// A 1-based child position outside `[1, len]`.
    #[error("No child at position {position} (have {len})")]
    InvalidIndex {
        /// Requested position.
        position: usize,
        /// Number of children.
        len: usize,
    },

    /// Malformed user input (non-numeric position, blank name, ...).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// SQLite persistence error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl KinshipError {
    /// `true` for rule refusals surfaced to users, `false` for faults.
    #[must_use]
    pub fn is_refusal(&self) -> bool {
        !matches!(self, Self::Database(_) | Self::Config(_) | Self::Io(_))
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, KinshipError>;
