//! # Kinship Core Library
//!
//! Relationship-state engine for chat-based social games.
//!
//! Users of a chat issue commands that create and mutate relationship state:
//!
//! - **Marriage**: proposal handshake, marriage, divorce
//! - **Argument**: a 24 h conflict window that blocks conception
//! - **Kidnap**: probabilistic abduction with escape / release and a leaderboard
//! - **Children**: conception, naming handshake, aging, disposal
//! - **Cooldown**: per-user rate limiting of kidnap attempts
//!
//! The chat transport is not part of this crate. An adapter resolves the
//! acting user (and an optional reply target), calls one method on
//! [`Kinship`], and renders the typed result or [`KinshipError`].
//!
//! ## Time model
//!
//! There are no background timers. Every duration-based fact (argument and
//! kidnap expiry, marriage day count, cooldown remaining) is computed from a
//! stored timestamp and the injected [`Clock`] at the moment of the read.
//! Expired kidnappings are deleted by whichever read observes them.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod argument;
pub mod chance;
pub mod children;
pub mod clock;
pub mod config;
pub mod cooldown;
pub mod engine;
pub mod error;
pub mod kidnap;
pub mod marriage;
pub mod metrics;
pub mod session;
pub mod store;
pub mod types;

pub use chance::{Chance, FixedChance, RngChance};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::KinshipConfig;
pub use engine::Kinship;
pub use error::{KinshipError, Result};
pub use store::Store;
pub use types::*;
