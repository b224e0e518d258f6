//! The [`Kinship`] facade: one method per chat command.
//!
//! Each method reads the clock once, runs the matching subsystem operation
//! inside a single store transaction, then updates the counters.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::info;

use crate::argument::{self, Argument, Quarrel};
use crate::chance::{Chance, RngChance};
use crate::children::{self, ChildView, Conception, NamingStep};
use crate::clock::{Clock, SystemClock};
use crate::config::KinshipConfig;
use crate::cooldown::{self, CooldownCheck};
use crate::error::Result;
use crate::kidnap::{self, EscapeAttempt, Holding, KidnapAttempt, KidnapStanding, Kidnapping};
use crate::marriage::{
    self, DivorceOutcome, DivorcePrompt, MarriageInfo, MarriageStanding, Proposal, ProposalOutcome,
};
use crate::metrics::KinshipCounters;
use crate::session::{self, PendingMode, TextEffect};
use crate::store::{Store, Tx};
use crate::types::{ChildId, Choice, MarriageId, Person, Position, ProposalId, UserId};

/// The relationship-state engine.
///
/// `Kinship` is `Send + Sync`; share it behind an `Arc` between the
/// adapter's handlers. Commands serialise on the store's connection.
pub struct Kinship {
    store: Store,
    config: KinshipConfig,
    clock: Arc<dyn Clock>,
    chance: Mutex<Box<dyn Chance>>,
    counters: KinshipCounters,
}

impl std::fmt::Debug for Kinship {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kinship")
            .field("store", &self.store)
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}

impl Kinship {
    /// Open the database named in `config` with the system clock and an
    /// RNG seeded from `config.chance`.
    ///
    /// # Errors
    /// Configuration or database errors.
    pub fn open(config: KinshipConfig) -> Result<Self> {
        config.validate()?;
        let store = Store::open(&config.persistence.path, &config.persistence)?;
        let chance = Self::chance_for(&config);
        Self::with_parts(store, config, Arc::new(SystemClock), chance)
    }

    /// In-memory engine with the system clock.
    ///
    /// # Errors
    /// Configuration or database errors.
    pub fn in_memory(config: KinshipConfig) -> Result<Self> {
        let store = Store::open_in_memory(&config.persistence)?;
        let chance = Self::chance_for(&config);
        Self::with_parts(store, config, Arc::new(SystemClock), chance)
    }

    /// Assemble an engine from explicit parts.
    ///
    /// # Errors
    /// [`KinshipError::Config`](crate::KinshipError::Config) if `config`
    /// fails [`KinshipConfig::validate`].
    pub fn with_parts(
        store: Store,
        config: KinshipConfig,
        clock: Arc<dyn Clock>,
        chance: Box<dyn Chance>,
    ) -> Result<Self> {
        config.validate()?;
        info!(
            db = %store.db_path().display(),
            cooldown_policy = ?config.cooldown.policy,
            seeded = config.chance.seed.is_some(),
            "Kinship engine ready"
        );
        Ok(Self {
            store,
            config,
            clock,
            chance: Mutex::new(chance),
            counters: KinshipCounters::new(),
        })
    }

    fn chance_for(config: &KinshipConfig) -> Box<dyn Chance> {
        match config.chance.seed {
            Some(seed) => Box::new(RngChance::seeded(seed)),
            None => Box::new(RngChance::from_entropy()),
        }
    }

    /// The underlying store (backups, integrity checks, raw reads).
    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &KinshipConfig {
        &self.config
    }

    /// Runtime counters.
    #[must_use]
    pub fn counters(&self) -> &KinshipCounters {
        &self.counters
    }

    fn run<T, F>(&self, op: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&Tx<'_>, DateTime<Utc>) -> Result<T>,
    {
        let now = self.clock.now();
        let result = self.store.transaction(op, |tx| f(tx, now));
        if matches!(&result, Err(e) if e.is_refusal()) {
            KinshipCounters::bump(&self.counters.refusals);
        }
        result
    }

    // -- Marriage --

    /// `actor` proposes to `target`.
    ///
    /// # Errors
    /// See [`marriage::propose`].
    pub fn propose(&self, actor: &Person, target: &Person) -> Result<Proposal> {
        let proposal = self.run("propose", |tx, now| marriage::propose(tx, actor, target, now))?;
        KinshipCounters::bump(&self.counters.proposals);
        Ok(proposal)
    }

    /// Attach the adapter message that shows a proposal's prompt.
    ///
    /// # Errors
    /// See [`marriage::bind_prompt`].
    pub fn bind_prompt(&self, proposal: ProposalId, message_id: i64) -> Result<()> {
        self.run("bind_prompt", |tx, _| marriage::bind_prompt(tx, proposal, message_id))
    }

    /// The proposal shown by an adapter message.
    ///
    /// # Errors
    /// Database errors only.
    pub fn proposal_for_prompt(&self, message_id: i64) -> Result<Option<Proposal>> {
        self.run("proposal_for_prompt", |tx, _| marriage::proposal_for_prompt(tx, message_id))
    }

    /// Answer a proposal.
    ///
    /// # Errors
    /// See [`marriage::respond_proposal`].
    pub fn respond_proposal(
        &self,
        proposal: ProposalId,
        responder: UserId,
        choice: Choice,
    ) -> Result<ProposalOutcome> {
        let outcome = self.run("respond_proposal", |tx, now| {
            marriage::respond_proposal(tx, proposal, responder, choice, now)
        })?;
        if matches!(outcome, ProposalOutcome::Married { .. }) {
            KinshipCounters::bump(&self.counters.marriages);
        }
        Ok(outcome)
    }

    /// The actor's spouse and marriage length.
    ///
    /// # Errors
    /// See [`marriage::marriage_info`].
    pub fn marriage_info(&self, actor: UserId) -> Result<MarriageInfo> {
        self.run("marriage_info", |tx, now| marriage::marriage_info(tx, actor, now))
    }

    /// Ask to end the actor's marriage.
    ///
    /// # Errors
    /// See [`marriage::divorce`].
    pub fn divorce(&self, actor: UserId) -> Result<DivorcePrompt> {
        self.run("divorce", |tx, _| marriage::divorce(tx, actor))
    }

    /// Answer a divorce prompt.
    ///
    /// # Errors
    /// See [`marriage::confirm_divorce`].
    pub fn confirm_divorce(
        &self,
        actor: UserId,
        marriage_id: MarriageId,
        choice: Choice,
    ) -> Result<DivorceOutcome> {
        let outcome = self.run("confirm_divorce", |tx, now| {
            marriage::confirm_divorce(tx, actor, marriage_id, choice, now)
        })?;
        if matches!(outcome, DivorceOutcome::Divorced { .. }) {
            KinshipCounters::bump(&self.counters.divorces);
        }
        Ok(outcome)
    }

    /// Longest active marriages, up to `leaderboard.limit`.
    ///
    /// # Errors
    /// Database errors only.
    pub fn top_marriages(&self) -> Result<Vec<MarriageStanding>> {
        let limit = self.config.leaderboard.limit;
        self.run("top_marriages", |tx, now| marriage::top_marriages(tx, limit, now))
    }

    // -- Arguments --

    /// Start an argument with the actor's spouse.
    ///
    /// # Errors
    /// See [`argument::argue`].
    pub fn argue(&self, actor: UserId) -> Result<Quarrel> {
        let hours = self.config.argument.duration_hours;
        self.run("argue", |tx, now| argument::argue(tx, actor, hours, now))
    }

    /// End the actor's argument.
    ///
    /// # Errors
    /// See [`argument::make_peace`].
    pub fn make_peace(&self, actor: UserId) -> Result<Argument> {
        self.run("make_peace", |tx, now| argument::make_peace(tx, actor, now))
    }

    // -- Kidnapping --

    /// Attempt to abduct `victim`.
    ///
    /// # Errors
    /// See [`kidnap::kidnap`].
    pub fn kidnap(&self, kidnapper: &Person, victim: &Person) -> Result<KidnapAttempt> {
        let attempt = self.run("kidnap", |tx, now| {
            let mut chance = self.chance.lock();
            kidnap::kidnap(tx, kidnapper, victim, &self.config, &mut **chance, now)
        })?;
        KinshipCounters::bump(&self.counters.kidnap_attempts);
        if matches!(attempt, KidnapAttempt::Captured { .. }) {
            KinshipCounters::bump(&self.counters.kidnap_successes);
        }
        Ok(attempt)
    }

    /// Attempt to escape a captor.
    ///
    /// # Errors
    /// See [`kidnap::escape`].
    pub fn escape(&self, victim: UserId) -> Result<EscapeAttempt> {
        let probability = self.config.kidnap.escape_probability;
        let attempt = self.run("escape", |tx, now| {
            let mut chance = self.chance.lock();
            kidnap::escape(tx, victim, probability, &mut **chance, now)
        })?;
        KinshipCounters::bump(&self.counters.escape_attempts);
        if matches!(attempt, EscapeAttempt::Escaped { .. }) {
            KinshipCounters::bump(&self.counters.escape_successes);
        }
        Ok(attempt)
    }

    /// Who the user is holding, if anyone.
    ///
    /// # Errors
    /// Database errors only.
    pub fn kidnap_info(&self, user: UserId) -> Result<Option<Holding>> {
        self.run("kidnap_info", |tx, now| kidnap::kidnap_info(tx, user, now))
    }

    /// Release the kidnapper's captive.
    ///
    /// # Errors
    /// See [`kidnap::release`].
    pub fn release(&self, kidnapper: UserId) -> Result<Kidnapping> {
        self.run("release", |tx, now| kidnap::release(tx, kidnapper, now))
    }

    /// Most prolific kidnappers, up to `leaderboard.limit`.
    ///
    /// # Errors
    /// Database errors only.
    pub fn top_kidnappers(&self) -> Result<Vec<KidnapStanding>> {
        let limit = self.config.leaderboard.limit;
        self.run("top_kidnappers", |tx, _| kidnap::top_kidnappers(tx, limit))
    }

    // -- Children --

    /// Try for a baby.
    ///
    /// # Errors
    /// See [`children::make_love`].
    pub fn make_love(&self, actor: UserId) -> Result<Conception> {
        let probability = self.config.children.conception_probability;
        let outcome = self.run("make_love", |tx, now| {
            let mut chance = self.chance.lock();
            children::make_love(tx, actor, probability, &mut **chance, now)
        })?;
        KinshipCounters::bump(&self.counters.conception_attempts);
        if matches!(outcome, Conception::Born { .. }) {
            KinshipCounters::bump(&self.counters.births);
        }
        Ok(outcome)
    }

    /// The actor's children in display order.
    ///
    /// # Errors
    /// Database errors only.
    pub fn list_children(&self, actor: UserId) -> Result<Vec<ChildView>> {
        self.run("list_children", |tx, _| children::list_children(tx, actor))
    }

    /// Name a child inline, or open a naming session.
    ///
    /// # Errors
    /// See [`children::name_child`].
    pub fn name_child(
        &self,
        actor: UserId,
        child: ChildId,
        inline: Option<&str>,
    ) -> Result<NamingStep> {
        let max = self.config.children.max_name_chars;
        self.run("name_child", |tx, _| children::name_child(tx, actor, child, inline, max))
    }

    /// Route a plain-text message from `user`.
    ///
    /// # Errors
    /// See [`session::consume_text`].
    pub fn consume_text(&self, user: UserId, text: &str) -> Result<TextEffect> {
        let max = self.config.children.max_name_chars;
        self.run("consume_text", |tx, _| session::consume_text(tx, user, text, max))
    }

    /// The user's pending input mode.
    ///
    /// # Errors
    /// Database errors only.
    pub fn pending_mode(&self, user: UserId) -> Result<Option<PendingMode>> {
        self.run("pending_mode", |tx, _| session::pending_mode(tx, user))
    }

    /// Age the child at `position`.
    ///
    /// # Errors
    /// See [`children::high_child`].
    pub fn high_child(&self, actor: UserId, position: Position) -> Result<ChildView> {
        self.run("high_child", |tx, _| children::high_child(tx, actor, position))
    }

    /// Age all the actor's children.
    ///
    /// # Errors
    /// Database errors only.
    pub fn high_all_children(&self, actor: UserId) -> Result<Vec<ChildView>> {
        self.run("high_all_children", |tx, _| children::high_all_children(tx, actor))
    }

    /// Feed the child at `position`.
    ///
    /// # Errors
    /// See [`children::feed_child`].
    pub fn feed_child(&self, actor: UserId, position: Position) -> Result<ChildView> {
        self.run("feed_child", |tx, _| children::feed_child(tx, actor, position))
    }

    /// Feed all the actor's children.
    ///
    /// # Errors
    /// Database errors only.
    pub fn feed_all_children(&self, actor: UserId) -> Result<Vec<ChildView>> {
        self.run("feed_all_children", |tx, _| children::feed_all_children(tx, actor))
    }

    /// Give up the child at `position`.
    ///
    /// # Errors
    /// See [`children::shelter`].
    pub fn shelter(&self, actor: UserId, position: Position) -> Result<ChildView> {
        self.run("shelter", |tx, _| children::shelter(tx, actor, position))
    }

    // -- Cooldowns --

    /// Whether `user` may run the rate-limited `command` now.
    ///
    /// # Errors
    /// Database errors only.
    pub fn can_act(&self, user: UserId, command: &str) -> Result<CooldownCheck> {
        self.run("can_act", |tx, now| {
            cooldown::can_act(tx, user, command, &self.config.cooldown, now)
        })
    }

    /// Record that `user` ran `command` now.
    ///
    /// # Errors
    /// Database errors only.
    pub fn touch(&self, user: UserId, command: &str) -> Result<()> {
        self.run("touch", |tx, now| cooldown::touch(tx, user, command, &self.config.cooldown, now))
    }
}
