//! Row-level reads and writes, one group per table.
//!
//! These are plain data access. Rule checks (who may do what, and when)
//! live in the subsystem modules, which call these inside one transaction.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{encode_ts, opt_ts_column, ts_column, Tx};
use crate::argument::Argument;
use crate::children::{Child, NamingSession};
use crate::cooldown::CooldownRecord;
use crate::error::Result;
use crate::kidnap::{KidnapStanding, Kidnapping};
use crate::marriage::{Marriage, Proposal};
use crate::types::{
    ArgumentId, ChildId, KidnapId, MarriageId, Person, ProposalId, UserId,
};

const MARRIAGE_COLUMNS: &str =
    "id, user1_id, user1_name, user2_id, user2_name, marriage_date, divorce_date, active";
const PROPOSAL_COLUMNS: &str = "id, from_id, from_name, to_id, to_name, message_id, created_at";
const ARGUMENT_COLUMNS: &str = "id, user1_id, user2_id, start_time, duration_hours";
const KIDNAP_COLUMNS: &str =
    "id, kidnapper_id, kidnapper_name, victim_id, victim_name, kidnap_time, duration_hours";
const CHILD_COLUMNS: &str = "id, marriage_id, parent1_id, parent2_id, name, age, created_date";

fn marriage_row(row: &Row<'_>) -> rusqlite::Result<Marriage> {
    Ok(Marriage {
        id: MarriageId(row.get(0)?),
        user1: Person::new(UserId(row.get(1)?), row.get::<_, String>(2)?),
        user2: Person::new(UserId(row.get(3)?), row.get::<_, String>(4)?),
        marriage_date: ts_column(row, 5)?,
        divorce_date: opt_ts_column(row, 6)?,
        active: row.get(7)?,
    })
}

fn proposal_row(row: &Row<'_>) -> rusqlite::Result<Proposal> {
    Ok(Proposal {
        id: ProposalId(row.get(0)?),
        from: Person::new(UserId(row.get(1)?), row.get::<_, String>(2)?),
        to: Person::new(UserId(row.get(3)?), row.get::<_, String>(4)?),
        message_id: row.get(5)?,
        created_at: ts_column(row, 6)?,
    })
}

fn argument_row(row: &Row<'_>) -> rusqlite::Result<Argument> {
    Ok(Argument {
        id: ArgumentId(row.get(0)?),
        user1: UserId(row.get(1)?),
        user2: UserId(row.get(2)?),
        start_time: ts_column(row, 3)?,
        duration_hours: row.get(4)?,
    })
}

fn kidnap_row(row: &Row<'_>) -> rusqlite::Result<Kidnapping> {
    Ok(Kidnapping {
        id: KidnapId(row.get(0)?),
        kidnapper: Person::new(UserId(row.get(1)?), row.get::<_, String>(2)?),
        victim: Person::new(UserId(row.get(3)?), row.get::<_, String>(4)?),
        kidnap_time: ts_column(row, 5)?,
        duration_hours: row.get(6)?,
    })
}

fn child_row(row: &Row<'_>) -> rusqlite::Result<Child> {
    Ok(Child {
        id: ChildId(row.get(0)?),
        marriage_id: MarriageId(row.get(1)?),
        parent1: UserId(row.get(2)?),
        parent2: UserId(row.get(3)?),
        name: row.get(4)?,
        age: row.get(5)?,
        created_date: ts_column(row, 6)?,
    })
}

impl Tx<'_> {
    // -- Marriages --

    /// The user's active marriage, if any.
    ///
    /// # Errors
    /// Database errors.
    pub fn active_marriage(&self, user: UserId) -> Result<Option<Marriage>> {
        let mut stmt = self.tx.prepare_cached(&format!(
            "SELECT {MARRIAGE_COLUMNS} FROM marriages
             WHERE (user1_id = ?1 OR user2_id = ?1) AND active = 1
             ORDER BY id LIMIT 1"
        ))?;
        Ok(stmt.query_row(params![user.0], marriage_row).optional()?)
    }

    /// Insert an active marriage dated `now`.
    ///
    /// # Errors
    /// Database errors.
    pub fn insert_marriage(&self, a: &Person, b: &Person, now: DateTime<Utc>) -> Result<Marriage> {
        self.tx.execute(
            "INSERT INTO marriages
                 (user1_id, user1_name, user2_id, user2_name, marriage_date, active)
             VALUES (?1, ?2, ?3, ?4, ?5, 1)",
            params![a.id.0, a.name, b.id.0, b.name, encode_ts(now)],
        )?;
        Ok(Marriage {
            id: MarriageId(self.tx.last_insert_rowid()),
            user1: a.clone(),
            user2: b.clone(),
            marriage_date: now,
            divorce_date: None,
            active: true,
        })
    }

    /// Mark a marriage inactive and stamp its divorce date. Returns `false`
    /// if it was not active.
    ///
    /// # Errors
    /// Database errors.
    pub fn end_marriage(&self, id: MarriageId, now: DateTime<Utc>) -> Result<bool> {
        let changed = self.tx.execute(
            "UPDATE marriages SET active = 0, divorce_date = ?2 WHERE id = ?1 AND active = 1",
            params![id.0, encode_ts(now)],
        )?;
        Ok(changed > 0)
    }

    /// Active marriages, oldest first.
    ///
    /// # Errors
    /// Database errors.
    pub fn oldest_marriages(&self, limit: usize) -> Result<Vec<Marriage>> {
        let mut stmt = self.tx.prepare_cached(&format!(
            "SELECT {MARRIAGE_COLUMNS} FROM marriages
             WHERE active = 1 ORDER BY marriage_date ASC, id ASC LIMIT ?1"
        ))?;
        let rows = stmt
            .query_map(params![limit_param(limit)], marriage_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // -- Proposals --

    /// Insert an outstanding proposal.
    ///
    /// # Errors
    /// Database errors.
    pub fn insert_proposal(
        &self,
        from: &Person,
        to: &Person,
        now: DateTime<Utc>,
    ) -> Result<Proposal> {
        self.tx.execute(
            "INSERT INTO proposals (from_id, from_name, to_id, to_name, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![from.id.0, from.name, to.id.0, to.name, encode_ts(now)],
        )?;
        Ok(Proposal {
            id: ProposalId(self.tx.last_insert_rowid()),
            from: from.clone(),
            to: to.clone(),
            message_id: None,
            created_at: now,
        })
    }

    /// Look up a proposal by id.
    ///
    /// # Errors
    /// Database errors.
    pub fn proposal(&self, id: ProposalId) -> Result<Option<Proposal>> {
        let mut stmt = self
            .tx
            .prepare_cached(&format!("SELECT {PROPOSAL_COLUMNS} FROM proposals WHERE id = ?1"))?;
        Ok(stmt.query_row(params![id.0], proposal_row).optional()?)
    }

    /// Look up a proposal by the adapter message carrying its prompt.
    ///
    /// # Errors
    /// Database errors.
    pub fn proposal_by_message(&self, message_id: i64) -> Result<Option<Proposal>> {
        let mut stmt = self.tx.prepare_cached(&format!(
            "SELECT {PROPOSAL_COLUMNS} FROM proposals WHERE message_id = ?1"
        ))?;
        Ok(stmt.query_row(params![message_id], proposal_row).optional()?)
    }

    /// Attach an adapter message id to a proposal.
    ///
    /// # Errors
    /// Database errors, including a message id already bound elsewhere.
    pub fn bind_proposal_message(&self, id: ProposalId, message_id: i64) -> Result<bool> {
        let changed = self.tx.execute(
            "UPDATE proposals SET message_id = ?2 WHERE id = ?1",
            params![id.0, message_id],
        )?;
        Ok(changed > 0)
    }

    /// Delete one proposal.
    ///
    /// # Errors
    /// Database errors.
    pub fn delete_proposal(&self, id: ProposalId) -> Result<bool> {
        let deleted = self
            .tx
            .execute("DELETE FROM proposals WHERE id = ?1", params![id.0])?;
        Ok(deleted > 0)
    }

    /// Delete every proposal made by `user`. Returns how many went.
    ///
    /// # Errors
    /// Database errors.
    pub fn delete_proposals_from(&self, user: UserId) -> Result<usize> {
        Ok(self
            .tx
            .execute("DELETE FROM proposals WHERE from_id = ?1", params![user.0])?)
    }

    // -- Arguments --

    /// Every argument row naming `user`, newest first. Includes expired rows.
    ///
    /// # Errors
    /// Database errors.
    pub fn arguments_involving(&self, user: UserId) -> Result<Vec<Argument>> {
        let mut stmt = self.tx.prepare_cached(&format!(
            "SELECT {ARGUMENT_COLUMNS} FROM arguments
             WHERE user1_id = ?1 OR user2_id = ?1
             ORDER BY start_time DESC, id DESC"
        ))?;
        let rows = stmt
            .query_map(params![user.0], argument_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Insert an argument starting `now`.
    ///
    /// # Errors
    /// Database errors.
    pub fn insert_argument(
        &self,
        user1: UserId,
        user2: UserId,
        now: DateTime<Utc>,
        duration_hours: i64,
    ) -> Result<Argument> {
        self.tx.execute(
            "INSERT INTO arguments (user1_id, user2_id, start_time, duration_hours)
             VALUES (?1, ?2, ?3, ?4)",
            params![user1.0, user2.0, encode_ts(now), duration_hours],
        )?;
        Ok(Argument {
            id: ArgumentId(self.tx.last_insert_rowid()),
            user1,
            user2,
            start_time: now,
            duration_hours,
        })
    }

    /// Delete one argument.
    ///
    /// # Errors
    /// Database errors.
    pub fn delete_argument(&self, id: ArgumentId) -> Result<bool> {
        let deleted = self
            .tx
            .execute("DELETE FROM arguments WHERE id = ?1", params![id.0])?;
        Ok(deleted > 0)
    }

    // -- Kidnappings --

    /// Every kidnapping row held by `kidnapper`, oldest first. Includes
    /// expired rows that no read has collected yet.
    ///
    /// # Errors
    /// Database errors.
    pub fn kidnappings_by_kidnapper(&self, kidnapper: UserId) -> Result<Vec<Kidnapping>> {
        let mut stmt = self.tx.prepare_cached(&format!(
            "SELECT {KIDNAP_COLUMNS} FROM kidnappings WHERE kidnapper_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt
            .query_map(params![kidnapper.0], kidnap_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Every kidnapping row naming `victim`, oldest first.
    ///
    /// # Errors
    /// Database errors.
    pub fn kidnappings_of_victim(&self, victim: UserId) -> Result<Vec<Kidnapping>> {
        let mut stmt = self.tx.prepare_cached(&format!(
            "SELECT {KIDNAP_COLUMNS} FROM kidnappings WHERE victim_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt
            .query_map(params![victim.0], kidnap_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Insert a kidnapping starting `now`.
    ///
    /// # Errors
    /// Database errors.
    pub fn insert_kidnapping(
        &self,
        kidnapper: &Person,
        victim: &Person,
        now: DateTime<Utc>,
        duration_hours: i64,
    ) -> Result<Kidnapping> {
        self.tx.execute(
            "INSERT INTO kidnappings
                (kidnapper_id, kidnapper_name, victim_id, victim_name, kidnap_time, duration_hours)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                kidnapper.id.0,
                kidnapper.name,
                victim.id.0,
                victim.name,
                encode_ts(now),
                duration_hours
            ],
        )?;
        Ok(Kidnapping {
            id: KidnapId(self.tx.last_insert_rowid()),
            kidnapper: kidnapper.clone(),
            victim: victim.clone(),
            kidnap_time: now,
            duration_hours,
        })
    }

    /// Delete one kidnapping.
    ///
    /// # Errors
    /// Database errors.
    pub fn delete_kidnapping(&self, id: KidnapId) -> Result<bool> {
        let deleted = self
            .tx
            .execute("DELETE FROM kidnappings WHERE id = ?1", params![id.0])?;
        Ok(deleted > 0)
    }

    // -- Kidnap stats --

    /// Add one to the user's kidnap count, creating the row if needed.
    /// Returns the new count.
    ///
    /// # Errors
    /// Database errors.
    pub fn increment_kidnap_count(&self, user: &Person) -> Result<i64> {
        let count = self.tx.query_row(
            "INSERT INTO kidnap_stats (user_id, user_name, kidnap_count) VALUES (?1, ?2, 1)
             ON CONFLICT(user_id) DO UPDATE SET
                kidnap_count = kidnap_count + 1,
                user_name = excluded.user_name
             RETURNING kidnap_count",
            params![user.id.0, user.name],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Kidnappers by count, highest first.
    ///
    /// # Errors
    /// Database errors.
    pub fn top_kidnap_counts(&self, limit: usize) -> Result<Vec<KidnapStanding>> {
        let mut stmt = self.tx.prepare_cached(
            "SELECT user_id, user_name, kidnap_count FROM kidnap_stats
             ORDER BY kidnap_count DESC, user_id ASC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit_param(limit)], |row| {
                Ok(KidnapStanding {
                    user: Person::new(UserId(row.get(0)?), row.get::<_, String>(1)?),
                    kidnap_count: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // -- Children --

    /// Insert an unnamed, age-0 child of `marriage`.
    ///
    /// # Errors
    /// Database errors.
    pub fn insert_child(&self, marriage: &Marriage, now: DateTime<Utc>) -> Result<Child> {
        self.tx.execute(
            "INSERT INTO children (marriage_id, parent1_id, parent2_id, age, created_date)
             VALUES (?1, ?2, ?3, 0, ?4)",
            params![marriage.id.0, marriage.user1.id.0, marriage.user2.id.0, encode_ts(now)],
        )?;
        Ok(Child {
            id: ChildId(self.tx.last_insert_rowid()),
            marriage_id: marriage.id,
            parent1: marriage.user1.id,
            parent2: marriage.user2.id,
            name: None,
            age: 0,
            created_date: now,
        })
    }

    /// Every child with `user` as a parent, in creation order.
    ///
    /// # Errors
    /// Database errors.
    pub fn children_of(&self, user: UserId) -> Result<Vec<Child>> {
        let mut stmt = self.tx.prepare_cached(&format!(
            "SELECT {CHILD_COLUMNS} FROM children
             WHERE parent1_id = ?1 OR parent2_id = ?1
             ORDER BY created_date ASC, id ASC"
        ))?;
        let rows = stmt
            .query_map(params![user.0], child_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Look up a child by id.
    ///
    /// # Errors
    /// Database errors.
    pub fn child(&self, id: ChildId) -> Result<Option<Child>> {
        let mut stmt = self
            .tx
            .prepare_cached(&format!("SELECT {CHILD_COLUMNS} FROM children WHERE id = ?1"))?;
        Ok(stmt.query_row(params![id.0], child_row).optional()?)
    }

    /// Set a child's name.
    ///
    /// # Errors
    /// Database errors.
    pub fn rename_child(&self, id: ChildId, name: &str) -> Result<bool> {
        let changed = self.tx.execute(
            "UPDATE children SET name = ?2 WHERE id = ?1",
            params![id.0, name],
        )?;
        Ok(changed > 0)
    }

    /// Age one child by a year.
    ///
    /// # Errors
    /// Database errors.
    pub fn age_child(&self, id: ChildId) -> Result<bool> {
        let changed = self
            .tx
            .execute("UPDATE children SET age = age + 1 WHERE id = ?1", params![id.0])?;
        Ok(changed > 0)
    }

    /// Age every child of `user` by a year. Returns how many aged.
    ///
    /// # Errors
    /// Database errors.
    pub fn age_children_of(&self, user: UserId) -> Result<usize> {
        Ok(self.tx.execute(
            "UPDATE children SET age = age + 1 WHERE parent1_id = ?1 OR parent2_id = ?1",
            params![user.0],
        )?)
    }

    /// Delete a child. Naming sessions pointing at it cascade.
    ///
    /// # Errors
    /// Database errors.
    pub fn delete_child(&self, id: ChildId) -> Result<bool> {
        let deleted = self
            .tx
            .execute("DELETE FROM children WHERE id = ?1", params![id.0])?;
        Ok(deleted > 0)
    }

    // -- Naming sessions --

    /// Open (or replace) the user's naming session.
    ///
    /// # Errors
    /// Database errors.
    pub fn open_naming(&self, user: UserId, child: ChildId) -> Result<()> {
        self.tx.execute(
            "INSERT INTO child_naming (user_id, child_id, temp_name) VALUES (?1, ?2, '')
             ON CONFLICT(user_id) DO UPDATE SET child_id = excluded.child_id, temp_name = ''",
            params![user.0, child.0],
        )?;
        Ok(())
    }

    /// The user's pending naming session, if any.
    ///
    /// # Errors
    /// Database errors.
    pub fn naming_session(&self, user: UserId) -> Result<Option<NamingSession>> {
        let mut stmt = self.tx.prepare_cached(
            "SELECT user_id, child_id, temp_name FROM child_naming WHERE user_id = ?1",
        )?;
        Ok(stmt
            .query_row(params![user.0], |row| {
                Ok(NamingSession {
                    user: UserId(row.get(0)?),
                    child: ChildId(row.get(1)?),
                    temp_name: row.get(2)?,
                })
            })
            .optional()?)
    }

    /// Close the user's naming session.
    ///
    /// # Errors
    /// Database errors.
    pub fn close_naming(&self, user: UserId) -> Result<bool> {
        let deleted = self
            .tx
            .execute("DELETE FROM child_naming WHERE user_id = ?1", params![user.0])?;
        Ok(deleted > 0)
    }

    // -- Cooldowns --

    /// The cooldown record stored under `(user, scope)`.
    ///
    /// # Errors
    /// Database errors.
    pub fn cooldown(&self, user: UserId, scope: &str) -> Result<Option<CooldownRecord>> {
        let mut stmt = self.tx.prepare_cached(
            "SELECT user_id, command, last_used FROM cooldowns WHERE user_id = ?1 AND scope = ?2",
        )?;
        Ok(stmt
            .query_row(params![user.0, scope], |row| {
                Ok(CooldownRecord {
                    user: UserId(row.get(0)?),
                    command: row.get(1)?,
                    last_used: ts_column(row, 2)?,
                })
            })
            .optional()?)
    }

    /// Write `(user, scope)`'s cooldown record, replacing what was there.
    ///
    /// # Errors
    /// Database errors.
    pub fn upsert_cooldown(
        &self,
        user: UserId,
        scope: &str,
        command: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.tx.execute(
            "INSERT INTO cooldowns (user_id, scope, command, last_used) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id, scope) DO UPDATE SET
                command = excluded.command,
                last_used = excluded.last_used",
            params![user.0, scope, command, encode_ts(now)],
        )?;
        Ok(())
    }
}

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}
