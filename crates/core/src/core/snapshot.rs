//! Local snapshot store and the optimistic overlay.
//!
//! The store is the last-reconciled view of all open questions on the asset
//! currently under inspection. It lives exactly as long as the question view
//! is open: built on open, cleared on close, rebuilt from scratch on the
//! next open. It is deliberately not thread-safe; the owner serializes
//! access on a single logical writer.

use hashbrown::{HashMap, HashSet};

use crate::votation::{Question, QuestionId, VoteCast, VoteRecord};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// All locally known votes for one open question. One cast per voter; a
/// later cast for the same voter replaces the earlier one.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct QuestionVotes {
    pub question: Question,
    votes: HashMap<String, VoteCast>,
}

impl QuestionVotes {
    pub fn new(question: Question) -> Self {
        Self {
            question,
            votes: HashMap::new(),
        }
    }

    /// Insert or replace this voter's cast. Last write wins by arrival order.
    pub fn upsert(&mut self, voter: impl Into<String>, cast: VoteCast) {
        self.votes.insert(voter.into(), cast);
    }

    pub fn get(&self, voter: &str) -> Option<VoteCast> {
        self.votes.get(voter).copied()
    }

    pub fn voter_count(&self) -> usize {
        self.votes.len()
    }

    pub fn casts(&self) -> impl Iterator<Item = VoteCast> + '_ {
        self.votes.values().copied()
    }

    pub fn voters(&self) -> impl Iterator<Item = (&String, VoteCast)> {
        self.votes.iter().map(|(v, c)| (v, *c))
    }
}

/// The complete set of vote records for all open questions on one asset.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Snapshot {
    questions: HashMap<QuestionId, QuestionVotes>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self {
            questions: HashMap::new(),
        }
    }

    pub fn get(&self, id: &QuestionId) -> Option<&QuestionVotes> {
        self.questions.get(id)
    }

    /// Register a question with no votes yet (a freshly raised one).
    pub fn insert_question(&mut self, question: Question) -> &mut QuestionVotes {
        let id = question.id();
        self.questions
            .entry(id)
            .or_insert_with(|| QuestionVotes::new(question))
    }

    /// Insert or replace `record` under `question`, registering the question
    /// if it was not known yet.
    pub fn upsert(&mut self, question: Question, record: VoteRecord) {
        let entry = self.insert_question(question);
        entry.upsert(record.voter, VoteCast::new(record.reply, record.weight));
    }

    /// This voter's cast on `id`, if any.
    pub fn vote_of(&self, id: &QuestionId, voter: &str) -> Option<VoteCast> {
        self.questions.get(id).and_then(|q| q.get(voter))
    }

    /// Wholesale replacement after a confirmed reconciliation.
    pub fn replace_all(&mut self, fresh: Snapshot) {
        self.questions = fresh.questions;
    }

    /// Drop everything; used when the question view is closed.
    pub fn clear(&mut self) {
        self.questions.clear();
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&QuestionId, &QuestionVotes)> {
        self.questions.iter()
    }
}

/// The local voter's own not-yet-confirmed votes, plus the sticky "answered"
/// marks for the session.
///
/// A pending entry shields a just-cast vote from stale remote reads: it is
/// re-applied on top of every reconciled snapshot until the remote side
/// reports the same reply back, at which point it is retired. The answered
/// mark outlives confirmation and is only dropped when the view closes.
#[derive(Debug, Clone, Default)]
pub struct Overlay {
    pending: HashMap<QuestionId, VoteCast>,
    answered: HashSet<QuestionId>,
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a locally cast vote ahead of remote confirmation.
    pub fn record(&mut self, id: QuestionId, cast: VoteCast) {
        self.answered.insert(id.clone());
        self.pending.insert(id, cast);
    }

    /// Retire a pending entry once the remote side has confirmed it.
    /// The answered mark stays.
    pub fn confirm(&mut self, id: &QuestionId) {
        self.pending.remove(id);
    }

    pub fn pending(&self) -> impl Iterator<Item = (&QuestionId, VoteCast)> {
        self.pending.iter().map(|(id, c)| (id, *c))
    }

    pub fn pending_for(&self, id: &QuestionId) -> Option<VoteCast> {
        self.pending.get(id).copied()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_answered(&self, id: &QuestionId) -> bool {
        self.answered.contains(id)
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.answered.clear();
    }
}
