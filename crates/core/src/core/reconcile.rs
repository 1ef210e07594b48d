//! Remote/local snapshot merging and change detection.
//!
//! A freshly fetched remote snapshot is authoritative and replaces the
//! local view wholesale, with one exception: the local voter's own pending
//! casts. A poll response can race ahead of ledger confirmation, so a
//! just-cast vote that the remote side does not carry yet is re-applied on
//! top of the merged result rather than silently dropped. Once the remote
//! snapshot reports the same reply back, the pending entry is retired.
//!
//! Change detection exists to suppress redundant re-render work: two
//! snapshots are equal when they cover the same questions, with the same
//! voters, and the same reply and weight per voter. Map ordering never
//! matters.

use crate::snapshot::{Overlay, Snapshot};
use crate::votation::{QuestionId, VoteCast};

/// Result of reconciling a remote snapshot into the local view.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOutcome {
    /// False when the merged result is materially identical to `local`;
    /// the caller then skips the replace and the re-render.
    pub changed: bool,
    pub merged: Snapshot,
}

/// Merge `remote` over `local`, preserving `self_voter`'s unconfirmed casts.
///
/// Pending overlay entries that the remote snapshot now carries with the
/// same reply are confirmed and retired from the overlay. A remote record
/// with a *different* reply does not retire the entry: the user's latest
/// intent stays visible until the remote side catches up or the user
/// changes it again.
pub fn reconcile(
    local: &Snapshot,
    remote: Snapshot,
    self_voter: &str,
    overlay: &mut Overlay,
) -> ReconcileOutcome {
    let mut merged = remote;

    let pending: Vec<(QuestionId, VoteCast)> = overlay
        .pending()
        .map(|(id, cast)| (id.clone(), cast))
        .collect();

    for (id, cast) in pending {
        match merged.vote_of(&id, self_voter) {
            Some(remote_cast) if remote_cast.reply == cast.reply => {
                overlay.confirm(&id);
            }
            _ => {
                if let Some(votes) = merged.get(&id) {
                    let question = votes.question.clone();
                    merged
                        .insert_question(question)
                        .upsert(self_voter, cast);
                } else if let Some(votes) = local.get(&id) {
                    // The remote read raced ahead of the question itself
                    // (or the ledger dropped it); keep the row alive from
                    // the local copy so the cast stays visible.
                    merged
                        .insert_question(votes.question.clone())
                        .upsert(self_voter, cast);
                }
            }
        }
    }

    let changed = merged != *local;
    ReconcileOutcome { changed, merged }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::votation::{Question, Reply, VoteRecord};

    fn question() -> Question {
        Question::new("Approve merger?", "nodeX", "ACME")
    }

    fn other_question() -> Question {
        Question::new("Raise supply?", "nodeY", "ACME")
    }

    #[test]
    fn reconcile_with_itself_is_change_free() {
        let mut s = Snapshot::new();
        s.upsert(question(), VoteRecord::new("a", Reply::Yes, 40));
        s.upsert(other_question(), VoteRecord::new("b", Reply::No, 7));

        let mut overlay = Overlay::new();
        let outcome = reconcile(&s, s.clone(), "self", &mut overlay);
        assert!(!outcome.changed);
        assert_eq!(outcome.merged, s);
    }

    #[test]
    fn identical_snapshots_with_different_build_order_suppress_change() {
        let mut local = Snapshot::new();
        local.upsert(question(), VoteRecord::new("a", Reply::Yes, 40));
        local.upsert(question(), VoteRecord::new("b", Reply::No, 30));

        let mut remote = Snapshot::new();
        remote.upsert(question(), VoteRecord::new("b", Reply::No, 30));
        remote.upsert(question(), VoteRecord::new("a", Reply::Yes, 40));

        let mut overlay = Overlay::new();
        assert!(!reconcile(&local, remote, "self", &mut overlay).changed);
    }

    #[test]
    fn added_voter_marks_changed() {
        let mut local = Snapshot::new();
        local.upsert(question(), VoteRecord::new("a", Reply::Yes, 40));

        let mut remote = local.clone();
        remote.upsert(question(), VoteRecord::new("b", Reply::No, 10));

        let mut overlay = Overlay::new();
        let outcome = reconcile(&local, remote, "self", &mut overlay);
        assert!(outcome.changed);
        assert_eq!(outcome.merged.get(&question().id()).unwrap().voter_count(), 2);
    }

    #[test]
    fn changed_weight_for_existing_voter_marks_changed() {
        let mut local = Snapshot::new();
        local.upsert(question(), VoteRecord::new("a", Reply::Yes, 40));

        let mut remote = Snapshot::new();
        remote.upsert(question(), VoteRecord::new("a", Reply::Yes, 41));

        let mut overlay = Overlay::new();
        assert!(reconcile(&local, remote, "self", &mut overlay).changed);
    }

    #[test]
    fn removed_question_marks_changed() {
        let mut local = Snapshot::new();
        local.upsert(question(), VoteRecord::new("a", Reply::Yes, 40));
        local.upsert(other_question(), VoteRecord::new("b", Reply::No, 7));

        let mut remote = Snapshot::new();
        remote.upsert(question(), VoteRecord::new("a", Reply::Yes, 40));

        let mut overlay = Overlay::new();
        let outcome = reconcile(&local, remote, "self", &mut overlay);
        assert!(outcome.changed);
        assert!(outcome.merged.get(&other_question().id()).is_none());
    }

    #[test]
    fn merge_preserves_unconfirmed_local_vote() {
        let q = question();
        let mut local = Snapshot::new();
        local.upsert(q.clone(), VoteRecord::new("nodeX", Reply::Yes, 40));
        local.upsert(q.clone(), VoteRecord::new("self", Reply::No, 100));

        let mut overlay = Overlay::new();
        overlay.record(q.id(), VoteCast::new(Reply::No, 100));

        // Remote poll raced ahead of the ledger: it knows nodeX but not self.
        let mut remote = Snapshot::new();
        remote.upsert(q.clone(), VoteRecord::new("nodeX", Reply::Yes, 40));

        let outcome = reconcile(&local, remote, "self", &mut overlay);
        assert_eq!(
            outcome.merged.vote_of(&q.id(), "self"),
            Some(VoteCast::new(Reply::No, 100))
        );
        // Local already showed the overlaid state, so nothing changed visually.
        assert!(!outcome.changed);
        // Still unconfirmed.
        assert_eq!(overlay.pending_len(), 1);
    }

    #[test]
    fn matching_remote_record_confirms_and_retires_overlay() {
        let q = question();
        let mut local = Snapshot::new();
        local.upsert(q.clone(), VoteRecord::new("self", Reply::No, 100));

        let mut overlay = Overlay::new();
        overlay.record(q.id(), VoteCast::new(Reply::No, 100));

        let mut remote = Snapshot::new();
        remote.upsert(q.clone(), VoteRecord::new("self", Reply::No, 100));

        let outcome = reconcile(&local, remote, "self", &mut overlay);
        assert!(!outcome.changed);
        assert_eq!(overlay.pending_len(), 0);
        assert!(overlay.is_answered(&q.id()));
    }

    #[test]
    fn conflicting_remote_reply_does_not_retire_overlay() {
        let q = question();
        let mut local = Snapshot::new();
        local.upsert(q.clone(), VoteRecord::new("self", Reply::No, 100));

        let mut overlay = Overlay::new();
        overlay.record(q.id(), VoteCast::new(Reply::No, 100));

        // A stale remote read still carries the voter's previous reply.
        let mut remote = Snapshot::new();
        remote.upsert(q.clone(), VoteRecord::new("self", Reply::Yes, 100));

        let outcome = reconcile(&local, remote, "self", &mut overlay);
        assert_eq!(
            outcome.merged.vote_of(&q.id(), "self"),
            Some(VoteCast::new(Reply::No, 100))
        );
        assert_eq!(overlay.pending_len(), 1);
    }

    #[test]
    fn pending_vote_on_question_missing_remotely_keeps_the_row() {
        let q = question();
        let mut local = Snapshot::new();
        local.upsert(q.clone(), VoteRecord::new("self", Reply::Yes, 100));

        let mut overlay = Overlay::new();
        overlay.record(q.id(), VoteCast::new(Reply::Yes, 100));

        let outcome = reconcile(&local, Snapshot::new(), "self", &mut overlay);
        let votes = outcome.merged.get(&q.id()).expect("row kept alive");
        assert_eq!(votes.question, q);
        assert_eq!(votes.get("self"), Some(VoteCast::new(Reply::Yes, 100)));
        assert!(!outcome.changed);
    }
}
