//! Session-scoped daemon state.
//!
//! One state object with a defined lifecycle instead of process-wide
//! globals: `open_view(asset)` starts a question view, `close_view()` tears
//! it down and stops the poll loop. All mutation goes through `&mut self`
//! and is serialized by the owner's lock, so the two producers (poll
//! completions and local casts) never interleave mid-update.
//!
//! Every outgoing fetch is stamped with the session epoch and a monotonic
//! tick. A completion whose epoch no longer matches belongs to a closed (or
//! switched) view and is discarded; a completion whose tick is older than
//! the last applied one lost the race to a newer poll and is discarded too.

use tracing::{debug, info};

use votary::asset::AssetBook;
use votary::reconcile::reconcile;
use votary::snapshot::{Overlay, Snapshot};
use votary::tally::tally;
use votary::votation::{Question, QuestionId, Reply, VoteCast, VoteRecord};

use crate::poller::PollHandle;
use crate::render::{RowControl, VoteRow};

/// The question view for one asset while it is open.
#[derive(Debug)]
pub struct VoteView {
    pub asset: String,
    /// Local stake captured when the view was opened. Every cast made in
    /// this view freezes this weight, even if the balance drifts later.
    pub weight: u64,
    store: Snapshot,
    overlay: Overlay,
    next_tick: u64,
    last_applied_tick: Option<u64>,
}

/// Stamp handed out for one remote fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub epoch: u64,
    pub tick: u64,
    pub asset: String,
}

#[derive(Debug, PartialEq)]
pub enum ApplyOutcome {
    /// The view closed or switched assets while the fetch was in flight.
    StaleView,
    /// An older fetch completed after a newer one was already applied.
    StaleTick,
    /// Nothing material changed; skip the re-render.
    Unchanged,
    /// The store was replaced; these are the fresh rows.
    Changed(Vec<VoteRow>),
}

pub struct SessionState {
    self_name: String,
    pub assets: AssetBook,
    view: Option<VoteView>,
    epoch: u64,
    poller: Option<PollHandle>,
}

impl SessionState {
    pub fn new(self_name: impl Into<String>) -> Self {
        Self {
            self_name: self_name.into(),
            assets: AssetBook::new(),
            view: None,
            epoch: 0,
            poller: None,
        }
    }

    pub fn self_name(&self) -> &str {
        &self.self_name
    }

    pub fn open_asset(&self) -> Option<&str> {
        self.view.as_ref().map(|v| v.asset.as_str())
    }

    /// Open the question view for `asset`, closing any previous view first.
    /// The local stake weight is captured here, from the current asset book.
    pub fn open_view(&mut self, asset: &str) {
        self.close_view();
        let weight = self.assets.balance_of(asset);
        self.epoch += 1;
        self.view = Some(VoteView {
            asset: asset.to_string(),
            weight,
            store: Snapshot::new(),
            overlay: Overlay::new(),
            next_tick: 0,
            last_applied_tick: None,
        });
        info!(asset, weight, "question view opened");
    }

    /// Close the view: cancel the poll loop and drop the snapshot. The next
    /// open rebuilds from scratch.
    pub fn close_view(&mut self) {
        if let Some(handle) = self.poller.take() {
            handle.cancel();
        }
        if let Some(mut view) = self.view.take() {
            view.store.clear();
            view.overlay.clear();
            self.epoch += 1;
            info!(asset = %view.asset, "question view closed");
        }
    }

    /// Attach the poll task for the current view. If the view vanished
    /// between spawn and registration, the task is cancelled on the spot.
    pub fn set_poller(&mut self, handle: PollHandle) {
        if self.view.is_some() {
            if let Some(old) = self.poller.replace(handle) {
                old.cancel();
            }
        } else {
            handle.cancel();
        }
    }

    /// Stamp the next outgoing fetch for the open view.
    pub fn begin_fetch(&mut self) -> Option<FetchTicket> {
        let epoch = self.epoch;
        let view = self.view.as_mut()?;
        let tick = view.next_tick;
        view.next_tick += 1;
        Some(FetchTicket {
            epoch,
            tick,
            asset: view.asset.clone(),
        })
    }

    /// Feed one completed fetch into reconciliation.
    pub fn apply_remote(&mut self, ticket: &FetchTicket, remote: Snapshot) -> ApplyOutcome {
        if ticket.epoch != self.epoch {
            return ApplyOutcome::StaleView;
        }
        let self_name = self.self_name.clone();
        let Some(view) = self.view.as_mut() else {
            return ApplyOutcome::StaleView;
        };
        if let Some(last) = view.last_applied_tick {
            if ticket.tick <= last {
                return ApplyOutcome::StaleTick;
            }
        }
        view.last_applied_tick = Some(ticket.tick);

        let outcome = reconcile(&view.store, remote, &self_name, &mut view.overlay);
        if outcome.changed {
            view.store.replace_all(outcome.merged);
            debug!(tick = ticket.tick, "snapshot updated");
            ApplyOutcome::Changed(project_rows(view, &self_name))
        } else {
            ApplyOutcome::Unchanged
        }
    }

    /// Optimistic overlay: record the local vote immediately, ahead of
    /// remote confirmation. Returns the question (for the asynchronous
    /// submission) and the fresh rows. The caller dispatches the submission;
    /// a failed dispatch is never rolled back here.
    pub fn cast_vote(
        &mut self,
        id: &QuestionId,
        answer: bool,
    ) -> Result<(Question, Vec<VoteRow>), String> {
        let self_name = self.self_name.clone();
        let Some(view) = self.view.as_mut() else {
            return Err("no question view is open".to_string());
        };
        let Some(votes) = view.store.get(id) else {
            return Err(format!("unknown question id {id}"));
        };
        let question = votes.question.clone();
        let reply = Reply::from_bool(answer);

        view.store.upsert(
            question.clone(),
            VoteRecord::new(self_name.clone(), reply, view.weight),
        );
        view.overlay.record(id.clone(), VoteCast::new(reply, view.weight));
        debug!(question = %question.text, %reply, weight = view.weight, "local vote recorded");

        Ok((question, project_rows(view, &self_name)))
    }

    /// Current rows for the open view, or None when no view is open.
    pub fn rows(&self) -> Option<Vec<VoteRow>> {
        let view = self.view.as_ref()?;
        Some(project_rows(view, &self.self_name))
    }
}

/// Project the store into renderable rows, sorted by question id so equal
/// states always produce equal row sets.
fn project_rows(view: &VoteView, self_name: &str) -> Vec<VoteRow> {
    let mut rows: Vec<VoteRow> = view
        .store
        .iter()
        .map(|(id, votes)| {
            let outcome = tally(votes.casts());
            let control = if view.overlay.is_answered(id) || votes.get(self_name).is_some() {
                RowControl::Answered
            } else {
                RowControl::PendingChoice
            };
            VoteRow {
                question_id: id.to_string(),
                question: votes.question.text.clone(),
                origin: votes.question.origin.clone(),
                asset: votes.question.asset.clone(),
                decision: outcome.decision,
                display_percent: outcome.display_percent,
                reply_count: outcome.reply_count,
                control,
            }
        })
        .collect();
    rows.sort_by(|a, b| a.question_id.cmp(&b.question_id));
    rows
}
