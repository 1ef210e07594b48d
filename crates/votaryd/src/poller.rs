//! Poll scheduler.
//!
//! A repeating fetch task with a fixed period, bound to the question view's
//! lifecycle. Cancellation stops scheduling; an in-flight request is not
//! aborted, its completion just fails the epoch check in the session and is
//! discarded. A transient fetch failure produces no update and the next
//! tick retries; a malformed response skips that tick only.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::client::NodeClient;
use crate::render::RenderSink;
use crate::session::{ApplyOutcome, SessionState};

/// Handle to a running poll loop.
#[derive(Debug)]
pub struct PollHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Stop scheduling further ticks.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel and wait for the loop to wind down.
    pub async fn join(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

/// One fetch/reconcile cycle. Shared by the poll loop and the immediate
/// fetch a freshly opened view performs.
pub async fn poll_once<C, S>(state: &RwLock<SessionState>, client: &C, sink: &S)
where
    C: NodeClient,
    S: RenderSink,
{
    let ticket = { state.write().await.begin_fetch() };
    let Some(ticket) = ticket else {
        return;
    };

    match client.fetch_votes(&ticket.asset).await {
        Ok(remote) => {
            let mut session = state.write().await;
            match session.apply_remote(&ticket, remote) {
                ApplyOutcome::Changed(rows) => sink.render(&rows),
                ApplyOutcome::Unchanged => {
                    debug!(tick = ticket.tick, "poll tick: no material change")
                }
                ApplyOutcome::StaleTick => {
                    debug!(tick = ticket.tick, "discarded out-of-order poll completion")
                }
                ApplyOutcome::StaleView => {
                    debug!(tick = ticket.tick, "discarded completion for a closed view")
                }
            }
        }
        Err(e) if e.is_transient() => {
            warn!(asset = %ticket.asset, "poll tick failed: {e}");
        }
        Err(e) => {
            warn!(asset = %ticket.asset, "skipping poll tick: {e}");
        }
    }
}

/// Spawn the repeating poll task for the currently open view.
pub fn spawn<C, S>(
    state: Arc<RwLock<SessionState>>,
    client: Arc<C>,
    sink: Arc<S>,
    period: Duration,
) -> PollHandle
where
    C: NodeClient,
    S: RenderSink,
{
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(period) => {}
            }
            poll_once(state.as_ref(), client.as_ref(), sink.as_ref()).await;
        }
        debug!("poll loop stopped");
    });
    PollHandle { cancel, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientError;
    use crate::render::VoteRow;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use votary::asset::{Asset, AssetBook};
    use votary::prelude::*;

    struct ScriptedNode {
        votes: Mutex<VecDeque<Result<Snapshot, ClientError>>>,
        fetches: AtomicUsize,
    }

    impl ScriptedNode {
        fn new(responses: Vec<Result<Snapshot, ClientError>>) -> Self {
            Self {
                votes: Mutex::new(responses.into()),
                fetches: AtomicUsize::new(0),
            }
        }

        fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    impl NodeClient for ScriptedNode {
        async fn fetch_asset_list(&self) -> Result<AssetBook, ClientError> {
            Ok(AssetBook::new())
        }

        async fn fetch_votes(&self, _asset: &str) -> Result<Snapshot, ClientError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.votes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Snapshot::new()))
        }

        async fn submit_vote(&self, _q: &Question, _answer: bool) -> Result<(), ClientError> {
            Ok(())
        }

        async fn submit_new_question(&self, _q: &str, _asset: &str) -> Result<(), ClientError> {
            Ok(())
        }

        async fn submit_new_asset(&self, _n: &str, _supply: u64) -> Result<(), ClientError> {
            Ok(())
        }

        async fn fetch_self_identity(&self) -> Result<String, ClientError> {
            Ok("self".to_string())
        }
    }

    struct RecordingSink {
        renders: Mutex<Vec<Vec<VoteRow>>>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self {
                renders: Mutex::new(Vec::new()),
            }
        }

        fn render_count(&self) -> usize {
            self.renders.lock().unwrap().len()
        }
    }

    impl RenderSink for RecordingSink {
        fn render(&self, rows: &[VoteRow]) {
            self.renders.lock().unwrap().push(rows.to_vec());
        }
    }

    fn snapshot_one_vote() -> Snapshot {
        let mut s = Snapshot::new();
        s.upsert(
            Question::new("Approve merger?", "nodeX", "ACME"),
            VoteRecord::new("nodeX", Reply::Yes, 40),
        );
        s
    }

    fn snapshot_reordered() -> Snapshot {
        // Same content as snapshot_one_vote plus nothing: built separately
        // to make sure only content equality matters.
        snapshot_one_vote()
    }

    fn open_state() -> Arc<RwLock<SessionState>> {
        let mut session = SessionState::new("self");
        session.assets.insert("ACME", Asset::new(100, 1000));
        session.open_view("ACME");
        Arc::new(RwLock::new(session))
    }

    fn transient() -> ClientError {
        ClientError::Transient(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
    }

    #[tokio::test]
    async fn identical_consecutive_polls_render_once() {
        let state = open_state();
        let node = ScriptedNode::new(vec![Ok(snapshot_one_vote()), Ok(snapshot_reordered())]);
        let sink = RecordingSink::new();

        poll_once(state.as_ref(), &node, &sink).await;
        poll_once(state.as_ref(), &node, &sink).await;

        assert_eq!(node.fetch_count(), 2);
        assert_eq!(sink.render_count(), 1);
    }

    #[tokio::test]
    async fn transient_failure_skips_the_tick_and_the_next_one_recovers() {
        let state = open_state();
        let node = ScriptedNode::new(vec![Err(transient()), Ok(snapshot_one_vote())]);
        let sink = RecordingSink::new();

        poll_once(state.as_ref(), &node, &sink).await;
        assert_eq!(sink.render_count(), 0);

        poll_once(state.as_ref(), &node, &sink).await;
        assert_eq!(sink.render_count(), 1);
    }

    #[tokio::test]
    async fn malformed_response_skips_the_tick_without_killing_anything() {
        let state = open_state();
        let node = ScriptedNode::new(vec![
            Err(ClientError::Malformed("bad shape".to_string())),
            Ok(snapshot_one_vote()),
        ]);
        let sink = RecordingSink::new();

        poll_once(state.as_ref(), &node, &sink).await;
        poll_once(state.as_ref(), &node, &sink).await;
        assert_eq!(sink.render_count(), 1);
    }

    #[tokio::test]
    async fn poll_without_an_open_view_is_a_no_op() {
        let state = Arc::new(RwLock::new(SessionState::new("self")));
        let node = ScriptedNode::new(vec![Ok(snapshot_one_vote())]);
        let sink = RecordingSink::new();

        poll_once(state.as_ref(), &node, &sink).await;
        assert_eq!(node.fetch_count(), 0);
        assert_eq!(sink.render_count(), 0);
    }

    #[tokio::test]
    async fn merger_scenario_end_to_end() {
        let state = open_state();
        let confirming = {
            let mut s = snapshot_one_vote();
            s.upsert(
                Question::new("Approve merger?", "nodeX", "ACME"),
                VoteRecord::new("self", Reply::No, 100),
            );
            s
        };
        let node = ScriptedNode::new(vec![Ok(snapshot_one_vote()), Ok(confirming)]);
        let sink = RecordingSink::new();

        // First poll renders YES 100% for nodeX's lone vote.
        poll_once(state.as_ref(), &node, &sink).await;
        assert_eq!(sink.render_count(), 1);

        // Local voter casts no with the captured stake of 100.
        let id = QuestionId::derive("Approve merger?", "nodeX", "ACME");
        let (_question, rows) = state.write().await.cast_vote(&id, false).unwrap();
        assert_eq!(rows[0].display_percent, Some(71.4));

        // The confirming poll matches the overlaid state: no re-render.
        poll_once(state.as_ref(), &node, &sink).await;
        assert_eq!(sink.render_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_poller_schedules_no_further_ticks() {
        let state = open_state();
        let node = Arc::new(ScriptedNode::new(Vec::new()));
        let sink = Arc::new(RecordingSink::new());

        let handle = spawn(
            Arc::clone(&state),
            Arc::clone(&node),
            Arc::clone(&sink),
            Duration::from_secs(2),
        );

        tokio::time::sleep(Duration::from_secs(7)).await;
        let ticks_before = node.fetch_count();
        assert!(ticks_before >= 2);

        handle.join().await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(node.fetch_count(), ticks_before);
    }

    #[tokio::test(start_paused = true)]
    async fn closing_the_view_stops_its_poller() {
        let state = open_state();
        let node = Arc::new(ScriptedNode::new(Vec::new()));
        let sink = Arc::new(RecordingSink::new());

        let handle = spawn(
            Arc::clone(&state),
            Arc::clone(&node),
            Arc::clone(&sink),
            Duration::from_secs(2),
        );
        state.write().await.set_poller(handle);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(node.fetch_count() >= 1);

        state.write().await.close_view();
        let ticks_at_close = node.fetch_count();
        tokio::time::sleep(Duration::from_secs(10)).await;
        // At most the one tick that was already past its sleep may land;
        // it is discarded by the epoch check and nothing further fires.
        assert!(node.fetch_count() <= ticks_at_close + 1);
        assert_eq!(sink.render_count(), 0);
    }
}
