//! # votary
//!
//! Local-side engine for stake-weighted governance votes on tokenized assets.
//!
//! A remote ledger-backed node is the source of truth for open questions and
//! the replies cast against them. This crate holds the local view of that
//! state and the logic that keeps it honest: a pure weighted tally, a
//! snapshot store keyed by question identity, and a reconciliation engine
//! that merges fresh remote snapshots without dropping a just-cast local
//! vote or re-rendering when nothing material changed.
//!
//! ## Quick Start
//!
//! ```
//! use votary::prelude::*;
//!
//! let question = Question::new("Approve merger?", "nodeX", "ACME");
//! let mut store = Snapshot::new();
//! store.upsert(question.clone(), VoteRecord::new("nodeX", Reply::Yes, 40));
//!
//! let outcome = tally(store.get(&question.id()).unwrap().casts());
//! assert_eq!(outcome.decision, Decision::Yes);
//! ```
//!
//! ## Modules
//!
//! - [`asset`]: Tokenized asset holdings
//! - [`votation`]: Questions, replies and vote records
//! - [`tally`]: Weighted yes/no aggregation
//! - [`snapshot`]: Local snapshot store and the optimistic overlay
//! - [`reconcile`]: Remote/local snapshot merging and change detection

#[path = "core/asset.rs"]
pub mod asset;

#[path = "core/votation.rs"]
pub mod votation;

#[path = "core/tally.rs"]
pub mod tally;

#[path = "core/snapshot.rs"]
pub mod snapshot;

#[path = "core/reconcile.rs"]
pub mod reconcile;

/// Convenience re-exports for consumers.
pub mod prelude {
    pub use crate::asset::{Asset, AssetBook};
    pub use crate::reconcile::{reconcile, ReconcileOutcome};
    pub use crate::snapshot::{Overlay, QuestionVotes, Snapshot};
    pub use crate::tally::{tally, Decision, TallyOutcome};
    pub use crate::votation::{Question, QuestionId, Reply, VoteCast, VoteRecord};
}
