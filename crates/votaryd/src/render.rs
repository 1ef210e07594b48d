//! Row projection for the question view.
//!
//! The render target is a sink taking the full ordered row set for the open
//! view. The daemon logs rows; UI clients read the same rows over IPC.

use serde::{Deserialize, Serialize};
use tracing::debug;

use votary::tally::Decision;

/// What the voter-facing control on a row should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowControl {
    /// Yes/no buttons: this voter has not answered.
    PendingChoice,
    /// "Answered" label, sticky for the rest of the session.
    Answered,
}

/// One visible row of the question view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteRow {
    pub question_id: String,
    pub question: String,
    pub origin: String,
    pub asset: String,
    pub decision: Decision,
    pub display_percent: Option<f64>,
    pub reply_count: usize,
    pub control: RowControl,
}

pub trait RenderSink: Send + Sync + 'static {
    fn render(&self, rows: &[VoteRow]);
}

/// Writes each rendered row set to the log.
pub struct LogSink;

impl RenderSink for LogSink {
    fn render(&self, rows: &[VoteRow]) {
        for row in rows {
            match row.display_percent {
                Some(percent) => debug!(
                    question = %row.question,
                    decision = ?row.decision,
                    percent,
                    replies = row.reply_count,
                    "row"
                ),
                None => debug!(
                    question = %row.question,
                    decision = ?row.decision,
                    replies = row.reply_count,
                    "row (no replies)"
                ),
            }
        }
    }
}
