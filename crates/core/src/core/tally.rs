//! Weighted yes/no aggregation.

use crate::votation::{Reply, VoteCast};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Outcome classification for a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Decision {
    Yes,
    No,
    /// No replies yet. Rendered as a placeholder, never as "0%".
    Undecided,
}

/// Result of tallying one question's replies.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TallyOutcome {
    pub decision: Decision,
    /// Share of stake behind the winning side, one decimal place.
    /// Absent when there are no replies.
    pub display_percent: Option<f64>,
    pub reply_count: usize,
}

fn round1(percent: f64) -> f64 {
    (percent * 10.0).round() / 10.0
}

/// Tally a question's replies into a stake-weighted decision.
///
/// Each cast carries its own frozen weight; weights are summed as-is, never
/// re-normalized. The threshold is strictly greater than 50%: an exact 50/50
/// split counts as a NO. When replies exist but all weights are zero there
/// is nothing to divide by, and the yes-share is taken to be zero.
///
/// Pure and deterministic over the input set.
pub fn tally<I>(replies: I) -> TallyOutcome
where
    I: IntoIterator<Item = VoteCast>,
{
    let mut reply_count = 0usize;
    let mut total_weight: u128 = 0;
    let mut yes_weight: u128 = 0;

    for cast in replies {
        reply_count += 1;
        total_weight += cast.weight as u128;
        if cast.reply == Reply::Yes {
            yes_weight += cast.weight as u128;
        }
    }

    if reply_count == 0 {
        return TallyOutcome {
            decision: Decision::Undecided,
            display_percent: None,
            reply_count: 0,
        };
    }

    let percent_yes = if total_weight == 0 {
        0.0
    } else {
        100.0 * yes_weight as f64 / total_weight as f64
    };

    if percent_yes > 50.0 {
        TallyOutcome {
            decision: Decision::Yes,
            display_percent: Some(round1(percent_yes)),
            reply_count,
        }
    } else {
        TallyOutcome {
            decision: Decision::No,
            display_percent: Some(round1(100.0 - percent_yes)),
            reply_count,
        }
    }
}
