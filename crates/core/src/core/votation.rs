//! Questions, replies and vote records.
//!
//! A question's identity is not its text alone: two holders can raise the
//! same wording against different assets. Identity is the hex SHA-256 over
//! question text, originating holder and asset name, which is also how the
//! remote ledger keys its vote snapshots, so ids derived locally line up
//! with ids seen on the wire.

use core::fmt;

use sha2::{Digest, Sha256};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A voter's reply to a governance question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Reply {
    Yes,
    No,
}

impl Reply {
    pub fn from_bool(answer: bool) -> Self {
        if answer {
            Reply::Yes
        } else {
            Reply::No
        }
    }

    pub fn as_bool(self) -> bool {
        matches!(self, Reply::Yes)
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Yes => write!(f, "yes"),
            Reply::No => write!(f, "no"),
        }
    }
}

/// Wire-stable question identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct QuestionId(String);

impl QuestionId {
    /// Derive the identity of a question raised by `origin` against `asset`.
    pub fn derive(text: &str, origin: &str, asset: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hasher.update(origin.as_bytes());
        hasher.update(asset.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for QuestionId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

/// A governance question raised against an asset.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Question {
    pub text: String,
    pub origin: String,
    pub asset: String,
}

impl Question {
    pub fn new(text: impl Into<String>, origin: impl Into<String>, asset: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            origin: origin.into(),
            asset: asset.into(),
        }
    }

    pub fn id(&self) -> QuestionId {
        QuestionId::derive(&self.text, &self.origin, &self.asset)
    }
}

/// A reply together with the voter's stake weight, frozen at the moment the
/// reply was recorded. Balances drift; recorded votes do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VoteCast {
    pub reply: Reply,
    pub weight: u64,
}

impl VoteCast {
    pub fn new(reply: Reply, weight: u64) -> Self {
        Self { reply, weight }
    }
}

/// One voter's reply to one question.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VoteRecord {
    pub voter: String,
    pub reply: Reply,
    pub weight: u64,
}

impl VoteRecord {
    pub fn new(voter: impl Into<String>, reply: Reply, weight: u64) -> Self {
        Self {
            voter: voter.into(),
            reply,
            weight,
        }
    }

    pub fn cast(&self) -> VoteCast {
        VoteCast::new(self.reply, self.weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_text_different_origin_is_a_different_question() {
        let a = Question::new("Approve merger?", "nodeA", "ACME");
        let b = Question::new("Approve merger?", "nodeB", "ACME");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn same_text_different_asset_is_a_different_question() {
        let a = Question::new("Approve merger?", "nodeA", "ACME");
        let b = Question::new("Approve merger?", "nodeA", "GLOBEX");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn id_derivation_is_stable() {
        let q = Question::new("Approve merger?", "nodeA", "ACME");
        assert_eq!(q.id(), q.id());
        assert_eq!(q.id().as_str().len(), 64);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn reply_wire_form_is_lowercase() {
        assert_eq!(serde_json::to_string(&Reply::Yes).unwrap(), "\"yes\"");
        assert_eq!(
            serde_json::from_str::<Reply>("\"no\"").unwrap(),
            Reply::No
        );
    }
}
