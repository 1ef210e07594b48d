//! Remote node client.
//!
//! The ledger-backed node is an external collaborator; this module pins down
//! the handful of operations the daemon consumes and one wire realization:
//! line-delimited JSON over a short-lived TCP connection per request, with
//! internally tagged request/response messages.

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use votary::asset::{Asset, AssetBook};
use votary::snapshot::Snapshot;
use votary::votation::{Question, Reply, VoteRecord};

/// One request/response round trip may take this long before the caller
/// gives up and treats the tick as failed.
const ROUNDTRIP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ClientError {
    /// Network-level failure. Poll ticks swallow this and the next scheduled
    /// tick retries naturally; submissions report it once and stop.
    #[error("node unreachable: {0}")]
    Transient(#[from] io::Error),
    /// The node replied with something this client cannot use.
    #[error("malformed node response: {0}")]
    Malformed(String),
}

impl ClientError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Transient(_))
    }
}

/// Operations the daemon needs from the remote node.
pub trait NodeClient: Send + Sync + 'static {
    /// The local node's holdings, replaced wholesale on each call.
    fn fetch_asset_list(&self) -> impl Future<Output = Result<AssetBook, ClientError>> + Send;

    /// All open questions on `asset` with their per-voter answers. Each
    /// answer carries the balance the ledger recorded at inclusion time.
    fn fetch_votes(&self, asset: &str) -> impl Future<Output = Result<Snapshot, ClientError>> + Send;

    fn submit_vote(
        &self,
        question: &Question,
        answer: bool,
    ) -> impl Future<Output = Result<(), ClientError>> + Send;

    fn submit_new_question(
        &self,
        question: &str,
        asset: &str,
    ) -> impl Future<Output = Result<(), ClientError>> + Send;

    fn submit_new_asset(
        &self,
        name: &str,
        total_supply: u64,
    ) -> impl Future<Output = Result<(), ClientError>> + Send;

    /// The local voter id. Fetched once at startup.
    fn fetch_self_identity(&self) -> impl Future<Output = Result<String, ClientError>> + Send;
}

// ─────────────────────────────────────────────────────────────────────────
// Wire messages
// ─────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum NodeRequest<'a> {
    AssetList,
    AssetCreate { name: &'a str, total_supply: u64 },
    Votes { asset: &'a str },
    Vote {
        question: &'a str,
        asset: &'a str,
        origin: &'a str,
        answer: bool,
    },
    NewQuestion { question: &'a str, asset: &'a str },
    Identity,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum NodeResponse {
    Assets {
        assets: HashMap<String, WireAsset>,
    },
    Votes {
        #[serde(default)]
        votes: HashMap<String, WireQuestion>,
    },
    Identity {
        name: String,
    },
    Success {
        #[serde(default)]
        message: String,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Deserialize)]
struct WireAsset {
    balance: u64,
    total_supply: u64,
}

#[derive(Debug, Deserialize)]
struct WireQuestion {
    question: String,
    origin: String,
    #[serde(default)]
    answers: HashMap<String, WireAnswer>,
}

#[derive(Debug, Deserialize)]
struct WireAnswer {
    reply: Reply,
    balance: u64,
}

/// Question ids are derived locally from (text, origin, asset); the wire map
/// keys are the node's own ids and are not trusted beyond transport.
fn snapshot_from_wire(asset: &str, votes: HashMap<String, WireQuestion>) -> Snapshot {
    let mut snapshot = Snapshot::new();
    for (_wire_id, entry) in votes {
        let question = Question::new(entry.question, entry.origin, asset);
        snapshot.insert_question(question.clone());
        for (voter, answer) in entry.answers {
            snapshot.upsert(
                question.clone(),
                VoteRecord::new(voter, answer.reply, answer.balance),
            );
        }
    }
    snapshot
}

fn unexpected(op: &str, resp: &NodeResponse) -> ClientError {
    ClientError::Malformed(format!("unexpected reply to {op}: {resp:?}"))
}

// ─────────────────────────────────────────────────────────────────────────
// TCP implementation
// ─────────────────────────────────────────────────────────────────────────

pub struct TcpNodeClient {
    addr: String,
}

impl TcpNodeClient {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    async fn roundtrip(&self, request: &NodeRequest<'_>) -> Result<NodeResponse, ClientError> {
        let line =
            serde_json::to_string(request).map_err(|e| ClientError::Malformed(e.to_string()))?;

        let io = async {
            let mut stream = TcpStream::connect(&self.addr).await?;
            stream.write_all(line.as_bytes()).await?;
            stream.write_all(b"\n").await?;
            let mut lines = BufReader::new(stream).lines();
            lines.next_line().await
        };

        let reply = tokio::time::timeout(ROUNDTRIP_TIMEOUT, io)
            .await
            .map_err(|_| {
                ClientError::Transient(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "node round trip timed out",
                ))
            })??;

        let Some(reply) = reply else {
            return Err(ClientError::Transient(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "node closed the connection",
            )));
        };

        let response: NodeResponse =
            serde_json::from_str(&reply).map_err(|e| ClientError::Malformed(e.to_string()))?;
        match response {
            NodeResponse::Error { message } => {
                Err(ClientError::Malformed(format!("node error: {message}")))
            }
            other => Ok(other),
        }
    }
}

impl NodeClient for TcpNodeClient {
    async fn fetch_asset_list(&self) -> Result<AssetBook, ClientError> {
        match self.roundtrip(&NodeRequest::AssetList).await? {
            NodeResponse::Assets { assets } => {
                let mut book = AssetBook::new();
                for (name, a) in assets {
                    book.insert(name, Asset::new(a.balance, a.total_supply));
                }
                Ok(book)
            }
            other => Err(unexpected("AssetList", &other)),
        }
    }

    async fn fetch_votes(&self, asset: &str) -> Result<Snapshot, ClientError> {
        match self.roundtrip(&NodeRequest::Votes { asset }).await? {
            NodeResponse::Votes { votes } => Ok(snapshot_from_wire(asset, votes)),
            other => Err(unexpected("Votes", &other)),
        }
    }

    async fn submit_vote(&self, question: &Question, answer: bool) -> Result<(), ClientError> {
        match self
            .roundtrip(&NodeRequest::Vote {
                question: &question.text,
                asset: &question.asset,
                origin: &question.origin,
                answer,
            })
            .await?
        {
            NodeResponse::Success { .. } => Ok(()),
            other => Err(unexpected("Vote", &other)),
        }
    }

    async fn submit_new_question(&self, question: &str, asset: &str) -> Result<(), ClientError> {
        match self
            .roundtrip(&NodeRequest::NewQuestion { question, asset })
            .await?
        {
            NodeResponse::Success { .. } => Ok(()),
            other => Err(unexpected("NewQuestion", &other)),
        }
    }

    async fn submit_new_asset(&self, name: &str, total_supply: u64) -> Result<(), ClientError> {
        match self
            .roundtrip(&NodeRequest::AssetCreate { name, total_supply })
            .await?
        {
            NodeResponse::Success { .. } => Ok(()),
            other => Err(unexpected("AssetCreate", &other)),
        }
    }

    async fn fetch_self_identity(&self) -> Result<String, ClientError> {
        match self.roundtrip(&NodeRequest::Identity).await? {
            NodeResponse::Identity { name } => Ok(name),
            other => Err(unexpected("Identity", &other)),
        }
    }
}
