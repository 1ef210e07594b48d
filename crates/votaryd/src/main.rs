//! Votary daemon - governance vote polling client
//!
//! This daemon keeps a live view of stake-weighted governance votes on
//! tokenized assets, backed by a remote ledger node:
//! - Polls the node for the open questions on the inspected asset
//! - Reconciles each poll into the local snapshot without dropping a
//!   just-cast local vote or re-rendering unchanged state
//! - Applies local votes optimistically, ahead of ledger confirmation
//! - IPC server for UI clients (line-delimited JSON over TCP)
//!
//! Nothing is persisted locally; the node is the source of truth and the
//! view is rebuilt from scratch every time it is opened.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

mod client;
mod config;
mod poller;
mod render;
mod session;

use client::{ClientError, NodeClient, TcpNodeClient};
use config::Config;
use render::{LogSink, RenderSink, VoteRow};
use session::SessionState;
use votary::asset::AssetBook;
use votary::votation::QuestionId;

// ═══════════════════════════════════════════════════════════════════════════
// Protocol Messages
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
enum Request {
    /// Daemon status: node address, local voter id, open view if any.
    Status,
    /// Refresh and return the local holdings.
    ListAssets,
    CreateAsset {
        name: String,
        total_supply: u64,
    },
    /// Open the question view for an asset and start polling it.
    OpenVotes {
        asset: String,
    },
    /// Close the view and stop polling. The snapshot is discarded.
    CloseVotes,
    /// Current rows of the open view.
    Rows,
    /// Cast the local voter's reply. Applied optimistically; the ledger
    /// submission happens in the background.
    CastVote {
        question_id: String,
        answer: bool,
    },
    /// Raise a new question against the open asset.
    NewQuestion {
        question: String,
    },
    Shutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
enum Response {
    Status {
        node: String,
        self_name: String,
        open_asset: Option<String>,
    },
    Assets {
        assets: AssetBook,
    },
    Rows {
        rows: Vec<VoteRow>,
    },
    Success {
        message: String,
    },
    Error {
        message: String,
    },
}

// ═══════════════════════════════════════════════════════════════════════════
// Client Handler
// ═══════════════════════════════════════════════════════════════════════════

async fn handle_client<C, S>(
    stream: TcpStream,
    state: Arc<RwLock<SessionState>>,
    node: Arc<C>,
    sink: Arc<S>,
    cfg: Config,
) -> Result<(), Box<dyn std::error::Error>>
where
    C: NodeClient,
    S: RenderSink,
{
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        let request: Request = match serde_json::from_str(&line) {
            Ok(req) => req,
            Err(e) => {
                let resp = Response::Error {
                    message: format!("Invalid request: {}", e),
                };
                writer
                    .write_all(serde_json::to_string(&resp)?.as_bytes())
                    .await?;
                writer.write_all(b"\n").await?;
                continue;
            }
        };

        let mut shutdown = false;
        let response = match request {
            Request::Status => {
                let s = state.read().await;
                Response::Status {
                    node: cfg.node.clone(),
                    self_name: s.self_name().to_string(),
                    open_asset: s.open_asset().map(|a| a.to_string()),
                }
            }
            Request::ListAssets => match node.fetch_asset_list().await {
                Ok(book) => {
                    let mut s = state.write().await;
                    s.assets.replace_all(book.clone());
                    Response::Assets { assets: book }
                }
                Err(e) => Response::Error {
                    message: e.to_string(),
                },
            },
            Request::CreateAsset { name, total_supply } => {
                match node.submit_new_asset(&name, total_supply).await {
                    Ok(()) => Response::Success {
                        message: format!("Asset {name} submitted to the ledger"),
                    },
                    Err(e) => Response::Error {
                        message: e.to_string(),
                    },
                }
            }
            Request::OpenVotes { asset } => {
                // Refresh holdings first so the view captures the current
                // stake as the frozen weight for local casts. A failed
                // refresh falls back to the last known book.
                match node.fetch_asset_list().await {
                    Ok(book) => state.write().await.assets.replace_all(book),
                    Err(e) => warn!("asset refresh on open failed: {e}"),
                }

                state.write().await.open_view(&asset);

                // First snapshot immediately, then the repeating loop.
                poller::poll_once(state.as_ref(), node.as_ref(), sink.as_ref()).await;
                let handle = poller::spawn(
                    Arc::clone(&state),
                    Arc::clone(&node),
                    Arc::clone(&sink),
                    cfg.poll_period(),
                );
                state.write().await.set_poller(handle);

                Response::Success {
                    message: format!("Question view open for {asset}"),
                }
            }
            Request::CloseVotes => {
                state.write().await.close_view();
                Response::Success {
                    message: "Question view closed".to_string(),
                }
            }
            Request::Rows => match state.read().await.rows() {
                Some(rows) => Response::Rows { rows },
                None => Response::Error {
                    message: "no question view is open".to_string(),
                },
            },
            Request::CastVote {
                question_id,
                answer,
            } => {
                let id = QuestionId::from(question_id);
                let cast = { state.write().await.cast_vote(&id, answer) };
                match cast {
                    Ok((question, rows)) => {
                        sink.render(&rows);

                        // Fire-and-forget: a failed submission is reported
                        // once and not retried; the local cast stays.
                        let node = Arc::clone(&node);
                        tokio::spawn(async move {
                            if let Err(e) = node.submit_vote(&question, answer).await {
                                warn!(question = %question.text, "vote submission failed: {e}");
                            }
                        });

                        Response::Rows { rows }
                    }
                    Err(message) => Response::Error { message },
                }
            }
            Request::NewQuestion { question } => {
                let asset = state.read().await.open_asset().map(|a| a.to_string());
                match asset {
                    Some(asset) => match node.submit_new_question(&question, &asset).await {
                        Ok(()) => Response::Success {
                            message: "Question submitted to the ledger".to_string(),
                        },
                        Err(e) => Response::Error {
                            message: e.to_string(),
                        },
                    },
                    None => Response::Error {
                        message: "no question view is open".to_string(),
                    },
                }
            }
            Request::Shutdown => {
                shutdown = true;
                Response::Success {
                    message: "Shutting down".to_string(),
                }
            }
        };

        writer
            .write_all(serde_json::to_string(&response)?.as_bytes())
            .await?;
        writer.write_all(b"\n").await?;

        if shutdown {
            info!("shutdown requested over IPC");
            state.write().await.close_view();
            std::process::exit(0);
        }
    }

    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════
// Main
// ═══════════════════════════════════════════════════════════════════════════

async fn fetch_identity<C: NodeClient>(node: &C) -> Result<String, ClientError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match node.fetch_self_identity().await {
            Ok(name) => return Ok(name),
            Err(e) if attempt >= 5 => return Err(e),
            Err(e) => {
                warn!(attempt, "identity fetch failed, retrying: {e}");
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let cfg = Config::load()?;
    info!(node = %cfg.node, "votary daemon starting");

    let node = Arc::new(TcpNodeClient::new(cfg.node.clone()));

    // The local voter id; every cast in this session is recorded under it.
    let self_name = fetch_identity(node.as_ref()).await?;
    info!(self_name = %self_name, "identity resolved");

    let state = Arc::new(RwLock::new(SessionState::new(self_name)));
    let sink = Arc::new(LogSink);

    // Stop the poll loop before exiting on Ctrl-C.
    {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                state.write().await.close_view();
                info!("interrupted; shutting down");
                std::process::exit(0);
            }
        });
    }

    let listener = TcpListener::bind(&cfg.listen).await?;
    info!("votary daemon listening on {}", cfg.listen);

    loop {
        let (stream, addr) = listener.accept().await?;
        info!("client connected: {}", addr);
        let state = Arc::clone(&state);
        let node = Arc::clone(&node);
        let sink = Arc::clone(&sink);
        let cfg = cfg.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, state, node, sink, cfg).await {
                error!("client handler error: {}", e);
            }
        });
    }
}
