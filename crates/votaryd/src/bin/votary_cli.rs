//! CLI client for the `votaryd` daemon.
//!
//! Examples:
//!   votary-cli status
//!   votary-cli assets
//!   votary-cli open ACME
//!   votary-cli rows
//!   votary-cli vote <question-id> yes
//!   votary-cli ask "Approve merger?"
//!   votary-cli close
//!
//! By default it talks to 127.0.0.1:7171; override with `--addr host:port`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::process;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
enum Request {
    Status,
    ListAssets,
    CreateAsset { name: String, total_supply: u64 },
    OpenVotes { asset: String },
    CloseVotes,
    Rows,
    CastVote { question_id: String, answer: bool },
    NewQuestion { question: String },
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
        assets: HashMap<String, AssetEntry>,
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

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AssetEntry {
    balance: u64,
    total_supply: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Decision {
    Yes,
    No,
    Undecided,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RowControl {
    PendingChoice,
    Answered,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VoteRow {
    question_id: String,
    question: String,
    origin: String,
    asset: String,
    decision: Decision,
    display_percent: Option<f64>,
    reply_count: usize,
    control: RowControl,
}

fn usage() -> ! {
    eprintln!("votary-cli (talks to votaryd @ 127.0.0.1:7171 by default)");
    eprintln!("Usage: votary-cli [--addr host:port] <command> [args]\n");
    eprintln!("Commands:");
    eprintln!("  status                        Show daemon status");
    eprintln!("  assets                        List local holdings");
    eprintln!("  create-asset <name> <supply>  Submit a new asset to the ledger");
    eprintln!("  open <asset>                  Open the question view and start polling");
    eprintln!("  close                         Close the question view");
    eprintln!("  rows                          Show the current question rows");
    eprintln!("  vote <question-id> <yes|no>   Cast the local vote");
    eprintln!("  ask <question text>           Raise a question against the open asset");
    eprintln!("  shutdown                      Stop the daemon");
    process::exit(1);
}

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        usage();
    }

    let mut addr = "127.0.0.1:7171".to_string();
    if args.len() >= 2 && args[0] == "--addr" {
        addr = args[1].clone();
        args.drain(0..2);
    }

    if args.is_empty() {
        usage();
    }

    (addr, args)
}

fn send_request(addr: &str, req: &Request) -> Result<Response, String> {
    let mut stream = TcpStream::connect(addr).map_err(|e| format!("connect: {e}"))?;
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .map_err(|e| format!("set_read_timeout: {e}"))?;

    let mut line = serde_json::to_string(req).map_err(|e| format!("encode: {e}"))?;
    line.push('\n');
    stream
        .write_all(line.as_bytes())
        .map_err(|e| format!("send: {e}"))?;

    let mut reply = String::new();
    BufReader::new(stream)
        .read_line(&mut reply)
        .map_err(|e| format!("recv: {e}"))?;
    serde_json::from_str(reply.trim_end()).map_err(|e| format!("decode: {e}"))
}

fn print_rows(rows: &[VoteRow]) {
    if rows.is_empty() {
        println!("(no open questions)");
        return;
    }
    for row in rows {
        let verdict = match (&row.decision, row.display_percent) {
            (Decision::Undecided, _) => "UNDECIDED".to_string(),
            (Decision::Yes, Some(p)) => format!("YES {p:.1}%"),
            (Decision::No, Some(p)) => format!("NO {p:.1}%"),
            (d, None) => format!("{d:?}"),
        };
        let control = match row.control {
            RowControl::Answered => "[answered]",
            RowControl::PendingChoice => "[vote yes/no]",
        };
        println!(
            "{:12}  {} replies  {}  {}  (from {}, id {})",
            verdict,
            row.reply_count,
            control,
            row.question,
            row.origin,
            &row.question_id[..12.min(row.question_id.len())]
        );
    }
}

fn print_response(resp: Response) {
    match resp {
        Response::Status {
            node,
            self_name,
            open_asset,
        } => {
            println!("node:       {node}");
            println!("identity:   {self_name}");
            match open_asset {
                Some(asset) => println!("open view:  {asset}"),
                None => println!("open view:  (none)"),
            }
        }
        Response::Assets { assets } => {
            if assets.is_empty() {
                println!("(no holdings)");
            }
            let mut names: Vec<&String> = assets.keys().collect();
            names.sort();
            for name in names {
                let a = &assets[name];
                println!("{:16}  balance {:>10}  supply {:>10}", name, a.balance, a.total_supply);
            }
        }
        Response::Rows { rows } => print_rows(&rows),
        Response::Success { message } => println!("{message}"),
        Response::Error { message } => {
            eprintln!("error: {message}");
            process::exit(2);
        }
    }
}

fn main() {
    let (addr, args) = parse_args();

    let request = match args[0].as_str() {
        "status" => Request::Status,
        "assets" => Request::ListAssets,
        "create-asset" if args.len() == 3 => {
            let total_supply = match args[2].parse() {
                Ok(n) => n,
                Err(_) => usage(),
            };
            Request::CreateAsset {
                name: args[1].clone(),
                total_supply,
            }
        }
        "open" if args.len() == 2 => Request::OpenVotes {
            asset: args[1].clone(),
        },
        "close" => Request::CloseVotes,
        "rows" => Request::Rows,
        "vote" if args.len() == 3 => {
            let answer = match args[2].as_str() {
                "yes" => true,
                "no" => false,
                _ => usage(),
            };
            Request::CastVote {
                question_id: args[1].clone(),
                answer,
            }
        }
        "ask" if args.len() >= 2 => Request::NewQuestion {
            question: args[1..].join(" "),
        },
        "shutdown" => Request::Shutdown,
        _ => usage(),
    };

    match send_request(&addr, &request) {
        Ok(resp) => print_response(resp),
        Err(e) => {
            eprintln!("votary-cli: {e}");
            process::exit(2);
        }
    }
}
