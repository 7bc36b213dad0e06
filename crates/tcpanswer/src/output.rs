use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use tcpanswer_frame::{command_name, Frame};
use tcpanswer_harness::{FailureKind, RunReport};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    /// Reply payload bytes only (`send`); other commands fall back to pretty.
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct FailureOutput {
    session: usize,
    kind: &'static str,
    error: String,
}

#[derive(Serialize)]
struct RunOutput<'a> {
    addr: &'a str,
    mode: &'a str,
    sessions: usize,
    succeeded: usize,
    failed: usize,
    elapsed_ms: u128,
    failures: Vec<FailureOutput>,
    timestamp: String,
}

pub fn kind_name(kind: FailureKind) -> &'static str {
    match kind {
        FailureKind::Transport => "transport",
        FailureKind::Protocol => "protocol",
        FailureKind::Assertion => "assertion",
        FailureKind::Internal => "internal",
    }
}

pub fn print_report(report: &RunReport, addr: &str, mode: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = RunOutput {
                addr,
                mode,
                sessions: report.sessions,
                succeeded: report.succeeded,
                failed: report.failed(),
                elapsed_ms: report.elapsed.as_millis(),
                failures: report
                    .failures
                    .iter()
                    .map(|failure| FailureOutput {
                        session: failure.session,
                        kind: kind_name(failure.error.kind()),
                        error: failure.error.to_string(),
                    })
                    .collect(),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut summary = Table::new();
            summary
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ADDR", "MODE", "SESSIONS", "OK", "FAILED", "ELAPSED"])
                .add_row(vec![
                    addr.to_string(),
                    mode.to_string(),
                    report.sessions.to_string(),
                    report.succeeded.to_string(),
                    report.failed().to_string(),
                    format!("{:?}", report.elapsed),
                ]);
            println!("{summary}");

            if !report.failures.is_empty() {
                let mut failures = Table::new();
                failures
                    .load_preset(UTF8_FULL)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(vec!["SESSION", "KIND", "ERROR"]);
                for failure in &report.failures {
                    failures.add_row(vec![
                        failure.session.to_string(),
                        kind_name(failure.error.kind()).to_string(),
                        failure.error.to_string(),
                    ]);
                }
                println!("{failures}");
            }
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            println!(
                "addr={} mode={} sessions={} ok={} failed={} elapsed={:?}",
                addr,
                mode,
                report.sessions,
                report.succeeded,
                report.failed(),
                report.elapsed
            );
            for failure in &report.failures {
                println!(
                    "  session={} kind={} error={}",
                    failure.session,
                    kind_name(failure.error.kind()),
                    failure.error
                );
            }
        }
    }
}

#[derive(Serialize)]
struct ReplyOutput<'a> {
    addr: &'a str,
    sent: u16,
    closed: bool,
    command: Option<u16>,
    command_name: Option<&'static str>,
    length: Option<u16>,
    payload: Option<String>,
    timestamp: String,
}

/// Print the outcome of one `send` exchange. `reply` is `None` when the
/// server closed the connection instead of answering.
pub fn print_reply(addr: &str, sent: u16, reply: Option<&Frame>, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ReplyOutput {
                addr,
                sent,
                closed: reply.is_none(),
                command: reply.map(Frame::command),
                command_name: reply.map(|frame| command_name(frame.command())),
                length: reply.map(Frame::length),
                payload: reply.map(|frame| payload_preview(frame.payload().as_ref())),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SENT", "REPLY", "LENGTH", "PAYLOAD"]);
            match reply {
                Some(frame) => table.add_row(vec![
                    sent.to_string(),
                    format!("{} ({})", frame.command(), command_name(frame.command())),
                    frame.length().to_string(),
                    payload_preview(frame.payload().as_ref()),
                ]),
                None => table.add_row(vec![
                    sent.to_string(),
                    "closed".to_string(),
                    "-".to_string(),
                    "-".to_string(),
                ]),
            };
            println!("{table}");
        }
        OutputFormat::Pretty => match reply {
            Some(frame) => println!(
                "sent={} reply={} ({}) length={} payload={}",
                sent,
                frame.command(),
                command_name(frame.command()),
                frame.length(),
                payload_preview(frame.payload().as_ref())
            ),
            None => println!("sent={sent} reply=closed"),
        },
        OutputFormat::Raw => {
            if let Some(frame) = reply {
                print_raw(frame.payload().as_ref());
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
