use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use tcpanswer_harness::FailurePolicy;
use tcpanswer_transport::DEFAULT_ADDR;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod run;
pub mod send;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run concurrent scripted sessions against a server.
    Run(RunArgs),
    /// Start the reference answer server.
    Serve(ServeArgs),
    /// Send a single frame and print the reply.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Serve(args) => serve::run(args),
        Command::Send(args) => send::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum PolicyArg {
    /// Record failed sessions and wait for the rest.
    Isolate,
    /// Fail the run on the first failed session.
    Abort,
}

impl From<PolicyArg> for FailurePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Isolate => FailurePolicy::Isolate,
            PolicyArg::Abort => FailurePolicy::Abort,
        }
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Server address (ip:port, host:port or :port).
    #[arg(default_value = DEFAULT_ADDR)]
    pub addr: String,
    /// Number of concurrent sessions.
    #[arg(long, short = 'n', default_value_t = 1000)]
    pub sessions: usize,
    /// What to do when a session fails.
    #[arg(long, value_enum, default_value = "isolate")]
    pub policy: PolicyArg,
    /// Per-read timeout for every session (e.g. 5s, 500ms). Default: none.
    #[arg(long)]
    pub read_timeout: Option<String>,
    /// Run sessions as tokio tasks instead of threads.
    #[arg(long = "async")]
    pub use_async: bool,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind (ip:port, host:port or :port).
    #[arg(default_value = DEFAULT_ADDR)]
    pub addr: String,
    /// Close connections idle for longer than this (e.g. 30s). Default: never.
    #[arg(long)]
    pub idle_timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Server address (ip:port, host:port or :port).
    pub addr: String,
    /// Command code to send.
    #[arg(long, short = 'c')]
    pub command: u16,
    /// Raw string payload.
    #[arg(long)]
    pub data: Option<String>,
    /// Maximum time to wait for the reply (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

pub(crate) fn parse_optional_duration(input: Option<&str>) -> CliResult<Option<Duration>> {
    input.map(parse_duration).transpose()
}
