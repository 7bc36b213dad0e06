//! Reference answer server on the default port.
//!
//! Run with:
//!   cargo run --example answer-server
//!
//! In another terminal:
//!   cargo run --features cli -- send 127.0.0.1:1102 --command 1 --data hello

use std::sync::atomic::AtomicBool;

use tcpanswer::harness::{AnswerServer, ServerConfig};
use tcpanswer::transport::DEFAULT_ADDR;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let server = AnswerServer::bind(DEFAULT_ADDR, ServerConfig::default())?;
    eprintln!("Listening on {}", server.local_addr());

    // Runs until the process is killed.
    let running = AtomicBool::new(true);
    server.serve(&running)?;
    Ok(())
}
