//! Start an in-process answer server and run 1000 concurrent sessions
//! against it.
//!
//! Run with:
//!   cargo run --example load

use std::sync::Arc;

use tcpanswer::harness::{
    AnswerServer, Coordinator, CoordinatorConfig, Script, ServerConfig, TcpConnector,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let server = AnswerServer::bind("127.0.0.1:0", ServerConfig::default())?.spawn()?;
    let connector = Arc::new(TcpConnector::new(server.local_addr()));

    let report = Coordinator::new(CoordinatorConfig::default())
        .run(connector, Arc::new(Script::default()))?;

    eprintln!(
        "{} sessions: {} succeeded, {} failed in {:?}",
        report.sessions,
        report.succeeded,
        report.failed(),
        report.elapsed
    );
    for failure in &report.failures {
        eprintln!("  session {}: {}", failure.session, failure.error);
    }

    server.stop();
    Ok(())
}
