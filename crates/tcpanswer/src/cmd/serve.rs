use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tcpanswer_harness::server::wake_listener;
use tcpanswer_harness::{AnswerServer, ServerConfig};

use crate::cmd::{parse_optional_duration, ServeArgs};
use crate::exit::{transport_error, CliError, CliResult, INTERNAL, SUCCESS};

pub fn run(args: ServeArgs) -> CliResult<i32> {
    let config = ServerConfig {
        idle_timeout: parse_optional_duration(args.idle_timeout.as_deref())?,
        ..ServerConfig::default()
    };
    let server =
        AnswerServer::bind(&args.addr, config).map_err(|err| transport_error("bind failed", err))?;
    let addr = server.local_addr();
    tracing::info!(%addr, idle_timeout = ?server.config().idle_timeout, "answer server listening");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(Arc::clone(&running), addr)?;

    server
        .serve(&running)
        .map_err(|err| transport_error("accept failed", err))?;
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>, addr: std::net::SocketAddr) -> CliResult<()> {
    ctrlc::set_handler(move || {
        wake_listener(&running, addr);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
