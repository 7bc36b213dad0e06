use std::net::SocketAddr;
use std::sync::Arc;

use tcpanswer_frame::FrameConfig;
use tcpanswer_harness::{Coordinator, CoordinatorConfig, RunReport, Script, TcpConnector};
use tcpanswer_transport::resolve_addr;

use crate::cmd::{parse_optional_duration, RunArgs};
use crate::exit::{harness_error, transport_error, CliResult, FAILURE, SUCCESS};
use crate::output::{print_report, OutputFormat};

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let read_timeout = parse_optional_duration(args.read_timeout.as_deref())?;
    let frame_config = FrameConfig {
        read_timeout,
        write_timeout: read_timeout,
        ..FrameConfig::default()
    };
    let addr =
        resolve_addr(&args.addr).map_err(|err| transport_error("invalid address", err))?;

    let coordinator = Coordinator::new(CoordinatorConfig {
        sessions: args.sessions,
        policy: args.policy.into(),
    });
    let script = Arc::new(Script::default());

    let (report, mode) = if args.use_async {
        (run_tasks(&coordinator, addr, script, frame_config)?, "async")
    } else {
        let connector = Arc::new(TcpConnector::with_config(addr, frame_config));
        let report = coordinator
            .run(connector, script)
            .map_err(|err| harness_error("run failed", err))?;
        (report, "threads")
    };

    print_report(&report, &args.addr, mode, format);
    Ok(if report.is_success() { SUCCESS } else { FAILURE })
}

#[cfg(feature = "async")]
fn run_tasks(
    coordinator: &Coordinator,
    addr: SocketAddr,
    script: Arc<Script>,
    frame_config: FrameConfig,
) -> CliResult<RunReport> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| crate::exit::io_error("runtime setup failed", err))?;
    runtime
        .block_on(coordinator.run_async(addr, script, frame_config))
        .map_err(|err| harness_error("run failed", err))
}

#[cfg(not(feature = "async"))]
fn run_tasks(
    _coordinator: &Coordinator,
    _addr: SocketAddr,
    _script: Arc<Script>,
    _frame_config: FrameConfig,
) -> CliResult<RunReport> {
    Err(crate::exit::CliError::new(
        crate::exit::USAGE,
        "--async requires a build with the `async` feature",
    ))
}
