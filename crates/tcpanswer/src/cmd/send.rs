use std::time::Duration;

use tcpanswer_frame::{Frame, FrameConfig, FrameError, FrameReader, FrameWriter, EXIT};
use tcpanswer_transport::{resolve_addr, AnswerStream, TcpTransport};

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{frame_error, transport_error, CliError, CliResult, FAILURE, SUCCESS};
use crate::output::{print_reply, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let addr =
        resolve_addr(&args.addr).map_err(|err| transport_error("invalid address", err))?;
    let stream = TcpTransport::connect(addr).map_err(|err| transport_error("connect failed", err))?;
    let (mut reader, mut writer) =
        split(stream, timeout).map_err(|err| frame_error("connect failed", err))?;

    let payload = args.data.as_deref().unwrap_or_default().as_bytes();
    writer
        .send(args.command, payload)
        .map_err(|err| frame_error("send failed", err))?;

    let reply = exchange(&mut reader, args.command)?;
    print_reply(&args.addr, args.command, reply.as_ref(), format);
    Ok(SUCCESS)
}

fn split(
    stream: AnswerStream,
    timeout: Duration,
) -> Result<(FrameReader<AnswerStream>, FrameWriter<AnswerStream>), FrameError> {
    let config = FrameConfig {
        read_timeout: Some(timeout),
        write_timeout: Some(timeout),
        ..FrameConfig::default()
    };
    let reader = FrameReader::with_config_stream(stream.try_clone()?, config.clone())?;
    let writer = FrameWriter::with_config_stream(stream, config)?;
    Ok((reader, writer))
}

/// Read the answer to `sent`. Exit is answered by closing, reported as `None`.
fn exchange<R: std::io::Read>(reader: &mut FrameReader<R>, sent: u16) -> CliResult<Option<Frame>> {
    if sent == EXIT {
        let closed = reader
            .wait_closed()
            .map_err(|err| frame_error("waiting for close failed", err))?;
        if closed {
            return Ok(None);
        }
        return Err(CliError::new(
            FAILURE,
            "server answered exit instead of closing the connection",
        ));
    }
    reader
        .read_frame()
        .map(Some)
        .map_err(|err| frame_error("receive failed", err))
}
