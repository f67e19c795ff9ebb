use std::fs;
use std::path::Path;

use serde_json::Value;
use sevents_frame::{validate_name, writer};
use sevents_transport::EventStream;
use tracing::debug;

use crate::cmd::SendArgs;
use crate::exit::{frame_error, io_error, CliError, CliResult, DATA_INVALID, SUCCESS, USAGE};

pub fn run(args: SendArgs) -> CliResult<i32> {
    validate_name(&args.event).map_err(|err| frame_error("invalid event", err))?;
    let body = resolve_body(&args)?;

    let stream = match &args.socket {
        Some(path) => connect(path)?,
        None => EventStream::stdout(),
    };
    let mut out = writer(stream).map_err(|err| frame_error("open failed", err))?;
    out.send_raw(&args.event, body.as_deref())
        .map_err(|err| frame_error("send failed", err))?;

    debug!(
        event = %args.event,
        size = body.as_ref().map_or(0, Vec::len),
        "event sent"
    );
    Ok(SUCCESS)
}

/// Serialized JSON body, or `None` for a bodyless event.
fn resolve_body(args: &SendArgs) -> CliResult<Option<Vec<u8>>> {
    let value = if let Some(json) = &args.json {
        serde_json::from_str::<Value>(json)
            .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))?
    } else if let Some(data) = &args.data {
        Value::String(data.clone())
    } else if let Some(path) = &args.file {
        let raw = fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
        serde_json::from_slice::<Value>(&raw).map_err(|err| {
            CliError::new(
                DATA_INVALID,
                format!("{} is not valid JSON: {err}", path.display()),
            )
        })?
    } else {
        return Ok(None);
    };

    serde_json::to_vec(&value)
        .map(Some)
        .map_err(|err| CliError::new(DATA_INVALID, format!("failed to encode body: {err}")))
}

#[cfg(unix)]
fn connect(path: &Path) -> CliResult<EventStream> {
    sevents_transport::UnixDomainSocket::connect(path)
        .map_err(|err| crate::exit::transport_error("connect failed", err))
}

#[cfg(not(unix))]
fn connect(path: &Path) -> CliResult<EventStream> {
    Err(CliError::new(
        USAGE,
        format!(
            "{}: unix sockets are not supported on this platform",
            path.display()
        ),
    ))
}
