use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sevents_frame::{reader, EventReader, FrameConfig, FrameError, Progress};
use sevents_registry::Events;
use sevents_transport::EventStream;
use tracing::{debug, info, warn};

use crate::cmd::ListenArgs;
use crate::exit::{frame_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE};
use crate::output::{print_event, OutputFormat};

/// How often a blocked socket read wakes up to check for Ctrl-C.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(Arc::clone(&running))?;

    let printed = Arc::new(AtomicUsize::new(0));
    let events = printing_registry(&args, format, Arc::clone(&printed))?;
    let session = Session {
        running,
        printed,
        limit: args.count,
    };

    match &args.socket {
        Some(path) => listen_socket(path, events, &session),
        None => listen_stdin(events, &session),
    }
}

struct Session {
    running: Arc<AtomicBool>,
    printed: Arc<AtomicUsize>,
    limit: Option<usize>,
}

impl Session {
    fn should_stop(&self) -> bool {
        !self.running.load(Ordering::SeqCst)
            || self
                .limit
                .is_some_and(|limit| self.printed.load(Ordering::SeqCst) >= limit)
    }
}

/// Register one listener per `--event` filter, or a wildcard listener.
fn printing_registry(
    args: &ListenArgs,
    format: OutputFormat,
    printed: Arc<AtomicUsize>,
) -> CliResult<Events> {
    let events = Events::new();
    let limit = args.count;
    let print = move |name: &str, payload: &sevents_registry::Payload| {
        let seen = printed.fetch_add(1, Ordering::SeqCst) + 1;
        if limit.is_some_and(|limit| seen > limit) {
            return;
        }
        print_event(name, payload, format);
    };

    if args.events.is_empty() {
        events.on_any(print);
    } else {
        let print = Arc::new(print);
        for name in &args.events {
            let print = Arc::clone(&print);
            let label = name.clone();
            events
                .on(name, move |payload| (*print)(&label, payload))
                .map_err(|err| CliError::new(USAGE, format!("--event: {err}")))?;
        }
    }
    Ok(events)
}

fn listen_stdin(events: Events, session: &Session) -> CliResult<i32> {
    let reader =
        reader(EventStream::stdin(), Some(events)).map_err(|err| frame_error("open failed", err))?;
    drain(reader, session).map_err(|err| frame_error("receive failed", err))?;
    Ok(SUCCESS)
}

#[cfg(unix)]
fn listen_socket(path: &std::path::Path, events: Events, session: &Session) -> CliResult<i32> {
    let listener = sevents_transport::UnixDomainSocket::bind(path)
        .map_err(|err| crate::exit::transport_error("bind failed", err))?;
    let config = FrameConfig {
        read_timeout: Some(POLL_INTERVAL),
        ..FrameConfig::default()
    };

    while !session.should_stop() {
        let stream = listener
            .accept()
            .map_err(|err| crate::exit::transport_error("accept failed", err))?;
        info!(path = %listener.path().display(), "client connected");

        let reader = EventReader::with_config_stream(stream, events.clone(), config.clone())
            .map_err(|err| frame_error("open failed", err))?;
        match drain(reader, session) {
            Ok(()) => debug!("client disconnected"),
            Err(err) if drops_client(&err) => warn!(error = %err, "dropping client"),
            Err(err) => return Err(frame_error("receive failed", err)),
        }
    }

    Ok(SUCCESS)
}

/// Whether `err` ends only the current client's stream.
///
/// A broken or desynchronized stream cannot be resumed, but the listening
/// socket is still fine.
fn drops_client(err: &FrameError) -> bool {
    match err {
        FrameError::ConnectionClosed
        | FrameError::Framing { .. }
        | FrameError::FrameTooLarge { .. } => true,
        FrameError::Io(io) => matches!(
            io.kind(),
            ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::BrokenPipe
                | ErrorKind::UnexpectedEof
        ),
        _ => false,
    }
}

#[cfg(not(unix))]
fn listen_socket(path: &std::path::Path, _events: Events, _session: &Session) -> CliResult<i32> {
    Err(CliError::new(
        crate::exit::USAGE,
        format!(
            "{}: unix sockets are not supported on this platform",
            path.display()
        ),
    ))
}

/// Pump `reader` until EOF or until the session is over.
fn drain(mut reader: EventReader<EventStream>, session: &Session) -> Result<(), FrameError> {
    while !session.should_stop() {
        match reader.pump() {
            Ok(Progress::Data { .. }) => {}
            Ok(Progress::Eof) => return Ok(()),
            Err(FrameError::Io(err))
                if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        // A second Ctrl-C exits even while blocked in accept.
        if !running.swap(false, Ordering::SeqCst) {
            std::process::exit(130);
        }
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
