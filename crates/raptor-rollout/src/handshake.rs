//! Status handshake: interpreting a launched service's status stream.
//!
//! Lines are forwarded to the sink until one starts with a terminal marker.
//! After success the rest of the stream belongs to a drain task.

use std::sync::Arc;
use std::time::Duration;

use raptor_cluster::StatusStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::sink::LogSink;

pub const SUCCESS_MARKER: &str = "[SUCCESS]";
pub const FAILURE_MARKER: &str = "[FAILURE]";

/// What a single status line says about the launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    Progress,
    Success,
    /// Failure with the text after the marker.
    Failure(String),
}

pub fn classify(contents: &str) -> LineKind {
    if contents.starts_with(SUCCESS_MARKER) {
        LineKind::Success
    } else if let Some(rest) = contents.strip_prefix(FAILURE_MARKER) {
        LineKind::Failure(rest.trim().to_string())
    } else {
        LineKind::Progress
    }
}

/// How the handshake ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handshake {
    Succeeded,
    Failed(String),
    /// The stream ended without a terminal marker.
    Closed,
    TimedOut(Duration),
}

/// Forward lines to `sink` until a terminal marker, the end of the stream,
/// or `timeout` (if any) elapses. The stream stays usable afterwards.
pub async fn await_outcome(stream: &mut StatusStream, sink: &dyn LogSink, timeout: Option<Duration>) -> Handshake {
    let wait = async {
        while let Some(line) = stream.recv().await {
            sink.write(&line);
            match classify(&line.contents) {
                LineKind::Progress => {}
                LineKind::Success => return Handshake::Succeeded,
                LineKind::Failure(detail) => return Handshake::Failed(detail),
            }
        }
        Handshake::Closed
    };

    match timeout {
        Some(after) => tokio::time::timeout(after, wait)
            .await
            .unwrap_or(Handshake::TimedOut(after)),
        None => wait.await,
    }
}

/// Keep forwarding a stream after its service succeeded, until the stream
/// closes or shutdown is signalled.
pub fn spawn_drain(
    service: String,
    mut stream: StatusStream,
    sink: Arc<dyn LogSink>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if *shutdown.borrow() {
            return;
        }
        // Without a sender shutdown can never be signalled; drain to the end.
        let mut sender_gone = false;
        loop {
            tokio::select! {
                line = stream.recv() => match line {
                    Some(line) => sink.write(&line),
                    None => {
                        debug!(%service, "status stream closed");
                        break;
                    }
                },
                changed = shutdown.changed(), if !sender_gone => match changed {
                    Ok(()) if *shutdown.borrow() => {
                        debug!(%service, "status drain shutting down");
                        break;
                    }
                    Ok(()) => {}
                    Err(_) => sender_gone = true,
                },
            }
        }
    })
}
