//! Connection loop shared by every stream transport.
//!
//! One reader (this loop) and one writer task frame messages; requests run
//! concurrently in a `JoinSet` and hand their responses to the writer over a
//! channel, so frames never interleave.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};

use crate::protocol::{error_value, Dispatcher, PendingRequest, Routed};
use crate::session::{InFlightGuard, SessionState};
use crate::types::{McpError, McpResult, RequestId};

use super::framing::{encode_message, line_codec, parse_message};

const OUTBOUND_QUEUE: usize = 64;

/// A frame for the writer. The in-flight claim, if any, is released only
/// after the frame has been written, so a client can reuse an id as soon as
/// it has seen the response.
struct Outbound {
    message: Value,
    release: Option<InFlightGuard>,
}

impl Outbound {
    fn reply(message: Value) -> Self {
        Self {
            message,
            release: None,
        }
    }

    fn response(message: Value, pending: PendingRequest) -> Self {
        Self {
            message,
            release: Some(pending.into_guard()),
        }
    }
}

/// Serve one session over a duplex byte stream until EOF, shutdown or a transport fault.
///
/// Once `shutdown` is acknowledged the loop keeps reading: new requests are
/// refused with `ShuttingDown` while in-flight ones drain, then the session
/// closes. EOF drains the same way. On a transport fault (I/O error, oversize
/// frame) in-flight requests are aborted, the session is closed and the
/// fault is returned.
pub async fn serve<R, W>(
    dispatcher: Dispatcher,
    reader: R,
    writer: W,
    max_message_bytes: usize,
) -> McpResult<()>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let session = Arc::clone(dispatcher.session());
    let mut frames = FramedRead::new(reader, line_codec(max_message_bytes));
    let (tx, rx) = mpsc::channel::<Outbound>(OUTBOUND_QUEUE);
    let mut writer_task = tokio::spawn(write_loop(writer, rx));
    let mut tasks: JoinSet<()> = JoinSet::new();
    let mut state = session.subscribe();
    let mut draining = false;

    tracing::info!("Session {} connected", session.id());

    let outcome: McpResult<()> = loop {
        if draining && tasks.is_empty() {
            break Ok(());
        }

        tokio::select! {
            frame = frames.next() => {
                let line = match frame {
                    None => {
                        tracing::info!("EOF on session {}, shutting down", session.id());
                        break Ok(());
                    }
                    Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                        break Err(McpError::Transport(format!(
                            "frame exceeds {max_message_bytes} bytes"
                        )));
                    }
                    Some(Err(LinesCodecError::Io(e))) => {
                        break Err(McpError::Transport(format!("read failed: {e}")));
                    }
                    Some(Ok(line)) => line,
                };

                if line.trim().is_empty() {
                    continue;
                }

                let message = match parse_message(&line) {
                    Ok(message) => message,
                    Err(e) => {
                        tracing::warn!("Parse error: {e}");
                        let reply = Outbound::reply(error_value(RequestId::Null, &e));
                        if tx.send(reply).await.is_err() {
                            break Err(writer_gone());
                        }
                        continue;
                    }
                };

                match dispatcher.route(message) {
                    Routed::Silent => {}
                    Routed::Reply(response) => {
                        if tx.send(Outbound::reply(response)).await.is_err() {
                            break Err(writer_gone());
                        }
                    }
                    Routed::Execute(pending) if pending.is_lifecycle() => {
                        let response = dispatcher.execute(&pending).await;
                        if tx.send(Outbound::response(response, pending)).await.is_err() {
                            break Err(writer_gone());
                        }
                        if session.state() == SessionState::Closed {
                            break Ok(());
                        }
                        draining = session.state().is_terminating();
                    }
                    Routed::Execute(pending) => {
                        let dispatcher = dispatcher.clone();
                        let tx = tx.clone();
                        tasks.spawn(async move {
                            let response = dispatcher.execute(&pending).await;
                            let id = pending.id().clone();
                            if tx.send(Outbound::response(response, pending)).await.is_err() {
                                tracing::debug!("Discarding response to {id}: writer closed");
                            }
                        });
                    }
                }
            }

            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                log_join(joined);
            }

            changed = state.changed(), if !draining => {
                if changed.is_err() || *state.borrow() == SessionState::Closed {
                    break Ok(());
                }
                draining = state.borrow().is_terminating();
            }

            written = &mut writer_task => {
                break Err(writer_failure(written));
            }
        }
    };

    match outcome {
        Ok(()) => {
            if !session.state().is_terminating() {
                session.begin_shutdown();
            }
            if !tasks.is_empty() {
                tracing::info!(
                    "Draining {} in-flight request(s) for session {}",
                    tasks.len(),
                    session.id()
                );
            }
            while let Some(joined) = tasks.join_next().await {
                log_join(joined);
            }
            drop(tx);
            let written = writer_task.await;
            if session.state() != SessionState::Closed {
                session.close();
            }
            tracing::info!("Session {} closed", session.id());
            match written {
                Ok(result) => result,
                Err(e) => Err(McpError::Transport(format!("writer task failed: {e}"))),
            }
        }
        Err(e) => {
            tracing::error!(
                "Transport error on session {}: {e}; aborting {} in-flight request(s)",
                session.id(),
                tasks.len()
            );
            tasks.shutdown().await;
            session.close();
            drop(tx);
            writer_task.abort();
            Err(e)
        }
    }
}

async fn write_loop<W>(writer: W, mut rx: mpsc::Receiver<Outbound>) -> McpResult<()>
where
    W: AsyncWrite + Unpin,
{
    let mut sink = FramedWrite::new(writer, LinesCodec::new());
    while let Some(Outbound { message, release }) = rx.recv().await {
        let line = encode_message(&message)?;
        sink.send(line)
            .await
            .map_err(|e| McpError::Transport(format!("write failed: {e}")))?;
        drop(release);
    }
    SinkExt::<String>::close(&mut sink)
        .await
        .map_err(|e| McpError::Transport(format!("close failed: {e}")))
}

fn log_join(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            tracing::error!("Request task panicked: {e}");
        }
    }
}

fn writer_gone() -> McpError {
    McpError::Transport("writer closed".to_string())
}

fn writer_failure(written: Result<McpResult<()>, JoinError>) -> McpError {
    match written {
        Ok(Ok(())) => writer_gone(),
        Ok(Err(e)) => e,
        Err(e) => McpError::Transport(format!("writer task failed: {e}")),
    }
}
