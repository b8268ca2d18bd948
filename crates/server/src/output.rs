//! Output multiplexer.
//!
//! Every producer (the read loop and each upload task) holds a cloned
//! `Outbound` and pushes whole envelopes into one channel. A single writer
//! task owns the output stream and writes each envelope as one complete
//! line, so messages never interleave. Per-producer order is the channel's
//! FIFO order.

use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use photobridge_protocol::{codec, Envelope, ErrorCode, ProgressEvent};

const OUTBOUND_CAPACITY: usize = 256;

/// Cheap-to-clone handle for emitting envelopes.
#[derive(Clone)]
pub struct Outbound {
    tx: mpsc::Sender<Envelope>,
}

impl Outbound {
    pub async fn emit(&self, envelope: Envelope) {
        if self.tx.send(envelope).await.is_err() {
            warn!(
                component = "output",
                event = "output.emit.writer_closed",
                "Output writer closed, envelope dropped"
            );
        }
    }

    pub async fn respond<T: Serialize>(&self, correlation_id: &str, body: &T) {
        match Envelope::response(correlation_id, body) {
            Ok(envelope) => self.emit(envelope).await,
            Err(e) => error!(
                component = "output",
                event = "output.response.serialize_failed",
                correlation_id = %correlation_id,
                error = %e,
                "Failed to serialize response"
            ),
        }
    }

    pub async fn respond_error(
        &self,
        correlation_id: &str,
        code: ErrorCode,
        message: impl Into<String>,
    ) {
        let message = message.into();
        debug!(
            component = "output",
            event = "output.response.error",
            correlation_id = %correlation_id,
            code = ?code,
            message = %message,
            "Sending error response"
        );
        self.emit(Envelope::error(correlation_id, code, message)).await;
    }

    pub async fn progress(&self, event: &ProgressEvent) {
        match Envelope::event(event.status.event_command(), event) {
            Ok(envelope) => self.emit(envelope).await,
            Err(e) => error!(
                component = "output",
                event = "output.event.serialize_failed",
                session_id = %event.session_id,
                error = %e,
                "Failed to serialize progress event"
            ),
        }
    }
}

/// Spawn the single writer task over `writer`.
///
/// The task ends once every `Outbound` clone is dropped and the queue is
/// drained, or when the stream stops accepting writes.
pub fn spawn_writer<W>(writer: W) -> (Outbound, JoinHandle<()>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<Envelope>(OUTBOUND_CAPACITY);

    let task = tokio::spawn(async move {
        let mut writer = writer;
        while let Some(envelope) = rx.recv().await {
            let bytes = match codec::encode(&envelope) {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!(
                        component = "output",
                        event = "output.encode_failed",
                        error = %e,
                        "Failed to encode envelope"
                    );
                    continue;
                }
            };

            let written = async {
                writer.write_all(&bytes).await?;
                writer.flush().await
            }
            .await;

            if let Err(e) = written {
                warn!(
                    component = "output",
                    event = "output.write_failed",
                    error = %e,
                    "Output stream closed, stopping writer"
                );
                break;
            }
        }
        let _ = writer.shutdown().await;
    });

    (Outbound { tx }, task)
}
