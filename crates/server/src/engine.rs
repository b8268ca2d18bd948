//! The engine's main loop.
//!
//! Reads envelopes from `input` until EOF, dispatching each one, while a
//! single writer task owns `output`. On EOF no further requests are read,
//! in-flight uploads run to completion, and the output is flushed before
//! `run` returns.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncWrite};
use tracing::{debug, info, warn};

use photobridge_connectors::{MetadataTool, Uploader};
use photobridge_protocol::{CodecError, EnvelopeReader, DEFAULT_MAX_LINE_BYTES};

use crate::dispatch::Dispatcher;
use crate::output::spawn_writer;
use crate::state::SessionRegistry;

const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// External collaborators the engine drives.
pub struct Services {
    pub metadata: Arc<dyn MetadataTool>,
    pub uploader: Arc<dyn Uploader>,
}

#[derive(Debug, Clone, Copy)]
pub struct Settings {
    pub max_line_bytes: usize,
    pub session_ttl: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            session_ttl: Duration::from_secs(3600),
        }
    }
}

pub async fn run<R, W>(
    input: R,
    output: W,
    services: Services,
    settings: Settings,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (outbound, writer) = spawn_writer(output);
    let registry = Arc::new(SessionRegistry::new());
    let sweeper = spawn_sweeper(registry.clone(), settings.session_ttl);
    let dispatcher = Dispatcher::new(registry, services.metadata, services.uploader, outbound);

    info!(
        component = "engine",
        event = "engine.started",
        max_line_bytes = settings.max_line_bytes,
        session_ttl_secs = settings.session_ttl.as_secs(),
        "Engine ready"
    );

    let mut reader = EnvelopeReader::with_max_line_bytes(input, settings.max_line_bytes);
    let mut input_error = None;
    loop {
        match reader.next_envelope().await {
            Ok(Some(envelope)) => dispatcher.dispatch(envelope).await,
            Ok(None) => {
                info!(
                    component = "engine",
                    event = "engine.input.eof",
                    "Input closed"
                );
                break;
            }
            Err(CodecError::Io(e)) => {
                warn!(
                    component = "engine",
                    event = "engine.input.failed",
                    error = %e,
                    "Input stream failed"
                );
                input_error = Some(e);
                break;
            }
            Err(e) => dispatcher.report_decode_error(&e).await,
        }
    }

    sweeper.abort();
    dispatcher.shutdown().await;
    writer.await?;

    info!(
        component = "engine",
        event = "engine.stopped",
        "Engine stopped"
    );

    match input_error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

fn spawn_sweeper(registry: Arc<SessionRegistry>, ttl: Duration) -> tokio::task::JoinHandle<()> {
    let period = (ttl / 4).clamp(MIN_SWEEP_INTERVAL, MAX_SWEEP_INTERVAL);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let removed = registry.sweep(ttl);
            if removed > 0 {
                debug!(
                    component = "engine",
                    event = "registry.sweep",
                    removed,
                    remaining = registry.len(),
                    "Swept stale sessions"
                );
            }
        }
    })
}
