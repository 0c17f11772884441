use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::header::ACCEPT;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use crate::errors::ImpactError;
use super::client::SdlcClient;
use super::http::error_from_response;
use super::sse::{parse_event, SseDecoder};
use super::types::{PipelineRequest, StreamEvent, StreamEventType};

/// Receivers for a streaming run. Each logical event reaches exactly one
/// method, in arrival order, on the transport's task.
pub trait StreamCallbacks: Send + 'static {
    fn on_start(&mut self, event: &StreamEvent);
    fn on_agent_complete(&mut self, event: &StreamEvent);
    fn on_complete(&mut self, event: &StreamEvent);
    fn on_error(&mut self, error: ImpactError);
}

/// Holds the callbacks until the stream ends or is cancelled. After
/// `close`, a callback already running may finish but no other starts.
struct Gate<H> {
    slot: Mutex<Option<H>>,
    closed: AtomicBool,
}

impl<H> Gate<H> {
    fn new(callbacks: H) -> Self {
        Self {
            slot: Mutex::new(Some(callbacks)),
            closed: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<H>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with(&self, f: impl FnOnce(&mut H)) -> bool {
        let mut slot = self.lock();
        if self.closed.load(Ordering::SeqCst) {
            slot.take();
            return false;
        }
        let Some(callbacks) = slot.as_mut() else {
            return false;
        };
        f(callbacks);
        // A callback may have closed the gate itself.
        if self.closed.load(Ordering::SeqCst) {
            slot.take();
        }
        true
    }

    /// Never blocks: while a callback holds the slot, the dispatcher drops
    /// the callbacks as soon as it returns.
    fn close(&self) -> bool {
        let first = !self.closed.swap(true, Ordering::SeqCst);
        match self.slot.try_lock() {
            Ok(mut slot) => slot.take().is_some(),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().take().is_some(),
            Err(TryLockError::WouldBlock) => first,
        }
    }
}

/// Cancellation handle for one streaming run.
pub struct StreamHandle {
    token: CancellationToken,
    close: Arc<dyn Fn() -> bool + Send + Sync>,
    task: JoinHandle<()>,
}

impl StreamHandle {
    /// Stop all further callbacks and abort the request. A no-op once the
    /// stream has finished. Safe to call from inside a callback.
    pub fn cancel(&self) {
        self.token.cancel();
        if (self.close)() {
            debug!("Stream cancelled");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Resolve once the read loop has exited. Await at most once.
    pub async fn finished(&mut self) {
        if let Err(e) = (&mut self.task).await {
            warn!(error = %e, "Stream task ended abnormally");
        }
    }

    /// Wait for the read loop to exit.
    pub async fn wait(self) {
        if let Err(e) = self.task.await {
            warn!(error = %e, "Stream task ended abnormally");
        }
    }
}

/// Opens the streaming variant of run-pipeline.
#[derive(Debug, Clone)]
pub struct StreamTransport {
    client: SdlcClient,
}

impl StreamTransport {
    pub fn new(client: SdlcClient) -> Self {
        Self { client }
    }

    /// Issue one streaming request. Must be called within a Tokio runtime.
    pub fn start<H: StreamCallbacks>(&self, request: &PipelineRequest, callbacks: H) -> StreamHandle {
        let http = self.client.http().clone();
        let url = self.client.url("/api/v1/impact/run-pipeline/stream");
        let body = request.clone();
        info!(session_id = %body.session_id, "Opening pipeline stream");

        spawn(callbacks, move |token, gate| async move {
            let send = http
                .post(url)
                .header(ACCEPT, "text/event-stream")
                .json(&body)
                .send();
            let resp = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(()),
                resp = send => resp?,
            };
            if !resp.status().is_success() {
                return Err(error_from_response(resp).await);
            }
            pump(resp.bytes_stream(), &gate, &token).await
        })
    }
}

/// Run the decode/dispatch loop over any byte stream.
pub fn observe<S, E, H>(body: S, callbacks: H) -> StreamHandle
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<ImpactError> + Send + 'static,
    H: StreamCallbacks,
{
    spawn(callbacks, move |token, gate| async move { pump(body, &gate, &token).await })
}

fn spawn<H, F, Fut>(callbacks: H, drive: F) -> StreamHandle
where
    H: StreamCallbacks,
    F: FnOnce(CancellationToken, Arc<Gate<H>>) -> Fut,
    Fut: Future<Output = Result<(), ImpactError>> + Send + 'static,
{
    let token = CancellationToken::new();
    let gate = Arc::new(Gate::new(callbacks));
    let run = drive(token.clone(), gate.clone());

    let task_gate = gate.clone();
    let task_token = token.clone();
    let task = tokio::spawn(async move {
        if let Err(e) = run.await {
            if task_token.is_cancelled() {
                debug!(error = %e, "Suppressing error after cancellation");
            } else {
                warn!(error = %e, "Pipeline stream failed");
                task_gate.with(|callbacks| callbacks.on_error(e));
            }
        }
        task_gate.close();
    });

    StreamHandle {
        token,
        close: Arc::new(move || gate.close()),
        task,
    }
}

async fn pump<S, E, H>(body: S, gate: &Gate<H>, token: &CancellationToken) -> Result<(), ImpactError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<ImpactError>,
    H: StreamCallbacks,
{
    let mut body = std::pin::pin!(body);
    let mut decoder = SseDecoder::new();
    let mut terminal_seen = false;

    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(()),
            next = body.next() => next,
        };
        let chunk = match next {
            None => {
                decoder.finish();
                if !terminal_seen {
                    return Err(ImpactError::Network(
                        "Stream closed before the pipeline finished".to_string(),
                    ));
                }
                debug!("Pipeline stream closed");
                return Ok(());
            }
            Some(Err(e)) if terminal_seen => {
                let e: ImpactError = e.into();
                debug!(error = %e, "Ignoring transport error after final event");
                return Ok(());
            }
            Some(Err(e)) => return Err(e.into()),
            Some(Ok(chunk)) => chunk,
        };

        for frame in decoder.push(&chunk) {
            if token.is_cancelled() {
                return Ok(());
            }
            if let Some(event) = parse_event(&frame) {
                terminal_seen |= matches!(
                    event.event_type,
                    StreamEventType::PipelineComplete | StreamEventType::PipelineError
                );
                dispatch(gate, event);
            }
        }
    }
}

fn dispatch<H: StreamCallbacks>(gate: &Gate<H>, event: StreamEvent) {
    match event.event_type {
        StreamEventType::PipelineStart => {
            gate.with(|callbacks| callbacks.on_start(&event));
        }
        StreamEventType::AgentComplete => {
            gate.with(|callbacks| callbacks.on_agent_complete(&event));
        }
        StreamEventType::PipelineComplete => {
            gate.with(|callbacks| callbacks.on_complete(&event));
        }
        StreamEventType::PipelineError => {
            let message = event.data.error.clone().unwrap_or_else(|| "Pipeline error".to_string());
            gate.with(|callbacks| callbacks.on_error(ImpactError::Pipeline(message)));
        }
        StreamEventType::Unknown => {
            debug!(session_id = %event.session_id, "Ignoring unknown stream event type");
        }
    }
}
