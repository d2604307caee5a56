//! Credit-driven event streaming over a long-lived HTTP response.
//!
//! A streaming request yields an [`EventSource`], a single-subscriber
//! publisher over the response's newline-delimited JSON body. Subscribing
//! produces an [`EventStream`] whose driver task only reads from the body
//! while unspent credit exists, so a slow consumer backpressures the service
//! through ordinary HTTP flow control instead of an in-memory queue. Over the
//! life of a stream, the number of delivered events never exceeds the
//! cumulative credit requested.

use fauna_types::{FaunaError, FaunaResult, StreamEvent, StreamEventType};
use futures::TryStreamExt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Semaphore};
use tokio_stream::StreamExt;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Ceiling on a single event line.
const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Queued-but-undrained events; deliveries are credit-gated, so this only
/// smooths the handoff between driver and consumer.
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// A not-yet-subscribed stream publisher.
///
/// Holds the live HTTP response until exactly one subscriber claims it; a
/// second `subscribe` call fails.
#[derive(Debug)]
pub struct EventSource {
    response: Mutex<Option<reqwest::Response>>,
    shutdown: CancellationToken,
    subscribed: AtomicBool,
}

impl EventSource {
    pub(crate) fn new(response: reqwest::Response, shutdown: CancellationToken) -> Self {
        Self {
            response: Mutex::new(Some(response)),
            shutdown,
            subscribed: AtomicBool::new(false),
        }
    }

    /// Claim the stream for its single subscriber.
    pub fn subscribe(&self) -> FaunaResult<EventStream> {
        if self.subscribed.swap(true, Ordering::AcqRel) {
            return Err(FaunaError::unknown("stream already has a subscriber"));
        }

        let response = self
            .response
            .lock()
            .map_err(|_| FaunaError::unknown("stream state lock poisoned"))?
            .take()
            .ok_or_else(|| FaunaError::unknown("stream already has a subscriber"))?;

        Ok(EventStream::spawn(response, self.shutdown.clone()))
    }
}

/// The consumer half of a subscribed stream.
///
/// Events are delivered strictly against credit granted with
/// [`request`](EventStream::request). A terminal state is either a clean
/// completion (`None`), a service error event, a parse failure, or
/// `ClientClosed` when the owning connection closes.
#[derive(Debug)]
pub struct EventStream {
    events: mpsc::Receiver<FaunaResult<StreamEvent>>,
    credit: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl EventStream {
    fn spawn(response: reqwest::Response, shutdown: CancellationToken) -> Self {
        let credit = Arc::new(Semaphore::new(0));
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        tokio::spawn(drive(
            response,
            Arc::clone(&credit),
            tx,
            cancel.clone(),
            shutdown,
        ));

        Self {
            events: rx,
            credit,
            cancel,
        }
    }

    /// Grant credit for `n` further events.
    pub fn request(&self, n: usize) {
        let headroom = Semaphore::MAX_PERMITS - self.credit.available_permits();
        self.credit.add_permits(n.min(headroom));
    }

    /// Stop the stream and release the underlying HTTP response.
    ///
    /// Idempotent; events not yet consumed are discarded.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Await the next event.
    ///
    /// Returns `None` after a clean end of body or a cancel; an `Err` is
    /// terminal and is followed by `None`.
    pub async fn next(&mut self) -> Option<FaunaResult<StreamEvent>> {
        if self.cancel.is_cancelled() {
            return None;
        }
        self.events.recv().await
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn drive(
    response: reqwest::Response,
    credit: Arc<Semaphore>,
    events: mpsc::Sender<FaunaResult<StreamEvent>>,
    cancel: CancellationToken,
    shutdown: CancellationToken,
) {
    let body = Box::pin(
        response
            .bytes_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e)),
    );
    let reader = StreamReader::new(body);
    let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_BYTES));

    'events: loop {
        // Spend one credit per delivered event. While demand is zero the
        // body is not read at all, which leaves backpressure to the
        // transport's flow control.
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = shutdown.cancelled() => {
                let _ = events.send(Err(FaunaError::client_closed())).await;
                return;
            }
            permit = credit.acquire() => match permit {
                Ok(permit) => permit.forget(),
                Err(_) => return,
            },
        }

        loop {
            let line = tokio::select! {
                _ = cancel.cancelled() => return,
                _ = shutdown.cancelled() => {
                    let _ = events.send(Err(FaunaError::client_closed())).await;
                    return;
                }
                line = lines.next() => line,
            };

            match line {
                // Clean end of body; dropping the sender completes the stream.
                None => return,
                Some(Err(e)) => {
                    let _ = events.send(Err(map_read_error(e))).await;
                    return;
                }
                Some(Ok(line)) if line.trim().is_empty() => continue,
                Some(Ok(line)) => match StreamEvent::parse(&line) {
                    Err(e) => {
                        debug!(error = %e, "stream line failed to parse");
                        let _ = events.send(Err(e)).await;
                        return;
                    }
                    Ok(event) if event.event_type == StreamEventType::Error => {
                        let payload = event.error_payload().unwrap_or_default();
                        let _ = events.send(Err(FaunaError::streaming(payload))).await;
                        return;
                    }
                    Ok(event) => {
                        if events.send(Ok(event)).await.is_err() {
                            return;
                        }
                        continue 'events;
                    }
                },
            }
        }
    }
}

fn map_read_error(error: LinesCodecError) -> FaunaError {
    match error {
        LinesCodecError::MaxLineLengthExceeded => {
            FaunaError::unknown("stream line exceeds maximum length")
        }
        LinesCodecError::Io(e) => FaunaError::unavailable(format!("stream read failed: {}", e)),
    }
}
