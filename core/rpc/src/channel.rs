// Copyright Noderpc Contributors
// SPDX-License-Identifier: Apache-2.0

//! Client-side channel
//!
//! A [`Channel`] owns one logical connection to a remote endpoint and
//! multiplexes any number of concurrent calls over it, each with its own
//! deadline and cancellation. The connection is established lazily on the
//! first call and re-established on demand after a loss; calls that were
//! in flight when the connection went down resolve with `Unavailable` and
//! are never retried by the transport itself.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::codec::{Decoder, Encoder};
use crate::config::ClientConfig;
use crate::descriptor::{Cardinality, MethodDescriptor};
use crate::options::{CallOptions, Compression};
use crate::stream::{StreamSession, Streaming};
use crate::wire::{self, Frame, FrameKind};
use crate::Status;

/// Frames are queued here before the writer task drains them to the socket.
const WRITER_QUEUE: usize = 64;

/// An event delivered to one in-flight call.
pub(crate) enum Inbound {
    /// One response message payload with its wire encoding name
    Message(Vec<u8>, String),
    /// Terminal status for the call
    Trailer(Status),
}

/// A live connection shared by all in-flight calls.
#[derive(Clone)]
pub(crate) struct Conn {
    outbound: mpsc::Sender<Frame>,
    calls: Arc<parking_lot::Mutex<HashMap<u64, mpsc::Sender<Inbound>>>>,
    closed: CancellationToken,
}

impl Conn {
    fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    fn register(&self, id: u64, window: usize) -> mpsc::Receiver<Inbound> {
        let (tx, rx) = mpsc::channel(window.max(1));
        self.calls.lock().insert(id, tx);
        rx
    }

    pub(crate) fn deregister(&self, id: u64) {
        self.calls.lock().remove(&id);
    }

    async fn send(&self, frame: Frame) -> Result<(), Status> {
        self.outbound
            .send(frame)
            .await
            .map_err(|_| Status::unavailable("connection closed"))
    }

    /// Best-effort send that never blocks; used for cancel advisories.
    pub(crate) fn send_best_effort(&self, frame: Frame) {
        let _ = self.outbound.try_send(frame);
    }
}

struct ChannelInner {
    config: ClientConfig,
    defaults: CallOptions,
    conn: tokio::sync::Mutex<Option<Conn>>,
    next_call_id: AtomicU64,
}

/// Client-side channel for issuing calls against a described service.
#[derive(Clone)]
pub struct Channel {
    inner: Arc<ChannelInner>,
}

impl Channel {
    /// Create a channel to the configured endpoint. No connection is made
    /// until the first call.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_defaults(config, CallOptions::default())
    }

    /// Create a channel with default call options applied to every call
    /// unless overridden per call.
    pub fn with_defaults(config: ClientConfig, defaults: CallOptions) -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                config,
                defaults,
                conn: tokio::sync::Mutex::new(None),
                next_call_id: AtomicU64::new(1),
            }),
        }
    }

    /// Target endpoint in `host:port` form.
    pub fn endpoint(&self) -> &str {
        &self.inner.config.endpoint
    }

    /// Issue a unary call at the byte level.
    ///
    /// The request bytes must already be encoded; the returned bytes are
    /// the single response message. All failures surface as a [`Status`].
    pub async fn call_unary(
        &self,
        method: &MethodDescriptor,
        request: Vec<u8>,
        options: CallOptions,
    ) -> Result<Vec<u8>, Status> {
        if method.cardinality() != Cardinality::UnaryUnary {
            return Err(Status::internal(format!(
                "{} is not a unary method",
                method.path()
            )));
        }

        let (conn, id, mut rx, deadline) = self.start_call(method, request, options).await?;

        let receive = async {
            let mut response: Option<Vec<u8>> = None;
            loop {
                match rx.recv().await {
                    Some(Inbound::Message(payload, encoding)) => {
                        response = Some(decompress(payload, &encoding)?);
                    }
                    Some(Inbound::Trailer(status)) if status.is_ok() => {
                        return response
                            .ok_or_else(|| Status::internal("response message missing"));
                    }
                    Some(Inbound::Trailer(status)) => return Err(status),
                    None => return Err(Status::unavailable("connection closed")),
                }
            }
        };

        let result = tokio::select! {
            result = receive => result,
            _ = deadline_sleep(deadline) => {
                conn.send_best_effort(Frame::cancel(id));
                Err(Status::deadline_exceeded(format!(
                    "call to {} timed out",
                    method.path()
                )))
            }
        };
        conn.deregister(id);
        result
    }

    /// Open a server-streaming call at the byte level.
    ///
    /// Setup faults (encode, connect, send) surface immediately; response
    /// messages are pulled from the returned session.
    pub async fn call_streaming(
        &self,
        method: &MethodDescriptor,
        request: Vec<u8>,
        options: CallOptions,
    ) -> Result<StreamSession, Status> {
        if method.cardinality() != Cardinality::UnaryStream {
            return Err(Status::internal(format!(
                "{} is not a server-streaming method",
                method.path()
            )));
        }

        let (conn, id, rx, deadline) = self.start_call(method, request, options).await?;
        Ok(StreamSession::new(conn, id, rx, deadline))
    }

    /// Typed unary call: encode the request, invoke the transport, decode
    /// the response.
    pub async fn unary<Req, Res>(
        &self,
        method: &MethodDescriptor,
        request: Req,
        options: CallOptions,
    ) -> Result<Res, Status>
    where
        Req: Encoder,
        Res: Decoder,
    {
        let request = request.encode()?;
        let response = self.call_unary(method, request, options).await?;
        Res::decode(&response)
    }

    /// Typed server-streaming call.
    pub async fn server_streaming<Req, Res>(
        &self,
        method: &MethodDescriptor,
        request: Req,
        options: CallOptions,
    ) -> Result<Streaming<Res>, Status>
    where
        Req: Encoder,
        Res: Decoder,
    {
        let request = request.encode()?;
        let session = self.call_streaming(method, request, options).await?;
        Ok(Streaming::new(session))
    }

    /// Resolve options, establish the connection if needed, register the
    /// call and send its request frame.
    async fn start_call(
        &self,
        method: &MethodDescriptor,
        request: Vec<u8>,
        options: CallOptions,
    ) -> Result<(Conn, u64, mpsc::Receiver<Inbound>, Option<Instant>), Status> {
        let options = options.merged_over(&self.inner.defaults);
        let deadline = options.timeout.map(|t| Instant::now() + t);
        let compression = options.compression.unwrap_or_default();
        let payload = compression.compress(request)?;

        let conn = self.conn(options.wait_for_ready, deadline).await?;
        let id = self.inner.next_call_id.fetch_add(1, Ordering::Relaxed);
        let rx = conn.register(id, self.inner.config.inbound_window);

        tracing::debug!(path = %method.path(), id, "issuing call");

        let timeout_ms = options
            .timeout
            .map(|t| t.as_millis().min(u64::MAX as u128) as u64)
            .unwrap_or(0);
        let frame = Frame::request(
            id,
            method.path(),
            &options.metadata,
            compression.name(),
            timeout_ms,
            payload,
        );
        if let Err(status) = conn.send(frame).await {
            conn.deregister(id);
            return Err(status);
        }
        Ok((conn, id, rx, deadline))
    }

    /// Current connection, establishing one when absent.
    ///
    /// Without `wait_for_ready` a failed attempt surfaces immediately as
    /// `Unavailable`; with it, establishment retries under exponential
    /// backoff until the call's deadline.
    async fn conn(
        &self,
        wait_for_ready: bool,
        deadline: Option<Instant>,
    ) -> Result<Conn, Status> {
        let mut guard = self.inner.conn.lock().await;
        if let Some(conn) = guard.as_ref() {
            if !conn.is_closed() {
                return Ok(conn.clone());
            }
            tracing::debug!(endpoint = %self.inner.config.endpoint, "connection lost, reconnecting");
        }

        let mut attempt: u32 = 0;
        loop {
            match self.try_connect().await {
                Ok(conn) => {
                    *guard = Some(conn.clone());
                    return Ok(conn);
                }
                Err(status) if !wait_for_ready => return Err(status),
                Err(status) => {
                    let delay = self.inner.config.backoff.delay(attempt);
                    attempt = attempt.saturating_add(1);
                    if let Some(deadline) = deadline {
                        if Instant::now() + delay >= deadline {
                            return Err(status);
                        }
                    }
                    tracing::debug!(
                        endpoint = %self.inner.config.endpoint,
                        attempt,
                        ?delay,
                        "connect failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn try_connect(&self) -> Result<Conn, Status> {
        let endpoint = self.inner.config.endpoint.clone();
        let stream = tokio::time::timeout(
            self.inner.config.connect_timeout,
            TcpStream::connect(&endpoint),
        )
        .await
        .map_err(|_| Status::unavailable(format!("timed out connecting to {}", endpoint)))?
        .map_err(|e| Status::unavailable(format!("failed to connect to {}: {}", endpoint, e)))?;
        let _ = stream.set_nodelay(true);

        tracing::debug!(endpoint = %endpoint, "connection established");

        let framed = wire::framed(stream, self.inner.config.max_frame_size);
        let (mut sink, mut frames) = framed.split();

        let (outbound, mut outbound_rx) = mpsc::channel::<Frame>(WRITER_QUEUE);
        let calls: Arc<parking_lot::Mutex<HashMap<u64, mpsc::Sender<Inbound>>>> =
            Arc::new(parking_lot::Mutex::new(HashMap::new()));
        let closed = CancellationToken::new();

        // Writer task: drain the outbound queue into the socket.
        let writer_closed = closed.clone();
        tokio::spawn(async move {
            loop {
                let frame = tokio::select! {
                    frame = outbound_rx.recv() => frame,
                    _ = writer_closed.cancelled() => None,
                };
                let Some(frame) = frame else {
                    break;
                };
                if let Err(e) = sink.send(frame.encode_bytes()).await {
                    tracing::debug!("write failed: {}", e);
                    break;
                }
            }
            writer_closed.cancel();
        });

        // Reader task: route frames to their calls by id.
        let reader_calls = calls.clone();
        let reader_closed = closed.clone();
        tokio::spawn(async move {
            loop {
                let frame = tokio::select! {
                    frame = frames.next() => frame,
                    _ = reader_closed.cancelled() => None,
                };
                let Some(Ok(bytes)) = frame else {
                    break;
                };
                let mut frame = match Frame::decode_bytes(&bytes) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::debug!("dropping undecodable frame: {}", e);
                        break;
                    }
                };

                let target = reader_calls.lock().get(&frame.id).cloned();
                let Some(target) = target else {
                    // The call was cancelled or timed out locally.
                    continue;
                };

                let delivered = match frame.frame_kind() {
                    FrameKind::Message => {
                        let encoding = std::mem::take(&mut frame.encoding);
                        target
                            .send(Inbound::Message(frame.payload, encoding))
                            .await
                            .is_ok()
                    }
                    FrameKind::Trailer => {
                        reader_calls.lock().remove(&frame.id);
                        let _ = target.send(Inbound::Trailer(frame.status())).await;
                        true
                    }
                    _ => {
                        tracing::debug!(id = frame.id, "unexpected frame kind from server");
                        true
                    }
                };
                if !delivered {
                    reader_calls.lock().remove(&frame.id);
                }
            }

            // Fail whatever is still in flight; the transport never retries.
            reader_closed.cancel();
            let pending: Vec<_> = reader_calls.lock().drain().collect();
            for (_, target) in pending {
                let _ = target
                    .send(Inbound::Trailer(Status::unavailable("connection lost")))
                    .await;
            }
        });

        Ok(Conn {
            outbound,
            calls,
            closed,
        })
    }
}

pub(crate) fn decompress(payload: Vec<u8>, encoding: &str) -> Result<Vec<u8>, Status> {
    let compression = Compression::from_name(encoding)
        .ok_or_else(|| Status::internal(format!("unknown payload encoding: {}", encoding)))?;
    compression.decompress(payload)
}

pub(crate) async fn deadline_sleep(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => futures::future::pending().await,
    }
}

#[cfg(test)]
impl Conn {
    /// Connection with no socket behind it, for session state tests.
    pub(crate) fn stub_for_tests() -> (Conn, mpsc::Receiver<Inbound>) {
        let (outbound, _) = mpsc::channel(8);
        let conn = Conn {
            outbound,
            calls: Arc::new(parking_lot::Mutex::new(HashMap::new())),
            closed: CancellationToken::new(),
        };
        let rx = conn.register(1, 8);
        (conn, rx)
    }

    pub(crate) async fn push_for_tests(&self, id: u64, inbound: Inbound) {
        let target = self.calls.lock().get(&id).cloned();
        if let Some(target) = target {
            let _ = target.send(inbound).await;
        }
    }
}
