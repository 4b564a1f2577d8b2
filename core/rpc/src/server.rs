// Copyright Noderpc Contributors
// SPDX-License-Identifier: Apache-2.0

//! Server-side dispatch
//!
//! A [`ServiceRegistry`] maps wire paths to handler bindings with their
//! (de)serialization baked in. Registration happens during single-threaded
//! startup; after that the registry is read-only and safe for concurrent
//! lookup. The [`Server`] accepts connections, routes request frames to
//! bindings, and pumps streaming responses with bounded buffering.

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use futures::stream::Stream;
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::channel::deadline_sleep;
use crate::codec::{Decoder, Encoder};
use crate::config::ServerConfig;
use crate::context::CallContext;
use crate::descriptor::{Cardinality, MethodDescriptor};
use crate::options::Compression;
use crate::wire::{self, Frame, FrameKind};
use crate::Status;

/// Stream of responses produced by a server-streaming handler.
pub type ResponseStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send>>;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, Status>> + Send>>;

type UnaryBinding = Arc<dyn Fn(Vec<u8>, CallContext) -> BoxFuture<Result<Vec<u8>, Status>> + Send + Sync>;
type StreamBinding =
    Arc<dyn Fn(Vec<u8>, CallContext) -> BoxFuture<Result<ByteStream, Status>> + Send + Sync>;

enum MethodBinding {
    Unary(UnaryBinding),
    Stream(StreamBinding),
}

struct RegisteredMethod {
    descriptor: MethodDescriptor,
    binding: MethodBinding,
}

/// Path-indexed table of handler bindings.
pub struct ServiceRegistry {
    methods: RwLock<HashMap<String, Arc<RegisteredMethod>>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self {
            methods: RwLock::new(HashMap::new()),
        }
    }

    /// Register a unary handler for a described method.
    ///
    /// The binding decodes the request before the handler runs; a handler
    /// never sees malformed input. Registering the same path twice, or a
    /// handler whose shape contradicts the descriptor, is a startup
    /// misconfiguration and panics.
    pub fn register_unary<F, Req, Res, Fut>(&self, descriptor: &MethodDescriptor, handler: F)
    where
        F: Fn(Req, CallContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Res, Status>> + Send + 'static,
        Req: Decoder + Send + 'static,
        Res: Encoder + Send + 'static,
    {
        assert_eq!(
            descriptor.cardinality(),
            Cardinality::UnaryUnary,
            "{} is not a unary method",
            descriptor.path()
        );

        let handler = Arc::new(handler);
        let binding: UnaryBinding = Arc::new(move |bytes: Vec<u8>, ctx: CallContext| {
            let handler = Arc::clone(&handler);
            Box::pin(async move {
                let request = decode_request::<Req>(&bytes)?;
                let response = handler(request, ctx).await?;
                response.encode()
            }) as BoxFuture<Result<Vec<u8>, Status>>
        });

        self.insert(descriptor, MethodBinding::Unary(binding));
    }

    /// Register a server-streaming handler for a described method.
    pub fn register_server_streaming<F, Req, Res, S, Fut>(
        &self,
        descriptor: &MethodDescriptor,
        handler: F,
    ) where
        F: Fn(Req, CallContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<S, Status>> + Send + 'static,
        S: Stream<Item = Result<Res, Status>> + Send + 'static,
        Req: Decoder + Send + 'static,
        Res: Encoder + Send + 'static,
    {
        assert_eq!(
            descriptor.cardinality(),
            Cardinality::UnaryStream,
            "{} is not a server-streaming method",
            descriptor.path()
        );

        let handler = Arc::new(handler);
        let binding: StreamBinding = Arc::new(move |bytes: Vec<u8>, ctx: CallContext| {
            let handler = Arc::clone(&handler);
            Box::pin(async move {
                let request = decode_request::<Req>(&bytes)?;
                let responses = handler(request, ctx).await?;
                let bytes = responses.map(|item| item.and_then(|r| r.encode()));
                Ok(Box::pin(bytes) as ByteStream)
            }) as BoxFuture<Result<ByteStream, Status>>
        });

        self.insert(descriptor, MethodBinding::Stream(binding));
    }

    fn insert(&self, descriptor: &MethodDescriptor, binding: MethodBinding) {
        let registered = Arc::new(RegisteredMethod {
            descriptor: descriptor.clone(),
            binding,
        });
        if self
            .methods
            .write()
            .insert(descriptor.path().to_string(), registered)
            .is_some()
        {
            panic!("RPC method {} is registered multiple times", descriptor.path());
        }
    }

    fn get(&self, path: &str) -> Option<Arc<RegisteredMethod>> {
        self.methods.read().get(path).cloned()
    }

    /// All registered wire paths.
    pub fn paths(&self) -> Vec<String> {
        self.methods.read().keys().cloned().collect()
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_request<Req: Decoder>(bytes: &[u8]) -> Result<Req, Status> {
    Req::decode(bytes).map_err(|status| {
        Status::invalid_argument(
            status
                .message()
                .unwrap_or("malformed request message")
                .to_string(),
        )
    })
}

struct ServerInner {
    registry: ServiceRegistry,
    config: ServerConfig,
    cancellation_token: CancellationToken,
    drain_signal: RwLock<Option<drain::Signal>>,
    drain_watch: RwLock<Option<drain::Watch>>,
    tasks: RwLock<Vec<JoinHandle<()>>>,
}

/// RPC server: accepts connections and dispatches calls to the registry.
#[derive(Clone)]
pub struct Server {
    inner: Arc<ServerInner>,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        let (drain_signal, drain_watch) = drain::channel();
        Self {
            inner: Arc::new(ServerInner {
                registry: ServiceRegistry::new(),
                config,
                cancellation_token: CancellationToken::new(),
                drain_signal: RwLock::new(Some(drain_signal)),
                drain_watch: RwLock::new(Some(drain_watch)),
                tasks: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Registry for startup-time handler registration.
    pub fn registry(&self) -> &ServiceRegistry {
        &self.inner.registry
    }

    /// Accept and serve connections until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), Status> {
        let local_addr = listener
            .local_addr()
            .map_err(|e| Status::internal(format!("listener has no local address: {}", e)))?;
        tracing::info!(%local_addr, "server listening");

        loop {
            tokio::select! {
                _ = self.inner.cancellation_token.cancelled() => {
                    tracing::info!("server received shutdown signal");
                    return Ok(());
                }
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            tracing::warn!("accept failed: {}", e);
                            continue;
                        }
                    };

                    let drain_watch = self
                        .inner
                        .drain_watch
                        .read()
                        .clone()
                        .ok_or_else(|| Status::internal("drain watch not available"))?;

                    let server = self.clone();
                    let handle = tokio::spawn(async move {
                        server.handle_connection(stream, peer, drain_watch).await;
                    });
                    self.inner.tasks.write().push(handle);
                }
            }
        }
    }

    /// Shut down gracefully: stop accepting, signal active connections and
    /// wait for them to drain. The server can be restarted afterwards.
    pub async fn shutdown(&self) {
        tracing::info!("shutting down server");

        self.inner.cancellation_token.cancel();

        let drain_signal = self.inner.drain_signal.write().take();
        let drain_watch = self.inner.drain_watch.write().take();
        drop(drain_watch);

        if let Some(signal) = drain_signal {
            tracing::debug!("draining active connections");
            signal.drain().await;
            tracing::debug!("all connections drained");
        }

        let (new_signal, new_watch) = drain::channel();
        *self.inner.drain_signal.write() = Some(new_signal);
        *self.inner.drain_watch.write() = Some(new_watch);
    }

    async fn handle_connection(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        drain_watch: drain::Watch,
    ) {
        tracing::debug!(%peer, "connection accepted");
        let _ = stream.set_nodelay(true);

        let framed = wire::framed(stream, self.inner.config.max_frame_size);
        let (mut sink, mut frames) = framed.split();

        let (writer, mut writer_rx) = mpsc::channel::<Frame>(self.inner.config.writer_queue);
        tokio::spawn(async move {
            while let Some(frame) = writer_rx.recv().await {
                if let Err(e) = sink.send(frame.encode_bytes()).await {
                    tracing::debug!("write failed: {}", e);
                    break;
                }
            }
        });

        let active: Arc<parking_lot::Mutex<HashMap<u64, CancellationToken>>> =
            Arc::new(parking_lot::Mutex::new(HashMap::new()));

        loop {
            let frame = tokio::select! {
                frame = frames.next() => frame,
                _ = self.inner.cancellation_token.cancelled() => break,
                _ = drain_watch.clone().signaled() => break,
            };
            let Some(Ok(bytes)) = frame else {
                break;
            };
            let frame = match Frame::decode_bytes(&bytes) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::debug!(%peer, "closing connection on undecodable frame: {}", e);
                    break;
                }
            };

            match frame.frame_kind() {
                FrameKind::Request => {
                    self.dispatch(frame, peer, &writer, &active).await;
                }
                FrameKind::Cancel => {
                    if let Some(token) = active.lock().get(&frame.id) {
                        token.cancel();
                    }
                }
                _ => {
                    tracing::debug!(%peer, id = frame.id, "unexpected frame kind from client");
                }
            }
        }

        // Stop whatever is still running for this connection.
        for (_, token) in active.lock().drain() {
            token.cancel();
        }
        tracing::debug!(%peer, "connection closed");
    }

    /// Route one request frame to its binding and spawn the call.
    async fn dispatch(
        &self,
        mut frame: Frame,
        peer: SocketAddr,
        writer: &mpsc::Sender<Frame>,
        active: &Arc<parking_lot::Mutex<HashMap<u64, CancellationToken>>>,
    ) {
        let id = frame.id;

        let Some(registered) = self.inner.registry.get(&frame.path) else {
            tracing::debug!(%peer, path = %frame.path, "path not found");
            let _ = writer
                .send(Frame::trailer(id, &Status::unimplemented("path not found")))
                .await;
            return;
        };

        let Some(compression) = Compression::from_name(&frame.encoding) else {
            let _ = writer
                .send(Frame::trailer(
                    id,
                    &Status::invalid_argument(format!(
                        "unknown payload encoding: {}",
                        frame.encoding
                    )),
                ))
                .await;
            return;
        };

        if active.lock().contains_key(&id) {
            let _ = writer
                .send(Frame::trailer(id, &Status::internal("duplicate call id")))
                .await;
            return;
        }

        let payload = match compression.decompress(std::mem::take(&mut frame.payload)) {
            Ok(payload) => payload,
            Err(_) => {
                let _ = writer
                    .send(Frame::trailer(
                        id,
                        &Status::invalid_argument("malformed compressed payload"),
                    ))
                    .await;
                return;
            }
        };

        let deadline = (frame.timeout_ms > 0)
            .then(|| Instant::now() + std::time::Duration::from_millis(frame.timeout_ms));
        let token = CancellationToken::new();
        active.lock().insert(id, token.clone());

        let ctx = CallContext::new(
            peer,
            frame.path.clone(),
            frame.take_metadata(),
            deadline,
            token.clone(),
        );

        tracing::debug!(%peer, path = %registered.descriptor.path(), id, "dispatching call");

        let writer = writer.clone();
        let active = Arc::clone(active);
        tokio::spawn(async move {
            match &registered.binding {
                MethodBinding::Unary(binding) => {
                    run_unary(binding.clone(), payload, ctx, deadline, &writer, id, compression)
                        .await;
                }
                MethodBinding::Stream(binding) => {
                    run_streaming(binding.clone(), payload, ctx, deadline, &writer, id, compression)
                        .await;
                }
            }
            active.lock().remove(&id);
        });
    }
}

async fn run_unary(
    binding: UnaryBinding,
    payload: Vec<u8>,
    ctx: CallContext,
    deadline: Option<Instant>,
    writer: &mpsc::Sender<Frame>,
    id: u64,
    compression: Compression,
) {
    let token = ctx.cancellation();
    let result = tokio::select! {
        result = binding(payload, ctx.clone()) => result,
        _ = token.cancelled() => {
            tracing::debug!(id, "call cancelled by client");
            return;
        }
        _ = deadline_sleep(deadline) => Err(Status::deadline_exceeded("deadline exceeded")),
    };

    match result {
        Ok(response) => {
            let trailer = ctx.take_status().unwrap_or_else(Status::ok);
            if trailer.is_err() {
                let _ = writer.send(Frame::trailer(id, &trailer)).await;
                return;
            }
            let response = match compression.compress(response) {
                Ok(response) => response,
                Err(status) => {
                    let _ = writer.send(Frame::trailer(id, &status)).await;
                    return;
                }
            };
            if writer
                .send(Frame::message(id, compression.name(), response))
                .await
                .is_ok()
            {
                let _ = writer.send(Frame::trailer(id, &trailer)).await;
            }
        }
        Err(status) => {
            let _ = writer.send(Frame::trailer(id, &status)).await;
        }
    }
}

async fn run_streaming(
    binding: StreamBinding,
    payload: Vec<u8>,
    ctx: CallContext,
    deadline: Option<Instant>,
    writer: &mpsc::Sender<Frame>,
    id: u64,
    compression: Compression,
) {
    let token = ctx.cancellation();
    let responses = tokio::select! {
        result = binding(payload, ctx.clone()) => result,
        _ = token.cancelled() => {
            tracing::debug!(id, "call cancelled by client");
            return;
        }
        _ = deadline_sleep(deadline) => Err(Status::deadline_exceeded("deadline exceeded")),
    };

    let mut responses = match responses {
        Ok(responses) => responses,
        Err(status) => {
            let _ = writer.send(Frame::trailer(id, &status)).await;
            return;
        }
    };

    loop {
        let item = tokio::select! {
            item = responses.next() => item,
            _ = token.cancelled() => {
                tracing::debug!(id, "stream cancelled by client");
                return;
            }
            _ = deadline_sleep(deadline) => {
                let _ = writer
                    .send(Frame::trailer(id, &Status::deadline_exceeded("deadline exceeded")))
                    .await;
                return;
            }
        };

        match item {
            Some(Ok(message)) => {
                let message = match compression.compress(message) {
                    Ok(message) => message,
                    Err(status) => {
                        let _ = writer.send(Frame::trailer(id, &status)).await;
                        return;
                    }
                };
                if writer
                    .send(Frame::message(id, compression.name(), message))
                    .await
                    .is_err()
                {
                    return;
                }
            }
            Some(Err(status)) => {
                let _ = writer.send(Frame::trailer(id, &status)).await;
                return;
            }
            None => {
                let status = ctx.take_status().unwrap_or_else(Status::ok);
                let _ = writer.send(Frame::trailer(id, &status)).await;
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ServiceDescriptor;

    #[derive(Clone, PartialEq, ::prost::Message)]
    struct Ping {
        #[prost(uint32, tag = "1")]
        seq: u32,
    }

    fn descriptor() -> ServiceDescriptor {
        ServiceDescriptor::builder("org.example.v1.Chain")
            .unary("getBlock")
            .server_streaming("subscribeToHeaders")
            .build()
            .unwrap()
    }

    #[test]
    fn test_registry_lookup() {
        let desc = descriptor();
        let registry = ServiceRegistry::new();
        registry.register_unary(
            desc.method("getBlock").unwrap(),
            |request: Ping, _ctx: CallContext| async move { Ok(request) },
        );

        assert!(registry.get("/org.example.v1.Chain/getBlock").is_some());
        assert!(registry.get("/org.example.v1.Chain/getblock").is_none());
        assert_eq!(registry.paths(), vec!["/org.example.v1.Chain/getBlock"]);
    }

    #[test]
    #[should_panic(expected = "registered multiple times")]
    fn test_duplicate_registration_panics() {
        let desc = descriptor();
        let registry = ServiceRegistry::new();
        registry.register_unary(
            desc.method("getBlock").unwrap(),
            |request: Ping, _ctx: CallContext| async move { Ok(request) },
        );
        registry.register_unary(
            desc.method("getBlock").unwrap(),
            |request: Ping, _ctx: CallContext| async move { Ok(request) },
        );
    }

    #[test]
    #[should_panic(expected = "is not a unary method")]
    fn test_cardinality_checked_at_registration() {
        let desc = descriptor();
        let registry = ServiceRegistry::new();
        registry.register_unary(
            desc.method("subscribeToHeaders").unwrap(),
            |request: Ping, _ctx: CallContext| async move { Ok(request) },
        );
    }
}
