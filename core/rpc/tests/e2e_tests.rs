// Copyright Noderpc Contributors
// SPDX-License-Identifier: Apache-2.0

//! End-to-end tests over loopback TCP
//!
//! Each test spins up a server on an ephemeral port, registers the handlers
//! it needs and drives them through a real channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use futures::StreamExt;
use tokio::net::TcpListener;

use noderpc::{
    CallContext, CallOptions, Channel, ClientConfig, Code, Compression, Metadata,
    ServerConfig, Server, ServiceDescriptor, Status,
};
use noderpc_testing::{TestRequest, TestResponse};

// ============================================================================
// Test Helpers
// ============================================================================

fn test_descriptor() -> ServiceDescriptor {
    ServiceDescriptor::builder("org.noderpc.testing.TestService")
        .unary("Echo")
        .unary("Fail")
        .unary("Slow")
        .unary("Inspect")
        .server_streaming("Generate")
        .server_streaming("Watch")
        .build()
        .unwrap()
}

/// Server plus a channel pointed at it.
struct TestEnv {
    server: Server,
    server_handle: Option<tokio::task::JoinHandle<()>>,
    channel: Channel,
    descriptor: ServiceDescriptor,
}

impl TestEnv {
    async fn new() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = Server::new(ServerConfig::default());
        let server_clone = server.clone();
        let server_handle = tokio::spawn(async move {
            let _ = server_clone.serve(listener).await;
        });

        let channel = Channel::new(ClientConfig::new(addr.to_string()));

        Self {
            server,
            server_handle: Some(server_handle),
            channel,
            descriptor: test_descriptor(),
        }
    }

    async fn shutdown(&mut self) {
        self.server.shutdown().await;
        let handle = self.server_handle.take().unwrap();
        handle.await.unwrap();
    }
}

// ============================================================================
// Unary calls
// ============================================================================

#[tokio::test]
#[tracing_test::traced_test]
async fn test_unary_unary_rpc() {
    let mut env = TestEnv::new().await;

    env.server.registry().register_unary(
        env.descriptor.method("Echo").unwrap(),
        |request: TestRequest, _ctx: CallContext| async move {
            Ok(TestResponse {
                result: format!("Echo: {}", request.message),
                count: request.value * 2,
            })
        },
    );

    let request = TestRequest {
        message: "Hello".to_string(),
        value: 42,
    };
    let response: TestResponse = env
        .channel
        .unary(
            env.descriptor.method("Echo").unwrap(),
            request,
            CallOptions::new(),
        )
        .await
        .expect("unary call failed");

    assert_eq!(response.result, "Echo: Hello");
    assert_eq!(response.count, 84);

    env.shutdown().await;
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_unary_error_propagates_verbatim() {
    let mut env = TestEnv::new().await;

    env.server.registry().register_unary(
        env.descriptor.method("Fail").unwrap(),
        |_request: TestRequest, _ctx: CallContext| async move {
            Err::<TestResponse, _>(Status::invalid_argument("bad block height"))
        },
    );

    let result: Result<TestResponse, Status> = env
        .channel
        .unary(
            env.descriptor.method("Fail").unwrap(),
            TestRequest::default(),
            CallOptions::new(),
        )
        .await;

    let err = result.unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);
    assert_eq!(err.message(), Some("bad block height"));

    env.shutdown().await;
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_unknown_path_never_reaches_handlers() {
    let mut env = TestEnv::new().await;

    let called = Arc::new(AtomicBool::new(false));
    let spy = called.clone();
    env.server.registry().register_unary(
        env.descriptor.method("Echo").unwrap(),
        move |request: TestRequest, _ctx: CallContext| {
            let spy = spy.clone();
            async move {
                spy.store(true, Ordering::SeqCst);
                Ok(TestResponse {
                    result: request.message,
                    count: 0,
                })
            }
        },
    );

    // A descriptor the server never saw.
    let other = ServiceDescriptor::builder("org.noderpc.testing.OtherService")
        .unary("Echo")
        .build()
        .unwrap();

    let err = env
        .channel
        .unary::<TestRequest, TestResponse>(
            other.method("Echo").unwrap(),
            TestRequest::default(),
            CallOptions::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.code(), Code::Unimplemented);
    assert_eq!(err.message(), Some("path not found"));
    assert!(!called.load(Ordering::SeqCst));

    env.shutdown().await;
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_malformed_request_never_reaches_handler() {
    let mut env = TestEnv::new().await;

    let called = Arc::new(AtomicBool::new(false));
    let spy = called.clone();
    env.server.registry().register_unary(
        env.descriptor.method("Echo").unwrap(),
        move |request: TestRequest, _ctx: CallContext| {
            let spy = spy.clone();
            async move {
                spy.store(true, Ordering::SeqCst);
                Ok(TestResponse {
                    result: request.message,
                    count: 0,
                })
            }
        },
    );

    // Wire type 7 does not exist, so these bytes cannot decode.
    let err = env
        .channel
        .call_unary(
            env.descriptor.method("Echo").unwrap(),
            vec![0xff, 0xff, 0xff],
            CallOptions::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.code(), Code::InvalidArgument);
    assert!(!called.load(Ordering::SeqCst));

    env.shutdown().await;
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_handler_status_override() {
    let mut env = TestEnv::new().await;

    env.server.registry().register_unary(
        env.descriptor.method("Echo").unwrap(),
        |_request: TestRequest, ctx: CallContext| async move {
            ctx.set_status(Status::not_found("no such block"));
            Ok(TestResponse::default())
        },
    );

    let err = env
        .channel
        .unary::<TestRequest, TestResponse>(
            env.descriptor.method("Echo").unwrap(),
            TestRequest::default(),
            CallOptions::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.code(), Code::NotFound);
    assert_eq!(err.message(), Some("no such block"));

    env.shutdown().await;
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_metadata_reaches_handler_in_order() {
    let mut env = TestEnv::new().await;

    env.server.registry().register_unary(
        env.descriptor.method("Inspect").unwrap(),
        |_request: TestRequest, ctx: CallContext| async move {
            Ok(TestResponse {
                result: ctx.metadata().get_all("trace").join(","),
                count: ctx.deadline().is_some() as i32,
            })
        },
    );

    let mut metadata = Metadata::new();
    metadata.append("trace", "hop-1");
    metadata.append("trace", "hop-2");

    let response: TestResponse = env
        .channel
        .unary(
            env.descriptor.method("Inspect").unwrap(),
            TestRequest::default(),
            CallOptions::new()
                .with_metadata(metadata)
                .with_timeout(Duration::from_secs(30)),
        )
        .await
        .unwrap();

    assert_eq!(response.result, "hop-1,hop-2");
    assert_eq!(response.count, 1, "handler should observe the deadline");

    env.shutdown().await;
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_gzip_compressed_call() {
    let mut env = TestEnv::new().await;

    env.server.registry().register_unary(
        env.descriptor.method("Echo").unwrap(),
        |request: TestRequest, _ctx: CallContext| async move {
            Ok(TestResponse {
                result: request.message,
                count: request.value,
            })
        },
    );

    let request = TestRequest {
        message: "block ".repeat(1024),
        value: 7,
    };
    let response: TestResponse = env
        .channel
        .unary(
            env.descriptor.method("Echo").unwrap(),
            request.clone(),
            CallOptions::new().with_compression(Compression::Gzip),
        )
        .await
        .unwrap();

    assert_eq!(response.result, request.message);
    assert_eq!(response.count, 7);

    env.shutdown().await;
}

// ============================================================================
// Server streaming
// ============================================================================

#[tokio::test]
#[tracing_test::traced_test]
async fn test_unary_stream_ordered_then_clean_close() {
    let mut env = TestEnv::new().await;

    env.server.registry().register_server_streaming(
        env.descriptor.method("Generate").unwrap(),
        |request: TestRequest, _ctx: CallContext| async move {
            let count = request.value;
            let message = request.message.clone();
            let responses = async_stream::stream! {
                for i in 1..=count {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    yield Ok(TestResponse {
                        result: format!("{}-{}", message, i),
                        count: i,
                    });
                }
            };
            Ok(responses)
        },
    );

    let mut session = env
        .channel
        .server_streaming::<TestRequest, TestResponse>(
            env.descriptor.method("Generate").unwrap(),
            TestRequest {
                message: "item".to_string(),
                value: 3,
            },
            CallOptions::new(),
        )
        .await
        .unwrap();

    let mut responses = Vec::new();
    while let Some(response) = session.message().await.unwrap() {
        responses.push(response);
    }

    assert_eq!(responses.len(), 3);
    assert_eq!(responses[0].result, "item-1");
    assert_eq!(responses[1].result, "item-2");
    assert_eq!(responses[2].result, "item-3");
    assert!(session.is_closed());
    assert_eq!(session.close_status().unwrap().code(), Code::Ok);

    // The terminal state is final: pulling again fails, it does not hang.
    let err = session.message().await.unwrap_err();
    assert_eq!(err.code(), Code::FailedPrecondition);
    assert_eq!(err.message(), Some("session closed"));

    env.shutdown().await;
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_stream_error_after_messages() {
    let mut env = TestEnv::new().await;

    // Channel pattern: a task produces into an unbounded sender and the
    // receiver side is returned as the response stream.
    env.server.registry().register_server_streaming(
        env.descriptor.method("Generate").unwrap(),
        |request: TestRequest, _ctx: CallContext| async move {
            let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
            tokio::spawn(async move {
                for i in 1..=request.value {
                    if i > 2 {
                        let _ = tx.send(Err(Status::internal(format!(
                            "failed to produce item {}",
                            i
                        ))));
                        return;
                    }
                    let _ = tx.send(Ok(TestResponse {
                        result: format!("item-{}", i),
                        count: i,
                    }));
                }
            });
            Ok(tokio_stream::wrappers::UnboundedReceiverStream::new(rx))
        },
    );

    let session = env
        .channel
        .server_streaming::<TestRequest, TestResponse>(
            env.descriptor.method("Generate").unwrap(),
            TestRequest {
                message: "item".to_string(),
                value: 10,
            },
            CallOptions::new(),
        )
        .await
        .unwrap();

    let collected: Vec<Result<TestResponse, Status>> = session.into_stream().collect().await;
    assert_eq!(collected.len(), 3);
    assert!(collected[0].is_ok());
    assert!(collected[1].is_ok());
    let err = collected[2].as_ref().unwrap_err();
    assert_eq!(err.code(), Code::Internal);
    assert!(err.message().unwrap().contains("item 3"));

    env.shutdown().await;
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_stream_cancellation_stops_producer() {
    let mut env = TestEnv::new().await;

    let (cancelled_tx, cancelled_rx) = tokio::sync::oneshot::channel::<()>();
    let cancelled_tx = Arc::new(parking_lot::Mutex::new(Some(cancelled_tx)));

    env.server.registry().register_server_streaming(
        env.descriptor.method("Watch").unwrap(),
        move |_request: TestRequest, ctx: CallContext| {
            let cancelled_tx = cancelled_tx.clone();
            async move {
                // Report when the cancellation reaches the handler side.
                let watcher = ctx.clone();
                tokio::spawn(async move {
                    watcher.cancelled().await;
                    if let Some(tx) = cancelled_tx.lock().take() {
                        let _ = tx.send(());
                    }
                });

                let responses = async_stream::stream! {
                    let mut i = 0;
                    loop {
                        i += 1;
                        tokio::time::sleep(Duration::from_millis(2)).await;
                        yield Ok(TestResponse {
                            result: format!("tick-{}", i),
                            count: i,
                        });
                    }
                };
                Ok(responses)
            }
        },
    );

    let mut session = env
        .channel
        .server_streaming::<TestRequest, TestResponse>(
            env.descriptor.method("Watch").unwrap(),
            TestRequest::default(),
            CallOptions::new(),
        )
        .await
        .unwrap();

    for _ in 0..3 {
        session.message().await.unwrap().unwrap();
    }

    session.cancel();
    session.cancel(); // idempotent
    assert!(session.is_closed());
    assert_eq!(session.close_status().unwrap().code(), Code::Cancelled);

    // No delivery past the observed terminal state.
    let err = session.message().await.unwrap_err();
    assert_eq!(err.code(), Code::FailedPrecondition);

    // The advisory reaches the producing handler.
    tokio::time::timeout(Duration::from_secs(2), cancelled_rx)
        .await
        .expect("handler never observed cancellation")
        .unwrap();

    env.shutdown().await;
}

// ============================================================================
// Deadlines
// ============================================================================

#[tokio::test]
#[tracing_test::traced_test]
async fn test_deadline_shorter_than_handler() {
    let mut env = TestEnv::new().await;

    env.server.registry().register_unary(
        env.descriptor.method("Slow").unwrap(),
        |_request: TestRequest, _ctx: CallContext| async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(TestResponse::default())
        },
    );

    let err = env
        .channel
        .unary::<TestRequest, TestResponse>(
            env.descriptor.method("Slow").unwrap(),
            TestRequest::default(),
            CallOptions::new().with_timeout(Duration::from_millis(50)),
        )
        .await
        .unwrap_err();

    assert_eq!(err.code(), Code::DeadlineExceeded);

    env.shutdown().await;
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test]
#[tracing_test::traced_test]
async fn test_concurrent_calls_are_isolated() {
    let mut env = TestEnv::new().await;

    env.server.registry().register_unary(
        env.descriptor.method("Slow").unwrap(),
        |request: TestRequest, _ctx: CallContext| async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(TestResponse {
                result: request.message,
                count: request.value,
            })
        },
    );
    env.server.registry().register_unary(
        env.descriptor.method("Fail").unwrap(),
        |_request: TestRequest, _ctx: CallContext| async move {
            Err::<TestResponse, _>(Status::aborted("rejected"))
        },
    );

    let slow_channel = env.channel.clone();
    let slow_desc = env.descriptor.clone();
    let slow = tokio::spawn(async move {
        slow_channel
            .unary::<TestRequest, TestResponse>(
                slow_desc.method("Slow").unwrap(),
                TestRequest {
                    message: "patient".to_string(),
                    value: 1,
                },
                CallOptions::new(),
            )
            .await
    });

    // The failing sibling resolves while the slow call is still in flight.
    let err = env
        .channel
        .unary::<TestRequest, TestResponse>(
            env.descriptor.method("Fail").unwrap(),
            TestRequest::default(),
            CallOptions::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::Aborted);

    let response = slow.await.unwrap().unwrap();
    assert_eq!(response.result, "patient");

    env.shutdown().await;
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_concurrent_payload_integrity() {
    let mut env = TestEnv::new().await;

    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    env.server.registry().register_unary(
        env.descriptor.method("Echo").unwrap(),
        move |request: TestRequest, _ctx: CallContext| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(TestResponse {
                    result: request.message,
                    count: request.value,
                })
            }
        },
    );

    let mut handles = Vec::new();
    for i in 0..10 {
        let channel = env.channel.clone();
        let descriptor = env.descriptor.clone();
        handles.push(tokio::spawn(async move {
            let request = TestRequest {
                message: format!("payload-{}", i),
                value: i,
            };
            let response: TestResponse = channel
                .unary(descriptor.method("Echo").unwrap(), request, CallOptions::new())
                .await
                .unwrap();
            (i, response)
        }));
    }

    for handle in handles {
        let (i, response) = handle.await.unwrap();
        assert_eq!(response.result, format!("payload-{}", i));
        assert_eq!(response.count, i);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 10);

    env.shutdown().await;
}

// ============================================================================
// Connection lifecycle
// ============================================================================

#[tokio::test]
#[tracing_test::traced_test]
async fn test_in_flight_call_fails_unavailable_on_severed_connection() {
    let mut env = TestEnv::new().await;

    env.server.registry().register_unary(
        env.descriptor.method("Slow").unwrap(),
        |_request: TestRequest, _ctx: CallContext| async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(TestResponse::default())
        },
    );

    let channel = env.channel.clone();
    let descriptor = env.descriptor.clone();
    let in_flight = tokio::spawn(async move {
        channel
            .unary::<TestRequest, TestResponse>(
                descriptor.method("Slow").unwrap(),
                TestRequest::default(),
                CallOptions::new(),
            )
            .await
    });

    // Let the request reach the server, then tear the server down.
    tokio::time::sleep(Duration::from_millis(100)).await;
    env.shutdown().await;

    let err = in_flight.await.unwrap().unwrap_err();
    assert_eq!(err.code(), Code::Unavailable);
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_wait_for_ready_retries_until_server_appears() {
    // Reserve an address, then release it for the late-starting server.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let server = Server::new(ServerConfig::default());
    server.registry().register_unary(
        test_descriptor().method("Echo").unwrap(),
        |request: TestRequest, _ctx: CallContext| async move {
            Ok(TestResponse {
                result: request.message,
                count: 0,
            })
        },
    );

    let server_clone = server.clone();
    let server_handle = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        let listener = TcpListener::bind(addr).await.unwrap();
        let _ = server_clone.serve(listener).await;
    });

    let channel = Channel::new(ClientConfig::new(addr.to_string()));
    let response: TestResponse = channel
        .unary(
            test_descriptor().method("Echo").unwrap(),
            TestRequest {
                message: "late".to_string(),
                value: 0,
            },
            CallOptions::new()
                .with_wait_for_ready(true)
                .with_timeout(Duration::from_secs(10)),
        )
        .await
        .expect("wait_for_ready call failed");
    assert_eq!(response.result, "late");

    server.shutdown().await;
    server_handle.await.unwrap();
}
