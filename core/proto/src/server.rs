// Copyright Noderpc Contributors
// SPDX-License-Identifier: Apache-2.0

//! Servicer contract for the Core service
//!
//! A servicer implements the subset of methods it supports; every method
//! has a default body resolving to the canonical unimplemented status, so a
//! partially-implemented service fails predictably per-method rather than
//! at startup. One registration call binds a servicer to a registry using
//! the service description.

use std::sync::Arc;

use async_trait::async_trait;

use noderpc::{CallContext, ResponseStream, ServiceRegistry, Status};

use crate::descriptor::{core_descriptor, methods};
use crate::messages::*;

fn unimplemented<T>() -> Result<T, Status> {
    Err(Status::unimplemented("Method not implemented!"))
}

/// Handler set of the Core service.
#[async_trait]
pub trait Core: Send + Sync + 'static {
    async fn get_blockchain_status(
        &self,
        request: GetBlockchainStatusRequest,
        ctx: CallContext,
    ) -> Result<GetBlockchainStatusResponse, Status> {
        let _ = (request, ctx);
        unimplemented()
    }

    async fn get_masternode_status(
        &self,
        request: GetMasternodeStatusRequest,
        ctx: CallContext,
    ) -> Result<GetMasternodeStatusResponse, Status> {
        let _ = (request, ctx);
        unimplemented()
    }

    async fn get_block(
        &self,
        request: GetBlockRequest,
        ctx: CallContext,
    ) -> Result<GetBlockResponse, Status> {
        let _ = (request, ctx);
        unimplemented()
    }

    async fn broadcast_transaction(
        &self,
        request: BroadcastTransactionRequest,
        ctx: CallContext,
    ) -> Result<BroadcastTransactionResponse, Status> {
        let _ = (request, ctx);
        unimplemented()
    }

    async fn get_transaction(
        &self,
        request: GetTransactionRequest,
        ctx: CallContext,
    ) -> Result<GetTransactionResponse, Status> {
        let _ = (request, ctx);
        unimplemented()
    }

    async fn get_estimated_transaction_fee(
        &self,
        request: GetEstimatedTransactionFeeRequest,
        ctx: CallContext,
    ) -> Result<GetEstimatedTransactionFeeResponse, Status> {
        let _ = (request, ctx);
        unimplemented()
    }

    async fn subscribe_to_block_headers_with_chain_locks(
        &self,
        request: BlockHeadersWithChainLocksRequest,
        ctx: CallContext,
    ) -> Result<ResponseStream<BlockHeadersWithChainLocksResponse>, Status> {
        let _ = (request, ctx);
        unimplemented()
    }

    async fn subscribe_to_transactions_with_proofs(
        &self,
        request: TransactionsWithProofsRequest,
        ctx: CallContext,
    ) -> Result<ResponseStream<TransactionsWithProofsResponse>, Status> {
        let _ = (request, ctx);
        unimplemented()
    }
}

/// Bind a servicer to a registry, one dispatch entry per described method.
///
/// Must run during single-threaded startup, before the server serves
/// traffic. Panics if any Core method path is already registered.
pub fn register_core_service(registry: &ServiceRegistry, servicer: Arc<dyn Core>) {
    let descriptor = core_descriptor();
    let method = |name: &str| {
        descriptor
            .method(name)
            .expect("method is part of the Core description")
            .clone()
    };

    let s = servicer.clone();
    registry.register_unary(
        &method(methods::GET_BLOCKCHAIN_STATUS),
        move |request, ctx: CallContext| {
            let s = s.clone();
            async move { s.get_blockchain_status(request, ctx).await }
        },
    );

    let s = servicer.clone();
    registry.register_unary(
        &method(methods::GET_MASTERNODE_STATUS),
        move |request, ctx: CallContext| {
            let s = s.clone();
            async move { s.get_masternode_status(request, ctx).await }
        },
    );

    let s = servicer.clone();
    registry.register_unary(&method(methods::GET_BLOCK), move |request, ctx: CallContext| {
        let s = s.clone();
        async move { s.get_block(request, ctx).await }
    });

    let s = servicer.clone();
    registry.register_unary(
        &method(methods::BROADCAST_TRANSACTION),
        move |request, ctx: CallContext| {
            let s = s.clone();
            async move { s.broadcast_transaction(request, ctx).await }
        },
    );

    let s = servicer.clone();
    registry.register_unary(
        &method(methods::GET_TRANSACTION),
        move |request, ctx: CallContext| {
            let s = s.clone();
            async move { s.get_transaction(request, ctx).await }
        },
    );

    let s = servicer.clone();
    registry.register_unary(
        &method(methods::GET_ESTIMATED_TRANSACTION_FEE),
        move |request, ctx: CallContext| {
            let s = s.clone();
            async move { s.get_estimated_transaction_fee(request, ctx).await }
        },
    );

    let s = servicer.clone();
    registry.register_server_streaming(
        &method(methods::SUBSCRIBE_TO_BLOCK_HEADERS_WITH_CHAIN_LOCKS),
        move |request, ctx: CallContext| {
            let s = s.clone();
            async move {
                s.subscribe_to_block_headers_with_chain_locks(request, ctx)
                    .await
            }
        },
    );

    let s = servicer;
    registry.register_server_streaming(
        &method(methods::SUBSCRIBE_TO_TRANSACTIONS_WITH_PROOFS),
        move |request, ctx: CallContext| {
            let s = s.clone();
            async move { s.subscribe_to_transactions_with_proofs(request, ctx).await }
        },
    );
}
