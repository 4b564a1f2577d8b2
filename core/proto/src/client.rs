// Copyright Noderpc Contributors
// SPDX-License-Identifier: Apache-2.0

//! Typed client stub for the Core service
//!
//! One callable per described method: requests are encoded before they hit
//! the channel, responses decoded as they arrive. Streaming methods hand
//! back a session; a new subscription means a new call.

use noderpc::{CallOptions, Channel, MethodDescriptor, ServiceDescriptor, Status, Streaming};

use crate::descriptor::{core_descriptor, methods};
use crate::messages::*;

/// Client for the Core node service.
#[derive(Clone)]
pub struct CoreClient {
    channel: Channel,
    descriptor: ServiceDescriptor,
}

impl CoreClient {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            descriptor: core_descriptor(),
        }
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    fn method(&self, name: &str) -> &MethodDescriptor {
        self.descriptor
            .method(name)
            .expect("method is part of the Core description")
    }

    /// Chain, version and network state of the remote node.
    pub async fn get_blockchain_status(
        &self,
        request: GetBlockchainStatusRequest,
        options: CallOptions,
    ) -> Result<GetBlockchainStatusResponse, Status> {
        self.channel
            .unary(self.method(methods::GET_BLOCKCHAIN_STATUS), request, options)
            .await
    }

    pub async fn get_masternode_status(
        &self,
        request: GetMasternodeStatusRequest,
        options: CallOptions,
    ) -> Result<GetMasternodeStatusResponse, Status> {
        self.channel
            .unary(self.method(methods::GET_MASTERNODE_STATUS), request, options)
            .await
    }

    /// Fetch a serialized block by height or hash.
    pub async fn get_block(
        &self,
        request: GetBlockRequest,
        options: CallOptions,
    ) -> Result<GetBlockResponse, Status> {
        self.channel
            .unary(self.method(methods::GET_BLOCK), request, options)
            .await
    }

    /// Submit a raw transaction to the remote node's mempool.
    ///
    /// Broadcast is not idempotent; the transport never retries it on a
    /// severed connection, the caller decides.
    pub async fn broadcast_transaction(
        &self,
        request: BroadcastTransactionRequest,
        options: CallOptions,
    ) -> Result<BroadcastTransactionResponse, Status> {
        self.channel
            .unary(self.method(methods::BROADCAST_TRANSACTION), request, options)
            .await
    }

    pub async fn get_transaction(
        &self,
        request: GetTransactionRequest,
        options: CallOptions,
    ) -> Result<GetTransactionResponse, Status> {
        self.channel
            .unary(self.method(methods::GET_TRANSACTION), request, options)
            .await
    }

    pub async fn get_estimated_transaction_fee(
        &self,
        request: GetEstimatedTransactionFeeRequest,
        options: CallOptions,
    ) -> Result<GetEstimatedTransactionFeeResponse, Status> {
        self.channel
            .unary(
                self.method(methods::GET_ESTIMATED_TRANSACTION_FEE),
                request,
                options,
            )
            .await
    }

    /// Subscribe to block headers and chain locks from a start point.
    pub async fn subscribe_to_block_headers_with_chain_locks(
        &self,
        request: BlockHeadersWithChainLocksRequest,
        options: CallOptions,
    ) -> Result<Streaming<BlockHeadersWithChainLocksResponse>, Status> {
        self.channel
            .server_streaming(
                self.method(methods::SUBSCRIBE_TO_BLOCK_HEADERS_WITH_CHAIN_LOCKS),
                request,
                options,
            )
            .await
    }

    /// Subscribe to bloom-filtered transactions with inclusion proofs.
    pub async fn subscribe_to_transactions_with_proofs(
        &self,
        request: TransactionsWithProofsRequest,
        options: CallOptions,
    ) -> Result<Streaming<TransactionsWithProofsResponse>, Status> {
        self.channel
            .server_streaming(
                self.method(methods::SUBSCRIBE_TO_TRANSACTIONS_WITH_PROOFS),
                request,
                options,
            )
            .await
    }
}
