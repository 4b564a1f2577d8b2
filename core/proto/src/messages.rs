// Copyright Noderpc Contributors
// SPDX-License-Identifier: Apache-2.0

//! Message shapes of the Core node service.
//!
//! These mirror the service's published schema; the transport treats them
//! as opaque payloads and the servicer treats them as its contract.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetBlockchainStatusRequest {}

/// Chain, version and network state of the serving node.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetBlockchainStatusResponse {
    #[prost(message, optional, tag = "1")]
    pub version: Option<get_blockchain_status_response::Version>,
    #[prost(message, optional, tag = "2")]
    pub time: Option<get_blockchain_status_response::Time>,
    #[prost(enumeration = "get_blockchain_status_response::Status", tag = "3")]
    pub status: i32,
    #[prost(double, tag = "4")]
    pub sync_progress: f64,
    #[prost(message, optional, tag = "5")]
    pub chain: Option<get_blockchain_status_response::Chain>,
    #[prost(message, optional, tag = "6")]
    pub network: Option<get_blockchain_status_response::Network>,
}

pub mod get_blockchain_status_response {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Version {
        #[prost(uint32, tag = "1")]
        pub protocol: u32,
        #[prost(uint32, tag = "2")]
        pub software: u32,
        #[prost(string, tag = "3")]
        pub agent: String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Time {
        #[prost(uint32, tag = "1")]
        pub now: u32,
        #[prost(int32, tag = "2")]
        pub offset: i32,
        #[prost(uint32, tag = "3")]
        pub median: u32,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Chain {
        #[prost(string, tag = "1")]
        pub name: String,
        #[prost(uint32, tag = "2")]
        pub headers_count: u32,
        #[prost(uint32, tag = "3")]
        pub blocks_count: u32,
        #[prost(bytes = "vec", tag = "4")]
        pub best_block_hash: Vec<u8>,
        #[prost(double, tag = "5")]
        pub difficulty: f64,
        #[prost(bytes = "vec", tag = "6")]
        pub chain_work: Vec<u8>,
        #[prost(bool, tag = "7")]
        pub is_synced: bool,
        #[prost(double, tag = "8")]
        pub sync_progress: f64,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct NetworkFee {
        #[prost(double, tag = "1")]
        pub relay: f64,
        #[prost(double, tag = "2")]
        pub incremental: f64,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Network {
        #[prost(uint32, tag = "1")]
        pub peers_count: u32,
        #[prost(message, optional, tag = "2")]
        pub fee: Option<NetworkFee>,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Status {
        NotStarted = 0,
        Syncing = 1,
        Ready = 2,
        Error = 3,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetMasternodeStatusRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetMasternodeStatusResponse {
    #[prost(enumeration = "get_masternode_status_response::Status", tag = "1")]
    pub status: i32,
    #[prost(bytes = "vec", tag = "2")]
    pub pro_tx_hash: Vec<u8>,
    #[prost(uint32, tag = "3")]
    pub pose_penalty: u32,
    #[prost(bool, tag = "4")]
    pub is_synced: bool,
    #[prost(double, tag = "5")]
    pub sync_progress: f64,
}

pub mod get_masternode_status_response {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Status {
        Unknown = 0,
        WaitingForProtx = 1,
        PoseBanned = 2,
        Removed = 3,
        OperatorKeyChanged = 4,
        ProtxIpChanged = 5,
        Ready = 6,
        Error = 7,
    }
}

/// Block lookup by height or by hash.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetBlockRequest {
    #[prost(oneof = "get_block_request::Block", tags = "1, 2")]
    pub block: Option<get_block_request::Block>,
}

pub mod get_block_request {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Block {
        #[prost(uint32, tag = "1")]
        Height(u32),
        #[prost(bytes, tag = "2")]
        Hash(Vec<u8>),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetBlockResponse {
    /// Serialized block, consensus encoding.
    #[prost(bytes = "vec", tag = "1")]
    pub block: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BroadcastTransactionRequest {
    /// Serialized transaction, consensus encoding.
    #[prost(bytes = "vec", tag = "1")]
    pub transaction: Vec<u8>,
    #[prost(bool, tag = "2")]
    pub allow_high_fees: bool,
    #[prost(bool, tag = "3")]
    pub bypass_limits: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BroadcastTransactionResponse {
    #[prost(string, tag = "1")]
    pub transaction_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetTransactionRequest {
    #[prost(string, tag = "1")]
    pub id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetTransactionResponse {
    #[prost(bytes = "vec", tag = "1")]
    pub transaction: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub block_hash: Vec<u8>,
    #[prost(uint32, tag = "3")]
    pub height: u32,
    #[prost(uint32, tag = "4")]
    pub confirmations: u32,
    #[prost(bool, tag = "5")]
    pub is_instant_locked: bool,
    #[prost(bool, tag = "6")]
    pub is_chain_locked: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetEstimatedTransactionFeeRequest {
    /// Confirmation target in blocks.
    #[prost(uint32, tag = "1")]
    pub blocks: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetEstimatedTransactionFeeResponse {
    #[prost(double, tag = "1")]
    pub fee: f64,
}

/// Subscription start point plus batch size for header delivery.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BlockHeadersWithChainLocksRequest {
    #[prost(uint32, tag = "3")]
    pub count: u32,
    #[prost(oneof = "block_headers_with_chain_locks_request::FromBlock", tags = "1, 2")]
    pub from_block: Option<block_headers_with_chain_locks_request::FromBlock>,
}

pub mod block_headers_with_chain_locks_request {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum FromBlock {
        #[prost(bytes, tag = "1")]
        FromBlockHash(Vec<u8>),
        #[prost(uint32, tag = "2")]
        FromBlockHeight(u32),
    }
}

/// One subscription event: a batch of headers or a fresh chain lock.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BlockHeadersWithChainLocksResponse {
    #[prost(oneof = "block_headers_with_chain_locks_response::Responses", tags = "1, 2")]
    pub responses: Option<block_headers_with_chain_locks_response::Responses>,
}

pub mod block_headers_with_chain_locks_response {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Responses {
        #[prost(message, tag = "1")]
        BlockHeaders(super::BlockHeaders),
        #[prost(bytes, tag = "2")]
        ChainLock(Vec<u8>),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BlockHeaders {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub headers: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BloomFilter {
    #[prost(bytes = "vec", tag = "1")]
    pub v_data: Vec<u8>,
    #[prost(uint32, tag = "2")]
    pub n_hash_funcs: u32,
    #[prost(uint32, tag = "3")]
    pub n_tweak: u32,
    #[prost(uint32, tag = "4")]
    pub n_flags: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TransactionsWithProofsRequest {
    #[prost(message, optional, tag = "1")]
    pub bloom_filter: Option<BloomFilter>,
    #[prost(uint32, tag = "4")]
    pub count: u32,
    #[prost(bool, tag = "5")]
    pub send_transaction_hashes: bool,
    #[prost(oneof = "transactions_with_proofs_request::FromBlock", tags = "2, 3")]
    pub from_block: Option<transactions_with_proofs_request::FromBlock>,
}

pub mod transactions_with_proofs_request {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum FromBlock {
        #[prost(bytes, tag = "2")]
        FromBlockHash(Vec<u8>),
        #[prost(uint32, tag = "3")]
        FromBlockHeight(u32),
    }
}

/// One subscription event: matched transactions, instant-lock messages or
/// a merkle block proving inclusion.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TransactionsWithProofsResponse {
    #[prost(oneof = "transactions_with_proofs_response::Responses", tags = "1, 2, 3")]
    pub responses: Option<transactions_with_proofs_response::Responses>,
}

pub mod transactions_with_proofs_response {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Responses {
        #[prost(message, tag = "1")]
        RawTransactions(super::RawTransactions),
        #[prost(message, tag = "2")]
        InstantSendLockMessages(super::InstantSendLockMessages),
        #[prost(bytes, tag = "3")]
        RawMerkleBlock(Vec<u8>),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RawTransactions {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub transactions: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InstantSendLockMessages {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub messages: Vec<Vec<u8>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use noderpc::{Decoder, Encoder};

    #[test]
    fn test_get_block_request_oneof() {
        let by_height = GetBlockRequest {
            block: Some(get_block_request::Block::Height(100)),
        };
        let bytes = by_height.encode().unwrap();
        let back = GetBlockRequest::decode(&bytes).unwrap();
        assert_eq!(back, by_height);

        let by_hash = GetBlockRequest {
            block: Some(get_block_request::Block::Hash(vec![0xab; 32])),
        };
        let bytes = by_hash.encode().unwrap();
        assert_eq!(GetBlockRequest::decode(&bytes).unwrap(), by_hash);
    }

    #[test]
    fn test_header_response_variants() {
        let headers = BlockHeadersWithChainLocksResponse {
            responses: Some(
                block_headers_with_chain_locks_response::Responses::BlockHeaders(BlockHeaders {
                    headers: vec![vec![1; 80], vec![2; 80]],
                }),
            ),
        };
        let bytes = headers.encode().unwrap();
        assert_eq!(
            BlockHeadersWithChainLocksResponse::decode(&bytes).unwrap(),
            headers
        );
    }
}
