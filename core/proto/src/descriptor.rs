// Copyright Noderpc Contributors
// SPDX-License-Identifier: Apache-2.0

//! Service description of the Core node service.
//!
//! The method list below is the single source for both the client stub and
//! the server registration; both sides derive the case-exact wire paths
//! from it.

use noderpc::ServiceDescriptor;

/// Fully-qualified name of the Core service.
pub const SERVICE_NAME: &str = "org.dash.platform.dapi.v0.Core";

/// Method names, exactly as they appear on the wire.
pub mod methods {
    pub const GET_BLOCKCHAIN_STATUS: &str = "getBlockchainStatus";
    pub const GET_MASTERNODE_STATUS: &str = "getMasternodeStatus";
    pub const GET_BLOCK: &str = "getBlock";
    pub const BROADCAST_TRANSACTION: &str = "broadcastTransaction";
    pub const GET_TRANSACTION: &str = "getTransaction";
    pub const GET_ESTIMATED_TRANSACTION_FEE: &str = "getEstimatedTransactionFee";
    pub const SUBSCRIBE_TO_BLOCK_HEADERS_WITH_CHAIN_LOCKS: &str =
        "subscribeToBlockHeadersWithChainLocks";
    pub const SUBSCRIBE_TO_TRANSACTIONS_WITH_PROOFS: &str = "subscribeToTransactionsWithProofs";
}

/// Build the Core service description.
///
/// Idempotent: every invocation yields an `==`-equivalent descriptor set.
pub fn core_descriptor() -> ServiceDescriptor {
    ServiceDescriptor::builder(SERVICE_NAME)
        .unary(methods::GET_BLOCKCHAIN_STATUS)
        .unary(methods::GET_MASTERNODE_STATUS)
        .unary(methods::GET_BLOCK)
        .unary(methods::BROADCAST_TRANSACTION)
        .unary(methods::GET_TRANSACTION)
        .unary(methods::GET_ESTIMATED_TRANSACTION_FEE)
        .server_streaming(methods::SUBSCRIBE_TO_BLOCK_HEADERS_WITH_CHAIN_LOCKS)
        .server_streaming(methods::SUBSCRIBE_TO_TRANSACTIONS_WITH_PROOFS)
        .build()
        .expect("Core service description is well-formed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use noderpc::Cardinality;

    #[test]
    fn test_paths_are_case_exact() {
        let descriptor = core_descriptor();
        assert_eq!(
            descriptor.method(methods::GET_BLOCK).unwrap().path(),
            "/org.dash.platform.dapi.v0.Core/getBlock"
        );
        assert_eq!(
            descriptor
                .method(methods::SUBSCRIBE_TO_BLOCK_HEADERS_WITH_CHAIN_LOCKS)
                .unwrap()
                .path(),
            "/org.dash.platform.dapi.v0.Core/subscribeToBlockHeadersWithChainLocks"
        );
    }

    #[test]
    fn test_cardinalities_match_description() {
        let descriptor = core_descriptor();
        for name in [
            methods::GET_BLOCKCHAIN_STATUS,
            methods::GET_MASTERNODE_STATUS,
            methods::GET_BLOCK,
            methods::BROADCAST_TRANSACTION,
            methods::GET_TRANSACTION,
            methods::GET_ESTIMATED_TRANSACTION_FEE,
        ] {
            assert_eq!(
                descriptor.method(name).unwrap().cardinality(),
                Cardinality::UnaryUnary
            );
        }
        for name in [
            methods::SUBSCRIBE_TO_BLOCK_HEADERS_WITH_CHAIN_LOCKS,
            methods::SUBSCRIBE_TO_TRANSACTIONS_WITH_PROOFS,
        ] {
            assert_eq!(
                descriptor.method(name).unwrap().cardinality(),
                Cardinality::UnaryStream
            );
        }
    }

    #[test]
    fn test_description_is_idempotent() {
        assert_eq!(core_descriptor(), core_descriptor());
    }
}
