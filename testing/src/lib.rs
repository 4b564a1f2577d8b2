// Copyright Noderpc Contributors
// SPDX-License-Identifier: Apache-2.0

//! Message types shared by the end-to-end test suites.

/// Generic request used by transport-level tests.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TestRequest {
    #[prost(string, tag = "1")]
    pub message: String,
    #[prost(int32, tag = "2")]
    pub value: i32,
}

/// Generic response used by transport-level tests.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TestResponse {
    #[prost(string, tag = "1")]
    pub result: String,
    #[prost(int32, tag = "2")]
    pub count: i32,
}
