// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The RPCs used by resumable uploads.
//!
//! Each RPC is described by a [MethodDescriptor]: its name, gRPC path,
//! idempotency, and default retry settings. The [Method] trait associates the
//! request and response types with the descriptor, so the transport can issue
//! any of these RPCs through a single generic function.

use crate::error::rpc::Code;
use crate::model;
use crate::retry_policy::RetryableCodes;
use gax::backoff_policy::BackoffPolicy;
use gax::exponential_backoff::ExponentialBackoffBuilder;
use gax::retry_policy::{RetryPolicy, RetryPolicyExt};
use std::time::Duration;

/// The gRPC service implementing these methods.
pub const SERVICE: &str = "google.storage.v2.Storage";

/// The status codes retried by default.
pub const RETRYABLE_CODES: &[Code] = &[
    Code::Unavailable,
    Code::DeadlineExceeded,
    Code::Internal,
    Code::ResourceExhausted,
];

/// The default retry settings for a method.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryDefaults {
    pub initial_delay: Duration,
    pub maximum_delay: Duration,
    pub scaling: f64,
    pub total_timeout: Duration,
    pub retryable_codes: &'static [Code],
}

impl RetryDefaults {
    /// Retries the errors in `retryable_codes`, without a time limit.
    pub fn retryable_errors(&self) -> RetryableCodes {
        RetryableCodes::new(self.retryable_codes)
    }

    /// The default retry policy, bounded by `total_timeout`.
    pub fn retry_policy(&self) -> impl RetryPolicy + use<> {
        self.retryable_errors().with_time_limit(self.total_timeout)
    }

    /// The default backoff policy.
    pub fn backoff_policy(&self) -> impl BackoffPolicy + use<> {
        ExponentialBackoffBuilder::new()
            .with_initial_delay(self.initial_delay)
            .with_maximum_delay(self.maximum_delay)
            .with_scaling(self.scaling)
            .clamp()
    }
}

const DEFAULT_RETRY: RetryDefaults = RetryDefaults {
    initial_delay: Duration::from_secs(1),
    maximum_delay: Duration::from_secs(60),
    scaling: 2.0,
    total_timeout: Duration::from_secs(60),
    retryable_codes: RETRYABLE_CODES,
};

/// Describes one RPC.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MethodDescriptor {
    /// The method name, e.g. `WriteObject`.
    pub name: &'static str,
    /// The gRPC path, e.g. `/google.storage.v2.Storage/WriteObject`.
    pub path: &'static str,
    /// If `true` the RPC is safe to retry.
    pub idempotent: bool,
    /// If `true` the RPC uses a client-side stream of requests.
    pub streaming: bool,
    pub retry: RetryDefaults,
}

impl MethodDescriptor {
    /// The value for the `GrpcMethod` extension used by tonic.
    pub(crate) fn grpc_method(&self) -> tonic::GrpcMethod<'static> {
        tonic::GrpcMethod::new(SERVICE, self.name)
    }

    pub(crate) fn http_path(&self) -> http::uri::PathAndQuery {
        http::uri::PathAndQuery::from_static(self.path)
    }
}

/// Associates the request and response types with a [MethodDescriptor].
pub trait Method {
    type Request: prost::Message + Clone + Send + Sync + 'static;
    type Response: prost::Message + Default + Send + 'static;
    const DESCRIPTOR: MethodDescriptor;
}

/// Starts a resumable write and returns its upload id.
#[derive(Clone, Copy, Debug)]
pub struct StartResumableWrite;

impl Method for StartResumableWrite {
    type Request = model::StartResumableWriteRequest;
    type Response = model::StartResumableWriteResponse;
    const DESCRIPTOR: MethodDescriptor = MethodDescriptor {
        name: "StartResumableWrite",
        path: "/google.storage.v2.Storage/StartResumableWrite",
        idempotent: true,
        streaming: false,
        retry: DEFAULT_RETRY,
    };
}

/// Sends a stream of data for a resumable write.
#[derive(Clone, Copy, Debug)]
pub struct WriteObject;

impl Method for WriteObject {
    type Request = model::WriteObjectRequest;
    type Response = model::WriteObjectResponse;
    const DESCRIPTOR: MethodDescriptor = MethodDescriptor {
        name: "WriteObject",
        path: "/google.storage.v2.Storage/WriteObject",
        // Writes carry explicit offsets, retries resend only the missing data.
        idempotent: true,
        streaming: true,
        retry: DEFAULT_RETRY,
    };
}

/// Queries the persisted size of a resumable write.
#[derive(Clone, Copy, Debug)]
pub struct QueryWriteStatus;

impl Method for QueryWriteStatus {
    type Request = model::QueryWriteStatusRequest;
    type Response = model::QueryWriteStatusResponse;
    const DESCRIPTOR: MethodDescriptor = MethodDescriptor {
        name: "QueryWriteStatus",
        path: "/google.storage.v2.Storage/QueryWriteStatus",
        idempotent: true,
        streaming: false,
        retry: DEFAULT_RETRY,
    };
}

/// Cancels a resumable write.
#[derive(Clone, Copy, Debug)]
pub struct CancelResumableWrite;

impl Method for CancelResumableWrite {
    type Request = model::CancelResumableWriteRequest;
    type Response = model::CancelResumableWriteResponse;
    const DESCRIPTOR: MethodDescriptor = MethodDescriptor {
        name: "CancelResumableWrite",
        path: "/google.storage.v2.Storage/CancelResumableWrite",
        idempotent: true,
        streaming: false,
        retry: DEFAULT_RETRY,
    };
}

/// All the methods used by resumable uploads.
pub const METHODS: &[MethodDescriptor] = &[
    StartResumableWrite::DESCRIPTOR,
    WriteObject::DESCRIPTOR,
    QueryWriteStatus::DESCRIPTOR,
    CancelResumableWrite::DESCRIPTOR,
];

/// Finds a method by name.
///
/// # Example
/// ```
/// # use google_cloud_storage_resumable::method::find;
/// let descriptor = find("QueryWriteStatus").unwrap();
/// assert!(descriptor.idempotent);
/// ```
pub fn find(name: &str) -> Option<&'static MethodDescriptor> {
    METHODS.iter().find(|m| m.name == name)
}
