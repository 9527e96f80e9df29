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

//! Google Cloud Client Libraries for Rust - Storage resumable uploads
//!
//! This crate implements the resumable upload protocol of the [Google Cloud
//! Storage] gRPC API. Objects are uploaded in chunks, and uploads interrupted
//! by network or service failures continue from the last byte persisted by
//! the service. Most applications will use [Storage][client::Storage].
//!
//! The protocol has three parts:
//!
//! * Sessions: [start()][client::Storage::start] allocates an upload id,
//!   [resume()][client::Storage::resume] restores a session from its id, and
//!   [finalize()][client::Storage::finalize] completes the object.
//! * Chunks: [send_chunk()][client::Storage::send_chunk] sends a range of
//!   bytes, retrying transient failures and resending only the bytes the
//!   service did not persist.
//! * Reconciliation: [query_status()][client::Storage::query_status] and
//!   [reconcile()][client::Storage::reconcile] ask the service how many bytes
//!   it holds. The service is always the source of truth.
//!
//! **WARNING:** this crate is under active development. We expect multiple
//! breaking changes in the upcoming releases. Testing is also incomplete, we do
//! **not** recommend that you use this crate in production. We welcome feedback
//! about the APIs, documentation, missing features, bugs, etc.
//!
//! [Google Cloud Storage]: https://cloud.google.com/storage

pub use gax::Result;
pub use gax::error::Error;

pub mod error;
pub mod method;
pub mod model;
pub mod options;
pub mod retry_policy;
pub mod session;
pub mod stub;
pub mod testing;

mod storage;

/// Clients for resumable uploads.
pub mod client {
    pub use crate::storage::client::{ClientBuilder, Storage};
    /// The default [stub::Storage][crate::stub::Storage] implementation,
    /// using gRPC.
    pub use crate::storage::transport::Storage as GrpcTransport;
}
