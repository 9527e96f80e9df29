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

//! Configuration for resumable uploads.

use crate::method::MethodDescriptor;
use crate::retry_policy::LoopPolicy;
use gax::backoff_policy::BackoffPolicy;
use gax::retry_policy::RetryPolicy;
use gax::retry_throttler::{AdaptiveThrottler, SharedRetryThrottler};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Data is persisted by the service in multiples of this size.
pub const CHUNK_QUANTUM: usize = 256 * 1024;

/// The default size for chunks sent by [Storage::upload][crate::client::Storage::upload].
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// The maximum data in a single `WriteObjectRequest` message.
pub const MAX_MESSAGE_SIZE: usize = 2 * 1024 * 1024;

/// The options used by all the upload operations in a client.
///
/// Applications set these options using the `with_*` methods in
/// [ClientBuilder][crate::client::ClientBuilder].
#[derive(Clone, Debug)]
pub struct UploadOptions {
    pub(crate) retry_policy: Option<Arc<dyn RetryPolicy>>,
    pub(crate) backoff_policy: Option<Arc<dyn BackoffPolicy>>,
    pub(crate) retry_throttler: SharedRetryThrottler,
    pub(crate) total_timeout: Option<Duration>,
    pub(crate) attempt_timeout: Option<Duration>,
    chunk_size: usize,
    max_message_size: usize,
    pub(crate) crc32c: bool,
    pub(crate) md5: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            retry_policy: None,
            backoff_policy: None,
            retry_throttler: Arc::new(Mutex::new(AdaptiveThrottler::default())),
            total_timeout: None,
            attempt_timeout: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_message_size: MAX_MESSAGE_SIZE,
            crc32c: true,
            md5: false,
        }
    }
}

impl UploadOptions {
    /// The size of the chunks sent by the upload driver.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Sets the chunk size, rounded up to a multiple of 256 KiB.
    pub(crate) fn set_chunk_size(&mut self, v: usize) {
        let v = std::cmp::max(v, 1);
        self.chunk_size = v.div_ceil(CHUNK_QUANTUM) * CHUNK_QUANTUM;
    }

    /// The maximum number of data bytes in each `WriteObjectRequest`.
    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    pub(crate) fn set_max_message_size(&mut self, v: usize) {
        self.max_message_size = v.clamp(1, MAX_MESSAGE_SIZE);
    }

    /// The retry policy for one retry loop of `method`.
    ///
    /// Uses the application's policy, or the default policy for the method.
    /// Either way, the loop stops when the configured total timeout expires.
    pub(crate) fn retry_policy(&self, method: &MethodDescriptor) -> Arc<dyn RetryPolicy> {
        let inner: Arc<dyn RetryPolicy> = match (&self.retry_policy, self.total_timeout) {
            (Some(p), _) => p.clone(),
            (None, Some(_)) => Arc::new(method.retry.retryable_errors()),
            (None, None) => Arc::new(method.retry.retry_policy()),
        };
        Arc::new(LoopPolicy::new(inner, self.total_timeout))
    }

    /// The backoff policy for `method`.
    pub(crate) fn backoff_policy(&self, method: &MethodDescriptor) -> Arc<dyn BackoffPolicy> {
        self.backoff_policy
            .clone()
            .unwrap_or_else(|| Arc::new(method.retry.backoff_policy()))
    }

    /// The options for one attempt, given the time remaining in the retry loop.
    pub(crate) fn request_options(
        &self,
        bucket: Option<&str>,
        remaining_time: Option<Duration>,
    ) -> RequestOptions {
        let timeout = [self.attempt_timeout, remaining_time]
            .into_iter()
            .flatten()
            .min();
        RequestOptions::new()
            .set_attempt_timeout(timeout)
            .set_bucket(bucket)
    }
}

/// The options for a single RPC.
///
/// The client library computes these values for each attempt. Implementations
/// of [stub::Storage][crate::stub::Storage] use them to configure the request.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct RequestOptions {
    /// The timeout for this attempt, if any.
    pub attempt_timeout: Option<Duration>,
    /// The bucket name, used in the `x-goog-request-params` header.
    pub bucket: Option<String>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets or clears the attempt timeout.
    pub fn set_attempt_timeout(mut self, v: Option<Duration>) -> Self {
        self.attempt_timeout = v;
        self
    }

    /// Sets or clears the bucket.
    pub fn set_bucket<T: Into<String>>(mut self, v: Option<T>) -> Self {
        self.bucket = v.map(Into::into);
        self
    }
}
