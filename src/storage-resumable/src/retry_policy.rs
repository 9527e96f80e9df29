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

//! Defines the retry policies for resumable uploads.
//!
//! The client library automatically retries requests that fail with transient
//! errors: broken connections, timeouts, and the `UNAVAILABLE`,
//! `DEADLINE_EXCEEDED`, `INTERNAL` and `RESOURCE_EXHAUSTED` status codes. Each
//! retry of a chunk upload is preceded by a status query, so only the bytes
//! missing in the service are sent again.
//!
//! Errors such as `INVALID_ARGUMENT`, `PERMISSION_DENIED`, or `NOT_FOUND` are
//! never retried.
//!
//! The policies implement [gax::retry_policy::RetryPolicy], use
//! [RetryPolicyExt][gax::retry_policy::RetryPolicyExt] to limit their duration
//! or number of attempts.
//!
//! # Example
//! ```
//! use gax::retry_policy::RetryPolicyExt;
//! use google_cloud_storage_resumable::client::Storage;
//! use google_cloud_storage_resumable::retry_policy::RetryableErrors;
//! use std::time::Duration;
//! let builder = Storage::builder().with_retry_policy(
//!     RetryableErrors
//!         .with_time_limit(Duration::from_secs(60))
//!         .with_attempt_limit(10),
//! );
//! ```

use crate::error::Error;
use crate::error::rpc::Code;
use gax::retry_policy::RetryPolicy;
use gax::retry_result::RetryResult;
use gax::retry_state::RetryState;
use gax::throttle_result::ThrottleResult;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Retries transport errors, timeouts, and a fixed list of status codes.
///
/// Each [MethodDescriptor][crate::method::MethodDescriptor] lists the codes
/// retried by default for the method. Applications with different needs can
/// provide their own list.
///
/// This policy must be decorated to limit the number of retry attempts and/or
/// the duration of the retry loop.
///
/// # Example
/// ```
/// # use google_cloud_storage_resumable::retry_policy::RetryableCodes;
/// use gax::error::rpc::Code;
/// use gax::retry_policy::RetryPolicyExt;
/// const CODES: &[Code] = &[Code::Unavailable, Code::Aborted];
/// let policy = RetryableCodes::new(CODES).with_attempt_limit(5);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct RetryableCodes {
    codes: &'static [Code],
}

impl RetryableCodes {
    /// Creates a policy retrying `codes`.
    pub const fn new(codes: &'static [Code]) -> Self {
        Self { codes }
    }

    /// The status codes retried by this policy.
    pub fn codes(&self) -> &'static [Code] {
        self.codes
    }
}

impl RetryPolicy for RetryableCodes {
    fn on_error(&self, state: &RetryState, error: Error) -> RetryResult {
        if !state.idempotent {
            return RetryResult::Permanent(error);
        }
        if error.is_io() || error.is_timeout() || error.is_transport() {
            return RetryResult::Continue(error);
        }
        match error.status().map(|s| s.code) {
            Some(code) if self.codes.contains(&code) => RetryResult::Continue(error),
            _ => RetryResult::Permanent(error),
        }
    }
}

/// Retries the transient errors for resumable uploads.
///
/// Equivalent to [RetryableCodes] with
/// [RETRYABLE_CODES][crate::method::RETRYABLE_CODES].
///
/// This policy must be decorated to limit the number of retry attempts and/or
/// the duration of the retry loop.
#[derive(Clone, Debug)]
pub struct RetryableErrors;

impl RetryPolicy for RetryableErrors {
    fn on_error(&self, state: &RetryState, error: Error) -> RetryResult {
        RetryableCodes::new(crate::method::RETRYABLE_CODES).on_error(state, error)
    }
}

/// A retry policy that never retries.
///
/// Useful in tests, and for applications that implement their own retry loop
/// on top of [Storage::reconcile][crate::client::Storage::reconcile].
#[derive(Clone, Debug)]
pub struct NeverRetry;

impl RetryPolicy for NeverRetry {
    fn on_error(&self, _state: &RetryState, error: Error) -> RetryResult {
        RetryResult::Exhausted(error)
    }
}

/// The policy for a single retry loop.
///
/// Stops the loop once the total timeout expires, and reports every error that
/// stops a retryable loop as [exhausted][Error::is_exhausted]. The deadline
/// uses the tokio clock, like the sleeps in the loop.
#[derive(Debug)]
pub(crate) struct LoopPolicy {
    inner: Arc<dyn RetryPolicy>,
    deadline: Option<Instant>,
}

impl LoopPolicy {
    pub(crate) fn new(inner: Arc<dyn RetryPolicy>, total_timeout: Option<Duration>) -> Self {
        let deadline = total_timeout.map(|t| Instant::now() + t);
        Self { inner, deadline }
    }

    fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

fn exhausted(error: Error) -> Error {
    if error.is_exhausted() {
        return error;
    }
    Error::exhausted(error)
}

impl RetryPolicy for LoopPolicy {
    fn on_error(&self, state: &RetryState, error: Error) -> RetryResult {
        match self.inner.on_error(state, error) {
            RetryResult::Continue(e) if self.expired() => RetryResult::Exhausted(exhausted(e)),
            RetryResult::Continue(e) => {
                tracing::warn!(
                    "retrying after error, attempt_count={}, error={e}",
                    state.attempt_count
                );
                RetryResult::Continue(e)
            }
            RetryResult::Exhausted(e) => RetryResult::Exhausted(exhausted(e)),
            result => result,
        }
    }

    fn on_throttle(&self, state: &RetryState, error: Error) -> ThrottleResult {
        match self.inner.on_throttle(state, error) {
            ThrottleResult::Continue(e) if self.expired() => ThrottleResult::Exhausted(exhausted(e)),
            ThrottleResult::Exhausted(e) => ThrottleResult::Exhausted(exhausted(e)),
            result => result,
        }
    }

    fn remaining_time(&self, state: &RetryState) -> Option<Duration> {
        let remaining = self
            .deadline
            .map(|d| d.saturating_duration_since(Instant::now()));
        [self.inner.remaining_time(state), remaining]
            .into_iter()
            .flatten()
            .min()
    }
}
