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

pub(crate) mod checksum;
pub(crate) mod chunk_sender;
pub(crate) mod client;
pub(crate) mod from_status;
pub(crate) mod perform_upload;
pub(crate) mod reconciler;
pub(crate) mod segmenter;
pub(crate) mod session_manager;
pub(crate) mod transport;

use crate::Result;
use crate::error::{Error, ErrorExt, SessionError};
use crate::method::Method;
use crate::options::UploadOptions;
use crate::session::UploadSession;
use std::time::Duration;

/// Runs `attempt` in a retry loop, with the policies configured for `M`.
pub(crate) async fn invoke<M, F, R>(options: &UploadOptions, attempt: F) -> Result<R>
where
    M: Method,
    F: AsyncFnMut(Option<Duration>) -> Result<R> + Send,
{
    let descriptor = M::DESCRIPTOR;
    gax::retry_loop_internal::retry_loop(
        attempt,
        async |d| tokio::time::sleep(d).await,
        descriptor.idempotent,
        options.retry_throttler.clone(),
        options.retry_policy(&descriptor),
        options.backoff_policy(&descriptor),
    )
    .await
}

/// Converts errors that exhausted the retry policy into resumable failures.
///
/// Other errors are returned unchanged.
pub(crate) fn with_session(session: &UploadSession, error: Error) -> Error {
    if !error.is_exhausted() || error.is_upload_failed() {
        return error;
    }
    SessionError::UploadFailed {
        upload_id: session.upload_id().to_string(),
        committed_offset: session.committed_offset(),
        source: error,
    }
    .into()
}
