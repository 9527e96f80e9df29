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

//! A programmable implementation of [stub::Storage][crate::stub::Storage].
//!
//! [FakeStorage] replays canned responses, one per call, and records every
//! request it receives. Use it to test how an application behaves when the
//! service fails in the middle of an upload.
//!
//! # Example
//! ```
//! # tokio_test::block_on(async {
//! use google_cloud_storage_resumable::client::Storage;
//! use google_cloud_storage_resumable::session::Destination;
//! use google_cloud_storage_resumable::testing::{self, FakeStorage};
//! let fake = std::sync::Arc::new(FakeStorage::new());
//! fake.push_start_resumable_write(Ok(testing::upload_id("abc")));
//! let client = Storage::from_stub(fake.clone());
//! let session = client.start(Destination::new("my-bucket", "my-object"), None).await?;
//! assert_eq!(session.upload_id(), "abc");
//! assert_eq!(fake.requests().len(), 1);
//! # anyhow::Result::<()>::Ok(()) });
//! ```

use crate::Result;
use crate::error::Error;
use crate::error::rpc::{Code, Status};
use crate::model::{
    CancelResumableWriteRequest, CancelResumableWriteResponse, Object, QueryWriteStatusRequest,
    QueryWriteStatusResponse, StartResumableWriteRequest, StartResumableWriteResponse,
    WriteObjectRequest, WriteObjectResponse, query_write_status_response, write_object_response,
};
use crate::options::RequestOptions;
use std::collections::VecDeque;
use std::sync::Mutex;

/// A request captured by [FakeStorage].
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum Request {
    StartResumableWrite(StartResumableWriteRequest, RequestOptions),
    WriteObject(Vec<WriteObjectRequest>, RequestOptions),
    QueryWriteStatus(QueryWriteStatusRequest, RequestOptions),
    CancelResumableWrite(CancelResumableWriteRequest, RequestOptions),
}

impl Request {
    /// The name of the RPC.
    pub fn method(&self) -> &'static str {
        match self {
            Self::StartResumableWrite(..) => "StartResumableWrite",
            Self::WriteObject(..) => "WriteObject",
            Self::QueryWriteStatus(..) => "QueryWriteStatus",
            Self::CancelResumableWrite(..) => "CancelResumableWrite",
        }
    }

    pub fn options(&self) -> &RequestOptions {
        match self {
            Self::StartResumableWrite(_, o)
            | Self::WriteObject(_, o)
            | Self::QueryWriteStatus(_, o)
            | Self::CancelResumableWrite(_, o) => o,
        }
    }
}

#[derive(Debug, Default)]
struct Queues {
    start: VecDeque<Result<StartResumableWriteResponse>>,
    write: VecDeque<Result<WriteObjectResponse>>,
    query: VecDeque<Result<QueryWriteStatusResponse>>,
    cancel: VecDeque<Result<CancelResumableWriteResponse>>,
    requests: Vec<Request>,
}

/// Replays queued responses and records the requests.
///
/// Each call pops the next response queued for its RPC. Calls without a
/// queued response fail with `UNIMPLEMENTED`, which is never retried.
#[derive(Debug, Default)]
pub struct FakeStorage {
    inner: Mutex<Queues>,
}

impl FakeStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response for `StartResumableWrite`.
    pub fn push_start_resumable_write(&self, r: Result<StartResumableWriteResponse>) -> &Self {
        self.lock().start.push_back(r);
        self
    }

    /// Queues a response for `WriteObject`.
    pub fn push_write_object(&self, r: Result<WriteObjectResponse>) -> &Self {
        self.lock().write.push_back(r);
        self
    }

    /// Queues a response for `QueryWriteStatus`.
    pub fn push_query_write_status(&self, r: Result<QueryWriteStatusResponse>) -> &Self {
        self.lock().query.push_back(r);
        self
    }

    /// Queues a response for `CancelResumableWrite`.
    pub fn push_cancel_resumable_write(&self, r: Result<CancelResumableWriteResponse>) -> &Self {
        self.lock().cancel.push_back(r);
        self
    }

    /// All the requests received so far, in order.
    pub fn requests(&self) -> Vec<Request> {
        self.lock().requests.clone()
    }

    /// The message streams received by `WriteObject`, in order.
    pub fn write_requests(&self) -> Vec<Vec<WriteObjectRequest>> {
        self.lock()
            .requests
            .iter()
            .filter_map(|r| match r {
                Request::WriteObject(messages, _) => Some(messages.clone()),
                _ => None,
            })
            .collect()
    }

    /// The number of queued responses not consumed yet.
    pub fn pending(&self) -> usize {
        let guard = self.lock();
        guard.start.len() + guard.write.len() + guard.query.len() + guard.cancel.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Queues> {
        self.inner.lock().expect("fake storage mutex is poisoned")
    }

    fn next<T, F>(&self, request: Request, queue: F) -> Result<T>
    where
        F: FnOnce(&mut Queues) -> Option<Result<T>>,
    {
        let method = request.method();
        let mut guard = self.lock();
        guard.requests.push(request);
        queue(&mut guard).unwrap_or_else(|| Err(exhausted_queue(method)))
    }
}

fn exhausted_queue(method: &str) -> Error {
    Error::service(
        Status::default()
            .set_code(Code::Unimplemented)
            .set_message(format!("no response queued for {method}")),
    )
}

impl crate::stub::Storage for FakeStorage {
    async fn start_resumable_write(
        &self,
        req: StartResumableWriteRequest,
        options: RequestOptions,
    ) -> Result<StartResumableWriteResponse> {
        self.next(Request::StartResumableWrite(req, options), |q| {
            q.start.pop_front()
        })
    }

    async fn write_object(
        &self,
        req: Vec<WriteObjectRequest>,
        options: RequestOptions,
    ) -> Result<WriteObjectResponse> {
        self.next(Request::WriteObject(req, options), |q| q.write.pop_front())
    }

    async fn query_write_status(
        &self,
        req: QueryWriteStatusRequest,
        options: RequestOptions,
    ) -> Result<QueryWriteStatusResponse> {
        self.next(Request::QueryWriteStatus(req, options), |q| {
            q.query.pop_front()
        })
    }

    async fn cancel_resumable_write(
        &self,
        req: CancelResumableWriteRequest,
        options: RequestOptions,
    ) -> Result<CancelResumableWriteResponse> {
        self.next(Request::CancelResumableWrite(req, options), |q| {
            q.cancel.pop_front()
        })
    }
}

impl<T> crate::stub::Storage for std::sync::Arc<T>
where
    T: crate::stub::Storage,
{
    fn start_resumable_write(
        &self,
        req: StartResumableWriteRequest,
        options: RequestOptions,
    ) -> impl Future<Output = Result<StartResumableWriteResponse>> + Send {
        T::start_resumable_write(self, req, options)
    }

    fn write_object(
        &self,
        req: Vec<WriteObjectRequest>,
        options: RequestOptions,
    ) -> impl Future<Output = Result<WriteObjectResponse>> + Send {
        T::write_object(self, req, options)
    }

    fn query_write_status(
        &self,
        req: QueryWriteStatusRequest,
        options: RequestOptions,
    ) -> impl Future<Output = Result<QueryWriteStatusResponse>> + Send {
        T::query_write_status(self, req, options)
    }

    fn cancel_resumable_write(
        &self,
        req: CancelResumableWriteRequest,
        options: RequestOptions,
    ) -> impl Future<Output = Result<CancelResumableWriteResponse>> + Send {
        T::cancel_resumable_write(self, req, options)
    }
}

/// A `StartResumableWrite` response with the given upload id.
pub fn upload_id<T: Into<String>>(v: T) -> StartResumableWriteResponse {
    StartResumableWriteResponse {
        upload_id: v.into(),
    }
}

/// A `WriteObject` response for an upload in progress.
pub fn write_persisted(size: u64) -> WriteObjectResponse {
    WriteObjectResponse {
        write_status: Some(write_object_response::WriteStatus::PersistedSize(
            size as i64,
        )),
    }
}

/// A `WriteObject` response for a finalized upload.
pub fn write_finalized(object: Object) -> WriteObjectResponse {
    WriteObjectResponse {
        write_status: Some(write_object_response::WriteStatus::Resource(object)),
    }
}

/// A `QueryWriteStatus` response for an upload in progress.
pub fn query_persisted(size: u64) -> QueryWriteStatusResponse {
    QueryWriteStatusResponse {
        write_status: Some(query_write_status_response::WriteStatus::PersistedSize(
            size as i64,
        )),
    }
}

/// A `QueryWriteStatus` response for a finalized upload.
pub fn query_finalized(object: Object) -> QueryWriteStatusResponse {
    QueryWriteStatusResponse {
        write_status: Some(query_write_status_response::WriteStatus::Resource(object)),
    }
}

/// An error with the given status code.
pub fn status_error(code: Code) -> Error {
    Error::service(Status::default().set_code(code).set_message("test-only"))
}

/// A retry throttler that never rejects an attempt.
///
/// The default throttler may skip attempts after many failures. Tests that
/// count attempts use this one to keep the count deterministic.
///
/// # Example
/// ```
/// use google_cloud_storage_resumable::client::Storage;
/// use google_cloud_storage_resumable::testing::{FakeStorage, NeverThrottle};
/// let client = Storage::builder()
///     .with_retry_throttler(NeverThrottle)
///     .build_with_stub(FakeStorage::new());
/// ```
#[derive(Clone, Debug, Default)]
pub struct NeverThrottle;

impl gax::retry_throttler::RetryThrottler for NeverThrottle {
    fn throttle_retry_attempt(&self) -> bool {
        false
    }

    fn on_retry_failure(&mut self, _error: &gax::retry_result::RetryResult) {}

    fn on_success(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::Storage as _;

    #[tokio::test]
    async fn replays_in_order() -> anyhow::Result<()> {
        let fake = FakeStorage::new();
        fake.push_query_write_status(Ok(query_persisted(100)))
            .push_query_write_status(Err(status_error(Code::Unavailable)));
        assert_eq!(fake.pending(), 2);

        let request = QueryWriteStatusRequest {
            upload_id: "abc".to_string(),
            ..Default::default()
        };
        let got = fake
            .query_write_status(request.clone(), RequestOptions::new())
            .await?;
        assert_eq!(got, query_persisted(100));
        let err = fake
            .query_write_status(request.clone(), RequestOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.status().map(|s| s.code), Some(Code::Unavailable));
        assert_eq!(fake.pending(), 0);

        let requests = fake.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[0],
            Request::QueryWriteStatus(request, RequestOptions::new())
        );
        Ok(())
    }

    #[tokio::test]
    async fn empty_queue() {
        let fake = FakeStorage::new();
        let err = fake
            .write_object(Vec::new(), RequestOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.status().map(|s| s.code), Some(Code::Unimplemented));
        assert_eq!(fake.write_requests(), vec![Vec::new()]);
        assert_eq!(fake.requests()[0].method(), "WriteObject");
    }

    #[tokio::test]
    async fn through_arc() -> anyhow::Result<()> {
        let fake = std::sync::Arc::new(FakeStorage::new());
        fake.push_cancel_resumable_write(Ok(CancelResumableWriteResponse {}));
        let request = CancelResumableWriteRequest {
            upload_id: "abc".to_string(),
        };
        let options = RequestOptions::new().set_bucket(Some("projects/_/buckets/b"));
        fake.cancel_resumable_write(request, options.clone())
            .await?;
        assert_eq!(fake.requests()[0].options(), &options);
        Ok(())
    }
}
