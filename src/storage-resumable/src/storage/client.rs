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

use super::chunk_sender::ChunkSender;
use super::perform_upload::PerformUpload;
use super::reconciler::Reconciler;
use super::session_manager::SessionManager;
use super::transport;
use crate::Result;
use crate::model::Object;
use crate::options::UploadOptions;
use crate::session::{Chunk, Destination, ResumeToken, UploadSession, WriteStatus};
use gax::backoff_policy::BackoffPolicyArg;
use gax::retry_policy::RetryPolicyArg;
use gax::retry_throttler::RetryThrottlerArg;
use google_cloud_storage::streaming_source::{Payload, Seek, StreamingSource};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_HOST: &str = "https://storage.googleapis.com";

/// Implements a client for Cloud Storage resumable uploads over gRPC.
///
/// # Example
/// ```
/// # use google_cloud_storage_resumable::client::Storage;
/// # use google_cloud_storage_resumable::session::Destination;
/// # async fn sample() -> anyhow::Result<()> {
/// let client = Storage::builder().build().await?;
/// let object = client
///     .upload(Destination::new("my-bucket", "my-object"), "the quick brown fox")
///     .await?;
/// println!("object details={object:?}");
/// # Ok(()) }
/// ```
///
/// # Configuration
///
/// To configure `Storage` use the `with_*` methods in the type returned
/// by [builder()][Storage::builder]. The default configuration should
/// work for most applications. Common configuration changes include
///
/// * [with_endpoint()]: by default this client uses the global default endpoint
///   (`https://storage.googleapis.com`). Applications using regional
///   endpoints, or testing against an emulator, may want to override this
///   default.
/// * [with_total_timeout()]: by default each operation retries transient
///   errors for up to 60 seconds.
///
/// # Uploads, sessions, and chunks
///
/// Most applications use [upload()][Storage::upload], which sends a complete
/// payload and returns the new object. Applications that need more control
/// create a session with [start()][Storage::start], send each chunk with
/// [send_chunk()][Storage::send_chunk], and complete the upload with
/// [finalize()][Storage::finalize]. Sessions that fail can be continued, even
/// from a different process, using [resume()][Storage::resume].
///
/// # Pooling and Cloning
///
/// `Storage` holds a connection pool internally, it is advised to
/// create one and then reuse it.  You do not need to wrap `Storage` in
/// an [Rc](std::rc::Rc) or [Arc] to reuse it, because it already uses an `Arc`
/// internally.
///
/// [with_endpoint()]: ClientBuilder::with_endpoint
/// [with_total_timeout()]: ClientBuilder::with_total_timeout
#[derive(Debug)]
pub struct Storage<S = transport::Storage>
where
    S: crate::stub::Storage + 'static,
{
    inner: Arc<StorageInner<S>>,
}

#[derive(Debug)]
struct StorageInner<S> {
    stub: S,
    options: UploadOptions,
}

impl<S> Clone for Storage<S>
where
    S: crate::stub::Storage + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl Storage {
    /// Returns a builder for [Storage].
    ///
    /// # Example
    /// ```
    /// # use google_cloud_storage_resumable::client::Storage;
    /// # async fn sample() -> anyhow::Result<()> {
    /// let client = Storage::builder().build().await?;
    /// # Ok(()) }
    /// ```
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }
}

impl<S> Storage<S>
where
    S: crate::stub::Storage + 'static,
{
    /// Creates a new client from the provided stub, using the default options.
    ///
    /// The most common case for calling this function is in tests mocking the
    /// client's behavior. See [testing][crate::testing].
    pub fn from_stub(stub: S) -> Self {
        Self::new(stub, UploadOptions::default())
    }

    pub(crate) fn new(stub: S, options: UploadOptions) -> Self {
        Self {
            inner: Arc::new(StorageInner { stub, options }),
        }
    }

    /// The options used by this client.
    pub fn options(&self) -> &UploadOptions {
        &self.inner.options
    }

    /// Starts a new resumable upload.
    ///
    /// # Example
    /// ```
    /// # use google_cloud_storage_resumable::client::Storage;
    /// # use google_cloud_storage_resumable::session::Destination;
    /// # async fn sample(client: &Storage) -> anyhow::Result<()> {
    /// let destination = Destination::new("my-bucket", "my-object")
    ///     .set_content_type("text/plain");
    /// let session = client.start(destination, Some(1024)).await?;
    /// println!("started upload {}", session.upload_id());
    /// # Ok(()) }
    /// ```
    ///
    /// The destination is validated before any request is sent. If
    /// `total_size` is set the service rejects uploads with a different size.
    pub async fn start(
        &self,
        destination: Destination,
        total_size: Option<u64>,
    ) -> Result<UploadSession> {
        self.session_manager().start(destination, total_size).await
    }

    /// Resumes an upload given its upload id.
    ///
    /// The session is reconciled with the service before this function
    /// returns. Uploads that are already complete return a finalized session.
    ///
    /// # Example
    /// ```
    /// # use google_cloud_storage_resumable::client::Storage;
    /// # async fn sample(client: &Storage, upload_id: &str) -> anyhow::Result<()> {
    /// let session = client.resume(upload_id).await?;
    /// println!("resuming at offset {}", session.committed_offset());
    /// # Ok(()) }
    /// ```
    pub async fn resume<T: Into<String>>(&self, upload_id: T) -> Result<UploadSession> {
        self.resume_from(ResumeToken::new(upload_id)).await
    }

    /// Resumes an upload from a saved [ResumeToken].
    ///
    /// Unlike [resume()][Storage::resume], the session keeps the destination
    /// and size recorded in the token.
    pub async fn resume_from(&self, token: ResumeToken) -> Result<UploadSession> {
        self.session_manager().resume(token).await
    }

    /// Sends a chunk and returns the new committed offset.
    ///
    /// The chunk must start at the committed offset of the session. Chunks
    /// starting before that offset fail with an
    /// [offset regression][crate::error::ErrorExt::is_offset_regression] error. The
    /// returned offset may be smaller than `chunk.end()`, applications send
    /// the remaining data in the next chunk.
    ///
    /// # Example
    /// ```
    /// # use google_cloud_storage_resumable::client::Storage;
    /// # use google_cloud_storage_resumable::session::{Chunk, UploadSession};
    /// # async fn sample(client: &Storage, session: &mut UploadSession) -> anyhow::Result<()> {
    /// let data = bytes::Bytes::from_static(b"the quick brown fox");
    /// let chunk = Chunk::new(session.committed_offset(), data);
    /// let committed = client.send_chunk(session, chunk).await?;
    /// println!("the service persisted {committed} bytes");
    /// # Ok(()) }
    /// ```
    pub async fn send_chunk(&self, session: &mut UploadSession, chunk: Chunk) -> Result<u64> {
        ChunkSender::new(&self.inner.stub, &self.inner.options)
            .send_chunk(session, chunk)
            .await
    }

    /// Queries the status of an upload without changing the session.
    pub async fn query_status(&self, session: &UploadSession) -> Result<WriteStatus> {
        self.reconciler().query_status(session).await
    }

    /// Queries the status of an upload and updates the session to match.
    ///
    /// # Example
    /// ```
    /// # use google_cloud_storage_resumable::client::Storage;
    /// # use google_cloud_storage_resumable::session::UploadSession;
    /// # async fn sample(client: &Storage, session: &mut UploadSession) -> anyhow::Result<()> {
    /// let status = client.reconcile(session).await?;
    /// if status.complete() {
    ///     println!("upload is complete: {:?}", session.object());
    /// }
    /// # Ok(()) }
    /// ```
    pub async fn reconcile(&self, session: &mut UploadSession) -> Result<WriteStatus> {
        self.reconciler().reconcile(session).await
    }

    /// Finalizes the upload and returns the new object.
    ///
    /// Finalizing a session twice fails with an
    /// [invalid state][crate::error::ErrorExt::is_invalid_state] error.
    pub async fn finalize(&self, session: &mut UploadSession) -> Result<Object> {
        self.session_manager().finalize(session).await
    }

    /// Cancels the upload. No more data can be sent to the session.
    pub async fn cancel(&self, session: &mut UploadSession) -> Result<()> {
        self.session_manager().cancel(session).await
    }

    /// Uploads a complete payload and returns the new object.
    ///
    /// The payload is sent in chunks of
    /// [chunk_size()][UploadOptions::chunk_size] bytes.
    ///
    /// # Example
    /// ```
    /// # use google_cloud_storage_resumable::client::Storage;
    /// # use google_cloud_storage_resumable::session::Destination;
    /// # async fn sample(client: &Storage) -> anyhow::Result<()> {
    /// let payload = tokio::fs::File::open("my-data").await?;
    /// let object = client
    ///     .upload(Destination::new("my-bucket", "my-object"), payload)
    ///     .await?;
    /// println!("object details={object:?}");
    /// # Ok(()) }
    /// ```
    pub async fn upload<T, P>(&self, destination: Destination, payload: T) -> Result<Object>
    where
        T: Into<Payload<P>>,
        Payload<P>: StreamingSource + Seek + Send,
    {
        PerformUpload::new(&self.inner.stub, &self.inner.options)
            .upload(destination, payload.into())
            .await
    }

    /// Sends the data in `payload` not yet persisted by `session`.
    ///
    /// The payload must contain the complete object. The data before the
    /// committed offset is skipped.
    ///
    /// # Example
    /// ```
    /// # use google_cloud_storage_resumable::client::Storage;
    /// # async fn sample(client: &Storage, upload_id: &str) -> anyhow::Result<()> {
    /// let mut session = client.resume(upload_id).await?;
    /// let payload = tokio::fs::File::open("my-data").await?;
    /// let object = client.upload_session(&mut session, payload).await?;
    /// println!("object details={object:?}");
    /// # Ok(()) }
    /// ```
    pub async fn upload_session<T, P>(
        &self,
        session: &mut UploadSession,
        payload: T,
    ) -> Result<Object>
    where
        T: Into<Payload<P>>,
        Payload<P>: StreamingSource + Seek + Send,
    {
        PerformUpload::new(&self.inner.stub, &self.inner.options)
            .upload_session(session, payload.into())
            .await
    }

    fn session_manager(&self) -> SessionManager<'_, S> {
        SessionManager::new(&self.inner.stub, &self.inner.options)
    }

    fn reconciler(&self) -> Reconciler<'_, S> {
        Reconciler::new(&self.inner.stub, &self.inner.options)
    }
}

/// A builder for [Storage].
///
/// ```
/// # use google_cloud_storage_resumable::client::Storage;
/// # async fn sample() -> anyhow::Result<()> {
/// let builder = Storage::builder();
/// let client = builder
///     .with_endpoint("https://storage.googleapis.com")
///     .build()
///     .await?;
/// # Ok(()) }
/// ```
#[derive(Clone, Debug)]
pub struct ClientBuilder {
    pub(crate) endpoint: Option<String>,
    pub(crate) options: UploadOptions,
}

impl ClientBuilder {
    pub(crate) fn new() -> Self {
        Self {
            endpoint: None,
            options: UploadOptions::default(),
        }
    }

    /// Creates a new client.
    ///
    /// # Example
    /// ```
    /// # use google_cloud_storage_resumable::client::Storage;
    /// # async fn sample() -> anyhow::Result<()> {
    /// let client = Storage::builder().build().await?;
    /// # Ok(()) }
    /// ```
    pub async fn build(self) -> Result<Storage> {
        tracing::info!("builder={self:?}");
        let stub = transport::Storage::new(self.endpoint, DEFAULT_HOST).await?;
        Ok(Storage::new(stub, self.options))
    }

    /// Creates a new client with a custom stub and the configured options.
    ///
    /// # Example
    /// ```
    /// # use google_cloud_storage_resumable::client::Storage;
    /// use google_cloud_storage_resumable::testing::FakeStorage;
    /// let client = Storage::builder()
    ///     .with_chunk_size(1024 * 1024)
    ///     .build_with_stub(FakeStorage::new());
    /// assert_eq!(client.options().chunk_size(), 1024 * 1024);
    /// ```
    pub fn build_with_stub<S>(self, stub: S) -> Storage<S>
    where
        S: crate::stub::Storage + 'static,
    {
        Storage::new(stub, self.options)
    }

    /// Sets the endpoint.
    ///
    /// # Example
    /// ```
    /// # use google_cloud_storage_resumable::client::Storage;
    /// # async fn sample() -> anyhow::Result<()> {
    /// let client = Storage::builder()
    ///     .with_endpoint("http://localhost:9000")
    ///     .build()
    ///     .await?;
    /// # Ok(()) }
    /// ```
    pub fn with_endpoint<V: Into<String>>(mut self, v: V) -> Self {
        self.endpoint = Some(v.into());
        self
    }

    /// Configure the retry policy.
    ///
    /// The client libraries can automatically retry operations that fail. The
    /// retry policy controls what errors are considered retryable, sets limits
    /// on the number of attempts or the time trying to make attempts.
    ///
    /// # Example
    /// ```
    /// # use google_cloud_storage_resumable::client::Storage;
    /// # async fn sample() -> anyhow::Result<()> {
    /// use gax::retry_policy::RetryPolicyExt;
    /// use google_cloud_storage_resumable::retry_policy::RetryableErrors;
    /// let client = Storage::builder()
    ///     .with_retry_policy(RetryableErrors.with_attempt_limit(3))
    ///     .build()
    ///     .await?;
    /// # Ok(()) }
    /// ```
    pub fn with_retry_policy<V: Into<RetryPolicyArg>>(mut self, v: V) -> Self {
        self.options.retry_policy = Some(v.into().into());
        self
    }

    /// Configure the retry backoff policy.
    ///
    /// The client libraries can automatically retry operations that fail. The
    /// backoff policy controls how long to wait in between retry attempts.
    ///
    /// # Example
    /// ```
    /// # use google_cloud_storage_resumable::client::Storage;
    /// # async fn sample() -> anyhow::Result<()> {
    /// use gax::exponential_backoff::ExponentialBackoff;
    /// let policy = ExponentialBackoff::default();
    /// let client = Storage::builder()
    ///     .with_backoff_policy(policy)
    ///     .build()
    ///     .await?;
    /// # Ok(()) }
    /// ```
    pub fn with_backoff_policy<V: Into<BackoffPolicyArg>>(mut self, v: V) -> Self {
        self.options.backoff_policy = Some(v.into().into());
        self
    }

    /// Configure the retry throttler.
    ///
    /// Advanced applications may want to configure a retry throttler to
    /// [Address Cascading Failures] and when [Handling Overload] conditions.
    /// The client libraries throttle their retry loop, using a policy to
    /// control the throttling algorithm. Use this method to fine tune or
    /// customize the default retry throttler.
    ///
    /// [Handling Overload]: https://sre.google/sre-book/handling-overload/
    /// [Address Cascading Failures]: https://sre.google/sre-book/addressing-cascading-failures/
    ///
    /// # Example
    /// ```
    /// # use google_cloud_storage_resumable::client::Storage;
    /// # async fn sample() -> anyhow::Result<()> {
    /// use gax::retry_throttler::AdaptiveThrottler;
    /// let client = Storage::builder()
    ///     .with_retry_throttler(AdaptiveThrottler::default())
    ///     .build()
    ///     .await?;
    /// # Ok(()) }
    /// ```
    pub fn with_retry_throttler<V: Into<RetryThrottlerArg>>(mut self, v: V) -> Self {
        self.options.retry_throttler = v.into().into();
        self
    }

    /// Sets the size of the chunks sent by [upload()][Storage::upload].
    ///
    /// The value is rounded up to a multiple of 256 KiB.
    pub fn with_chunk_size(mut self, v: usize) -> Self {
        self.options.set_chunk_size(v);
        self
    }

    /// Sets the maximum number of data bytes in each `WriteObject` message.
    ///
    /// The value is capped at 2 MiB.
    pub fn with_max_message_size(mut self, v: usize) -> Self {
        self.options.set_max_message_size(v);
        self
    }

    /// Limits the time spent retrying each operation.
    ///
    /// Operations on a session that exceed this limit fail with an
    /// [upload failed][crate::error::ErrorExt::is_upload_failed] error. Such
    /// uploads can be resumed later.
    ///
    /// The limit also applies to retry policies set with
    /// [with_retry_policy()][ClientBuilder::with_retry_policy].
    pub fn with_total_timeout(mut self, v: Duration) -> Self {
        self.options.total_timeout = Some(v);
        self
    }

    /// Sets the timeout for each attempt.
    pub fn with_attempt_timeout(mut self, v: Duration) -> Self {
        self.options.attempt_timeout = Some(v);
        self
    }

    /// Enables or disables CRC32C checksums. Enabled by default.
    pub fn with_crc32c(mut self, v: bool) -> Self {
        self.options.crc32c = v;
        self
    }

    /// Enables or disables MD5 hashes for the full object. Disabled by default.
    pub fn with_md5(mut self, v: bool) -> Self {
        self.options.md5 = v;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry_policy::NeverRetry;
    use crate::testing::{self, FakeStorage, NeverThrottle};

    static_assertions::assert_impl_all!(Storage: Clone, Send, Sync, std::fmt::Debug);
    static_assertions::assert_impl_all!(Storage<FakeStorage>: Clone, Send, Sync);

    #[test]
    fn builder() {
        let builder = Storage::builder()
            .with_endpoint("http://localhost:9000")
            .with_retry_policy(NeverRetry)
            .with_retry_throttler(NeverThrottle)
            .with_chunk_size(1000)
            .with_max_message_size(1024)
            .with_total_timeout(Duration::from_secs(10))
            .with_attempt_timeout(Duration::from_secs(2))
            .with_crc32c(false)
            .with_md5(true);
        assert_eq!(builder.endpoint.as_deref(), Some("http://localhost:9000"));
        let options = &builder.options;
        assert!(options.retry_policy.is_some(), "{options:?}");
        assert!(options.backoff_policy.is_none(), "{options:?}");
        assert_eq!(options.chunk_size(), crate::options::CHUNK_QUANTUM);
        assert_eq!(options.max_message_size(), 1024);
        assert_eq!(options.total_timeout, Some(Duration::from_secs(10)));
        assert_eq!(options.attempt_timeout, Some(Duration::from_secs(2)));
        assert!(!options.crc32c, "{options:?}");
        assert!(options.md5, "{options:?}");
    }

    #[tokio::test]
    async fn build_bad_endpoint() {
        let err = Storage::builder()
            .with_endpoint("not a valid endpoint")
            .build()
            .await
            .unwrap_err();
        assert!(err.is_binding(), "{err:?}");
    }

    #[tokio::test]
    async fn from_stub() -> anyhow::Result<()> {
        let fake = Arc::new(FakeStorage::new());
        fake.push_start_resumable_write(Ok(testing::upload_id("abc")))
            .push_query_write_status(Ok(testing::query_persisted(0)));
        let client = Storage::from_stub(fake.clone());
        let session = client
            .start(Destination::new("my-bucket", "my-object"), None)
            .await?;
        let status = client.query_status(&session).await?;
        assert_eq!(status, WriteStatus::persisted(0));
        assert_eq!(fake.requests().len(), 2);
        assert_eq!(fake.pending(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn upload_str() -> anyhow::Result<()> {
        let object = Object::default()
            .set_name("my-object")
            .set_size(5)
            .set_checksums(
                crate::model::ObjectChecksums::new().set_crc32c(crc32c::crc32c(b"hello")),
            );
        let fake = FakeStorage::new();
        fake.push_start_resumable_write(Ok(testing::upload_id("abc")))
            .push_write_object(Ok(testing::write_finalized(object.clone())));
        let client = Storage::builder().build_with_stub(fake);
        let got = client
            .upload(Destination::new("my-bucket", "my-object"), "hello")
            .await?;
        assert_eq!(got, object);
        Ok(())
    }
}
