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

//! Types describing a resumable upload session.
//!
//! An [UploadSession] tracks one resumable upload. The session is created by
//! [Storage::start][crate::client::Storage::start] or
//! [Storage::resume][crate::client::Storage::resume], and it is advanced by
//! sending [Chunk]s. All the operations that change the session take a
//! `&mut UploadSession`, so at most one task can drive a session at a time.

use crate::Result;
use crate::error::{Error, SessionError};
use crate::model::{Object, QueryWriteStatusResponse, WriteObjectResponse, WriteObjectSpec};
use crate::storage::checksum::Checksum;

/// The bucket names used in the gRPC API start with this prefix.
const BUCKET_PREFIX: &str = "projects/_/buckets/";

/// The lifecycle states of an [UploadSession].
///
/// Sessions start in `Created`, move to `Active` once the service has
/// persisted some data, and end in `Finalized` or `Cancelled`. Transient
/// errors never appear as a state: they are resolved by querying the service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionState {
    /// The service issued an upload id, and no data is persisted.
    Created,
    /// The service has persisted some data.
    Active,
    /// The object is finalized. No more data can be sent.
    Finalized,
    /// The upload was cancelled. No more data can be sent.
    Cancelled,
}

impl SessionState {
    /// Returns `true` if the session accepts no more data.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalized | Self::Cancelled)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Created => "CREATED",
            Self::Active => "ACTIVE",
            Self::Finalized => "FINALIZED",
            Self::Cancelled => "CANCELLED",
        };
        f.write_str(name)
    }
}

/// The destination object for an upload.
///
/// # Example
/// ```
/// # use google_cloud_storage_resumable::session::Destination;
/// let destination = Destination::new("my-bucket", "my-object")
///     .set_content_type("text/plain")
///     .set_if_generation_match(0);
/// assert_eq!(destination.bucket(), "projects/_/buckets/my-bucket");
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Destination {
    bucket: String,
    object: String,
    content_type: Option<String>,
    metadata: Vec<(String, String)>,
    if_generation_match: Option<i64>,
}

impl Destination {
    /// Creates a new destination.
    ///
    /// The bucket can be given as `projects/_/buckets/{bucket_id}` or as a
    /// bare bucket id.
    pub fn new<B, O>(bucket: B, object: O) -> Self
    where
        B: Into<String>,
        O: Into<String>,
    {
        let bucket = bucket.into();
        let bucket = if bucket.starts_with(BUCKET_PREFIX) || bucket.contains('/') {
            bucket
        } else {
            format!("{BUCKET_PREFIX}{bucket}")
        };
        Self {
            bucket,
            object: object.into(),
            ..Default::default()
        }
    }

    /// The bucket name, in `projects/_/buckets/{bucket_id}` format.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// The object name.
    pub fn object(&self) -> &str {
        &self.object
    }

    /// Sets the `Content-Type` of the new object.
    pub fn set_content_type<T: Into<String>>(mut self, v: T) -> Self {
        self.content_type = Some(v.into());
        self
    }

    /// Sets custom metadata for the new object.
    pub fn set_metadata<T, K, V>(mut self, v: T) -> Self
    where
        T: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.metadata = v.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }

    /// Only create the object if its current generation matches this value.
    ///
    /// Use `0` to create the object only if it does not exist.
    pub fn set_if_generation_match<T: Into<i64>>(mut self, v: T) -> Self {
        self.if_generation_match = Some(v.into());
        self
    }

    /// Verifies the destination can be used before any request is sent.
    pub(crate) fn validate(&self) -> Result<()> {
        let bucket_id = self
            .bucket
            .strip_prefix(BUCKET_PREFIX)
            .ok_or_else(|| Error::binding(format!("malformed bucket name: {}", self.bucket)))?;
        if bucket_id.is_empty() || bucket_id.contains('/') {
            return Err(Error::binding(format!(
                "malformed bucket name: {}",
                self.bucket
            )));
        }
        if self.object.is_empty() {
            return Err(Error::binding("the object name cannot be empty"));
        }
        Ok(())
    }

    pub(crate) fn to_spec(&self, size_hint: Option<u64>) -> WriteObjectSpec {
        let mut resource = Object::default()
            .set_bucket(&self.bucket)
            .set_name(&self.object)
            .set_metadata(self.metadata.clone());
        if let Some(t) = &self.content_type {
            resource = resource.set_content_type(t);
        }
        let spec = WriteObjectSpec::default()
            .set_resource(resource)
            .set_or_clear_object_size(size_hint.map(|s| s as i64));
        match self.if_generation_match {
            Some(g) => spec.set_if_generation_match(g),
            None => spec,
        }
    }
}

/// The status of an upload, as reported by the service.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct WriteStatus {
    /// The number of bytes persisted by the service.
    pub persisted_size: u64,
    /// The finalized object, if the upload is complete.
    pub resource: Option<Box<Object>>,
}

impl WriteStatus {
    /// Creates a status for an upload in progress.
    pub fn persisted(size: u64) -> Self {
        Self {
            persisted_size: size,
            resource: None,
        }
    }

    /// Creates a status for a finalized upload.
    pub fn finalized(object: Object) -> Self {
        Self {
            persisted_size: object.size.max(0) as u64,
            resource: Some(Box::new(object)),
        }
    }

    /// Returns `true` if the object is finalized.
    pub fn complete(&self) -> bool {
        self.resource.is_some()
    }

    /// The number of bytes committed by the service.
    pub fn committed_size(&self) -> u64 {
        self.persisted_size
    }
}

fn persisted_size(size: i64) -> Result<u64> {
    u64::try_from(size).map_err(|_| Error::deser(format!("negative persisted size: {size}")))
}

impl TryFrom<WriteObjectResponse> for WriteStatus {
    type Error = Error;

    fn try_from(value: WriteObjectResponse) -> Result<Self> {
        use crate::model::write_object_response::WriteStatus as Status;
        match value.write_status {
            Some(Status::PersistedSize(size)) => Ok(Self::persisted(persisted_size(size)?)),
            Some(Status::Resource(object)) => {
                persisted_size(object.size)?;
                Ok(Self::finalized(object))
            }
            None => Err(Error::deser("the WriteObject response has no status")),
        }
    }
}

impl TryFrom<QueryWriteStatusResponse> for WriteStatus {
    type Error = Error;

    fn try_from(value: QueryWriteStatusResponse) -> Result<Self> {
        use crate::model::query_write_status_response::WriteStatus as Status;
        match value.write_status {
            Some(Status::PersistedSize(size)) => Ok(Self::persisted(persisted_size(size)?)),
            Some(Status::Resource(object)) => {
                persisted_size(object.size)?;
                Ok(Self::finalized(object))
            }
            None => Err(Error::deser("the QueryWriteStatus response has no status")),
        }
    }
}

/// A contiguous range of the object data.
///
/// The chunk computes the CRC32C checksum of its data when created.
///
/// # Example
/// ```
/// # use google_cloud_storage_resumable::session::Chunk;
/// let chunk = Chunk::new(0, bytes::Bytes::from_static(b"hello")).set_final(true);
/// assert_eq!(chunk.end(), 5);
/// assert_eq!(chunk.crc32c(), crc32c::crc32c(b"hello"));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Chunk {
    offset: u64,
    data: bytes::Bytes,
    is_final: bool,
    crc32c: u32,
}

impl Chunk {
    /// Creates a non-final chunk starting at `offset`.
    pub fn new<T: Into<bytes::Bytes>>(offset: u64, data: T) -> Self {
        let data = data.into();
        let crc32c = crc32c::crc32c(&data);
        Self {
            offset,
            data,
            is_final: false,
            crc32c,
        }
    }

    /// Marks the chunk as the last one in the object.
    pub fn set_final(mut self, v: bool) -> Self {
        self.is_final = v;
        self
    }

    /// The starting offset of the chunk within the object.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// The offset one past the last byte in the chunk.
    pub fn end(&self) -> u64 {
        self.offset + self.data.len() as u64
    }

    pub fn data(&self) -> &bytes::Bytes {
        &self.data
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }

    /// The CRC32C checksum of the chunk data.
    pub fn crc32c(&self) -> u32 {
        self.crc32c
    }

    /// Returns `len() == 0`.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// The suffix of the chunk starting at `offset`, with its own checksum.
    pub(crate) fn tail(&self, offset: u64) -> Self {
        if offset <= self.offset {
            return self.clone();
        }
        let skip = std::cmp::min((offset - self.offset) as usize, self.data.len());
        Self::new(self.offset + skip as u64, self.data.slice(skip..)).set_final(self.is_final)
    }
}

/// The information needed to resume an upload from a different process.
///
/// Applications that need to resume uploads after a crash should save this
/// token before sending any data.
///
/// # Example
/// ```
/// # use google_cloud_storage_resumable::session::ResumeToken;
/// let token = ResumeToken::new("abc");
/// let saved = serde_json::to_string(&token)?;
/// let restored: ResumeToken = serde_json::from_str(&saved)?;
/// assert_eq!(restored, token);
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct ResumeToken {
    /// The upload id returned by the service.
    pub upload_id: String,
    /// The bucket name, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    /// The object name, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    /// The expected object size, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_size: Option<u64>,
}

impl ResumeToken {
    pub fn new<T: Into<String>>(upload_id: T) -> Self {
        Self {
            upload_id: upload_id.into(),
            ..Default::default()
        }
    }
}

/// A resumable upload session.
#[derive(Debug)]
pub struct UploadSession {
    upload_id: String,
    destination: Option<Destination>,
    total_size: Option<u64>,
    committed_offset: u64,
    state: SessionState,
    object: Option<Box<Object>>,
    checksum: Checksum,
}

impl UploadSession {
    pub(crate) fn new(
        upload_id: String,
        destination: Option<Destination>,
        total_size: Option<u64>,
        checksum: Checksum,
    ) -> Self {
        Self {
            upload_id,
            destination,
            total_size,
            committed_offset: 0,
            state: SessionState::Created,
            object: None,
            checksum,
        }
    }

    /// The upload id issued by the service.
    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    /// The destination, if known.
    ///
    /// Sessions resumed from a bare upload id do not know their destination.
    pub fn destination(&self) -> Option<&Destination> {
        self.destination.as_ref()
    }

    /// The expected size of the object, if known.
    pub fn total_size(&self) -> Option<u64> {
        self.total_size
    }

    /// The number of bytes the service has durably persisted.
    pub fn committed_offset(&self) -> u64 {
        self.committed_offset
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_finalized(&self) -> bool {
        self.state == SessionState::Finalized
    }

    /// The finalized object, if available.
    pub fn object(&self) -> Option<&Object> {
        self.object.as_deref()
    }

    /// A token to resume this upload later.
    pub fn resume_token(&self) -> ResumeToken {
        ResumeToken {
            upload_id: self.upload_id.clone(),
            bucket: self.destination.as_ref().map(|d| d.bucket.clone()),
            object: self.destination.as_ref().map(|d| d.object.clone()),
            total_size: self.total_size,
        }
    }

    pub(crate) fn bucket(&self) -> Option<&str> {
        self.destination.as_ref().map(|d| d.bucket())
    }

    pub(crate) fn checksum(&self) -> &Checksum {
        &self.checksum
    }

    pub(crate) fn checksum_mut(&mut self) -> &mut Checksum {
        &mut self.checksum
    }

    /// Rejects operations on sessions that accept no more data.
    pub(crate) fn check_writable(&self, operation: &'static str) -> Result<()> {
        if self.state.is_terminal() {
            return Err(SessionError::InvalidState {
                state: self.state,
                operation,
            }
            .into());
        }
        Ok(())
    }

    /// Records a new persisted size. The caller validates monotonicity.
    pub(crate) fn advance(&mut self, persisted: u64) {
        debug_assert!(persisted >= self.committed_offset);
        self.committed_offset = persisted;
        if self.state == SessionState::Created && persisted > 0 {
            self.state = SessionState::Active;
        }
    }

    pub(crate) fn set_finalized(&mut self, object: Box<Object>) {
        self.committed_offset = std::cmp::max(self.committed_offset, object.size.max(0) as u64);
        self.state = SessionState::Finalized;
        self.object = Some(object);
    }

    pub(crate) fn set_cancelled(&mut self) {
        self.state = SessionState::Cancelled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorExt;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    static_assertions::assert_impl_all!(UploadSession: Send, Sync);
    static_assertions::assert_impl_all!(Chunk: Send, Sync, Clone);

    fn session() -> UploadSession {
        UploadSession::new(
            "abc".to_string(),
            Some(Destination::new("my-bucket", "my-object")),
            Some(100),
            Checksum::default(),
        )
    }

    #[test_case(SessionState::Created, "CREATED")]
    #[test_case(SessionState::Active, "ACTIVE")]
    #[test_case(SessionState::Finalized, "FINALIZED")]
    #[test_case(SessionState::Cancelled, "CANCELLED")]
    fn state_display(state: SessionState, want: &str) {
        assert_eq!(state.to_string(), want);
    }

    #[test_case("my-bucket", "projects/_/buckets/my-bucket")]
    #[test_case("projects/_/buckets/my-bucket", "projects/_/buckets/my-bucket")]
    fn destination_bucket(input: &str, want: &str) {
        let destination = Destination::new(input, "my-object");
        assert_eq!(destination.bucket(), want);
        assert!(destination.validate().is_ok(), "{destination:?}");
    }

    #[test_case("projects/p/buckets/b", "o")]
    #[test_case("projects/_/buckets/", "o")]
    #[test_case("my-bucket", "")]
    fn destination_invalid(bucket: &str, object: &str) {
        let destination = Destination::new(bucket, object);
        let err = destination.validate().unwrap_err();
        assert!(err.is_binding(), "{err:?}");
    }

    #[test]
    fn destination_spec() {
        let destination = Destination::new("my-bucket", "my-object")
            .set_content_type("text/plain")
            .set_metadata([("k", "v")])
            .set_if_generation_match(0);
        let spec = destination.to_spec(Some(1024));
        assert_eq!(spec.object_size, Some(1024));
        assert_eq!(spec.if_generation_match, Some(0));
        let resource = spec.resource.unwrap();
        assert_eq!(resource.bucket, "projects/_/buckets/my-bucket");
        assert_eq!(resource.name, "my-object");
        assert_eq!(resource.content_type, "text/plain");
        assert_eq!(resource.metadata.get("k").map(String::as_str), Some("v"));

        let spec = Destination::new("my-bucket", "my-object").to_spec(None);
        assert_eq!(spec.object_size, None);
        assert_eq!(spec.if_generation_match, None);
    }

    #[test]
    fn chunk_tail() {
        let chunk = Chunk::new(100, bytes::Bytes::from_static(b"0123456789")).set_final(true);
        assert_eq!(chunk.tail(50), chunk);
        assert_eq!(chunk.tail(100), chunk);
        let tail = chunk.tail(104);
        assert_eq!(tail.offset(), 104);
        assert_eq!(tail.data().as_ref(), b"456789");
        assert_eq!(tail.crc32c(), crc32c::crc32c(b"456789"));
        assert!(tail.is_final());
        let tail = chunk.tail(110);
        assert!(tail.is_empty(), "{tail:?}");
        assert_eq!(tail.offset(), 110);
    }

    #[test]
    fn lifecycle() {
        let mut session = session();
        assert_eq!(session.state(), SessionState::Created);
        session.advance(0);
        assert_eq!(session.state(), SessionState::Created);
        session.advance(50);
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.committed_offset(), 50);
        assert!(session.check_writable("send").is_ok());

        session.set_finalized(Box::new(Object::default().set_size(100)));
        assert!(session.is_finalized());
        assert_eq!(session.committed_offset(), 100);
        let err = session.check_writable("send").unwrap_err();
        assert!(err.is_invalid_state(), "{err:?}");
    }

    #[test]
    fn cancelled() {
        let mut session = session();
        session.set_cancelled();
        let err = session.check_writable("finalize").unwrap_err();
        assert!(err.is_invalid_state(), "{err:?}");
        let msg = err.session_error().map(|e| e.to_string());
        assert!(msg.as_ref().is_some_and(|m| m.contains("CANCELLED")), "{err:?}");
    }

    #[test]
    fn resume_token() -> anyhow::Result<()> {
        let token = session().resume_token();
        assert_eq!(
            token,
            ResumeToken {
                upload_id: "abc".to_string(),
                bucket: Some("projects/_/buckets/my-bucket".to_string()),
                object: Some("my-object".to_string()),
                total_size: Some(100),
            }
        );
        let json = serde_json::to_value(&token)?;
        assert_eq!(
            json,
            serde_json::json!({
                "uploadId": "abc",
                "bucket": "projects/_/buckets/my-bucket",
                "object": "my-object",
                "totalSize": 100,
            })
        );
        let minimal: ResumeToken = serde_json::from_value(serde_json::json!({"uploadId": "xyz"}))?;
        assert_eq!(minimal, ResumeToken::new("xyz"));
        Ok(())
    }

    #[test]
    fn write_status() {
        let status = WriteStatus::persisted(100);
        assert!(!status.complete());
        assert_eq!(status.committed_size(), 100);
        let status = WriteStatus::finalized(Object::default().set_size(200));
        assert!(status.complete());
        assert_eq!(status.committed_size(), 200);
    }

    #[test]
    fn write_status_from_responses() -> anyhow::Result<()> {
        use crate::testing;
        let got = WriteStatus::try_from(testing::write_persisted(1024))?;
        assert_eq!(got, WriteStatus::persisted(1024));
        let object = Object::default().set_size(2048);
        let got = WriteStatus::try_from(testing::query_finalized(object.clone()))?;
        assert_eq!(got, WriteStatus::finalized(object));

        let err = WriteStatus::try_from(WriteObjectResponse::default()).unwrap_err();
        assert!(err.is_deserialization(), "{err:?}");
        let err = WriteStatus::try_from(QueryWriteStatusResponse::default()).unwrap_err();
        assert!(err.is_deserialization(), "{err:?}");
        let bad = WriteObjectResponse {
            write_status: Some(crate::model::write_object_response::WriteStatus::PersistedSize(-1)),
        };
        let err = WriteStatus::try_from(bad).unwrap_err();
        assert!(err.is_deserialization(), "{err:?}");
        Ok(())
    }
}
