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

use super::checksum::Checksum;
use super::chunk_sender::ChunkSender;
use super::reconciler::Reconciler;
use super::{invoke, with_session};
use crate::Result;
use crate::error::Error;
use crate::method::{CancelResumableWrite, StartResumableWrite};
use crate::model::{CancelResumableWriteRequest, Object, StartResumableWriteRequest};
use crate::options::UploadOptions;
use crate::session::{Chunk, Destination, ResumeToken, UploadSession};
use crate::stub::Storage;

/// Creates, resumes, finalizes, and cancels upload sessions.
#[derive(Debug)]
pub struct SessionManager<'a, S> {
    stub: &'a S,
    options: &'a UploadOptions,
}

impl<'a, S> SessionManager<'a, S>
where
    S: Storage,
{
    pub fn new(stub: &'a S, options: &'a UploadOptions) -> Self {
        Self { stub, options }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn start(
        &self,
        destination: Destination,
        total_size: Option<u64>,
    ) -> Result<UploadSession> {
        destination.validate()?;
        let request = StartResumableWriteRequest {
            write_object_spec: Some(destination.to_spec(total_size)),
            ..Default::default()
        };
        let response = invoke::<StartResumableWrite, _, _>(self.options, async |remaining| {
            let options = self
                .options
                .request_options(Some(destination.bucket()), remaining);
            self.stub
                .start_resumable_write(request.clone(), options)
                .await
        })
        .await?;
        if response.upload_id.is_empty() {
            return Err(Error::deser("the service returned an empty upload id"));
        }
        tracing::debug!(upload_id = response.upload_id.as_str(), "started upload");
        Ok(UploadSession::new(
            response.upload_id,
            Some(destination),
            total_size,
            self.checksum(),
        ))
    }

    /// Restores a session and reconciles it with the service.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn resume(&self, token: ResumeToken) -> Result<UploadSession> {
        if token.upload_id.is_empty() {
            return Err(Error::binding("the upload id cannot be empty"));
        }
        let destination = match (token.bucket, token.object) {
            (Some(bucket), Some(object)) => Some(Destination::new(bucket, object)),
            _ => None,
        };
        let mut session = UploadSession::new(
            token.upload_id,
            destination,
            token.total_size,
            self.checksum(),
        );
        Reconciler::new(self.stub, self.options)
            .reconcile(&mut session)
            .await?;
        Ok(session)
    }

    /// Finalizes the upload at the committed offset.
    #[tracing::instrument(level = "debug", skip_all, fields(upload_id = session.upload_id()))]
    pub async fn finalize(&self, session: &mut UploadSession) -> Result<Object> {
        session.check_writable("finalize")?;
        let chunk = Chunk::new(session.committed_offset(), bytes::Bytes::new()).set_final(true);
        ChunkSender::new(self.stub, self.options)
            .send_chunk(session, chunk)
            .await?;
        if !session.is_finalized() {
            Reconciler::new(self.stub, self.options)
                .reconcile(session)
                .await?;
        }
        session.object().cloned().ok_or_else(|| {
            Error::deser(format!(
                "the service did not finalize the upload at offset {}",
                session.committed_offset()
            ))
        })
    }

    #[tracing::instrument(level = "debug", skip_all, fields(upload_id = session.upload_id()))]
    pub async fn cancel(&self, session: &mut UploadSession) -> Result<()> {
        session.check_writable("cancel")?;
        let request = CancelResumableWriteRequest {
            upload_id: session.upload_id().to_string(),
        };
        invoke::<CancelResumableWrite, _, _>(self.options, async |remaining| {
            let options = self.options.request_options(session.bucket(), remaining);
            self.stub
                .cancel_resumable_write(request.clone(), options)
                .await
        })
        .await
        .map_err(|e| with_session(session, e))?;
        session.set_cancelled();
        Ok(())
    }

    fn checksum(&self) -> Checksum {
        Checksum::new(self.options.crc32c, self.options.md5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorExt;
    use crate::error::rpc::Code;
    use crate::model::{CancelResumableWriteResponse, ObjectChecksums};
    use crate::options::test_helpers::test_options;
    use crate::session::SessionState;
    use crate::testing::{self, FakeStorage, Request, status_error};
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn options() -> UploadOptions {
        test_options()
    }

    fn destination() -> Destination {
        Destination::new("my-bucket", "my-object").set_content_type("text/plain")
    }

    #[tokio::test]
    async fn start() -> anyhow::Result<()> {
        let fake = FakeStorage::new();
        fake.push_start_resumable_write(Err(status_error(Code::Unavailable)))
            .push_start_resumable_write(Ok(testing::upload_id("abc")));
        let options = options();
        let session = SessionManager::new(&fake, &options)
            .start(destination(), Some(1024))
            .await?;
        assert_eq!(session.upload_id(), "abc");
        assert_eq!(session.state(), SessionState::Created);
        assert_eq!(session.committed_offset(), 0);
        assert_eq!(session.total_size(), Some(1024));
        assert_eq!(session.destination(), Some(&destination()));

        let requests = fake.requests();
        assert_eq!(requests.len(), 2);
        let Request::StartResumableWrite(request, options) = &requests[1] else {
            panic!("unexpected request {:?}", requests[1]);
        };
        assert_eq!(request.write_object_spec, Some(destination().to_spec(Some(1024))));
        assert_eq!(options.bucket.as_deref(), Some("projects/_/buckets/my-bucket"));
        Ok(())
    }

    #[tokio::test]
    async fn start_invalid_destination() {
        let fake = FakeStorage::new();
        let options = options();
        let err = SessionManager::new(&fake, &options)
            .start(Destination::new("my-bucket", ""), None)
            .await
            .unwrap_err();
        assert!(err.is_binding(), "{err:?}");
        assert!(fake.requests().is_empty());
    }

    #[test_case(Code::InvalidArgument)]
    #[test_case(Code::PermissionDenied)]
    #[test_case(Code::NotFound)]
    #[tokio::test]
    async fn start_permanent(code: Code) {
        let fake = FakeStorage::new();
        fake.push_start_resumable_write(Err(status_error(code)));
        let options = options();
        let err = SessionManager::new(&fake, &options)
            .start(destination(), None)
            .await
            .unwrap_err();
        assert_eq!(err.status().map(|s| s.code), Some(code));
        assert_eq!(fake.requests().len(), 1);
    }

    #[tokio::test]
    async fn start_empty_upload_id() {
        let fake = FakeStorage::new();
        fake.push_start_resumable_write(Ok(testing::upload_id("")));
        let options = options();
        let err = SessionManager::new(&fake, &options)
            .start(destination(), None)
            .await
            .unwrap_err();
        assert!(err.is_deserialization(), "{err:?}");
    }

    #[tokio::test]
    async fn resume() -> anyhow::Result<()> {
        let fake = FakeStorage::new();
        fake.push_query_write_status(Ok(testing::query_persisted(4096)));
        let options = options();
        let token = ResumeToken {
            bucket: Some("projects/_/buckets/my-bucket".to_string()),
            object: Some("my-object".to_string()),
            total_size: Some(8192),
            ..ResumeToken::new("abc")
        };
        let session = SessionManager::new(&fake, &options)
            .resume(token.clone())
            .await?;
        assert_eq!(session.committed_offset(), 4096);
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.resume_token(), token);
        assert_eq!(fake.requests()[0].method(), "QueryWriteStatus");
        Ok(())
    }

    #[tokio::test]
    async fn resume_empty() -> anyhow::Result<()> {
        let fake = FakeStorage::new();
        fake.push_query_write_status(Ok(testing::query_persisted(0)));
        let options = options();
        let session = SessionManager::new(&fake, &options)
            .resume(ResumeToken::new("abc"))
            .await?;
        assert_eq!(session.state(), SessionState::Created);
        assert!(session.destination().is_none(), "{session:?}");
        Ok(())
    }

    #[tokio::test]
    async fn resume_complete() -> anyhow::Result<()> {
        let object = Object::default().set_name("my-object").set_size(100);
        let fake = FakeStorage::new();
        fake.push_query_write_status(Ok(testing::query_finalized(object.clone())));
        let options = options();
        let session = SessionManager::new(&fake, &options)
            .resume(ResumeToken::new("abc"))
            .await?;
        assert!(session.is_finalized(), "{session:?}");
        assert_eq!(session.object(), Some(&object));
        Ok(())
    }

    #[tokio::test]
    async fn resume_not_found() {
        let fake = FakeStorage::new();
        fake.push_query_write_status(Err(status_error(Code::NotFound)));
        let options = options();
        let err = SessionManager::new(&fake, &options)
            .resume(ResumeToken::new("abc"))
            .await
            .unwrap_err();
        assert_eq!(err.status().map(|s| s.code), Some(Code::NotFound));
    }

    #[tokio::test]
    async fn resume_empty_upload_id() {
        let fake = FakeStorage::new();
        let options = options();
        let err = SessionManager::new(&fake, &options)
            .resume(ResumeToken::new(""))
            .await
            .unwrap_err();
        assert!(err.is_binding(), "{err:?}");
        assert!(fake.requests().is_empty());
    }

    #[tokio::test]
    async fn finalize() -> anyhow::Result<()> {
        let object = Object::default()
            .set_name("my-object")
            .set_size(0)
            .set_checksums(ObjectChecksums::new().set_crc32c(crc32c::crc32c(b"")));
        let fake = FakeStorage::new();
        fake.push_start_resumable_write(Ok(testing::upload_id("abc")))
            .push_write_object(Ok(testing::write_finalized(object.clone())));
        let options = options();
        let manager = SessionManager::new(&fake, &options);
        let mut session = manager.start(destination(), None).await?;
        let got = manager.finalize(&mut session).await?;
        assert_eq!(got, object);
        assert!(session.is_finalized(), "{session:?}");

        let writes = fake.write_requests();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].len(), 1);
        assert!(writes[0][0].finish_write, "{writes:?}");
        assert!(writes[0][0].data.is_none(), "{writes:?}");

        let err = manager.finalize(&mut session).await.unwrap_err();
        assert!(err.is_invalid_state(), "{err:?}");
        assert_eq!(fake.requests().len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn finalize_needs_query() -> anyhow::Result<()> {
        let object = Object::default().set_name("my-object").set_size(0);
        let fake = FakeStorage::new();
        fake.push_write_object(Ok(testing::write_persisted(0)))
            .push_query_write_status(Ok(testing::query_finalized(object.clone())));
        let options = options();
        let mut session = UploadSession::new("abc".to_string(), None, None, Checksum::default());
        let got = SessionManager::new(&fake, &options)
            .finalize(&mut session)
            .await?;
        assert_eq!(got, object);
        Ok(())
    }

    #[tokio::test]
    async fn finalize_not_complete() {
        let fake = FakeStorage::new();
        fake.push_write_object(Ok(testing::write_persisted(0)))
            .push_query_write_status(Ok(testing::query_persisted(0)));
        let options = options();
        let mut session = UploadSession::new("abc".to_string(), None, None, Checksum::default());
        let err = SessionManager::new(&fake, &options)
            .finalize(&mut session)
            .await
            .unwrap_err();
        assert!(err.is_deserialization(), "{err:?}");
        assert!(!session.is_finalized(), "{session:?}");
    }

    #[tokio::test]
    async fn cancel() -> anyhow::Result<()> {
        let fake = FakeStorage::new();
        fake.push_cancel_resumable_write(Ok(CancelResumableWriteResponse {}));
        let options = options();
        let manager = SessionManager::new(&fake, &options);
        let mut session = UploadSession::new("abc".to_string(), None, None, Checksum::default());
        manager.cancel(&mut session).await?;
        assert_eq!(session.state(), SessionState::Cancelled);

        let err = manager.cancel(&mut session).await.unwrap_err();
        assert!(err.is_invalid_state(), "{err:?}");
        let err = manager.finalize(&mut session).await.unwrap_err();
        assert!(err.is_invalid_state(), "{err:?}");
        assert_eq!(fake.requests().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn cancel_error() {
        let fake = FakeStorage::new();
        fake.push_cancel_resumable_write(Err(status_error(Code::PermissionDenied)));
        let options = options();
        let mut session = UploadSession::new("abc".to_string(), None, None, Checksum::default());
        let err = SessionManager::new(&fake, &options)
            .cancel(&mut session)
            .await
            .unwrap_err();
        assert_eq!(err.status().map(|s| s.code), Some(Code::PermissionDenied));
        assert_eq!(session.state(), SessionState::Created);
    }
}
