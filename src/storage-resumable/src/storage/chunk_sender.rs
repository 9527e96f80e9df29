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

use super::checksum::validate;
use super::reconciler::Reconciler;
use super::segmenter::Segmenter;
use super::{invoke, with_session};
use crate::Result;
use crate::error::{Error, SessionError, WriteError};
use crate::method::WriteObject;
use crate::options::UploadOptions;
use crate::session::{Chunk, UploadSession, WriteStatus};
use crate::stub::Storage;
use std::time::Duration;

/// Sends chunks of data for a resumable upload.
///
/// Each call to [send_chunk][ChunkSender::send_chunk] sends one chunk, in
/// one or more `WriteObject` streams. Failed attempts are retried after
/// querying the service, and only the bytes not persisted are sent again.
#[derive(Debug)]
pub struct ChunkSender<'a, S> {
    stub: &'a S,
    options: &'a UploadOptions,
}

impl<'a, S> ChunkSender<'a, S>
where
    S: Storage,
{
    pub fn new(stub: &'a S, options: &'a UploadOptions) -> Self {
        Self { stub, options }
    }

    /// Sends `chunk` and returns the new committed offset.
    ///
    /// The chunk must start at the committed offset. The result may be
    /// smaller than `chunk.end()` if the service persisted only part of the
    /// data. The caller continues from the returned offset.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(
            upload_id = session.upload_id(),
            offset = chunk.offset(),
            len = chunk.len(),
            is_final = chunk.is_final()
        )
    )]
    pub async fn send_chunk(&self, session: &mut UploadSession, chunk: Chunk) -> Result<u64> {
        session.check_writable("send a chunk to")?;
        let committed = session.committed_offset();
        if chunk.offset() < committed {
            return Err(SessionError::OffsetRegression {
                offset: chunk.offset(),
                committed,
            }
            .into());
        }
        if chunk.offset() > committed {
            return Err(Error::binding(format!(
                "the chunk starts at offset {}, past the committed offset {committed}",
                chunk.offset()
            )));
        }
        if chunk.is_empty() && !chunk.is_final() {
            return Ok(committed);
        }
        session.checksum_mut().update(chunk.offset(), chunk.data());

        let mut reconcile = false;
        let result = invoke::<WriteObject, _, _>(self.options, async |remaining| {
            let reconcile = std::mem::replace(&mut reconcile, true);
            self.attempt(session, &chunk, reconcile, remaining).await
        })
        .await;
        result.map_err(|e| with_session(session, e))
    }

    async fn attempt(
        &self,
        session: &mut UploadSession,
        chunk: &Chunk,
        reconcile: bool,
        remaining_time: Option<Duration>,
    ) -> Result<u64> {
        if reconcile {
            let status = Reconciler::new(self.stub, self.options)
                .query_attempt(session, remaining_time)
                .await?;
            if apply(session, chunk, status)? {
                return Ok(session.committed_offset());
            }
        }

        let tail = chunk.tail(session.committed_offset());
        let checksum = session.checksum();
        let object_checksums = (tail.is_final()
            && (self.options.crc32c || self.options.md5)
            && checksum.offset() == chunk.end())
        .then(|| checksum.finalize());
        let messages = Segmenter::new(
            session.upload_id(),
            self.options.max_message_size(),
            self.options.crc32c,
        )
        .segment(&tail, object_checksums);
        tracing::debug!(
            offset = tail.offset(),
            len = tail.len(),
            messages = messages.len(),
            "sending chunk"
        );

        let options = self
            .options
            .request_options(session.bucket(), remaining_time);
        let response = self.stub.write_object(messages, options).await?;
        let status = WriteStatus::try_from(response)?;
        tracing::debug!(
            persisted_size = status.persisted_size,
            complete = status.complete(),
            "chunk sent"
        );
        apply(session, chunk, status)?;
        Ok(session.committed_offset())
    }
}

/// Applies the service status after (or while) sending `chunk`.
///
/// Returns `true` if no more data from `chunk` needs to be sent.
fn apply(session: &mut UploadSession, chunk: &Chunk, status: WriteStatus) -> Result<bool> {
    let offset = session.committed_offset();
    let persisted = status.persisted_size;
    if persisted < offset {
        return Err(Error::deser(WriteError::UnexpectedRewind { offset, persisted }));
    }
    let Some(object) = status.resource else {
        if persisted > chunk.end() {
            return Err(Error::deser(WriteError::TooMuchProgress {
                sent: chunk.end(),
                persisted,
            }));
        }
        session.advance(persisted);
        return Ok(!chunk.is_final() && persisted == chunk.end());
    };

    session.set_finalized(object.clone());
    if !chunk.is_final() {
        return Err(Error::deser(WriteError::UnexpectedFinalization {
            persisted,
            object,
        }));
    }
    if persisted != chunk.end() {
        return Err(Error::deser(WriteError::SizeMismatch {
            sent: chunk.end(),
            persisted,
            object,
        }));
    }
    // Resumed sessions have not seen every byte, their checksums are partial.
    let checksum = session.checksum();
    if checksum.offset() == chunk.end() {
        validate(&checksum.finalize(), &object.checksums).map_err(|mismatch| {
            Error::deser(WriteError::ChecksumMismatch {
                mismatch,
                object: object.clone(),
            })
        })?;
    }
    Ok(true)
}
