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
use super::session_manager::SessionManager;
use crate::Result;
use crate::error::Error;
use crate::model::Object;
use crate::options::UploadOptions;
use crate::session::{Chunk, Destination, UploadSession};
use crate::stub::Storage;
use bytes::{Bytes, BytesMut};
use google_cloud_storage::streaming_source::{Seek, StreamingSource};
use std::collections::VecDeque;

/// Uploads a complete payload, one chunk at a time.
#[derive(Debug)]
pub struct PerformUpload<'a, S> {
    stub: &'a S,
    options: &'a UploadOptions,
}

impl<'a, S> PerformUpload<'a, S>
where
    S: Storage,
{
    pub fn new(stub: &'a S, options: &'a UploadOptions) -> Self {
        Self { stub, options }
    }

    /// Starts a new upload and sends all the data in `payload`.
    pub async fn upload<P>(&self, destination: Destination, payload: P) -> Result<Object>
    where
        P: StreamingSource + Seek + Send,
    {
        let hint = payload.size_hint().await.map_err(Error::ser)?;
        let mut session = SessionManager::new(self.stub, self.options)
            .start(destination, hint.exact())
            .await?;
        self.upload_session(&mut session, payload).await
    }

    /// Sends the data in `payload` not yet persisted by `session`.
    ///
    /// The payload must contain the complete object, starting at offset 0.
    #[tracing::instrument(level = "debug", skip_all, fields(upload_id = session.upload_id()))]
    pub async fn upload_session<P>(
        &self,
        session: &mut UploadSession,
        mut payload: P,
    ) -> Result<Object>
    where
        P: StreamingSource + Seek + Send,
    {
        session.check_writable("upload to")?;
        let sender = ChunkSender::new(self.stub, self.options);
        let mut progress = InProgressUpload::new(self.options.chunk_size());
        progress.seek(&mut payload, session.committed_offset()).await?;
        loop {
            let chunk = progress.next_chunk(&mut payload).await?;
            let (end, is_final) = (chunk.end(), chunk.is_final());
            let committed = sender.send_chunk(session, chunk).await?;
            if let Some(object) = session.object() {
                return Ok(object.clone());
            }
            if committed != end {
                tracing::debug!(committed, end, "partial write, rewinding payload");
                progress.seek(&mut payload, committed).await?;
                continue;
            }
            if is_final {
                return SessionManager::new(self.stub, self.options)
                    .finalize(session)
                    .await;
            }
            progress.offset = committed;
        }
    }
}

/// Cuts a payload into chunks of a fixed size.
///
/// The payload may return buffers of any size. Data read past the end of a
/// chunk is kept for the next chunk.
#[derive(Debug)]
struct InProgressUpload {
    target_size: usize,
    offset: u64,
    remainder: VecDeque<Bytes>,
}

impl InProgressUpload {
    fn new(target_size: usize) -> Self {
        Self {
            target_size: std::cmp::max(target_size, 1),
            offset: 0,
            remainder: VecDeque::new(),
        }
    }

    async fn seek<P>(&mut self, payload: &mut P, offset: u64) -> Result<()>
    where
        P: Seek,
    {
        payload.seek(offset).await.map_err(Error::ser)?;
        self.remainder.clear();
        self.offset = offset;
        Ok(())
    }

    /// Reads the next chunk.
    ///
    /// The chunk is final if the payload has no more data.
    async fn next_chunk<P>(&mut self, payload: &mut P) -> Result<Chunk>
    where
        P: StreamingSource,
    {
        let mut buffer = BytesMut::with_capacity(self.target_size);
        while buffer.len() < self.target_size {
            let Some(mut b) = self.next_buffer(payload).await? else {
                return Ok(Chunk::new(self.offset, buffer.freeze()).set_final(true));
            };
            let want = self.target_size - buffer.len();
            if b.len() > want {
                self.remainder.push_front(b.split_off(want));
            }
            buffer.extend_from_slice(&b);
        }
        let is_final = match self.next_buffer(payload).await? {
            None => true,
            Some(b) => {
                self.remainder.push_front(b);
                false
            }
        };
        Ok(Chunk::new(self.offset, buffer.freeze()).set_final(is_final))
    }

    async fn next_buffer<P>(&mut self, payload: &mut P) -> Result<Option<Bytes>>
    where
        P: StreamingSource,
    {
        if let Some(b) = self.remainder.pop_front() {
            return Ok(Some(b));
        }
        while let Some(b) = payload.next().await.transpose().map_err(Error::ser)? {
            if !b.is_empty() {
                return Ok(Some(b));
            }
        }
        Ok(None)
    }
}
