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

use crate::model::{ChecksummedData, ObjectChecksums, WriteObjectRequest, write_object_request};
use crate::session::Chunk;

/// Splits a chunk into the messages of a single `WriteObject` stream.
///
/// Each message carries at most `max_message_size` bytes. Only the first
/// message carries the upload id. If the chunk is final, the last message
/// carries `finish_write` and the full object checksums, if any.
#[derive(Debug)]
pub struct Segmenter<'a> {
    upload_id: &'a str,
    max_message_size: usize,
    crc32c: bool,
}

impl<'a> Segmenter<'a> {
    pub fn new(upload_id: &'a str, max_message_size: usize, crc32c: bool) -> Self {
        Self {
            upload_id,
            max_message_size: std::cmp::max(max_message_size, 1),
            crc32c,
        }
    }

    pub fn segment(
        &self,
        chunk: &Chunk,
        object_checksums: Option<ObjectChecksums>,
    ) -> Vec<WriteObjectRequest> {
        let data = chunk.data();
        let mut messages: Vec<WriteObjectRequest> = (0..data.len())
            .step_by(self.max_message_size)
            .map(|start| {
                let end = std::cmp::min(start + self.max_message_size, data.len());
                let content = data.slice(start..end);
                let crc32c = match (self.crc32c, content.len() == data.len()) {
                    (false, _) => None,
                    (true, true) => Some(chunk.crc32c()),
                    (true, false) => Some(crc32c::crc32c(&content)),
                };
                WriteObjectRequest {
                    write_offset: (chunk.offset() + start as u64) as i64,
                    data: Some(write_object_request::Data::ChecksummedData(
                        ChecksummedData { content, crc32c },
                    )),
                    ..Default::default()
                }
            })
            .collect();
        if messages.is_empty() {
            messages.push(WriteObjectRequest {
                write_offset: chunk.offset() as i64,
                ..Default::default()
            });
        }
        if let Some(first) = messages.first_mut() {
            first.first_message = Some(write_object_request::FirstMessage::UploadId(
                self.upload_id.to_string(),
            ));
        }
        if chunk.is_final() {
            if let Some(last) = messages.last_mut() {
                last.finish_write = true;
                last.object_checksums = object_checksums;
            }
        }
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn content(m: &WriteObjectRequest) -> Option<&ChecksummedData> {
        match &m.data {
            Some(write_object_request::Data::ChecksummedData(d)) => Some(d),
            None => None,
        }
    }

    fn upload_id(m: &WriteObjectRequest) -> Option<&str> {
        match &m.first_message {
            Some(write_object_request::FirstMessage::UploadId(id)) => Some(id.as_str()),
            _ => None,
        }
    }

    #[test_case(10, 3, 4)]
    #[test_case(10, 5, 2)]
    #[test_case(10, 10, 1)]
    #[test_case(10, 100, 1)]
    #[test_case(1, 1, 1)]
    fn sizes(len: usize, max: usize, want: usize) {
        let data = bytes::Bytes::from_owner(Vec::from_iter((0..len).map(|i| i as u8)));
        let chunk = Chunk::new(1000, data.clone());
        let messages = Segmenter::new("abc", max, true).segment(&chunk, None);
        assert_eq!(messages.len(), want);

        let mut offset = 1000_i64;
        let mut collected = Vec::new();
        for (i, m) in messages.iter().enumerate() {
            assert_eq!(m.write_offset, offset);
            let d = content(m).expect("every message has data");
            assert!(d.content.len() <= max, "{m:?}");
            assert_eq!(d.crc32c, Some(crc32c::crc32c(&d.content)));
            assert_eq!(upload_id(m), (i == 0).then_some("abc"));
            assert!(!m.finish_write, "{m:?}");
            offset += d.content.len() as i64;
            collected.extend_from_slice(&d.content);
        }
        assert_eq!(collected, data.to_vec());
    }

    #[test]
    fn final_chunk() {
        let chunk = Chunk::new(0, bytes::Bytes::from_static(b"0123456789")).set_final(true);
        let checksums = ObjectChecksums::new().set_crc32c(crc32c::crc32c(b"0123456789"));
        let messages = Segmenter::new("abc", 4, true).segment(&chunk, Some(checksums.clone()));
        assert_eq!(messages.len(), 3);
        let (last, rest) = messages.split_last().unwrap();
        assert!(last.finish_write, "{last:?}");
        assert_eq!(last.object_checksums, Some(checksums));
        for m in rest {
            assert!(!m.finish_write, "{m:?}");
            assert!(m.object_checksums.is_none(), "{m:?}");
        }
    }

    #[test]
    fn empty_final_chunk() {
        let chunk = Chunk::new(100, bytes::Bytes::new()).set_final(true);
        let messages = Segmenter::new("abc", 4, true).segment(&chunk, None);
        assert_eq!(
            messages,
            vec![WriteObjectRequest {
                write_offset: 100,
                finish_write: true,
                first_message: Some(write_object_request::FirstMessage::UploadId(
                    "abc".to_string()
                )),
                ..Default::default()
            }]
        );
    }

    #[test]
    fn without_crc32c() {
        let chunk = Chunk::new(0, bytes::Bytes::from_static(b"0123456789"));
        let messages = Segmenter::new("abc", 4, false).segment(&chunk, None);
        assert!(
            messages
                .iter()
                .all(|m| content(m).is_some_and(|d| d.crc32c.is_none())),
            "{messages:?}"
        );
    }

    #[test]
    fn zero_max_size() {
        let chunk = Chunk::new(0, bytes::Bytes::from_static(b"012"));
        let messages = Segmenter::new("abc", 0, true).segment(&chunk, None);
        assert_eq!(messages.len(), 3);
    }
}
