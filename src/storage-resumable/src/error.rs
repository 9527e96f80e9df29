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

//! Errors returned by the resumable upload client.
//!
//! All operations return [Error], the error type shared by the Google Cloud
//! client libraries. The storage specific details are carried as the
//! [source][std::error::Error::source] of the error:
//!
//! * [SessionError] for local misuse of an upload session and for uploads that
//!   ran out of retry budget.
//! * [WriteError] when the service reports a state inconsistent with the data
//!   sent.
//!
//! The [ErrorExt] trait offers predicates to find these details.

pub use gax::error::Error;
pub use gax::error::rpc;

use crate::model::{Object, ObjectChecksums};
use crate::session::SessionState;
use std::error::Error as _;

/// Details about upload session errors.
///
/// # Example
/// ```
/// use google_cloud_storage_resumable::error::{Error, ErrorExt, SessionError};
/// fn handle(e: Error) {
///     match e.session_error() {
///         Some(SessionError::UploadFailed { upload_id, committed_offset, .. }) => {
///             println!("upload {upload_id} interrupted, {committed_offset} bytes are safe");
///         }
///         Some(details) => println!("cannot use the session: {details}"),
///         None => println!("some other error {e}"),
///     }
/// }
/// ```
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum SessionError {
    /// A chunk started before the committed offset of the session.
    ///
    /// # Troubleshooting
    ///
    /// This is a bug in the application. The bytes before the committed offset
    /// are already persisted by the service, reconcile the session and start
    /// the next chunk at [committed_offset][crate::session::UploadSession::committed_offset].
    #[error("the chunk starts at offset {offset}, before the committed offset {committed}")]
    OffsetRegression { offset: u64, committed: u64 },

    /// The operation is not valid for the current session state.
    ///
    /// Finalizing twice, or writing to a finalized or cancelled session, are
    /// the most common causes.
    #[error("cannot {operation} an upload session in the {state} state")]
    InvalidState {
        state: SessionState,
        operation: &'static str,
    },

    /// The upload stopped after exhausting its retry budget.
    ///
    /// The session remains valid in the service until it expires. Use
    /// `upload_id` with [Storage::resume][crate::client::Storage::resume] to
    /// continue the upload later.
    #[error("the upload {upload_id} failed with {committed_offset} bytes committed")]
    UploadFailed {
        upload_id: String,
        committed_offset: u64,
        #[source]
        source: Error,
    },
}

impl From<SessionError> for Error {
    fn from(value: SessionError) -> Self {
        match value {
            SessionError::UploadFailed { .. } => Error::exhausted(value),
            _ => Error::binding(value),
        }
    }
}

/// Find the storage specific details in an [Error].
///
/// # Example
/// ```
/// use google_cloud_storage_resumable::error::{Error, ErrorExt};
/// fn handle(e: Error) {
///     if let Some(offset) = e.committed_offset() {
///         println!("upload interrupted, {offset} bytes are safe in the service");
///     } else if let Some(status) = e.status() {
///         println!("service error {status:?}");
///     } else {
///         println!("some other error {e}");
///     }
/// }
/// ```
pub trait ErrorExt {
    /// The [SessionError] details, if any.
    fn session_error(&self) -> Option<&SessionError>;

    /// The [WriteError] details, if any.
    fn as_write_error(&self) -> Option<&WriteError>;

    /// A chunk started before the committed offset of the session.
    fn is_offset_regression(&self) -> bool {
        matches!(
            self.session_error(),
            Some(SessionError::OffsetRegression { .. })
        )
    }

    /// The operation is not valid for the current session state.
    fn is_invalid_state(&self) -> bool {
        matches!(self.session_error(), Some(SessionError::InvalidState { .. }))
    }

    /// The upload stopped after exhausting its retry budget.
    fn is_upload_failed(&self) -> bool {
        matches!(self.session_error(), Some(SessionError::UploadFailed { .. }))
    }

    /// The last committed offset known when the upload failed.
    fn committed_offset(&self) -> Option<u64> {
        match self.session_error() {
            Some(SessionError::UploadFailed {
                committed_offset, ..
            }) => Some(*committed_offset),
            _ => None,
        }
    }

    /// The upload session id, for uploads that can be resumed.
    fn upload_id(&self) -> Option<&str> {
        match self.session_error() {
            Some(SessionError::UploadFailed { upload_id, .. }) => Some(upload_id.as_str()),
            _ => None,
        }
    }
}

impl ErrorExt for Error {
    fn session_error(&self) -> Option<&SessionError> {
        self.source().and_then(|e| e.downcast_ref())
    }

    fn as_write_error(&self) -> Option<&WriteError> {
        self.source().and_then(|e| e.downcast_ref())
    }
}

/// The service reported a state that is inconsistent with the data sent.
///
/// These errors are never retried. They indicate a bug in the service, the
/// client library, or data corruption in transit.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum WriteError {
    /// The service reports fewer persisted bytes than it did before.
    #[error(
        "the service previously persisted {offset} bytes, but now reports only {persisted} as persisted"
    )]
    UnexpectedRewind { offset: u64, persisted: u64 },

    /// The service reports more persisted bytes than the client sent.
    #[error("the service reports {persisted} bytes as persisted, but we only sent {sent} bytes")]
    TooMuchProgress { sent: u64, persisted: u64 },

    /// The service finalized the object before the final chunk was sent.
    #[error("the service finalized the object with {persisted} bytes before the last chunk")]
    UnexpectedFinalization {
        persisted: u64,
        object: Box<Object>,
    },

    /// The finalized object size does not match the number of bytes sent.
    #[error("the object was finalized with {persisted} bytes, but we sent {sent} bytes")]
    SizeMismatch {
        sent: u64,
        persisted: u64,
        object: Box<Object>,
    },

    /// The checksums of the finalized object do not match the data sent.
    #[error("checksum mismatch {mismatch} when uploading {} to {}", .object.name, .object.bucket)]
    ChecksumMismatch {
        mismatch: ChecksumMismatch,
        object: Box<Object>,
    },
}

/// The checksums of the uploaded data differ from the values the service
/// computed for the finalized object.
///
/// `got` holds the values reported by the service, `want` the values computed
/// from the data sent.
#[derive(thiserror::Error, Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum ChecksumMismatch {
    /// Only the CRC32C checksums differ.
    #[error("CRC32C mismatch, got=0x{got:08x}, want=0x{want:08x}")]
    Crc32c { got: u32, want: u32 },

    /// Only the MD5 hashes differ.
    #[error("MD5 mismatch, got={}, want={}", md5_hex(.got), md5_hex(.want))]
    Md5 {
        got: bytes::Bytes,
        want: bytes::Bytes,
    },

    /// The CRC32C checksums and the MD5 hashes differ.
    #[error("CRC32C and MD5 mismatch, got={}, want={}", hex(.got), hex(.want))]
    Both {
        got: Box<ObjectChecksums>,
        want: Box<ObjectChecksums>,
    },
}

fn md5_hex(hash: &bytes::Bytes) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex(checksums: &ObjectChecksums) -> String {
    format!(
        "{{crc32c: 0x{:08x}, md5: {}}}",
        checksums.crc32c.unwrap_or_default(),
        md5_hex(&checksums.md5_hash)
    )
}
