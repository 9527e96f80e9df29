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

//! Messages for the resumable write RPCs in `google.storage.v2`.
//!
//! Only the subset of `google.storage.v2` used by resumable writes is defined
//! here. Field numbers match `google/storage/v2/storage.proto`.

use std::collections::HashMap;

/// An object.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Object {
    /// Immutable. The name of this object.
    #[prost(string, tag = "1")]
    pub name: String,
    /// Immutable. The name of the bucket containing this object, in
    /// `projects/_/buckets/{bucket}` format.
    #[prost(string, tag = "2")]
    pub bucket: String,
    /// The etag of the object.
    #[prost(string, tag = "27")]
    pub etag: String,
    /// Immutable. The content generation of this object.
    #[prost(int64, tag = "3")]
    pub generation: i64,
    /// The version of the metadata for this generation of this object.
    #[prost(int64, tag = "4")]
    pub metageneration: i64,
    /// Storage class of the object.
    #[prost(string, tag = "5")]
    pub storage_class: String,
    /// Content-Length of the object data in bytes.
    #[prost(int64, tag = "6")]
    pub size: i64,
    /// Content-Encoding of the object data.
    #[prost(string, tag = "7")]
    pub content_encoding: String,
    /// Content-Disposition of the object data.
    #[prost(string, tag = "8")]
    pub content_disposition: String,
    /// Cache-Control directive for the object data.
    #[prost(string, tag = "9")]
    pub cache_control: String,
    /// Content-Language of the object data.
    #[prost(string, tag = "11")]
    pub content_language: String,
    /// Content-Type of the object data.
    #[prost(string, tag = "13")]
    pub content_type: String,
    /// The creation time of the object.
    #[prost(message, optional, tag = "14")]
    pub create_time: Option<::prost_types::Timestamp>,
    /// The checksums of the complete object.
    #[prost(message, optional, tag = "16")]
    pub checksums: Option<ObjectChecksums>,
    /// The modification time of the object metadata.
    #[prost(message, optional, tag = "17")]
    pub update_time: Option<::prost_types::Timestamp>,
    /// User-provided metadata, in key/value pairs.
    #[prost(map = "string, string", tag = "22")]
    pub metadata: HashMap<String, String>,
}

impl Object {
    /// Sets the value of [name][Object::name].
    pub fn set_name<T: Into<String>>(mut self, v: T) -> Self {
        self.name = v.into();
        self
    }

    /// Sets the value of [bucket][Object::bucket].
    pub fn set_bucket<T: Into<String>>(mut self, v: T) -> Self {
        self.bucket = v.into();
        self
    }

    /// Sets the value of [generation][Object::generation].
    pub fn set_generation<T: Into<i64>>(mut self, v: T) -> Self {
        self.generation = v.into();
        self
    }

    /// Sets the value of [size][Object::size].
    pub fn set_size<T: Into<i64>>(mut self, v: T) -> Self {
        self.size = v.into();
        self
    }

    /// Sets the value of [content_type][Object::content_type].
    pub fn set_content_type<T: Into<String>>(mut self, v: T) -> Self {
        self.content_type = v.into();
        self
    }

    /// Sets the value of [checksums][Object::checksums].
    pub fn set_checksums<T: Into<ObjectChecksums>>(mut self, v: T) -> Self {
        self.checksums = Some(v.into());
        self
    }

    /// Sets the value of [metadata][Object::metadata].
    pub fn set_metadata<T, K, V>(mut self, v: T) -> Self
    where
        T: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.metadata = v.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }
}

/// Message used for storing full (not subrange) object checksums.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ObjectChecksums {
    /// CRC32C digest of the object data.
    #[prost(fixed32, optional, tag = "1")]
    pub crc32c: Option<u32>,
    /// 128 bit MD5 hash of the object data. Empty when not computed.
    #[prost(bytes = "bytes", tag = "2")]
    pub md5_hash: ::bytes::Bytes,
}

impl ObjectChecksums {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value of [crc32c][ObjectChecksums::crc32c].
    pub fn set_crc32c<T: Into<u32>>(mut self, v: T) -> Self {
        self.crc32c = Some(v.into());
        self
    }

    /// Sets the value of [md5_hash][ObjectChecksums::md5_hash].
    pub fn set_md5_hash<T: Into<::bytes::Bytes>>(mut self, v: T) -> Self {
        self.md5_hash = v.into();
        self
    }
}

/// Parameters that can be passed to any object request.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CommonObjectRequestParams {
    /// Encryption algorithm used with the Customer-Supplied Encryption Keys
    /// feature.
    #[prost(string, tag = "1")]
    pub encryption_algorithm: String,
    /// Encryption key used with the Customer-Supplied Encryption Keys feature.
    #[prost(bytes = "bytes", tag = "4")]
    pub encryption_key_bytes: ::bytes::Bytes,
    /// SHA256 hash of the encryption key.
    #[prost(bytes = "bytes", tag = "5")]
    pub encryption_key_sha256_bytes: ::bytes::Bytes,
}

/// Describes an attempt to insert an object, possibly over multiple requests.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WriteObjectSpec {
    /// Destination object, including its name and its metadata.
    #[prost(message, optional, tag = "1")]
    pub resource: Option<Object>,
    /// Apply a predefined set of access controls to this object.
    #[prost(string, tag = "7")]
    pub predefined_acl: String,
    /// Makes the operation conditional on the current generation.
    #[prost(int64, optional, tag = "3")]
    pub if_generation_match: Option<i64>,
    /// Makes the operation conditional on the current generation not matching.
    #[prost(int64, optional, tag = "4")]
    pub if_generation_not_match: Option<i64>,
    /// Makes the operation conditional on the current metageneration.
    #[prost(int64, optional, tag = "5")]
    pub if_metageneration_match: Option<i64>,
    /// Makes the operation conditional on the current metageneration not
    /// matching.
    #[prost(int64, optional, tag = "6")]
    pub if_metageneration_not_match: Option<i64>,
    /// The expected final object size, if known.
    ///
    /// The service fails the upload if the final size does not match.
    #[prost(int64, optional, tag = "8")]
    pub object_size: Option<i64>,
}

impl WriteObjectSpec {
    /// Sets the value of [resource][WriteObjectSpec::resource].
    pub fn set_resource<T: Into<Object>>(mut self, v: T) -> Self {
        self.resource = Some(v.into());
        self
    }

    /// Sets the value of [if_generation_match][WriteObjectSpec::if_generation_match].
    pub fn set_if_generation_match<T: Into<i64>>(mut self, v: T) -> Self {
        self.if_generation_match = Some(v.into());
        self
    }

    /// Sets or clears the value of [object_size][WriteObjectSpec::object_size].
    pub fn set_or_clear_object_size<T: Into<i64>>(mut self, v: Option<T>) -> Self {
        self.object_size = v.map(Into::into);
        self
    }
}

/// Request message for `StartResumableWrite`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StartResumableWriteRequest {
    /// The destination bucket, object, and metadata, as well as any
    /// preconditions.
    #[prost(message, optional, tag = "1")]
    pub write_object_spec: Option<WriteObjectSpec>,
    /// A set of parameters common to object requests.
    #[prost(message, optional, tag = "3")]
    pub common_object_request_params: Option<CommonObjectRequestParams>,
    /// The checksums of the complete object, if known in advance.
    #[prost(message, optional, tag = "5")]
    pub object_checksums: Option<ObjectChecksums>,
}

/// Response message for `StartResumableWrite`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StartResumableWriteResponse {
    /// The upload id of the new resumable write operation.
    #[prost(string, tag = "1")]
    pub upload_id: String,
}

/// Request message for `WriteObject`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WriteObjectRequest {
    /// The offset from the beginning of the object at which the data should be
    /// written.
    #[prost(int64, tag = "3")]
    pub write_offset: i64,
    /// Checksums for the complete object, only valid with `finish_write`.
    #[prost(message, optional, tag = "6")]
    pub object_checksums: Option<ObjectChecksums>,
    /// If `true`, this indicates that the write is complete.
    #[prost(bool, tag = "7")]
    pub finish_write: bool,
    /// A set of parameters common to object requests.
    #[prost(message, optional, tag = "8")]
    pub common_object_request_params: Option<CommonObjectRequestParams>,
    /// The first message of each stream should set one of these fields.
    #[prost(oneof = "write_object_request::FirstMessage", tags = "1, 2")]
    pub first_message: Option<write_object_request::FirstMessage>,
    /// The data to insert.
    #[prost(oneof = "write_object_request::Data", tags = "4")]
    pub data: Option<write_object_request::Data>,
}

/// Nested types for [WriteObjectRequest].
pub mod write_object_request {
    /// The first message of each stream should set one of these fields.
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum FirstMessage {
        /// For resumable uploads, the upload id returned by
        /// `StartResumableWrite`.
        #[prost(string, tag = "1")]
        UploadId(String),
        /// For non-resumable uploads, describes the destination.
        #[prost(message, tag = "2")]
        WriteObjectSpec(super::WriteObjectSpec),
    }

    /// The data to insert.
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Data {
        /// The data to insert, with a checksum of this message's content.
        #[prost(message, tag = "4")]
        ChecksummedData(super::ChecksummedData),
    }
}

/// Response message for `WriteObject`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WriteObjectResponse {
    /// The response is the persisted size or the finalized object.
    #[prost(oneof = "write_object_response::WriteStatus", tags = "1, 2")]
    pub write_status: Option<write_object_response::WriteStatus>,
}

/// Nested types for [WriteObjectResponse].
pub mod write_object_response {
    /// The response is the persisted size or the finalized object.
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum WriteStatus {
        /// The total number of bytes that have been processed.
        #[prost(int64, tag = "1")]
        PersistedSize(i64),
        /// A resource containing the metadata for the uploaded object.
        #[prost(message, tag = "2")]
        Resource(super::Object),
    }
}

/// Request message for `QueryWriteStatus`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryWriteStatusRequest {
    /// The name of the resume token for the object whose write status is being
    /// requested.
    #[prost(string, tag = "1")]
    pub upload_id: String,
    /// A set of parameters common to object requests.
    #[prost(message, optional, tag = "2")]
    pub common_object_request_params: Option<CommonObjectRequestParams>,
}

/// Response message for `QueryWriteStatus`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryWriteStatusResponse {
    /// The response is the persisted size or the finalized object.
    #[prost(oneof = "query_write_status_response::WriteStatus", tags = "1, 2")]
    pub write_status: Option<query_write_status_response::WriteStatus>,
}

/// Nested types for [QueryWriteStatusResponse].
pub mod query_write_status_response {
    /// The response is the persisted size or the finalized object.
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum WriteStatus {
        /// The total number of bytes that have been processed.
        #[prost(int64, tag = "1")]
        PersistedSize(i64),
        /// A resource containing the metadata for the uploaded object.
        #[prost(message, tag = "2")]
        Resource(super::Object),
    }
}

/// Request message for `CancelResumableWrite`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CancelResumableWriteRequest {
    /// The upload id of the resumable write to cancel.
    #[prost(string, tag = "1")]
    pub upload_id: String,
}

/// Empty response message for `CancelResumableWrite`.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct CancelResumableWriteResponse {}

/// Contains data and a checksum for that data.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ChecksummedData {
    /// The data.
    #[prost(bytes = "bytes", tag = "1")]
    pub content: ::bytes::Bytes,
    /// CRC32C digest of `content`.
    #[prost(fixed32, optional, tag = "2")]
    pub crc32c: Option<u32>,
}
