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

use crate::error::Error;
use crate::error::rpc::Status;
use std::error::Error as _;

/// The kinds of failure a [tonic::Status] can represent.
#[derive(Debug, PartialEq)]
enum Origin {
    Deadline,
    Connection,
    NotGrpc,
    Service,
}

impl Origin {
    fn of(status: &tonic::Status) -> Self {
        // The source chain may be cyclical, cap the number of links.
        let mut chain = std::iter::successors(status.source(), |&e| e.source()).take(32);
        let cause = chain.find(|e| {
            e.is::<tonic::TimeoutExpired>()
                || e.is::<tonic::ConnectError>()
                || e.is::<tonic::transport::Error>()
        });
        match cause {
            Some(e) if e.is::<tonic::TimeoutExpired>() => return Self::Deadline,
            Some(_) => return Self::Connection,
            None => {}
        }
        let grpc = status
            .metadata()
            .get("content-type")
            .is_none_or(|v| v.as_bytes().starts_with(b"application/grpc"));
        if grpc { Self::Service } else { Self::NotGrpc }
    }
}

/// Converts a [tonic::Status] into the error type for this crate.
///
/// Timeouts and connection problems keep their own error kinds, the retry
/// policies treat them as transient.
pub fn to_error(status: tonic::Status) -> Error {
    match Origin::of(&status) {
        Origin::Deadline => Error::timeout(status),
        Origin::Connection => Error::io(status),
        Origin::NotGrpc => {
            let headers = status.metadata().clone().into_headers();
            Error::transport(headers, NotGrpc(status))
        }
        Origin::Service => Error::service(
            Status::default()
                .set_code(status.code() as i32)
                .set_message(status.message()),
        ),
    }
}

/// The response did not come from a gRPC service.
#[derive(Debug, thiserror::Error)]
#[error(
    "the content-type of the response should start with application/grpc, check the endpoint supports the Cloud Storage gRPC API"
)]
struct NotGrpc(#[source] tonic::Status);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::rpc::Code;
    use test_case::test_case;

    #[test_case(tonic::Code::InvalidArgument, Code::InvalidArgument)]
    #[test_case(tonic::Code::PermissionDenied, Code::PermissionDenied)]
    #[test_case(tonic::Code::NotFound, Code::NotFound)]
    #[test_case(tonic::Code::Unavailable, Code::Unavailable)]
    #[test_case(tonic::Code::DeadlineExceeded, Code::DeadlineExceeded)]
    fn service_error(input: tonic::Code, want: Code) {
        let mut status = tonic::Status::new(input, "test-only");
        status.metadata_mut().append(
            "content-type",
            tonic::metadata::AsciiMetadataValue::from_static("application/grpc"),
        );
        let got = to_error(status);
        let status = got.status().expect("a service error");
        assert_eq!(status.code, want);
        assert_eq!(&status.message, "test-only");
    }

    #[test]
    fn without_content_type() {
        let got = to_error(tonic::Status::unavailable("try-again"));
        assert_eq!(got.status().map(|s| s.code), Some(Code::Unavailable));
    }

    #[test]
    fn bad_content_type() {
        let mut status = tonic::Status::internal("oh noes");
        status.metadata_mut().append(
            "content-type",
            tonic::metadata::AsciiMetadataValue::from_static("application/xml; charset=UTF-8"),
        );
        let got = to_error(status);
        assert!(got.is_transport(), "{got:?}");
        assert!(got.status().is_none(), "{got:?}");
        let source = got
            .source()
            .and_then(|e| e.downcast_ref::<NotGrpc>())
            .expect("want a NotGrpc as source");
        assert_eq!(source.0.code(), tonic::Code::Internal);
        let fmt = source.to_string();
        assert!(fmt.contains("should start with application/grpc"), "{fmt}");
    }

    #[test]
    fn origin() {
        assert_eq!(
            Origin::of(&tonic::Status::unavailable("try-again")),
            Origin::Service
        );
        let mut status = tonic::Status::internal("oh noes");
        status.metadata_mut().append(
            "content-type",
            tonic::metadata::AsciiMetadataValue::from_static("text/html"),
        );
        assert_eq!(Origin::of(&status), Origin::NotGrpc);
    }
}
