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

//! Traits to mock the clients in this library.
//!
//! Application developers may need to mock the clients in this library to test
//! how their application works with different (and sometimes hard to trigger)
//! client and service behavior. Such test can define mocks implementing the
//! trait(s) defined in this module, initialize the client with an instance of
//! this mock in their tests, and verify their application responds as expected.
//!
//! The [testing][crate::testing] module contains a ready to use implementation
//! that replays canned responses.

use crate::Result;
use crate::model::{
    CancelResumableWriteRequest, CancelResumableWriteResponse, QueryWriteStatusRequest,
    QueryWriteStatusResponse, StartResumableWriteRequest, StartResumableWriteResponse,
    WriteObjectRequest, WriteObjectResponse,
};
use crate::options::RequestOptions;

/// Defines the trait used to implement [crate::client::Storage].
///
/// Each method corresponds to one attempt of an RPC. The client library
/// implements retries, reconciliation, and checksums on top of these
/// functions.
///
/// Services gain new RPCs routinely. Consequently, this trait gains new methods
/// too. To avoid breaking applications the trait provides a default
/// implementation of each method.
pub trait Storage: std::fmt::Debug + Send + Sync {
    /// Implements the `StartResumableWrite` RPC.
    fn start_resumable_write(
        &self,
        _req: StartResumableWriteRequest,
        _options: RequestOptions,
    ) -> impl Future<Output = Result<StartResumableWriteResponse>> + Send {
        unimplemented_stub::<StartResumableWriteResponse>()
    }

    /// Implements the `WriteObject` RPC.
    ///
    /// The messages are sent as a single client-side stream. The response is
    /// the service status after the last message.
    fn write_object(
        &self,
        _req: Vec<WriteObjectRequest>,
        _options: RequestOptions,
    ) -> impl Future<Output = Result<WriteObjectResponse>> + Send {
        unimplemented_stub::<WriteObjectResponse>()
    }

    /// Implements the `QueryWriteStatus` RPC.
    fn query_write_status(
        &self,
        _req: QueryWriteStatusRequest,
        _options: RequestOptions,
    ) -> impl Future<Output = Result<QueryWriteStatusResponse>> + Send {
        unimplemented_stub::<QueryWriteStatusResponse>()
    }

    /// Implements the `CancelResumableWrite` RPC.
    fn cancel_resumable_write(
        &self,
        _req: CancelResumableWriteRequest,
        _options: RequestOptions,
    ) -> impl Future<Output = Result<CancelResumableWriteResponse>> + Send {
        unimplemented_stub::<CancelResumableWriteResponse>()
    }
}

const UNIMPLEMENTED: &str = concat!(
    "this method is not implemented by the stub. ",
    "Implement the method in your mock, or use `testing::FakeStorage`."
);

async fn unimplemented_stub<T>() -> Result<T> {
    unimplemented!("{UNIMPLEMENTED}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Empty;
    impl Storage for Empty {}

    #[tokio::test]
    #[should_panic]
    async fn default_is_unimplemented() {
        let _ = Empty
            .query_write_status(QueryWriteStatusRequest::default(), RequestOptions::new())
            .await;
    }
}
