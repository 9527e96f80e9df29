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

//! Implements [stub::Storage][crate::stub::Storage] over gRPC.

use super::from_status::to_error;
use crate::Result;
use crate::error::Error;
use crate::method::{self, Method, MethodDescriptor};
use crate::model::{
    CancelResumableWriteRequest, CancelResumableWriteResponse, QueryWriteStatusRequest,
    QueryWriteStatusResponse, StartResumableWriteRequest, StartResumableWriteResponse,
    WriteObjectRequest, WriteObjectResponse,
};
use crate::options::RequestOptions;
use http::HeaderMap;
use info::X_GOOG_API_CLIENT_HEADER;

type InnerClient = tonic::client::Grpc<tonic::transport::Channel>;

/// The gRPC transport for the upload client.
#[derive(Clone, Debug)]
pub struct Storage {
    inner: InnerClient,
}

impl Storage {
    pub(crate) async fn new(endpoint: Option<String>, default_endpoint: &str) -> Result<Self> {
        let inner = Self::make_inner(endpoint, default_endpoint).await?;
        Ok(Self { inner })
    }

    async fn make_inner(endpoint: Option<String>, default_endpoint: &str) -> Result<InnerClient> {
        use tonic::transport::{ClientTlsConfig, Endpoint};
        let endpoint = endpoint.unwrap_or_else(|| default_endpoint.to_string());
        let tls = endpoint.starts_with("https://");
        let endpoint = Endpoint::from_shared(endpoint).map_err(Error::binding)?;
        let endpoint = if tls {
            endpoint
                .tls_config(ClientTlsConfig::new().with_enabled_roots())
                .map_err(Error::binding)?
        } else {
            endpoint
        };
        let conn = endpoint.connect().await.map_err(Error::io)?;
        Ok(tonic::client::Grpc::new(conn))
    }

    /// Makes a single attempt of a unary RPC.
    async fn unary<M: Method>(
        &self,
        request: M::Request,
        options: RequestOptions,
    ) -> Result<M::Response> {
        let descriptor = M::DESCRIPTOR;
        tracing::debug!(method = descriptor.name, "sending request");
        let request = make_request(request, &descriptor, &options)?;
        let mut inner = self.inner.clone();
        inner.ready().await.map_err(Error::io)?;
        let codec = tonic_prost::ProstCodec::<M::Request, M::Response>::default();
        let response = inner
            .unary(request, descriptor.http_path(), codec)
            .await
            .map_err(to_error)?;
        Ok(response.into_inner())
    }

    /// Makes a single attempt of a client-streaming RPC.
    async fn client_streaming<M: Method>(
        &self,
        requests: Vec<M::Request>,
        options: RequestOptions,
    ) -> Result<M::Response> {
        let descriptor = M::DESCRIPTOR;
        tracing::debug!(
            method = descriptor.name,
            messages = requests.len(),
            "sending stream"
        );
        let request = make_request(tokio_stream::iter(requests), &descriptor, &options)?;
        let mut inner = self.inner.clone();
        inner.ready().await.map_err(Error::io)?;
        let codec = tonic_prost::ProstCodec::<M::Request, M::Response>::default();
        let response = inner
            .client_streaming(request, descriptor.http_path(), codec)
            .await
            .map_err(to_error)?;
        Ok(response.into_inner())
    }
}

impl crate::stub::Storage for Storage {
    async fn start_resumable_write(
        &self,
        req: StartResumableWriteRequest,
        options: RequestOptions,
    ) -> Result<StartResumableWriteResponse> {
        self.unary::<method::StartResumableWrite>(req, options)
            .await
    }

    async fn write_object(
        &self,
        req: Vec<WriteObjectRequest>,
        options: RequestOptions,
    ) -> Result<WriteObjectResponse> {
        self.client_streaming::<method::WriteObject>(req, options)
            .await
    }

    async fn query_write_status(
        &self,
        req: QueryWriteStatusRequest,
        options: RequestOptions,
    ) -> Result<QueryWriteStatusResponse> {
        self.unary::<method::QueryWriteStatus>(req, options).await
    }

    async fn cancel_resumable_write(
        &self,
        req: CancelResumableWriteRequest,
        options: RequestOptions,
    ) -> Result<CancelResumableWriteResponse> {
        self.unary::<method::CancelResumableWrite>(req, options)
            .await
    }
}

fn make_request<T>(
    message: T,
    descriptor: &MethodDescriptor,
    options: &RequestOptions,
) -> Result<tonic::Request<T>> {
    let headers = make_headers(options.bucket.as_deref())?;
    let mut extensions = tonic::Extensions::new();
    extensions.insert(descriptor.grpc_method());
    let metadata = tonic::metadata::MetadataMap::from_headers(headers);
    let mut request = tonic::Request::from_parts(metadata, extensions, message);
    if let Some(timeout) = options.attempt_timeout {
        request.set_timeout(timeout);
    }
    Ok(request)
}

fn make_headers(bucket: Option<&str>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.append(
        http::header::HeaderName::from_static("x-goog-api-client"),
        http::header::HeaderValue::from_static(&X_GOOG_API_CLIENT_HEADER),
    );
    if let Some(bucket) = bucket {
        headers.append(
            http::header::HeaderName::from_static("x-goog-request-params"),
            http::header::HeaderValue::from_str(&format!("bucket={bucket}"))
                .map_err(Error::binding)?,
        );
    }
    Ok(headers)
}

pub(crate) mod info {
    mod build_info {
        // The file has been placed there by the build script.
        include!(concat!(env!("OUT_DIR"), "/build_env.rs"));
    }

    const VERSION: &str = env!("CARGO_PKG_VERSION");

    lazy_static::lazy_static! {
        pub(crate) static ref X_GOOG_API_CLIENT_HEADER: String = {
            // Strip out the initial "rustc " string from `RUSTC_VERSION`. If
            // not found, leave RUSTC_VERSION unchanged.
            let rustc_version = build_info::RUSTC_VERSION;
            let rustc_version = rustc_version
                .strip_prefix("rustc ")
                .unwrap_or(build_info::RUSTC_VERSION);
            format!("gl-rust/{rustc_version} gax/{VERSION} grpc/{VERSION}-tonic gccl/{VERSION}")
        };
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn headers() -> anyhow::Result<()> {
        let headers = make_headers(Some("projects/_/buckets/my-bucket"))?;
        assert_eq!(
            headers.get("x-goog-request-params").map(|v| v.as_bytes()),
            Some("bucket=projects/_/buckets/my-bucket".as_bytes())
        );
        assert_eq!(
            headers.get("x-goog-api-client").map(|v| v.as_bytes()),
            Some(X_GOOG_API_CLIENT_HEADER.as_bytes())
        );

        let headers = make_headers(None)?;
        assert!(headers.get("x-goog-request-params").is_none(), "{headers:?}");
        Ok(())
    }

    #[test]
    fn bad_bucket_header() {
        let err = make_headers(Some("bad\nbucket")).unwrap_err();
        assert!(err.is_binding(), "{err:?}");
    }

    #[test]
    fn request() -> anyhow::Result<()> {
        let descriptor = method::QueryWriteStatus::DESCRIPTOR;
        let options = RequestOptions::new()
            .set_attempt_timeout(Some(Duration::from_secs(5)))
            .set_bucket(Some("projects/_/buckets/my-bucket"));
        let request = make_request(
            QueryWriteStatusRequest {
                upload_id: "abc".to_string(),
                ..Default::default()
            },
            &descriptor,
            &options,
        )?;
        assert!(request.metadata().get("grpc-timeout").is_some(), "{request:?}");
        assert!(
            request.metadata().get("x-goog-request-params").is_some(),
            "{request:?}"
        );
        let method = request.extensions().get::<tonic::GrpcMethod<'static>>();
        assert_eq!(method.map(|m| m.method()), Some("QueryWriteStatus"));
        assert_eq!(method.map(|m| m.service()), Some(method::SERVICE));
        assert_eq!(request.get_ref().upload_id, "abc");
        Ok(())
    }

    #[test]
    fn request_without_timeout() -> anyhow::Result<()> {
        let descriptor = method::WriteObject::DESCRIPTOR;
        let request = make_request(
            Vec::<WriteObjectRequest>::new(),
            &descriptor,
            &RequestOptions::new(),
        )?;
        assert!(request.metadata().get("grpc-timeout").is_none(), "{request:?}");
        Ok(())
    }

    #[tokio::test]
    async fn bad_endpoint() {
        let err = Storage::new(Some("not a valid endpoint".to_string()), "unused")
            .await
            .unwrap_err();
        assert!(err.is_binding(), "{err:?}");
    }
}
