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

use super::{invoke, with_session};
use crate::Result;
use crate::error::{Error, SessionError, WriteError};
use crate::method::QueryWriteStatus;
use crate::model::QueryWriteStatusRequest;
use crate::options::UploadOptions;
use crate::session::{SessionState, UploadSession, WriteStatus};
use crate::stub::Storage;
use std::time::Duration;

/// Resolves the local view of an upload against the service.
#[derive(Debug)]
pub struct Reconciler<'a, S> {
    stub: &'a S,
    options: &'a UploadOptions,
}

impl<'a, S> Reconciler<'a, S>
where
    S: Storage,
{
    pub fn new(stub: &'a S, options: &'a UploadOptions) -> Self {
        Self { stub, options }
    }

    /// Queries the service status, retrying transient errors.
    ///
    /// The session is not modified.
    #[tracing::instrument(level = "debug", skip_all, fields(upload_id = session.upload_id()))]
    pub async fn query_status(&self, session: &UploadSession) -> Result<WriteStatus> {
        invoke::<QueryWriteStatus, _, _>(self.options, async |remaining| {
            self.query_attempt(session, remaining).await
        })
        .await
        .map_err(|e| with_session(session, e))
    }

    /// Queries the service status and updates the session to match.
    #[tracing::instrument(level = "debug", skip_all, fields(upload_id = session.upload_id()))]
    pub async fn reconcile(&self, session: &mut UploadSession) -> Result<WriteStatus> {
        if session.state() == SessionState::Cancelled {
            return Err(SessionError::InvalidState {
                state: session.state(),
                operation: "reconcile",
            }
            .into());
        }
        if let Some(object) = session.object() {
            return Ok(WriteStatus::finalized(object.clone()));
        }
        let status = self.query_status(session).await?;
        apply(session, &status)?;
        tracing::debug!(
            committed_offset = session.committed_offset(),
            state = %session.state(),
            "reconciled upload"
        );
        Ok(status)
    }

    /// Makes a single `QueryWriteStatus` attempt.
    pub(crate) async fn query_attempt(
        &self,
        session: &UploadSession,
        remaining_time: Option<Duration>,
    ) -> Result<WriteStatus> {
        let request = QueryWriteStatusRequest {
            upload_id: session.upload_id().to_string(),
            ..Default::default()
        };
        let options = self
            .options
            .request_options(session.bucket(), remaining_time);
        let response = self.stub.query_write_status(request, options).await?;
        let status = WriteStatus::try_from(response)?;
        tracing::debug!(
            persisted_size = status.persisted_size,
            complete = status.complete(),
            "queried upload status"
        );
        Ok(status)
    }
}

/// Applies a service status to a session with no data in flight.
fn apply(session: &mut UploadSession, status: &WriteStatus) -> Result<()> {
    let offset = session.committed_offset();
    if status.persisted_size < offset {
        return Err(Error::deser(WriteError::UnexpectedRewind {
            offset,
            persisted: status.persisted_size,
        }));
    }
    match &status.resource {
        Some(object) => session.set_finalized(object.clone()),
        None => session.advance(status.persisted_size),
    }
    Ok(())
}
