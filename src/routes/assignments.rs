//! User-to-subject assignment endpoints

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};

use crate::server::{json_response, read_json_body, AppState};
use crate::sync;
use crate::types::Result;

/// GET /userSubjectAssignment/metadata
pub fn assignment_metadata(
    state: &AppState,
    req: &Request<Incoming>,
) -> Result<Response<Full<Bytes>>> {
    state.caller(req)?;
    let metadata = state.registry.read(sync::assignment_metadata);
    json_response(StatusCode::OK, &metadata)
}

/// POST /userSubjectAssignment
pub async fn save_assignments(
    state: &AppState,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>> {
    let caller = state.caller(&req)?;
    let request: sync::AssignmentRequest = read_json_body(req).await?;
    let organisation_id = state.args.organisation_id;
    let saved = state
        .registry
        .transaction(|t| sync::assign_subjects(t, organisation_id, &request, Some(caller.id)))?;
    json_response(StatusCode::OK, &saved)
}
