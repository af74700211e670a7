//! Group-privilege endpoints

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};

use crate::access;
use crate::server::{json_response, read_json_body, AppState};
use crate::types::{AvniError, Result};

/// GET /groups/{id}/privileges
pub fn list_group_privileges(
    state: &AppState,
    req: &Request<Incoming>,
    path: &str,
) -> Result<Response<Full<Bytes>>> {
    let caller = state.caller(req)?;
    let group_id: i64 = path
        .strip_prefix("/groups/")
        .and_then(|rest| rest.strip_suffix("/privileges"))
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| AvniError::Validation(format!("malformed group id in '{}'", path)))?;

    let privileges = state
        .registry
        .read(|t| access::list_group_privileges(t, caller.id, group_id))?;
    json_response(StatusCode::OK, &privileges)
}

/// POST /groupPrivilege
///
/// The body is an array; all rows commit or none do.
pub async fn save_group_privilege(
    state: &AppState,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>> {
    let caller = state.caller(&req)?;
    let requests: Vec<access::GroupPrivilegeRequest> = read_json_body(req).await?;
    let saved = state.registry.transaction(|t| {
        requests
            .iter()
            .map(|request| access::upsert_group_privilege(t, caller.id, request))
            .collect::<Result<Vec<_>>>()
    })?;
    json_response(StatusCode::OK, &saved)
}
