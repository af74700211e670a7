//! Implementation export endpoint

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};

use crate::export::{export_implementation, EXPORT_FILE_NAME};
use crate::server::AppState;
use crate::types::{AvniError, Result};

/// GET /implementation/export
pub fn implementation_export(
    state: &AppState,
    req: &Request<Incoming>,
) -> Result<Response<Full<Bytes>>> {
    let caller = state.caller(req)?;
    if !caller.org_admin {
        return Err(AvniError::Unauthorized(
            "only organisation administrators may export".into(),
        ));
    }

    let organisation_id = state.args.organisation_id;
    let bytes = state
        .registry
        .read(|t| export_implementation(t, organisation_id))?;
    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "application/zip")
        .header(
            "content-disposition",
            format!("attachment; filename={}", EXPORT_FILE_NAME),
        )
        .body(Full::new(Bytes::from(bytes)))
        .map_err(AvniError::internal)
}
