//! Change-detection feed endpoint

use bytes::Bytes;
use chrono::DateTime;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde_json::json;

use crate::server::{json_response, AppState};
use crate::sync::{has_changes_since, SyncDomain};
use crate::types::{AvniError, Result};

/// GET /syncStatus/{domain}?since=<rfc3339>
pub fn sync_status(
    state: &AppState,
    req: &Request<Incoming>,
    path: &str,
) -> Result<Response<Full<Bytes>>> {
    let caller = state.caller(req)?;
    let domain: SyncDomain = path
        .strip_prefix("/syncStatus/")
        .unwrap_or_default()
        .parse()?;

    let since_param = req
        .uri()
        .query()
        .and_then(|q| {
            q.split('&')
                .filter_map(|pair| pair.split_once('='))
                .find(|(k, _)| *k == "since")
                .map(|(_, v)| v.to_string())
        })
        .ok_or_else(|| AvniError::Validation("missing 'since' query parameter".into()))?;
    let since = DateTime::parse_from_rfc3339(&since_param)
        .map_err(|_| {
            AvniError::Validation(format!("'{}' is not an RFC 3339 timestamp", since_param))
        })?
        .with_timezone(&chrono::Utc);

    let changed = state
        .registry
        .read(|t| has_changes_since(t, caller.id, domain, since))?;
    json_response(StatusCode::OK, &json!({"changed": changed}))
}
