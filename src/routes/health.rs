//! Liveness and version endpoints

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde_json::json;

use crate::server::{json_response, AppState};
use crate::types::Result;

pub fn health(state: &AppState) -> Result<Response<Full<Bytes>>> {
    let body = json!({
        "healthy": true,
        "version": env!("CARGO_PKG_VERSION"),
        "organisationId": state.args.organisation_id,
        "idpType": state.args.idp_type,
    });
    json_response(StatusCode::OK, &body)
}

pub fn version() -> Result<Response<Full<Bytes>>> {
    json_response(StatusCode::OK, &json!({"version": env!("CARGO_PKG_VERSION")}))
}
