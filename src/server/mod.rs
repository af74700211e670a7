//! HTTP server

mod http;

pub use http::{json_response, read_json_body, run, AppState};
