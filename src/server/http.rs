//! HTTP server implementation
//!
//! hyper http1 with TokioIo, one spawned task per connection. Routing is a
//! single match on method and path; handlers live in `crate::routes` and
//! return `Result<Response>`, with errors rendered centrally so every route
//! reports failures the same way.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::config::Args;
use crate::domain::User;
use crate::idp::IdpService;
use crate::messaging::MessageGateway;
use crate::routes;
use crate::store::Registry;
use crate::types::{AvniError, Result};

/// Header carrying the acting user's username
pub const CALLER_HEADER: &str = "x-avni-user";

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub registry: Arc<Registry>,
    pub idp: Arc<dyn IdpService>,
    pub gateway: Arc<dyn MessageGateway>,
}

impl AppState {
    pub fn new(
        args: Args,
        registry: Arc<Registry>,
        idp: Arc<dyn IdpService>,
        gateway: Arc<dyn MessageGateway>,
    ) -> Self {
        Self { args, registry, idp, gateway }
    }

    /// Resolve the acting user from the caller header
    pub fn caller(&self, req: &Request<Incoming>) -> Result<User> {
        let username = req
            .headers()
            .get(CALLER_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                AvniError::Unauthorized(format!("missing {} header", CALLER_HEADER))
            })?;
        self.registry.read(|t| {
            t.user_by_username(username)
                .filter(|u| !u.voided)
                .cloned()
                .ok_or_else(|| {
                    AvniError::Unauthorized(format!("unknown user '{}'", username))
                })
        })
    }
}

pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;
    info!("avni-server listening on {}", state.args.listen);

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);
                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });
                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        debug!("error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("error accepting connection: {:?}", e);
            }
        }
    }
}

async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    debug!(%method, %path, %addr, "request");

    let result = match (&method, path.as_str()) {
        (&Method::GET, "/health") | (&Method::GET, "/healthz") => routes::health(&state),
        (&Method::GET, "/version") => routes::version(),

        (&Method::GET, p) if p.starts_with("/groups/") && p.ends_with("/privileges") => {
            routes::list_group_privileges(&state, &req, p)
        }
        (&Method::POST, "/groupPrivilege") => routes::save_group_privilege(&state, req).await,

        (&Method::GET, "/userSubjectAssignment/metadata") => {
            routes::assignment_metadata(&state, &req)
        }
        (&Method::POST, "/userSubjectAssignment") => routes::save_assignments(&state, req).await,

        (&Method::GET, p) if p.starts_with("/syncStatus/") => routes::sync_status(&state, &req, p),

        (&Method::GET, "/implementation/export") => routes::implementation_export(&state, &req),

        (&Method::POST, "/import/userAndCatchment") => routes::import_users(&state, req).await,
        (&Method::POST, "/import/groupSubject") => routes::import_group_subjects(&state, req).await,

        _ => Err(AvniError::NotFound(format!("no route for {} {}", method, path))),
    };

    Ok(result.unwrap_or_else(error_response))
}

/// Serialize `body` as the JSON response
pub fn json_response(status: StatusCode, body: &impl Serialize) -> Result<Response<Full<Bytes>>> {
    let bytes = serde_json::to_vec(body)?;
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(bytes)))
        .map_err(AvniError::internal)
}

/// Render an error; internal faults are logged with their correlation id and
/// details stay out of the response body
pub fn error_response(error: AvniError) -> Response<Full<Bytes>> {
    if let AvniError::Internal { correlation_id, ref source } = error {
        error!(%correlation_id, "internal error: {:#}", source);
    }
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = serde_json::json!({"message": error.to_string()});
    json_response(status, &body).unwrap_or_else(|_| {
        Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .body(Full::new(Bytes::from_static(b"{}")))
            .expect("static fallback response")
    })
}

/// Collect and deserialize a JSON request body
pub async fn read_json_body<T: DeserializeOwned>(req: Request<Incoming>) -> Result<T> {
    let body = req
        .into_body()
        .collect()
        .await
        .map_err(AvniError::internal)?
        .to_bytes();
    serde_json::from_slice(&body)
        .map_err(|e| AvniError::Validation(format!("malformed request body: {}", e)))
}
