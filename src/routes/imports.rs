//! Bulk-import endpoints
//!
//! Bodies carry the parsed table: one `headers` array and one `rows` array of
//! cell arrays. Responses are the batch summary, including per-row errors.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::Deserialize;

use crate::import::{import_group_subject_rows, import_user_rows, Row};
use crate::server::{json_response, read_json_body, AppState};
use crate::types::Result;

#[derive(Deserialize)]
struct TableBody {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TableBody {
    fn into_rows(self) -> Vec<Row> {
        self.rows
            .into_iter()
            .map(|values| Row::new(self.headers.clone(), values))
            .collect()
    }
}

/// POST /import/userAndCatchment
pub async fn import_users(
    state: &AppState,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>> {
    let caller = state.caller(&req)?;
    let table: TableBody = read_json_body(req).await?;
    let summary = import_user_rows(
        &state.registry,
        state.idp.as_ref(),
        state.gateway.as_ref(),
        state.args.organisation_id,
        &table.into_rows(),
        Some(caller.id),
    )
    .await?;
    json_response(StatusCode::OK, &summary)
}

/// POST /import/groupSubject
pub async fn import_group_subjects(
    state: &AppState,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>> {
    let caller = state.caller(&req)?;
    let table: TableBody = read_json_body(req).await?;
    let summary =
        import_group_subject_rows(&state.registry, &table.into_rows(), Some(caller.id))?;
    json_response(StatusCode::OK, &summary)
}
