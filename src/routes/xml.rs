//! Endpoints called by production software and the GOLD front end to
//! generate and dispatch JDF/JMF documents for an item.

use axum::extract::{Path, RawQuery, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use std::str::FromStr;

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::services::dispatch::DispatchError;
use crate::services::tickets::{JdfAction, JdfTicket};

pub const JDF_CONTENT_TYPE: &str = "vnd.cip4-jdf+xml";
const SUBMITTED: &str = "Submitted";
const INVALID_FUNCTION: &str = "Invalid JDF Function";

type ItemPath = Path<(i64, i32, String)>;

/// GET /xml/jdf/run/{job_id}/{item_num}/{genxml_func}
pub async fn run_jdf(
    State(state): State<AppState>,
    Path((job_id, item_num, func)): ItemPath,
) -> Result<&'static str, ApiError> {
    let item = state.dispatcher.find_item(job_id, item_num).await?;
    let Ok(action) = JdfAction::from_str(&func) else {
        tracing::info!(job_id, item_num, function = %func, "Unknown JDF action requested");
        return Ok(INVALID_FUNCTION);
    };

    state.dispatcher.run(action, &item).await?;
    Ok(SUBMITTED)
}

/// GET /xml/jdf/gen/{job_id}/{item_num}/{genxml_func}
pub async fn gen_jdf(
    State(state): State<AppState>,
    Path((job_id, item_num, func)): ItemPath,
) -> Result<Response, ApiError> {
    let item = state.dispatcher.find_item(job_id, item_num).await?;
    let Ok(ticket) = JdfTicket::from_str(&func) else {
        tracing::info!(job_id, item_num, function = %func, "Unknown JDF ticket requested");
        return Ok(INVALID_FUNCTION.into_response());
    };

    let jdf = state.dispatcher.generate(ticket, &item).await?;
    let xml = jdf.to_xml().map_err(DispatchError::from)?;
    Ok(([(header::CONTENT_TYPE, JDF_CONTENT_TYPE)], xml).into_response())
}

/// GET /xml/jmf/run/{job_id}/{item_num}/{genxml_func}
pub async fn run_jmf(
    State(state): State<AppState>,
    Path((job_id, item_num, func)): ItemPath,
) -> Result<&'static str, ApiError> {
    let item = state.dispatcher.find_item(job_id, item_num).await?;
    let Ok(ticket) = JdfTicket::from_str(&func) else {
        return Ok(INVALID_FUNCTION);
    };

    let reply = state.dispatcher.submit_jmf(ticket, &item).await?;
    tracing::debug!(job_id, item_num, reply = %reply, "JMF gateway replied");
    Ok(SUBMITTED)
}

/// GET|POST /xml/echo — return address for JMF replies.
pub async fn echo(RawQuery(query): RawQuery, body: String) {
    tracing::info!(query = ?query, body = %body, "JMF echo");
}
