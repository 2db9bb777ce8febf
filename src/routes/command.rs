//! Command and callback endpoints
//!
//! `POST /command` carries `{text, callerTarget}` and answers with reply
//! text plus optional action buttons in the messenger attachment format.
//! `POST /callback` carries only `{token}`; the server resolves the token
//! against the pending-action ledger, so the client never echoes record data
//! back.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::notify::Action;
use crate::resolver::Reply;
use crate::server::AppState;

/// Inbound command request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub caller_target: String,
}

/// Inbound callback request: an opaque pending-action token only
#[derive(Debug, Deserialize)]
pub struct CallbackRequest {
    pub token: String,
}

/// Reply body in the messenger webhook format
#[derive(Debug, Serialize)]
pub struct ReplyBody {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<AttachmentBody>>,
}

#[derive(Debug, Serialize)]
pub struct AttachmentBody {
    pub actions: Vec<Action>,
}

impl From<Reply> for ReplyBody {
    fn from(reply: Reply) -> Self {
        let attachments = (!reply.actions.is_empty()).then(|| {
            vec![AttachmentBody {
                actions: reply.actions,
            }]
        });
        Self {
            text: reply.text,
            attachments,
        }
    }
}

/// Handle POST /command
pub async fn handle_command(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let request: CommandRequest = match read_json(req).await {
        Ok(r) => r,
        Err(response) => return response,
    };

    let reply = state
        .resolver
        .handle_command(&request.text, &request.caller_target)
        .await;
    json_response(StatusCode::OK, &ReplyBody::from(reply))
}

/// Handle POST /callback
pub async fn handle_callback(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let request: CallbackRequest = match read_json(req).await {
        Ok(r) => r,
        Err(response) => return response,
    };

    let reply = state.resolver.complete_action(&request.token);
    json_response(StatusCode::OK, &ReplyBody::from(reply))
}

/// Collect and parse a JSON request body
async fn read_json<T: serde::de::DeserializeOwned>(
    req: Request<Incoming>,
) -> Result<T, Response<Full<Bytes>>> {
    let body = match req.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("Request body error: {}", e);
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                "Failed to read request body",
            ));
        }
    };

    serde_json::from_slice(&body).map_err(|e| {
        warn!("Request JSON parse error: {}", e);
        error_response(StatusCode::BAD_REQUEST, &format!("Invalid JSON: {e}"))
    })
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let raw = serde_json::to_string(body)
        .unwrap_or_else(|_| r#"{"text":"Internal serialization error"}"#.to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(raw)))
        .unwrap()
}

fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({ "error": message });
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}
