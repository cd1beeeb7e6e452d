use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;
use serde_json::Value;

type Handler = fn(&mut AppState, &Request) -> Option<Value>;

const HANDLERS: &[Handler] = &[
    handlers::core::try_handle,
    handlers::students::try_handle,
    handlers::subjects::try_handle,
    handlers::semesters::try_handle,
    handlers::exam_types::try_handle,
    handlers::enrollments::try_handle,
    handlers::grades::try_handle,
    handlers::reports::try_handle,
    handlers::setup::try_handle,
];

pub fn handle_request(state: &mut AppState, req: Request) -> Value {
    tracing::debug!(method = %req.method, "dispatch");
    let resp = HANDLERS
        .iter()
        .find_map(|handler| handler(state, &req))
        .unwrap_or_else(|| {
            err(
                &req.id,
                "not_implemented",
                format!("unknown method: {}", req.method),
                None,
            )
        });
    if let Some(code) = failure_code(&resp) {
        tracing::warn!(
            method = %req.method,
            code,
            error = resp["error"]["message"].as_str().unwrap_or_default(),
            "request failed"
        );
    }
    resp
}

fn failure_code(resp: &Value) -> Option<&str> {
    if resp["ok"].as_bool() == Some(false) {
        resp["error"]["code"].as_str()
    } else {
        None
    }
}
