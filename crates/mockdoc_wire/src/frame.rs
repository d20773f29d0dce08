use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::status::{ServiceStatus, StatusCode};

/// Frame discriminator for the newline-delimited JSON wire protocol.
///
/// A call is one `Request` frame from the client; the host answers with
/// either one terminal frame (`Result` or `Error`) or, for streamed
/// operations, zero or more `Item` frames followed by one terminal frame
/// (`Done` or `Error`).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FrameKind {
    Request,
    Result,
    Error,
    Item,
    Done,
    Unknown,
}

/// Classify a raw JSON frame with key presence checks.
/// Allocation: none. Complexity: O(1).
pub fn classify_frame(json: &Value) -> FrameKind {
    let has_id = json.get("id").is_some();
    let has_method = json.get("method").is_some();
    let has_result = json.get("result").is_some();
    let has_error = json.get("error").is_some();
    let has_item = json.get("item").is_some();
    let has_done = json.get("done").is_some();

    if has_id && has_method && !has_result && !has_error {
        return FrameKind::Request;
    }
    if has_id && has_result {
        return FrameKind::Result;
    }
    if has_id && has_error {
        return FrameKind::Error;
    }
    if has_id && has_item {
        return FrameKind::Item;
    }
    if has_id && has_done {
        return FrameKind::Done;
    }

    FrameKind::Unknown
}

/// Call id of a frame, when it carries one.
pub fn frame_id(json: &Value) -> Option<u64> {
    json.get("id").and_then(Value::as_u64)
}

pub fn request_frame(id: u64, method: &str, params: Value) -> Value {
    json!({ "id": id, "method": method, "params": params })
}

pub fn result_frame(id: u64, result: Value) -> Value {
    json!({ "id": id, "result": result })
}

pub fn error_frame(id: u64, status: &ServiceStatus) -> Value {
    json!({ "id": id, "error": status })
}

pub fn item_frame(id: u64, item: Value) -> Value {
    json!({ "id": id, "item": item })
}

pub fn done_frame(id: u64) -> Value {
    json!({ "id": id, "done": true })
}

/// Decode the `error` slot of an `Error` frame into a typed status.
///
/// Frames from a conforming host always decode; a malformed error object
/// maps to `Unknown` so callers still see a failure rather than a hang.
pub fn decode_error(json: &Value) -> ServiceStatus {
    let Some(error) = json.get("error") else {
        return ServiceStatus::new(StatusCode::Unknown, "frame carried no error object");
    };
    serde_json::from_value(error.clone()).unwrap_or_else(|err| {
        ServiceStatus::new(
            StatusCode::Unknown,
            format!("undecodable error object: {err}"),
        )
    })
}
