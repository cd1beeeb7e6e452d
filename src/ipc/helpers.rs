use crate::error::{StoreError, StoreResult};
use crate::ipc::error::{no_workspace, ok, store_err};
use crate::ipc::types::{AppState, Request};
use crate::model::{GradeLevel, Score, Status, Term};
use rusqlite::Connection;
use serde_json::{json, Map, Value};

pub type Op = fn(&Connection, &Value) -> StoreResult<Value>;

/// Wraps a handler outcome into the response envelope.
pub fn respond(req: &Request, result: StoreResult<Value>) -> Value {
    match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => store_err(&req.id, &e),
    }
}

/// Runs `op` against the open workspace. Without one, list methods answer with an empty
/// `empty_list` collection and everything else fails with `no_workspace`.
pub fn run(state: &AppState, req: &Request, op: Op, empty_list: Option<&str>) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return match empty_list {
            Some(key) => ok(&req.id, json!({ key: [] })),
            None => no_workspace(&req.id),
        };
    };
    respond(req, op(conn, &req.params))
}

pub fn required<'a>(params: &'a Value, key: &str) -> StoreResult<&'a Value> {
    match params.get(key) {
        None | Some(Value::Null) => Err(StoreError::validation(format!("missing {}", key))),
        Some(v) => Ok(v),
    }
}

pub fn required_str<'a>(params: &'a Value, key: &str) -> StoreResult<&'a str> {
    required(params, key)?
        .as_str()
        .ok_or_else(|| StoreError::validation(format!("{} must be string", key)))
}

pub fn optional_str<'a>(params: &'a Value, key: &str) -> StoreResult<Option<&'a str>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => required_str(params, key).map(Some),
    }
}

fn parse_enum<T>(
    v: &Value,
    key: &str,
    parse: fn(&str) -> Option<T>,
    allowed: &str,
) -> StoreResult<T> {
    v.as_str()
        .and_then(parse)
        .ok_or_else(|| StoreError::validation(format!("{} must be one of: {}", key, allowed)))
}

pub fn status_value(v: &Value, key: &str) -> StoreResult<Status> {
    parse_enum(v, key, Status::parse, "active, archived")
}

pub fn grade_level_value(v: &Value, key: &str) -> StoreResult<GradeLevel> {
    parse_enum(v, key, GradeLevel::parse, "Grade 10, Grade 11, Grade 12")
}

pub fn term_value(v: &Value, key: &str) -> StoreResult<Term> {
    parse_enum(v, key, Term::parse, "Spring, Fall")
}

pub fn year_value(v: &Value, key: &str) -> StoreResult<i64> {
    v.as_i64()
        .ok_or_else(|| StoreError::validation(format!("{} must be integer", key)))
}

pub fn string_value(v: &Value, key: &str) -> StoreResult<String> {
    v.as_str()
        .map(str::to_string)
        .ok_or_else(|| StoreError::validation(format!("{} must be string", key)))
}

pub fn score_value(v: &Value) -> StoreResult<Score> {
    Score::from_json(v).map_err(StoreError::validation)
}

/// Status on create: absent means active.
pub fn optional_status(params: &Value, key: &str) -> StoreResult<Option<Status>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => status_value(v, key).map(Some),
    }
}

pub fn required_score(params: &Value, key: &str) -> StoreResult<Score> {
    score_value(required(params, key)?)
}

/// `params.patch` as an object whose keys are all in `allowed`.
pub fn patch_object<'a>(params: &'a Value, allowed: &[&str]) -> StoreResult<&'a Map<String, Value>> {
    let patch = params
        .get("patch")
        .and_then(|v| v.as_object())
        .ok_or_else(|| StoreError::validation("patch must be an object"))?;
    if patch.is_empty() {
        return Err(StoreError::validation("patch must set at least one field"));
    }
    if let Some(k) = patch.keys().find(|k| !allowed.contains(&k.as_str())) {
        return Err(StoreError::validation(format!("unknown patch field: {}", k)));
    }
    Ok(patch)
}
