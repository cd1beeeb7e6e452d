use crate::cascade;
use crate::error::StoreResult;
use crate::ipc::helpers::{
    optional_status, patch_object, required_str, run, status_value, string_value, Op,
};
use crate::ipc::types::{AppState, Request};
use crate::model::EntityKind;
use crate::store::{self, ListFilter, NewSubject, SubjectPatch};
use rusqlite::Connection;
use serde_json::{json, Value};

fn list(conn: &Connection, params: &Value) -> StoreResult<Value> {
    let filter = ListFilter {
        status: optional_status(params, "status")?,
        ..Default::default()
    };
    let subjects = store::list_subjects(conn, &filter)?;
    Ok(json!({ "subjects": subjects }))
}

fn create(conn: &Connection, params: &Value) -> StoreResult<Value> {
    let subject = store::create_subject(
        conn,
        NewSubject {
            name: required_str(params, "name")?.to_string(),
            status: optional_status(params, "status")?.unwrap_or_default(),
        },
    )?;
    Ok(json!({ "subject": subject }))
}

fn update(conn: &Connection, params: &Value) -> StoreResult<Value> {
    let id = required_str(params, "subjectId")?;
    let mut patch = SubjectPatch::default();
    for (k, v) in patch_object(params, &["name", "status"])? {
        match k.as_str() {
            "name" => patch.name = Some(string_value(v, k)?),
            "status" => patch.status = Some(status_value(v, k)?),
            _ => {}
        }
    }
    let subject = store::update_subject(conn, id, patch)?;
    Ok(json!({ "subject": subject }))
}

fn delete(conn: &Connection, params: &Value) -> StoreResult<Value> {
    let id = required_str(params, "subjectId")?;
    let report = cascade::delete_with_cascade(conn, EntityKind::Subject, id)?;
    Ok(json!({ "ok": true, "deleted": report.to_json() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let op: Op = match req.method.as_str() {
        "subjects.list" => list,
        "subjects.create" => create,
        "subjects.update" => update,
        "subjects.delete" => delete,
        _ => return None,
    };
    let empty = (req.method == "subjects.list").then_some("subjects");
    Some(run(state, req, op, empty))
}
