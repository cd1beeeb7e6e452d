use crate::cascade;
use crate::error::StoreResult;
use crate::ipc::helpers::{
    optional_status, optional_str, patch_object, required_str, run, status_value, string_value,
    Op,
};
use crate::ipc::types::{AppState, Request};
use crate::model::EntityKind;
use crate::store::{self, ExamTypePatch, ListFilter, NewExamType};
use rusqlite::Connection;
use serde_json::{json, Value};

fn list(conn: &Connection, params: &Value) -> StoreResult<Value> {
    let filter = ListFilter {
        status: optional_status(params, "status")?,
        semester_id: optional_str(params, "semesterId")?.map(str::to_string),
        ..Default::default()
    };
    let exam_types = store::list_exam_types(conn, &filter)?;
    Ok(json!({ "examTypes": exam_types }))
}

fn create(conn: &Connection, params: &Value) -> StoreResult<Value> {
    let exam_type = store::create_exam_type(
        conn,
        NewExamType {
            name: required_str(params, "name")?.to_string(),
            semester_id: required_str(params, "semesterId")?.to_string(),
            status: optional_status(params, "status")?.unwrap_or_default(),
        },
    )?;
    Ok(json!({ "examType": exam_type }))
}

fn update(conn: &Connection, params: &Value) -> StoreResult<Value> {
    let id = required_str(params, "examTypeId")?;
    let mut patch = ExamTypePatch::default();
    for (k, v) in patch_object(params, &["name", "semesterId", "status"])? {
        match k.as_str() {
            "name" => patch.name = Some(string_value(v, k)?),
            "semesterId" => patch.semester_id = Some(string_value(v, k)?),
            "status" => patch.status = Some(status_value(v, k)?),
            _ => {}
        }
    }
    let exam_type = store::update_exam_type(conn, id, patch)?;
    Ok(json!({ "examType": exam_type }))
}

fn delete(conn: &Connection, params: &Value) -> StoreResult<Value> {
    let id = required_str(params, "examTypeId")?;
    let report = cascade::delete_with_cascade(conn, EntityKind::ExamType, id)?;
    Ok(json!({ "ok": true, "deleted": report.to_json() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let op: Op = match req.method.as_str() {
        "examTypes.list" => list,
        "examTypes.create" => create,
        "examTypes.update" => update,
        "examTypes.delete" => delete,
        _ => return None,
    };
    let empty = (req.method == "examTypes.list").then_some("examTypes");
    Some(run(state, req, op, empty))
}
