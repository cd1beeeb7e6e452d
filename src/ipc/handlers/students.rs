use crate::cascade;
use crate::error::StoreResult;
use crate::ipc::helpers::{
    grade_level_value, optional_status, patch_object, required, required_str, run, status_value,
    string_value, Op,
};
use crate::ipc::types::{AppState, Request};
use crate::model::EntityKind;
use crate::store::{self, ListFilter, NewStudent, StudentPatch};
use rusqlite::Connection;
use serde_json::{json, Value};

fn list(conn: &Connection, params: &Value) -> StoreResult<Value> {
    let filter = ListFilter {
        status: optional_status(params, "status")?,
        ..Default::default()
    };
    let students = store::list_students(conn, &filter)?;
    Ok(json!({ "students": students }))
}

fn create(conn: &Connection, params: &Value) -> StoreResult<Value> {
    let name = required_str(params, "name")?;
    let grade_level = grade_level_value(required(params, "gradeLevel")?, "gradeLevel")?;
    let student = store::create_student(
        conn,
        NewStudent {
            name: name.to_string(),
            grade_level,
            status: optional_status(params, "status")?.unwrap_or_default(),
        },
    )?;
    Ok(json!({ "student": student }))
}

fn update(conn: &Connection, params: &Value) -> StoreResult<Value> {
    let id = required_str(params, "studentId")?;
    let mut patch = StudentPatch::default();
    for (k, v) in patch_object(params, &["name", "gradeLevel", "status"])? {
        match k.as_str() {
            "name" => patch.name = Some(string_value(v, k)?),
            "gradeLevel" => patch.grade_level = Some(grade_level_value(v, k)?),
            "status" => patch.status = Some(status_value(v, k)?),
            _ => {}
        }
    }
    let student = store::update_student(conn, id, patch)?;
    Ok(json!({ "student": student }))
}

fn delete(conn: &Connection, params: &Value) -> StoreResult<Value> {
    let id = required_str(params, "studentId")?;
    let report = cascade::delete_with_cascade(conn, EntityKind::Student, id)?;
    Ok(json!({ "ok": true, "deleted": report.to_json() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let op: Op = match req.method.as_str() {
        "students.list" => list,
        "students.create" => create,
        "students.update" => update,
        "students.delete" => delete,
        _ => return None,
    };
    let empty = (req.method == "students.list").then_some("students");
    Some(run(state, req, op, empty))
}
