use crate::cascade;
use crate::error::{StoreError, StoreResult};
use crate::ipc::helpers::{optional_str, patch_object, required_str, run, string_value, Op};
use crate::ipc::types::{AppState, Request};
use crate::model::EntityKind;
use crate::store::{self, EnrollmentPatch, ListFilter};
use rusqlite::Connection;
use serde_json::{json, Value};

fn list(conn: &Connection, params: &Value) -> StoreResult<Value> {
    let filter = ListFilter {
        student_id: optional_str(params, "studentId")?.map(str::to_string),
        subject_id: optional_str(params, "subjectId")?.map(str::to_string),
        ..Default::default()
    };
    let enrollments = store::list_enrollments(conn, &filter)?;
    Ok(json!({ "enrollments": enrollments }))
}

fn create(conn: &Connection, params: &Value) -> StoreResult<Value> {
    let student_id = required_str(params, "studentId")?;
    let subject_id = required_str(params, "subjectId")?;
    let enrollment = store::create_enrollment(conn, student_id, subject_id)?;
    Ok(json!({ "enrollment": enrollment }))
}

fn update(conn: &Connection, params: &Value) -> StoreResult<Value> {
    let id = required_str(params, "enrollmentId")?;
    let mut patch = EnrollmentPatch::default();
    for (k, v) in patch_object(params, &["studentId", "subjectId"])? {
        match k.as_str() {
            "studentId" => patch.student_id = Some(string_value(v, k)?),
            "subjectId" => patch.subject_id = Some(string_value(v, k)?),
            _ => {}
        }
    }
    let enrollment = store::update_enrollment(conn, id, patch)?;
    Ok(json!({ "enrollment": enrollment }))
}

fn delete(conn: &Connection, params: &Value) -> StoreResult<Value> {
    let id = required_str(params, "enrollmentId")?;
    let report = cascade::delete_with_cascade(conn, EntityKind::Enrollment, id)?;
    Ok(json!({ "ok": true, "deleted": report.to_json() }))
}

fn delete_by_pair(conn: &Connection, params: &Value) -> StoreResult<Value> {
    let student_id = required_str(params, "studentId")?;
    let subject_id = required_str(params, "subjectId")?;
    let id = store::find_enrollment_id(conn, student_id, subject_id)?
        .ok_or_else(|| StoreError::not_found(EntityKind::Enrollment))?;
    let report = cascade::delete_with_cascade(conn, EntityKind::Enrollment, &id)?;
    Ok(json!({ "ok": true, "enrollmentId": id, "deleted": report.to_json() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let op: Op = match req.method.as_str() {
        "enrollments.list" => list,
        "enrollments.create" => create,
        "enrollments.update" => update,
        "enrollments.delete" => delete,
        "enrollments.deleteByPair" => delete_by_pair,
        _ => return None,
    };
    let empty = (req.method == "enrollments.list").then_some("enrollments");
    Some(run(state, req, op, empty))
}
