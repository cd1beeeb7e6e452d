use crate::cascade;
use crate::error::StoreResult;
use crate::grades;
use crate::ipc::helpers::{
    optional_str, patch_object, required, required_score, required_str, run, score_value,
    string_value, Op,
};
use crate::ipc::types::{AppState, Request};
use crate::model::EntityKind;
use crate::store::{self, GradeKey, GradePatch, ListFilter};
use rusqlite::Connection;
use serde_json::{json, Value};

fn grade_key(params: &Value) -> StoreResult<GradeKey> {
    Ok(GradeKey {
        student_id: required_str(params, "studentId")?.to_string(),
        subject_id: required_str(params, "subjectId")?.to_string(),
        exam_type_id: required_str(params, "examTypeId")?.to_string(),
    })
}

fn list(conn: &Connection, params: &Value) -> StoreResult<Value> {
    let filter = ListFilter {
        student_id: optional_str(params, "studentId")?.map(str::to_string),
        subject_id: optional_str(params, "subjectId")?.map(str::to_string),
        exam_type_id: optional_str(params, "examTypeId")?.map(str::to_string),
        ..Default::default()
    };
    let grades = store::list_grades(conn, &filter)?;
    Ok(json!({ "grades": grades }))
}

fn create(conn: &Connection, params: &Value) -> StoreResult<Value> {
    let key = grade_key(params)?;
    let score = required_score(params, "score")?;
    let grade = store::create_grade(conn, key, score)?;
    Ok(json!({ "grade": grade }))
}

fn update(conn: &Connection, params: &Value) -> StoreResult<Value> {
    let id = required_str(params, "gradeId")?;
    let mut patch = GradePatch::default();
    for (k, v) in patch_object(params, &["studentId", "subjectId", "examTypeId", "score"])? {
        match k.as_str() {
            "studentId" => patch.student_id = Some(string_value(v, k)?),
            "subjectId" => patch.subject_id = Some(string_value(v, k)?),
            "examTypeId" => patch.exam_type_id = Some(string_value(v, k)?),
            "score" => patch.score = Some(score_value(v)?),
            _ => {}
        }
    }
    let grade = store::update_grade(conn, id, patch)?;
    Ok(json!({ "grade": grade }))
}

fn delete(conn: &Connection, params: &Value) -> StoreResult<Value> {
    let id = required_str(params, "gradeId")?;
    let report = cascade::delete_with_cascade(conn, EntityKind::Grade, id)?;
    Ok(json!({ "ok": true, "deleted": report.to_json() }))
}

fn upsert(conn: &Connection, params: &Value) -> StoreResult<Value> {
    let key = grade_key(params)?;
    let score = required_score(params, "score")?;
    let grade = grades::upsert_grade(conn, &key, score)?;
    Ok(json!({ "grade": grade }))
}

fn sheet(conn: &Connection, params: &Value) -> StoreResult<Value> {
    let subject_id = required_str(params, "subjectId")?;
    let exam_type_id = required_str(params, "examTypeId")?;
    let rows = grades::grade_sheet(conn, subject_id, exam_type_id)?;
    Ok(json!({
        "subjectId": subject_id,
        "examTypeId": exam_type_id,
        "rows": rows
    }))
}

fn batch_upsert(conn: &Connection, params: &Value) -> StoreResult<Value> {
    let subject_id = required_str(params, "subjectId")?;
    let exam_type_id = required_str(params, "examTypeId")?;
    let scores = grades::parse_score_list(required(params, "scores")?)?;
    let outcome = grades::batch_upsert(conn, subject_id, exam_type_id, &scores)?;
    Ok(json!({
        "grades": outcome.grades,
        "written": outcome.grades.len(),
        "ignored": outcome.ignored
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let op: Op = match req.method.as_str() {
        "grades.list" => list,
        "grades.create" => create,
        "grades.update" => update,
        "grades.delete" => delete,
        "grades.upsert" => upsert,
        "grades.sheet" => sheet,
        "grades.batchUpsert" => batch_upsert,
        _ => return None,
    };
    let empty = (req.method == "grades.list").then_some("grades");
    Some(run(state, req, op, empty))
}
