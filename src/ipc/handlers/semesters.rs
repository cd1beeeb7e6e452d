use crate::cascade;
use crate::error::StoreResult;
use crate::ipc::helpers::{
    optional_status, patch_object, required, required_str, run, status_value, string_value,
    term_value, year_value, Op,
};
use crate::ipc::types::{AppState, Request};
use crate::model::EntityKind;
use crate::store::{self, ListFilter, NewSemester, SemesterPatch};
use rusqlite::Connection;
use serde_json::{json, Value};

fn list(conn: &Connection, params: &Value) -> StoreResult<Value> {
    let filter = ListFilter {
        status: optional_status(params, "status")?,
        ..Default::default()
    };
    let semesters = store::list_semesters(conn, &filter)?;
    Ok(json!({ "semesters": semesters }))
}

fn create(conn: &Connection, params: &Value) -> StoreResult<Value> {
    let semester = store::create_semester(
        conn,
        NewSemester {
            name: required_str(params, "name")?.to_string(),
            year: year_value(required(params, "year")?, "year")?,
            term: term_value(required(params, "term")?, "term")?,
            status: optional_status(params, "status")?.unwrap_or_default(),
        },
    )?;
    Ok(json!({ "semester": semester }))
}

fn update(conn: &Connection, params: &Value) -> StoreResult<Value> {
    let id = required_str(params, "semesterId")?;
    let mut patch = SemesterPatch::default();
    for (k, v) in patch_object(params, &["name", "year", "term", "status"])? {
        match k.as_str() {
            "name" => patch.name = Some(string_value(v, k)?),
            "year" => patch.year = Some(year_value(v, k)?),
            "term" => patch.term = Some(term_value(v, k)?),
            "status" => patch.status = Some(status_value(v, k)?),
            _ => {}
        }
    }
    let semester = store::update_semester(conn, id, patch)?;
    Ok(json!({ "semester": semester }))
}

fn delete(conn: &Connection, params: &Value) -> StoreResult<Value> {
    let id = required_str(params, "semesterId")?;
    let report = cascade::delete_with_cascade(conn, EntityKind::Semester, id)?;
    Ok(json!({ "ok": true, "deleted": report.to_json() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let op: Op = match req.method.as_str() {
        "semesters.list" => list,
        "semesters.create" => create,
        "semesters.update" => update,
        "semesters.delete" => delete,
        _ => return None,
    };
    let empty = (req.method == "semesters.list").then_some("semesters");
    Some(run(state, req, op, empty))
}
