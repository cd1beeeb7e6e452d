use crate::error::{StoreError, StoreResult};
use crate::ipc::handlers::setup::{report_settings, SemesterFilter};
use crate::ipc::helpers::{required_str, run, Op};
use crate::ipc::types::{AppState, Request};
use crate::report::{self, Snapshot};
use rusqlite::Connection;
use serde_json::{json, Value};

fn semester_ids(params: &Value) -> StoreResult<Option<Vec<String>>> {
    match params.get("semesterIds") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| StoreError::validation("semesterIds must be strings"))
            })
            .collect::<StoreResult<Vec<_>>>()
            .map(Some),
        Some(_) => Err(StoreError::validation("semesterIds must be an array")),
    }
}

fn grade_table(conn: &Connection, params: &Value) -> StoreResult<Value> {
    let subject_id = required_str(params, "subjectId")?;
    let requested = semester_ids(params)?;
    let (options, default_filter) = report_settings(conn).map_err(StoreError::Settings)?;

    let snapshot = Snapshot::load(conn)?;
    let semester_ids = match requested {
        Some(ids) => ids,
        None => match default_filter {
            SemesterFilter::Active => snapshot.active_semester_ids(),
            SemesterFilter::All => snapshot.all_semester_ids(),
        },
    };
    let table = report::project(&snapshot, subject_id, &semester_ids, &options)?;
    Ok(json!({ "semesterIds": semester_ids, "report": table }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let op: Op = match req.method.as_str() {
        "reports.gradeTable" => grade_table,
        _ => return None,
    };
    Some(run(state, req, op, None))
}
