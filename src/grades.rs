use crate::db::now_ts;
use crate::error::{write_err, StoreError, StoreResult};
use crate::model::{EntityKind, Grade, GradeLevel, Score, Student};
use crate::store::{self, GradeKey};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

fn write_score(conn: &Connection, key: &GradeKey, score: Score) -> StoreResult<()> {
    let ts = now_ts();
    let (value, status) = score.to_columns();
    conn.execute(
        "INSERT INTO grades(
           id, student_id, subject_id, exam_type_id, score_value, score_status, created_at, updated_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(student_id, subject_id, exam_type_id) DO UPDATE SET
           score_value = excluded.score_value,
           score_status = excluded.score_status,
           updated_at = excluded.updated_at",
        (
            Uuid::new_v4().to_string(),
            &key.student_id,
            &key.subject_id,
            &key.exam_type_id,
            value,
            status,
            &ts,
            &ts,
        ),
    )
    .map_err(write_err("db_insert_failed", EntityKind::Grade))?;
    Ok(())
}

pub fn grade_by_key(conn: &Connection, key: &GradeKey) -> StoreResult<Option<Grade>> {
    let sql = format!(
        "{} WHERE student_id = ? AND subject_id = ? AND exam_type_id = ?",
        store::GRADE_SELECT
    );
    let grade = conn
        .query_row(
            &sql,
            (&key.student_id, &key.subject_id, &key.exam_type_id),
            store::grade_from_row,
        )
        .optional()?;
    Ok(grade)
}

/// Records `score` for the triple, overwriting any existing grade in place.
pub fn upsert_grade(conn: &Connection, key: &GradeKey, score: Score) -> StoreResult<Grade> {
    store::ensure_grade_parents(conn, key)?;
    write_score(conn, key, score)?;
    grade_by_key(conn, key)?.ok_or_else(|| StoreError::not_found(EntityKind::Grade))
}

/// Active students enrolled in the subject, in display order.
pub fn subject_roster(conn: &Connection, subject_id: &str) -> StoreResult<Vec<Student>> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.name, s.grade_level, s.sort_order, s.status, s.created_at, s.updated_at
         FROM students s
         JOIN enrollments e ON e.student_id = s.id
         WHERE e.subject_id = ? AND s.status = 'active'
         ORDER BY s.sort_order, s.rowid",
    )?;
    let students = stmt
        .query_map([subject_id], store::student_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(students)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetRow {
    pub student_id: String,
    pub name: String,
    pub grade_level: GradeLevel,
    pub order: i64,
    pub grade_id: Option<String>,
    pub score: Option<Score>,
}

pub fn grade_sheet(
    conn: &Connection,
    subject_id: &str,
    exam_type_id: &str,
) -> StoreResult<Vec<SheetRow>> {
    store::ensure_exists(conn, EntityKind::Subject, subject_id)?;
    store::ensure_exists(conn, EntityKind::ExamType, exam_type_id)?;

    let mut rows = Vec::new();
    for student in subject_roster(conn, subject_id)? {
        let key = GradeKey {
            student_id: student.id.clone(),
            subject_id: subject_id.to_string(),
            exam_type_id: exam_type_id.to_string(),
        };
        let grade = grade_by_key(conn, &key)?;
        rows.push(SheetRow {
            student_id: student.id,
            name: student.name,
            grade_level: student.grade_level,
            order: student.order,
            grade_id: grade.as_ref().map(|g| g.id.clone()),
            score: grade.map(|g| g.score),
        });
    }
    Ok(rows)
}

/// Accepts `"50 70 33 / 22"` or a JSON array of scores.
pub fn parse_score_list(raw: &Value) -> StoreResult<Vec<Score>> {
    let indexed_err = |index: usize, message: String| StoreError::InvalidScore { index, message };
    match raw {
        Value::String(s) => s
            .split_whitespace()
            .enumerate()
            .map(|(i, tok)| Score::parse_token(tok).map_err(|m| indexed_err(i, m)))
            .collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| Score::from_json(v).map_err(|m| indexed_err(i, m)))
            .collect(),
        _ => Err(StoreError::validation("scores must be a string or an array")),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub grades: Vec<Grade>,
    pub ignored: usize,
}

/// Assigns `scores` to the subject roster in order. Extra scores are ignored; students
/// past the end of a short list are left untouched.
pub fn batch_upsert(
    conn: &Connection,
    subject_id: &str,
    exam_type_id: &str,
    scores: &[Score],
) -> StoreResult<BatchOutcome> {
    store::ensure_exists(conn, EntityKind::Subject, subject_id)?;
    store::ensure_exists(conn, EntityKind::ExamType, exam_type_id)?;
    let roster = subject_roster(conn, subject_id)?;

    let keys: Vec<GradeKey> = roster
        .iter()
        .take(scores.len())
        .map(|s| GradeKey {
            student_id: s.id.clone(),
            subject_id: subject_id.to_string(),
            exam_type_id: exam_type_id.to_string(),
        })
        .collect();

    let tx = conn.unchecked_transaction().map_err(|source| StoreError::Db {
        code: "db_tx_failed",
        table: None,
        source,
    })?;
    for (key, score) in keys.iter().zip(scores) {
        write_score(&tx, key, *score)?;
    }
    tx.commit().map_err(|source| StoreError::Db {
        code: "db_commit_failed",
        table: None,
        source,
    })?;

    let mut grades = Vec::with_capacity(keys.len());
    for key in &keys {
        if let Some(g) = grade_by_key(conn, key)? {
            grades.push(g);
        }
    }
    let ignored = scores.len().saturating_sub(keys.len());
    tracing::debug!(
        subject_id,
        exam_type_id,
        written = grades.len(),
        ignored,
        "batch grade entry"
    );
    Ok(BatchOutcome { grades, ignored })
}
