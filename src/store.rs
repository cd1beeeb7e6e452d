use crate::db::now_ts;
use crate::error::{write_err, StoreError, StoreResult};
use crate::model::{
    Enrollment, EntityKind, ExamType, Grade, GradeLevel, Score, Semester, Status, Student,
    Subject, Term,
};
use rusqlite::types::{
    FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Type, Value, ValueRef,
};
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use uuid::Uuid;

macro_rules! text_enum_sql {
    ($t:ty) => {
        impl ToSql for $t {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $t {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let s = value.as_str()?;
                <$t>::parse(s)
                    .ok_or_else(|| FromSqlError::Other(format!("unexpected value {:?}", s).into()))
            }
        }
    };
}

text_enum_sql!(Status);
text_enum_sql!(GradeLevel);
text_enum_sql!(Term);

#[derive(Debug, Clone)]
pub struct NewStudent {
    pub name: String,
    pub grade_level: GradeLevel,
    pub status: Status,
}

#[derive(Debug, Clone, Default)]
pub struct StudentPatch {
    pub name: Option<String>,
    pub grade_level: Option<GradeLevel>,
    pub status: Option<Status>,
}

#[derive(Debug, Clone)]
pub struct NewSubject {
    pub name: String,
    pub status: Status,
}

#[derive(Debug, Clone, Default)]
pub struct SubjectPatch {
    pub name: Option<String>,
    pub status: Option<Status>,
}

#[derive(Debug, Clone)]
pub struct NewSemester {
    pub name: String,
    pub year: i64,
    pub term: Term,
    pub status: Status,
}

#[derive(Debug, Clone, Default)]
pub struct SemesterPatch {
    pub name: Option<String>,
    pub year: Option<i64>,
    pub term: Option<Term>,
    pub status: Option<Status>,
}

#[derive(Debug, Clone)]
pub struct NewExamType {
    pub name: String,
    pub semester_id: String,
    pub status: Status,
}

#[derive(Debug, Clone, Default)]
pub struct ExamTypePatch {
    pub name: Option<String>,
    pub semester_id: Option<String>,
    pub status: Option<Status>,
}

#[derive(Debug, Clone, Default)]
pub struct EnrollmentPatch {
    pub student_id: Option<String>,
    pub subject_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GradeKey {
    pub student_id: String,
    pub subject_id: String,
    pub exam_type_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct GradePatch {
    pub student_id: Option<String>,
    pub subject_id: Option<String>,
    pub exam_type_id: Option<String>,
    pub score: Option<Score>,
}

/// Column equality filters for the list operations. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub status: Option<Status>,
    pub semester_id: Option<String>,
    pub student_id: Option<String>,
    pub subject_id: Option<String>,
    pub exam_type_id: Option<String>,
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn require_name(name: &str) -> StoreResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StoreError::validation("name must not be empty"));
    }
    Ok(name.to_string())
}

pub fn ensure_exists(conn: &Connection, kind: EntityKind, id: &str) -> StoreResult<()> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?", kind.table());
    let found: Option<i64> = conn.query_row(&sql, [id], |r| r.get(0)).optional()?;
    match found {
        Some(_) => Ok(()),
        None => Err(StoreError::not_found(kind)),
    }
}

fn list_where<T>(
    conn: &Connection,
    select: &str,
    clauses: Vec<(&'static str, Value)>,
    order_by: &str,
    map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
) -> StoreResult<Vec<T>> {
    let mut sql = select.to_string();
    let mut params = Vec::with_capacity(clauses.len());
    for (i, (col, v)) in clauses.into_iter().enumerate() {
        sql.push_str(if i == 0 { " WHERE " } else { " AND " });
        sql.push_str(col);
        sql.push_str(" = ?");
        params.push(v);
    }
    sql.push_str(" ORDER BY ");
    sql.push_str(order_by);

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(params), map)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn apply_patch(
    conn: &Connection,
    kind: EntityKind,
    id: &str,
    sets: Vec<(&'static str, Value)>,
) -> StoreResult<()> {
    if sets.is_empty() {
        return Err(StoreError::validation("patch must set at least one field"));
    }
    let mut sql = format!("UPDATE {} SET ", kind.table());
    let mut params = Vec::with_capacity(sets.len() + 2);
    for (col, v) in sets {
        sql.push_str(col);
        sql.push_str(" = ?, ");
        params.push(v);
    }
    sql.push_str("updated_at = ? WHERE id = ?");
    params.push(Value::Text(now_ts()));
    params.push(Value::Text(id.to_string()));

    let changed = conn
        .execute(&sql, params_from_iter(params))
        .map_err(write_err("db_update_failed", kind))?;
    if changed == 0 {
        return Err(StoreError::not_found(kind));
    }
    Ok(())
}

fn get_one<T>(
    conn: &Connection,
    kind: EntityKind,
    select: &str,
    id: &str,
    map: impl FnOnce(&Row<'_>) -> rusqlite::Result<T>,
) -> StoreResult<T> {
    let sql = format!("{} WHERE id = ?", select);
    conn.query_row(&sql, [id], map)
        .optional()?
        .ok_or_else(|| StoreError::not_found(kind))
}

fn status_clause(clauses: &mut Vec<(&'static str, Value)>, status: Option<Status>) {
    if let Some(s) = status {
        clauses.push(("status", Value::Text(s.as_str().to_string())));
    }
}

fn id_clause(clauses: &mut Vec<(&'static str, Value)>, col: &'static str, id: &Option<String>) {
    if let Some(v) = id {
        clauses.push((col, Value::Text(v.clone())));
    }
}

// ---- students ----

const STUDENT_SELECT: &str =
    "SELECT id, name, grade_level, sort_order, status, created_at, updated_at FROM students";

pub(crate) fn student_from_row(row: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: row.get(0)?,
        name: row.get(1)?,
        grade_level: row.get(2)?,
        order: row.get(3)?,
        status: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

pub fn create_student(conn: &Connection, new: NewStudent) -> StoreResult<Student> {
    let name = require_name(&new.name)?;
    // Append position; never reuses the slot of a deleted student.
    let order: i64 = conn.query_row(
        "INSERT INTO counters(name, value)
         VALUES('student_order', (SELECT COALESCE(MAX(sort_order), -1) + 1 FROM students))
         ON CONFLICT(name) DO UPDATE SET value = value + 1
         RETURNING value",
        [],
        |r| r.get(0),
    )?;
    let ts = now_ts();
    let student = Student {
        id: new_id(),
        name,
        grade_level: new.grade_level,
        order,
        status: new.status,
        created_at: ts.clone(),
        updated_at: ts,
    };
    conn.execute(
        "INSERT INTO students(id, name, grade_level, sort_order, status, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &student.id,
            &student.name,
            student.grade_level,
            student.order,
            student.status,
            &student.created_at,
            &student.updated_at,
        ),
    )
    .map_err(write_err("db_insert_failed", EntityKind::Student))?;
    Ok(student)
}

pub fn list_students(conn: &Connection, filter: &ListFilter) -> StoreResult<Vec<Student>> {
    let mut clauses = Vec::new();
    status_clause(&mut clauses, filter.status);
    list_where(conn, STUDENT_SELECT, clauses, "sort_order, rowid", student_from_row)
}

pub fn get_student(conn: &Connection, id: &str) -> StoreResult<Student> {
    get_one(conn, EntityKind::Student, STUDENT_SELECT, id, student_from_row)
}

pub fn update_student(conn: &Connection, id: &str, patch: StudentPatch) -> StoreResult<Student> {
    let mut sets = Vec::new();
    if let Some(name) = patch.name {
        sets.push(("name", Value::Text(require_name(&name)?)));
    }
    if let Some(g) = patch.grade_level {
        sets.push(("grade_level", Value::Text(g.as_str().to_string())));
    }
    if let Some(s) = patch.status {
        sets.push(("status", Value::Text(s.as_str().to_string())));
    }
    apply_patch(conn, EntityKind::Student, id, sets)?;
    get_student(conn, id)
}

// ---- subjects ----

const SUBJECT_SELECT: &str = "SELECT id, name, status, created_at, updated_at FROM subjects";

fn subject_from_row(row: &Row<'_>) -> rusqlite::Result<Subject> {
    Ok(Subject {
        id: row.get(0)?,
        name: row.get(1)?,
        status: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

pub fn create_subject(conn: &Connection, new: NewSubject) -> StoreResult<Subject> {
    let ts = now_ts();
    let subject = Subject {
        id: new_id(),
        name: require_name(&new.name)?,
        status: new.status,
        created_at: ts.clone(),
        updated_at: ts,
    };
    conn.execute(
        "INSERT INTO subjects(id, name, status, created_at, updated_at) VALUES(?, ?, ?, ?, ?)",
        (
            &subject.id,
            &subject.name,
            subject.status,
            &subject.created_at,
            &subject.updated_at,
        ),
    )
    .map_err(write_err("db_insert_failed", EntityKind::Subject))?;
    Ok(subject)
}

pub fn list_subjects(conn: &Connection, filter: &ListFilter) -> StoreResult<Vec<Subject>> {
    let mut clauses = Vec::new();
    status_clause(&mut clauses, filter.status);
    list_where(conn, SUBJECT_SELECT, clauses, "rowid", subject_from_row)
}

pub fn get_subject(conn: &Connection, id: &str) -> StoreResult<Subject> {
    get_one(conn, EntityKind::Subject, SUBJECT_SELECT, id, subject_from_row)
}

pub fn update_subject(conn: &Connection, id: &str, patch: SubjectPatch) -> StoreResult<Subject> {
    let mut sets = Vec::new();
    if let Some(name) = patch.name {
        sets.push(("name", Value::Text(require_name(&name)?)));
    }
    if let Some(s) = patch.status {
        sets.push(("status", Value::Text(s.as_str().to_string())));
    }
    apply_patch(conn, EntityKind::Subject, id, sets)?;
    get_subject(conn, id)
}

// ---- semesters ----

const SEMESTER_SELECT: &str =
    "SELECT id, name, year, term, status, created_at, updated_at FROM semesters";

fn semester_from_row(row: &Row<'_>) -> rusqlite::Result<Semester> {
    Ok(Semester {
        id: row.get(0)?,
        name: row.get(1)?,
        year: row.get(2)?,
        term: row.get(3)?,
        status: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

pub fn create_semester(conn: &Connection, new: NewSemester) -> StoreResult<Semester> {
    let ts = now_ts();
    let semester = Semester {
        id: new_id(),
        name: require_name(&new.name)?,
        year: new.year,
        term: new.term,
        status: new.status,
        created_at: ts.clone(),
        updated_at: ts,
    };
    conn.execute(
        "INSERT INTO semesters(id, name, year, term, status, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &semester.id,
            &semester.name,
            semester.year,
            semester.term,
            semester.status,
            &semester.created_at,
            &semester.updated_at,
        ),
    )
    .map_err(write_err("db_insert_failed", EntityKind::Semester))?;
    Ok(semester)
}

pub fn list_semesters(conn: &Connection, filter: &ListFilter) -> StoreResult<Vec<Semester>> {
    let mut clauses = Vec::new();
    status_clause(&mut clauses, filter.status);
    list_where(conn, SEMESTER_SELECT, clauses, "rowid", semester_from_row)
}

pub fn get_semester(conn: &Connection, id: &str) -> StoreResult<Semester> {
    get_one(conn, EntityKind::Semester, SEMESTER_SELECT, id, semester_from_row)
}

pub fn update_semester(
    conn: &Connection,
    id: &str,
    patch: SemesterPatch,
) -> StoreResult<Semester> {
    let mut sets = Vec::new();
    if let Some(name) = patch.name {
        sets.push(("name", Value::Text(require_name(&name)?)));
    }
    if let Some(y) = patch.year {
        sets.push(("year", Value::Integer(y)));
    }
    if let Some(t) = patch.term {
        sets.push(("term", Value::Text(t.as_str().to_string())));
    }
    if let Some(s) = patch.status {
        sets.push(("status", Value::Text(s.as_str().to_string())));
    }
    apply_patch(conn, EntityKind::Semester, id, sets)?;
    get_semester(conn, id)
}

// ---- exam types ----

const EXAM_TYPE_SELECT: &str =
    "SELECT id, name, semester_id, status, created_at, updated_at FROM exam_types";

fn exam_type_from_row(row: &Row<'_>) -> rusqlite::Result<ExamType> {
    Ok(ExamType {
        id: row.get(0)?,
        name: row.get(1)?,
        semester_id: row.get(2)?,
        status: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

pub fn create_exam_type(conn: &Connection, new: NewExamType) -> StoreResult<ExamType> {
    let name = require_name(&new.name)?;
    ensure_exists(conn, EntityKind::Semester, &new.semester_id)?;
    let ts = now_ts();
    let exam_type = ExamType {
        id: new_id(),
        name,
        semester_id: new.semester_id,
        status: new.status,
        created_at: ts.clone(),
        updated_at: ts,
    };
    conn.execute(
        "INSERT INTO exam_types(id, name, semester_id, status, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &exam_type.id,
            &exam_type.name,
            &exam_type.semester_id,
            exam_type.status,
            &exam_type.created_at,
            &exam_type.updated_at,
        ),
    )
    .map_err(write_err("db_insert_failed", EntityKind::ExamType))?;
    Ok(exam_type)
}

pub fn list_exam_types(conn: &Connection, filter: &ListFilter) -> StoreResult<Vec<ExamType>> {
    let mut clauses = Vec::new();
    status_clause(&mut clauses, filter.status);
    id_clause(&mut clauses, "semester_id", &filter.semester_id);
    list_where(conn, EXAM_TYPE_SELECT, clauses, "rowid", exam_type_from_row)
}

pub fn get_exam_type(conn: &Connection, id: &str) -> StoreResult<ExamType> {
    get_one(conn, EntityKind::ExamType, EXAM_TYPE_SELECT, id, exam_type_from_row)
}

pub fn update_exam_type(
    conn: &Connection,
    id: &str,
    patch: ExamTypePatch,
) -> StoreResult<ExamType> {
    ensure_exists(conn, EntityKind::ExamType, id)?;
    let mut sets = Vec::new();
    if let Some(name) = patch.name {
        sets.push(("name", Value::Text(require_name(&name)?)));
    }
    if let Some(semester_id) = patch.semester_id {
        ensure_exists(conn, EntityKind::Semester, &semester_id)?;
        sets.push(("semester_id", Value::Text(semester_id)));
    }
    if let Some(s) = patch.status {
        sets.push(("status", Value::Text(s.as_str().to_string())));
    }
    apply_patch(conn, EntityKind::ExamType, id, sets)?;
    get_exam_type(conn, id)
}

// ---- enrollments ----

const ENROLLMENT_SELECT: &str =
    "SELECT id, student_id, subject_id, created_at, updated_at FROM enrollments";

fn enrollment_from_row(row: &Row<'_>) -> rusqlite::Result<Enrollment> {
    Ok(Enrollment {
        id: row.get(0)?,
        student_id: row.get(1)?,
        subject_id: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

pub fn create_enrollment(
    conn: &Connection,
    student_id: &str,
    subject_id: &str,
) -> StoreResult<Enrollment> {
    ensure_exists(conn, EntityKind::Student, student_id)?;
    ensure_exists(conn, EntityKind::Subject, subject_id)?;
    let ts = now_ts();
    let enrollment = Enrollment {
        id: new_id(),
        student_id: student_id.to_string(),
        subject_id: subject_id.to_string(),
        created_at: ts.clone(),
        updated_at: ts,
    };
    conn.execute(
        "INSERT INTO enrollments(id, student_id, subject_id, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?)",
        (
            &enrollment.id,
            &enrollment.student_id,
            &enrollment.subject_id,
            &enrollment.created_at,
            &enrollment.updated_at,
        ),
    )
    .map_err(write_err("db_insert_failed", EntityKind::Enrollment))?;
    Ok(enrollment)
}

pub fn list_enrollments(conn: &Connection, filter: &ListFilter) -> StoreResult<Vec<Enrollment>> {
    let mut clauses = Vec::new();
    id_clause(&mut clauses, "student_id", &filter.student_id);
    id_clause(&mut clauses, "subject_id", &filter.subject_id);
    list_where(conn, ENROLLMENT_SELECT, clauses, "rowid", enrollment_from_row)
}

pub fn get_enrollment(conn: &Connection, id: &str) -> StoreResult<Enrollment> {
    get_one(conn, EntityKind::Enrollment, ENROLLMENT_SELECT, id, enrollment_from_row)
}

pub fn find_enrollment_id(
    conn: &Connection,
    student_id: &str,
    subject_id: &str,
) -> StoreResult<Option<String>> {
    let id = conn
        .query_row(
            "SELECT id FROM enrollments WHERE student_id = ? AND subject_id = ?",
            (student_id, subject_id),
            |r| r.get(0),
        )
        .optional()?;
    Ok(id)
}

pub fn update_enrollment(
    conn: &Connection,
    id: &str,
    patch: EnrollmentPatch,
) -> StoreResult<Enrollment> {
    ensure_exists(conn, EntityKind::Enrollment, id)?;
    let mut sets = Vec::new();
    if let Some(student_id) = patch.student_id {
        ensure_exists(conn, EntityKind::Student, &student_id)?;
        sets.push(("student_id", Value::Text(student_id)));
    }
    if let Some(subject_id) = patch.subject_id {
        ensure_exists(conn, EntityKind::Subject, &subject_id)?;
        sets.push(("subject_id", Value::Text(subject_id)));
    }
    apply_patch(conn, EntityKind::Enrollment, id, sets)?;
    get_enrollment(conn, id)
}

// ---- grades ----

pub(crate) const GRADE_SELECT: &str = "SELECT id, student_id, subject_id, exam_type_id, score_value, score_status, created_at, updated_at FROM grades";

pub(crate) fn grade_from_row(row: &Row<'_>) -> rusqlite::Result<Grade> {
    let value: Option<f64> = row.get(4)?;
    let status: String = row.get(5)?;
    let score = Score::from_columns(value, &status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            Type::Text,
            format!("unexpected score state {:?}", status).into(),
        )
    })?;
    Ok(Grade {
        id: row.get(0)?,
        student_id: row.get(1)?,
        subject_id: row.get(2)?,
        exam_type_id: row.get(3)?,
        score,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

pub(crate) fn ensure_grade_parents(conn: &Connection, key: &GradeKey) -> StoreResult<()> {
    ensure_exists(conn, EntityKind::Student, &key.student_id)?;
    ensure_exists(conn, EntityKind::Subject, &key.subject_id)?;
    ensure_exists(conn, EntityKind::ExamType, &key.exam_type_id)?;
    Ok(())
}

/// Plain create; a second write to the same triple is a conflict. Re-entry goes through
/// `grades::upsert_grade`.
pub fn create_grade(conn: &Connection, key: GradeKey, score: Score) -> StoreResult<Grade> {
    ensure_grade_parents(conn, &key)?;
    let ts = now_ts();
    let grade = Grade {
        id: new_id(),
        student_id: key.student_id,
        subject_id: key.subject_id,
        exam_type_id: key.exam_type_id,
        score,
        created_at: ts.clone(),
        updated_at: ts,
    };
    let (value, status) = score.to_columns();
    conn.execute(
        "INSERT INTO grades(
           id, student_id, subject_id, exam_type_id, score_value, score_status, created_at, updated_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &grade.id,
            &grade.student_id,
            &grade.subject_id,
            &grade.exam_type_id,
            value,
            status,
            &grade.created_at,
            &grade.updated_at,
        ),
    )
    .map_err(write_err("db_insert_failed", EntityKind::Grade))?;
    Ok(grade)
}

pub fn list_grades(conn: &Connection, filter: &ListFilter) -> StoreResult<Vec<Grade>> {
    let mut clauses = Vec::new();
    id_clause(&mut clauses, "student_id", &filter.student_id);
    id_clause(&mut clauses, "subject_id", &filter.subject_id);
    id_clause(&mut clauses, "exam_type_id", &filter.exam_type_id);
    list_where(conn, GRADE_SELECT, clauses, "rowid", grade_from_row)
}

pub fn get_grade(conn: &Connection, id: &str) -> StoreResult<Grade> {
    get_one(conn, EntityKind::Grade, GRADE_SELECT, id, grade_from_row)
}

pub fn update_grade(conn: &Connection, id: &str, patch: GradePatch) -> StoreResult<Grade> {
    ensure_exists(conn, EntityKind::Grade, id)?;
    let mut sets = Vec::new();
    if let Some(student_id) = patch.student_id {
        ensure_exists(conn, EntityKind::Student, &student_id)?;
        sets.push(("student_id", Value::Text(student_id)));
    }
    if let Some(subject_id) = patch.subject_id {
        ensure_exists(conn, EntityKind::Subject, &subject_id)?;
        sets.push(("subject_id", Value::Text(subject_id)));
    }
    if let Some(exam_type_id) = patch.exam_type_id {
        ensure_exists(conn, EntityKind::ExamType, &exam_type_id)?;
        sets.push(("exam_type_id", Value::Text(exam_type_id)));
    }
    if let Some(score) = patch.score {
        let (value, status) = score.to_columns();
        sets.push(("score_value", value.map(Value::Real).unwrap_or(Value::Null)));
        sets.push(("score_status", Value::Text(status.to_string())));
    }
    apply_patch(conn, EntityKind::Grade, id, sets)?;
    get_grade(conn, id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    fn student(conn: &Connection, name: &str) -> Student {
        create_student(
            conn,
            NewStudent {
                name: name.to_string(),
                grade_level: GradeLevel::Grade10,
                status: Status::Active,
            },
        )
        .expect("create student")
    }

    fn subject(conn: &Connection, name: &str) -> Subject {
        create_subject(
            conn,
            NewSubject {
                name: name.to_string(),
                status: Status::Active,
            },
        )
        .expect("create subject")
    }

    #[test]
    fn student_order_is_append_position_and_not_reused() {
        let conn = open_in_memory();
        let a = student(&conn, "A");
        let b = student(&conn, "B");
        assert!(a.order < b.order);

        conn.execute("DELETE FROM students WHERE id = ?", [&b.id])
            .expect("delete");
        let c = student(&conn, "C");
        assert!(c.order > b.order);

        let names: Vec<_> = list_students(&conn, &ListFilter::default())
            .expect("list")
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["A", "C"]);
    }

    #[test]
    fn create_rejects_blank_name_without_writing() {
        let conn = open_in_memory();
        let e = create_subject(
            &conn,
            NewSubject {
                name: "   ".into(),
                status: Status::Active,
            },
        )
        .expect_err("blank name");
        assert_eq!(e.code(), "bad_params");
        assert!(list_subjects(&conn, &ListFilter::default())
            .expect("list")
            .is_empty());
    }

    #[test]
    fn update_merges_fields_and_keeps_created_at() {
        let conn = open_in_memory();
        let s = student(&conn, "Ada");
        let updated = update_student(
            &conn,
            &s.id,
            StudentPatch {
                status: Some(Status::Archived),
                ..Default::default()
            },
        )
        .expect("update");
        assert_eq!(updated.name, "Ada");
        assert_eq!(updated.status, Status::Archived);
        assert_eq!(updated.created_at, s.created_at);
        assert!(updated.updated_at >= s.updated_at);

        let e = update_student(&conn, &s.id, StudentPatch::default()).expect_err("empty");
        assert_eq!(e.code(), "bad_params");
        let e = update_student(
            &conn,
            "missing",
            StudentPatch {
                name: Some("X".into()),
                ..Default::default()
            },
        )
        .expect_err("missing");
        assert_eq!(e.code(), "not_found");
    }

    #[test]
    fn enrollment_pair_is_unique() {
        let conn = open_in_memory();
        let s = student(&conn, "Ada");
        let sub = subject(&conn, "Math");
        create_enrollment(&conn, &s.id, &sub.id).expect("first");
        let e = create_enrollment(&conn, &s.id, &sub.id).expect_err("duplicate");
        assert!(matches!(
            e,
            StoreError::Conflict {
                kind: EntityKind::Enrollment
            }
        ));
        assert!(find_enrollment_id(&conn, &s.id, &sub.id)
            .expect("find")
            .is_some());
    }

    #[test]
    fn references_must_exist() {
        let conn = open_in_memory();
        let e = create_exam_type(
            &conn,
            NewExamType {
                name: "Midterm".into(),
                semester_id: "nope".into(),
                status: Status::Active,
            },
        )
        .expect_err("missing semester");
        assert!(matches!(
            e,
            StoreError::NotFound {
                kind: EntityKind::Semester
            }
        ));

        let s = student(&conn, "Ada");
        let e = create_enrollment(&conn, &s.id, "nope").expect_err("missing subject");
        assert!(matches!(
            e,
            StoreError::NotFound {
                kind: EntityKind::Subject
            }
        ));
    }

    #[test]
    fn list_filters_by_status() {
        let conn = open_in_memory();
        let a = student(&conn, "A");
        student(&conn, "B");
        update_student(
            &conn,
            &a.id,
            StudentPatch {
                status: Some(Status::Archived),
                ..Default::default()
            },
        )
        .expect("archive");
        let active = list_students(
            &conn,
            &ListFilter {
                status: Some(Status::Active),
                ..Default::default()
            },
        )
        .expect("list");
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "B");
    }

    fn exam_type(conn: &Connection, name: &str) -> ExamType {
        let semester = create_semester(
            conn,
            NewSemester {
                name: "Fall2024".into(),
                year: 2024,
                term: Term::Fall,
                status: Status::Active,
            },
        )
        .expect("create semester");
        create_exam_type(
            conn,
            NewExamType {
                name: name.to_string(),
                semester_id: semester.id,
                status: Status::Active,
            },
        )
        .expect("create exam type")
    }

    #[test]
    fn repointing_grade_onto_taken_triple_conflicts_and_changes_nothing() {
        let conn = open_in_memory();
        let s = student(&conn, "Ada");
        let sub = subject(&conn, "Math");
        let midterm = exam_type(&conn, "Midterm");
        let final_exam = exam_type(&conn, "Final");
        let key = |e: &ExamType| GradeKey {
            student_id: s.id.clone(),
            subject_id: sub.id.clone(),
            exam_type_id: e.id.clone(),
        };
        let g1 = create_grade(&conn, key(&midterm), Score::Numeric(60.0)).expect("g1");
        let g2 = create_grade(&conn, key(&final_exam), Score::Numeric(80.0)).expect("g2");

        let e = update_grade(
            &conn,
            &g1.id,
            GradePatch {
                exam_type_id: Some(final_exam.id.clone()),
                score: Some(Score::Absent),
                ..Default::default()
            },
        )
        .expect_err("taken triple");
        assert!(matches!(
            e,
            StoreError::Conflict {
                kind: EntityKind::Grade
            }
        ));
        assert_eq!(get_grade(&conn, &g1.id).expect("g1 after"), g1);
        assert_eq!(get_grade(&conn, &g2.id).expect("g2 after"), g2);
    }

    #[test]
    fn repointing_enrollment_onto_taken_pair_conflicts_and_changes_nothing() {
        let conn = open_in_memory();
        let ada = student(&conn, "Ada");
        let grace = student(&conn, "Grace");
        let sub = subject(&conn, "Math");
        let first = create_enrollment(&conn, &ada.id, &sub.id).expect("first");
        let second = create_enrollment(&conn, &grace.id, &sub.id).expect("second");

        let e = update_enrollment(
            &conn,
            &second.id,
            EnrollmentPatch {
                student_id: Some(ada.id.clone()),
                ..Default::default()
            },
        )
        .expect_err("taken pair");
        assert_eq!(e.code(), "conflict");
        assert_eq!(e.details(), Some(serde_json::json!({ "kind": "enrollment" })));
        assert_eq!(get_enrollment(&conn, &first.id).expect("first after"), first);
        assert_eq!(get_enrollment(&conn, &second.id).expect("second after"), second);
    }

    #[test]
    fn repointing_at_missing_parent_is_not_found_naming_the_parent() {
        let conn = open_in_memory();
        let midterm = exam_type(&conn, "Midterm");
        let e = update_exam_type(
            &conn,
            &midterm.id,
            ExamTypePatch {
                semester_id: Some("nope".into()),
                ..Default::default()
            },
        )
        .expect_err("missing semester");
        assert_eq!(e.code(), "not_found");
        assert_eq!(e.details(), Some(serde_json::json!({ "kind": "semester" })));
        assert_eq!(get_exam_type(&conn, &midterm.id).expect("unchanged"), midterm);

        let s = student(&conn, "Ada");
        let sub = subject(&conn, "Math");
        let g = create_grade(
            &conn,
            GradeKey {
                student_id: s.id.clone(),
                subject_id: sub.id.clone(),
                exam_type_id: midterm.id.clone(),
            },
            Score::Numeric(70.0),
        )
        .expect("grade");
        let e = update_grade(
            &conn,
            &g.id,
            GradePatch {
                exam_type_id: Some("nope".into()),
                ..Default::default()
            },
        )
        .expect_err("missing exam type");
        assert_eq!(e.details(), Some(serde_json::json!({ "kind": "examType" })));
    }

    #[test]
    fn missing_record_is_reported_before_missing_parent() {
        let conn = open_in_memory();
        let e = update_enrollment(
            &conn,
            "missing",
            EnrollmentPatch {
                subject_id: Some("nope".into()),
                ..Default::default()
            },
        )
        .expect_err("missing enrollment");
        assert_eq!(e.details(), Some(serde_json::json!({ "kind": "enrollment" })));

        let e = update_grade(
            &conn,
            "missing",
            GradePatch {
                exam_type_id: Some("nope".into()),
                ..Default::default()
            },
        )
        .expect_err("missing grade");
        assert_eq!(e.details(), Some(serde_json::json!({ "kind": "grade" })));

        let e = update_exam_type(
            &conn,
            "missing",
            ExamTypePatch {
                semester_id: Some("nope".into()),
                ..Default::default()
            },
        )
        .expect_err("missing exam type");
        assert_eq!(e.details(), Some(serde_json::json!({ "kind": "examType" })));
    }
}
