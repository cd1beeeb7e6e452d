use crate::error::StoreResult;
use crate::model::{
    Enrollment, EntityKind, ExamType, Grade, GradeLevel, Score, Semester, Status, Student,
    Subject,
};
use crate::store::{self, ListFilter};
use rusqlite::Connection;
use serde::{Serialize, Serializer};
use std::collections::{HashMap, HashSet};

/// Display options that come from workspace settings, not from the data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOptions {
    pub missing_placeholder: String,
    pub label_separator: String,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            missing_placeholder: "-".to_string(),
            label_separator: "-".to_string(),
        }
    }
}

/// Everything the reporting surface reads, loaded through the list operations.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub students: Vec<Student>,
    pub subjects: Vec<Subject>,
    pub semesters: Vec<Semester>,
    pub exam_types: Vec<ExamType>,
    pub enrollments: Vec<Enrollment>,
    pub grades: Vec<Grade>,
}

impl Snapshot {
    pub fn load(conn: &Connection) -> StoreResult<Self> {
        let all = ListFilter::default();
        Ok(Self {
            students: store::list_students(conn, &all)?,
            subjects: store::list_subjects(conn, &all)?,
            semesters: store::list_semesters(conn, &all)?,
            exam_types: store::list_exam_types(conn, &all)?,
            enrollments: store::list_enrollments(conn, &all)?,
            grades: store::list_grades(conn, &all)?,
        })
    }

    pub fn active_semester_ids(&self) -> Vec<String> {
        self.semesters
            .iter()
            .filter(|s| s.status == Status::Active)
            .map(|s| s.id.clone())
            .collect()
    }

    pub fn all_semester_ids(&self) -> Vec<String> {
        self.semesters.iter().map(|s| s.id.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportColumn {
    pub exam_type_id: String,
    pub semester_id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Missing(String),
    Recorded(Score),
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Missing(placeholder) => serializer.serialize_str(placeholder),
            Self::Recorded(score) => score.serialize(serializer),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub student_id: String,
    pub name: String,
    pub grade_level: GradeLevel,
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeReport {
    pub subject_id: String,
    pub subject_name: String,
    pub columns: Vec<ReportColumn>,
    pub rows: Vec<ReportRow>,
}

/// Builds the grade table for one subject.
///
/// Rows come from enrollments of active students, never from grade presence, so a stray
/// grade for an unenrolled student does not surface. Columns are the active exam types of
/// the selected semesters; identical labels are kept as separate columns.
pub fn project(
    snapshot: &Snapshot,
    subject_id: &str,
    semester_ids: &[String],
    options: &ReportOptions,
) -> StoreResult<GradeReport> {
    let subject = snapshot
        .subjects
        .iter()
        .find(|s| s.id == subject_id)
        .ok_or_else(|| crate::error::StoreError::not_found(EntityKind::Subject))?;

    let enrolled: HashSet<&str> = snapshot
        .enrollments
        .iter()
        .filter(|e| e.subject_id == subject_id)
        .map(|e| e.student_id.as_str())
        .collect();
    let mut roster: Vec<&Student> = snapshot
        .students
        .iter()
        .filter(|s| s.status == Status::Active && enrolled.contains(s.id.as_str()))
        .collect();
    roster.sort_by_key(|s| s.order);

    let selected: HashSet<&str> = semester_ids.iter().map(String::as_str).collect();
    let semester_names: HashMap<&str, &str> = snapshot
        .semesters
        .iter()
        .map(|s| (s.id.as_str(), s.name.as_str()))
        .collect();
    let columns: Vec<ReportColumn> = snapshot
        .exam_types
        .iter()
        .filter(|e| e.status == Status::Active && selected.contains(e.semester_id.as_str()))
        .map(|e| ReportColumn {
            exam_type_id: e.id.clone(),
            semester_id: e.semester_id.clone(),
            label: format!(
                "{}{}{}",
                semester_names
                    .get(e.semester_id.as_str())
                    .copied()
                    .unwrap_or(""),
                options.label_separator,
                e.name
            ),
        })
        .collect();

    let scores: HashMap<(&str, &str), Score> = snapshot
        .grades
        .iter()
        .filter(|g| g.subject_id == subject_id)
        .map(|g| ((g.student_id.as_str(), g.exam_type_id.as_str()), g.score))
        .collect();

    let rows = roster
        .into_iter()
        .map(|student| ReportRow {
            student_id: student.id.clone(),
            name: student.name.clone(),
            grade_level: student.grade_level,
            cells: columns
                .iter()
                .map(|c| {
                    match scores.get(&(student.id.as_str(), c.exam_type_id.as_str())) {
                        Some(score) => Cell::Recorded(*score),
                        None => Cell::Missing(options.missing_placeholder.clone()),
                    }
                })
                .collect(),
        })
        .collect();

    Ok(GradeReport {
        subject_id: subject.id.clone(),
        subject_name: subject.name.clone(),
        columns,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Term;
    use serde_json::json;

    fn ts() -> String {
        "2024-09-01T00:00:00.000Z".to_string()
    }

    fn student(id: &str, order: i64, status: Status) -> Student {
        Student {
            id: id.into(),
            name: id.to_uppercase(),
            grade_level: GradeLevel::Grade10,
            order,
            status,
            created_at: ts(),
            updated_at: ts(),
        }
    }

    fn semester(id: &str, name: &str, status: Status) -> Semester {
        Semester {
            id: id.into(),
            name: name.into(),
            year: 2024,
            term: Term::Fall,
            status,
            created_at: ts(),
            updated_at: ts(),
        }
    }

    fn exam(id: &str, name: &str, semester_id: &str, status: Status) -> ExamType {
        ExamType {
            id: id.into(),
            name: name.into(),
            semester_id: semester_id.into(),
            status,
            created_at: ts(),
            updated_at: ts(),
        }
    }

    fn enroll(student: &str, subject: &str) -> Enrollment {
        Enrollment {
            id: format!("{}-{}", student, subject),
            student_id: student.into(),
            subject_id: subject.into(),
            created_at: ts(),
            updated_at: ts(),
        }
    }

    fn grade(student: &str, subject: &str, exam: &str, score: Score) -> Grade {
        Grade {
            id: format!("{}-{}-{}", student, subject, exam),
            student_id: student.into(),
            subject_id: subject.into(),
            exam_type_id: exam.into(),
            score,
            created_at: ts(),
            updated_at: ts(),
        }
    }

    fn snapshot() -> Snapshot {
        Snapshot {
            students: vec![
                student("b", 1, Status::Active),
                student("a", 0, Status::Active),
                student("c", 2, Status::Active),
                student("z", 3, Status::Archived),
            ],
            subjects: vec![Subject {
                id: "math".into(),
                name: "Math".into(),
                status: Status::Active,
                created_at: ts(),
                updated_at: ts(),
            }],
            semesters: vec![
                semester("fall", "Fall2024", Status::Active),
                semester("spring", "Spring2025", Status::Archived),
            ],
            exam_types: vec![
                exam("mid", "Midterm", "fall", Status::Active),
                exam("fin", "Final", "fall", Status::Archived),
                exam("smid", "Midterm", "spring", Status::Active),
            ],
            enrollments: vec![
                enroll("a", "math"),
                enroll("b", "math"),
                enroll("z", "math"),
            ],
            grades: vec![
                grade("a", "math", "mid", Score::Numeric(88.0)),
                grade("b", "math", "smid", Score::Absent),
                // "c" is not enrolled; this row must not surface.
                grade("c", "math", "mid", Score::Numeric(40.0)),
            ],
        }
    }

    #[test]
    fn filters_columns_to_active_exams_of_selected_semesters() {
        let snap = snapshot();
        let r = project(&snap, "math", &["fall".to_string()], &ReportOptions::default())
            .expect("report");
        let labels: Vec<_> = r.columns.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["Fall2024-Midterm"]);
    }

    #[test]
    fn rows_key_off_enrollment_of_active_students_in_order() {
        let snap = snapshot();
        let r = project(&snap, "math", &["fall".to_string()], &ReportOptions::default())
            .expect("report");
        let ids: Vec<_> = r.rows.iter().map(|row| row.student_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(r.rows[0].cells, vec![Cell::Recorded(Score::Numeric(88.0))]);
        assert_eq!(r.rows[1].cells, vec![Cell::Missing("-".into())]);
    }

    #[test]
    fn absent_marker_passes_through_and_placeholder_is_configurable() {
        let snap = snapshot();
        let opts = ReportOptions {
            missing_placeholder: "n/a".into(),
            label_separator: " / ".into(),
        };
        let r = project(&snap, "math", &snap.all_semester_ids(), &opts).expect("report");
        let labels: Vec<_> = r.columns.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["Fall2024 / Midterm", "Spring2025 / Midterm"]);
        let v = serde_json::to_value(&r.rows[1]).expect("serialize");
        assert_eq!(v["cells"], json!(["n/a", "/"]));
    }

    #[test]
    fn empty_semester_selection_yields_rows_without_columns() {
        let snap = snapshot();
        let r = project(&snap, "math", &[], &ReportOptions::default()).expect("report");
        assert!(r.columns.is_empty());
        assert_eq!(r.rows.len(), 2);
        assert!(r.rows.iter().all(|row| row.cells.is_empty()));
    }

    #[test]
    fn unknown_subject_is_not_found() {
        let snap = snapshot();
        let e = project(&snap, "art", &[], &ReportOptions::default()).expect_err("missing");
        assert_eq!(e.code(), "not_found");
    }

    #[test]
    fn duplicate_labels_stay_separate_columns() {
        let mut snap = snapshot();
        snap.semesters.push(semester("fall-b", "Fall2024", Status::Active));
        snap.exam_types
            .push(exam("mid-b", "Midterm", "fall-b", Status::Active));
        let r = project(
            &snap,
            "math",
            &["fall".to_string(), "fall-b".to_string()],
            &ReportOptions::default(),
        )
        .expect("report");
        assert_eq!(r.columns.len(), 2);
        assert_eq!(r.columns[0].label, r.columns[1].label);
        assert_ne!(r.columns[0].exam_type_id, r.columns[1].exam_type_id);
    }

    #[test]
    fn active_semester_ids_skip_archived() {
        assert_eq!(snapshot().active_semester_ids(), vec!["fall".to_string()]);
    }
}
