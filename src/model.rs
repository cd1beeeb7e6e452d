use serde::{Serialize, Serializer};
use serde_json::Value;

pub const ABSENT_TOKEN: &str = "/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Student,
    Subject,
    Semester,
    ExamType,
    Enrollment,
    Grade,
}

impl EntityKind {
    pub fn table(self) -> &'static str {
        match self {
            Self::Student => "students",
            Self::Subject => "subjects",
            Self::Semester => "semesters",
            Self::ExamType => "exam_types",
            Self::Enrollment => "enrollments",
            Self::Grade => "grades",
        }
    }

    /// Singular wire name, used for error details and single-record results.
    pub fn label(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Subject => "subject",
            Self::Semester => "semester",
            Self::ExamType => "examType",
            Self::Enrollment => "enrollment",
            Self::Grade => "grade",
        }
    }

    pub fn plural(self) -> &'static str {
        match self {
            Self::Student => "students",
            Self::Subject => "subjects",
            Self::Semester => "semesters",
            Self::ExamType => "examTypes",
            Self::Enrollment => "enrollments",
            Self::Grade => "grades",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Active,
    Archived,
}

impl Status {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Archived => "archived",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GradeLevel {
    #[serde(rename = "Grade 10")]
    Grade10,
    #[serde(rename = "Grade 11")]
    Grade11,
    #[serde(rename = "Grade 12")]
    Grade12,
}

impl GradeLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Grade 10" => Some(Self::Grade10),
            "Grade 11" => Some(Self::Grade11),
            "Grade 12" => Some(Self::Grade12),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Grade10 => "Grade 10",
            Self::Grade11 => "Grade 11",
            Self::Grade12 => "Grade 12",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Term {
    Spring,
    Fall,
}

impl Term {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Spring" => Some(Self::Spring),
            "Fall" => Some(Self::Fall),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Spring => "Spring",
            Self::Fall => "Fall",
        }
    }
}

/// A recorded exam result: either a number or the absent marker `/`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Score {
    Numeric(f64),
    Absent,
}

impl Score {
    pub fn parse_token(raw: &str) -> Result<Self, String> {
        let t = raw.trim();
        if t == ABSENT_TOKEN {
            return Ok(Self::Absent);
        }
        match t.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Self::Numeric(v)),
            _ => Err(format!(
                "score must be a number or \"{}\" (absent), got {:?}",
                ABSENT_TOKEN, raw
            )),
        }
    }

    pub fn from_json(v: &Value) -> Result<Self, String> {
        match v {
            Value::Number(n) => match n.as_f64() {
                Some(f) if f.is_finite() => Ok(Self::Numeric(f)),
                _ => Err("score must be a finite number".to_string()),
            },
            Value::String(s) => Self::parse_token(s),
            _ => Err(format!(
                "score must be a number or \"{}\" (absent)",
                ABSENT_TOKEN
            )),
        }
    }

    // Stored as (score_value, score_status) like mark states.
    pub fn to_columns(self) -> (Option<f64>, &'static str) {
        match self {
            Self::Numeric(v) => (Some(v), "scored"),
            Self::Absent => (None, "absent"),
        }
    }

    pub fn from_columns(value: Option<f64>, status: &str) -> Option<Self> {
        match (status, value) {
            ("absent", _) => Some(Self::Absent),
            ("scored", Some(v)) => Some(Self::Numeric(v)),
            _ => None,
        }
    }
}

impl Serialize for Score {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Numeric(v) => serializer.serialize_f64(*v),
            Self::Absent => serializer.serialize_str(ABSENT_TOKEN),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub grade_level: GradeLevel,
    pub order: i64,
    pub status: Status,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub status: Status,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Semester {
    pub id: String,
    pub name: String,
    pub year: i64,
    pub term: Term,
    pub status: Status,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamType {
    pub id: String,
    pub name: String,
    pub semester_id: String,
    pub status: Status,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: String,
    pub student_id: String,
    pub subject_id: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub id: String,
    pub student_id: String,
    pub subject_id: String,
    pub exam_type_id: String,
    pub score: Score,
    pub created_at: String,
    pub updated_at: String,
}
