use crate::error::{StoreError, StoreResult};
use crate::model::EntityKind;
use rusqlite::Connection;
use serde_json::{Map, Value};

/// Which id a cleanup step matches dependents against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// The id of the record being deleted.
    Parent,
    /// Each id gathered by the rule's `collect` query before anything is removed.
    Collected,
}

#[derive(Debug, Clone, Copy)]
pub struct Collect {
    pub kind: EntityKind,
    pub column: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct Step {
    pub kind: EntityKind,
    pub column: &'static str,
    pub key: Key,
}

#[derive(Debug, Clone, Copy)]
pub struct CascadeRule {
    pub parent: EntityKind,
    pub collect: Option<Collect>,
    pub steps: &'static [Step],
}

pub const RULES: &[CascadeRule] = &[
    CascadeRule {
        parent: EntityKind::Student,
        collect: None,
        steps: &[
            Step {
                kind: EntityKind::Enrollment,
                column: "student_id",
                key: Key::Parent,
            },
            Step {
                kind: EntityKind::Grade,
                column: "student_id",
                key: Key::Parent,
            },
        ],
    },
    CascadeRule {
        parent: EntityKind::Subject,
        collect: None,
        steps: &[
            Step {
                kind: EntityKind::Enrollment,
                column: "subject_id",
                key: Key::Parent,
            },
            Step {
                kind: EntityKind::Grade,
                column: "subject_id",
                key: Key::Parent,
            },
        ],
    },
    CascadeRule {
        parent: EntityKind::Semester,
        collect: Some(Collect {
            kind: EntityKind::ExamType,
            column: "semester_id",
        }),
        steps: &[
            Step {
                kind: EntityKind::Grade,
                column: "exam_type_id",
                key: Key::Collected,
            },
            Step {
                kind: EntityKind::ExamType,
                column: "id",
                key: Key::Collected,
            },
        ],
    },
    CascadeRule {
        parent: EntityKind::ExamType,
        collect: None,
        steps: &[Step {
            kind: EntityKind::Grade,
            column: "exam_type_id",
            key: Key::Parent,
        }],
    },
    CascadeRule {
        parent: EntityKind::Enrollment,
        collect: None,
        steps: &[],
    },
    CascadeRule {
        parent: EntityKind::Grade,
        collect: None,
        steps: &[],
    },
];

pub fn rule_for(kind: EntityKind) -> Option<&'static CascadeRule> {
    RULES.iter().find(|r| r.parent == kind)
}

/// Rows removed per kind, in the order they were first touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeReport {
    pub deleted: Vec<(EntityKind, usize)>,
}

impl CascadeReport {
    fn add(&mut self, kind: EntityKind, n: usize) {
        if let Some(entry) = self.deleted.iter_mut().find(|(k, _)| *k == kind) {
            entry.1 += n;
        } else {
            self.deleted.push((kind, n));
        }
    }

    #[cfg(test)]
    pub fn count(&self, kind: EntityKind) -> usize {
        self.deleted
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        for (kind, n) in &self.deleted {
            obj.insert(kind.plural().to_string(), Value::from(*n as u64));
        }
        Value::Object(obj)
    }
}

fn delete_err(kind: EntityKind) -> impl FnOnce(rusqlite::Error) -> StoreError {
    move |source| StoreError::Db {
        code: "db_delete_failed",
        table: Some(kind.table()),
        source,
    }
}

/// Deletes `id` of `kind` together with every dependent named by its rule, as one transaction.
pub fn delete_with_cascade(
    conn: &Connection,
    kind: EntityKind,
    id: &str,
) -> StoreResult<CascadeReport> {
    let rule = rule_for(kind).ok_or_else(|| {
        StoreError::validation(format!("no delete rule for {}", kind.label()))
    })?;

    let tx = conn.unchecked_transaction().map_err(|source| StoreError::Db {
        code: "db_tx_failed",
        table: None,
        source,
    })?;

    crate::store::ensure_exists(&tx, kind, id)?;

    let collected: Vec<String> = match rule.collect {
        Some(c) => {
            let sql = format!("SELECT id FROM {} WHERE {} = ?", c.kind.table(), c.column);
            let mut stmt = tx.prepare(&sql)?;
            let ids = stmt
                .query_map([id], |r| r.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            ids
        }
        None => Vec::new(),
    };

    let mut report = CascadeReport::default();
    for step in rule.steps {
        let sql = format!("DELETE FROM {} WHERE {} = ?", step.kind.table(), step.column);
        let keys: Vec<&str> = match step.key {
            Key::Parent => vec![id],
            Key::Collected => collected.iter().map(String::as_str).collect(),
        };
        let mut n = 0;
        for key in keys {
            n += tx.execute(&sql, [key]).map_err(delete_err(step.kind))?;
        }
        report.add(step.kind, n);
    }

    let sql = format!("DELETE FROM {} WHERE id = ?", kind.table());
    let n = tx.execute(&sql, [id]).map_err(delete_err(kind))?;
    report.add(kind, n);

    tx.commit().map_err(|source| StoreError::Db {
        code: "db_commit_failed",
        table: None,
        source,
    })?;

    tracing::info!(
        kind = kind.label(),
        id,
        deleted = %report.to_json(),
        "cascade delete"
    );
    Ok(report)
}
