use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tempfile::TempDir;

fn temp_dir(prefix: &str) -> TempDir {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("create temp dir")
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_gradebookd");
    let mut child = Command::new(exe)
        .env_remove("GRADEBOOKD_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradebookd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error")
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded",
        method
    );
    value.get("error").cloned().unwrap_or_else(|| json!({}))
}

fn open_workspace(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    workspace: &TempDir,
) {
    request_ok(
        stdin,
        reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.path().to_string_lossy() }),
    );
}

fn create_id(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    label: &str,
    params: serde_json::Value,
) -> String {
    let result = request_ok(stdin, reader, id, method, params);
    result
        .get(label)
        .and_then(|v| v.get("id"))
        .and_then(|v| v.as_str())
        .expect("created id")
        .to_string()
}

fn student_order(result: &serde_json::Value) -> i64 {
    result["student"]["order"].as_i64().expect("order")
}

#[test]
fn students_are_ordered_by_creation_and_orders_are_not_reused() {
    let workspace = temp_dir("gradebook-students-order");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    open_workspace(&mut stdin, &mut reader, &workspace);

    let mut orders = Vec::new();
    let mut ids = Vec::new();
    for (i, name) in ["Ada", "Grace", "Edsger"].iter().enumerate() {
        let result = request_ok(
            &mut stdin,
            &mut reader,
            &format!("c{}", i),
            "students.create",
            json!({ "name": name, "gradeLevel": "Grade 11" }),
        );
        assert_eq!(result["student"]["status"], json!("active"));
        orders.push(student_order(&result));
        ids.push(result["student"]["id"].as_str().expect("id").to_string());
    }
    assert!(orders.windows(2).all(|w| w[0] < w[1]), "{:?}", orders);

    request_ok(
        &mut stdin,
        &mut reader,
        "d",
        "students.delete",
        json!({ "studentId": ids[2] }),
    );
    let next = request_ok(
        &mut stdin,
        &mut reader,
        "c3",
        "students.create",
        json!({ "name": "Barbara", "gradeLevel": "Grade 12" }),
    );
    assert!(student_order(&next) > orders[2]);

    let list = request_ok(&mut stdin, &mut reader, "l", "students.list", json!({}));
    let names: Vec<_> = list["students"]
        .as_array()
        .expect("students")
        .iter()
        .map(|s| s["name"].as_str().unwrap_or("").to_string())
        .collect();
    assert_eq!(names, vec!["Ada", "Grace", "Barbara"]);

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn invalid_update_leaves_student_unchanged() {
    let workspace = temp_dir("gradebook-students-update");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    open_workspace(&mut stdin, &mut reader, &workspace);

    let id = create_id(
        &mut stdin,
        &mut reader,
        "1",
        "students.create",
        "student",
        json!({ "name": "Ada", "gradeLevel": "Grade 10" }),
    );

    let e = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "students.update",
        json!({ "studentId": id, "patch": { "gradeLevel": "Grade 9" } }),
    );
    assert_eq!(e["code"], json!("bad_params"));

    let e = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "students.update",
        json!({ "studentId": id, "patch": { "order": 0 } }),
    );
    assert_eq!(e["code"], json!("bad_params"));

    let e = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "students.create",
        json!({ "name": "  ", "gradeLevel": "Grade 10" }),
    );
    assert_eq!(e["code"], json!("bad_params"));

    let e = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "students.update",
        json!({ "studentId": "missing", "patch": { "name": "X" } }),
    );
    assert_eq!(e["code"], json!("not_found"));
    assert_eq!(e["details"]["kind"], json!("student"));

    let list = request_ok(&mut stdin, &mut reader, "6", "students.list", json!({}));
    let students = list["students"].as_array().expect("students");
    assert_eq!(students.len(), 1);
    assert_eq!(students[0]["gradeLevel"], json!("Grade 10"));
    assert_eq!(students[0]["name"], json!("Ada"));

    let archived = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "students.update",
        json!({ "studentId": id, "patch": { "status": "archived" } }),
    );
    assert_eq!(archived["student"]["status"], json!("archived"));
    assert_eq!(archived["student"]["createdAt"], students[0]["createdAt"]);
    let active = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "students.list",
        json!({ "status": "active" }),
    );
    assert_eq!(active["students"], json!([]));

    drop(stdin);
    let _ = child.wait();
}
