use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_gradebookd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradebookd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request_ok(
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
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn algebra_paste() -> String {
    [
        "Jefferson High Portal",
        "Grade Book",
        "Term S1",
        "Algebra II",
        "Mr. Patel",
        "Assignments",
        "\t4/02",
        "Chapter 5 Test",
        "\t0\tAll Tasks / Assessments",
        "88 out of 100",
        "\t3/25",
        "Quiz 3",
        "\t0\tAll Tasks / Assessments",
        "85 out of 100",
        "\t3/18",
        "Homework 12",
        "\t0\tPractice / Preparation",
        "9 out of 10",
        "Feedback",
    ]
    .join("\n")
}

fn percentage_of(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    class_id: &str,
) -> f64 {
    let summary = request_ok(
        stdin,
        reader,
        id,
        "grades.summary",
        json!({ "classId": class_id }),
    );
    summary
        .get("percentage")
        .and_then(|v| v.as_f64())
        .expect("percentage")
}

fn assignment_id_by_name(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    class_id: &str,
    name: &str,
) -> String {
    let got = request_ok(stdin, reader, id, "classes.get", json!({ "classId": class_id }));
    got.get("class")
        .and_then(|c| c.get("assignments"))
        .and_then(|v| v.as_array())
        .and_then(|assignments| {
            assignments
                .iter()
                .find(|a| a.get("name").and_then(|v| v.as_str()) == Some(name))
        })
        .and_then(|a| a.get("id"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .expect("assignment id")
}

#[test]
fn score_edits_are_undoable_and_redoable() {
    let workspace = temp_dir("gradebook-edit-history");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let import = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "gradebook.import",
        json!({ "rawText": algebra_paste() }),
    );
    let class_id = import["classes"][0]["classId"]
        .as_str()
        .expect("classId")
        .to_string();

    let baseline = percentage_of(&mut stdin, &mut reader, "3", &class_id);
    assert!((baseline - 86.85).abs() < 1e-9);

    let quiz_id = assignment_id_by_name(&mut stdin, &mut reader, "4", &class_id, "Quiz 3");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "assignments.update",
        json!({
            "classId": class_id,
            "assignmentId": quiz_id,
            "updates": { "earnedScore": 95 }
        }),
    );
    // 90-group becomes 183/200 = 91.5 -> (91.5*90 + 90*10)/100 = 91.35.
    let bumped = percentage_of(&mut stdin, &mut reader, "6", &class_id);
    assert!((bumped - 91.35).abs() < 1e-9, "bumped {}", bumped);

    let undo = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "classes.undo",
        json!({ "classId": class_id }),
    );
    assert_eq!(undo.get("changed").and_then(|v| v.as_bool()), Some(true));
    let back = percentage_of(&mut stdin, &mut reader, "8", &class_id);
    assert!((back - 86.85).abs() < 1e-9, "after undo {}", back);

    let redo = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "classes.redo",
        json!({ "classId": class_id }),
    );
    assert_eq!(redo.get("changed").and_then(|v| v.as_bool()), Some(true));
    let again = percentage_of(&mut stdin, &mut reader, "10", &class_id);
    assert!((again - 91.35).abs() < 1e-9, "after redo {}", again);

    // Undoing past the first edit is a no-op, not an error.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "classes.undo",
        json!({ "classId": class_id }),
    );
    let exhausted = request_ok(
        &mut stdin,
        &mut reader,
        "12",
        "classes.undo",
        json!({ "classId": class_id }),
    );
    assert_eq!(exhausted.get("changed").and_then(|v| v.as_bool()), Some(false));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn blanked_scores_count_as_zero_until_refilled() {
    let workspace = temp_dir("gradebook-blank-score");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let import = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "gradebook.import",
        json!({ "rawText": algebra_paste() }),
    );
    let class_id = import["classes"][0]["classId"]
        .as_str()
        .expect("classId")
        .to_string();
    let quiz_id = assignment_id_by_name(&mut stdin, &mut reader, "3", &class_id, "Quiz 3");

    // Blank the cell the way an in-progress edit does.
    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "assignments.update",
        json!({
            "classId": class_id,
            "assignmentId": quiz_id,
            "updates": { "earnedScore": "" }
        }),
    );
    let stored = updated["class"]["assignments"]
        .as_array()
        .and_then(|a| {
            a.iter()
                .find(|x| x.get("id").and_then(|v| v.as_str()) == Some(quiz_id.as_str()))
        })
        .cloned()
        .expect("updated assignment");
    assert_eq!(stored.get("earnedScore"), Some(&json!("")));

    // 90-group becomes 88/200 = 44 -> (44*90 + 90*10)/100 = 48.6.
    let blanked = percentage_of(&mut stdin, &mut reader, "5", &class_id);
    assert!((blanked - 48.6).abs() < 1e-9, "blanked {}", blanked);

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn delete_then_add_keeps_assignment_ids_distinct() {
    let workspace = temp_dir("gradebook-id-uniqueness");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let import = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "gradebook.import",
        json!({ "rawText": algebra_paste() }),
    );
    let class_id = import["classes"][0]["classId"]
        .as_str()
        .expect("classId")
        .to_string();
    let quiz_id = assignment_id_by_name(&mut stdin, &mut reader, "3", &class_id, "Quiz 3");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "assignments.delete",
        json!({ "classId": class_id, "assignmentId": quiz_id }),
    );

    let added = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "assignments.add",
        json!({
            "classId": class_id,
            "assignment": {
                "name": "Final Exam",
                "date": "5/20, 2031",
                "weight": 90,
                "earnedScore": 50,
                "totalScore": 50
            }
        }),
    );
    let assignments = added["class"]["assignments"]
        .as_array()
        .cloned()
        .expect("assignments");
    assert_eq!(assignments.len(), 3);

    let mut ids: Vec<String> = assignments
        .iter()
        .map(|a| a["id"].as_str().expect("id").to_string())
        .collect();
    let total = ids.len();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), total, "assignment ids must stay pairwise distinct");

    // Undo removes the added exam again; a second undo restores the quiz.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "classes.undo",
        json!({ "classId": class_id }),
    );
    let undone = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "classes.undo",
        json!({ "classId": class_id }),
    );
    let names: Vec<String> = undone["class"]["assignments"]
        .as_array()
        .expect("assignments")
        .iter()
        .map(|a| a["name"].as_str().expect("name").to_string())
        .collect();
    assert!(names.contains(&"Quiz 3".to_string()));
    assert!(!names.contains(&"Final Exam".to_string()));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
