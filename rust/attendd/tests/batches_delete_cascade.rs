mod test_support;

use serde_json::json;
use test_support::{create_student, open_empty_workspace, request_err, request_ok, spawn_sidecar};

#[test]
fn deleting_a_batch_removes_its_students_and_attendance_only() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let workspace = open_empty_workspace(&mut stdin, &mut reader, "attendd-batch-cascade");

    let _ = request_ok(&mut stdin, &mut reader, "1", "batches.create", json!({ "name": "A" }));
    let _ = request_ok(&mut stdin, &mut reader, "2", "batches.create", json!({ "name": "B" }));
    assert_eq!(
        request_err(&mut stdin, &mut reader, "3", "batches.create", json!({ "name": " A " })),
        "duplicate"
    );
    create_student(&mut stdin, &mut reader, "a1", "Ann", "A");
    create_student(&mut stdin, &mut reader, "a2", "Abe", "A");
    create_student(&mut stdin, &mut reader, "b1", "Bea", "B");
    for (i, batch) in ["A", "B"].into_iter().enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("m{}", i),
            "attendance.mark",
            json!({ "batch": batch, "date": "2024-03-01" }),
        );
    }
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "trainings.log",
        json!({ "batch": "A", "date": "2024-03-01", "topic": "Intro" }),
    );

    let deleted = request_ok(&mut stdin, &mut reader, "5", "batches.delete", json!({ "name": "A" }));
    assert_eq!(deleted["removed"]["studentsRemoved"], json!(2));
    assert_eq!(deleted["removed"]["attendanceRemoved"], json!(2));

    let batches = request_ok(&mut stdin, &mut reader, "6", "batches.list", json!({}));
    let names: Vec<&str> = batches["batches"]
        .as_array()
        .expect("batches")
        .iter()
        .filter_map(|b| b["name"].as_str())
        .collect();
    assert_eq!(names, vec!["B"]);

    let students = request_ok(&mut stdin, &mut reader, "7", "students.list", json!({}));
    assert_eq!(students["students"].as_array().map(|a| a.len()), Some(1));
    let attendance = request_ok(&mut stdin, &mut reader, "8", "attendance.list", json!({}));
    let records = attendance["records"].as_array().expect("records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["studentId"], json!("b1"));

    // Training logs are history and outlive the batch.
    let trainings = request_ok(&mut stdin, &mut reader, "9", "trainings.list", json!({}));
    assert_eq!(trainings["trainings"].as_array().map(|a| a.len()), Some(1));

    assert_eq!(
        request_err(&mut stdin, &mut reader, "10", "batches.delete", json!({ "name": "A" })),
        "not_found"
    );
    assert_eq!(
        request_err(
            &mut stdin,
            &mut reader,
            "11",
            "students.create",
            json!({ "name": "Zed", "batch": "A", "course": "C", "contact": "z" }),
        ),
        "invalid_reference"
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
