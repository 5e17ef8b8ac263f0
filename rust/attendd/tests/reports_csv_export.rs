mod test_support;

use serde_json::json;
use test_support::{create_student, open_empty_workspace, request_err, request_ok, spawn_sidecar};

#[test]
fn csv_export_writes_header_plus_one_row_per_student() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let workspace = open_empty_workspace(&mut stdin, &mut reader, "attendd-reports-csv");

    let _ = request_ok(&mut stdin, &mut reader, "1", "batches.create", json!({ "name": "A" }));
    create_student(&mut stdin, &mut reader, "s1", "Ann", "A");
    create_student(&mut stdin, &mut reader, "s2", "Bob", "A");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.mark",
        json!({ "batch": "A", "date": "2024-03-01" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "attendance.mark",
        json!({ "batch": "A", "date": "2024-03-02", "marks": { "s2": "absent" } }),
    );

    let report = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "reports.batchReport",
        json!({ "batch": "A", "date": "2024-03-02" }),
    );
    assert_eq!(report["asOf"], json!("2024-03-02"));
    assert_eq!(report["summary"]["excellent"], json!(1));
    assert_eq!(report["summary"]["low"], json!(1));

    let out_dir = workspace.join("exports");
    let export = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "reports.exportCsv",
        json!({ "outDir": out_dir.to_string_lossy(), "date": "2024-03-02" }),
    );
    assert_eq!(export["fileName"], json!("batch-report-2024-03-02.csv"));
    assert_eq!(export["rowsExported"], json!(2));

    let path = export["path"].as_str().expect("path");
    let text = std::fs::read_to_string(path).expect("read csv");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "Name,Batch,Course,Attendance %,Status");
    assert!(lines.contains(&"Ann,A,Python,100%,Excellent"));
    assert!(lines.contains(&"Bob,A,Python,50%,Low"));

    assert_eq!(
        request_err(&mut stdin, &mut reader, "6", "reports.exportCsv", json!({})),
        "bad_params"
    );
    assert_eq!(
        request_err(
            &mut stdin,
            &mut reader,
            "7",
            "reports.batchReport",
            json!({ "batch": "Nope" }),
        ),
        "not_found"
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
