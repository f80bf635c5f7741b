use std::process::{Command, Output};

fn monument(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_monument"))
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .expect("failed to invoke the monument binary")
}

fn stdout_lines(output: &Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_owned)
        .collect()
}

#[test]
fn encoded_snapshots_restore_through_the_binary() {
    let encoded = monument(&[
        "encode",
        "--total",
        "900",
        "--range",
        "0:820:0",
        "--range",
        "820:900:1",
    ]);
    assert!(encoded.status.success(), "encode should succeed");
    let snapshot = stdout_lines(&encoded).pop().expect("snapshot line");
    assert!(snapshot.starts_with("monument:v1:900:"));

    let restored = monument(&["restore", "--snapshot", &snapshot]);
    assert!(restored.status.success(), "restore should succeed");
    let lines = stdout_lines(&restored);
    assert_eq!(
        lines.first().map(String::as_str),
        Some("restored 900 of 900 blocks")
    );
    let total = lines.last().expect("summary line");
    assert!(
        total.starts_with("total: 900/"),
        "unexpected summary {total}"
    );
    assert!(
        total.ends_with("placed, 900 landed"),
        "unexpected summary {total}"
    );
}

#[test]
fn overlapping_ranges_are_rejected() {
    let output = monument(&[
        "encode", "--total", "10", "--range", "0:6:0", "--range", "4:10:1",
    ]);
    assert!(!output.status.success());
}

#[test]
fn built_in_catalog_exports_as_json() {
    let output = monument(&["export-catalog"]);
    assert!(output.status.success());
    let json = String::from_utf8_lossy(&output.stdout);
    assert!(json.contains("mortuary_temple"));
}
