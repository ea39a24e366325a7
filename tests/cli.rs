//! Integration tests running the `mdconv` binary.

mod common;

use std::path::Path;
use std::process::{Command, Output};

use mdconv::{read_model, write_model, Format};

use tempfile::tempdir;

fn mdconv(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_mdconv"))
        .arg("-q")
        .args(args)
        .output()
        .expect("Failed to run mdconv")
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("temp paths are UTF-8")
}

#[test]
fn test_batch_converts_every_input() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.md3");
    let b = dir.path().join("b.md3");
    write_model(&common::morph_model(&[0.0, 1.0]), &a, Format::Md3).unwrap();
    write_model(&common::morph_model(&[0.0, 2.0, 4.0]), &b, Format::Md3).unwrap();
    let out = dir.path().join("out");

    let run = mdconv(&["batch", path_str(&out), "mdc", path_str(&a), path_str(&b)]);
    assert!(run.status.success(), "stderr: {}", String::from_utf8_lossy(&run.stderr));
    assert!(String::from_utf8_lossy(&run.stdout).contains("Converted 2/2 files"));

    let (format, outcome) = read_model(out.join("b.mdc")).unwrap();
    assert_eq!(format, Format::Mdc);
    assert_eq!(outcome.value.frame_count(), 3);
    assert!(out.join("a.mdc").exists());
}

#[test]
fn test_batch_reports_failures() {
    let dir = tempdir().unwrap();
    let good = dir.path().join("good.md3");
    let bad = dir.path().join("bad.md3");
    write_model(&common::morph_model(&[0.0]), &good, Format::Md3).unwrap();
    std::fs::write(&bad, b"IDP3 but nothing else").unwrap();
    let out = dir.path().join("out");

    let run = mdconv(&["batch", path_str(&out), "md3", path_str(&good), path_str(&bad)]);
    assert!(!run.status.success());
    assert!(String::from_utf8_lossy(&run.stderr).contains("bad.md3"));
    assert!(String::from_utf8_lossy(&run.stdout).contains("Converted 1/2 files"));
    assert!(out.join("good.md3").exists());
}

#[test]
fn test_check_and_json_info() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("plate.mdc");
    write_model(&common::morph_model(&[0.0, 0.5, 9.0]), &path, Format::Mdc).unwrap();

    let check = mdconv(&["check", path_str(&path)]);
    assert!(check.status.success());

    let info = mdconv(&["info", path_str(&path), "--json"]);
    assert!(info.status.success());
    let value: serde_json::Value = serde_json::from_slice(&info.stdout).unwrap();
    assert_eq!(value["format"], "MDC");
    assert_eq!(value["summary"]["frames"], 3);
    assert_eq!(value["summary"]["surfaces"][0]["name"], "plate");
}
