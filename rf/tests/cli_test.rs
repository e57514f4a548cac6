//! CLI tests for the rf binary

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const SCHEMA: &str = "fields:\n  - { name: id, type: int }\n  - { name: item, type: string }\n";

fn rf(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("rf").expect("rf binary builds");
    // keep the user's config out of the way
    cmd.current_dir(dir).env("XDG_CONFIG_HOME", dir).env_remove("RUST_LOG");
    cmd
}

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).expect("Failed to write fixture");
    path
}

#[test]
fn test_normalize_prints_canonical_keys() {
    let dir = TempDir::new().unwrap();
    rf(dir.path())
        .args(["normalize", "class-name", "CLASS-NAME", "field.name", "ClassName"])
        .assert()
        .success()
        .stdout("className\nclassName\nfield.name\nclassname\n");
}

#[test]
fn test_normalize_requires_keys() {
    let dir = TempDir::new().unwrap();
    rf(dir.path()).arg("normalize").assert().failure();
}

#[test]
fn test_check_reports_each_file() {
    let dir = TempDir::new().unwrap();
    let schema = write(dir.path(), "schema.yml", SCHEMA);
    let good = write(dir.path(), "good.yml", "type: json\n");
    let grok = write(dir.path(), "grok.yml", "type: grok\nproperties:\n  regular: '%{INT:id}'\n");

    rf(dir.path())
        .arg("check")
        .arg(&good)
        .arg(&grok)
        .arg("--schema")
        .arg(&schema)
        .assert()
        .success()
        .stdout(predicate::str::contains("good.yml").and(predicate::str::contains("grok.yml")));
}

#[test]
fn test_check_fails_when_any_file_fails() {
    let dir = TempDir::new().unwrap();
    let schema = write(dir.path(), "schema.yml", SCHEMA);
    let good = write(dir.path(), "good.yml", "type: json\n");
    let bad = write(dir.path(), "bad.yml", "type: pb\nproperties:\n  class-name: com.example.Missing\n");

    rf(dir.path())
        .arg("check")
        .arg(&good)
        .arg(&bad)
        .arg("--schema")
        .arg(&schema)
        .assert()
        .failure()
        .stdout(predicate::str::contains("com.example.Missing"))
        .stderr(predicate::str::contains("1 of 2 configurations failed"));
}

#[test]
fn test_check_resolves_types_from_registry() {
    let dir = TempDir::new().unwrap();
    let schema = write(dir.path(), "schema.yml", SCHEMA);
    let registry = write(
        dir.path(),
        "types.yml",
        "types:\n  - name: com.example.Order\n    fields:\n      - { name: id, number: 1, type: long }\n",
    );
    let format = write(dir.path(), "pb.yml", "type: pb\nproperties:\n  class-name: com.example.Order\n");

    rf(dir.path())
        .arg("check")
        .arg(&format)
        .arg("--schema")
        .arg(&schema)
        .arg("--registry")
        .arg(&registry)
        .assert()
        .success()
        .stdout(predicate::str::contains("pb"));
}

#[test]
fn test_decode_json_lines_skips_bad_messages() {
    let dir = TempDir::new().unwrap();
    let schema = write(dir.path(), "schema.yml", SCHEMA);
    let format = write(dir.path(), "json.yml", "TYPE: json\n");
    let input = write(
        dir.path(),
        "input.jsonl",
        "{\"id\": 1, \"item\": \"pen\"}\n\nnot json\n{\"id\": \"2\"}\n",
    );

    rf(dir.path())
        .arg("decode")
        .arg("--format")
        .arg(&format)
        .arg("--schema")
        .arg(&schema)
        .arg(&input)
        .assert()
        .success()
        .stdout(
            predicate::str::contains(r#"{"id":1,"item":"pen"}"#)
                .and(predicate::str::contains(r#"{"id":2,"item":null}"#))
                .and(predicate::str::contains("not json").not()),
        )
        .stderr(predicate::str::contains("Skipping undecodable message"));
}

#[test]
fn test_decode_grok_from_stdin() {
    let dir = TempDir::new().unwrap();
    let schema = write(dir.path(), "schema.yml", SCHEMA);
    let format = write(
        dir.path(),
        "grok.yml",
        "type: grok\nproperties:\n  regular: '%{INT:id} %{WORD:item}'\n",
    );

    rf(dir.path())
        .arg("decode")
        .arg("-f")
        .arg(&format)
        .arg("-s")
        .arg(&schema)
        .write_stdin("7 stapler\n")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"{"id":7,"item":"stapler"}"#));
}

#[test]
fn test_decode_binary_protobuf() {
    let dir = TempDir::new().unwrap();
    let schema = write(dir.path(), "schema.yml", SCHEMA);
    let registry = write(
        dir.path(),
        "types.yml",
        "types:\n  - name: com.example.Order\n    fields:\n      - { name: id, number: 1, type: long }\n      - { name: item, number: 2, type: string }\n",
    );
    let format = write(dir.path(), "pb.yml", "type: pb\nproperties:\n  className: com.example.Order\n");
    let input = dir.path().join("order.bin");
    fs::write(&input, [0x08, 0x2a, 0x12, 0x02, b'o', b'k']).unwrap();

    rf(dir.path())
        .arg("decode")
        .arg("--format")
        .arg(&format)
        .arg("--schema")
        .arg(&schema)
        .arg("--registry")
        .arg(&registry)
        .arg("--binary")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"{"id":42,"item":"ok"}"#));
}

#[test]
fn test_config_file_supplies_registry_paths() {
    let dir = TempDir::new().unwrap();
    let schema = write(dir.path(), "schema.yml", SCHEMA);
    let registry = write(
        dir.path(),
        "types.yml",
        "types:\n  - name: com.example.Order\n    fields: []\n",
    );
    let config = write(
        dir.path(),
        "rf.yml",
        &format!("log-level: info\nregistry-paths:\n  - {}\n", registry.display()),
    );
    let format = write(dir.path(), "hessian.yml", "type: hessian\nproperties:\n  class-name: com.example.Order\n");

    rf(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("check")
        .arg(&format)
        .arg("--schema")
        .arg(&schema)
        .assert()
        .success()
        .stderr(predicate::str::contains("Type registry ready"));
}
