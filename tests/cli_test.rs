//! CLI integration tests for the schema-form binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("schema-form"))
}

// Helper to create a temp input file
fn write_temp_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

const NAME_SCHEMA: &str = r#"{
    "type": "object",
    "required": ["name"],
    "properties": {
        "name": { "type": "string" },
        "note": { "type": "string" }
    }
}"#;

mod resolve_command {
    use super::*;

    #[test]
    fn basic_resolve() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", NAME_SCHEMA);

        cmd()
            .args(["resolve", schema.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""required":["name"]"#));
    }

    #[test]
    fn resolve_inlines_refs() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(
            &dir,
            "schema.json",
            r##"{
                "definitions": { "city": { "type": "string", "title": "City" } },
                "type": "object",
                "properties": { "home": { "$ref": "#/definitions/city" } }
            }"##,
        );

        cmd()
            .args(["resolve", schema.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains("City"))
            .stdout(predicate::str::contains("$ref").not());
    }

    #[test]
    fn hidden_field_stays_required_in_index() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", NAME_SCHEMA);
        let ui = write_temp_file(&dir, "ui.json", r#"{"name": {"ui:widget": "hidden"}}"#);

        cmd()
            .args([
                "resolve",
                schema.to_str().unwrap(),
                "--ui",
                ui.to_str().unwrap(),
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""required":["name"]"#))
            .stdout(predicate::str::contains(r#""ui:widget":"hidden""#));
    }

    #[test]
    fn resolve_with_pretty() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", NAME_SCHEMA);

        cmd()
            .args(["resolve", schema.to_str().unwrap(), "--pretty"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\n  \"schema\""));
    }

    #[test]
    fn resolve_with_output_file() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", NAME_SCHEMA);
        let output = dir.path().join("out.json");

        cmd()
            .args([
                "resolve",
                schema.to_str().unwrap(),
                "--output",
                output.to_str().unwrap(),
            ])
            .assert()
            .success()
            .stdout(predicate::str::is_empty());

        let written = fs::read_to_string(&output).unwrap();
        assert!(written.contains(r#""required":["name"]"#));
    }
}

mod project_command {
    use super::*;

    #[test]
    fn unknown_keys_are_dropped() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", NAME_SCHEMA);
        let data = write_temp_file(&dir, "data.json", r#"{"name": "Ann", "junk": 1}"#);

        cmd()
            .args([
                "project",
                schema.to_str().unwrap(),
                "--data",
                data.to_str().unwrap(),
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""values":{"name":"Ann","note":""}"#))
            .stdout(predicate::str::contains("junk").not());
    }

    #[test]
    fn unknown_error_keys_become_exceptions() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", NAME_SCHEMA);
        let errors = write_temp_file(&dir, "errors.json", r#"{"Error": ["boom"]}"#);

        cmd()
            .args([
                "project",
                schema.to_str().unwrap(),
                "--errors",
                errors.to_str().unwrap(),
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""exceptions":{"Error":["boom"]}"#));
    }

    #[test]
    fn ui_disabled_seeds_metas() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", NAME_SCHEMA);
        let ui = write_temp_file(&dir, "ui.json", r#"{"note": {"ui:disabled": true}}"#);

        cmd()
            .args([
                "project",
                schema.to_str().unwrap(),
                "--ui",
                ui.to_str().unwrap(),
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""note":{"ui:disabled":true}"#));
    }
}

mod submit_command {
    use super::*;

    #[test]
    fn missing_required_field() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", NAME_SCHEMA);
        let data = write_temp_file(&dir, "data.json", r#"{"note": "hi"}"#);

        cmd()
            .args([
                "submit",
                schema.to_str().unwrap(),
                "--data",
                data.to_str().unwrap(),
            ])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("Missing required field: name"));
    }

    #[test]
    fn complete_data_is_printed() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", NAME_SCHEMA);
        let data = write_temp_file(&dir, "data.json", r#"{"name": "Ann", "note": "hi"}"#);

        cmd()
            .args([
                "submit",
                schema.to_str().unwrap(),
                "--data",
                data.to_str().unwrap(),
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#"{"name":"Ann","note":"hi"}"#));
    }

    #[test]
    fn filter_empty_drops_blank_optional_fields() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", NAME_SCHEMA);
        let data = write_temp_file(&dir, "data.json", r#"{"name": "Ann"}"#);

        cmd()
            .args([
                "submit",
                schema.to_str().unwrap(),
                "--data",
                data.to_str().unwrap(),
                "--filter-empty",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#"{"name":"Ann"}"#))
            .stdout(predicate::str::contains("note").not());
    }

    #[test]
    fn disabled_fields_are_not_submitted() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", NAME_SCHEMA);
        let data = write_temp_file(&dir, "data.json", r#"{"name": "Ann", "note": "hi"}"#);
        let ui = write_temp_file(&dir, "ui.json", r#"{"note": {"ui:disabled": true}}"#);

        cmd()
            .args([
                "submit",
                schema.to_str().unwrap(),
                "--data",
                data.to_str().unwrap(),
                "--ui",
                ui.to_str().unwrap(),
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("note").not());
    }

    #[test]
    fn json_output_valid() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", NAME_SCHEMA);
        let data = write_temp_file(&dir, "data.json", r#"{"name": "Ann"}"#);

        cmd()
            .args([
                "submit",
                schema.to_str().unwrap(),
                "--data",
                data.to_str().unwrap(),
                "--json",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""valid":true"#));
    }

    #[test]
    fn json_output_invalid() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", NAME_SCHEMA);
        let data = write_temp_file(&dir, "data.json", "{}");

        cmd()
            .args([
                "submit",
                schema.to_str().unwrap(),
                "--data",
                data.to_str().unwrap(),
                "--json",
            ])
            .assert()
            .code(1)
            .stdout(predicate::str::contains(
                r#"{"valid":false,"missing":["name"]}"#,
            ));
    }

    #[test]
    fn grace_period_is_accepted() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", NAME_SCHEMA);
        let data = write_temp_file(&dir, "data.json", r#"{"name": "Ann"}"#);

        cmd()
            .args([
                "submit",
                schema.to_str().unwrap(),
                "--data",
                data.to_str().unwrap(),
                "--grace-ms",
                "10",
            ])
            .assert()
            .success();
    }
}

mod error_handling {
    use super::*;

    #[test]
    fn file_not_found() {
        cmd()
            .args(["resolve", "/nonexistent/schema.json"])
            .assert()
            .code(3)
            .stderr(predicate::str::contains("not found"));
    }

    #[test]
    fn invalid_json() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "bad.json", r#"{ not valid json"#);

        cmd()
            .args(["resolve", schema.to_str().unwrap()])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("invalid JSON"));
    }

    #[test]
    fn unknown_type() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", r#"{"type": "decimal"}"#);

        cmd()
            .args(["resolve", schema.to_str().unwrap()])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("unknown type"));
    }

    #[test]
    fn dangling_ref() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(
            &dir,
            "schema.json",
            r##"{"type": "object", "properties": {"a": {"$ref": "#/definitions/nope"}}}"##,
        );

        cmd()
            .args(["resolve", schema.to_str().unwrap()])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("/properties/a/$ref"));
    }

    #[test]
    fn missing_data_for_submit() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", NAME_SCHEMA);

        cmd()
            .args(["submit", schema.to_str().unwrap()])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--data"));
    }
}

mod help_and_version {
    use super::*;

    #[test]
    fn help_flag() {
        cmd()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("resolve"))
            .stdout(predicate::str::contains("project"))
            .stdout(predicate::str::contains("submit"));
    }

    #[test]
    fn version_flag() {
        cmd()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("schema-form"));
    }
}

#[cfg(feature = "remote")]
mod remote {
    use super::*;

    #[test]
    fn resolve_from_url() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/schema.json")
            .with_header("content-type", "application/json")
            .with_body(NAME_SCHEMA)
            .create();

        cmd()
            .args(["resolve", &format!("{}/schema.json", server.url())])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""required":["name"]"#));
        mock.assert();
    }

    #[test]
    fn resolve_url_404() {
        let mut server = mockito::Server::new();
        let _mock = server.mock("GET", "/missing.json").with_status(404).create();

        cmd()
            .args(["resolve", &format!("{}/missing.json", server.url())])
            .assert()
            .code(3)
            .stderr(predicate::str::contains("failed to fetch"));
    }
}
