// CLI tests for the playground client
// Evaluation commands run against a mocked evaluation service

use assert_cmd::Command;
use feel_playground::share::{decode_share_state, encode_share_url, encode_text};
use mockito::Matcher;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use url::Url;

fn playground_cmd(settings_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("feel-playground").unwrap();
    cmd.env_remove("FEEL_PLAYGROUND_API_URL")
        .env_remove("FEEL_PLAYGROUND_TIMEOUT_MS")
        .arg("-d")
        .arg(settings_dir.path());
    cmd
}

#[tokio::test]
async fn test_eval_command_prints_result_and_warnings() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("POST", "/api/v1/feel/evaluate")
        .match_body(Matcher::Json(json!({
            "expression": "x + y",
            "context": {"x": 2, "y": 3},
            "metadata": {"page": "cli"}
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"result": 5, "warnings": [{"type": "deprecation", "message": "foo"}]}"#)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    playground_cmd(&dir)
        .arg("-u")
        .arg(server.url())
        .arg("eval")
        .arg("x + y")
        .arg("--context")
        .arg(r#"{"x": 2, "y": 3}"#)
        .arg("--metadata")
        .arg("page=cli")
        .assert()
        .success()
        .stdout(predicate::str::contains("Result\n5\n"))
        .stdout(predicate::str::contains("[deprecation] foo"));
}

#[tokio::test]
async fn test_eval_command_reports_engine_error() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("POST", "/api/v1/feel/evaluate")
        .with_status(200)
        .with_body(
            r#"{"error": "Failed to parse expression '1+' at 1:5: unexpected end of input", "warnings": []}"#,
        )
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    playground_cmd(&dir)
        .arg("-u")
        .arg(server.url())
        .arg("eval")
        .arg("1+")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Error on line 1 at position 5"))
        .stdout(predicate::str::contains("<none>"));
}

#[test]
fn test_invalid_context_is_rejected_locally() {
    let dir = tempfile::tempdir().unwrap();
    // Nothing listens here; a request would be a transport failure instead.
    playground_cmd(&dir)
        .arg("-u")
        .arg("http://127.0.0.1:9")
        .arg("eval")
        .arg("x")
        .arg("--context")
        .arg("{invalid")
        .assert()
        .failure()
        .stdout(predicate::str::contains("failed to parse context: "))
        .stdout(predicate::str::contains("unreachable").not());
}

#[test]
fn test_unreachable_service_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    playground_cmd(&dir)
        .arg("-u")
        .arg("http://127.0.0.1:9")
        .arg("--output")
        .arg("json")
        .arg("eval")
        .arg("1")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Evaluation service unreachable"))
        .stdout(predicate::str::contains(r#""kind": "transport""#));
}

#[tokio::test]
async fn test_unary_command_sends_input_value() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/v1/feel-unary-tests/evaluate")
        .match_body(Matcher::PartialJson(json!({
            "expression": "< 10",
            "inputValue": 7
        })))
        .with_status(200)
        .with_body(r#"{"result": true, "warnings": []}"#)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    playground_cmd(&dir)
        .arg("-u")
        .arg(server.url())
        .arg("--output")
        .arg("json")
        .arg("unary")
        .arg("< 10")
        .arg("--input-value")
        .arg("7")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""result": "true""#));

    mock.assert_async().await;
}

#[test]
fn test_share_command_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let output = playground_cmd(&dir)
        .arg("share")
        .arg("a + b")
        .arg("--context")
        .arg(r#"{"a": 1, "b": 2}"#)
        .arg("--base-url")
        .arg("https://docs.example.com/playground?lang=en")
        .output()
        .unwrap();
    assert!(output.status.success());

    let link = String::from_utf8(output.stdout).unwrap();
    let url = Url::parse(link.trim()).unwrap();
    let state = decode_share_state(&url).unwrap();
    assert_eq!(state.expression.as_deref(), Some("a + b"));
    assert_eq!(state.context.as_deref(), Some(r#"{"a": 1, "b": 2}"#));
    assert!(url.query_pairs().any(|(k, v)| k == "lang" && v == "en"));
}

#[tokio::test]
async fn test_open_command_evaluates_shared_link() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("POST", "/api/v1/feel/evaluate")
        .match_body(Matcher::PartialJson(json!({
            "expression": "x * 2",
            "context": {"x": 21}
        })))
        .with_status(200)
        .with_body(r#"{"result": 42, "warnings": []}"#)
        .create_async()
        .await;

    let page = Url::parse("https://docs.example.com/playground").unwrap();
    let link = encode_share_url(&page, "x * 2", Some(r#"{"x": 21}"#));

    let dir = tempfile::tempdir().unwrap();
    playground_cmd(&dir)
        .arg("-u")
        .arg(server.url())
        .arg("open")
        .arg(link.as_str())
        .assert()
        .success()
        .stdout(predicate::str::contains("42"));
}

#[test]
fn test_open_command_requires_shared_expression() {
    let dir = tempfile::tempdir().unwrap();
    playground_cmd(&dir)
        .arg("-u")
        .arg("http://127.0.0.1:9")
        .arg("open")
        .arg("https://docs.example.com/playground?lang=en")
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("share link has no expression"));
}

#[test]
fn test_open_command_rejects_bad_link() {
    let dir = tempfile::tempdir().unwrap();
    playground_cmd(&dir)
        .arg("open")
        .arg("not a url")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[tokio::test]
async fn test_version_command() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("GET", "/api/v1/version")
        .with_status(200)
        .with_body(r#"{"feelEngineVersion": "1.17.4"}"#)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    playground_cmd(&dir)
        .arg("-u")
        .arg(server.url())
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("1.17.4"));
}

#[test]
fn test_version_command_unknown_when_unreachable() {
    let dir = tempfile::tempdir().unwrap();
    playground_cmd(&dir)
        .arg("-u")
        .arg("http://127.0.0.1:9")
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::eq("?\n"));
}

#[tokio::test]
async fn test_envelope_command() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("POST", "/api/v1/feel/evaluate")
        .with_status(200)
        .with_body(r#"{"result": "Zee", "warnings": []}"#)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    playground_cmd(&dir)
        .arg("-u")
        .arg(server.url())
        .arg("envelope")
        .arg("name")
        .arg("--context")
        .arg(r#"{"name": "Zee"}"#)
        .assert()
        .success()
        .stdout(predicate::str::contains("Result\n\"Zee\"\n"))
        .stdout(predicate::str::contains("Denver, CO 80216"))
        .stdout(predicate::str::is_match(r"\|\s+Zee\s+\|").unwrap());
}

#[test]
fn test_envelope_with_invalid_context_keeps_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    playground_cmd(&dir)
        .arg("-u")
        .arg("http://127.0.0.1:9")
        .arg("envelope")
        .arg("name")
        .arg("--context")
        .arg("{\"name\": }")
        .assert()
        .failure()
        .stdout(predicate::str::contains("failed to parse context: "))
        .stdout(predicate::str::contains("< Fill in the name here >"));
}

#[test]
fn test_unary_with_invalid_context_is_rejected_locally() {
    let dir = tempfile::tempdir().unwrap();
    playground_cmd(&dir)
        .arg("-u")
        .arg("http://127.0.0.1:9")
        .arg("--output")
        .arg("json")
        .arg("unary")
        .arg("< 10")
        .arg("--input-value")
        .arg("7")
        .arg("--context")
        .arg("[1, 2]")
        .assert()
        .failure()
        .stdout(predicate::str::contains(r#""kind": "local_input""#));
}

#[test]
fn test_settings_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    playground_cmd(&dir)
        .arg("-u")
        .arg("https://feel.example.com")
        .arg("--timeout-ms")
        .arg("1500")
        .arg("settings")
        .arg("--save")
        .assert()
        .success()
        .stdout(predicate::str::contains("Settings saved to"));

    playground_cmd(&dir)
        .arg("settings")
        .assert()
        .success()
        .stdout(predicate::str::contains("https://feel.example.com"))
        .stdout(predicate::str::contains("1500"));
}

#[test]
fn test_metadata_entry_requires_key_value() {
    let dir = tempfile::tempdir().unwrap();
    playground_cmd(&dir)
        .arg("eval")
        .arg("1")
        .arg("--metadata")
        .arg("novalue")
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected key=value"));
}

#[test]
fn test_encode_text_is_standard_base64() {
    assert_eq!(encode_text("1 + 1"), "MSArIDE=");
}
