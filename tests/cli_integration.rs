// CLI integration tests for offline flows and error envelopes.
use std::process::Command;

use serde_json::Value;

const SECRET: &str = "0101010101010101010101010101010101010101010101010101010101010101";

fn cmd() -> Command {
    let exe = env!("CARGO_BIN_EXE_pubkycore");
    let mut command = Command::new(exe);
    command
        .env_remove("PUBKY_SECRET_KEY")
        .env_remove("PUBKY_ADMIN_PASSWORD")
        .env_remove("PUBKY_PKARR_RELAYS")
        .env_remove("PUBKY_HTTP_RELAY")
        .env_remove("RUST_LOG");
    command
}

fn parse_json(value: &str) -> Value {
    serde_json::from_str(value).expect("valid json")
}

fn parse_json_line(output: &[u8]) -> Value {
    let text = String::from_utf8_lossy(output);
    let line = text.lines().next().expect("json line");
    parse_json(line)
}

fn stdout_line(output: &[u8]) -> String {
    String::from_utf8_lossy(output).trim_end().to_string()
}

#[test]
fn keygen_then_pubkey_agree() {
    let keygen = cmd().arg("keygen").output().expect("keygen");
    assert!(keygen.status.success());
    let keys = parse_json_line(&keygen.stdout);
    let secret = keys["secret_key"].as_str().expect("secret_key");
    assert_eq!(secret.len(), 64);
    assert!(
        keys["uri"]
            .as_str()
            .expect("uri")
            .starts_with("pubky://")
    );

    let pubkey = cmd().args(["pubkey", secret]).output().expect("pubkey");
    assert!(pubkey.status.success());
    let derived = parse_json_line(&pubkey.stdout);
    assert_eq!(derived["public_key"], keys["public_key"]);
}

#[test]
fn mnemonic_generate_validate_and_derive() {
    let generate = cmd()
        .args(["mnemonic", "generate", "--with-keypair"])
        .output()
        .expect("generate");
    assert!(generate.status.success());
    let value = parse_json_line(&generate.stdout);
    let phrase = value["mnemonic"].as_str().expect("mnemonic").to_string();
    assert_eq!(phrase.split_whitespace().count(), 12);

    let validate = cmd()
        .args(["mnemonic", "validate", &phrase])
        .output()
        .expect("validate");
    assert!(validate.status.success());
    assert_eq!(stdout_line(&validate.stdout), "true");

    let invalid = cmd()
        .args(["mnemonic", "validate", "definitely not a phrase"])
        .output()
        .expect("validate invalid");
    assert_eq!(invalid.status.code().unwrap(), 2);
    assert_eq!(stdout_line(&invalid.stdout), "false");

    let keypair = cmd()
        .args(["mnemonic", "keypair", &phrase])
        .output()
        .expect("keypair");
    assert!(keypair.status.success());
    let derived = parse_json_line(&keypair.stdout);
    assert_eq!(derived["secret_key"], value["secret_key"]);
}

#[test]
fn recovery_file_round_trip_through_disk() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("backup.pkarr");
    let path_arg = path.to_str().unwrap();

    let create = cmd()
        .args([
            "recovery",
            "create",
            "--passphrase",
            "hunter2",
            "--output",
            path_arg,
            "--secret-key",
            SECRET,
        ])
        .output()
        .expect("create");
    assert!(create.status.success());
    let bytes = std::fs::read(&path).expect("recovery file");
    assert!(bytes.starts_with(b"pubky.org/recovery\n"));

    let decrypt = cmd()
        .args(["recovery", "decrypt", "--file", path_arg, "--passphrase", "hunter2"])
        .output()
        .expect("decrypt");
    assert!(decrypt.status.success());
    assert_eq!(stdout_line(&decrypt.stdout), SECRET);

    let wrong = cmd()
        .args(["recovery", "decrypt", "--file", path_arg, "--passphrase", "nope"])
        .output()
        .expect("decrypt wrong");
    assert!(!wrong.status.success());
    let err = parse_json_line(&wrong.stderr);
    assert_eq!(err["data"], "Failed to decrypt recovery file");
}

#[test]
fn auth_url_parse_prints_json() {
    let parse = cmd()
        .args([
            "auth-url",
            "parse",
            "pubkyauth:///?caps=/pub/app/:rw&secret=U55XnoH6vsMCpx1pxHtt8fReVg4Brvu9C0gUBuw-Jkw&relay=http://127.0.0.1:1/",
        ])
        .output()
        .expect("parse");
    assert!(parse.status.success());
    let value = parse_json_line(&parse.stdout);
    assert_eq!(value["relay"], "http://127.0.0.1:1/");
    assert_eq!(value["capabilities"][0]["permission"], "rw");
}

#[test]
fn usage_exit_code() {
    let missing_secret = cmd()
        .args(["publish", "_name", "content"])
        .output()
        .expect("publish");
    assert_eq!(missing_secret.status.code().unwrap(), 2);
    let err = parse_json_line(&missing_secret.stderr);
    assert_eq!(err["status"], "error");
    assert_eq!(err["kind"], "Usage");
    assert!(err["hint"].as_str().unwrap().contains("PUBKY_SECRET_KEY"));

    let bad_key = cmd()
        .args(["resolve", "not-a-key"])
        .output()
        .expect("resolve");
    assert_eq!(bad_key.status.code().unwrap(), 2);
    let err = parse_json_line(&bad_key.stderr);
    assert!(
        err["data"]
            .as_str()
            .unwrap()
            .starts_with("Invalid zbase32 encoded key")
    );

    let unknown = cmd().arg("frobnicate").output().expect("unknown");
    assert_eq!(unknown.status.code().unwrap(), 2);
}

#[test]
fn unreachable_relay_is_io_error() {
    let publish = cmd()
        .args([
            "--relay",
            "http://127.0.0.1:9",
            "publish",
            "_name",
            "content",
            "--secret-key",
            SECRET,
        ])
        .output()
        .expect("publish");
    assert_eq!(publish.status.code().unwrap(), 7);
    let err = parse_json_line(&publish.stderr);
    assert_eq!(err["kind"], "Io");
    assert!(
        err["data"]
            .as_str()
            .unwrap()
            .starts_with("Failed to publish")
    );
}

#[test]
fn completions_render() {
    let completions = cmd()
        .args(["completions", "bash"])
        .output()
        .expect("completions");
    assert!(completions.status.success());
    assert!(String::from_utf8_lossy(&completions.stdout).contains("pubkycore"));
}
