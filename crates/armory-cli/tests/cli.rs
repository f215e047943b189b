//! End-to-end tests for the armory binary.
//!
//! Every test runs against a temporary ARMORY_HOME whose built-in default
//! armory is disabled, so nothing reaches the public internet.

use std::path::PathBuf;
use std::process::{Command, Output};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use blake2::{Blake2b512, Digest};
use ed25519_dalek::{Signer, SigningKey};
use serde_json::{Value, json};
use tempfile::TempDir;

const DEFAULT_PUBLIC_KEY: &str = "RWSBpxpRWDrD7Fe+VvRE3c2VEDC2NK80rlNCj+BX0gz44Xw07r6KQD9L";

/// Test context that sets up a temporary armory home
struct TestContext {
    temp_dir: TempDir,
    home: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let home = temp_dir.path().join(".sliver-client");
        std::fs::create_dir_all(&home).expect("failed to create armory home");
        let ctx = Self {
            temp_dir: temp_dir,
            home,
        };
        ctx.write_config(&json!([
            { "name": "Default", "public_key": DEFAULT_PUBLIC_KEY,
              "repo_url": "https://api.github.com/repos/sliverarmory/armory/releases",
              "enabled": false }
        ]));
        ctx
    }

    fn config_path(&self) -> PathBuf {
        self.home.join("armories.json")
    }

    fn write_config(&self, value: &Value) {
        std::fs::write(self.config_path(), serde_json::to_vec_pretty(value).unwrap()).unwrap();
    }

    fn config(&self) -> Vec<Value> {
        let bytes = std::fs::read(self.config_path()).expect("armories.json missing");
        serde_json::from_slice(&bytes).unwrap()
    }

    fn armory(&self, name: &str) -> Option<Value> {
        self.config().into_iter().find(|a| a["name"] == name)
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_armory"))
            .args(args)
            .env("ARMORY_HOME", &self.home)
            .env("HOME", self.temp_dir.path())
            .env_remove("RUST_LOG")
            .output()
            .expect("failed to run armory")
    }

    /// Adds an unreachable, enabled armory named `lab`.
    fn with_lab_armory(&self) {
        let mut config = self.config();
        config.insert(
            0,
            json!({ "name": "lab", "public_key": public_key_text(&SigningKey::from_bytes(&[3; 32])),
                    "repo_url": "http://127.0.0.1:9/index", "enabled": true }),
        );
        self.write_config(&Value::Array(config));
    }
}

fn public_key_text(key: &SigningKey) -> String {
    let mut raw = b"Ed".to_vec();
    raw.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
    raw.extend_from_slice(key.verifying_key().as_bytes());
    STANDARD.encode(raw)
}

fn minisign(key: &SigningKey, message: &[u8]) -> String {
    let sig = key.sign(&Blake2b512::digest(message)).to_bytes();
    let mut sig_raw = b"ED".to_vec();
    sig_raw.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
    sig_raw.extend_from_slice(&sig);

    let trusted = "timestamp:0";
    let mut global = sig.to_vec();
    global.extend_from_slice(trusted.as_bytes());
    format!(
        "untrusted comment: test\n{}\ntrusted comment: {trusted}\n{}\n",
        STANDARD.encode(sig_raw),
        STANDARD.encode(key.sign(&global).to_bytes())
    )
}

/// Body of a generic armory index endpoint listing no packages.
fn signed_empty_index(key: &SigningKey) -> String {
    let index = br#"{"aliases":[],"extensions":[],"bundles":[]}"#;
    json!({
        "minisig": STANDARD.encode(minisign(key, index)),
        "armory_index": STANDARD.encode(index),
    })
    .to_string()
}

#[test]
fn test_help_command() {
    let ctx = TestContext::new();
    let output = ctx.run(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
}

#[test]
fn test_add_rejects_unsupported_scheme() {
    let ctx = TestContext::new();
    let before = std::fs::read(ctx.config_path()).unwrap();
    let key = public_key_text(&SigningKey::from_bytes(&[5; 32]));

    let output = ctx.run(&["add", "ftp", "--url", "ftp://armory.example/index", "--pubkey", &key]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("ftp"));
    assert_eq!(std::fs::read(ctx.config_path()).unwrap(), before);
}

#[test]
fn test_add_verifies_index_before_saving() {
    let ctx = TestContext::new();
    let key = SigningKey::from_bytes(&[5; 32]);
    let mut server = mockito::Server::new();
    let _index = server
        .mock("GET", "/index")
        .with_body(signed_empty_index(&key))
        .create();
    let url = format!("{}/index", server.url());

    let output = ctx.run(&["add", "private", "--url", &url, "--pubkey", &public_key_text(&key)]);

    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    let added = ctx.armory("private").expect("armory not saved");
    assert_eq!(added["repo_url"], url.as_str());
    assert_eq!(added["enabled"], true);
}

#[test]
fn test_fresh_index_not_refetched_by_next_command() {
    let ctx = TestContext::new();
    let key = SigningKey::from_bytes(&[5; 32]);
    let mut server = mockito::Server::new();
    let index = server
        .mock("GET", "/index")
        .with_body(signed_empty_index(&key))
        .expect(1)
        .create();
    let url = format!("{}/index", server.url());

    let output = ctx.run(&["add", "private", "--url", &url, "--pubkey", &public_key_text(&key)]);
    assert!(output.status.success());
    assert!(ctx.home.join("armory-cache.json").exists());

    let output = ctx.run(&["search", "."]);
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    index.assert();
}

#[test]
fn test_add_with_wrong_key_changes_nothing() {
    let ctx = TestContext::new();
    let before = std::fs::read(ctx.config_path()).unwrap();
    let signer = SigningKey::from_bytes(&[5; 32]);
    let other = SigningKey::from_bytes(&[6; 32]);
    let mut server = mockito::Server::new();
    let _index = server
        .mock("GET", "/index")
        .with_body(signed_empty_index(&signer))
        .create();
    let url = format!("{}/index", server.url());

    let output = ctx.run(&["add", "private", "--url", &url, "--pubkey", &public_key_text(&other)]);

    assert!(!output.status.success());
    assert_eq!(std::fs::read(ctx.config_path()).unwrap(), before);
}

#[test]
fn test_add_without_save_leaves_config() {
    let ctx = TestContext::new();
    let before = std::fs::read(ctx.config_path()).unwrap();
    let key = SigningKey::from_bytes(&[5; 32]);
    let mut server = mockito::Server::new();
    let _index = server
        .mock("GET", "/index")
        .with_body(signed_empty_index(&key))
        .create();
    let url = format!("{}/index", server.url());

    let output = ctx.run(&[
        "add",
        "private",
        "--url",
        &url,
        "--pubkey",
        &public_key_text(&key),
        "--no-save",
    ]);

    assert!(output.status.success());
    assert_eq!(std::fs::read(ctx.config_path()).unwrap(), before);
}

#[test]
fn test_disable_and_enable_persist() {
    let ctx = TestContext::new();
    ctx.with_lab_armory();

    let output = ctx.run(&["disable", "lab"]);
    assert!(output.status.success());
    assert_eq!(ctx.armory("lab").unwrap()["enabled"], false);

    // The refresh after enabling fails to connect; the change still sticks.
    let output = ctx.run(&["--timeout", "5", "enable", "lab"]);
    assert!(output.status.success());
    assert_eq!(ctx.armory("lab").unwrap()["enabled"], true);
    assert!(String::from_utf8_lossy(&output.stderr).contains("lab"));
}

#[test]
fn test_rm_removes_armory() {
    let ctx = TestContext::new();
    ctx.with_lab_armory();

    let output = ctx.run(&["rm", "lab"]);
    assert!(output.status.success());
    assert!(ctx.armory("lab").is_none());
    assert!(ctx.armory("Default").is_some());

    let output = ctx.run(&["rm", "lab"]);
    assert!(!output.status.success());
}

#[test]
fn test_info_lists_armory_status() {
    let ctx = TestContext::new();
    let output = ctx.run(&["info"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Default"));
    assert!(stdout.contains("disabled"));
}

#[test]
fn test_install_unknown_package_fails() {
    let ctx = TestContext::new();
    let output = ctx.run(&["install", "does-not-exist"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("does-not-exist"));
}

#[test]
fn test_completions_command() {
    let ctx = TestContext::new();
    let output = ctx.run(&["completions", "bash"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("armory"));
}
