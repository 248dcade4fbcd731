use serde_json::Value;
use std::process::{Command, Output};

const DELEGATE: &str = "0x571D806987bB6579d80002d49274d25A216c31da";
const AUTHORITY_KEY: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";
const RELAY_KEY: &str = "0x0000000000000000000000000000000000000000000000000000000000000002";
const AUTHORITY_ADDRESS: &str = "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf";
const RELAY_ADDRESS: &str = "0x2B5AD5c4795c026514f8317c7a215E218DcCD6cF";

fn run(args: &[&str]) -> Output {
    let binary_path = assert_cmd::cargo::cargo_bin!("delegate-relay");
    Command::new(binary_path)
        .args(args)
        .env_remove("AUTHORITY_PRIVATE_KEY")
        .env_remove("RELAY_PRIVATE_KEY")
        .output()
        .expect("cli runs")
}

fn stdout_json(output: &Output) -> Value {
    let stdout = String::from_utf8(output.stdout.clone()).expect("stdout is utf8");
    serde_json::from_str(&stdout).expect("stdout is valid json")
}

fn build_raw() -> String {
    let output = run(&[
        "build",
        "--authority-key",
        AUTHORITY_KEY,
        "--relay-key",
        RELAY_KEY,
        "--delegate",
        DELEGATE,
        "--chain-id",
        "11155111",
        "--authority-nonce",
        "0",
        "--relay-nonce",
        "4",
        "--gas-limit",
        "120000",
        "--max-fee-per-gas",
        "30000000000",
        "--max-priority-fee-per-gas",
        "1000000000",
        "--data",
        "0x552410770000000000000000000000000000000000000000000000000000000000000001",
    ]);
    assert!(output.status.success(), "build failed: {:?}", output);
    let json = stdout_json(&output);
    json["raw"].as_str().expect("raw field").to_string()
}

#[test]
fn auth_digest_matches_known_value() {
    let output = run(&["auth-digest", "--chain-id", "11155111", "--delegate", DELEGATE, "--nonce", "0"]);
    assert!(output.status.success(), "{:?}", output);

    let json = stdout_json(&output);
    assert_eq!(
        json["digest"],
        "0x7d3de7a8912ecec15036b32ad0b7528c7684b51028ee14f41ed7af320eee5c01"
    );
    assert_eq!(json["message"], "0x05da83aa36a794571d806987bb6579d80002d49274d25a216c31da80");
}

#[test]
fn sign_authorization_reports_authority() {
    let output = run(&[
        "sign-authorization",
        "--chain-id",
        "0xaa36a7",
        "--delegate",
        DELEGATE,
        "--authority-key",
        AUTHORITY_KEY,
    ]);
    assert!(output.status.success(), "{:?}", output);

    let json = stdout_json(&output);
    assert_eq!(json["authority"], AUTHORITY_ADDRESS);
    assert_eq!(json["chainId"], "0xaa36a7");
    assert_eq!(json["r"].as_str().unwrap().len(), 66);

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(!stderr.contains(&AUTHORITY_KEY[2..]));
}

#[test]
fn sign_authorization_with_wrong_expected_authority_fails() {
    let output = run(&[
        "sign-authorization",
        "--chain-id",
        "11155111",
        "--delegate",
        DELEGATE,
        "--authority-key",
        AUTHORITY_KEY,
        "--expected-authority",
        RELAY_ADDRESS,
    ]);
    assert!(!output.status.success());

    let json = stdout_json(&output);
    assert_eq!(json["error"]["code"], "authorization_integrity_error");
}

#[test]
fn build_then_decode_recovers_both_parties() {
    let raw = build_raw();
    assert!(raw.starts_with("0x04"));

    let output = run(&["decode", "--raw", &raw]);
    assert!(output.status.success(), "{:?}", output);

    let json = stdout_json(&output);
    assert_eq!(json["sender"], RELAY_ADDRESS);
    assert_eq!(json["nonce"], 4);
    assert_eq!(json["to"], AUTHORITY_ADDRESS);
    assert_eq!(json["authorizationList"][0]["authority"], AUTHORITY_ADDRESS);
    assert_eq!(json["authorizationList"][0]["nonce"], 0);
}

#[test]
fn build_is_deterministic() {
    assert_eq!(build_raw(), build_raw());
}

#[test]
fn decode_rejects_garbage() {
    let output = run(&["decode", "--raw", "0x02c0"]);
    assert!(!output.status.success());
    assert_eq!(stdout_json(&output)["error"]["code"], "encoding_error");
}

#[test]
fn keys_can_come_from_environment() {
    let binary_path = assert_cmd::cargo::cargo_bin!("delegate-relay");
    let output = Command::new(binary_path)
        .args(["sign-authorization", "--chain-id", "1", "--delegate", DELEGATE])
        .env("AUTHORITY_PRIVATE_KEY", AUTHORITY_KEY)
        .output()
        .expect("cli runs");

    assert!(output.status.success(), "{:?}", output);
    assert_eq!(stdout_json(&output)["authority"], AUTHORITY_ADDRESS);
}
