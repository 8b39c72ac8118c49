//! End-to-end CLI integration tests.

use assert_cmd::Command;
use predicates::prelude::*;

fn ntmul() -> Command {
    Command::cargo_bin("ntmul").expect("binary not found")
}

const NINES_SQUARED: &str =
    "99999999999999999999999999999999999999980000000000000000000000000000000000000001";

#[test]
fn help_flag() {
    ntmul()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("number-theoretic"));
}

#[test]
fn version_flag() {
    ntmul()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ntmul"));
}

#[test]
fn multiply_decimal() {
    ntmul()
        .args(["123456789123456789123456789", "987654321987654321", "-q"])
        .assert()
        .success()
        .stdout("121932631356500531469135800347203169112635269\n");
}

#[test]
fn square_flag() {
    ntmul()
        .args(["--square", &"9".repeat(40), "-q"])
        .assert()
        .success()
        .stdout(format!("{NINES_SQUARED}\n"));
}

#[test]
fn single_operand_is_squared() {
    ntmul()
        .args([&"9".repeat(40), "-q"])
        .assert()
        .success()
        .stdout(format!("{NINES_SQUARED}\n"));
}

#[test]
fn hexadecimal_radix() {
    ntmul()
        .args(["ff", "ff", "--radix", "16", "-q"])
        .assert()
        .success()
        .stdout("fe01\n");
}

#[test]
fn result_digits_truncates() {
    ntmul()
        .args(["--square", &"9".repeat(40), "--result-digits", "5", "-q"])
        .assert()
        .success()
        .stdout("99999\n");
}

#[test]
fn summary_goes_to_stderr() {
    ntmul()
        .args(["123", "456"])
        .assert()
        .success()
        .stdout("56088\n")
        .stderr(predicate::str::contains("digits in"));
}

#[test]
fn output_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("product.txt");
    ntmul()
        .args(["12", "12", "-q", "-o", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout("");
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "144");
}

#[test]
fn invalid_digit_fails() {
    ntmul()
        .args(["12x", "3"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("not a radix-10 digit"));
}

#[test]
fn missing_operand_fails() {
    ntmul()
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("missing operand"));
}

#[test]
fn bad_radix_is_config_error() {
    ntmul().args(["1", "2", "--radix", "40"]).assert().failure().code(4);
}

#[test]
fn bad_memory_block_is_config_error() {
    ntmul()
        .args(["1", "2", "--memory-block", "3M"])
        .assert()
        .failure()
        .code(4);
}

#[test]
fn malformed_settings_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, "{ not json").unwrap();
    ntmul()
        .args(["1", "2", "--config", path.to_str().unwrap()])
        .assert()
        .failure()
        .code(4);
}

#[test]
fn plan_is_json() {
    let output = ntmul().args(["--plan", "23"]).output().unwrap();
    assert!(output.status.success());
    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(plan["length"], 24);
    assert_eq!(plan["power2_length"], 8);
    assert_eq!(plan["factor3"], true);
    assert_eq!(plan["kind"], "simple");
}

#[test]
fn dump_config_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let output = ntmul()
        .args(["--dump-config", "--memory-block", "2M", "--temp-dir"])
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    let settings: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(settings["ntt"]["max_memory_block_bytes"], 2 << 20);
    assert!(settings["crt_block_elements"].is_u64());
}

#[test]
fn self_test_passes() {
    ntmul()
        .args(["--self-test", "3000", "--memory-block", "16K", "--threads", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Self-test passed"));
}

#[test]
fn self_test_in_binary() {
    ntmul()
        .args(["--self-test", "500", "--radix", "2", "-q"])
        .assert()
        .success()
        .stdout("");
}

#[test]
fn verbose_reports_root_tables() {
    ntmul()
        .args(["123456789123456789123456789", "987654321987654321987", "-v"])
        .assert()
        .success()
        .stderr(predicate::str::contains("ntmul ").and(predicate::str::contains("Root tables:")));
}
