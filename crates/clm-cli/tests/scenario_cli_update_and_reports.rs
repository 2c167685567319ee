//! scenario_cli_update_and_reports
//!
//! GREEN when:
//! - `clm update` persists a run and prints `key=value` lines for every
//!   instrument; `--dry-run` prints the same report and writes nothing.
//! - `CLM_DATA_DIR` stands in for `--data-dir`.
//! - `clm movers` and `clm quotes` read what `clm update` wrote.
//! - `clm config-hash` prints a sha256 hash and the canonical JSON.
//! - `clm update --json` prints the run report as a single JSON document.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

use clm_testkit::{extreme_input, neutral_input, MarketDir};

fn clm(dir: &MarketDir) -> Command {
    let mut cmd = Command::cargo_bin("clm").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("CLM_DATA_DIR")
        .env("RUST_LOG", "warn");
    cmd
}

#[test]
fn update_then_movers_and_quotes() {
    let dir = MarketDir::new().unwrap();
    let day1 = dir.write_input(&neutral_input("2026-03-02")).unwrap();
    let day2 = dir.write_input(&extreme_input("2026-03-03", true)).unwrap();
    let cfg = dir.config_path();

    for input in [&day1, &day2] {
        clm(&dir)
            .arg("update")
            .arg("--config")
            .arg(&cfg)
            .arg("--input")
            .arg(input)
            .arg("--data-dir")
            .arg(dir.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("persisted=true"))
            .stdout(predicate::str::contains("ticker=LUM category=currency"))
            .stdout(predicate::str::contains("ticker=DECA category=aggregate"));
    }
    assert!(dir.state_path().exists());
    assert!(dir.history_path().exists());

    clm(&dir)
        .args(["movers", "--top", "3", "--data-dir"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("from=2026-03-02 to=2026-03-03"))
        .stdout(predicate::str::contains("ticker=").count(3));

    clm(&dir)
        .arg("quotes")
        .arg("--config")
        .arg(&cfg)
        .arg("--data-dir")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("ticker=PIZZA category=good"))
        .stdout(predicate::str::contains("has_close=true"))
        .stdout(predicate::str::contains("has_close=false").not());
}

#[test]
fn dry_run_writes_nothing() {
    let dir = MarketDir::new().unwrap();
    let input = dir.write_input(&neutral_input("2026-03-02")).unwrap();

    clm(&dir)
        .arg("update")
        .arg("--config")
        .arg(dir.config_path())
        .arg("--input")
        .arg(&input)
        .arg("--data-dir")
        .arg(dir.path())
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("persisted=false"))
        .stdout(predicate::str::contains("history_len=1"));

    assert!(!dir.state_path().exists());
    assert!(!dir.history_path().exists());
}

#[test]
fn data_dir_from_env() {
    let dir = MarketDir::new().unwrap();
    let input = dir.write_input(&neutral_input("2026-03-02")).unwrap();
    let data = dir.path().join("store");

    clm(&dir)
        .env("CLM_DATA_DIR", &data)
        .arg("update")
        .arg("--config")
        .arg(dir.config_path())
        .arg("--input")
        .arg(&input)
        .assert()
        .success();

    assert!(data.join("state.json").exists());
    assert!(data.join("history.json").exists());
}

#[test]
fn movers_without_history() {
    let dir = MarketDir::new().unwrap();
    clm(&dir)
        .args(["movers", "--data-dir"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("movers=none history_len=0"));
}

#[test]
fn config_hash_prints_hash_and_canonical_json() {
    let dir = MarketDir::new().unwrap();
    clm(&dir)
        .arg("config-hash")
        .arg(dir.config_path())
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"(?m)^config_hash=[0-9a-f]{64}$").unwrap())
        .stdout(predicate::str::contains("\"history_retention\":180"));
}

#[test]
fn json_report_is_machine_readable() {
    let dir = MarketDir::new().unwrap();
    let input = dir.write_input(&neutral_input("2026-03-02")).unwrap();

    let out = clm(&dir)
        .arg("update")
        .arg("--config")
        .arg(dir.config_path())
        .arg("--input")
        .arg(&input)
        .arg("--data-dir")
        .arg(dir.path())
        .args(["--dry-run", "--json"])
        .output()
        .unwrap();
    assert!(out.status.success());

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["date"], "2026-03-02");
    assert_eq!(v["persisted"], false);
    assert_eq!(v["updates"].as_array().unwrap().len(), 10);
    let lum = v["state"]["lastClose"]["LUM"].as_f64().unwrap();
    assert!((lum - 100.0).abs() < 1e-9, "LUM={lum}");
}
