//! scenario_daily_run_persists_state_and_history
//!
//! GREEN when:
//! - A first run against an empty data directory creates `state.json` and a
//!   one-entry `history.json`, and releases the run lock.
//! - Re-running the same date prices from the close before that date: the
//!   same input reproduces the first run exactly (no compounding), a
//!   corrected input replaces that day's history entry and state with only
//!   its own output.
//! - Backfilling an older date rewrites that history entry and leaves the
//!   newer state untouched.
//! - History never exceeds the configured retention; the oldest days go first.
//! - Closes of instruments that are no longer configured are carried forward.

use clm_runtime::{run_daily_update, RunRequest};
use clm_schemas::DailyInput;
use clm_store::{load_history, load_state, MarketPaths};
use clm_testkit::{date, extreme_input, neutral_input, MarketDir, ALL_TICKERS};

const EPS: f64 = 1e-9;

fn request(dir: &MarketDir, day: &str) -> RunRequest {
    request_for(dir, &neutral_input(day))
}

fn request_for(dir: &MarketDir, input: &DailyInput) -> RunRequest {
    RunRequest {
        config_paths: vec![dir.config_path()],
        input_path: dir.write_input(input).unwrap(),
        paths: MarketPaths::in_dir(dir.path()),
        dry_run: false,
    }
}

#[test]
fn first_run_creates_both_records() {
    let dir = MarketDir::new().unwrap();
    let req = request(&dir, "2026-03-02");

    let report = run_daily_update(&req).unwrap();
    assert!(report.persisted);
    assert_eq!(report.history_len, 1);
    assert!(!report.history_replaced);
    assert_eq!(report.updates.len(), ALL_TICKERS.len());

    let state = load_state(&req.paths.state).unwrap();
    assert_eq!(state, report.state);
    for t in ALL_TICKERS {
        assert!(state.close(t).is_some(), "missing close for {t}");
    }

    let history = load_history(&req.paths.history).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].date, date("2026-03-02"));
    assert_eq!(history[0].closes, state.last_close);

    assert!(!req.paths.lock.exists(), "run lock must be released");
}

#[test]
fn same_date_rerun_does_not_compound() {
    let dir = MarketDir::new().unwrap();
    let req = request_for(&dir, &extreme_input("2026-03-02", true));

    let first = run_daily_update(&req).unwrap();
    let after_first = load_history(&req.paths.history).unwrap();
    let second = run_daily_update(&req).unwrap();
    let after_second = load_history(&req.paths.history).unwrap();

    assert_eq!(first.run_id, second.run_id);
    assert!(second.history_replaced);
    assert_eq!(second.history_len, 1);
    assert_eq!(first.state.last_close, second.state.last_close);
    assert_eq!(load_state(&req.paths.state).unwrap(), first.state);
    assert_eq!(after_first, after_second);

    // One day's move from base, never two.
    let lum = second.state.close("LUM").unwrap();
    assert!(lum > 100.0 && lum <= 105.0 + EPS, "LUM={lum}");
}

#[test]
fn rerun_with_new_input_keeps_only_the_latest_output() {
    let dir = MarketDir::new().unwrap();
    run_daily_update(&request(&dir, "2026-03-02")).unwrap();
    run_daily_update(&request_for(&dir, &extreme_input("2026-03-03", true))).unwrap();
    let redo = run_daily_update(&request_for(&dir, &extreme_input("2026-03-03", false))).unwrap();

    assert!(redo.history_replaced);
    assert!(redo.state_advanced);
    let history = load_history(&MarketPaths::in_dir(dir.path()).history).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].date, date("2026-03-03"));
    assert_eq!(history[1].closes, redo.state.last_close);

    // Same result as if the corrected input had been the only run for that day.
    let clean = MarketDir::new().unwrap();
    run_daily_update(&request(&clean, "2026-03-02")).unwrap();
    let direct = run_daily_update(&request_for(&clean, &extreme_input("2026-03-03", false))).unwrap();
    assert_eq!(redo.state.last_close, direct.state.last_close);
}

#[test]
fn backfill_rewrites_history_but_not_newer_state() {
    let dir = MarketDir::new().unwrap();
    run_daily_update(&request(&dir, "2026-03-02")).unwrap();
    let latest = run_daily_update(&request_for(&dir, &extreme_input("2026-03-03", true))).unwrap();

    let back = run_daily_update(&request_for(&dir, &extreme_input("2026-03-02", false))).unwrap();
    assert!(!back.state_advanced);
    assert_eq!(back.state, latest.state);

    let paths = MarketPaths::in_dir(dir.path());
    assert_eq!(load_state(&paths.state).unwrap(), latest.state);

    let history = load_history(&paths.history).unwrap();
    assert_eq!(history.len(), 2);
    for u in &back.updates {
        assert_eq!(history[0].closes[&u.ticker], u.close, "{}", u.ticker);
        assert!(u.close <= u.prev * 1.10 + EPS && u.close >= u.prev * 0.90 - EPS);
    }
    assert_eq!(history[1].closes, latest.state.last_close);
}

#[test]
fn retention_caps_history_length() {
    let dir = MarketDir::new().unwrap();
    let overlay = dir
        .write_overlay("short.yaml", "globals:\n  history_retention: 3\n")
        .unwrap();

    let mut last = None;
    for day in 2..=6 {
        let mut req = request(&dir, &format!("2026-03-0{day}"));
        req.config_paths.push(overlay.clone());
        let report = run_daily_update(&req).unwrap();
        assert!(report.history_len <= 3);
        last = Some(report);
    }

    let last = last.unwrap();
    assert_eq!(last.evicted, vec![date("2026-03-03")]);

    let history = load_history(&MarketPaths::in_dir(dir.path()).history).unwrap();
    let days: Vec<_> = history.iter().map(|e| e.date).collect();
    assert_eq!(
        days,
        vec![date("2026-03-04"), date("2026-03-05"), date("2026-03-06")]
    );
}

#[test]
fn unconfigured_closes_are_carried() {
    let dir = MarketDir::new().unwrap();
    dir.write_raw(
        "state.json",
        r#"{"lastClose":{"LUM":100.0,"RETIRED":7.25}}"#,
    )
    .unwrap();

    let req = request(&dir, "2026-03-02");
    let report = run_daily_update(&req).unwrap();
    assert_eq!(report.carried, vec!["RETIRED".to_string()]);

    let state = load_state(&req.paths.state).unwrap();
    assert_eq!(state.close("RETIRED"), Some(7.25));
    assert_eq!(state.last_close.len(), ALL_TICKERS.len() + 1);
}
