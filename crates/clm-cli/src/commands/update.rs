//! `clm update`: one daily run.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clm_runtime::{run_daily_update, RunRequest};
use clm_store::MarketPaths;

use super::join_or_dash;

pub fn run_update(
    config_paths: Vec<PathBuf>,
    input: PathBuf,
    data_dir: PathBuf,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let req = RunRequest {
        config_paths,
        input_path: input,
        paths: MarketPaths::in_dir(&data_dir),
        dry_run,
    };

    let report = run_daily_update(&req)?;

    if json {
        let out = serde_json::to_string_pretty(&report).context("serialize run report failed")?;
        println!("{out}");
        return Ok(());
    }

    println!("run_id={}", report.run_id);
    println!("date={}", report.date);
    println!("config_hash={}", report.config_hash);
    println!(
        "macro pi={:.6} confidence={:.6} volatility={:.6}",
        report.macro_factors.pi, report.macro_factors.confidence, report.macro_factors.volatility
    );
    for u in &report.updates {
        println!(
            "ticker={} category={} prev={:.6} close={:.6} change_pct={:.4}",
            u.ticker,
            u.category,
            u.prev,
            u.close,
            (u.close / u.prev - 1.0) * 100.0
        );
    }
    println!("carried={}", join_or_dash(&report.carried));
    println!("history_len={}", report.history_len);
    println!("history_replaced={}", report.history_replaced);
    println!("evicted={}", join_or_dash(&report.evicted));
    println!("state_advanced={}", report.state_advanced);
    println!("persisted={}", report.persisted);
    if report.persisted {
        println!("state_path={}", req.paths.state.display());
    }

    Ok(())
}
