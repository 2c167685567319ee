//! Read-only commands: config hash, movers, quotes.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clm_store::{load_history, load_state, MarketPaths};

pub fn config_hash(paths: &[String]) -> Result<()> {
    let refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    let loaded = clm_config::load_layered_yaml(&refs)?;
    println!("config_hash={}", loaded.config_hash);
    println!("{}", loaded.canonical_json);
    Ok(())
}

pub fn movers(data_dir: PathBuf, top: usize) -> Result<()> {
    let paths = MarketPaths::in_dir(&data_dir);
    let history = load_history(&paths.history)?;

    let Some(report) = clm_runtime::movers(&history, top) else {
        println!("movers=none history_len={}", history.len());
        return Ok(());
    };

    println!("from={} to={}", report.from_date, report.to_date);
    for m in &report.movers {
        println!(
            "ticker={} from={:.6} to={:.6} change_pct={:.4}",
            m.ticker, m.from, m.to, m.pct
        );
    }
    Ok(())
}

pub fn quotes(config_paths: &[String], data_dir: PathBuf) -> Result<()> {
    let refs: Vec<&str> = config_paths.iter().map(|s| s.as_str()).collect();
    let (_, cfg) = clm_config::load_market_config(&refs).context("load market config failed")?;
    let state = load_state(&MarketPaths::in_dir(&data_dir).state)?;

    for q in clm_runtime::quotes(&cfg, &state) {
        println!(
            "ticker={} category={} base={:.6} last={:.6} vs_base_pct={:.4} has_close={}",
            q.ticker, q.category, q.base_price, q.last, q.pct_vs_base, q.has_close
        );
    }
    Ok(())
}
