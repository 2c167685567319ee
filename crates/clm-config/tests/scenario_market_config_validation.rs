//! scenario_market_config_validation
//!
//! GREEN when:
//! - The reference market config loads and lists instruments in pipeline
//!   order (currencies, stocks, tenths, aggregate, goods).
//! - Each class of invalid config is rejected with a `CONFIG_INVALID` message
//!   naming the offending key.
//! - Unknown keys are rejected rather than silently ignored.

use clm_config::{load_layered_yaml_from_strings, Category, MarketConfig};

const MARKET_YAML: &str = include_str!("../../../config/market.yaml");

fn load(overlay: &str) -> anyhow::Result<MarketConfig> {
    let loaded = load_layered_yaml_from_strings(&[MARKET_YAML, overlay])?;
    MarketConfig::from_json(&loaded.config_json)
}

fn rejection(overlay: &str) -> String {
    match load(overlay) {
        Ok(_) => panic!("overlay should be rejected:\n{overlay}"),
        Err(e) => format!("{e:#}"),
    }
}

#[test]
fn reference_config_loads_in_pipeline_order() {
    let cfg = load("{}").unwrap();
    let cats: Vec<Category> = cfg.instruments().iter().map(|r| r.category).collect();
    let mut sorted = cats.clone();
    sorted.sort();
    assert_eq!(cats, sorted, "categories must appear in pipeline order");
    assert_eq!(cats.first(), Some(&Category::Currency));
    assert_eq!(cats.last(), Some(&Category::Good));
    assert_eq!(cfg.globals.history_retention, 180);
}

#[test]
fn out_of_range_values_are_rejected() {
    let msg = rejection("globals:\n  clamp_defaults:\n    tenth: 0.0\n");
    assert!(msg.contains("CONFIG_INVALID globals.clamp_defaults.tenth"), "{msg}");

    let msg = rejection("globals:\n  ema_alpha_default: 1.5\n");
    assert!(msg.contains("CONFIG_INVALID"), "{msg}");

    let msg = rejection("globals:\n  history_retention: 0\n");
    assert!(msg.contains("CONFIG_INVALID globals.history_retention"), "{msg}");

    let msg = rejection("instruments:\n  currencies:\n    LUM:\n      base_price: -1.0\n");
    assert!(msg.contains("base_price"), "{msg}");
}

#[test]
fn dangling_references_are_rejected() {
    let msg = rejection("instruments:\n  stocks:\n    ACME:\n      factor: f9\n");
    assert!(msg.contains("instruments.stocks.ACME.factor"), "{msg}");

    let msg = rejection("instruments:\n  aggregate:\n    sources: [T1, T9]\n");
    assert!(msg.contains("'T9' is not a configured tenth"), "{msg}");
}

#[test]
fn duplicate_tickers_across_categories_are_rejected() {
    let msg = rejection("instruments:\n  goods:\n    LUM:\n      base_price: 1.0\n");
    assert!(msg.contains("duplicate ticker 'LUM'"), "{msg}");
}

#[test]
fn unknown_keys_are_rejected() {
    let msg = rejection("globals:\n  clamp_default: {}\n");
    assert!(msg.contains("CONFIG_INVALID"), "{msg}");
}
