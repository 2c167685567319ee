//! clm-config
//!
//! Layered configuration loading for the market engine.
//!
//! Documents are YAML (JSON is accepted as a YAML subset). They are merged in
//! order, canonicalized to JSON, hashed, and finally deserialized into the
//! typed [`MarketConfig`]. The engine never writes configuration.

pub mod market;

use anyhow::{Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;

pub use market::{
    AggregateSpec, Category, ClampDefaults, CurrencySpec, Driver, ExamCurve, GoodSpec, Globals,
    GroupMedia, InstrumentRef, Instruments, MacroApply, MacroCoefficients, MacroWeights,
    MarketConfig, Medias, MetricKey, StockSpec, TenthSpec, TenthWeights,
};

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read config path: {p}"))?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    // Earlier docs are base, later docs override.
    let mut merged = serde_json::json!({});
    for (i, raw) in yaml_docs.iter().enumerate() {
        let v_yaml: serde_yaml::Value =
            serde_yaml::from_str(raw).with_context(|| format!("invalid yaml in layer {i}"))?;
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }

    let canonical_json = canonicalize_json(&merged)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

/// Load, merge and validate in one step.
pub fn load_market_config(paths: &[&str]) -> Result<(LoadedConfig, MarketConfig)> {
    let loaded = load_layered_yaml(paths)?;
    let cfg = MarketConfig::from_json(&loaded.config_json)?;
    Ok((loaded, cfg))
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

fn canonicalize_json(v: &Value) -> Result<String> {
    // serde_json's Map is key-sorted (no preserve_order feature), so compact
    // serialization is canonical regardless of source key order.
    let s = serde_json::to_string(v).context("canonical json serialize failed")?;
    Ok(s)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let out = hasher.finalize();
    hex::encode(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_layers_override_scalars_and_merge_maps() {
        let base = "globals:\n  ema_alpha_default: 0.5\n  history_retention: 180\n";
        let overlay = "globals:\n  ema_alpha_default: 0.8\n";
        let loaded = load_layered_yaml_from_strings(&[base, overlay]).unwrap();
        assert_eq!(
            loaded.config_json.pointer("/globals/ema_alpha_default"),
            Some(&serde_json::json!(0.8))
        );
        assert_eq!(
            loaded.config_json.pointer("/globals/history_retention"),
            Some(&serde_json::json!(180))
        );
    }

    #[test]
    fn invalid_yaml_names_the_layer() {
        let err = load_layered_yaml_from_strings(&["a: 1", "b: [unclosed"]).unwrap_err();
        assert!(format!("{err:#}").contains("layer 1"));
    }

    #[test]
    fn missing_file_is_an_error_with_path() {
        let err = load_layered_yaml(&["/definitely/not/here.yaml"]).unwrap_err();
        assert!(format!("{err:#}").contains("/definitely/not/here.yaml"));
    }
}
