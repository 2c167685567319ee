//! Macro factor computation.
//!
//! Collapses one day of raw metrics into three market-wide gates (π, C, V)
//! plus per-group exam urgency. Computed once per run, before any updater.

use std::collections::BTreeMap;

use clm_config::{MacroCoefficients, MarketConfig, MetricKey};
use clm_schemas::DailyInput;
use serde::Serialize;

use crate::norm::{dev, ex_from_days, norm_vs_media, NEUTRAL};

// ---------------------------------------------------------------------------
// Normalized metrics
// ---------------------------------------------------------------------------

/// Normalized metrics of one weekday group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GroupMetrics {
    pub participation: f64,
    pub quiz: f64,
    pub extra: f64,
    pub attendance: f64,
    pub urgency: f64,
}

/// Every normalized metric of the day, market-wide and per group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketMetrics {
    pub market: BTreeMap<MetricKey, f64>,
    pub groups: BTreeMap<String, GroupMetrics>,
}

impl MarketMetrics {
    pub fn get(&self, key: MetricKey) -> f64 {
        self.market.get(&key).copied().unwrap_or(NEUTRAL)
    }

    /// Metrics of a specific group, falling back to market-wide values when
    /// the group is unset or did not report today.
    pub fn group_or_market(&self, group: Option<&str>) -> GroupMetrics {
        group
            .and_then(|id| self.groups.get(id).copied())
            .unwrap_or(GroupMetrics {
                participation: self.get(MetricKey::Participation),
                quiz: self.get(MetricKey::Quiz),
                extra: self.get(MetricKey::Extra),
                attendance: self.get(MetricKey::Attendance),
                urgency: self.get(MetricKey::Urgency),
            })
    }
}

pub fn compute_metrics(cfg: &MarketConfig, input: &DailyInput) -> MarketMetrics {
    let curve = &cfg.globals.exam_curve;
    let mut groups = BTreeMap::new();

    for (id, g) in &input.groups {
        // A group without baselines normalizes everything to neutral.
        let media = cfg.medias.groups.get(id).copied().unwrap_or_default();
        // Unreported exam distance is neutral, like every other metric.
        let urgency = g
            .exam_days()
            .map(|d| ex_from_days(d, curve.d0, curve.k, curve.clamp_days))
            .unwrap_or(NEUTRAL);
        groups.insert(
            id.clone(),
            GroupMetrics {
                participation: norm_vs_media(g.participation_per_head(), media.participation_per_head),
                quiz: norm_vs_media(g.quiz(), media.quiz),
                extra: norm_vs_media(g.extra(), media.extra),
                attendance: norm_vs_media(g.attendance(), media.attendance),
                urgency,
            },
        );
    }

    let mean = |f: fn(&GroupMetrics) -> f64| -> f64 {
        if groups.is_empty() {
            NEUTRAL
        } else {
            groups.values().map(f).sum::<f64>() / groups.len() as f64
        }
    };

    let mut market = BTreeMap::new();
    market.insert(MetricKey::Participation, mean(|g| g.participation));
    market.insert(MetricKey::Neutral, NEUTRAL);
    market.insert(MetricKey::Quiz, mean(|g| g.quiz));
    market.insert(MetricKey::Extra, mean(|g| g.extra));
    market.insert(
        MetricKey::VideoRatio,
        norm_vs_media(input.demand.video_ratio(), cfg.medias.video_ratio),
    );
    market.insert(
        MetricKey::VideoVolume,
        norm_vs_media(input.demand.video_volume(), cfg.medias.video_volume),
    );
    market.insert(
        MetricKey::Urgency,
        groups
            .values()
            .map(|g| g.urgency)
            .reduce(f64::max)
            .unwrap_or(NEUTRAL),
    );
    market.insert(MetricKey::Attendance, mean(|g| g.attendance));
    market.insert(
        MetricKey::Social,
        norm_vs_media(input.social.filter(|v| v.is_finite()), cfg.medias.social),
    );

    MarketMetrics { market, groups }
}

// ---------------------------------------------------------------------------
// Macro factors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacroFactors {
    pub pi: f64,
    pub confidence: f64,
    pub volatility: f64,
    pub urgency_by_group: BTreeMap<String, f64>,
    pub metrics: MarketMetrics,
}

impl MacroFactors {
    /// Multiplicative gate `1 + Σ coeff·(factor − 0.5)`, floored at 0.
    pub fn gate(&self, c: &MacroCoefficients) -> f64 {
        let g = 1.0
            + c.pi * dev(self.pi)
            + c.confidence * dev(self.confidence)
            + c.volatility * dev(self.volatility);
        g.max(0.0)
    }

    /// Urgency of one group, or the market maximum when unset/unreported.
    pub fn urgency(&self, group: Option<&str>) -> f64 {
        group
            .and_then(|id| self.urgency_by_group.get(id).copied())
            .unwrap_or_else(|| self.metrics.get(MetricKey::Urgency))
    }
}

/// `clamp(0.5 + Σ weight·(z − 0.5), 0, 1)` over the configured contributors.
pub fn weighted_factor(weights: &BTreeMap<MetricKey, f64>, metrics: &MarketMetrics) -> f64 {
    let sum: f64 = weights.iter().map(|(k, w)| w * dev(metrics.get(*k))).sum();
    (NEUTRAL + sum).clamp(0.0, 1.0)
}

pub fn compute_macro(cfg: &MarketConfig, input: &DailyInput) -> MacroFactors {
    let metrics = compute_metrics(cfg, input);
    let w = &cfg.macro_weights;
    MacroFactors {
        pi: weighted_factor(&w.pi, &metrics),
        confidence: weighted_factor(&w.confidence, &metrics),
        volatility: weighted_factor(&w.volatility, &metrics),
        urgency_by_group: metrics
            .groups
            .iter()
            .map(|(id, g)| (id.clone(), g.urgency))
            .collect(),
        metrics,
    }
}
