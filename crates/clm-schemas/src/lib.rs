//! clm-schemas
//!
//! Record types exchanged with the outside world: the daily activity input,
//! the market state ("last closes") and the history snapshots.
//!
//! Every daily metric is optional. A `null` or absent metric is never an
//! error here; the pricing layer treats it as neutral.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Daily input
// ---------------------------------------------------------------------------

/// One day of classroom activity, produced externally before the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DailyInput {
    pub date: NaiveDate,
    /// Weekday groups keyed by group id.
    #[serde(default)]
    pub groups: BTreeMap<String, GroupInput>,
    /// Company factor scores, each expected in [0,1].
    #[serde(default)]
    pub factors: BTreeMap<String, Option<f64>>,
    #[serde(default)]
    pub demand: Demand,
    /// Social-interaction scalar in [0,1].
    #[serde(default)]
    pub social: Option<f64>,
}

impl DailyInput {
    /// Factor score by name; absent, null and non-finite all read as `None`.
    pub fn factor(&self, name: &str) -> Option<f64> {
        self.factors.get(name).copied().flatten().filter(|v| v.is_finite())
    }

    /// The group whose assigned currency is `ticker` (first in group-id order).
    pub fn group_for_currency(&self, ticker: &str) -> Option<(&str, &GroupInput)> {
        self.groups
            .iter()
            .find(|(_, g)| g.currency.as_deref() == Some(ticker))
            .map(|(id, g)| (id.as_str(), g))
    }
}

/// Metrics of one weekday group for the day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupInput {
    /// Currency ticker assigned to this group.
    #[serde(default)]
    pub currency: Option<String>,
    /// Days remaining until the group's next exam.
    #[serde(default)]
    pub exam_days: Option<f64>,
    #[serde(default)]
    pub participation_total: Option<f64>,
    #[serde(default)]
    /// Students counted for per-head participation. Integral in practice;
    /// `22` and `22.0` are both accepted.
    pub headcount: Option<f64>,
    /// Today's quiz average.
    #[serde(default)]
    pub quiz_avg: Option<f64>,
    /// Today's extra-assignment total.
    #[serde(default)]
    pub extra_total: Option<f64>,
    #[serde(default)]
    pub attendance_pct: Option<f64>,
}

impl GroupInput {
    /// Participation points per head; `None` when either side is missing or
    /// the headcount is not positive.
    pub fn participation_per_head(&self) -> Option<f64> {
        let total = finite(self.participation_total)?;
        match finite(self.headcount) {
            Some(n) if n > 0.0 => Some(total / n),
            _ => None,
        }
    }

    pub fn quiz(&self) -> Option<f64> {
        finite(self.quiz_avg)
    }

    pub fn extra(&self) -> Option<f64> {
        finite(self.extra_total)
    }

    pub fn attendance(&self) -> Option<f64> {
        finite(self.attendance_pct)
    }

    pub fn exam_days(&self) -> Option<f64> {
        finite(self.exam_days)
    }
}

/// Demand signals. The two video fields are well-known; every other key is a
/// named demand channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Demand {
    #[serde(default)]
    pub video_ratio: Option<f64>,
    #[serde(default)]
    pub video_volume: Option<f64>,
    #[serde(flatten)]
    pub channels: BTreeMap<String, Option<f64>>,
}

impl Demand {
    pub fn channel(&self, name: &str) -> Option<f64> {
        finite(self.channels.get(name).copied().flatten())
    }

    pub fn video_ratio(&self) -> Option<f64> {
        finite(self.video_ratio)
    }

    pub fn video_volume(&self) -> Option<f64> {
        finite(self.video_volume)
    }
}

fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite())
}

// ---------------------------------------------------------------------------
// State + history
// ---------------------------------------------------------------------------

/// Closing prices going into (yesterday) or out of (today) a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketState {
    #[serde(default)]
    pub last_close: BTreeMap<String, f64>,
    /// Reserved smoothing buffers. Carried through a run untouched.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ema_buffers: BTreeMap<String, Vec<f64>>,
}

impl MarketState {
    pub fn close(&self, ticker: &str) -> Option<f64> {
        self.last_close.get(ticker).copied()
    }
}

/// One dated snapshot of every close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub date: NaiveDate,
    pub closes: BTreeMap<String, f64>,
}
