//! Alert generation from value diffs and relevant news

use crate::classify::Classification;
use crate::types::Alert;
use std::collections::BTreeMap;

pub const DEFAULT_LARGE_MOVE: f64 = 0.7;

/// Compare this run's values with the previous run's.
///
/// A value that differs from (or has no) previous reading raises
/// `<name>_update`; an absolute change at or above the watch's
/// `large_move` also raises `<name>_large_move`.
pub fn diff_values(
    previous: &BTreeMap<String, f64>,
    current: &BTreeMap<String, f64>,
    large_move: &BTreeMap<String, f64>,
) -> Vec<Alert> {
    let mut alerts = Vec::new();
    for (name, &new) in current {
        let prev = previous.get(name).copied();
        if prev != Some(new) {
            alerts.push(Alert::update(name, prev, new));
        }
        if let Some(old) = prev {
            let delta = new - old;
            let limit = large_move.get(name).copied().unwrap_or(DEFAULT_LARGE_MOVE);
            if delta.abs() >= limit {
                alerts.push(Alert::large_move(name, delta));
            }
        }
    }
    alerts
}

/// One `high_relevance_news` alert per HIGH item
pub fn news_alerts(classification: &Classification) -> Vec<Alert> {
    classification.high().map(|c| Alert::news(&c.item)).collect()
}
