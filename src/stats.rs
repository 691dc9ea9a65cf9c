// ===============================
// src/stats.rs
// ===============================
use ahash::AHashMap as HashMap;
use serde::Serialize;

use crate::classifier::{priority_level, priority_score, PriorityLevel};
use crate::domain::{Alert, AlertKind};

/// Summary over a set of alerts (dashboard header numbers).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AlertStats {
    pub total_alerts: usize,
    pub volume_alerts: usize,
    pub consecutive_alerts: usize,
    pub priority_alerts: usize,
    pub true_signals: usize,
    pub false_signals: usize,
    pub alerts_with_imbalance: usize,
    /// true / (true + false) * 100; 0 when nothing has closed yet.
    pub accuracy_percentage: f64,
    pub avg_volume_ratio: Option<f64>,
}

impl AlertStats {
    pub fn compute(alerts: &[Alert]) -> Self {
        let mut st = AlertStats { total_alerts: alerts.len(), ..Default::default() };
        let mut ratio_sum = 0.0;
        let mut ratio_n = 0usize;

        for a in alerts {
            match a.kind() {
                AlertKind::Volume => st.volume_alerts += 1,
                AlertKind::Consecutive => st.consecutive_alerts += 1,
                AlertKind::Priority => st.priority_alerts += 1,
            }
            match a.closed_verdict() {
                Some(true) => st.true_signals += 1,
                Some(false) => st.false_signals += 1,
                None => {}
            }
            if a.has_imbalance() {
                st.alerts_with_imbalance += 1;
            }
            if let Some(r) = a.volume_ratio() {
                ratio_sum += r;
                ratio_n += 1;
            }
        }

        let closed = st.true_signals + st.false_signals;
        if closed > 0 {
            st.accuracy_percentage = st.true_signals as f64 / closed as f64 * 100.0;
        }
        if ratio_n > 0 {
            st.avg_volume_ratio = Some(ratio_sum / ratio_n as f64);
        }
        st
    }
}

/// Alert count per priority level.
pub fn level_histogram(alerts: &[Alert]) -> HashMap<PriorityLevel, usize> {
    let mut out = HashMap::new();
    for a in alerts {
        *out.entry(priority_level(priority_score(a))).or_insert(0) += 1;
    }
    out
}
