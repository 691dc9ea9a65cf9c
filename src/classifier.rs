// ===============================
// src/classifier.rs
// ===============================
//
// Alert classification: priority score/level, consecutive strength and
// volume-signal status. All functions are pure and total over `Alert`.
//
// Tier tables are scanned top-down and the first threshold met wins, so
// every lower bound is inclusive (10 candles -> top tier, 9 -> next one).
//
use serde::Serialize;

use crate::domain::{Alert, VolumeAlert};

// (min consecutive candles, points)
const CONSECUTIVE_TIERS: [(u32, u8); 3] = [(10, 3), (7, 2), (5, 1)];
// (min volume ratio, points)
const VOLUME_TIERS: [(f64, u8); 3] = [(5.0, 3), (3.0, 2), (2.0, 1)];
const IMBALANCE_POINTS: u8 = 2;

pub const MAX_PRIORITY_SCORE: u8 =
    CONSECUTIVE_TIERS[0].1 + VOLUME_TIERS[0].1 + IMBALANCE_POINTS;

// Retuning the tiers must keep the ceiling at 8.
const _: () = assert!(MAX_PRIORITY_SCORE == 8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl PriorityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityLevel::Low => "low",
            PriorityLevel::Medium => "medium",
            PriorityLevel::High => "high",
            PriorityLevel::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsecutiveStrength {
    Weak,
    Moderate,
    Strong,
    VeryStrong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeStatus {
    Pending,
    TrueSignal,
    FalseSignal,
}

fn consecutive_points(count: u32) -> u8 {
    CONSECUTIVE_TIERS
        .iter()
        .find(|(min, _)| count >= *min)
        .map_or(0, |(_, pts)| *pts)
}

fn volume_points(ratio: f64) -> u8 {
    VOLUME_TIERS
        .iter()
        .find(|(min, _)| ratio >= *min)
        .map_or(0, |(_, pts)| *pts)
}

/// Weighted score in `0..=MAX_PRIORITY_SCORE`.
pub fn priority_score(alert: &Alert) -> u8 {
    let mut score = alert.consecutive_count().map_or(0, consecutive_points);
    score += alert.volume_ratio().map_or(0, volume_points);
    if alert.has_imbalance() {
        score += IMBALANCE_POINTS;
    }
    score
}

pub fn priority_level(score: u8) -> PriorityLevel {
    match score {
        s if s >= 7 => PriorityLevel::Critical,
        s if s >= 5 => PriorityLevel::High,
        s if s >= 3 => PriorityLevel::Medium,
        _ => PriorityLevel::Low,
    }
}

pub fn consecutive_strength(count: u32) -> ConsecutiveStrength {
    match count {
        c if c >= 10 => ConsecutiveStrength::VeryStrong,
        c if c >= 7 => ConsecutiveStrength::Strong,
        c if c >= 5 => ConsecutiveStrength::Moderate,
        _ => ConsecutiveStrength::Weak,
    }
}

/// `is_true_signal` is ignored while the alert is still open.
pub fn volume_status(alert: &VolumeAlert) -> VolumeStatus {
    if !alert.header.is_closed {
        return VolumeStatus::Pending;
    }
    match alert.is_true_signal {
        Some(true) => VolumeStatus::TrueSignal,
        _ => VolumeStatus::FalseSignal,
    }
}

/// An alert together with everything derived from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedAlert {
    pub alert: Alert,
    pub score: u8,
    pub level: PriorityLevel,
    pub strength: Option<ConsecutiveStrength>,
    pub volume_status: Option<VolumeStatus>,
}

impl ClassifiedAlert {
    pub fn new(alert: Alert) -> Self {
        let score = priority_score(&alert);
        Self {
            score,
            level: priority_level(score),
            strength: alert.consecutive_count().map(consecutive_strength),
            volume_status: alert.as_volume().map(volume_status),
            alert,
        }
    }
}

/// Classify and rank, highest score first; ties keep input order.
pub fn classify_all<'a, I>(alerts: I) -> Vec<ClassifiedAlert>
where
    I: IntoIterator<Item = &'a Alert>,
{
    let mut out: Vec<ClassifiedAlert> = alerts
        .into_iter()
        .cloned()
        .map(ClassifiedAlert::new)
        .collect();
    out.sort_by(|a, b| b.score.cmp(&a.score));
    out
}
