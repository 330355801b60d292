//! Threshold alert state machine.
//!
//! Each `(kind, locus)` pair is either absent or active. A reading past the
//! kind's threshold (strictly above, or strictly below for cold) activates
//! it; while active, every crossing reading refreshes its value, severity
//! and last-observed time. A reading back inside the threshold counts
//! toward clearing, and the alert is removed once `clear_after_cycles`
//! consecutive clear readings have been seen. With the default of 1 that is
//! the first clear reading.
//!
//! A kind whose metric is missing from the snapshot is left exactly as it
//! was: absence of a reading is neither a crossing nor a clear.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::{AlertConfig, AlertThresholds};
use crate::model::{Alert, AlertKind, Crossing, Locus, Severity, WeatherSnapshot};

/// Configured threshold for one kind.
pub fn threshold_for(kind: AlertKind, thresholds: &AlertThresholds) -> f64 {
    match kind {
        AlertKind::HeatWarning => thresholds.temperature_high,
        AlertKind::ColdWarning => thresholds.temperature_low,
        AlertKind::WindWarning => thresholds.wind_speed,
        AlertKind::GustWarning => thresholds.gust_speed,
        AlertKind::RainAlert => thresholds.rain_probability,
        AlertKind::UvWarning => thresholds.uv_index,
    }
}

/// How far past the threshold `value` is; positive means crossing.
fn excess(kind: AlertKind, value: f64, threshold: f64) -> f64 {
    match kind.crossing() {
        Crossing::Above => value - threshold,
        Crossing::Below => threshold - value,
    }
}

/// A state change produced by one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Raised(Alert),
    Cleared(AlertKind),
}

#[derive(Debug, Clone)]
struct Tracked {
    alert: Alert,
    clear_streak: u32,
}

/// Active alerts with their headline figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertReport {
    pub alerts: Vec<Alert>,
    pub highest_severity: Option<Severity>,
    /// Whether a HIGH alert is active and weather is polled faster.
    pub fast_mode: bool,
}

/// Alert state for one locus.
#[derive(Debug, Clone)]
pub struct AlertEngine {
    config: AlertConfig,
    locus: Locus,
    active: BTreeMap<AlertKind, Tracked>,
}

impl AlertEngine {
    pub fn new(config: AlertConfig, locus: Locus) -> Self {
        Self {
            config,
            locus,
            active: BTreeMap::new(),
        }
    }

    fn severity(&self, kind: AlertKind, excess: f64) -> Severity {
        match self.config.tiers {
            Some(tiers) => tiers.severity_for(excess),
            None => kind.default_severity(),
        }
    }

    /// Run every kind against `snapshot` and return what changed.
    pub fn evaluate(&mut self, snapshot: &WeatherSnapshot) -> Vec<Transition> {
        let mut transitions = Vec::new();

        for kind in AlertKind::ALL {
            let Some(value) = kind.metric(snapshot) else {
                continue;
            };
            let threshold = threshold_for(kind, &self.config.thresholds);
            let past = excess(kind, value, threshold);
            let crossing = past > 0.0;

            if crossing {
                let severity = self.severity(kind, past);
                match self.active.get_mut(&kind) {
                    Some(tracked) => {
                        tracked.clear_streak = 0;
                        tracked.alert.value = value;
                        tracked.alert.severity = severity;
                        tracked.alert.last_observed = snapshot.observed_at;
                        tracked.alert.description = kind.describe(value);
                    }
                    None => {
                        let alert = Alert {
                            kind,
                            locus: self.locus.clone(),
                            severity,
                            value,
                            threshold,
                            first_observed: snapshot.observed_at,
                            last_observed: snapshot.observed_at,
                            title: kind.title().to_string(),
                            description: kind.describe(value),
                        };
                        warn!(
                            kind = %kind,
                            locus = %self.locus,
                            severity = ?severity,
                            value,
                            threshold,
                            "Alert raised"
                        );
                        self.active.insert(
                            kind,
                            Tracked {
                                alert: alert.clone(),
                                clear_streak: 0,
                            },
                        );
                        transitions.push(Transition::Raised(alert));
                    }
                }
            } else if let Some(tracked) = self.active.get_mut(&kind) {
                tracked.clear_streak += 1;
                if tracked.clear_streak >= self.config.clear_after_cycles {
                    self.active.remove(&kind);
                    info!(kind = %kind, locus = %self.locus, value, "Alert cleared");
                    transitions.push(Transition::Cleared(kind));
                }
            }
        }

        transitions
    }

    /// Active alerts, including ones waiting out their clear count.
    pub fn active(&self) -> Vec<Alert> {
        self.active.values().map(|t| t.alert.clone()).collect()
    }

    pub fn is_active(&self, kind: AlertKind) -> bool {
        self.active.contains_key(&kind)
    }

    pub fn highest_severity(&self) -> Option<Severity> {
        self.active.values().map(|t| t.alert.severity).max()
    }

    /// True while any HIGH alert is active.
    pub fn fast_mode(&self) -> bool {
        self.highest_severity() == Some(Severity::High)
    }

    pub fn report(&self) -> AlertReport {
        AlertReport {
            alerts: self.active(),
            highest_severity: self.highest_severity(),
            fast_mode: self.fast_mode(),
        }
    }
}
