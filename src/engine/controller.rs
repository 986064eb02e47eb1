//! Target controller
//!
//! Continuous feedback policy deciding, before every event, what the next
//! event should aim for and how long to wait before attempting it. The
//! controller never accumulates state of its own: every decision is a pure
//! function of the cumulative progress re-derived from the store and the
//! time left in the cycle, so restarts cannot drift.

use rand::Rng;
use std::time::Duration;
use tracing::debug;

use crate::config::EngineConfig;

/// Snapshot of the open cycle fed into each decision
#[derive(Debug, Clone, Copy)]
pub struct CycleStats {
    pub cumulative_pct: f64,
    pub events_count: i64,
    pub hours_remaining: f64,
}

impl CycleStats {
    pub fn is_active(&self) -> bool {
        self.hours_remaining > 0.0
    }
}

/// Which side of the target range the controller is correcting from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    /// Below the target range, pushing up
    Deficit,
    /// Above the target range, pulling down
    Excess,
    /// Inside the range, emitting cosmetic noise
    Cruise,
}

impl ControlMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlMode::Deficit => "deficit",
            ControlMode::Excess => "excess",
            ControlMode::Cruise => "cruise",
        }
    }
}

/// Outcome of one controller decision
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    /// The cycle has ended; no further events
    Closed,
    /// Aim the next event at `target_pct`
    Seek {
        target_pct: f64,
        mode: ControlMode,
    },
}

/// Feedback controller over the daily target range
#[derive(Clone)]
pub struct TargetController {
    cfg: EngineConfig,
}

impl TargetController {
    pub fn new(cfg: EngineConfig) -> Self {
        Self { cfg }
    }

    /// Decide the next event's target magnitude and sign.
    ///
    /// Deficit/excess corrections spread the remaining gap-to-center over
    /// the remaining hours, double when inside the correction threshold,
    /// and are clamped to the single-event cap.
    pub fn decide<R: Rng>(&self, stats: &CycleStats, rng: &mut R) -> Decision {
        let c = &self.cfg;
        let hours = stats.hours_remaining;

        if hours <= 0.0 {
            return Decision::Closed;
        }

        let cumulative = stats.cumulative_pct;
        let in_range = cumulative >= c.target_min && cumulative <= c.target_max;

        // Comfortable: in range with plenty of time, drift gently upward.
        if in_range && hours > c.correction_threshold_hours {
            return Decision::Seek {
                target_pct: rng.gen_range(-0.3..=0.5),
                mode: ControlMode::Cruise,
            };
        }

        let urgency = if hours <= c.correction_threshold_hours {
            2.0
        } else {
            1.0
        };

        if cumulative < c.target_min {
            let needed = c.target_center() - cumulative;
            let target = (needed * urgency / hours.max(1.0)).min(c.max_single_event_pct);
            debug!(
                "Deficit: cumulative {:.2}%, needed {:.2}%, urgency {:.1}, target {:+.2}%",
                cumulative, needed, urgency, target
            );
            Decision::Seek {
                target_pct: target,
                mode: ControlMode::Deficit,
            }
        } else if cumulative > c.target_max {
            let excess = cumulative - c.target_center();
            let target = -(excess * urgency / hours.max(1.0)).min(c.max_single_event_pct);
            debug!(
                "Excess: cumulative {:.2}%, excess {:.2}%, urgency {:.1}, target {:+.2}%",
                cumulative, excess, urgency, target
            );
            Decision::Seek {
                target_pct: target,
                mode: ControlMode::Excess,
            }
        } else {
            // In range but close to the deadline: keep the tape moving
            // without committing to a direction.
            Decision::Seek {
                target_pct: rng.gen_range(-0.5..=0.5),
                mode: ControlMode::Cruise,
            }
        }
    }

    /// Delay before the next event attempt.
    ///
    /// The base range compresses near the deadline, proportionally to how
    /// far outside the target range the cumulative value sits.
    pub fn delay<R: Rng>(&self, stats: &CycleStats, rng: &mut R) -> Duration {
        let c = &self.cfg;
        let cumulative = stats.cumulative_pct;
        let hours = stats.hours_remaining;

        let outside = if cumulative < c.target_min {
            c.target_min - cumulative
        } else if cumulative > c.target_max {
            cumulative - c.target_max
        } else {
            0.0
        };

        let badly_outside = cumulative < 0.7 * c.target_min || cumulative > 1.3 * c.target_max;

        let factor = if hours <= c.correction_threshold_hours {
            if outside > 0.0 {
                (1.0 / (1.0 + outside)).max(0.2)
            } else {
                0.5
            }
        } else if hours <= 4.0 && badly_outside {
            0.6
        } else {
            1.0
        };

        let lo = (c.min_delay_minutes as f64 * factor).max(5.0);
        let hi = (c.max_delay_minutes as f64 * factor).max(lo + 1.0);
        let minutes = rng.gen_range(lo..=hi);

        Duration::from_secs((minutes * 60.0) as u64)
    }
}
