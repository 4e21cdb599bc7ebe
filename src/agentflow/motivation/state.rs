// src/agentflow/motivation/state.rs

//! Pure arbitration math over a drive's state: decay, boost, scoring, and feedback. Kept free
//! of I/O so every rule is directly unit-testable against the invariants that bound
//! urgency/satisfaction/decay_rate/success_rate to `[0, 1]`.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::agentflow::config::MotivationConfig;
use crate::agentflow::persistence::store::MotivationalStateRecord;

fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

/// `urgency <- clamp(urgency * (1 - decay_rate * dt), 0, 1)`,
/// `satisfaction <- clamp(satisfaction - epsilon, 0, 1)` over `dt` seconds.
pub fn decay(record: &mut MotivationalStateRecord, dt_secs: f64, epsilon: f64) {
    record.urgency = clamp01(record.urgency * (1.0 - record.decay_rate * dt_secs));
    record.satisfaction = clamp01(record.satisfaction - epsilon * dt_secs);
}

/// Raises urgency by `boost_factor` if the drive's `trigger_condition` predicate matches the
/// supplied signal payload. The predicate grammar is deliberately small: a `min_interval_secs`
/// field compared against `seconds_since_last_triggered`, and/or an explicit `always: true`.
pub fn apply_trigger(record: &mut MotivationalStateRecord, seconds_since_last_triggered: Option<f64>) -> bool {
    let triggered = match record.trigger_condition.get("always").and_then(Value::as_bool) {
        Some(true) => true,
        _ => match (record.trigger_condition.get("min_interval_secs").and_then(Value::as_f64), seconds_since_last_triggered) {
            (Some(min_interval), Some(elapsed)) => elapsed >= min_interval,
            (Some(_), None) => true,
            _ => false,
        },
    };
    if triggered {
        record.urgency = clamp01(record.urgency + record.boost_factor);
    }
    triggered
}

/// External boost API: applies immediately, independent of the trigger predicate. Boosting by
/// zero is a no-op by construction (`clamp01(urgency + 0.0) == urgency`).
pub fn boost(record: &mut MotivationalStateRecord, amount: f64) {
    record.urgency = clamp01(record.urgency + amount);
}

fn age_penalty(last_triggered: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    match last_triggered {
        None => 0.0,
        Some(t) => {
            let hours = (now - t).num_seconds().max(0) as f64 / 3600.0;
            (hours / 24.0).min(1.0)
        }
    }
}

/// `score = w_u*urgency + w_s*(1 - satisfaction) + w_r*success_rate - w_a*age_penalty`.
pub fn arbitration_score(record: &MotivationalStateRecord, last_triggered: Option<DateTime<Utc>>, now: DateTime<Utc>, config: &MotivationConfig) -> f64 {
    config.weight_urgency * record.urgency + config.weight_dissatisfaction * (1.0 - record.satisfaction) + config.weight_success_rate * record.success_rate
        - config.weight_age_penalty * age_penalty(last_triggered, now)
}

#[derive(Debug, Clone)]
pub struct Candidate {
    pub motivation_type: String,
    pub score: f64,
}

/// Selects the highest-scoring drive at or above the threshold, among those under the
/// per-drive concurrency cap. Returns `None` if no candidate clears the bar.
pub fn pick_winner(candidates: &[Candidate], threshold: f64) -> Option<&Candidate> {
    candidates.iter().filter(|c| c.score >= threshold).max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal))
}

/// Applies completion feedback: `satisfaction <- clamp(satisfaction + gain, 0, 1)`, bumps the
/// relevant counter, and recomputes `success_rate` from the updated counts.
pub fn apply_feedback(record: &mut MotivationalStateRecord, gain: f64, succeeded: bool) {
    record.satisfaction = clamp01(record.satisfaction + gain);
    if succeeded {
        record.success_count += 1;
    } else {
        record.failure_count += 1;
    }
    let total = record.success_count + record.failure_count;
    record.success_rate = if total == 0 { 0.0 } else { record.success_count as f64 / total as f64 };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> MotivationalStateRecord {
        MotivationalStateRecord {
            motivation_type: "monitor_social_network".to_string(),
            urgency: 0.5,
            satisfaction: 0.5,
            decay_rate: 0.1,
            boost_factor: 0.2,
            trigger_condition: serde_json::json!({"always": true}),
            last_triggered_at: None,
            last_satisfied_at: None,
            success_count: 2,
            failure_count: 1,
            success_rate: 2.0 / 3.0,
            active: true,
            metadata: serde_json::json!({}),
        }
    }

    #[test]
    fn decay_reduces_urgency_and_satisfaction_over_time() {
        let mut r = record();
        decay(&mut r, 10.0, 0.001);
        assert!(r.urgency < 0.5);
        assert!(r.satisfaction < 0.5);
        assert!(r.urgency >= 0.0);
    }

    #[test]
    fn boosting_by_zero_is_a_no_op() {
        let mut r = record();
        let before = r.urgency;
        boost(&mut r, 0.0);
        assert_eq!(r.urgency, before);
    }

    #[test]
    fn boost_never_exceeds_one() {
        let mut r = record();
        r.urgency = 0.95;
        boost(&mut r, 0.5);
        assert_eq!(r.urgency, 1.0);
    }

    #[test]
    fn always_trigger_applies_boost_factor() {
        let mut r = record();
        let before = r.urgency;
        let triggered = apply_trigger(&mut r, None);
        assert!(triggered);
        assert_eq!(r.urgency, clamp01(before + 0.2));
    }

    #[test]
    fn pick_winner_returns_highest_scoring_candidate_above_threshold() {
        let candidates = vec![
            Candidate { motivation_type: "a".to_string(), score: 0.2 },
            Candidate { motivation_type: "b".to_string(), score: 0.6 },
            Candidate { motivation_type: "c".to_string(), score: 0.5 },
        ];
        let winner = pick_winner(&candidates, 0.3).unwrap();
        assert_eq!(winner.motivation_type, "b");
    }

    #[test]
    fn pick_winner_returns_none_when_all_below_threshold() {
        let candidates = vec![Candidate { motivation_type: "a".to_string(), score: 0.1 }];
        assert!(pick_winner(&candidates, 0.3).is_none());
    }

    #[test]
    fn feedback_recomputes_success_rate() {
        let mut r = record();
        apply_feedback(&mut r, 0.1, true);
        assert_eq!(r.success_count, 3);
        assert_eq!(r.success_rate, 3.0 / 4.0);
    }
}
