//! Content-Change Predictor (spec §4.5): per (domain, url-pattern) history
//! of content-hash observations, used to recommend a poll interval instead
//! of polling blindly.

use chrono::{DateTime, Datelike, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::ids::ContentHash;

const BUFFER_CAPACITY: usize = 256;
const PERIODIC_MIN_CHANGES: usize = 4;
const PERIODIC_MAX_CV: f64 = 0.25;
const CALENDAR_MIN_OCCURRENCES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Urgency {
    Low = 0,
    Normal = 1,
    High = 2,
    Critical = 3,
}

impl Urgency {
    pub fn recommended_poll_interval(self) -> std::time::Duration {
        match self {
            Urgency::Critical => std::time::Duration::from_secs(5 * 60),
            Urgency::High => std::time::Duration::from_secs(60 * 60),
            Urgency::Normal => std::time::Duration::from_secs(6 * 60 * 60),
            Urgency::Low => std::time::Duration::from_secs(24 * 60 * 60),
        }
    }

    fn from_time_until(until: ChronoDuration) -> Self {
        if until <= ChronoDuration::hours(1) {
            Urgency::Critical
        } else if until <= ChronoDuration::hours(24) {
            Urgency::High
        } else if until <= ChronoDuration::days(7) {
            Urgency::Normal
        } else {
            Urgency::Low
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    pub content_hash: ContentHash,
    pub changed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodicPattern {
    pub period: ChronoDuration,
    pub phase: DateTime<Utc>,
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarTrigger {
    pub month: u32,
    pub day_of_month: u32,
    pub historical_count: usize,
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub timestamp: DateTime<Utc>,
    pub confidence: f32,
    pub uncertainty_window: ChronoDuration,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccuracyCounters {
    pub hits: u32,
    pub misses: u32,
}

impl AccuracyCounters {
    pub fn success_rate(&self) -> f32 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f32 / total as f32
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePattern {
    pub domain: String,
    pub url_pattern: String,
    #[serde(skip, default)]
    observations: VecDeque<Observation>,
    pub periodic: Option<PeriodicPattern>,
    pub calendar_triggers: Vec<CalendarTrigger>,
    pub last_prediction: Option<Prediction>,
    pub accuracy: AccuracyCounters,
}

impl ChangePattern {
    pub fn new(domain: impl Into<String>, url_pattern: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            url_pattern: url_pattern.into(),
            observations: VecDeque::new(),
            periodic: None,
            calendar_triggers: vec![],
            last_prediction: None,
            accuracy: AccuracyCounters::default(),
        }
    }

    pub fn observe(&mut self, obs: Observation) {
        if self.observations.len() == BUFFER_CAPACITY {
            self.observations.pop_front();
        }
        self.observations.push_back(obs);
        self.recompute();
    }

    pub fn last_content_hash(&self) -> Option<&ContentHash> {
        self.observations.back().map(|o| &o.content_hash)
    }

    fn change_timestamps(&self) -> Vec<DateTime<Utc>> {
        self.observations.iter().filter(|o| o.changed).map(|o| o.timestamp).collect()
    }

    fn recompute(&mut self) {
        self.periodic = self.detect_periodic();
        self.calendar_triggers = self.detect_calendar_triggers();
        self.last_prediction = self.compute_next_prediction();
    }

    fn detect_periodic(&self) -> Option<PeriodicPattern> {
        let changes = self.change_timestamps();
        if changes.len() < PERIODIC_MIN_CHANGES {
            return None;
        }
        let intervals: Vec<f64> = changes
            .windows(2)
            .map(|w| (w[1] - w[0]).num_seconds() as f64)
            .collect();
        if intervals.is_empty() {
            return None;
        }
        let mean = intervals.iter().sum::<f64>() / intervals.len() as f64;
        if mean <= 0.0 {
            return None;
        }
        let variance = intervals.iter().map(|i| (i - mean).powi(2)).sum::<f64>() / intervals.len() as f64;
        let stddev = variance.sqrt();
        let cv = stddev / mean;

        if cv < PERIODIC_MAX_CV {
            Some(PeriodicPattern {
                period: ChronoDuration::seconds(mean.round() as i64),
                phase: *changes.first().unwrap(),
                confidence: (1.0 - cv) as f32,
            })
        } else {
            None
        }
    }

    fn detect_calendar_triggers(&self) -> Vec<CalendarTrigger> {
        use std::collections::HashMap;
        let mut buckets: HashMap<(u32, u32), usize> = HashMap::new();
        for ts in self.change_timestamps() {
            *buckets.entry((ts.month(), ts.day())).or_insert(0) += 1;
        }
        buckets
            .into_iter()
            .filter(|(_, count)| *count >= CALENDAR_MIN_OCCURRENCES)
            .map(|((month, day_of_month), count)| CalendarTrigger {
                month,
                day_of_month,
                historical_count: count,
                confidence: (count as f32 / 5.0).min(1.0),
            })
            .collect()
    }

    fn interval_stddev(&self) -> ChronoDuration {
        let changes = self.change_timestamps();
        if changes.len() < 2 {
            return ChronoDuration::hours(24);
        }
        let intervals: Vec<f64> = changes.windows(2).map(|w| (w[1] - w[0]).num_seconds() as f64).collect();
        let mean = intervals.iter().sum::<f64>() / intervals.len() as f64;
        let variance = intervals.iter().map(|i| (i - mean).powi(2)).sum::<f64>() / intervals.len() as f64;
        ChronoDuration::seconds(variance.sqrt().round() as i64)
    }

    fn compute_next_prediction(&self) -> Option<Prediction> {
        let last_change = self.change_timestamps().into_iter().last();

        if let (Some(periodic), Some(last)) = (&self.periodic, last_change) {
            return Some(Prediction {
                timestamp: last + periodic.period,
                confidence: periodic.confidence,
                uncertainty_window: self.interval_stddev(),
                reason: "periodic".to_string(),
            });
        }

        if !self.calendar_triggers.is_empty() {
            let now = Utc::now();
            let best = self
                .calendar_triggers
                .iter()
                .filter_map(|t| next_occurrence(now, t.month, t.day_of_month).map(|ts| (ts, t)))
                .min_by_key(|(ts, _)| *ts);
            if let Some((timestamp, trigger)) = best {
                return Some(Prediction {
                    timestamp,
                    confidence: trigger.confidence,
                    uncertainty_window: ChronoDuration::days(1),
                    reason: "calendar".to_string(),
                });
            }
        }

        None
    }

    pub fn urgency(&self, now: DateTime<Utc>) -> Urgency {
        match &self.last_prediction {
            Some(p) => Urgency::from_time_until(p.timestamp - now),
            None => Urgency::Low,
        }
    }

    /// Compares `actual` against the most recent prediction; success if it
    /// fell within the uncertainty window either side of the predicted time.
    pub fn record_prediction_accuracy(&mut self, actual: DateTime<Utc>) {
        let Some(prediction) = self.last_prediction.clone() else {
            return;
        };
        let delta = (actual - prediction.timestamp).num_seconds().abs();
        let window = prediction.uncertainty_window.num_seconds().abs();
        if delta <= window {
            self.accuracy.hits += 1;
        } else {
            self.accuracy.misses += 1;
        }
    }
}

fn next_occurrence(from: DateTime<Utc>, month: u32, day: u32) -> Option<DateTime<Utc>> {
    for year_offset in 0..2 {
        let year = from.year() + year_offset;
        if let Some(naive) = chrono::NaiveDate::from_ymd_opt(year, month, day) {
            let candidate = naive.and_hms_opt(0, 0, 0)?.and_utc();
            if candidate >= from {
                return Some(candidate);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(ts: DateTime<Utc>, changed: bool) -> Observation {
        Observation { timestamp: ts, content_hash: ContentHash::of(&ts.to_rfc3339()), changed }
    }

    #[test]
    fn detects_weekly_periodicity() {
        let mut pattern = ChangePattern::new("example.com", "/news");
        let start = Utc::now() - ChronoDuration::days(28);
        for i in 0..5 {
            pattern.observe(obs(start + ChronoDuration::days(7 * i), true));
        }
        let periodic = pattern.periodic.expect("should detect periodicity");
        assert!((periodic.period.num_hours() - 24 * 7).abs() < 5);
    }

    #[test]
    fn irregular_intervals_do_not_trigger_periodic() {
        let mut pattern = ChangePattern::new("example.com", "/random");
        let start = Utc::now() - ChronoDuration::days(60);
        let offsets = [0, 3, 40, 41, 59];
        for o in offsets {
            pattern.observe(obs(start + ChronoDuration::days(o), true));
        }
        assert!(pattern.periodic.is_none());
    }

    #[test]
    fn urgency_escalates_as_prediction_nears() {
        let mut pattern = ChangePattern::new("example.com", "/news");
        let start = Utc::now() - ChronoDuration::hours(4);
        for i in 0..4 {
            pattern.observe(obs(start + ChronoDuration::hours(i), true));
        }
        assert!(pattern.urgency(Utc::now()) >= Urgency::Normal);
    }

    #[test]
    fn prediction_accuracy_counts_hit_within_window() {
        let mut pattern = ChangePattern::new("example.com", "/news");
        let start = Utc::now() - ChronoDuration::days(28);
        for i in 0..5 {
            pattern.observe(obs(start + ChronoDuration::days(7 * i), true));
        }
        let predicted = pattern.last_prediction.clone().unwrap().timestamp;
        pattern.record_prediction_accuracy(predicted + ChronoDuration::hours(1));
        assert_eq!(pattern.accuracy.hits, 1);
    }
}
